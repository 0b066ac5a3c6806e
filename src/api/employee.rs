use crate::{
    auth::{
        auth::AuthUser,
        handlers::{insert_user, is_email_available},
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        role::Role,
        user::{PROFILE_COLUMNS, UserProfile, is_valid_email, normalize_email},
    },
    models::NewUserReq,
    utils::{
        db_utils::{Column, ColumnKind, SqlValue, build_update_sql, execute_update},
        email_registry::registry,
        pagination::{Page, Pagination},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::IntoParams;

/// Profile columns an admin may change. Password is handled separately.
const EMPLOYEE_COLUMNS: &[Column] = &[
    Column::new("employee_code", ColumnKind::Text),
    Column::new("first_name", ColumnKind::Text),
    Column::new("last_name", ColumnKind::NullableText),
    Column::new("email", ColumnKind::Text),
    Column::new("role", ColumnKind::Text),
    Column::new("department_id", ColumnKind::Unsigned),
    Column::new("position", ColumnKind::NullableText),
    Column::new("experience", ColumnKind::Unsigned),
    Column::new("date_of_joining", ColumnKind::Date),
    Column::new("available_leaves", ColumnKind::Count),
    Column::new("profile_image_path", ColumnKind::NullableText),
    Column::new("passport_number", ColumnKind::NullableText),
];

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
    /// Filter by department
    pub department_id: Option<u64>,
    /// Filter by role
    pub role: Option<Role>,
    /// Search by name, email or employee code
    pub search: Option<String>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

pub async fn fetch_profile(pool: &MySqlPool, user_id: u64) -> ApiResult<Option<UserProfile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?");
    let profile = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(profile.map(UserProfile::with_full_name))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = NewUserReq,
    responses(
        (status = 201, description = "Employee created successfully", body = UserProfile),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email or employee code already exists")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<NewUserReq>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let role = payload.role.unwrap_or_default();
    let user_id = insert_user(&payload, role, pool.get_ref(), &config).await?;

    let employee = fetch_profile(pool.get_ref(), user_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(user_id, created_by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "employee": employee
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list: { data: [UserProfile], page, per_page, total }"),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let pagination = Pagination::new(query.page, query.per_page);

    let mut conditions = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        args.push(FilterValue::U64(department_id));
    }

    if let Some(role) = query.role {
        conditions.push("role = ?");
        args.push(FilterValue::Str(role.to_string()));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)",
        );
        let like = format!("%{}%", search);
        for _ in 0..4 {
            args.push(FilterValue::Str(like.clone()));
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM users {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.as_str()),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM users {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page = pagination.page, per_page = pagination.per_page, "Fetching employees");

    let mut data_q = sqlx::query_as::<_, UserProfile>(&data_sql);
    for arg in &args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(*v),
            FilterValue::Str(s) => data_q.bind(s.as_str()),
        };
    }
    let employees = data_q
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(UserProfile::with_full_name)
        .collect();

    Ok(HttpResponse::Ok().json(Page::new(employees, pagination, total)))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = UserProfile),
        (status = 403, description = "Not your profile"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_self_or_admin(employee_id)?;

    let employee = fetch_profile(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee (partial)
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of the editable profile fields"),
    responses(
        (status = 200, description = "Employee updated successfully", body = UserProfile),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Email or employee code already in use")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let current_email =
        sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let mut payload = body.into_inner();
    if let Some(email) = payload.get_mut("email") {
        if let Some(raw) = email.as_str() {
            *email = Value::String(normalize_email(raw));
        }
    }

    let (update, columns) =
        build_update_sql("users", &payload, EMPLOYEE_COLUMNS, "id", employee_id)?;

    if let Some(SqlValue::String(role)) = update.value_of(&columns, "role") {
        if Role::parse(role).is_none() {
            return Err(ApiError::bad_request("Invalid role. Allowed: admin, employee"));
        }
        if employee_id == auth.user_id && Role::parse(role) != Some(Role::Admin) {
            return Err(ApiError::bad_request("You cannot remove your own admin role"));
        }
    }

    let new_email = match update.value_of(&columns, "email") {
        Some(SqlValue::String(email)) if *email != current_email => {
            if !is_valid_email(email) {
                return Err(ApiError::bad_request("Invalid email address"));
            }
            if !is_email_available(email, pool.get_ref()).await? {
                return Err(ApiError::conflict("User with that email already exists."));
            }
            Some(email.clone())
        }
        _ => None,
    };

    execute_update(pool.get_ref(), update).await?;

    if let Some(email) = new_email {
        registry().release(&current_email).await;
        registry().claim(&email).await;
    }

    let employee = fetch_profile(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    info!(employee_id, updated_by = auth.user_id, "Employee updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully",
        "employee": employee
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    if employee_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    // Leaves, attendance, salaries, todos and refresh tokens cascade.
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    registry().release(&email).await;

    info!(employee_id, deleted_by = auth.user_id, "Employee deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_balance_cannot_be_set_negative() {
        let payload = json!({ "available_leaves": -40 });
        assert!(build_update_sql("users", &payload, EMPLOYEE_COLUMNS, "id", 7).is_err());

        let payload = json!({ "available_leaves": 12 });
        let (update, _) = build_update_sql("users", &payload, EMPLOYEE_COLUMNS, "id", 7).unwrap();
        assert_eq!(update.sql, "UPDATE users SET available_leaves = ? WHERE id = ?");
        assert_eq!(update.values, vec![SqlValue::I64(12), SqlValue::U64(7)]);
    }

    #[test]
    fn password_is_not_an_editable_column() {
        let payload = json!({ "password": "new-secret" });
        assert!(build_update_sql("users", &payload, EMPLOYEE_COLUMNS, "id", 7).is_err());
    }
}
