use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::department::Department,
    utils::db_utils::{Column, ColumnKind, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const DEPARTMENT_COLUMNS: &[Column] = &[
    Column::new("department_name", ColumnKind::Text),
    Column::new("location", ColumnKind::NullableText),
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Engineering")]
    pub department_name: String,
    #[schema(example = "Dhaka")]
    pub location: Option<String>,
}

async fn fetch_department(pool: &MySqlPool, id: u64) -> ApiResult<Department> {
    sqlx::query_as::<_, Department>(
        "SELECT id, department_name, location FROM departments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Department not found"))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "department_name is required"),
        (status = 409, description = "Department already exists")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let name = payload.department_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("department_name is required"));
    }
    let location = payload
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let result = sqlx::query("INSERT INTO departments (department_name, location) VALUES (?, ?)")
        .bind(name)
        .bind(location)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiError::conflict("Department already exists")
            } else {
                e.into()
            }
        })?;

    let department = fetch_department(pool.get_ref(), result.last_insert_id()).await?;

    info!(department_id = department.id, "Department created");

    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses(
        (status = 200, description = "All departments sorted by name", body = [Department])
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, department_name, location FROM departments ORDER BY department_name ASC",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    request_body(
        content = Object,
        description = "Any of department_name, location",
        example = json!({ "location": "Chattogram" })
    ),
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department name already in use")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let department_id = path.into_inner();
    let (update, _) =
        build_update_sql("departments", &body, DEPARTMENT_COLUMNS, "id", department_id)?;

    // Existence first: MySQL reports zero affected rows for a no-op update too.
    fetch_department(pool.get_ref(), department_id).await?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        if is_constraint_violation(&e) {
            ApiError::conflict("Department name already in use")
        } else {
            e.into()
        }
    })?;

    let department = fetch_department(pool.get_ref(), department_id).await?;

    info!(department_id, "Department updated");

    Ok(HttpResponse::Ok().json(department))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department deleted"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department still has employees or salary structures")
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let department_id = path.into_inner();

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiError::conflict("Department is still referenced by employees or salary structures")
            } else {
                e.into()
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Department not found"));
    }

    info!(department_id, deleted_by = auth.user_id, "Department deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Department deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_name_and_location_are_editable() {
        let (update, _) = build_update_sql(
            "departments",
            &json!({ "department_name": "Finance", "location": null }),
            DEPARTMENT_COLUMNS,
            "id",
            3,
        )
        .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE departments SET department_name = ?, location = ? WHERE id = ?"
        );

        assert!(
            build_update_sql("departments", &json!({ "id": 9 }), DEPARTMENT_COLUMNS, "id", 3)
                .is_err()
        );
    }
}
