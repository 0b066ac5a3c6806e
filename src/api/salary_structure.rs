use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::{
        role::Role,
        salary_structure::{SalaryStructure, validate_amounts},
    },
    utils::db_utils::{Column, ColumnKind, SqlValue, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const STRUCTURE_COLUMNS: &str = "id, role, position, department_id, base_pay, hra, insurance";

const EDITABLE_COLUMNS: &[Column] = &[
    Column::new("role", ColumnKind::Text),
    Column::new("position", ColumnKind::Text),
    Column::new("department_id", ColumnKind::Unsigned),
    Column::new("base_pay", ColumnKind::Amount),
    Column::new("hra", ColumnKind::Amount),
    Column::new("insurance", ColumnKind::Amount),
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSalaryStructure {
    pub role: Role,
    #[schema(example = "Software Engineer")]
    pub position: String,
    #[schema(example = 2)]
    pub department_id: u64,
    #[schema(example = 60000.0)]
    pub base_pay: f64,
    #[schema(example = 12000.0)]
    pub hra: Option<f64>,
    #[schema(example = 1500.0)]
    pub insurance: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StructureQuery {
    /// Only structures of this department
    pub department_id: Option<u64>,
}

fn duplicate_or(e: sqlx::Error) -> ApiError {
    if is_constraint_violation(&e) {
        ApiError::conflict(
            "A salary structure for this role, position and department already exists, \
             or the department does not exist",
        )
    } else {
        e.into()
    }
}

async fn fetch_structure(pool: &MySqlPool, id: u64) -> ApiResult<SalaryStructure> {
    let sql = format!("SELECT {STRUCTURE_COLUMNS} FROM salary_structures WHERE id = ?");
    sqlx::query_as::<_, SalaryStructure>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Salary structure not found"))
}

#[utoipa::path(
    post,
    path = "/api/salary-structures",
    request_body = CreateSalaryStructure,
    responses(
        (status = 201, description = "Salary structure created", body = SalaryStructure),
        (status = 400, description = "Blank position or invalid amounts"),
        (status = 409, description = "Duplicate role/position/department")
    ),
    tag = "Salary Structure",
    security(("bearer_auth" = []))
)]
pub async fn create_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSalaryStructure>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let position = payload.position.trim();
    if position.is_empty() {
        return Err(ApiError::bad_request("position is required"));
    }

    let hra = payload.hra.unwrap_or(0.0);
    let insurance = payload.insurance.unwrap_or(0.0);
    validate_amounts(payload.base_pay, hra, insurance).map_err(ApiError::bad_request)?;

    let result = sqlx::query(
        r#"
        INSERT INTO salary_structures (role, position, department_id, base_pay, hra, insurance)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.role.as_ref())
    .bind(position)
    .bind(payload.department_id)
    .bind(payload.base_pay)
    .bind(hra)
    .bind(insurance)
    .execute(pool.get_ref())
    .await
    .map_err(duplicate_or)?;

    let structure = fetch_structure(pool.get_ref(), result.last_insert_id()).await?;

    info!(structure_id = structure.id, "Salary structure created");

    Ok(HttpResponse::Created().json(structure))
}

#[utoipa::path(
    get,
    path = "/api/salary-structures",
    params(StructureQuery),
    responses(
        (status = 200, description = "Salary structures", body = [SalaryStructure])
    ),
    tag = "Salary Structure",
    security(("bearer_auth" = []))
)]
pub async fn list_structures(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StructureQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let structures = match query.department_id {
        Some(department_id) => {
            let sql = format!(
                "SELECT {STRUCTURE_COLUMNS} FROM salary_structures \
                 WHERE department_id = ? ORDER BY role, position"
            );
            sqlx::query_as::<_, SalaryStructure>(&sql)
                .bind(department_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {STRUCTURE_COLUMNS} FROM salary_structures \
                 ORDER BY department_id, role, position"
            );
            sqlx::query_as::<_, SalaryStructure>(&sql)
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(structures))
}

#[utoipa::path(
    put,
    path = "/api/salary-structures/{structure_id}",
    params(("structure_id" = u64, Path, description = "Salary structure ID")),
    request_body(
        content = Object,
        description = "Any of role, position, department_id, base_pay, hra, insurance",
        example = json!({ "base_pay": 65000.0 })
    ),
    responses(
        (status = 200, description = "Salary structure updated", body = SalaryStructure),
        (status = 400, description = "Invalid field or amount"),
        (status = 404, description = "Salary structure not found"),
        (status = 409, description = "Duplicate role/position/department")
    ),
    tag = "Salary Structure",
    security(("bearer_auth" = []))
)]
pub async fn update_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let structure_id = path.into_inner();
    let current = fetch_structure(pool.get_ref(), structure_id).await?;

    let (update, columns) =
        build_update_sql("salary_structures", &body, EDITABLE_COLUMNS, "id", structure_id)?;

    if let Some(SqlValue::String(role)) = update.value_of(&columns, "role") {
        if Role::parse(role).is_none() {
            return Err(ApiError::bad_request("Invalid role. Allowed: admin, employee"));
        }
    }

    let amount = |name: &str, fallback: f64| match update.value_of(&columns, name) {
        Some(SqlValue::F64(v)) => *v,
        _ => fallback,
    };
    validate_amounts(
        amount("base_pay", current.base_pay),
        amount("hra", current.hra),
        amount("insurance", current.insurance),
    )
    .map_err(ApiError::bad_request)?;

    execute_update(pool.get_ref(), update)
        .await
        .map_err(duplicate_or)?;

    let structure = fetch_structure(pool.get_ref(), structure_id).await?;

    info!(structure_id, "Salary structure updated");

    Ok(HttpResponse::Ok().json(structure))
}

#[utoipa::path(
    delete,
    path = "/api/salary-structures/{structure_id}",
    params(("structure_id" = u64, Path, description = "Salary structure ID")),
    responses(
        (status = 200, description = "Salary structure deleted"),
        (status = 404, description = "Salary structure not found")
    ),
    tag = "Salary Structure",
    security(("bearer_auth" = []))
)]
pub async fn delete_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let structure_id = path.into_inner();

    let result = sqlx::query("DELETE FROM salary_structures WHERE id = ?")
        .bind(structure_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Salary structure not found"));
    }

    info!(structure_id, "Salary structure deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Salary structure deleted" })))
}
