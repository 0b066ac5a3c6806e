use actix_web::{HttpResponse, web};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlPool, prelude::FromRow};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::{
        salary::{
            AttendanceTally, PayComponents, SALARY_COLUMNS, Salary, compute_pay, days_in_month,
        },
        salary_structure::SalaryStructure,
    },
    utils::pagination::{Page, Pagination},
};

pub const MIN_PAYROLL_YEAR: i32 = 2000;
pub const MAX_PAYROLL_YEAR: i32 = 2100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateSalary {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 1)]
    pub month: u32,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 5000.0)]
    pub incentives: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct SalaryQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// Month (1-12)
    pub month: Option<u8>,
    pub year: Option<u16>,
}

/// Salary row joined with the employee, for the admin list.
#[derive(Serialize, FromRow, ToSchema)]
pub struct SalaryListItem {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "john@company.com")]
    pub employee_email: String,
    pub month: u8,
    pub year: u16,
    pub base_pay: f64,
    pub hra: f64,
    pub insurance: f64,
    pub incentives: f64,
    pub days_present: u32,
    pub days_half: u32,
    pub days_on_leave: u32,
    pub days_absent: u32,
    pub per_day_rate: f64,
    pub absence_deduction: f64,
    pub net_salary: f64,
    #[schema(value_type = String, format = "date-time")]
    pub calculated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct EmployeePayKey {
    role: String,
    position: Option<String>,
    department_id: u64,
}

enum FilterValue {
    U64(u64),
    U8(u8),
    U16(u16),
}

/// Checks the pay period and returns its number of days.
fn pay_period_days(month: u32, year: i32) -> Result<u32, ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::bad_request("month must be between 1 and 12"));
    }
    if !(MIN_PAYROLL_YEAR..=MAX_PAYROLL_YEAR).contains(&year) {
        return Err(ApiError::bad_request(format!(
            "year must be between {MIN_PAYROLL_YEAR} and {MAX_PAYROLL_YEAR}"
        )));
    }
    days_in_month(year, month).ok_or_else(|| ApiError::bad_request("Invalid pay period"))
}

fn validate_incentives(incentives: Option<f64>) -> Result<f64, ApiError> {
    match incentives {
        None => Ok(0.0),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(_) => Err(ApiError::bad_request("incentives cannot be negative")),
    }
}

async fn salaries_of(pool: &MySqlPool, employee_id: u64) -> ApiResult<Vec<Salary>> {
    let sql = format!(
        "SELECT {SALARY_COLUMNS} FROM salaries WHERE employee_id = ? ORDER BY year DESC, month DESC"
    );
    Ok(sqlx::query_as::<_, Salary>(&sql)
        .bind(employee_id)
        .fetch_all(pool)
        .await?)
}

/// Generate a monthly salary record from attendance (admin)
#[utoipa::path(
    post,
    path = "/api/salaries",
    request_body = GenerateSalary,
    responses(
        (status = 201, description = "Salary generated", body = Salary),
        (status = 400, description = "Invalid month, year or incentives"),
        (status = 404, description = "Employee, position or matching salary structure not found"),
        (status = 409, description = "Salary for this month already generated")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(
    name = "generate_salary",
    skip(pool, payload),
    fields(employee_id = payload.employee_id, month = payload.month, year = payload.year)
)]
pub async fn generate_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GenerateSalary>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let days = pay_period_days(payload.month, payload.year)?;
    let incentives = validate_incentives(payload.incentives)?;

    let employee = sqlx::query_as::<_, EmployeePayKey>(
        "SELECT role, position, department_id FROM users WHERE id = ?",
    )
    .bind(payload.employee_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let position = employee
        .position
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::not_found("Employee has no position assigned"))?;

    let structure = sqlx::query_as::<_, SalaryStructure>(
        r#"
        SELECT id, role, position, department_id, base_pay, hra, insurance
        FROM salary_structures
        WHERE role = ? AND position = ? AND department_id = ?
        "#,
    )
    .bind(&employee.role)
    .bind(position)
    .bind(employee.department_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        ApiError::not_found("No salary structure for this employee's role, position and department")
    })?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM salaries WHERE employee_id = ? AND month = ? AND year = ?",
    )
    .bind(payload.employee_id)
    .bind(payload.month)
    .bind(payload.year)
    .fetch_one(pool.get_ref())
    .await?;
    if existing > 0 {
        return Err(ApiError::conflict("Salary for this month already generated"));
    }

    // A past day that was clocked in but never clocked out counts as absent.
    let counts = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT CASE
                 WHEN check_in IS NOT NULL AND check_out IS NULL AND date < ? THEN 'absent'
                 ELSE status
               END AS day_status,
               COUNT(*)
        FROM attendance
        WHERE employee_id = ? AND YEAR(date) = ? AND MONTH(date) = ?
        GROUP BY day_status
        "#,
    )
    .bind(Local::now().date_naive())
    .bind(payload.employee_id)
    .bind(payload.year)
    .bind(payload.month)
    .fetch_all(pool.get_ref())
    .await?;

    let tally = AttendanceTally::from_counts(counts);
    let pay = PayComponents {
        base_pay: structure.base_pay,
        hra: structure.hra,
        insurance: structure.insurance,
        incentives,
    };
    let breakdown = compute_pay(pay, tally, days);

    debug!(?tally, ?breakdown, structure_id = structure.id, "Salary computed");

    let result = sqlx::query(
        r#"
        INSERT INTO salaries
            (employee_id, month, year, base_pay, hra, insurance, incentives,
             days_present, days_half, days_on_leave, days_absent,
             per_day_rate, absence_deduction, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.month)
    .bind(payload.year)
    .bind(pay.base_pay)
    .bind(pay.hra)
    .bind(pay.insurance)
    .bind(pay.incentives)
    .bind(tally.present)
    .bind(tally.half_day)
    .bind(tally.on_leave)
    .bind(tally.absent)
    .bind(breakdown.per_day_rate)
    .bind(breakdown.absence_deduction)
    .bind(breakdown.net_salary)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ApiError::conflict("Salary for this month already generated")
        } else {
            e.into()
        }
    })?;

    let sql = format!("SELECT {SALARY_COLUMNS} FROM salaries WHERE id = ?");
    let salary = sqlx::query_as::<_, Salary>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(pool.get_ref())
        .await?;

    info!(salary_id = salary.id, net_salary = salary.net_salary, "Salary generated");

    Ok(HttpResponse::Created().json(json!({
        "message": "Salary generated",
        "salary": salary
    })))
}

#[utoipa::path(
    get,
    path = "/api/salaries",
    params(SalaryQuery),
    responses(
        (status = 200, description = "Paginated salary list: { data: [SalaryListItem], page, per_page, total }"),
        (status = 403, description = "Admin only")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_salaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalaryQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let pagination = Pagination::new(query.page, query.per_page);

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();

    if let Some(employee_id) = query.employee_id {
        where_sql.push_str(" AND s.employee_id = ?");
        args.push(FilterValue::U64(employee_id));
    }
    if let Some(month) = query.month {
        where_sql.push_str(" AND s.month = ?");
        args.push(FilterValue::U8(month));
    }
    if let Some(year) = query.year {
        where_sql.push_str(" AND s.year = ?");
        args.push(FilterValue::U16(year));
    }

    let count_sql = format!("SELECT COUNT(*) FROM salaries s{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::U8(v) => count_q.bind(*v),
            FilterValue::U16(v) => count_q.bind(*v),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT s.id, s.employee_id,
               TRIM(CONCAT_WS(' ', u.first_name, u.last_name)) AS employee_name,
               u.email AS employee_email,
               s.month, s.year, s.base_pay, s.hra, s.insurance, s.incentives,
               s.days_present, s.days_half, s.days_on_leave, s.days_absent,
               s.per_day_rate, s.absence_deduction, s.net_salary, s.calculated_at
        FROM salaries s
        JOIN users u ON u.id = s.employee_id
        {}
        ORDER BY s.year DESC, s.month DESC, s.id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, SalaryListItem>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::U8(v) => data_q.bind(v),
            FilterValue::U16(v) => data_q.bind(v),
        };
    }
    let salaries = data_q
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(salaries, pagination, total)))
}

#[utoipa::path(
    get,
    path = "/api/salaries/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Salary records of the employee", body = [Salary]),
        (status = 403, description = "Not your records")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn employee_salaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_self_or_admin(employee_id)?;

    let salaries = salaries_of(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(salaries))
}

#[utoipa::path(
    get,
    path = "/api/salaries/my-records",
    responses(
        (status = 200, description = "Own payslips, newest first", body = [Salary]),
        (status = 403, description = "Employees only")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn my_salaries(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let salaries = salaries_of(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(salaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::role::Role, test_support};
    use actix_web::{ResponseError, http::StatusCode};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn pay_period_is_validated() {
        assert_eq!(pay_period_days(2, 2024).unwrap(), 29);
        assert_eq!(pay_period_days(2, 2026).unwrap(), 28);
        assert_eq!(pay_period_days(12, 2026).unwrap(), 31);
        assert!(pay_period_days(0, 2026).is_err());
        assert!(pay_period_days(13, 2026).is_err());
        assert!(pay_period_days(6, 1999).is_err());
        assert!(pay_period_days(6, 2101).is_err());
    }

    #[test]
    fn incentives_default_to_zero_and_cannot_be_negative() {
        assert_eq!(validate_incentives(None).unwrap(), 0.0);
        assert_eq!(validate_incentives(Some(250.5)).unwrap(), 250.5);
        assert!(validate_incentives(Some(-1.0)).is_err());
        assert!(validate_incentives(Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn generated_salary_for_a_month_with_absences() {
        // 30-day month, 2 absent, 2 half days, rest present or on leave.
        let days = pay_period_days(6, 2026).unwrap();
        let tally = AttendanceTally::from_counts(vec![
            ("present", 20_i64),
            ("on-leave", 4),
            ("absent", 2),
            ("half-day", 2),
        ]);
        let pay = PayComponents {
            base_pay: 30_000.0,
            hra: 5_000.0,
            insurance: 1_000.0,
            incentives: 0.0,
        };
        let breakdown = compute_pay(pay, tally, days);

        assert_eq!(breakdown.per_day_rate, 1_000.0);
        assert_eq!(breakdown.absence_deduction, 3_000.0);
        assert_eq!(breakdown.net_salary, 31_000.0);
    }

    async fn attend(
        pool: &MySqlPool,
        employee_id: u64,
        day: u32,
        status: &str,
        hours: Option<(u32, Option<u32>)>,
    ) {
        let at = |h: u32| NaiveTime::from_hms_opt(h, 0, 0);
        sqlx::query(
            "INSERT INTO attendance (employee_id, date, check_in, check_out, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(employee_id)
        .bind(NaiveDate::from_ymd_opt(2026, 1, day))
        .bind(hours.and_then(|(start, _)| at(start)))
        .bind(hours.and_then(|(_, end)| end).and_then(at))
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
    }

    #[actix_web::test]
    async fn generated_once_per_month_with_open_days_counted_absent() {
        let Some(pool) = test_support::database().await else {
            return;
        };
        let dept = test_support::department(&pool).await;
        let admin = test_support::user(&pool, Role::Admin, dept, "HR", 0).await;
        let employee = test_support::user(&pool, Role::Employee, dept, "Engineer", 10).await;
        let data = web::Data::new(pool.clone());

        sqlx::query(
            "INSERT INTO salary_structures (role, position, department_id, base_pay, hra, insurance) VALUES ('employee', 'Engineer', ?, 31000, 5000, 1000)",
        )
        .bind(dept)
        .execute(&pool)
        .await
        .unwrap();

        attend(&pool, employee.user_id, 5, "present", Some((9, Some(18)))).await;
        // Clocked in, never clocked out.
        attend(&pool, employee.user_id, 6, "present", Some((9, None))).await;
        attend(&pool, employee.user_id, 7, "absent", None).await;
        attend(&pool, employee.user_id, 8, "half-day", Some((9, Some(14)))).await;
        attend(&pool, employee.user_id, 9, "on-leave", None).await;

        let request = || {
            web::Json(GenerateSalary {
                employee_id: employee.user_id,
                month: 1,
                year: 2026,
                incentives: Some(500.0),
            })
        };

        let resp = generate_salary(admin.clone(), data.clone(), request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let salaries = salaries_of(&pool, employee.user_id).await.unwrap();
        assert_eq!(salaries.len(), 1);
        let salary = &salaries[0];
        assert_eq!(
            (salary.days_present, salary.days_absent, salary.days_half, salary.days_on_leave),
            (1, 2, 1, 1)
        );
        assert_eq!(salary.per_day_rate, 1_000.0);
        assert_eq!(salary.absence_deduction, 2_500.0);
        assert_eq!(salary.net_salary, 33_000.0);

        let err = generate_salary(admin, data, request()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(salaries_of(&pool, employee.user_id).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn missing_structure_is_not_found() {
        let Some(pool) = test_support::database().await else {
            return;
        };
        let dept = test_support::department(&pool).await;
        let admin = test_support::user(&pool, Role::Admin, dept, "HR", 0).await;
        let employee = test_support::user(&pool, Role::Employee, dept, "Designer", 10).await;

        let payload = web::Json(GenerateSalary {
            employee_id: employee.user_id,
            month: 2,
            year: 2026,
            incentives: None,
        });
        let err = generate_salary(admin, web::Data::new(pool), payload).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
