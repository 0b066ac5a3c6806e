use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::attendance::{Attendance, AttendanceStatus, status_for_worked_minutes, worked_minutes},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, status, notes";

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Month (1-12)
    pub month: Option<u32>,
    /// Year; defaults to the current year when only `month` is given
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogAttendance {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "absent")]
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Resolves the optional `month`/`year` filter.
fn period_filter(
    month: Option<u32>,
    year: Option<i32>,
    today: NaiveDate,
) -> Result<Option<(Option<u32>, i32)>, ApiError> {
    if let Some(m) = month {
        if !(1..=12).contains(&m) {
            return Err(ApiError::bad_request("month must be between 1 and 12"));
        }
    }
    Ok(match (month, year) {
        (None, None) => None,
        (month, year) => Some((month, year.unwrap_or(today.year()))),
    })
}

async fn fetch_day(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> ApiResult<Option<Attendance>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?");
    let record = sqlx::query_as::<_, Attendance>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

async fn list_records(
    pool: &MySqlPool,
    employee_id: u64,
    query: &AttendanceQuery,
) -> ApiResult<Vec<Attendance>> {
    let period = period_filter(query.month, query.year, Local::now().date_naive())?;

    let mut sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ?");
    if let Some((month, _)) = period {
        sql.push_str(" AND YEAR(date) = ?");
        if month.is_some() {
            sql.push_str(" AND MONTH(date) = ?");
        }
    }
    sql.push_str(" ORDER BY date DESC");

    let mut q = sqlx::query_as::<_, Attendance>(&sql).bind(employee_id);
    if let Some((month, year)) = period {
        q = q.bind(year);
        if let Some(month) = month {
            q = q.bind(month);
        }
    }

    Ok(q.fetch_all(pool).await?)
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clockin",
    responses(
        (status = 200, description = "Clocked in successfully", body = Attendance),
        (status = 400, description = "Already clocked in today", body = Object, example = json!({
            "message": "Already clocked in today"
        })),
        (status = 403, description = "Employees only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "clock_in", skip(pool), fields(employee_id = auth.user_id))]
pub async fn clock_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let now = Local::now();
    let today = now.date_naive();
    let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());

    match fetch_day(pool.get_ref(), auth.user_id, today).await? {
        Some(record) if record.check_in.is_some() => {
            return Err(ApiError::bad_request("Already clocked in today"));
        }
        Some(record) => {
            // An on-leave or admin-logged day becomes a worked day.
            sqlx::query("UPDATE attendance SET check_in = ?, check_out = NULL, status = ? WHERE id = ?")
                .bind(time)
                .bind(AttendanceStatus::Present.as_ref())
                .bind(record.id)
                .execute(pool.get_ref())
                .await?;
            info!(previous_status = %record.status, "Clock-in converted existing record");
        }
        None => {
            sqlx::query(
                "INSERT INTO attendance (employee_id, date, check_in, status) VALUES (?, ?, ?, ?)",
            )
            .bind(auth.user_id)
            .bind(today)
            .bind(time)
            .bind(AttendanceStatus::Present.as_ref())
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ApiError::bad_request("Already clocked in today")
                } else {
                    error!(error = %e, "Clock-in failed");
                    e.into()
                }
            })?;
        }
    }

    let record = fetch_day(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    info!("Clocked in");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Clocked in successfully",
        "attendance": record
    })))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clockout",
    responses(
        (status = 200, description = "Clocked out successfully", body = Attendance),
        (status = 400, description = "No open clock-in for today", body = Object, example = json!({
            "message": "No active clock-in found for today"
        })),
        (status = 403, description = "Employees only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "clock_out", skip(pool, config), fields(employee_id = auth.user_id))]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let now = Local::now();
    let today = now.date_naive();
    let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());

    let record = fetch_day(pool.get_ref(), auth.user_id, today)
        .await?
        .filter(|r| r.check_out.is_none())
        .ok_or_else(|| ApiError::bad_request("No active clock-in found for today"))?;
    let check_in = record
        .check_in
        .ok_or_else(|| ApiError::bad_request("No active clock-in found for today"))?;

    let minutes = worked_minutes(check_in, time);
    let status =
        status_for_worked_minutes(minutes, config.full_day_minutes, config.half_day_minutes);

    sqlx::query("UPDATE attendance SET check_out = ?, status = ? WHERE id = ?")
        .bind(time)
        .bind(status.as_ref())
        .bind(record.id)
        .execute(pool.get_ref())
        .await?;

    let record = fetch_day(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(minutes, status = %status, "Clocked out");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Clocked out successfully",
        "worked_minutes": minutes,
        "attendance": record
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/my-records",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Own attendance, newest first", body = [Attendance]),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let records = list_records(pool.get_ref(), auth.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/attendance/admin/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        AttendanceQuery
    ),
    responses(
        (status = 200, description = "Employee attendance, newest first", body = [Attendance]),
        (status = 404, description = "No attendance records for this employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn employee_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    let records = list_records(pool.get_ref(), employee_id, &query).await?;

    if records.is_empty() {
        return Err(ApiError::not_found("No attendance records found for this employee"));
    }

    Ok(HttpResponse::Ok().json(records))
}

/// Create or overwrite one employee's record for one day (admin)
#[utoipa::path(
    post,
    path = "/api/attendance/admin/log",
    request_body = LogAttendance,
    responses(
        (status = 200, description = "Attendance saved", body = Attendance),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn log_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LogAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(payload.employee_id)
        .fetch_one(pool.get_ref())
        .await?;
    if exists == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    let notes = payload
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, status, notes)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE status = VALUES(status), notes = VALUES(notes)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.date)
    .bind(payload.status.as_ref())
    .bind(notes)
    .execute(pool.get_ref())
    .await?;

    let record = fetch_day(pool.get_ref(), payload.employee_id, payload.date)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(
        employee_id = payload.employee_id,
        date = %payload.date,
        status = %payload.status,
        logged_by = auth.user_id,
        "Attendance logged"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance saved",
        "attendance": record
    })))
}
