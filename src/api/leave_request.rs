use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        attendance::AttendanceStatus,
        leave::{Leave, LeaveStatus, LeaveType, approved_days_this_year, dates_in_range, leave_days},
    },
    utils::pagination::{Page, Pagination},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlPool, prelude::FromRow};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, from_date, to_date, reason, status, \
     rejected_reason, approved_by, created_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyLeave {
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    #[schema(example = "Flu")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecideLeave {
    #[schema(example = "approved")]
    pub status: LeaveStatus,
    pub rejected_reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by leave status (pending, approved, rejected)
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveSummary {
    #[schema(example = 27)]
    pub available_leaves: i32,
    #[schema(example = 3)]
    pub approved_days: i32,
    #[schema(example = 1)]
    pub pending_requests: i64,
}

/// Leave row joined with the requesting employee, for the admin list.
#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveListItem {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "john@company.com")]
    pub employee_email: String,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub rejected_reason: Option<String>,
    pub approved_by: Option<u64>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// What an admin may set a pending leave to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn from_status(status: LeaveStatus) -> Result<Self, ApiError> {
        match status {
            LeaveStatus::Approved => Ok(Decision::Approve),
            LeaveStatus::Rejected => Ok(Decision::Reject),
            LeaveStatus::Pending => Err(ApiError::bad_request("Status must be approved or rejected")),
        }
    }
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

/// Day count of a new application, checked against the caller's balance.
fn requested_days(from: NaiveDate, to: NaiveDate, available: i32) -> Result<i32, ApiError> {
    if from > to {
        return Err(ApiError::bad_request("from_date cannot be after to_date"));
    }
    let days = leave_days(from, to);
    if days > available {
        return Err(ApiError::bad_request(format!(
            "Insufficient leave balance: requested {days} days, {available} available"
        )));
    }
    Ok(days)
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> ApiResult<Leave> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?");
    sqlx::query_as::<_, Leave>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

#[utoipa::path(
    post,
    path = "/api/leaves/apply",
    request_body(
        content = ApplyLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Leave),
        (status = 400, description = "Invalid range or insufficient balance"),
        (status = 403, description = "Employees only"),
        (status = 409, description = "Overlaps an existing pending or approved leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "apply_leave", skip(pool, payload), fields(employee_id = auth.user_id))]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let available =
        sqlx::query_scalar::<_, i32>("SELECT available_leaves FROM users WHERE id = ?")
            .bind(auth.user_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let days = requested_days(payload.from_date, payload.to_date, available)?;

    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM leaves
        WHERE employee_id = ?
          AND status IN ('pending', 'approved')
          AND from_date <= ?
          AND to_date >= ?
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.to_date)
    .bind(payload.from_date)
    .fetch_one(pool.get_ref())
    .await?;

    if overlapping > 0 {
        return Err(ApiError::conflict(
            "Leave overlaps an existing pending or approved request",
        ));
    }

    let reason = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO leaves (employee_id, leave_type, from_date, to_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    let leave = fetch_leave(pool.get_ref(), result.last_insert_id()).await?;

    info!(leave_id = leave.id, days, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "leave": leave
    })))
}

#[utoipa::path(
    get,
    path = "/api/leaves/my-requests",
    responses(
        (status = 200, description = "Own leave requests, newest first", body = [Leave]),
        (status = 403, description = "Employees only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves WHERE employee_id = ? ORDER BY created_at DESC, id DESC"
    );
    let leaves = sqlx::query_as::<_, Leave>(&sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leaves/my-summary",
    responses(
        (status = 200, description = "Balance and usage for the current year", body = LeaveSummary),
        (status = 403, description = "Employees only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leave_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;

    let today = Local::now().date_naive();

    let available_leaves =
        sqlx::query_scalar::<_, i32>("SELECT available_leaves FROM users WHERE id = ?")
            .bind(auth.user_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    let approved = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT from_date, to_date FROM leaves
        WHERE employee_id = ? AND status = ? AND YEAR(from_date) <= ? AND YEAR(to_date) >= ?
        "#,
    )
    .bind(auth.user_id)
    .bind(LeaveStatus::Approved.as_ref())
    .bind(today.year())
    .bind(today.year())
    .fetch_all(pool.get_ref())
    .await?;

    let pending_requests = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leaves WHERE employee_id = ? AND status = ?",
    )
    .bind(auth.user_id)
    .bind(LeaveStatus::Pending.as_ref())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(LeaveSummary {
        available_leaves,
        approved_days: approved_days_this_year(&approved, today),
        pending_requests,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list: { data: [LeaveListItem], page, per_page, total }"),
        (status = 400, description = "Unknown status filter"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let pagination = Pagination::new(query.page, query.per_page);

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND l.employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        let status = LeaveStatus::parse(status).ok_or_else(|| {
            ApiError::bad_request("Invalid status. Allowed: pending, approved, rejected")
        })?;
        where_sql.push_str(" AND l.status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leaves l{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.as_str()),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT l.id, l.employee_id,
               TRIM(CONCAT_WS(' ', u.first_name, u.last_name)) AS employee_name,
               u.email AS employee_email,
               l.leave_type, l.from_date, l.to_date, l.reason, l.status,
               l.rejected_reason, l.approved_by, l.created_at
        FROM leaves l
        JOIN users u ON u.id = l.employee_id
        {}
        ORDER BY l.created_at DESC, l.id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );
    debug!(page = pagination.page, per_page = pagination.per_page, "Fetching leave list");

    let mut data_q = sqlx::query_as::<_, LeaveListItem>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Page::new(leaves, pagination, total)))
}

/// Approve or reject a pending leave (admin)
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to decide")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "Leave decided", body = Leave),
        (status = 400, description = "Already processed or insufficient balance", body = Object, example = json!({
            "message": "Leave request already processed"
        })),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "decide_leave", skip(pool, path, payload), fields(admin_id = auth.user_id))]
pub async fn decide_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DecideLeave>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let leave_id = path.into_inner();
    let next = payload.status;
    let decision = Decision::from_status(next)?;

    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ? FOR UPDATE");
    let leave = sqlx::query_as::<_, Leave>(&sql)
        .bind(leave_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    let current = LeaveStatus::parse(&leave.status).ok_or(ApiError::Internal)?;
    if !current.can_transition_to(next) {
        return Err(ApiError::bad_request("Leave request already processed"));
    }

    match decision {
        Decision::Approve => {
            let days = leave_days(leave.from_date, leave.to_date);

            let available = sqlx::query_scalar::<_, i32>(
                "SELECT available_leaves FROM users WHERE id = ? FOR UPDATE",
            )
            .bind(leave.employee_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Employee not found"))?;

            if available < days {
                return Err(ApiError::bad_request(format!(
                    "Insufficient leave balance: requested {days} days, {available} available"
                )));
            }

            sqlx::query("UPDATE users SET available_leaves = available_leaves - ? WHERE id = ?")
                .bind(days)
                .bind(leave.employee_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE leaves SET status = ?, approved_by = ?, rejected_reason = NULL WHERE id = ?",
            )
            .bind(LeaveStatus::Approved.as_ref())
            .bind(auth.user_id)
            .bind(leave_id)
            .execute(&mut *tx)
            .await?;

            // Days that already have a record keep it.
            for date in dates_in_range(leave.from_date, leave.to_date) {
                sqlx::query(
                    "INSERT IGNORE INTO attendance (employee_id, date, status) VALUES (?, ?, ?)",
                )
                .bind(leave.employee_id)
                .bind(date)
                .bind(AttendanceStatus::OnLeave.as_ref())
                .execute(&mut *tx)
                .await?;
            }

            info!(leave_id, days, employee_id = leave.employee_id, "Leave approved");
        }
        Decision::Reject => {
            let reason = payload
                .rejected_reason
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());

            sqlx::query(
                "UPDATE leaves SET status = ?, approved_by = ?, rejected_reason = ? WHERE id = ?",
            )
            .bind(LeaveStatus::Rejected.as_ref())
            .bind(auth.user_id)
            .bind(reason)
            .bind(leave_id)
            .execute(&mut *tx)
            .await?;

            info!(leave_id, employee_id = leave.employee_id, "Leave rejected");
        }
    }

    tx.commit().await?;

    let leave = fetch_leave(pool.get_ref(), leave_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave {}", leave.status),
        "leave": leave
    })))
}

#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to delete")),
    responses(
        (status = 200, description = "Leave deleted; approved days are returned to the balance"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let leave_id = path.into_inner();
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ? FOR UPDATE");
    let leave = sqlx::query_as::<_, Leave>(&sql)
        .bind(leave_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    let mut restored = 0;
    if LeaveStatus::parse(&leave.status) == Some(LeaveStatus::Approved) {
        restored = leave_days(leave.from_date, leave.to_date);

        sqlx::query("UPDATE users SET available_leaves = available_leaves + ? WHERE id = ?")
            .bind(restored)
            .bind(leave.employee_id)
            .execute(&mut *tx)
            .await?;

        // Only rows the approval created: on-leave and never clocked in.
        sqlx::query(
            r#"
            DELETE FROM attendance
            WHERE employee_id = ? AND date BETWEEN ? AND ?
              AND status = ? AND check_in IS NULL
            "#,
        )
        .bind(leave.employee_id)
        .bind(leave.from_date)
        .bind(leave.to_date)
        .bind(AttendanceStatus::OnLeave.as_ref())
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM leaves WHERE id = ?")
        .bind(leave_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(leave_id, restored, deleted_by = auth.user_id, "Leave deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave deleted",
        "restored_days": restored
    })))
}
