use crate::{
    api::employee::fetch_profile,
    auth::{
        auth::AuthUser,
        handlers::revoke_all_sessions,
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    model::user::MIN_PASSWORD_LEN,
    utils::db_utils::{Column, ColumnKind, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Fields an employee may change on their own profile.
const SELF_SERVICE_COLUMNS: &[Column] = &[
    Column::new("first_name", ColumnKind::Text),
    Column::new("last_name", ColumnKind::NullableText),
    Column::new("profile_image_path", ColumnKind::NullableText),
    Column::new("passport_number", ColumnKind::NullableText),
];

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordReq {
    fn validate(&self) -> Result<(), ApiError> {
        if self.current_password.is_empty() || self.new_password.is_empty() {
            return Err(ApiError::bad_request(
                "Please provide current_password and new_password.",
            ));
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/api/employees/profile/me",
    responses(
        (status = 200, description = "Own profile", body = UserProfile),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn get_my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let profile = fetch_profile(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    put,
    path = "/api/employees/profile/me",
    request_body(
        content = Object,
        description = "Any of first_name, last_name, profile_image_path, passport_number",
        example = json!({ "first_name": "Jane", "passport_number": "X1234567" })
    ),
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 400, description = "Field not editable or invalid")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn update_my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let (update, _) =
        build_update_sql("users", &body, SELF_SERVICE_COLUMNS, "id", auth.user_id)?;
    execute_update(pool.get_ref(), update).await?;

    let profile = fetch_profile(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    info!(user_id = auth.user_id, "Profile updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "profile": profile
    })))
}

#[utoipa::path(
    put,
    path = "/api/employees/profile/change-password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed; all sessions revoked"),
        (status = 400, description = "Current password wrong or new password too short")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
#[instrument(name = "change_password", skip(pool, payload), fields(user_id = auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;

    let stored = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    if verify_password(&payload.current_password, &stored).is_err() {
        info!("Current password mismatch");
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    let hashed = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    revoke_all_sessions(auth.user_id, pool.get_ref()).await?;

    info!(email = %auth.email, "Password changed");

    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_password_requires_both_fields() {
        let req = ChangePasswordReq {
            current_password: String::new(),
            new_password: "longenough".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn new_password_must_be_long_enough() {
        let req = ChangePasswordReq {
            current_password: "old-password".into(),
            new_password: "short".into(),
        };
        assert!(req.validate().is_err());

        let req = ChangePasswordReq {
            current_password: "old-password".into(),
            new_password: "long-enough".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn self_service_cannot_touch_role_or_balance() {
        for field in ["role", "available_leaves", "email", "password", "department_id"] {
            let payload = json!({ field: "x" });
            assert!(
                build_update_sql("users", &payload, SELF_SERVICE_COLUMNS, "id", 1).is_err(),
                "{field} must not be self-editable"
            );
        }
    }
}
