use crate::auth::auth::AuthUser;
use crate::auth::jwt::{bearer_token, verify_token};
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use sqlx::MySqlPool;

fn reject(req: ServiceRequest, message: &str) -> Result<ServiceResponse<BoxBody>, Error> {
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    Ok(req.into_response(resp.map_into_boxed_body()))
}

/// Verifies the bearer access token, confirms the user still exists and
/// stores an `AuthUser` with the current role in request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => return reject(req, "Invalid Authorization header encoding"),
        },
        None => return reject(req, "No token or invalid token format. Authorization denied."),
    };

    let Some(token) = bearer_token(&header_value) else {
        return reject(req, "No token or invalid token format. Authorization denied.");
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return reject(req, "Token is not valid.");
        }
    };

    if claims.token_type != TokenType::Access {
        return reject(req, "Access token required.");
    }

    let pool = req
        .app_data::<Data<MySqlPool>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Database pool missing"))?;

    // Role is re-read so demotions and deletions apply without waiting for expiry.
    let stored_role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = claims.user_id, "Failed to load user in auth middleware");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let role = match stored_role.as_deref().map(Role::parse) {
        Some(Some(role)) => role,
        Some(None) => return reject(req, "Invalid role"),
        None => return reject(req, "User not found. Authorization denied."),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/unused".into()),
            "JWT_SECRET" => Some("middleware-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    async fn status_for(header: Option<String>) -> StatusCode {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
                ),
        )
        .await;

        let mut req = test::TestRequest::get().uri("/api/ping");
        if let Some(h) = header {
            req = req.insert_header(("Authorization", h));
        }
        test::call_service(&app, req.to_request()).await.status()
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(status_for(None).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn non_bearer_header_is_unauthorized() {
        assert_eq!(
            status_for(Some("Basic dXNlcjpwYXNz".into())).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        assert_eq!(
            status_for(Some("Bearer not.a.jwt".into())).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn token_signed_with_other_secret_is_unauthorized() {
        let token = generate_access_token(1, "a@b.co", Role::Admin, "other", 900).unwrap();
        assert_eq!(
            status_for(Some(format!("Bearer {token}"))).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn refresh_token_cannot_access_api() {
        let (token, _) =
            generate_refresh_token(1, "a@b.co", Role::Admin, "middleware-secret", 900).unwrap();
        assert_eq!(
            status_for(Some(format!("Bearer {token}"))).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
