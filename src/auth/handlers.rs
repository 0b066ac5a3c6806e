use crate::{
    auth::{
        jwt::{bearer_token, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::{
        role::Role,
        user::{UserCredentials, full_name, normalize_email},
    },
    models::{AuthResponse, LoginReqDto, NewUserReq, TokenPair, TokenType, UserSummary},
    utils::email_registry::{Lookup, registry},
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Local;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> ApiResult<bool> {
    let email = normalize_email(email);

    match registry().lookup(&email) {
        Lookup::Free => return Ok(true),
        Lookup::Taken => return Ok(false),
        Lookup::Unknown => {}
    }

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        registry().confirm_taken(&email).await;
        return Ok(false);
    }

    Ok(true)
}

/// Validates and inserts a user row, keeping the email registry in sync.
/// Returns the new user id.
pub async fn insert_user(
    payload: &NewUserReq,
    role: Role,
    pool: &MySqlPool,
    config: &Config,
) -> ApiResult<u64> {
    payload.validate()?;

    let email = normalize_email(&payload.email);

    let department_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments WHERE id = ?")
            .bind(payload.department_id)
            .fetch_one(pool)
            .await?;
    if department_exists == 0 {
        return Err(ApiError::bad_request("Department does not exist"));
    }

    if !is_email_available(&email, pool).await? {
        return Err(ApiError::conflict("User with that email already exists."));
    }

    let hashed = hash_password(&payload.password)?;
    let date_of_joining = payload
        .date_of_joining
        .unwrap_or_else(|| Local::now().date_naive());

    let result = sqlx::query(
        r#"
        INSERT INTO users
            (employee_code, first_name, last_name, email, password, role, department_id,
             position, experience, date_of_joining, available_leaves, passport_number)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.as_deref().map(str::trim))
    .bind(&email)
    .bind(&hashed)
    .bind(role.as_ref())
    .bind(payload.department_id)
    .bind(payload.position.as_deref().map(str::trim))
    .bind(payload.experience.unwrap_or(0))
    .bind(date_of_joining)
    .bind(config.default_leave_balance)
    .bind(payload.passport_number.as_deref().map(str::trim))
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            registry().claim(&email).await;
            Ok(done.last_insert_id())
        }
        Err(e) if is_constraint_violation(&e) => Err(ApiError::conflict(
            "User with that email or employee code already exists.",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Issues an access/refresh pair and stores the refresh `jti`.
async fn issue_session(
    user_id: u64,
    email: &str,
    role: Role,
    pool: &MySqlPool,
    config: &Config,
) -> ApiResult<TokenPair> {
    let access_token = generate_access_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// User registration handler
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = NewUserReq,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Admin self-registration is closed"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(payload, pool, config), fields(email = %payload.email))]
pub async fn register(
    payload: web::Json<NewUserReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let role = payload.role.unwrap_or_default();

    // Admin self-registration only bootstraps the first admin.
    if role == Role::Admin {
        let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(Role::Admin.as_ref())
            .fetch_one(pool.get_ref())
            .await?;
        if admins > 0 {
            info!("Rejected admin self-registration");
            return Err(ApiError::forbidden("Admin accounts are created by an admin"));
        }
    }

    let user_id = insert_user(&payload, role, pool.get_ref(), &config).await?;
    let email = normalize_email(&payload.email);
    let tokens = issue_session(user_id, &email, role, pool.get_ref(), &config).await?;

    info!(user_id, "User registered");

    Ok(HttpResponse::Created().json(AuthResponse {
        message: "User registered successfully".into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: UserSummary {
            id: user_id,
            full_name: full_name(&payload.first_name, payload.last_name.as_deref()),
            email,
            role,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::bad_request("Please provide email and password."));
    }

    let email = normalize_email(&user.email);

    let db_user = sqlx::query_as::<_, UserCredentials>(
        r#"
        SELECT id, first_name, last_name, email, password, role
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        ApiError::unauthorized("Invalid credentials")
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let role = Role::parse(&db_user.role).ok_or_else(|| {
        error!(user_id = db_user.id, role = %db_user.role, "Stored role is invalid");
        ApiError::Internal
    })?;

    let tokens = issue_session(db_user.id, &db_user.email, role, pool.get_ref(), &config).await?;

    // Not fatal: the login already succeeded.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }
    registry().confirm_taken(&db_user.email).await;

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login successful".into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: UserSummary {
            id: db_user.id,
            full_name: full_name(&db_user.first_name, db_user.last_name.as_deref()),
            email: db_user.email,
            role,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("No token"))?;

    let token = bearer_token(header).ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Refresh token required"));
    }

    // Revoke the presented token; zero rows means unknown or already used.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0 AND expires_at > NOW()",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        return Err(ApiError::unauthorized("Refresh token revoked or expired"));
    }

    // Role may have changed since the token was issued.
    let stored_role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    let role =
        Role::parse(&stored_role).ok_or_else(|| ApiError::unauthorized("Invalid role"))?;

    let tokens = issue_session(claims.user_id, &claims.sub, role, pool.get_ref(), &config).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Refresh token revoked (idempotent)")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
    else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

/// Revokes every refresh token a user holds (password change, deletion).
pub async fn revoke_all_sessions(user_id: u64, pool: &MySqlPool) -> ApiResult<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
