use crate::{
    api::{attendance, department, employee, leave_request, payroll, profile, salary_structure, todo},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_config, path_config, query_config},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests/min"))?;
    Ok(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config());

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes. Literal segments are registered before `{id}`.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("/profile/me")
                            .route(web::get().to(profile::get_my_profile))
                            .route(web::put().to(profile::update_my_profile)),
                    )
                    .service(
                        web::resource("/profile/change-password")
                            .route(web::put().to(profile::change_password)),
                    )
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(department::update_department))
                            .route(web::delete().to(department::delete_department)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(web::resource("/apply").route(web::post().to(leave_request::apply_leave)))
                    .service(
                        web::resource("/my-requests").route(web::get().to(leave_request::my_leaves)),
                    )
                    .service(
                        web::resource("/my-summary")
                            .route(web::get().to(leave_request::my_leave_summary)),
                    )
                    .service(web::resource("").route(web::get().to(leave_request::leave_list)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(leave_request::decide_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("/clockin").route(web::post().to(attendance::clock_in)))
                    .service(web::resource("/clockout").route(web::post().to(attendance::clock_out)))
                    .service(
                        web::resource("/my-records").route(web::get().to(attendance::my_records)),
                    )
                    .service(
                        web::resource("/admin/employee/{id}")
                            .route(web::get().to(attendance::employee_records)),
                    )
                    .service(
                        web::resource("/admin/log").route(web::post().to(attendance::log_attendance)),
                    ),
            )
            .service(
                web::scope("/salary-structures")
                    .service(
                        web::resource("")
                            .route(web::post().to(salary_structure::create_structure))
                            .route(web::get().to(salary_structure::list_structures)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(salary_structure::update_structure))
                            .route(web::delete().to(salary_structure::delete_structure)),
                    ),
            )
            .service(
                web::scope("/salaries")
                    .service(web::resource("/my-records").route(web::get().to(payroll::my_salaries)))
                    .service(
                        web::resource("/employee/{id}")
                            .route(web::get().to(payroll::employee_salaries)),
                    )
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::generate_salary))
                            .route(web::get().to(payroll::list_salaries)),
                    ),
            )
            .service(
                web::scope("/todos")
                    .service(
                        web::resource("")
                            .route(web::get().to(todo::list_todos))
                            .route(web::post().to(todo::create_todo)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(todo::update_todo))
                            .route(web::delete().to(todo::delete_todo)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new access_token + refresh_token (old one revoked)
