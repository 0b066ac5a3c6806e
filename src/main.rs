use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
#[cfg(test)]
mod test_support;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::utils::email_registry::registry;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HRMS API is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    let limiters = RateLimiters::from_config(&config)?;

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        // Recent logins (30 days) also go into the taken cache
        if let Err(e) = registry().warm_up(&pool_for_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warm up email registry");
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let config = config.clone();
        let limiters = limiters.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(move |cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
