//! # Herbarium API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use herbarium_core::domain::{ContentSecurityPolicy, CorsPolicy};

mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use background::Sweeper;
use config::AppConfig;
use middleware::{ApiVersion, RateLimitMiddleware, SecurityHeaders};
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    telemetry::init_telemetry(&TelemetryConfig::from_env())
        .context("Failed to install tracing subscriber")?;

    // Load configuration
    let config = AppConfig::from_env();
    let policies = config::policy_table().context("Invalid rate-limit policy table")?;

    tracing::info!(
        environment = ?config.environment,
        "Starting Herbarium API Server on {}:{}",
        config.host,
        config.port
    );

    // Build application state
    let state = AppState::new(&config, policies);
    let sweeper = Sweeper::start(state.counters.local().clone(), &config.rate_limit.sweep_cron)
        .await
        .context("Failed to start counter sweep")?;

    let cors = CorsPolicy::for_environment(config.environment, config.cors.origins());
    let connect_src: Vec<&str> = config.cors.site_url.iter().map(String::as_str).collect();
    let security = SecurityHeaders::new(cors, &ContentSecurityPolicy::strict(&connect_src))
        .context("SITE_URL produced an invalid Content-Security-Policy")?;
    let rate_limit = RateLimitMiddleware::new(state.admission.clone(), state.alerts.clone());

    // Start HTTP server; the last `wrap` runs first
    HttpServer::new(move || {
        App::new()
            .wrap(rate_limit.clone())
            .wrap(ApiVersion)
            .wrap(security.clone())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
            .default_service(web::to(middleware::error::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    sweeper.shutdown().await;
    Ok(())
}
