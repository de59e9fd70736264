use axum::{middleware, routing::{delete, get, post}, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod models;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use services::session_bus::SessionBus;
use skealed_shared::clients::db::{self, DbPool};
use skealed_shared::clients::email::EmailClient;
use skealed_shared::clients::rabbitmq::RabbitMQClient;
use skealed_shared::clients::redis::RedisClient;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub email: EmailClient,
    pub sessions: SessionBus,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    skealed_shared::middleware::init_tracing("skealed-auth");
    let metrics_handle = skealed_shared::middleware::init_metrics("skealed-auth")?;

    let config = AppConfig::load()?;
    let port = config.port;

    let db = db::create_pool(&config.database_url)?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url, "skealed-auth").await?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let email = EmailClient::new(&config.resend_api_key, &config.from_email, "Skealed");

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        email,
        sessions: SessionBus::new(),
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/magic-link", post(routes::magic_link::request_magic_link))
        .route("/verify", post(routes::verify::verify_magic_link))
        .route("/refresh", post(routes::refresh::refresh_token))
        .route("/logout", post(routes::logout::logout))
        .route("/me", get(routes::me::me))
        .route("/account", delete(routes::account::delete_account))
        .route("/session/events", get(routes::session_events::session_events))
        .layer(middleware::from_fn(skealed_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "skealed-auth starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
