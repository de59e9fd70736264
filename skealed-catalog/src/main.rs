use axum::{extract::DefaultBodyLimit, middleware, routing::{delete, get, post}, Router};
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
use skealed_shared::clients::db;
use skealed_shared::clients::rabbitmq::RabbitMQClient;
use skealed_shared::clients::redis::RedisClient;
use skealed_shared::clients::storage::{ObjectStore, StorageSettings};

pub use skealed_shared::clients::db::DbPool;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub avatars: ObjectStore,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    skealed_shared::middleware::init_tracing("skealed-catalog");
    let metrics_handle = skealed_shared::middleware::init_metrics("skealed-catalog")?;

    let config = AppConfig::load()?;
    let port = config.port;
    // Multipart framing on top of the image itself.
    let upload_limit = config.avatar_max_bytes + 64 * 1024;

    let db = db::create_pool(&config.database_url)?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url, "skealed-catalog").await?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let avatars = ObjectStore::connect(StorageSettings {
        endpoint: &config.minio_endpoint,
        access_key: &config.minio_access_key,
        secret_key: &config.minio_secret_key,
        bucket: &config.avatar_bucket,
        public_url: &config.minio_public_url,
    })
    .await;

    let state = Arc::new(AppState { db, config, rabbitmq, redis, avatars, metrics_handle });

    let sub_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_user_registered(sub_state).await {
            tracing::error!(error = %e, "user.registered subscriber failed");
        }
    });

    let sub_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_user_deleted(sub_state).await {
            tracing::error!(error = %e, "user.deleted subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/home", get(routes::home::home))
        .route("/categories/:slug", get(routes::categories::category_page))
        .route("/skills", get(routes::skills::list_skills))
        // One parameter name per segment; GET reads it as the slug.
        .route("/skills/:id", get(routes::skills::get_skill))
        .route("/skills/:id/vote", post(routes::skills::vote_skill))
        .route("/skills/:id/favorite", post(routes::skills::toggle_favorite).delete(routes::skills::remove_favorite))
        .route("/ideas", get(routes::ideas::list_ideas).post(routes::ideas::create_idea))
        .route("/ideas/:id", delete(routes::ideas::delete_idea))
        .route("/ideas/:id/vote", post(routes::ideas::vote_idea))
        .route("/vault", get(routes::vault::get_vault))
        .route("/vault/favorites/:skill_id", delete(routes::vault::remove_saved_skill))
        .route("/vault/activity", delete(routes::vault::wipe_activity))
        .route("/profile", get(routes::profile::get_profile))
        .route("/profile/avatar", post(routes::profile::upload_avatar)
            .layer(DefaultBodyLimit::max(upload_limit)))
        .route("/drills/:slug", get(routes::drills::get_drill))
        .route("/drills/:slug/attempts", post(routes::drills::submit_attempt))
        .layer(middleware::from_fn(skealed_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "skealed-catalog starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
