mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;
#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use crate::db::{
    cache::{LocalSnapshotCache, RedisSnapshotCache, SnapshotCache},
    db::DBClient,
    memorydb::MemoryReviewStore,
    reviewdb::ReviewExt,
};
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use service::{
    audit_service::{AuditService, AuditSigner, AuditSink, HttpAuditSink, LogAuditSink},
    jss_service::JssService,
    job_service_client::{ClientStatsProvider, JobServiceClient, UnconfiguredJobService},
    reply_service::ReplyService,
    reputation_service::ReputationService,
    review_service::ReviewService,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    // Services
    pub review_service: Arc<ReviewService>,
    pub reply_service: Arc<ReplyService>,
    pub reputation_service: Arc<ReputationService>,
    pub jss_service: Arc<JssService>,
}

impl AppState {
    pub fn build(
        config: Config,
        store: Arc<dyn ReviewExt>,
        audit_sink: Arc<dyn AuditSink>,
        job_service: Arc<dyn ClientStatsProvider>,
        snapshot_cache: Arc<dyn SnapshotCache>,
    ) -> Arc<Self> {
        let audit_service = Arc::new(AuditService::new(
            audit_sink,
            AuditSigner::new(config.audit_integrity_secret.clone()),
        ));
        let reputation_service = Arc::new(ReputationService::new(
            store.clone(),
            job_service,
            snapshot_cache,
            config.reputation_cache_ttl,
        ));
        let review_service = Arc::new(ReviewService::new(
            store.clone(),
            audit_service,
            reputation_service.clone(),
            config.review_submit_max_attempts,
        ));

        Arc::new(AppState {
            env: config,
            review_service,
            reply_service: Arc::new(ReplyService::new(store.clone())),
            reputation_service,
            jss_service: Arc::new(JssService::new(store)),
        })
    }
}

async fn review_store(config: &Config) -> anyhow::Result<Arc<dyn ReviewExt>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set - reviews are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryReviewStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to the database")?;
    tracing::info!("✅ Connection to the database is successful!");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(DBClient::new(pool)))
}

async fn snapshot_cache(config: &Config) -> Arc<dyn SnapshotCache> {
    let Some(redis_url) = &config.redis_url else {
        tracing::warn!("REDIS_URL not set - reputation cache is local to this replica");
        return Arc::new(LocalSnapshotCache::new());
    };

    match RedisSnapshotCache::connect(redis_url).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!("⚠️  Failed to connect to Redis: {}. Continuing with the local reputation cache.", e);
            Arc::new(LocalSnapshotCache::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::init()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO))
        .init();

    let store = review_store(&config).await?;
    let timeout = Duration::from_millis(config.upstream_timeout_ms);

    let audit_sink: Arc<dyn AuditSink> = match &config.audit_service_url {
        Some(url) => Arc::new(HttpAuditSink::new(url, timeout)?),
        None => {
            tracing::warn!("AUDIT_SERVICE_URL not set - audit events go to the log");
            Arc::new(LogAuditSink)
        }
    };

    let job_service: Arc<dyn ClientStatsProvider> = match &config.job_service_url {
        Some(url) => Arc::new(JobServiceClient::new(url, timeout)?),
        None => {
            tracing::warn!("JOB_SERVICE_URL not set - client reputation is served degraded");
            Arc::new(UnconfiguredJobService)
        }
    };

    let allowed_origins: Vec<HeaderValue> = [
        "http://localhost:5173",
        "http://localhost:8000",
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST]);

    let snapshot_cache = snapshot_cache(&config).await;

    let app_state = AppState::build(config.clone(), store, audit_sink, job_service, snapshot_cache);

    let app = create_router(app_state.clone()).layer(cors);

    // Start background jobs
    match config.forced_release_after {
        Some(release_after) => {
            let app_state_clone = app_state.clone();
            tokio::spawn(async move {
                service::background_jobs::start_forced_release_job(app_state_clone, release_after).await;
            });
            tracing::info!("Forced release enabled after {} days", release_after.num_days());
        }
        None => tracing::info!("Forced release disabled - one-sided reviews stay pending"),
    }

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .context("Failed to bind listener")?;

    axum::serve(listener, app).await?;

    Ok(())
}
