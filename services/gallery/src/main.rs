use anyhow::Result;
use aws_config::BehaviorVersion;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod access;
mod config;
mod error;
mod fanout;
mod gateway;
mod ingest;
mod middleware;
mod models;
mod moderation;
mod repositories;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use common::database::{DatabaseConfig, init_pool};

use crate::{
    access::AccessControlGate,
    config::ServiceConfig,
    fanout::InProcEventBus,
    ingest::{IngestionPipeline, watermark::WatermarkFont},
    moderation::ModerationWorkflow,
    repositories::{SessionRepository, access_log::AccessLogRepository, photo::PhotoRepository},
    state::AppState,
    storage::S3ObjectStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting gallery service");

    let config = ServiceConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize AWS S3 client
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let store = Arc::new(S3ObjectStore::new(s3_client, &config.storage));

    let watermark_font = match &config.upload.watermark_font_path {
        Some(path) => {
            let font = WatermarkFont::load(path)?;
            info!("Watermark font loaded from {}", path.display());
            Some(Arc::new(font))
        }
        None => None,
    };

    // Initialize repositories
    let session_repository = SessionRepository::new(pool.clone());
    let photo_repository = PhotoRepository::new(pool.clone());
    let access_log_repository = AccessLogRepository::new(pool.clone());

    let gate = AccessControlGate::new(Arc::new(access_log_repository));
    let bus = Arc::new(InProcEventBus::new(256));

    let photos: Arc<dyn gateway::PhotoGateway> = Arc::new(photo_repository.clone());
    let pipeline = Arc::new(IngestionPipeline::new(
        photos.clone(),
        store.clone(),
        bus.clone(),
        config.storage.prefix.clone(),
        config.upload.spool_dir.clone(),
        config.upload.webp_enabled,
        watermark_font,
    ));
    let moderation = Arc::new(ModerationWorkflow::new(
        photos,
        store,
        bus.clone(),
        config.storage.prefix.clone(),
    ));

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        db_pool: pool,
        session_repository,
        photo_repository,
        gate,
        pipeline,
        moderation,
        bus,
        config: Arc::new(config),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gallery service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
