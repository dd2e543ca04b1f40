//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::access::AccessControlGate;
use crate::config::ServiceConfig;
use crate::fanout::InProcEventBus;
use crate::ingest::IngestionPipeline;
use crate::moderation::ModerationWorkflow;
use crate::repositories::{SessionRepository, photo::PhotoRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub session_repository: SessionRepository,
    pub photo_repository: PhotoRepository,
    pub gate: AccessControlGate,
    pub pipeline: Arc<IngestionPipeline>,
    pub moderation: Arc<ModerationWorkflow>,
    pub bus: Arc<InProcEventBus>,
    pub config: Arc<ServiceConfig>,
}
