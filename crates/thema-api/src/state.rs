use std::sync::Arc;

use thema_core::events::EventBus;
use thema_core::traits::{DocumentRepository, EmbeddingClient, JobStore};
use thema_etl::{ETLOrchestrator, PreferenceMetricsCollector};

/// Shared state handed to every handler. Cloning is cheap — everything
/// behind an `Arc`, mirroring `matric-api::AppState`'s shape.
#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub document_repo: Arc<dyn DocumentRepository>,
    pub embedding_client: Arc<dyn EmbeddingClient>,
    pub orchestrator: Arc<ETLOrchestrator>,
    pub event_bus: Arc<EventBus>,
    pub preference_metrics: Arc<PreferenceMetricsCollector>,
    pub rate_limiter: Option<Arc<super::GlobalRateLimiter>>,
}
