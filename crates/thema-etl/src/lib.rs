//! # thema-etl
//!
//! The Data Validator (§4.E), Document Transformer (§4.F), and ETL
//! Orchestrator (§4.L) that turn a legacy `anp_seq` into embedded,
//! stored documents.

pub mod notify;
pub mod orchestrator;
pub mod preference_metrics;
pub mod transform;
pub mod validate;

pub use notify::{AdminNotifier, CriticalFailureNotification, RecordingAdminNotifier, TracingAdminNotifier};
pub use orchestrator::{ETLCheckpoint, ETLOrchestrator, ETLStage, OrchestratorConfig};
pub use preference_metrics::{
    generate_user_impact_report, AlertRuleKind, AlertSeverity, DocumentCreationRates, MetricsSummary,
    PreferenceAlert, PreferenceMetricsCollector, PreferenceQueryType, UserImpactReport,
};
pub use transform::DocumentTransformer;
pub use validate::{
    validate_embeddings, validate_query_results, validate_transformed_documents,
    DocumentValidationReport, EmbeddingValidationReport, QueryValidationReport, ValidationLevel,
};
