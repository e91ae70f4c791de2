//! Structured logging schema, field name constants, and subscriber setup
//! for the ETL/RAG pipeline.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention (critical severity, §7) |
//! | WARN  | Recoverable issue, automatic fallback applied (retry, relaxed-mode downgrade) |
//! | INFO  | Lifecycle events (job started/completed), stage transitions |
//! | DEBUG | Decision points, intermediate values, category/intent scores |
//! | TRACE | Per-item iteration, high-volume data (search hits, chunk-by-chunk) |

use crate::config::LoggingConfig;

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "etl", "search", "db", "inference", "rag"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem, e.g. "orchestrator", "document_transformer",
/// "vector_search", "response_generator".
pub const COMPONENT: &str = "component";

/// Logical operation name, e.g. "transform_documents", "similarity_search".
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

pub const USER_ID: &str = "user_id";
pub const ANP_SEQ: &str = "anp_seq";
pub const JOB_ID: &str = "job_id";
pub const DOC_ID: &str = "doc_id";
pub const DOC_TYPE: &str = "doc_type";
pub const STAGE: &str = "stage";
pub const QUERY_NAME: &str = "query_name";
pub const QUESTION: &str = "question";

// ─── Measurement fields ────────────────────────────────────────────────────

pub const DURATION_MS: &str = "duration_ms";
pub const RESULT_COUNT: &str = "result_count";
pub const DOCUMENT_COUNT: &str = "document_count";
pub const INPUT_COUNT: &str = "input_count";
pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";
pub const RETRY_COUNT: &str = "retry_count";
pub const PROGRESS_PCT: &str = "progress_pct";

// ─── Search-specific fields ────────────────────────────────────────────────

pub const SIMILARITY_METRIC: &str = "similarity_metric";
pub const SEARCH_RANKING: &str = "ranking";
pub const SEARCH_THRESHOLD: &str = "threshold";
pub const CACHE_HIT: &str = "cache_hit";

// ─── Database fields ───────────────────────────────────────────────────────

pub const POOL_SIZE: &str = "pool_size";
pub const POOL_IDLE: &str = "pool_idle";
pub const DB_TABLE: &str = "db_table";

// ─── Inference fields ──────────────────────────────────────────────────────

pub const MODEL: &str = "model";
pub const RATE_LIMITED: &str = "rate_limited";

// ─── Outcome fields ────────────────────────────────────────────────────────

pub const SUCCESS: &str = "success";
pub const ERROR_MSG: &str = "error";
pub const ERROR_TYPE: &str = "error_type";
pub const SEVERITY: &str = "severity";
pub const SLOW: &str = "slow";

/// Initialize the global `tracing` subscriber from [`LoggingConfig`].
/// Call once at process start, before anything else logs.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if config.enable_structured_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
