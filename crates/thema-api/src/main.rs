//! HTTP entrypoint: axum app wiring, tower-http middleware stack, server
//! startup. Grounded on `matric-api::main`'s structure (tracing init,
//! env-driven config, governor rate limiting, request-id propagation)
//! with every note-taking-domain concern (auth, archives, OAuth, file
//! storage) dropped — this binary serves only §6's ETL and preference
//! monitoring endpoints.

mod handlers;
mod sse;
mod state;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use governor::{Quota, RateLimiter};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use thema_core::events::EventBus;
use thema_db::Database;
use thema_etl::ETLOrchestrator;
use thema_inference::{GoogleEmbeddingBackend, MockEmbeddingBackend};

use state::AppState;

pub type GlobalRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Assigns every inbound request a UUIDv7 request id unless one was
/// already supplied by an upstream proxy.
#[derive(Clone)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

fn init_tracing() {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("thema_api=debug,thema_etl=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Ok(log_file) = std::env::var("LOG_FILE") {
        let dir = std::path::Path::new(&log_file).parent().unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(&log_file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("thema-api.log");
        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        std::mem::forget(guard);
        let ansi = std::env::var("LOG_ANSI").map(|v| v == "true").unwrap_or(false);
        if format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking).with_ansi(ansi)).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(ansi)).init();
        }
    } else if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn parse_allowed_origins() -> Vec<HeaderValue> {
    std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let job_store = Arc::new(db.jobs());
    let document_repo = Arc::new(db.documents());

    let embedding_client: Arc<dyn thema_core::traits::EmbeddingClient> =
        match std::env::var("GOOGLE_API_KEY").or_else(|_| std::env::var("GEMINI_API_KEY")) {
            Ok(api_key) => Arc::new(GoogleEmbeddingBackend::new(api_key)),
            Err(_) => {
                tracing::warn!("no GOOGLE_API_KEY/GEMINI_API_KEY set, using mock embedding backend");
                Arc::new(MockEmbeddingBackend::new())
            }
        };

    let event_bus_capacity: usize =
        std::env::var("EVENT_BUS_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(256);
    let event_bus = Arc::new(EventBus::new(event_bus_capacity));

    let metrics_registry: Arc<dyn thema_core::traits::MetricsRegistry> =
        Arc::new(thema_core::metrics::InProcessMetrics::new());
    let preference_metrics = Arc::new(thema_etl::PreferenceMetricsCollector::new(metrics_registry.clone()));

    let validation_level = match std::env::var("ETL_VALIDATION_LEVEL").as_deref() {
        Ok("basic") => thema_etl::ValidationLevel::Basic,
        Ok("strict") => thema_etl::ValidationLevel::Strict,
        _ => thema_etl::ValidationLevel::Standard,
    };
    let orchestrator_config = thema_etl::OrchestratorConfig {
        validation_level,
        max_retries_per_stage: std::env::var("ETL_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(thema_core::defaults::ETL_MAX_RETRIES_PER_STAGE),
        enable_rollback: std::env::var("ETL_ENABLE_ROLLBACK").map(|v| v != "false" && v != "0").unwrap_or(true),
        allow_partial_completion: std::env::var("ETL_ENABLE_PARTIAL_COMPLETION")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true),
    };

    let orchestrator = Arc::new(
        ETLOrchestrator::new(
            db.pool().clone(),
            job_store.clone() as Arc<dyn thema_core::traits::JobStore>,
            document_repo.clone() as Arc<dyn thema_core::traits::DocumentRepository>,
            embedding_client.clone(),
            event_bus.clone(),
        )
        .with_config(orchestrator_config)
        .with_preference_metrics(preference_metrics.clone()),
    );

    let rate_limit_enabled =
        std::env::var("RATE_LIMIT_ENABLED").map(|v| v == "true" || v == "1").unwrap_or(true);
    let rate_limiter = if rate_limit_enabled {
        let requests: u32 = std::env::var("RATE_LIMIT_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(100);
        let period: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60);
        let quota = Quota::with_period(Duration::from_secs(period))
            .expect("rate limit period must be nonzero")
            .allow_burst(NonZeroU32::new(requests).expect("rate limit requests must be nonzero"));
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let max_body_size: usize =
        std::env::var("MAX_REQUEST_BODY_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(1024 * 1024);

    let state = AppState {
        job_store,
        document_repo,
        embedding_client,
        orchestrator,
        event_bus,
        preference_metrics,
        rate_limiter,
    };

    let app = Router::new()
        .route("/api/etl/test-completion", post(handlers::etl::test_completion))
        .route("/api/etl/jobs/:job_id/status", get(handlers::etl::job_status))
        .route("/api/etl/jobs/:job_id/progress", get(handlers::etl::job_progress))
        .route("/api/etl/users/:user_id/jobs", get(handlers::etl::user_jobs))
        .route("/api/etl/jobs/:job_id/cancel", post(handlers::etl::cancel_job))
        .route("/api/etl/jobs/:job_id/retry", post(handlers::etl::retry_job))
        .route("/api/etl/users/:user_id/reprocess", post(handlers::etl::reprocess_user))
        .route("/api/etl/health", get(handlers::etl::etl_health))
        .route("/api/etl/stats", get(handlers::etl::etl_stats))
        .route("/api/monitoring/preference/metrics/summary", get(handlers::monitoring::metrics_summary))
        .route(
            "/api/monitoring/preference/metrics/query-success-rates",
            get(handlers::monitoring::query_success_rates),
        )
        .route(
            "/api/monitoring/preference/metrics/document-creation",
            get(handlers::monitoring::document_creation_metrics),
        )
        .route("/api/monitoring/preference/alerts", get(handlers::monitoring::alerts))
        .route("/api/monitoring/preference/user-impact", get(handlers::monitoring::user_impact))
        .route("/api/monitoring/preference/alert-rules", get(handlers::monitoring::alert_rules))
        .route(
            "/api/monitoring/preference/alert-rules/:rule_name/toggle",
            post(handlers::monitoring::toggle_alert_rule),
        )
        .route("/api/monitoring/preference/check-alerts", post(handlers::monitoring::check_alerts))
        .layer(axum::middleware::from_fn_with_state(state.clone(), handlers::rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "thema-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
