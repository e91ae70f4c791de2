//! ETL job-control endpoints (§6). Grounded on `matric-api::handlers::jobs`
//! for the extract-id/look-up-or-404 handler shape, driving
//! `thema_etl::ETLOrchestrator` instead of the note-taking job queue.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use thema_core::models::{Job, JobStatus};

use crate::handlers::error_response;
use crate::sse::job_progress_stream;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TestCompletionRequest {
    pub user_id: Option<String>,
    pub anp_seq: i64,
    pub test_type: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notification_source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestCompletionResponse {
    pub job_id: Uuid,
    pub task_id: Uuid,
    pub status: JobStatus,
    pub message: String,
    pub estimated_completion_time: DateTime<Utc>,
    pub progress_url: String,
}

/// `POST /api/etl/test-completion` — creates the job row synchronously
/// (so `job_id` can be returned immediately) and drives the seven-stage
/// pipeline in a background task.
pub async fn test_completion(
    State(state): State<AppState>,
    Json(req): Json<TestCompletionRequest>,
) -> Response {
    if req.anp_seq <= 0 {
        return error_response(StatusCode::BAD_REQUEST, "anp_seq must be positive");
    }

    let job = match state.orchestrator.create_job(req.anp_seq).await {
        Ok(job) => job,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    tracing::info!(
        job_id = %job.id,
        anp_seq = req.anp_seq,
        test_type = req.test_type.as_deref().unwrap_or(""),
        notification_source = req.notification_source.as_deref().unwrap_or(""),
        "test-completion event accepted"
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let job_id = job.id;
    let user_id = job.user_id;
    let anp_seq = req.anp_seq;
    tokio::spawn(async move {
        orchestrator.run_job(job_id, user_id, anp_seq).await;
    });

    let body = TestCompletionResponse {
        job_id: job.id,
        task_id: job.id,
        status: job.status,
        message: "ETL processing started".to_string(),
        estimated_completion_time: Utc::now() + chrono::Duration::minutes(5),
        progress_url: format!("/api/etl/jobs/{}/progress", job.id),
    };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

/// `GET /api/etl/jobs/{job_id}/status`
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match state.job_store.get_job(job_id).await {
        Ok(Some(job)) => Json(job_to_summary(&job)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("job {job_id} not found")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub anp_seq: i64,
    pub status: JobStatus,
    pub progress_percentage: i16,
    pub current_step: i16,
    pub completed_steps: i16,
    pub total_steps: i16,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub failed_stage: Option<String>,
    pub retry_count: i32,
    pub query_results_summary: Option<serde_json::Value>,
    pub documents_created: Vec<String>,
}

fn job_to_summary(job: &Job) -> JobSummary {
    JobSummary {
        job_id: job.id,
        user_id: job.user_id,
        anp_seq: job.anp_seq,
        status: job.status,
        progress_percentage: job.progress_pct,
        current_step: job.current_step,
        completed_steps: job.completed_steps,
        total_steps: job.total_steps,
        started_at: job.started_at,
        updated_at: job.updated_at,
        completed_at: job.completed_at,
        error_message: job.error_message.clone(),
        error_type: job.error_type.clone(),
        failed_stage: job.failed_stage.clone(),
        retry_count: job.retry_count,
        query_results_summary: job.query_results_summary.clone(),
        documents_created: job.documents_created.clone(),
    }
}

/// `GET /api/etl/jobs/{job_id}/progress` — SSE stream, one event per
/// status change, closing once the job reaches a terminal status.
pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    Sse::new(job_progress_stream(state.event_bus.subscribe(), job_id)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct UserJobsQuery {
    pub limit: Option<i64>,
}

/// `GET /api/etl/users/{user_id}/jobs?limit=1..100`
pub async fn user_jobs(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<UserJobsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    match state.job_store.list_jobs_for_user(user_id, limit).await {
        Ok(jobs) => Json(jobs.iter().map(job_to_summary).collect::<Vec<_>>()).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `POST /api/etl/jobs/{job_id}/cancel` — only non-terminal jobs can be
/// cancelled; a job already in a terminal status returns 400.
pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    let job = match state.job_store.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, format!("job {job_id} not found")),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if job.status.is_terminal() {
        return error_response(StatusCode::BAD_REQUEST, format!("job {job_id} already in terminal status"));
    }

    let update = thema_core::traits::JobUpdate {
        status: Some(JobStatus::Failure),
        error_message: Some("cancelled by user".to_string()),
        completed_at: Some(Utc::now()),
        ..Default::default()
    };
    match state.job_store.update_job(job_id, update).await {
        Ok(job) => {
            state.event_bus.emit(thema_core::events::JobEvent::Completed {
                job_id,
                status: job.status,
                error_message: job.error_message.clone(),
            });
            Json(job_to_summary(&job)).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `POST /api/etl/jobs/{job_id}/retry` — only a failed or partial job can
/// be retried; re-runs the same `anp_seq` as a fresh job.
pub async fn retry_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    let job = match state.job_store.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, format!("job {job_id} not found")),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if !matches!(job.status, JobStatus::Failure | JobStatus::Partial) {
        return error_response(StatusCode::BAD_REQUEST, format!("job {job_id} is not retryable from {:?}", job.status));
    }

    let new_job = match state.orchestrator.create_job(job.anp_seq).await {
        Ok(job) => job,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    let new_job_id = new_job.id;
    let user_id = new_job.user_id;
    let anp_seq = job.anp_seq;
    tokio::spawn(async move {
        orchestrator.run_job(new_job_id, user_id, anp_seq).await;
    });

    (StatusCode::ACCEPTED, Json(job_to_summary(&new_job))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ReprocessQuery {
    pub anp_seq: i64,
    #[serde(default)]
    pub force: bool,
}

/// `POST /api/etl/users/{user_id}/reprocess?anp_seq=...&force=bool`
pub async fn reprocess_user(
    State(state): State<AppState>,
    Path(_user_id): Path<Uuid>,
    Query(query): Query<ReprocessQuery>,
) -> Response {
    if query.anp_seq <= 0 {
        return error_response(StatusCode::BAD_REQUEST, "anp_seq must be positive");
    }
    if !query.force {
        let existing = state.job_store.list_jobs_for_user(_user_id, 1).await.unwrap_or_default();
        if existing.iter().any(|j| j.status == JobStatus::Success) {
            return error_response(
                StatusCode::BAD_REQUEST,
                "user already has a successful job; pass force=true to reprocess",
            );
        }
    }

    let job = match state.orchestrator.create_job(query.anp_seq).await {
        Ok(job) => job,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    let job_id = job.id;
    let user_id = job.user_id;
    let anp_seq = query.anp_seq;
    tokio::spawn(async move {
        orchestrator.run_job(job_id, user_id, anp_seq).await;
    });

    (StatusCode::ACCEPTED, Json(job_to_summary(&job))).into_response()
}

#[derive(Debug, Serialize)]
pub struct EtlHealth {
    pub status: &'static str,
}

/// `GET /api/etl/health`
pub async fn etl_health() -> Json<EtlHealth> {
    Json(EtlHealth { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct EtlStats {
    pub subscriber_count: usize,
}

/// `GET /api/etl/stats`
pub async fn etl_stats(State(state): State<AppState>) -> Json<EtlStats> {
    Json(EtlStats { subscriber_count: state.event_bus.subscriber_count() })
}
