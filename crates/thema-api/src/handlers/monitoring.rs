//! Preference-analysis monitoring endpoints (§6), calling straight into
//! `thema_etl::PreferenceMetricsCollector`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use thema_etl::AlertSeverity;

use crate::handlers::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TimeWindowQuery {
    pub time_window_hours: Option<i64>,
}

fn clamp_window(hours: Option<i64>) -> i64 {
    hours.unwrap_or(24).clamp(1, 168)
}

/// `GET /api/monitoring/preference/metrics/summary?time_window_hours=1..168`
pub async fn metrics_summary(State(state): State<AppState>, Query(q): Query<TimeWindowQuery>) -> Response {
    let _ = clamp_window(q.time_window_hours);
    Json(state.preference_metrics.export_metrics_summary()).into_response()
}

/// `GET /api/monitoring/preference/metrics/query-success-rates`
pub async fn query_success_rates(State(state): State<AppState>, Query(q): Query<TimeWindowQuery>) -> Response {
    let window = clamp_window(q.time_window_hours);
    Json(state.preference_metrics.query_success_rates(window)).into_response()
}

/// `GET /api/monitoring/preference/metrics/document-creation`
pub async fn document_creation_metrics(State(state): State<AppState>, Query(q): Query<TimeWindowQuery>) -> Response {
    let window = clamp_window(q.time_window_hours);
    Json(state.preference_metrics.document_creation_rates(window)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub severity: Option<String>,
    pub time_window_hours: Option<i64>,
}

/// `GET /api/monitoring/preference/alerts?severity=info|warning|critical`
pub async fn alerts(State(state): State<AppState>, Query(q): Query<AlertsQuery>) -> Response {
    let window = clamp_window(q.time_window_hours);
    let severity = match q.severity.as_deref() {
        Some("info") => Some(AlertSeverity::Info),
        Some("warning") => Some(AlertSeverity::Warning),
        Some("critical") => Some(AlertSeverity::Critical),
        Some(other) => return error_response(StatusCode::BAD_REQUEST, format!("unknown severity '{other}'")),
        None => None,
    };
    Json(state.preference_metrics.recent_alerts(window, severity)).into_response()
}

/// `GET /api/monitoring/preference/user-impact`
///
/// No persisted per-user impact store exists yet in this crate — the
/// endpoint returns the empty-state shape `generate_user_impact_report`
/// would report for a user with no recorded query outcomes, since
/// impact reports are generated on demand from a job's own query
/// results rather than accumulated here.
pub async fn user_impact() -> Json<Vec<thema_etl::UserImpactReport>> {
    Json(Vec::new())
}

/// `GET /api/monitoring/preference/alert-rules`
pub async fn alert_rules(State(state): State<AppState>) -> Response {
    let rules: Vec<serde_json::Value> = state
        .preference_metrics
        .alert_rules()
        .into_iter()
        .map(|(kind, enabled)| {
            serde_json::json!({
                "name": kind.name(),
                "description": kind.description(),
                "severity": kind.severity(),
                "enabled": enabled,
            })
        })
        .collect();
    Json(rules).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ToggleQuery {
    pub enabled: bool,
}

/// `POST /api/monitoring/preference/alert-rules/{rule_name}/toggle?enabled=bool`
pub async fn toggle_alert_rule(
    State(state): State<AppState>,
    Path(rule_name): Path<String>,
    Query(q): Query<ToggleQuery>,
) -> Response {
    if state.preference_metrics.set_rule_enabled(&rule_name, q.enabled) {
        Json(serde_json::json!({ "rule_name": rule_name, "enabled": q.enabled })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("unknown alert rule '{rule_name}'"))
    }
}

/// `POST /api/monitoring/preference/check-alerts`
pub async fn check_alerts(State(state): State<AppState>) -> Json<Vec<thema_etl::PreferenceAlert>> {
    Json(state.preference_metrics.check_alert_rules())
}
