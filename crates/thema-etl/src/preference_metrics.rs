//! Preference-analysis monitoring: rolling query/document outcome windows,
//! success-rate aggregation, and a fixed alert-rule table evaluated on
//! demand (§6 `/api/monitoring/preference/*`).
//!
//! Grounded on `original_source/monitoring/preference_metrics.py`
//! (`PreferenceMetricsCollector`) and `preference_alerting.py`
//! (`PreferenceAlertingSystem`'s default rule table), ported onto
//! `thema_core::traits::MetricsRegistry` rather than a second global
//! singleton.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use thema_core::traits::MetricsRegistry;

/// The three legacy preference queries the Legacy Query Executor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferenceQueryType {
    ImagePreferenceStatsQuery,
    PreferenceDataQuery,
    PreferenceJobsQuery,
}

impl PreferenceQueryType {
    pub const ALL: [PreferenceQueryType; 3] = [
        PreferenceQueryType::ImagePreferenceStatsQuery,
        PreferenceQueryType::PreferenceDataQuery,
        PreferenceQueryType::PreferenceJobsQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceQueryType::ImagePreferenceStatsQuery => "imagePreferenceStatsQuery",
            PreferenceQueryType::PreferenceDataQuery => "preferenceDataQuery",
            PreferenceQueryType::PreferenceJobsQuery => "preferenceJobsQuery",
        }
    }

    /// Maps a `thema_db::legacy::QueryResult::query_name` back to its type.
    pub fn from_query_name(name: &str) -> Option<Self> {
        match name {
            "imagePreferenceStatsQuery" => Some(PreferenceQueryType::ImagePreferenceStatsQuery),
            "preferenceDataQuery" => Some(PreferenceQueryType::PreferenceDataQuery),
            "preferenceJobsQuery" => Some(PreferenceQueryType::PreferenceJobsQuery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone)]
struct QueryMetric {
    query_type: PreferenceQueryType,
    success: bool,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct DocumentMetric {
    documents_created: i32,
    documents_failed: i32,
    total_processing_time_ms: f64,
    data_completeness_score: f64,
    success: bool,
    timestamp: DateTime<Utc>,
}

/// One recorded preference-processing alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceAlert {
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCreationRates {
    pub success_rate: f64,
    pub avg_completeness_score: f64,
    pub total_processed: usize,
    pub avg_processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub query_success_rates: HashMap<String, f64>,
    pub document_creation_metrics: DocumentCreationRates,
    pub recent_alerts: Vec<PreferenceAlert>,
    pub overall_query_success_rate: f64,
    pub document_success_rate: f64,
    pub avg_data_completeness: f64,
    pub critical_alerts_count: usize,
}

/// One of the six fixed default alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertRuleKind {
    QueryCriticalFailure,
    QueryDegraded,
    DocumentCriticalFailure,
    DataCompletenessLow,
    ProcessingStalled,
    ProcessingSlow,
}

impl AlertRuleKind {
    pub const ALL: [AlertRuleKind; 6] = [
        AlertRuleKind::QueryCriticalFailure,
        AlertRuleKind::QueryDegraded,
        AlertRuleKind::DocumentCriticalFailure,
        AlertRuleKind::DataCompletenessLow,
        AlertRuleKind::ProcessingStalled,
        AlertRuleKind::ProcessingSlow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlertRuleKind::QueryCriticalFailure => "preference_query_critical_failure",
            AlertRuleKind::QueryDegraded => "preference_query_degraded",
            AlertRuleKind::DocumentCriticalFailure => "preference_document_critical_failure",
            AlertRuleKind::DataCompletenessLow => "preference_data_completeness_low",
            AlertRuleKind::ProcessingStalled => "preference_processing_stalled",
            AlertRuleKind::ProcessingSlow => "preference_processing_slow",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AlertRuleKind::QueryCriticalFailure => "Preference query success rate critically low",
            AlertRuleKind::QueryDegraded => "Preference query success rate degraded",
            AlertRuleKind::DocumentCriticalFailure => "Preference document creation critically low",
            AlertRuleKind::DataCompletenessLow => "Preference data completeness degraded",
            AlertRuleKind::ProcessingStalled => "No preference processing activity detected",
            AlertRuleKind::ProcessingSlow => "Preference processing time elevated",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertRuleKind::QueryCriticalFailure => AlertSeverity::Critical,
            AlertRuleKind::QueryDegraded => AlertSeverity::Warning,
            AlertRuleKind::DocumentCriticalFailure => AlertSeverity::Critical,
            AlertRuleKind::DataCompletenessLow => AlertSeverity::Warning,
            AlertRuleKind::ProcessingStalled => AlertSeverity::Critical,
            AlertRuleKind::ProcessingSlow => AlertSeverity::Warning,
        }
    }

    fn triggered(&self, summary: &MetricsSummary) -> bool {
        match self {
            AlertRuleKind::QueryCriticalFailure => summary.overall_query_success_rate < 0.5,
            AlertRuleKind::QueryDegraded => (0.5..0.8).contains(&summary.overall_query_success_rate),
            AlertRuleKind::DocumentCriticalFailure => summary.document_creation_metrics.success_rate < 0.7,
            AlertRuleKind::DataCompletenessLow => summary.avg_data_completeness < 0.6,
            AlertRuleKind::ProcessingStalled => summary.document_creation_metrics.total_processed == 0,
            AlertRuleKind::ProcessingSlow => summary.document_creation_metrics.avg_processing_time_ms > 30_000.0,
        }
    }

    fn message(&self, summary: &MetricsSummary) -> String {
        match self {
            AlertRuleKind::QueryCriticalFailure => format!(
                "Preference query success rate is {:.1}%, below critical threshold of 50%",
                summary.overall_query_success_rate * 100.0
            ),
            AlertRuleKind::QueryDegraded => format!(
                "Preference query success rate is {:.1}%, below target of 80%",
                summary.overall_query_success_rate * 100.0
            ),
            AlertRuleKind::DocumentCriticalFailure => format!(
                "Preference document creation success rate is {:.1}%, below critical threshold of 70%",
                summary.document_creation_metrics.success_rate * 100.0
            ),
            AlertRuleKind::DataCompletenessLow => format!(
                "Average preference data completeness is {:.1}%, below target of 60%",
                summary.avg_data_completeness * 100.0
            ),
            AlertRuleKind::ProcessingStalled => "No preference processing activity detected in the last hour".to_string(),
            AlertRuleKind::ProcessingSlow => format!(
                "Average preference processing time is {:.0}ms, above target of 30000ms",
                summary.document_creation_metrics.avg_processing_time_ms
            ),
        }
    }
}

/// Per-user impact report, computed on demand from a job's query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserImpactReport {
    pub anp_seq: i64,
    pub issues: Vec<String>,
    pub missing_queries: Vec<String>,
    pub data_completeness_score: f64,
    pub recommended_actions: Vec<String>,
}

/// Builds a [`UserImpactReport`] from a `(query_name, succeeded)` list.
pub fn generate_user_impact_report(anp_seq: i64, query_outcomes: &[(&str, bool, Option<&str>)]) -> UserImpactReport {
    let mut issues = Vec::new();
    let mut missing_queries = Vec::new();

    for (name, success, error) in query_outcomes {
        if !success {
            missing_queries.push(name.to_string());
            issues.push(format!("Query {name} failed: {}", error.unwrap_or("Unknown error")));
        }
    }

    let total = query_outcomes.len();
    let successful = query_outcomes.iter().filter(|(_, success, _)| *success).count();
    let data_completeness_score = if total > 0 { successful as f64 / total as f64 } else { 0.0 };

    let mut recommended_actions = Vec::new();
    if data_completeness_score < 0.3 {
        recommended_actions.push("Critical: Manual investigation required for user data".to_string());
        recommended_actions.push("Check legacy database connectivity and user record integrity".to_string());
    } else if data_completeness_score < 0.7 {
        recommended_actions.push("Retry preference processing with enhanced error handling".to_string());
        recommended_actions.push("Validate user record exists in legacy system".to_string());
    } else {
        recommended_actions.push("Monitor for transient issues, may resolve automatically".to_string());
    }
    if !missing_queries.is_empty() {
        recommended_actions.push(format!("Focus on resolving queries: {}", missing_queries.join(", ")));
    }

    UserImpactReport { anp_seq, issues, missing_queries, data_completeness_score, recommended_actions }
}

/// Rolling preference-processing metrics collector plus the fixed
/// alert-rule table evaluated by `/api/monitoring/preference/check-alerts`.
pub struct PreferenceMetricsCollector {
    query_metrics: Mutex<Vec<QueryMetric>>,
    document_metrics: Mutex<Vec<DocumentMetric>>,
    alerts: Mutex<Vec<PreferenceAlert>>,
    rule_enabled: Mutex<HashMap<&'static str, bool>>,
    metrics: Arc<dyn MetricsRegistry>,
}

impl PreferenceMetricsCollector {
    pub fn new(metrics: Arc<dyn MetricsRegistry>) -> Self {
        let rule_enabled = AlertRuleKind::ALL.iter().map(|r| (r.name(), true)).collect();
        Self {
            query_metrics: Mutex::new(Vec::new()),
            document_metrics: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            rule_enabled: Mutex::new(rule_enabled),
            metrics,
        }
    }

    /// Records one legacy-query outcome, mirroring
    /// `record_query_execution`'s `inc`/`observe` calls onto the shared
    /// metrics registry (§4.B) rather than a standalone counter store.
    pub fn record_query_execution(&self, query_type: PreferenceQueryType, success: bool) {
        let success_label = success.to_string();
        self.metrics.incr_counter(
            "preference_query_total",
            &[("query_type", query_type.as_str()), ("success", &success_label)],
            1,
        );
        self.query_metrics.lock().unwrap().push(QueryMetric { query_type, success, timestamp: Utc::now() });
    }

    pub fn record_document_creation(
        &self,
        documents_created: i32,
        documents_failed: i32,
        total_processing_time_ms: f64,
        data_completeness_score: f64,
        success: bool,
    ) {
        let success_label = success.to_string();
        self.metrics.incr_counter("preference_document_creation_total", &[("success", &success_label)], 1);
        self.metrics.observe_histogram("preference_document_processing_time_ms", &[], total_processing_time_ms);
        self.metrics.observe_histogram("preference_data_completeness_score", &[], data_completeness_score);
        if success {
            self.metrics.observe_histogram("preference_documents_created", &[], documents_created as f64);
        }

        self.document_metrics.lock().unwrap().push(DocumentMetric {
            documents_created,
            documents_failed,
            total_processing_time_ms,
            data_completeness_score,
            success,
            timestamp: Utc::now(),
        });
    }

    pub fn query_success_rates(&self, time_window_hours: i64) -> HashMap<String, f64> {
        let cutoff = Utc::now() - Duration::hours(time_window_hours);
        let metrics = self.query_metrics.lock().unwrap();
        let recent: Vec<&QueryMetric> = metrics.iter().filter(|m| m.timestamp >= cutoff).collect();

        PreferenceQueryType::ALL
            .iter()
            .map(|qt| {
                let of_type: Vec<&&QueryMetric> = recent.iter().filter(|m| m.query_type == *qt).collect();
                let rate = if of_type.is_empty() {
                    0.0
                } else {
                    of_type.iter().filter(|m| m.success).count() as f64 / of_type.len() as f64
                };
                (qt.as_str().to_string(), rate)
            })
            .collect()
    }

    pub fn document_creation_rates(&self, time_window_hours: i64) -> DocumentCreationRates {
        let cutoff = Utc::now() - Duration::hours(time_window_hours);
        let metrics = self.document_metrics.lock().unwrap();
        let recent: Vec<&DocumentMetric> = metrics.iter().filter(|m| m.timestamp >= cutoff).collect();

        if recent.is_empty() {
            return DocumentCreationRates { success_rate: 0.0, avg_completeness_score: 0.0, total_processed: 0, avg_processing_time_ms: 0.0 };
        }

        let successful = recent.iter().filter(|m| m.success).count();
        let total_completeness: f64 = recent.iter().map(|m| m.data_completeness_score).sum();
        let total_processing_time: f64 = recent.iter().map(|m| m.total_processing_time_ms).sum();

        DocumentCreationRates {
            success_rate: successful as f64 / recent.len() as f64,
            avg_completeness_score: total_completeness / recent.len() as f64,
            total_processed: recent.len(),
            avg_processing_time_ms: total_processing_time / recent.len() as f64,
        }
    }

    pub fn recent_alerts(&self, time_window_hours: i64, severity_filter: Option<AlertSeverity>) -> Vec<PreferenceAlert> {
        let cutoff = Utc::now() - Duration::hours(time_window_hours);
        let mut recent: Vec<PreferenceAlert> = self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.timestamp >= cutoff)
            .filter(|a| severity_filter.map(|s| a.severity == s).unwrap_or(true))
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent
    }

    pub fn export_metrics_summary(&self) -> MetricsSummary {
        let query_success_rates = self.query_success_rates(24);
        let document_creation_metrics = self.document_creation_rates(24);
        let recent_alerts = self.recent_alerts(24, None);

        let overall_query_success_rate = if query_success_rates.is_empty() {
            0.0
        } else {
            query_success_rates.values().sum::<f64>() / query_success_rates.len() as f64
        };
        let critical_alerts_count = recent_alerts.iter().filter(|a| a.severity == AlertSeverity::Critical).count();

        MetricsSummary {
            document_success_rate: document_creation_metrics.success_rate,
            avg_data_completeness: document_creation_metrics.avg_completeness_score,
            query_success_rates,
            document_creation_metrics,
            recent_alerts,
            overall_query_success_rate,
            critical_alerts_count,
        }
    }

    pub fn set_rule_enabled(&self, rule_name: &str, enabled: bool) -> bool {
        let mut rules = self.rule_enabled.lock().unwrap();
        match rules.get_mut(rule_name) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    pub fn alert_rules(&self) -> Vec<(AlertRuleKind, bool)> {
        let rules = self.rule_enabled.lock().unwrap();
        AlertRuleKind::ALL.iter().map(|r| (*r, *rules.get(r.name()).unwrap_or(&true))).collect()
    }

    /// Evaluates every enabled rule against the current summary, recording
    /// and returning any alerts that fired.
    pub fn check_alert_rules(&self) -> Vec<PreferenceAlert> {
        let summary = self.export_metrics_summary();
        let enabled_names: Vec<&'static str> = {
            let rules = self.rule_enabled.lock().unwrap();
            AlertRuleKind::ALL.iter().filter(|r| *rules.get(r.name()).unwrap_or(&true)).map(|r| r.name()).collect()
        };

        let mut triggered = Vec::new();
        for rule in AlertRuleKind::ALL {
            if !enabled_names.contains(&rule.name()) {
                continue;
            }
            if rule.triggered(&summary) {
                let alert = PreferenceAlert {
                    severity: rule.severity(),
                    title: rule.description().to_string(),
                    message: rule.message(&summary),
                    timestamp: Utc::now(),
                };
                self.metrics.incr_counter("preference_alerts_total", &[("severity", alert.severity.as_str())], 1);
                self.alerts.lock().unwrap().push(alert.clone());
                triggered.push(alert);
            }
        }
        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_core::metrics::InProcessMetrics;

    fn collector() -> PreferenceMetricsCollector {
        PreferenceMetricsCollector::new(Arc::new(InProcessMetrics::new()))
    }

    #[test]
    fn query_success_rate_is_zero_with_no_data() {
        let collector = collector();
        let rates = collector.query_success_rates(24);
        assert_eq!(rates[PreferenceQueryType::PreferenceDataQuery.as_str()], 0.0);
    }

    #[test]
    fn query_success_rate_reflects_recorded_outcomes() {
        let collector = collector();
        collector.record_query_execution(PreferenceQueryType::PreferenceDataQuery, true);
        collector.record_query_execution(PreferenceQueryType::PreferenceDataQuery, false);
        let rates = collector.query_success_rates(24);
        assert_eq!(rates[PreferenceQueryType::PreferenceDataQuery.as_str()], 0.5);
    }

    #[test]
    fn document_creation_rates_empty_when_no_data() {
        let collector = collector();
        let rates = collector.document_creation_rates(24);
        assert_eq!(rates.total_processed, 0);
        assert_eq!(rates.success_rate, 0.0);
    }

    #[test]
    fn stalled_rule_triggers_with_zero_processed_documents() {
        let collector = collector();
        let alerts = collector.check_alert_rules();
        assert!(alerts.iter().any(|a| a.title == AlertRuleKind::ProcessingStalled.description()));
    }

    #[test]
    fn disabling_a_rule_prevents_it_from_firing() {
        let collector = collector();
        assert!(collector.set_rule_enabled(AlertRuleKind::ProcessingStalled.name(), false));
        let alerts = collector.check_alert_rules();
        assert!(!alerts.iter().any(|a| a.title == AlertRuleKind::ProcessingStalled.description()));
    }

    #[test]
    fn toggle_unknown_rule_returns_false() {
        let collector = collector();
        assert!(!collector.set_rule_enabled("not_a_real_rule", false));
    }

    #[test]
    fn user_impact_report_flags_failed_queries_and_recommends_investigation() {
        let report = generate_user_impact_report(
            12345,
            &[("preferenceDataQuery", false, Some("timeout")), ("preferenceJobsQuery", true, None)],
        );
        assert_eq!(report.missing_queries, vec!["preferenceDataQuery".to_string()]);
        assert!((report.data_completeness_score - 0.5).abs() < 1e-9);
        assert!(!report.recommended_actions.is_empty());
    }

    #[test]
    fn critical_recommendation_when_completeness_very_low() {
        let report = generate_user_impact_report(
            1,
            &[("a", false, None), ("b", false, None), ("c", false, None), ("d", true, None)],
        );
        assert!(report.recommended_actions.iter().any(|a| a.starts_with("Critical")));
    }
}
