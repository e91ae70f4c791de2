//! Data Validator (§4.E): three independent passes — query results,
//! transformed documents, and generated embeddings — each gated by a
//! [`ValidationLevel`] the orchestrator selects per run. A pass never
//! returns `Err`; it reports what it found and lets the caller decide
//! whether `passed: false` should abort the run.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value as JsonValue;

use thema_core::models::{DocType, Document};
use thema_db::legacy::QueryResult;

/// How strict a validation pass is before the pipeline proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Basic,
    Standard,
    Strict,
}

const CRITICAL_QUERIES: &[&str] = &[
    "tendencyQuery",
    "topTendencyQuery",
    "thinkingSkillsQuery",
    "careerRecommendationQuery",
];

const REQUIRED_DOC_TYPES: &[DocType] = &[
    DocType::PersonalityProfile,
    DocType::ThinkingSkills,
    DocType::CareerRecommendations,
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryValidationReport {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub critical_queries_missing: Vec<String>,
    pub data_quality_issues: Vec<String>,
    pub passed: bool,
}

pub fn validate_query_results(
    results: &[QueryResult],
    level: ValidationLevel,
) -> QueryValidationReport {
    let mut report = QueryValidationReport {
        total_queries: results.len(),
        ..Default::default()
    };

    for result in results {
        if result.success {
            report.successful_queries += 1;
            if !result.rows.is_empty() {
                report
                    .data_quality_issues
                    .extend(validate_query_data_quality(&result.query_name, &result.rows, level));
            } else {
                report.warnings.push(format!(
                    "Query {} succeeded but returned no data",
                    result.query_name
                ));
            }
        } else {
            report.failed_queries += 1;
            if CRITICAL_QUERIES.contains(&result.query_name.as_str()) {
                report.critical_queries_missing.push(result.query_name.clone());
                report.validation_errors.push(format!(
                    "Critical query {} failed: {}",
                    result.query_name,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }
    }

    let success_rate = if report.total_queries == 0 {
        0.0
    } else {
        report.successful_queries as f64 / report.total_queries as f64
    };

    report.passed = match level {
        ValidationLevel::Strict => report.failed_queries == 0,
        ValidationLevel::Standard => {
            report.critical_queries_missing.is_empty() && success_rate >= 0.8
        }
        ValidationLevel::Basic => CRITICAL_QUERIES
            .iter()
            .any(|name| results.iter().any(|r| r.query_name == *name && r.success)),
    };

    report
}

fn validate_query_data_quality(
    query_name: &str,
    rows: &[JsonValue],
    level: ValidationLevel,
) -> Vec<String> {
    if rows.is_empty() {
        return vec!["No data returned".to_string()];
    }

    let mut issues = match query_name {
        "tendencyQuery" => validate_tendency_data(rows),
        "thinkingSkillsQuery" => validate_thinking_skills_data(rows),
        "careerRecommendationQuery" => validate_career_data(rows),
        _ => Vec::new(),
    };

    if matches!(level, ValidationLevel::Standard | ValidationLevel::Strict) {
        issues.extend(validate_generic_data_quality(rows));
    }

    issues
}

fn validate_tendency_data(rows: &[JsonValue]) -> Vec<String> {
    let Some(first_row) = rows.first() else {
        return vec!["No tendency data".to_string()];
    };

    ["Tnd1", "Tnd2"]
        .into_iter()
        .filter(|field| !first_row.get(field).map(|v| !is_falsy(v)).unwrap_or(false))
        .map(|field| format!("Missing or empty tendency field: {field}"))
        .collect()
}

fn validate_thinking_skills_data(rows: &[JsonValue]) -> Vec<String> {
    let mut issues = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if let Some(score) = row.get("score") {
            if !is_valid_percent(score) {
                issues.push(format!("Invalid score in row {i}: {score}"));
            }
        }
        if let Some(percentile) = row.get("percentile") {
            if !is_valid_percent(percentile) {
                issues.push(format!("Invalid percentile in row {i}: {percentile}"));
            }
        }
    }
    issues
}

fn validate_career_data(rows: &[JsonValue]) -> Vec<String> {
    let mut issues = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        for field in ["job_code", "job_name"] {
            if !row.get(field).map(|v| !is_falsy(v)).unwrap_or(false) {
                issues.push(format!("Missing {field} in career row {i}"));
            }
        }
        if let Some(score) = row.get("match_score") {
            if !is_valid_percent(score) {
                issues.push(format!("Invalid match_score in row {i}: {score}"));
            }
        }
    }
    issues
}

fn validate_generic_data_quality(rows: &[JsonValue]) -> Vec<String> {
    let mut issues = Vec::new();

    let empty_rows = rows
        .iter()
        .filter(|row| {
            row.as_object()
                .map(|obj| obj.values().all(is_falsy))
                .unwrap_or(true)
        })
        .count();
    if empty_rows > 0 {
        issues.push(format!("{empty_rows} completely empty rows found"));
    }

    let total_fields: usize = rows.iter().filter_map(|row| row.as_object()).map(|o| o.len()).sum();
    let null_fields: usize = rows
        .iter()
        .filter_map(|row| row.as_object())
        .flat_map(|o| o.values())
        .filter(|v| v.is_null())
        .count();

    if total_fields > 0 {
        let null_percentage = (null_fields as f64 / total_fields as f64) * 100.0;
        if null_percentage > 50.0 {
            issues.push(format!("High null value percentage: {null_percentage:.1}%"));
        }
    }

    issues
}

/// Python's `if not value` truthiness for the JSON shapes these rows take.
fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
    }
}

fn is_valid_percent(value: &JsonValue) -> bool {
    value.as_f64().map(|n| (0.0..=100.0).contains(&n)).unwrap_or(false)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentValidationReport {
    pub total_documents: usize,
    pub valid_documents: usize,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub document_types: Vec<DocType>,
    pub passed: bool,
}

pub fn validate_transformed_documents(
    documents: &[Document],
    level: ValidationLevel,
) -> DocumentValidationReport {
    let mut report = DocumentValidationReport {
        total_documents: documents.len(),
        ..Default::default()
    };

    for doc in documents {
        report.document_types.push(doc.doc_type);
        let issues = validate_document_structure(doc, level);
        if issues.is_empty() {
            report.valid_documents += 1;
        } else {
            report
                .validation_errors
                .extend(issues.into_iter().map(|issue| format!("{}: {issue}", doc.doc_type)));
        }
    }

    let missing_types: Vec<DocType> = REQUIRED_DOC_TYPES
        .iter()
        .copied()
        .filter(|t| !report.document_types.contains(t))
        .collect();
    report
        .validation_errors
        .extend(missing_types.iter().map(|t| format!("Missing required document type: {t}")));

    report.passed = match level {
        ValidationLevel::Strict => {
            report.valid_documents == report.total_documents && missing_types.is_empty()
        }
        ValidationLevel::Standard | ValidationLevel::Basic => report.valid_documents > 0,
    };

    report
}

fn validate_document_structure(document: &Document, level: ValidationLevel) -> Vec<String> {
    let mut issues = Vec::new();

    if is_falsy(&document.content) {
        issues.push("Empty content".to_string());
    }
    if document.summary_text.trim().chars().count() < 10 {
        issues.push("Missing or too short summary text".to_string());
    }

    if matches!(level, ValidationLevel::Standard | ValidationLevel::Strict) {
        match document.doc_type {
            DocType::PersonalityProfile => issues.extend(validate_personality_document(&document.content)),
            DocType::ThinkingSkills => issues.extend(validate_thinking_skills_document(&document.content)),
            DocType::CareerRecommendations => issues.extend(validate_career_document(&document.content)),
            _ => {}
        }
    }

    issues
}

fn validate_personality_document(content: &JsonValue) -> Vec<String> {
    let mut issues = Vec::new();
    for field in ["primary_tendency", "secondary_tendency"] {
        match content.get(field) {
            None => issues.push(format!("Missing {field}")),
            Some(value) => {
                if !value.get("name").map(|n| !is_falsy(n)).unwrap_or(false) {
                    issues.push(format!("Missing name in {field}"));
                }
            }
        }
    }
    issues
}

fn validate_thinking_skills_document(content: &JsonValue) -> Vec<String> {
    match content.get("core_thinking_skills") {
        None => vec!["Missing core_thinking_skills".to_string()],
        Some(JsonValue::Array(arr)) if arr.is_empty() => vec!["No thinking skills found".to_string()],
        Some(JsonValue::Array(_)) => Vec::new(),
        Some(_) => vec!["core_thinking_skills must be a list".to_string()],
    }
}

fn validate_career_document(content: &JsonValue) -> Vec<String> {
    match content.get("recommended_careers") {
        None => vec!["Missing recommended_careers".to_string()],
        Some(JsonValue::Array(arr)) if arr.is_empty() => vec!["No career recommendations found".to_string()],
        Some(JsonValue::Array(_)) => Vec::new(),
        Some(_) => vec!["recommended_careers must be a list".to_string()],
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddingValidationReport {
    pub total_documents: usize,
    pub valid_embeddings: usize,
    pub validation_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub embedding_dimensions: Vec<usize>,
    pub passed: bool,
}

/// Unlike the upstream Python (which checks `embedding_vector` is a
/// JSON list at all), `Document.embedding` is already typed as
/// `Option<pgvector::Vector>` — the "not a list" case can't occur here.
pub fn validate_embeddings(documents: &[Document], level: ValidationLevel) -> EmbeddingValidationReport {
    let mut report = EmbeddingValidationReport {
        total_documents: documents.len(),
        ..Default::default()
    };

    for (i, doc) in documents.iter().enumerate() {
        let Some(vector) = &doc.embedding else {
            report.validation_errors.push(format!("Document {i} missing embedding_vector"));
            continue;
        };
        let values = vector.as_slice();
        if values.is_empty() {
            report.validation_errors.push(format!("Document {i} has empty embedding"));
            continue;
        }
        if values.iter().all(|x| *x == 0.0) {
            report.warnings.push(format!("Document {i} has dummy embedding (all zeros)"));
        }
        report.valid_embeddings += 1;
        report.embedding_dimensions.push(values.len());
    }

    let unique_dims: HashSet<usize> = report.embedding_dimensions.iter().copied().collect();
    if unique_dims.len() > 1 {
        report
            .validation_errors
            .push(format!("Inconsistent embedding dimensions: {unique_dims:?}"));
    }

    report.passed = match level {
        ValidationLevel::Strict => {
            report.valid_embeddings == report.total_documents && report.warnings.is_empty()
        }
        ValidationLevel::Standard | ValidationLevel::Basic => report.valid_embeddings > 0,
    };

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use thema_core::models::{CompletionLevel, Document};
    use uuid::Uuid;

    fn query(name: &str, success: bool, rows: Vec<JsonValue>) -> QueryResult {
        QueryResult {
            query_name: name.to_string(),
            success,
            rows,
            error: if success { None } else { Some("boom".to_string()) },
            error_kind: None,
            execution_time: Duration::ZERO,
            row_count: 0,
        }
    }

    #[test]
    fn strict_requires_zero_failures() {
        let results = vec![
            query("tendencyQuery", true, vec![json!({"Tnd1": "A", "Tnd2": "B"})]),
            query("dutiesQuery", false, vec![]),
        ];
        let report = validate_query_results(&results, ValidationLevel::Strict);
        assert!(!report.passed);
    }

    #[test]
    fn standard_requires_critical_queries_and_80_percent() {
        let results = vec![
            query("tendencyQuery", true, vec![json!({"Tnd1": "A", "Tnd2": "B"})]),
            query("topTendencyQuery", true, vec![json!({"x": 1})]),
            query("thinkingSkillsQuery", true, vec![json!({"score": 80})]),
            query("careerRecommendationQuery", true, vec![json!({"job_code": "1", "job_name": "dev"})]),
            query("dutiesQuery", true, vec![]),
        ];
        let report = validate_query_results(&results, ValidationLevel::Standard);
        assert!(report.passed);
    }

    #[test]
    fn basic_passes_with_one_successful_critical_query() {
        let results = vec![
            query("tendencyQuery", true, vec![json!({"Tnd1": "A", "Tnd2": "B"})]),
            query("topTendencyQuery", false, vec![]),
            query("thinkingSkillsQuery", false, vec![]),
            query("careerRecommendationQuery", false, vec![]),
        ];
        let report = validate_query_results(&results, ValidationLevel::Basic);
        assert!(report.passed);
    }

    #[test]
    fn tendency_data_flags_missing_fields() {
        let issues = validate_tendency_data(&[json!({"Tnd1": "", "Tnd2": "B"})]);
        assert_eq!(issues, vec!["Missing or empty tendency field: Tnd1".to_string()]);
    }

    #[test]
    fn thinking_skills_flags_out_of_range_score() {
        let issues = validate_thinking_skills_data(&[json!({"score": 150})]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn generic_quality_flags_high_null_ratio() {
        let rows = vec![json!({"a": null, "b": null}), json!({"a": null, "b": 1})];
        let issues = validate_generic_data_quality(&rows);
        assert!(issues.iter().any(|i| i.contains("null value percentage")));
    }

    fn document(doc_type: DocType, content: JsonValue, summary: &str) -> Document {
        Document::new(Uuid::new_v4(), doc_type, "test", content, summary, CompletionLevel::Complete)
    }

    #[test]
    fn document_structure_rejects_short_summary() {
        let doc = document(DocType::UserProfile, json!({"a": 1}), "short");
        let issues = validate_document_structure(&doc, ValidationLevel::Basic);
        assert!(issues.contains(&"Missing or too short summary text".to_string()));
    }

    #[test]
    fn personality_document_requires_names() {
        let issues = validate_personality_document(&json!({
            "primary_tendency": {"name": ""},
            "secondary_tendency": {"name": "B"}
        }));
        assert_eq!(issues, vec!["Missing name in primary_tendency".to_string()]);
    }

    #[test]
    fn thinking_skills_document_requires_non_empty_list() {
        assert_eq!(
            validate_thinking_skills_document(&json!({"core_thinking_skills": []})),
            vec!["No thinking skills found".to_string()]
        );
        assert!(validate_thinking_skills_document(&json!({"core_thinking_skills": ["a"]})).is_empty());
    }

    #[test]
    fn career_document_requires_list_type() {
        assert_eq!(
            validate_career_document(&json!({"recommended_careers": "nope"})),
            vec!["recommended_careers must be a list".to_string()]
        );
    }

    #[test]
    fn transformed_documents_flag_missing_required_types() {
        let docs = vec![document(
            DocType::UserProfile,
            json!({"a": 1}),
            "a long enough summary text",
        )];
        let report = validate_transformed_documents(&docs, ValidationLevel::Strict);
        assert!(!report.passed);
        assert!(report
            .validation_errors
            .iter()
            .any(|e| e.contains("PERSONALITY_PROFILE")));
    }

    #[test]
    fn standard_documents_pass_with_one_valid_document() {
        let docs = vec![document(
            DocType::UserProfile,
            json!({"a": 1}),
            "a long enough summary text",
        )];
        let report = validate_transformed_documents(&docs, ValidationLevel::Standard);
        assert!(report.passed);
    }

    #[test]
    fn embeddings_flag_dummy_vectors_as_warning_not_error() {
        let mut doc = document(DocType::UserProfile, json!({"a": 1}), "a long enough summary");
        doc.embedding = Some(pgvector::Vector::from(vec![0.0, 0.0, 0.0]));
        let report = validate_embeddings(&[doc], ValidationLevel::Standard);
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn strict_embeddings_fail_on_any_warning() {
        let mut doc = document(DocType::UserProfile, json!({"a": 1}), "a long enough summary");
        doc.embedding = Some(pgvector::Vector::from(vec![0.0, 0.0, 0.0]));
        let report = validate_embeddings(&[doc], ValidationLevel::Strict);
        assert!(!report.passed);
    }

    #[test]
    fn inconsistent_dimensions_are_flagged() {
        let mut a = document(DocType::UserProfile, json!({"a": 1}), "a long enough summary");
        a.embedding = Some(pgvector::Vector::from(vec![1.0, 0.0]));
        let mut b = document(DocType::UserProfile, json!({"a": 1}), "a long enough summary");
        b.embedding = Some(pgvector::Vector::from(vec![1.0, 0.0, 0.0]));
        let report = validate_embeddings(&[a, b], ValidationLevel::Standard);
        assert!(report
            .validation_errors
            .iter()
            .any(|e| e.contains("Inconsistent embedding dimensions")));
    }
}
