//! Document Transformer (§4.F): turns the named-query catalog into
//! focused, topic-specific [`Document`]s — one chunker module per
//! [`DocType`], grounded file-for-file on
//! `original_source/etl/document_transformer.py`'s `DocumentTransformer`.
//!
//! Each chunker only ever sees the rows for the queries it cares about,
//! via [`QueryResultMap`], and returns zero or more documents; a query
//! with no usable rows simply contributes nothing rather than failing
//! the run.

pub mod career;
pub mod competency;
pub mod learning_style;
pub mod personality;
pub mod preference;
pub mod thinking_skills;
pub mod user_profile;

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use thema_core::models::{CompletionLevel, DocType, Document};
use thema_db::legacy::QueryResult;

/// Query rows keyed by query name, built from a [`QueryResult`] batch.
/// Failed queries contribute an empty row set, matching the Python
/// transformer's treatment of `query_results.get(name, [])`.
pub struct QueryResultMap {
    rows: HashMap<String, Vec<JsonValue>>,
}

impl QueryResultMap {
    pub fn from_results(results: &[QueryResult]) -> Self {
        let rows = results
            .iter()
            .map(|r| (r.query_name.clone(), r.rows.clone()))
            .collect();
        Self { rows }
    }

    pub fn rows(&self, query_name: &str) -> &[JsonValue] {
        self.rows.get(query_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First row, or an empty object — mirrors `_safe_get(data, 0, {})`.
    pub fn first_row(&self, query_name: &str) -> &JsonValue {
        static EMPTY: once_empty::EmptyObject = once_empty::EmptyObject;
        self.rows(query_name).first().unwrap_or(EMPTY.get())
    }
}

/// A `serde_json::Value::Object(Map::new())` that outlives any call site,
/// for `first_row`'s no-data fallback.
mod once_empty {
    use serde_json::Value as JsonValue;
    use std::sync::OnceLock;

    pub struct EmptyObject;

    impl EmptyObject {
        pub fn get(&self) -> &'static JsonValue {
            static CELL: OnceLock<JsonValue> = OnceLock::new();
            CELL.get_or_init(|| JsonValue::Object(serde_json::Map::new()))
        }
    }
}

/// `data.get(key, default)` for a JSON object row; string/number helper
/// reads go through [`get_str`] and [`get_f64`].
pub fn get_str<'a>(row: &'a JsonValue, key: &str) -> Option<&'a str> {
    row.get(key).and_then(JsonValue::as_str)
}

pub fn get_f64(row: &JsonValue, key: &str) -> Option<f64> {
    row.get(key).and_then(JsonValue::as_f64)
}

/// String or number fields rendered for display (legacy rows mix both
/// shapes depending on the source column type).
pub fn get_display(row: &JsonValue, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Char-boundary-safe prefix, matching Python's `text[:n]` slicing used
/// throughout the transformer for preview snippets.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Rule-based hypothetical-question generator (§4.F supplement), ported
/// from the Python transformer's Korean-substring pattern table. An LLM
/// strategy is an open extension point but isn't wired up by default —
/// the rule table is cheap, deterministic, and good enough to seed
/// `searchable_text` without a network round trip per document.
pub fn generate_hypothetical_questions(summary: &str, content: &JsonValue) -> Vec<String> {
    let contains = |needle: &str| summary.contains(needle);

    if contains("기본 정보") {
        return vec![
            "내 기본 정보 요약해줘".to_string(),
            "내 나이랑 직업 알려줘".to_string(),
            "프로필 정보 보여줘".to_string(),
        ];
    }
    if contains("학력") {
        return vec![
            "내 학력 정보 알려줘".to_string(),
            "어느 학교 다녔어?".to_string(),
            "전공이 뭐야?".to_string(),
        ];
    }
    if contains("직업 정보") {
        return vec![
            "내 직업 정보 알려줘".to_string(),
            "어디서 일해?".to_string(),
            "무슨 일 해?".to_string(),
        ];
    }
    if contains("성향 분석") {
        let primary = content
            .get("primary_tendency")
            .and_then(|t| t.get("name"))
            .and_then(JsonValue::as_str)
            .unwrap_or("내 성향");
        return vec![
            "내 성격 유형 알려줘".to_string(),
            "나의 주요 성향은 뭐야?".to_string(),
            format!("{primary} 성향에 대해 설명해줘"),
        ];
    }
    if contains("사고력") {
        return vec![
            "내 사고력 점수 알려줘".to_string(),
            "나는 어떤 사고를 잘해?".to_string(),
            "사고력 분석 결과 요약해줘".to_string(),
        ];
    }
    if contains("추천 직업") || contains("직업") {
        return vec![
            "나한테 맞는 직업 추천해줘".to_string(),
            "내 성향에 어울리는 직업은?".to_string(),
            "진로 추천 결과 알려줘".to_string(),
        ];
    }
    if contains("학습 스타일") {
        return vec![
            "나한테 맞는 공부 방법 알려줘".to_string(),
            "내 학습 스타일은 어때?".to_string(),
            "어떻게 공부해야 효율적일까?".to_string(),
        ];
    }
    if contains("핵심 역량") || contains("역량") {
        return vec![
            "내가 가진 핵심 역량은 뭐야?".to_string(),
            "나의 강점 역량 알려줘".to_string(),
            "역량 분석 결과 보여줘".to_string(),
        ];
    }
    if contains("선호도") || contains("이미지") {
        return vec![
            "내 선호도 분석 결과 알려줘".to_string(),
            "이미지 선호도 검사 결과는?".to_string(),
            "내가 선호하는 것들은 뭐야?".to_string(),
        ];
    }

    vec![format!("{summary}에 대해 알려줘"), "결과를 자세히 설명해줘".to_string()]
}

/// Builds a document with its hypothetical questions already attached and
/// `data_sources` recorded on the metadata, the shape every chunker needs.
pub fn build_document(
    user_id: uuid::Uuid,
    doc_type: DocType,
    sub_type: impl Into<String>,
    content: JsonValue,
    summary_text: impl Into<String>,
    data_sources: &[&str],
) -> Document {
    let summary_text = summary_text.into();
    let questions = generate_hypothetical_questions(&summary_text, &content);
    let mut doc = Document::new(
        user_id,
        doc_type,
        sub_type,
        content,
        summary_text,
        CompletionLevel::Complete,
    )
    .with_hypothetical_questions(questions);
    doc.metadata.data_sources = data_sources.iter().map(|s| s.to_string()).collect();
    doc
}

/// Runs every chunker over the same query batch, in §4.F's document-type
/// order, and concatenates their output.
pub struct DocumentTransformer;

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform_all(&self, user_id: uuid::Uuid, results: &[QueryResult]) -> Vec<Document> {
        let queries = QueryResultMap::from_results(results);

        let mut documents = Vec::new();
        documents.extend(user_profile::chunk(user_id, &queries));
        documents.extend(personality::chunk(user_id, &queries));
        documents.extend(thinking_skills::chunk(user_id, &queries));
        documents.extend(career::chunk(user_id, &queries));
        documents.extend(competency::chunk(user_id, &queries));
        documents.extend(learning_style::chunk(user_id, &queries));
        documents.extend(preference::chunk(user_id, &queries));
        documents
    }
}

impl Default for DocumentTransformer {
    fn default() -> Self {
        Self::new()
    }
}
