//! PERSONALITY_PROFILE chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s
//! `_chunk_personality_analysis`.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_f64, get_str, truncate, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let tendency_data = queries.first_row("tendencyQuery");
    let Some(primary) = get_str(tendency_data, "Tnd1") else {
        return Vec::new();
    };
    let secondary = get_str(tendency_data, "Tnd2");
    let tertiary = get_str(tendency_data, "Tnd3");

    let tendency_stats = queries.rows("tendencyStatsQuery");
    let mut percentage_by_name: HashMap<String, f64> = HashMap::new();
    for stat in tendency_stats {
        if let Some(name) = get_str(stat, "tendency_name") {
            let trimmed = name.trim_end_matches('형').to_string();
            percentage_by_name.insert(trimmed, get_f64(stat, "percentage").unwrap_or(0.0));
        }
    }
    let pct = |name: &str| percentage_by_name.get(name).copied().unwrap_or(0.0);

    let content = json!({
        "primary_tendency": {"name": primary, "percentage": pct(primary)},
        "secondary_tendency": {"name": secondary, "percentage": secondary.map(pct).unwrap_or(0.0)},
        "tertiary_tendency": {"name": tertiary, "percentage": tertiary.map(pct).unwrap_or(0.0)},
    });

    let mut summary = format!(
        "주요 성향 분석: 1순위 {}({:.1}%), 2순위 {}({:.1}%)",
        primary,
        pct(primary),
        secondary.unwrap_or_default(),
        secondary.map(pct).unwrap_or(0.0)
    );
    if let Some(tertiary) = tertiary {
        summary.push_str(&format!(", 3순위 {}({:.1}%)", tertiary, pct(tertiary)));
    }

    let mut documents = vec![build_document(
        user_id,
        DocType::PersonalityProfile,
        "main_tendencies",
        content,
        summary,
        &["tendencyQuery", "tendencyStatsQuery"],
    )];

    if let Some(explanation) = explanation_of(queries.first_row("tendency1ExplainQuery")) {
        documents.push(build_document(
            user_id,
            DocType::PersonalityProfile,
            "tendency_1_explanation",
            queries.first_row("tendency1ExplainQuery").clone(),
            format!("{} 성향에 대한 상세 설명: {}...", primary, truncate(explanation, 100)),
            &["tendency1ExplainQuery"],
        ));
    }

    if let Some(explanation) = explanation_of(queries.first_row("tendency2ExplainQuery")) {
        let secondary_name = secondary.unwrap_or("2순위 성향");
        documents.push(build_document(
            user_id,
            DocType::PersonalityProfile,
            "tendency_2_explanation",
            queries.first_row("tendency2ExplainQuery").clone(),
            format!("{} 성향에 대한 상세 설명: {}...", secondary_name, truncate(explanation, 100)),
            &["tendency2ExplainQuery"],
        ));
    }

    for (i, explain_data) in queries.rows("topTendencyExplainQuery").iter().take(5).enumerate() {
        if let Some(explanation) = explanation_of(explain_data) {
            let name = get_str(explain_data, "tendency_name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}순위 성향", i + 1));
            documents.push(build_document(
                user_id,
                DocType::PersonalityProfile,
                format!("top_tendency_detail_{}", i + 1),
                explain_data.clone(),
                format!("{} 상세 분석: {}...", name, truncate(explanation, 100)),
                &["topTendencyExplainQuery"],
            ));
        }
    }

    let strengths_weaknesses = queries.rows("strengthsWeaknessesQuery");
    if !strengths_weaknesses.is_empty() {
        let strengths: Vec<&JsonValue> = strengths_weaknesses
            .iter()
            .filter(|sw| get_str(sw, "type") == Some("strength"))
            .collect();
        let weaknesses: Vec<&JsonValue> = strengths_weaknesses
            .iter()
            .filter(|sw| get_str(sw, "type") == Some("weakness"))
            .collect();

        if !strengths.is_empty() {
            let descriptions: Vec<String> = strengths
                .iter()
                .take(3)
                .map(|s| truncate(get_str(s, "description").unwrap_or_default(), 50).to_string())
                .collect();
            documents.push(build_document(
                user_id,
                DocType::PersonalityProfile,
                "strengths",
                json!({"strengths": strengths}),
                format!("주요 강점: {}", descriptions.join(", ")),
                &["strengthsWeaknessesQuery"],
            ));
        }
        if !weaknesses.is_empty() {
            let descriptions: Vec<String> = weaknesses
                .iter()
                .take(3)
                .map(|w| truncate(get_str(w, "description").unwrap_or_default(), 50).to_string())
                .collect();
            documents.push(build_document(
                user_id,
                DocType::PersonalityProfile,
                "weaknesses",
                json!({"weaknesses": weaknesses}),
                format!("개선 영역: {}", descriptions.join(", ")),
                &["strengthsWeaknessesQuery"],
            ));
        }
    }

    documents
}

fn explanation_of(row: &JsonValue) -> Option<&str> {
    get_str(row, "explanation").filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_db::legacy::QueryResult;

    fn result(name: &str, rows: Vec<JsonValue>) -> QueryResult {
        QueryResult {
            query_name: name.to_string(),
            success: true,
            rows,
            error: None,
            error_kind: None,
            execution_time: std::time::Duration::ZERO,
            row_count: 0,
        }
    }

    #[test]
    fn no_tendency_data_yields_no_documents() {
        let queries = QueryResultMap::from_results(&[]);
        assert!(chunk(Uuid::new_v4(), &queries).is_empty());
    }

    #[test]
    fn main_tendency_document_carries_percentages() {
        let tendency = json!({"Tnd1": "탐구형", "Tnd2": "예술형"});
        let stats = vec![
            json!({"tendency_name": "탐구형", "percentage": 42.5}),
            json!({"tendency_name": "예술형", "percentage": 30.0}),
        ];
        let queries = QueryResultMap::from_results(&[
            result("tendencyQuery", vec![tendency]),
            result("tendencyStatsQuery", stats),
        ]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs[0].metadata.sub_type, "main_tendencies");
        assert!(docs[0].summary_text.contains("42.5%"));
    }
}
