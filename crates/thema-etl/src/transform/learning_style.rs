//! LEARNING_STYLE chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s `_chunk_learning_style`.

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_str, truncate, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let mut documents = Vec::new();

    let learning_style = queries.first_row("learningStyleQuery");
    if let Some(tnd1_name) = get_str(learning_style, "tnd1_name") {
        let mut summary = format!("학습 스타일: {tnd1_name} 기반");
        if let Some(tendency) = get_str(learning_style, "tnd1_study_tendency") {
            summary.push_str(&format!(", 학습 성향: {}...", truncate(tendency, 50)));
        }
        documents.push(build_document(
            user_id,
            DocType::LearningStyle,
            "main",
            learning_style.clone(),
            summary,
            &["learningStyleQuery"],
        ));
    }

    let subject_ranks = queries.rows("subjectRanksQuery");
    if !subject_ranks.is_empty() {
        let top: Vec<&JsonValue> = subject_ranks.iter().take(5).collect();
        let names: Vec<&str> = top.iter().filter_map(|s| get_str(s, "subject_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::LearningStyle,
            "recommended_subjects",
            json!({"subjects": top}),
            format!("추천 학습 과목: {}", names.join(", ")),
            &["subjectRanksQuery"],
        ));
    }

    let learning_chart = queries.rows("learningStyleChartQuery");
    if !learning_chart.is_empty() {
        let style_data: Vec<&JsonValue> = learning_chart.iter().filter(|i| get_str(i, "item_type") == Some("S")).collect();
        let method_data: Vec<&JsonValue> = learning_chart.iter().filter(|i| get_str(i, "item_type") == Some("W")).collect();

        if !style_data.is_empty() {
            let names: Vec<&str> = style_data.iter().take(3).filter_map(|s| get_str(s, "item_name")).collect();
            documents.push(build_document(
                user_id,
                DocType::LearningStyle,
                "style_chart",
                json!({"style_data": style_data}),
                format!("학습 스타일 분석: {}", names.join(", ")),
                &["learningStyleChartQuery"],
            ));
        }
        if !method_data.is_empty() {
            let names: Vec<&str> = method_data.iter().take(3).filter_map(|m| get_str(m, "item_name")).collect();
            documents.push(build_document(
                user_id,
                DocType::LearningStyle,
                "method_chart",
                json!({"method_data": method_data}),
                format!("학습 방법 분석: {}", names.join(", ")),
                &["learningStyleChartQuery"],
            ));
        }
    }

    if documents.is_empty() {
        documents.push(build_document(
            user_id,
            DocType::LearningStyle,
            "unavailable",
            json!({"message": "학습 스타일 분석 데이터가 아직 준비되지 않았습니다."}),
            "학습 스타일: 데이터 준비 중",
            &[],
        ));
    }

    documents
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
    fn missing_data_yields_placeholder_document() {
        let queries = QueryResultMap::from_results(&[]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.sub_type, "unavailable");
    }

    #[test]
    fn chart_rows_split_into_style_and_method_documents() {
        let chart = vec![
            json!({"item_type": "S", "item_name": "시각적"}),
            json!({"item_type": "W", "item_name": "반복학습"}),
        ];
        let queries = QueryResultMap::from_results(&[result("learningStyleChartQuery", chart)]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.sub_type, "style_chart");
        assert_eq!(docs[1].metadata.sub_type, "method_chart");
    }
}
