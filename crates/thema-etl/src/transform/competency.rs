//! COMPETENCY_ANALYSIS chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s
//! `_chunk_competency_analysis`.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_f64, get_str, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let competencies = queries.rows("competencyAnalysisQuery");
    let competency_subjects = queries.rows("competencySubjectsQuery");
    let talent_list = queries.first_row("talentListQuery");

    let mut documents = Vec::new();

    if let Some(summary) = get_str(talent_list, "talent_summary") {
        documents.push(build_document(
            user_id,
            DocType::CompetencyAnalysis,
            "summary",
            talent_list.clone(),
            format!("핵심 역량 요약: {summary}"),
            &["talentListQuery"],
        ));
    } else if !competencies.is_empty() {
        let names: Vec<&str> = competencies.iter().take(5).filter_map(|c| get_str(c, "competency_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::CompetencyAnalysis,
            "summary",
            json!({"competencies": competencies}),
            format!("핵심 역량 요약: {}", names.join(", ")),
            &["competencyAnalysisQuery"],
        ));
    } else {
        return Vec::new();
    }

    let mut subjects_by_competency: HashMap<&str, Vec<&JsonValue>> = HashMap::new();
    for sub in competency_subjects {
        if let Some(name) = get_str(sub, "competency_name") {
            subjects_by_competency.entry(name).or_default().push(sub);
        }
    }

    for comp in competencies {
        let Some(comp_name) = get_str(comp, "competency_name") else {
            continue;
        };
        let related_subjects = subjects_by_competency.get(comp_name).cloned().unwrap_or_default();

        let mut summary = format!(
            "{} 역량: {}점 (상위 {}%)",
            comp_name,
            get_f64(comp, "score").map(|v| v.to_string()).unwrap_or_default(),
            get_f64(comp, "percentile").map(|v| v.to_string()).unwrap_or_default(),
        );
        if !related_subjects.is_empty() {
            let subject_names: Vec<&str> = related_subjects
                .iter()
                .take(3)
                .filter_map(|s| get_str(s, "subject_name"))
                .collect();
            summary.push_str(&format!(", 관련 과목: {}", subject_names.join(", ")));
        }

        let rank = get_f64(comp, "rank").unwrap_or(0.0) as i64;
        let mut doc = build_document(
            user_id,
            DocType::CompetencyAnalysis,
            format!("competency_{rank}"),
            json!({"competency": comp, "related_subjects": related_subjects}),
            summary,
            &["competencyAnalysisQuery", "competencySubjectsQuery"],
        );
        doc.metadata.extra.insert("competency_name".to_string(), json!(comp_name));
        documents.push(doc);
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
    fn no_competency_data_yields_no_documents() {
        let queries = QueryResultMap::from_results(&[]);
        assert!(chunk(Uuid::new_v4(), &queries).is_empty());
    }

    #[test]
    fn competency_rows_attach_related_subjects() {
        let competencies = vec![json!({"competency_name": "문제해결력", "score": 88, "percentile": 90, "rank": 1})];
        let subjects = vec![json!({"competency_name": "문제해결력", "subject_name": "수학"})];
        let queries = QueryResultMap::from_results(&[
            result("competencyAnalysisQuery", competencies),
            result("competencySubjectsQuery", subjects),
        ]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 2);
        assert!(docs[1].summary_text.contains("수학"));
    }
}
