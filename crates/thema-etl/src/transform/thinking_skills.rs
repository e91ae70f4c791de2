//! THINKING_SKILLS chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s `_chunk_thinking_skills`.

use serde_json::json;
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_f64, get_str, truncate, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let mut documents = Vec::new();

    let thinking_main = queries.first_row("thinkingMainQuery");
    let thinking_skills = queries.rows("thinkingSkillsQuery");

    if thinking_main.is_object() && !thinking_main.as_object().unwrap().is_empty() {
        let summary = format!(
            "주요 사고력: {}, 부 사고력: {}, 총점: {}",
            get_str(thinking_main, "main_thinking_skill").unwrap_or_default(),
            get_str(thinking_main, "sub_thinking_skill").unwrap_or_default(),
            get_f64(thinking_main, "total_score").map(|v| v.to_string()).unwrap_or_default(),
        );
        documents.push(build_document(
            user_id,
            DocType::ThinkingSkills,
            "summary",
            thinking_main.clone(),
            summary,
            &["thinkingMainQuery"],
        ));
    } else if !thinking_skills.is_empty() {
        let skill_names: Vec<&str> = thinking_skills
            .iter()
            .take(3)
            .filter_map(|s| get_str(s, "skill_name"))
            .collect();
        let summary = format!(
            "사고력 분석: {} 등 {}개 영역",
            skill_names.join(", "),
            thinking_skills.len()
        );
        documents.push(build_document(
            user_id,
            DocType::ThinkingSkills,
            "skills_overview",
            json!({"skills": thinking_skills}),
            summary,
            &["thinkingSkillsQuery"],
        ));
    }

    let mut comparison: Vec<&serde_json::Value> = queries.rows("thinkingSkillComparisonQuery").iter().collect();
    comparison.sort_by(|a, b| {
        get_f64(b, "my_score")
            .unwrap_or(0.0)
            .partial_cmp(&get_f64(a, "my_score").unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (i, skill) in comparison.iter().take(5).enumerate() {
        let skill_name = get_str(skill, "skill_name").unwrap_or_default();
        let my_score = get_f64(skill, "my_score").unwrap_or(0.0);
        let avg_score = get_f64(skill, "average_score").unwrap_or(0.0);

        let mut summary = format!("{skill_name} 사고력: 내 점수 {my_score}점, 평균 {avg_score}점");
        if my_score > avg_score {
            summary.push_str(&format!(" (평균보다 {}점 높음)", my_score - avg_score));
        } else if my_score < avg_score {
            summary.push_str(&format!(" (평균보다 {}점 낮음)", avg_score - my_score));
        }

        let mut doc = build_document(
            user_id,
            DocType::ThinkingSkills,
            format!("skill_{}", i + 1),
            (*skill).clone(),
            summary,
            &["thinkingSkillComparisonQuery"],
        );
        doc.metadata
            .extra
            .insert("skill_name".to_string(), json!(skill_name));
        documents.push(doc);
    }

    for detail in queries.rows("thinkingDetailQuery") {
        if let Some(explanation) = get_str(detail, "explanation").filter(|s| !s.is_empty()) {
            let skill_name = get_str(detail, "skill_name").unwrap_or_default();
            let mut doc = build_document(
                user_id,
                DocType::ThinkingSkills,
                "detail",
                detail.clone(),
                format!("{} 상세 분석: {}...", skill_name, truncate(explanation, 100)),
                &["thinkingDetailQuery"],
            );
            doc.metadata
                .extra
                .insert("skill_name".to_string(), json!(skill_name));
            documents.push(doc);
        }
    }

    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_db::legacy::QueryResult;

    fn result(name: &str, rows: Vec<serde_json::Value>) -> QueryResult {
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
    fn comparison_rows_are_ranked_by_my_score_descending() {
        let rows = vec![
            json!({"skill_name": "분석력", "my_score": 70, "average_score": 60}),
            json!({"skill_name": "추론력", "my_score": 90, "average_score": 60}),
        ];
        let queries = QueryResultMap::from_results(&[result("thinkingSkillComparisonQuery", rows)]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs[0].metadata.sub_type, "skill_1");
        assert!(docs[0].summary_text.contains("추론력"));
    }
}
