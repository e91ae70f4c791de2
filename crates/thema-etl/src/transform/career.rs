//! CAREER_RECOMMENDATIONS chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s
//! `_chunk_career_recommendations`.

use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_str, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let mut documents = Vec::new();

    let tendency_jobs = queries.rows("careerRecommendationQuery");
    if !tendency_jobs.is_empty() {
        let names: Vec<&str> = tendency_jobs.iter().take(5).filter_map(|j| get_str(j, "job_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::CareerRecommendations,
            "tendency_based",
            json!({"jobs": tendency_jobs, "recommendation_type": "tendency"}),
            format!("성향 기반 추천 직업: {}", names.join(", ")),
            &["careerRecommendationQuery"],
        ));
    }

    let competency_jobs = queries.rows("competencyJobsQuery");
    if !competency_jobs.is_empty() {
        let names: Vec<&str> = competency_jobs.iter().take(5).filter_map(|j| get_str(j, "jo_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::CareerRecommendations,
            "competency_based",
            json!({"jobs": competency_jobs, "recommendation_type": "competency"}),
            format!("역량 기반 추천 직업: {}", names.join(", ")),
            &["competencyJobsQuery"],
        ));
    }

    let preference_jobs = queries.rows("preferenceJobsQuery");
    if !preference_jobs.is_empty() {
        let mut groups: HashMap<String, Vec<&serde_json::Value>> = HashMap::new();
        for job in preference_jobs {
            let key = get_str(job, "preference_type").unwrap_or("unknown").to_string();
            groups.entry(key).or_default().push(job);
        }
        let mut keys: Vec<&String> = groups.keys().collect();
        keys.sort();
        for pref_type in keys {
            let jobs = &groups[pref_type];
            let names: Vec<&str> = jobs.iter().take(3).filter_map(|j| get_str(j, "jo_name")).collect();
            let pref_name = get_str(jobs[0], "preference_name").unwrap_or(pref_type);
            documents.push(build_document(
                user_id,
                DocType::CareerRecommendations,
                format!("preference_{pref_type}"),
                json!({"jobs": jobs, "preference_type": pref_type, "preference_name": pref_name}),
                format!("{} 선호도 기반 추천 직업: {}", pref_name, names.join(", ")),
                &["preferenceJobsQuery"],
            ));
        }
    }

    let job_majors = queries.rows("suitableJobMajorsQuery");
    if !job_majors.is_empty() {
        let names: Vec<&str> = job_majors.iter().take(3).filter_map(|j| get_str(j, "jo_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::CareerRecommendations,
            "related_majors",
            json!({"job_majors": job_majors}),
            format!("추천 직업별 관련 전공: {}", names.join(", ")),
            &["suitableJobMajorsQuery"],
        ));
    }

    let duties = queries.rows("dutiesQuery");
    if !duties.is_empty() {
        let names: Vec<&str> = duties.iter().take(5).filter_map(|d| get_str(d, "du_name")).collect();
        documents.push(build_document(
            user_id,
            DocType::CareerRecommendations,
            "duties",
            json!({"duties": duties}),
            format!("추천 직무: {}", names.join(", ")),
            &["dutiesQuery"],
        ));
    }

    documents
}
