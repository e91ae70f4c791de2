//! USER_PROFILE chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s `_chunk_user_profile`.

use serde_json::json;
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_display, get_str, QueryResultMap};

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let personal_info = queries.first_row("personalInfoQuery");

    let Some(user_name) = get_str(personal_info, "user_name") else {
        return vec![build_document(
            user_id,
            DocType::UserProfile,
            "unavailable",
            json!({"message": "사용자 프로필 데이터가 아직 준비되지 않았습니다."}),
            "사용자 프로필: 데이터 준비 중",
            &[],
        )];
    };

    let mut documents = Vec::new();

    let age = get_display(personal_info, "age");
    let gender = get_str(personal_info, "gender");
    let basic_content = json!({
        "user_name": user_name,
        "age": age,
        "gender": gender,
        "birth_date": get_display(personal_info, "birth_date"),
    });
    let summary = format!(
        "{}님의 기본 정보: {}세, {}",
        user_name,
        age.as_deref().unwrap_or_default(),
        gender.unwrap_or_default()
    );
    documents.push(build_document(
        user_id,
        DocType::UserProfile,
        "basic_info",
        basic_content,
        summary,
        &["personalInfoQuery"],
    ));

    let education_level = get_str(personal_info, "education_level");
    let school_name = get_str(personal_info, "school_name");
    let major = get_str(personal_info, "major");
    if school_name.is_some() || education_level.is_some() {
        let mut edu_summary = format!("{}님의 학력: {}", user_name, education_level.unwrap_or_default());
        if let Some(school_name) = school_name {
            edu_summary.push_str(&format!(", {school_name}"));
        }
        if let Some(major) = major {
            edu_summary.push_str(&format!("에서 {major} 전공"));
        }
        documents.push(build_document(
            user_id,
            DocType::UserProfile,
            "education",
            json!({
                "education_level": education_level,
                "school_name": school_name,
                "school_year": get_display(personal_info, "school_year"),
                "major": major,
            }),
            edu_summary,
            &["personalInfoQuery"],
        ));
    }

    let job_status = get_str(personal_info, "job_status");
    let company_name = get_str(personal_info, "company_name");
    let job_title = get_str(personal_info, "job_title");
    if job_status.is_some() || company_name.is_some() {
        let mut career_summary = format!("{}님의 직업 정보: {}", user_name, job_status.unwrap_or_default());
        if let Some(company_name) = company_name {
            career_summary.push_str(&format!(", {company_name}"));
        }
        if let Some(job_title) = job_title {
            career_summary.push_str(&format!("에서 {job_title} 담당"));
        }
        documents.push(build_document(
            user_id,
            DocType::UserProfile,
            "career",
            json!({
                "job_status": job_status,
                "company_name": company_name,
                "job_title": job_title,
            }),
            career_summary,
            &["personalInfoQuery"],
        ));
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
    fn missing_personal_info_yields_placeholder_document() {
        let queries = QueryResultMap::from_results(&[]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.sub_type, "unavailable");
    }

    #[test]
    fn full_personal_info_yields_three_documents() {
        let row = json!({
            "user_name": "홍길동",
            "age": "20",
            "gender": "남",
            "education_level": "대졸",
            "school_name": "서울대",
            "major": "컴퓨터공학",
            "job_status": "재직중",
            "company_name": "ACME",
            "job_title": "엔지니어",
        });
        let queries = QueryResultMap::from_results(&[result("personalInfoQuery", vec![row])]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].metadata.sub_type, "basic_info");
        assert_eq!(docs[1].metadata.sub_type, "education");
        assert_eq!(docs[2].metadata.sub_type, "career");
    }
}
