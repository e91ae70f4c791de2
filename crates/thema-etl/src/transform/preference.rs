//! PREFERENCE_ANALYSIS chunker. Grounded on
//! `original_source/etl/document_transformer.py`'s
//! `_chunk_preference_analysis` and its data-availability branching: the
//! image-preference test can be unstarted, partially answered, or fully
//! answered independently of whether the derived preference ranking and
//! job recommendations have been computed yet, so this is the only
//! chunker that has to reason about partial data rather than simply
//! skipping missing queries.

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use thema_core::models::{DocType, Document};

use super::{build_document, get_display, get_f64, get_str, QueryResultMap};

struct Availability {
    stats: bool,
    preferences: bool,
    jobs: bool,
}

impl Availability {
    fn count(&self) -> u8 {
        self.stats as u8 + self.preferences as u8 + self.jobs as u8
    }
}

pub fn chunk(user_id: Uuid, queries: &QueryResultMap) -> Vec<Document> {
    let stats = queries.first_row("imagePreferenceStatsQuery");
    let preferences = queries.rows("preferenceDataQuery");
    let jobs = queries.rows("preferenceJobsQuery");

    let available = Availability {
        stats: get_f64(stats, "total_image_count").is_some_and(|v| v > 0.0),
        preferences: !preferences.is_empty(),
        jobs: !jobs.is_empty(),
    };

    match available.count() {
        0 => vec![fallback_document(user_id, &available)],
        3 => {
            let mut documents = Vec::new();
            documents.extend(stats_documents(user_id, stats));
            documents.extend(preference_documents(user_id, preferences));
            documents.extend(jobs_documents(user_id, jobs));
            documents.push(completion_summary_document(user_id, stats, preferences, jobs));
            documents
        }
        _ => {
            let mut documents = vec![partial_document(user_id, &available)];
            if available.stats {
                documents.extend(stats_documents(user_id, stats));
            }
            if available.preferences {
                documents.extend(preference_documents(user_id, preferences));
            }
            if available.jobs {
                documents.extend(jobs_documents(user_id, jobs));
            }
            documents
        }
    }
}

fn quality_score(response_rate: f64, pref_count: usize, job_count: usize) -> f64 {
    let mut score = 0.0;
    score += if response_rate >= 90.0 {
        40.0
    } else if response_rate >= 80.0 {
        35.0
    } else if response_rate >= 70.0 {
        30.0
    } else if response_rate >= 50.0 {
        20.0
    } else {
        10.0
    };
    score += if pref_count >= 8 {
        30.0
    } else if pref_count >= 5 {
        25.0
    } else if pref_count >= 3 {
        20.0
    } else if pref_count >= 1 {
        15.0
    } else {
        0.0
    };
    score += if job_count >= 15 {
        30.0
    } else if job_count >= 10 {
        25.0
    } else if job_count >= 5 {
        20.0
    } else if job_count >= 1 {
        15.0
    } else {
        0.0
    };
    score.min(100.0)
}

fn stats_interpretation(response_rate: f64, total: &str, answered: &str) -> String {
    if response_rate >= 90.0 {
        format!(
            "검사가 매우 충실히 완료되었습니다 ({answered}/{total} 응답). \
             이는 매우 신뢰할 수 있는 선호도 분석 결과를 제공할 수 있으며, \
             개인의 선호 패턴을 정확하게 파악할 수 있습니다."
        )
    } else if response_rate >= 80.0 {
        format!(
            "검사가 충분히 완료되었습니다 ({answered}/{total} 응답). \
             신뢰할 수 있는 선호도 분석 결과를 제공할 수 있으며, \
             주요 선호 경향을 명확하게 식별할 수 있습니다."
        )
    } else if response_rate >= 60.0 {
        format!(
            "검사가 어느 정도 완료되었습니다 ({answered}/{total} 응답). \
             기본적인 선호도 경향을 파악할 수 있지만, \
             더 정확한 분석을 위해서는 추가 응답이 도움이 될 수 있습니다."
        )
    } else if response_rate >= 40.0 {
        format!(
            "검사가 부분적으로 완료되었습니다 ({answered}/{total} 응답). \
             일반적인 선호 방향성은 파악할 수 있지만, \
             세부적인 선호도 분석의 정확도는 제한적일 수 있습니다."
        )
    } else {
        format!(
            "검사 완료도가 낮습니다 ({answered}/{total} 응답). \
             현재 결과로는 선호도 패턴을 정확히 파악하기 어려우며, \
             추가 검사 완료를 권장합니다."
        )
    }
}

fn stats_recommendations(response_rate: f64) -> Vec<&'static str> {
    if response_rate >= 80.0 {
        vec![
            "선호도 분석 결과를 자세히 검토해보세요",
            "추천된 직업들과 본인의 관심사를 비교해보세요",
            "다른 검사 결과와 종합하여 진로 방향을 설정해보세요",
        ]
    } else if response_rate >= 60.0 {
        vec![
            "현재 결과를 참고하되, 추가 검사 완료를 고려해보세요",
            "다른 검사 결과와 함께 종합적으로 판단해보세요",
            "관심 있는 분야와 현재 결과를 비교해보세요",
        ]
    } else {
        vec![
            "검사를 더 완료하여 정확한 선호도 분석을 받아보세요",
            "현재는 다른 검사 결과를 우선적으로 참고하세요",
            "성향 분석이나 역량 분석 결과를 먼저 확인해보세요",
        ]
    }
}

fn quality_indicator(response_rate: f64) -> &'static str {
    if response_rate >= 90.0 {
        "🟢 매우 높음"
    } else if response_rate >= 80.0 {
        "🟢 높음"
    } else if response_rate >= 60.0 {
        "🟡 보통"
    } else if response_rate >= 40.0 {
        "🟠 낮음"
    } else {
        "🔴 매우 낮음"
    }
}

fn stats_next_steps(response_rate: f64) -> Vec<&'static str> {
    if response_rate >= 80.0 {
        vec!["선호도 분석 상세 결과 확인", "추천 직업 목록 검토", "다른 검사 결과와 비교 분석"]
    } else if response_rate >= 60.0 {
        vec!["현재 선호도 결과 검토", "추가 검사 완료 고려", "성향 분석 결과와 비교"]
    } else {
        vec!["검사 추가 완료", "다른 검사 결과 우선 확인", "성향 기반 직업 추천 검토"]
    }
}

fn stats_documents(user_id: Uuid, stats: &JsonValue) -> Vec<Document> {
    let total = get_display(stats, "total_image_count").unwrap_or_else(|| "0".to_string());
    let answered = get_display(stats, "response_count").unwrap_or_else(|| "0".to_string());
    let response_rate = get_f64(stats, "response_rate").unwrap_or(0.0);

    let summary = format!("이미지 선호도 검사 통계: 총 {total}개 이미지 중 {answered}개 응답 (응답률 {response_rate}%)");

    let mut content = stats.clone();
    let obj = content.as_object_mut().expect("stats row is an object");
    obj.insert("interpretation".to_string(), json!(stats_interpretation(response_rate, &total, &answered)));
    obj.insert("recommendations".to_string(), json!(stats_recommendations(response_rate)));
    obj.insert(
        "completion_status".to_string(),
        json!(if response_rate >= 80.0 {
            "완료"
        } else if response_rate >= 50.0 {
            "부분완료"
        } else {
            "미완료"
        }),
    );
    obj.insert("quality_indicator".to_string(), json!(quality_indicator(response_rate)));
    obj.insert("next_steps".to_string(), json!(stats_next_steps(response_rate)));

    vec![build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "test_stats",
        content,
        summary,
        &["imagePreferenceStatsQuery"],
    )]
}

fn preference_analysis_text(pref_name: &str, rank: i64, description: Option<&str>) -> String {
    let mut text = if rank == 1 {
        format!(
            "'{pref_name}'은 가장 강한 선호를 보이는 영역입니다. \
             이는 개인의 핵심적인 관심사이자 동기 요소로 작용할 가능성이 높습니다. "
        )
    } else if rank <= 3 {
        format!(
            "'{pref_name}'은 상위 선호 영역 중 하나입니다. \
             이 영역에 대한 관심과 적성이 있어 관련 활동에서 만족감을 느낄 수 있습니다. "
        )
    } else if rank <= 5 {
        format!(
            "'{pref_name}'은 중간 정도의 선호를 보이는 영역입니다. \
             상황에 따라 관심을 가질 수 있는 영역으로, 다른 요소와 결합하여 고려해볼 수 있습니다. "
        )
    } else {
        format!(
            "'{pref_name}'은 상대적으로 낮은 선호를 보이는 영역입니다. \
             현재로서는 주요 관심사가 아니지만, 향후 경험을 통해 변화할 수 있습니다. "
        )
    };
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        text.push_str(&format!("구체적으로는 {description}"));
    }
    text
}

fn career_implications(pref_name: &str, rank: i64) -> Vec<String> {
    if rank <= 2 {
        vec![
            format!("{pref_name} 관련 직업을 우선적으로 고려해보세요."),
            "이 영역에서 전문성을 개발하면 높은 만족도를 얻을 수 있습니다.".to_string(),
        ]
    } else if rank <= 5 {
        vec![
            format!("{pref_name} 요소가 포함된 직업을 탐색해보세요."),
            "주 업무가 아니더라도 부분적으로 관련된 역할을 찾아보세요.".to_string(),
        ]
    } else {
        Vec::new()
    }
}

fn development_suggestions(pref_name: &str, rank: i64) -> Vec<String> {
    if rank <= 3 {
        vec![
            format!("{pref_name} 관련 역량을 더욱 발전시켜보세요."),
            "관련 교육이나 경험 기회를 적극적으로 찾아보세요.".to_string(),
            "이 영역의 전문가나 멘토를 찾아 조언을 구해보세요.".to_string(),
        ]
    } else {
        vec![
            "다른 강점 영역에 더 집중하는 것을 권장합니다.".to_string(),
            "필요시 기본적인 이해 수준으로 학습해보세요.".to_string(),
        ]
    }
}

fn related_activities(pref_name: &str) -> Vec<&'static str> {
    if pref_name.contains("실내") || pref_name.contains("조용") {
        vec!["독서", "연구", "분석 작업", "계획 수립"]
    } else if pref_name.contains("창의") || pref_name.contains("예술") {
        vec!["디자인", "글쓰기", "아이디어 발상", "예술 활동"]
    } else if pref_name.contains("사람") || pref_name.contains("소통") {
        vec!["팀 프로젝트", "발표", "상담", "교육"]
    } else if pref_name.contains("야외") || pref_name.contains("활동") {
        vec!["현장 업무", "체험 활동", "여행", "운동"]
    } else {
        vec!["관련 체험", "학습", "탐색"]
    }
}

fn preference_documents(user_id: Uuid, preferences: &[JsonValue]) -> Vec<Document> {
    let mut documents = Vec::new();

    let names: Vec<&str> = preferences.iter().take(3).filter_map(|p| get_str(p, "preference_name")).collect();
    let overview_summary = if names.is_empty() {
        format!("선호도 분석 결과: {}개 선호 영역", preferences.len())
    } else {
        format!("선호도 분석 결과: {} 등 {}개 선호 영역", names.join(", "), preferences.len())
    };

    let mut ranked: Vec<&JsonValue> = preferences.iter().collect();
    ranked.sort_by_key(|p| get_f64(p, "rank").unwrap_or(999.0) as i64);
    let strong = ranked.iter().filter(|p| get_f64(p, "rank").unwrap_or(999.0) <= 2.0).count();
    let medium = ranked
        .iter()
        .filter(|p| (3.0..=5.0).contains(&get_f64(p, "rank").unwrap_or(999.0)))
        .count();
    let weak = preferences.len() - strong - medium;
    let concentration = if strong >= 3 {
        "집중형"
    } else if medium >= 3 {
        "균형형"
    } else {
        "분산형"
    };

    let mut insights = vec![if preferences.len() >= 8 {
        "다양한 선호 영역이 식별되어 폭넓은 관심사와 적응력을 보여줍니다.".to_string()
    } else if preferences.len() >= 5 {
        "적절한 수의 선호 영역이 있어 균형잡힌 관심사를 나타냅니다.".to_string()
    } else {
        "명확한 선호 영역이 있어 집중적인 관심사를 보여줍니다.".to_string()
    }];
    let top_names: Vec<&str> = ranked.iter().take(3).filter_map(|p| get_str(p, "preference_name")).collect();
    if top_names.len() >= 2 {
        insights.push(format!("상위 선호도인 '{}'와 '{}'이 주요 관심 영역입니다.", top_names[0], top_names[1]));
    }

    let mut recommendations = Vec::new();
    if !top_names.is_empty() {
        recommendations.push("상위 선호도 영역을 중심으로 진로 방향을 설정해보세요.".to_string());
        recommendations.push("선호도 기반 직업 추천을 확인하여 구체적인 직업을 탐색해보세요.".to_string());
    }
    if preferences.len() >= 5 {
        recommendations.push("다양한 선호 영역을 활용할 수 있는 융합적 직업도 고려해보세요.".to_string());
    }
    recommendations.push("성향 분석 결과와 비교하여 일치하는 부분을 확인해보세요.".to_string());

    documents.push(build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "preferences_overview",
        json!({
            "preferences_overview": preferences,
            "total_preferences": preferences.len(),
            "top_preferences": names,
            "insights": insights,
            "preference_distribution": {
                "strong_preferences": strong,
                "medium_preferences": medium,
                "weak_preferences": weak,
                "total_preferences": preferences.len(),
                "concentration_level": concentration,
            },
            "recommendations": recommendations,
        }),
        overview_summary,
        &["preferenceDataQuery"],
    ));

    for (i, pref) in preferences.iter().enumerate() {
        let Some(pref_name) = get_str(pref, "preference_name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let rank = get_f64(pref, "rank").unwrap_or((i + 1) as f64) as i64;
        let response_rate = get_f64(pref, "response_rate").unwrap_or(0.0);
        let description = get_str(pref, "description");

        let mut summary = format!("{pref_name} 선호도: {rank}순위");
        if response_rate > 0.0 {
            summary.push_str(&format!(", 응답률 {response_rate}%"));
        }

        let mut content = pref.clone();
        let obj = content.as_object_mut().expect("preference row is an object");
        obj.insert("rank".to_string(), json!(rank));
        obj.insert("analysis".to_string(), json!(preference_analysis_text(pref_name, rank, description)));
        obj.insert("career_implications".to_string(), json!(career_implications(pref_name, rank)));
        obj.insert(
            "preference_strength".to_string(),
            json!(if rank == 1 {
                "강함"
            } else if rank <= 3 {
                "보통"
            } else {
                "약함"
            }),
        );
        obj.insert("development_suggestions".to_string(), json!(development_suggestions(pref_name, rank)));
        obj.insert("related_activities".to_string(), json!(related_activities(pref_name)));

        let mut doc = build_document(
            user_id,
            DocType::PreferenceAnalysis,
            format!("preference_{rank}"),
            content,
            summary,
            &["preferenceDataQuery"],
        );
        doc.metadata.extra.insert("preference_name".to_string(), json!(pref_name));
        doc.metadata.extra.insert("rank".to_string(), json!(rank));
        documents.push(doc);
    }

    documents
}

fn jobs_documents(user_id: Uuid, jobs: &[JsonValue]) -> Vec<Document> {
    let mut by_preference: HashMap<&str, Vec<&JsonValue>> = HashMap::new();
    for job in jobs {
        let name = get_str(job, "preference_name").unwrap_or("기타");
        by_preference.entry(name).or_default().push(job);
    }

    let total_jobs: usize = by_preference.values().map(Vec::len).sum();
    let pref_count = by_preference.len();

    let mut insights = vec![if total_jobs >= 20 {
        "매우 다양한 직업 옵션이 제시되어 선택의 폭이 넓습니다.".to_string()
    } else if total_jobs >= 10 {
        "적절한 수의 직업 옵션이 있어 구체적인 탐색이 가능합니다.".to_string()
    } else {
        "명확한 직업 방향성이 제시되어 집중적인 탐색이 가능합니다.".to_string()
    }];
    if pref_count >= 4 {
        insights.push("여러 선호 영역에서 직업이 추천되어 다양한 관심사를 반영합니다.".to_string());
    }

    let industries: std::collections::HashSet<&str> = jobs.iter().filter_map(|j| get_str(j, "jo_outline")).collect();
    let diversity_score = (industries.len() as f64 / total_jobs.max(1) as f64 * 100.0).min(100.0);
    let diversity_level = if industries.len() >= 8 {
        "높음"
    } else if industries.len() >= 4 {
        "보통"
    } else {
        "낮음"
    };

    let mut recommendations = Vec::new();
    if let Some((max_pref, max_jobs)) = by_preference.iter().max_by_key(|(_, jobs)| jobs.len()) {
        recommendations.push(format!("'{max_pref}' 영역에서 가장 많은 직업이 추천되므로 우선적으로 탐색해보세요."));
        let _ = max_jobs;
    }
    recommendations.extend(
        [
            "각 선호 영역별 추천 직업을 자세히 검토해보세요.",
            "관심 있는 직업의 구체적인 업무 내용을 조사해보세요.",
            "추천 전공과 현재 전공/관심 분야를 비교해보세요.",
            "성향 기반 직업 추천과 비교하여 일치하는 직업을 찾아보세요.",
        ]
        .map(str::to_string),
    );

    let names: Vec<&str> = jobs.iter().take(5).filter_map(|j| get_str(j, "jo_name")).collect();
    let mut documents = vec![build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "jobs_overview",
        json!({
            "total_jobs": total_jobs,
            "preference_groups": pref_count,
            "insights": insights,
            "career_diversity": {
                "total_jobs": total_jobs,
                "unique_industries": industries.len(),
                "diversity_score": diversity_score,
                "diversity_level": diversity_level,
            },
            "recommendations": recommendations,
        }),
        format!("선호도 기반 추천 직업: {} 등 {}개", names.join(", "), total_jobs),
        &["preferenceJobsQuery"],
    )];

    let mut pref_names: Vec<&&str> = by_preference.keys().collect();
    pref_names.sort();
    for pref_name in pref_names {
        let group = &by_preference[pref_name];

        let mut analysis = format!("'{pref_name}' 선호도를 바탕으로 {}개의 직업이 추천되었습니다. ", group.len());
        analysis.push_str(if group.len() >= 8 {
            "매우 다양한 직업 옵션이 있어 선택의 폭이 넓고, 이 선호도가 여러 분야에서 활용될 수 있음을 보여줍니다. "
        } else if group.len() >= 4 {
            "적절한 수의 직업 옵션이 제공되어 구체적인 진로 탐색이 가능합니다. "
        } else {
            "명확한 직업 방향성이 제시되어 집중적인 탐색이 가능합니다. "
        });
        let outlines: std::collections::HashSet<&str> = group.iter().filter_map(|j| get_str(j, "jo_outline")).collect();
        if !outlines.is_empty() {
            analysis.push_str(if outlines.len() >= 5 {
                "다양한 업무 영역에 걸쳐 추천되어 폭넓은 적용 가능성을 보여줍니다."
            } else {
                "특정 업무 영역에 집중되어 명확한 전문성 방향을 제시합니다."
            });
        }

        let mut industries_map: HashMap<&str, Vec<&str>> = HashMap::new();
        for job in group {
            let outline = get_str(job, "jo_outline").unwrap_or("기타");
            let name = get_str(job, "jo_name").unwrap_or_default();
            industries_map.entry(outline).or_default().push(name);
        }
        let career_paths: Vec<JsonValue> = industries_map
            .iter()
            .filter(|(_, jobs)| jobs.len() >= 2)
            .map(|(outline, jobs)| {
                json!({
                    "path_name": format!("{outline} 분야"),
                    "jobs": jobs,
                    "description": format!("{outline} 영역에서의 다양한 직업 기회"),
                })
            })
            .collect();

        let mut skills: Vec<&str> = Vec::new();
        for job in group {
            if let Some(business) = get_str(job, "jo_mainbusiness") {
                for (needle, skill) in [
                    ("분석", "분석 능력"),
                    ("설계", "설계 능력"),
                    ("개발", "개발 능력"),
                    ("관리", "관리 능력"),
                    ("소통", "소통 능력"),
                    ("상담", "소통 능력"),
                ] {
                    if business.contains(needle) && !skills.contains(&skill) {
                        skills.push(skill);
                    }
                }
            }
        }

        let mut majors: Vec<String> = Vec::new();
        for job in group {
            if let Some(major_info) = get_str(job, "majors") {
                let parts: Vec<&str> = if let Some(d) = [",", "/", "·", "및"].iter().find(|d| major_info.contains(**d)) {
                    major_info.split(d).collect()
                } else {
                    vec![major_info]
                };
                for part in parts {
                    let trimmed = part.trim();
                    if !trimmed.is_empty() && !majors.iter().any(|m| m == trimmed) {
                        majors.push(trimmed.to_string());
                    }
                }
            }
        }

        let steps: Vec<&str> = if group.len() >= 5 {
            vec![
                "관심 있는 상위 3-5개 직업을 선별해보세요.",
                "각 직업의 구체적인 업무 내용과 요구 역량을 조사해보세요.",
                "해당 분야 종사자와의 인터뷰나 멘토링을 고려해보세요.",
                "관련 교육 과정이나 자격증 정보를 확인해보세요.",
                "인턴십이나 체험 프로그램 기회를 찾아보세요.",
            ]
        } else {
            vec![
                "모든 추천 직업을 자세히 검토해보세요.",
                "각 직업의 구체적인 업무 내용과 요구 역량을 조사해보세요.",
                "해당 분야 종사자와의 인터뷰나 멘토링을 고려해보세요.",
                "관련 교육 과정이나 자격증 정보를 확인해보세요.",
                "인턴십이나 체험 프로그램 기회를 찾아보세요.",
            ]
        };

        let dominant_industry = industries_map.iter().max_by_key(|(_, jobs)| jobs.len()).map(|(k, _)| *k);
        let group_names: Vec<&str> = group.iter().take(3).filter_map(|j| get_str(j, "jo_name")).collect();

        let mut doc = build_document(
            user_id,
            DocType::PreferenceAnalysis,
            format!("preference_jobs_{pref_name}"),
            json!({
                "jobs": group,
                "preference_name": pref_name,
                "analysis": analysis,
                "career_paths": career_paths,
                "industry_analysis": {
                    "industry_count": industries_map.len(),
                    "industries": industries_map,
                    "dominant_industry": dominant_industry,
                },
                "skill_requirements": skills,
                "education_recommendations": majors,
                "exploration_steps": steps,
            }),
            format!("{pref_name} 선호도 기반 추천 직업: {}", group_names.join(", ")),
            &["preferenceJobsQuery"],
        );
        doc.metadata.extra.insert("preference_name".to_string(), json!(pref_name));
        documents.push(doc);
    }

    documents
}

fn completion_summary_document(user_id: Uuid, stats: &JsonValue, preferences: &[JsonValue], jobs: &[JsonValue]) -> Document {
    let response_rate = get_f64(stats, "response_rate").unwrap_or(0.0);
    let pref_count = preferences.len();
    let job_count = jobs.len();

    let mut summary = format!("선호도 분석 완료: {pref_count}개 선호 영역, {job_count}개 추천 직업");
    if response_rate > 0.0 {
        summary.push_str(&format!(" (검사 응답률 {response_rate}%)"));
    }

    let mut insights = Vec::new();
    if response_rate >= 80.0 {
        insights.push("검사가 충분히 완료되어 신뢰할 수 있는 분석 결과입니다.".to_string());
    }
    if pref_count >= 5 {
        insights.push("다양한 선호 영역이 식별되어 폭넓은 관심사를 보여줍니다.".to_string());
    }
    if job_count >= 10 {
        insights.push("많은 직업 옵션이 제시되어 선택의 폭이 넓습니다.".to_string());
    }

    let mut ranked: Vec<&JsonValue> = preferences.iter().collect();
    ranked.sort_by_key(|p| get_f64(p, "rank").unwrap_or(999.0) as i64);
    let top_preferences: Vec<&str> = ranked.iter().take(3).filter_map(|p| get_str(p, "preference_name")).collect();

    let score = quality_score(response_rate, pref_count, job_count);

    build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "completion_summary",
        json!({
            "completion_status": "완료",
            "response_rate": response_rate,
            "preference_count": pref_count,
            "job_count": job_count,
            "top_preferences": top_preferences,
            "insights": insights,
            "quality_score": score,
            "recommendation": "모든 선호도 분석 결과를 종합적으로 검토하여 진로 방향을 설정해보세요.",
        }),
        summary,
        &["imagePreferenceStatsQuery", "preferenceDataQuery", "preferenceJobsQuery"],
    )
}

fn fallback_document(user_id: Uuid, available: &Availability) -> Document {
    let mut missing = Vec::new();
    if !available.stats {
        missing.push("이미지 선호도 검사 통계");
    }
    if !available.preferences {
        missing.push("선호도 분석 결과");
    }
    if !available.jobs {
        missing.push("선호도 기반 직업 추천");
    }

    let explanation = if missing.len() == 3 {
        "현재 이미지 선호도 분석과 관련된 모든 데이터를 이용할 수 없습니다.\n\n\
         이는 다음과 같은 이유일 수 있습니다:\n\
         • 이미지 선호도 검사를 아직 시작하지 않았거나 완료하지 않았습니다\n\
         • 검사는 완료했지만 결과 처리가 아직 진행 중입니다\n\
         • 검사 응답률이 낮아 신뢰할 수 있는 분석이 어렵습니다\n\
         • 일시적인 시스템 처리 지연이 발생했습니다\n\
         • 검사 데이터에 오류가 있어 재처리가 필요합니다"
            .to_string()
    } else if missing.len() == 2 {
        format!(
            "현재 다음 선호도 분석 데이터를 이용할 수 없습니다:\n{}\n\n\
             이는 검사가 부분적으로만 완료되었거나, 일부 데이터 처리가 지연되고 있을 수 있습니다.",
            missing.iter().map(|c| format!("• {c}")).collect::<Vec<_>>().join("\n")
        )
    } else {
        let component = missing[0];
        let detail = if component.contains("통계") {
            "검사 통계 정보는 처리 중이지만, 다른 선호도 분석 결과는 확인하실 수 있습니다."
        } else if component.contains("분석 결과") {
            "선호도 분석은 처리 중이지만, 검사 통계와 직업 추천은 확인하실 수 있습니다."
        } else {
            "직업 추천은 처리 중이지만, 다른 선호도 분석 결과는 확인하실 수 있습니다."
        };
        format!("현재 {component} 데이터를 이용할 수 없습니다.\n\n{detail}")
    };

    let recommendation = if missing.len() == 3 {
        "이미지 선호도 검사를 완료하지 않으셨다면 먼저 검사를 진행해보세요. \
         검사를 완료하셨다면 잠시 후 다시 확인해보시거나, \
         다른 분석 결과를 먼저 살펴보시는 것을 추천합니다."
    } else if missing.len() == 2 {
        "일부 선호도 데이터는 처리 중입니다. \
         이용 가능한 다른 분석 결과를 먼저 확인해보시고, \
         선호도 분석은 잠시 후 다시 시도해보세요."
    } else {
        "대부분의 선호도 분석 결과는 이용 가능합니다. \
         현재 이용 가능한 결과를 먼저 확인해보시고, \
         누락된 부분은 잠시 후 다시 확인해보세요."
    };

    let next_steps: Vec<&str> = if missing.len() == 3 {
        vec![
            "이미지 선호도 검사 완료 여부를 확인해보세요",
            "성향 분석 결과부터 확인해보세요",
            "사고력 분석으로 인지 능력을 파악해보세요",
            "역량 분석으로 강점 영역을 확인해보세요",
            "30분 후 선호도 분석을 다시 시도해보세요",
        ]
    } else if missing.contains(&"이미지 선호도 검사 통계") {
        vec!["이용 가능한 선호도 분석 결과를 먼저 확인해보세요", "검사 통계는 잠시 후 다시 확인해보세요"]
    } else if missing.contains(&"선호도 분석 결과") {
        vec!["검사 통계를 통해 검사 완료 상태를 확인해보세요", "선호도 기반 직업 추천을 먼저 살펴보세요"]
    } else {
        vec!["현재 이용 가능한 선호도 분석을 확인해보세요", "성향 기반 직업 추천과 비교해보세요"]
    };

    let availability = json!({
        "검사_통계": if available.stats { "이용 가능" } else { "처리 중" },
        "선호도_분석": if available.preferences { "이용 가능" } else { "처리 중" },
        "직업_추천": if available.jobs { "이용 가능" } else { "처리 중" },
    });

    build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "unavailable",
        json!({
            "status": "데이터 준비 중",
            "missing_components": missing,
            "explanation": explanation,
            "recommendation": recommendation,
            "data_availability": availability,
            "next_steps": next_steps,
        }),
        "선호도 분석: 데이터 준비 중 - 다른 분석 결과 이용 가능",
        &[],
    )
}

fn partial_document(user_id: Uuid, available: &Availability) -> Document {
    let mut available_components = Vec::new();
    let mut missing_components = Vec::new();
    for (flag, label) in [
        (available.stats, "이미지 선호도 검사 통계"),
        (available.preferences, "선호도 분석 결과"),
        (available.jobs, "선호도 기반 직업 추천"),
    ] {
        if flag {
            available_components.push(label);
        } else {
            missing_components.push(label);
        }
    }

    let mut explanation = "선호도 분석이 부분적으로 완료되었습니다.\n\n**이용 가능한 데이터:**\n".to_string();
    explanation.push_str(&available_components.iter().map(|c| format!("✅ {c}")).collect::<Vec<_>>().join("\n"));
    explanation.push_str("\n\n**처리 중인 데이터:**\n");
    explanation.push_str(&missing_components.iter().map(|c| format!("⏳ {c}")).collect::<Vec<_>>().join("\n"));
    explanation.push_str(
        "\n\n현재 이용 가능한 데이터로도 의미 있는 선호도 분석을 제공할 수 있습니다. \
         누락된 데이터는 처리가 완료되는 대로 추가될 예정입니다.",
    );

    let summary = format!("선호도 분석: 부분 완료 ({}/3 항목 이용 가능)", available_components.len());

    build_document(
        user_id,
        DocType::PreferenceAnalysis,
        "partial_available",
        json!({
            "status": "부분 완료",
            "available_components": available_components,
            "missing_components": missing_components,
            "explanation": explanation,
            "completion_percentage": available_components.len() as f64 / 3.0 * 100.0,
            "recommendation": "현재 이용 가능한 선호도 분석을 먼저 확인해보시고, 추가 데이터는 잠시 후 다시 확인해보세요.",
        }),
        summary,
        &[],
    )
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
    fn no_preference_data_yields_fallback_document() {
        let queries = QueryResultMap::from_results(&[]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.sub_type, "unavailable");
    }

    #[test]
    fn only_stats_available_yields_partial_plus_stats_document() {
        let stats = json!({"total_image_count": 50, "response_count": 40, "response_rate": 80.0});
        let queries = QueryResultMap::from_results(&[result("imagePreferenceStatsQuery", vec![stats])]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.sub_type, "partial_available");
        assert_eq!(docs[1].metadata.sub_type, "test_stats");
    }

    #[test]
    fn full_data_yields_completion_summary() {
        let stats = json!({"total_image_count": 50, "response_count": 48, "response_rate": 96.0});
        let prefs = vec![json!({"preference_name": "예술형", "rank": 1, "response_rate": 90.0})];
        let jobs = vec![json!({"jo_name": "디자이너", "preference_name": "예술형", "jo_outline": "디자인"})];
        let queries = QueryResultMap::from_results(&[
            result("imagePreferenceStatsQuery", vec![stats]),
            result("preferenceDataQuery", prefs),
            result("preferenceJobsQuery", jobs),
        ]);
        let docs = chunk(Uuid::new_v4(), &queries);
        assert_eq!(docs.last().unwrap().metadata.sub_type, "completion_summary");
    }

    #[test]
    fn quality_score_caps_at_one_hundred() {
        assert_eq!(quality_score(95.0, 10, 20), 100.0);
    }

    #[test]
    fn jobs_are_grouped_and_named_by_preference() {
        let jobs = vec![
            json!({"jo_name": "디자이너", "preference_name": "예술형", "jo_outline": "디자인"}),
            json!({"jo_name": "일러스트레이터", "preference_name": "예술형", "jo_outline": "디자인"}),
        ];
        let queries = QueryResultMap::from_results(&[result("preferenceJobsQuery", jobs)]);
        let docs = jobs_documents(Uuid::new_v4(), queries.rows("preferenceJobsQuery"));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].metadata.sub_type, "preference_jobs_예술형");
    }
}
