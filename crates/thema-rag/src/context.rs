//! Context Builder (§4.J): retrieval + re-ranking of documents, prompt
//! template selection, prompt assembly, and token-budget enforcement.
//!
//! Grounded on `original_source/rag/context_builder.py` for the retrieval
//! ladder, the relevance re-scoring formula, and the template/prompt table;
//! and on `thema_core::tokenizer::estimate_tokens`'s `len/3` idiom for the
//! token-budget ladder.

use std::sync::Arc;

use serde_json::Value;

use thema_core::defaults::{CONTEXT_RETRIEVAL_LIMIT, CONTEXT_TOP_K, SEARCH_DEFAULT_THRESHOLD, SEARCH_RETRY_THRESHOLD, TOKEN_BUDGET_DEFAULT};
use thema_core::traits::{SearchQuery, SearchRanking, SimilarityMetric, VectorSearch};
use thema_core::{DocType, Document};

use crate::question::{ProcessedQuestion, QuestionCategory, QuestionIntent};

/// Prompt template selected for one constructed context (§4.J). Fifteen
/// variants: the twelve category/intent templates plus three
/// preference-specific templates chosen post-retrieval based on how
/// complete the user's preference-analysis data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    PersonalityExplain,
    PersonalityCompare,
    CareerRecommend,
    CareerExplain,
    ThinkingSkillsAnalyze,
    ThinkingSkillsCompare,
    LearningStyleRecommend,
    CompetencyAnalyze,
    GeneralCompare,
    StatisticalInfo,
    FollowUp,
    Default_,
    PreferenceExplain,
    PreferencePartial,
    PreferenceMissing,
}

impl PromptTemplate {
    fn template_str(&self) -> &'static str {
        match self {
            PromptTemplate::PersonalityExplain => "\n당신은 적성검사 결과를 분석하고 설명하는 전문 상담사입니다. 사용자의 성격 유형에 대해 자세히 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 성격 유형을 친근하고 이해하기 쉽게 설명해주세요. 구체적인 특징과 장점을 포함하여 답변해주세요.\n",
            PromptTemplate::PersonalityCompare => "\n당신은 적성검사 결과를 분석하는 전문 상담사입니다. 사용자의 성격을 다른 사람들과 비교하여 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 성격이 일반적인 사람들과 어떻게 다른지, 어떤 점이 특별한지 비교하여 설명해주세요. 백분위나 순위 정보가 있다면 포함해주세요.\n",
            PromptTemplate::CareerRecommend => "\n당신은 진로 상담 전문가입니다. 사용자의 적성검사 결과를 바탕으로 적합한 직업을 추천해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자에게 적합한 직업들을 추천하고, 왜 그 직업이 적합한지 성격과 능력을 연결하여 구체적으로 설명해주세요.\n",
            PromptTemplate::CareerExplain => "\n당신은 진로 상담 전문가입니다. 사용자의 적성검사 결과와 직업 추천에 대해 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 추천된 직업들이 왜 사용자에게 적합한지, 어떤 성격적 특성이나 능력이 해당 직업과 잘 맞는지 자세히 설명해주세요.\n",
            PromptTemplate::ThinkingSkillsAnalyze => "\n당신은 인지능력 평가 전문가입니다. 사용자의 사고 능력에 대해 분석하여 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 8가지 사고 능력(언어, 수리, 공간, 추리, 지각속도, 기억력, 어학, 창의력)을 분석하여 강점과 약점을 설명해주세요.\n",
            PromptTemplate::ThinkingSkillsCompare => "\n당신은 인지능력 평가 전문가입니다. 사용자의 사고 능력을 다른 사람들과 비교하여 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 사고 능력이 또래나 일반인들과 비교했을 때 어떤 수준인지, 특히 뛰어난 영역이나 보완이 필요한 영역을 설명해주세요.\n",
            PromptTemplate::LearningStyleRecommend => "\n당신은 학습 방법 전문가입니다. 사용자의 적성에 맞는 학습 방법을 추천해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 성격과 사고 능력에 맞는 효과적인 학습 방법과 공부 전략을 구체적으로 추천해주세요.\n",
            PromptTemplate::CompetencyAnalyze => "\n당신은 역량 분석 전문가입니다. 사용자의 핵심 역량과 재능에 대해 분석해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 상위 5개 재능과 역량을 분석하고, 이를 어떻게 활용할 수 있는지 구체적으로 설명해주세요.\n",
            PromptTemplate::GeneralCompare => "\n당신은 적성검사 분석 전문가입니다. 사용자의 전반적인 검사 결과를 비교 분석해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 성격, 사고능력, 역량 등을 종합적으로 분석하고 다른 사람들과 비교하여 설명해주세요.\n",
            PromptTemplate::StatisticalInfo => "\n당신은 적성검사 통계 분석 전문가입니다. 사용자의 검사 결과에 대한 통계적 정보를 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자의 점수, 백분위, 순위 등 통계적 정보를 이해하기 쉽게 설명해주세요.\n",
            PromptTemplate::FollowUp => "\n당신은 적성검사 상담 전문가입니다. 이전 대화의 맥락을 고려하여 추가 질문에 답변해주세요.\n\n이전 맥락: {previous_context}\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n이전 대화의 맥락을 고려하여 사용자의 추가 질문에 자세히 답변해주세요.\n",
            PromptTemplate::Default_ => "\n당신은 적성검사 결과 상담 전문가입니다. 사용자의 질문에 대해 검사 결과를 바탕으로 답변해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 검사 결과를 바탕으로 사용자의 질문에 친근하고 전문적으로 답변해주세요.\n",
            PromptTemplate::PreferenceExplain => "\n당신은 선호도 분석 전문가입니다. 사용자의 이미지 선호도 검사 결과를 바탕으로 선호 경향을 설명해주세요.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n위 결과를 바탕으로 사용자가 어떤 유형의 이미지나 활동을 선호하는지 구체적인 수치와 함께 설명해주세요.\n",
            PromptTemplate::PreferencePartial => "\n당신은 선호도 분석 전문가입니다. 사용자의 선호도 데이터 중 일부만 준비되어 있습니다.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n현재 준비된 데이터만을 근거로 답변하고, 아직 집계되지 않은 항목에 대해서는 단정적인 수치를 만들어내지 마세요.\n",
            PromptTemplate::PreferenceMissing => "\n당신은 선호도 분석 전문가입니다. 사용자의 선호도 분석 데이터가 아직 준비되지 않았습니다.\n\n사용자 질문: {question}\n\n관련 검사 결과:\n{context_documents}\n\n선호도 데이터가 없다는 점을 분명히 안내하고, 다른 검사 결과로 대체 가능한 안내를 제공해주세요.\n",
        }
    }
}

/// How complete a user's preference-analysis documents are (§4.J/§4.K).
/// Shared between template selection here and the guardrail checks the
/// Response Generator runs over the same retrieved documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceDataAvailability {
    pub has_preference_docs: bool,
    pub completion_level: PreferenceCompletionLevel,
    pub available_components: Vec<&'static str>,
    pub missing_components: Vec<&'static str>,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceCompletionLevel {
    Missing,
    Partial,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataQuality {
    None,
    Low,
    Medium,
    High,
}

const FALLBACK_INDICATORS: [&str; 3] = ["데이터 준비 중", "찾을 수 없습니다", "준비되지 않았습니다"];

/// Inspects every retrieved `PREFERENCE_ANALYSIS` document's content for
/// `stats`/`preferences`/`jobs` components (§4.K's guardrail check).
pub fn assess_preference_data_availability(documents: &[RetrievedDocument]) -> PreferenceDataAvailability {
    let preference_docs: Vec<&RetrievedDocument> = documents
        .iter()
        .filter(|d| d.document.doc_type == DocType::PreferenceAnalysis)
        .collect();

    if preference_docs.is_empty() {
        return PreferenceDataAvailability {
            has_preference_docs: false,
            completion_level: PreferenceCompletionLevel::Missing,
            available_components: vec![],
            missing_components: vec!["stats", "preferences", "jobs"],
            data_quality: DataQuality::None,
        };
    }

    let mut available = Vec::new();
    let mut missing = Vec::new();
    let mut saw_complete = false;

    for doc in &preference_docs {
        let content = &doc.document.content;

        if content.get("stats").map(|v| !v.is_null()).unwrap_or(false) {
            available.push("stats");
        } else {
            missing.push("stats");
        }
        if content.get("preferences").and_then(|v| v.as_array()).map(|a| !a.is_empty()).unwrap_or(false) {
            available.push("preferences");
        } else {
            missing.push("preferences");
        }
        if content.get("jobs").and_then(|v| v.as_array()).map(|a| !a.is_empty()).unwrap_or(false) {
            available.push("jobs");
        } else {
            missing.push("jobs");
        }

        if doc.document.metadata.completion_level.as_str() == "complete" {
            saw_complete = true;
        }

        let content_str = content.to_string().to_lowercase();
        if FALLBACK_INDICATORS.iter().any(|i| content_str.contains(i)) {
            missing.extend(["stats", "preferences", "jobs"]);
        }
    }

    available.sort_unstable();
    available.dedup();
    missing.sort_unstable();
    missing.dedup();

    let (completion_level, data_quality) = if saw_complete && missing.is_empty() {
        (PreferenceCompletionLevel::Complete, DataQuality::High)
    } else if !available.is_empty() {
        let quality = if available.len() >= 2 { DataQuality::Medium } else { DataQuality::Low };
        (PreferenceCompletionLevel::Partial, quality)
    } else {
        (PreferenceCompletionLevel::Missing, DataQuality::None)
    };

    PreferenceDataAvailability {
        has_preference_docs: true,
        completion_level,
        available_components: available,
        missing_components: missing,
        data_quality,
    }
}

/// A document retrieved from vector search, re-ranked by [`RelevanceScore`]
/// formula and annotated with extracted key points (§4.J).
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub document: Document,
    pub similarity_score: f32,
    pub relevance_score: f32,
    pub content_summary: String,
    pub key_points: Vec<String>,
}

/// Complete context assembled for the Response Generator's LLM call.
#[derive(Debug, Clone)]
pub struct ConstructedContext {
    pub user_question: String,
    pub retrieved_documents: Vec<RetrievedDocument>,
    pub prompt_template: PromptTemplate,
    pub formatted_prompt: String,
    pub token_count_estimate: usize,
    pub truncated: bool,
}

/// Context Builder (§4.J).
pub struct ContextBuilder {
    vector_search: Arc<dyn VectorSearch>,
    max_context_tokens: usize,
}

impl ContextBuilder {
    pub fn new(vector_search: Arc<dyn VectorSearch>) -> Self {
        Self { vector_search, max_context_tokens: TOKEN_BUDGET_DEFAULT }
    }

    pub fn with_max_context_tokens(mut self, max_context_tokens: usize) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    pub async fn build_context(
        &self,
        processed: &ProcessedQuestion,
        user_id: uuid::Uuid,
        previous_context: Option<&str>,
    ) -> ConstructedContext {
        let retrieved = self.retrieve_and_rank_documents(processed, user_id).await;
        let template = self.select_prompt_template(processed, &retrieved);
        let formatted_docs = format_documents_for_prompt(&retrieved);
        let mut formatted_prompt = construct_prompt(template, &processed.original_text, &formatted_docs, previous_context);
        let mut token_estimate = thema_core::tokenizer::estimate_tokens(&formatted_prompt);
        let mut truncated = false;
        let mut retrieved = retrieved;

        if token_estimate > self.max_context_tokens {
            let (new_prompt, new_docs) = truncate_context(
                &retrieved,
                template,
                &processed.original_text,
                previous_context,
                self.max_context_tokens,
            );
            formatted_prompt = new_prompt;
            retrieved = new_docs;
            token_estimate = thema_core::tokenizer::estimate_tokens(&formatted_prompt);
            truncated = true;
        }

        ConstructedContext {
            user_question: processed.original_text.clone(),
            retrieved_documents: retrieved,
            prompt_template: template,
            formatted_prompt,
            token_count_estimate: token_estimate,
            truncated,
        }
    }

    async fn retrieve_and_rank_documents(&self, processed: &ProcessedQuestion, user_id: uuid::Uuid) -> Vec<RetrievedDocument> {
        let doc_types: Option<Vec<DocType>> = if processed.requires_specific_docs.is_empty() {
            None
        } else {
            Some(
                processed
                    .requires_specific_docs
                    .iter()
                    .filter_map(|s| s.parse().ok())
                    .collect(),
            )
        };

        let mut query = SearchQuery {
            user_id,
            vector: processed.embedding.clone(),
            metric: SimilarityMetric::Cosine,
            threshold: SEARCH_DEFAULT_THRESHOLD,
            limit: CONTEXT_RETRIEVAL_LIMIT,
            doc_types: doc_types.clone(),
            ranking: SearchRanking::Hybrid,
            text_query: None,
        };

        let mut results = match self.vector_search.similarity_search(query.clone()).await {
            Ok(r) => r,
            Err(_) => return vec![],
        };

        if results.is_empty() {
            query.threshold = SEARCH_RETRY_THRESHOLD;
            results = self.vector_search.similarity_search(query.clone()).await.unwrap_or_default();
        }

        if results.is_empty() && doc_types.is_some() {
            query.doc_types = None;
            query.threshold = SEARCH_RETRY_THRESHOLD;
            results = self.vector_search.similarity_search(query).await.unwrap_or_default();
        }

        let mut retrieved: Vec<RetrievedDocument> = results
            .into_iter()
            .map(|r| {
                let relevance_score = calculate_relevance_score(&r.document, processed, r.similarity);
                let key_points = extract_key_points(&r.document);
                let content_summary = create_content_summary(&r.document);
                RetrievedDocument {
                    document: r.document,
                    similarity_score: r.similarity,
                    relevance_score,
                    content_summary,
                    key_points,
                }
            })
            .collect();

        retrieved.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
        retrieved.truncate(CONTEXT_TOP_K);
        retrieved
    }

    fn select_prompt_template(&self, processed: &ProcessedQuestion, retrieved: &[RetrievedDocument]) -> PromptTemplate {
        if processed.intent == QuestionIntent::FollowUp {
            return PromptTemplate::FollowUp;
        }

        if processed.category == QuestionCategory::PreferenceAnalysis {
            let availability = assess_preference_data_availability(retrieved);
            return match availability.completion_level {
                PreferenceCompletionLevel::Complete => PromptTemplate::PreferenceExplain,
                PreferenceCompletionLevel::Partial => PromptTemplate::PreferencePartial,
                PreferenceCompletionLevel::Missing => PromptTemplate::PreferenceMissing,
            };
        }

        match (processed.category, processed.intent) {
            (QuestionCategory::Personality, QuestionIntent::Explain) => PromptTemplate::PersonalityExplain,
            (QuestionCategory::Personality, QuestionIntent::Compare) => PromptTemplate::PersonalityCompare,
            (QuestionCategory::CareerRecommendations, QuestionIntent::Recommend) => PromptTemplate::CareerRecommend,
            (QuestionCategory::CareerRecommendations, QuestionIntent::Explain) => PromptTemplate::CareerExplain,
            (QuestionCategory::ThinkingSkills, QuestionIntent::Analyze) => PromptTemplate::ThinkingSkillsAnalyze,
            (QuestionCategory::ThinkingSkills, QuestionIntent::Compare) => PromptTemplate::ThinkingSkillsCompare,
            (QuestionCategory::LearningStyle, QuestionIntent::Recommend) => PromptTemplate::LearningStyleRecommend,
            (QuestionCategory::CompetencyAnalysis, QuestionIntent::Analyze) => PromptTemplate::CompetencyAnalyze,
            (QuestionCategory::GeneralComparison, QuestionIntent::Compare) => PromptTemplate::GeneralCompare,
            (QuestionCategory::StatisticalInfo, QuestionIntent::Explain) => PromptTemplate::StatisticalInfo,
            _ => PromptTemplate::Default_,
        }
    }
}

fn calculate_relevance_score(document: &Document, processed: &ProcessedQuestion, similarity: f32) -> f32 {
    let mut relevance = similarity;

    if processed.requires_specific_docs.iter().any(|d| d == document.doc_type.as_str()) {
        relevance += 0.2;
    }

    let doc_text = document.summary_text.to_lowercase();
    let keyword_matches = processed.keywords.iter().filter(|k| doc_text.contains(&k.to_lowercase())).count();
    relevance += (keyword_matches as f32 * 0.1).min(0.3);

    let content_richness = document.content.to_string().len() as f32 / 1000.0;
    relevance += (content_richness * 0.1).min(0.2);

    relevance.min(1.0)
}

fn extract_key_points(document: &Document) -> Vec<String> {
    let content = &document.content;
    let mut points = Vec::new();

    match document.doc_type {
        DocType::PersonalityProfile => {
            if let Some(name) = content.get("primary_tendency").and_then(|v| v.get("name")).and_then(Value::as_str) {
                points.push(format!("주요 성향: {name}"));
            }
            if let Some(name) = content.get("secondary_tendency").and_then(|v| v.get("name")).and_then(Value::as_str) {
                points.push(format!("보조 성향: {name}"));
            }
            if let Some(top) = content.get("top_tendencies").and_then(Value::as_array) {
                for (i, tendency) in top.iter().take(3).enumerate() {
                    let name = tendency.get("name").and_then(Value::as_str).unwrap_or("");
                    let score = tendency.get("score").map(value_display).unwrap_or_default();
                    points.push(format!("{}위: {name} ({score}점)", i + 1));
                }
            }
        }
        DocType::ThinkingSkills => {
            if let Some(skills) = content.get("skills").and_then(Value::as_array) {
                for skill in skills.iter().take(3) {
                    let name = skill.get("name").and_then(Value::as_str).unwrap_or("");
                    let score = skill.get("score").map(value_display).unwrap_or_default();
                    points.push(format!("{name}: {score}점"));
                }
            }
        }
        DocType::CareerRecommendations => {
            if let Some(jobs) = content.get("recommended_jobs").and_then(Value::as_array) {
                for job in jobs.iter().take(3) {
                    let name = job.get("name").and_then(Value::as_str).unwrap_or("");
                    points.push(format!("추천 직업: {name}"));
                }
            }
        }
        DocType::CompetencyAnalysis => {
            if let Some(comps) = content.get("top_competencies").and_then(Value::as_array) {
                for comp in comps.iter().take(3) {
                    let name = comp.get("name").and_then(Value::as_str).unwrap_or("");
                    let percentile = comp.get("percentile").map(value_display).unwrap_or_default();
                    points.push(format!("핵심 역량: {name} ({percentile}%)"));
                }
            }
        }
        _ => {}
    }

    if points.is_empty() {
        let mut truncated: String = document.summary_text.chars().take(100).collect();
        truncated.push_str("...");
        points.push(truncated);
    }

    points.truncate(5);
    points
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn create_content_summary(document: &Document) -> String {
    if document.summary_text.chars().count() <= 200 {
        return document.summary_text.clone();
    }

    let content = &document.content;
    match document.doc_type {
        DocType::PersonalityProfile => {
            let primary = content.get("primary_tendency").and_then(|v| v.get("name")).and_then(Value::as_str).unwrap_or("");
            let secondary = content.get("secondary_tendency").and_then(|v| v.get("name")).and_then(Value::as_str).unwrap_or("");
            format!("주요 성향: {primary}, 보조 성향: {secondary}")
        }
        DocType::ThinkingSkills => {
            let names: Vec<&str> = content
                .get("skills")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().take(2).filter_map(|s| s.get("name").and_then(Value::as_str)).collect())
                .unwrap_or_default();
            format!("주요 사고능력: {}", names.join(", "))
        }
        DocType::CareerRecommendations => {
            let names: Vec<&str> = content
                .get("recommended_jobs")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().take(2).filter_map(|j| j.get("name").and_then(Value::as_str)).collect())
                .unwrap_or_default();
            format!("추천 직업: {}", names.join(", "))
        }
        _ => {
            if document.summary_text.is_empty() {
                "검사 결과 데이터".to_string()
            } else {
                let mut truncated: String = document.summary_text.chars().take(150).collect();
                truncated.push_str("...");
                truncated
            }
        }
    }
}

fn format_documents_for_prompt(retrieved: &[RetrievedDocument]) -> String {
    if retrieved.is_empty() {
        return "관련 검사 결과를 찾을 수 없습니다. 적성검사를 완료하셨는지 확인해 주세요.".to_string();
    }

    let mut parts = Vec::new();
    for (i, doc) in retrieved.iter().enumerate() {
        let mut section = format!("\n=== 검사 결과 {}: {} ===\n", i + 1, doc.document.doc_type);
        section.push_str(&format!("요약: {}\n", doc.content_summary));

        if !doc.key_points.is_empty() {
            section.push_str("주요 내용:\n");
            for point in &doc.key_points {
                section.push_str(&format!("- {point}\n"));
            }
        }

        let pretty = serde_json::to_string_pretty(&doc.document.content).unwrap_or_else(|_| doc.document.summary_text.clone());
        section.push_str(&format!("\n상세 데이터:\n{pretty}\n"));
        parts.push(section);
    }
    parts.join("\n")
}

fn construct_prompt(template: PromptTemplate, question: &str, formatted_docs: &str, previous_context: Option<&str>) -> String {
    let template_str = template.template_str();
    let mut result = template_str.replace("{question}", question).replace("{context_documents}", formatted_docs);
    if template == PromptTemplate::FollowUp {
        result = result.replace("{previous_context}", previous_context.unwrap_or(""));
    }
    result
}

fn truncate_context(
    retrieved: &[RetrievedDocument],
    template: PromptTemplate,
    question: &str,
    previous_context: Option<&str>,
    max_context_tokens: usize,
) -> (String, Vec<RetrievedDocument>) {
    let mut max_docs = retrieved.len();

    while max_docs > 1 {
        let truncated_docs = &retrieved[..max_docs];
        let formatted = format_documents_for_prompt(truncated_docs);
        let prompt = construct_prompt(template, question, &formatted, previous_context);
        if thema_core::tokenizer::estimate_tokens(&prompt) <= max_context_tokens {
            return (prompt, truncated_docs.to_vec());
        }
        max_docs -= 1;
    }

    if let Some(doc) = retrieved.first() {
        let minimal = format!("검사 결과: {}", doc.content_summary);
        let prompt = construct_prompt(template, question, &minimal, previous_context);
        return (prompt, vec![doc.clone()]);
    }

    let fallback = format!("사용자 질문: {question}\n\n검사 결과 데이터를 불러올 수 없습니다. 일반적인 조언을 제공해주세요.");
    (fallback, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use thema_core::traits::SearchResult;
    use thema_core::{CompletionLevel, Result};

    struct EmptySearch;

    #[async_trait]
    impl VectorSearch for EmptySearch {
        async fn similarity_search(&self, _query: SearchQuery) -> Result<Vec<SearchResult>> {
            Ok(vec![])
        }
        async fn search_by_document_type(&self, _user_id: uuid::Uuid, _vector: pgvector::Vector, _doc_type: DocType, _limit: i64) -> Result<Vec<SearchResult>> {
            Ok(vec![])
        }
        async fn get_similar_documents(&self, _doc_id: uuid::Uuid, _limit: i64) -> Result<Vec<SearchResult>> {
            Ok(vec![])
        }
    }

    fn processed(category: QuestionCategory, intent: QuestionIntent) -> ProcessedQuestion {
        ProcessedQuestion {
            original_text: "질문".to_string(),
            cleaned_text: "질문?".to_string(),
            category,
            intent,
            embedding: pgvector::Vector::from(vec![0.0; 768]),
            keywords: vec![],
            confidence_score: 0.5,
            context_from_previous: None,
            requires_specific_docs: vec![],
        }
    }

    #[tokio::test]
    async fn empty_search_results_yield_no_results_template_and_empty_context_not_found_message() {
        let builder = ContextBuilder::new(Arc::new(EmptySearch));
        let q = processed(QuestionCategory::Personality, QuestionIntent::Explain);
        let context = builder.build_context(&q, uuid::Uuid::new_v4(), None).await;
        assert!(context.retrieved_documents.is_empty());
        assert!(context.formatted_prompt.contains("관련 검사 결과를 찾을 수 없습니다"));
        assert_eq!(context.prompt_template, PromptTemplate::PersonalityExplain);
    }

    #[test]
    fn select_template_follow_up_wins_over_category() {
        let doc = mock_retrieved_doc(DocType::PreferenceAnalysis, serde_json::json!({}));
        let builder_select = |processed: &ProcessedQuestion, docs: &[RetrievedDocument]| -> PromptTemplate {
            if processed.intent == QuestionIntent::FollowUp {
                return PromptTemplate::FollowUp;
            }
            if processed.category == QuestionCategory::PreferenceAnalysis {
                let availability = assess_preference_data_availability(docs);
                return match availability.completion_level {
                    PreferenceCompletionLevel::Complete => PromptTemplate::PreferenceExplain,
                    PreferenceCompletionLevel::Partial => PromptTemplate::PreferencePartial,
                    PreferenceCompletionLevel::Missing => PromptTemplate::PreferenceMissing,
                };
            }
            PromptTemplate::Default_
        };
        let q = processed(QuestionCategory::PreferenceAnalysis, QuestionIntent::FollowUp);
        assert_eq!(builder_select(&q, &[doc]), PromptTemplate::FollowUp);
    }

    fn mock_retrieved_doc(doc_type: DocType, content: Value) -> RetrievedDocument {
        RetrievedDocument {
            document: Document::new(uuid::Uuid::new_v4(), doc_type, "sub", content, "요약", CompletionLevel::Complete),
            similarity_score: 0.9,
            relevance_score: 0.9,
            content_summary: "요약".to_string(),
            key_points: vec![],
        }
    }

    #[test]
    fn preference_availability_missing_without_docs() {
        let availability = assess_preference_data_availability(&[]);
        assert_eq!(availability.completion_level, PreferenceCompletionLevel::Missing);
        assert!(!availability.has_preference_docs);
    }

    #[test]
    fn preference_availability_partial_with_some_components() {
        let doc = mock_retrieved_doc(DocType::PreferenceAnalysis, serde_json::json!({"stats": {"a": 1}}));
        let availability = assess_preference_data_availability(&[doc]);
        assert_eq!(availability.completion_level, PreferenceCompletionLevel::Partial);
        assert!(availability.available_components.contains(&"stats"));
    }

    #[test]
    fn preference_availability_complete_when_metadata_says_so_and_all_components_present() {
        let mut doc = mock_retrieved_doc(
            DocType::PreferenceAnalysis,
            serde_json::json!({"stats": {"a": 1}, "preferences": [1], "jobs": [1]}),
        );
        doc.document.metadata.completion_level = CompletionLevel::Complete;
        let availability = assess_preference_data_availability(&[doc]);
        assert_eq!(availability.completion_level, PreferenceCompletionLevel::Complete);
        assert_eq!(availability.data_quality, DataQuality::High);
    }

    #[test]
    fn relevance_score_boosts_for_matching_type_and_keywords() {
        let doc = Document::new(
            uuid::Uuid::new_v4(),
            DocType::PersonalityProfile,
            "sub",
            serde_json::json!({"x": 1}),
            "성격 요약",
            CompletionLevel::Complete,
        );
        let mut q = processed(QuestionCategory::Personality, QuestionIntent::Explain);
        q.requires_specific_docs = vec!["PERSONALITY_PROFILE".to_string()];
        q.keywords = vec!["성격".to_string()];
        let score = calculate_relevance_score(&doc, &q, 0.5);
        assert!(score > 0.5);
    }

    #[test]
    fn format_documents_numbers_sections_and_includes_summary() {
        let doc = mock_retrieved_doc(DocType::PersonalityProfile, serde_json::json!({"a": 1}));
        let formatted = format_documents_for_prompt(&[doc]);
        assert!(formatted.contains("검사 결과 1"));
        assert!(formatted.contains("요약: 요약"));
    }

    #[test]
    fn truncate_context_falls_back_to_question_only_when_no_documents() {
        let (prompt, docs) = truncate_context(&[], PromptTemplate::Default_, "질문", None, 10);
        assert!(prompt.contains("검사 결과 데이터를 불러올 수 없습니다"));
        assert!(docs.is_empty());
    }
}
