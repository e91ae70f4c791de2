//! Response Generator (§4.K): turns a [`ConstructedContext`] into a final
//! Korean-language answer, with conversation memory, retry/backoff over the
//! generation backend, quality scoring, and preference-hallucination
//! guardrails.
//!
//! Grounded on `original_source/rag/response_generator.py` for the
//! validation regexes, the quality/confidence scoring tables, and every
//! Korean disclaimer/suggestion string (ported verbatim), and on
//! `thema-etl::orchestrator::ETLOrchestrator`'s retry/backoff shape for
//! `call_llm_with_retry`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use thema_core::models::ConversationTurn;
use thema_core::traits::{GenerationBackend, GenerationParams, MetricsRegistry};
use thema_core::Result;

use crate::context::{
    assess_preference_data_availability, ConstructedContext, DataQuality, PreferenceCompletionLevel, PreferenceDataAvailability,
    PromptTemplate,
};

/// Coarse quality bucket assigned to a generated response (§4.K).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResponseQuality {
    Poor,
    Acceptable,
    Good,
    Excellent,
}

/// Final answer returned to the caller.
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub content: String,
    pub quality_score: ResponseQuality,
    pub confidence_score: f32,
    pub retrieved_doc_ids: Vec<Uuid>,
}

/// Per-user rolling conversation state, bounded to the last few turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    pub conversation_history: Vec<ConversationTurn>,
    pub current_context: Option<String>,
    pub last_topic: Option<String>,
    pub follow_up_count: u32,
}

const MEMORY_WINDOW: usize = 3;
const MAX_GENERATION_ATTEMPTS: u32 = 3;
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Response Generator (§4.K).
pub struct ResponseGenerator {
    backend: Arc<dyn GenerationBackend>,
    generation_params: GenerationParams,
    metrics: Option<Arc<dyn MetricsRegistry>>,
    memories: RwLock<HashMap<Uuid, Mutex<ConversationMemory>>>,
    korean_content: Regex,
    inappropriate_content: Regex,
    incomplete_response: Regex,
    statistical_info: Regex,
}

impl ResponseGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            generation_params: GenerationParams::default(),
            metrics: None,
            memories: RwLock::new(HashMap::new()),
            korean_content: Regex::new(r"[가-힣]").unwrap(),
            inappropriate_content: Regex::new(r"(?i)(부적절|위험|해로운|불법)").unwrap(),
            incomplete_response: Regex::new(r"(?i)(죄송|미안|모르겠|알 수 없)").unwrap(),
            statistical_info: Regex::new(r"(?i)(\d+%|\d+위|\d+점|백분위|순위)").unwrap(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn generate_response(&self, context: &ConstructedContext, user_id: Uuid) -> GeneratedResponse {
        let started = std::time::Instant::now();
        let is_preference_question = is_preference_related(context);

        if is_preference_question && context.prompt_template != PromptTemplate::PreferenceMissing {
            let availability = assess_preference_data_availability(&context.retrieved_documents);
            if availability.completion_level == PreferenceCompletionLevel::Missing {
                self.observe_latency(started.elapsed());
                return self.preference_focused_fallback(context);
            }
        }

        let previous = self.update_conversation_memory(user_id, context).await;
        let prompt = enhance_prompt_with_memory(&context.formatted_prompt, previous.as_ref());

        match self.call_llm_with_retry(&prompt).await {
            Ok(raw) => {
                let processed = self.post_process_response(&raw, context, user_id).await;
                let quality = assess_response_quality(&processed, &self.incomplete_response, &self.korean_content, &self.statistical_info);
                let confidence = calculate_confidence_score(quality, !context.retrieved_documents.is_empty());
                self.store_conversation_turn(user_id, &context.user_question, &processed).await;
                self.observe_latency(started.elapsed());
                GeneratedResponse {
                    content: processed,
                    quality_score: quality,
                    confidence_score: confidence,
                    retrieved_doc_ids: context.retrieved_documents.iter().map(|d| d.document.id).collect(),
                }
            }
            Err(err) => {
                warn!(error = %err, "llm generation failed, returning fallback response");
                self.incr_counter("rag_response_errors_total");
                self.observe_latency(started.elapsed());
                self.generic_fallback_response(context)
            }
        }
    }

    async fn call_llm_with_retry(&self, prompt: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            match self.backend.generate(prompt, &self.generation_params).await {
                Ok(text) if text.trim().is_empty() => {
                    return Ok("죄송합니다. 지금은 답변을 생성할 수 없습니다. 잠시 후 다시 시도해 주세요.".to_string())
                }
                Ok(text) => return Ok(text),
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < MAX_GENERATION_ATTEMPTS {
                        let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt) + 100 * attempt as u64;
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }
        self.incr_counter("llm_api_errors_total");
        Err(last_err.unwrap())
    }

    async fn update_conversation_memory(&self, user_id: Uuid, context: &ConstructedContext) -> Option<String> {
        let topic = extract_topic_from_question(&context.user_question);
        let memories = self.memories.read().await;
        let previous = if let Some(memory_lock) = memories.get(&user_id) {
            let mut memory = memory_lock.lock().await;
            let previous = if memory.conversation_history.is_empty() {
                None
            } else {
                Some(format_previous_context(&memory.conversation_history))
            };
            memory.current_context = Some(topic.clone());
            memory.last_topic = Some(topic);
            memory.follow_up_count += 1;
            previous
        } else {
            drop(memories);
            let mut memories = self.memories.write().await;
            memories.entry(user_id).or_insert_with(|| {
                Mutex::new(ConversationMemory {
                    current_context: Some(topic.clone()),
                    last_topic: Some(topic.clone()),
                    follow_up_count: 1,
                    ..Default::default()
                })
            });
            None
        };
        previous
    }

    async fn store_conversation_turn(&self, user_id: Uuid, question: &str, response: &str) {
        let memories = self.memories.read().await;
        if let Some(memory_lock) = memories.get(&user_id) {
            let mut memory = memory_lock.lock().await;
            memory.conversation_history.push(ConversationTurn {
                user_id,
                question: question.to_string(),
                response: response.to_string(),
                created_at: chrono::Utc::now(),
            });
        }
    }

    async fn post_process_response(&self, raw: &str, context: &ConstructedContext, _user_id: Uuid) -> String {
        if raw.trim().is_empty() {
            return "죄송합니다. 지금은 답변을 생성할 수 없습니다. 잠시 후 다시 시도해 주세요.".to_string();
        }

        let markdown_stripped = strip_markdown(raw);
        let collapsed = collapse_whitespace(&markdown_stripped);
        let korean_fixed = fix_korean_formatting(&collapsed);
        let mut validated = self.validate_preference_response(korean_fixed, context);

        if matches!(context.prompt_template, PromptTemplate::StatisticalInfo | PromptTemplate::PersonalityCompare | PromptTemplate::GeneralCompare) {
            validated.push_str("\n\n참고: 점수, 백분위, 순위 등 통계 정보는 검사 결과 데이터에 기반합니다.");
        }
        if matches!(context.prompt_template, PromptTemplate::LearningStyleRecommend | PromptTemplate::PersonalityExplain) {
            validated.push_str("\n\n학습 팁: 자신의 강점을 활용한 공부 전략을 적용해보세요.");
        }
        if matches!(context.prompt_template, PromptTemplate::PreferenceMissing | PromptTemplate::PreferencePartial) {
            validated = self.enhance_with_preference_alternatives(validated, context);
        }

        validated
    }

    fn validate_preference_response(&self, response: String, context: &ConstructedContext) -> String {
        if !is_preference_related(context) {
            return response;
        }

        let availability = assess_preference_data_availability(&context.retrieved_documents);
        let detected = detect_preference_hallucination_patterns(&response, &availability);
        let disclaimer = preference_data_availability_disclaimer(&availability, &detected);

        if disclaimer.is_empty() {
            response
        } else {
            if !detected.is_empty() {
                warn!(count = detected.len(), "preference hallucination patterns detected in generated response");
            }
            format!("{response}{disclaimer}")
        }
    }

    fn enhance_with_preference_alternatives(&self, response: String, context: &ConstructedContext) -> String {
        let availability = assess_preference_data_availability(&context.retrieved_documents);
        let acknowledgment = preference_acknowledgment_template(&availability);
        let mut result = response;

        if !acknowledgment.is_empty() && !result.contains(acknowledgment.as_str()) {
            result = format!("{acknowledgment}{result}");
        }

        match availability.completion_level {
            PreferenceCompletionLevel::Missing => {
                result.push_str(&alternative_analysis_suggestions(&context.user_question));
            }
            PreferenceCompletionLevel::Partial => {
                result.push_str(
                    "\n\n💡 완전한 선호도 분석을 위한 팁:\n\
                     • 다른 검사 결과(성격, 사고능력, 역량)와 함께 종합적으로 해석해보세요\n\
                     • 시간이 지나면 더 완전한 선호도 데이터가 준비될 수 있습니다\n\
                     • 현재 결과만으로도 의미 있는 인사이트를 얻을 수 있어요",
                );
            }
            PreferenceCompletionLevel::Complete => {}
        }

        result
    }

    fn preference_focused_fallback(&self, context: &ConstructedContext) -> GeneratedResponse {
        let available_types: Vec<&str> = context
            .retrieved_documents
            .iter()
            .filter(|d| d.document.doc_type != thema_core::DocType::PreferenceAnalysis)
            .map(|d| d.document.doc_type.as_str())
            .collect();

        let base = "현재 선호도 분석 데이터에 접근할 수 없지만, ";
        let suffix = if available_types.contains(&"PERSONALITY_PROFILE") {
            "성격 분석 결과를 통해 선호하는 활동 유형을 유추해볼 수 있습니다. '내 성격에 맞는 활동은?' 같은 질문을 해보세요."
        } else if available_types.contains(&"THINKING_SKILLS") {
            "사고능력 분석 결과를 바탕으로 강점 영역과 관련된 관심사를 살펴볼 수 있습니다. '내 강점을 살릴 수 있는 활동은?' 같은 질문을 해보세요."
        } else if available_types.contains(&"COMPETENCY_ANALYSIS") {
            "역량 분석 결과를 통해 자연스럽게 끌리는 분야를 확인해볼 수 있습니다. '내 핵심 역량은 무엇인가요?' 같은 질문을 해보세요."
        } else if available_types.contains(&"CAREER_RECOMMENDATIONS") {
            "직업 추천 결과와 연결지어 선호하는 활동 방향을 짐작해볼 수 있습니다. '추천 직업과 관련된 활동은?' 같은 질문을 해보세요."
        } else {
            "다른 검사 결과가 준비되면 그를 바탕으로 선호도와 관련된 인사이트를 제공해드릴 수 있습니다. 적성검사를 완료하셨는지 확인해주세요."
        };

        GeneratedResponse {
            content: format!("{base}{suffix}"),
            quality_score: ResponseQuality::Acceptable,
            confidence_score: 0.6,
            retrieved_doc_ids: context.retrieved_documents.iter().map(|d| d.document.id).collect(),
        }
    }

    fn generic_fallback_response(&self, context: &ConstructedContext) -> GeneratedResponse {
        let topic = extract_topic_from_question(&context.user_question);
        let question_lower = context.user_question.to_lowercase();

        let content = if topic == "preference" || ["선호", "preference", "좋아", "관심", "취향"].iter().any(|k| question_lower.contains(k)) {
            return self.preference_focused_fallback(context);
        } else if topic == "personality" {
            "현재 상세 데이터를 불러오는 데 문제가 있어요. 성격 분석의 핵심 포인트를 먼저 안내드릴게요: 강점, 보완점, 추천 활동을 중심으로 스스로의 패턴을 관찰해보세요.".to_string()
        } else if topic == "career" {
            "지금은 실시간 데이터를 가져오지 못했어요. 진로 추천을 위해서는 강점과 흥미를 기준으로 2~3개의 직무를 후보로 두고, 필요한 역량과 학습 경로를 역으로 계획해보는 것을 권장합니다.".to_string()
        } else {
            "죄송합니다. 답변을 생성하는데 문제가 있습니다. 잠시 후 다시 시도해 주세요.".to_string()
        };

        GeneratedResponse {
            content,
            quality_score: ResponseQuality::Poor,
            confidence_score: 0.1,
            retrieved_doc_ids: context.retrieved_documents.iter().map(|d| d.document.id).collect(),
        }
    }

    fn incr_counter(&self, name: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.incr_counter(name, &[], 1);
        }
    }

    fn observe_latency(&self, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_histogram("rag_response_seconds", &[], elapsed.as_secs_f64() * 1000.0);
        }
    }
}

fn is_preference_related(context: &ConstructedContext) -> bool {
    if matches!(
        context.prompt_template,
        PromptTemplate::PreferenceExplain | PromptTemplate::PreferenceMissing | PromptTemplate::PreferencePartial
    ) {
        return true;
    }
    let lower = context.user_question.to_lowercase();
    ["선호", "preference", "좋아", "관심", "취향", "이미지"].iter().any(|k| lower.contains(k))
}

fn format_previous_context(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .rev()
        .take(MEMORY_WINDOW)
        .rev()
        .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.response))
        .collect::<Vec<_>>()
        .join("\n")
}

fn enhance_prompt_with_memory(prompt: &str, previous_context: Option<&String>) -> String {
    match previous_context {
        Some(previous) if !previous.is_empty() => format!("이전 대화 맥락:\n{previous}\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}

fn strip_markdown(text: &str) -> String {
    let re = Regex::new(r"[*_`#>]+").unwrap();
    re.replace_all(text, "").to_string()
}

fn collapse_whitespace(text: &str) -> String {
    let re = Regex::new(r"\s+").unwrap();
    re.replace_all(text, " ").trim().to_string()
}

fn fix_korean_formatting(text: &str) -> String {
    let no_space_before_punct = Regex::new(r"\s+([.,!?])").unwrap();
    let step1 = no_space_before_punct.replace_all(text, "$1");
    let collapse_double_space = Regex::new(r"\s{2,}").unwrap();
    let step2 = collapse_double_space.replace_all(&step1, " ");
    let no_space_before_jeom = Regex::new(r"\s+점").unwrap();
    let step3 = no_space_before_jeom.replace_all(&step2, "점");
    step3.replace(" 입니다", "입니다").replace(" .", ".").trim().to_string()
}

fn assess_response_quality(text: &str, incomplete: &Regex, korean: &Regex, statistical: &Regex) -> ResponseQuality {
    if !validate_response_content(text, incomplete, korean) {
        return ResponseQuality::Poor;
    }
    let mut score = 0;
    if text.chars().count() > 100 {
        score += 1;
    }
    if statistical.is_match(text) {
        score += 1;
    }
    match score.min(2) {
        0 => ResponseQuality::Acceptable,
        1 => ResponseQuality::Good,
        _ => ResponseQuality::Excellent,
    }
}

fn validate_response_content(text: &str, incomplete: &Regex, korean: &Regex) -> bool {
    if text.chars().count() < 5 {
        return false;
    }
    if !korean.is_match(text) {
        return false;
    }
    if incomplete.find_iter(text).count() >= 3 {
        return false;
    }
    true
}

fn calculate_confidence_score(quality: ResponseQuality, has_documents: bool) -> f32 {
    let base = match quality {
        ResponseQuality::Poor => 0.2,
        ResponseQuality::Acceptable => 0.5,
        ResponseQuality::Good => 0.75,
        ResponseQuality::Excellent => 0.9,
    };
    let boost = if has_documents { 0.05 } else { -0.05 };
    (base + boost).clamp(0.0, 1.0)
}

fn extract_topic_from_question(question: &str) -> String {
    let lower = question.to_lowercase();
    if ["선호", "preference", "좋아", "관심", "취향", "이미지"].iter().any(|k| lower.contains(k)) {
        "preference".to_string()
    } else if ["성격", "personality"].iter().any(|k| lower.contains(k)) {
        "personality".to_string()
    } else if ["직업", "진로", "career"].iter().any(|k| lower.contains(k)) {
        "career".to_string()
    } else if ["사고", "능력", "thinking"].iter().any(|k| lower.contains(k)) {
        "thinking".to_string()
    } else if ["학습", "공부", "learning"].iter().any(|k| lower.contains(k)) {
        "learning".to_string()
    } else {
        "general".to_string()
    }
}

struct HallucinationPattern {
    label: &'static str,
    severity: &'static str,
}

fn detect_preference_hallucination_patterns(response: &str, availability: &PreferenceDataAvailability) -> Vec<HallucinationPattern> {
    let mut found = Vec::new();

    if matches!(
        availability.completion_level,
        PreferenceCompletionLevel::Missing | PreferenceCompletionLevel::Partial
    ) {
        let severity = if availability.completion_level == PreferenceCompletionLevel::Missing { "high" } else { "medium" };
        let specific_patterns: [(&str, &str); 8] = [
            (r"선호도.*?\d+위", "specific_ranking"),
            (r"이미지.*?선호.*?\d+%", "specific_percentage"),
            (r"선호.*?점수.*?\d+점", "specific_score"),
            (r"응답률.*?\d+%", "response_rate"),
            (r"총.*?\d+개.*?이미지", "image_count"),
            (r"가장.*?선호.*?(색상|형태|스타일|패턴)", "specific_preference_type"),
            (r"\d+번째.*?선호", "numbered_preference"),
            (r"선호도.*?상위.*?\d+%", "percentile_claim"),
        ];
        for (pattern, label) in specific_patterns {
            if Regex::new(pattern).unwrap().is_match(response) {
                found.push(HallucinationPattern { label, severity });
            }
        }
    }

    if matches!(availability.data_quality, DataQuality::None | DataQuality::Low) {
        let definitive_patterns: [(&str, &str); 5] = [
            (r"당신의.*?선호도는.*?(확실히|명확히)", "definitive_claim"),
            (r"가장.*?선호하는.*?것은", "absolute_preference"),
            (r"선호.*?순위는.*?다음과 같습니다", "ranking_claim"),
            (r"확실히.*?선호", "certainty_claim"),
            (r"분명히.*?(좋아|선호)", "certainty_preference"),
        ];
        for (pattern, label) in definitive_patterns {
            if Regex::new(pattern).unwrap().is_match(response) {
                found.push(HallucinationPattern { label, severity: "high" });
            }
        }
    }

    found
}

fn preference_data_availability_disclaimer(availability: &PreferenceDataAvailability, detected: &[HallucinationPattern]) -> String {
    if detected.is_empty() {
        return String::new();
    }

    match availability.completion_level {
        PreferenceCompletionLevel::Missing => "\n\n⚠️ 중요: 현재 선호도 분석 데이터가 준비되지 않아 구체적인 수치나 순위는 제공할 수 없습니다. 위 내용은 일반적인 가이드라인이며, 정확한 분석을 위해서는 다른 검사 결과(성격 분석, 사고능력 등)를 참고하시기 바랍니다.".to_string(),
        PreferenceCompletionLevel::Partial => {
            let available = korean_component_list(&availability.available_components);
            let missing = korean_component_list(&availability.missing_components);
            let mut disclaimer = format!("\n\n💡 데이터 상태 안내: 현재 {available} 데이터는 준비되어 있으나, {missing} 데이터는 아직 준비 중입니다.");
            if detected.iter().any(|p| p.severity == "high") {
                disclaimer.push_str(" 완전한 분석을 위해서는 추가 검사나 다른 분석 결과를 함께 참고하시기 바랍니다.");
            }
            disclaimer
        }
        PreferenceCompletionLevel::Complete => {
            if availability.data_quality == DataQuality::Low && detected.iter().any(|p| p.severity == "high") {
                "\n\n💡 참고: 현재 제한적인 선호도 데이터를 바탕으로 한 분석입니다. 보다 정확한 인사이트를 위해 성격 분석이나 역량 분석 결과도 함께 확인해보세요.".to_string()
            } else {
                String::new()
            }
        }
    }
}

fn korean_component_list(components: &[&'static str]) -> String {
    components
        .iter()
        .map(|c| match *c {
            "stats" => "통계 정보",
            "preferences" => "선호도 순위",
            "jobs" => "직업 추천",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn preference_acknowledgment_template(availability: &PreferenceDataAvailability) -> String {
    match availability.completion_level {
        PreferenceCompletionLevel::Missing => {
            "현재 선호도 분석 데이터가 준비되지 않았습니다. 하지만 다른 검사 결과를 통해 유사한 인사이트를 얻을 수 있어요! ".to_string()
        }
        PreferenceCompletionLevel::Partial if !availability.available_components.is_empty() => {
            let available = korean_component_list(&availability.available_components);
            format!("현재 {available}는 준비되어 있지만, 일부 선호도 데이터가 아직 처리 중입니다. 준비된 데이터를 바탕으로 분석해드릴게요. ")
        }
        PreferenceCompletionLevel::Partial => "선호도 분석 데이터가 부분적으로만 준비되어 있습니다. 현재 가능한 범위에서 분석해드리겠습니다. ".to_string(),
        PreferenceCompletionLevel::Complete => String::new(),
    }
}

fn alternative_analysis_suggestions(question: &str) -> String {
    let lower = question.to_lowercase();
    let mut lines = vec![
        "\n\n🔍 대안 분석 방법:".to_string(),
        "• 성격 분석 결과를 통해 선호하는 활동 유형을 파악해보세요".to_string(),
        "• 사고능력 분석에서 강점 영역과 관련된 관심사를 찾아보세요".to_string(),
        "• 역량 분석 결과로 자연스럽게 끌리는 분야를 확인해보세요".to_string(),
    ];

    if ["직업", "진로", "career", "job"].iter().any(|k| lower.contains(k)) {
        lines.push("• '내게 맞는 직업은 무엇인가요?' 질문으로 진로 추천을 받아보세요".to_string());
        lines.push("• '내 성격에 맞는 업무 환경은?' 같은 질문도 도움이 됩니다".to_string());
    } else if ["활동", "취미", "관심", "activity"].iter().any(|k| lower.contains(k)) {
        lines.push("• '내 강점을 활용할 수 있는 활동은?' 질문을 해보세요".to_string());
        lines.push("• '어떤 취미가 나에게 맞을까요?' 같은 질문도 좋습니다".to_string());
    } else if ["학습", "공부", "study"].iter().any(|k| lower.contains(k)) {
        lines.push("• '내게 맞는 학습 방법은?' 질문으로 맞춤 학습법을 알아보세요".to_string());
        lines.push("• '어떤 공부 방식이 효과적일까요?' 같은 질문도 유용합니다".to_string());
    } else {
        lines.push("• '내 강점은 무엇인가요?' 또는 '어떤 활동이 나에게 맞나요?' 같은 질문을 해보세요".to_string());
        lines.push("• '내 성격 특성을 알려주세요' 질문으로 더 자세한 분석을 받아보세요".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PreferenceCompletionLevel, RetrievedDocument};
    use async_trait::async_trait;
    use thema_core::{CompletionLevel, DocType, Document};

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok(format!("성격 분석 결과를 알려드립니다. 관련 점수는 85점입니다. (echo: {})", prompt.len()))
        }
    }

    fn sample_context(template: PromptTemplate, question: &str) -> ConstructedContext {
        ConstructedContext {
            user_question: question.to_string(),
            retrieved_documents: vec![],
            prompt_template: template,
            formatted_prompt: format!("질문: {question}"),
            token_count_estimate: 10,
            truncated: false,
        }
    }

    #[tokio::test]
    async fn generate_response_produces_content_and_quality() {
        let generator = ResponseGenerator::new(Arc::new(EchoBackend));
        let context = sample_context(PromptTemplate::PersonalityExplain, "내 성격은 어떤가요?");
        let response = generator.generate_response(&context, Uuid::new_v4()).await;
        assert!(!response.content.is_empty());
        assert!(response.confidence_score > 0.0);
    }

    #[tokio::test]
    async fn missing_preference_data_short_circuits_to_fallback() {
        let generator = ResponseGenerator::new(Arc::new(EchoBackend));
        let context = sample_context(PromptTemplate::PreferenceExplain, "내 이미지 선호도는?");
        let response = generator.generate_response(&context, Uuid::new_v4()).await;
        assert_eq!(response.quality_score, ResponseQuality::Acceptable);
        assert!(response.content.contains("선호도 분석 데이터에 접근할 수 없지만"));
    }

    #[test]
    fn korean_formatting_removes_space_before_punctuation() {
        let fixed = fix_korean_formatting("안녕하세요 . 반갑습니다 !");
        assert_eq!(fixed, "안녕하세요. 반갑습니다!");
    }

    #[test]
    fn validate_response_content_rejects_too_many_apologies() {
        let incomplete = Regex::new(r"(?i)(죄송|미안|모르겠|알 수 없)").unwrap();
        let korean = Regex::new(r"[가-힣]").unwrap();
        assert!(!validate_response_content("죄송합니다 미안합니다 모르겠습니다 한국어", &incomplete, &korean));
    }

    #[test]
    fn assess_quality_excellent_for_long_statistical_response() {
        let incomplete = Regex::new(r"(?i)(죄송|미안|모르겠|알 수 없)").unwrap();
        let korean = Regex::new(r"[가-힣]").unwrap();
        let statistical = Regex::new(r"(?i)(\d+%|\d+위|\d+점|백분위|순위)").unwrap();
        let long_text = "가".repeat(120) + " 85점입니다";
        assert_eq!(assess_response_quality(&long_text, &incomplete, &korean, &statistical), ResponseQuality::Excellent);
    }

    #[test]
    fn confidence_score_boosts_with_documents() {
        let with_docs = calculate_confidence_score(ResponseQuality::Good, true);
        let without_docs = calculate_confidence_score(ResponseQuality::Good, false);
        assert!(with_docs > without_docs);
    }

    #[test]
    fn extract_topic_detects_preference_keywords() {
        assert_eq!(extract_topic_from_question("내가 선호하는 활동은?"), "preference");
        assert_eq!(extract_topic_from_question("진로를 추천해줘"), "career");
        assert_eq!(extract_topic_from_question("오늘 날씨 어때?"), "general");
    }

    #[test]
    fn detect_hallucination_patterns_flags_specific_ranking_when_data_missing() {
        let availability = PreferenceDataAvailability {
            has_preference_docs: false,
            completion_level: PreferenceCompletionLevel::Missing,
            available_components: vec![],
            missing_components: vec!["stats", "preferences", "jobs"],
            data_quality: DataQuality::None,
        };
        let detected = detect_preference_hallucination_patterns("선호도는 1위 입니다", &availability);
        assert!(!detected.is_empty());
    }

    #[test]
    fn disclaimer_empty_when_no_patterns_detected() {
        let availability = PreferenceDataAvailability {
            has_preference_docs: true,
            completion_level: PreferenceCompletionLevel::Partial,
            available_components: vec!["stats"],
            missing_components: vec!["jobs"],
            data_quality: DataQuality::Medium,
        };
        let disclaimer = preference_data_availability_disclaimer(&availability, &[]);
        assert!(disclaimer.is_empty());
    }

    #[test]
    fn retrieved_document_sample_is_constructible() {
        let doc = Document::new(Uuid::new_v4(), DocType::PersonalityProfile, "sub", serde_json::json!({}), "요약", CompletionLevel::Complete);
        let retrieved = RetrievedDocument {
            document: doc,
            similarity_score: 0.8,
            relevance_score: 0.8,
            content_summary: "요약".to_string(),
            key_points: vec![],
        };
        assert_eq!(retrieved.document.doc_type, DocType::PersonalityProfile);
    }
}
