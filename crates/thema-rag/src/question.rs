//! Question Processor (§4.I): preprocessing, validation, categorization,
//! intent detection, keyword extraction, and conversation-context
//! bookkeeping for incoming chat questions.
//!
//! Grounded on `original_source/rag/question_processor.py` for the keyword
//! tables and the `len(keyword)/10` weighting formula, and on
//! `thema_core::tokenizer` for the Korean/ASCII/digit run-scanning used by
//! keyword extraction.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use thema_core::defaults::{KEYWORD_MAX_COUNT, QUESTION_MAX_CHARS, QUESTION_MIN_CHARS, QUESTION_MIN_WORD_CHARS};
use thema_core::traits::EmbeddingClient;
use thema_core::{tokenizer, Error, Result};

/// Category a question is classified into (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Personality,
    ThinkingSkills,
    CareerRecommendations,
    LearningStyle,
    CompetencyAnalysis,
    PreferenceAnalysis,
    GeneralComparison,
    StatisticalInfo,
    Unknown,
}

impl QuestionCategory {
    /// Every scorable category, in a fixed order (`Unknown` is never scored).
    pub const SCORABLE: [QuestionCategory; 8] = [
        QuestionCategory::Personality,
        QuestionCategory::ThinkingSkills,
        QuestionCategory::CareerRecommendations,
        QuestionCategory::LearningStyle,
        QuestionCategory::CompetencyAnalysis,
        QuestionCategory::PreferenceAnalysis,
        QuestionCategory::GeneralComparison,
        QuestionCategory::StatisticalInfo,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            QuestionCategory::Personality => &[
                "성격", "성향", "기질", "personality", "tendency", "trait",
                "창의", "분석", "탐구", "안정", "보수", "수동",
                "primary", "secondary", "주요", "보조",
            ],
            QuestionCategory::ThinkingSkills => &[
                "사고", "능력", "thinking", "cognitive", "skill", "ability",
                "언어", "수리", "공간", "추리", "지각", "기억", "처리",
                "verbal", "numerical", "spatial", "reasoning", "perceptual",
            ],
            QuestionCategory::CareerRecommendations => &[
                "직업", "진로", "career", "job", "profession", "work",
                "추천", "recommend", "suitable", "적합", "맞는",
            ],
            QuestionCategory::LearningStyle => &[
                "학습", "공부", "learning", "study", "education", "academic",
                "방법", "스타일", "style", "method", "approach",
            ],
            QuestionCategory::CompetencyAnalysis => &[
                "역량", "재능", "강점", "competency", "talent", "strength",
                "능력", "skill", "top", "상위", "우수",
            ],
            QuestionCategory::PreferenceAnalysis => &[
                "선호", "취향", "preference", "like", "interest", "favor",
                "이미지", "image", "picture", "visual", "선호도", "좋아하는",
                "관심", "흥미", "매력", "끌리는", "선택", "취미", "활동",
                "스타일", "패턴", "경향", "성향", "기호", "선호분석",
                "이미지선호", "선호검사", "선호결과", "선호도분석", "좋아",
                "어떤것", "무엇을", "뭘", "뭐를", "어떤활동", "어떤일",
                "취향분석",
            ],
            QuestionCategory::GeneralComparison => &[
                "비교", "compare", "comparison", "versus", "차이", "difference",
                "다른", "similar", "유사", "대비",
            ],
            QuestionCategory::StatisticalInfo => &[
                "통계", "백분위", "순위", "statistics", "percentile", "rank",
                "평균", "average", "mean", "score", "점수",
            ],
            QuestionCategory::Unknown => &[],
        }
    }

    /// Core preference terms that score at 2x weight (§4.I).
    const PREFERENCE_CORE_TERMS: [&'static str; 5] = ["선호", "선호도", "취향", "좋아하는", "preference"];
}

/// Intent a question is classified as expressing (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionIntent {
    Explain,
    Compare,
    Recommend,
    Analyze,
    Clarify,
    FollowUp,
    Unknown,
}

impl QuestionIntent {
    pub const SCORABLE: [QuestionIntent; 5] = [
        QuestionIntent::Explain,
        QuestionIntent::Compare,
        QuestionIntent::Recommend,
        QuestionIntent::Analyze,
        QuestionIntent::Clarify,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            QuestionIntent::Explain => &["설명", "의미", "뜻", "explain", "meaning", "what", "무엇", "어떤", "이란", "라는"],
            QuestionIntent::Compare => &["비교", "compare", "차이", "difference", "다른", "similar", "대비", "versus", "보다"],
            QuestionIntent::Recommend => &["추천", "recommend", "suggest", "좋은", "적합", "맞는", "어떤", "which", "what"],
            QuestionIntent::Analyze => &["분석", "analyze", "강점", "약점", "strength", "weakness", "특징", "characteristic", "어떻게"],
            QuestionIntent::Clarify => &["명확", "자세", "더", "clarify", "detail", "specific", "구체적", "정확"],
            QuestionIntent::FollowUp | QuestionIntent::Unknown => &[],
        }
    }
}

const FOLLOW_UP_INDICATORS: [&str; 16] = [
    "그럼", "그러면", "그래서", "또", "그리고", "추가로",
    "then", "also", "additionally", "furthermore", "moreover",
    "what about", "how about", "그것", "이것", "that", "this",
];

const PRONOUN_REFERENCES: [&str; 6] = ["그것", "이것", "저것", "that", "this", "it"];

const STOP_WORDS: &[&str] = &[
    "은", "는", "이", "가", "을", "를", "에", "에서", "로", "으로",
    "와", "과", "의", "도", "만", "부터", "까지", "처럼", "같이",
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to",
    "for", "of", "with", "by", "is", "are", "was", "were", "be",
    "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "can", "what", "how", "why",
    "when", "where", "who", "which", "무엇", "어떻게", "왜", "언제",
    "어디서", "누가", "어떤", "그", "그것", "이것", "저것",
];

/// A processed, classified, embedded user question.
#[derive(Debug, Clone)]
pub struct ProcessedQuestion {
    pub original_text: String,
    pub cleaned_text: String,
    pub category: QuestionCategory,
    pub intent: QuestionIntent,
    pub embedding: pgvector::Vector,
    pub keywords: Vec<String>,
    pub confidence_score: f32,
    pub context_from_previous: Option<String>,
    pub requires_specific_docs: Vec<String>,
}

/// Rolling conversation state for one user, consulted for follow-up
/// detection and bounded to the last [`thema_core::defaults::CONVERSATION_HISTORY_DEPTH`]
/// questions.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub previous_questions: Vec<String>,
    pub previous_categories: Vec<QuestionCategory>,
    pub current_topic: Option<QuestionCategory>,
    pub conversation_depth: usize,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Question Processor (§4.I).
pub struct QuestionProcessor {
    embedding_client: Arc<dyn EmbeddingClient>,
}

impl QuestionProcessor {
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>) -> Self {
        Self { embedding_client }
    }

    pub async fn process_question(
        &self,
        question: &str,
        context: Option<&ConversationContext>,
    ) -> Result<ProcessedQuestion> {
        let cleaned = preprocess_question(question);
        if !validate_question(&cleaned) {
            return Err(Error::InvalidInput(format!("invalid question format: {question}")));
        }

        let (category, category_confidence) = categorize_question(&cleaned);
        let (intent, intent_confidence) = detect_intent(&cleaned, context);
        let keywords = tokenizer::extract_keywords(&cleaned, STOP_WORDS, KEYWORD_MAX_COUNT);
        let embedding_result = self.embedding_client.generate_embedding(&cleaned).await?;
        let context_from_previous = extract_follow_up_context(&cleaned, context);
        let requires_specific_docs = determine_required_documents(category, intent);
        let confidence_score = (category_confidence + intent_confidence) / 2.0;

        Ok(ProcessedQuestion {
            original_text: question.to_string(),
            cleaned_text: cleaned,
            category,
            intent,
            embedding: embedding_result.vector,
            keywords,
            confidence_score,
            context_from_previous,
            requires_specific_docs,
        })
    }

    /// Appends the new question to `context`, updates `current_topic`,
    /// increments depth, and truncates history to the last 5 entries.
    pub fn update_conversation_context(
        &self,
        mut context: ConversationContext,
        processed: &ProcessedQuestion,
    ) -> ConversationContext {
        context.previous_questions.push(processed.original_text.clone());
        context.previous_categories.push(processed.category);

        if processed.category != QuestionCategory::Unknown {
            context.current_topic = Some(processed.category);
        }

        context.conversation_depth += 1;

        let depth = thema_core::defaults::CONVERSATION_HISTORY_DEPTH;
        if context.previous_questions.len() > depth {
            let drop = context.previous_questions.len() - depth;
            context.previous_questions.drain(0..drop);
            context.previous_categories.drain(0..drop);
        }

        context
    }
}

/// Collapses whitespace, strips characters outside `[word, space, Hangul,
/// ?.!,]`, normalizes `?`/`？` runs to one `?`, and ensures terminal
/// punctuation.
fn preprocess_question(question: &str) -> String {
    let whitespace = Regex::new(r"\s+").unwrap();
    let collapsed = whitespace.replace_all(question.trim(), " ").to_string();

    let disallowed = Regex::new(r"[^\w\s가-힣?.!,]").unwrap();
    let stripped = disallowed.replace_all(&collapsed, "").to_string();

    let question_marks = Regex::new(r"[?？]+").unwrap();
    let mut normalized = question_marks.replace_all(&stripped, "?").to_string();

    if !normalized.ends_with(['?', '.', '!']) {
        normalized.push('?');
    }
    normalized
}

fn validate_question(question: &str) -> bool {
    if question.trim().chars().count() < QUESTION_MIN_CHARS {
        return false;
    }
    if question.chars().count() > QUESTION_MAX_CHARS {
        return false;
    }

    let non_meaningful = Regex::new(r"[^\w가-힣]").unwrap();
    let meaningful_chars = non_meaningful.replace_all(question, "").to_string();
    meaningful_chars.chars().count() >= QUESTION_MIN_WORD_CHARS
}

fn categorize_question(question: &str) -> (QuestionCategory, f32) {
    let lower = question.to_lowercase();

    let mut best = QuestionCategory::Unknown;
    let mut best_score = 0.0f32;

    for category in QuestionCategory::SCORABLE {
        let mut score = 0.0f32;
        for keyword in category.keywords() {
            if lower.contains(&keyword.to_lowercase()) {
                let mut weight = keyword.chars().count() as f32 / 10.0;
                if category == QuestionCategory::PreferenceAnalysis
                    && QuestionCategory::PREFERENCE_CORE_TERMS.contains(keyword)
                {
                    weight *= 2.0;
                }
                score += weight;
            }
        }
        if score > best_score {
            best_score = score;
            best = category;
        }
    }

    if best_score == 0.0 {
        return (QuestionCategory::Unknown, 0.0);
    }

    (best, (best_score / 2.0).min(1.0))
}

fn detect_intent(question: &str, context: Option<&ConversationContext>) -> (QuestionIntent, f32) {
    let lower = question.to_lowercase();

    if let Some(ctx) = context {
        if ctx.conversation_depth > 0 {
            for indicator in FOLLOW_UP_INDICATORS {
                if lower.contains(indicator) {
                    return (QuestionIntent::FollowUp, 0.8);
                }
            }
        }
    }

    let mut best = QuestionIntent::Unknown;
    let mut best_score = 0.0f32;

    for intent in QuestionIntent::SCORABLE {
        let mut score = 0.0f32;
        for keyword in intent.keywords() {
            if lower.contains(&keyword.to_lowercase()) {
                score += keyword.chars().count() as f32 / 10.0;
            }
        }
        if score > best_score {
            best_score = score;
            best = intent;
        }
    }

    if best_score == 0.0 {
        return (QuestionIntent::Unknown, 0.0);
    }

    (best, (best_score / 1.5).min(1.0))
}

fn extract_follow_up_context(question: &str, context: Option<&ConversationContext>) -> Option<String> {
    let context = context?;
    if context.conversation_depth == 0 {
        return None;
    }

    let lower = question.to_lowercase();
    let has_follow_up_indicator = FOLLOW_UP_INDICATORS.iter().any(|i| lower.contains(i));

    if has_follow_up_indicator {
        if let Some(last) = context.previous_questions.last() {
            return Some(last.clone());
        }
    }

    let has_pronoun = PRONOUN_REFERENCES.iter().any(|p| lower.contains(p));
    if has_pronoun {
        if let Some(topic) = context.current_topic {
            return Some(format!("Previous topic: {}", category_value(topic)));
        }
    }

    None
}

fn category_value(category: QuestionCategory) -> &'static str {
    match category {
        QuestionCategory::Personality => "personality",
        QuestionCategory::ThinkingSkills => "thinking_skills",
        QuestionCategory::CareerRecommendations => "career_recommendations",
        QuestionCategory::LearningStyle => "learning_style",
        QuestionCategory::CompetencyAnalysis => "competency_analysis",
        QuestionCategory::PreferenceAnalysis => "preference_analysis",
        QuestionCategory::GeneralComparison => "general_comparison",
        QuestionCategory::StatisticalInfo => "statistical_info",
        QuestionCategory::Unknown => "unknown",
    }
}

fn determine_required_documents(category: QuestionCategory, intent: QuestionIntent) -> Vec<String> {
    let mut docs: Vec<String> = match category {
        QuestionCategory::Personality => vec!["PERSONALITY_PROFILE"],
        QuestionCategory::ThinkingSkills => vec!["THINKING_SKILLS"],
        QuestionCategory::CareerRecommendations => vec!["CAREER_RECOMMENDATIONS", "PERSONALITY_PROFILE", "THINKING_SKILLS"],
        QuestionCategory::LearningStyle => vec!["LEARNING_STYLE", "PERSONALITY_PROFILE"],
        QuestionCategory::CompetencyAnalysis => vec!["COMPETENCY_ANALYSIS"],
        QuestionCategory::PreferenceAnalysis => vec!["PREFERENCE_ANALYSIS"],
        QuestionCategory::GeneralComparison => vec!["PERSONALITY_PROFILE", "THINKING_SKILLS", "COMPETENCY_ANALYSIS"],
        QuestionCategory::StatisticalInfo => vec!["PERSONALITY_PROFILE", "THINKING_SKILLS", "COMPETENCY_ANALYSIS"],
        QuestionCategory::Unknown => vec![],
    }
    .into_iter()
    .map(String::from)
    .collect();

    if intent == QuestionIntent::Compare && docs.len() == 1 {
        docs.push("COMPETENCY_ANALYSIS".to_string());
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use thema_core::traits::EmbeddingResult;

    struct FixedEmbeddingClient;

    #[async_trait]
    impl EmbeddingClient for FixedEmbeddingClient {
        async fn generate_embedding(&self, _text: &str) -> Result<EmbeddingResult> {
            Ok(EmbeddingResult {
                vector: pgvector::Vector::from(vec![0.0; 768]),
                dimensions: 768,
                cached: false,
                processing_ms: 1,
            })
        }

        async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
            let mut out = Vec::with_capacity(texts.len());
            for _ in texts {
                out.push(self.generate_embedding("").await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            768
        }
    }

    fn processor() -> QuestionProcessor {
        QuestionProcessor::new(Arc::new(FixedEmbeddingClient))
    }

    #[test]
    fn preprocess_collapses_whitespace_and_adds_question_mark() {
        let cleaned = preprocess_question("  내   성격은   어때  ");
        assert_eq!(cleaned, "내 성격은 어때?");
    }

    #[test]
    fn preprocess_normalizes_multiple_question_marks() {
        let cleaned = preprocess_question("정말인가요??？");
        assert!(cleaned.ends_with('?'));
        assert!(!cleaned.contains("??"));
    }

    #[test]
    fn validate_rejects_too_short_and_too_long() {
        assert!(!validate_question("ab"));
        assert!(!validate_question(&"가".repeat(501)));
        assert!(validate_question("내 성격은?"));
    }

    #[test]
    fn validate_rejects_punctuation_only() {
        assert!(!validate_question("???"));
    }

    #[test]
    fn categorize_prefers_preference_core_terms_weight() {
        let (category, confidence) = categorize_question("제 선호도 분석 결과가 궁금해요?");
        assert_eq!(category, QuestionCategory::PreferenceAnalysis);
        assert!(confidence > 0.0);
    }

    #[test]
    fn categorize_unknown_when_no_keywords_match() {
        let (category, confidence) = categorize_question("안녕하세요?");
        assert_eq!(category, QuestionCategory::Unknown);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn detect_intent_follow_up_overrides_when_depth_positive() {
        let mut context = ConversationContext::new();
        context.conversation_depth = 1;
        let (intent, confidence) = detect_intent("그럼 다른 직업은?", Some(&context));
        assert_eq!(intent, QuestionIntent::FollowUp);
        assert_eq!(confidence, 0.8);
    }

    #[test]
    fn detect_intent_recommend_without_context() {
        let (intent, _) = detect_intent("어떤 직업을 추천하나요?", None);
        assert_eq!(intent, QuestionIntent::Recommend);
    }

    #[test]
    fn required_documents_for_career_with_compare_intent_adds_competency() {
        let docs = determine_required_documents(QuestionCategory::Personality, QuestionIntent::Compare);
        assert_eq!(docs, vec!["PERSONALITY_PROFILE", "COMPETENCY_ANALYSIS"]);
    }

    #[test]
    fn extract_follow_up_context_uses_previous_question_on_indicator() {
        let mut context = ConversationContext::new();
        context.conversation_depth = 1;
        context.previous_questions.push("첫번째 질문?".to_string());
        let result = extract_follow_up_context("그럼 다른 건요?", Some(&context));
        assert_eq!(result, Some("첫번째 질문?".to_string()));
    }

    #[test]
    fn extract_follow_up_context_uses_topic_on_pronoun() {
        let mut context = ConversationContext::new();
        context.conversation_depth = 1;
        context.current_topic = Some(QuestionCategory::CareerRecommendations);
        let result = extract_follow_up_context("그것에 대해 더 알려줘?", Some(&context));
        assert_eq!(result, Some("Previous topic: career_recommendations".to_string()));
    }

    #[tokio::test]
    async fn process_question_rejects_invalid_input() {
        let processor = processor();
        let result = processor.process_question("ab", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_question_produces_classified_result() {
        let processor = processor();
        let processed = processor
            .process_question("제 직업 추천을 알려주세요", None)
            .await
            .unwrap();
        assert_eq!(processed.category, QuestionCategory::CareerRecommendations);
        assert_eq!(processed.intent, QuestionIntent::Recommend);
        assert!(!processed.requires_specific_docs.is_empty());
    }

    #[test]
    fn update_conversation_context_truncates_to_five() {
        let processor = processor();
        let mut context = ConversationContext::new();
        for i in 0..7 {
            let processed = ProcessedQuestion {
                original_text: format!("q{i}"),
                cleaned_text: format!("q{i}?"),
                category: QuestionCategory::Personality,
                intent: QuestionIntent::Explain,
                embedding: pgvector::Vector::from(vec![0.0; 768]),
                keywords: vec![],
                confidence_score: 0.5,
                context_from_previous: None,
                requires_specific_docs: vec![],
            };
            context = processor.update_conversation_context(context, &processed);
        }
        assert_eq!(context.previous_questions.len(), 5);
        assert_eq!(context.previous_questions[0], "q2");
        assert_eq!(context.conversation_depth, 7);
    }
}
