//! Centralized constants for the ETL/RAG pipeline. Grouped by domain
//! section, each with a short rationale where the value isn't self-evident.

// ---------------------------------------------------------------------
// Embedding / vector storage
// ---------------------------------------------------------------------

/// Fixed embedding dimension the storage layer enforces (reference config).
pub const EMBED_DIMENSION: usize = 768;

/// Conservative character cap before truncating text sent to the
/// embedding backend; beyond this, upstream APIs tend to reject or
/// silently clip the request.
pub const EMBEDDING_MAX_CHARS: usize = 30_000;

pub const EMBEDDING_BATCH_SIZE: usize = 32;

/// Requests allowed per rolling 60-second window before the client blocks.
pub const EMBEDDING_RATE_LIMIT_PER_MINUTE: u32 = 60;

pub const EMBEDDING_CACHE_CAPACITY: usize = 10_000;
pub const EMBEDDING_CACHE_TTL_SECONDS: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------
// Vector search
// ---------------------------------------------------------------------

pub const SEARCH_DEFAULT_LIMIT: i64 = 10;
pub const SEARCH_DEFAULT_THRESHOLD: f32 = 0.5;
/// Fallback threshold used on the Context Builder's empty-result retry.
pub const SEARCH_RETRY_THRESHOLD: f32 = 0.3;
pub const SEARCH_SIMILAR_DOCUMENTS_FLOOR: f32 = 0.5;

pub const SEARCH_RESULT_CACHE_CAPACITY: usize = 1_000;
pub const SEARCH_RESULT_CACHE_TTL_SECONDS: u64 = 300;

pub const SEARCH_MAX_RETRIES: u32 = 3;
pub const SEARCH_RETRY_BASE_DELAY_MS: u64 = 100;

/// Ring buffer size for per-query timing bookkeeping (§4.H).
pub const SEARCH_PERFORMANCE_HISTORY: usize = 1_000;

// Ranking weight tables (§4.H). Index order matches `DocType::ALL`.
pub const TYPE_PRIORITIZED_WEIGHTS: [f32; 7] = [
    1.0, // USER_PROFILE (not listed explicitly; default weight)
    1.2, // PERSONALITY_PROFILE
    1.0, // THINKING_SKILLS
    1.1, // CAREER_RECOMMENDATIONS
    0.9, // COMPETENCY_ANALYSIS
    0.8, // LEARNING_STYLE
    0.7, // PREFERENCE_ANALYSIS
];

pub const HYBRID_TYPE_WEIGHTS: [f32; 7] = [
    1.0,  // USER_PROFILE
    1.1,  // PERSONALITY_PROFILE
    1.0,  // THINKING_SKILLS
    1.05, // CAREER_RECOMMENDATIONS
    0.95, // COMPETENCY_ANALYSIS
    0.9,  // LEARNING_STYLE
    0.85, // PREFERENCE_ANALYSIS
];

pub const RECENCY_WEIGHTED_FACTOR: f32 = 0.1;
pub const HYBRID_RECENCY_FACTOR: f32 = 0.05;
pub const RECENCY_WINDOW_DAYS: f32 = 30.0;

// ---------------------------------------------------------------------
// ETL orchestrator
// ---------------------------------------------------------------------

pub const ETL_MAX_CONCURRENT_JOBS: usize = 5;
pub const ETL_MAX_RETRIES_PER_STAGE: u32 = 2;
pub const ETL_RETRY_BASE_DELAY_SECONDS: u64 = 60;
pub const ETL_RETRY_MAX_DELAY_SECONDS: u64 = 300;

/// Data-readiness poll: every 3 seconds, up to 120 attempts (6 minutes total).
pub const READINESS_POLL_INTERVAL_SECONDS: u64 = 3;
pub const READINESS_MAX_ATTEMPTS: u32 = 120;

/// Progress percentage per orchestrator stage, in stage order.
pub const STAGE_PROGRESS_PERCENTAGES: [u8; 7] = [5, 20, 35, 50, 70, 90, 100];

// ---------------------------------------------------------------------
// Question Processor / Context Builder / Response Generator
// ---------------------------------------------------------------------

pub const QUESTION_MIN_CHARS: usize = 3;
pub const QUESTION_MAX_CHARS: usize = 500;
pub const QUESTION_MIN_WORD_CHARS: usize = 2;

pub const KEYWORD_MAX_COUNT: usize = 10;
pub const CONVERSATION_HISTORY_DEPTH: usize = 5;

pub const CONTEXT_RETRIEVAL_LIMIT: i64 = 10;
pub const CONTEXT_TOP_K: usize = 5;

pub const TOKEN_BUDGET_DEFAULT: usize = 4_000;
/// `len(text) / 3`, the conservative character-to-token ratio (§4.J).
pub const TOKEN_CHARS_PER_TOKEN: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_prioritized_and_hybrid_weights_have_one_entry_per_doc_type() {
        assert_eq!(TYPE_PRIORITIZED_WEIGHTS.len(), crate::models::DocType::ALL.len());
        assert_eq!(HYBRID_TYPE_WEIGHTS.len(), crate::models::DocType::ALL.len());
    }

    #[test]
    fn stage_progress_percentages_are_monotonically_increasing() {
        for window in STAGE_PROGRESS_PERCENTAGES.windows(2) {
            assert!(window[0] < window[1]);
        }
        assert_eq!(*STAGE_PROGRESS_PERCENTAGES.last().unwrap(), 100);
    }

    #[test]
    fn readiness_window_is_six_minutes() {
        assert_eq!(
            READINESS_POLL_INTERVAL_SECONDS * READINESS_MAX_ATTEMPTS as u64,
            360
        );
    }

    #[test]
    fn question_length_bounds_are_ordered() {
        assert!(QUESTION_MIN_CHARS < QUESTION_MAX_CHARS);
    }
}
