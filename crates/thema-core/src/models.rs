//! Domain entities: users, ETL jobs, documents, and conversation memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user of the aptitude-test chat system.
///
/// Created lazily by the orchestrator the first time it sees an
/// `anp_seq` it doesn't already have a row for.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct User {
    pub id: Uuid,
    /// External sequence number used to look up legacy rows. Unique across users.
    pub anp_seq: i64,
    pub created_at: DateTime<Utc>,
}

/// Status of an ETL job. Mirrors the orchestrator's stage sequence plus
/// its three terminal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Started,
    ProcessingQueries,
    TransformingDocuments,
    GeneratingEmbeddings,
    StoringDocuments,
    Success,
    Failure,
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Started => "started",
            JobStatus::ProcessingQueries => "processing_queries",
            JobStatus::TransformingDocuments => "transforming_documents",
            JobStatus::GeneratingEmbeddings => "generating_embeddings",
            JobStatus::StoringDocuments => "storing_documents",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Partial => "partial",
        }
    }

    /// Terminal rows (success/failure/partial) are never mutated except by
    /// an explicit retry, which creates a new job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure | JobStatus::Partial)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "started" => Ok(Self::Started),
            "processing_queries" => Ok(Self::ProcessingQueries),
            "transforming_documents" => Ok(Self::TransformingDocuments),
            "generating_embeddings" => Ok(Self::GeneratingEmbeddings),
            "storing_documents" => Ok(Self::StoringDocuments),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "partial" => Ok(Self::Partial),
            other => Err(format!("invalid job status: {other}")),
        }
    }
}

/// An ETL job tracking one user's test-completion ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub anp_seq: i64,
    pub status: JobStatus,
    pub progress_pct: i16,
    pub current_step: i16,
    pub completed_steps: i16,
    /// Fixed at 7 — one per orchestrator stage after initialization.
    pub total_steps: i16,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub failed_stage: Option<String>,
    pub retry_count: i32,
    pub query_results_summary: Option<serde_json::Value>,
    pub documents_created: Vec<String>,
}

impl Job {
    pub fn new(user_id: Uuid, anp_seq: i64) -> Self {
        let now = Utc::now();
        Job {
            id: crate::uuid_utils::new_v7(),
            user_id,
            anp_seq,
            status: JobStatus::Pending,
            progress_pct: 0,
            current_step: 0,
            completed_steps: 0,
            total_steps: 7,
            started_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            error_type: None,
            failed_stage: None,
            retry_count: 0,
            query_results_summary: None,
            documents_created: Vec::new(),
        }
    }
}

/// Document type. Closed set — one document type per analysis domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    UserProfile,
    PersonalityProfile,
    ThinkingSkills,
    CareerRecommendations,
    CompetencyAnalysis,
    LearningStyle,
    PreferenceAnalysis,
}

impl DocType {
    pub const ALL: [DocType; 7] = [
        DocType::UserProfile,
        DocType::PersonalityProfile,
        DocType::ThinkingSkills,
        DocType::CareerRecommendations,
        DocType::CompetencyAnalysis,
        DocType::LearningStyle,
        DocType::PreferenceAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::UserProfile => "USER_PROFILE",
            DocType::PersonalityProfile => "PERSONALITY_PROFILE",
            DocType::ThinkingSkills => "THINKING_SKILLS",
            DocType::CareerRecommendations => "CAREER_RECOMMENDATIONS",
            DocType::CompetencyAnalysis => "COMPETENCY_ANALYSIS",
            DocType::LearningStyle => "LEARNING_STYLE",
            DocType::PreferenceAnalysis => "PREFERENCE_ANALYSIS",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "USER_PROFILE" => Ok(Self::UserProfile),
            "PERSONALITY_PROFILE" => Ok(Self::PersonalityProfile),
            "THINKING_SKILLS" => Ok(Self::ThinkingSkills),
            "CAREER_RECOMMENDATIONS" => Ok(Self::CareerRecommendations),
            "COMPETENCY_ANALYSIS" => Ok(Self::CompetencyAnalysis),
            "LEARNING_STYLE" => Ok(Self::LearningStyle),
            "PREFERENCE_ANALYSIS" => Ok(Self::PreferenceAnalysis),
            other => Err(format!("invalid doc_type: {other}")),
        }
    }
}

/// How complete the underlying source data was when a document was chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompletionLevel {
    None,
    Low,
    Medium,
    High,
    Partial,
    Complete,
}

impl CompletionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionLevel::None => "none",
            CompletionLevel::Low => "low",
            CompletionLevel::Medium => "medium",
            CompletionLevel::High => "high",
            CompletionLevel::Partial => "partial",
            CompletionLevel::Complete => "complete",
        }
    }
}

impl std::fmt::Display for CompletionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-document, sub_type-scoped metadata recorded at chunking time.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DocumentMetadata {
    /// Chunk discriminator within a doc_type, e.g. "basic_info", "skill_3".
    pub sub_type: String,
    pub completion_level: CompletionLevel,
    pub created_at: DateTime<Utc>,
    pub data_sources: Vec<String>,
    pub hypothetical_questions: Vec<String>,
    /// Free-form extras a chunker wants to attach (e.g. `has_alternatives`).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A chunked, embeddable unit of a user's test-result analysis.
///
/// Invariant: for a given `(user_id, doc_type, sub_type)` at most one row
/// survives a successful ETL run (replace-by-user semantics).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doc_type: DocType,
    /// Structured payload; serialized to JSON only at the storage boundary.
    pub content: serde_json::Value,
    pub summary_text: String,
    /// `summary_text` plus the hypothetical questions, newline-joined — this
    /// is the text that gets embedded.
    pub searchable_text: String,
    pub metadata: DocumentMetadata,
    /// None until the Embedding Client has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<pgvector::Vector>,
}

impl Document {
    pub fn new(
        user_id: Uuid,
        doc_type: DocType,
        sub_type: impl Into<String>,
        content: serde_json::Value,
        summary_text: impl Into<String>,
        completion_level: CompletionLevel,
    ) -> Self {
        let summary_text = summary_text.into();
        Document {
            id: crate::uuid_utils::new_v7(),
            user_id,
            doc_type,
            content,
            searchable_text: summary_text.clone(),
            summary_text,
            metadata: DocumentMetadata {
                sub_type: sub_type.into(),
                completion_level,
                created_at: Utc::now(),
                data_sources: Vec::new(),
                hypothetical_questions: Vec::new(),
                extra: serde_json::Map::new(),
            },
            embedding: None,
        }
    }

    /// Sets `hypothetical_questions` and recomputes `searchable_text` from
    /// `summary_text` + the questions, one per line.
    pub fn with_hypothetical_questions(mut self, questions: Vec<String>) -> Self {
        let mut searchable = self.summary_text.clone();
        for q in &questions {
            searchable.push('\n');
            searchable.push_str(q);
        }
        self.searchable_text = searchable;
        self.metadata.hypothetical_questions = questions;
        self
    }
}

/// One turn of a chat conversation, held in process-local memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_id: Uuid,
    pub question: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// A cached embedding keyed by a hash of `(preprocessed text, model id)`.
#[derive(Debug, Clone)]
pub struct EmbeddingCacheEntry {
    pub vector: pgvector::Vector,
    pub inserted_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}
