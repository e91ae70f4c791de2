//! Async trait seams between the ETL/RAG components and their backing
//! implementations (Postgres, HTTP embedding/generation backends, in-memory
//! fakes for tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Document, DocType, Job, JobStatus};

/// Partial update applied to a [`Job`] row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress_pct: Option<i16>,
    pub current_step: Option<i16>,
    pub completed_steps: Option<i16>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub failed_stage: Option<String>,
    pub query_results_summary: Option<serde_json::Value>,
    pub documents_created: Option<Vec<String>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job Store (§4.A): create/update/get/list/delete for ETL jobs, plus
/// lazy user creation to satisfy the job→user foreign-key invariant.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn ensure_user(&self, anp_seq: i64) -> Result<Uuid>;
    async fn create_job(&self, job: Job) -> Result<Job>;
    async fn update_job(&self, job_id: Uuid, update: JobUpdate) -> Result<Job>;
    /// Returns `None` rather than an error for an unknown job id — status
    /// queries treat "not found" as a normal outcome.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>>;
    async fn list_jobs_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Job>>;
    async fn delete_job(&self, job_id: Uuid) -> Result<()>;
}

/// Document Repository (§4.G): the only supported write shape is an atomic
/// delete-all-then-insert-all for a user, preserving document order.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn replace_documents(&self, user_id: Uuid, documents: Vec<Document>) -> Result<()>;
    async fn delete_documents_for_user(&self, user_id: Uuid) -> Result<()>;
    async fn list_documents_for_user(&self, user_id: Uuid) -> Result<Vec<Document>>;
    async fn get_document(&self, doc_id: Uuid) -> Result<Option<Document>>;
}

/// Result of one embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: pgvector::Vector,
    pub dimensions: usize,
    pub cached: bool,
    pub processing_ms: u64,
}

/// Embedding Client (§4.C).
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult>;

    /// A per-item failure yields a zero-vector placeholder rather than
    /// failing the whole batch.
    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>>;

    /// Fixed dimension this client's vectors are verified against (768 in
    /// the reference configuration).
    fn dimensions(&self) -> usize;
}

/// Similarity metric for vector search (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    L2,
    InnerProduct,
}

/// Result re-ranking strategy (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRanking {
    SimilarityOnly,
    RecencyWeighted,
    TypePrioritized,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub user_id: Uuid,
    pub vector: pgvector::Vector,
    pub metric: SimilarityMetric,
    pub threshold: f32,
    pub limit: i64,
    pub doc_types: Option<Vec<DocType>>,
    pub ranking: SearchRanking,
    /// Attached for hybrid_search's text_query parameter; vector-only for now.
    pub text_query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub similarity: f32,
    pub adjusted_score: f32,
    pub rank: usize,
}

/// Vector Search Service (§4.H).
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn similarity_search(&self, query: SearchQuery) -> Result<Vec<SearchResult>>;
    async fn search_by_document_type(
        &self,
        user_id: Uuid,
        vector: pgvector::Vector,
        doc_type: DocType,
        limit: i64,
    ) -> Result<Vec<SearchResult>>;
    async fn get_similar_documents(&self, doc_id: Uuid, limit: i64) -> Result<Vec<SearchResult>>;
}

/// Generation parameters for an LLM call (§4.K).
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// Generation Backend: the LLM dependency of the Response Generator.
/// Provider-agnostic by design (§4.K).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Metrics Registry (§4.B): labelled monotone counters and histograms,
/// safe under concurrent updates, exportable as a JSON snapshot.
pub trait MetricsRegistry: Send + Sync {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)], by: u64);
    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value_ms: f64);
    fn export_snapshot(&self) -> serde_json::Value;
}
