//! ColBERT Late Interaction Re-ranking
//!
//! Implements ColBERT-style token-level embeddings for fine-grained semantic matching.
//!
//! # Architecture
//!
//! ColBERT (Contextualized Late Interaction over BERT) enables precise semantic matching by:
//! 1. Storing per-token 128-dim embeddings for documents
//! 2. At query time, encoding query tokens to 128-dim embeddings
//! 3. Computing MaxSim score: Σ max(qi · dj) for all query tokens i and doc tokens j
//!
//! # Usage
//!
//! ```ignore
//! use matric_search::ColBERTReranker;
//!
//! let reranker = ColBERTReranker::new(db);
//!
//! // Re-rank initial search results
//! let reranked = reranker.rerank(
//!     initial_results,
//!     query_tokens,
//!     top_k: 20
//! ).await?;
//! ```

use pgvector::Vector;
use uuid::Uuid;

use matric_core::{Error, Result, SearchHit};
use matric_db::Database;
use matric_db::TokenEmbedding;

/// Configuration for ColBERT re-ranking.
#[derive(Debug, Clone)]
pub struct ColBERTConfig {
    /// Number of top candidates to re-rank (from initial retrieval)
    pub top_k: usize,
    /// Whether to enable ColBERT re-ranking
    pub enabled: bool,
    /// Minimum MaxSim score threshold (0.0 to disable)
    pub min_score: f32,
}

impl Default for ColBERTConfig {
    fn default() -> Self {
        Self {
            top_k: 100,
            enabled: false,
            min_score: 0.0,
        }
    }
}

impl ColBERTConfig {
    /// Create a new config with re-ranking enabled.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the number of candidates to re-rank.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Set minimum score threshold.
    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = score;
        self
    }
}

/// ColBERT late interaction re-ranker.
pub struct ColBERTReranker {
    db: Database,
}

impl ColBERTReranker {
    /// Create a new ColBERT re-ranker.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Compute MaxSim score between query tokens and document tokens.
    ///
    /// MaxSim = Σ max(qi · dj) for all query tokens i and doc tokens j
    ///
    /// For each query token, find the most similar document token (max cosine similarity),
    /// then sum these maximum similarities across all query tokens.
    pub fn compute_maxsim(query_tokens: &[Vector], doc_tokens: &[TokenEmbedding]) -> Result<f32> {
        if query_tokens.is_empty() || doc_tokens.is_empty() {
            return Ok(0.0);
        }

        let mut total_score = 0.0;

        // For each query token
        for q_token in query_tokens {
            let mut max_sim = f32::NEG_INFINITY;

            // Find max similarity with any document token
            for d_token in doc_tokens {
                let sim = Self::cosine_similarity(q_token, &d_token.embedding)?;
                if sim > max_sim {
                    max_sim = sim;
                }
            }

            total_score += max_sim;
        }

        Ok(total_score)
    }

    /// Compute cosine similarity between two vectors.
    fn cosine_similarity(a: &Vector, b: &Vector) -> Result<f32> {
        let a_vec = a.as_slice();
        let b_vec = b.as_slice();

        if a_vec.len() != b_vec.len() {
            return Err(Error::InvalidInput(format!(
                "Vector dimension mismatch: {} != {}",
                a_vec.len(),
                b_vec.len()
            )));
        }

        let dot_product: f32 = a_vec.iter().zip(b_vec.iter()).map(|(x, y)| x * y).sum();

        let a_norm: f32 = a_vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        let b_norm: f32 = b_vec.iter().map(|x| x * x).sum::<f32>().sqrt();

        if a_norm == 0.0 || b_norm == 0.0 {
            return Ok(0.0);
        }

        Ok(dot_product / (a_norm * b_norm))
    }

    /// Re-rank search results using ColBERT MaxSim scoring.
    ///
    /// Takes initial search results and query token embeddings,
    /// retrieves document token embeddings, computes MaxSim scores,
    /// and returns re-ranked results.
    pub async fn rerank(
        &self,
        mut initial_results: Vec<SearchHit>,
        query_tokens: &[Vector],
        config: &ColBERTConfig,
    ) -> Result<Vec<SearchHit>> {
        if !config.enabled || query_tokens.is_empty() {
            return Ok(initial_results);
        }

        // Take top K candidates for re-ranking
        let candidates: Vec<SearchHit> = initial_results
            .drain(..config.top_k.min(initial_results.len()))
            .collect();

        // Re-rank each candidate
        let mut scored_results = Vec::with_capacity(candidates.len());

        for mut hit in candidates {
            // Retrieve token embeddings for this note
            let doc_tokens = self.db.colbert.get_token_embeddings(hit.note_id).await?;

            if doc_tokens.is_empty() {
                // No token embeddings available, keep original score
                scored_results.push(hit);
                continue;
            }

            // Compute MaxSim score
            let maxsim_score = Self::compute_maxsim(query_tokens, &doc_tokens)?;

            // Update hit score with MaxSim
            hit.score = maxsim_score;
            scored_results.push(hit);
        }

        // Sort by MaxSim score (descending)
        scored_results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Apply minimum score filter
        if config.min_score > 0.0 {
            scored_results.retain(|hit| hit.score >= config.min_score);
        }

        Ok(scored_results)
    }

    /// Check if a note has ColBERT token embeddings.
    pub async fn has_embeddings(&self, note_id: Uuid) -> Result<bool> {
        self.db.colbert.has_embeddings(note_id).await
    }

    /// Get token count for a note.
    pub async fn get_token_count(&self, note_id: Uuid) -> Result<i32> {
        self.db.colbert.get_token_count(note_id).await
    }
}
