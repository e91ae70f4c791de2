//! Vector Search Service (§4.H): similarity query builder, ranking-strategy
//! score adjustment, result cache, retry on transient DB errors, and
//! in-process performance bookkeeping.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use thema_core::defaults::{
    HYBRID_RECENCY_FACTOR, HYBRID_TYPE_WEIGHTS, RECENCY_WEIGHTED_FACTOR, RECENCY_WINDOW_DAYS,
    SEARCH_DEFAULT_LIMIT, SEARCH_DEFAULT_THRESHOLD, SEARCH_MAX_RETRIES, SEARCH_PERFORMANCE_HISTORY,
    SEARCH_RETRY_BASE_DELAY_MS, SEARCH_SIMILAR_DOCUMENTS_FLOOR, TYPE_PRIORITIZED_WEIGHTS,
};
use thema_core::error::classify_message;
use thema_core::traits::{SearchQuery, SearchRanking, SearchResult, SimilarityMetric, VectorSearch};
use thema_core::{CompletionLevel, DocType, Document, DocumentMetadata, Error, Result};

use crate::cache::{cache_key, SearchResultCache};

fn doc_type_index(doc_type: DocType) -> usize {
    DocType::ALL.iter().position(|t| *t == doc_type).unwrap_or(0)
}

fn type_boost(doc_type: DocType, ranking: SearchRanking) -> f32 {
    match ranking {
        SearchRanking::TypePrioritized => TYPE_PRIORITIZED_WEIGHTS[doc_type_index(doc_type)],
        SearchRanking::Hybrid => HYBRID_TYPE_WEIGHTS[doc_type_index(doc_type)],
        _ => 1.0,
    }
}

fn recency_boost(created_at: chrono::DateTime<Utc>) -> f32 {
    let age_days = (Utc::now() - created_at).num_days() as f32;
    (1.0 - age_days / RECENCY_WINDOW_DAYS).max(0.0)
}

fn adjust_score(similarity: f32, doc_type: DocType, created_at: chrono::DateTime<Utc>, ranking: SearchRanking) -> f32 {
    match ranking {
        SearchRanking::SimilarityOnly => similarity,
        SearchRanking::RecencyWeighted => {
            similarity * (1.0 + RECENCY_WEIGHTED_FACTOR * recency_boost(created_at))
        }
        SearchRanking::TypePrioritized => similarity * type_boost(doc_type, ranking),
        SearchRanking::Hybrid => {
            similarity * type_boost(doc_type, ranking) * (1.0 + HYBRID_RECENCY_FACTOR * recency_boost(created_at))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchPerformanceMetrics {
    pub query_time_ms: u64,
    pub total_documents_searched: usize,
    pub results_returned: usize,
    pub similarity_threshold: f32,
    pub search_timestamp: chrono::DateTime<Utc>,
    pub user_id: Uuid,
}

pub struct VectorSearchService {
    pool: Pool<Postgres>,
    cache: SearchResultCache,
    metrics: Mutex<Vec<SearchPerformanceMetrics>>,
}

impl VectorSearchService {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            cache: SearchResultCache::new(),
            metrics: Mutex::new(Vec::new()),
        }
    }

    fn similarity_sql(metric: SimilarityMetric) -> &'static str {
        match metric {
            SimilarityMetric::Cosine => "1 - (embedding <=> $2)",
            SimilarityMetric::L2 => "1 / (1 + (embedding <-> $2))",
            SimilarityMetric::InnerProduct => "(embedding <#> $2) * -1",
        }
    }

    fn metric_label(metric: SimilarityMetric) -> &'static str {
        match metric {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::L2 => "l2",
            SimilarityMetric::InnerProduct => "inner_product",
        }
    }

    fn parse_row(row: PgRow) -> Result<(Document, f32)> {
        let similarity: f64 = row.get("similarity");
        let doc_type_str: String = row.get("doc_type");
        let completion_level_str: String = row.get("completion_level");
        let data_sources: serde_json::Value = row.get("data_sources");
        let hypothetical_questions: serde_json::Value = row.get("hypothetical_questions");
        let extra: serde_json::Value = row.get("extra");

        let completion_level = match completion_level_str.as_str() {
            "none" => CompletionLevel::None,
            "low" => CompletionLevel::Low,
            "medium" => CompletionLevel::Medium,
            "high" => CompletionLevel::High,
            "partial" => CompletionLevel::Partial,
            "complete" => CompletionLevel::Complete,
            other => return Err(Error::Internal(format!("invalid completion_level: {other}"))),
        };

        let document = Document {
            id: row.get("id"),
            user_id: row.get("user_id"),
            doc_type: doc_type_str.parse::<DocType>().map_err(Error::Internal)?,
            content: row.get("content"),
            summary_text: row.get("summary_text"),
            searchable_text: row.get("searchable_text"),
            metadata: DocumentMetadata {
                sub_type: row.get("sub_type"),
                completion_level,
                created_at: row.get("created_at"),
                data_sources: serde_json::from_value(data_sources).unwrap_or_default(),
                hypothetical_questions: serde_json::from_value(hypothetical_questions)
                    .unwrap_or_default(),
                extra: match extra {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                },
            },
            embedding: row.get("embedding"),
        };

        Ok((document, similarity as f32))
    }

    async fn execute_with_retry(&self, query: &SearchQuery) -> Result<Vec<PgRow>> {
        let similarity_expr = Self::similarity_sql(query.metric);
        let sql = format!(
            "SELECT *, {similarity_expr} AS similarity FROM chat_documents
             WHERE user_id = $1 AND {similarity_expr} > $3
               AND ($4::text[] IS NULL OR doc_type = ANY($4::text[]))
             ORDER BY similarity DESC LIMIT $5"
        );

        let doc_types: Option<Vec<&str>> = query
            .doc_types
            .as_ref()
            .map(|types| types.iter().map(|t| t.as_str()).collect());

        let mut attempt = 0u32;
        loop {
            let q = sqlx::query(&sql)
                .bind(query.user_id)
                .bind(&query.vector)
                .bind(query.threshold)
                .bind(&doc_types)
                .bind(query.limit);

            match q.fetch_all(&self.pool).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    let (_, _, retryable) = classify_message(&e.to_string());
                    if !retryable || attempt >= SEARCH_MAX_RETRIES {
                        return Err(Error::Database(e));
                    }
                    let backoff = Duration::from_millis(SEARCH_RETRY_BASE_DELAY_MS) * 2u32.pow(attempt);
                    let jitter = rand::thread_rng().gen_range(0..=50u64);
                    warn!(attempt, error = %e, "vector search db error, retrying");
                    tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn record_metrics(&self, m: SearchPerformanceMetrics) {
        let mut metrics = self.metrics.lock().unwrap();
        metrics.push(m);
        let len = metrics.len();
        if len > SEARCH_PERFORMANCE_HISTORY {
            let drop = len - SEARCH_PERFORMANCE_HISTORY;
            metrics.drain(0..drop);
        }
    }

    pub async fn multi_type_search(
        &self,
        user_id: Uuid,
        vector: pgvector::Vector,
        doc_types: &[DocType],
        limit_per_type: i64,
    ) -> std::collections::HashMap<DocType, Vec<SearchResult>> {
        let mut out = std::collections::HashMap::new();
        for doc_type in doc_types {
            let results = self
                .search_by_document_type(user_id, vector.clone(), *doc_type, limit_per_type)
                .await
                .unwrap_or_else(|e| {
                    warn!(doc_type = %doc_type, error = %e, "multi-type search failed for type");
                    Vec::new()
                });
            out.insert(*doc_type, results);
        }
        out
    }

    /// Vector-only search; `text_query`, when present, is recorded as
    /// metadata only (no full-text index backs this domain — see spec §4.H
    /// Non-goals).
    pub async fn hybrid_search(
        &self,
        user_id: Uuid,
        vector: pgvector::Vector,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        self.similarity_search(SearchQuery {
            user_id,
            vector,
            metric: SimilarityMetric::Cosine,
            threshold: SEARCH_DEFAULT_THRESHOLD,
            limit,
            doc_types: None,
            ranking: SearchRanking::Hybrid,
            text_query: None,
        })
        .await
    }

    pub async fn benchmark_query(&self, query: &SearchQuery, runs: u32) -> (f64, f64, f64) {
        let mut timings = Vec::with_capacity(runs.max(1) as usize);
        for _ in 0..runs.max(1) {
            let start = Instant::now();
            let _ = self.similarity_search(query.clone()).await;
            timings.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        let avg = timings.iter().sum::<f64>() / timings.len() as f64;
        let min = timings.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = timings.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (avg, min, max)
    }

    pub fn optimize_search_performance(&self) -> serde_json::Value {
        let metrics = self.metrics.lock().unwrap();
        if metrics.is_empty() {
            return serde_json::json!({"message": "no performance metrics available"});
        }

        let recent = &metrics[metrics.len().saturating_sub(100)..];
        let avg_time: f64 =
            recent.iter().map(|m| m.query_time_ms as f64).sum::<f64>() / recent.len() as f64;
        let max_time = recent.iter().map(|m| m.query_time_ms).max().unwrap_or(0);
        let min_time = recent.iter().map(|m| m.query_time_ms).min().unwrap_or(0);
        let avg_results: f64 =
            recent.iter().map(|m| m.results_returned as f64).sum::<f64>() / recent.len() as f64;

        let mut recommendations = Vec::new();
        if avg_time > 500.0 {
            recommendations.push("consider optimizing HNSW index parameters");
        }
        if max_time > 2000 {
            recommendations.push("some queries are very slow - check for missing indexes");
        }
        if avg_results < 2.0 {
            recommendations.push("low result counts - consider lowering similarity threshold");
        }

        serde_json::json!({
            "performance_summary": {
                "average_query_time_ms": avg_time,
                "max_query_time_ms": max_time,
                "min_query_time_ms": min_time,
                "average_results_returned": avg_results,
                "total_queries_analyzed": recent.len(),
            },
            "recommendations": recommendations,
        })
    }
}

#[async_trait]
impl VectorSearch for VectorSearchService {
    async fn similarity_search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        if query.vector.as_slice().len() != 768 {
            return Err(Error::Validation("query vector must be 768-dimensional".into()));
        }

        let key = cache_key(
            query.user_id,
            Self::metric_label(query.metric),
            query.threshold,
            query.limit,
            &query.doc_types,
            query.vector.as_slice(),
        );

        if let Some(cached) = self.cache.get(&key) {
            debug!(cache_hit = true, "vector search cache hit");
            return Ok(cached);
        }

        let started = Instant::now();
        let rows = self.execute_with_retry(&query).await?;
        let total_searched = rows.len();

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let (document, similarity) = Self::parse_row(row)?;
            let adjusted_score =
                adjust_score(similarity, document.doc_type, document.metadata.created_at, query.ranking);
            results.push(SearchResult {
                document,
                similarity,
                adjusted_score,
                rank: 0,
            });
        }

        if query.ranking != SearchRanking::SimilarityOnly {
            results.sort_by(|a, b| b.adjusted_score.partial_cmp(&a.adjusted_score).unwrap());
        }
        for (i, r) in results.iter_mut().enumerate() {
            r.rank = i + 1;
        }

        self.cache.set(key, results.clone());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.record_metrics(SearchPerformanceMetrics {
            query_time_ms: elapsed_ms,
            total_documents_searched: total_searched,
            results_returned: results.len(),
            similarity_threshold: query.threshold,
            search_timestamp: Utc::now(),
            user_id: query.user_id,
        });

        info!(
            result_count = results.len(),
            duration_ms = elapsed_ms,
            "vector search completed"
        );

        Ok(results)
    }

    async fn search_by_document_type(
        &self,
        user_id: Uuid,
        vector: pgvector::Vector,
        doc_type: DocType,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        self.similarity_search(SearchQuery {
            user_id,
            vector,
            metric: SimilarityMetric::Cosine,
            threshold: SEARCH_DEFAULT_THRESHOLD,
            limit,
            doc_types: Some(vec![doc_type]),
            ranking: SearchRanking::SimilarityOnly,
            text_query: None,
        })
        .await
    }

    async fn get_similar_documents(&self, doc_id: Uuid, limit: i64) -> Result<Vec<SearchResult>> {
        let source = sqlx::query("SELECT * FROM chat_documents WHERE id = $1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DocumentNotFound(doc_id))?;

        let (source_doc, _) = Self::parse_row(source)?;
        let embedding = source_doc
            .embedding
            .clone()
            .ok_or_else(|| Error::Search("source document has no embedding".into()))?;

        let rows = sqlx::query(
            "SELECT *, 1 - (embedding <=> $2) AS similarity FROM chat_documents
             WHERE user_id = $1 AND id != $3 AND 1 - (embedding <=> $2) > $4
             ORDER BY similarity DESC LIMIT $5",
        )
        .bind(source_doc.user_id)
        .bind(&embedding)
        .bind(doc_id)
        .bind(SEARCH_SIMILAR_DOCUMENTS_FLOOR)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut results = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            let (document, similarity) = Self::parse_row(row)?;
            results.push(SearchResult {
                document,
                similarity,
                adjusted_score: similarity,
                rank: i + 1,
            });
        }
        Ok(results)
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            user_id: Uuid::nil(),
            vector: pgvector::Vector::from(vec![0.0; 768]),
            metric: SimilarityMetric::Cosine,
            threshold: SEARCH_DEFAULT_THRESHOLD,
            limit: SEARCH_DEFAULT_LIMIT,
            doc_types: None,
            ranking: SearchRanking::SimilarityOnly,
            text_query: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn recency_boost_decays_to_zero_after_window() {
        let old = Utc::now() - ChronoDuration::days(60);
        assert_eq!(recency_boost(old), 0.0);
    }

    #[test]
    fn recency_boost_is_near_one_for_fresh_documents() {
        let fresh = Utc::now();
        assert!(recency_boost(fresh) > 0.9);
    }

    #[test]
    fn type_prioritized_boost_matches_weight_table() {
        assert_eq!(
            type_boost(DocType::PersonalityProfile, SearchRanking::TypePrioritized),
            1.2
        );
        assert_eq!(
            type_boost(DocType::PreferenceAnalysis, SearchRanking::TypePrioritized),
            0.7
        );
    }

    #[test]
    fn similarity_only_ranking_does_not_adjust_score() {
        let now = Utc::now();
        let score = adjust_score(0.8, DocType::UserProfile, now, SearchRanking::SimilarityOnly);
        assert_eq!(score, 0.8);
    }
}
