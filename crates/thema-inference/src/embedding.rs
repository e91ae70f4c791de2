//! Embedding Client (§4.C): a Google `embedContent`-backed implementation
//! plus a deterministic mock, both behind the `EmbeddingClient` trait —
//! caching, rate limiting, and batch-with-per-item-failure live here
//! rather than in the trait contract.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use pgvector::Vector;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use thema_core::defaults::{
    EMBEDDING_BATCH_SIZE, EMBEDDING_CACHE_CAPACITY, EMBEDDING_CACHE_TTL_SECONDS,
    EMBEDDING_MAX_CHARS, EMBEDDING_RATE_LIMIT_PER_MINUTE, EMBED_DIMENSION,
};
use thema_core::traits::{EmbeddingClient, EmbeddingResult};
use thema_core::{Error, Result};

use crate::rate_limit::RollingWindowLimiter;

struct CacheEntry {
    vector: Vector,
    inserted_at: Instant,
}

struct EmbeddingCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl EmbeddingCache {
    fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(EMBEDDING_CACHE_CAPACITY).unwrap(),
            )),
            ttl: Duration::from_secs(EMBEDDING_CACHE_TTL_SECONDS),
        }
    }

    async fn get(&self, key: &str) -> Option<Vector> {
        let mut cache = self.inner.lock().await;
        let entry = cache.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            cache.pop(key);
            return None;
        }
        Some(entry.vector.clone())
    }

    async fn set(&self, key: String, vector: Vector) {
        self.inner.lock().await.put(
            key,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }
}

fn truncate(text: &str) -> &str {
    if text.len() <= EMBEDDING_MAX_CHARS {
        text
    } else {
        let mut end = EMBEDDING_MAX_CHARS;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

#[derive(Serialize)]
struct GoogleEmbedRequest<'a> {
    model: &'a str,
    content: GoogleContent<'a>,
}

#[derive(Serialize)]
struct GoogleContent<'a> {
    parts: Vec<GooglePart<'a>>,
}

#[derive(Serialize)]
struct GooglePart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GoogleEmbedResponse {
    embedding: GoogleEmbedding,
}

#[derive(Deserialize)]
struct GoogleEmbedding {
    values: Vec<f32>,
}

/// Embedding Client (§4.C) backed by Google's `embedContent` endpoint.
pub struct GoogleEmbeddingBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
    cache: EmbeddingCache,
    rate_limiter: RollingWindowLimiter,
    max_retries: u32,
}

impl GoogleEmbeddingBackend {
    pub fn new(api_key: String) -> Self {
        Self::with_config(
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            "text-embedding-004".to_string(),
            api_key,
            EMBED_DIMENSION,
        )
    }

    pub fn with_config(base_url: String, model: String, api_key: String, dimension: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build embedding HTTP client");

        Self {
            client,
            base_url,
            model,
            api_key,
            dimension,
            cache: EmbeddingCache::new(),
            rate_limiter: RollingWindowLimiter::new(EMBEDDING_RATE_LIMIT_PER_MINUTE),
            max_retries: 3,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| Error::Config("GOOGLE_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    async fn embed_one(&self, text: &str) -> Result<(Vector, bool)> {
        let text = truncate(text);
        let cache_key = format!("{}:{}", self.model, text);

        if let Some(vector) = self.cache.get(&cache_key).await {
            return Ok((vector, true));
        }

        self.rate_limiter.acquire().await;

        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GoogleEmbedRequest {
            model: &format!("models/{}", self.model),
            content: GoogleContent {
                parts: vec![GooglePart { text }],
            },
        };

        let mut attempt = 0u32;
        loop {
            let result = self.client.post(&url).json(&body).send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: GoogleEmbedResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::Embedding(format!("failed to parse response: {e}")))?;
                    let vector = Vector::from(parsed.embedding.values);
                    self.cache.set(cache_key, vector.clone()).await;
                    return Ok((vector, false));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let message = format!("google embedContent returned {status}: {body}");
                    let (_, _, retryable) = thema_core::error::classify_message(&message);
                    if !retryable || attempt >= self.max_retries {
                        return Err(Error::Embedding(message));
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Embedding(format!("request failed: {e}")));
                    }
                }
            }
            let delay = Duration::from_millis(100 * 2u64.pow(attempt));
            warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying embedding call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl EmbeddingClient for GoogleEmbeddingBackend {
    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        let start = Instant::now();
        let (vector, cached) = self.embed_one(text).await?;
        Ok(EmbeddingResult {
            vector,
            dimensions: self.dimension,
            cached,
            processing_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBEDDING_BATCH_SIZE) {
            for text in chunk {
                match self.generate_embedding(text).await {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        warn!(error = %e, "embedding failed for batch item, using zero vector");
                        results.push(EmbeddingResult {
                            vector: Vector::from(vec![0.0; self.dimension]),
                            dimensions: self.dimension,
                            cached: false,
                            processing_ms: 0,
                        });
                    }
                }
            }
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// Deterministic embedding backend for tests: hashes the input text into a
/// fixed-dimension vector so repeated calls with the same text are stable.
pub struct MockEmbeddingBackend {
    dimension: usize,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: EMBED_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_vector(&self, text: &str) -> Vector {
        use std::hash::{Hash, Hasher};
        let mut values = Vec::with_capacity(self.dimension);
        let mut seed = {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            text.hash(&mut hasher);
            hasher.finish()
        };
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let v = ((seed >> 33) as i64 % 1000) as f32 / 1000.0;
            values.push(v);
        }
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        Vector::from(values)
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingBackend {
    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        debug!(len = text.len(), "mock embedding");
        Ok(EmbeddingResult {
            vector: self.hash_vector(text),
            dimensions: self.dimension,
            cached: false,
            processing_ms: 0,
        })
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.generate_embedding(text).await?);
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// Shared handle so a single cache/rate-limiter pair can back multiple
/// callers (e.g. the ETL transformer and the RAG question processor).
pub type SharedEmbeddingClient = Arc<dyn EmbeddingClient>;
