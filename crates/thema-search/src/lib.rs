//! # thema-search
//!
//! Vector Search Service (§4.H): pgvector-backed similarity search over a
//! user's chunked analysis documents, with ranking strategies, a result
//! cache, and retry on transient database errors.
//!
//! ## Example
//!
//! ```ignore
//! use thema_search::VectorSearchService;
//! use thema_core::traits::{SearchQuery, VectorSearch};
//!
//! let service = VectorSearchService::new(pool);
//! let results = service.similarity_search(query).await?;
//! ```

pub mod cache;
pub mod service;

pub use cache::{cache_key, SearchResultCache};
pub use service::{SearchPerformanceMetrics, VectorSearchService};
