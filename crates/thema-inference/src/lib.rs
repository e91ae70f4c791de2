//! # thema-inference
//!
//! Embedding Client (§4.C) and Generation Backend implementations: Google
//! `embedContent`/`generateContent` callers plus deterministic mocks for
//! tests, and the rolling-window rate limiter shared between them.

pub mod embedding;
pub mod generation;
pub mod rate_limit;

pub use embedding::{GoogleEmbeddingBackend, MockEmbeddingBackend, SharedEmbeddingClient};
pub use generation::{GoogleGenerationBackend, MockGenerationBackend};
pub use rate_limit::RollingWindowLimiter;
