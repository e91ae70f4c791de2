//! # thema-core
//!
//! Core types, traits, and abstractions shared by the Thema ETL + RAG chat
//! engine crates: domain models, storage/inference trait seams, error
//! taxonomy, in-process metrics, config-from-env, logging setup, and the
//! tokenizer helpers used by the question processor and context builder.

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod tokenizer;
pub mod traits;
pub mod uuid_utils;

pub use error::{Error, EtlErrorKind, Result};
pub use events::{EventBus, JobEvent};
pub use models::*;
pub use tokenizer::*;
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7, v7_from_timestamp};
