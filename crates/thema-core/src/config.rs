//! Environment-derived configuration for the ETL/RAG pipeline (§6).
//!
//! Each component gets its own small `from_env()` struct, following the
//! `WorkerConfig::from_env` idiom: no config-file parsing, everything comes
//! from `std::env::var` with typed defaults, loaded once at process start
//! (after `dotenvy::dotenv()` has populated the environment in dev).

use crate::defaults;

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// `DATABASE_URL` plus pool sizing.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> crate::error::Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| crate::error::Error::Config("DATABASE_URL is not set".to_string()))?;
        let max_connections = env_parsed("DATABASE_MAX_CONNECTIONS", 10u32);
        Ok(DatabaseConfig { url, max_connections })
    }
}

/// ETL orchestrator tunables.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout_minutes: u64,
    pub max_retries_per_stage: u32,
    pub retry_delay_seconds: u64,
    pub enable_partial_completion: bool,
    pub validation_level: ValidationLevel,
    pub enable_rollback: bool,
    pub readiness_force_threshold: u32,
    pub relaxed_document_validation: bool,
}

/// Data Validator strictness tiers (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Basic,
    Standard,
    Strict,
}

impl std::str::FromStr for ValidationLevel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(ValidationLevel::Basic),
            "standard" => Ok(ValidationLevel::Standard),
            "strict" => Ok(ValidationLevel::Strict),
            other => Err(format!("invalid validation level: {other}")),
        }
    }
}

impl EtlConfig {
    pub fn from_env() -> Self {
        EtlConfig {
            max_concurrent_jobs: env_parsed(
                "ETL_MAX_CONCURRENT_JOBS",
                defaults::ETL_MAX_CONCURRENT_JOBS,
            ),
            job_timeout_minutes: env_parsed("ETL_JOB_TIMEOUT_MINUTES", 30u64),
            max_retries_per_stage: env_parsed(
                "ETL_MAX_RETRIES",
                defaults::ETL_MAX_RETRIES_PER_STAGE,
            ),
            retry_delay_seconds: env_parsed(
                "ETL_RETRY_DELAY_SECONDS",
                defaults::ETL_RETRY_BASE_DELAY_SECONDS,
            ),
            enable_partial_completion: env_bool("ETL_ENABLE_PARTIAL_COMPLETION", true),
            validation_level: std::env::var("ETL_VALIDATION_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ValidationLevel::Standard),
            enable_rollback: env_bool("ETL_ENABLE_ROLLBACK", true),
            readiness_force_threshold: env_parsed("ETL_READINESS_FORCE_THRESHOLD", 100u32),
            relaxed_document_validation: env_bool("ETL_RELAXED_DOCUMENT_VALIDATION", true),
        }
    }
}

/// Embedding Client tunables (§4.C).
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub rate_limit_per_minute: u32,
    pub enable_cache: bool,
    pub cache_ttl_hours: u64,
    pub dimensions: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok();
        EmbeddingConfig {
            api_key,
            batch_size: env_parsed("EMBEDDING_BATCH_SIZE", defaults::EMBEDDING_BATCH_SIZE),
            rate_limit_per_minute: env_parsed(
                "EMBEDDING_RATE_LIMIT_PER_MINUTE",
                defaults::EMBEDDING_RATE_LIMIT_PER_MINUTE,
            ),
            enable_cache: env_bool("EMBEDDING_ENABLE_CACHE", true),
            cache_ttl_hours: env_parsed("EMBEDDING_CACHE_TTL_HOURS", 24u64),
            dimensions: defaults::EMBED_DIMENSION,
        }
    }
}

/// Logging tunables, read by the binary entry point before
/// `tracing_subscriber` initialization.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub enable_file_logging: bool,
    pub enable_structured_logging: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        LoggingConfig {
            log_level: std::env::var("ETL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            enable_file_logging: env_bool("ETL_ENABLE_FILE_LOGGING", false),
            enable_structured_logging: env_bool("ETL_ENABLE_STRUCTURED_LOGGING", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn etl_config_defaults_match_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("ETL_MAX_CONCURRENT_JOBS");
        std::env::remove_var("ETL_VALIDATION_LEVEL");
        let cfg = EtlConfig::from_env();
        assert_eq!(cfg.validation_level, ValidationLevel::Standard);
        assert_eq!(cfg.readiness_force_threshold, 100);
        assert!(cfg.relaxed_document_validation);
    }

    #[test]
    fn validation_level_parses_case_insensitively() {
        assert_eq!(
            "STRICT".parse::<ValidationLevel>().unwrap(),
            ValidationLevel::Strict
        );
        assert!("bogus".parse::<ValidationLevel>().is_err());
    }

    #[test]
    fn embedding_config_reads_either_key_name() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("GOOGLE_API_KEY");
        std::env::set_var("GEMINI_API_KEY", "test-key");
        let cfg = EmbeddingConfig::from_env();
        assert_eq!(cfg.api_key.as_deref(), Some("test-key"));
        std::env::remove_var("GEMINI_API_KEY");
    }
}
