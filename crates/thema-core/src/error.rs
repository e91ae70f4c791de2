//! Workspace error type and the ETL error-classification taxonomy.

use thiserror::Error;

/// Result type alias using thema-core's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by every thema crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Job not found
    #[error("job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Document not found
    #[error("document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// LLM generation failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Vector search failed
    #[error("search error: {0}")]
    Search(String),

    /// ETL job/stage error
    #[error("job error: {0}")]
    Job(String),

    /// Data validation failed
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("request error: {0}")]
    Request(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// Authentication/authorization failed
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// File I/O operation failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Error-kind taxonomy for the ETL pipeline, mirroring the substring-based
/// classification the upstream Python orchestrator used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtlErrorKind {
    Validation,
    Network,
    Database,
    ExternalApi,
    Timeout,
    Unknown,
}

impl EtlErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EtlErrorKind::Validation => "validation_error",
            EtlErrorKind::Network => "network_error",
            EtlErrorKind::Database => "database_error",
            EtlErrorKind::ExternalApi => "external_api_error",
            EtlErrorKind::Timeout => "timeout_error",
            EtlErrorKind::Unknown => "unknown_error",
        }
    }
}

/// Severity of a classified error, driving the orchestrator's
/// rollback/partial-commit/notification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Classify an error by substring-matching its `Display` output (lowercased),
/// in the same order and with the same keyword lists as the upstream
/// `classify_error`. Returns `(kind, severity, is_retryable)`.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> (EtlErrorKind, Severity, bool) {
    classify_message(&err.to_string())
}

/// Same classification, operating directly on a message string. Exposed
/// separately since stage failures are often recorded as plain strings
/// before being wrapped into an [`Error`].
pub fn classify_message(message: &str) -> (EtlErrorKind, Severity, bool) {
    let message = message.to_lowercase();

    if ["timeout", "timed out", "deadline"]
        .iter()
        .any(|k| message.contains(k))
    {
        return (EtlErrorKind::Timeout, Severity::Warning, true);
    }

    if ["connection", "network", "dns", "socket"]
        .iter()
        .any(|k| message.contains(k))
    {
        return (EtlErrorKind::Network, Severity::Warning, true);
    }

    if ["database", "db", "sqlalchemy", "deadlock", "connection pool"]
        .iter()
        .any(|k| message.contains(k))
    {
        return (EtlErrorKind::Database, Severity::Critical, true);
    }

    if ["api", "rate limit", "quota", "service unavailable", "429", "503"]
        .iter()
        .any(|k| message.contains(k))
    {
        return (EtlErrorKind::ExternalApi, Severity::Warning, true);
    }

    if ["validation", "invalid", "missing required", "schema"]
        .iter()
        .any(|k| message.contains(k))
    {
        return (EtlErrorKind::Validation, Severity::Info, false);
    }

    (EtlErrorKind::Unknown, Severity::Warning, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::NotFound("x".into()).to_string(),
            "not found: x"
        );
        let id = Uuid::nil();
        assert_eq!(
            Error::JobNotFound(id).to_string(),
            format!("job not found: {}", id)
        );
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn classify_timeout_before_network() {
        let (kind, sev, retry) = classify_message("connection timed out while dialing host");
        assert_eq!(kind, EtlErrorKind::Timeout);
        assert_eq!(sev, Severity::Warning);
        assert!(retry);
    }

    #[test]
    fn classify_network() {
        let (kind, sev, retry) = classify_message("could not resolve dns for host");
        assert_eq!(kind, EtlErrorKind::Network);
        assert_eq!(sev, Severity::Warning);
        assert!(retry);
    }

    #[test]
    fn classify_database_critical() {
        let (kind, sev, retry) = classify_message("deadlock detected in transaction");
        assert_eq!(kind, EtlErrorKind::Database);
        assert_eq!(sev, Severity::Critical);
        assert!(retry);
    }

    #[test]
    fn classify_external_api() {
        let (kind, sev, retry) = classify_message("upstream returned 503 service unavailable");
        assert_eq!(kind, EtlErrorKind::ExternalApi);
        assert_eq!(sev, Severity::Warning);
        assert!(retry);
    }

    #[test]
    fn classify_validation_not_retryable() {
        let (kind, sev, retry) = classify_message("missing required field 'anp_seq'");
        assert_eq!(kind, EtlErrorKind::Validation);
        assert_eq!(sev, Severity::Info);
        assert!(!retry);
    }

    #[test]
    fn classify_unknown_default() {
        let (kind, sev, retry) = classify_message("something odd happened");
        assert_eq!(kind, EtlErrorKind::Unknown);
        assert_eq!(sev, Severity::Warning);
        assert!(!retry);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
