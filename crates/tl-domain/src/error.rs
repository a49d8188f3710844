//! Error handling types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Trendlens
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Input violates a stated constraint
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the constraint violation
        message: String,
    },

    /// Credential missing
    #[error("Authentication required: {message}")]
    AuthRequired {
        /// Description of the missing credential
        message: String,
    },

    /// Credential insufficient
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the refused operation
        message: String,
    },

    /// Internal or upstream rate limit hit
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Description of the limit that was hit
        message: String,
        /// Server-advertised or computed retry-after hint
        retry_after: Option<Duration>,
    },

    /// Network or 5xx from an upstream; retried with backoff
    #[error("Transient error: {message}")]
    Transient {
        /// Description of the transient failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Custom plugin violated sandbox policy; never retried
    #[error("Sandbox security violation: {message}")]
    SandboxSecurity {
        /// Description of the policy violation
        message: String,
    },

    /// Sandbox or pipeline exceeded its time or memory budget
    #[error("Resource exhausted: {message}")]
    ResourceExhausted {
        /// Description of the exhausted budget
        message: String,
    },

    /// A dependency (vector store, cache, DB) is down; surfaced, never substituted
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        /// Name of the unavailable dependency
        service: String,
    },

    /// Unclassified error; logged with a correlation id
    #[error("Internal error [{correlation_id}]: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
        /// Correlation id surfaced to the caller and logged server-side
        correlation_id: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Missing configuration field
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    /// Invalid configuration value
    #[error("Invalid configuration for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key that is invalid
        key: String,
        /// Reason why it is invalid
        message: String,
    },

    /// Database-related error
    #[error("Database error: {message}")]
    Database {
        /// Description of the database error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache operation error
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache error
        message: String,
    },

    /// Vector database operation error
    #[error("Vector database error: {message}")]
    VectorDb {
        /// Description of the vector database error
        message: String,
    },

    /// Embedding provider operation error
    #[error("Embedding provider error: {message}")]
    Embedding {
        /// Description of the embedding provider error
        message: String,
    },
}

// Basic error creation methods
impl Error {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authentication-required error
    pub fn auth_required<S: Into<String>>(message: S) -> Self {
        Self::AuthRequired {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a rate limited error without a retry-after hint
    pub fn rate_limited<S: Into<String>>(message: S) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a rate limited error with a retry-after hint
    pub fn rate_limited_after<S: Into<String>>(message: S, retry_after: Duration) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    /// Create a sandbox security violation
    pub fn sandbox_security<S: Into<String>>(message: S) -> Self {
        Self::SandboxSecurity {
            message: message.into(),
        }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted<S: Into<String>>(message: S) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable<S: Into<String>>(service: S) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
        }
    }

    /// Create an internal error with a fresh correlation id
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

// Transient error creation methods
impl Error {
    /// Create a transient error
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient error with source
    pub fn transient_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// I/O and infrastructure error creation methods
impl Error {
    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with source
    pub fn database_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a vector database error
    pub fn vector_db<S: Into<String>>(message: S) -> Self {
        Self::VectorDb {
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }
}

// Classification helpers
impl Error {
    /// Machine-readable tag for the error kind, stable across releases.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IoSimple { .. } | Self::Io { .. } => "io",
            Self::Json { .. } => "json",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::AuthRequired { .. } => "auth_required",
            Self::Forbidden { .. } => "forbidden",
            Self::RateLimited { .. } => "rate_limited",
            Self::Transient { .. } => "transient",
            Self::SandboxSecurity { .. } => "sandbox_security",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
            Self::Config { .. } | Self::ConfigMissing(_) | Self::ConfigInvalid { .. } => "config",
            Self::Database { .. } => "database",
            Self::Cache { .. } => "cache",
            Self::VectorDb { .. } => "vector_db",
            Self::Embedding { .. } => "embedding",
        }
    }

    /// Whether the operation that produced this error may be retried internally.
    ///
    /// `Transient` and `RateLimited` are retried with backoff; `ResourceExhausted`
    /// is retryable once at the call site. Sandbox violations are never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::ResourceExhausted { .. }
        )
    }

    /// Retry-after hint when the upstream advertised one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_matches_spec() {
        assert!(Error::transient("connection reset").is_retryable());
        assert!(Error::rate_limited("upstream 429").is_retryable());
        assert!(Error::resource_exhausted("sandbox timeout").is_retryable());
        assert!(!Error::sandbox_security("exec reference").is_retryable());
        assert!(!Error::service_unavailable("qdrant").is_retryable());
        assert!(!Error::not_found("trend").is_retryable());
    }

    #[test]
    fn internal_errors_carry_correlation_ids() {
        let err = Error::internal("boom");
        match &err {
            Error::Internal { correlation_id, .. } => {
                assert_eq!(correlation_id.len(), 36);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn kinds_are_stable_tags() {
        assert_eq!(Error::validation("x").kind(), "validation");
        assert_eq!(Error::service_unavailable("db").kind(), "service_unavailable");
        assert_eq!(Error::sandbox_security("x").kind(), "sandbox_security");
    }
}
