//! Error types for the VMaaS reconciliation core
//!
//! Every layer returns these errors rather than handling them. The only
//! place an error is suppressed is the retry loop, which swallows
//! [`Error::is_transient`] failures in favour of another attempt.

use std::fmt;
use thiserror::Error;

/// Result type alias for VMaaS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the VMaaS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more fields of the desired-state document could not be extracted
    #[error("{0}")]
    Extraction(ExtractionErrors),

    /// Network failure, timeout or an object that is not visible yet
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The remote API rejected the request
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A search returned more than one entry where exactly one was expected
    #[error("ambiguous match: {count} entries found for '{key}'")]
    AmbiguousMatch {
        /// The key the search was filtered by
        key: String,
        /// Number of entries returned
        count: usize,
    },

    /// A search never returned an entry before the poll budget ran out
    #[error("'{key}' did not become visible after {attempts} attempt(s)")]
    NotVisible {
        /// The key the search was filtered by
        key: String,
        /// Attempts made so far
        attempts: u32,
    },

    /// The remote call succeeded at transport level but reported failure.
    /// The message is the response's own text.
    #[error("{0}")]
    Protocol(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a protocol error carrying the remote message verbatim
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Whether another attempt may succeed where this one failed.
    ///
    /// Used by the retry executor as its error classifier.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why a single field could not be extracted or written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// The path is absent (or null) in the document
    Missing,
    /// The value at the path has a different type than requested
    WrongType {
        /// Requested type
        expected: &'static str,
        /// Type found in the document
        found: &'static str,
    },
    /// The value could not be written back at the path
    Unwritable(String),
}

/// A single deferred extraction failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dot-separated path into the document
    pub path: String,
    /// What went wrong
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub(crate) fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Missing,
        }
    }

    pub(crate) fn wrong_type(
        path: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::WrongType { expected, found },
        }
    }

    pub(crate) fn unwritable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Unwritable(reason.into()),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Missing => write!(f, "{}: value is missing", self.path),
            FieldErrorKind::WrongType { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.path, expected, found)
            }
            FieldErrorKind::Unwritable(reason) => {
                write!(f, "{}: cannot set value ({})", self.path, reason)
            }
        }
    }
}

/// Aggregate of every extraction failure recorded by one accessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionErrors(pub Vec<FieldError>);

impl ExtractionErrors {
    /// The individual failures, in the order they were recorded
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ExtractionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s): ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::transient("connection reset").is_transient());
        assert!(Error::rate_limited("slow down").is_transient());

        assert!(!Error::validation("bad plan").is_transient());
        assert!(!Error::not_found("gone").is_transient());
        assert!(
            !Error::AmbiguousMatch {
                key: "vm".into(),
                count: 2
            }
            .is_transient()
        );
        assert!(!Error::protocol("clone failed").is_transient());
        // Exhausted polls are final once surfaced
        assert!(
            !Error::NotVisible {
                key: "vm".into(),
                attempts: 10
            }
            .is_transient()
        );
    }

    #[test]
    fn test_protocol_message_is_verbatim() {
        let err = Error::protocol("instance is locked");
        assert_eq!(err.to_string(), "instance is locked");
    }

    #[test]
    fn test_extraction_errors_display_lists_all() {
        let errors = ExtractionErrors(vec![
            FieldError::missing("name"),
            FieldError::wrong_type("plan_id", "integer", "string"),
        ]);
        let text = Error::Extraction(errors).to_string();
        assert!(text.starts_with("2 invalid field(s)"));
        assert!(text.contains("name: value is missing"));
        assert!(text.contains("plan_id: expected integer, found string"));
    }
}
