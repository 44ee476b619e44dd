//! Error types for NSX tag operations.
//!
//! Errors are categorized so callers can decide whether an operation is
//! worth retrying. The library itself never retries: every remote-call
//! failure aborts the current reconciliation step and is surfaced with
//! enough context (operation, target, remote status and body) to diagnose.

use std::fmt;

/// Result type alias for NSX tag operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for caller-side retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// The endpoint rejected the request with a non-2xx status.
    Remote,
    /// Tag or VM not found on the endpoint.
    NotFound,
    /// A tag reference could not be resolved to an id.
    Reference,
    /// Invalid or unsupported configuration.
    Config,
    /// Response body could not be decoded.
    Format,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    ///
    /// Reconciliation is re-derived from fresh remote state on every
    /// invocation, so a retry after a network failure is always safe.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Remote => "Request rejected by the NSX endpoint",
            Self::NotFound => "Tag or VM not found",
            Self::Reference => "Unresolved tag reference",
            Self::Config => "Invalid configuration",
            Self::Format => "Invalid response format",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling tags and attachments.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection or timeout failure before a status was received.
    #[error("transport failure during {operation}: {message}")]
    Transport {
        /// Operation being performed (e.g. "attach securitytag-1 to vm-1").
        operation: String,
        /// Underlying transport error message.
        message: String,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("{operation} rejected by endpoint (HTTP {status}): {body}")]
    Remote {
        /// Operation being performed.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// A tag or VM does not exist on the endpoint.
    ///
    /// Tolerated by some callers (delete and detach treat it as already
    /// satisfied), surfaced by the rest.
    #[error("{kind} {id} not found")]
    NotFound {
        /// What was looked up ("security tag" or "vm").
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A tag name did not match any tag in the listing snapshot.
    #[error("security tag {0:?} not found")]
    UnresolvedReference(String),

    /// Mutually exclusive or missing desired-state fields.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The endpoint reports an API version below the supported minimum.
    #[error("unsupported NSX version {found}, {minimum} or higher is required")]
    UnsupportedVersion {
        /// Version reported by the configuration.
        found: String,
        /// Minimum supported version.
        minimum: String,
    },

    /// Response body could not be decoded.
    #[error("invalid response during {operation}: {message}")]
    InvalidResponse {
        /// Operation being performed.
        operation: String,
        /// Decode error message.
        message: String,
    },
}

impl Error {
    /// Create a transport error with operation context.
    pub fn transport(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a not-found error for a security tag.
    pub fn tag_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "security tag",
            id: id.into(),
        }
    }

    /// Create a not-found error for a VM.
    pub fn vm_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "vm",
            id: id.into(),
        }
    }

    /// Get the error category for retry decisions.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Network,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::UnresolvedReference(_) => ErrorCategory::Reference,
            Error::Configuration(_) | Error::UnsupportedVersion { .. } => ErrorCategory::Config,
            Error::InvalidResponse { .. } => ErrorCategory::Format,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error is an absent-resource report.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Remote.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Reference.is_retryable());
        assert!(!ErrorCategory::Config.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
    }

    #[test]
    fn test_transport_category() {
        let err = Error::transport("list tags", "connection refused");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_remote_carries_status_and_body() {
        let err = Error::Remote {
            operation: "create tag".to_string(),
            status: 400,
            body: "invalid tag name".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Remote);
        let display = format!("{err}");
        assert!(display.contains("400"));
        assert!(display.contains("invalid tag name"));
    }

    #[test]
    fn test_not_found_helpers() {
        let err = Error::tag_not_found("securitytag-12");
        assert!(err.is_not_found());
        assert!(format!("{err}").contains("securitytag-12"));

        let err = Error::vm_not_found("vm-42");
        assert!(err.is_not_found());
        assert!(format!("{err}").contains("vm-42"));
    }

    #[test]
    fn test_unresolved_reference_names_original_string() {
        let err = Error::UnresolvedReference("prod".to_string());
        assert_eq!(err.category(), ErrorCategory::Reference);
        assert!(format!("{err}").contains("\"prod\""));
    }

    #[test]
    fn test_unsupported_version_category() {
        let err = Error::UnsupportedVersion {
            found: "6.1".to_string(),
            minimum: "6.2".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_retryable());
    }
}
