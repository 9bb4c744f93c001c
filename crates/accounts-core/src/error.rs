//! Error types for directory operations.
//!
//! A single error enum covers lookups, entity lifecycle failures, store-level
//! failures and configuration problems so callers can match on one type.

use thiserror::Error;

/// Main error type for account directory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Entry not found in the directory
    #[error("Not found: {0}")]
    NotFound(String),

    /// A lookup that must match a single entry matched several
    #[error("Ambiguous match: {count} entries match {filter}")]
    AmbiguousMatch {
        /// Rendered filter that produced the matches
        filter: String,
        /// Number of matching entries
        count: usize,
    },

    /// Entry already present in the directory
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// An entry cannot be saved because required attributes are unset
    #[error("Cannot save `{entry}`: missing attributes '{}'", .missing.join("', '"))]
    MissingRequiredAttribute {
        /// Identity of the entry being saved
        entry: String,
        /// Attributes that are missing or empty
        missing: Vec<String>,
    },

    /// A logical field name with no backing attribute
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Bind rejected by the directory
    #[error("Invalid credentials: {0}")]
    InvalidCredential(String),

    /// Transport or protocol failure reported by the directory
    #[error("Directory unavailable: {0}")]
    StoreUnavailable(String),

    /// Operation timed out
    #[error("Timeout waiting for directory: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::MissingRequiredAttribute { .. } => "MISSING_REQUIRED_ATTRIBUTE",
            Self::UnknownAttribute(_) => "UNKNOWN_ATTRIBUTE",
            Self::InvalidCredential(_) => "INVALID_CREDENTIAL",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_)
                | Self::ConfigError(_)
                | Self::StoreUnavailable(_)
                | Self::AmbiguousMatch { .. }
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::AmbiguousMatch {
                filter: "(cn=x)".to_string(),
                count: 2
            }
            .error_code(),
            "AMBIGUOUS_MATCH"
        );
        assert_eq!(
            Error::AlreadyExists("test".to_string()).error_code(),
            "ALREADY_EXISTS"
        );
        assert_eq!(
            Error::MissingRequiredAttribute {
                entry: "jdoe".to_string(),
                missing: vec!["mail".to_string()]
            }
            .error_code(),
            "MISSING_REQUIRED_ATTRIBUTE"
        );
        assert_eq!(
            Error::UnknownAttribute("test".to_string()).error_code(),
            "UNKNOWN_ATTRIBUTE"
        );
        assert_eq!(
            Error::InvalidCredential("test".to_string()).error_code(),
            "INVALID_CREDENTIAL"
        );
        assert_eq!(
            Error::StoreUnavailable("test".to_string()).error_code(),
            "STORE_UNAVAILABLE"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::ConfigError("test".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::InvalidRequest("test".to_string()).error_code(),
            "INVALID_REQUEST"
        );
        assert_eq!(
            Error::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            Error::InternalError("test".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::StoreUnavailable("connection reset".to_string());
        assert_eq!(err.to_string(), "Directory unavailable: connection reset");

        let err = Error::MissingRequiredAttribute {
            entry: "jdoe".to_string(),
            missing: vec!["mail".to_string(), "sn".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Cannot save `jdoe`: missing attributes 'mail', 'sn'"
        );

        let err = Error::AmbiguousMatch {
            filter: "(uid=jdoe)".to_string(),
            count: 3,
        };
        assert_eq!(err.to_string(), "Ambiguous match: 3 entries match (uid=jdoe)");
    }

    #[test]
    fn test_should_log() {
        assert!(Error::InternalError("test".to_string()).should_log());
        assert!(Error::ConfigError("test".to_string()).should_log());
        assert!(Error::StoreUnavailable("test".to_string()).should_log());

        assert!(!Error::NotFound("test".to_string()).should_log());
        assert!(!Error::InvalidCredential("test".to_string()).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::ConfigError(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::ConfigError(_)));
    }

    #[test]
    fn test_error_partial_eq() {
        let err1 = Error::NotFound("test".to_string());
        let err2 = Error::NotFound("test".to_string());
        let err3 = Error::NotFound("other".to_string());

        assert_eq!(err1, err2.clone());
        assert_ne!(err1, err3);
    }
}
