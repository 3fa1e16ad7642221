//! Error types for quick test operations.
//!
//! Every operation reports one of five kinds. Storage-level failures are
//! classified into these kinds at a single point (the store crate), so
//! callers never see raw database errors.

use std::fmt;
use thiserror::Error;

/// Result type alias for quick test operations.
pub type Result<T> = std::result::Result<T, QuickTestError>;

/// Machine-readable classification of a [`QuickTestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed identifier or registration payload.
    Invalid,
    /// The targeted identifier does not exist.
    NotFound,
    /// Duplicate identifier, or the kit is already registered.
    Conflict,
    /// The kit has already been scrubbed.
    Expired,
    /// Anything else: storage or I/O failure.
    Internal,
}

impl ErrorKind {
    /// Stable code for transport mapping and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Expired => "expired",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy for the quick test lifecycle.
///
/// Each variant carries a human-readable message. The set is closed: adapters
/// can match exhaustively to pick a transport status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuickTestError {
    /// Malformed identifier or registration payload. Never retried.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Operation targets a nonexistent identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate creation, or registration of an already registered kit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Registration of a kit whose personal data has been scrubbed.
    #[error("expired: {0}")]
    Expired(String),

    /// Storage failure or other unexpected condition (should not be exposed to users).
    #[error("internal: {0}")]
    Internal(String),
}

impl QuickTestError {
    /// Create an [`QuickTestError::Invalid`] error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Create a [`QuickTestError::NotFound`] error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a [`QuickTestError::Conflict`] error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an [`QuickTestError::Expired`] error.
    #[must_use]
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired(message.into())
    }

    /// Create an [`QuickTestError::Internal`] error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The machine-readable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Expired(_) => ErrorKind::Expired,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The human-readable message, without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Invalid(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Expired(m)
            | Self::Internal(m) => m,
        }
    }

    /// Returns `true` if this error is a normal business outcome caused by the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quicktest_core::QuickTestError;
    /// assert!(QuickTestError::conflict("already registered").is_user_error());
    /// assert!(!QuickTestError::internal("disk full").is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        let cases = [
            (QuickTestError::invalid("x"), "invalid"),
            (QuickTestError::not_found("x"), "not_found"),
            (QuickTestError::conflict("x"), "conflict"),
            (QuickTestError::expired("x"), "expired"),
            (QuickTestError::internal("x"), "internal"),
        ];

        for (err, code) in cases {
            assert_eq!(err.kind().as_str(), code);
            assert_eq!(err.message(), "x");
        }
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = QuickTestError::not_found("no quick test 42");
        assert_eq!(err.to_string(), "not found: no quick test 42");
    }
}
