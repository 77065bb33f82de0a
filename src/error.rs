//! Error types for labelscope.
//!
//! All recoverable errors are strongly typed using thiserror so callers can
//! tell a policy conflict (access denied) apart from a misconfigured policy
//! (internal fault).
//!
//! An unrecognized node kind is deliberately absent from this module: the
//! walker treats it as a fatal defect and panics instead of returning.

use thiserror::Error;

/// Errors raised while constructing a single label matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherError {
    #[error("Label name cannot be empty")]
    EmptyLabelName,

    #[error("Invalid label name '{name}'")]
    InvalidLabelName {
        name: String,
    },

    #[error("Invalid regex for label '{label}': {reason}")]
    InvalidRegex {
        label: String,
        reason: String,
    },
}

/// Construction-time errors for enforcement policies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Invalid pattern for label '{label}': {reason}")]
    InvalidPattern {
        label: String,
        reason: String,
    },

    #[error("At least one value is required for label '{label}'")]
    EmptyValues {
        label: String,
    },

    #[error("Invalid matcher: {0}")]
    Matcher(#[from] MatcherError),

    #[error("Invalid policy configuration: {message}")]
    InvalidConfig {
        message: String,
    },
}

/// Errors raised while enforcing a policy on an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforceError {
    /// Strict mode forbids overriding a client-supplied matcher on a
    /// policy-controlled label.
    #[error("label matcher value ({existing}) conflicts with injected value ({required})")]
    Conflict {
        existing: String,
        required: String,
    },
}

/// Top-level error type for labelscope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Enforcement error: {0}")]
    Enforce(#[from] EnforceError),

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

impl From<MatcherError> for ScopeError {
    fn from(err: MatcherError) -> Self {
        Self::Policy(PolicyError::Matcher(err))
    }
}

impl ScopeError {
    /// Returns true if this is a strict-mode conflict.
    ///
    /// Gateways map this to an access-denied response.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Enforce(EnforceError::Conflict { .. }))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true if this is a policy construction error.
    #[must_use]
    pub const fn is_policy(&self) -> bool {
        matches!(self, Self::Policy(_))
    }
}

/// Result type alias for labelscope operations.
pub type ScopeResult<T> = Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_orders_existing_first() {
        let err = EnforceError::Conflict {
            existing: "tenant=\"other\"".to_string(),
            required: "tenant=\"acme\"".to_string(),
        };
        let msg = format!("{err}");
        assert_eq!(
            msg,
            "label matcher value (tenant=\"other\") conflicts with injected value (tenant=\"acme\")"
        );
    }

    #[test]
    fn test_invalid_pattern_message() {
        let err = PolicyError::InvalidPattern {
            label: "env".to_string(),
            reason: "regex should not match empty string".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("env"));
        assert!(msg.contains("empty string"));
    }

    #[test]
    fn test_scope_error_from_enforce() {
        let err: ScopeError = EnforceError::Conflict {
            existing: "a=\"1\"".to_string(),
            required: "a=\"2\"".to_string(),
        }
        .into();
        assert!(err.is_conflict());
        assert!(!err.is_policy());
    }

    #[test]
    fn test_scope_error_from_matcher() {
        let err: ScopeError = MatcherError::EmptyLabelName.into();
        assert!(err.is_policy());
        assert!(!err.is_conflict());
        assert!(format!("{err}").contains("Label name cannot be empty"));
    }
}
