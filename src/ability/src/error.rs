//! Error types for the ability engine

use crate::types::SubjectValue;
use std::fmt;
use thiserror::Error;

/// Ability engine errors
#[derive(Debug, Error)]
pub enum AbilityError {
    /// Alias registration would make an action alias itself
    #[error("Invalid alias: {0}")]
    InvalidAlias(String),

    /// Condition uses an operator the matcher does not know
    #[error("Unsupported condition operator: {0}")]
    UnsupportedOperator(String),

    /// Operator operand has the wrong shape
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// Rule descriptor is malformed
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Subject data could not be turned into its JSON view
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Action was denied by the current rule set
    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),
}

/// Result type for ability operations
pub type Result<T> = std::result::Result<T, AbilityError>;

/// Denial raised by `Ability::throw_unless_can`
///
/// Carries the request that was denied and, when the blocking rule is an
/// inverted rule with a reason, that reason as the message.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ForbiddenError {
    /// Requested action
    pub action: String,

    /// Subject exactly as it was passed to the check
    pub subject: SubjectValue,

    /// Resolved subject type name
    pub subject_name: String,

    /// Optional message taken from the blocking rule's reason
    pub message: Option<String>,
}

impl ForbiddenError {
    /// Create a denial without a custom message
    pub fn new(
        action: impl Into<String>,
        subject: SubjectValue,
        subject_name: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            subject,
            subject_name: subject_name.into(),
            message: None,
        }
    }

    /// Attach a human readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}", message),
            None => write!(
                f,
                "Cannot execute \"{}\" on \"{}\"",
                self.action, self.subject_name
            ),
        }
    }
}
