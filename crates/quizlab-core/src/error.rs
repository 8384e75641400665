//! Validation error types.
//!
//! Malformed questions or configuration are fatal and surfaced immediately.
//! Silent defaulting is never acceptable here: a question with a defaulted
//! expected time or an unknown difficulty label would quietly skew every
//! statistic computed downstream.

use thiserror::Error;

/// Errors raised when validating questions or configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A difficulty label outside {easy, medium, hard}.
    #[error("unknown difficulty label: {0}")]
    UnknownDifficulty(String),

    /// A topic outside the fixed topic set.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// A question with a non-positive or non-finite expected time.
    #[error("expected time must be positive, got {0}")]
    NonPositiveExpectedTime(f64),

    /// A configuration value outside its documented bounds.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
