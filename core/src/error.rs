//! Error types for pattern construction and matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a pattern or resolving a type spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The regex source failed to compile.
    #[error("invalid regex `{expression}`: {message}")]
    InvalidRegex { expression: String, message: String },

    /// Regex sources are anchored automatically and must not carry `^`/`$`.
    #[error("regex `{0}` must not carry its own anchors")]
    Anchored(String),

    /// An empty type specification string.
    #[error("type specification cannot be empty")]
    EmptySpec,

    /// `!` was applied to something that is not a pattern (e.g. `!*`).
    #[error("type specification `{0}` cannot be negated")]
    NotNegatable(String),
}

/// Convenience alias for results with [`PatternError`].
pub type Result<T> = std::result::Result<T, PatternError>;

/// Reason a pattern rejected an input.
///
/// Carried inside [`ValidateResult::Error`](crate::ValidateResult::Error) and
/// rendered into parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MatchFailed {
    /// The input had a runtime type the pattern does not accept.
    #[error("type of `{input}` is {actual}, expected {expected}")]
    Type {
        input: String,
        actual: String,
        expected: String,
    },

    /// The input had an acceptable type but an incorrect value.
    #[error("`{input}` is incorrect with {expected}")]
    Value { input: String, expected: String },
}
