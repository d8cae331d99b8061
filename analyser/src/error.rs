//! Error types for command registration, parsing and shortcut management.

use command_grammar_core::{ParseError, PatternError, ValidationError};
use thiserror::Error;

/// Errors raised by [`CommandManager`](crate::CommandManager) and the
/// analyser compiler.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The command declaration is structurally invalid.
    #[error("invalid command: {0}")]
    Validation(#[from] ValidationError),

    /// A header or pattern expression failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command disabled: {0}")]
    CommandDisabled(String),

    /// Registering another command would exceed `command_max_count`.
    #[error("command capacity exceeded (max {0})")]
    CapacityExceeded(usize),

    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    /// No shortcut matches the key.
    #[error("shortcut not found: {0}")]
    ShortcutNotFound(String),

    /// A failed parse, raised for commands configured with `raise_error`.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`ManagerError`].
pub type Result<T> = std::result::Result<T, ManagerError>;
