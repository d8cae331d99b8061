//! Command declaration validation.
//!
//! Validates structural invariants of command declarations, catching errors
//! such as blank or reserved argument names, duplicate variadics, and
//! duplicate subcommands before the command is compiled.
//!
//! # Examples
//!
//! ```
//! use command_grammar_core::*;
//!
//! let cmd = Command::new("git").with_subcommand(Subcommand::new("commit"));
//! assert!(validate_command(&cmd).is_empty());
//!
//! // Invalid: argument names cannot start with `$`
//! let bad = Command::new("git").with_arg(Arg::new("$ref", builtin::STRING.clone()));
//! assert!(!validate_command(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::args::{ArgValue, Args};
use crate::command::Command;
use crate::node::Node;
use crate::typing::MultiBase;

/// Declaration validation errors.
///
/// Each variant describes a specific structural problem found during
/// validation. The `Display` impl provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Command name is empty or whitespace-only.
    #[error("command name cannot be empty")]
    EmptyCommandName,
    /// Argument name is empty or whitespace-only.
    #[error("argument name cannot be empty")]
    EmptyArgName,
    /// Argument name starts with the reserved `$` sigil.
    #[error("argument name cannot start with `$`: {0}")]
    ReservedArgName(String),
    /// More than one variadic-positional argument in one collection.
    #[error("duplicate variadic positional argument: {0}")]
    DuplicateVarPositional(String),
    /// More than one variadic-keyword argument in one collection.
    #[error("duplicate variadic keyword argument: {0}")]
    DuplicateVarKeyword(String),
    /// A keyword or optional argument alongside a variadic one.
    #[error("argument `{0}` cannot be combined with a variadic argument")]
    AfterVariadic(String),
    /// An option or subcommand name is empty.
    #[error("node name cannot be empty")]
    EmptyNodeName,
    /// An option or subcommand alias contains whitespace or starts with `$`.
    #[error("invalid node name: {0}")]
    InvalidNodeName(String),
    /// Two subcommands in the same scope share a name.
    #[error("duplicate subcommand in scope: {0}")]
    DuplicateSubcommand(String),
}

/// Validates a command declaration.
///
/// Checks the command name, the main args, and every option and subcommand
/// recursively. Returns at the first problem found.
///
/// # Examples
///
/// ```
/// use command_grammar_core::*;
///
/// let cmd = Command::new("cp")
///     .with_arg(Arg::new("src", MultiVar::plus(builtin::STRING.clone())))
///     .with_arg(Arg::new("more", MultiVar::star(builtin::STRING.clone())));
/// let errors = validate_command(&cmd);
/// assert!(matches!(errors[0], ValidationError::DuplicateVarPositional(_)));
/// ```
pub fn validate_command(command: &Command) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if command.name_text().trim().is_empty() {
        errors.push(ValidationError::EmptyCommandName);
        return errors;
    }

    errors.extend(validate_args(&command.args));
    if !errors.is_empty() {
        return errors;
    }

    errors.extend(validate_nodes(&command.children));
    errors
}

fn validate_nodes(nodes: &[Node]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen_subcommands: HashSet<&str> = HashSet::new();

    for node in nodes {
        let spec = node.spec();
        if spec.name.trim().is_empty() || node.aliases().is_empty() {
            errors.push(ValidationError::EmptyNodeName);
            return errors;
        }
        if let Some(bad) = node
            .aliases()
            .iter()
            .find(|a| a.starts_with('$') || a.chars().any(char::is_whitespace))
        {
            errors.push(ValidationError::InvalidNodeName(bad.clone()));
            return errors;
        }

        errors.extend(validate_args(&spec.args));
        if !errors.is_empty() {
            return errors;
        }

        if let Node::Subcommand(sub) = node {
            for alias in &sub.aliases {
                if !seen_subcommands.insert(alias.as_str()) {
                    errors.push(ValidationError::DuplicateSubcommand(alias.clone()));
                    return errors;
                }
            }
            errors.extend(validate_nodes(&sub.children));
            if !errors.is_empty() {
                return errors;
            }
        }
    }

    errors
}

fn validate_args(args: &Args) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut var_positional: Option<&str> = None;
    let mut var_keyword: Option<&str> = None;

    for arg in args {
        if arg.name.trim().is_empty() {
            errors.push(ValidationError::EmptyArgName);
            return errors;
        }
        if arg.name.starts_with('$') {
            errors.push(ValidationError::ReservedArgName(arg.name.clone()));
            return errors;
        }

        match &arg.value {
            ArgValue::Multi(multi) => match multi.base {
                MultiBase::Keyword(_) => {
                    if var_keyword.is_some() {
                        errors.push(ValidationError::DuplicateVarKeyword(arg.name.clone()));
                        return errors;
                    }
                    var_keyword = Some(&arg.name);
                }
                MultiBase::Pattern(_) => {
                    if var_positional.is_some() {
                        errors.push(ValidationError::DuplicateVarPositional(arg.name.clone()));
                        return errors;
                    }
                    var_positional = Some(&arg.name);
                }
            },
            ArgValue::Keyword(_) if !arg.is_synthetic() => {
                if var_positional.is_some() || var_keyword.is_some() {
                    errors.push(ValidationError::AfterVariadic(arg.name.clone()));
                    return errors;
                }
            }
            _ => {}
        }

        if arg.flags.optional && (var_positional.is_some() || var_keyword.is_some()) {
            errors.push(ValidationError::AfterVariadic(arg.name.clone()));
            return errors;
        }
    }

    errors
}
