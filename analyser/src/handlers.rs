//! Control signals and built-in option requests.
//!
//! The analyser never unwinds through panics or error types for control
//! flow: a scope returns a [`Signal`] and the caller decides whether it is a
//! failure, a suggestion or a dispatch.

use command_grammar_core::{ParseError, Value};

use crate::config::OptionNames;

/// Why a scope stopped early.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal {
    /// Hard mismatch; may be recovered by backtracking or defaults.
    Unmatched(ParseError),
    /// A close-but-inexact match with the suggestion text.
    Suggest(String),
    /// A built-in option was hit.
    Dispatch(Builtin),
}

impl From<ParseError> for Signal {
    fn from(error: ParseError) -> Self {
        Signal::Unmatched(error)
    }
}

/// A shortcut definition or deletion requested through the built-in option.
#[derive(Debug, Clone, PartialEq)]
pub enum ShortcutRequest {
    /// Store `template`; `None` replays the most recent matched result.
    Define {
        key: String,
        template: Option<Vec<Value>>,
    },
    Delete(String),
}

/// A built-in option handed to the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Builtin {
    Help,
    Shortcut(ShortcutRequest),
    /// Completion was requested; carries the candidates.
    Completion(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinKind {
    Help,
    Shortcut,
    Completion,
}

pub(crate) fn classify(names: &OptionNames, text: &str) -> Option<BuiltinKind> {
    if names.help.iter().any(|n| n == text) {
        Some(BuiltinKind::Help)
    } else if names.shortcut.iter().any(|n| n == text) {
        Some(BuiltinKind::Shortcut)
    } else if names.completion.iter().any(|n| n == text) {
        Some(BuiltinKind::Completion)
    } else {
        None
    }
}

/// Parses `[delete] <key> [<template>...]` following the shortcut option.
///
/// A template of exactly `$`, or no template, replays the latest result.
pub(crate) fn shortcut_request(pieces: Vec<Value>) -> Result<ShortcutRequest, ParseError> {
    let mut pieces = pieces.into_iter();
    let first = pieces
        .next()
        .ok_or_else(|| ParseError::ArgumentMissing("key".into()))?;
    if first.as_str() == Some("delete") {
        let key = pieces
            .next()
            .ok_or_else(|| ParseError::ArgumentMissing("key".into()))?;
        return Ok(ShortcutRequest::Delete(key.to_string()));
    }

    let template: Vec<Value> = pieces.collect();
    let template = match template.as_slice() {
        [] => None,
        [only] if only.as_str() == Some("$") => None,
        _ => Some(template),
    };
    Ok(ShortcutRequest::Define {
        key: first.to_string(),
        template,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let names = OptionNames::default();
        assert_eq!(classify(&names, "-h"), Some(BuiltinKind::Help));
        assert_eq!(classify(&names, "--shortcut"), Some(BuiltinKind::Shortcut));
        assert_eq!(classify(&names, "-c"), Some(BuiltinKind::Completion));
        assert_eq!(classify(&names, "--bar"), None);
    }

    #[test]
    fn test_shortcut_request_forms() {
        assert_eq!(
            shortcut_request(vec![Value::from("delete"), Value::from("go")]),
            Ok(ShortcutRequest::Delete("go".into()))
        );
        assert_eq!(
            shortcut_request(vec![Value::from("go"), Value::from("$")]),
            Ok(ShortcutRequest::Define {
                key: "go".into(),
                template: None
            })
        );
        assert_eq!(
            shortcut_request(vec![Value::from("go"), Value::from("cmd {%0}")]),
            Ok(ShortcutRequest::Define {
                key: "go".into(),
                template: Some(vec![Value::from("cmd {%0}")])
            })
        );
        assert!(shortcut_request(vec![]).is_err());
    }
}
