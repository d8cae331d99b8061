//! Shortcut entries and template expansion.
//!
//! A shortcut maps a key (literal or regex) to either a stored result that is
//! replayed, or a template of input units expanded with the caller's extra
//! units:
//!
//! - a unit that is exactly `{%N}` becomes the N-th extra unit unchanged;
//! - `{%N}` inside text is replaced by the N-th extra unit's text;
//! - extra units not referenced by any `{%N}` are appended after the
//!   template's `args`, followed by `named` args as `key=value`;
//! - for regex keys, `{0}`, `{1}`... and `{name}` are replaced by the
//!   corresponding capture groups.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use command_grammar_core::{ParseResult, Value, compile_anchored};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

static EXTRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%(\d+)\}").expect("static regex must compile"));

static WHOLE_EXTRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%(\d+)\}$").expect("static regex must compile"));

/// Input units to substitute into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutTemplate {
    /// Leading units, normally starting with the command name.
    pub command: Vec<Value>,
    /// Units appended after `command`.
    pub args: Vec<Value>,
    /// Appended as `key=value` units.
    pub named: BTreeMap<String, Value>,
}

impl ShortcutTemplate {
    pub fn new(command: Vec<Value>) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutTarget {
    /// A previously matched result.
    Replay(ParseResult),
    Template(ShortcutTemplate),
}

/// A stored shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutEntry {
    pub key: String,
    /// Treat `key` as an anchored regex.
    pub regex: bool,
    pub target: ShortcutTarget,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl ShortcutEntry {
    /// Creates an entry, compiling `key` if `regex` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Pattern`](crate::ManagerError::Pattern) for an
    /// invalid regex key.
    pub fn new(key: impl Into<String>, target: ShortcutTarget, regex: bool) -> Result<Self> {
        let mut entry = Self {
            key: key.into(),
            regex,
            target,
            compiled: None,
        };
        entry.compile()?;
        Ok(entry)
    }

    /// Compiles the regex key after deserialization.
    pub(crate) fn compile(&mut self) -> Result<()> {
        if self.regex && self.compiled.is_none() {
            self.compiled = Some(compile_anchored(&self.key)?);
        }
        Ok(())
    }

    /// Capture groups if `text` matches this key, `None` otherwise.
    ///
    /// Positional groups come first as `"0"`, `"1"`..., then named groups.
    pub fn captures(&self, text: &str) -> Option<Vec<(String, String)>> {
        if !self.regex {
            return (self.key == text).then(Vec::new);
        }
        let regex = self.compiled.as_ref()?;
        let caps = regex.captures(text)?;
        let mut out: Vec<(String, String)> = caps
            .iter()
            .skip(1)
            .enumerate()
            .filter_map(|(i, m)| m.map(|m| (i.to_string(), m.as_str().to_string())))
            .collect();
        for name in regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                out.push((name.to_string(), m.as_str().to_string()));
            }
        }
        Some(out)
    }
}

impl PartialEq for ShortcutEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.regex == other.regex && self.target == other.target
    }
}

/// Expands `template` with `extra` units and regex `captures`.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::{ShortcutTemplate, expand};
/// use command_grammar_core::Value;
///
/// let template = ShortcutTemplate::new(vec![Value::from("cmd {%0} --bar")]);
/// let units = expand(&template, &[Value::from("42"), Value::from("x")], &[]);
/// assert_eq!(units, [Value::from("cmd 42 --bar"), Value::from("x")]);
/// ```
pub fn expand(template: &ShortcutTemplate, extra: &[Value], captures: &[(String, String)]) -> Vec<Value> {
    let mut used = BTreeSet::new();
    let mut out = Vec::with_capacity(template.command.len() + extra.len());

    for unit in &template.command {
        let Some(text) = unit.as_str() else {
            out.push(unit.clone());
            continue;
        };
        if let Some(caps) = WHOLE_EXTRA_RE.captures(text) {
            let index: usize = caps[1].parse().unwrap_or(usize::MAX);
            if let Some(value) = extra.get(index) {
                used.insert(index);
                out.push(value.clone());
                continue;
            }
        }
        let replaced = EXTRA_RE.replace_all(text, |caps: &regex::Captures<'_>| {
            let index: usize = caps[1].parse().unwrap_or(usize::MAX);
            match extra.get(index) {
                Some(value) => {
                    used.insert(index);
                    value.to_string()
                }
                None => caps[0].to_string(),
            }
        });
        out.push(Value::Str(replaced.into_owned()));
    }

    out.extend(template.args.iter().cloned());
    out.extend(
        extra
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, v)| v.clone()),
    );
    out.extend(template.named.iter().map(|(k, v)| Value::Str(format!("{k}={v}"))));

    if captures.is_empty() {
        return out;
    }
    out.into_iter()
        .map(|unit| match unit {
            Value::Str(text) => Value::Str(fill_captures(text, captures)),
            other => other,
        })
        .collect()
}

fn fill_captures(mut text: String, captures: &[(String, String)]) -> String {
    for (name, value) in captures {
        let slot = format!("{{{name}}}");
        if text.contains(&slot) {
            text = text.replace(&slot, value);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_extra_keeps_element() {
        let element = Value::from(command_grammar_core::Element::new("image", serde_json::json!({"id": 1})));
        let template = ShortcutTemplate::new(vec![Value::from("show"), Value::from("{%0}")]);
        let units = expand(&template, &[element.clone()], &[]);
        assert_eq!(units, [Value::from("show"), element]);
    }

    #[test]
    fn test_unused_extras_and_named_are_appended() {
        let template = ShortcutTemplate::new(vec![Value::from("cmd")])
            .with_args(vec![Value::from("--bar")])
            .with_named("level", Value::Int(2));
        let units = expand(&template, &[Value::from("x")], &[]);
        assert_eq!(
            units,
            [Value::from("cmd"), Value::from("--bar"), Value::from("x"), Value::from("level=2")]
        );
    }

    #[test]
    fn test_missing_extra_left_verbatim() {
        let template = ShortcutTemplate::new(vec![Value::from("cmd {%3}")]);
        assert_eq!(expand(&template, &[], &[]), [Value::from("cmd {%3}")]);
    }

    #[test]
    fn test_regex_key_captures() {
        let entry = ShortcutEntry::new(
            r"echo(?P<n>\d+)",
            ShortcutTarget::Template(ShortcutTemplate::new(vec![Value::from("cmd {0} {n}")])),
            true,
        )
        .unwrap();
        let caps = entry.captures("echo12").unwrap();
        assert_eq!(caps, [("0".to_string(), "12".to_string()), ("n".to_string(), "12".to_string())]);
        assert!(entry.captures("echo").is_none());
        assert!(entry.captures("xecho12").is_none());

        let ShortcutTarget::Template(template) = &entry.target else {
            panic!("expected template");
        };
        assert_eq!(expand(template, &[], &caps), [Value::from("cmd 12 12")]);
    }

    #[test]
    fn test_literal_key() {
        let entry = ShortcutEntry::new("go", ShortcutTarget::Template(ShortcutTemplate::default()), false).unwrap();
        assert_eq!(entry.captures("go"), Some(Vec::new()));
        assert_eq!(entry.captures("gone"), None);
    }

    #[test]
    fn test_invalid_regex_key() {
        let result = ShortcutEntry::new("(", ShortcutTarget::Template(ShortcutTemplate::default()), true);
        assert!(result.is_err());
    }
}
