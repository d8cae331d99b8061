//! The token cursor: a backtrackable view over the input units.
//!
//! Text units are split lazily, one separator at a time. A partially
//! consumed unit keeps its remainder in place and remembers the raw text it
//! gave up, quotes and escapes included, so [`TokenCursor::pushback`] can
//! restore it exactly. Snapshots share the unit buffer through an [`Arc`] and
//! copy it only on write.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use command_grammar_core::{ParseError, Value};
use sha2::{Digest, Sha256};

use crate::text::{escape, split, split_once};

/// Rewrites an input unit before it is stored. Returning `None` drops it.
pub type Preprocessor = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Input filtering settings applied by [`TokenCursor::build`].
#[derive(Clone, Default)]
pub struct CursorConfig {
    /// Kinds dropped from the input (`"text"` for text, element kinds otherwise).
    pub filter_out: Vec<String>,
    /// Keep carriage returns and newlines inside text units.
    pub keep_crlf: bool,
    /// Per-kind rewrites.
    pub preprocessors: HashMap<String, Preprocessor>,
}

impl fmt::Debug for CursorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.preprocessors.keys().collect();
        kinds.sort();
        f.debug_struct("CursorConfig")
            .field("filter_out", &self.filter_out)
            .field("keep_crlf", &self.keep_crlf)
            .field("preprocessors", &kinds)
            .finish()
    }
}

impl CursorConfig {
    pub fn with_preprocessor<F>(mut self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.preprocessors.insert(kind.into(), Arc::new(f));
        self
    }
}

/// The kind name used by filters and preprocessors.
fn kind_of(unit: &Value) -> String {
    match unit {
        Value::Str(_) => "text".to_string(),
        Value::Element(e) => e.kind.clone(),
        other => other.type_tag().name().to_string(),
    }
}

/// A split taken off the front of a text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    at: usize,
    /// The consumed prefix as it appeared in the unit.
    raw: String,
    sep: char,
}

/// Opaque cursor state for backtracking.
#[derive(Debug, Clone)]
pub struct Snapshot {
    data: Arc<Vec<Value>>,
    index: usize,
    pending: Vec<Pending>,
}

/// A backtrackable cursor over filtered input units.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::{CursorConfig, TokenCursor};
/// use command_grammar_core::Value;
///
/// let mut cursor = TokenCursor::build(vec![Value::from("cmd 1 2")], &CursorConfig::default()).unwrap();
/// assert_eq!(cursor.popitem(&[' '], true), Value::from("cmd"));
/// let snap = cursor.snapshot();
/// assert_eq!(cursor.popitem(&[' '], true), Value::from("1"));
/// cursor.restore(snap);
/// assert_eq!(cursor.release(&[' '], false), [Value::from("1"), Value::from("2")]);
/// ```
#[derive(Debug, Clone)]
pub struct TokenCursor {
    data: Arc<Vec<Value>>,
    backup: Arc<Vec<Value>>,
    index: usize,
    pending: Vec<Pending>,
    token: u64,
    split_crlf: bool,
}

impl TokenCursor {
    /// Filters and normalizes `input` and computes its content hash.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyInput`] if no unit survives filtering.
    pub fn build(input: Vec<Value>, config: &CursorConfig) -> Result<Self, ParseError> {
        let mut data = Vec::with_capacity(input.len());
        for unit in input {
            let kind = kind_of(&unit);
            if config.filter_out.contains(&kind) {
                continue;
            }
            let unit = match config.preprocessors.get(&kind) {
                Some(process) => match process(&unit) {
                    Some(v) => v,
                    None => continue,
                },
                None => unit,
            };
            let unit = match unit {
                Value::Element(e) if e.kind == "text" => match e.data.as_str() {
                    Some(text) => Value::Str(text.to_string()),
                    None => Value::Element(e),
                },
                other => other,
            };
            match unit {
                Value::Str(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        data.push(Value::Str(text.to_string()));
                    }
                }
                other => data.push(other),
            }
        }
        if data.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let token = content_hash(&data);
        let data = Arc::new(data);
        Ok(Self {
            backup: Arc::clone(&data),
            data,
            index: 0,
            pending: Vec::new(),
            token,
            split_crlf: !config.keep_crlf,
        })
    }

    /// Takes the next piece split on `separators`.
    ///
    /// Returns the empty text sentinel when exhausted. With `advance` false
    /// the cursor is left untouched (a peek).
    pub fn popitem(&mut self, separators: &[char], advance: bool) -> Value {
        let Some(current) = self.data.get(self.index) else {
            return Value::Str(String::new());
        };
        let Value::Str(text) = current else {
            let unit = current.clone();
            if advance {
                self.index += 1;
            }
            return unit;
        };

        let (head, rest, sep) = split_once(text, separators, self.split_crlf);
        if advance {
            if rest.is_empty() {
                self.index += 1;
            } else {
                let raw = text[..text.len() - rest.len()].to_string();
                let at = self.index;
                Arc::make_mut(&mut self.data)[at] = Value::Str(rest);
                self.pending.push(Pending {
                    at,
                    raw,
                    sep: sep.unwrap_or(' '),
                });
            }
        }
        Value::Str(head)
    }

    /// Returns a popped unit to the cursor.
    ///
    /// A pending split of the current unit is undone by restoring the raw
    /// text it consumed; otherwise the cursor steps back one unit. With
    /// `replace`, `unit` takes the place of what was popped, escaped so it
    /// reads back as one piece.
    pub fn pushback(&mut self, unit: Value, replace: bool) {
        if unit.is_empty_text() {
            return;
        }
        if let Some(pending) = self.pending.last() {
            let joined = match (self.data.get(pending.at), &unit) {
                (Some(Value::Str(rest)), Value::Str(head)) if pending.at == self.index => {
                    if replace {
                        Some(format!("{}{}{rest}", escape(head, &[pending.sep]), pending.sep))
                    } else {
                        Some(format!("{}{rest}", pending.raw))
                    }
                }
                _ => None,
            };
            if let Some(joined) = joined {
                let at = pending.at;
                Arc::make_mut(&mut self.data)[at] = Value::Str(joined);
                self.pending.pop();
                return;
            }
        }
        if self.index == 0 {
            return;
        }
        self.index -= 1;
        if replace {
            let unit = match unit {
                Value::Str(text) => Value::Str(escape(&text, &[])),
                other => other,
            };
            Arc::make_mut(&mut self.data)[self.index] = unit;
        }
    }

    /// Every remaining unit (or every original unit) fully split.
    pub fn release(&self, separators: &[char], from_backup: bool) -> Vec<Value> {
        let source: &[Value] = if from_backup {
            &self.backup
        } else {
            self.data.get(self.index..).unwrap_or_default()
        };
        let mut out = Vec::new();
        for unit in source {
            match unit {
                Value::Str(text) => out.extend(
                    split(text, separators, self.split_crlf)
                        .into_iter()
                        .map(Value::Str),
                ),
                other => out.push(other.clone()),
            }
        }
        out
    }

    /// Marks every unit consumed.
    pub fn consume_all(&mut self) {
        self.index = self.data.len();
        self.pending.clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: Arc::clone(&self.data),
            index: self.index,
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.data = snapshot.data;
        self.index = snapshot.index;
        self.pending = snapshot.pending;
    }

    pub fn done(&self) -> bool {
        self.index >= self.data.len()
    }

    /// Number of units in the buffer.
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The filtered input as built.
    pub fn origin(&self) -> &[Value] {
        &self.backup
    }

    /// Content hash of the filtered input.
    pub fn token(&self) -> u64 {
        self.token
    }
}

fn content_hash(data: &[Value]) -> u64 {
    let bytes = serde_json::to_vec(data).expect("values have string map keys and always serialize");
    let digest = Sha256::digest(&bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}
