//! Command header recognition.
//!
//! A header is the command's name plus any declared prefixes. It compiles to
//! one of four strategies:
//!
//! - plain text: a single anchored regex over `prefix + name`;
//! - typed: the name unit itself is matched by a pattern;
//! - pairs: `(unit, text)` headers where a prefix unit is followed by
//!   `text + name`;
//! - double: unit or pattern prefixes combined with a name matcher, accepting
//!   the prefix as its own unit or glued to the name.
//!
//! Names may embed `{group}` and `{group:type}` captures, exposed as
//! [`HeadResult::groups`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use command_grammar_core::{
    ArgValue, Command, CommandName, HeadResult, Header, ParseError, Pattern, PatternRegistry,
    Value, compile_anchored,
};
use regex::Regex;
use tracing::debug;

use crate::handlers::Signal;
use crate::text::best_match;

static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w*)(?::([^{}]+))?\}").expect("static regex must compile"));

/// Converters for typed name captures.
type GroupConverters = Vec<(String, Pattern)>;

#[derive(Debug, Clone)]
enum NameMatcher {
    Text { regex: Regex, converters: GroupConverters },
    Typed(Pattern),
}

#[derive(Debug, Clone)]
enum Prefix {
    Unit(Value),
    Typed(Pattern),
}

impl Prefix {
    fn accepts(&self, unit: &Value) -> bool {
        match self {
            Prefix::Unit(v) => v == unit,
            Prefix::Typed(p) => p.exec(unit).is_success(),
        }
    }
}

#[derive(Debug, Clone)]
enum Strategy {
    Plain {
        regex: Regex,
        converters: GroupConverters,
    },
    Typed(Pattern),
    Pairs {
        pairs: Vec<(Value, Regex)>,
        converters: GroupConverters,
    },
    Double(DoubleHeader),
}

/// Prefix units followed by a name, either as separate units or glued.
#[derive(Debug, Clone)]
struct DoubleHeader {
    prefixes: Vec<Prefix>,
    text_prefixes: Vec<String>,
    /// Text prefixes and name as one anchored regex.
    combined: Option<Regex>,
    name: NameMatcher,
}

/// Compiled header matcher for one command.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    strategy: Strategy,
    name_text: String,
    candidates: Vec<String>,
    fuzzy: bool,
    threshold: f64,
}

/// Converts `name` into a regex source, collecting typed captures.
fn name_expression(
    name: &str,
    registry: &PatternRegistry,
) -> command_grammar_core::Result<(String, GroupConverters)> {
    let mut expression = String::new();
    let mut converters = Vec::new();
    let mut last = 0;
    for caps in BRACKET_RE.captures_iter(name) {
        let Some(whole) = caps.get(0) else { continue };
        expression.push_str(&regex::escape(&name[last..whole.start()]));
        last = whole.end();

        let group = &caps[1];
        let mut inner = String::from(".+?");
        if let Some(spec) = caps.get(2) {
            if let ArgValue::Pattern(pattern) = registry.resolve(spec.as_str())? {
                if !pattern.expression().is_empty() {
                    inner = pattern.expression().to_string();
                }
                if !group.is_empty() {
                    converters.push((group.to_string(), pattern));
                }
            }
        }
        if group.is_empty() {
            expression.push_str(&format!("(?:{inner})"));
        } else {
            expression.push_str(&format!("(?P<{group}>{inner})"));
        }
    }
    expression.push_str(&regex::escape(&name[last..]));
    Ok((expression, converters))
}

fn alternation(texts: &[String]) -> String {
    let escaped: Vec<String> = texts.iter().map(|t| regex::escape(t)).collect();
    format!("(?:{})", escaped.join("|"))
}

fn captures(regex: &Regex, converters: &[(String, Pattern)], text: &str) -> Option<BTreeMap<String, Value>> {
    let caps = regex.captures(text)?;
    let mut groups = BTreeMap::new();
    for name in regex.capture_names().flatten() {
        let Some(m) = caps.name(name) else { continue };
        let raw = Value::Str(m.as_str().to_string());
        let value = converters
            .iter()
            .find(|(group, _)| group == name)
            .and_then(|(_, pattern)| pattern.exec(&raw).into_value())
            .unwrap_or(raw);
        groups.insert(name.to_string(), value);
    }
    Some(groups)
}

impl NameMatcher {
    fn converters(&self) -> &[(String, Pattern)] {
        match self {
            NameMatcher::Text { converters, .. } => converters,
            NameMatcher::Typed(_) => &[],
        }
    }

    fn matches(&self, unit: &Value) -> Option<(Value, BTreeMap<String, Value>)> {
        match self {
            NameMatcher::Text { regex, converters } => {
                let text = unit.as_str()?;
                let groups = captures(regex, converters, text)?;
                Some((unit.clone(), groups))
            }
            NameMatcher::Typed(pattern) => pattern
                .exec(unit)
                .into_value()
                .map(|v| (v, BTreeMap::new())),
        }
    }
}

impl DoubleHeader {
    fn matches(
        &self,
        cursor: &mut crate::TokenCursor,
        separators: &[char],
        first: &Value,
    ) -> Option<(Vec<Value>, Value, BTreeMap<String, Value>)> {
        let standalone = self.prefixes.iter().any(|p| p.accepts(first))
            || first
                .as_str()
                .is_some_and(|t| self.text_prefixes.iter().any(|p| p == t));
        if standalone {
            let second = cursor.popitem(separators, true);
            return self
                .name
                .matches(&second)
                .map(|(value, groups)| (vec![first.clone(), second], value, groups));
        }

        let text = first.as_str()?;
        if let Some(regex) = &self.combined {
            if let Some(groups) = captures(regex, self.name.converters(), text) {
                return Some((vec![first.clone()], first.clone(), groups));
            }
        }
        // Prefix glued to a typed name.
        for prefix in &self.text_prefixes {
            if let Some(rest) = text.strip_prefix(prefix.as_str()) {
                let unit = Value::Str(rest.to_string());
                if let Some((value, groups)) = self.name.matches(&unit) {
                    return Some((vec![first.clone()], value, groups));
                }
            }
        }
        None
    }
}

impl HeaderMatcher {
    /// Compiles the header of `command`.
    ///
    /// `default_headers` are the namespace's text prefixes, used when the
    /// command declares none.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`](command_grammar_core::PatternError) if a
    /// typed capture does not resolve or the combined expression is invalid.
    pub fn compile(
        command: &Command,
        default_headers: &[String],
        registry: &PatternRegistry,
        fuzzy: bool,
        threshold: f64,
    ) -> command_grammar_core::Result<Self> {
        let headers: Vec<Header> = if command.headers.is_empty() {
            default_headers.iter().cloned().map(Header::Text).collect()
        } else {
            command.headers.clone()
        };
        let name_text = command.name_text();

        let text_prefixes: Vec<String> = headers
            .iter()
            .filter_map(|h| match h {
                Header::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        let all_text = text_prefixes.len() == headers.len();
        let all_pairs = !headers.is_empty() && headers.iter().all(|h| matches!(h, Header::Pair(..)));

        let mut candidates: Vec<String> = text_prefixes
            .iter()
            .map(|p| format!("{p}{name_text}"))
            .collect();
        if candidates.is_empty() {
            candidates.push(name_text.clone());
        }

        let strategy = match &command.name {
            CommandName::Typed(pattern) if headers.is_empty() => Strategy::Typed(pattern.clone()),
            CommandName::Typed(pattern) => Strategy::Double(DoubleHeader {
                prefixes: unit_prefixes(&headers),
                text_prefixes,
                combined: None,
                name: NameMatcher::Typed(pattern.clone()),
            }),
            CommandName::Text(name) => {
                let (expression, converters) = name_expression(name, registry)?;
                if all_text {
                    let source = if text_prefixes.is_empty() {
                        expression
                    } else {
                        format!("{}{expression}", alternation(&text_prefixes))
                    };
                    Strategy::Plain {
                        regex: compile_anchored(&source)?,
                        converters,
                    }
                } else if all_pairs {
                    let mut pairs = Vec::new();
                    for header in &headers {
                        if let Header::Pair(unit, text) = header {
                            let source = format!("{}{expression}", regex::escape(text));
                            pairs.push((unit.clone(), compile_anchored(&source)?));
                        }
                    }
                    Strategy::Pairs { pairs, converters }
                } else {
                    let combined = if text_prefixes.is_empty() {
                        None
                    } else {
                        Some(compile_anchored(&format!(
                            "{}{expression}",
                            alternation(&text_prefixes)
                        ))?)
                    };
                    Strategy::Double(DoubleHeader {
                        prefixes: unit_prefixes(&headers),
                        text_prefixes,
                        combined,
                        name: NameMatcher::Text {
                            regex: compile_anchored(&expression)?,
                            converters,
                        },
                    })
                }
            }
        };

        Ok(Self {
            strategy,
            name_text,
            candidates,
            fuzzy,
            threshold,
        })
    }

    /// Consumes and matches the header units.
    pub(crate) fn match_head(
        &self,
        cursor: &mut crate::TokenCursor,
        separators: &[char],
    ) -> Result<HeadResult, Signal> {
        let first = cursor.popitem(separators, true);
        let matched = match &self.strategy {
            Strategy::Plain { regex, converters } => first
                .as_str()
                .and_then(|text| captures(regex, converters, text))
                .map(|groups| (vec![first.clone()], first.clone(), groups)),
            Strategy::Typed(pattern) => pattern
                .exec(&first)
                .into_value()
                .map(|v| (vec![first.clone()], v, BTreeMap::new())),
            Strategy::Pairs { pairs, converters } => {
                let mut found = None;
                for (unit, regex) in pairs {
                    if *unit != first {
                        continue;
                    }
                    let second = cursor.popitem(separators, true);
                    if let Some(groups) = second.as_str().and_then(|t| captures(regex, converters, t)) {
                        found = Some((vec![first.clone(), second.clone()], second, groups));
                    }
                    break;
                }
                found
            }
            Strategy::Double(double) => double.matches(cursor, separators, &first),
        };

        match matched {
            Some((origin, result, groups)) => {
                debug!(command = %self.name_text, header = ?origin, "Header matched");
                Ok(HeadResult {
                    origin,
                    result,
                    matched: true,
                    groups,
                })
            }
            None => Err(self.fail(&first)),
        }
    }

    fn fail(&self, observed: &Value) -> Signal {
        let text = observed.to_string();
        if self.fuzzy && observed.is_text() && text != self.name_text {
            let candidates = self.candidates.iter().map(String::as_str);
            if let Some(candidate) = best_match(&text, candidates, self.threshold) {
                debug!(observed = %text, candidate, "Header fuzzy matched");
                return Signal::Suggest(format!("{text} is not matched. Do you mean \"{candidate}\"?"));
            }
        }
        Signal::Unmatched(ParseError::HeaderUnmatched(text))
    }
}

fn unit_prefixes(headers: &[Header]) -> Vec<Prefix> {
    headers
        .iter()
        .filter_map(|h| match h {
            Header::Value(v) | Header::Pair(v, _) => Some(Prefix::Unit(v.clone())),
            Header::Pattern(p) => Some(Prefix::Typed(p.clone())),
            Header::Text(_) => None,
        })
        .collect()
}
