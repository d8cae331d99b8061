//! Parse results and their dotted-path query interface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::args::Args;
use crate::value::Value;

/// Argument name → coerced value.
pub type ArgsMap = BTreeMap<String, Value>;

/// Why a parse attempt failed or was diverted.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// A unit did not match the parameter expected at its position.
    #[error("parameter `{0}` does not match")]
    ParamsUnmatched(String),

    /// A required argument had no unit left to consume.
    #[error("missing argument `{0}`")]
    ArgumentMissing(String),

    /// The leading units did not match the command header.
    #[error("header `{0}` does not match")]
    HeaderUnmatched(String),

    /// Nothing survived input filtering.
    #[error("input is empty")]
    EmptyInput,

    /// A close-but-inexact match; carries the suggestion message.
    #[error("{0}")]
    FuzzyMatched(String),

    /// A built-in option (help, shortcut) was dispatched.
    #[error("special option `{0}` triggered")]
    SpecialOption(String),

    /// Completion was requested; carries the candidates.
    #[error("completion triggered: {}", .0.join(", "))]
    Completion(Vec<String>),

    /// A post-match behavior stepped out of bounds.
    #[error("behavior out of bounds: {0}")]
    BehaviorOutOfBounds(String),
}

/// Path lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A bare `options`/`subcommands` segment that could mean the collection
    /// or a member named the same.
    #[error("ambiguous path segment `{0}`")]
    Ambiguous(String),
}

/// Outcome of matching the command header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadResult {
    /// The raw header units.
    pub origin: Vec<Value>,
    /// The coerced header value.
    pub result: Value,
    pub matched: bool,
    /// Named captures from `{name}` brackets in the command name.
    pub groups: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionResult {
    pub value: Value,
    pub args: ArgsMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcommandResult {
    pub value: Value,
    pub args: ArgsMap,
    pub options: BTreeMap<String, OptionResult>,
    pub subcommands: BTreeMap<String, SubcommandResult>,
}

/// Matched arguments split by role, as handed to transform actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    /// Ordinary members.
    pub values: ArgsMap,
    /// Items of the variadic-positional member.
    pub varargs: Vec<Value>,
    /// Entries of the variadic-keyword member.
    pub kwargs: BTreeMap<String, Value>,
    /// Keyword-only members.
    pub kwonly: ArgsMap,
}

impl ParsedArgs {
    /// Lifts the variadic and keyword-only members of `map` out of the
    /// ordinary values, according to `args`.
    pub fn split(args: &Args, map: &ArgsMap) -> Self {
        let mut parsed = ParsedArgs::default();
        for (name, value) in map {
            if args.var_positional() == Some(name.as_str()) {
                parsed.varargs = value.as_list().map(<[Value]>::to_vec).unwrap_or_default();
            } else if args.var_keyword() == Some(name.as_str()) {
                parsed.kwargs = value.as_map().cloned().unwrap_or_default();
            } else if args.keyword_only().iter().any(|k| k == name) {
                parsed.kwonly.insert(name.clone(), value.clone());
            } else {
                parsed.values.insert(name.clone(), value.clone());
            }
        }
        parsed
    }

    /// Flattens back into a single map.
    pub fn merged(&self) -> ArgsMap {
        let mut out = self.values.clone();
        out.extend(self.kwonly.clone());
        out.extend(self.kwargs.clone());
        out
    }
}

/// A borrowed view returned by [`ParseResult::query`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Queried<'a> {
    Value(&'a Value),
    Args(&'a ArgsMap),
    Option(&'a OptionResult),
    Subcommand(&'a SubcommandResult),
}

impl<'a> Queried<'a> {
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Queried::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// The structured outcome of one parse attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    /// Path of the command that produced this result.
    pub source: String,
    /// The filtered input units.
    pub origin: Vec<Value>,
    pub matched: bool,
    pub header: HeadResult,
    pub main_args: ArgsMap,
    /// Args of every matched option and subcommand, flattened.
    pub other_args: ArgsMap,
    pub options: BTreeMap<String, OptionResult>,
    pub subcommands: BTreeMap<String, SubcommandResult>,
    pub error_info: Option<ParseError>,
    /// Unconsumed units at the point of failure.
    pub error_data: Vec<Value>,
    /// Content hash of `origin`.
    pub token: u64,
}

fn flatten_options(options: &BTreeMap<String, OptionResult>, into: &mut ArgsMap) {
    for opt in options.values() {
        into.extend(opt.args.clone());
    }
}

fn flatten_subcommands(subs: &BTreeMap<String, SubcommandResult>, into: &mut ArgsMap) {
    for sub in subs.values() {
        into.extend(sub.args.clone());
        flatten_options(&sub.options, into);
        flatten_subcommands(&sub.subcommands, into);
    }
}

fn query_option<'a>(opt: &'a OptionResult, rest: &[&str]) -> Option<Queried<'a>> {
    match rest {
        [] => Some(Queried::Option(opt)),
        ["value"] => Some(Queried::Value(&opt.value)),
        ["args"] => Some(Queried::Args(&opt.args)),
        ["args", name] | [name] => opt.args.get(*name).map(Queried::Value),
        _ => None,
    }
}

fn query_subcommand<'a>(
    sub: &'a SubcommandResult,
    prefix: &str,
    rest: &[&str],
) -> Result<Option<Queried<'a>>, QueryError> {
    match rest {
        [] => Ok(Some(Queried::Subcommand(sub))),
        ["value"] => Ok(Some(Queried::Value(&sub.value))),
        ["args"] => Ok(Some(Queried::Args(&sub.args))),
        ["args", name] => Ok(sub.args.get(*name).map(Queried::Value)),
        ["options"] | ["subcommands"] => Err(QueryError::Ambiguous(format!("{prefix}.{}", rest[0]))),
        ["options", name, tail @ ..] => {
            if sub.options.contains_key("options") {
                return Err(QueryError::Ambiguous(format!("{prefix}.options")));
            }
            Ok(sub.options.get(*name).and_then(|o| query_option(o, tail)))
        }
        ["subcommands", name, tail @ ..] => {
            if sub.subcommands.contains_key("subcommands") {
                return Err(QueryError::Ambiguous(format!("{prefix}.subcommands")));
            }
            match sub.subcommands.get(*name) {
                Some(s) => query_subcommand(s, name, tail),
                None => Ok(None),
            }
        }
        [name, tail @ ..] if sub.options.contains_key(*name) => {
            Ok(sub.options.get(*name).and_then(|o| query_option(o, tail)))
        }
        [name, tail @ ..] if sub.subcommands.contains_key(*name) => match sub.subcommands.get(*name) {
            Some(s) => query_subcommand(s, name, tail),
            None => Ok(None),
        },
        [name] => Ok(sub.args.get(*name).map(Queried::Value)),
        _ => Ok(None),
    }
}

impl ParseResult {
    /// An empty, unmatched result for `source`.
    pub fn new(source: impl Into<String>, origin: Vec<Value>, token: u64) -> Self {
        Self {
            source: source.into(),
            origin,
            token,
            ..Self::default()
        }
    }

    /// Marks the result failed with `error`, keeping `residue` as error data.
    pub fn fail(mut self, error: ParseError, residue: Vec<Value>) -> Self {
        self.matched = false;
        self.error_info = Some(error);
        self.error_data = residue;
        self
    }

    /// Installs the matched components and rebuilds `other_args`.
    pub fn encapsulate(
        &mut self,
        main_args: ArgsMap,
        options: BTreeMap<String, OptionResult>,
        subcommands: BTreeMap<String, SubcommandResult>,
    ) {
        self.main_args = main_args;
        self.options = options;
        self.subcommands = subcommands;
        self.refresh_other_args();
    }

    /// Recomputes `other_args` from the options and subcommands.
    pub fn refresh_other_args(&mut self) {
        let mut other = ArgsMap::new();
        flatten_options(&self.options, &mut other);
        flatten_subcommands(&self.subcommands, &mut other);
        self.other_args = other;
    }

    /// Main and other args merged; main args win on conflicts.
    pub fn all_args(&self) -> ArgsMap {
        let mut all = self.other_args.clone();
        all.extend(self.main_args.clone());
        all
    }

    /// Names of the matched options and subcommands.
    pub fn component(&self) -> Vec<&str> {
        self.options
            .keys()
            .chain(self.subcommands.keys())
            .map(String::as_str)
            .collect()
    }

    /// Dotted-path lookup.
    ///
    /// Supported forms: `$main`, `$other`, `$main.<arg>`,
    /// `options.<name>[.value|.args[.<arg>]|.<arg>]`,
    /// `subcommands.<name>[...]` (recursively), `<option or subcommand
    /// name>[...]`, and a bare argument name.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_grammar_core::{OptionResult, ParseResult, QueryError, Value};
    ///
    /// let mut result = ParseResult::new("default.cmd", vec![], 0);
    /// let mut bar = OptionResult::default();
    /// bar.args.insert("n".into(), Value::Int(2));
    /// result.options.insert("bar".into(), bar);
    ///
    /// let n = result.query("options.bar.args.n").unwrap().unwrap();
    /// assert_eq!(n.as_value(), Some(&Value::Int(2)));
    /// assert!(result.find("bar.n"));
    /// assert!(!result.find("options.baz"));
    /// assert_eq!(result.query("options"), Err(QueryError::Ambiguous("options".into())));
    /// ```
    pub fn query(&self, path: &str) -> Result<Option<Queried<'_>>, QueryError> {
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["$main"] => Ok(Some(Queried::Args(&self.main_args))),
            ["$other"] => Ok(Some(Queried::Args(&self.other_args))),
            ["$main", name] => Ok(self.main_args.get(*name).map(Queried::Value)),
            ["$other", name] => Ok(self.other_args.get(*name).map(Queried::Value)),
            ["options"] | ["subcommands"] => Err(QueryError::Ambiguous(path.to_string())),
            ["options", name, tail @ ..] => {
                if self.options.contains_key("options") {
                    return Err(QueryError::Ambiguous("options".to_string()));
                }
                Ok(self.options.get(*name).and_then(|o| query_option(o, tail)))
            }
            ["subcommands", name, tail @ ..] => {
                if self.subcommands.contains_key("subcommands") {
                    return Err(QueryError::Ambiguous("subcommands".to_string()));
                }
                match self.subcommands.get(*name) {
                    Some(s) => query_subcommand(s, name, tail),
                    None => Ok(None),
                }
            }
            [name, tail @ ..] if self.options.contains_key(*name) => {
                Ok(self.options.get(*name).and_then(|o| query_option(o, tail)))
            }
            [name, tail @ ..] if self.subcommands.contains_key(*name) => {
                match self.subcommands.get(*name) {
                    Some(s) => query_subcommand(s, name, tail),
                    None => Ok(None),
                }
            }
            [name] => Ok(self
                .main_args
                .get(*name)
                .or_else(|| self.other_args.get(*name))
                .map(Queried::Value)),
            _ => Ok(None),
        }
    }

    /// True if `path` resolves to something. Ambiguous paths count as absent.
    pub fn find(&self, path: &str) -> bool {
        matches!(self.query(path), Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arg, KeywordVar, MultiVar, builtin};

    fn sample() -> ParseResult {
        let mut qux = OptionResult::default();
        qux.args.insert("level".into(), Value::Int(3));
        let mut sub = SubcommandResult::default();
        sub.args.insert("target".into(), Value::from("x"));
        sub.options.insert("qux".into(), qux);

        let mut result = ParseResult::new("default.cmd", vec![Value::from("cmd sub --qux")], 7);
        result.matched = true;
        let mut main = ArgsMap::new();
        main.insert("foo".into(), Value::Int(1));
        let mut subs = BTreeMap::new();
        subs.insert("sub".into(), sub);
        result.encapsulate(main, BTreeMap::new(), subs);
        result
    }

    #[test]
    fn test_other_args_flattened() {
        let result = sample();
        assert_eq!(result.other_args.get("level"), Some(&Value::Int(3)));
        assert_eq!(result.other_args.get("target"), Some(&Value::from("x")));
        assert_eq!(result.all_args().len(), 3);
        assert_eq!(result.component(), ["sub"]);
    }

    #[test]
    fn test_query_subcommand_paths() {
        let result = sample();
        assert!(matches!(
            result.query("subcommands.sub.options.qux"),
            Ok(Some(Queried::Option(_)))
        ));
        assert_eq!(
            result.query("sub.qux.level").unwrap().and_then(|q| q.as_value()),
            Some(&Value::Int(3))
        );
        assert_eq!(
            result.query("sub.args.target").unwrap().and_then(|q| q.as_value()),
            Some(&Value::from("x"))
        );
        assert_eq!(
            result.query("sub.target").unwrap().and_then(|q| q.as_value()),
            Some(&Value::from("x"))
        );
        assert!(matches!(result.query("sub.options"), Err(QueryError::Ambiguous(_))));
    }

    #[test]
    fn test_query_main_and_other() {
        let result = sample();
        assert!(matches!(result.query("$main"), Ok(Some(Queried::Args(m))) if m.len() == 1));
        assert_eq!(
            result.query("$other.level").unwrap().and_then(|q| q.as_value()),
            Some(&Value::Int(3))
        );
        assert_eq!(
            result.query("foo").unwrap().and_then(|q| q.as_value()),
            Some(&Value::Int(1))
        );
        assert_eq!(result.query("missing"), Ok(None));
    }

    #[test]
    fn test_fail_keeps_residue() {
        let failed = sample().fail(
            ParseError::ParamsUnmatched("zzz".into()),
            vec![Value::from("zzz")],
        );
        assert!(!failed.matched);
        assert_eq!(failed.error_data, [Value::from("zzz")]);
        assert_eq!(
            failed.error_info.unwrap().to_string(),
            "parameter `zzz` does not match"
        );
    }

    #[test]
    fn test_parsed_args_split() {
        let args = crate::Args::new()
            .with(Arg::new("a", builtin::INTEGER.clone()))
            .with(Arg::new("k", KeywordVar::new(builtin::INTEGER.clone())))
            .with(Arg::new("rest", MultiVar::star(builtin::STRING.clone())));
        let mut map = ArgsMap::new();
        map.insert("a".into(), Value::Int(1));
        map.insert("k".into(), Value::Int(2));
        map.insert("rest".into(), Value::List(vec![Value::from("x")]));
        let parsed = ParsedArgs::split(&args, &map);
        assert_eq!(parsed.values.len(), 1);
        assert_eq!(parsed.kwonly.get("k"), Some(&Value::Int(2)));
        assert_eq!(parsed.varargs, [Value::from("x")]);
    }

    #[test]
    fn test_result_serializes() {
        let result = sample();
        let json = serde_json::to_string(&result).unwrap();
        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
