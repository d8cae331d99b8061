//! Built-in patterns and the pattern registry.
//!
//! The statics here are the stock vocabulary for argument declarations. The
//! [`PatternRegistry`] maps names to patterns and resolves textual type specs
//! such as `"int"`, `"re:(\d+)-(\d+)"`, `"!int"` or `"on|off|int"`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::args::ArgValue;
use crate::error::{PatternError, Result};
use crate::pattern::{Accept, Pattern};
use crate::value::{TypeTag, Value};

fn static_regex_pattern(
    origin: TypeTag,
    alias: &str,
    expression: &str,
    converter: fn(&Value) -> Option<Value>,
) -> Pattern {
    Pattern::regex_convert(origin, alias, expression, converter)
        .expect("static regex must compile")
}

fn static_match_pattern(alias: &str, expression: &str) -> Pattern {
    Pattern::regex_match(alias, expression).expect("static regex must compile")
}

/// Any value, unchanged.
pub static ANY: LazyLock<Pattern> = LazyLock::new(|| Pattern::keep(TypeTag::Any, "any"));

/// Any value, stringified.
pub static ANY_STRING: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::convert(TypeTag::Str, "any_str", |v| Some(Value::from(v.to_string())))
});

/// Text only.
pub static STRING: LazyLock<Pattern> = LazyLock::new(|| Pattern::keep(TypeTag::Str, "str"));

pub static INTEGER: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::Int, "int", r"-?[0-9]+", |v| {
        v.as_str().and_then(|s| s.parse::<i64>().ok()).map(Value::Int)
    })
});

/// Floating point; integers and numeric text are widened.
pub static NUMBER: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::convert(TypeTag::Float, "float", |v| match v {
        Value::Int(i) => Some(Value::Float(*i as f64)),
        Value::Str(s) => s
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Value::Float),
        _ => None,
    })
    .accepting(vec![
        Accept::Type(TypeTag::Str),
        Accept::Type(TypeTag::Int),
    ])
});

pub static BOOLEAN: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::Bool, "bool", r"(?i:true|false)", |v| {
        v.as_str().map(|s| Value::Bool(s.eq_ignore_ascii_case("true")))
    })
});

/// Hexadecimal integer with optional `0x` prefix.
pub static HEX: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::Int, "hex", r"-?(?:0x)?[0-9a-fA-F]+", |v| {
        let text = v.as_str()?;
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let n = i64::from_str_radix(digits, 16).ok()?;
        Some(Value::Int(if negative { -n } else { n }))
    })
});

/// `#rrggbb` color; yields the six hex digits without `#`.
pub static HEX_COLOR: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::Str, "color", r"#([0-9a-fA-F]{6})", |v| {
        v.as_list()?.first().cloned()
    })
});

pub static EMAIL: LazyLock<Pattern> = LazyLock::new(|| {
    static_match_pattern("email", r"[\w.+-]+@[\w.-]+\.[\w.-]+")
});

/// IPv4 address with optional port.
pub static IP: LazyLock<Pattern> = LazyLock::new(|| {
    static_match_pattern(
        "ip",
        r"(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9]?[0-9])(?::[0-9]+)?",
    )
});

pub static URL: LazyLock<Pattern> = LazyLock::new(|| {
    static_match_pattern(
        "url",
        r"(?i:(?:https?|ftp|rtsp|mms)://)?(?:[0-9a-z_.~-]+@)?(?:(?:[0-9]{1,3}\.){3}[0-9]{1,3}|(?:[0-9a-z_-]+\.)+[a-z]{2,6}|localhost)(?::[0-9]{1,5})?(?:/[^\s]*)?",
    )
});

/// JSON array literal.
pub static LIST: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::List, "list", r"\[.*\]", |v| parse_json(v))
});

/// JSON object literal.
pub static DICT: LazyLock<Pattern> = LazyLock::new(|| {
    static_regex_pattern(TypeTag::Map, "dict", r"\{.*\}", |v| parse_json(v))
});

/// RFC 3339 timestamp, `YYYY-MM-DD` date, or unix seconds.
pub static DATETIME: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::convert(TypeTag::DateTime, "datetime", |v| match v {
        Value::Int(secs) => from_unix(*secs),
        Value::Float(secs) => from_unix(*secs as i64),
        Value::Str(s) => parse_datetime(s),
        _ => None,
    })
    .accepting(vec![
        Accept::Type(TypeTag::Str),
        Accept::Type(TypeTag::Int),
        Accept::Type(TypeTag::Float),
    ])
});

/// Reads the named file; non-text inputs are stringified first.
pub static FILE: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::chain(ANY_STRING.clone(), TypeTag::Str, "file", |v| {
        v.as_str()
            .and_then(|path| fs::read_to_string(path).ok())
            .map(Value::Str)
    })
});

fn parse_json(v: &Value) -> Option<Value> {
    let text = v.as_str()?;
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .map(Value::from_json)
}

fn from_unix(secs: i64) -> Option<Value> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| Value::DateTime(dt.fixed_offset()))
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(text) {
        return Some(Value::DateTime(dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Value::DateTime(midnight.and_utc().fixed_offset()));
    }
    text.parse::<i64>().ok().and_then(from_unix)
}

/// A `re:` pattern: named groups as a map, otherwise every group as a list.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Value, builtin};
///
/// let range = builtin::regex_groups(r"(\d+)-(\d+)").unwrap();
/// let out = range.exec(&Value::from("3-7")).into_value().unwrap();
/// assert_eq!(out, Value::List(vec![Value::from("3"), Value::from("7")]));
/// ```
pub fn regex_groups(expression: &str) -> Result<Pattern> {
    let pattern = Pattern::regex_convert(TypeTag::Any, format!("re:{expression}"), expression, |v| {
        Some(match v {
            Value::Str(s) => Value::List(vec![Value::from(s.as_str())]),
            other => other.clone(),
        })
    })?;
    Ok(pattern)
}

fn strip_delimiters<'a>(text: &'a str, pairs: &[(char, char)]) -> &'a str {
    let text = text.trim();
    for (open, close) in pairs {
        if let Some(inner) = text
            .strip_prefix(*open)
            .and_then(|rest| rest.strip_suffix(*close))
        {
            return inner;
        }
    }
    text
}

/// A delimited list: `[a, b]`, `(a, b)` or bare `a,b`; `set` form uses `{a, b}`
/// and drops duplicates.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Value, builtin};
///
/// let ints = builtin::sequence(builtin::INTEGER.clone(), false);
/// let out = ints.exec(&Value::from("[1, 2, 3]")).into_value().unwrap();
/// assert_eq!(out, Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
/// ```
pub fn sequence(item: Pattern, set: bool) -> Pattern {
    let alias = if set {
        format!("set[{item}]")
    } else {
        format!("list[{item}]")
    };
    let pairs: &'static [(char, char)] = if set {
        &[('{', '}')]
    } else {
        &[('[', ']'), ('(', ')')]
    };
    Pattern::convert(TypeTag::List, alias, move |v| {
        let raw: Vec<Value> = match v {
            Value::List(items) => items.clone(),
            Value::Str(s) => {
                let inner = strip_delimiters(s, pairs);
                if inner.trim().is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(|p| Value::from(p.trim())).collect()
                }
            }
            _ => return None,
        };
        let mut out = Vec::with_capacity(raw.len());
        for unit in &raw {
            let value = item.exec(unit).into_value()?;
            if !set || !out.contains(&value) {
                out.push(value);
            }
        }
        Some(Value::List(out))
    })
    .accepting(vec![
        Accept::Type(TypeTag::Str),
        Accept::Type(TypeTag::List),
    ])
}

/// A `{k=v, k2:v2}` mapping with typed keys and values.
pub fn mapping(key: Pattern, value: Pattern) -> Pattern {
    let alias = format!("dict[{key}, {value}]");
    Pattern::convert(TypeTag::Map, alias, move |v| {
        let pairs: Vec<(Value, Value)> = match v {
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect(),
            Value::Str(s) => {
                let inner = strip_delimiters(s, &[('{', '}')]);
                let mut pairs = Vec::new();
                for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let (k, v) = part.split_once(['=', ':'])?;
                    pairs.push((Value::from(k.trim()), Value::from(v.trim())));
                }
                pairs
            }
            _ => return None,
        };
        let mut out = BTreeMap::new();
        for (k, v) in pairs {
            let k = key.exec(&k).into_value()?;
            let v = value.exec(&v).into_value()?;
            out.insert(k.to_string(), v);
        }
        Some(Value::Map(out))
    })
    .accepting(vec![
        Accept::Type(TypeTag::Str),
        Accept::Type(TypeTag::Map),
    ])
}

/// A lookup table: inputs equal to a key map to its value, everything else
/// to `fallback` if given.
pub fn switch(table: Vec<(Value, Value)>, fallback: Option<Value>) -> Pattern {
    let alias = table
        .iter()
        .map(|(k, _)| k.to_string())
        .collect::<Vec<_>>()
        .join("|");
    Pattern::convert(TypeTag::Any, format!("switch[{alias}]"), move |v| {
        table
            .iter()
            .find(|(k, _)| k == v)
            .map(|(_, out)| out.clone())
            .or_else(|| fallback.clone())
    })
}

/// Name → pattern table with the built-ins preloaded.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{ArgValue, PatternRegistry, Value};
///
/// let registry = PatternRegistry::global();
/// let ArgValue::Pattern(p) = registry.resolve("on|off|int").unwrap() else {
///     panic!("expected a pattern");
/// };
/// assert!(p.exec(&Value::from("off")).is_success());
/// assert!(p.exec(&Value::from("12")).is_success());
/// assert!(p.exec(&Value::from("maybe")).is_failed());
/// ```
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: HashMap<String, Pattern>,
}

static GLOBAL_REGISTRY: LazyLock<PatternRegistry> = LazyLock::new(PatternRegistry::with_builtins);

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PatternRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            patterns: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for pattern in [
            &*ANY,
            &*ANY_STRING,
            &*STRING,
            &*INTEGER,
            &*NUMBER,
            &*BOOLEAN,
            &*HEX,
            &*HEX_COLOR,
            &*EMAIL,
            &*IP,
            &*URL,
            &*LIST,
            &*DICT,
            &*DATETIME,
            &*FILE,
        ] {
            registry.register(pattern.alias(), pattern.clone());
        }
        registry.register("...", ANY.clone());
        registry
    }

    /// The shared registry holding only the built-ins.
    pub fn global() -> &'static PatternRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn register(&mut self, name: impl Into<String>, pattern: Pattern) {
        self.patterns.insert(name.into(), pattern);
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// Resolves a textual type spec into an argument value.
    ///
    /// `*` consumes the rest of the input, `re:` builds a group pattern,
    /// `!` negates, `a|b` builds a union of registered names and literal
    /// words, a registered name returns that pattern, and anything else is
    /// matched as a regex.
    pub fn resolve(&self, spec: &str) -> Result<ArgValue> {
        if spec.is_empty() {
            return Err(PatternError::EmptySpec);
        }
        if spec == "*" {
            return Ok(ArgValue::AllRemaining);
        }
        if let Some(expression) = spec.strip_prefix("re:") {
            return Ok(ArgValue::Pattern(regex_groups(expression)?));
        }
        if let Some(inner) = spec.strip_prefix('!') {
            return match self.resolve(inner)? {
                ArgValue::Pattern(p) => Ok(ArgValue::Pattern(p.reverse())),
                _ => Err(PatternError::NotNegatable(spec.to_string())),
            };
        }
        if spec.contains('|') {
            let mut patterns = Vec::new();
            let mut equals = Vec::new();
            for part in spec.split('|').filter(|p| !p.is_empty()) {
                match self.get(part) {
                    Some(p) => patterns.push(p.clone()),
                    None => equals.push(Value::from(part)),
                }
            }
            return Ok(ArgValue::Pattern(Pattern::union(patterns, equals)));
        }
        if let Some(p) = self.get(spec) {
            return Ok(ArgValue::Pattern(p.clone()));
        }
        Ok(ArgValue::Pattern(Pattern::regex_match(
            format!("'{spec}'"),
            spec,
        )?))
    }
}
