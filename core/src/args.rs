//! Argument declarations.
//!
//! An [`Arg`] pairs a name with what it matches ([`ArgValue`]) plus default,
//! flags and separators. [`Args`] is the ordered, name-deduplicated collection
//! attached to a command, option or subcommand.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::pattern::Pattern;
use crate::typing::{KeywordVar, MultiBase, MultiVar, Multiplicity};
use crate::value::Value;

static NOTICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+?#([^;?!/#]+)").expect("static regex must compile"));
static FLAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+?;([?!/]+)").expect("static regex must compile"));

/// Prefix of the synthetic args inserted in front of space-separated keywords.
pub const KEY_ARG_PREFIX: &str = "_key_";

/// What an argument matches.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A typed pattern.
    Pattern(Pattern),
    /// Exact equality with a literal value.
    Literal(Value),
    /// Every remaining unit, verbatim.
    AllRemaining,
    Keyword(KeywordVar),
    Multi(MultiVar),
}

impl From<Pattern> for ArgValue {
    fn from(p: Pattern) -> Self {
        ArgValue::Pattern(p)
    }
}

impl From<&Pattern> for ArgValue {
    fn from(p: &Pattern) -> Self {
        ArgValue::Pattern(p.clone())
    }
}

impl From<KeywordVar> for ArgValue {
    fn from(k: KeywordVar) -> Self {
        ArgValue::Keyword(k)
    }
}

impl From<MultiVar> for ArgValue {
    fn from(m: MultiVar) -> Self {
        ArgValue::Multi(m)
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Literal(v)
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Pattern(p) => write!(f, "{p}"),
            ArgValue::Literal(v) => write!(f, "'{v}'"),
            ArgValue::AllRemaining => f.write_str("..."),
            ArgValue::Keyword(k) => write!(f, "{k}"),
            ArgValue::Multi(m) => write!(f, "{m}"),
        }
    }
}

/// Generator for computed defaults.
pub type DefaultGetter = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default applied when an argument is absent or fails to match.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    /// The empty marker; resolves to [`Value::Null`].
    Empty,
    Getter(DefaultGetter),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Empty => f.write_str("Empty"),
            DefaultValue::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Empty => Value::Null,
            DefaultValue::Getter(get) => get(),
        }
    }
}

/// Argument flags, also settable inline with `name;?!/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgFlags {
    /// `?`: may be absent.
    pub optional: bool,
    /// `/`: hidden from help output.
    pub hidden: bool,
    /// `!`: the value pattern is negated.
    pub anti: bool,
}

/// A declared parameter.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Arg, Value, builtin};
///
/// let arg = Arg::new("count;?#how many", builtin::INTEGER.clone()).with_default(Value::Int(1));
/// assert_eq!(arg.name, "count");
/// assert_eq!(arg.notice.as_deref(), Some("how many"));
/// assert!(arg.flags.optional);
/// assert_eq!(arg.default_value(), Some(Value::Int(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: String,
    pub value: ArgValue,
    pub default: Option<DefaultValue>,
    pub notice: Option<String>,
    pub flags: ArgFlags,
    /// Separators used when popping this argument's unit.
    pub separators: Vec<char>,
}

impl Arg {
    /// Creates an argument, parsing `#notice` and `;?!/` markers from `name`.
    ///
    /// A `!` flag negates a pattern value; an optional union value defaults
    /// to the empty marker.
    pub fn new(name: &str, value: impl Into<ArgValue>) -> Self {
        let mut value = value.into();
        let mut clean = name.to_string();
        let mut notice = None;
        let mut flags = ArgFlags::default();

        if let Some(caps) = NOTICE_RE.captures(name) {
            notice = Some(caps[1].to_string());
            clean = clean.replace(&format!("#{}", &caps[1]), "");
        }
        if let Some(caps) = FLAGS_RE.captures(name) {
            clean = clean.replace(&format!(";{}", &caps[1]), "");
            for ch in caps[1].chars() {
                match ch {
                    '?' => flags.optional = true,
                    '/' => flags.hidden = true,
                    '!' => flags.anti = true,
                    _ => {}
                }
            }
        }

        if flags.anti {
            if let ArgValue::Pattern(p) = &value {
                value = ArgValue::Pattern(p.reverse());
            }
        }
        let default = match &value {
            ArgValue::Pattern(p) if p.is_optional() => Some(DefaultValue::Empty),
            _ => None,
        };

        Self {
            name: clean,
            value,
            default,
            notice,
            flags,
            separators: vec![' '],
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn with_empty_default(mut self) -> Self {
        self.default = Some(DefaultValue::Empty);
        self
    }

    pub fn with_default_fn<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Getter(Arc::new(getter)));
        self
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn with_separators(mut self, separators: &[char]) -> Self {
        self.separators = separators.to_vec();
        self
    }

    pub fn optional(mut self) -> Self {
        self.flags.optional = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }

    /// The resolved default, if any.
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::resolve)
    }

    /// True if absence is tolerated (optional flag or default present).
    pub fn is_skippable(&self) -> bool {
        self.flags.optional || self.default.is_some()
    }

    /// True for the synthetic `_key_<name>` companions of keyword args.
    pub fn is_synthetic(&self) -> bool {
        self.name.starts_with(KEY_ARG_PREFIX)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.is_skippable() { '[' } else { '<' };
        let close = if self.is_skippable() { ']' } else { '>' };
        write!(f, "{open}{}:{}", self.name, self.value)?;
        if let Some(DefaultValue::Value(v)) = &self.default {
            write!(f, " = {v}")?;
        }
        write!(f, "{close}")
    }
}

/// Ordered, name-deduplicated argument collection.
///
/// Tracks the variadic-positional, variadic-keyword and keyword-only members
/// and the number of optional members.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Arg, Args, KeywordVar, MultiVar, builtin};
///
/// let args = Args::new()
///     .with(Arg::new("files", MultiVar::plus(builtin::STRING.clone())))
///     .with(Arg::new("files", builtin::INTEGER.clone()))
///     .with(Arg::new("level", KeywordVar::new(builtin::INTEGER.clone())));
/// assert_eq!(args.len(), 2);
/// assert_eq!(args.var_positional(), Some("files"));
/// assert_eq!(args.keyword_only(), ["level"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    args: Vec<Arg>,
    var_positional: Option<String>,
    var_keyword: Option<String>,
    keyword_only: Vec<String>,
    optional_count: usize,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, arg: Arg) -> Self {
        self.push(arg);
        self
    }

    /// Appends `arg` unless an argument with the same name exists.
    ///
    /// A keyword arg whose separator is also one of its own separators gets
    /// a hidden `_key_<name>` arg in front matching `-*<name>`, and then
    /// matches its value as a plain pattern.
    pub fn push(&mut self, mut arg: Arg) {
        if self.args.iter().any(|a| a.name == arg.name) {
            return;
        }
        match &arg.value {
            ArgValue::Multi(multi) if multi.is_keyword() => {
                if self.var_keyword.is_none() {
                    self.var_keyword = Some(arg.name.clone());
                }
            }
            ArgValue::Multi(_) => {
                if self.var_positional.is_none() {
                    self.var_positional = Some(arg.name.clone());
                }
            }
            ArgValue::Keyword(keyword) => {
                self.keyword_only.push(arg.name.clone());
                if arg.separators.contains(&keyword.sep) {
                    let expression = format!("-*{}", regex::escape(&arg.name));
                    if let Ok(key) = Pattern::regex_match(format!("-*{}", arg.name), &expression) {
                        let mut key_arg =
                            Arg::new(&format!("{KEY_ARG_PREFIX}{}", arg.name), key).hidden();
                        key_arg.separators = arg.separators.clone();
                        if arg.is_skippable() {
                            key_arg.flags.optional = true;
                        }
                        self.args.push(key_arg);
                        arg.value = ArgValue::Pattern(keyword.base.clone());
                    }
                }
            }
            _ => {}
        }
        if arg.is_skippable() {
            self.optional_count += 1;
        }
        self.args.push(arg);
    }

    /// Replaces every argument's separators.
    pub fn separate(mut self, separators: &[char]) -> Self {
        for arg in &mut self.args {
            arg.separators = separators.to_vec();
        }
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.args.iter()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|a| a.name == name)
    }

    pub fn var_positional(&self) -> Option<&str> {
        self.var_positional.as_deref()
    }

    pub fn var_keyword(&self) -> Option<&str> {
        self.var_keyword.as_deref()
    }

    pub fn keyword_only(&self) -> &[String] {
        &self.keyword_only
    }

    pub fn optional_count(&self) -> usize {
        self.optional_count
    }

    /// True if every visible argument may be absent.
    pub fn all_skippable(&self) -> bool {
        self.args
            .iter()
            .filter(|a| !a.is_synthetic())
            .all(|a| a.is_skippable() || is_star(a))
    }

    /// Names of required arguments, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| !a.is_synthetic() && !a.is_skippable() && !is_star(a))
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Distinct names of keyword members (for boundary detection).
    pub fn keyword_names(&self) -> HashSet<&str> {
        self.args
            .iter()
            .filter(|a| {
                matches!(
                    &a.value,
                    ArgValue::Keyword(_)
                        | ArgValue::Multi(MultiVar {
                            base: MultiBase::Keyword(_),
                            ..
                        })
                )
            })
            .map(|a| a.name.as_str())
            .collect()
    }
}

fn is_star(arg: &Arg) -> bool {
    matches!(
        &arg.value,
        ArgValue::Multi(MultiVar {
            flag: Multiplicity::Star,
            ..
        })
    )
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.iter()
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: Vec<String> = self
            .args
            .iter()
            .filter(|a| !a.flags.hidden)
            .map(|a| a.to_string())
            .collect();
        f.write_str(&visible.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    #[test]
    fn test_inline_markers() {
        let arg = Arg::new("target;!/", builtin::INTEGER.clone());
        assert_eq!(arg.name, "target");
        assert!(arg.flags.anti && arg.flags.hidden && !arg.flags.optional);
        let ArgValue::Pattern(p) = &arg.value else {
            panic!("expected pattern");
        };
        assert!(p.is_anti());
    }

    #[test]
    fn test_optional_union_defaults_to_empty() {
        let u = crate::Pattern::union(vec![builtin::INTEGER.clone()], vec![]).with_empty();
        let arg = Arg::new("n", u);
        assert!(matches!(arg.default, Some(DefaultValue::Empty)));
        assert_eq!(arg.default_value(), Some(Value::Null));
    }

    #[test]
    fn test_default_getter() {
        let arg = Arg::new("n", builtin::INTEGER.clone()).with_default_fn(|| Value::Int(7));
        assert_eq!(arg.default_value(), Some(Value::Int(7)));
    }

    #[test]
    fn test_space_keyword_gets_key_arg() {
        let args = Args::new().with(Arg::new(
            "level",
            KeywordVar::new(builtin::INTEGER.clone()).with_sep(' '),
        ));
        let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["_key_level", "level"]);
        assert!(args.iter().next().unwrap().is_synthetic());
        assert!(matches!(args.get("level").unwrap().value, ArgValue::Pattern(_)));
        assert_eq!(args.keyword_only(), ["level"]);
    }

    #[test]
    fn test_counts() {
        let args = Args::new()
            .with(Arg::new("a", builtin::INTEGER.clone()))
            .with(Arg::new("b;?", builtin::INTEGER.clone()))
            .with(Arg::new("c", builtin::INTEGER.clone()).with_default(Value::Int(0)))
            .with(Arg::new("rest", MultiVar::star(builtin::STRING.clone())));
        assert_eq!(args.optional_count(), 2);
        assert_eq!(args.required_names(), ["a"]);
        assert!(!args.all_skippable());
    }
}
