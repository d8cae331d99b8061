//! The value pattern engine.
//!
//! A [`Pattern`] turns a raw input unit into a typed [`Value`], or rejects it.
//! Patterns compose in three ways:
//!
//! - **Chaining**: [`Pattern::chain`] builds a conversion on top of an upstream
//!   pattern. When the input is not directly accepted, the upstream pattern
//!   runs first and its output is fed to the converter.
//! - **Alternation**: [`Pattern::union`] tries literal equality candidates
//!   first, then each sub-pattern in declared order.
//! - **Negation**: [`Pattern::reverse`] flips the success/failure decision; a
//!   negated pattern that rejects its input returns the input unchanged.
//!
//! # Examples
//!
//! ```
//! use command_grammar_core::{Pattern, PatternMode, TypeTag, Value};
//!
//! let even = Pattern::regex_convert(TypeTag::Int, "even", r"\d*[02468]", |v| {
//!     v.as_str().and_then(|s| s.parse::<i64>().ok()).map(Value::Int)
//! })
//! .unwrap();
//!
//! assert_eq!(even.mode(), PatternMode::RegexConvert);
//! assert_eq!(even.exec(&Value::from("42")).value(), Some(&Value::Int(42)));
//! assert!(even.exec(&Value::from("43")).is_failed());
//! assert!(even.reverse().exec(&Value::from("43")).is_success());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{MatchFailed, PatternError, Result};
use crate::value::{TypeTag, Value};

/// Raw-to-typed conversion function. `None` means the input was rejected.
pub type Converter = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Post-conversion predicate.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How a pattern turns its input into its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    /// Return the input unchanged.
    Keep,
    /// Require a text input fully matching the expression; return the text.
    RegexMatch,
    /// Run the converter and check the result against the origin type.
    TypeConvert,
    /// Require a full regex match, then run the converter over the captures.
    RegexConvert,
}

/// An entry of a pattern's accept list.
#[derive(Debug, Clone)]
pub enum Accept {
    /// Accept inputs of this runtime type.
    Type(TypeTag),
    /// Accept inputs this pattern validates.
    Pattern(Box<Pattern>),
}

impl Accept {
    fn admits(&self, input: &Value) -> bool {
        match self {
            Accept::Type(tag) => tag.admits(input),
            Accept::Pattern(p) => p.exec(input).is_success(),
        }
    }
}

/// Outcome of [`Pattern::validate`] and [`Pattern::exec`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidateResult {
    /// The input matched; carries the converted value.
    Valid(Value),
    /// The input did not match but a default was supplied.
    Default(Value),
    /// The input did not match.
    Error(MatchFailed),
}

impl ValidateResult {
    /// True only for [`ValidateResult::Valid`].
    pub fn is_success(&self) -> bool {
        matches!(self, ValidateResult::Valid(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ValidateResult::Error(_))
    }

    /// The carried value for `Valid` and `Default`.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ValidateResult::Valid(v) | ValidateResult::Default(v) => Some(v),
            ValidateResult::Error(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ValidateResult::Valid(v) | ValidateResult::Default(v) => Some(v),
            ValidateResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&MatchFailed> {
        match self {
            ValidateResult::Error(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct UnionSpec {
    equals: Vec<Value>,
    patterns: Vec<Pattern>,
    optional: bool,
}

/// A typed matcher/converter.
///
/// Construct with [`Pattern::keep`], [`Pattern::regex_match`],
/// [`Pattern::convert`], [`Pattern::regex_convert`], [`Pattern::chain`] or
/// [`Pattern::union`]; refine with the `with_*` builders.
#[derive(Clone)]
pub struct Pattern {
    origin: TypeTag,
    alias: String,
    mode: PatternMode,
    expression: String,
    regex: Option<Regex>,
    converter: Option<Converter>,
    previous: Option<Box<Pattern>>,
    accepts: Vec<Accept>,
    validators: Vec<Validator>,
    anti: bool,
    union: Option<Arc<UnionSpec>>,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("origin", &self.origin)
            .field("alias", &self.alias)
            .field("mode", &self.mode)
            .field("expression", &self.expression)
            .field("anti", &self.anti)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.anti {
            f.write_str("!")?;
        }
        f.write_str(&self.alias)
    }
}

/// Compiles `expression` as a fully anchored regex.
///
/// Sources that already carry `^` or `$` anchors are rejected.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{PatternError, compile_anchored};
///
/// let re = compile_anchored(r"\d+").unwrap();
/// assert!(re.is_match("123"));
/// assert!(!re.is_match("123a"));
/// assert!(matches!(compile_anchored(r"^\d+"), Err(PatternError::Anchored(_))));
/// ```
pub fn compile_anchored(expression: &str) -> Result<Regex> {
    if expression.starts_with('^') || (expression.ends_with('$') && !expression.ends_with("\\$"))
    {
        return Err(PatternError::Anchored(expression.to_string()));
    }
    Regex::new(&format!("^(?:{expression})$")).map_err(|e| PatternError::InvalidRegex {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

impl Pattern {
    fn base(origin: TypeTag, alias: impl Into<String>, mode: PatternMode) -> Self {
        Self {
            origin,
            alias: alias.into(),
            mode,
            expression: String::new(),
            regex: None,
            converter: None,
            previous: None,
            accepts: Vec::new(),
            validators: Vec::new(),
            anti: false,
            union: None,
        }
    }

    /// A pattern returning its input unchanged.
    ///
    /// With a non-`Any` origin, inputs of other runtime types are rejected.
    pub fn keep(origin: TypeTag, alias: impl Into<String>) -> Self {
        let mut pattern = Self::base(origin.clone(), alias, PatternMode::Keep);
        if origin != TypeTag::Any {
            pattern.accepts.push(Accept::Type(origin));
        }
        pattern
    }

    /// A text pattern that must fully match `expression`.
    pub fn regex_match(alias: impl Into<String>, expression: &str) -> Result<Self> {
        let mut pattern = Self::base(TypeTag::Str, alias, PatternMode::RegexMatch);
        pattern.regex = Some(compile_anchored(expression)?);
        pattern.expression = expression.to_string();
        Ok(pattern)
    }

    /// A converting pattern whose output must have runtime type `origin`.
    pub fn convert<F>(origin: TypeTag, alias: impl Into<String>, converter: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let mut pattern = Self::base(origin, alias, PatternMode::TypeConvert);
        pattern.converter = Some(Arc::new(converter));
        pattern
    }

    /// A regex pattern whose captures are fed to `converter`.
    ///
    /// The converter receives the whole match as text when the expression has
    /// no groups, a map of named groups when it has named groups, and a list
    /// of every group otherwise.
    pub fn regex_convert<F>(
        origin: TypeTag,
        alias: impl Into<String>,
        expression: &str,
        converter: F,
    ) -> Result<Self>
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let mut pattern = Self::base(origin, alias, PatternMode::RegexConvert);
        pattern.regex = Some(compile_anchored(expression)?);
        pattern.expression = expression.to_string();
        pattern.converter = Some(Arc::new(converter));
        Ok(pattern)
    }

    /// A converting pattern layered on `previous`.
    ///
    /// Inputs not of `previous`'s origin type are first run through
    /// `previous`; the converter then receives its output.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_grammar_core::{Pattern, TypeTag, Value, builtin};
    ///
    /// let shout = Pattern::chain(builtin::ANY_STRING.clone(), TypeTag::Str, "shout", |v| {
    ///     v.as_str().map(|s| Value::from(s.to_uppercase()))
    /// });
    /// assert_eq!(shout.exec(&Value::Int(7)).value(), Some(&Value::from("7")));
    /// assert_eq!(shout.exec(&Value::from("hi")).value(), Some(&Value::from("HI")));
    /// ```
    pub fn chain<F>(previous: Pattern, origin: TypeTag, alias: impl Into<String>, converter: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let mut pattern = Self::convert(origin, alias, converter);
        pattern.accepts.push(Accept::Type(previous.origin.clone()));
        pattern.previous = Some(Box::new(previous));
        pattern
    }

    /// An alternation of literal values and patterns.
    ///
    /// Equality candidates are tried before patterns; the first success wins.
    pub fn union(patterns: Vec<Pattern>, equals: Vec<Value>) -> Self {
        let alias = equals
            .iter()
            .map(|v| format!("'{v}'"))
            .chain(patterns.iter().map(|p| p.to_string()))
            .collect::<Vec<_>>()
            .join("|");
        let mut pattern = Self::base(TypeTag::Any, alias, PatternMode::Keep);
        pattern.union = Some(Arc::new(UnionSpec {
            equals,
            patterns,
            optional: false,
        }));
        pattern
    }

    /// Marks a union as containing the empty marker.
    ///
    /// Arguments declared with an optional union default to `Empty`.
    pub fn with_empty(mut self) -> Self {
        if let Some(spec) = self.union.as_mut() {
            Arc::make_mut(spec).optional = true;
        }
        self
    }

    /// Restricts which inputs reach the converter.
    pub fn accepting(mut self, accepts: Vec<Accept>) -> Self {
        self.accepts = accepts;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Adds a predicate the converted value must satisfy.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Returns a copy with the negation flag flipped.
    pub fn reverse(&self) -> Self {
        let mut pattern = self.clone();
        pattern.anti = !pattern.anti;
        pattern
    }

    pub fn origin(&self) -> &TypeTag {
        &self.origin
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn mode(&self) -> PatternMode {
        self.mode
    }

    /// The regex source, empty for non-regex patterns.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn previous(&self) -> Option<&Pattern> {
        self.previous.as_deref()
    }

    pub fn is_anti(&self) -> bool {
        self.anti
    }

    /// True for a union that contains the empty marker.
    pub fn is_optional(&self) -> bool {
        self.union.as_ref().is_some_and(|u| u.optional)
    }

    fn type_error(&self, input: &Value) -> MatchFailed {
        MatchFailed::Type {
            input: input.to_string(),
            actual: input.type_tag().to_string(),
            expected: self.alias.clone(),
        }
    }

    fn value_error(&self, input: &Value) -> MatchFailed {
        MatchFailed::Value {
            input: input.to_string(),
            expected: self.alias.clone(),
        }
    }

    fn accepts_value(&self, input: &Value) -> bool {
        self.accepts.iter().any(|a| a.admits(input))
    }

    /// Runs the matcher, ignoring validators and negation.
    pub fn match_value(&self, input: &Value) -> std::result::Result<Value, MatchFailed> {
        if let Some(union) = &self.union {
            return self.match_union(union, input);
        }

        if self.mode != PatternMode::Keep
            && !matches!(self.origin, TypeTag::Str | TypeTag::Any)
            && self.origin.admits(input)
        {
            return Ok(input.clone());
        }

        let mut input = Cow::Borrowed(input);
        if !self.accepts.is_empty() && !self.accepts_value(&input) {
            let previous = self
                .previous
                .as_ref()
                .ok_or_else(|| self.type_error(&input))?;
            let upstream = previous
                .match_value(&input)
                .map_err(|_| self.type_error(&input))?;
            if !self.accepts_value(&upstream) {
                return Err(self.type_error(&input));
            }
            input = Cow::Owned(upstream);
        }

        match self.mode {
            PatternMode::Keep => Ok(input.into_owned()),
            PatternMode::TypeConvert => self.match_convert(&input),
            PatternMode::RegexMatch | PatternMode::RegexConvert => self.match_regex(&input),
        }
    }

    fn match_union(
        &self,
        union: &UnionSpec,
        input: &Value,
    ) -> std::result::Result<Value, MatchFailed> {
        if union.equals.iter().any(|v| v == input) {
            return Ok(input.clone());
        }
        union
            .patterns
            .iter()
            .find_map(|p| match p.exec(input) {
                ValidateResult::Valid(v) => Some(v),
                _ => None,
            })
            .ok_or_else(|| self.value_error(input))
    }

    fn match_convert(&self, input: &Value) -> std::result::Result<Value, MatchFailed> {
        let Some(converter) = &self.converter else {
            return Ok(input.clone());
        };
        if let Some(out) = converter(input).filter(|v| self.origin.admits(v)) {
            return Ok(out);
        }
        // One retry through the upstream pattern.
        if let Some(previous) = &self.previous {
            if let Ok(upstream) = previous.match_value(input) {
                if let Some(out) = converter(&upstream).filter(|v| self.origin.admits(v)) {
                    return Ok(out);
                }
            }
        }
        Err(self.value_error(input))
    }

    fn match_regex(&self, input: &Value) -> std::result::Result<Value, MatchFailed> {
        let text: Cow<'_, str> = match input {
            Value::Str(s) => Cow::Borrowed(s.as_str()),
            other => {
                let previous = self.previous.as_ref().ok_or_else(|| self.type_error(other))?;
                match previous.match_value(other) {
                    Ok(Value::Str(s)) => Cow::Owned(s),
                    _ => return Err(self.type_error(other)),
                }
            }
        };
        let Some(regex) = &self.regex else {
            return Err(self.value_error(input));
        };
        let Some(caps) = regex.captures(&text) else {
            return Err(self.value_error(input));
        };
        if self.mode == PatternMode::RegexMatch {
            return Ok(Value::Str(text.to_string()));
        }

        let captured = if caps.len() == 1 {
            Value::Str(text.to_string())
        } else if regex.capture_names().flatten().next().is_some() {
            Value::Map(
                regex
                    .capture_names()
                    .flatten()
                    .map(|name| {
                        let v = caps
                            .name(name)
                            .map(|m| Value::from(m.as_str()))
                            .unwrap_or(Value::Null);
                        (name.to_string(), v)
                    })
                    .collect(),
            )
        } else {
            Value::List(
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| Value::from(m.as_str())).unwrap_or(Value::Null))
                    .collect(),
            )
        };

        match &self.converter {
            Some(converter) => converter(&captured)
                .filter(|v| self.origin.admits(v))
                .ok_or_else(|| self.value_error(input)),
            None => Ok(captured),
        }
    }

    fn resolve(&self, input: &Value) -> std::result::Result<Value, MatchFailed> {
        let value = self.match_value(input)?;
        if self.validators.iter().all(|check| check(&value)) {
            Ok(value)
        } else {
            Err(self.value_error(input))
        }
    }

    /// Matches `input`, honouring validators and negation.
    pub fn exec(&self, input: &Value) -> ValidateResult {
        if self.anti {
            return match self.resolve(input) {
                Ok(_) => ValidateResult::Error(self.value_error(input)),
                Err(_) => ValidateResult::Valid(input.clone()),
            };
        }
        match self.resolve(input) {
            Ok(v) => ValidateResult::Valid(v),
            Err(e) => ValidateResult::Error(e),
        }
    }

    /// Like [`exec`](Self::exec), substituting `default` on failure.
    pub fn validate(&self, input: &Value, default: Option<Value>) -> ValidateResult {
        match (self.exec(input), default) {
            (ValidateResult::Error(_), Some(d)) => ValidateResult::Default(d),
            (res, _) => res,
        }
    }

    /// Succeeds, returning the input, exactly when the pattern would reject it.
    ///
    /// The negation flag is ignored.
    pub fn invalidate(&self, input: &Value, default: Option<Value>) -> ValidateResult {
        match (self.resolve(input), default) {
            (Err(_), _) => ValidateResult::Valid(input.clone()),
            (Ok(_), Some(d)) => ValidateResult::Default(d),
            (Ok(_), None) => ValidateResult::Error(self.value_error(input)),
        }
    }
}
