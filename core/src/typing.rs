//! Keyword and repetition wrappers over patterns.

use std::fmt;

use crate::pattern::Pattern;

/// Matches `key<sep>value` units, where `key` must be the argument's name.
#[derive(Debug, Clone)]
pub struct KeywordVar {
    pub base: Pattern,
    pub sep: char,
}

impl KeywordVar {
    /// A keyword wrapper using `=` as separator.
    pub fn new(base: Pattern) -> Self {
        Self { base, sep: '=' }
    }

    pub fn with_sep(mut self, sep: char) -> Self {
        self.sep = sep;
        self
    }
}

impl fmt::Display for KeywordVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}{}", self.sep, self.base)
    }
}

/// Repetition flag of a [`MultiVar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// One or more.
    Plus,
    /// Zero or more.
    Star,
}

/// What a [`MultiVar`] repeats.
#[derive(Debug, Clone)]
pub enum MultiBase {
    Pattern(Pattern),
    Keyword(KeywordVar),
}

/// Greedily consumes a bounded run of units matching its base.
///
/// A positional base collects a list; a keyword base collects a map of
/// `key → value` from `key=value` units.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{MultiVar, Multiplicity, builtin};
///
/// let ints = MultiVar::plus(builtin::INTEGER.clone());
/// assert_eq!(ints.flag, Multiplicity::Plus);
/// assert_eq!(MultiVar::bounded(builtin::INTEGER.clone(), 3).length, Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct MultiVar {
    pub base: MultiBase,
    pub flag: Multiplicity,
    /// Upper bound on the number of consumed units.
    pub length: Option<usize>,
}

impl MultiVar {
    pub fn plus(base: Pattern) -> Self {
        Self {
            base: MultiBase::Pattern(base),
            flag: Multiplicity::Plus,
            length: None,
        }
    }

    pub fn star(base: Pattern) -> Self {
        Self {
            base: MultiBase::Pattern(base),
            flag: Multiplicity::Star,
            length: None,
        }
    }

    /// One to `length` units.
    pub fn bounded(base: Pattern, length: usize) -> Self {
        Self {
            base: MultiBase::Pattern(base),
            flag: Multiplicity::Plus,
            length: Some(length),
        }
    }

    /// Zero or more `key=value` units.
    pub fn keywords(base: KeywordVar) -> Self {
        Self {
            base: MultiBase::Keyword(base),
            flag: Multiplicity::Star,
            length: None,
        }
    }

    pub fn with_flag(mut self, flag: Multiplicity) -> Self {
        self.flag = flag;
        self
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self.base, MultiBase::Keyword(_))
    }
}

impl fmt::Display for MultiVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            MultiBase::Pattern(p) => write!(f, "{p}")?,
            MultiBase::Keyword(k) => write!(f, "{k}")?,
        }
        match (self.length, self.flag) {
            (Some(n), _) => write!(f, "[{n}]"),
            (None, Multiplicity::Plus) => f.write_str("+"),
            (None, Multiplicity::Star) => f.write_str("*"),
        }
    }
}
