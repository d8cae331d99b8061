//! Top-level command declaration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::args::{Arg, Args};
use crate::behavior::Behavior;
use crate::node::{CommandOption, Node, Subcommand};
use crate::pattern::Pattern;
use crate::value::Value;

/// Namespace assigned to commands that do not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The command's name token.
#[derive(Debug, Clone)]
pub enum CommandName {
    /// Literal text; may contain `{name}` / `{name:type}` capture brackets.
    Text(String),
    /// The name itself is a typed value.
    Typed(Pattern),
}

/// A header prefix in front of the command name.
#[derive(Debug, Clone)]
pub enum Header {
    /// Text prefix glued to the name (e.g. `"/"` for `/cmd`).
    Text(String),
    /// A non-text unit that must precede the name (e.g. a mention element).
    Value(Value),
    /// A typed prefix unit.
    Pattern(Pattern),
    /// A prefix unit followed by `text` glued to the name.
    Pair(Value, String),
}

/// Descriptive and behavioural metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandMeta {
    pub description: String,
    pub usage: Option<String>,
    pub examples: Vec<String>,
    pub author: Option<String>,
    /// Suggest close matches when the header or a parameter does not match.
    pub fuzzy_match: bool,
    /// Return failures as errors instead of unmatched results.
    pub raise_error: bool,
    /// Hide from command listings.
    pub hide: bool,
    /// Keep carriage returns and newlines inside text units.
    pub keep_crlf: bool,
}

/// A root grammar: header, main args, options and subcommands.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Arg, Command, CommandOption, Header, builtin};
///
/// let cmd = Command::new("ping")
///     .with_header(Header::Text("/".into()))
///     .with_arg(Arg::new("host", builtin::IP.clone()))
///     .with_option(CommandOption::new("-c|--count").with_arg(Arg::new("n", builtin::INTEGER.clone())));
/// assert_eq!(cmd.path(), "default.ping");
/// assert_eq!(cmd.children.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    pub name: CommandName,
    pub headers: Vec<Header>,
    pub args: Args,
    pub children: Vec<Node>,
    pub namespace: String,
    pub meta: CommandMeta,
    /// Separators for the command body; empty inherits the namespace's.
    pub separators: Vec<char>,
    pub behaviors: Vec<Arc<dyn Behavior>>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_name(CommandName::Text(name.into()))
    }

    /// A command whose name unit is matched by `pattern`.
    pub fn typed(pattern: Pattern) -> Self {
        Self::with_name(CommandName::Typed(pattern))
    }

    fn with_name(name: CommandName) -> Self {
        Self {
            name,
            headers: Vec::new(),
            args: Args::new(),
            children: Vec::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            meta: CommandMeta::default(),
            separators: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.children.push(Node::Option(option));
        self
    }

    pub fn with_subcommand(mut self, sub: Subcommand) -> Self {
        self.children.push(Node::Subcommand(sub));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = description.into();
        self
    }

    pub fn with_separators(mut self, separators: &[char]) -> Self {
        self.separators = separators.to_vec();
        self
    }

    pub fn with_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn fuzzy(mut self) -> Self {
        self.meta.fuzzy_match = true;
        self
    }

    pub fn raise_error(mut self) -> Self {
        self.meta.raise_error = true;
        self
    }

    /// The name as text; typed names use their pattern alias.
    pub fn name_text(&self) -> String {
        match &self.name {
            CommandName::Text(s) => s.clone(),
            CommandName::Typed(p) => p.to_string(),
        }
    }

    /// Registry key: `namespace.name`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.namespace, self.name_text())
    }
}
