//! Grammar nodes: options and subcommands.

use std::fmt;
use std::sync::Arc;

use crate::args::{Arg, Args};
use crate::result::{ArgsMap, ParsedArgs};
use crate::value::Value;

/// Rewrites matched arguments. Returning `None` keeps the original args.
pub type TransformFn = Arc<dyn Fn(&ParsedArgs) -> Option<ArgsMap> + Send + Sync>;

/// Post-match transform applied when a node matches.
#[derive(Clone)]
pub enum Action {
    /// The node's value becomes this value.
    Store(Value),
    StoreTrue,
    StoreFalse,
    /// Repeated occurrences accumulate values and args into lists.
    Append,
    /// The node's value counts occurrences.
    Count,
    Transform(TransformFn),
}

impl Default for Action {
    fn default() -> Self {
        Action::Store(Value::Null)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Store(v) => f.debug_tuple("Store").field(v).finish(),
            Action::StoreTrue => f.write_str("StoreTrue"),
            Action::StoreFalse => f.write_str("StoreFalse"),
            Action::Append => f.write_str("Append"),
            Action::Count => f.write_str("Count"),
            Action::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

impl Action {
    /// True for actions that accept repeated occurrences.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Action::Append | Action::Count)
    }
}

/// State shared by options and subcommands.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Primary name (the longest alias).
    pub name: String,
    /// Result key.
    pub dest: String,
    pub args: Args,
    pub separators: Vec<char>,
    /// Literal words that must immediately precede this node.
    pub requires: Vec<String>,
    /// Match by prefix instead of whole-unit equality.
    pub compact: bool,
    pub help_text: String,
    pub action: Action,
}

/// Splits `"req1 req2 a|alias"` into requires, sorted aliases and dest.
fn parse_name(raw: &str) -> (Vec<String>, Vec<String>, String) {
    let mut parts: Vec<&str> = raw.split_whitespace().collect();
    let last = parts.pop().unwrap_or_default();
    let requires: Vec<String> = parts.into_iter().map(String::from).collect();
    let mut aliases: Vec<String> = last
        .split('|')
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();
    aliases.sort_by(|a, b| b.len().cmp(&a.len()));
    let name = aliases.first().cloned().unwrap_or_default();
    let dest = requires
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(name.trim_start_matches('-')))
        .collect::<Vec<_>>()
        .join("_");
    (requires, aliases, dest)
}

impl NodeSpec {
    fn from_raw(raw: &str) -> (Self, Vec<String>) {
        let (requires, aliases, dest) = parse_name(raw);
        let spec = Self {
            name: aliases.first().cloned().unwrap_or_default(),
            dest,
            args: Args::new(),
            separators: vec![' '],
            requires,
            compact: false,
            help_text: String::new(),
            action: Action::default(),
        };
        (spec, aliases)
    }
}

/// A named, aliased grammar node with optional arguments.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{Arg, CommandOption, builtin};
///
/// let opt = CommandOption::new("set -o|--output")
///     .with_arg(Arg::new("path", builtin::STRING.clone()))
///     .with_priority(1);
/// assert_eq!(opt.aliases, ["--output", "-o"]);
/// assert_eq!(opt.node.requires, ["set"]);
/// assert_eq!(opt.node.dest, "set_output");
/// ```
#[derive(Debug, Clone)]
pub struct CommandOption {
    pub node: NodeSpec,
    /// Aliases, longest first.
    pub aliases: Vec<String>,
    /// Match priority; lower is tried first.
    pub priority: i32,
}

impl CommandOption {
    pub fn new(name: &str) -> Self {
        let (node, aliases) = NodeSpec::from_raw(name);
        Self {
            node,
            aliases,
            priority: 0,
        }
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.node.args.push(arg);
        self
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.node.args = args;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self.aliases.sort_by(|a, b| b.len().cmp(&a.len()));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.node.dest = dest.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.node.action = action;
        self
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        self.node.help_text = text.into();
        self
    }

    pub fn with_separators(mut self, separators: &[char]) -> Self {
        self.node.separators = separators.to_vec();
        self
    }

    /// Matches `-p8080` style units by prefix.
    pub fn compact(mut self) -> Self {
        self.node.compact = true;
        self
    }
}

/// A named grammar node with nested children.
///
/// # Examples
///
/// ```
/// use command_grammar_core::{CommandOption, Node, Subcommand};
///
/// let sub = Subcommand::new("remote")
///     .with_option(CommandOption::new("-v|--verbose"))
///     .with_subcommand(Subcommand::new("add"));
/// assert_eq!(sub.children.len(), 2);
/// assert!(matches!(sub.children[1], Node::Subcommand(_)));
/// ```
#[derive(Debug, Clone)]
pub struct Subcommand {
    pub node: NodeSpec,
    pub aliases: Vec<String>,
    pub children: Vec<Node>,
}

impl Subcommand {
    pub fn new(name: &str) -> Self {
        let (node, aliases) = NodeSpec::from_raw(name);
        Self {
            node,
            aliases,
            children: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.node.args.push(arg);
        self
    }

    pub fn with_args(mut self, args: Args) -> Self {
        self.node.args = args;
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

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.node.dest = dest.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.node.action = action;
        self
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        self.node.help_text = text.into();
        self
    }

    pub fn with_separators(mut self, separators: &[char]) -> Self {
        self.node.separators = separators.to_vec();
        self
    }

    pub fn compact(mut self) -> Self {
        self.node.compact = true;
        self
    }
}

/// A child of a command or subcommand.
#[derive(Debug, Clone)]
pub enum Node {
    Option(CommandOption),
    Subcommand(Subcommand),
}

impl Node {
    pub fn spec(&self) -> &NodeSpec {
        match self {
            Node::Option(o) => &o.node,
            Node::Subcommand(s) => &s.node,
        }
    }

    pub fn aliases(&self) -> &[String] {
        match self {
            Node::Option(o) => &o.aliases,
            Node::Subcommand(s) => &s.aliases,
        }
    }
}
