//! Core grammar types for declarative command parsing.
//!
//! This crate defines the building blocks of a command grammar and the shape
//! of its parse results:
//!
//! - [`Value`]: a dynamically typed input unit or coerced argument value.
//! - [`Pattern`]: a typed matcher that validates and converts a unit.
//! - [`Arg`] / [`Args`]: named parameters with defaults, flags and
//!   variadic forms ([`KeywordVar`], [`MultiVar`]).
//! - [`CommandOption`] / [`Subcommand`]: aliased grammar nodes.
//! - [`Command`]: a root grammar with header, main args and children.
//! - [`ParseResult`]: the structured outcome of a parse, with a dotted-path
//!   query interface.
//! - [`Behavior`]: post-match transforms over a result.
//!
//! Validation ([`validate_command`]) catches structural errors such as
//! duplicate variadics and duplicate subcommands before a command is
//! compiled.
//!
//! # Example
//!
//! ```
//! use command_grammar_core::*;
//!
//! let cmd = Command::new("deploy")
//!     .with_header(Header::Text("/".into()))
//!     .with_arg(Arg::new("target", builtin::STRING.clone()))
//!     .with_option(
//!         CommandOption::new("-r|--retries")
//!             .with_arg(Arg::new("n", builtin::INTEGER.clone()).with_default(Value::Int(3))),
//!     )
//!     .with_subcommand(Subcommand::new("rollback"));
//!
//! assert_eq!(cmd.path(), "default.deploy");
//! assert!(validate_command(&cmd).is_empty());
//!
//! let port = builtin::INTEGER.validate(&Value::from("8080"), None);
//! assert_eq!(port.value(), Some(&Value::Int(8080)));
//! ```

mod args;
mod behavior;
pub mod builtin;
mod command;
mod error;
mod node;
mod pattern;
mod result;
mod typing;
mod validate;
mod value;

pub use args::{Arg, ArgFlags, ArgValue, Args, DefaultGetter, DefaultValue, KEY_ARG_PREFIX};
pub use behavior::{Behavior, BehaviorError, SetDefault, execute_behaviors};
pub use builtin::PatternRegistry;
pub use command::{Command, CommandMeta, CommandName, DEFAULT_NAMESPACE, Header};
pub use error::{MatchFailed, PatternError, Result};
pub use node::{Action, CommandOption, Node, NodeSpec, Subcommand, TransformFn};
pub use pattern::{
    Accept, Converter, Pattern, PatternMode, ValidateResult, Validator, compile_anchored,
};
pub use result::{
    ArgsMap, HeadResult, OptionResult, ParseError, ParseResult, ParsedArgs, Queried, QueryError,
    SubcommandResult,
};
pub use typing::{KeywordVar, MultiBase, MultiVar, Multiplicity};
pub use validate::{ValidationError, validate_command};
pub use value::{Element, TypeTag, Value};
