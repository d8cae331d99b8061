//! Backtracking command analyser.
//!
//! Compiles [`command_grammar_core::Command`] declarations into per-scope
//! lookup tables and parses input against them:
//!
//! - [`TokenCursor`]: lazy, quote-aware splitting over mixed input units with
//!   snapshot/restore for backtracking
//! - [`HeaderMatcher`]: recognition of the command name and its prefixes
//! - [`Analyser`]: the scope walk over options, subcommands and arguments
//! - [`CommandManager`]: registry, content-hash result cache, shortcuts and
//!   built-in help/shortcut/completion options
//!
//! # Example
//!
//! ```
//! use command_grammar_analyser::{CommandManager, ManagerConfig};
//! use command_grammar_core::{Arg, Command, CommandOption, Subcommand, Value, builtin};
//!
//! let mut manager = CommandManager::new(ManagerConfig::default());
//! let path = manager
//!     .register(
//!         Command::new("cmd")
//!             .with_arg(Arg::new("foo", builtin::INTEGER.clone()))
//!             .with_subcommand(Subcommand::new("sub").with_option(CommandOption::new("--qux"))),
//!     )
//!     .unwrap();
//!
//! let result = manager.parse(&path, vec![Value::from("cmd 1 sub --qux")]).unwrap();
//! assert!(result.matched);
//! assert!(result.find("sub.qux"));
//! ```

mod analyser;
mod compile;
mod config;
mod container;
mod error;
mod handlers;
mod header;
mod manager;
mod output;
mod shortcut;
pub mod text;

pub use analyser::{Analysed, Analyser, PausedParse};
pub use config::{ManagerConfig, NamespaceConfig, OptionNames};
pub use container::{CursorConfig, Preprocessor, Snapshot, TokenCursor};
pub use error::{ManagerError, Result};
pub use handlers::{Builtin, ShortcutRequest};
pub use header::HeaderMatcher;
pub use manager::{CommandManager, Outcome};
pub use output::{HelpRenderer, LogSink, MemorySink, OutlineRenderer, OutputSink};
pub use shortcut::{ShortcutEntry, ShortcutTarget, ShortcutTemplate, expand};
