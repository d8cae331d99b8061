//! Post-match behaviors.
//!
//! Behaviors run, in declaration order with their `requires` first, on a
//! matched [`ParseResult`]. A behavior returning
//! [`BehaviorError::Cancelled`] is skipped and its changes discarded;
//! [`BehaviorError::OutOfBounds`] downgrades the whole result to failed.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::result::{OptionResult, ParseError, ParseResult, SubcommandResult};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BehaviorError {
    /// Skip this behavior, keeping the result as it was.
    #[error("behavior cancelled: {0}")]
    Cancelled(String),
    /// Fail the result.
    #[error("behavior out of bounds: {0}")]
    OutOfBounds(String),
}

/// A transform over a matched result.
pub trait Behavior: fmt::Debug + Send + Sync {
    /// Behaviors that must run before this one.
    fn requires(&self) -> Vec<Arc<dyn Behavior>> {
        Vec::new()
    }

    fn execute(&self, result: &mut ParseResult) -> Result<(), BehaviorError>;
}

fn flatten(behavior: &Arc<dyn Behavior>, into: &mut Vec<Arc<dyn Behavior>>) {
    for required in behavior.requires() {
        flatten(&required, into);
    }
    into.push(Arc::clone(behavior));
}

/// Runs `behaviors` over `result` if it matched.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use command_grammar_core::{Behavior, ParseResult, SetDefault, Value, execute_behaviors};
///
/// let mut result = ParseResult::new("default.cmd", vec![], 0);
/// result.matched = true;
/// let fill: Arc<dyn Behavior> = Arc::new(SetDefault::arg("verbose", Value::Bool(false)));
/// execute_behaviors(&[fill], &mut result);
/// assert_eq!(result.main_args.get("verbose"), Some(&Value::Bool(false)));
/// ```
pub fn execute_behaviors(behaviors: &[Arc<dyn Behavior>], result: &mut ParseResult) {
    if !result.matched || behaviors.is_empty() {
        return;
    }
    let mut ordered = Vec::new();
    for behavior in behaviors {
        flatten(behavior, &mut ordered);
    }
    for behavior in ordered {
        let mut staged = result.clone();
        match behavior.execute(&mut staged) {
            Ok(()) => *result = staged,
            Err(BehaviorError::Cancelled(_)) => continue,
            Err(BehaviorError::OutOfBounds(reason)) => {
                let residue = std::mem::take(&mut result.error_data);
                *result = std::mem::take(result).fail(ParseError::BehaviorOutOfBounds(reason), residue);
                return;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DefaultTarget {
    Main(String),
    Option { name: String, arg: Option<String> },
    Subcommand { name: String, arg: Option<String> },
}

/// Fills in a missing option, subcommand or argument.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDefault {
    target: DefaultTarget,
    value: Value,
}

impl SetDefault {
    /// A main argument.
    pub fn arg(name: impl Into<String>, value: Value) -> Self {
        Self {
            target: DefaultTarget::Main(name.into()),
            value,
        }
    }

    /// An option's value, inserting the option if absent.
    pub fn option(name: impl Into<String>, value: Value) -> Self {
        Self {
            target: DefaultTarget::Option {
                name: name.into(),
                arg: None,
            },
            value,
        }
    }

    /// One argument of an option, inserting the option if absent.
    pub fn option_arg(name: impl Into<String>, arg: impl Into<String>, value: Value) -> Self {
        Self {
            target: DefaultTarget::Option {
                name: name.into(),
                arg: Some(arg.into()),
            },
            value,
        }
    }

    pub fn subcommand(name: impl Into<String>, value: Value) -> Self {
        Self {
            target: DefaultTarget::Subcommand {
                name: name.into(),
                arg: None,
            },
            value,
        }
    }

    pub fn subcommand_arg(name: impl Into<String>, arg: impl Into<String>, value: Value) -> Self {
        Self {
            target: DefaultTarget::Subcommand {
                name: name.into(),
                arg: Some(arg.into()),
            },
            value,
        }
    }
}

impl Behavior for SetDefault {
    fn execute(&self, result: &mut ParseResult) -> Result<(), BehaviorError> {
        match &self.target {
            DefaultTarget::Main(name) => {
                result
                    .main_args
                    .entry(name.clone())
                    .or_insert_with(|| self.value.clone());
            }
            DefaultTarget::Option { name, arg: None } => {
                result
                    .options
                    .entry(name.clone())
                    .or_insert_with(|| OptionResult {
                        value: self.value.clone(),
                        args: Default::default(),
                    });
            }
            DefaultTarget::Option {
                name,
                arg: Some(arg),
            } => {
                result
                    .options
                    .entry(name.clone())
                    .or_default()
                    .args
                    .entry(arg.clone())
                    .or_insert_with(|| self.value.clone());
            }
            DefaultTarget::Subcommand { name, arg: None } => {
                result
                    .subcommands
                    .entry(name.clone())
                    .or_insert_with(|| SubcommandResult {
                        value: self.value.clone(),
                        ..Default::default()
                    });
            }
            DefaultTarget::Subcommand {
                name,
                arg: Some(arg),
            } => {
                result
                    .subcommands
                    .entry(name.clone())
                    .or_default()
                    .args
                    .entry(arg.clone())
                    .or_insert_with(|| self.value.clone());
            }
        }
        result.refresh_other_args();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Cancel;

    impl Behavior for Cancel {
        fn execute(&self, result: &mut ParseResult) -> Result<(), BehaviorError> {
            result.main_args.insert("junk".into(), Value::Null);
            Err(BehaviorError::Cancelled("no".into()))
        }
    }

    #[derive(Debug)]
    struct Overstep;

    impl Behavior for Overstep {
        fn requires(&self) -> Vec<Arc<dyn Behavior>> {
            let fill: Arc<dyn Behavior> = Arc::new(SetDefault::option("dry-run", Value::Bool(true)));
            vec![fill]
        }

        fn execute(&self, _result: &mut ParseResult) -> Result<(), BehaviorError> {
            Err(BehaviorError::OutOfBounds("limit".into()))
        }
    }

    fn run(behavior: impl Behavior + 'static, result: &mut ParseResult) {
        let behavior: Arc<dyn Behavior> = Arc::new(behavior);
        execute_behaviors(&[behavior], result);
    }

    fn matched() -> ParseResult {
        let mut result = ParseResult::new("default.cmd", vec![], 0);
        result.matched = true;
        result
    }

    #[test]
    fn test_cancelled_changes_are_discarded() {
        let mut result = matched();
        run(Cancel, &mut result);
        assert!(result.matched);
        assert!(result.main_args.is_empty());
    }

    #[test]
    fn test_out_of_bounds_fails_result() {
        let mut result = matched();
        run(Overstep, &mut result);
        assert!(!result.matched);
        assert_eq!(
            result.error_info,
            Some(ParseError::BehaviorOutOfBounds("limit".into()))
        );
    }

    #[test]
    fn test_set_default_option_arg_feeds_other_args() {
        let mut result = matched();
        run(SetDefault::option_arg("out", "path", Value::from("-")), &mut result);
        assert_eq!(result.other_args.get("path"), Some(&Value::from("-")));
        assert!(result.find("options.out.args.path"));
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut result = matched();
        result.main_args.insert("n".into(), Value::Int(5));
        run(SetDefault::arg("n", Value::Int(0)), &mut result);
        assert_eq!(result.main_args.get("n"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_unmatched_results_are_untouched() {
        let mut result = ParseResult::new("default.cmd", vec![], 0);
        run(SetDefault::arg("n", Value::Int(0)), &mut result);
        assert!(result.main_args.is_empty());
    }
}
