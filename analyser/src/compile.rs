//! Grammar compilation into immutable per-scope lookup tables.

use std::collections::HashMap;
use std::sync::Arc;

use command_grammar_core::{Action, Args, CommandOption, Node, NodeSpec};

/// What a token resolves to inside one scope.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// Options sharing the alias, in trial order.
    Options(Vec<Arc<CommandOption>>),
    /// A bare `requires` word.
    Sentence(String),
    Sub(Arc<SubAnalyser>),
}

/// Compiled form of a command or subcommand body.
#[derive(Debug, Clone)]
pub(crate) struct SubAnalyser {
    pub name: String,
    pub dest: String,
    pub args: Args,
    pub separators: Vec<char>,
    pub action: Action,
    pub requires: Vec<String>,
    pub table: HashMap<String, Slot>,
    /// Options matched by prefix: compact ones and those with foreign separators.
    pub prefixed: Vec<Arc<CommandOption>>,
    /// Upper bound on matched slots per scan.
    pub part_len: usize,
    /// Every main arg may be absent, so missing main args resolve to defaults.
    pub default_main_only: bool,
}

fn priority_key(option: &CommandOption) -> (i32, std::cmp::Reverse<usize>) {
    let longest = option.aliases.first().map_or(0, String::len);
    (option.priority, std::cmp::Reverse(longest))
}

impl SubAnalyser {
    /// Compiles a scope from its node spec and children.
    ///
    /// Arguments whose separators are the default single space take the
    /// scope's separators instead.
    pub(crate) fn compile(spec: &NodeSpec, separators: &[char], children: &[Node]) -> Self {
        let args = if separators == [' '] {
            spec.args.clone()
        } else {
            spec.args.clone().separate(separators)
        };

        let mut table: HashMap<String, Slot> = HashMap::new();
        let mut prefixed = Vec::new();
        for child in children {
            for word in &child.spec().requires {
                table
                    .entry(word.clone())
                    .or_insert_with(|| Slot::Sentence(word.clone()));
            }
            match child {
                Node::Option(option) => {
                    let option = Arc::new(option.clone());
                    let foreign = !option.node.separators.iter().all(|s| separators.contains(s));
                    if option.node.compact || foreign {
                        prefixed.push(Arc::clone(&option));
                    }
                    for alias in &option.aliases {
                        match table.get_mut(alias) {
                            Some(Slot::Options(list)) => list.push(Arc::clone(&option)),
                            _ => {
                                table.insert(alias.clone(), Slot::Options(vec![Arc::clone(&option)]));
                            }
                        }
                    }
                }
                Node::Subcommand(sub) => {
                    let sub_separators = if sub.node.separators == [' '] {
                        separators.to_vec()
                    } else {
                        sub.node.separators.clone()
                    };
                    let compiled = Arc::new(SubAnalyser::compile(&sub.node, &sub_separators, &sub.children));
                    for alias in &sub.aliases {
                        table.insert(alias.clone(), Slot::Sub(Arc::clone(&compiled)));
                    }
                }
            }
        }

        for slot in table.values_mut() {
            if let Slot::Options(list) = slot {
                list.sort_by_key(|o| priority_key(o));
            }
        }
        prefixed.sort_by_key(|o| priority_key(o));

        let part_len = children.len() + usize::from(!args.is_empty());
        Self {
            name: spec.name.clone(),
            dest: spec.dest.clone(),
            default_main_only: args.all_skippable(),
            args,
            separators: separators.to_vec(),
            action: spec.action.clone(),
            requires: spec.requires.clone(),
            table,
            prefixed,
            part_len,
        }
    }

    /// True if `text` is an alias or `requires` word of this scope.
    pub(crate) fn knows(&self, text: &str) -> bool {
        self.table.contains_key(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_grammar_core::{Arg, Subcommand, builtin};

    fn root(children: Vec<Node>, args: Args) -> SubAnalyser {
        let mut spec = Subcommand::new("cmd").node;
        spec.args = args;
        SubAnalyser::compile(&spec, &[' '], &children)
    }

    #[test]
    fn test_options_sorted_by_priority_then_alias_length() {
        let a = CommandOption::new("--foo").with_priority(1).with_dest("a");
        let b = CommandOption::new("--foo|-f").with_dest("b");
        let c = CommandOption::new("--foo").with_dest("c");
        let scope = root(
            vec![Node::Option(a), Node::Option(b), Node::Option(c)],
            Args::new(),
        );
        let Some(Slot::Options(list)) = scope.table.get("--foo") else {
            panic!("expected options");
        };
        let dests: Vec<&str> = list.iter().map(|o| o.node.dest.as_str()).collect();
        assert_eq!(dests, ["b", "c", "a"]);
        assert!(matches!(scope.table.get("-f"), Some(Slot::Options(l)) if l.len() == 1));
    }

    #[test]
    fn test_requires_become_sentences() {
        let opt = CommandOption::new("remote add --force");
        let scope = root(vec![Node::Option(opt)], Args::new());
        assert!(matches!(scope.table.get("remote"), Some(Slot::Sentence(_))));
        assert!(matches!(scope.table.get("add"), Some(Slot::Sentence(_))));
        assert!(scope.knows("--force"));
    }

    #[test]
    fn test_prefixed_and_part_len() {
        let port = CommandOption::new("-p")
            .with_arg(Arg::new("port", builtin::INTEGER.clone()))
            .compact();
        let level = CommandOption::new("--level").with_separators(&['=']);
        let sub = Subcommand::new("sub");
        let scope = root(
            vec![Node::Option(port), Node::Option(level), Node::Subcommand(sub)],
            Args::new().with(Arg::new("x", builtin::INTEGER.clone())),
        );
        assert_eq!(scope.prefixed.len(), 2);
        assert_eq!(scope.part_len, 4);
        assert!(!scope.default_main_only);
        assert!(matches!(scope.table.get("sub"), Some(Slot::Sub(_))));
    }
}
