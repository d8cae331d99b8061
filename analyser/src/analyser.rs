//! The structural analyser.
//!
//! An [`Analyser`] owns the compiled, immutable form of one [`Command`]. Each
//! parse builds a fresh [`TokenCursor`] and per-scope [`Frame`]s, matches the
//! header, then walks the compiled tables:
//!
//! 1. a built-in option alias dispatches immediately;
//! 2. an exact alias resolves to an option list (tried in priority order
//!    with snapshot/restore backtracking), a `requires` sentence, or a nested
//!    subcommand scope;
//! 3. compact and foreign-separator options are tried by prefix;
//! 4. otherwise the scope's main args are analysed once;
//! 5. anything else ends the scope (subcommands) or is probed for a fuzzy
//!    suggestion (the root).
//!
//! Control transfer is explicit: every step returns `Result<_, Signal>`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use command_grammar_core::{
    Action, Arg, ArgValue, Args, ArgsMap, Command, CommandOption, KEY_ARG_PREFIX, KeywordVar,
    MultiBase, MultiVar, Multiplicity, NodeSpec, OptionResult, ParseError, ParseResult,
    ParsedArgs, PatternRegistry, SubcommandResult, Value, execute_behaviors, validate_command,
};
use tracing::debug;

use crate::compile::{Slot, SubAnalyser};
use crate::config::{NamespaceConfig, OptionNames};
use crate::container::{CursorConfig, TokenCursor};
use crate::error::Result;
use crate::handlers::{Builtin, BuiltinKind, Signal, classify, shortcut_request};
use crate::header::HeaderMatcher;
use crate::text::{best_match, levenshtein_norm, meets_threshold};

/// A parse stopped on a missing argument in interrupt mode.
///
/// Feed more units through [`Analyser::resume`] or
/// [`CommandManager::resume`](crate::CommandManager::resume).
#[derive(Debug, Clone, PartialEq)]
pub struct PausedParse {
    /// The filtered input consumed so far.
    pub input: Vec<Value>,
    /// The missing-argument error that paused the parse.
    pub cause: ParseError,
    /// What had matched before the pause.
    pub partial: ParseResult,
}

/// Outcome of one analyser run.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysed {
    Finished(ParseResult),
    /// A built-in option fired; the result is failed with a special-option
    /// or completion error.
    Dispatch(Builtin, ParseResult),
    Paused(PausedParse),
}

/// Per-scope mutable parse state.
#[derive(Debug, Default)]
struct Frame {
    main_args: Option<ArgsMap>,
    options: BTreeMap<String, OptionResult>,
    subcommands: BTreeMap<String, SubcommandResult>,
    /// `requires` words seen since the last matched node.
    sentences: Vec<String>,
}

/// A compiled command ready to parse input.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::{Analysed, Analyser};
/// use command_grammar_core::{Arg, Command, CommandOption, Value, builtin};
///
/// let cmd = Command::new("cmd")
///     .with_arg(Arg::new("foo", builtin::INTEGER.clone()))
///     .with_option(CommandOption::new("--bar"));
/// let analyser = Analyser::new(cmd).unwrap();
///
/// let Analysed::Finished(result) = analyser.parse(vec![Value::from("cmd 123 --bar")], false) else {
///     panic!("expected a finished parse");
/// };
/// assert!(result.matched);
/// assert_eq!(result.main_args.get("foo"), Some(&Value::Int(123)));
/// assert!(result.find("options.bar"));
/// ```
#[derive(Debug, Clone)]
pub struct Analyser {
    command: Command,
    path: String,
    root: SubAnalyser,
    header: HeaderMatcher,
    option_names: OptionNames,
    cursor_config: CursorConfig,
    separators: Vec<char>,
    fuzzy: bool,
    threshold: f64,
    raise_error: bool,
    message_cache: bool,
}

impl Analyser {
    /// Compiles `command` with default namespace settings.
    ///
    /// # Errors
    ///
    /// See [`Analyser::compile`].
    pub fn new(command: Command) -> Result<Self> {
        let namespace = NamespaceConfig::new(command.namespace.clone());
        Self::compile(command, &namespace)
    }

    /// Validates and compiles `command` under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Validation`](crate::ManagerError::Validation)
    /// for an invalid declaration and
    /// [`ManagerError::Pattern`](crate::ManagerError::Pattern) if the header
    /// does not compile.
    pub fn compile(command: Command, namespace: &NamespaceConfig) -> Result<Self> {
        if let Some(error) = validate_command(&command).into_iter().next() {
            return Err(error.into());
        }

        let fuzzy = command.meta.fuzzy_match || namespace.fuzzy_match;
        let separators = if command.separators.is_empty() {
            namespace.separators.clone()
        } else {
            command.separators.clone()
        };
        let header = HeaderMatcher::compile(
            &command,
            &namespace.headers,
            PatternRegistry::global(),
            fuzzy,
            namespace.fuzzy_threshold,
        )?;

        let spec = NodeSpec {
            name: command.name_text(),
            dest: command.name_text(),
            args: command.args.clone(),
            separators: separators.clone(),
            requires: Vec::new(),
            compact: false,
            help_text: command.meta.description.clone(),
            action: Action::default(),
        };
        let root = SubAnalyser::compile(&spec, &separators, &command.children);
        let cursor_config = CursorConfig {
            filter_out: namespace.filter_out.clone(),
            keep_crlf: command.meta.keep_crlf || namespace.keep_crlf,
            preprocessors: HashMap::new(),
        };

        debug!(command = %command.path(), slots = root.table.len(), "Compiled command");
        Ok(Self {
            path: command.path(),
            raise_error: command.meta.raise_error || namespace.raise_error,
            command,
            root,
            header,
            option_names: namespace.option_names.clone(),
            cursor_config,
            separators,
            fuzzy,
            threshold: namespace.fuzzy_threshold,
            message_cache: namespace.message_cache,
        })
    }

    /// Adds an input preprocessor for units of `kind`.
    pub fn with_preprocessor<F>(mut self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.cursor_config = self.cursor_config.with_preprocessor(kind, f);
        self
    }

    /// Registry key: `namespace.name`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn raises_errors(&self) -> bool {
        self.raise_error
    }

    pub fn caches_results(&self) -> bool {
        self.message_cache
    }

    pub fn separators(&self) -> &[char] {
        &self.separators
    }

    /// Builds the token cursor for `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyInput`] if nothing survives filtering.
    pub fn prepare(&self, input: Vec<Value>) -> std::result::Result<TokenCursor, ParseError> {
        TokenCursor::build(input, &self.cursor_config)
    }

    /// Parses `input`. With `interrupt`, a trailing missing argument pauses
    /// instead of failing.
    pub fn parse(&self, input: Vec<Value>, interrupt: bool) -> Analysed {
        match self.prepare(input) {
            Ok(cursor) => self.run(cursor, interrupt),
            Err(error) => {
                Analysed::Finished(ParseResult::new(&self.path, Vec::new(), 0).fail(error, Vec::new()))
            }
        }
    }

    /// Continues a paused parse with more input.
    pub fn resume(&self, paused: PausedParse, more: Vec<Value>) -> Analysed {
        let mut input = paused.input;
        input.extend(more);
        self.parse(input, true)
    }

    /// Parses from a prepared cursor.
    pub fn run(&self, mut cursor: TokenCursor, interrupt: bool) -> Analysed {
        let mut result = ParseResult::new(&self.path, cursor.origin().to_vec(), cursor.token());

        match self.header.match_head(&mut cursor, &self.separators) {
            Ok(head) => result.header = head,
            Err(signal) => {
                let residue = cursor.release(&self.separators, true);
                return self.conclude(result, signal, residue, false);
            }
        }

        let mut frame = Frame::default();
        let outcome = self.walk(&self.root, &mut cursor, &mut frame, &[], true);
        result.encapsulate(
            frame.main_args.unwrap_or_default(),
            frame.options,
            frame.subcommands,
        );
        match outcome {
            Ok(()) => {
                result.matched = true;
                execute_behaviors(&self.command.behaviors, &mut result);
                debug!(command = %self.path, matched = result.matched, "Parse finished");
                Analysed::Finished(result)
            }
            Err(signal) => {
                let residue = cursor.release(&self.separators, false);
                let pausable = interrupt && cursor.done();
                self.conclude(result, signal, residue, pausable)
            }
        }
    }

    fn conclude(&self, result: ParseResult, signal: Signal, residue: Vec<Value>, pausable: bool) -> Analysed {
        match signal {
            Signal::Dispatch(builtin) => {
                debug!(command = %self.path, builtin = ?builtin, "Built-in option dispatched");
                let error = match &builtin {
                    Builtin::Help => ParseError::SpecialOption("help".into()),
                    Builtin::Shortcut(_) => ParseError::SpecialOption("shortcut".into()),
                    Builtin::Completion(candidates) => ParseError::Completion(candidates.clone()),
                };
                Analysed::Dispatch(builtin, result.fail(error, residue))
            }
            Signal::Suggest(message) => {
                Analysed::Finished(result.fail(ParseError::FuzzyMatched(message), residue))
            }
            Signal::Unmatched(error @ ParseError::ArgumentMissing(_)) if pausable => {
                debug!(command = %self.path, cause = %error, "Parse paused");
                Analysed::Paused(PausedParse {
                    input: result.origin.clone(),
                    cause: error,
                    partial: result,
                })
            }
            Signal::Unmatched(error) => {
                debug!(command = %self.path, error = %error, "Parse failed");
                Analysed::Finished(result.fail(error, residue))
            }
        }
    }

    /// Scans one scope until its slot budget or the input runs out.
    fn walk(
        &self,
        scope: &SubAnalyser,
        cursor: &mut TokenCursor,
        frame: &mut Frame,
        ancestors: &[&SubAnalyser],
        root: bool,
    ) -> std::result::Result<(), Signal> {
        let chain = chain(ancestors, scope);
        let mut budget = scope.part_len;

        while !cursor.done() && (budget > 0 || repeats(scope, cursor, frame)) {
            let unit = cursor.popitem(&scope.separators, false);
            if let Some(text) = unit.as_str() {
                if let Some(kind) = classify(&self.option_names, text) {
                    cursor.popitem(&scope.separators, true);
                    return Err(Signal::Dispatch(self.builtin(kind, scope, cursor, frame)?));
                }
                match scope.table.get(text) {
                    Some(Slot::Options(list)) => {
                        if self.match_options(text, list, scope, cursor, frame, &chain)? {
                            budget = budget.saturating_sub(1);
                        }
                        continue;
                    }
                    Some(Slot::Sentence(word)) => {
                        cursor.popitem(&scope.separators, true);
                        frame.sentences.push(word.clone());
                        continue;
                    }
                    Some(Slot::Sub(sub)) if !frame.subcommands.contains_key(&sub.dest) => {
                        cursor.popitem(&scope.separators, true);
                        self.enter(sub, cursor, frame, &chain)?;
                        budget = budget.saturating_sub(1);
                        continue;
                    }
                    _ => {}
                }
                if let Some(consumed) = self.match_prefixed(text, scope, cursor, frame, &chain)? {
                    if consumed {
                        budget = budget.saturating_sub(1);
                    }
                    continue;
                }
            }

            if frame.main_args.is_none() && !scope.args.is_empty() {
                frame.main_args = Some(self.analyse_args(&scope.args, cursor, &chain)?);
                budget = budget.saturating_sub(1);
                continue;
            }
            if root {
                if let Some(text) = unit.as_str() {
                    self.probe(text, scope)?;
                }
            }
            break;
        }

        self.finish_scope(scope, cursor, frame, root)
    }

    fn finish_scope(
        &self,
        scope: &SubAnalyser,
        cursor: &TokenCursor,
        frame: &mut Frame,
        root: bool,
    ) -> std::result::Result<(), Signal> {
        if frame.main_args.is_none() && !scope.args.is_empty() {
            if scope.default_main_only {
                frame.main_args = Some(defaults(&scope.args));
            } else {
                let name = scope
                    .args
                    .required_names()
                    .first()
                    .map_or_else(|| scope.name.clone(), |n| (*n).to_string());
                return Err(ParseError::ArgumentMissing(name).into());
            }
        }

        if root && !cursor.done() {
            let rest = cursor.release(&scope.separators, false);
            let completion = rest
                .last()
                .and_then(Value::as_str)
                .is_some_and(|t| classify(&self.option_names, t) == Some(BuiltinKind::Completion));
            if completion {
                return Err(Signal::Dispatch(Builtin::Completion(candidates(scope, frame))));
            }
            let first = rest.first().map(Value::to_string).unwrap_or_default();
            return Err(ParseError::ParamsUnmatched(first).into());
        }
        Ok(())
    }

    fn builtin(
        &self,
        kind: BuiltinKind,
        scope: &SubAnalyser,
        cursor: &mut TokenCursor,
        frame: &Frame,
    ) -> std::result::Result<Builtin, Signal> {
        match kind {
            BuiltinKind::Help => Ok(Builtin::Help),
            BuiltinKind::Completion => Ok(Builtin::Completion(candidates(scope, frame))),
            BuiltinKind::Shortcut => {
                let rest = cursor.release(&scope.separators, false);
                cursor.consume_all();
                Ok(Builtin::Shortcut(shortcut_request(rest)?))
            }
        }
    }

    /// Suggests a close alias for an unrecognised root token.
    fn probe(&self, text: &str, scope: &SubAnalyser) -> std::result::Result<(), Signal> {
        if !self.fuzzy {
            return Ok(());
        }
        let mut keys: Vec<&str> = scope.table.keys().map(String::as_str).collect();
        keys.sort_unstable();
        match best_match(text, keys, self.threshold) {
            Some(candidate) => Err(Signal::Suggest(format!(
                "{text} is not matched. Do you mean \"{candidate}\"?"
            ))),
            None => Ok(()),
        }
    }

    fn enter(
        &self,
        sub: &SubAnalyser,
        cursor: &mut TokenCursor,
        frame: &mut Frame,
        chain: &[&SubAnalyser],
    ) -> std::result::Result<(), Signal> {
        if !sub.requires.is_empty() && sub.requires != frame.sentences {
            return Err(ParseError::ParamsUnmatched(sub.name.clone()).into());
        }
        frame.sentences.clear();

        let mut inner = Frame::default();
        self.walk(sub, cursor, &mut inner, chain, false)?;

        let existing = frame.subcommands.get(&sub.dest).map(|s| (&s.value, &s.args));
        let (value, args) = apply_action(&sub.action, &sub.args, existing, inner.main_args.unwrap_or_default());
        debug!(subcommand = %sub.dest, "Subcommand matched");
        frame.subcommands.insert(
            sub.dest.clone(),
            SubcommandResult {
                value,
                args,
                options: inner.options,
                subcommands: inner.subcommands,
            },
        );
        Ok(())
    }

    /// Tries every option sharing `alias`; returns whether a slot was used.
    fn match_options(
        &self,
        alias: &str,
        list: &[Arc<CommandOption>],
        scope: &SubAnalyser,
        cursor: &mut TokenCursor,
        frame: &mut Frame,
        chain: &[&SubAnalyser],
    ) -> std::result::Result<bool, Signal> {
        let snapshot = cursor.snapshot();
        let mut best: Option<(usize, Signal)> = None;

        for option in list {
            if !option.node.requires.is_empty() && option.node.requires != frame.sentences {
                continue;
            }
            cursor.restore(snapshot.clone());
            cursor.popitem(&scope.separators, true);
            match self.option_args(option, cursor, chain) {
                Ok(args) => {
                    frame.sentences.clear();
                    return Ok(commit_option(option, args, frame));
                }
                Err(signal @ (Signal::Dispatch(_) | Signal::Suggest(_))) => return Err(signal),
                Err(signal) => {
                    let remaining = cursor.release(&scope.separators, false).len();
                    debug!(
                        option = %option.node.dest,
                        remaining,
                        "Option candidate failed, backtracking"
                    );
                    if best.as_ref().is_none_or(|(r, _)| remaining < *r) {
                        best = Some((remaining, signal));
                    }
                }
            }
        }

        match best {
            // Input ran out inside the option: leave it consumed so the parse can pause.
            Some((0, signal @ Signal::Unmatched(ParseError::ArgumentMissing(_)))) => {
                cursor.consume_all();
                Err(signal)
            }
            Some((_, signal)) => {
                cursor.restore(snapshot);
                Err(signal)
            }
            None => {
                cursor.restore(snapshot);
                Err(ParseError::ParamsUnmatched(alias.to_string()).into())
            }
        }
    }

    /// Matches compact (`-p8080`) and foreign-separator (`--opt=v`) options.
    fn match_prefixed(
        &self,
        text: &str,
        scope: &SubAnalyser,
        cursor: &mut TokenCursor,
        frame: &mut Frame,
        chain: &[&SubAnalyser],
    ) -> std::result::Result<Option<bool>, Signal> {
        for option in &scope.prefixed {
            if option.node.args.is_empty()
                || (!option.node.requires.is_empty() && option.node.requires != frame.sentences)
            {
                continue;
            }
            for alias in &option.aliases {
                let Some(rest) = text.strip_prefix(alias.as_str()) else {
                    continue;
                };
                let rest = if option.node.compact {
                    rest
                } else {
                    match rest.strip_prefix(|c: char| option.node.separators.contains(&c)) {
                        Some(r) => r,
                        None => continue,
                    }
                };
                if rest.is_empty() {
                    continue;
                }

                let snapshot = cursor.snapshot();
                cursor.popitem(&scope.separators, true);
                cursor.pushback(Value::Str(rest.to_string()), true);
                match self.option_args(option, cursor, chain) {
                    Ok(args) => {
                        frame.sentences.clear();
                        return Ok(Some(commit_option(option, args, frame)));
                    }
                    Err(signal @ Signal::Dispatch(_)) => return Err(signal),
                    Err(_) => cursor.restore(snapshot),
                }
            }
        }
        Ok(None)
    }

    fn option_args(
        &self,
        option: &CommandOption,
        cursor: &mut TokenCursor,
        chain: &[&SubAnalyser],
    ) -> std::result::Result<ArgsMap, Signal> {
        if option.node.args.is_empty() {
            return Ok(ArgsMap::new());
        }
        self.analyse_args(&option.node.args, cursor, chain)
    }

    /// True if `unit` is an alias of any enclosing scope or a built-in option.
    fn is_stop(&self, unit: &Value, chain: &[&SubAnalyser]) -> bool {
        unit.as_str()
            .is_some_and(|t| self.option_names.contains(t) || chain.iter().any(|s| s.knows(t)))
    }

    /// Coerces `args` in declaration order.
    fn analyse_args(
        &self,
        args: &Args,
        cursor: &mut TokenCursor,
        chain: &[&SubAnalyser],
    ) -> std::result::Result<ArgsMap, Signal> {
        let decls: Vec<&Arg> = args.iter().collect();
        let mut out = ArgsMap::new();

        for (i, arg) in decls.iter().copied().enumerate() {
            match &arg.value {
                ArgValue::Multi(multi) => {
                    self.analyse_multi(arg, multi, &decls[i + 1..], cursor, chain, &mut out)?;
                    continue;
                }
                ArgValue::AllRemaining => {
                    let rest = cursor.release(&arg.separators, false);
                    cursor.consume_all();
                    out.insert(arg.name.clone(), Value::List(rest));
                    break;
                }
                _ => {}
            }

            let unit = cursor.popitem(&arg.separators, true);
            if unit.is_empty_text() || self.is_stop(&unit, chain) {
                cursor.pushback(unit, false);
                skip_or_fail(arg, ParseError::ArgumentMissing(arg.name.clone()), &mut out)?;
                continue;
            }

            let matched = match &arg.value {
                ArgValue::Pattern(pattern) => pattern.validate(&unit, None).into_value(),
                ArgValue::Literal(expected) => (unit == *expected).then(|| expected.clone()),
                ArgValue::Keyword(keyword) => self.keyword_value(arg, keyword, &unit)?,
                ArgValue::AllRemaining | ArgValue::Multi(_) => None,
            };
            match matched {
                Some(value) => {
                    out.insert(arg.name.clone(), value);
                }
                None => {
                    let shown = unit.to_string();
                    cursor.pushback(unit, false);
                    skip_or_fail(arg, ParseError::ParamsUnmatched(shown), &mut out)?;
                }
            }
        }

        out.retain(|name, _| !name.starts_with(KEY_ARG_PREFIX));
        Ok(out)
    }

    fn keyword_value(
        &self,
        arg: &Arg,
        keyword: &KeywordVar,
        unit: &Value,
    ) -> std::result::Result<Option<Value>, Signal> {
        let Some((key, raw)) = unit.as_str().and_then(|t| t.split_once(keyword.sep)) else {
            return Ok(None);
        };
        let key = key.trim_start_matches('-');
        if key == arg.name {
            return Ok(keyword
                .base
                .validate(&Value::Str(raw.to_string()), None)
                .into_value());
        }
        if self.fuzzy && meets_threshold(levenshtein_norm(key, &arg.name), self.threshold) {
            return Err(Signal::Suggest(format!(
                "{key} is not matched. Do you mean \"{}\"?",
                arg.name
            )));
        }
        Ok(None)
    }

    /// Greedy bounded run for a variadic arg.
    ///
    /// The run may take every remaining unit up to the first alias or
    /// keyword boundary, minus one unit per later required arg or `+`
    /// variadic, capped by the declared length.
    fn analyse_multi(
        &self,
        arg: &Arg,
        multi: &MultiVar,
        later: &[&Arg],
        cursor: &mut TokenCursor,
        chain: &[&SubAnalyser],
        out: &mut ArgsMap,
    ) -> std::result::Result<(), Signal> {
        let separators = &arg.separators;
        let available = cursor
            .release(separators, false)
            .iter()
            .take_while(|u| !self.is_stop(u, chain) && !is_keyword_boundary(u, later))
            .count();
        let reserved: usize = later.iter().map(|a| reserve(a)).sum();
        let mut budget = available.saturating_sub(reserved);
        if let Some(length) = multi.length {
            budget = budget.min(length);
        }

        let mut items = Vec::new();
        let mut pairs = BTreeMap::new();
        let mut consumed = 0;
        while consumed < budget {
            let unit = cursor.popitem(separators, true);
            if unit.is_empty_text() {
                break;
            }
            let accepted = match &multi.base {
                MultiBase::Pattern(pattern) => match pattern.validate(&unit, None).into_value() {
                    Some(value) => {
                        items.push(value);
                        true
                    }
                    None => false,
                },
                MultiBase::Keyword(keyword) => {
                    match unit.as_str().and_then(|t| t.split_once(keyword.sep)) {
                        Some((key, raw)) => {
                            match keyword.base.validate(&Value::Str(raw.to_string()), None).into_value() {
                                Some(value) => {
                                    pairs.insert(key.trim_start_matches('-').to_string(), value);
                                    true
                                }
                                None => false,
                            }
                        }
                        None => false,
                    }
                }
            };
            if !accepted {
                cursor.pushback(unit, false);
                break;
            }
            consumed += 1;
        }

        if consumed > 0 {
            let value = if multi.is_keyword() {
                Value::Map(pairs)
            } else {
                Value::List(items)
            };
            out.insert(arg.name.clone(), value);
            return Ok(());
        }
        if let Some(default) = arg.default_value() {
            out.insert(arg.name.clone(), default);
            return Ok(());
        }
        match multi.flag {
            Multiplicity::Star => {
                out.insert(arg.name.clone(), empty_collection(multi));
                Ok(())
            }
            Multiplicity::Plus => {
                let next = cursor.popitem(separators, false);
                let error = if next.is_empty_text() || self.is_stop(&next, chain) {
                    ParseError::ArgumentMissing(arg.name.clone())
                } else {
                    ParseError::ParamsUnmatched(next.to_string())
                };
                Err(error.into())
            }
        }
    }
}

fn chain<'a>(ancestors: &[&'a SubAnalyser], scope: &'a SubAnalyser) -> Vec<&'a SubAnalyser> {
    let mut chain = ancestors.to_vec();
    chain.push(scope);
    chain
}

/// True if the next unit repeats an already matched `Append`/`Count` option.
fn repeats(scope: &SubAnalyser, cursor: &mut TokenCursor, frame: &Frame) -> bool {
    let unit = cursor.popitem(&scope.separators, false);
    matches!(
        unit.as_str().and_then(|t| scope.table.get(t)),
        Some(Slot::Options(list)) if list
            .iter()
            .any(|o| o.node.action.is_repeatable() && frame.options.contains_key(&o.node.dest))
    )
}

fn empty_collection(multi: &MultiVar) -> Value {
    if multi.is_keyword() {
        Value::Map(BTreeMap::new())
    } else {
        Value::List(Vec::new())
    }
}

/// Units a later arg needs left over.
fn reserve(arg: &Arg) -> usize {
    match &arg.value {
        ArgValue::AllRemaining => 0,
        ArgValue::Multi(multi) if multi.flag == Multiplicity::Star => 0,
        _ if arg.is_skippable() => 0,
        _ => 1,
    }
}

/// True if `unit` starts a later keyword arg.
fn is_keyword_boundary(unit: &Value, later: &[&Arg]) -> bool {
    let Some(text) = unit.as_str() else {
        return false;
    };
    let bare = text.trim_start_matches('-');
    later.iter().any(|a| match &a.value {
        ArgValue::Keyword(keyword) => bare
            .split_once(keyword.sep)
            .is_some_and(|(key, _)| key == a.name),
        ArgValue::Multi(MultiVar {
            base: MultiBase::Keyword(keyword),
            ..
        }) => text.contains(keyword.sep),
        ArgValue::Pattern(_) => a.name.strip_prefix(KEY_ARG_PREFIX) == Some(bare),
        _ => false,
    })
}

fn skip_or_fail(arg: &Arg, error: ParseError, out: &mut ArgsMap) -> std::result::Result<(), Signal> {
    if let Some(default) = arg.default_value() {
        out.insert(arg.name.clone(), default);
        Ok(())
    } else if arg.flags.optional {
        Ok(())
    } else {
        Err(error.into())
    }
}

/// Defaults for main args that never appeared.
fn defaults(args: &Args) -> ArgsMap {
    let mut out = ArgsMap::new();
    for arg in args {
        if arg.is_synthetic() {
            continue;
        }
        if let Some(default) = arg.default_value() {
            out.insert(arg.name.clone(), default);
        } else if let ArgValue::Multi(multi) = &arg.value {
            if multi.flag == Multiplicity::Star {
                out.insert(arg.name.clone(), empty_collection(multi));
            }
        }
    }
    out
}

/// Records an option match; returns whether it used a slot.
fn commit_option(option: &CommandOption, args: ArgsMap, frame: &mut Frame) -> bool {
    let dest = &option.node.dest;
    let existing = frame.options.get(dest).map(|o| (&o.value, &o.args));
    let repeated = existing.is_some() && option.node.action.is_repeatable();
    let (value, args) = apply_action(&option.node.action, &option.node.args, existing, args);
    debug!(option = %dest, "Option matched");
    frame.options.insert(dest.clone(), OptionResult { value, args });
    !repeated
}

/// Applies a node action to freshly matched args.
fn apply_action(
    action: &Action,
    declared: &Args,
    existing: Option<(&Value, &ArgsMap)>,
    args: ArgsMap,
) -> (Value, ArgsMap) {
    match action {
        Action::Store(value) => (value.clone(), args),
        Action::StoreTrue => (Value::Bool(true), args),
        Action::StoreFalse => (Value::Bool(false), args),
        Action::Count => {
            let count = existing.and_then(|(v, _)| v.as_int()).unwrap_or(0);
            (Value::Int(count + 1), args)
        }
        Action::Append => {
            let mut occurrences = match existing {
                Some((Value::List(items), _)) => items.clone(),
                _ => Vec::new(),
            };
            occurrences.push(Value::Map(args.clone()));
            let mut merged = existing.map(|(_, a)| a.clone()).unwrap_or_default();
            for (name, value) in args {
                match merged.get_mut(&name) {
                    Some(Value::List(items)) => items.push(value),
                    _ => {
                        merged.insert(name, Value::List(vec![value]));
                    }
                }
            }
            (Value::List(occurrences), merged)
        }
        Action::Transform(transform) => {
            let parsed = ParsedArgs::split(declared, &args);
            match transform(&parsed) {
                Some(rewritten) => (Value::Null, rewritten),
                None => (Value::Null, args),
            }
        }
    }
}

/// Unused aliases and missing main args of `scope`.
fn candidates(scope: &SubAnalyser, frame: &Frame) -> Vec<String> {
    let mut out: Vec<String> = scope
        .table
        .iter()
        .filter(|(_, slot)| match slot {
            Slot::Options(list) => list.iter().all(|o| !frame.options.contains_key(&o.node.dest)),
            Slot::Sub(sub) => !frame.subcommands.contains_key(&sub.dest),
            Slot::Sentence(_) => true,
        })
        .map(|(alias, _)| alias.clone())
        .collect();
    if frame.main_args.is_none() {
        out.extend(scope.args.required_names().iter().map(|n| format!("<{n}>")));
    }
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_grammar_core::{Subcommand, builtin};

    fn finished(analysed: Analysed) -> ParseResult {
        match analysed {
            Analysed::Finished(result) => result,
            other => panic!("expected a finished parse, got {other:?}"),
        }
    }

    fn parse(cmd: Command, input: &str) -> ParseResult {
        finished(Analyser::new(cmd).unwrap().parse(vec![Value::from(input)], false))
    }

    #[test]
    fn test_keyword_args() {
        let cmd = Command::new("cmd")
            .with_arg(Arg::new("level", KeywordVar::new(builtin::INTEGER.clone())))
            .with_arg(Arg::new("name", builtin::STRING.clone()));
        let result = parse(cmd, "cmd level=3 x");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.main_args.get("level"), Some(&Value::Int(3)));
        assert_eq!(result.main_args.get("name"), Some(&Value::from("x")));
    }

    #[test]
    fn test_space_separated_keyword() {
        let cmd = Command::new("cmd").with_arg(Arg::new(
            "level",
            KeywordVar::new(builtin::INTEGER.clone()).with_sep(' '),
        ));
        let result = parse(cmd, "cmd --level 4");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.main_args.get("level"), Some(&Value::Int(4)));
        assert!(!result.main_args.contains_key("_key_level"));
    }

    #[test]
    fn test_multi_leaves_room_for_required_tail() {
        let cmd = Command::new("cp")
            .with_arg(Arg::new("src", MultiVar::plus(builtin::STRING.clone())))
            .with_arg(Arg::new("dest", builtin::STRING.clone()))
            .with_option(CommandOption::new("--force"));
        let result = parse(cmd, "cp a b c --force");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(
            result.main_args.get("src"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(result.main_args.get("dest"), Some(&Value::from("c")));
        assert!(result.find("options.force"));
    }

    #[test]
    fn test_multi_keyword_map() {
        let cmd = Command::new("env").with_arg(Arg::new(
            "vars",
            MultiVar::keywords(KeywordVar::new(builtin::ANY.clone())),
        ));
        let result = parse(cmd, "env a=1 b=2");
        assert!(result.matched, "{:?}", result.error_info);
        let Some(Value::Map(vars)) = result.main_args.get("vars") else {
            panic!("expected a map");
        };
        assert_eq!(vars.get("a"), Some(&Value::from("1")));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_all_remaining() {
        let cmd = Command::new("echo").with_arg(Arg::new("text", ArgValue::AllRemaining));
        let result = parse(cmd, "echo a b 'c d'");
        assert_eq!(
            result.main_args.get("text"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c d")]))
        );
    }

    #[test]
    fn test_compact_option() {
        let cmd = Command::new("serve").with_option(
            CommandOption::new("-p")
                .with_arg(Arg::new("port", builtin::INTEGER.clone()))
                .compact(),
        );
        let result = parse(cmd, "serve -p8080");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.other_args.get("port"), Some(&Value::Int(8080)));
    }

    #[test]
    fn test_foreign_separator_option() {
        let cmd = Command::new("run").with_option(
            CommandOption::new("--jobs")
                .with_arg(Arg::new("n", builtin::INTEGER.clone()))
                .with_separators(&['=']),
        );
        let result = parse(cmd, "run --jobs=4");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.query("jobs.n").unwrap().and_then(|q| q.as_value()), Some(&Value::Int(4)));
    }

    #[test]
    fn test_requires_words() {
        let cmd = Command::new("git")
            .with_option(CommandOption::new("remote add --force").with_arg(Arg::new("name", builtin::STRING.clone())));
        let result = parse(cmd, "git remote add --force origin");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(
            result.query("remote_add_force.name").unwrap().and_then(|q| q.as_value()),
            Some(&Value::from("origin"))
        );
    }

    #[test]
    fn test_count_and_append_actions() {
        let cmd = Command::new("cmd")
            .with_option(CommandOption::new("-v").with_action(Action::Count))
            .with_option(
                CommandOption::new("--tag")
                    .with_arg(Arg::new("t", builtin::STRING.clone()))
                    .with_action(Action::Append),
            );
        let result = parse(cmd, "cmd -v -v --tag a -v --tag b");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.options["v"].value, Value::Int(3));
        assert_eq!(
            result.options["tag"].args.get("t"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn test_transform_action() {
        let cmd = Command::new("cmd").with_option(
            CommandOption::new("--size")
                .with_arg(Arg::new("n", builtin::INTEGER.clone()))
                .with_action(Action::Transform(Arc::new(|parsed: &ParsedArgs| {
                    let n = parsed.values.get("n")?.as_int()?;
                    let mut out = ArgsMap::new();
                    out.insert("bytes".into(), Value::Int(n * 1024));
                    Some(out)
                }))),
        );
        let result = parse(cmd, "cmd --size 2");
        assert_eq!(result.options["size"].args.get("bytes"), Some(&Value::Int(2048)));
    }

    #[test]
    fn test_subcommand_returns_to_parent() {
        let cmd = Command::new("cmd")
            .with_subcommand(Subcommand::new("sub").with_arg(Arg::new("x", builtin::INTEGER.clone())))
            .with_option(CommandOption::new("--top"));
        let result = parse(cmd, "cmd sub 1 --top");
        assert!(result.matched, "{:?}", result.error_info);
        assert!(result.find("options.top"));
        assert_eq!(result.query("sub.x").unwrap().and_then(|q| q.as_value()), Some(&Value::Int(1)));
    }

    #[test]
    fn test_optional_and_default_main_args() {
        let cmd = Command::new("cmd")
            .with_arg(Arg::new("a;?", builtin::INTEGER.clone()))
            .with_arg(Arg::new("b", builtin::INTEGER.clone()).with_default(Value::Int(9)));
        let result = parse(cmd, "cmd");
        assert!(result.matched, "{:?}", result.error_info);
        assert_eq!(result.main_args.get("b"), Some(&Value::Int(9)));
        assert!(!result.main_args.contains_key("a"));
    }

    #[test]
    fn test_leftover_is_params_unmatched() {
        let cmd = Command::new("cmd").with_arg(Arg::new("a", builtin::INTEGER.clone()));
        let result = parse(cmd, "cmd 1 extra");
        assert!(!result.matched);
        assert_eq!(result.error_info, Some(ParseError::ParamsUnmatched("extra".into())));
        assert_eq!(result.error_data, [Value::from("extra")]);
    }

    #[test]
    fn test_type_mismatch() {
        let cmd = Command::new("cmd").with_arg(Arg::new("a", builtin::INTEGER.clone()));
        let result = parse(cmd, "cmd abc");
        assert_eq!(result.error_info, Some(ParseError::ParamsUnmatched("abc".into())));
    }

    #[test]
    fn test_help_dispatch() {
        let cmd = Command::new("cmd").with_arg(Arg::new("a", builtin::INTEGER.clone()));
        let analysed = Analyser::new(cmd).unwrap().parse(vec![Value::from("cmd --help")], false);
        let Analysed::Dispatch(Builtin::Help, result) = analysed else {
            panic!("expected help dispatch");
        };
        assert_eq!(result.error_info, Some(ParseError::SpecialOption("help".into())));
    }

    #[test]
    fn test_completion_candidates() {
        let cmd = Command::new("cmd")
            .with_arg(Arg::new("a", builtin::INTEGER.clone()))
            .with_option(CommandOption::new("--bar"))
            .with_subcommand(Subcommand::new("sub"));
        let analysed = Analyser::new(cmd).unwrap().parse(vec![Value::from("cmd --comp")], false);
        let Analysed::Dispatch(Builtin::Completion(cands), _) = analysed else {
            panic!("expected completion dispatch");
        };
        assert_eq!(cands, ["--bar", "<a>", "sub"]);
    }

    #[test]
    fn test_interrupt_pauses_and_resumes() {
        let cmd = Command::new("cmd").with_arg(Arg::new("a", builtin::INTEGER.clone()));
        let analyser = Analyser::new(cmd).unwrap();
        let Analysed::Paused(paused) = analyser.parse(vec![Value::from("cmd")], true) else {
            panic!("expected pause");
        };
        assert_eq!(paused.cause, ParseError::ArgumentMissing("a".into()));
        let result = finished(analyser.resume(paused, vec![Value::from("5")]));
        assert_eq!(result.main_args.get("a"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_root_fuzzy_probe() {
        let cmd = Command::new("cmd").with_option(CommandOption::new("--verbose")).fuzzy();
        let result = parse(cmd, "cmd --verbos");
        assert!(matches!(
            result.error_info,
            Some(ParseError::FuzzyMatched(ref m)) if m.contains("--verbose")
        ));
    }

    #[test]
    fn test_literal_arg() {
        let cmd = Command::new("cmd").with_arg(Arg::new("mode", Value::from("fast")));
        assert!(parse(cmd.clone(), "cmd fast").matched);
        assert!(!parse(cmd, "cmd slow").matched);
    }
}
