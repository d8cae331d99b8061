//! Command registry, result cache and shortcut store.
//!
//! The [`CommandManager`] owns compiled [`Analyser`]s keyed by
//! `namespace.name`, caches matched results by `(path, content hash)` in an
//! LRU, and resolves shortcuts when an input's header does not match. The
//! shortcut store is a second LRU bounded by `shortcut_max_count`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use command_grammar_core::{Command, ParseError, ParseResult, Value};
use lru::LruCache;
use tracing::{debug, info};

use crate::analyser::{Analysed, Analyser, PausedParse};
use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::handlers::{Builtin, ShortcutRequest};
use crate::output::{HelpRenderer, LogSink, OutlineRenderer, OutputSink};
use crate::shortcut::{ShortcutEntry, ShortcutTarget, ShortcutTemplate, expand};
use crate::text::split;

/// Result of a managed parse.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Parsed(Arc<ParseResult>),
    /// Waiting for more input; see [`CommandManager::resume`].
    Paused(PausedParse),
}

impl Outcome {
    /// The result, if the parse did not pause.
    pub fn result(&self) -> Option<&Arc<ParseResult>> {
        match self {
            Outcome::Parsed(result) => Some(result),
            Outcome::Paused(_) => None,
        }
    }
}

fn shortcut_slot(path: &str, key: &str) -> String {
    format!("{path}::{key}")
}

/// Registry of compiled commands.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::{CommandManager, ManagerConfig};
/// use command_grammar_core::{Arg, Command, Value, builtin};
///
/// let mut manager = CommandManager::new(ManagerConfig::default());
/// let path = manager
///     .register(Command::new("echo").with_arg(Arg::new("n", builtin::INTEGER.clone())))
///     .unwrap();
/// assert_eq!(path, "default.echo");
///
/// let result = manager.parse(&path, vec![Value::from("echo 3")]).unwrap();
/// assert_eq!(result.main_args.get("n"), Some(&Value::Int(3)));
/// ```
pub struct CommandManager {
    config: ManagerConfig,
    commands: BTreeMap<String, Arc<Analyser>>,
    disabled: HashSet<String>,
    records: LruCache<(String, u64), Arc<ParseResult>>,
    latest: HashMap<String, Arc<ParseResult>>,
    shortcuts: LruCache<String, ShortcutEntry>,
    sink: Box<dyn OutputSink>,
    renderer: Box<dyn HelpRenderer>,
}

impl CommandManager {
    pub fn new(config: ManagerConfig) -> Self {
        let records = NonZeroUsize::new(config.message_max_count).unwrap_or(NonZeroUsize::MIN);
        let shortcuts = NonZeroUsize::new(config.shortcut_max_count).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            commands: BTreeMap::new(),
            disabled: HashSet::new(),
            records: LruCache::new(records),
            latest: HashMap::new(),
            shortcuts: LruCache::new(shortcuts),
            sink: Box::new(LogSink),
            renderer: Box::new(OutlineRenderer),
        }
    }

    pub fn with_sink(mut self, sink: impl OutputSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_renderer(mut self, renderer: impl HelpRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Compiles and registers `command` under its namespace settings.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CapacityExceeded`] when the registry is full,
    /// [`ManagerError::DuplicateCommand`] if the path is taken, or a
    /// validation / pattern error from compilation.
    pub fn register(&mut self, command: Command) -> Result<String> {
        self.ensure_capacity()?;
        let namespace = self.config.namespace(&command.namespace);
        let analyser = Analyser::compile(command, &namespace)?;
        self.register_analyser(analyser)
    }

    /// Registers an already compiled analyser.
    ///
    /// # Errors
    ///
    /// See [`CommandManager::register`].
    pub fn register_analyser(&mut self, analyser: Analyser) -> Result<String> {
        self.ensure_capacity()?;
        let path = analyser.path().to_string();
        if self.commands.contains_key(&path) {
            return Err(ManagerError::DuplicateCommand(path));
        }
        info!(command = %path, "Command registered");
        self.commands.insert(path.clone(), Arc::new(analyser));
        Ok(path)
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.commands.len() >= self.config.command_max_count {
            return Err(ManagerError::CapacityExceeded(self.config.command_max_count));
        }
        Ok(())
    }

    /// Removes a command with its cached results and shortcuts.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CommandNotFound`] for an unknown path.
    pub fn unregister(&mut self, path: &str) -> Result<()> {
        if self.commands.remove(path).is_none() {
            return Err(ManagerError::CommandNotFound(path.to_string()));
        }
        self.disabled.remove(path);
        self.latest.remove(path);
        let stale: Vec<(String, u64)> = self
            .records
            .iter()
            .filter(|((p, _), _)| p == path)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            self.records.pop(&key);
        }
        let prefix = shortcut_slot(path, "");
        let slots: Vec<String> = self
            .shortcuts
            .iter()
            .filter(|(slot, _)| slot.starts_with(&prefix))
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in slots {
            self.shortcuts.pop(&slot);
        }
        info!(command = %path, "Command unregistered");
        Ok(())
    }

    /// Rejects parses for `path` until re-enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CommandNotFound`] for an unknown path.
    pub fn disable(&mut self, path: &str) -> Result<()> {
        self.require(path)?;
        self.disabled.insert(path.to_string());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ManagerError::CommandNotFound`] for an unknown path.
    pub fn enable(&mut self, path: &str) -> Result<()> {
        self.require(path)?;
        self.disabled.remove(path);
        Ok(())
    }

    pub fn is_enabled(&self, path: &str) -> bool {
        self.commands.contains_key(path) && !self.disabled.contains(path)
    }

    pub fn get(&self, path: &str) -> Option<Arc<Analyser>> {
        self.commands.get(path).cloned()
    }

    /// Registered paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Number of cached results.
    pub fn cached(&self) -> usize {
        self.records.len()
    }

    pub fn clear_cache(&mut self) {
        self.records.clear();
    }

    /// The most recent matched result for `path`.
    pub fn latest(&self, path: &str) -> Option<Arc<ParseResult>> {
        self.latest.get(path).cloned()
    }

    fn require(&self, path: &str) -> Result<Arc<Analyser>> {
        self.commands
            .get(path)
            .cloned()
            .ok_or_else(|| ManagerError::CommandNotFound(path.to_string()))
    }

    fn enabled(&self, path: &str) -> Result<Arc<Analyser>> {
        let analyser = self.require(path)?;
        if self.disabled.contains(path) {
            return Err(ManagerError::CommandDisabled(path.to_string()));
        }
        Ok(analyser)
    }

    /// Parses `input` with the command at `path`.
    ///
    /// Repeated input with the same content returns the same cached result.
    /// Input whose header does not match is looked up as a shortcut key.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CommandNotFound`] / [`ManagerError::CommandDisabled`]
    /// for an unusable path, and [`ManagerError::Parse`] for a failed parse
    /// when the command or its namespace raises errors.
    pub fn parse(&mut self, path: &str, input: Vec<Value>) -> Result<Arc<ParseResult>> {
        match self.run(path, input, false, true)? {
            Outcome::Parsed(result) => Ok(result),
            Outcome::Paused(paused) => Ok(Arc::new(paused.partial)),
        }
    }

    /// Like [`CommandManager::parse`], but a trailing missing argument
    /// pauses the parse.
    ///
    /// # Errors
    ///
    /// See [`CommandManager::parse`].
    pub fn parse_interactive(&mut self, path: &str, input: Vec<Value>) -> Result<Outcome> {
        self.run(path, input, true, true)
    }

    /// Continues a paused parse with more input.
    ///
    /// # Errors
    ///
    /// See [`CommandManager::parse`].
    pub fn resume(&mut self, paused: PausedParse, more: Vec<Value>) -> Result<Outcome> {
        let path = paused.partial.source.clone();
        let mut input = paused.input;
        input.extend(more);
        self.run(&path, input, true, true)
    }

    /// Parses `input` against every enabled command and returns the first
    /// match.
    pub fn broadcast(&mut self, input: &[Value]) -> Option<Arc<ParseResult>> {
        let paths: Vec<String> = self
            .commands
            .keys()
            .filter(|p| !self.disabled.contains(*p))
            .cloned()
            .collect();
        for path in paths {
            if let Ok(Outcome::Parsed(result)) = self.run(&path, input.to_vec(), false, false) {
                if result.matched {
                    return Some(result);
                }
            }
        }
        None
    }

    fn run(&mut self, path: &str, input: Vec<Value>, interrupt: bool, shortcuts: bool) -> Result<Outcome> {
        let analyser = self.enabled(path)?;
        let cursor = match analyser.prepare(input.clone()) {
            Ok(cursor) => cursor,
            Err(error) => {
                let result = ParseResult::new(path, Vec::new(), 0).fail(error, Vec::new());
                return self.finish(&analyser, result);
            }
        };

        let key = (path.to_string(), cursor.token());
        if analyser.caches_results() {
            if let Some(hit) = self.records.get(&key) {
                debug!(command = %path, token = key.1, "Result cache hit");
                let hit = Arc::clone(hit);
                self.latest.insert(path.to_string(), Arc::clone(&hit));
                return Ok(Outcome::Parsed(hit));
            }
        }

        match analyser.run(cursor, interrupt) {
            Analysed::Paused(paused) => Ok(Outcome::Paused(paused)),
            Analysed::Dispatch(builtin, result) => {
                self.dispatch(&analyser, builtin)?;
                self.finish(&analyser, result)
            }
            Analysed::Finished(result) if result.matched => {
                let shared = Arc::new(result);
                if analyser.caches_results() {
                    self.records.put(key, Arc::clone(&shared));
                }
                self.latest.insert(path.to_string(), Arc::clone(&shared));
                Ok(Outcome::Parsed(shared))
            }
            Analysed::Finished(result) => {
                if shortcuts && matches!(result.error_info, Some(ParseError::HeaderUnmatched(_))) {
                    if let Some(outcome) = self.try_shortcut(&analyser, &input, interrupt)? {
                        return Ok(outcome);
                    }
                }
                if let Some(ParseError::FuzzyMatched(message)) = &result.error_info {
                    self.sink.send(path, message);
                }
                self.finish(&analyser, result)
            }
        }
    }

    fn finish(&self, analyser: &Analyser, result: ParseResult) -> Result<Outcome> {
        if analyser.raises_errors() {
            if let Some(error) = &result.error_info {
                return Err(ManagerError::Parse(error.clone()));
            }
        }
        Ok(Outcome::Parsed(Arc::new(result)))
    }

    fn dispatch(&mut self, analyser: &Analyser, builtin: Builtin) -> Result<()> {
        let path = analyser.path();
        match builtin {
            Builtin::Help => {
                let text = self.renderer.render(analyser.command());
                self.sink.send(path, &text);
            }
            Builtin::Completion(candidates) => {
                self.sink.send(path, &candidates.join("\n"));
            }
            Builtin::Shortcut(ShortcutRequest::Define { key, template }) => {
                let target = match template {
                    Some(units) => ShortcutTarget::Template(ShortcutTemplate::new(units)),
                    None => match self.latest.get(path) {
                        Some(result) => ShortcutTarget::Replay(ParseResult::clone(result)),
                        None => {
                            self.sink.send(path, "no previous result to bind the shortcut to");
                            return Ok(());
                        }
                    },
                };
                self.define_shortcut(path, &key, target, false)?;
                self.sink.send(path, &format!("shortcut {key} saved"));
            }
            Builtin::Shortcut(ShortcutRequest::Delete(key)) => {
                let message = match self.delete_shortcut(path, &key) {
                    Ok(()) => format!("shortcut {key} deleted"),
                    Err(error) => error.to_string(),
                };
                self.sink.send(path, &message);
            }
        }
        Ok(())
    }

    /// Resolves the first input piece as a shortcut key.
    fn try_shortcut(&mut self, analyser: &Analyser, input: &[Value], interrupt: bool) -> Result<Option<Outcome>> {
        let mut pieces = Vec::new();
        for unit in input {
            match unit.as_str() {
                Some(text) => pieces.extend(split(text, analyser.separators(), false).into_iter().map(Value::Str)),
                None => pieces.push(unit.clone()),
            }
        }
        let Some(key) = pieces.first().and_then(Value::as_str) else {
            return Ok(None);
        };
        let Ok((entry, captures)) = self.find_shortcut(analyser.path(), key) else {
            return Ok(None);
        };
        self.apply_shortcut(analyser.path(), &entry, &captures, &pieces[1..], interrupt)
            .map(Some)
    }

    fn apply_shortcut(
        &mut self,
        path: &str,
        entry: &ShortcutEntry,
        captures: &[(String, String)],
        extra: &[Value],
        interrupt: bool,
    ) -> Result<Outcome> {
        debug!(command = %path, shortcut = %entry.key, extra = extra.len(), "Shortcut matched");
        match &entry.target {
            ShortcutTarget::Replay(stored) if extra.is_empty() => Ok(Outcome::Parsed(Arc::new(stored.clone()))),
            ShortcutTarget::Replay(stored) => {
                let mut units = stored.origin.clone();
                units.extend_from_slice(extra);
                self.run(path, units, interrupt, false)
            }
            ShortcutTarget::Template(template) => {
                let units = expand(template, extra, captures);
                self.run(path, units, interrupt, false)
            }
        }
    }

    /// Stores a shortcut for the command at `path`, replacing any entry with
    /// the same key. A full store drops its least recently used entry.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CommandNotFound`] for an unknown path and
    /// [`ManagerError::Pattern`] for an invalid regex key.
    pub fn define_shortcut(&mut self, path: &str, key: &str, target: ShortcutTarget, regex: bool) -> Result<()> {
        self.require(path)?;
        let entry = ShortcutEntry::new(key, target, regex)?;
        info!(command = %path, shortcut = %key, regex, "Shortcut defined");
        let slot = shortcut_slot(path, key);
        if let Some((evicted, _)) = self.shortcuts.push(slot.clone(), entry) {
            if evicted != slot {
                debug!(shortcut = %evicted, "Shortcut evicted");
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ManagerError::ShortcutNotFound`] if no entry has `key`.
    pub fn delete_shortcut(&mut self, path: &str, key: &str) -> Result<()> {
        self.shortcuts
            .pop(&shortcut_slot(path, key))
            .map(|_| ())
            .ok_or_else(|| ManagerError::ShortcutNotFound(key.to_string()))
    }

    /// Finds the entry for `key`: an exact literal key first, then the most
    /// recently used regex key that matches. Returns the entry with its
    /// captures and marks it as used.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ShortcutNotFound`] if nothing matches.
    pub fn find_shortcut(&mut self, path: &str, key: &str) -> Result<(ShortcutEntry, Vec<(String, String)>)> {
        if let Some(entry) = self.shortcuts.get(&shortcut_slot(path, key)) {
            if !entry.regex {
                return Ok((entry.clone(), Vec::new()));
            }
        }
        let prefix = shortcut_slot(path, "");
        let (slot, found) = self
            .shortcuts
            .iter()
            .filter(|(slot, entry)| entry.regex && slot.starts_with(&prefix))
            .find_map(|(slot, entry)| entry.captures(key).map(|caps| (slot.clone(), (entry.clone(), caps))))
            .ok_or_else(|| ManagerError::ShortcutNotFound(key.to_string()))?;
        self.shortcuts.promote(&slot);
        Ok(found)
    }

    /// Expands the shortcut `key` with `extra` units and parses the result.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ShortcutNotFound`] for an unknown key, plus
    /// the errors of [`CommandManager::parse`].
    pub fn invoke_shortcut(&mut self, path: &str, key: &str, extra: &[Value]) -> Result<Arc<ParseResult>> {
        let (entry, captures) = self.find_shortcut(path, key)?;
        match self.apply_shortcut(path, &entry, &captures, extra, false)? {
            Outcome::Parsed(result) => Ok(result),
            Outcome::Paused(paused) => Ok(Arc::new(paused.partial)),
        }
    }

    /// Shortcut keys of `path` in sorted order.
    pub fn shortcuts(&self, path: &str) -> Vec<&str> {
        let prefix = shortcut_slot(path, "");
        let mut keys: Vec<&str> = self
            .shortcuts
            .iter()
            .filter(|(slot, _)| slot.starts_with(&prefix))
            .map(|(_, entry)| entry.key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Writes all shortcuts to a JSON file, least recently used first.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Io`] or [`ManagerError::Json`].
    pub fn save_shortcuts(&self, file: impl AsRef<Path>) -> Result<()> {
        let entries: Vec<(&String, &ShortcutEntry)> = self.shortcuts.iter().rev().collect();
        let writer = BufWriter::new(std::fs::File::create(file)?);
        serde_json::to_writer_pretty(writer, &entries)?;
        Ok(())
    }

    /// Loads shortcuts from a JSON file written by
    /// [`CommandManager::save_shortcuts`], merging over existing entries in
    /// their saved order. Returns how many entries were loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Io`], [`ManagerError::Json`], or
    /// [`ManagerError::Pattern`] for a stored regex key that no longer
    /// compiles.
    pub fn load_shortcuts(&mut self, file: impl AsRef<Path>) -> Result<usize> {
        let reader = BufReader::new(std::fs::File::open(file)?);
        let loaded: Vec<(String, ShortcutEntry)> = serde_json::from_reader(reader)?;
        let count = loaded.len();
        for (slot, mut entry) in loaded {
            entry.compile()?;
            self.shortcuts.put(slot, entry);
        }
        info!(count, "Shortcuts loaded");
        Ok(count)
    }
}
