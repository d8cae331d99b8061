//! Output sinks and help rendering.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use command_grammar_core::{Args, Command, Node};
use tracing::info;

/// Receives user-facing text: help, completion candidates, suggestions.
pub trait OutputSink: Send + Sync {
    fn send(&self, command: &str, text: &str);
}

/// Emits messages through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn send(&self, command: &str, text: &str) {
        info!(command = %command, "{text}");
    }
}

/// Collects messages in memory. Clones share the buffer.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::{MemorySink, OutputSink};
///
/// let sink = MemorySink::default();
/// sink.clone().send("default.cmd", "hello");
/// assert_eq!(sink.messages(), [("default.cmd".to_string(), "hello".to_string())]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemorySink {
    /// `(command, text)` pairs in send order.
    pub fn messages(&self) -> Vec<(String, String)> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<String> {
        self.messages().pop().map(|(_, text)| text)
    }
}

impl OutputSink for MemorySink {
    fn send(&self, command: &str, text: &str) {
        let mut guard = match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((command.to_string(), text.to_string()));
    }
}

/// Formats the help text of a command.
pub trait HelpRenderer: Send + Sync {
    fn render(&self, command: &Command) -> String;
}

/// Plain outline: usage line, description, then indented options and
/// subcommands.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineRenderer;

impl HelpRenderer for OutlineRenderer {
    fn render(&self, command: &Command) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}{}", command.name_text(), signature(&command.args));
        if !command.meta.description.is_empty() {
            let _ = writeln!(out, "{}", command.meta.description);
        }
        if let Some(usage) = &command.meta.usage {
            let _ = writeln!(out, "Usage: {usage}");
        }
        render_children(&mut out, &command.children, 1);
        for example in &command.meta.examples {
            let _ = writeln!(out, "e.g. {example}");
        }
        out.trim_end().to_string()
    }
}

fn signature(args: &Args) -> String {
    args.iter()
        .filter(|a| !a.flags.hidden)
        .map(|a| format!(" {a}"))
        .collect()
}

fn render_children(out: &mut String, children: &[Node], depth: usize) {
    let indent = "  ".repeat(depth);
    for child in children {
        let spec = child.spec();
        let mut head = child.aliases().join("|");
        if !spec.requires.is_empty() {
            head = format!("{} {head}", spec.requires.join(" "));
        }
        let _ = write!(out, "{indent}{head}{}", signature(&spec.args));
        if !spec.help_text.is_empty() {
            let _ = write!(out, "  {}", spec.help_text);
        }
        out.push('\n');
        if let Node::Subcommand(sub) = child {
            render_children(out, &sub.children, depth + 1);
        }
    }
}
