//! Manager and namespace configuration.
//!
//! Defines the serde configuration that controls registry capacity, the
//! result cache, and per-namespace parsing defaults (headers, separators,
//! fuzzy matching, built-in option names).
//!
//! # Example YAML
//!
//! ```yaml
//! command_max_count: 50
//! message_max_count: 20
//! default_namespace: default
//! namespaces:
//!   - name: chat
//!     headers: ["/", "!"]
//!     fuzzy_match: true
//!     fuzzy_threshold: 0.7
//!     option_names:
//!       help: ["--help", "-h", "帮助"]
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Names of the built-in options injected into every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionNames {
    pub help: Vec<String>,
    pub shortcut: Vec<String>,
    pub completion: Vec<String>,
}

impl Default for OptionNames {
    fn default() -> Self {
        Self {
            help: vec!["--help".into(), "-h".into()],
            shortcut: vec!["--shortcut".into(), "-s".into()],
            completion: vec!["--comp".into(), "-c".into()],
        }
    }
}

impl OptionNames {
    /// Returns `true` if `text` names any built-in option.
    pub fn contains(&self, text: &str) -> bool {
        self.help
            .iter()
            .chain(&self.shortcut)
            .chain(&self.completion)
            .any(|n| n == text)
    }
}

/// Parsing defaults shared by the commands of one namespace.
///
/// # Examples
///
/// ```
/// # use command_grammar_analyser::NamespaceConfig;
/// let ns = NamespaceConfig::new("chat").with_headers(&["/"]).fuzzy();
/// assert_eq!(ns.name, "chat");
/// assert_eq!(ns.fuzzy_threshold, 0.6);
/// assert!(ns.fuzzy_match);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub name: String,
    /// Text prefixes used by commands that declare no headers.
    pub headers: Vec<String>,
    /// Separators used by commands that declare none.
    pub separators: Vec<char>,
    pub fuzzy_match: bool,
    /// Minimum normalized similarity for a fuzzy suggestion.
    pub fuzzy_threshold: f64,
    /// Return failures as errors instead of unmatched results.
    pub raise_error: bool,
    pub option_names: OptionNames,
    /// Cache matched results by input content hash.
    pub message_cache: bool,
    pub keep_crlf: bool,
    /// Input element kinds dropped before parsing.
    pub filter_out: Vec<String>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            name: command_grammar_core::DEFAULT_NAMESPACE.to_string(),
            headers: Vec::new(),
            separators: vec![' '],
            fuzzy_match: false,
            fuzzy_threshold: 0.6,
            raise_error: false,
            option_names: OptionNames::default(),
            message_cache: true,
            keep_crlf: false,
            filter_out: Vec::new(),
        }
    }
}

impl NamespaceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: &[&str]) -> Self {
        self.headers = headers.iter().map(|h| (*h).to_string()).collect();
        self
    }

    pub fn with_separators(mut self, separators: &[char]) -> Self {
        self.separators = separators.to_vec();
        self
    }

    pub fn fuzzy(mut self) -> Self {
        self.fuzzy_match = true;
        self
    }

    pub fn raise_error(mut self) -> Self {
        self.raise_error = true;
        self
    }
}

/// Top-level manager configuration.
///
/// # Examples
///
/// ```
/// # use command_grammar_analyser::ManagerConfig;
/// let config = ManagerConfig::from_yaml_str("command_max_count: 5").unwrap();
/// assert_eq!(config.command_max_count, 5);
/// assert_eq!(config.message_max_count, 100);
/// assert_eq!(config.namespace("default").separators, [' ']);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum number of registered commands.
    pub command_max_count: usize,
    /// Capacity of the result cache.
    pub message_max_count: usize,
    /// Capacity of the shortcut store.
    pub shortcut_max_count: usize,
    pub default_namespace: String,
    pub namespaces: Vec<NamespaceConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            command_max_count: 200,
            message_max_count: 100,
            shortcut_max_count: 100,
            default_namespace: command_grammar_core::DEFAULT_NAMESPACE.to_string(),
            namespaces: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Loads configuration from a file: `.json` files as JSON, anything
    /// else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ManagerError::Io) if the file cannot be read, or
    /// [`Json`](crate::ManagerError::Json) / [`Yaml`](crate::ManagerError::Yaml)
    /// if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ManagerError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::ManagerError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_namespace(mut self, namespace: NamespaceConfig) -> Self {
        self.namespaces.retain(|n| n.name != namespace.name);
        self.namespaces.push(namespace);
        self
    }

    /// The named namespace, or defaults carrying that name.
    pub fn namespace(&self, name: &str) -> NamespaceConfig {
        self.namespaces
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .unwrap_or_else(|| NamespaceConfig::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
command_max_count: 10
message_max_count: 3
namespaces:
  - name: chat
    headers: ["/"]
    separators: [" ", ","]
    fuzzy_match: true
    fuzzy_threshold: 0.8
    option_names:
      help: ["--help", "?"]
"#
    }

    #[test]
    fn test_parse_yaml() {
        let config = ManagerConfig::from_yaml_str(sample_yaml()).unwrap();
        assert_eq!(config.command_max_count, 10);
        assert_eq!(config.message_max_count, 3);
        let chat = config.namespace("chat");
        assert_eq!(chat.headers, ["/"]);
        assert_eq!(chat.separators, [' ', ',']);
        assert_eq!(chat.fuzzy_threshold, 0.8);
        assert_eq!(chat.option_names.help, ["--help", "?"]);
        assert_eq!(chat.option_names.shortcut, ["--shortcut", "-s"]);
        assert!(chat.message_cache);
    }

    #[test]
    fn test_unknown_namespace_gets_defaults() {
        let config = ManagerConfig::default();
        let ns = config.namespace("other");
        assert_eq!(ns.name, "other");
        assert_eq!(ns.fuzzy_threshold, 0.6);
        assert!(!ns.fuzzy_match);
    }

    #[test]
    fn test_with_namespace_replaces() {
        let config = ManagerConfig::default()
            .with_namespace(NamespaceConfig::new("a"))
            .with_namespace(NamespaceConfig::new("a").fuzzy());
        assert_eq!(config.namespaces.len(), 1);
        assert!(config.namespace("a").fuzzy_match);
    }

    #[test]
    fn test_option_names_contains() {
        let names = OptionNames::default();
        assert!(names.contains("-h"));
        assert!(names.contains("--comp"));
        assert!(!names.contains("--bar"));
    }
}
