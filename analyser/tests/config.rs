//! Loading manager configuration from disk.

use std::io::Write;

use command_grammar_analyser::{CommandManager, ManagerConfig, ManagerError, NamespaceConfig};
use command_grammar_core::{Command, Value};
use tempfile::TempDir;

#[test]
fn test_load_yaml() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "command_max_count: 2\nnamespaces:\n  - name: bot\n    headers: [\"/\"]\n    fuzzy_match: true"
    )
    .unwrap();

    let config = ManagerConfig::load(file.path()).unwrap();
    assert_eq!(config.command_max_count, 2);
    let bot = config.namespace("bot");
    assert_eq!(bot.headers, ["/"]);
    assert!(bot.fuzzy_match);

    let mut manager = CommandManager::new(config);
    let path = manager.register(Command::new("ping").with_namespace("bot")).unwrap();
    assert!(manager.parse(&path, vec![Value::from("/ping")]).unwrap().matched);
}

#[test]
fn test_load_json() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"message_max_count": 4, "namespaces": [{{"name": "x", "separators": [","]}}]}}"#).unwrap();

    let config = ManagerConfig::load(file.path()).unwrap();
    assert_eq!(config.message_max_count, 4);
    assert_eq!(config.namespace("x").separators, [',']);
    assert_eq!(config.command_max_count, 200);
}

#[test]
fn test_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grammar.yaml");
    let config = ManagerConfig::default().with_namespace(NamespaceConfig::new("chat").with_headers(&["!"]));
    config.save(&path).unwrap();
    assert_eq!(ManagerConfig::load(&path).unwrap(), config);
}

#[test]
fn test_load_errors() {
    assert!(matches!(
        ManagerConfig::load("/nonexistent/grammar.yaml"),
        Err(ManagerError::Io(_))
    ));

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "not json").unwrap();
    assert!(matches!(ManagerConfig::load(file.path()), Err(ManagerError::Json(_))));
}

#[test]
fn test_namespace_separators_apply() {
    let config = ManagerConfig::default().with_namespace(NamespaceConfig::new("csv").with_separators(&[',']));
    let mut manager = CommandManager::new(config);
    let path = manager
        .register(
            Command::new("sum")
                .with_namespace("csv")
                .with_arg(command_grammar_core::Arg::new(
                    "nums",
                    command_grammar_core::MultiVar::plus(command_grammar_core::builtin::INTEGER.clone()),
                )),
        )
        .unwrap();
    let result = manager.parse(&path, vec![Value::from("sum,1,2")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(
        result.main_args.get("nums"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
    );
}
