//! Shortcut definition, expansion and persistence.

use command_grammar_analyser::{
    CommandManager, ManagerConfig, ManagerError, ShortcutTarget, ShortcutTemplate,
};
use command_grammar_core::{Arg, Command, CommandOption, Value, builtin};
use tempfile::TempDir;

fn manager() -> (CommandManager, String) {
    let mut manager = CommandManager::new(ManagerConfig::default());
    let path = manager
        .register(
            Command::new("cmd")
                .with_arg(Arg::new("foo", builtin::INTEGER.clone()))
                .with_option(CommandOption::new("--bar")),
        )
        .unwrap();
    (manager, path)
}

fn go_template() -> ShortcutTarget {
    ShortcutTarget::Template(ShortcutTemplate::new(vec![Value::from("cmd {%0} --bar")]))
}

#[test]
fn test_template_shortcut_expands() {
    let (mut manager, path) = manager();
    manager.define_shortcut(&path, "go", go_template(), false).unwrap();

    let result = manager.parse(&path, vec![Value::from("go 42")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(42)));
    assert!(result.find("bar"));

    let result = manager.invoke_shortcut(&path, "go", &[Value::from("7")]).unwrap();
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(7)));
}

#[test]
fn test_regex_shortcut_captures() {
    let (mut manager, path) = manager();
    let template = ShortcutTemplate::new(vec![Value::from("cmd {n}")]);
    manager
        .define_shortcut(&path, r"n(?P<n>\d+)", ShortcutTarget::Template(template), true)
        .unwrap();

    let result = manager.parse(&path, vec![Value::from("n15")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(15)));
}

#[test]
fn test_unknown_shortcut() {
    let (mut manager, path) = manager();
    assert!(matches!(
        manager.invoke_shortcut(&path, "missing", &[]),
        Err(ManagerError::ShortcutNotFound(k)) if k == "missing"
    ));
    assert!(matches!(
        manager.delete_shortcut(&path, "missing"),
        Err(ManagerError::ShortcutNotFound(_))
    ));

    let result = manager.parse(&path, vec![Value::from("missing 1")]).unwrap();
    assert!(!result.matched);
}

#[test]
fn test_shortcut_for_unknown_command() {
    let (mut manager, _) = manager();
    assert!(matches!(
        manager.define_shortcut("default.nope", "go", go_template(), false),
        Err(ManagerError::CommandNotFound(_))
    ));
}

#[test]
fn test_shortcut_option_defines_template() {
    let (mut manager, path) = manager();
    manager
        .parse(&path, vec![Value::from("cmd --shortcut quick 'cmd {%0}'")])
        .unwrap();
    let result = manager.parse(&path, vec![Value::from("quick 9")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(9)));
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("shortcuts.json");

    let (mut manager, path) = manager();
    manager.define_shortcut(&path, "go", go_template(), false).unwrap();
    manager
        .define_shortcut(
            &path,
            r"n(?P<n>\d+)",
            ShortcutTarget::Template(ShortcutTemplate::new(vec![Value::from("cmd {n}")])),
            true,
        )
        .unwrap();
    manager.save_shortcuts(&file).unwrap();

    let (mut restored, path) = self::manager();
    assert_eq!(restored.load_shortcuts(&file).unwrap(), 2);
    assert_eq!(restored.shortcuts(&path).len(), 2);

    let result = restored.parse(&path, vec![Value::from("go 5")]).unwrap();
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(5)));
    let result = restored.parse(&path, vec![Value::from("n6")]).unwrap();
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(6)));
}
