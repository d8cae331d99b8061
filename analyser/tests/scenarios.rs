//! End-to-end parsing scenarios through the command manager.

use std::sync::Arc;

use command_grammar_analyser::{
    Analysed, Analyser, CommandManager, ManagerConfig, NamespaceConfig, Outcome,
};
use command_grammar_core::{
    Arg, Command, CommandOption, Element, Header, MultiVar, ParseError, Subcommand, Value, builtin,
};

fn cmd() -> Command {
    Command::new("cmd")
        .with_arg(Arg::new("foo", builtin::INTEGER.clone()))
        .with_option(CommandOption::new("--bar"))
}

fn manager_with(command: Command) -> (CommandManager, String) {
    let mut manager = CommandManager::new(ManagerConfig::default());
    let path = manager.register(command).unwrap();
    (manager, path)
}

#[test]
fn test_simple_command() {
    let (mut manager, path) = manager_with(cmd());
    let result = manager.parse(&path, vec![Value::from("cmd 123 --bar")]).unwrap();
    assert!(result.matched);
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(123)));
    assert!(result.find("options.bar"));
    assert_eq!(result.header.result, Value::from("cmd"));
}

#[test]
fn test_subcommand_option() {
    let command = Command::new("cmd")
        .with_subcommand(Subcommand::new("sub").with_option(CommandOption::new("--qux")));
    let (mut manager, path) = manager_with(command);
    let result = manager.parse(&path, vec![Value::from("cmd sub --qux")]).unwrap();
    assert!(result.matched);
    assert!(result.find("subcommands.sub.options.qux"));
}

#[test]
fn test_missing_argument() {
    let (mut manager, path) = manager_with(cmd());
    let result = manager.parse(&path, vec![Value::from("cmd")]).unwrap();
    assert!(!result.matched);
    assert_eq!(result.error_info, Some(ParseError::ArgumentMissing("foo".into())));
    assert!(result.error_data.is_empty());
}

#[test]
fn test_cache_returns_same_result() {
    let (mut manager, path) = manager_with(cmd());
    let first = manager.parse(&path, vec![Value::from("cmd 1")]).unwrap();
    let second = manager.parse(&path, vec![Value::from("cmd 1")]).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = manager.parse(&path, vec![Value::from("cmd 2")]).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(manager.cached(), 2);
}

#[test]
fn test_cache_disabled_by_namespace() {
    let mut namespace = NamespaceConfig::new("nocache");
    namespace.message_cache = false;
    let mut manager = CommandManager::new(ManagerConfig::default().with_namespace(namespace));
    let path = manager.register(cmd().with_namespace("nocache")).unwrap();
    let first = manager.parse(&path, vec![Value::from("cmd 1")]).unwrap();
    let second = manager.parse(&path, vec![Value::from("cmd 1")]).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.main_args, second.main_args);
}

#[test]
fn test_option_backtracking() {
    let command = Command::new("cmd")
        .with_option(
            CommandOption::new("--foo")
                .with_arg(Arg::new("a", builtin::INTEGER.clone()))
                .with_arg(Arg::new("b", builtin::INTEGER.clone()))
                .with_dest("pair"),
        )
        .with_option(
            CommandOption::new("--foo")
                .with_arg(Arg::new("a", builtin::INTEGER.clone()))
                .with_dest("single"),
        );
    let (mut manager, path) = manager_with(command);

    let result = manager.parse(&path, vec![Value::from("cmd --foo 1")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert!(result.find("single"));
    assert!(!result.find("pair"));

    let result = manager.parse(&path, vec![Value::from("cmd --foo 1 2")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert!(result.find("pair"));
}

#[test]
fn test_multi_plus_and_star() {
    let plus = Command::new("add").with_arg(Arg::new("nums", MultiVar::plus(builtin::INTEGER.clone())));
    let star = Command::new("opt").with_arg(Arg::new("nums", MultiVar::star(builtin::INTEGER.clone())));
    let mut manager = CommandManager::new(ManagerConfig::default());
    let plus_path = manager.register(plus).unwrap();
    let star_path = manager.register(star).unwrap();

    let result = manager.parse(&plus_path, vec![Value::from("add 1 2 3")]).unwrap();
    assert_eq!(
        result.main_args.get("nums"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );

    let result = manager.parse(&plus_path, vec![Value::from("add")]).unwrap();
    assert_eq!(result.error_info, Some(ParseError::ArgumentMissing("nums".into())));

    let result = manager.parse(&star_path, vec![Value::from("opt")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("nums"), Some(&Value::List(Vec::new())));
}

#[test]
fn test_skipped_default_keeps_quoted_token() {
    let command = Command::new("cmd")
        .with_arg(Arg::new("a", builtin::INTEGER.clone()).with_default(Value::Int(0)))
        .with_arg(Arg::new("b", builtin::STRING.clone()))
        .with_option(CommandOption::new("--bar"));
    let (mut manager, path) = manager_with(command);

    let result = manager.parse(&path, vec![Value::from(r#"cmd "hello world" --bar"#)]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("a"), Some(&Value::Int(0)));
    assert_eq!(result.main_args.get("b"), Some(&Value::from("hello world")));
    assert!(result.find("options.bar"));

    let result = manager.parse(&path, vec![Value::from(r"cmd hello\ world --bar")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("b"), Some(&Value::from("hello world")));
}

#[test]
fn test_multi_returns_quoted_token() {
    let command = Command::new("cmd")
        .with_arg(Arg::new("n", MultiVar::star(builtin::INTEGER.clone())))
        .with_arg(Arg::new("msg;?", builtin::STRING.clone()))
        .with_option(CommandOption::new("--bar"));
    let (mut manager, path) = manager_with(command);

    let result = manager.parse(&path, vec![Value::from(r#"cmd 1 "hello world" --bar"#)]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("n"), Some(&Value::List(vec![Value::Int(1)])));
    assert_eq!(result.main_args.get("msg"), Some(&Value::from("hello world")));
    assert!(result.find("options.bar"));
}

#[test]
fn test_bounded_multi() {
    let command = Command::new("pick")
        .with_arg(Arg::new("two", MultiVar::bounded(builtin::INTEGER.clone(), 2)))
        .with_arg(Arg::new("rest", MultiVar::star(builtin::INTEGER.clone())));
    let (mut manager, path) = manager_with(command);
    let result = manager.parse(&path, vec![Value::from("pick 1 2 3 4")]).unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("two"), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));
    assert_eq!(result.main_args.get("rest"), Some(&Value::List(vec![Value::Int(3), Value::Int(4)])));
}

#[test]
fn test_fuzzy_header_threshold() {
    let mut manager = CommandManager::new(ManagerConfig::default());
    let path = manager.register(Command::new("abcde").fuzzy()).unwrap();

    let result = manager.parse(&path, vec![Value::from("abxye")]).unwrap();
    assert!(matches!(
        result.error_info,
        Some(ParseError::FuzzyMatched(ref m)) if m.contains("abcde")
    ));

    let result = manager.parse(&path, vec![Value::from("axyze")]).unwrap();
    assert_eq!(result.error_info, Some(ParseError::HeaderUnmatched("axyze".into())));
}

#[test]
fn test_compact_option_with_port() {
    let command = Command::new("serve").with_option(
        CommandOption::new("-p|--port")
            .with_arg(Arg::new("port", builtin::INTEGER.clone()))
            .compact(),
    );
    let (mut manager, path) = manager_with(command);
    for input in ["serve -p8080", "serve -p 8080", "serve --port 8080"] {
        let result = manager.parse(&path, vec![Value::from(input)]).unwrap();
        assert!(result.matched, "{input}: {:?}", result.error_info);
        assert_eq!(result.query("port.port").unwrap().and_then(|q| q.as_value()), Some(&Value::Int(8080)));
    }
}

#[test]
fn test_interactive_pause_and_resume() {
    let (mut manager, path) = manager_with(cmd());
    let Outcome::Paused(paused) = manager.parse_interactive(&path, vec![Value::from("cmd --bar")]).unwrap() else {
        panic!("expected a paused parse");
    };
    assert_eq!(paused.cause, ParseError::ArgumentMissing("foo".into()));
    assert!(paused.partial.find("bar"));

    let outcome = manager.resume(paused, vec![Value::from("5")]).unwrap();
    let result = outcome.result().unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("foo"), Some(&Value::Int(5)));
}

#[test]
fn test_namespace_headers() {
    let config = ManagerConfig::default().with_namespace(NamespaceConfig::new("chat").with_headers(&["/", "!"]));
    let mut manager = CommandManager::new(config);
    let path = manager.register(cmd().with_namespace("chat")).unwrap();
    assert!(manager.parse(&path, vec![Value::from("/cmd 1")]).unwrap().matched);
    assert!(manager.parse(&path, vec![Value::from("!cmd 1")]).unwrap().matched);
    assert!(!manager.parse(&path, vec![Value::from("cmd 1")]).unwrap().matched);
}

#[test]
fn test_element_header_pair() {
    let mention = Element::new("at", serde_json::json!({"target": "bot"}));
    let command = Command::new("ping").with_header(Header::Pair(
        Value::from(mention.clone()),
        "".to_string(),
    ));
    let analyser = Analyser::new(command).unwrap();
    let Analysed::Finished(result) = analyser.parse(vec![Value::from(mention), Value::from("ping")], false) else {
        panic!("expected a finished parse");
    };
    assert!(result.matched, "{:?}", result.error_info);
}

#[test]
fn test_mixed_units_and_filtering() {
    let mut namespace = NamespaceConfig::new("im");
    namespace.filter_out = vec!["face".into()];
    let command = Command::new("say")
        .with_namespace("im")
        .with_arg(Arg::new("what", builtin::ANY.clone()));
    let mut manager = CommandManager::new(ManagerConfig::default().with_namespace(namespace));
    let path = manager.register(command).unwrap();

    let image = Value::from(Element::new("image", serde_json::json!({"id": 1})));
    let face = Value::from(Element::new("face", serde_json::json!({"id": 2})));
    let result = manager
        .parse(&path, vec![Value::from("say"), face, image.clone()])
        .unwrap();
    assert!(result.matched, "{:?}", result.error_info);
    assert_eq!(result.main_args.get("what"), Some(&image));
}

#[test]
fn test_empty_input() {
    let (mut manager, path) = manager_with(cmd());
    let result = manager.parse(&path, vec![Value::from("   ")]).unwrap();
    assert_eq!(result.error_info, Some(ParseError::EmptyInput));
}

#[test]
fn test_completion_through_manager() {
    let (mut manager, path) = manager_with(cmd());
    let result = manager.parse(&path, vec![Value::from("cmd --comp")]).unwrap();
    assert_eq!(
        result.error_info,
        Some(ParseError::Completion(vec!["--bar".into(), "<foo>".into()]))
    );
}
