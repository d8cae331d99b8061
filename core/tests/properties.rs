//! Property tests for pattern matching.

use command_grammar_core::{PatternRegistry, Value, builtin};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_negated_pattern_inverts_success(text in "\\PC{0,12}") {
        let input = Value::Str(text);
        for pattern in [&*builtin::INTEGER, &*builtin::BOOLEAN, &*builtin::HEX] {
            let negated = pattern.reverse();
            prop_assert_eq!(
                negated.exec(&input).is_success(),
                !pattern.exec(&input).is_success()
            );
        }
    }

    #[test]
    fn test_integer_accepts_decimal_text(n in any::<i32>()) {
        let result = builtin::INTEGER.exec(&Value::Str(n.to_string()));
        prop_assert_eq!(result.into_value(), Some(Value::Int(i64::from(n))));
    }

    #[test]
    fn test_any_accepts_everything(text in ".*") {
        let input = Value::Str(text);
        prop_assert_eq!(builtin::ANY.exec(&input).into_value(), Some(input));
    }

    #[test]
    fn test_registry_resolves_builtin_names(name in prop::sample::select(vec!["int", "str", "bool", "any"])) {
        prop_assert!(PatternRegistry::global().resolve(name).is_ok());
    }
}
