use command_grammar_analyser::text::{best_match, levenshtein, levenshtein_norm, split};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_split_recovers_plain_words(words in prop::collection::vec("[a-z0-9]{1,8}", 1..6)) {
        let joined = words.join(" ");
        prop_assert_eq!(split(&joined, &[' '], true), words);
    }

    #[test]
    fn test_quoted_word_stays_whole(left in "[a-z]{1,5}", right in "[a-z]{1,5}") {
        let text = format!("x \"{left} {right}\" y");
        prop_assert_eq!(
            split(&text, &[' '], true),
            vec!["x".to_string(), format!("{left} {right}"), "y".to_string()]
        );
    }

    #[test]
    fn test_levenshtein_symmetric(a in "[a-c]{0,6}", b in "[a-c]{0,6}") {
        prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        let sim = levenshtein_norm(&a, &b);
        prop_assert!((0.0..=1.0).contains(&sim));
    }
}

#[test]
fn test_best_match_prefers_closest() {
    let candidates = ["--verbose", "--version", "--value"];
    assert_eq!(best_match("--verbos", candidates, 0.6), Some("--verbose"));
    assert_eq!(best_match("zzz", candidates, 0.6), None);
}
