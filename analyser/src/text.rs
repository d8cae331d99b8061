//! Quote-aware splitting and string similarity.
//!
//! Splitting honours `'`, `"`, `` ` `` and the typographic quote pairs: quoted
//! runs are emitted without their quotes and never split. A backslash in
//! front of a quote or separator emits that character literally.

const QUOTES: [(char, char); 5] = [
    ('\'', '\''),
    ('"', '"'),
    ('`', '`'),
    ('\u{201c}', '\u{201d}'),
    ('\u{2018}', '\u{2019}'),
];

fn closing_quote(ch: char) -> Option<char> {
    QUOTES.iter().find(|(open, _)| *open == ch).map(|(_, close)| *close)
}

fn is_quote(ch: char) -> bool {
    QUOTES.iter().any(|(open, close)| *open == ch || *close == ch)
}

fn is_separator(ch: char, separators: &[char], split_crlf: bool) -> bool {
    separators.contains(&ch) || (split_crlf && (ch == '\r' || ch == '\n'))
}

/// Splits off the first piece of `text`.
///
/// Returns the piece, the remainder (leading separators consumed) and the
/// separator that ended the piece. With `split_crlf`, carriage returns and
/// newlines also separate.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::text::split_once;
///
/// let (head, rest, sep) = split_once("say 'hello world'  again", &[' '], true);
/// assert_eq!(head, "say");
/// assert_eq!(rest, "'hello world'  again");
/// assert_eq!(sep, Some(' '));
///
/// let (head, rest, _) = split_once("'hello world'  again", &[' '], true);
/// assert_eq!(head, "hello world");
/// assert_eq!(rest, "again");
/// ```
pub fn split_once(text: &str, separators: &[char], split_crlf: bool) -> (String, String, Option<char>) {
    let trimmed = text.trim_start_matches(|c| is_separator(c, separators, split_crlf));
    let mut head = String::new();
    let mut quote: Option<char> = None;
    let mut chars = trimmed.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&(_, next)) if is_quote(next) || is_separator(next, separators, split_crlf) => {
                    head.push(next);
                    chars.next();
                }
                _ => head.push(ch),
            }
            continue;
        }
        if let Some(close) = quote {
            if ch == close {
                quote = None;
            } else {
                head.push(ch);
            }
            continue;
        }
        if let Some(close) = closing_quote(ch) {
            quote = Some(close);
            continue;
        }
        if is_separator(ch, separators, split_crlf) {
            let rest_start = chars.peek().map_or(trimmed.len(), |&(i, _)| i);
            let rest = trimmed[rest_start..]
                .trim_start_matches(|c| is_separator(c, separators, split_crlf))
                .to_string();
            return (head, rest, Some(ch));
        }
        head.push(ch);
    }

    (head, String::new(), None)
}

/// Splits `text` into every piece, dropping empty ones.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::text::split;
///
/// assert_eq!(split(r#"cp "my file" \"b"#, &[' '], true), ["cp", "my file", "\"b"]);
/// assert_eq!(split("a,b,,c", &[','], true), ["a", "b", "c"]);
/// ```
pub fn split(text: &str, separators: &[char], split_crlf: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text.to_string();
    loop {
        let (head, tail, _) = split_once(&rest, separators, split_crlf);
        if !head.is_empty() {
            pieces.push(head);
        }
        if tail.is_empty() {
            break;
        }
        rest = tail;
    }
    pieces
}

/// Backslash-escapes quotes and `separators` so [`split_once`] reads `text`
/// back as a single piece.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::text::{escape, split_once};
///
/// let escaped = escape("it's here", &[' ']);
/// assert_eq!(escaped, r"it\'s\ here");
/// assert_eq!(split_once(&escaped, &[' '], true).0, "it's here");
/// ```
pub fn escape(text: &str, separators: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_quote(ch) || separators.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Edit distance between `a` and `b`, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity in `0.0..=1.0`: `1 - distance / longest length`.
///
/// # Examples
///
/// ```
/// use command_grammar_analyser::text::levenshtein_norm;
///
/// assert!((levenshtein_norm("abcde", "abxye") - 0.6).abs() < 1e-12);
/// assert_eq!(levenshtein_norm("", ""), 1.0);
/// ```
pub fn levenshtein_norm(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// True if `similarity` reaches `threshold`, within floating-point tolerance.
pub fn meets_threshold(similarity: f64, threshold: f64) -> bool {
    similarity + 1e-9 >= threshold
}

/// The candidate most similar to `observed`, if it reaches `threshold`.
pub fn best_match<'a, I>(observed: &str, candidates: I, threshold: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let similarity = levenshtein_norm(observed, candidate);
        if best.is_none_or(|(_, s)| similarity > s) {
            best = Some((candidate, similarity));
        }
    }
    best.filter(|(_, s)| meets_threshold(*s, threshold))
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_once_consumes_separator_runs() {
        let (head, rest, sep) = split_once("  a   b c", &[' '], true);
        assert_eq!(head, "a");
        assert_eq!(rest, "b c");
        assert_eq!(sep, Some(' '));
    }

    #[test]
    fn test_split_once_without_separator() {
        let (head, rest, sep) = split_once("abc", &[' '], true);
        assert_eq!(head, "abc");
        assert!(rest.is_empty());
        assert_eq!(sep, None);
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(
            split("say \u{201c}hi there\u{201d} now", &[' '], true),
            ["say", "hi there", "now"]
        );
    }

    #[test]
    fn test_escaped_separator() {
        assert_eq!(split(r"a\ b c", &[' '], true), ["a b", "c"]);
        assert_eq!(split(r"C:\dir x", &[' '], true), [r"C:\dir", "x"]);
    }

    #[test]
    fn test_crlf_handling() {
        assert_eq!(split("a\nb", &[' '], true), ["a", "b"]);
        assert_eq!(split("a\nb", &[' '], false), ["a\nb"]);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_threshold_tolerance() {
        let s = levenshtein_norm("abcde", "abxye");
        assert!(meets_threshold(s, 0.6));
        assert!(!meets_threshold(levenshtein_norm("abcde", "axyze"), 0.6));
    }

    #[test]
    fn test_best_match() {
        let cands = ["status", "stash", "commit"];
        assert_eq!(best_match("stats", cands, 0.6), Some("status"));
        assert_eq!(best_match("zzz", cands, 0.6), None);
    }
}
