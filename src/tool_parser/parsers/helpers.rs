use std::borrow::Cow;

/// Length of the longest suffix of `buffer` that is a proper prefix of `token`
pub fn partial_token_len(buffer: &str, token: &str) -> usize {
    if buffer.is_empty() || token.is_empty() {
        return 0;
    }

    token
        .char_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .rev()
        .find(|&i| buffer.ends_with(&token[..i]))
        .unwrap_or(0)
}

/// Length of the longest suffix of `buffer` that could still grow into any of `tokens`
pub fn partial_tokens_len(buffer: &str, tokens: &[&str]) -> usize {
    tokens
        .iter()
        .map(|token| partial_token_len(buffer, token))
        .max()
        .unwrap_or(0)
}

/// Earliest occurrence of any token, as (byte offset, token)
pub fn find_first<'t>(text: &str, tokens: &[&'t str]) -> Option<(usize, &'t str)> {
    tokens
        .iter()
        .filter(|token| !token.is_empty())
        .filter_map(|token| text.find(token).map(|pos| (pos, *token)))
        .min_by_key(|(pos, _)| *pos)
}

/// Remove every occurrence of the tokens, repeating until none is left.
///
/// A single pass is not enough: removing one token can join the halves of
/// another.
pub fn strip_tokens<'a>(text: &'a str, tokens: &[&str]) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(text);
    loop {
        let Some((_, token)) = find_first(&out, tokens) else {
            return out;
        };
        out = Cow::Owned(out.replace(token, ""));
    }
}

/// Whether `text` is non-empty and a prefix of `token` (including `token` itself)
pub fn is_token_prefix(text: &str, token: &str) -> bool {
    !text.is_empty() && token.starts_with(text)
}

/// Abbreviate text for log events
pub fn snippet(text: &str) -> Cow<'_, str> {
    const MAX_CHARS: usize = 120;
    match text.char_indices().nth(MAX_CHARS) {
        Some((end, _)) => Cow::Owned(format!("{}...", &text[..end])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALL_BEGIN: &str = "<｜tool▁call▁begin｜>";
    const CALL_END: &str = "<｜tool▁call▁end｜>";

    #[test]
    fn test_partial_token_len() {
        assert_eq!(partial_token_len("hello <｜tool", CALL_BEGIN), "<｜tool".len());
        assert_eq!(partial_token_len("hello <", CALL_BEGIN), 1);
        assert_eq!(
            partial_token_len("hello <｜tool▁call▁begin", CALL_BEGIN),
            "<｜tool▁call▁begin".len()
        );
        // A complete token is not a partial one
        assert_eq!(partial_token_len("hello <｜tool▁call▁begin｜>", CALL_BEGIN), 0);
        assert_eq!(partial_token_len("", CALL_BEGIN), 0);
        assert_eq!(partial_token_len("hello world", CALL_BEGIN), 0);
    }

    #[test]
    fn test_partial_token_len_respects_char_boundaries() {
        // "｜" is three bytes; only whole-character prefixes may match
        assert_eq!(partial_token_len("x<｜", CALL_BEGIN), "<｜".len());
        assert_eq!(partial_token_len("x<", CALL_BEGIN), 1);
    }

    #[test]
    fn test_partial_tokens_len_takes_longest() {
        let tokens = [CALL_BEGIN, CALL_END];
        assert_eq!(
            partial_tokens_len("a<｜tool▁call▁e", &tokens),
            "<｜tool▁call▁e".len()
        );
        assert_eq!(partial_tokens_len("abc", &tokens), 0);
    }

    #[test]
    fn test_find_first() {
        let text = format!("a{}b{}", CALL_END, CALL_BEGIN);
        assert_eq!(find_first(&text, &[CALL_BEGIN, CALL_END]), Some((1, CALL_END)));
        assert_eq!(find_first("plain", &[CALL_BEGIN, CALL_END]), None);
    }

    #[test]
    fn test_strip_tokens_reaches_fixpoint() {
        let nested = format!("<｜tool▁call{}▁begin｜>x", CALL_END);
        let stripped = strip_tokens(&nested, &[CALL_BEGIN, CALL_END]);
        assert_eq!(stripped, "x");

        let untouched = strip_tokens("no markers", &[CALL_BEGIN]);
        assert!(matches!(untouched, Cow::Borrowed(_)));
    }

    #[test]
    fn test_is_token_prefix() {
        assert!(is_token_prefix("<｜tool", CALL_BEGIN));
        assert!(is_token_prefix(CALL_BEGIN, CALL_BEGIN));
        assert!(!is_token_prefix("", CALL_BEGIN));
        assert!(!is_token_prefix("<x", CALL_BEGIN));
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short"), "short");
        let long = "é".repeat(200);
        assert!(snippet(&long).ends_with("..."));
    }
}
