//! String utilities for the domain layer.

/// Truncate a string to approximately `max_bytes` without splitting a UTF-8
/// character boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Trim and collapse every run of whitespace into a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-case a single token: first character upper, the rest lower.
///
/// Hyphenated parts are cased independently ("wilkes-barre" -> "Wilkes-Barre").
/// Characters whose case mapping is more than one character ("ß" -> "SS")
/// are kept as written, so the character count never changes.
pub fn title_case_token(token: &str) -> String {
    token
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => std::iter::once(single_case(first, char::to_uppercase))
                    .chain(chars.map(|c| single_case(c, char::to_lowercase)))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

fn single_case<I: Iterator<Item = char>>(c: char, map: impl Fn(char) -> I) -> char {
    let mut mapped = map(c);
    match (mapped.next(), mapped.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// Lowercase word tokens with surrounding punctuation stripped.
///
/// Shared by the similarity metric, context deduplication and the validator
/// so that all three agree on what a "word" is.
pub fn word_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '/')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
