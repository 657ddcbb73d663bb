//! Keyword text normalization for matching oracle echoes back to inputs.

/// Lowercase with all whitespace removed. Models often re-space Korean
/// compounds ("일룸책상" vs "일룸 책상"), so this is the join key.
#[must_use]
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .flat_map(str::chars)
        .flat_map(char::to_lowercase)
        .collect()
}

/// URL-safe slug: ASCII alphanumerics and single dashes only.
#[must_use]
pub fn slugify(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                Some(c)
            } else if c.is_whitespace() || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
