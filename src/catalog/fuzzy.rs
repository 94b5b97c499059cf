//! Accent- and plural-insensitive search patterns.
//!
//! Patterns use the SQL `LIKE` single-character wildcard (`_`) in place of
//! every vowel, so "pantalón", "pantalon" and "pantalones" all collapse to
//! the same stem. Literal `%`, `_` and `\` from the input are escaped with
//! [`LIKE_ESCAPE`].

/// Escape character paired with `ESCAPE '\'` in the catalog queries.
pub const LIKE_ESCAPE: char = '\\';

/// Placeholder that matches exactly one character in a `LIKE` pattern.
const WILDCARD: char = '_';

/// Normalises free text into a substring pattern.
///
/// Trims, lowercases, strips a trailing `es` (or else `s`) and replaces
/// every vowel, accented or not, with the wildcard.
///
/// ```
/// use conversational_commerce::catalog::fuzzy::to_pattern;
/// assert_eq!(to_pattern("Pantalones"), to_pattern("pantalón"));
/// ```
pub fn to_pattern(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let singular = strip_plural(&lowered);

    let mut pattern = String::with_capacity(singular.len());
    for c in singular.chars() {
        if is_vowel(c) {
            pattern.push(WILDCARD);
        } else if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
            pattern.push(c);
        } else {
            pattern.push(c);
        }
    }
    pattern
}

/// Escapes `LIKE` metacharacters so `text` matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Wraps a pattern so it matches anywhere inside a column.
pub fn contains(pattern: &str) -> String {
    format!("%{pattern}%")
}

fn strip_plural(word: &str) -> &str {
    word.strip_suffix("es")
        .or_else(|| word.strip_suffix('s'))
        .unwrap_or(word)
}

fn is_vowel(c: char) -> bool {
    matches!(
        c,
        'a' | 'e'
            | 'i'
            | 'o'
            | 'u'
            | 'á'
            | 'é'
            | 'í'
            | 'ó'
            | 'ú'
            | 'à'
            | 'è'
            | 'ì'
            | 'ò'
            | 'ù'
            | 'â'
            | 'ê'
            | 'î'
            | 'ô'
            | 'û'
            | 'ä'
            | 'ë'
            | 'ï'
            | 'ö'
            | 'ü'
    )
}
