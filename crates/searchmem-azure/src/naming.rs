use regex::Regex;
use searchmem_core::{SearchMemError, SearchMemResult};
use std::sync::LazyLock;

/// Longest index name the engine accepts.
pub const MAX_INDEX_NAME_LEN: usize = 128;

const SEPARATOR: &str = "-";

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[\s\\/._:]").expect("static regex is valid")
});

/// Maps a caller-supplied index name onto a name the engine accepts.
///
/// The name is trimmed and lower-cased, separators (whitespace, `\`, `/`,
/// `.`, `_`, `:`) become `-`, and a `z` is added when the result would start
/// or end with a dash. Applying it twice gives the same result as once.
pub fn normalize_index_name(name: &str) -> SearchMemResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SearchMemError::InvalidArgument(
            "the index name is empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_INDEX_NAME_LEN {
        return Err(SearchMemError::InvalidArgument(format!(
            "the index name is too long, the max length is {MAX_INDEX_NAME_LEN} characters"
        )));
    }

    let mut normalized = INVALID_CHARS
        .replace_all(&trimmed.to_lowercase(), SEPARATOR)
        .into_owned();

    if normalized.starts_with(SEPARATOR) {
        normalized.insert(0, 'z');
    }
    if normalized.ends_with(SEPARATOR) {
        normalized.push('z');
    }

    // The dash guards may push a name at the limit over it.
    if normalized.chars().count() > MAX_INDEX_NAME_LEN {
        return Err(SearchMemError::InvalidArgument(format!(
            "the normalized index name '{normalized}' exceeds {MAX_INDEX_NAME_LEN} characters"
        )));
    }

    Ok(normalized)
}
