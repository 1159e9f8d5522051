use anyhow::{Context, Result};
use std::path::Path;

const COMMENT_MARKER: char = '#';

/// Extracts resource locators from newline-delimited text.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .map(str::to_owned)
        .collect()
}

pub fn read_url_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list from {}", path.display()))?;
    Ok(parse_url_list(&contents))
}
