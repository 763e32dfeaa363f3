//! SQL text cleanup applied to DDL before it is shown to the oracle

use once_cell::sync::Lazy;
use regex::Regex;

/// Non-greedy, spans newlines, first `*/` closes the block
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

/// Remove SQL comments from `sql`.
///
/// Lines whose trimmed text starts with `--` are dropped entirely. Block
/// comments are removed afterwards from the remaining text. A `--` that
/// follows code on the same line is kept.
pub fn strip_comments(sql: &str) -> String {
    let kept: Vec<&str> = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect();

    BLOCK_COMMENT.replace_all(&kept.join("\n"), "").into_owned()
}
