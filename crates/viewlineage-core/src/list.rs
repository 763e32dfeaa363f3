//! Parsing of free-form list answers returned by the oracle
//!
//! The oracle is asked for a numbered list but answers in whatever style it
//! likes: `1.`, `1)`, `-`, `*`, `•`, or a bullet that went through a bad
//! encoding round-trip (`â€¢`). The parser accepts all of them and falls back
//! to the whole line when no marker is present.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+[.)]\s*|[-*\x{2022}]\s*|â€¢\s*)(.+)$").expect("valid regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';'];

/// Turn an oracle answer into an ordered, de-duplicated list of candidates.
///
/// Blank lines are skipped, one leading list marker is removed, trailing
/// `.`, `,` and `;` are stripped, and surrounding backticks are removed.
/// The first occurrence of a candidate wins.
pub fn parse_list_response(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let candidate = LIST_MARKER
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or(line);

        let candidate = candidate
            .trim_end_matches(TRAILING_PUNCTUATION)
            .trim_matches('`')
            .trim_end_matches(TRAILING_PUNCTUATION)
            .trim();

        if candidate.is_empty() {
            continue;
        }

        if seen.insert(candidate.to_string()) {
            out.push(candidate.to_string());
        }
    }

    out
}
