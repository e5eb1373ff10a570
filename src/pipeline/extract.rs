//! Candidate query extraction from raw model output.

use regex::Regex;
use std::sync::LazyLock;

/// First fenced block, with or without a language tag.
static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```[^\n]*\n([\s\S]*?)```").ok());

/// Leading `result =` assignment in front of a document expression.
static ASSIGNMENT_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*result\s*=\s*").ok());

/// Isolate the candidate query string in a model response.
///
/// Takes the trimmed interior of the first fenced block, or the trimmed
/// response if there is none. When the candidate reads a document
/// collection (`db[` / `db.`), a leading `result =` is dropped. Never fails.
pub fn extract_query(raw: &str) -> String {
    let candidate = FENCED_BLOCK
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| raw.trim());

    if candidate.contains("db[") || candidate.contains("db.") {
        if let Some(re) = ASSIGNMENT_PREFIX.as_ref() {
            return re.replace(candidate, "").trim().to_string();
        }
    }

    candidate.to_string()
}
