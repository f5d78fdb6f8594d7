//! Completion parsing.
//!
//! Strips code-fence markup from a raw completion and recognises the
//! sentinel answer.

use crate::llm::prompt::SENTINEL;

/// What a completion turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutput {
    /// Candidate SQL, still unchecked.
    Sql(String),
    /// The model answered with the sentinel.
    Declined,
}

/// Removes every ```` ```sql ```` and ```` ``` ```` marker and trims the result.
pub fn sanitize_completion(raw: &str) -> String {
    raw.trim()
        .replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Sanitizes a completion and classifies it.
pub fn parse_completion(raw: &str) -> CompletionOutput {
    let cleaned = sanitize_completion(raw);
    if cleaned.eq_ignore_ascii_case(SENTINEL) {
        CompletionOutput::Declined
    } else {
        CompletionOutput::Sql(cleaned)
    }
}
