use regex::Regex;
use std::sync::LazyLock;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-\./():,]").expect("valid character filter"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Clean raw OCR output before field extraction.
///
/// Characters outside word characters, whitespace and `- . / ( ) : ,` become
/// spaces, then whitespace runs collapse to a single space and the ends are
/// trimmed. Case is preserved.
pub fn normalize_text(raw: &str) -> String {
    let filtered = DISALLOWED.replace_all(raw, " ");
    WHITESPACE.replace_all(&filtered, " ").trim().to_string()
}
