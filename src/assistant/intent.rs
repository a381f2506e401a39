//! Keyword intents for free-text assistant messages.
//!
//! Matching is substring-based and case-insensitive, so "si" also fires
//! inside words like "visa". Typed events avoid the classifier entirely.

const NEWS_KEYWORDS: &[&str] = &["noticias", "actualidad", "novedades"];
const CONFIRM_KEYWORDS: &[&str] = &["sí", "si", "generar", "adelante"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Open the news panel.
    News,
    /// Go ahead with document generation.
    Confirm,
    Other,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// News wins over confirmation when both match.
pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    if contains_any(&lowered, NEWS_KEYWORDS) {
        Intent::News
    } else if contains_any(&lowered, CONFIRM_KEYWORDS) {
        Intent::Confirm
    } else {
        Intent::Other
    }
}

/// First catalogue entry named inside `text`, ignoring case.
pub fn match_document_type<'a>(text: &str, catalogue: &[&'a str]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    catalogue
        .iter()
        .copied()
        .find(|doc_type| !doc_type.is_empty() && lowered.contains(&doc_type.to_lowercase()))
}
