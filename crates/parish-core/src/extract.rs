//! Text Extraction
//!
//! The payment provider gives us free text only; the registration id is
//! embedded in parentheses inside the charge description or display name,
//! e.g. "Inscrição de Luiz para Evento (81VYLQl)."

use std::sync::LazyLock;

use regex::Regex;

static INSCRIPTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Za-z0-9]+)\)").expect("valid inscription id regex"));

static EVENT_FROM_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"para\s+([^(]+)\s+da").expect("valid description regex"));

static EVENT_FROM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Inscrição\s+([^:]+):").expect("valid name regex"));

/// First parenthesized alphanumeric token in `text`, or `None`.
pub fn inscription_id(text: &str) -> Option<String> {
    INSCRIPTION_ID
        .captures(text)
        .map(|captures| captures[1].to_owned())
}

/// Derive the human event name from the charge texts: "para <name> da"
/// in the description, falling back to "Inscrição <name>:" in the display
/// name. `None` when neither matches; callers pick their default label.
pub fn event_name(description: &str, name: &str) -> Option<String> {
    EVENT_FROM_DESCRIPTION
        .captures(description)
        .or_else(|| EVENT_FROM_NAME.captures(name))
        .map(|captures| captures[1].trim().to_owned())
}
