//! Presentation-boundary rendering of missing categorical values.

use serde::Serializer;

/// Text shown wherever a categorical value is missing.
pub const NOT_SPECIFIED: &str = "NOT SPECIFIED";

pub fn label(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NOT_SPECIFIED)
}

/// `serialize_with` helper for `Option<String>` report columns.
pub fn or_not_specified<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(label(value))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cuts a label to `max_len` characters for fixed-width tables.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
