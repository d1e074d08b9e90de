//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a weight in grams, e.g. `12.5` as `12.5g` and `40` as `40g`.
///
/// Usage in templates: `{{ weight|grams }}`
#[askama::filter_fn]
pub fn grams(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!("{value}g"))
}
