/*!
 * Cleanup of backend output before validation.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static ALEF_VARIANTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[إأآ]").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Unify Alef forms, collapse whitespace and trim
pub fn postprocess(text: &str) -> String {
    let text = ALEF_VARIANTS.replace_all(text, "ا");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}
