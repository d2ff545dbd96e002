/*!
 * Arabic script and encoding checks.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Byte sequences left behind when UTF-8 text is decoded as Latin-1/CP1252
static MOJIBAKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Ã©|Ã¨|Ã |Ã§|â€™|â€œ|â€|\x{FFFD}|Ø§|Ù…|Ù„").expect("valid regex"));

/// Arabic, Arabic Supplement and Arabic Extended-A blocks
pub fn is_arabic_char(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
}

pub fn arabic_char_count(text: &str) -> usize {
    text.chars().filter(|c| is_arabic_char(*c)).count()
}

/// Share of Arabic characters among non-whitespace characters
pub fn arabic_ratio(text: &str) -> f64 {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return 0.0;
    }
    arabic_char_count(text) as f64 / visible as f64
}

/// Whether the text shows signs of an encoding round trip gone wrong
pub fn has_encoding_damage(text: &str) -> bool {
    MOJIBAKE.is_match(text)
}
