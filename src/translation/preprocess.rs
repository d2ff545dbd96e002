/*!
 * Input normalization applied before text is sent to a backend.
 *
 * Normalization removes control characters, tidies whitespace and, when
 * enabled, replaces names of AI providers and products with neutral terms so
 * that the translation services do not refuse or editorialize. Applying
 * `normalize` twice yields the same text as applying it once.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::errors::ConfigError;

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F]").expect("valid regex"));

static HORIZONTAL_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```|\bdef \w+\(|\bfunction\s*\w*\(|\bclass \w+[:({]|\bimport \w+|</?\w+>")
        .expect("valid regex")
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid regex"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").expect("valid regex"));

static WORD_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w$").expect("valid regex"));

/// Built-in provider term replacements
const PROVIDER_TERMS: &[(&str, &str)] = &[
    ("ChatGPT", "the AI assistant"),
    ("Chat GPT", "the AI assistant"),
    ("OpenAI", "the AI provider"),
    ("OpenAI's", "the AI provider's"),
    ("GPT-4", "the advanced language model"),
    ("GPT-3.5", "the language model"),
    ("GPT-3", "the language model"),
    ("OpenAI API", "the AI API"),
    ("ChatGPT API", "the AI API"),
];

/// Share of non-alphanumeric, non-space characters above which a text is flagged
const SPECIAL_CHAR_RATIO_THRESHOLD: f64 = 0.3;

/// Content features that tend to translate badly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextIssues {
    pub contains_code: bool,
    pub contains_urls: bool,
    pub contains_emails: bool,
    pub high_special_char_ratio: bool,
}

impl TextIssues {
    pub fn any(&self) -> bool {
        self.contains_code || self.contains_urls || self.contains_emails || self.high_special_char_ratio
    }
}

/// Case-insensitive whole-word term replacement table
#[derive(Debug, Clone)]
struct TermTable {
    pattern: Regex,
    replacements: BTreeMap<String, String>,
}

impl TermTable {
    fn build(custom: &BTreeMap<String, String>) -> Result<Option<Self>, ConfigError> {
        let mut replacements: BTreeMap<String, String> = PROVIDER_TERMS
            .iter()
            .map(|(term, replacement)| (term.to_lowercase(), replacement.to_string()))
            .collect();

        for (term, replacement) in custom {
            let term = term.trim();
            if term.is_empty() {
                return Err(ConfigError::Invalid("provider term must not be empty".to_string()));
            }
            replacements.insert(term.to_lowercase(), replacement.clone());
        }

        if replacements.is_empty() {
            return Ok(None);
        }

        for (term, replacement) in &replacements {
            if replacement.is_empty() || clean_text(replacement) != *replacement {
                return Err(ConfigError::Invalid(format!(
                    "replacement {:?} for \"{}\" must be non-empty text without surrounding or repeated whitespace",
                    replacement, term
                )));
            }
            let replacement_chars: Vec<char> = replacement.to_lowercase().chars().collect();
            for other in replacements.keys() {
                let term_chars: Vec<char> = other.chars().collect();
                if can_form_term(&term_chars, &replacement_chars) {
                    return Err(ConfigError::Invalid(format!(
                        "replacement \"{}\" can form the term \"{}\", so normalization would not be stable",
                        replacement, other
                    )));
                }
            }
        }

        // Longest first so "OpenAI API" wins over "OpenAI"
        let mut terms: Vec<&String> = replacements.keys().collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        let alternation = terms
            .iter()
            .map(|term| regex::escape(term))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .map_err(|e| ConfigError::Invalid(format!("provider terms do not form a valid pattern: {}", e)))?;

        Ok(Some(Self { pattern, replacements }))
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures| {
                let matched = &caps[0];
                self.replacements
                    .get(&matched.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| matched.to_string())
            })
            .into_owned()
    }
}

fn is_word_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    WORD_CHAR.is_match(c.encode_utf8(&mut buf))
}

/// Word boundary between `text[at - 1]` and `text[at]`
fn is_boundary(text: &[char], at: usize) -> bool {
    is_word_char(text[at - 1]) != is_word_char(text[at])
}

/// Whether `term` can match on text overlapping an inserted `replacement`
///
/// The term is tried at every offset where it shares at least one character
/// with the replacement. Characters outside the replacement can be anything,
/// so only term edges falling strictly inside it must sit on a word boundary.
/// Both arguments are lowercase.
fn can_form_term(term: &[char], replacement: &[char]) -> bool {
    let (t, r) = (term.len() as isize, replacement.len() as isize);
    ((1 - t)..r).any(|offset| {
        let (lo, hi) = (offset.max(0), (offset + t).min(r));
        let overlap_matches =
            (lo..hi).all(|i| replacement[i as usize] == term[(i - offset) as usize]);
        let end = offset + t;
        overlap_matches
            && (offset <= 0 || is_boundary(replacement, offset as usize))
            && (end >= r || is_boundary(replacement, end as usize))
    })
}

/// Text normalizer for source cells
#[derive(Debug, Clone)]
pub struct Preprocessor {
    terms: Option<TermTable>,
}

impl Preprocessor {
    /// Create a preprocessor; `replace_terms` toggles provider name replacement
    ///
    /// Custom terms extend and override the built-in table. A replacement must
    /// be clean non-empty text that cannot form a term, alone or together with
    /// the text around it.
    pub fn new(replace_terms: bool, custom_terms: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let terms = TermTable::build(custom_terms)?;
        Ok(Self {
            terms: if replace_terms { terms } else { None },
        })
    }

    /// Preprocessor with the built-in term table
    pub fn with_default_terms() -> Self {
        Self {
            terms: TermTable::build(&BTreeMap::new()).ok().flatten(),
        }
    }

    /// Preprocessor that only cleans whitespace and control characters
    pub fn cleaning_only() -> Self {
        Self { terms: None }
    }

    /// Normalize a source text
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = clean_text(text);
        match &self.terms {
            Some(table) => table.apply(&cleaned),
            None => cleaned,
        }
    }

    /// Detect content that tends to translate badly
    pub fn detect_issues(text: &str) -> TextIssues {
        let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let special = visible.iter().filter(|c| !c.is_alphanumeric()).count();
        let issues = TextIssues {
            contains_code: CODE_PATTERN.is_match(text),
            contains_urls: URL_PATTERN.is_match(text),
            contains_emails: EMAIL_PATTERN.is_match(text),
            high_special_char_ratio: !visible.is_empty()
                && special as f64 / visible.len() as f64 > SPECIAL_CHAR_RATIO_THRESHOLD,
        };
        if issues.any() {
            debug!("Source text has potential issues: {:?}", issues);
        }
        issues
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::with_default_terms()
    }
}

/// Remove control characters and collapse whitespace
pub fn clean_text(text: &str) -> String {
    let text = CONTROL_CHARS.replace_all(text, "");
    let text = HORIZONTAL_WHITESPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
