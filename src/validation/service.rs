/*!
 * Validation service that runs every check on a translated cell.
 *
 * The validator is pure: it looks only at the source text, the translated
 * text and the configured thresholds.
 */

use crate::app_config::ValidationConfig;

use super::length::{LengthBounds, LengthIssue};
use super::script;

/// A reason a translation was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    /// Empty or too short to be a translation
    Length(LengthIssue),
    /// No Arabic characters at all
    NoArabicScript,
    /// Too few Arabic characters among visible characters
    LowArabicRatio { ratio: f64, min_ratio: f64 },
    /// Mojibake or replacement characters
    EncodingDamage,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Length(issue) => write!(f, "{}", issue),
            Self::NoArabicScript => write!(f, "Translation contains no Arabic script"),
            Self::LowArabicRatio { ratio, min_ratio } => {
                write!(f, "Arabic ratio {:.2} below {:.2}", ratio, min_ratio)
            }
            Self::EncodingDamage => write!(f, "Translation shows encoding damage"),
        }
    }
}

/// Outcome of validating one translation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Pass,
    Fail(Vec<ValidationFailure>),
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Human-readable reasons, joined
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Pass => None,
            Self::Fail(failures) => Some(
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }
}

/// Validator for translated cells
#[derive(Debug, Clone)]
pub struct Validator {
    min_arabic_ratio: f64,
    length: LengthBounds,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            min_arabic_ratio: config.min_arabic_ratio,
            length: LengthBounds::from(config),
        }
    }

    /// Check a translation against its (preprocessed) source
    pub fn validate(&self, source: &str, translated: &str) -> ValidationOutcome {
        let mut failures: Vec<ValidationFailure> = Vec::new();

        let length_issues = self.length.check(source, translated);
        if let Some(LengthIssue::Empty { .. }) = length_issues.first() {
            return ValidationOutcome::Fail(length_issues.into_iter().map(ValidationFailure::Length).collect());
        }

        if script::arabic_char_count(translated) == 0 {
            failures.push(ValidationFailure::NoArabicScript);
        } else {
            let ratio = script::arabic_ratio(translated);
            if ratio < self.min_arabic_ratio {
                failures.push(ValidationFailure::LowArabicRatio {
                    ratio,
                    min_ratio: self.min_arabic_ratio,
                });
            }
        }

        failures.extend(length_issues.into_iter().map(ValidationFailure::Length));

        if script::has_encoding_damage(translated) {
            failures.push(ValidationFailure::EncodingDamage);
        }

        if failures.is_empty() {
            ValidationOutcome::Pass
        } else {
            ValidationOutcome::Fail(failures)
        }
    }
}
