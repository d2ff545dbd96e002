/*!
 * Length checks for translated cells.
 *
 * Lengths are counted in characters after trimming. The ratio is
 * `translated / source`; sources shorter than `min_source_chars` skip the
 * ratio check since one-word cells vary too much.
 */

use log::debug;

use crate::app_config::ValidationConfig;

/// Why a translation's length was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum LengthIssue {
    /// Fewer characters than any real translation has
    Empty { chars: usize, required: usize },
    RatioTooLow { ratio: f64, bound: f64 },
    RatioTooHigh { ratio: f64, bound: f64 },
}

impl std::fmt::Display for LengthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { chars: 0, .. } => write!(f, "Translation is empty"),
            Self::Empty { chars, required } => {
                write!(f, "Translation has {} chars, expected at least {}", chars, required)
            }
            Self::RatioTooLow { ratio, bound } => {
                write!(f, "Translation too short: length ratio {:.2} < {:.2}", ratio, bound)
            }
            Self::RatioTooHigh { ratio, bound } => {
                write!(f, "Translation too long: length ratio {:.2} > {:.2}", ratio, bound)
            }
        }
    }
}

/// Accepted length band for translations
#[derive(Debug, Clone, PartialEq)]
pub struct LengthBounds {
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub min_chars: usize,
    pub min_source_chars: usize,
}

impl Default for LengthBounds {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

impl From<&ValidationConfig> for LengthBounds {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            min_ratio: config.min_length_ratio,
            max_ratio: config.max_length_ratio,
            min_chars: config.min_translation_chars.max(1),
            min_source_chars: config.min_source_chars_for_ratio,
        }
    }
}

/// Character-count ratio of `translated` to `source`; 1.0 when both are empty
pub fn length_ratio(source: &str, translated: &str) -> f64 {
    match (source.chars().count(), translated.chars().count()) {
        (0, 0) => 1.0,
        (0, _) => f64::INFINITY,
        (s, t) => t as f64 / s as f64,
    }
}

impl LengthBounds {
    /// Issues with `translated`; an empty translation yields only `Empty`
    pub fn check(&self, source: &str, translated: &str) -> Vec<LengthIssue> {
        let source = source.trim();
        let translated = translated.trim();

        let chars = translated.chars().count();
        if chars < self.min_chars {
            return vec![LengthIssue::Empty {
                chars,
                required: self.min_chars,
            }];
        }

        let source_chars = source.chars().count();
        if source_chars == 0 || source_chars < self.min_source_chars {
            return Vec::new();
        }

        let ratio = length_ratio(source, translated);
        let issue = if ratio < self.min_ratio {
            Some(LengthIssue::RatioTooLow {
                ratio,
                bound: self.min_ratio,
            })
        } else if ratio > self.max_ratio {
            Some(LengthIssue::RatioTooHigh {
                ratio,
                bound: self.max_ratio,
            })
        } else {
            None
        };

        if let Some(issue) = &issue {
            debug!("{} ({} source chars)", issue, source_chars);
        }
        issue.into_iter().collect()
    }
}
