/*!
 * Validation module for translation quality assurance.
 *
 * This module checks translated cells with cheap heuristics:
 * - Script validation (Arabic share of the output, encoding damage)
 * - Length validation (reasonable translation length ratios)
 *
 * # Architecture
 *
 * - `postprocess`: Normalizes backend output before it is checked
 * - `script`: Arabic script and mojibake detection
 * - `length`: Validates translation length ratios
 * - `service`: Runs all validators on one translation
 */

pub mod length;
pub mod postprocess;
pub mod script;
pub mod service;

// Re-export main types
pub use postprocess::postprocess;
pub use service::{ValidationFailure, ValidationOutcome, Validator};
