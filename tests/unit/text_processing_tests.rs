/*!
 * Tests for source normalization and translation validation
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use dataset_translator::app_config::ValidationConfig;
use dataset_translator::translation::Preprocessor;
use dataset_translator::validation::{postprocess, ValidationFailure, ValidationOutcome, Validator};

/// Random text mixing provider names, ordinary words and messy whitespace
fn random_source(rng: &mut StdRng) -> String {
    const PIECES: &[&str] = &[
        "ChatGPT", "chatgpt", "GPT-4", "OpenAI API", "Claude", "Gemini", "the", "model", "said",
        "hello", "world", " ", "  ", "\t", "\n", "\n\n\n", "\u{0007}", "\u{200B}", ",", ".",
    ];
    let len = rng.random_range(0..30);
    (0..len)
        .map(|_| PIECES[rng.random_range(0..PIECES.len())])
        .collect::<Vec<_>>()
        .join(if rng.random_bool(0.5) { " " } else { "" })
}

#[test]
fn test_normalize_withRandomInputs_shouldBeIdempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    let preprocessor = Preprocessor::with_default_terms();

    for _ in 0..500 {
        let source = random_source(&mut rng);
        let once = preprocessor.normalize(&source);
        assert_eq!(preprocessor.normalize(&once), once, "source: {:?}", source);
    }
}

/// Custom term tables drawn from words that collide with each other and with the built-in terms
#[test]
fn test_normalize_withRandomCustomTerms_shouldBeIdempotentWhenAccepted() {
    const TERMS: &[&str] = &["foo", "bar", "baz", "Chat", "GPT", "x-y", "it's"];
    const REPLACEMENTS: &[&str] = &[
        "", " pad", "Chat", "GPT", "the tool", "foo bar", "qux", "x", "y", "-", "a\tb", "new  name", "zed",
        "Open", "AI", "s", "'s tool", "-4 model", "q-", "API",
    ];
    const FILLER: &[&str] = &[
        "ChatGPT", "chat", "gpt", "OpenAI", "4", "-", "'", " ", "  ", "\t", "\n", "\n\n\n", "\u{0007}", "the", ".",
    ];
    let mut rng = StdRng::seed_from_u64(19);
    let (mut accepted, mut rejected) = (0, 0);

    for _ in 0..300 {
        let custom: BTreeMap<String, String> = (0..rng.random_range(1..=3))
            .map(|_| {
                (
                    TERMS[rng.random_range(0..TERMS.len())].to_string(),
                    REPLACEMENTS[rng.random_range(0..REPLACEMENTS.len())].to_string(),
                )
            })
            .collect();

        let Ok(preprocessor) = Preprocessor::new(true, &custom) else {
            rejected += 1;
            continue;
        };
        accepted += 1;

        for _ in 0..30 {
            let source = (0..rng.random_range(0..12))
                .map(|_| match rng.random_range(0..3) {
                    0 => TERMS[rng.random_range(0..TERMS.len())],
                    1 => REPLACEMENTS[rng.random_range(0..REPLACEMENTS.len())],
                    _ => FILLER[rng.random_range(0..FILLER.len())],
                })
                .collect::<Vec<_>>()
                .join(if rng.random_bool(0.5) { " " } else { "" });
            let once = preprocessor.normalize(&source);
            assert_eq!(preprocessor.normalize(&once), once, "terms: {:?}, source: {:?}", custom, source);
        }
    }

    assert!(accepted > 0 && rejected > 0, "accepted {}, rejected {}", accepted, rejected);
}

#[test]
fn test_normalize_withCollidingReplacements_shouldRejectTable() {
    for (term, replacement) in [("foo", ""), ("foo", "x "), ("bar", "Chat")] {
        let custom = BTreeMap::from([(term.to_string(), replacement.to_string())]);
        assert!(Preprocessor::new(true, &custom).is_err(), "{:?} -> {:?}", term, replacement);
    }
}

#[test]
fn test_normalize_shouldNeverLeaveControlCharacters() {
    let mut rng = StdRng::seed_from_u64(11);
    let preprocessor = Preprocessor::cleaning_only();

    for _ in 0..200 {
        let normalized = preprocessor.normalize(&random_source(&mut rng));
        assert!(!normalized.chars().any(|c| c.is_control() && c != '\n'));
        assert_eq!(normalized.trim(), normalized);
    }
}

#[test]
fn test_postprocess_withRandomArabic_shouldBeIdempotent() {
    const LETTERS: &[char] = &['ا', 'أ', 'إ', 'آ', 'ب', 'ة', 'ى', 'ي', 'ل', ' ', '\n', '،'];
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..300 {
        let len = rng.random_range(0..40);
        let text: String = (0..len).map(|_| LETTERS[rng.random_range(0..LETTERS.len())]).collect();
        let once = postprocess(&text);
        assert_eq!(postprocess(&once), once);
    }
}

#[test]
fn test_validator_withoutArabic_shouldAlwaysFail() {
    let validator = Validator::default();
    for translated in ["Hello world", "12345", "Bonjour le monde"] {
        let outcome = validator.validate("Hello world", translated);
        match outcome {
            ValidationOutcome::Fail(failures) => {
                assert!(failures.contains(&ValidationFailure::NoArabicScript), "{}", translated)
            }
            ValidationOutcome::Pass => panic!("{:?} passed validation", translated),
        }
    }
}

#[test]
fn test_validator_withRatioOutsideBounds_shouldFail() {
    let validator = Validator::new(&ValidationConfig {
        min_length_ratio: 0.5,
        max_length_ratio: 2.0,
        ..ValidationConfig::default()
    });
    let source = "This sentence has a reasonable length for checking";

    assert!(!validator.validate(source, "قصير").passed());
    assert!(!validator.validate(source, &"كلمة ".repeat(40)).passed());
    assert!(validator.validate(source, "هذه الجملة لها طول معقول للتحقق منها").passed());
}

#[test]
fn test_validator_withPostprocessedOutput_shouldPass() {
    let validator = Validator::default();
    let raw = "  مرحبا   بالعالم\n\n\n\nإلى اللقاء  ";
    let cleaned = postprocess(raw);
    assert!(validator.validate("Hello world, goodbye", &cleaned).passed());
}
