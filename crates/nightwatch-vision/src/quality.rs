//! Vague-description detection.
//!
//! A provider can return a well-formed answer that still says nothing
//! useful ("Motion detected.", "Something is visible but unclear"). This
//! check supplements the numeric self-reported confidence: its verdict is
//! OR-ed into the stored event's `low_confidence` flag and its reason tag
//! lands in `vague_reason`.

/// Descriptions with fewer words than this carry no usable detail.
const MIN_WORDS: usize = 4;

/// Hedging language signalling the model couldn't actually see the scene.
const HEDGE_PHRASES: [&str; 9] = [
    "unclear",
    "can't tell",
    "cannot tell",
    "hard to tell",
    "not sure",
    "unable to determine",
    "difficult to make out",
    "too dark",
    "too blurry",
];

/// Boilerplate that restates the trigger instead of describing the scene.
const GENERIC_PHRASES: [&str; 5] = [
    "motion detected",
    "no significant activity",
    "nothing notable",
    "no activity",
    "security camera image",
];

/// Checks `description` for vagueness, returning the reason tag when it
/// fails. Infallible and purely lexical, so it can never block event
/// processing.
#[must_use]
pub fn detect_vague_description(description: &str) -> Option<&'static str> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Some("empty");
    }
    if trimmed.split_whitespace().count() < MIN_WORDS {
        return Some("too_short");
    }
    let lower = trimmed.to_lowercase();
    if GENERIC_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Some("generic_description");
    }
    if HEDGE_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Some("uncertain_language");
    }
    None
}
