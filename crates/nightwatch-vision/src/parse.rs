//! Parses a provider's free-text response into a description and an
//! optional self-reported confidence score.
//!
//! Three strategies are tried in order, each a little more forgiving than
//! the last:
//!
//! 1. Find the outermost `{...}` span and parse it as the
//!    `{"description": ..., "confidence": ...}` envelope the prompt asked
//!    for.
//! 2. If that fails, check for a truncated envelope — the provider was cut
//!    off mid-string — and salvage the partial description with no
//!    confidence.
//! 3. If there's no JSON at all, scan the raw text for a confidence-like
//!    phrase ("confidence: 85", "85% confident") and return the whole text
//!    as the description.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ConfidenceEnvelope {
    description: Option<String>,
    confidence: Option<serde_json::Value>,
}

fn confidence_in_range(value: &serde_json::Value) -> Option<u8> {
    let as_f64 = value.as_f64()?;
    if (0.0..=100.0).contains(&as_f64) {
        Some(as_f64 as u8)
    } else {
        None
    }
}

static TRUNCATED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)\{\s*"description"\s*:\s*"([^"]+)$"#).unwrap());

static CONFIDENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)confidence[:\s]+(\d{1,3})(?:%|\b)").unwrap(),
        Regex::new(r"(?i)(\d{1,3})%?\s*confiden").unwrap(),
        Regex::new(r"(?i)confidence\s*(?:score|level|rating)?[:\s]*(\d{1,3})").unwrap(),
    ]
});

/// Parses a provider response, returning `(description, confidence)`.
///
/// `confidence` is `None` whenever the provider's self-report couldn't be
/// recovered; callers should treat that event as low-confidence rather than
/// rejecting the description outright.
#[must_use]
pub fn parse_confidence_response(response_text: &str) -> (String, Option<u8>) {
    if let Some((start, end)) = outermost_braces(response_text) {
        let json_str = &response_text[start..=end];
        if let Ok(envelope) = serde_json::from_str::<ConfidenceEnvelope>(json_str) {
            let description = envelope.description.unwrap_or_default();
            let trimmed = description.trim();
            if !trimmed.is_empty() {
                if let Some(confidence) = envelope.confidence.as_ref().and_then(confidence_in_range)
                {
                    return (trimmed.to_string(), Some(confidence));
                }
            }
        }
    }

    if let Some(captures) = TRUNCATED_JSON.captures(response_text) {
        let partial = captures[1].trim().to_string();
        return (partial, None);
    }

    for pattern in CONFIDENCE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(response_text) {
            if let Ok(confidence) = captures[1].parse::<u16>() {
                if confidence <= 100 {
                    return (response_text.to_string(), Some(confidence as u8));
                }
            }
        }
    }

    (response_text.to_string(), None)
}

fn outermost_braces(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then_some((start, end))
}

const OBJECT_KEYWORDS: [(&str, &[&str]); 4] = [
    ("person", &["person", "people", "man", "woman", "child", "human"]),
    ("vehicle", &["vehicle", "car", "truck", "van", "motorcycle", "bike"]),
    ("animal", &["animal", "dog", "cat", "bird", "pet"]),
    ("package", &["package", "box", "delivery", "parcel"]),
];

/// Infers object tags from a description by whole-word keyword match,
/// falling back to `["unknown"]` when nothing matches.
#[must_use]
pub fn infer_objects(description: &str) -> Vec<&'static str> {
    let lower = description.to_lowercase();
    let words: std::collections::HashSet<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut tags = Vec::new();
    for (tag, keywords) in OBJECT_KEYWORDS {
        if keywords.iter().any(|k| words.contains(k)) {
            tags.push(tag);
        }
    }
    if tags.is_empty() {
        tags.push("unknown");
    }
    tags
}
