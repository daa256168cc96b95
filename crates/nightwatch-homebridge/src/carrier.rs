//! Delivery carrier detection for per-carrier package sensors.
//!
//! The vocabulary matches the carrier-identification instruction given to
//! vision providers (`nightwatch-vision::prompt::CARRIER_IDENTIFICATION`):
//! FedEx, UPS, USPS, Amazon, DHL.

/// Supported carrier tags, in the order they're checked. Earliest
/// whole-word hit in the description wins.
pub const CARRIERS: [&str; 5] = ["fedex", "ups", "usps", "amazon", "dhl"];

/// Extracts the first carrier name mentioned in `description`, if any.
#[must_use]
pub fn extract_carrier(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    let mut earliest: Option<(usize, &'static str)> = None;
    for &carrier in &CARRIERS {
        if let Some(pos) = find_word(&lower, carrier) {
            let better = match earliest {
                Some((best_pos, _)) => pos < best_pos,
                None => true,
            };
            if better {
                earliest = Some((pos, carrier));
            }
        }
    }
    earliest.map(|(_, carrier)| carrier)
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(word) {
        let pos = start + rel;
        let before_ok = pos == 0 || !haystack.as_bytes()[pos - 1].is_ascii_alphanumeric();
        let after = pos + word.len();
        let after_ok = after >= haystack.len() || !haystack.as_bytes()[after].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(pos);
        }
        start = pos + word.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_fedex_by_name() {
        assert_eq!(extract_carrier("A FedEx driver dropped off a package"), Some("fedex"));
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(extract_carrier("UPS truck in the driveway"), Some("ups"));
    }

    #[test]
    fn picks_earliest_mention_when_multiple_present() {
        assert_eq!(
            extract_carrier("Not an Amazon van, looks more like a DHL van"),
            Some("amazon")
        );
    }

    #[test]
    fn avoids_substring_false_positives() {
        assert_eq!(extract_carrier("upstairs neighbor walked by"), None);
    }

    #[test]
    fn no_carrier_mentioned_returns_none() {
        assert_eq!(extract_carrier("A person walked across the yard"), None);
    }
}
