//! Vehicle attribute extraction from AI-generated descriptions.
//!
//! Signature-based matching lets vehicles with the same color/make/model
//! group together even when their embeddings drift slightly between visits.

use regex::Regex;

use nightwatch_core::model::VehicleAttributes;

const VEHICLE_COLORS: &[&str] = &[
    "white", "black", "silver", "gray", "grey", "red", "blue", "green", "brown", "tan", "beige",
    "gold", "yellow", "orange", "purple", "maroon", "navy", "dark", "light", "bright",
];

const VEHICLE_MAKES: &[&str] = &[
    "ford",
    "chevrolet",
    "chevy",
    "gmc",
    "dodge",
    "ram",
    "jeep",
    "chrysler",
    "lincoln",
    "cadillac",
    "buick",
    "tesla",
    "rivian",
    "toyota",
    "honda",
    "nissan",
    "mazda",
    "subaru",
    "mitsubishi",
    "lexus",
    "acura",
    "infiniti",
    "suzuki",
    "hyundai",
    "kia",
    "genesis",
    "bmw",
    "mercedes",
    "mercedes-benz",
    "audi",
    "volkswagen",
    "vw",
    "porsche",
    "volvo",
    "jaguar",
    "land rover",
    "range rover",
    "mini",
    "fiat",
    "alfa romeo",
];

const VEHICLE_MODELS: &[&str] = &[
    "camry", "corolla", "rav4", "highlander", "tacoma", "tundra", "prius", "4runner", "civic",
    "accord", "cr-v", "pilot", "odyssey", "fit", "hr-v", "f-150", "f150", "f-250", "f250",
    "mustang", "explorer", "escape", "bronco", "ranger", "silverado", "malibu", "equinox",
    "tahoe", "suburban", "colorado", "camaro", "corvette", "altima", "sentra", "rogue",
    "pathfinder", "frontier", "maxima", "murano", "3 series", "5 series", "x3", "x5", "m3", "m5",
    "model 3", "model s", "model x", "model y", "cybertruck", "wrangler", "grand cherokee",
    "cherokee", "compass", "gladiator", "outback", "forester", "cx-5", "cx-9", "elantra",
    "sonata", "tucson", "santa fe",
];

const SKIP_WORDS: &[&str] = &[
    "car", "truck", "van", "suv", "vehicle", "auto", "sedan", "coupe", "hatchback", "convertible",
    "wagon", "crossover", "pickup", "minivan", "pulling", "parked", "driving", "arrived",
    "leaving", "stopped", "turning", "moving", "approaching", "backing", "entering", "exiting",
    "is", "was", "has", "had", "the", "at", "in", "on", "to", "from", "just", "still", "now",
    "then", "here", "there", "this", "that", "small", "large", "big", "old", "new", "used",
    "nice", "beautiful",
];

fn word_boundary_regex(term: &str) -> Regex {
    let escaped = regex::escape(term);
    #[allow(clippy::expect_used)]
    Regex::new(&format!(r"\b{escaped}\b")).expect("static pattern is valid regex")
}

fn normalize_make(raw: &str) -> String {
    match raw {
        "chevy" => "chevrolet".to_string(),
        "vw" => "volkswagen".to_string(),
        "mercedes-benz" => "mercedes".to_string(),
        "range rover" => "land rover".to_string(),
        other => other.to_string(),
    }
}

fn normalize_model(raw: &str) -> String {
    raw.replace('-', "").replace(' ', "")
}

fn extract_color(desc_lower: &str) -> Option<String> {
    VEHICLE_COLORS.iter().find_map(|&color| {
        word_boundary_regex(color).find(desc_lower).map(|_| {
            if color == "grey" {
                "gray".to_string()
            } else {
                color.to_string()
            }
        })
    })
}

fn extract_make(desc_lower: &str) -> Option<String> {
    let mut earliest_pos = desc_lower.len() + 1;
    let mut found = None;
    for &make in VEHICLE_MAKES {
        if let Some(m) = word_boundary_regex(make).find(desc_lower) {
            if m.start() < earliest_pos {
                earliest_pos = m.start();
                found = Some(normalize_make(make));
            }
        }
    }
    found
}

fn model_pattern(model: &str) -> Regex {
    let escaped = regex::escape(model).replace(r"\-", r"[-\s]?");
    #[allow(clippy::expect_used)]
    Regex::new(&format!(r"\b{escaped}\b")).expect("static pattern is valid regex")
}

fn extract_known_model(desc_lower: &str) -> Option<String> {
    VEHICLE_MODELS
        .iter()
        .find(|&&model| model_pattern(model).is_match(desc_lower))
        .map(|&model| normalize_model(model))
}

fn extract_pattern_model(desc_lower: &str, make: &str) -> Option<String> {
    let pattern = format!(r"\b{}\s+(\w+[-\w]*)\b", regex::escape(make));
    #[allow(clippy::expect_used)]
    let re = Regex::new(&pattern).expect("dynamically-built pattern is valid regex");
    let captures = re.captures(desc_lower)?;
    let candidate = captures.get(1)?.as_str();
    if SKIP_WORDS.contains(&candidate) || candidate.chars().count() < 2 {
        return None;
    }
    Some(candidate.replace('-', ""))
}

/// Extracts color/make/model from a free-text description and builds the
/// canonical signature if `(color ∧ make) ∨ (make ∧ model)` is satisfied.
/// Returns `None` when the description carries insufficient vehicle data.
#[must_use]
pub fn extract_vehicle_entity(description: &str) -> Option<VehicleAttributes> {
    if description.is_empty() {
        return None;
    }
    let desc_lower = description.to_lowercase();

    let color = extract_color(&desc_lower);
    let make = extract_make(&desc_lower);
    let model = extract_known_model(&desc_lower)
        .or_else(|| make.as_deref().and_then(|m| extract_pattern_model(&desc_lower, m)));

    let attrs = VehicleAttributes {
        color,
        make,
        model,
        signature: None,
    };

    if !attrs.is_valid() {
        return None;
    }

    let signature = attrs.build_signature();
    Some(VehicleAttributes { signature, ..attrs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_description_yields_color_make_model_signature() {
        let info = extract_vehicle_entity("A white Toyota Camry pulled into the driveway").unwrap();
        assert_eq!(info.color.as_deref(), Some("white"));
        assert_eq!(info.make.as_deref(), Some("toyota"));
        assert_eq!(info.model.as_deref(), Some("camry"));
        assert_eq!(info.signature.as_deref(), Some("white-toyota-camry"));
    }

    #[test]
    fn hyphenated_model_is_normalized() {
        let info = extract_vehicle_entity("Black Ford F-150 parked on street").unwrap();
        assert_eq!(info.make.as_deref(), Some("ford"));
        assert_eq!(info.model.as_deref(), Some("f150"));
        assert_eq!(info.signature.as_deref(), Some("black-ford-f150"));
    }

    #[test]
    fn color_only_is_insufficient() {
        assert!(extract_vehicle_entity("A red car passed by").is_none());
    }

    #[test]
    fn make_and_pattern_derived_model_is_sufficient() {
        let info = extract_vehicle_entity("A Subaru Outback idled at the curb").unwrap();
        assert_eq!(info.make.as_deref(), Some("subaru"));
        assert_eq!(info.model.as_deref(), Some("outback"));
        assert!(info.signature.is_some());
    }

    #[test]
    fn abbreviated_make_is_normalized() {
        let info = extract_vehicle_entity("A silver VW Golf drove past").unwrap();
        assert_eq!(info.make.as_deref(), Some("volkswagen"));
    }

    #[test]
    fn empty_description_returns_none() {
        assert!(extract_vehicle_entity("").is_none());
    }
}
