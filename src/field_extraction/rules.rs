//! Ordered pattern tables, one per registration field.
//!
//! Each field tries its patterns in order and keeps the first one whose
//! first match survives the pattern's transform. A transform returning
//! `None` rejects the match and lets the next pattern run.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::Field;

type Transform = fn(&Captures) -> Option<String>;

pub struct Rule {
    pattern: Regex,
    transform: Transform,
}

impl Rule {
    fn new(pattern: &str, transform: Transform) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid field pattern {}: {}", pattern, e)),
            transform,
        }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn apply(&self, text: &str) -> Option<String> {
        self.pattern.captures(text).and_then(|caps| (self.transform)(&caps))
    }
}

const MAKES: &str = "RENAULT|PEUGEOT|CITROEN|VOLKSWAGEN|BMW|MERCEDES|AUDI|FORD|OPEL|NISSAN|TOYOTA|HONDA|FIAT|SEAT|SKODA|DACIA|KIA|HYUNDAI|MAZDA|MITSUBISHI|SUBARU|VOLVO|LEXUS|INFINITI|ACURA";
const MODELS: &str = "YARIS|CLIO|POLO|GOLF|A3|C3|208|308|FOCUS|FIESTA|CORSA|ASTRA|CIVIC|ACCORD|PASSAT|JETTA|TIGUAN|QASHQAI|X3|A4|C4|3008|5008";
const FUELS: &str = "ESSENCE|DIESEL|ELECTRIQUE|HYBRIDE|GPL|GNV|ETHANOL";

const PLATE_NEW: &str = r"[A-Z]{2}[-\s]?\d{3}[-\s]?[A-Z]{2}";
const PLATE_LEGACY: &str = r"\d{1,4}[-\s]?[A-Z]{1,3}[-\s]?\d{2}";
const VIN: &str = "[A-HJ-NPR-Z0-9]{17}";
const DATE: &str = r"\d{2}[/\-.]\d{2}[/\-.]\d{4}";

/// Ends a labelled value: the next field code (`D.2`, `P1`, a lone `E`),
/// a character the value cannot contain, or the end of the text.
const NEXT_CODE: &str = r"\s+[A-Z](?:\.?\d+)?(?:[\s:]|$)";

static PLATE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&format!(r"(?i)A[:\s]*({})", PLATE_NEW), plate),
        Rule::new(&format!("(?i)({})", PLATE_NEW), plate),
        Rule::new(&format!("(?i)({})", PLATE_LEGACY), plate),
    ]
});

static MAKE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let labelled = |code: &str| format!(r"(?i){}[:\s]*([A-Z][A-Z\s]*?)(?:{}|[^A-Z\s]|\s*$)", code, NEXT_CODE);
    vec![
        Rule::new(&labelled(r"D\.1"), uppercase_trimmed),
        Rule::new(&labelled("D1"), uppercase_trimmed),
        Rule::new(&format!("(?i)({})", MAKES), uppercase_trimmed),
    ]
});

static MODEL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let labelled = |code: &str| {
        format!(r"(?i){}[:\s]*([A-Z0-9][A-Z0-9\s\-]*?)(?:{}|[^A-Z0-9\s\-]|\s*$)", code, NEXT_CODE)
    };
    vec![
        Rule::new(&labelled(r"D\.2"), uppercase_trimmed),
        Rule::new(&labelled("D2"), uppercase_trimmed),
        Rule::new(&format!("(?i)({})", MODELS), uppercase_trimmed),
    ]
});

static DISPLACEMENT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"(?i)P\.1[:\s]*(\d{3,5})", cubic_centimetres),
        Rule::new(r"(?i)P1[:\s]*(\d{3,5})", cubic_centimetres),
        Rule::new(r"(?i)(\d{4})\s*cm³?", cubic_centimetres),
        Rule::new(r"(?i)(\d{4})\s*CC", cubic_centimetres),
    ]
});

// Case-sensitive: VINs are printed in capitals and lowercase runs are noise.
static VIN_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&format!(r"E[:\s]*({})", VIN), vin),
        Rule::new(&format!(r"VIN[:\s]*({})", VIN), vin),
        Rule::new(&format!("({})", VIN), vin),
    ]
});

static DATE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&format!(r"B\.?\s*({})", DATE), slash_date),
        Rule::new(&format!(r"B\s+({})", DATE), slash_date),
        Rule::new(&format!("({})", DATE), slash_date),
    ]
});

static SEAT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"(?i)S\.1[:\s]*(\d{1,2})", seat_count),
        Rule::new(r"(?i)S1[:\s]*(\d{1,2})", seat_count),
        Rule::new(r"(?i)PLACES[:\s]*(\d{1,2})", seat_count),
        Rule::new(r"(?i)(\d{1,2})\s*PLACES", seat_count),
    ]
});

static FUEL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"(?i)P\.3[:\s]*([A-Z]+)", uppercase_trimmed),
        Rule::new(r"(?i)P3[:\s]*([A-Z]+)", uppercase_trimmed),
        Rule::new(&format!("(?i)({})", FUELS), uppercase_trimmed),
    ]
});

/// Patterns for `field`, most specific first.
pub fn rules_for(field: Field) -> &'static [Rule] {
    match field {
        Field::PlateNumber => &PLATE_RULES,
        Field::Make => &MAKE_RULES,
        Field::Model => &MODEL_RULES,
        Field::Displacement => &DISPLACEMENT_RULES,
        Field::Vin => &VIN_RULES,
        Field::FirstRegistrationDate => &DATE_RULES,
        Field::SeatCount => &SEAT_RULES,
        Field::FuelType => &FUEL_RULES,
    }
}

/// First accepted value for `field`, if any pattern yields one.
pub fn extract(field: Field, text: &str) -> Option<String> {
    rules_for(field).iter().find_map(|rule| rule.apply(text))
}

fn group<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    caps.get(1).map(|m| m.as_str())
}

fn plate(caps: &Captures) -> Option<String> {
    group(caps).map(|s| s.replace(' ', "-").to_uppercase())
}

fn uppercase_trimmed(caps: &Captures) -> Option<String> {
    group(caps)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

fn cubic_centimetres(caps: &Captures) -> Option<String> {
    group(caps).map(|digits| format!("{} cm³", digits))
}

fn vin(caps: &Captures) -> Option<String> {
    group(caps)
        .filter(|s| s.chars().count() == 17)
        .map(str::to_string)
}

fn slash_date(caps: &Captures) -> Option<String> {
    group(caps).map(|s| s.replace([' ', '-', '.'], "/"))
}

fn seat_count(caps: &Captures) -> Option<String> {
    group(caps)
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| (1..=50).contains(n))
        .map(|n| n.to_string())
}
