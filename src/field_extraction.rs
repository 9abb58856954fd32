//! Carte grise field extraction from normalized OCR text.

pub mod rules;


use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use utoipa::ToSchema;

pub const NO_FIELDS_ERROR: &str = "Aucune information de carte grise détectée dans l'image";
pub const NO_FIELDS_SUGGESTION: &str =
    "Vérifiez que l'image est une carte grise française et qu'elle est lisible";
pub const TEXT_SAMPLE_CHARS: usize = 200;

/// The eight registration fields, in the order they are printed on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// A
    PlateNumber,
    /// D.1
    Make,
    /// D.2
    Model,
    /// P.1
    Displacement,
    /// E
    Vin,
    /// B
    FirstRegistrationDate,
    /// S.1
    SeatCount,
    /// P.3
    FuelType,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::PlateNumber,
        Field::Make,
        Field::Model,
        Field::Displacement,
        Field::Vin,
        Field::FirstRegistrationDate,
        Field::SeatCount,
        Field::FuelType,
    ];

    /// Key used in the JSON record.
    pub fn key(&self) -> &'static str {
        match self {
            Field::PlateNumber => "numero_immatriculation",
            Field::Make => "marque_vehicule",
            Field::Model => "modele_vehicule",
            Field::Displacement => "cylindree",
            Field::Vin => "numero_chassis",
            Field::FirstRegistrationDate => "date_mise_circulation",
            Field::SeatCount => "nombre_places",
            Field::FuelType => "carburation",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceGrade {
    Low,
    Medium,
    High,
}

impl ConfidenceGrade {
    /// `None` when nothing was found.
    pub fn from_found_count(found: usize) -> Option<Self> {
        match found {
            0 => None,
            1..=2 => Some(ConfidenceGrade::Low),
            3..=5 => Some(ConfidenceGrade::Medium),
            _ => Some(ConfidenceGrade::High),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExtractionRecord {
    pub numero_immatriculation: Option<String>,
    pub marque_vehicule: Option<String>,
    pub modele_vehicule: Option<String>,
    pub cylindree: Option<String>,
    pub numero_chassis: Option<String>,
    pub date_mise_circulation: Option<String>,
    pub nombre_places: Option<String>,
    pub carburation: Option<String>,
    pub extraction_confidence: ConfidenceGrade,
}

impl ExtractionRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::PlateNumber => &self.numero_immatriculation,
            Field::Make => &self.marque_vehicule,
            Field::Model => &self.modele_vehicule,
            Field::Displacement => &self.cylindree,
            Field::Vin => &self.numero_chassis,
            Field::FirstRegistrationDate => &self.date_mise_circulation,
            Field::SeatCount => &self.nombre_places,
            Field::FuelType => &self.carburation,
        };
        value.as_deref()
    }

    pub fn found_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }
}

/// Soft failure returned when recognition succeeded but no field matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NoFieldsFound {
    pub error: String,
    pub suggestion: String,
    pub extracted_text_sample: String,
}

impl NoFieldsFound {
    pub fn from_text(text: &str) -> Self {
        Self {
            error: NO_FIELDS_ERROR.to_string(),
            suggestion: NO_FIELDS_SUGGESTION.to_string(),
            extracted_text_sample: text.chars().take(TEXT_SAMPLE_CHARS).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ExtractionOutcome {
    Record(ExtractionRecord),
    NoFields(NoFieldsFound),
}

impl ExtractionOutcome {
    pub fn record(&self) -> Option<&ExtractionRecord> {
        match self {
            ExtractionOutcome::Record(record) => Some(record),
            ExtractionOutcome::NoFields(_) => None,
        }
    }

    pub fn found_count(&self) -> usize {
        self.record().map(ExtractionRecord::found_count).unwrap_or(0)
    }
}

/// Populate every field from normalized text and grade the result.
pub fn extract_fields(text: &str) -> ExtractionOutcome {
    let value = |field: Field| {
        let found = rules::extract(field, text);
        debug!("{}: {:?}", field, found);
        found
    };

    let numero_immatriculation = value(Field::PlateNumber);
    let marque_vehicule = value(Field::Make);
    let modele_vehicule = value(Field::Model);
    let cylindree = value(Field::Displacement);
    let numero_chassis = value(Field::Vin);
    let date_mise_circulation = value(Field::FirstRegistrationDate);
    let nombre_places = value(Field::SeatCount);
    let carburation = value(Field::FuelType);

    let found = [
        &numero_immatriculation,
        &marque_vehicule,
        &modele_vehicule,
        &cylindree,
        &numero_chassis,
        &date_mise_circulation,
        &nombre_places,
        &carburation,
    ]
    .iter()
    .filter(|v| v.is_some())
    .count();

    match ConfidenceGrade::from_found_count(found) {
        Some(extraction_confidence) => {
            info!("Extracted {} of {} fields ({:?} confidence)", found, Field::ALL.len(), extraction_confidence);
            ExtractionOutcome::Record(ExtractionRecord {
                numero_immatriculation,
                marque_vehicule,
                modele_vehicule,
                cylindree,
                numero_chassis,
                date_mise_circulation,
                nombre_places,
                carburation,
                extraction_confidence,
            })
        }
        None => {
            info!("No carte grise field found in {} characters of text", text.chars().count());
            ExtractionOutcome::NoFields(NoFieldsFound::from_text(text))
        }
    }
}
