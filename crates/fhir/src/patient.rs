//! FHIR-aligned patient wire models and translation helpers.
//!
//! Responsibilities:
//! - Define public domain-level types for registration use
//! - Define a wire model for deserialising backend JSON
//! - Translate the nested wire model (extensions inside names and addresses) into flat types
//!
//! Notes:
//! - Backend resources carry many fields this crate does not use. Unknown keys are
//!   ignored rather than rejected, since the backend owns the schema.

use crate::FhirError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// One human name of a patient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HumanNameData {
    /// Backend identifier of the name, used when updating an existing record.
    pub id: Option<String>,
    /// Father's family name (the FHIR `family` element).
    pub family: Option<String>,
    /// Mother's family name, carried in the first nested name extension.
    pub mothers_family: Option<String>,
    /// Given names (first name, middle names).
    pub given: Vec<String>,
}

/// One patient identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierData {
    pub id: Option<String>,
    pub system: Option<String>,
    pub value: Option<String>,
    /// Human readable identifier type (`type.text`).
    pub type_text: Option<String>,
    /// First coding of the identifier type (`type.coding[0].code`).
    pub type_code: Option<String>,
}

/// One patient address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressData {
    pub id: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    /// Flattened nested address extensions as `(url, valueString)` pairs, in document order.
    pub extensions: Vec<(String, String)>,
}

/// Domain-level carrier for patient data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientData {
    /// Backend UUID of the patient.
    pub id: String,
    /// Names in backend order; the first one is the preferred name.
    pub names: Vec<HumanNameData>,
    pub gender: Option<String>,
    /// Date of birth as sent by the backend (ISO 8601, possibly partial).
    pub birth_date: Option<String>,
    /// Telecom values in backend order.
    pub telecom: Vec<String>,
    pub identifiers: Vec<IdentifierData>,
    pub addresses: Vec<AddressData>,
    pub deceased: bool,
    pub deceased_date_time: Option<DateTime<Utc>>,
}

// ============================================================================
// Public Patient operations
// ============================================================================

/// Patient resource operations.
///
/// This is a zero-sized type used for namespacing patient-related operations.
pub struct Patient;

impl Patient {
    /// Parse a patient resource from JSON text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g. `name.0.given`)
    /// to the failing field when the JSON does not match the wire schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the JSON does not represent a patient resource,
    /// - any used field has an unexpected type,
    /// - resourceType is not "Patient".
    pub fn parse(json_text: &str) -> Result<PatientData, FhirError> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let wire = match serde_path_to_error::deserialize::<_, PatientWire>(&mut deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "Patient schema mismatch at {path}: {source}"
                )));
            }
        };

        Self::from_wire(wire)
    }

    /// Translate an already deserialised JSON value into [`PatientData`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Patient::parse`].
    pub fn from_value(value: serde_json::Value) -> Result<PatientData, FhirError> {
        let wire = match serde_path_to_error::deserialize::<_, PatientWire>(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                return Err(FhirError::Translation(format!(
                    "Patient schema mismatch at {path}: {source}"
                )));
            }
        };

        Self::from_wire(wire)
    }

    fn from_wire(wire: PatientWire) -> Result<PatientData, FhirError> {
        if wire.resource_type != "Patient" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Patient', got '{}'",
                wire.resource_type
            )));
        }

        wire_to_domain(wire)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct PatientWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    id: String,

    #[serde(default)]
    name: Vec<HumanNameWire>,

    #[serde(default)]
    gender: Option<String>,

    #[serde(rename = "birthDate", default)]
    birth_date: Option<String>,

    #[serde(default)]
    telecom: Vec<ContactPointWire>,

    #[serde(default)]
    identifier: Vec<IdentifierWire>,

    #[serde(default)]
    address: Vec<AddressWire>,

    #[serde(rename = "deceasedBoolean", default)]
    deceased_boolean: Option<bool>,

    #[serde(rename = "deceasedDateTime", default)]
    deceased_date_time: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct HumanNameWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    given: Vec<String>,
    #[serde(default)]
    extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct ExtensionWire {
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "valueString", default)]
    value_string: Option<String>,
    #[serde(default)]
    extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct ContactPointWire {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct IdentifierWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(rename = "type", default)]
    type_: Option<CodeableConceptWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct CodeableConceptWire {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    coding: Vec<CodingWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct CodingWire {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct AddressWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(rename = "postalCode", default)]
    postal_code: Option<String>,
    #[serde(default)]
    extension: Vec<ExtensionWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn name_to_domain(name: HumanNameWire) -> HumanNameData {
    let mothers_family = name
        .extension
        .first()
        .and_then(|ext| ext.extension.first())
        .and_then(|inner| inner.value_string.clone());

    HumanNameData {
        id: name.id,
        family: name.family,
        mothers_family,
        given: name.given,
    }
}

fn identifier_to_domain(identifier: IdentifierWire) -> IdentifierData {
    let (type_text, type_code) = match identifier.type_ {
        Some(concept) => {
            let code = concept.coding.into_iter().next().and_then(|c| c.code);
            (concept.text, code)
        }
        None => (None, None),
    };

    IdentifierData {
        id: identifier.id,
        system: identifier.system,
        value: identifier.value,
        type_text,
        type_code,
    }
}

fn address_to_domain(address: AddressWire) -> AddressData {
    let extensions = address
        .extension
        .into_iter()
        .flat_map(|ext| ext.extension)
        .filter_map(|inner| match (inner.url, inner.value_string) {
            (Some(url), Some(value)) => Some((url, value)),
            _ => None,
        })
        .collect();

    AddressData {
        id: address.id,
        city: address.city,
        state: address.state,
        district: address.district,
        country: address.country,
        postal_code: address.postal_code,
        extensions,
    }
}

/// Parse a FHIR `dateTime`, which may be a full timestamp or a bare date.
fn parse_fhir_date_time(value: &str) -> Result<DateTime<Utc>, FhirError> {
    if let Ok(dt) = value.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }

    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FhirError::Translation(format!("Invalid deceasedDateTime: {value}")))
}

/// Convert wire format patient to the flat domain type.
fn wire_to_domain(wire: PatientWire) -> Result<PatientData, FhirError> {
    let deceased_date_time = wire
        .deceased_date_time
        .as_deref()
        .map(parse_fhir_date_time)
        .transpose()?;

    Ok(PatientData {
        id: wire.id,
        names: wire.name.into_iter().map(name_to_domain).collect(),
        gender: wire.gender,
        birth_date: wire.birth_date,
        telecom: wire.telecom.into_iter().filter_map(|t| t.value).collect(),
        identifiers: wire
            .identifier
            .into_iter()
            .map(identifier_to_domain)
            .collect(),
        addresses: wire.address.into_iter().map(address_to_domain).collect(),
        deceased: wire.deceased_boolean.unwrap_or(false) || deceased_date_time.is_some(),
        deceased_date_time,
    })
}
