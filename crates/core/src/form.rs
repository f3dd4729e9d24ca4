//! Registration form values.
//!
//! Holds the form state type and maps an existing FHIR patient onto it, so that editing a
//! patient starts from the stored names, identifiers and address.

use crate::address::AddressValues;
use crate::attributes::parse_birthdate;
use crate::relationships::RelationshipValue;
use chrono::{DateTime, NaiveDate, Utc};
use fhir::{HumanNameData, PatientData};
use reg_types::AddressField;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ============================================================================
// Form types
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathTimeFormat {
    #[default]
    AM,
    PM,
}

/// Registration form state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormValues {
    pub patient_uuid: String,
    pub given_name: String,
    pub middle_name: String,
    pub fathers_family_name: String,
    pub mothers_family_name: String,
    pub add_name_in_local_language: bool,
    pub additional_given_name: String,
    pub additional_middle_name: String,
    pub additional_fathers_family_name: String,
    pub additional_mothers_family_name: String,
    pub gender: String,
    pub birthdate: Option<NaiveDate>,
    pub birthdate_estimated: bool,
    pub years_estimated: u32,
    pub months_estimated: u32,
    pub telephone_number: String,
    pub is_dead: bool,
    pub death_date: Option<NaiveDate>,
    pub death_time: String,
    pub death_time_format: DeathTimeFormat,
    pub death_cause: String,
    pub non_coded_cause_of_death: String,
    pub address: AddressValues,
    /// Person attribute values keyed by attribute type uuid.
    pub attributes: BTreeMap<String, String>,
    /// Identifiers keyed by identifier field name.
    pub identifiers: BTreeMap<String, PatientIdentifierValue>,
    pub relationships: Vec<RelationshipValue>,
    /// Observation values keyed by concept uuid.
    pub obs: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGenerationOption {
    pub manual_entry_enabled: bool,
    pub automatic_generation_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierSource {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_generation_option: Option<AutoGenerationOption>,
}

impl IdentifierSource {
    pub fn manual_entry_enabled(&self) -> bool {
        self.auto_generation_option
            .as_ref()
            .is_some_and(|option| option.manual_entry_enabled)
    }
}

/// An identifier as edited in the form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientIdentifierValue {
    pub identifier_uuid: Option<String>,
    pub identifier_type_uuid: String,
    pub initial_value: String,
    /// `None` until a value has been entered or loaded.
    pub identifier_value: Option<String>,
    pub identifier_name: String,
    pub selected_source: Option<IdentifierSource>,
    pub auto_generation: bool,
    pub preferred: bool,
    pub required: bool,
}

/// A stored identifier reference, as sent back when updating a patient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub identifier: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRef {
    pub uuid: Option<String>,
    pub value: Option<String>,
}

/// Backend uuids of the records an edit must update rather than create.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUuidMap {
    pub preferred_name_uuid: Option<String>,
    pub additional_name_uuid: Option<String>,
    pub preferred_address_uuid: Option<String>,
    pub identifiers: BTreeMap<String, IdentifierRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub encounter_datetime: DateTime<Utc>,
    pub patient: String,
    pub encounter_type: String,
    pub location: String,
    #[serde(default)]
    pub form: Option<String>,
}

// ============================================================================
// FHIR mapping
// ============================================================================

/// Converts a label to a camelCase key (`"OpenMRS ID"` becomes `"openMrsId"`).
///
/// Words break at non-alphanumerics, at lower-to-upper changes, before the last capital of
/// an acronym followed by lowercase (`"XMLHttp"` is `XML` + `Http`), and between letters
/// and digits.
pub fn camel_case(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next = chars.get(i + 1).copied();
            let boundary = prev.is_alphanumeric()
                && ((prev.is_lowercase() && ch.is_uppercase())
                    || (prev.is_uppercase()
                        && ch.is_uppercase()
                        && next.is_some_and(char::is_lowercase))
                    || (prev.is_numeric() != ch.is_numeric()));
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i == 0 {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn identifier_key(identifier: &fhir::IdentifierData) -> Option<String> {
    let label = identifier
        .system
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(identifier.type_text.as_deref())?;
    let key = camel_case(label);
    (!key.is_empty()).then_some(key)
}

fn given(name: Option<&HumanNameData>, index: usize) -> String {
    name.and_then(|n| n.given.get(index))
        .cloned()
        .unwrap_or_default()
}

/// Form values for an existing patient.
///
/// The first name is the preferred name; a second name fills the additional (local
/// language) name fields. Identifiers are keyed by the camelCase of their system, or of
/// their type text when the system is absent.
pub fn form_values_from_fhir_patient(patient: &PatientData) -> FormValues {
    let name = patient.names.first();
    let additional = patient.names.get(1);

    let identifiers = patient
        .identifiers
        .iter()
        .filter_map(|identifier| {
            let key = identifier_key(identifier)?;
            let value = identifier.value.clone().unwrap_or_default();
            Some((
                key,
                PatientIdentifierValue {
                    identifier_uuid: identifier.id.clone(),
                    initial_value: value.clone(),
                    identifier_value: Some(value),
                    identifier_name: identifier
                        .type_text
                        .clone()
                        .or_else(|| identifier.system.clone())
                        .unwrap_or_default(),
                    ..PatientIdentifierValue::default()
                },
            ))
        })
        .collect();

    FormValues {
        patient_uuid: patient.id.clone(),
        given_name: given(name, 0),
        middle_name: given(name, 1),
        fathers_family_name: name.and_then(|n| n.family.clone()).unwrap_or_default(),
        mothers_family_name: name
            .and_then(|n| n.mothers_family.clone())
            .unwrap_or_default(),
        add_name_in_local_language: additional.is_some(),
        additional_given_name: given(additional, 0),
        additional_middle_name: given(additional, 1),
        additional_fathers_family_name: additional
            .and_then(|n| n.family.clone())
            .unwrap_or_default(),
        additional_mothers_family_name: additional
            .and_then(|n| n.mothers_family.clone())
            .unwrap_or_default(),
        gender: patient.gender.clone().unwrap_or_default(),
        birthdate: patient.birth_date.as_deref().and_then(parse_birthdate),
        telephone_number: patient.telecom.first().cloned().unwrap_or_default(),
        is_dead: patient.deceased,
        death_date: patient.deceased_date_time.map(|dt| dt.date_naive()),
        identifiers,
        ..FormValues::default()
    }
}

/// Address values of the patient's first address.
///
/// `city`, `state` and `district` map to `cityVillage`, `stateProvince` and
/// `countyDistrict`; extension values are keyed by the fragment of their URL.
pub fn address_values_from_fhir_patient(patient: &PatientData) -> AddressValues {
    let mut values = AddressValues::new();
    let Some(address) = patient.addresses.first() else {
        return values;
    };

    let standard = [
        ("cityVillage", &address.city),
        ("stateProvince", &address.state),
        ("countyDistrict", &address.district),
        ("country", &address.country),
        ("postalCode", &address.postal_code),
    ];
    for (field, value) in standard {
        if let (Some(value), Ok(field)) = (value, AddressField::new(field)) {
            values.set(field, value.clone());
        }
    }

    for (url, value) in &address.extensions {
        let Some(fragment) = url.split('#').nth(1) else {
            tracing::debug!(%url, "address extension without field fragment");
            continue;
        };
        match AddressField::new(fragment) {
            Ok(field) => values.set(field, value.clone()),
            Err(err) => tracing::warn!(%url, %err, "skipping address extension"),
        }
    }

    values
}

pub fn patient_uuid_map_from_fhir_patient(patient: &PatientData) -> PatientUuidMap {
    PatientUuidMap {
        preferred_name_uuid: patient.names.first().and_then(|n| n.id.clone()),
        additional_name_uuid: patient.names.get(1).and_then(|n| n.id.clone()),
        preferred_address_uuid: patient.addresses.first().and_then(|a| a.id.clone()),
        identifiers: patient
            .identifiers
            .iter()
            .filter_map(|identifier| {
                let key = identifier_key(identifier)?;
                Some((
                    key,
                    IdentifierRef {
                        uuid: identifier.id.clone(),
                        value: identifier.value.clone(),
                    },
                ))
            })
            .collect(),
    }
}

pub fn patient_identifiers_from_fhir_patient(patient: &PatientData) -> Vec<PatientIdentifier> {
    patient
        .identifiers
        .iter()
        .map(|identifier| PatientIdentifier {
            uuid: identifier.id.clone(),
            identifier: identifier.value.clone().unwrap_or_default(),
        })
        .collect()
}

/// Value for the phone person attribute: the first telecom entry.
pub fn phone_attribute_from_fhir_patient(patient: &PatientData) -> Option<String> {
    patient.telecom.first().cloned()
}

// ============================================================================
// Identifiers and encounters
// ============================================================================

/// Keeps identifiers that have a value, plus auto-generated ones whose source allows
/// manual entry.
pub fn filter_out_undefined_identifiers(
    identifiers: BTreeMap<String, PatientIdentifierValue>,
) -> BTreeMap<String, PatientIdentifierValue> {
    identifiers
        .into_iter()
        .filter(|(_, value)| {
            let manual_auto_generated = value.auto_generation
                && value
                    .selected_source
                    .as_ref()
                    .is_some_and(IdentifierSource::manual_entry_enabled);
            manual_auto_generated || value.identifier_value.is_some()
        })
        .collect()
}

/// Comparator ordering encounters newest first.
pub fn latest_first_encounter(a: &Encounter, b: &Encounter) -> Ordering {
    b.encounter_datetime.cmp(&a.encounter_datetime)
}

// ============================================================================
// Development data
// ============================================================================

/// Sample form values for development. Only the patient uuid differs between calls.
pub fn dummy_form_values() -> FormValues {
    let address = [
        ("address1", "Bom Jesus Street"),
        ("address2", ""),
        ("cityVillage", "Recife"),
        ("stateProvince", "Pernambuco"),
        ("country", "Brazil"),
        ("postalCode", "50030-310"),
    ]
    .into_iter()
    .filter_map(|(field, value)| Some((AddressField::new(field).ok()?, value.to_string())))
    .collect();

    FormValues {
        patient_uuid: uuid::Uuid::new_v4().to_string(),
        given_name: "John".into(),
        fathers_family_name: "Smith".into(),
        mothers_family_name: "Maroon".into(),
        additional_given_name: "Joey".into(),
        additional_fathers_family_name: "Smitty".into(),
        additional_mothers_family_name: "Doe".into(),
        add_name_in_local_language: true,
        gender: "Male".into(),
        birthdate: NaiveDate::from_ymd_opt(2020, 2, 1),
        years_estimated: 1,
        months_estimated: 2,
        birthdate_estimated: true,
        telephone_number: "0800001066".into(),
        address,
        ..FormValues::default()
    }
}
