//! Patient search results.

use fhir::{IdentifierData, PatientData};

/// Identifiers shown in a search banner.
///
/// Auto-generated identifiers (type code equal to `auto_generated_code`) are hidden, but
/// only when the patient has at least one coded identifier of another type; otherwise every
/// identifier is kept so the banner never goes blank.
pub fn banner_identifiers<'a>(
    identifiers: &'a [IdentifierData],
    auto_generated_code: Option<&str>,
) -> Vec<&'a IdentifierData> {
    let Some(auto_code) = auto_generated_code else {
        return identifiers.iter().collect();
    };
    let is_auto = |id: &IdentifierData| id.type_code.as_deref() == Some(auto_code);

    let has_other_coded = identifiers
        .iter()
        .any(|id| id.type_code.is_some() && !is_auto(id));

    identifiers
        .iter()
        .filter(|id| !has_other_coded || !is_auto(id))
        .collect()
}

pub fn is_deceased(patient: &PatientData) -> bool {
    patient.deceased || patient.deceased_date_time.is_some()
}

/// Replaces each `${name}` placeholder with its value. Unknown placeholders are left as is.
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("${{{name}}}"), value)
        })
}

/// Chart link for a search result.
pub fn patient_chart_url(template: &str, spa_base: &str, patient_uuid: &str) -> String {
    interpolate(
        template,
        &[("openmrsSpaBase", spa_base), ("patientUuid", patient_uuid)],
    )
}
