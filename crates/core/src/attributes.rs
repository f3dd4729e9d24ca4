//! Person attribute rules.
//!
//! Covers the civil status attribute, forced to the single-status answer while the patient is
//! below the marriageable age, and the coded autocomplete attributes (ethnicity, religion)
//! whose answers come from a configured list or a concept set fetched from the backend.

use crate::config::{CivilStatusConfig, CodedAttributeConfig, RegistrationConfig};
use crate::constants::ATTRIBUTE_FIELD_PREFIX;
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration errors
// ============================================================================

/// Misconfiguration of an autocomplete attribute field.
///
/// These never fail the registration form: they are handed to an [`ErrorReporter`] and the
/// field is left out.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttributeConfigError {
    #[error(
        "the person attribute field '{field_id}' is of type 'autocomplete' but has been defined without an answer concept set UUID"
    )]
    NoAnswerSource { field_id: String },

    #[error(
        "the autocomplete person attribute field '{field_id}' has been defined with an invalid answer concept set UUID '{answer_concept_set_uuid}'"
    )]
    InvalidAnswerSet {
        field_id: String,
        answer_concept_set_uuid: String,
    },

    #[error(
        "the autocomplete person attribute field '{field_id}' has been defined with an answer concept set UUID '{answer_concept_set_uuid}' that does not have any concept answers"
    )]
    EmptyAnswerSet {
        field_id: String,
        answer_concept_set_uuid: String,
    },
}

/// Receives attribute configuration errors.
pub trait ErrorReporter {
    fn report(&self, error: &AttributeConfigError);
}

/// Reports configuration errors through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &AttributeConfigError) {
        tracing::error!(%error, "person attribute field misconfigured");
    }
}

// ============================================================================
// Answers
// ============================================================================

/// A fixed answer from configuration. Without a label it is shown as empty text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomConceptAnswer {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A concept answer as returned by the concept endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptAnswer {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
}

/// A selectable autocomplete item. `id` is the stored value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerItem {
    pub id: String,
    pub text: String,
}

/// Form field name of a person attribute.
pub fn attribute_field_name(person_attribute_uuid: &str) -> String {
    format!("{ATTRIBUTE_FIELD_PREFIX}.{person_attribute_uuid}")
}

/// A person attribute field as rendered in the registration form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFieldDefinition {
    pub id: String,
    pub label: String,
    pub person_attribute_uuid: String,
    pub answer_concept_set_uuid: String,
    pub custom_concept_answers: Vec<CustomConceptAnswer>,
    pub allow_custom_values: bool,
    pub required: bool,
    pub disabled: bool,
}

impl AttributeFieldDefinition {
    fn coded(id: &str, label: &str, cfg: &CodedAttributeConfig) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            person_attribute_uuid: cfg.person_attribute_uuid.clone(),
            answer_concept_set_uuid: cfg.answer_concept_set_uuid.clone(),
            custom_concept_answers: cfg.custom_concept_answers.clone(),
            allow_custom_values: cfg.allow_custom_values,
            required: false,
            disabled: false,
        }
    }

    pub fn field_name(&self) -> String {
        attribute_field_name(&self.person_attribute_uuid)
    }

    /// Concept set to fetch answers from. `None` when custom answers take precedence or no
    /// set is configured.
    pub fn concept_set_to_fetch(&self) -> Option<&str> {
        if !self.custom_concept_answers.is_empty() || self.answer_concept_set_uuid.is_empty() {
            return None;
        }
        Some(&self.answer_concept_set_uuid)
    }

    /// Resolves the selectable items.
    ///
    /// Custom answers are used as configured, in order. Otherwise `fetched` holds the concept
    /// set answers (`None` when the set could not be loaded), sorted by display text.
    ///
    /// # Errors
    ///
    /// Returns an [`AttributeConfigError`] when no answer source is configured or the concept
    /// set is invalid or empty.
    pub fn answer_items(
        &self,
        fetched: Option<&[ConceptAnswer]>,
    ) -> Result<Vec<AnswerItem>, AttributeConfigError> {
        if !self.custom_concept_answers.is_empty() {
            return Ok(self
                .custom_concept_answers
                .iter()
                .map(|answer| AnswerItem {
                    id: answer.uuid.clone(),
                    text: answer.label.clone().unwrap_or_default(),
                })
                .collect());
        }

        if self.answer_concept_set_uuid.is_empty() {
            return Err(AttributeConfigError::NoAnswerSource {
                field_id: self.id.clone(),
            });
        }

        let answers = fetched.ok_or_else(|| AttributeConfigError::InvalidAnswerSet {
            field_id: self.id.clone(),
            answer_concept_set_uuid: self.answer_concept_set_uuid.clone(),
        })?;

        if answers.is_empty() {
            return Err(AttributeConfigError::EmptyAnswerSet {
                field_id: self.id.clone(),
                answer_concept_set_uuid: self.answer_concept_set_uuid.clone(),
            });
        }

        let mut items: Vec<AnswerItem> = answers
            .iter()
            .map(|answer| AnswerItem {
                id: answer.uuid.clone(),
                text: answer.display.clone().unwrap_or_default(),
            })
            .collect();
        items.sort_by(|a, b| {
            a.text
                .to_lowercase()
                .cmp(&b.text.to_lowercase())
                .then_with(|| a.text.cmp(&b.text))
        });
        Ok(items)
    }

    /// Like [`AttributeFieldDefinition::answer_items`], but reports the error and returns
    /// `None` so the caller can leave the field out.
    pub fn answer_items_or_report(
        &self,
        fetched: Option<&[ConceptAnswer]>,
        reporter: &dyn ErrorReporter,
    ) -> Option<Vec<AnswerItem>> {
        match self.answer_items(fetched) {
            Ok(items) => Some(items),
            Err(err) => {
                reporter.report(&err);
                None
            }
        }
    }
}

/// Ethnicity field, when configured.
pub fn etnia_field(cfg: &RegistrationConfig) -> Option<AttributeFieldDefinition> {
    cfg.field_configurations
        .etnia
        .as_ref()
        .map(|etnia| AttributeFieldDefinition::coded("etnia", "Etnia", etnia))
}

/// Religion field, when configured.
pub fn religion_field(cfg: &RegistrationConfig) -> Option<AttributeFieldDefinition> {
    cfg.field_configurations
        .religion
        .as_ref()
        .map(|religion| AttributeFieldDefinition::coded("religion", "Religión", religion))
}

// ============================================================================
// Autocomplete input
// ============================================================================

/// Items whose text contains `input`, ignoring case. Empty input keeps everything.
pub fn filter_items<'a>(items: &'a [AnswerItem], input: &str) -> Vec<&'a AnswerItem> {
    if input.is_empty() {
        return items.iter().collect();
    }
    let needle = input.to_lowercase();
    items
        .iter()
        .filter(|item| item.text.to_lowercase().contains(&needle))
        .collect()
}

/// Input and value state of one autocomplete attribute field.
#[derive(Clone, Debug)]
pub struct AutocompleteField {
    field_name: String,
    items: Vec<AnswerItem>,
    allow_custom_values: bool,
    input: String,
    value: String,
}

impl AutocompleteField {
    pub fn new(definition: &AttributeFieldDefinition, items: Vec<AnswerItem>, value: &str) -> Self {
        let input = items
            .iter()
            .find(|item| item.id == value)
            .map(|item| item.text.clone())
            .unwrap_or_default();

        Self {
            field_name: definition.field_name(),
            items,
            allow_custom_values: definition.allow_custom_values,
            input,
            value: value.to_string(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Stored value: an item id, a committed custom value or empty.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn selected_item(&self) -> Option<&AnswerItem> {
        self.items.iter().find(|item| item.id == self.value)
    }

    pub fn visible_items(&self) -> Vec<&AnswerItem> {
        filter_items(&self.items, &self.input)
    }

    /// Sets the value to the selected item id, or clears it when nothing is selected.
    pub fn select(&mut self, item_id: Option<&str>) {
        match item_id.and_then(|id| self.items.iter().find(|item| item.id == id)) {
            Some(item) => {
                self.value = item.id.clone();
                self.input = item.text.clone();
            }
            None => self.value.clear(),
        }
    }

    /// Records typed text. Non-empty text that matches no item exactly (ignoring case)
    /// clears the value.
    pub fn change_input(&mut self, input: &str) {
        self.input = input.to_string();
        if !input.is_empty() && self.exact_match(input).is_none() {
            self.value.clear();
        }
    }

    /// Commits typed text as a custom value when the field allows it. An exact match selects
    /// that item instead.
    pub fn blur(&mut self) {
        let typed = self.input.trim().to_string();
        if typed.is_empty() {
            return;
        }
        if let Some(id) = self.exact_match(&typed).map(|item| item.id.clone()) {
            self.value = id;
            return;
        }
        if self.allow_custom_values {
            self.value = typed;
        }
    }

    fn exact_match(&self, input: &str) -> Option<&AnswerItem> {
        let needle = input.to_lowercase();
        self.items
            .iter()
            .find(|item| item.text.to_lowercase() == needle)
    }
}

// ============================================================================
// Age and civil status
// ============================================================================

/// Parses a birthdate given as `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_birthdate(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Age in whole years on `today`. Negative for birthdates in the future.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

/// Rendering of the civil status field for the current birthdate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CivilStatusDecision {
    pub definition: AttributeFieldDefinition,
    /// Value to write into the form; `None` leaves the current value alone.
    pub forced_value: Option<String>,
}

pub fn civil_status_definition(cfg: &CivilStatusConfig) -> AttributeFieldDefinition {
    AttributeFieldDefinition {
        id: "civilStatus".to_string(),
        label: "Estado Civil".to_string(),
        person_attribute_uuid: cfg.person_attribute_uuid.clone(),
        answer_concept_set_uuid: cfg.answer_concept_set_uuid.clone(),
        custom_concept_answers: Vec::new(),
        allow_custom_values: false,
        required: false,
        disabled: false,
    }
}

/// Decides whether the civil status field is locked to the single status.
///
/// Below the marriageable age the field is disabled and, if the current value differs, the
/// single-status concept is forced. An unknown age leaves the field enabled.
pub fn civil_status_decision(
    cfg: &CivilStatusConfig,
    age: Option<i32>,
    current_value: Option<&str>,
) -> CivilStatusDecision {
    let mut definition = civil_status_definition(cfg);

    let underage = age.is_some_and(|age| i64::from(age) < i64::from(cfg.marriageable_age));
    if !underage {
        return CivilStatusDecision {
            definition,
            forced_value: None,
        };
    }

    definition.disabled = true;
    let forced_value = (current_value != Some(cfg.single_status_concept_uuid.as_str()))
        .then(|| cfg.single_status_concept_uuid.clone());

    CivilStatusDecision {
        definition,
        forced_value,
    }
}

/// Civil status field for a birthdate entered in the form. `None` when not configured.
pub fn civil_status_field(
    cfg: &RegistrationConfig,
    birthdate: Option<&str>,
    current_value: Option<&str>,
    today: NaiveDate,
) -> Option<CivilStatusDecision> {
    let civil_status = cfg.field_configurations.civil_status.as_ref()?;
    let age = birthdate
        .and_then(parse_birthdate)
        .map(|birthdate| age_on(birthdate, today));
    Some(civil_status_decision(civil_status, age, current_value))
}
