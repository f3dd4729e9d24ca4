//! Registration configuration.
//!
//! Field configurations are deployment specific (which person attribute holds the civil
//! status, which concept set lists the ethnicities, ...). They are loaded once at startup
//! from a YAML file and passed into the services, rather than read on demand.

use crate::attributes::CustomConceptAnswer;
use crate::constants::{
    DEFAULT_FULL_ADDRESS_SEPARATOR, DEFAULT_PATIENT_CHART_URL, DEFAULT_RELATIONSHIP_LABEL_SUFFIX,
};
use crate::error::{RegistrationError, RegistrationResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level registration configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationConfig {
    pub field_configurations: FieldConfigurations,
    pub address_hierarchy: AddressHierarchyConfig,
    pub search: SearchConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldConfigurations {
    pub civil_status: Option<CivilStatusConfig>,
    pub etnia: Option<CodedAttributeConfig>,
    pub religion: Option<CodedAttributeConfig>,
    pub relationships: RelationshipsConfig,
}

/// Civil status person attribute, forced to "single" below the marriageable age.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivilStatusConfig {
    pub person_attribute_uuid: String,
    pub answer_concept_set_uuid: String,
    pub marriageable_age: u32,
    pub single_status_concept_uuid: String,
}

/// A coded person attribute answered from a concept set or a fixed answer list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodedAttributeConfig {
    pub person_attribute_uuid: String,
    pub answer_concept_set_uuid: String,
    pub custom_concept_answers: Vec<CustomConceptAnswer>,
    /// Accept free text that matches no answer, committed when the field loses focus.
    pub allow_custom_values: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipsConfig {
    /// Relationship type UUIDs offered in the form. Empty offers every type.
    pub allowed_relationship_types: Vec<String>,
    pub label_suffix: String,
}

impl Default for RelationshipsConfig {
    fn default() -> Self {
        Self {
            allowed_relationship_types: Vec::new(),
            label_suffix: DEFAULT_RELATIONSHIP_LABEL_SUFFIX.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressHierarchyConfig {
    pub full_address_separator: String,
}

impl Default for AddressHierarchyConfig {
    fn default() -> Self {
        Self {
            full_address_separator: DEFAULT_FULL_ADDRESS_SEPARATOR.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Identifier type code of auto-generated identifiers, hidden in search banners.
    pub auto_generate_identifier: Option<String>,
    pub patient_chart_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            auto_generate_identifier: None,
            patient_chart_url: DEFAULT_PATIENT_CHART_URL.to_string(),
        }
    }
}

impl RegistrationConfig {
    /// Parses and validates a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::ConfigParse` for invalid YAML and
    /// `RegistrationError::InvalidInput` when a configured field is incomplete.
    pub fn from_yaml_str(yaml_text: &str) -> RegistrationResult<Self> {
        let cfg: Self = serde_yaml::from_str(yaml_text).map_err(RegistrationError::ConfigParse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and validates the YAML configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::ConfigRead` if the file cannot be read, otherwise the
    /// errors of [`RegistrationConfig::from_yaml_str`].
    pub fn load(path: &Path) -> RegistrationResult<Self> {
        let yaml_text = std::fs::read_to_string(path).map_err(RegistrationError::ConfigRead)?;
        Self::from_yaml_str(&yaml_text)
    }

    fn validate(&self) -> RegistrationResult<()> {
        let fields = &self.field_configurations;

        if let Some(civil_status) = &fields.civil_status {
            if civil_status.person_attribute_uuid.trim().is_empty() {
                return Err(RegistrationError::InvalidInput(
                    "civilStatus.personAttributeUuid cannot be empty".into(),
                ));
            }
            if civil_status.single_status_concept_uuid.trim().is_empty() {
                return Err(RegistrationError::InvalidInput(
                    "civilStatus.singleStatusConceptUuid cannot be empty".into(),
                ));
            }
        }

        for (name, coded) in [("etnia", &fields.etnia), ("religion", &fields.religion)] {
            if let Some(coded) = coded {
                if coded.person_attribute_uuid.trim().is_empty() {
                    return Err(RegistrationError::InvalidInput(format!(
                        "{name}.personAttributeUuid cannot be empty"
                    )));
                }
            }
        }

        if self.address_hierarchy.full_address_separator.is_empty() {
            return Err(RegistrationError::InvalidInput(
                "addressHierarchy.fullAddressSeparator cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
fieldConfigurations:
  civilStatus:
    personAttributeUuid: 8d871f2a-c2cc-11de-8d13-0010c6dffd0f
    answerConceptSetUuid: 1054AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA
    marriageableAge: 18
    singleStatusConceptUuid: 5555AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA
  etnia:
    personAttributeUuid: 4a2b7c1e-0d1f-4c3a-9b8e-6f5d4c3b2a10
    answerConceptSetUuid: 9f3e2d1c-0b1a-4c5d-8e7f-6a5b4c3d2e1f
  religion:
    personAttributeUuid: 7c6b5a49-3827-4165-a4b3-c2d1e0f9a8b7
    customConceptAnswers:
      - uuid: rel-catholic
        label: Católica
      - uuid: rel-none
    allowCustomValues: true
  relationships:
    allowedRelationshipTypes:
      - 8d91a210-c2cc-11de-8d13-0010c6dffd0f
search:
  autoGenerateIdentifier: 05a29f94-c0ed-11e2-94be-8c13b969e334
"#;

    #[test]
    fn parses_full_configuration() {
        let cfg = RegistrationConfig::from_yaml_str(SAMPLE).expect("valid configuration");

        let civil_status = cfg
            .field_configurations
            .civil_status
            .as_ref()
            .expect("civil status configured");
        assert_eq!(civil_status.marriageable_age, 18);

        let religion = cfg
            .field_configurations
            .religion
            .as_ref()
            .expect("religion configured");
        assert_eq!(religion.custom_concept_answers.len(), 2);
        assert_eq!(religion.custom_concept_answers[1].label, None);
        assert!(religion.allow_custom_values);
        assert_eq!(religion.answer_concept_set_uuid, "");

        assert_eq!(
            cfg.field_configurations
                .relationships
                .allowed_relationship_types
                .len(),
            1
        );
        assert_eq!(cfg.field_configurations.relationships.label_suffix, "del Paciente");
        assert_eq!(cfg.address_hierarchy.full_address_separator, " > ");
        assert_eq!(
            cfg.search.auto_generate_identifier.as_deref(),
            Some("05a29f94-c0ed-11e2-94be-8c13b969e334")
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = RegistrationConfig::from_yaml_str("{}").expect("valid configuration");
        assert_eq!(cfg, RegistrationConfig::default());
        assert!(cfg.field_configurations.civil_status.is_none());
    }

    #[test]
    fn rejects_civil_status_without_attribute() {
        let yaml = r#"
fieldConfigurations:
  civilStatus:
    personAttributeUuid: ""
    answerConceptSetUuid: x
    marriageableAge: 16
    singleStatusConceptUuid: y
"#;
        let err = RegistrationConfig::from_yaml_str(yaml).expect_err("should reject");
        assert!(matches!(err, RegistrationError::InvalidInput(_)));
    }

    #[test]
    fn reports_yaml_errors() {
        let err = RegistrationConfig::from_yaml_str("fieldConfigurations: [")
            .expect_err("should reject broken yaml");
        assert!(matches!(err, RegistrationError::ConfigParse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write config");

        let cfg = RegistrationConfig::load(file.path()).expect("load configuration");
        assert!(cfg.field_configurations.etnia.is_some());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let err = RegistrationConfig::load(&dir.path().join("missing.yaml"))
            .expect_err("file does not exist");
        assert!(matches!(err, RegistrationError::ConfigRead(_)));
    }
}
