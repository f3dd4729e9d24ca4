use crate::attributes::AttributeConfigError;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] reg_types::TextError),

    #[error("malformed address template: {0}")]
    MalformedTemplate(String),
    #[error("failed to read address template XML: {0}")]
    TemplateXml(#[from] quick_xml::Error),
    #[error("invalid regex for address field {field}: {source}")]
    InvalidRegex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("missing configuration: {0}")]
    MissingConfiguration(#[from] AttributeConfigError),
    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse configuration YAML: {0}")]
    ConfigParse(serde_yaml::Error),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
}

pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
