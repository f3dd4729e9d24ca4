//! # Registration Core
//!
//! Business logic for patient registration forms.
//!
//! This crate contains pure data operations over values fetched from the backend:
//! - Address hierarchy resolution (field enablement, search keys, descendant reset)
//! - Address template parsing and per-field validation
//! - Person attribute rules (civil status, coded autocomplete fields)
//! - Relationship editing
//! - Mapping FHIR patients onto form values
//! - Search banner and queue removal helpers
//!
//! **No I/O concerns** beyond reading the configuration file: HTTP lookups, debouncing and
//! caching belong in `openmrs-client`, the REST facade in `api-rest`.

pub mod address;
pub mod attributes;
pub mod config;
pub mod constants;
pub mod error;
pub mod form;
pub mod queue;
pub mod relationships;
pub mod search;
pub mod template;
pub mod validation;

pub use address::{
    compute_field_config, reset_descendant_fields, AddressHierarchyForm, AddressValues,
    FieldSearchConfig, OrderedFields,
};
pub use config::RegistrationConfig;
pub use error::{RegistrationError, RegistrationResult};
pub use template::{default_address_values, parse_address_template, AddressTemplateRule};
pub use validation::{AddressValidationSchema, FieldViolation};

pub use reg_types::{AddressField, NonEmptyText, TextError};
