//! FHIR wire/boundary support for patient registration.
//!
//! This crate provides **wire models** and **translation helpers** for the FHIR `Patient`
//! resources returned by the backend when an existing patient is opened for editing.
//!
//! This crate focuses on:
//! - serialisation/deserialisation of the backend JSON
//! - translation between the nested wire structs and a flat domain struct
//!
//! Unlike the registration core, this crate knows nothing about form fields. Mapping a
//! patient onto form values lives in `reg-core`.

pub mod patient;

// Re-export facade
pub use patient::Patient;

// Re-export public domain-level types
pub use patient::{AddressData, HumanNameData, IdentifierData, PatientData};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
