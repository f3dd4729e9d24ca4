//! Constants used throughout the registration core crate.
//!
//! Limits and debounce windows shared by the core gating predicates and the REST client,
//! kept in one place so both sides agree.

use std::time::Duration;

/// Separator placed between parent values in an address hierarchy search key.
pub const SEARCH_KEY_SEPARATOR: &str = "|";

/// Default separator between levels in a full-address search result.
pub const DEFAULT_FULL_ADDRESS_SEPARATOR: &str = " > ";

/// Server-side limit for child address hierarchy entries.
pub const CHILD_ENTRIES_SERVER_LIMIT: usize = 50;

/// Number of child entries kept after a lookup.
pub const CHILD_ENTRIES_DISPLAY_LIMIT: usize = 20;

/// Server-side limit for full-address search.
pub const FULL_ADDRESS_SERVER_LIMIT: usize = 30;

/// Server-side limit for entries searched under a parent.
pub const ENTRIES_WITH_PARENT_SERVER_LIMIT: usize = 20;

/// Minimum trimmed query length before a full-address search is sent.
pub const FULL_ADDRESS_MIN_QUERY_LEN: usize = 2;

/// Idle time before a child-entry search fires.
pub const CHILD_ENTRIES_DEBOUNCE: Duration = Duration::from_millis(300);

/// Idle time before a full-address search fires.
pub const FULL_ADDRESS_DEBOUNCE: Duration = Duration::from_millis(500);

/// Regex applied to an address field when the template does not provide one.
pub const DEFAULT_FIELD_REGEX: &str = ".*";

/// Prefix of every person attribute field name in the registration form.
pub const ATTRIBUTE_FIELD_PREFIX: &str = "attributes";

/// Default label suffix for relationship types, relative to the patient.
pub const DEFAULT_RELATIONSHIP_LABEL_SUFFIX: &str = "del Paciente";

/// Default patient chart link template.
pub const DEFAULT_PATIENT_CHART_URL: &str = "${openmrsSpaBase}/patient/${patientUuid}/chart/";
