//! Request and response bodies.
//!
//! These mirror the core types with OpenAPI schemas attached, so the core crate stays free
//! of HTTP concerns.

use reg_core::relationships::DisplayRelationshipType;
use reg_core::{AddressTemplateRule, FieldSearchConfig, FieldViolation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LevelsRes {
    /// Address fields, top level first.
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AddressValuesBody {
    /// Field name to current value.
    pub values: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfigRes {
    pub rank: Option<usize>,
    pub enabled: bool,
    pub search_key: String,
}

impl From<FieldSearchConfig> for FieldConfigRes {
    fn from(cfg: FieldSearchConfig) -> Self {
        Self {
            rank: cfg.rank,
            enabled: cfg.enabled,
            search_key: cfg.search_key,
        }
    }
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EntriesQuery {
    /// Parent search key, values of the fields above joined by `|`.
    pub search_string: String,
    /// Typed text used to narrow the returned entries.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FullAddressQuery {
    pub q: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EntriesRes {
    pub entries: Vec<String>,
    /// Lookup failure, when the backend could not be reached.
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRuleRes {
    pub name: String,
    pub label: String,
    pub regex: String,
    pub regex_format: String,
    pub default_value: String,
}

impl From<&AddressTemplateRule> for TemplateRuleRes {
    fn from(rule: &AddressTemplateRule) -> Self {
        Self {
            name: rule.name.clone(),
            label: rule.label.clone(),
            regex: rule.regex.clone(),
            regex_format: rule.regex_format.clone(),
            default_value: rule.default_value.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ViolationRes {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl From<FieldViolation> for ViolationRes {
    fn from(v: FieldViolation) -> Self {
        Self {
            field: v.field,
            value: v.value,
            message: v.message,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RelationshipTypeRes {
    pub display: String,
    pub uuid: String,
    pub direction: String,
    /// Selector value, `<uuid>/<direction>`.
    pub value: String,
}

impl From<DisplayRelationshipType> for RelationshipTypeRes {
    fn from(t: DisplayRelationshipType) -> Self {
        Self {
            value: t.value(),
            direction: t.direction.to_string(),
            display: t.display,
            uuid: t.uuid,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientFormRes {
    #[schema(value_type = Object)]
    pub form_values: serde_json::Value,
    #[schema(value_type = Object)]
    pub patient_uuid_map: serde_json::Value,
}
