//! Address validation.
//!
//! Compiles the rules extracted from the address template and applies them to the values of
//! the address section. A field passes when it is absent or when its value contains a
//! match for the field regex; the violation message is the template's regex format.

use crate::address::AddressValues;
use crate::error::{RegistrationError, RegistrationResult};
use crate::template::AddressTemplateRule;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A field value that failed its template rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    pub field: String,
    pub value: String,
    pub message: String,
}

#[derive(Clone, Debug)]
struct CompiledRule {
    name: String,
    regex: Regex,
    message: String,
}

/// Compiled per-field rules for the address section.
#[derive(Clone, Debug, Default)]
pub struct AddressValidationSchema {
    rules: Vec<CompiledRule>,
}

impl AddressValidationSchema {
    /// Compiles every rule's regex.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidRegex` naming the first field whose regex does not
    /// compile.
    pub fn from_rules(rules: &[AddressTemplateRule]) -> RegistrationResult<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex =
                    Regex::new(&rule.regex).map_err(|source| RegistrationError::InvalidRegex {
                        field: rule.name.clone(),
                        source,
                    })?;
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    regex,
                    message: rule.regex_format.clone(),
                })
            })
            .collect::<RegistrationResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Validates one field. Unknown fields and absent values pass.
    pub fn validate_field(&self, field: &str, value: Option<&str>) -> Option<FieldViolation> {
        let rule = self.rules.iter().find(|r| r.name == field)?;
        let value = value?;

        if rule.regex.is_match(value) {
            return None;
        }

        Some(FieldViolation {
            field: rule.name.clone(),
            value: value.to_string(),
            message: rule.message.clone(),
        })
    }

    /// Validates every ruled field, in rule order.
    pub fn validate(&self, values: &AddressValues) -> Vec<FieldViolation> {
        self.rules
            .iter()
            .filter_map(|rule| self.validate_field(&rule.name, values.get(&rule.name)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
