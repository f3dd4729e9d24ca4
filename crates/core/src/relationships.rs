//! Relationship editing.
//!
//! Relationship types are bidirectional (`aIsToB` / `bIsToA`). The form offers each direction
//! as its own choice labelled relative to the patient, and tracks per-row actions so that
//! only added, updated or deleted relationships are sent on save.

use crate::config::RelationshipsConfig;
use crate::error::{RegistrationError, RegistrationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A relationship type as returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
    pub uuid: String,
    #[serde(rename = "displayAIsToB")]
    pub display_a_is_to_b: String,
    #[serde(rename = "displayBIsToA")]
    pub display_b_is_to_a: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipDirection {
    #[serde(rename = "aIsToB")]
    AIsToB,
    #[serde(rename = "bIsToA")]
    BIsToA,
}

impl RelationshipDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipDirection::AIsToB => "aIsToB",
            RelationshipDirection::BIsToA => "bIsToA",
        }
    }
}

impl fmt::Display for RelationshipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipDirection {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aIsToB" => Ok(RelationshipDirection::AIsToB),
            "bIsToA" => Ok(RelationshipDirection::BIsToA),
            other => Err(RegistrationError::InvalidInput(format!(
                "unknown relationship direction '{other}'"
            ))),
        }
    }
}

/// One choice in the relationship type selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRelationshipType {
    pub display: String,
    pub uuid: String,
    pub direction: RelationshipDirection,
}

impl DisplayRelationshipType {
    /// Selector value, `<uuid>/<direction>`.
    pub fn value(&self) -> String {
        format!("{}/{}", self.uuid, self.direction)
    }
}

/// Splits a selector value into the relationship type uuid and direction.
///
/// # Errors
///
/// Returns `RegistrationError::InvalidInput` if the value is not `<uuid>/<direction>`.
pub fn parse_relationship_type_value(
    value: &str,
) -> RegistrationResult<(String, RelationshipDirection)> {
    let (uuid, direction) = value.split_once('/').ok_or_else(|| {
        RegistrationError::InvalidInput(format!("relationship type '{value}' has no direction"))
    })?;
    if uuid.is_empty() {
        return Err(RegistrationError::InvalidInput(format!(
            "relationship type '{value}' has no uuid"
        )));
    }
    Ok((uuid.to_string(), direction.parse()?))
}

/// Builds the selector choices for the allowed relationship types.
///
/// Each type yields its `aIsToB` label; the `bIsToA` label is added, qualified by the
/// `aIsToB` name, only when the two directions differ.
pub fn display_relationship_types(
    types: &[RelationshipType],
    cfg: &RelationshipsConfig,
) -> Vec<DisplayRelationshipType> {
    let allowed = &cfg.allowed_relationship_types;
    let suffix = &cfg.label_suffix;

    types
        .iter()
        .filter(|t| allowed.is_empty() || allowed.contains(&t.uuid))
        .flat_map(|t| {
            let a_is_to_b = DisplayRelationshipType {
                display: format!("{} {suffix}", t.display_a_is_to_b),
                uuid: t.uuid.clone(),
                direction: RelationshipDirection::AIsToB,
            };
            let b_is_to_a = (t.display_a_is_to_b != t.display_b_is_to_a).then(|| {
                DisplayRelationshipType {
                    display: format!(
                        "{} {suffix} ({})",
                        t.display_b_is_to_a, t.display_a_is_to_b
                    ),
                    uuid: t.uuid.clone(),
                    direction: RelationshipDirection::BIsToA,
                }
            });
            std::iter::once(a_is_to_b).chain(b_is_to_a)
        })
        .collect()
}

// ============================================================================
// Form rows
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipAction {
    Add,
    Update,
    Delete,
}

/// One relationship row in the registration form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_person_name: Option<String>,
    pub related_person_uuid: String,
    /// Selector value, `<uuid>/<direction>`. Empty until chosen.
    #[serde(default)]
    pub relationship_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RelationshipAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_relationship_type: Option<String>,
    /// Backend uuid of an existing relationship.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl RelationshipValue {
    /// A relationship already stored in the backend.
    pub fn existing(
        uuid: impl Into<String>,
        related_person_uuid: impl Into<String>,
        related_person_name: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        let relationship_type = relationship_type.into();
        Self {
            related_person_name: Some(related_person_name.into()),
            related_person_uuid: related_person_uuid.into(),
            initial_relationship_type: Some(relationship_type.clone()),
            relationship_type,
            action: None,
            uuid: Some(uuid.into()),
        }
    }

    pub fn is_new(&self) -> bool {
        self.uuid.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.action == Some(RelationshipAction::Delete)
    }

    /// Type selection stays disabled until a related person is chosen.
    pub fn can_select_type(&self) -> bool {
        !self.related_person_uuid.is_empty()
    }
}

/// Row operations over the form's relationship list.
pub struct RelationshipsEditor<'a> {
    rows: &'a mut Vec<RelationshipValue>,
}

impl<'a> RelationshipsEditor<'a> {
    pub fn new(rows: &'a mut Vec<RelationshipValue>) -> Self {
        Self { rows }
    }

    /// Appends an empty row marked `Add` and returns its index.
    pub fn add(&mut self) -> usize {
        self.rows.push(RelationshipValue {
            action: Some(RelationshipAction::Add),
            ..RelationshipValue::default()
        });
        self.rows.len() - 1
    }

    /// Sets the related person. Returns `false` when the selection is empty, which leaves
    /// the row invalid.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidInput` for an unknown row.
    pub fn select_person(
        &mut self,
        index: usize,
        person_uuid: &str,
        person_name: Option<&str>,
    ) -> RegistrationResult<bool> {
        let row = self.row(index)?;
        row.related_person_uuid = person_uuid.to_string();
        if let Some(name) = person_name {
            row.related_person_name = Some(name.to_string());
        }
        Ok(!person_uuid.is_empty())
    }

    /// Sets the relationship type. A row without an action becomes `Update`.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidInput` for an unknown row or a malformed value.
    pub fn change_type(&mut self, index: usize, value: &str) -> RegistrationResult<()> {
        parse_relationship_type_value(value)?;
        let row = self.row(index)?;
        row.relationship_type = value.to_string();
        if row.action.is_none() {
            row.action = Some(RelationshipAction::Update);
        }
        Ok(())
    }

    /// Removes a row added in this session; marks any other row `Delete`.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidInput` for an unknown row.
    pub fn delete(&mut self, index: usize) -> RegistrationResult<()> {
        let row = self.row(index)?;
        if row.action == Some(RelationshipAction::Add) {
            self.rows.remove(index);
        } else {
            row.action = Some(RelationshipAction::Delete);
        }
        Ok(())
    }

    /// Undoes a delete: clears the action and restores the initial type.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidInput` for an unknown row.
    pub fn restore(&mut self, index: usize) -> RegistrationResult<()> {
        let row = self.row(index)?;
        row.action = None;
        row.relationship_type = row.initial_relationship_type.clone().unwrap_or_default();
        Ok(())
    }

    fn row(&mut self, index: usize) -> RegistrationResult<&mut RelationshipValue> {
        let len = self.rows.len();
        self.rows.get_mut(index).ok_or_else(|| {
            RegistrationError::InvalidInput(format!(
                "relationship row {index} does not exist ({len} rows)"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_type(uuid: &str, a: &str, b: &str) -> RelationshipType {
        RelationshipType {
            uuid: uuid.into(),
            display_a_is_to_b: a.into(),
            display_b_is_to_a: b.into(),
        }
    }

    #[test]
    fn labels_both_directions_relative_to_patient() {
        let types = [rel_type("parent", "Padre", "Hijo"), rel_type("sibling", "Hermano", "Hermano")];
        let display = display_relationship_types(&types, &RelationshipsConfig::default());

        let labels: Vec<_> = display.iter().map(|d| d.display.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Padre del Paciente", "Hijo del Paciente (Padre)", "Hermano del Paciente"]
        );
        assert_eq!(display[1].value(), "parent/bIsToA");
        assert_eq!(display[2].value(), "sibling/aIsToB");
    }

    #[test]
    fn allow_list_filters_types() {
        let types = [rel_type("parent", "Padre", "Hijo"), rel_type("doctor", "Doctor", "Paciente")];
        let cfg = RelationshipsConfig {
            allowed_relationship_types: vec!["doctor".into()],
            ..RelationshipsConfig::default()
        };

        let display = display_relationship_types(&types, &cfg);
        assert_eq!(display.len(), 2);
        assert!(display.iter().all(|d| d.uuid == "doctor"));
    }

    #[test]
    fn parses_selector_values() {
        assert_eq!(
            parse_relationship_type_value("abc/bIsToA").unwrap(),
            ("abc".to_string(), RelationshipDirection::BIsToA)
        );
        assert!(parse_relationship_type_value("abc").is_err());
        assert!(parse_relationship_type_value("abc/sideways").is_err());
        assert!(parse_relationship_type_value("/aIsToB").is_err());
    }

    #[test]
    fn new_rows_are_removed_on_delete() {
        let mut rows = Vec::new();
        let mut editor = RelationshipsEditor::new(&mut rows);
        let index = editor.add();
        assert!(!editor.select_person(index, "", None).unwrap());
        assert!(editor.select_person(index, "person-1", Some("Ana Quispe")).unwrap());
        editor.change_type(index, "parent/aIsToB").unwrap();
        editor.delete(index).unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn added_row_keeps_add_action_on_type_change() {
        let mut rows = Vec::new();
        let mut editor = RelationshipsEditor::new(&mut rows);
        let index = editor.add();
        editor.change_type(index, "parent/aIsToB").unwrap();

        assert_eq!(rows[0].action, Some(RelationshipAction::Add));
        assert_eq!(rows[0].related_person_uuid, "");
        assert!(!rows[0].can_select_type());
    }

    #[test]
    fn existing_rows_update_delete_and_restore() {
        let mut rows = vec![RelationshipValue::existing(
            "rel-1",
            "person-2",
            "Luis Huamán",
            "parent/aIsToB",
        )];
        let mut editor = RelationshipsEditor::new(&mut rows);

        editor.change_type(0, "parent/bIsToA").unwrap();
        editor.delete(0).unwrap();
        assert!(rows[0].is_deleted());
        assert_eq!(rows[0].relationship_type, "parent/bIsToA");

        RelationshipsEditor::new(&mut rows).restore(0).unwrap();
        assert_eq!(rows[0].action, None);
        assert_eq!(rows[0].relationship_type, "parent/aIsToB");
        assert!(!rows[0].is_new());
    }

    #[test]
    fn unknown_row_is_an_error() {
        let mut rows = Vec::new();
        let mut editor = RelationshipsEditor::new(&mut rows);
        assert!(matches!(editor.delete(3), Err(RegistrationError::InvalidInput(_))));
    }

    #[test]
    fn action_serializes_uppercase() {
        let json = serde_json::to_string(&RelationshipAction::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
    }
}
