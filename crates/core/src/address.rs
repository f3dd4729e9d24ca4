//! Address hierarchy resolution.
//!
//! Address fields form a hierarchy (country, state, city, ...) whose order is configured on
//! the backend and fetched once per form session. Entry into a field is only enabled once
//! every field above it has a value, and the values above it form the search key used to
//! look up candidate entries. Changing a field clears every field below it.
//!
//! Everything here is a pure derivation over [`OrderedFields`] and [`AddressValues`]; the
//! lookups themselves live in the REST client.

use crate::constants::{
    CHILD_ENTRIES_DISPLAY_LIMIT, FULL_ADDRESS_MIN_QUERY_LEN, SEARCH_KEY_SEPARATOR,
};
use crate::error::RegistrationResult;
use reg_types::AddressField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hierarchy levels in rank order. Index 0 is the top level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedFields(Vec<AddressField>);

impl OrderedFields {
    pub fn new(fields: Vec<AddressField>) -> Self {
        Self(fields)
    }

    /// Builds the hierarchy from raw field names as returned by the backend.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Text` if any name is not a valid field name.
    pub fn from_names<I, S>(names: I) -> RegistrationResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = names
            .into_iter()
            .map(AddressField::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(fields))
    }

    /// Rank of `field` in the hierarchy, or `None` when the field is not part of it.
    pub fn rank(&self, field: &str) -> Option<usize> {
        self.0.iter().position(|f| f.as_str() == field)
    }

    /// Fields ranked strictly above `field`. Empty when the field is unranked.
    pub fn ancestors(&self, field: &str) -> &[AddressField] {
        match self.rank(field) {
            Some(rank) => &self.0[..rank],
            None => &[],
        }
    }

    /// Fields ranked strictly below `field`. Empty when the field is last or unranked.
    pub fn descendants(&self, field: &str) -> &[AddressField] {
        match self.rank(field) {
            Some(rank) => &self.0[rank + 1..],
            None => &[],
        }
    }

    pub fn as_slice(&self) -> &[AddressField] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Current value of each address field, owned by the form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressValues(BTreeMap<AddressField, String>);

impl AddressValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// True when the field holds a non-empty value.
    pub fn is_filled(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: AddressField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddressField, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(AddressField, String)> for AddressValues {
    fn from_iter<T: IntoIterator<Item = (AddressField, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether a field accepts input, and the key used to search its candidate entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSearchConfig {
    /// Rank of the field, `None` when it is not part of the hierarchy.
    pub rank: Option<usize>,
    pub enabled: bool,
    pub search_key: String,
}

/// Derives the search configuration of `target_field`.
///
/// The field is enabled iff every field ranked above it is filled. The scan stops at the
/// first empty ancestor, and the search key only holds the values collected before that
/// point, joined with `|`. A field outside the hierarchy is always enabled with an empty key.
pub fn compute_field_config(
    ordered_fields: &OrderedFields,
    address_values: &AddressValues,
    target_field: &str,
) -> FieldSearchConfig {
    let rank = ordered_fields.rank(target_field);

    let mut enabled = true;
    let mut collected: Vec<&str> = Vec::new();
    for field in ordered_fields.ancestors(target_field) {
        match address_values.get(field.as_str()) {
            Some(value) if !value.is_empty() => collected.push(value),
            _ => {
                enabled = false;
                break;
            }
        }
    }

    FieldSearchConfig {
        rank,
        enabled,
        search_key: collected.join(SEARCH_KEY_SEPARATOR),
    }
}

/// Clears every field ranked below `target_field`, in ascending rank order.
///
/// `set_field_value` is called once per descendant with an empty value, and never for the
/// target itself or anything above it. Nothing happens when the target is last or unranked.
pub fn reset_descendant_fields<F>(
    ordered_fields: &OrderedFields,
    target_field: &str,
    mut set_field_value: F,
) where
    F: FnMut(&AddressField, &str),
{
    for field in ordered_fields.descendants(target_field) {
        set_field_value(field, "");
    }
}

/// One address form section: the session's hierarchy together with the form's values.
#[derive(Clone, Debug, Default)]
pub struct AddressHierarchyForm {
    ordered_fields: OrderedFields,
    values: AddressValues,
}

impl AddressHierarchyForm {
    pub fn new(ordered_fields: OrderedFields, values: AddressValues) -> Self {
        Self {
            ordered_fields,
            values,
        }
    }

    pub fn ordered_fields(&self) -> &OrderedFields {
        &self.ordered_fields
    }

    pub fn values(&self) -> &AddressValues {
        &self.values
    }

    pub fn into_values(self) -> AddressValues {
        self.values
    }

    pub fn field_config(&self, field: &str) -> FieldSearchConfig {
        compute_field_config(&self.ordered_fields, &self.values, field)
    }

    /// Sets `field` and clears everything ranked below it.
    pub fn change_field(&mut self, field: AddressField, value: impl Into<String>) {
        let values = &mut self.values;
        reset_descendant_fields(&self.ordered_fields, field.as_str(), |descendant, empty| {
            values.set(descendant.clone(), empty);
        });
        self.values.set(field, value);
    }
}

/// Whether a child-entry lookup should be sent for the debounced search string.
pub fn should_fetch_child_entries(fetch_enabled: bool, search_string: &str) -> bool {
    fetch_enabled && !search_string.is_empty()
}

/// Whether a full-address search should be sent for the debounced query.
pub fn should_search_full_address(query: &str) -> bool {
    query.trim().chars().count() >= FULL_ADDRESS_MIN_QUERY_LEN
}

/// Whether an entries-with-parent search should be sent.
pub fn should_search_with_parent(query: &str) -> bool {
    !query.is_empty()
}

/// Keeps the first entries of a child-entry lookup.
pub fn truncate_child_entries(mut entries: Vec<String>) -> Vec<String> {
    entries.truncate(CHILD_ENTRIES_DISPLAY_LIMIT);
    entries
}

/// Case-insensitive substring filter applied to fetched entries while the user types.
pub fn filter_entries<'a>(entries: &'a [String], input: &str) -> Vec<&'a str> {
    if input.is_empty() {
        return entries.iter().map(String::as_str).collect();
    }
    let needle = input.to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.to_lowercase().contains(&needle))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> OrderedFields {
        OrderedFields::from_names(names.iter().copied()).expect("valid field names")
    }

    fn values(pairs: &[(&str, &str)]) -> AddressValues {
        pairs
            .iter()
            .map(|(k, v)| (AddressField::new(k).expect("valid field"), v.to_string()))
            .collect()
    }

    #[test]
    fn first_field_is_always_enabled_with_empty_key() {
        let ordered = fields(&["country", "stateProvince", "cityVillage"]);
        let config = compute_field_config(&ordered, &AddressValues::new(), "country");

        assert_eq!(config.rank, Some(0));
        assert!(config.enabled);
        assert_eq!(config.search_key, "");
    }

    #[test]
    fn unranked_field_is_enabled_with_empty_key() {
        let ordered = fields(&["country", "stateProvince"]);
        let config = compute_field_config(&ordered, &values(&[("country", "")]), "postalCode");

        assert_eq!(
            config,
            FieldSearchConfig {
                rank: None,
                enabled: true,
                search_key: String::new(),
            }
        );
    }

    #[test]
    fn empty_hierarchy_leaves_every_field_enabled() {
        let config = compute_field_config(&OrderedFields::default(), &AddressValues::new(), "x");
        assert!(config.enabled);
        assert_eq!(config.rank, None);
    }

    #[test]
    fn missing_parent_disables_field_and_keeps_collected_prefix() {
        let ordered = fields(&["country", "stateProvince", "cityVillage"]);
        let config = compute_field_config(
            &ordered,
            &values(&[("country", "Peru"), ("stateProvince", "")]),
            "cityVillage",
        );

        assert!(!config.enabled);
        assert_eq!(config.search_key, "Peru");
    }

    #[test]
    fn filled_parents_enable_field_and_join_key() {
        let ordered = fields(&["country", "stateProvince", "cityVillage"]);
        let config = compute_field_config(
            &ordered,
            &values(&[("country", "Peru"), ("stateProvince", "Lima")]),
            "cityVillage",
        );

        assert!(config.enabled);
        assert_eq!(config.search_key, "Peru|Lima");
        assert_eq!(config.rank, Some(2));
    }

    #[test]
    fn scan_stops_at_first_gap_even_if_later_parents_are_filled() {
        let ordered = fields(&["country", "stateProvince", "countyDistrict", "cityVillage"]);
        let config = compute_field_config(
            &ordered,
            &values(&[("stateProvince", "Lima"), ("countyDistrict", "Lima")]),
            "cityVillage",
        );

        assert!(!config.enabled);
        assert_eq!(config.search_key, "");
    }

    #[test]
    fn reset_clears_only_descendants_in_rank_order() {
        let ordered = fields(&["country", "stateProvince", "countyDistrict", "cityVillage"]);
        let mut calls = Vec::new();

        reset_descendant_fields(&ordered, "stateProvince", |field, value| {
            calls.push((field.to_string(), value.to_string()));
        });

        assert_eq!(
            calls,
            vec![
                ("countyDistrict".to_string(), String::new()),
                ("cityVillage".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn reset_is_noop_for_last_or_unranked_field() {
        let ordered = fields(&["country", "stateProvince"]);
        let mut calls = 0;

        reset_descendant_fields(&ordered, "stateProvince", |_, _| calls += 1);
        reset_descendant_fields(&ordered, "address1", |_, _| calls += 1);

        assert_eq!(calls, 0);
    }

    #[test]
    fn changing_a_field_clears_lower_levels() {
        let ordered = fields(&["country", "stateProvince", "cityVillage"]);
        let mut form = AddressHierarchyForm::new(
            ordered,
            values(&[
                ("country", "Peru"),
                ("stateProvince", "Lima"),
                ("cityVillage", "Miraflores"),
            ]),
        );

        form.change_field(AddressField::new("stateProvince").unwrap(), "Cusco");

        assert_eq!(form.values().get("country"), Some("Peru"));
        assert_eq!(form.values().get("stateProvince"), Some("Cusco"));
        assert_eq!(form.values().get("cityVillage"), Some(""));
        assert!(form.field_config("cityVillage").enabled);
        assert_eq!(form.field_config("cityVillage").search_key, "Peru|Cusco");
    }

    #[test]
    fn from_names_rejects_invalid_names() {
        assert!(OrderedFields::from_names(["country", "city village"]).is_err());
    }

    #[test]
    fn fetch_gates() {
        assert!(!should_fetch_child_entries(false, "Peru"));
        assert!(!should_fetch_child_entries(true, ""));
        assert!(should_fetch_child_entries(true, "Peru"));

        assert!(!should_search_full_address(" a "));
        assert!(should_search_full_address("Li"));
        assert!(should_search_full_address("Ñu"));

        assert!(!should_search_with_parent(""));
        assert!(should_search_with_parent("M"));
    }

    #[test]
    fn child_entries_are_truncated_to_display_limit() {
        let entries: Vec<String> = (0..50).map(|i| format!("entry {i}")).collect();
        let kept = truncate_child_entries(entries);
        assert_eq!(kept.len(), CHILD_ENTRIES_DISPLAY_LIMIT);
        assert_eq!(kept[0], "entry 0");
    }

    #[test]
    fn entries_filter_ignores_case() {
        let entries = vec!["Miraflores".to_string(), "San Isidro".to_string()];
        assert_eq!(filter_entries(&entries, "mira"), vec!["Miraflores"]);
        assert_eq!(filter_entries(&entries, "").len(), 2);
    }
}
