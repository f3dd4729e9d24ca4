//! Address hierarchy lookups.
//!
//! Lookups never fail the form: a network or decode error is logged and returned next to an
//! empty result list, so the field degrades to free text.

use crate::error::{ClientError, ClientResult};
use crate::transport::decode;
use crate::OpenmrsClient;
use reg_core::address::{
    should_fetch_child_entries, should_search_full_address, should_search_with_parent,
    truncate_child_entries,
};
use reg_core::constants::{
    CHILD_ENTRIES_SERVER_LIMIT, ENTRIES_WITH_PARENT_SERVER_LIMIT, FULL_ADDRESS_SERVER_LIMIT,
};
use reg_core::OrderedFields;
use serde::{Deserialize, Serialize};

const LEVELS_PATH: &str = "/module/addresshierarchy/ajax/getOrderedAddressHierarchyLevels.form";
const CHILD_ENTRIES_PATH: &str =
    "/module/addresshierarchy/ajax/getChildAddressHierarchyEntries.form";
const FULL_ADDRESSES_PATH: &str = "/module/addresshierarchy/ajax/getPossibleFullAddresses.form";
const ENTRIES_WITH_PARENTS_PATH: &str =
    "/module/addresshierarchy/ajax/getPossibleAddressHierarchyEntriesWithParents.form";

/// Result of a lookup: the entries found, or an empty list and the error.
#[derive(Debug)]
pub struct LookupOutcome<T> {
    pub entries: Vec<T>,
    pub error: Option<ClientError>,
}

impl<T> LookupOutcome<T> {
    pub fn found(entries: Vec<T>) -> Self {
        Self {
            entries,
            error: None,
        }
    }

    /// Nothing was requested.
    pub fn skipped() -> Self {
        Self::found(Vec::new())
    }

    pub fn failed(error: ClientError) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(error),
        }
    }

    fn from_result(lookup: &str, result: ClientResult<Vec<T>>) -> Self {
        match result {
            Ok(entries) => Self::found(entries),
            Err(error) => {
                tracing::error!(lookup, %error, "address hierarchy lookup failed");
                Self::failed(error)
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// An entry found under a parent entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub uuid: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelWire {
    address_field: String,
}

#[derive(Deserialize)]
struct NamedEntryWire {
    name: String,
}

#[derive(Deserialize)]
struct FullAddressWire {
    address: String,
}

impl OpenmrsClient {
    /// Address fields in hierarchy order.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the request fails or a level is not a valid field name.
    pub async fn ordered_fields(&self) -> ClientResult<OrderedFields> {
        let value = self.transport().get_json(LEVELS_PATH, &[]).await?;
        let levels: Vec<LevelWire> = decode(LEVELS_PATH, value)?;
        Ok(OrderedFields::from_names(
            levels.into_iter().map(|level| level.address_field),
        )?)
    }

    /// Child entries under the parent search key (`value|value|...`), at most 20.
    ///
    /// Not requested when fetching is disabled for the field or the search key is empty.
    pub async fn child_entries(
        &self,
        fetch_enabled: bool,
        search_string: &str,
    ) -> LookupOutcome<String> {
        if !should_fetch_child_entries(fetch_enabled, search_string) {
            return LookupOutcome::skipped();
        }

        let result = self.fetch_child_entries(search_string).await;
        LookupOutcome::from_result("child entries", result)
    }

    /// Full addresses matching `query`, levels joined by `separator`.
    ///
    /// Not requested until the trimmed query has two characters.
    pub async fn full_addresses(&self, query: &str, separator: &str) -> LookupOutcome<String> {
        if !should_search_full_address(query) {
            return LookupOutcome::skipped();
        }

        let result = self.fetch_full_addresses(query, separator).await;
        LookupOutcome::from_result("full addresses", result)
    }

    /// Entries of `address_field` under `parent_uuid` matching `query`.
    pub async fn entries_with_parents(
        &self,
        address_field: &str,
        parent_uuid: &str,
        query: &str,
    ) -> LookupOutcome<HierarchyEntry> {
        if !should_search_with_parent(query) {
            return LookupOutcome::skipped();
        }

        let result = self
            .fetch_entries_with_parents(address_field, parent_uuid, query)
            .await;
        LookupOutcome::from_result("entries with parents", result)
    }

    async fn fetch_child_entries(&self, search_string: &str) -> ClientResult<Vec<String>> {
        let value = self
            .transport()
            .get_json(
                CHILD_ENTRIES_PATH,
                &[
                    ("searchString", search_string.to_string()),
                    ("limit", CHILD_ENTRIES_SERVER_LIMIT.to_string()),
                ],
            )
            .await?;
        let entries: Vec<NamedEntryWire> = decode(CHILD_ENTRIES_PATH, value)?;
        Ok(truncate_child_entries(
            entries.into_iter().map(|entry| entry.name).collect(),
        ))
    }

    async fn fetch_full_addresses(&self, query: &str, separator: &str) -> ClientResult<Vec<String>> {
        let value = self
            .transport()
            .get_json(
                FULL_ADDRESSES_PATH,
                &[
                    ("separator", separator.to_string()),
                    ("searchString", query.to_string()),
                    ("limit", FULL_ADDRESS_SERVER_LIMIT.to_string()),
                ],
            )
            .await?;
        let addresses: Vec<FullAddressWire> = decode(FULL_ADDRESSES_PATH, value)?;
        Ok(addresses.into_iter().map(|a| a.address).collect())
    }

    async fn fetch_entries_with_parents(
        &self,
        address_field: &str,
        parent_uuid: &str,
        query: &str,
    ) -> ClientResult<Vec<HierarchyEntry>> {
        let value = self
            .transport()
            .get_json(
                ENTRIES_WITH_PARENTS_PATH,
                &[
                    ("addressField", address_field.to_string()),
                    ("limit", ENTRIES_WITH_PARENT_SERVER_LIMIT.to_string()),
                    ("searchString", query.to_string()),
                    ("parentUuid", parent_uuid.to_string()),
                ],
            )
            .await?;
        decode(ENTRIES_WITH_PARENTS_PATH, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn client(fake: FakeTransport) -> (OpenmrsClient, Arc<FakeTransport>) {
        let fake = Arc::new(fake);
        (OpenmrsClient::new(fake.clone()), fake)
    }

    #[tokio::test]
    async fn fetches_ordered_fields() {
        let (client, _) = client(FakeTransport::new().respond(
            LEVELS_PATH,
            json!([
                {"addressField": "country", "name": "País"},
                {"addressField": "stateProvince", "name": "Departamento"},
                {"addressField": "cityVillage", "name": "Distrito"}
            ]),
        ));

        let fields = client.ordered_fields().await.expect("levels");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.rank("cityVillage"), Some(2));
    }

    #[tokio::test]
    async fn child_entries_are_truncated_to_twenty() {
        let names: Vec<_> = (0..50).map(|i| json!({"name": format!("Entry {i}")})).collect();
        let (client, fake) = client(FakeTransport::new().respond(CHILD_ENTRIES_PATH, json!(names)));

        let outcome = client.child_entries(true, "Perú|Lima").await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.entries.len(), 20);
        assert_eq!(outcome.entries[0], "Entry 0");

        let calls = fake.calls();
        assert_eq!(
            calls[0].query,
            vec![
                ("searchString".to_string(), "Perú|Lima".to_string()),
                ("limit".to_string(), "50".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn child_entries_skip_without_search_key() {
        let (client, fake) = client(FakeTransport::new());

        assert!(client.child_entries(true, "").await.entries.is_empty());
        assert!(client.child_entries(false, "Perú").await.entries.is_empty());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn full_address_needs_two_characters() {
        let (client, fake) = client(
            FakeTransport::new()
                .respond(FULL_ADDRESSES_PATH, json!([{"address": "Perú > Lima > Miraflores"}])),
        );

        assert!(client.full_addresses(" M ", " > ").await.entries.is_empty());
        assert!(fake.calls().is_empty());

        let outcome = client.full_addresses("Mi", " > ").await;
        assert_eq!(outcome.entries, vec!["Perú > Lima > Miraflores".to_string()]);
        assert_eq!(fake.calls()[0].query[2], ("limit".to_string(), "30".to_string()));
    }

    #[tokio::test]
    async fn failures_become_empty_outcomes() {
        let (client, _) = client(FakeTransport::new().fail(CHILD_ENTRIES_PATH, 500));

        let outcome = client.child_entries(true, "Perú").await;
        assert!(outcome.entries.is_empty());
        assert!(matches!(
            outcome.error,
            Some(ClientError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn undecodable_response_is_reported() {
        let (client, _) =
            client(FakeTransport::new().respond(FULL_ADDRESSES_PATH, json!({"unexpected": true})));

        let outcome = client.full_addresses("Lima", " > ").await;
        assert!(matches!(outcome.error, Some(ClientError::Decode { .. })));
    }

    #[tokio::test]
    async fn searches_entries_under_parent() {
        let (client, fake) = client(FakeTransport::new().respond(
            ENTRIES_WITH_PARENTS_PATH,
            json!([{"uuid": "e1", "name": "Miraflores"}]),
        ));

        assert!(client.entries_with_parents("cityVillage", "p1", "").await.entries.is_empty());

        let outcome = client.entries_with_parents("cityVillage", "p1", "Mira").await;
        assert_eq!(
            outcome.entries,
            vec![HierarchyEntry {
                uuid: "e1".into(),
                name: "Miraflores".into()
            }]
        );
        assert_eq!(fake.calls().len(), 1);
    }
}
