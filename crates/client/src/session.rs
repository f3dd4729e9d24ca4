//! Registration form session.
//!
//! Address levels, template rules and relationship types are fetched once per form session
//! and shared by every field. The session owns those caches and drops them on teardown.

use crate::cache::SessionCache;
use crate::error::{ClientError, ClientResult};
use crate::OpenmrsClient;
use reg_core::relationships::RelationshipType;
use reg_core::{parse_address_template, AddressTemplateRule, AddressValidationSchema, OrderedFields};
use std::sync::Arc;

pub struct RegistrationSession {
    client: OpenmrsClient,
    ordered_fields: SessionCache<Arc<OrderedFields>>,
    template_rules: SessionCache<Arc<Vec<AddressTemplateRule>>>,
    relationship_types: SessionCache<Arc<Vec<RelationshipType>>>,
}

impl RegistrationSession {
    pub fn new(client: OpenmrsClient) -> Self {
        Self {
            client,
            ordered_fields: SessionCache::new(),
            template_rules: SessionCache::new(),
            relationship_types: SessionCache::new(),
        }
    }

    pub fn client(&self) -> &OpenmrsClient {
        &self.client
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the levels cannot be fetched.
    pub async fn ordered_fields(&self) -> ClientResult<Arc<OrderedFields>> {
        self.ordered_fields
            .get_or_try_load(|| async {
                Ok::<_, ClientError>(Arc::new(self.client.ordered_fields().await?))
            })
            .await
    }

    /// Rules of the address template. Empty when the template setting is unset.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the setting cannot be fetched or the template is malformed.
    pub async fn template_rules(&self) -> ClientResult<Arc<Vec<AddressTemplateRule>>> {
        self.template_rules
            .get_or_try_load(|| async {
                let rules = match self.client.address_template_xml().await? {
                    Some(xml) => parse_address_template(&xml)?,
                    None => {
                        tracing::warn!("address template setting is not configured");
                        Vec::new()
                    }
                };
                Ok::<_, ClientError>(Arc::new(rules))
            })
            .await
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the rules cannot be loaded or a regex does not compile.
    pub async fn validation_schema(&self) -> ClientResult<AddressValidationSchema> {
        let rules = self.template_rules().await?;
        Ok(AddressValidationSchema::from_rules(&rules)?)
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the types cannot be fetched.
    pub async fn relationship_types(&self) -> ClientResult<Arc<Vec<RelationshipType>>> {
        self.relationship_types
            .get_or_try_load(|| async {
                Ok::<_, ClientError>(Arc::new(self.client.relationship_types().await?))
            })
            .await
    }

    /// Drops every cached value. The next access refetches.
    pub async fn invalidate(&self) {
        self.ordered_fields.invalidate().await;
        self.template_rules.invalidate().await;
        self.relationship_types.invalidate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTransport;
    use serde_json::json;

    const LEVELS: &str = "/module/addresshierarchy/ajax/getOrderedAddressHierarchyLevels.form";
    const SETTING: &str = "/ws/rest/v1/systemsetting";

    const TEMPLATE: &str = r#"<org.openmrs.layout.address.AddressTemplate>
  <nameMappings class="properties">
    <property name="postalCode" value="Location.postalCode"/>
  </nameMappings>
  <elementRegex class="properties">
    <property name="postalCode" value="^\d{5}$"/>
  </elementRegex>
  <elementRegexFormats class="properties">
    <property name="postalCode" value="5 digits"/>
  </elementRegexFormats>
</org.openmrs.layout.address.AddressTemplate>"#;

    fn session(fake: FakeTransport) -> (RegistrationSession, Arc<FakeTransport>) {
        let fake = Arc::new(fake);
        (
            RegistrationSession::new(OpenmrsClient::new(fake.clone())),
            fake,
        )
    }

    #[tokio::test]
    async fn caches_levels_until_invalidated() {
        let (session, fake) = session(
            FakeTransport::new().respond(LEVELS, json!([{"addressField": "country"}])),
        );

        session.ordered_fields().await.expect("levels");
        session.ordered_fields().await.expect("levels");
        assert_eq!(fake.calls().len(), 1);

        session.invalidate().await;
        session.ordered_fields().await.expect("levels");
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn builds_schema_from_template_setting() {
        let (session, _) = session(
            FakeTransport::new().respond(SETTING, json!({"results": [{"value": TEMPLATE}]})),
        );

        let rules = session.template_rules().await.expect("rules");
        assert_eq!(rules[0].name, "postalCode");
        assert_eq!(rules[0].label, "Location.postalCode");

        let schema = session.validation_schema().await.expect("schema");
        assert_eq!(schema.len(), 1);
        let violation = schema
            .validate_field("postalCode", Some("15O74"))
            .expect("invalid postal code");
        assert_eq!(violation.message, "5 digits");
    }

    #[tokio::test]
    async fn unset_template_yields_no_rules() {
        let (session, _) = session(FakeTransport::new().respond(SETTING, json!({"results": []})));
        assert!(session.template_rules().await.expect("rules").is_empty());
    }

    #[tokio::test]
    async fn malformed_template_is_an_error() {
        let (session, _) = session(FakeTransport::new().respond(
            SETTING,
            json!({"results": [{"value": "<org.openmrs.layout.address.AddressTemplate/>"}]}),
        ));

        let err = session.template_rules().await.expect_err("no nameMappings");
        assert!(matches!(err, ClientError::Registration(_)));
    }
}
