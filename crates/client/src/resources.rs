//! Registration resources: address template, concept answers, relationship types, people
//! and patients.

use crate::error::{ClientError, ClientResult};
use crate::transport::{decode, path_segment};
use crate::OpenmrsClient;
use fhir::{Patient, PatientData};
use reg_core::attributes::ConceptAnswer;
use reg_core::relationships::RelationshipType;
use serde::{Deserialize, Serialize};

const SYSTEM_SETTING_PATH: &str = "/ws/rest/v1/systemsetting";
const ADDRESS_TEMPLATE_SETTING: &str = "layout.address.format";
const RELATIONSHIP_TYPE_PATH: &str = "/ws/rest/v1/relationshiptype";
const PERSON_PATH: &str = "/ws/rest/v1/person";

#[derive(Deserialize)]
struct Results<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct SettingWire {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConceptWire {
    #[serde(default)]
    answers: Vec<ConceptAnswer>,
    #[serde(default)]
    set_members: Vec<ConceptAnswer>,
}

/// A person returned by the person search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub uuid: String,
    #[serde(default)]
    pub display: String,
}

impl OpenmrsClient {
    /// Raw XML of the address template system setting. `None` when the setting is unset.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the request fails or the response cannot be decoded.
    pub async fn address_template_xml(&self) -> ClientResult<Option<String>> {
        let value = self
            .transport()
            .get_json(
                SYSTEM_SETTING_PATH,
                &[
                    ("q", ADDRESS_TEMPLATE_SETTING.to_string()),
                    ("v", "custom:(value)".to_string()),
                ],
            )
            .await?;
        let settings: Results<SettingWire> = decode(SYSTEM_SETTING_PATH, value)?;
        Ok(settings
            .results
            .into_iter()
            .next()
            .and_then(|setting| setting.value)
            .filter(|xml| !xml.trim().is_empty()))
    }

    /// Answers of a coded concept, falling back to its set members.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the uuid is not a single path segment, otherwise a
    /// `ClientError` if the request fails; an unknown uuid is a 404 status.
    pub async fn concept_answers(&self, concept_uuid: &str) -> ClientResult<Vec<ConceptAnswer>> {
        let concept_uuid = path_segment("concept uuid", concept_uuid)?;
        let path = format!("/ws/rest/v1/concept/{concept_uuid}");
        let value = self
            .transport()
            .get_json(&path, &[("v", "custom:(answers,setMembers)".to_string())])
            .await?;
        let concept: ConceptWire = decode(&path, value)?;

        if concept.answers.is_empty() {
            Ok(concept.set_members)
        } else {
            Ok(concept.answers)
        }
    }

    /// Concept answers for an autocomplete field; `None` when the set could not be loaded.
    pub async fn concept_answers_or_none(&self, concept_uuid: &str) -> Option<Vec<ConceptAnswer>> {
        match self.concept_answers(concept_uuid).await {
            Ok(answers) => Some(answers),
            Err(error) => {
                tracing::warn!(concept_uuid, %error, "failed to load concept answers");
                None
            }
        }
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the request fails or the response cannot be decoded.
    pub async fn relationship_types(&self) -> ClientResult<Vec<RelationshipType>> {
        let value = self
            .transport()
            .get_json(RELATIONSHIP_TYPE_PATH, &[("v", "default".to_string())])
            .await?;
        let types: Results<RelationshipType> = decode(RELATIONSHIP_TYPE_PATH, value)?;
        Ok(types.results)
    }

    /// People matching `query`. An empty query returns no one without a request.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the request fails or the response cannot be decoded.
    pub async fn search_person(&self, query: &str) -> ClientResult<Vec<PersonSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let value = self
            .transport()
            .get_json(PERSON_PATH, &[("q", query.to_string())])
            .await?;
        let people: Results<PersonSummary> = decode(PERSON_PATH, value)?;
        Ok(people.results)
    }

    /// FHIR patient resource, for editing an existing registration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the uuid is not a single path segment, otherwise a
    /// `ClientError` if the request fails or the resource is not a valid patient.
    pub async fn fhir_patient(&self, patient_uuid: &str) -> ClientResult<PatientData> {
        let patient_uuid = path_segment("patient uuid", patient_uuid)?;
        let path = format!("/ws/fhir2/R4/Patient/{patient_uuid}");
        let value = self.transport().get_json(&path, &[]).await?;
        Patient::from_value(value).map_err(|err| ClientError::Decode {
            url: path,
            message: err.to_string(),
        })
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
    async fn reads_address_template_setting() {
        let (client, fake) = client(FakeTransport::new().respond(
            SYSTEM_SETTING_PATH,
            json!({"results": [{"value": "<org.openmrs.layout.address.AddressTemplate/>"}]}),
        ));

        let xml = client.address_template_xml().await.expect("setting");
        assert_eq!(xml.as_deref(), Some("<org.openmrs.layout.address.AddressTemplate/>"));
        assert_eq!(
            fake.calls()[0].query[0],
            ("q".to_string(), "layout.address.format".to_string())
        );
    }

    #[tokio::test]
    async fn missing_template_setting_is_none() {
        let (client, _) =
            client(FakeTransport::new().respond(SYSTEM_SETTING_PATH, json!({"results": []})));
        assert_eq!(client.address_template_xml().await.expect("setting"), None);
    }

    #[tokio::test]
    async fn concept_answers_fall_back_to_set_members() {
        let (client, _) = client(
            FakeTransport::new()
                .respond(
                    "/ws/rest/v1/concept/with-answers",
                    json!({"answers": [{"uuid": "a1", "display": "Casado"}], "setMembers": []}),
                )
                .respond(
                    "/ws/rest/v1/concept/set-only",
                    json!({"answers": [], "setMembers": [{"uuid": "m1", "display": "Quechua"}]}),
                ),
        );

        let answers = client.concept_answers("with-answers").await.expect("answers");
        assert_eq!(answers[0].uuid, "a1");

        let members = client.concept_answers("set-only").await.expect("members");
        assert_eq!(members[0].display.as_deref(), Some("Quechua"));
    }

    #[tokio::test]
    async fn unknown_concept_is_none() {
        let (client, _) = client(FakeTransport::new().fail("/ws/rest/v1/concept/missing", 404));

        let err = client.concept_answers("missing").await.expect_err("404");
        assert!(err.is_not_found());
        assert!(client.concept_answers_or_none("missing").await.is_none());
    }

    #[tokio::test]
    async fn decodes_relationship_types() {
        let (client, _) = client(FakeTransport::new().respond(
            RELATIONSHIP_TYPE_PATH,
            json!({"results": [{
                "uuid": "8d91a210",
                "displayAIsToB": "Padre",
                "displayBIsToA": "Hijo",
                "description": "ignored"
            }]}),
        ));

        let types = client.relationship_types().await.expect("types");
        assert_eq!(types[0].display_b_is_to_a, "Hijo");
    }

    #[tokio::test]
    async fn person_search_skips_empty_query() {
        let (client, fake) = client(FakeTransport::new().respond(
            PERSON_PATH,
            json!({"results": [{"uuid": "p1", "display": "Ana Quispe"}]}),
        ));

        assert!(client.search_person("  ").await.expect("empty").is_empty());
        assert!(fake.calls().is_empty());

        let people = client.search_person("Ana").await.expect("people");
        assert_eq!(people[0].display, "Ana Quispe");
    }

    #[tokio::test]
    async fn fetches_fhir_patient() {
        let (client, _) = client(FakeTransport::new().respond(
            "/ws/fhir2/R4/Patient/p1",
            json!({"resourceType": "Patient", "id": "p1", "gender": "male"}),
        ));

        let patient = client.fhir_patient("p1").await.expect("patient");
        assert_eq!(patient.id, "p1");
        assert_eq!(patient.gender.as_deref(), Some("male"));
    }

    #[tokio::test]
    async fn uuids_must_be_single_path_segments() {
        let (client, fake) = client(FakeTransport::new());

        for uuid in ["../../../ws/rest/v1/user", "x?v=full&q=", "a/b", "", "p1#frag"] {
            let err = client.fhir_patient(uuid).await.expect_err("rejected uuid");
            assert!(matches!(err, ClientError::InvalidUrl(_)), "{uuid}: {err}");
        }
        let err = client
            .concept_answers("x?v=full&q=")
            .await
            .expect_err("rejected uuid");
        assert!(matches!(err, ClientError::InvalidUrl(_)));
        assert!(client.concept_answers_or_none("..").await.is_none());

        assert!(fake.calls().is_empty());
    }
}
