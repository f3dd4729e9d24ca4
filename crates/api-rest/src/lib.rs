//! # API REST
//!
//! REST facade over the registration core and the OpenMRS client.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)

#![warn(rust_2018_idioms)]

pub mod models;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use models::*;
use openmrs_client::{ClientConfig, ClientError, OpenmrsClient, RegistrationSession};
use reg_core::form::{
    address_values_from_fhir_patient, form_values_from_fhir_patient,
    patient_uuid_map_from_fhir_patient,
};
use reg_core::relationships::display_relationship_types;
use reg_core::{
    compute_field_config, reset_descendant_fields, AddressField, AddressValues,
    RegistrationConfig,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type ApiError = (StatusCode, &'static str);

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    session: Arc<RegistrationSession>,
    config: Arc<RegistrationConfig>,
}

impl AppState {
    pub fn new(session: RegistrationSession, config: RegistrationConfig) -> Self {
        Self {
            session: Arc::new(session),
            config: Arc::new(config),
        }
    }

    /// Builds the state from the process environment.
    ///
    /// # Environment Variables
    /// - `OPENMRS_BASE_URL`, `OPENMRS_USERNAME`, `OPENMRS_PASSWORD`, `OPENMRS_TIMEOUT_SECS`:
    ///   backend connection
    /// - `REGISTRATION_CONFIG_FILE`: YAML form configuration (defaults apply when unset)
    ///
    /// # Errors
    /// Returns an error if the client configuration is invalid, the HTTP client cannot be
    /// built, or the configuration file cannot be read or parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let client = OpenmrsClient::from_config(ClientConfig::from_env()?)?;

        let config = match std::env::var("REGISTRATION_CONFIG_FILE") {
            Ok(path) => {
                tracing::info!("-- Loading registration config from {}", path);
                RegistrationConfig::load(std::path::Path::new(&path))?
            }
            Err(_) => RegistrationConfig::default(),
        };

        Ok(Self::new(RegistrationSession::new(client), config))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        address_levels,
        field_config,
        reset_field,
        address_entries,
        full_address,
        address_template,
        validate_address,
        relationship_types,
        patient_form,
    ),
    components(schemas(
        HealthRes,
        LevelsRes,
        AddressValuesBody,
        FieldConfigRes,
        EntriesRes,
        TemplateRuleRes,
        ViolationRes,
        RelationshipTypeRes,
        PatientFormRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/address/levels", get(address_levels))
        .route("/address/fields/:field/config", post(field_config))
        .route("/address/fields/:field/reset", post(reset_field))
        .route("/address/entries", get(address_entries))
        .route("/address/full", get(full_address))
        .route("/address/template", get(address_template))
        .route("/address/validate", post(validate_address))
        .route("/relationships/types", get(relationship_types))
        .route("/patients/:uuid/form-values", get(patient_form))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn backend_error(context: &str, error: ClientError) -> ApiError {
    if let ClientError::InvalidUrl(_) = error {
        tracing::warn!(context, %error, "rejected request identifier");
        return (StatusCode::BAD_REQUEST, "Invalid identifier");
    }
    tracing::error!(context, %error, "backend request failed");
    if error.is_not_found() {
        return (StatusCode::NOT_FOUND, "Not found");
    }
    (StatusCode::BAD_GATEWAY, "Backend request failed")
}

fn address_values(body: AddressValuesBody) -> Result<AddressValues, ApiError> {
    body.values
        .into_iter()
        .map(|(field, value)| -> Result<(AddressField, String), ApiError> {
            let field = AddressField::new(&field)
                .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid address field name"))?;
            Ok((field, value))
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "registration service is healthy".into(),
    })
}

#[utoipa::path(
    get,
    path = "/address/levels",
    responses(
        (status = 200, description = "Address fields in hierarchy order", body = LevelsRes),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn address_levels(State(state): State<AppState>) -> Result<Json<LevelsRes>, ApiError> {
    let fields = state
        .session
        .ordered_fields()
        .await
        .map_err(|e| backend_error("address levels", e))?;

    Ok(Json(LevelsRes {
        fields: fields.iter().map(|f| f.to_string()).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/address/fields/{field}/config",
    params(("field" = String, Path, description = "Address field name")),
    request_body = AddressValuesBody,
    responses(
        (status = 200, description = "Whether the field is enabled and its search key", body = FieldConfigRes),
        (status = 400, description = "Invalid address field name"),
        (status = 502, description = "Backend request failed")
    )
)]
/// Computes whether entry into `field` is enabled and the parent search key for its lookups.
#[axum::debug_handler]
async fn field_config(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Json(body): Json<AddressValuesBody>,
) -> Result<Json<FieldConfigRes>, ApiError> {
    let values = address_values(body)?;
    let ordered = state
        .session
        .ordered_fields()
        .await
        .map_err(|e| backend_error("address levels", e))?;

    Ok(Json(compute_field_config(&ordered, &values, &field).into()))
}

#[utoipa::path(
    post,
    path = "/address/fields/{field}/reset",
    params(("field" = String, Path, description = "Address field that changed")),
    request_body = AddressValuesBody,
    responses(
        (status = 200, description = "Values with every lower field cleared", body = AddressValuesBody),
        (status = 400, description = "Invalid address field name"),
        (status = 502, description = "Backend request failed")
    )
)]
/// Clears every field ranked below `field`.
#[axum::debug_handler]
async fn reset_field(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Json(body): Json<AddressValuesBody>,
) -> Result<Json<AddressValuesBody>, ApiError> {
    let mut values = address_values(body)?;
    let ordered = state
        .session
        .ordered_fields()
        .await
        .map_err(|e| backend_error("address levels", e))?;

    reset_descendant_fields(&ordered, &field, |descendant, value| {
        values.set(descendant.clone(), value);
    });

    Ok(Json(AddressValuesBody {
        values: values
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/address/entries",
    params(EntriesQuery),
    responses(
        (status = 200, description = "Child entries under the parent search key", body = EntriesRes)
    )
)]
/// Child entries for a parent search key, narrowed by the typed filter.
#[axum::debug_handler]
async fn address_entries(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> Json<EntriesRes> {
    let outcome = state
        .session
        .client()
        .child_entries(true, &query.search_string)
        .await;

    let entries = match query.filter.as_deref() {
        Some(filter) => reg_core::address::filter_entries(&outcome.entries, filter)
            .into_iter()
            .map(str::to_string)
            .collect(),
        None => outcome.entries,
    };

    Json(EntriesRes {
        entries,
        error: outcome.error.map(|e| e.to_string()),
    })
}

#[utoipa::path(
    get,
    path = "/address/full",
    params(FullAddressQuery),
    responses(
        (status = 200, description = "Full addresses matching the query", body = EntriesRes)
    )
)]
#[axum::debug_handler]
async fn full_address(
    State(state): State<AppState>,
    Query(query): Query<FullAddressQuery>,
) -> Json<EntriesRes> {
    let separator = &state.config.address_hierarchy.full_address_separator;
    let outcome = state
        .session
        .client()
        .full_addresses(&query.q, separator)
        .await;

    Json(EntriesRes {
        entries: outcome.entries,
        error: outcome.error.map(|e| e.to_string()),
    })
}

#[utoipa::path(
    get,
    path = "/address/template",
    responses(
        (status = 200, description = "Per-field rules of the address template", body = [TemplateRuleRes]),
        (status = 502, description = "Backend request failed or template malformed")
    )
)]
#[axum::debug_handler]
async fn address_template(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateRuleRes>>, ApiError> {
    let rules = state
        .session
        .template_rules()
        .await
        .map_err(|e| backend_error("address template", e))?;

    Ok(Json(rules.iter().map(TemplateRuleRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/address/validate",
    request_body = AddressValuesBody,
    responses(
        (status = 200, description = "Fields whose values fail the template rules", body = [ViolationRes]),
        (status = 400, description = "Invalid address field name"),
        (status = 502, description = "Backend request failed or template malformed")
    )
)]
#[axum::debug_handler]
async fn validate_address(
    State(state): State<AppState>,
    Json(body): Json<AddressValuesBody>,
) -> Result<Json<Vec<ViolationRes>>, ApiError> {
    let values = address_values(body)?;
    let schema = state
        .session
        .validation_schema()
        .await
        .map_err(|e| backend_error("address validation schema", e))?;

    Ok(Json(
        schema
            .validate(&values)
            .into_iter()
            .map(ViolationRes::from)
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/relationships/types",
    responses(
        (status = 200, description = "Relationship type choices labelled relative to the patient", body = [RelationshipTypeRes]),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn relationship_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<RelationshipTypeRes>>, ApiError> {
    let types = state
        .session
        .relationship_types()
        .await
        .map_err(|e| backend_error("relationship types", e))?;

    let display = display_relationship_types(&types, &state.config.field_configurations.relationships);
    Ok(Json(display.into_iter().map(RelationshipTypeRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/patients/{uuid}/form-values",
    params(("uuid" = String, Path, description = "Patient uuid")),
    responses(
        (status = 200, description = "Registration form values of an existing patient", body = PatientFormRes),
        (status = 400, description = "Invalid patient uuid"),
        (status = 404, description = "Patient not found"),
        (status = 502, description = "Backend request failed")
    )
)]
/// Form values and record uuids for editing an existing patient.
#[axum::debug_handler]
async fn patient_form(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<PatientFormRes>, ApiError> {
    let patient = state
        .session
        .client()
        .fhir_patient(&uuid)
        .await
        .map_err(|e| backend_error("patient", e))?;

    let mut form_values = form_values_from_fhir_patient(&patient);
    form_values.address = address_values_from_fhir_patient(&patient);
    let uuid_map = patient_uuid_map_from_fhir_patient(&patient);

    let to_json = |value: serde_json::Result<serde_json::Value>| {
        value.map_err(|e| {
            tracing::error!("Serialise patient form error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })
    };

    Ok(Json(PatientFormRes {
        form_values: to_json(serde_json::to_value(&form_values))?,
        patient_uuid_map: to_json(serde_json::to_value(&uuid_map))?,
    }))
}
