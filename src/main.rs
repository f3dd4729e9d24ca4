use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the registration service.
///
/// Loads `.env`, then serves the REST API with its Swagger UI.
///
/// # Environment Variables
/// - `REG_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `OPENMRS_BASE_URL`, `OPENMRS_USERNAME`, `OPENMRS_PASSWORD`: backend connection
/// - `REGISTRATION_CONFIG_FILE`: YAML form configuration
///
/// # Errors
/// Returns an error if configuration is invalid, the address cannot be bound, or the server
/// fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("registration_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("openmrs_client=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("REG_REST_ADDR").unwrap_or_else(|_| api_rest::DEFAULT_REST_ADDR.into());

    let state = api_rest::AppState::from_env()?;

    tracing::info!("++ Starting registration REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, api_rest::router(state)).await?;

    Ok(())
}
