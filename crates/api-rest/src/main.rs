//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the registration REST API on its own.
//!
//! ## Intended use
//! Useful for development against a running backend. The workspace's `registration-run`
//! binary also loads `.env` before serving the same router.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the REST API server.
///
/// # Environment Variables
/// - `REG_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - see [`api_rest::AppState::from_env`] for the backend and form configuration
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the backend or form configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("openmrs_client=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr =
        std::env::var("REG_REST_ADDR").unwrap_or_else(|_| api_rest::DEFAULT_REST_ADDR.into());

    let state = api_rest::AppState::from_env()?;

    tracing::info!("-- Starting registration REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::router(state)).await?;

    Ok(())
}
