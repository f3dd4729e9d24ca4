//! # OpenMRS Client
//!
//! Async REST client for the registration backend.
//!
//! This crate provides:
//! - Address hierarchy lookups, returning a [`LookupOutcome`] rather than failing
//! - Template, concept answer, relationship type, person and patient fetches
//! - Queue entry removal
//! - Debouncing and last-result-wins helpers for search-as-you-type
//! - Per-session caches with explicit invalidation
//!
//! All network access goes through the [`OpenmrsTransport`] trait.

pub mod address;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod queue;
pub mod resources;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use address::{HierarchyEntry, LookupOutcome};
pub use cache::SessionCache;
pub use config::{ClientConfig, Credentials};
pub use debounce::{
    debouncer, spawn_child_entry_search, spawn_full_address_search, ChildEntryQuery,
    DebounceHandle, Debouncer, LatestOnly, Ticket,
};
pub use error::{ClientError, ClientResult};
pub use resources::PersonSummary;
pub use session::RegistrationSession;
pub use transport::{HttpTransport, OpenmrsTransport};

use std::sync::Arc;

/// Backend operations used by the registration form.
#[derive(Clone)]
pub struct OpenmrsClient {
    transport: Arc<dyn OpenmrsTransport>,
}

impl OpenmrsClient {
    pub fn new(transport: Arc<dyn OpenmrsTransport>) -> Self {
        Self { transport }
    }

    /// Client over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    pub(crate) fn transport(&self) -> &dyn OpenmrsTransport {
        self.transport.as_ref()
    }
}
