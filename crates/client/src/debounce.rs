//! Search-as-you-type helpers.
//!
//! [`Debouncer`] emits a value once input has been idle for the configured window; a newer
//! input restarts the window. [`LatestOnly`] drops results of lookups that were superseded
//! while in flight.

use crate::address::LookupOutcome;
use crate::OpenmrsClient;
use reg_core::address::filter_entries;
use reg_core::constants::{CHILD_ENTRIES_DEBOUNCE, FULL_ADDRESS_DEBOUNCE};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Sending side of a debouncer.
#[derive(Clone, Debug)]
pub struct DebounceHandle<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> DebounceHandle<T> {
    /// Records new input. Returns `false` once the debouncer has been dropped.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// Receiving side of a debouncer.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    rx: mpsc::UnboundedReceiver<T>,
}

pub fn debouncer<T>(delay: Duration) -> (DebounceHandle<T>, Debouncer<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DebounceHandle { tx }, Debouncer { delay, rx })
}

impl<T> Debouncer<T> {
    /// Waits for the next settled value.
    ///
    /// Returns `None` once every handle is dropped and no input is pending. Input pending
    /// when the last handle drops is still emitted.
    pub async fn settled(&mut self) -> Option<T> {
        let mut pending = self.rx.recv().await?;
        loop {
            match timeout(self.delay, self.rx.recv()).await {
                Ok(Some(newer)) => pending = newer,
                Ok(None) | Err(_) => return Some(pending),
            }
        }
    }
}

/// Generation counter for last-result-wins.
#[derive(Clone, Debug, Default)]
pub struct LatestOnly {
    current: Arc<AtomicU64>,
}

/// Marks one lookup; only the most recently issued ticket is current.
#[derive(Debug)]
pub struct Ticket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LatestOnly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a lookup, superseding every earlier ticket.
    pub fn begin(&self) -> Ticket {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            generation,
            current: Arc::clone(&self.current),
        }
    }
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Passes `value` through only if no newer lookup has started.
    pub fn accept<T>(&self, value: T) -> Option<T> {
        self.is_current().then_some(value)
    }
}

/// Input of a debounced child-entry search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildEntryQuery {
    pub fetch_enabled: bool,
    /// Parent values joined by `|`.
    pub search_key: String,
    /// Typed text narrowing the fetched entries.
    pub filter: String,
}

pub type LookupResults<Q, T> = mpsc::Receiver<(Q, LookupOutcome<T>)>;

/// Debounces `Q` and runs `lookup` for each settled value.
///
/// A settled value equal to the previous one is not looked up again. Lookups may overlap;
/// a result is only delivered when no newer lookup has started since.
fn spawn_lookups<Q, T, F, Fut>(delay: Duration, lookup: F) -> (DebounceHandle<Q>, LookupResults<Q, T>)
where
    Q: Clone + PartialEq + Send + 'static,
    T: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LookupOutcome<T>> + Send + 'static,
{
    let (handle, mut queries) = debouncer::<Q>(delay);
    let (results_tx, results_rx) = mpsc::channel(8);
    let latest = LatestOnly::new();
    let lookup = Arc::new(lookup);

    tokio::spawn(async move {
        let mut last: Option<Q> = None;
        while let Some(query) = queries.settled().await {
            if last.as_ref() == Some(&query) {
                tracing::debug!("input unchanged since last lookup");
                continue;
            }
            last = Some(query.clone());

            let ticket = latest.begin();
            let lookup = Arc::clone(&lookup);
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let outcome = (*lookup)(query.clone()).await;
                let Some(outcome) = ticket.accept(outcome) else {
                    tracing::debug!("dropping superseded lookup result");
                    return;
                };
                // Receiver gone means the form was torn down.
                let _ = results_tx.send((query, outcome)).await;
            });
        }
    });

    (handle, results_rx)
}

/// Runs the full-address search for a stream of typed queries.
///
/// The task ends when the returned handle is dropped.
pub fn spawn_full_address_search(
    client: OpenmrsClient,
    separator: String,
) -> (DebounceHandle<String>, LookupResults<String, String>) {
    let separator = Arc::new(separator);
    spawn_lookups(FULL_ADDRESS_DEBOUNCE, move |query: String| {
        let client = client.clone();
        let separator = Arc::clone(&separator);
        async move { client.full_addresses(&query, &separator).await }
    })
}

/// Runs child-entry lookups for a stream of `(search key, filter)` inputs.
pub fn spawn_child_entry_search(
    client: OpenmrsClient,
) -> (DebounceHandle<ChildEntryQuery>, LookupResults<ChildEntryQuery, String>) {
    spawn_lookups(CHILD_ENTRIES_DEBOUNCE, move |query: ChildEntryQuery| {
        let client = client.clone();
        async move {
            let mut outcome = client
                .child_entries(query.fetch_enabled, &query.search_key)
                .await;
            outcome.entries = filter_entries(&outcome.entries, &query.filter)
                .into_iter()
                .map(str::to_string)
                .collect();
            outcome
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTransport;
    use serde_json::json;
    use tokio::time::{advance, sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn emits_after_idle_window() {
        let (handle, mut debouncer) = debouncer(Duration::from_millis(300));
        let started = Instant::now();

        handle.push("L");
        let settled = debouncer.settled().await;

        assert_eq!(settled, Some("L"));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn newer_input_restarts_the_window() {
        let (handle, mut debouncer) = debouncer(Duration::from_millis(300));

        let typing = tokio::spawn(async move {
            for query in ["L", "Li", "Lim", "Lima"] {
                handle.push(query.to_string());
                advance(Duration::from_millis(100)).await;
            }
            handle
        });

        let settled = debouncer.settled().await;
        assert_eq!(settled.as_deref(), Some("Lima"));
        drop(typing.await.unwrap());
        assert_eq!(debouncer.settled().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_input_is_flushed_when_handle_drops() {
        let (handle, mut debouncer) = debouncer(Duration::from_millis(300));
        handle.push(1);
        handle.push(2);
        drop(handle);

        assert_eq!(debouncer.settled().await, Some(2));
        assert_eq!(debouncer.settled().await, None);
    }

    #[test]
    fn only_latest_ticket_is_current() {
        let latest = LatestOnly::new();
        let first = latest.begin();
        assert!(first.is_current());

        let second = latest.begin();
        assert!(!first.is_current());
        assert_eq!(first.accept("stale"), None);
        assert_eq!(second.accept("fresh"), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_address_search_emits_settled_query() {
        let fake = FakeTransport::new().respond(
            "/module/addresshierarchy/ajax/getPossibleFullAddresses.form",
            json!([{"address": "Perú > Lima > Miraflores"}]),
        );
        let client = OpenmrsClient::new(Arc::new(fake));
        let (handle, mut results) = spawn_full_address_search(client, " > ".into());

        handle.push("M".into());
        handle.push("Mira".into());

        let (query, outcome) = results.recv().await.expect("one result");
        assert_eq!(query, "Mira");
        assert_eq!(outcome.entries, vec!["Perú > Lima > Miraflores".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn child_entry_search_filters_fetched_entries() {
        let fake = Arc::new(FakeTransport::new().respond(
            "/module/addresshierarchy/ajax/getChildAddressHierarchyEntries.form",
            json!([{"name": "Miraflores"}, {"name": "San Isidro"}]),
        ));
        let client = OpenmrsClient::new(fake.clone());
        let (handle, mut results) = spawn_child_entry_search(client);

        handle.push(ChildEntryQuery {
            fetch_enabled: true,
            search_key: "Perú|Lima".into(),
            filter: "san".into(),
        });

        let (query, outcome) = results.recv().await.expect("one result");
        assert_eq!(query.search_key, "Perú|Lima");
        assert_eq!(outcome.entries, vec!["San Isidro".to_string()]);
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_query_is_not_looked_up_again() {
        let fake = Arc::new(FakeTransport::new().respond(
            "/module/addresshierarchy/ajax/getPossibleFullAddresses.form",
            json!([{"address": "Perú > Lima"}]),
        ));
        let client = OpenmrsClient::new(fake.clone());
        let (handle, mut results) = spawn_full_address_search(client, " > ".into());

        handle.push("Lima".into());
        let (query, _) = results.recv().await.expect("first result");
        assert_eq!(query, "Lima");

        handle.push("Limax".into());
        handle.push("Lima".into());
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fake.calls().len(), 1);
        assert!(results.try_recv().is_err());

        handle.push("Miraflores".into());
        let (query, _) = results.recv().await.expect("second result");
        assert_eq!(query, "Miraflores");
        assert_eq!(fake.calls().len(), 2);
    }
}
