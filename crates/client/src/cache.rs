//! Per-session read-through cache.

use std::future::Future;
use tokio::sync::Mutex;

/// Holds one value for the lifetime of a form session.
///
/// The first [`SessionCache::get_or_try_load`] loads the value while holding the lock, so
/// concurrent callers wait for that load instead of issuing their own. Failed loads are not
/// cached. [`SessionCache::invalidate`] drops the value on session teardown.
#[derive(Debug)]
pub struct SessionCache<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for SessionCache<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> SessionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value, loading it with `load` on first use.
    ///
    /// # Errors
    ///
    /// Returns the error of `load`; the next call retries.
    pub async fn get_or_try_load<F, Fut, E>(&self, load: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }

        let value = load().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    pub async fn peek(&self) -> Option<T> {
        self.slot.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn loads_once_and_reuses() {
        let cache = SessionCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_try_load(|| async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_load() {
        let cache = Arc::new(SessionCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    cache
                        .get_or_try_load(|| async {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, ()>("levels".to_string())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok("levels".to_string()));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let cache: SessionCache<u32> = SessionCache::new();

        let first: Result<u32, &str> = cache.get_or_try_load(|| async { Err("offline") }).await;
        assert_eq!(first, Err("offline"));
        assert_eq!(cache.peek().await, None);

        let second: Result<u32, &str> = cache.get_or_try_load(|| async { Ok(1) }).await;
        assert_eq!(second, Ok(1));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = SessionCache::new();
        let _: Result<u32, ()> = cache.get_or_try_load(|| async { Ok(1) }).await;

        cache.invalidate().await;
        assert_eq!(cache.peek().await, None);

        let reloaded: Result<u32, ()> = cache.get_or_try_load(|| async { Ok(2) }).await;
        assert_eq!(reloaded, Ok(2));
    }
}
