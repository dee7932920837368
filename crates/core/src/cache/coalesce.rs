use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key in-flight registry. Concurrent callers for the same key queue on one lock, so the first
/// one computes while the rest wait and then find the cached result.
#[derive(Default)]
pub struct Coalescer {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            // Drop locks nobody holds or waits on.
            inflight.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    pub async fn inflight_keys(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let coalescer = Arc::new(Coalescer::new());
        let guard = coalescer.acquire("customer-dashboard:1").await;

        let waiter = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                let _g = coalescer.acquire("customer-dashboard:1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn other_keys_do_not_wait() {
        let coalescer = Coalescer::new();
        let _a = coalescer.acquire("a").await;
        let _b = coalescer.acquire("b").await;
        assert_eq!(coalescer.inflight_keys().await, 2);
    }
}
