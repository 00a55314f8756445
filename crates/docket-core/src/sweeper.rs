//! Background eviction of idle collections.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::CollectionRegistry;

/// Shortest sweep period; `tokio::time::interval` rejects a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically unloads collections that have been idle for longer than
/// the configured threshold. The durable copy is left untouched.
#[derive(Debug)]
pub struct Sweeper {
    registry: Arc<CollectionRegistry>,
    interval: Duration,
    idle_threshold: Duration,
}

impl Sweeper {
    /// Build a sweeper using the registry's cache settings.
    pub fn new(registry: Arc<CollectionRegistry>) -> Self {
        let interval = registry.settings().sweep_interval().max(MIN_SWEEP_INTERVAL);
        let idle_threshold = registry.settings().idle_threshold();
        Self {
            registry,
            interval,
            idle_threshold,
        }
    }

    /// Run one pass over every registered collection. Returns how many were
    /// evicted.
    pub async fn sweep_once(&self) -> usize {
        let mut evicted = 0;
        for collection in self.registry.collections() {
            if collection.evict_if_idle(self.idle_threshold).await {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!("Eviction sweep unloaded {} idle collection(s).", evicted);
        } else {
            tracing::debug!("Eviction sweep found nothing to unload.");
        }
        evicted
    }

    /// Sweep every interval until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            tracing::info!(
                "Eviction sweeper started (interval={} ms, idle threshold={} ms).",
                self.interval.as_millis(),
                self.idle_threshold.as_millis()
            );
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
            tracing::info!("Eviction sweeper stopped.");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CacheState;
    use crate::config::CacheSettings;
    use docket_store::InMemoryBlobStore;
    use serde_json::json;

    fn registry(settings: CacheSettings) -> (Arc<InMemoryBlobStore>, Arc<CollectionRegistry>) {
        let store = Arc::new(InMemoryBlobStore::new());
        let reg = Arc::new(CollectionRegistry::new(store.clone(), settings));
        (store, reg)
    }

    fn settings() -> CacheSettings {
        CacheSettings {
            search_timeout_ms: 2_500,
            sweep_interval_ms: 1_000,
            idle_threshold_ms: 10_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_unloads_only_idle_collections() {
        let (_store, reg) = registry(settings());
        let idle = reg.resolve("idle").unwrap();
        idle.put(&"a".into(), json!(1)).await.unwrap();
        let never_loaded = reg.resolve("cold").unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        let busy = reg.resolve("busy").unwrap();
        busy.get_all().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        let sweeper = Sweeper::new(Arc::clone(&reg));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(idle.state(), CacheState::Unloaded);
        assert_eq!(busy.state(), CacheState::Ready);
        assert_eq!(never_loaded.state(), CacheState::Unloaded);
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_collection_reloads_last_persisted_state() {
        let (store, reg) = registry(settings());
        let coll = reg.resolve("orders").unwrap();
        coll.put(&"a".into(), json!({"item": "pen"})).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        Sweeper::new(Arc::clone(&reg)).sweep_once().await;
        assert_eq!(coll.state(), CacheState::Unloaded);

        // The registry still hands out the same instance.
        let again = reg.resolve("orders").unwrap();
        assert!(Arc::ptr_eq(&coll, &again));
        assert_eq!(again.get(&"a".into()).await.unwrap(), Some(json!({"item": "pen"})));
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs_and_stops() {
        let (_store, reg) = registry(settings());
        let coll = reg.resolve("orders").unwrap();
        coll.get_all().await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = Sweeper::new(Arc::clone(&reg)).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(coll.state(), CacheState::Unloaded);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let (_store, reg) = registry(CacheSettings {
            sweep_interval_ms: 0,
            ..settings()
        });
        let coll = reg.resolve("orders").unwrap();
        coll.get_all().await.unwrap();

        let sweeper = Sweeper::new(Arc::clone(&reg));
        assert_eq!(sweeper.interval, MIN_SWEEP_INTERVAL);

        let shutdown = CancellationToken::new();
        let handle = sweeper.spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(coll.state(), CacheState::Unloaded);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn collection_mid_hydration_is_skipped() {
        let (store, reg) = registry(settings());
        let coll = reg.resolve("orders").unwrap();
        coll.get_all().await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        Sweeper::new(Arc::clone(&reg)).sweep_once().await;

        store.set_latency(Duration::from_secs(30));
        let loading = {
            let coll = Arc::clone(&coll);
            tokio::spawn(async move { coll.get_all().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(coll.state(), CacheState::Loading);

        assert_eq!(Sweeper::new(Arc::clone(&reg)).sweep_once().await, 0);
        assert_eq!(coll.state(), CacheState::Loading);

        loading.await.unwrap().unwrap();
        assert_eq!(coll.state(), CacheState::Ready);
    }
}
