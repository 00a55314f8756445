//! A single named collection and its cache lifecycle.
//!
//! A [`Collection`] starts `Unloaded`, hydrates from the durable store on
//! first access, and may be demoted back to `Unloaded` by the eviction
//! sweeper once idle. Hydration, persistence and eviction all run under the
//! collection's gate, so at most one of them is in flight at a time.
//!
//! Readers never wait for the gate once the collection is loaded: the
//! entries live behind an `Arc` that mutators replace wholesale after
//! applying a change to a private copy. A read therefore observes either
//! the state before or after a mutation, never a half-applied one.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use docket_store::{BlobStore, StoreError};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::CacheSettings;
use crate::error::{CoreError, CoreResult};
use crate::key::{validate_collection_name, EntryKey};
use crate::search::{self, Query, ScanLimits, ScanStatus, SearchOutcome};

/// The key -> value mapping held by a collection.
pub type Entries = Map<String, Value>;

/// Cache lifecycle of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Unloaded,
    Loading,
    Ready,
}

struct Slot {
    state: CacheState,
    data: Option<Arc<Entries>>,
    last_activity: Option<Instant>,
    last_write: Option<DateTime<Utc>>,
}

/// A named, lazily hydrated, durably persisted key -> value mapping.
pub struct Collection {
    name: String,
    store: Arc<dyn BlobStore>,
    settings: CacheSettings,
    gate: Mutex<()>,
    slot: RwLock<Slot>,
}

/// Resets a collection stuck in `Loading` when a hydration is abandoned
/// before it completes, e.g. because the awaiting future was dropped.
struct LoadingGuard<'a> {
    slot: &'a RwLock<Slot>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            if slot.state == CacheState::Loading {
                slot.state = CacheState::Unloaded;
                slot.data = None;
            }
        }
    }
}

impl Collection {
    /// Create an unloaded collection. No I/O happens until first access.
    ///
    /// The name must also be addressable as a key of `store`.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn BlobStore>,
        settings: CacheSettings,
    ) -> CoreResult<Self> {
        let name = name.into();
        validate_collection_name(&name)?;
        if let Err(e) = store.check_key(&name) {
            let reason = match e {
                StoreError::InvalidKey { reason, .. } => reason,
                other => other.to_string(),
            };
            return Err(CoreError::InvalidName { name, reason });
        }
        Ok(Self {
            name,
            store,
            settings,
            gate: Mutex::new(()),
            slot: RwLock::new(Slot {
                state: CacheState::Unloaded,
                data: None,
                last_activity: None,
                last_write: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CacheState {
        self.slot().state
    }

    /// Time of the last successful persist by this process.
    pub fn last_write(&self) -> Option<DateTime<Utc>> {
        self.slot().last_write
    }

    /// Time since the last completed operation, if any ran.
    pub fn idle_for(&self) -> Option<Duration> {
        self.slot().last_activity.map(|t| t.elapsed())
    }

    /// Number of cached entries, or `None` while not loaded.
    pub fn len(&self) -> Option<usize> {
        self.slot().data.as_ref().map(|d| d.len())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Store `value` under a freshly generated key and return that key.
    pub async fn add(&self, value: Value) -> CoreResult<EntryKey> {
        self.mutate(|entries| {
            let mut key = EntryKey::generate();
            while entries.contains_key(&*key.as_storage_key()) {
                key = EntryKey::generate();
            }
            entries.insert(key.as_storage_key().into_owned(), value);
            key
        })
        .await
    }

    /// Insert or overwrite the entry under `key`.
    pub async fn put(&self, key: &EntryKey, value: Value) -> CoreResult<()> {
        self.mutate(|entries| {
            entries.insert(key.as_storage_key().into_owned(), value);
        })
        .await
    }

    /// Remove the entry under `key`. Removing an absent key is not an error.
    pub async fn delete(&self, key: &EntryKey) -> CoreResult<()> {
        self.mutate(|entries| {
            entries.remove(&*key.as_storage_key());
        })
        .await
    }

    /// Discard every entry and substitute `entries`. Returns the new size.
    pub async fn replace(&self, entries: Entries) -> CoreResult<usize> {
        tracing::warn!("Replacing data for entire collection={}...", self.name);
        self.mutate(move |current| {
            *current = entries;
            current.len()
        })
        .await
    }

    /// Remove every entry.
    pub async fn clear(&self) -> CoreResult<()> {
        self.replace(Entries::new()).await.map(|_| ())
    }

    /// Upsert every entry of `entries`. Returns how many keys were new.
    pub async fn merge(&self, entries: Entries) -> CoreResult<usize> {
        self.mutate(move |current| {
            let mut added = 0;
            for (key, value) in entries {
                if current.insert(key, value).is_none() {
                    added += 1;
                }
            }
            added
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Copy of the entry under `key`, or `None` if absent.
    pub async fn get(&self, key: &EntryKey) -> CoreResult<Option<Value>> {
        let data = self.snapshot().await?;
        let value = data.get(&*key.as_storage_key()).cloned();
        self.touch();
        Ok(value)
    }

    /// Copy of the whole mapping.
    pub async fn get_all(&self) -> CoreResult<Entries> {
        let data = self.snapshot().await?;
        let entries = Entries::clone(&data);
        self.touch();
        Ok(entries)
    }

    /// Scan the collection for entries matching `query`.
    ///
    /// The scan runs on the blocking pool and stops early when `cancel`
    /// fires (empty result), when the configured search timeout elapses
    /// (partial result) or when `max_hits` entries have matched.
    pub async fn search(
        &self,
        query: &str,
        max_hits: Option<usize>,
        cancel: &CancellationToken,
    ) -> CoreResult<SearchOutcome> {
        let query = Query::parse(query)?;
        let data = self.snapshot().await?;
        let total = data.len();
        let limits = ScanLimits {
            timeout: self.settings.search_timeout(),
            max_hits,
        };
        let token = cancel.clone();
        let outcome =
            tokio::task::spawn_blocking(move || search::scan(&data, &query, limits, &token))
                .await
                .map_err(|e| CoreError::Search {
                    collection: self.name.clone(),
                    reason: e.to_string(),
                })?;

        match outcome.status {
            ScanStatus::Cancelled => {
                tracing::info!("Search in collection={} cancelled by caller.", self.name);
            }
            ScanStatus::DeadlineExceeded => {
                tracing::warn!(
                    "Search in collection={} exceeded {} ms; returning partial results.",
                    self.name,
                    limits.timeout.as_millis()
                );
            }
            ScanStatus::Complete | ScanStatus::LimitReached => {}
        }
        tracing::info!(
            "Search in collection={} matched {}/{} entries ({} scanned) in {} ms.",
            self.name,
            outcome.hits.len(),
            total,
            outcome.scanned,
            outcome.elapsed.as_millis()
        );

        self.touch();
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    /// Drop the cached entries if the collection is loaded and has been idle
    /// for longer than `threshold`. Returns whether it was evicted.
    ///
    /// A collection whose gate is held is busy and therefore not idle; the
    /// sweeper skips it rather than waiting.
    pub async fn evict_if_idle(&self, threshold: Duration) -> bool {
        if !self.is_idle(threshold) {
            return false;
        }
        let Ok(_gate) = self.gate.try_lock() else {
            tracing::debug!("Collection={} is busy; skipping eviction.", self.name);
            return false;
        };
        if !self.is_idle(threshold) {
            return false;
        }

        let idle = self.idle_for().unwrap_or_default();
        let mut slot = self.slot_mut();
        let entries = slot.data.take().map_or(0, |d| d.len());
        slot.state = CacheState::Unloaded;
        drop(slot);

        tracing::info!(
            "Evicted collection={} ({} entries) after {} s idle.",
            self.name,
            entries,
            idle.as_secs()
        );
        true
    }

    fn is_idle(&self, threshold: Duration) -> bool {
        let slot = self.slot();
        slot.state == CacheState::Ready
            && slot
                .last_activity
                .is_some_and(|t| t.elapsed() > threshold)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn slot(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot_mut(&self) -> std::sync::RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready_data(&self) -> Option<Arc<Entries>> {
        let slot = self.slot();
        match slot.state {
            CacheState::Ready => slot.data.clone(),
            CacheState::Unloaded | CacheState::Loading => None,
        }
    }

    fn touch(&self) {
        self.slot_mut().last_activity = Some(Instant::now());
    }

    /// Current entries, hydrating first if needed. Waits behind any
    /// in-flight hydration instead of starting a second one.
    async fn snapshot(&self) -> CoreResult<Arc<Entries>> {
        if let Some(data) = self.ready_data() {
            return Ok(data);
        }
        tracing::debug!("Waiting until collection={} has been initialised...", self.name);
        let _gate = self.gate.lock().await;
        self.load_locked().await
    }

    /// Apply `apply` to a copy of the entries, publish the copy, then persist
    /// it. A persist failure leaves the published copy in place.
    async fn mutate<R>(&self, apply: impl FnOnce(&mut Entries) -> R) -> CoreResult<R> {
        let _gate = self.gate.lock().await;
        let current = self.load_locked().await?;
        let mut next = Entries::clone(&current);
        drop(current);

        let out = apply(&mut next);
        let next = Arc::new(next);
        self.slot_mut().data = Some(Arc::clone(&next));

        self.persist_locked(&next).await?;
        Ok(out)
    }

    /// Hydrate from the durable store. Caller must hold the gate.
    async fn load_locked(&self) -> CoreResult<Arc<Entries>> {
        if let Some(data) = self.ready_data() {
            return Ok(data);
        }

        self.slot_mut().state = CacheState::Loading;
        let mut guard = LoadingGuard {
            slot: &self.slot,
            armed: true,
        };

        tracing::info!(
            "Retrieving data for collection={} from {}...",
            self.name,
            self.store.describe()
        );
        let loaded = match self.store.get(&self.name).await {
            Ok(Some(bytes)) => decode(&self.name, &bytes),
            Ok(None) => {
                tracing::warn!(
                    "No data found for collection={} in {}. Initialising as an empty collection.",
                    self.name,
                    self.store.describe()
                );
                Ok(Entries::new())
            }
            Err(e) => Err(e),
        };

        match loaded {
            Ok(entries) => {
                let data = Arc::new(entries);
                {
                    let mut slot = self.slot_mut();
                    slot.data = Some(Arc::clone(&data));
                    slot.state = CacheState::Ready;
                    slot.last_activity = Some(Instant::now());
                }
                guard.armed = false;
                tracing::info!(
                    "Retrieved {} entries for collection={}.",
                    data.len(),
                    self.name
                );
                Ok(data)
            }
            Err(source) => {
                drop(guard);
                tracing::error!(
                    "Initialisation failed for collection={}: {}",
                    self.name,
                    source
                );
                Err(CoreError::Initialization {
                    collection: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Write the full mapping to the durable store. Caller must hold the gate.
    async fn persist_locked(&self, entries: &Entries) -> CoreResult<()> {
        tracing::info!(
            "Persisting collection={} with {} entries to {}...",
            self.name,
            entries.len(),
            self.store.describe()
        );

        let result = match encode(entries) {
            Ok(bytes) => self.store.put(&self.name, bytes).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let mut slot = self.slot_mut();
                slot.last_write = Some(Utc::now());
                slot.last_activity = Some(Instant::now());
                drop(slot);
                tracing::info!("Collection={} persisted.", self.name);
                Ok(())
            }
            Err(source) => {
                tracing::error!("Persisting collection={} failed: {}", self.name, source);
                Err(CoreError::Persist {
                    collection: self.name.clone(),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("entries", &self.len())
            .finish()
    }
}

/// Render the mapping as indented JSON, the persisted blob format.
pub fn encode(entries: &Entries) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries
        .serialize(&mut ser)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode(name: &str, bytes: &[u8]) -> Result<Entries, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: name.to_string(),
        reason: e.to_string(),
    })
}
