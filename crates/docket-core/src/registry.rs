use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use docket_store::BlobStore;

use crate::collection::Collection;
use crate::config::CacheSettings;
use crate::error::CoreResult;
use crate::key::validate_collection_name;

/// Name -> [`Collection`] map shared by every request.
///
/// Each name resolves to exactly one `Collection` for the registry's
/// lifetime. Entries are never removed; eviction only unloads their data.
pub struct CollectionRegistry {
    store: Arc<dyn BlobStore>,
    settings: CacheSettings,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new(store: Arc<dyn BlobStore>, settings: CacheSettings) -> Self {
        Self {
            store,
            settings,
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Return the collection registered under `name`, creating it on first
    /// reference. Concurrent first resolutions converge on one instance.
    pub fn resolve(&self, name: &str) -> CoreResult<Arc<Collection>> {
        validate_collection_name(name)?;

        if let Some(existing) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(existing));
        }

        let mut map = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = map.get(name) {
            return Ok(Arc::clone(existing));
        }
        let collection = Arc::new(Collection::new(
            name,
            Arc::clone(&self.store),
            self.settings.clone(),
        )?);
        map.insert(name.to_string(), Arc::clone(&collection));
        tracing::debug!("Registered collection={}.", name);
        Ok(collection)
    }

    /// Snapshot of every registered collection.
    pub fn collections(&self) -> Vec<Arc<Collection>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("store", &self.store.describe())
            .field("collections", &self.len())
            .finish()
    }
}
