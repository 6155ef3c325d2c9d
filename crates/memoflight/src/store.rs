// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex as SyncMutex;

use crate::{entry::CacheEntry, key::CanonicalKey};

type Mapping<V, E> = SyncMutex<HashMap<CanonicalKey, Arc<CacheEntry<V, E>>>>;

/// Maps canonical keys to their cache entries.
///
/// Entries are created lazily on first use and never removed.
pub(crate) struct EntryStore<V, E> {
    mapping: Mapping<V, E>,
}

impl<V, E> EntryStore<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            mapping: SyncMutex::new(HashMap::new()),
        }
    }

    /// Returns the entry for `key`, creating it seeded with `default` if it does not exist.
    ///
    /// Concurrent callers for the same key always receive the same entry.
    pub(crate) fn get_or_create(&self, key: CanonicalKey, default: Option<&V>) -> Arc<CacheEntry<V, E>> {
        let mut mapping = self.mapping.lock();
        let entry = mapping.entry(key).or_insert_with(|| Arc::new(CacheEntry::new(default.cloned())));
        Arc::clone(entry)
    }

    pub(crate) fn get(&self, key: &CanonicalKey) -> Option<Arc<CacheEntry<V, E>>> {
        self.mapping.lock().get(key).map(Arc::clone)
    }

    pub(crate) fn len(&self) -> usize {
        self.mapping.lock().len()
    }
}

impl<V, E> fmt::Debug for EntryStore<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStore").field("len", &self.mapping.lock().len()).finish()
    }
}
