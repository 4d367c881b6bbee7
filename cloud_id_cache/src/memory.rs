//! An in-process caching layer

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use aliri_clock::{Clock, System, UnixTime};
use async_trait::async_trait;

use crate::{CacheAdapter, CacheScope, CacheUnavailable, PersistOptions};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<UnixTime>,
}

impl Entry {
    fn is_expired_at(&self, now: UnixTime) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

/// An in-memory cache adapter
///
/// Expiry is checked lazily: an expired entry is removed the next time it
/// is looked up. Nothing sweeps the map in the background, and there is no
/// bound on the number of entries held.
#[derive(Debug, Default)]
pub struct MemoryCacheAdapter<C = System> {
    entries: Mutex<HashMap<String, Entry>>,
    clock: C,
}

impl MemoryCacheAdapter<System> {
    /// Constructs a new, empty in-memory cache using the system clock
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: System,
        }
    }
}

impl<C> MemoryCacheAdapter<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> MemoryCacheAdapter<D> {
        MemoryCacheAdapter {
            entries: self.entries,
            clock,
        }
    }

    /// The number of entries held, including any expired entries that have
    /// not yet been looked up
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no entries are held
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Entries are independent of one another, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<C> CacheAdapter for MemoryCacheAdapter<C>
where
    C: Clock + std::fmt::Debug + Send + Sync,
{
    async fn get(&self, scope: CacheScope, key: &str) -> Result<Option<String>, CacheUnavailable> {
        let storage_key = scope.storage_key(key);
        let now = self.clock.now();

        let mut entries = self.lock();
        match entries.get(&storage_key) {
            Some(entry) if entry.is_expired_at(now) => {
                tracing::trace!(cache.key = %storage_key, "evicting expired entry");
                entries.remove(&storage_key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn persist(
        &self,
        scope: CacheScope,
        key: &str,
        value: &str,
        opts: PersistOptions,
    ) -> Result<(), CacheUnavailable> {
        let storage_key = scope.storage_key(key);

        if opts.is_immediately_expired() {
            self.lock().remove(&storage_key);
            return Ok(());
        }

        let entry = Entry {
            value: value.to_owned(),
            expires_at: opts.expire.map(|expire| self.clock.now() + expire),
        };

        self.lock().insert(storage_key, entry);
        Ok(())
    }
}
