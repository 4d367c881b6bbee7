//! A caching layer that never retains anything

use async_trait::async_trait;

use crate::{CacheAdapter, CacheScope, CacheUnavailable, PersistOptions};

/// A cache adapter that stores nothing
///
/// Every lookup misses and every write is discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledCacheAdapter;

impl DisabledCacheAdapter {
    /// Constructs a new disabled cache adapter
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheAdapter for DisabledCacheAdapter {
    async fn get(
        &self,
        _scope: CacheScope,
        _key: &str,
    ) -> Result<Option<String>, CacheUnavailable> {
        Ok(None)
    }

    async fn persist(
        &self,
        _scope: CacheScope,
        _key: &str,
        _value: &str,
        _opts: PersistOptions,
    ) -> Result<(), CacheUnavailable> {
        Ok(())
    }
}
