//! Scoped caching for credentials, verification keys, and resources
//!
//! Every value handled by the token broker passes through a [`CacheAdapter`].
//! An adapter is a small key/value contract: values are strings, keys are
//! partitioned by a [`CacheScope`], and each write may carry a time-to-live.
//! Three backends are provided:
//!
//! * [`DisabledCacheAdapter`]: caches nothing, making caching strictly optional
//!   without conditional logic at the call sites.
//! * [`MemoryCacheAdapter`]: an in-process map with lazy expiry.
//! * [`RedisCacheAdapter`]: a shared store across processes, using the
//!   store's native TTL support (requires the `redis` feature).
//!
//! ```
//! use aliri_clock::DurationSecs;
//! use cloud_id_cache::{CacheAdapter, CacheScope, MemoryCacheAdapter, PersistOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), cloud_id_cache::CacheUnavailable> {
//! let cache = MemoryCacheAdapter::new();
//!
//! cache
//!     .persist(
//!         CacheScope::IdKeys,
//!         "vk:example",
//!         "secret",
//!         PersistOptions::expire_after(DurationSecs(60)),
//!     )
//!     .await?;
//!
//! assert_eq!(
//!     cache.get(CacheScope::IdKeys, "vk:example").await?.as_deref(),
//!     Some("secret")
//! );
//! assert_eq!(cache.get(CacheScope::OauthCredentials, "vk:example").await?, None);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `redis` (default): Provides [`RedisCacheAdapter`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{error, fmt, sync::Arc};

use aliri_clock::DurationSecs;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod disabled;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use disabled::DisabledCacheAdapter;
pub use memory::MemoryCacheAdapter;
#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub use redis_store::RedisCacheAdapter;

/// A namespace partitioning the key space of a cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Resources fetched on behalf of the resource client
    ResourceClient,
    /// Verification keys loaded from the identity service
    IdKeys,
    /// Encrypted access tokens issued for a set of credentials
    OauthCredentials,
}

impl CacheScope {
    /// The scope's name as used in storage keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceClient => "resource_client",
            Self::IdKeys => "id_keys",
            Self::OauthCredentials => "oauth_credentials",
        }
    }

    /// The key under which a value is held in the backing store
    ///
    /// Keys take the form `<scope>:<key>`, so identical raw keys in
    /// different scopes never collide.
    #[must_use]
    pub fn storage_key(self, key: &str) -> String {
        let scope = self.as_str();
        let mut storage_key = String::with_capacity(scope.len() + 1 + key.len());
        storage_key.push_str(scope);
        storage_key.push(':');
        storage_key.push_str(key);
        storage_key
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options applied when persisting a value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct PersistOptions {
    /// How long the value should be retained
    ///
    /// `None` retains the value indefinitely, subject to the limits of the
    /// backing store. A zero duration means the value is not stored at all,
    /// and any value already held for the key is removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<DurationSecs>,
}

impl PersistOptions {
    /// Retains the value indefinitely
    pub const fn forever() -> Self {
        Self { expire: None }
    }

    /// Retains the value for the given duration
    pub const fn expire_after(expire: DurationSecs) -> Self {
        Self {
            expire: Some(expire),
        }
    }

    pub(crate) fn is_immediately_expired(&self) -> bool {
        matches!(self.expire, Some(DurationSecs(0)))
    }
}

/// The cache backend could not be reached or refused the operation
///
/// Callers should treat this as a cache miss and fall back to fetching the
/// value from its source.
#[derive(Debug, Error)]
#[error("cache backend unavailable")]
pub struct CacheUnavailable {
    #[source]
    source: Box<dyn error::Error + Send + Sync + 'static>,
}

impl CacheUnavailable {
    /// Wraps a backend error
    pub fn new(source: impl Into<Box<dyn error::Error + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A scoped key/value store with optional expiry
#[async_trait]
pub trait CacheAdapter: fmt::Debug + Send + Sync {
    /// Retrieves the value held for `key` within `scope`
    ///
    /// Returns `Ok(None)` if no value is held or if the value has expired.
    async fn get(&self, scope: CacheScope, key: &str) -> Result<Option<String>, CacheUnavailable>;

    /// Stores `value` for `key` within `scope`, replacing any prior value
    async fn persist(
        &self,
        scope: CacheScope,
        key: &str,
        value: &str,
        opts: PersistOptions,
    ) -> Result<(), CacheUnavailable>;
}

#[async_trait]
impl<T> CacheAdapter for Arc<T>
where
    T: CacheAdapter + ?Sized,
{
    #[inline]
    async fn get(&self, scope: CacheScope, key: &str) -> Result<Option<String>, CacheUnavailable> {
        T::get(&**self, scope, key).await
    }

    #[inline]
    async fn persist(
        &self,
        scope: CacheScope,
        key: &str,
        value: &str,
        opts: PersistOptions,
    ) -> Result<(), CacheUnavailable> {
        T::persist(&**self, scope, key, value, opts).await
    }
}
