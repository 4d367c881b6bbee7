//! A caching layer shared across processes through Redis

use std::fmt;

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, IntoConnectionInfo,
};

use crate::{CacheAdapter, CacheScope, CacheUnavailable, PersistOptions};

const CONNECT_RETRIES: usize = 2;

/// A cache adapter backed by a Redis server
///
/// Expiry is delegated to the server's native TTL support. Values are stored
/// under `<scope>:<key>`, so several processes configured with the same
/// server share their cached values.
///
/// The adapter holds a single multiplexed connection that is shared by every
/// clone and re-established automatically if the server drops it.
#[derive(Clone)]
pub struct RedisCacheAdapter {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCacheAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheAdapter").finish_non_exhaustive()
    }
}

impl RedisCacheAdapter {
    /// Connects to the server at the given address
    pub async fn connect(info: impl IntoConnectionInfo) -> Result<Self, CacheUnavailable> {
        let client = redis::Client::open(info).map_err(CacheUnavailable::new)?;
        Self::from_client(client).await
    }

    /// Connects using an existing client
    pub async fn from_client(client: redis::Client) -> Result<Self, CacheUnavailable> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(CONNECT_RETRIES);
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to connect to redis");
                CacheUnavailable::new(err)
            })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheAdapter for RedisCacheAdapter {
    #[tracing::instrument(err, skip(self), fields(cache.scope = %scope))]
    async fn get(&self, scope: CacheScope, key: &str) -> Result<Option<String>, CacheUnavailable> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(scope.storage_key(key))
            .await
            .map_err(CacheUnavailable::new)
    }

    /// Stores `value` under the server's TTL
    ///
    /// A zero TTL deletes any value already held for the key.
    #[tracing::instrument(err, skip(self, value), fields(cache.scope = %scope))]
    async fn persist(
        &self,
        scope: CacheScope,
        key: &str,
        value: &str,
        opts: PersistOptions,
    ) -> Result<(), CacheUnavailable> {
        let storage_key = scope.storage_key(key);
        let mut conn = self.conn.clone();

        if opts.is_immediately_expired() {
            tracing::trace!("zero ttl requested, clearing key");
            return conn
                .del::<_, ()>(storage_key)
                .await
                .map_err(CacheUnavailable::new);
        }

        match opts.expire {
            Some(expire) => conn.set_ex::<_, _, ()>(storage_key, value, expire.0).await,
            None => conn.set::<_, _, ()>(storage_key, value).await,
        }
        .map_err(CacheUnavailable::new)
    }
}
