//! Fetching of service resources on behalf of a project

use std::sync::Arc;

use aliri_base64::Base64Url;
use aliri_clock::System;
use cloud_id_cache::{CacheAdapter, CacheScope, PersistOptions};

use crate::{error::ResourceError, Credentials, IdManager, TokenBroker};

const RESOURCE_PATH: &str = "/service-resource/";

/// Fetches resources from the identity service, caching them in the
/// manager's shared cache
///
/// When both credentials and a [`TokenBroker`] are configured, requests carry
/// a bearer token acquired for the credentials.
#[derive(Debug)]
pub struct ResourceClient<C = System> {
    manager: Arc<IdManager<C>>,
    broker: Option<Arc<TokenBroker<C>>>,
    credentials: Option<Credentials>,
}

impl<C> ResourceClient<C> {
    /// Constructs an anonymous resource client
    pub fn new(manager: Arc<IdManager<C>>) -> Self {
        Self {
            manager,
            broker: None,
            credentials: None,
        }
    }

    /// Authenticates requests with tokens acquired through `broker`
    pub fn with_broker(self, broker: Arc<TokenBroker<C>>) -> Self {
        Self {
            broker: Some(broker),
            ..self
        }
    }

    /// Authenticates requests as `credentials`
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..self
        }
    }

    /// Returns the resource, if the service provides one
    ///
    /// Resources are cached for the manager's
    /// [`cache_expire`][crate::IdManagerConfig::cache_expire]. Failed
    /// requests, unsuccessful responses, and non-JSON bodies yield `Ok(None)`.
    #[tracing::instrument(err, skip(self))]
    pub async fn get_resource(
        &self,
        project: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<serde_json::Value>, ResourceError> {
        let path = format!("{}/{}/{}", project, service, resource);
        let cache_key = resource_key(&path);
        let cache = self.manager.cache();

        match cache.get(CacheScope::ResourceClient, &cache_key).await {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(value) => {
                    tracing::debug!("resource found in cache");
                    return Ok(Some(value));
                }
                Err(err) => {
                    let error: &dyn std::error::Error = &err;
                    tracing::warn!(error, "cached resource is not valid JSON; refetching");
                }
            },
            Ok(None) => tracing::debug!("resource not cached"),
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to read resource from cache");
            }
        }

        let url = format!("{}{}{}", self.manager.host()?, RESOURCE_PATH, path);

        let mut bearer = None;
        let mut audience = None;
        if let (Some(broker), Some(credentials)) = (&self.broker, &self.credentials) {
            if let Some(envelope) = broker.acquire(credentials).await? {
                bearer = Some(format!("Bearer {}", envelope.access_token.as_str()));
            }
            if let Credentials::Oauth { aud, .. } = credentials {
                audience = Some(aud.as_str());
            }
        }

        let mut headers = Vec::with_capacity(2);
        if let Some(bearer) = &bearer {
            headers.push(("Authorization", bearer.as_str()));
        }
        if let Some(audience) = audience {
            headers.push(("Audience", audience));
        }

        let response = match self.manager.transport().post_json(&url, None, &headers).await {
            Ok(response) => response,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "resource request failed");
                return Ok(None);
            }
        };

        if !response.is_success() {
            tracing::warn!(
                http.status_code = response.status,
                "resource request rejected"
            );
            return Ok(None);
        }

        let value: serde_json::Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "resource response is not valid JSON");
                return Ok(None);
            }
        };

        let opts = PersistOptions::expire_after(self.manager.config().cache_expire());
        if let Err(err) = cache
            .persist(CacheScope::ResourceClient, &cache_key, &value.to_string(), opts)
            .await
        {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "unable to store resource in cache");
        }

        Ok(Some(value))
    }
}

fn resource_key(path: &str) -> String {
    format!("res:{}", Base64Url::from_raw(path.as_bytes().to_vec()))
}
