//! Acquisition of access tokens from the identity service, with an encrypted
//! shared cache

use std::sync::Arc;

use aliri::jwt;
use aliri_clock::{DurationSecs, System};
use cloud_id_cache::{CacheAdapter, CacheScope, PersistOptions};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AcquireError, ConfigurationError},
    AccessToken, ApiTokenName, ApiTokenSecret, ClientId, ClientSecret, CredentialCipher,
    IdManager,
};

mod dto;

const API_TOKEN_PATH: &str = "/id/api-token";
const OAUTH_TOKEN_PATH: &str = "/oauth/token";

/// Credentials exchanged for an access token
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// A named API token
    ApiToken {
        /// The token name
        name: ApiTokenName,
        /// The token secret
        secret: ApiTokenSecret,
        /// The audience the access token is intended for
        #[serde(default, alias = "aud")]
        audience: Option<jwt::Audience>,
    },
    /// OAuth2 client credentials
    Oauth {
        /// The client ID
        client_id: ClientId,
        /// The client secret
        client_secret: ClientSecret,
        /// The audience the access token is intended for
        aud: jwt::Audience,
    },
}

impl Credentials {
    /// The non-secret identity of the credentials
    ///
    /// Access tokens are cached under this identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::ApiToken { name, .. } => name.as_str(),
            Self::Oauth { client_id, .. } => client_id.as_str(),
        }
    }

    /// The kind of credentials, as named in configuration
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiToken { .. } => "api_token",
            Self::Oauth { .. } => "oauth",
        }
    }
}

/// An access token as issued by the identity service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEnvelope {
    /// The access token
    pub access_token: AccessToken,
    /// How long the access token remains valid after issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<DurationSecs>,
    /// The type of the token, usually `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Settings for a [`TokenBroker`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[must_use]
pub struct BrokerConfig {
    cache_expire: DurationSecs,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cache_expire: DurationSecs(360),
        }
    }
}

impl BrokerConfig {
    /// The longest an access token is held in the cache
    ///
    /// Tokens expiring sooner are held only until they expire.
    pub fn with_cache_expire(self, cache_expire: DurationSecs) -> Self {
        Self { cache_expire }
    }

    /// The longest an access token is held in the cache
    #[must_use]
    pub fn cache_expire(&self) -> DurationSecs {
        self.cache_expire
    }

    fn ttl_for(&self, envelope: &TokenEnvelope) -> DurationSecs {
        match envelope.expires_in {
            Some(expires_in) if expires_in < self.cache_expire => expires_in,
            _ => self.cache_expire,
        }
    }
}

/// Exchanges credentials for access tokens
///
/// Issued tokens are encrypted with a [`CredentialCipher`] before being
/// written to the manager's cache, keyed by the credentials'
/// [identity][Credentials::identity]. Secrets never reach the cache.
#[derive(Debug)]
pub struct TokenBroker<C = System> {
    manager: Arc<IdManager<C>>,
    cipher: CredentialCipher,
    config: BrokerConfig,
}

impl<C> TokenBroker<C> {
    /// Constructs a broker reaching the identity service through `manager`
    pub fn new(manager: Arc<IdManager<C>>, cipher: CredentialCipher) -> Self {
        Self {
            manager,
            cipher,
            config: BrokerConfig::default(),
        }
    }

    /// Sets the broker's cache settings
    pub fn with_config(self, config: BrokerConfig) -> Self {
        Self { config, ..self }
    }

    /// The manager used to reach the identity service
    pub fn manager(&self) -> &Arc<IdManager<C>> {
        &self.manager
    }

    /// Returns an access token for the credentials
    ///
    /// A cached token is returned when present. Otherwise a new token is
    /// requested and cached. `Ok(None)` means the identity service did not
    /// issue a token.
    ///
    /// # Errors
    ///
    /// A cached token that cannot be decrypted or parsed is an error rather
    /// than a miss, as is a missing host.
    #[tracing::instrument(
        err,
        skip(self, credentials),
        fields(
            credentials.kind = credentials.kind(),
            credentials.identity = credentials.identity(),
        )
    )]
    pub async fn acquire(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<TokenEnvelope>, AcquireError> {
        let identity = credentials.identity();

        match self
            .manager
            .cache()
            .get(CacheScope::OauthCredentials, identity)
            .await
        {
            Ok(Some(blob)) => {
                tracing::debug!("access token found in cache");
                let plaintext = self.cipher.decrypt(&blob)?;
                let envelope =
                    serde_json::from_str(&plaintext).map_err(AcquireError::MalformedEnvelope)?;
                return Ok(Some(envelope));
            }
            Ok(None) => tracing::debug!("access token not cached"),
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to read access token from cache");
            }
        }

        let envelope = match self.request_token(credentials).await? {
            Some(envelope) => envelope,
            None => return Ok(None),
        };

        self.store(identity, &envelope).await;

        Ok(Some(envelope))
    }

    /// Requests a new access token from the identity service, bypassing the
    /// cache
    ///
    /// Returns `Ok(None)` if the request fails or the service responds with
    /// anything other than a token.
    pub async fn request_token(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<TokenEnvelope>, ConfigurationError> {
        let host = self.manager.host()?;

        let (url, body) = match credentials {
            Credentials::ApiToken {
                name,
                secret,
                audience,
            } => (
                format!("{}{}", host, API_TOKEN_PATH),
                serde_json::to_value(dto::ApiTokenRequest {
                    name,
                    secret,
                    audience: audience.as_deref(),
                }),
            ),
            Credentials::Oauth {
                client_id,
                client_secret,
                aud,
            } => (
                format!("{}{}", host, OAUTH_TOKEN_PATH),
                serde_json::to_value(dto::ClientCredentialsRequest {
                    client_id,
                    client_secret,
                    aud,
                }),
            ),
        };

        let body = match body {
            Ok(body) => body,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to serialize token request");
                return Ok(None);
            }
        };

        let response = match self.manager.transport().post_json(&url, Some(&body), &[]).await {
            Ok(response) => response,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, token.url = %url, "token request failed");
                return Ok(None);
            }
        };

        if !response.is_success() {
            tracing::warn!(
                http.status_code = response.status,
                token.url = %url,
                "token request rejected"
            );
            return Ok(None);
        }

        match serde_json::from_str::<TokenEnvelope>(&response.body) {
            Ok(envelope) => {
                tracing::info!(
                    token.expires_in = envelope.expires_in.map(|d| d.0),
                    "access token issued"
                );
                Ok(Some(envelope))
            }
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "token response is not a token");
                Ok(None)
            }
        }
    }

    async fn store(&self, identity: &str, envelope: &TokenEnvelope) {
        let ttl = self.config.ttl_for(envelope);
        if ttl == DurationSecs(0) {
            tracing::debug!("access token expires immediately; not caching");
            return;
        }

        let blob = match serde_json::to_string(envelope) {
            Ok(plaintext) => self.cipher.encrypt(&plaintext),
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to serialize access token for caching");
                return;
            }
        };

        let blob = match blob {
            Ok(blob) => blob,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to encrypt access token for caching");
                return;
            }
        };

        if let Err(err) = self
            .manager
            .cache()
            .persist(
                CacheScope::OauthCredentials,
                identity,
                &blob,
                PersistOptions::expire_after(ttl),
            )
            .await
        {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "unable to store access token in cache");
        }
    }
}
