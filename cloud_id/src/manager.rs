//! Key resolution, token verification, and token signing

use std::{fmt, sync::Arc};

use aliri::{
    jwt::{self, BasicHeaders, CoreClaims, CoreValidator},
    Jwt, JwtRef,
};
use aliri_base64::Base64Url;
use aliri_clock::{Clock, System, UnixTime};
use arc_swap::ArcSwapOption;
use cloud_id_cache::{CacheAdapter, CacheScope, DisabledCacheAdapter, PersistOptions};
use serde::Deserialize;

use crate::{
    error::{self, ConfigurationError, SigningError, ValidationError},
    keys::{self, KeyFamily},
    transport::Transport,
    Claims, IdManagerConfig, KeySource, SignOptions, ValidationStrategy, VerifyOptions,
};

struct LoadedKey {
    material: String,
    loaded_at: UnixTime,
}

impl fmt::Debug for LoadedKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoadedKey")
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Resolves key material and verifies or signs tokens under a validation
/// strategy
///
/// Verification keys served by the identity service are held in two tiers:
/// a single slot in process memory and the shared `id_keys` cache scope.
/// Each tier has its own lifetime, configured through [`IdManagerConfig`].
///
/// ```
/// use std::sync::Arc;
///
/// use aliri::jwt;
/// use aliri_clock::DurationSecs;
/// use cloud_id::{Claims, IdManager, SignOptions, ValidationStrategy, VerifyOptions};
///
/// # struct NoNetwork;
/// # impl std::fmt::Debug for NoNetwork {
/// #     fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
/// #         f.write_str("NoNetwork")
/// #     }
/// # }
/// # use cloud_id::{error::TransportError, TransportResponse};
/// # #[async_trait::async_trait]
/// # impl cloud_id::Transport for NoNetwork {
/// #     async fn get(
/// #         &self,
/// #         _: &str,
/// #         _: &[(&str, &str)],
/// #     ) -> Result<TransportResponse, TransportError> {
/// #         Ok(TransportResponse::new(404, ""))
/// #     }
/// #     async fn post_json(
/// #         &self,
/// #         _: &str,
/// #         _: Option<&serde_json::Value>,
/// #         _: &[(&str, &str)],
/// #     ) -> Result<TransportResponse, TransportError> {
/// #         Ok(TransportResponse::new(404, ""))
/// #     }
/// # }
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = IdManager::new(Arc::new(NoNetwork)).with_validation(
///     ValidationStrategy::memory_key("a shared secret of reasonable length")
///         .with_audience(jwt::Audience::from_static("my_api")),
/// );
///
/// let token = manager.sign(
///     Claims::new().with_subject(jwt::Subject::from_static("user-1")),
///     &SignOptions::new().expires_in(DurationSecs(300)),
/// )?;
///
/// let claims = manager.verify(&token, &VerifyOptions::new()).await?;
/// assert_eq!(claims.sub.as_deref().map(|s| s.as_str()), Some("user-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IdManager<C = System> {
    host: Option<String>,
    validation: Option<ValidationStrategy>,
    cache: Arc<dyn CacheAdapter>,
    transport: Arc<dyn Transport>,
    config: IdManagerConfig,
    loaded_key: ArcSwapOption<LoadedKey>,
    clock: C,
}

impl IdManager<System> {
    /// Constructs a manager issuing requests through the given transport
    ///
    /// The manager starts with no host, no validation strategy, and caching
    /// disabled.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            host: None,
            validation: None,
            cache: Arc::new(DisabledCacheAdapter::new()),
            transport,
            config: IdManagerConfig::default(),
            loaded_key: ArcSwapOption::empty(),
            clock: System,
        }
    }

    /// Constructs a manager using a [`ReqwestTransport`][crate::ReqwestTransport]
    /// with the default client configuration
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn with_default_transport() -> Result<Self, error::TransportError> {
        Ok(Self::new(Arc::new(crate::ReqwestTransport::new()?)))
    }
}

impl<C> IdManager<C> {
    /// Sets the base URL of the identity service
    pub fn with_host(self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..self
        }
    }

    /// Sets the validation strategy
    pub fn with_validation(self, validation: ValidationStrategy) -> Self {
        Self {
            validation: Some(validation),
            ..self
        }
    }

    /// Sets the shared cache holding loaded verification keys
    pub fn with_cache(self, cache: Arc<dyn CacheAdapter>) -> Self {
        Self { cache, ..self }
    }

    /// Sets cache lifetimes
    pub fn with_config(self, config: IdManagerConfig) -> Self {
        Self { config, ..self }
    }

    /// Sets a custom clock to be used
    ///
    /// The clock stamps `iat` and `exp` on signed tokens and decides when the
    /// in-memory verification key is stale. It does not govern verification:
    /// the `exp` and `nbf` claims of a token being verified are always checked
    /// against the system clock.
    pub fn with_clock<D>(self, clock: D) -> IdManager<D> {
        IdManager {
            host: self.host,
            validation: self.validation,
            cache: self.cache,
            transport: self.transport,
            config: self.config,
            loaded_key: self.loaded_key,
            clock,
        }
    }

    /// The base URL of the identity service
    pub fn host(&self) -> Result<&str, ConfigurationError> {
        self.host.as_deref().ok_or(ConfigurationError::MissingHost)
    }

    /// The validation strategy, if one is configured
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationStrategy> {
        self.validation.as_ref()
    }

    /// The shared cache
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn CacheAdapter> {
        &self.cache
    }

    /// The outbound transport
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Cache lifetimes
    pub fn config(&self) -> &IdManagerConfig {
        &self.config
    }

    /// Resolves the material used to sign tokens
    ///
    /// Only `memory-key` strategies and `memory-key-pair` strategies holding
    /// a private key can sign. This never touches the network.
    pub fn resolve_signing_key(&self) -> Result<&str, SigningError> {
        let strategy = self
            .validation
            .as_ref()
            .ok_or(ConfigurationError::MissingValidation)?;

        match strategy.source() {
            KeySource::MemoryKey { key_mem } => Ok(key_mem.as_str()),
            KeySource::MemoryKeyPair {
                key_private: Some(key),
                ..
            } => Ok(key.as_str()),
            KeySource::MemoryKeyPair {
                key_private: None, ..
            }
            | KeySource::LoadKey { .. } => Err(error::signing_key_unavailable().into()),
        }
    }

    fn validator(
        strategy: &ValidationStrategy,
        family: KeyFamily,
        opts: &VerifyOptions,
    ) -> CoreValidator {
        let algorithms = if strategy.algorithms().is_empty() {
            family.algorithms()
        } else {
            strategy.algorithms().to_vec()
        };

        let mut validator = CoreValidator::default()
            .extend_approved_algorithms(algorithms)
            .with_leeway_secs(opts.leeway.0);

        let audience = opts
            .audience
            .clone()
            .or_else(|| strategy.audience().map(ToOwned::to_owned));
        if let Some(audience) = audience {
            validator = validator.add_allowed_audience(audience);
        }

        let issuer = opts
            .issuer
            .clone()
            .or_else(|| strategy.issuer().map(ToOwned::to_owned));
        if let Some(issuer) = issuer {
            validator = validator.require_issuer(issuer);
        }

        if opts.check_not_before {
            validator = validator.check_not_before();
        }

        if opts.ignore_expiration {
            validator = validator.ignore_expiration();
        }

        if let Some(subject) = &opts.subject {
            validator = validator.check_subject(subject.clone());
        }

        validator
    }
}

impl<C> IdManager<C>
where
    C: Clock + Send + Sync,
{
    /// Resolves the material used to verify tokens
    ///
    /// For `load-key` strategies, the in-memory slot is consulted first, then
    /// the shared cache, and finally the identity service. A key loaded from
    /// the service populates both tiers. A failed or unsuccessful request
    /// yields `Ok(None)` and caches nothing.
    ///
    /// Returns `Ok(None)` when no validation strategy is configured.
    pub async fn resolve_verification_key(&self) -> Result<Option<String>, ConfigurationError> {
        let strategy = match &self.validation {
            Some(strategy) => strategy,
            None => return Ok(None),
        };

        match strategy.source() {
            KeySource::LoadKey { key_url } => self.load_verification_key(key_url).await,
            KeySource::MemoryKey { key_mem } => Ok(Some(key_mem.as_str().to_owned())),
            KeySource::MemoryKeyPair { key_public, .. } => Ok(Some(key_public.clone())),
        }
    }

    #[tracing::instrument(skip(self), fields(key.url = tracing::field::Empty))]
    async fn load_verification_key(
        &self,
        key_url: &str,
    ) -> Result<Option<String>, ConfigurationError> {
        let host = self.host()?;
        let now = self.clock.now();

        if let Some(loaded) = &*self.loaded_key.load() {
            if now < loaded.loaded_at + self.config.cache_expire_memory() {
                tracing::trace!("verification key found in memory");
                return Ok(Some(loaded.material.clone()));
            }
        }

        let url = format!("{}{}", host, key_url);
        tracing::Span::current().record("key.url", &url.as_str());
        let cache_key = verification_key_id(&url);

        match self.cache.get(CacheScope::IdKeys, &cache_key).await {
            Ok(Some(material)) => {
                tracing::debug!("verification key found in shared cache");
                self.remember(&material, now);
                return Ok(Some(material));
            }
            Ok(None) => tracing::debug!("verification key not cached"),
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to read verification key from cache");
            }
        }

        let response = match self.transport.get(&url, &[]).await {
            Ok(response) => response,
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to load verification key");
                return Ok(None);
            }
        };

        if !response.is_success() {
            tracing::warn!(
                http.status_code = response.status,
                "unable to load verification key; unexpected response status"
            );
            return Ok(None);
        }

        let material = response.body;

        let opts = PersistOptions::expire_after(self.config.cache_expire());
        if let Err(err) = self
            .cache
            .persist(CacheScope::IdKeys, &cache_key, &material, opts)
            .await
        {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "unable to store verification key in cache");
        }

        self.remember(&material, now);
        tracing::info!("verification key loaded");

        Ok(Some(material))
    }

    fn remember(&self, material: &str, now: UnixTime) {
        self.loaded_key.store(Some(Arc::new(LoadedKey {
            material: material.to_owned(),
            loaded_at: now,
        })));
    }

    /// Verifies a token, returning its claims
    pub async fn verify(
        &self,
        token: &JwtRef,
        opts: &VerifyOptions,
    ) -> Result<Claims, ValidationError> {
        self.verify_claims(token, opts).await
    }

    /// Verifies a token, returning its claims as a caller-defined type
    ///
    /// The token must be signed with an algorithm accepted by the strategy.
    /// When the strategy names no algorithms, any algorithm of the family
    /// matching the key material is accepted: HMAC for shared secrets and
    /// RSA for PEM keys.
    #[tracing::instrument(err, skip(self, token, opts))]
    pub async fn verify_claims<T>(
        &self,
        token: &JwtRef,
        opts: &VerifyOptions,
    ) -> Result<T, ValidationError>
    where
        T: for<'de> Deserialize<'de> + CoreClaims,
    {
        let strategy = self
            .validation
            .as_ref()
            .ok_or(ValidationError::MissingStrategy)?;

        let material = self
            .resolve_verification_key()
            .await?
            .ok_or(ValidationError::KeyUnavailable)?;

        let family = KeyFamily::of(&material);
        let key = keys::verification_jwk(&material)?;
        let validator = Self::validator(strategy, family, opts);

        let decomposed: jwt::Decomposed<BasicHeaders> = token.decompose()?;
        let validated = decomposed.verify(&key, &validator)?;
        let (_, claims) = validated.extract();

        Ok(claims)
    }

    /// Signs a set of claims
    ///
    /// The `iat` claim is stamped from the manager's clock. See
    /// [`SignOptions`] for how the algorithm, issuer, and audience are chosen.
    pub fn sign(&self, claims: Claims, opts: &SignOptions) -> Result<Jwt, SigningError> {
        let strategy = self
            .validation
            .as_ref()
            .ok_or(ConfigurationError::MissingValidation)?;
        let material = self.resolve_signing_key()?;

        let family = KeyFamily::of(material);
        let alg = opts
            .algorithm
            .or_else(|| strategy.algorithms().first().copied())
            .unwrap_or_else(|| family.default_algorithm());
        if !family.supports(alg) {
            return Err(ConfigurationError::UnsupportedAlgorithm { alg }.into());
        }

        let key = keys::signing_jwk(material)?;
        let now = self.clock.now();

        let mut claims = claims;
        claims.iat = Some(now);
        if let Some(iss) = opts
            .issuer
            .clone()
            .or_else(|| claims.iss.take())
            .or_else(|| strategy.issuer().map(ToOwned::to_owned))
        {
            claims.iss = Some(iss);
        }
        if let Some(aud) = &opts.audience {
            claims.aud = jwt::Audiences::single(aud.clone());
        } else if claims.aud.is_empty() {
            if let Some(aud) = strategy.audience() {
                claims.aud = jwt::Audiences::single(aud.to_owned());
            }
        }
        if let Some(sub) = &opts.subject {
            claims.sub = Some(sub.clone());
        }
        if let Some(expires_in) = opts.expires_in {
            claims.exp = Some(now + expires_in);
        }
        if let Some(not_before) = opts.not_before {
            claims.nbf = Some(not_before);
        }

        let headers = match &opts.key_id {
            Some(kid) => BasicHeaders::with_key_id(alg, kid.clone()),
            None => BasicHeaders::new(alg),
        };

        let token = Jwt::try_from_parts_with_signature(&headers, &claims, &key)?;
        tracing::debug!(%alg, "token signed");

        Ok(token)
    }
}

/// The cache key under which a verification key loaded from `url` is held
fn verification_key_id(url: &str) -> String {
    format!("vk:{}", Base64Url::from_raw(url.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use aliri::{jwa, jwt::Audience};
    use aliri_clock::DurationSecs;
    use cloud_id_cache::MemoryCacheAdapter;
    use color_eyre::Result;

    use super::*;
    use crate::test::{FailingCache, ManualClock, MockTransport};

    const HOST: &str = "https://id.example.com";
    const KEY_URL: &str = "/id/key";
    const SECRET: &str = "a shared secret of reasonable length";

    fn key_endpoint() -> String {
        format!("{}{}", HOST, KEY_URL)
    }

    fn future_exp() -> UnixTime {
        System.now() + DurationSecs(300)
    }

    fn load_key_manager(
        transport: &MockTransport,
        clock: &ManualClock,
    ) -> (IdManager<ManualClock>, Arc<MemoryCacheAdapter<ManualClock>>) {
        let cache = Arc::new(MemoryCacheAdapter::new().with_clock(clock.clone()));
        let manager = IdManager::new(Arc::new(transport.clone()))
            .with_host(HOST)
            .with_cache(cache.clone())
            .with_validation(ValidationStrategy::load_key(KEY_URL))
            .with_clock(clock.clone());
        (manager, cache)
    }

    #[tokio::test]
    async fn loads_key_once_then_serves_from_memory() -> Result<()> {
        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 200, SECRET);
        let clock = ManualClock::at(10_000);
        let (manager, cache) = load_key_manager(&transport, &clock);

        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(cache.len(), 1);

        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn shared_cache_is_stored_under_derived_key() -> Result<()> {
        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 200, SECRET);
        let clock = ManualClock::at(10_000);
        let (manager, cache) = load_key_manager(&transport, &clock);

        manager.resolve_verification_key().await?;

        let key = verification_key_id(&key_endpoint());
        assert!(key.starts_with("vk:"));
        assert_eq!(
            cache.get(CacheScope::IdKeys, &key).await?.as_deref(),
            Some(SECRET)
        );
        Ok(())
    }

    #[tokio::test]
    async fn memory_tier_expiry_falls_through_to_shared_cache() -> Result<()> {
        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 200, SECRET);
        let clock = ManualClock::at(10_000);
        let (manager, _cache) = load_key_manager(&transport, &clock);

        manager.resolve_verification_key().await?;
        assert_eq!(transport.call_count(), 1);

        clock.advance(200);
        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 1);

        clock.advance(200);
        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn unavailable_cache_falls_back_to_identity_service() -> Result<()> {
        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 200, SECRET);
        let cache = FailingCache::new();
        let manager = IdManager::new(Arc::new(transport.clone()))
            .with_host(HOST)
            .with_cache(Arc::new(cache.clone()))
            .with_validation(ValidationStrategy::load_key(KEY_URL));

        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(cache.attempts(), 2);

        assert_eq!(manager.resolve_verification_key().await?.as_deref(), Some(SECRET));
        assert_eq!(transport.call_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unsuccessful_load_caches_nothing() -> Result<()> {
        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 503, "unavailable");
        let clock = ManualClock::at(10_000);
        let (manager, cache) = load_key_manager(&transport, &clock);

        assert_eq!(manager.resolve_verification_key().await?, None);
        assert!(cache.is_empty());

        assert_eq!(manager.resolve_verification_key().await?, None);
        assert_eq!(transport.call_count(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn transport_failure_yields_no_key() -> Result<()> {
        let transport = MockTransport::new();
        transport.fail(&key_endpoint(), "connection reset");
        let clock = ManualClock::at(10_000);
        let (manager, cache) = load_key_manager(&transport, &clock);

        assert_eq!(manager.resolve_verification_key().await?, None);
        assert!(cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn load_key_without_host_is_a_configuration_error() {
        let transport = MockTransport::new();
        let manager = IdManager::new(Arc::new(transport.clone()))
            .with_validation(ValidationStrategy::load_key(KEY_URL));

        let result = manager.resolve_verification_key().await;

        assert!(matches!(result, Err(ConfigurationError::MissingHost)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn no_strategy_resolves_no_key() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new()));

        assert_eq!(manager.resolve_verification_key().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn memory_strategies_resolve_without_network() -> Result<()> {
        let transport = MockTransport::new();

        let symmetric = IdManager::new(Arc::new(transport.clone()))
            .with_validation(ValidationStrategy::memory_key(SECRET));
        assert_eq!(symmetric.resolve_verification_key().await?.as_deref(), Some(SECRET));

        let pair = IdManager::new(Arc::new(transport.clone()))
            .with_validation(ValidationStrategy::memory_key_pair("PUBLIC PEM", None));
        assert_eq!(pair.resolve_verification_key().await?.as_deref(), Some("PUBLIC PEM"));

        assert_eq!(transport.call_count(), 0);
        Ok(())
    }

    #[test]
    fn signing_key_dispatches_on_strategy() -> Result<()> {
        let transport = MockTransport::new();
        let manager = |strategy: ValidationStrategy| {
            IdManager::new(Arc::new(transport.clone())).with_validation(strategy)
        };

        assert_eq!(
            manager(ValidationStrategy::memory_key(SECRET)).resolve_signing_key()?,
            SECRET
        );
        assert_eq!(
            manager(ValidationStrategy::memory_key_pair(
                "PUBLIC",
                Some(crate::PrivateKeyPem::from_static("PRIVATE"))
            ))
            .resolve_signing_key()?,
            "PRIVATE"
        );
        assert!(matches!(
            manager(ValidationStrategy::memory_key_pair("PUBLIC", None)).resolve_signing_key(),
            Err(SigningError::KeyUnavailable(_))
        ));
        assert!(matches!(
            manager(ValidationStrategy::load_key(KEY_URL)).resolve_signing_key(),
            Err(SigningError::KeyUnavailable(_))
        ));
        assert!(matches!(
            IdManager::new(Arc::new(transport.clone())).resolve_signing_key(),
            Err(SigningError::Configuration(ConfigurationError::MissingValidation))
        ));

        assert_eq!(transport.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn hs256_round_trip() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new())).with_validation(
            ValidationStrategy::memory_key(SECRET)
                .with_issuer(jwt::Issuer::from_static("https://id.example.com"))
                .with_audience(Audience::from_static("my_api"))
                .with_algorithm(jwa::Algorithm::HS256),
        );

        let token = manager.sign(
            Claims::new()
                .with_subject(jwt::Subject::from_static("user-1"))
                .with_expiration(future_exp())
                .with_claim("role", "admin"),
            &SignOptions::new(),
        )?;

        let claims = manager.verify(&token, &VerifyOptions::new()).await?;

        assert_eq!(claims.sub.as_deref().map(|s| s.as_str()), Some("user-1"));
        assert_eq!(claims.iss.as_deref().map(|s| s.as_str()), Some("https://id.example.com"));
        assert_eq!(claims.aud, jwt::Audiences::single(Audience::from_static("my_api")));
        assert!(claims.iat.is_some());
        assert_eq!(claims.claim("role"), Some(serde_json::json!("admin")));
        Ok(())
    }

    #[tokio::test]
    async fn rs256_round_trip() -> Result<()> {
        let private = jwa::rsa::PrivateKey::generate()?;
        let public_pem = private.public_key().to_pem()?;
        let private_pem = private.to_pem();

        let private_pem = crate::PrivateKeyPem::new(private_pem);
        let manager = IdManager::new(Arc::new(MockTransport::new())).with_validation(
            ValidationStrategy::memory_key_pair(public_pem, Some(private_pem))
                .with_audience(Audience::from_static("my_api")),
        );

        let token = manager.sign(
            Claims::new().with_subject(jwt::Subject::from_static("user-2")),
            &SignOptions::new().expires_in(DurationSecs(300)),
        )?;

        let decomposed: jwt::Decomposed<BasicHeaders> = token.decompose()?;
        assert_eq!(jwt::HasAlgorithm::alg(decomposed.untrusted_header()), jwa::Algorithm::RS256);

        let claims = manager.verify(&token, &VerifyOptions::new()).await?;
        assert_eq!(claims.sub.as_deref().map(|s| s.as_str()), Some("user-2"));
        Ok(())
    }

    #[tokio::test]
    async fn verifies_with_key_loaded_from_identity_service() -> Result<()> {
        let signer = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET));
        let token = signer.sign(
            Claims::new().with_expiration(future_exp()),
            &SignOptions::new(),
        )?;

        let transport = MockTransport::new();
        transport.respond(&key_endpoint(), 200, SECRET);
        let verifier = IdManager::new(Arc::new(transport.clone()))
            .with_host(HOST)
            .with_validation(ValidationStrategy::load_key(KEY_URL));

        let _claims = verifier.verify(&token, &VerifyOptions::new()).await?;
        let _claims = verifier.verify(&token, &VerifyOptions::new()).await?;

        assert_eq!(transport.call_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn verify_requires_strategy() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new()));
        let token = JwtRef::from_str("a.b.c");

        let result = manager.verify(token, &VerifyOptions::new()).await;

        assert!(matches!(result, Err(ValidationError::MissingStrategy)));
        Ok(())
    }

    #[tokio::test]
    async fn verify_requires_a_key() -> Result<()> {
        let transport = MockTransport::new();
        let manager = IdManager::new(Arc::new(transport))
            .with_host(HOST)
            .with_validation(ValidationStrategy::load_key(KEY_URL));
        let token = JwtRef::from_str("a.b.c");

        let result = manager.verify(token, &VerifyOptions::new()).await;

        assert!(matches!(result, Err(ValidationError::KeyUnavailable)));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_wrong_audience() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new())).with_validation(
            ValidationStrategy::memory_key(SECRET).with_audience(Audience::from_static("my_api")),
        );
        let token = manager.sign(
            Claims::new().with_expiration(future_exp()),
            &SignOptions::new().with_audience(Audience::from_static("another_api")),
        )?;

        let result = manager.verify(&token, &VerifyOptions::new()).await;

        assert!(matches!(
            result,
            Err(ValidationError::Rejected(aliri::error::JwtVerifyError::ClaimsRejected(
                aliri::error::ClaimsRejected::InvalidAudience
            )))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_expired_token() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET));
        let token = manager.sign(
            Claims::new().with_expiration(UnixTime(System.now().0 - 120)),
            &SignOptions::new(),
        )?;

        let result = manager.verify(&token, &VerifyOptions::new()).await;
        assert!(matches!(
            result,
            Err(ValidationError::Rejected(aliri::error::JwtVerifyError::ClaimsRejected(
                aliri::error::ClaimsRejected::TokenExpired
            )))
        ));

        let claims = manager
            .verify(&token, &VerifyOptions::new().ignore_expiration())
            .await?;
        assert!(claims.exp.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn verification_ignores_custom_clock() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET))
            .with_clock(ManualClock::at(1_000));
        let token = manager.sign(
            Claims::new(),
            &SignOptions::new().expires_in(DurationSecs(300)),
        )?;

        let result = manager.verify(&token, &VerifyOptions::new()).await;
        assert!(matches!(
            result,
            Err(ValidationError::Rejected(aliri::error::JwtVerifyError::ClaimsRejected(
                aliri::error::ClaimsRejected::TokenExpired
            )))
        ));

        let claims = manager
            .verify(&token, &VerifyOptions::new().ignore_expiration())
            .await?;
        assert_eq!(claims.iat, Some(UnixTime(1_000)));
        assert_eq!(claims.exp, Some(UnixTime(1_300)));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_token_signed_by_another_secret() -> Result<()> {
        let other = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key("some other shared secret"));
        let token = other.sign(Claims::new().with_expiration(future_exp()), &SignOptions::new())?;

        let manager = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET));
        let result = manager.verify(&token, &VerifyOptions::new()).await;

        assert!(matches!(result, Err(ValidationError::Rejected(_))));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_algorithm_outside_strategy() -> Result<()> {
        let signer = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET));
        let token = signer.sign(
            Claims::new().with_expiration(future_exp()),
            &SignOptions::new().with_algorithm(jwa::Algorithm::HS512),
        )?;

        let verifier = IdManager::new(Arc::new(MockTransport::new())).with_validation(
            ValidationStrategy::memory_key(SECRET).with_algorithm(jwa::Algorithm::HS256),
        );
        let result = verifier.verify(&token, &VerifyOptions::new()).await;

        assert!(matches!(
            result,
            Err(ValidationError::Rejected(aliri::error::JwtVerifyError::ClaimsRejected(
                aliri::error::ClaimsRejected::InvalidAlgorithm
            )))
        ));
        Ok(())
    }

    #[test]
    fn refuses_to_sign_with_mismatched_algorithm() {
        let manager = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET));

        let result = manager.sign(
            Claims::new(),
            &SignOptions::new().with_algorithm(jwa::Algorithm::RS256),
        );

        assert!(matches!(
            result,
            Err(SigningError::Configuration(ConfigurationError::UnsupportedAlgorithm { .. }))
        ));
    }

    #[test]
    fn stamps_issued_at_from_clock() -> Result<()> {
        let manager = IdManager::new(Arc::new(MockTransport::new()))
            .with_validation(ValidationStrategy::memory_key(SECRET))
            .with_clock(ManualClock::at(1_234));

        let token = manager.sign(
            Claims::new(),
            &SignOptions::new().expires_in(DurationSecs(60)),
        )?;

        let decomposed: jwt::Decomposed<BasicHeaders> = token.decompose()?;
        let payload = Base64Url::from_encoded(decomposed.untrusted_payload())?;
        let claims: Claims = serde_json::from_slice(payload.as_slice())?;

        assert_eq!(claims.iat, Some(UnixTime(1_234)));
        assert_eq!(claims.exp, Some(UnixTime(1_294)));
        Ok(())
    }
}
