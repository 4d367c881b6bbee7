//! Cache lifetimes and per-call verify and sign options

use aliri::{jwa, jwk, jwt};
use aliri_clock::{DurationSecs, UnixTime};
use regex::Regex;
use serde::Deserialize;

/// Settings for an [`IdManager`][crate::IdManager]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[must_use]
pub struct IdManagerConfig {
    cache_expire: DurationSecs,
    cache_expire_memory: DurationSecs,
}

impl Default for IdManagerConfig {
    fn default() -> Self {
        Self {
            cache_expire: DurationSecs(360),
            cache_expire_memory: DurationSecs(180),
        }
    }
}

impl IdManagerConfig {
    /// How long a loaded verification key is held in the shared cache
    pub fn with_cache_expire(self, cache_expire: DurationSecs) -> Self {
        Self {
            cache_expire,
            ..self
        }
    }

    /// How long a loaded verification key is held in process memory
    pub fn with_cache_expire_memory(self, cache_expire_memory: DurationSecs) -> Self {
        Self {
            cache_expire_memory,
            ..self
        }
    }

    /// How long a loaded verification key is held in the shared cache
    #[must_use]
    pub fn cache_expire(&self) -> DurationSecs {
        self.cache_expire
    }

    /// How long a loaded verification key is held in process memory
    #[must_use]
    pub fn cache_expire_memory(&self) -> DurationSecs {
        self.cache_expire_memory
    }
}

/// Per-call adjustments to token verification
///
/// Issuer and audience default to those of the validation strategy.
/// Expiration is checked by default, and tokens lacking an `exp` claim
/// are rejected unless expiration checks are skipped.
#[derive(Clone, Debug)]
#[must_use]
pub struct VerifyOptions {
    pub(crate) issuer: Option<jwt::Issuer>,
    pub(crate) audience: Option<jwt::Audience>,
    pub(crate) leeway: DurationSecs,
    pub(crate) check_not_before: bool,
    pub(crate) ignore_expiration: bool,
    pub(crate) subject: Option<Regex>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway: DurationSecs(0),
            check_not_before: false,
            ignore_expiration: false,
            subject: None,
        }
    }
}

impl VerifyOptions {
    /// Default verification options
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires this issuer in place of the strategy's
    pub fn with_issuer(self, issuer: jwt::Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Requires this audience in place of the strategy's
    pub fn with_audience(self, audience: jwt::Audience) -> Self {
        Self {
            audience: Some(audience),
            ..self
        }
    }

    /// Allows a grace period on either side of the `nbf` and `exp` claims
    pub fn with_leeway(self, leeway: DurationSecs) -> Self {
        Self { leeway, ..self }
    }

    /// Rejects tokens used before their `nbf` claim
    pub fn check_not_before(self) -> Self {
        Self {
            check_not_before: true,
            ..self
        }
    }

    /// Skips expiration checks
    pub fn ignore_expiration(self) -> Self {
        Self {
            ignore_expiration: true,
            ..self
        }
    }

    /// Requires the `sub` claim to match the pattern
    pub fn check_subject(self, subject: Regex) -> Self {
        Self {
            subject: Some(subject),
            ..self
        }
    }
}

/// Per-call adjustments to token signing
///
/// The algorithm defaults to the first algorithm of the validation strategy,
/// or else to `HS256` for shared secrets and `RS256` for PEM keys. Issuer and
/// audience default to those already on the claims, then to those of the
/// strategy.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct SignOptions {
    pub(crate) algorithm: Option<jwa::Algorithm>,
    pub(crate) issuer: Option<jwt::Issuer>,
    pub(crate) audience: Option<jwt::Audience>,
    pub(crate) subject: Option<jwt::Subject>,
    pub(crate) expires_in: Option<DurationSecs>,
    pub(crate) not_before: Option<UnixTime>,
    pub(crate) key_id: Option<jwk::KeyId>,
}

impl SignOptions {
    /// Default signing options
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs with this algorithm
    pub fn with_algorithm(self, algorithm: jwa::Algorithm) -> Self {
        Self {
            algorithm: Some(algorithm),
            ..self
        }
    }

    /// Stamps this issuer on the token
    pub fn with_issuer(self, issuer: jwt::Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Stamps this audience on the token
    pub fn with_audience(self, audience: jwt::Audience) -> Self {
        Self {
            audience: Some(audience),
            ..self
        }
    }

    /// Stamps this subject on the token
    pub fn with_subject(self, subject: jwt::Subject) -> Self {
        Self {
            subject: Some(subject),
            ..self
        }
    }

    /// Expires the token this long after it is signed
    pub fn expires_in(self, expires_in: DurationSecs) -> Self {
        Self {
            expires_in: Some(expires_in),
            ..self
        }
    }

    /// Makes the token invalid before this time
    pub fn not_before(self, not_before: UnixTime) -> Self {
        Self {
            not_before: Some(not_before),
            ..self
        }
    }

    /// Names the signing key in the token header
    pub fn with_key_id(self, key_id: jwk::KeyId) -> Self {
        Self {
            key_id: Some(key_id),
            ..self
        }
    }
}
