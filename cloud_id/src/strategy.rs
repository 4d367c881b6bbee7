//! How tokens are verified and signed

use aliri::{jwa, jwt};
use serde::{Deserialize, Serialize};

use crate::{PrivateKeyPem, PrivateKeyPemRef, SharedSecret, SharedSecretRef};

/// The source of key material for verifying and signing tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KeySource {
    /// A verification key served by the identity service
    ///
    /// This source never provides signing material.
    LoadKey {
        /// The path, relative to the manager's host, serving the key
        #[serde(alias = "keyUrl")]
        key_url: String,
    },

    /// A single symmetric secret used for both verification and signing
    MemoryKey {
        /// The shared secret
        #[serde(alias = "keyMem")]
        key_mem: SharedSecret,
    },

    /// An asymmetric key pair held in memory
    MemoryKeyPair {
        /// The PEM-encoded public key, used for verification
        #[serde(alias = "keyPublic")]
        key_public: String,

        /// The PEM-encoded private key, used for signing
        #[serde(default, alias = "keyPrivate", skip_serializing_if = "Option::is_none")]
        key_private: Option<PrivateKeyPem>,
    },
}

/// A validation strategy
///
/// Combines a [`KeySource`] with the expectations placed on tokens verified
/// or signed under it. Deserialized from a flat object, e.g.:
///
/// ```
/// use cloud_id::{KeySource, ValidationStrategy};
///
/// # fn main() -> Result<(), serde_json::Error> {
/// let strategy: ValidationStrategy = serde_json::from_str(r#"{
///     "type": "load-key",
///     "key_url": "/id/key",
///     "issuer": "https://id.example.com",
///     "algorithms": ["RS256"]
/// }"#)?;
///
/// assert!(matches!(strategy.source(), KeySource::LoadKey { .. }));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct ValidationStrategy {
    #[serde(flatten)]
    source: KeySource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<jwt::Issuer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience: Option<jwt::Audience>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    algorithms: Vec<jwa::Algorithm>,
}

impl ValidationStrategy {
    /// A strategy using the given key source, with no further expectations
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            issuer: None,
            audience: None,
            algorithms: Vec::new(),
        }
    }

    /// A strategy loading the verification key from the identity service
    pub fn load_key(key_url: impl Into<String>) -> Self {
        Self::new(KeySource::LoadKey {
            key_url: key_url.into(),
        })
    }

    /// A strategy using a single shared secret
    pub fn memory_key(key_mem: impl Into<String>) -> Self {
        Self::new(KeySource::MemoryKey {
            key_mem: SharedSecret::new(key_mem.into()),
        })
    }

    /// A strategy using a PEM-encoded key pair
    pub fn memory_key_pair(
        key_public: impl Into<String>,
        key_private: Option<PrivateKeyPem>,
    ) -> Self {
        Self::new(KeySource::MemoryKeyPair {
            key_public: key_public.into(),
            key_private,
        })
    }

    /// Requires tokens to carry this issuer, and stamps it on signed tokens
    pub fn with_issuer(self, issuer: jwt::Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Requires tokens to carry this audience, and stamps it on signed tokens
    pub fn with_audience(self, audience: jwt::Audience) -> Self {
        Self {
            audience: Some(audience),
            ..self
        }
    }

    /// Accepts tokens signed with this algorithm
    ///
    /// The first algorithm added is used when signing.
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Self {
        let mut this = self;
        this.algorithms.push(alg);
        this
    }

    /// The key source
    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// The expected issuer
    #[must_use]
    pub fn issuer(&self) -> Option<&jwt::IssuerRef> {
        self.issuer.as_deref()
    }

    /// The expected audience
    #[must_use]
    pub fn audience(&self) -> Option<&jwt::AudienceRef> {
        self.audience.as_deref()
    }

    /// The accepted algorithms, in order of preference
    #[must_use]
    pub fn algorithms(&self) -> &[jwa::Algorithm] {
        &self.algorithms
    }

    /// The symmetric secret, if this is a `memory-key` strategy
    #[must_use]
    pub fn shared_secret(&self) -> Option<&SharedSecretRef> {
        match &self.source {
            KeySource::MemoryKey { key_mem } => Some(&**key_mem),
            _ => None,
        }
    }

    /// The private key, if this is a `memory-key-pair` strategy with one
    #[must_use]
    pub fn private_key(&self) -> Option<&PrivateKeyPemRef> {
        match &self.source {
            KeySource::MemoryKeyPair {
                key_private: Some(key),
                ..
            } => Some(&**key),
            _ => None,
        }
    }
}
