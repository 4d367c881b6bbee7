//! Common errors

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use aliri::jwa;
use thiserror::Error;

/// The broker or manager was configured in a way that cannot be used
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The credential secret was not of the required length
    #[error("credential secret must be exactly {expected} bytes, got {actual}")]
    InvalidSecretLength {
        /// The required length in bytes
        expected: usize,
        /// The length of the secret supplied
        actual: usize,
    },

    /// A remote operation was requested without a configured host
    #[error("a host is required to reach the identity service")]
    MissingHost,

    /// An operation requiring a validation strategy was attempted without one
    #[error("a validation strategy is required for this operation")]
    MissingValidation,

    /// The algorithm cannot be used with the configured key material
    #[error("algorithm '{alg}' cannot be used with the configured key")]
    UnsupportedAlgorithm {
        /// The requested algorithm
        alg: jwa::Algorithm,
    },

    /// The key material could not be parsed
    #[error("key material rejected")]
    KeyRejected(#[from] aliri::error::KeyRejected),
}

/// The cached credential blob could not be decrypted
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The blob did not contain a `nonce:ciphertext` separator
    #[error("encrypted blob is missing the nonce separator")]
    MissingSeparator,

    /// The nonce or ciphertext was not valid hex
    #[error("encrypted blob is not valid hex")]
    InvalidHex(#[from] hex::FromHexError),

    /// The nonce was not of the expected length
    #[error("nonce must be {expected} bytes, got {actual}")]
    InvalidNonceLength {
        /// The required length in bytes
        expected: usize,
        /// The length of the nonce found
        actual: usize,
    },

    /// The ciphertext failed authentication
    ///
    /// Either the blob was altered or it was encrypted under another secret.
    #[error("encrypted blob failed authentication")]
    Unauthenticated,

    /// The decrypted payload was not valid UTF-8
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// The payload could not be encrypted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("unable to encrypt payload")]
pub struct EncryptionFailed {
    _p: (),
}

pub(crate) const fn encryption_failed() -> EncryptionFailed {
    EncryptionFailed { _p: () }
}

/// The validation strategy holds no material usable for signing
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("no signing key available for the validation strategy")]
pub struct SigningKeyUnavailable {
    _p: (),
}

pub(crate) const fn signing_key_unavailable() -> SigningKeyUnavailable {
    SigningKeyUnavailable { _p: () }
}

/// A request to an outbound service could not be completed
#[derive(Debug, Error)]
#[error("outbound request failed")]
pub struct TransportError {
    #[source]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl TransportError {
    /// Wraps an error raised by a transport implementation
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A token could not be verified
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No validation strategy is configured
    #[error("a validation strategy is required to verify tokens")]
    MissingStrategy,

    /// The verification key could not be resolved
    #[error("verification key unavailable")]
    KeyUnavailable,

    /// The configuration prevented the key from being used
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The token was rejected
    #[error("token rejected")]
    Rejected(#[from] aliri::error::JwtVerifyError),
}

/// A token could not be signed
#[derive(Debug, Error)]
pub enum SigningError {
    /// The configuration prevented signing
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No private material is available
    #[error(transparent)]
    KeyUnavailable(#[from] SigningKeyUnavailable),

    /// The token could not be assembled or signed
    #[error("unable to sign token")]
    Jwt(#[from] aliri::error::JwtSigningError),
}

/// An access token could not be acquired
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The configuration prevented a token request
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A cached token could not be decrypted
    #[error("unable to decrypt cached token")]
    Decryption(#[from] DecryptionError),

    /// A cached token decrypted to an unexpected shape
    #[error("cached token is malformed")]
    MalformedEnvelope(#[source] serde_json::Error),
}

/// A resource could not be fetched
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The configuration prevented a resource request
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A bearer token for the request could not be acquired
    #[error("unable to acquire a bearer token for the resource request")]
    Acquire(#[from] AcquireError),
}
