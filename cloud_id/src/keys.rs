//! Conversion of key material into JWKs

use aliri::{jwa, jws, Jwk};
use aliri_base64::Base64Url;

use crate::error::ConfigurationError;

/// The family of algorithms a piece of key material can serve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyFamily {
    Hmac,
    Rsa,
}

impl KeyFamily {
    /// PEM-encoded material is treated as RSA; anything else is a shared secret
    pub(crate) fn of(material: &str) -> Self {
        if material.trim_start().starts_with("-----BEGIN") {
            Self::Rsa
        } else {
            Self::Hmac
        }
    }

    pub(crate) fn default_algorithm(self) -> jwa::Algorithm {
        match self {
            Self::Hmac => jwa::Algorithm::HS256,
            Self::Rsa => jwa::Algorithm::RS256,
        }
    }

    pub(crate) fn algorithms(self) -> Vec<jwa::Algorithm> {
        match self {
            Self::Hmac => vec![
                jwa::Algorithm::HS256,
                jwa::Algorithm::HS384,
                jwa::Algorithm::HS512,
            ],
            Self::Rsa => vec![
                jwa::Algorithm::RS256,
                jwa::Algorithm::RS384,
                jwa::Algorithm::RS512,
                jwa::Algorithm::PS256,
                jwa::Algorithm::PS384,
                jwa::Algorithm::PS512,
            ],
        }
    }

    pub(crate) fn supports(self, alg: jwa::Algorithm) -> bool {
        match jws::Algorithm::try_from(alg) {
            Ok(jws::Algorithm::Hmac(_)) => self == Self::Hmac,
            Ok(jws::Algorithm::Rsa(_)) => self == Self::Rsa,
            _ => false,
        }
    }
}

fn shared_secret(material: &str) -> Jwk {
    Jwk::from(jwa::Hmac::new(Base64Url::from_raw(material.as_bytes().to_vec())))
}

pub(crate) fn verification_jwk(material: &str) -> Result<Jwk, ConfigurationError> {
    match KeyFamily::of(material) {
        KeyFamily::Hmac => Ok(shared_secret(material)),
        KeyFamily::Rsa => Ok(Jwk::from(jwa::rsa::PublicKey::from_pem(material)?)),
    }
}

pub(crate) fn signing_jwk(material: &str) -> Result<Jwk, ConfigurationError> {
    match KeyFamily::of(material) {
        KeyFamily::Hmac => Ok(shared_secret(material)),
        KeyFamily::Rsa => Ok(Jwk::from(jwa::rsa::PrivateKey::from_pem(material)?)),
    }
}
