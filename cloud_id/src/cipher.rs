//! At-rest encryption for cached credentials

use std::fmt;

use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
};

use crate::error::{self, ConfigurationError, DecryptionError, EncryptionFailed};

/// The required length of a credential secret, in bytes
pub const SECRET_LEN: usize = 32;

/// Symmetric encryption of credential payloads
///
/// Payloads are sealed with AES-256-GCM under a fresh random nonce and
/// rendered as `<nonce_hex>:<ciphertext_hex>`, where the ciphertext carries
/// the authentication tag. Encrypting the same payload twice yields distinct
/// blobs, and any alteration of a blob is detected on decryption.
///
/// ```
/// use cloud_id::CredentialCipher;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cipher = CredentialCipher::new(b"0123456789abcdef0123456789abcdef")?;
///
/// let blob = cipher.encrypt(r#"{"access_token":"tok"}"#)?;
/// assert_eq!(cipher.decrypt(&blob)?, r#"{"access_token":"tok"}"#);
/// # Ok(())
/// # }
/// ```
pub struct CredentialCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Constructs a cipher from a secret of exactly [`SECRET_LEN`] bytes
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigurationError> {
        let secret = secret.as_ref();
        if secret.len() != SECRET_LEN {
            return Err(ConfigurationError::InvalidSecretLength {
                expected: SECRET_LEN,
                actual: secret.len(),
            });
        }

        let key = UnboundKey::new(&AES_256_GCM, secret).map_err(|_| {
            ConfigurationError::InvalidSecretLength {
                expected: SECRET_LEN,
                actual: secret.len(),
            }
        })?;

        Ok(Self {
            key: LessSafeKey::new(key),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypts a payload under a fresh nonce
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionFailed> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| error::encryption_failed())?;

        let mut in_out = plaintext.as_bytes().to_vec();
        let unique = Nonce::assume_unique_for_key(nonce);
        self.key
            .seal_in_place_append_tag(unique, Aad::empty(), &mut in_out)
            .map_err(|_| error::encryption_failed())?;

        let mut blob = String::with_capacity((NONCE_LEN + in_out.len()) * 2 + 1);
        blob.push_str(&hex::encode(nonce));
        blob.push(':');
        blob.push_str(&hex::encode(&in_out));
        Ok(blob)
    }

    /// Decrypts a blob produced by [`encrypt`][Self::encrypt]
    pub fn decrypt(&self, blob: &str) -> Result<String, DecryptionError> {
        let (nonce, ciphertext) = blob
            .split_once(':')
            .ok_or(DecryptionError::MissingSeparator)?;

        let nonce = hex::decode(nonce)?;
        let nonce = Nonce::try_assume_unique_for_key(&nonce).map_err(|_| {
            DecryptionError::InvalidNonceLength {
                expected: NONCE_LEN,
                actual: nonce.len(),
            }
        })?;

        let mut in_out = hex::decode(ciphertext)?;
        let len = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| DecryptionError::Unauthenticated)?
            .len();
        in_out.truncate(len);

        Ok(String::from_utf8(in_out)?)
    }
}
