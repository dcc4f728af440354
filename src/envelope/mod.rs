//! Signed link-token codec.
//!
//! Email verification links carry a single opaque value produced here. The
//! value is a hybrid envelope: the payload is encrypted under a fresh
//! one-time ChaCha20-Poly1305 key, that key is wrapped with the server's RSA
//! public key (OAEP/SHA-256), and `wrapped_key ‖ nonce ‖ ciphertext` is
//! URL-safe base64 without padding. Both fixed-length segments make the
//! decode-side split deterministic.
//!
//! The codec returns the embedded expiry but never enforces it; callers with
//! different validity semantics compare it against their own clock.

use crate::audit::SharedAudit;
use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const DELIMITER: char = '|';

/// Decoded contents of a link token.
///
/// Only the sealed form ever crosses the trust boundary; this struct is
/// rebuilt fresh on every decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPayload {
    pub user_id: String,
    pub token: String,
    pub nonce: String,
    pub expires_at: i64,
}

impl LinkPayload {
    /// Convenience for callers; the codec itself never enforces expiry.
    #[must_use]
    pub fn is_expired(&self, now_unix_seconds: i64) -> bool {
        self.expires_at <= now_unix_seconds
    }
}

/// Why a link token failed to open. Callers must surface every variant as
/// one opaque "invalid link" answer; the specific cause goes to the audit
/// sink only, so a failed decode never becomes an oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("malformed link payload")]
    Malformed,
    #[error("invalid expiry")]
    InvalidExpiry,
    #[error("invalid signature salt")]
    SaltMismatch,
    #[error("invalid signature")]
    Crypto,
}

pub struct EnvelopeCodec {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    salt: String,
    audit: SharedAudit,
}

impl EnvelopeCodec {
    #[must_use]
    pub fn new(private_key: RsaPrivateKey, salt: impl Into<String>, audit: SharedAudit) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            private_key,
            public_key,
            salt: salt.into(),
            audit,
        }
    }

    /// Load the server key from PEM, accepting PKCS#8 or PKCS#1 encodings.
    ///
    /// # Errors
    /// Returns an error if the PEM cannot be parsed as either encoding.
    pub fn from_pem(pem: &str, salt: impl Into<String>, audit: SharedAudit) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .context("failed to parse RSA private key PEM")?;
        Ok(Self::new(private_key, salt, audit))
    }

    /// Seal an identity reference and inner token into an opaque link value.
    ///
    /// # Errors
    /// Returns [`Error::Crypto`] if key wrapping or payload encryption fails.
    pub fn seal(
        &self,
        user_id: &str,
        token: &str,
        nonce: &str,
        expires_at: i64,
    ) -> Result<String, Error> {
        let payload = format!(
            "{user_id}{DELIMITER}{nonce}{DELIMITER}{expires_at}{DELIMITER}{token}{DELIMITER}{salt}",
            salt = self.salt
        );

        let mut key_bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key_bytes);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload.as_bytes())
            .map_err(|_| self.rejected("payload encryption failed", Error::Crypto))?;

        let wrapped_key = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key_bytes)
            .map_err(|_| self.rejected("key wrap failed", Error::Crypto))?;

        let mut wire = Vec::with_capacity(wrapped_key.len() + NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&wrapped_key);
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);

        Ok(Base64UrlUnpadded::encode_string(&wire))
    }

    /// Open a sealed link value and return the embedded payload.
    ///
    /// # Errors
    /// Returns an [`Error`] describing the failed check. The embedded salt
    /// must equal the configured salt even when decryption succeeds.
    pub fn open(&self, value: &str) -> Result<LinkPayload, Error> {
        let wire = Base64UrlUnpadded::decode_vec(value)
            .map_err(|_| self.rejected("invalid base64 wire encoding", Error::Malformed))?;

        let key_size = self.public_key.size();
        if wire.len() < key_size + NONCE_LEN {
            return Err(self.rejected("wire shorter than fixed segments", Error::Malformed));
        }
        let (wrapped_key, rest) = wire.split_at(key_size);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key_bytes = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped_key)
            .map_err(|_| self.rejected("key unwrap failed", Error::Crypto))?;
        if key_bytes.len() != KEY_LEN {
            return Err(self.rejected("unwrapped key has wrong length", Error::Crypto));
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| self.rejected("payload decryption failed", Error::Crypto))?;
        let raw = String::from_utf8(plaintext)
            .map_err(|_| self.rejected("payload is not UTF-8", Error::Malformed))?;

        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        if parts.len() < 5 {
            return Err(self.rejected("payload has fewer than five fields", Error::Malformed));
        }

        let expires_at = parts[2]
            .parse::<i64>()
            .map_err(|_| self.rejected("expiry field is not numeric", Error::InvalidExpiry))?;

        if parts[parts.len() - 1] != self.salt {
            return Err(self.rejected("embedded salt does not match", Error::SaltMismatch));
        }

        // The inner token may itself contain the delimiter; everything
        // between the expiry and the trailing salt belongs to it.
        let token = parts[3..parts.len() - 1].join("|");

        Ok(LinkPayload {
            user_id: parts[0].to_string(),
            token,
            nonce: parts[1].to_string(),
            expires_at,
        })
    }

    fn rejected(&self, cause: &str, error: Error) -> Error {
        self.audit.log("SECURITY", "link", cause, None);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::CapturingAudit;
    use crate::audit::NullAudit;
    use std::sync::{Arc, OnceLock};

    // 2048-bit key generation is slow; share one key across the module.
    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key"))
    }

    fn codec(salt: &str) -> EnvelopeCodec {
        EnvelopeCodec::new(test_key().clone(), salt, NullAudit::shared())
    }

    /// Seal an arbitrary raw payload string with the codec's own keys, for
    /// malformed-payload cases `seal` can never produce.
    fn seal_raw(codec: &EnvelopeCodec, raw: &str) -> String {
        let mut key_bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key_bytes);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), raw.as_bytes())
            .expect("encrypt");
        let wrapped_key = codec
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key_bytes)
            .expect("wrap");

        let mut wire = wrapped_key;
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);
        Base64UrlUnpadded::encode_string(&wire)
    }

    #[test]
    fn round_trip_returns_the_exact_tuple() {
        let codec = codec("server-salt");
        let sealed = codec
            .seal("user-42", "inner-token", "nonce-1", 1_900_000_000)
            .expect("seal");

        let payload = codec.open(&sealed).expect("open");
        assert_eq!(
            payload,
            LinkPayload {
                user_id: "user-42".to_string(),
                token: "inner-token".to_string(),
                nonce: "nonce-1".to_string(),
                expires_at: 1_900_000_000,
            }
        );
        assert!(!payload.is_expired(1_899_999_999));
        assert!(payload.is_expired(1_900_000_000));
    }

    #[test]
    fn inner_token_may_contain_the_delimiter() {
        let codec = codec("server-salt");
        let sealed = codec
            .seal("user-42", "a|b|c", "n", 1_900_000_000)
            .expect("seal");
        let payload = codec.open(&sealed).expect("open");
        assert_eq!(payload.token, "a|b|c");
    }

    #[test]
    fn salt_mismatch_fails_even_with_intact_cryptography() {
        let sealed = codec("salt-one")
            .seal("user-42", "tok", "n", 1_900_000_000)
            .expect("seal");
        assert_eq!(codec("salt-two").open(&sealed), Err(Error::SaltMismatch));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let codec = codec("server-salt");
        let sealed = codec.seal("user-42", "tok", "n", 1_900_000_000).expect("seal");

        let mut wire = Base64UrlUnpadded::decode_vec(&sealed).expect("decode");
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        let tampered = Base64UrlUnpadded::encode_string(&wire);

        assert_eq!(codec.open(&tampered), Err(Error::Crypto));
    }

    #[test]
    fn truncated_wire_is_malformed() {
        let codec = codec("server-salt");
        assert_eq!(codec.open("AAAA"), Err(Error::Malformed));
        assert_eq!(codec.open("not base64 at all!"), Err(Error::Malformed));
    }

    #[test]
    fn too_few_fields_is_malformed() {
        let codec = codec("server-salt");
        let sealed = seal_raw(&codec, "only|three|fields");
        assert_eq!(codec.open(&sealed), Err(Error::Malformed));
    }

    #[test]
    fn non_numeric_expiry_is_rejected() {
        let codec = codec("server-salt");
        let sealed = seal_raw(&codec, "user|nonce|soon|tok|server-salt");
        assert_eq!(codec.open(&sealed), Err(Error::InvalidExpiry));
    }

    #[test]
    fn failures_record_their_specific_cause() {
        let audit = Arc::new(CapturingAudit::default());
        let codec = EnvelopeCodec::new(test_key().clone(), "salt-one", audit.clone());
        let sealed = codec.seal("u", "t", "n", 1_900_000_000).expect("seal");

        let other = EnvelopeCodec::new(test_key().clone(), "salt-two", audit.clone());
        let _ = other.open(&sealed);

        assert_eq!(
            audit.messages(),
            vec!["embedded salt does not match".to_string()]
        );
    }
}
