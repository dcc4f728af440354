//! TOTP multi-factor authentication.
//!
//! Secrets are 20 random bytes, base32-encoded for authenticator apps. Code
//! checks accept a symmetric window of time steps around "now" to tolerate
//! client clock drift; widening the window increases replay exposure of a
//! leaked code, so it stays a small policy constant. Verification answers
//! with a bare boolean — callers can never tell a wrong code from a corrupt
//! secret.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
const BACKUP_CODE_LEN: usize = 12;

/// Symmetric verification window, in time steps before/after the current
/// one. A policy constant, never persisted.
pub const DEFAULT_WINDOW: u8 = 2;

pub struct MfaVerifier {
    issuer: String,
    window: u8,
}

impl MfaVerifier {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            window: DEFAULT_WINDOW,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: u8) -> Self {
        self.window = window;
        self
    }

    /// Generate a fresh 20-byte enrollment secret, base32-encoded for
    /// authenticator apps.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn generate_secret(&self) -> Result<String> {
        match Secret::generate_secret().to_encoded() {
            Secret::Encoded(encoded) => Ok(encoded),
            Secret::Raw(_) => Err(anyhow!("secret encoding failed")),
        }
    }

    /// The `otpauth://` URI an authenticator app enrolls from.
    #[must_use]
    pub fn provisioning_uri(&self, email: &str, secret: &str) -> String {
        format!(
            "otpauth://totp/{issuer}:{email}?secret={secret}&issuer={issuer}",
            issuer = self.issuer
        )
    }

    /// Enrollment QR code as PNG bytes.
    ///
    /// # Errors
    /// Returns an error if the secret cannot be decoded or rendering fails.
    pub fn qr_png(&self, email: &str, secret: &str) -> Result<Vec<u8>> {
        self.totp_for(secret, email)?
            .get_qr_png()
            .map_err(|err| anyhow!("QR generation error: {err}"))
    }

    /// Check a submitted code against the current time.
    ///
    /// Every failure — malformed secret, malformed code, out-of-window code —
    /// is `false`.
    #[must_use]
    pub fn verify(&self, secret: &str, code: &str) -> bool {
        self.totp_for(secret, "user")
            .ok()
            .and_then(|totp| totp.check_current(code).ok())
            .unwrap_or(false)
    }

    /// Check a submitted code against an explicit timestamp.
    #[must_use]
    pub fn verify_at(&self, secret: &str, code: &str, time_unix_seconds: u64) -> bool {
        self.totp_for(secret, "user")
            .map(|totp| totp.check(code, time_unix_seconds))
            .unwrap_or(false)
    }

    /// Single-use fallback credential: 12 alphanumeric characters, base64
    /// output with padding and URL-unsafe characters stripped. Consumption
    /// and invalidation are owned by the identity store.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub fn generate_backup_code() -> Result<String> {
        let mut code = String::with_capacity(BACKUP_CODE_LEN);
        while code.len() < BACKUP_CODE_LEN {
            let mut bytes = [0u8; 8];
            OsRng
                .try_fill_bytes(&mut bytes)
                .context("failed to generate backup code")?;
            code.extend(
                Base64Unpadded::encode_string(&bytes)
                    .chars()
                    .filter(char::is_ascii_alphanumeric),
            );
        }
        code.truncate(BACKUP_CODE_LEN);
        Ok(code)
    }

    fn totp_for(&self, secret: &str, account: &str) -> Result<TOTP> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|err| anyhow!("secret decode error: {err:?}"))?;
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            self.window,
            STEP_SECONDS,
            bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| anyhow!("TOTP init error: {err}"))
    }
}
