//! API bearer token issuance and validation.
//!
//! Machine-to-machine callers present a signed, self-describing bearer token
//! that is independent of user sessions. The plaintext token is never
//! persisted: the store keeps `SHA-256(token ‖ salt)` with a per-token salt,
//! compared at lookup time. Records follow a soft lifecycle — revocation
//! flips `is_active`, nothing is ever deleted — so the audit trail stays
//! continuous.

pub mod jwt;

use crate::audit::SharedAudit;
use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

pub use jwt::ApiTokenClaims;

const SECONDS_PER_DAY: i64 = 86_400;

/// A freshly issued token together with the identifiers the caller needs to
/// persist its record. The token string itself is shown once and never
/// stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub jti: Uuid,
    pub expires_at: i64,
}

/// Persisted description of an issued token. Owned by an external
/// repository; [`MemoryTokenRecords`] is the in-crate reference store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTokenRecord {
    pub token_id: Uuid,
    pub token_name: String,
    pub token_hash: String,
    pub salt: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub is_active: bool,
    pub created_by: String,
    pub allowed_endpoints: BTreeSet<String>,
    pub usage_count: u64,
    pub last_used_at: Option<i64>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store failure: {0}")]
    Store(String),
}

/// Store seam for issued-token records.
pub trait TokenRecords: Send + Sync {
    fn insert(&self, record: ApiTokenRecord) -> Result<(), StoreError>;
    fn find(&self, token_id: Uuid) -> Result<Option<ApiTokenRecord>, StoreError>;
    /// Bump `usage_count` and set `last_used_at` after a successful admit.
    fn mark_used(&self, token_id: Uuid, now_unix_seconds: i64) -> Result<(), StoreError>;
    /// Flip `is_active` off. Returns whether the record existed.
    fn revoke(&self, token_id: Uuid) -> Result<bool, StoreError>;
}

/// The one answer external callers ever see for a failed admit. The specific
/// cause is recorded in the audit log only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unauthorized")]
pub struct Unauthorized;

pub struct BearerAuthority {
    secret: SecretString,
    issuer: String,
    audience: String,
    audit: SharedAudit,
}

impl BearerAuthority {
    #[must_use]
    pub fn new(
        secret: SecretString,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        audit: SharedAudit,
    ) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
            audit,
        }
    }

    /// Issue a scoped bearer token valid for `ttl_days`.
    ///
    /// # Errors
    /// Returns an error if claim encoding or signing fails.
    pub fn issue(
        &self,
        token_name: &str,
        endpoints: &[String],
        ttl_days: i64,
        created_by: &str,
        now_unix_seconds: i64,
    ) -> Result<IssuedToken, jwt::Error> {
        let token_id = Uuid::new_v4();
        let jti = Uuid::new_v4();
        let expires_at = now_unix_seconds + ttl_days * SECONDS_PER_DAY;

        let claims = ApiTokenClaims {
            token_name: token_name.to_string(),
            created_by: created_by.to_string(),
            allowed_endpoints: endpoints.join(","),
            jti: jti.to_string(),
            token_id: token_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now_unix_seconds,
            exp: expires_at,
        };
        let token = jwt::sign_hs256(self.secret.expose_secret().as_bytes(), &claims)?;

        self.audit
            .log("INFO", "bearer", "Token issued", Some(token_name));

        Ok(IssuedToken {
            token,
            token_id,
            jti,
            expires_at,
        })
    }

    /// Verify signature and standard claims only; no record lookup.
    ///
    /// # Errors
    /// Returns the specific claim failure; callers exposed to the outside
    /// should go through [`BearerAuthority::admit`] instead.
    pub fn validate(&self, token: &str, now_unix_seconds: i64) -> Result<ApiTokenClaims, jwt::Error> {
        jwt::verify_hs256(
            token,
            self.secret.expose_secret().as_bytes(),
            &self.issuer,
            &self.audience,
            now_unix_seconds,
        )
    }

    /// Issue a token and persist its record in one step.
    ///
    /// # Errors
    /// Returns an error if signing, salt generation, or the store insert
    /// fails.
    pub fn issue_and_store(
        &self,
        records: &dyn TokenRecords,
        token_name: &str,
        endpoints: &[String],
        ttl_days: i64,
        created_by: &str,
        now_unix_seconds: i64,
    ) -> Result<IssuedToken> {
        let issued = self
            .issue(token_name, endpoints, ttl_days, created_by, now_unix_seconds)
            .context("failed to sign bearer token")?;
        let salt = Self::generate_salt()?;

        records
            .insert(ApiTokenRecord {
                token_id: issued.token_id,
                token_name: token_name.to_string(),
                token_hash: Self::hash_token(&issued.token, &salt),
                salt,
                created_at: now_unix_seconds,
                expires_at: issued.expires_at,
                is_active: true,
                created_by: created_by.to_string(),
                allowed_endpoints: endpoints.iter().cloned().collect(),
                usage_count: 0,
                last_used_at: None,
            })
            .context("failed to persist token record")?;

        Ok(issued)
    }

    /// Full lookup-time admission: claims, record, hash, lifecycle, endpoint.
    /// Updates the record's usage counters on success.
    ///
    /// # Errors
    /// Returns [`Unauthorized`] for every failure; the cause is written to
    /// the audit sink only.
    pub fn admit(
        &self,
        records: &dyn TokenRecords,
        token: &str,
        endpoint: &str,
        now_unix_seconds: i64,
    ) -> Result<ApiTokenClaims, Unauthorized> {
        let claims = self
            .validate(token, now_unix_seconds)
            .map_err(|err| self.denied(&format!("claims rejected: {err}")))?;

        let token_id = Uuid::parse_str(&claims.token_id)
            .map_err(|_| self.denied("token_id claim is not a UUID"))?;

        let record = match records.find(token_id) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(self.denied("no record for presented token")),
            Err(err) => return Err(self.denied(&format!("record lookup failed: {err}"))),
        };

        if !record.is_active {
            return Err(self.denied("token is revoked"));
        }
        if record.expires_at <= now_unix_seconds {
            return Err(self.denied("token record expired"));
        }
        if Self::hash_token(token, &record.salt) != record.token_hash {
            return Err(self.denied("token hash mismatch"));
        }
        if !record.allowed_endpoints.contains(endpoint) {
            return Err(self.denied("endpoint not allowed for token"));
        }

        records
            .mark_used(token_id, now_unix_seconds)
            .map_err(|err| self.denied(&format!("usage update failed: {err}")))?;

        self.audit
            .log("INFO", "bearer", "Token admitted", Some(&record.token_name));
        Ok(claims)
    }

    /// `SHA-256(token ‖ salt)`, standard base64. The only token-derived value
    /// that is ever stored.
    #[must_use]
    pub fn hash_token(token: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(salt.as_bytes());
        Base64::encode_string(&hasher.finalize())
    }

    /// Fresh per-token salt, standard base64 of 32 random bytes.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub fn generate_salt() -> Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate token salt")?;
        Ok(Base64::encode_string(&bytes))
    }

    fn denied(&self, cause: &str) -> Unauthorized {
        self.audit.log("SECURITY", "bearer", cause, None);
        Unauthorized
    }
}

/// In-memory [`TokenRecords`] used by tests and the operator CLI.
#[derive(Default)]
pub struct MemoryTokenRecords {
    records: Mutex<HashMap<Uuid, ApiTokenRecord>>,
}

impl MemoryTokenRecords {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenRecords for MemoryTokenRecords {
    fn insert(&self, record: ApiTokenRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Store("poisoned lock".to_string()))?;
        records.insert(record.token_id, record);
        Ok(())
    }

    fn find(&self, token_id: Uuid) -> Result<Option<ApiTokenRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Store("poisoned lock".to_string()))?;
        Ok(records.get(&token_id).cloned())
    }

    fn mark_used(&self, token_id: Uuid, now_unix_seconds: i64) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Store("poisoned lock".to_string()))?;
        let record = records
            .get_mut(&token_id)
            .ok_or_else(|| StoreError::Store("unknown token".to_string()))?;
        record.usage_count += 1;
        record.last_used_at = Some(now_unix_seconds);
        Ok(())
    }

    fn revoke(&self, token_id: Uuid) -> Result<bool, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Store("poisoned lock".to_string()))?;
        Ok(records
            .get_mut(&token_id)
            .map(|record| {
                record.is_active = false;
            })
            .is_some())
    }
}
