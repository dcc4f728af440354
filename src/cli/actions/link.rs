use crate::cli::actions::{audit_sink, now_unix_seconds};
use crate::cli::commands::security;
use crate::envelope::EnvelopeCodec;
use anyhow::{Context, Result, anyhow};
use serde_json::json;
use std::fs;

fn codec(security: &security::Options) -> Result<EnvelopeCodec> {
    let pem_path = security
        .rsa_private_pem
        .as_deref()
        .context("missing --rsa-private-pem (or GARDI_RSA_PRIVATE_PEM)")?;
    let salt = security
        .link_salt
        .clone()
        .context("missing --link-salt (or GARDI_LINK_SALT)")?;
    let pem = fs::read_to_string(pem_path)
        .with_context(|| format!("failed to read RSA key: {pem_path}"))?;
    EnvelopeCodec::from_pem(&pem, salt, audit_sink(security))
}

/// Seal a verification link token and print the opaque value.
///
/// # Errors
/// Returns an error if configuration is incomplete or sealing fails.
pub fn seal(
    security: &security::Options,
    user_id: &str,
    token: &str,
    nonce: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let codec = codec(security)?;
    let expires_at = now_unix_seconds() + ttl_seconds;
    let value = codec
        .seal(user_id, token, nonce, expires_at)
        .map_err(|err| anyhow!("sealing failed: {err}"))?;
    println!("{value}");
    Ok(())
}

/// Open a sealed link token and print its payload.
///
/// # Errors
/// Returns an error if configuration is incomplete or the value is rejected.
pub fn open(security: &security::Options, value: &str) -> Result<()> {
    let codec = codec(security)?;
    let payload = codec
        .open(value)
        .map_err(|err| anyhow!("link rejected: {err}"))?;

    let output = json!({
        "user_id": payload.user_id,
        "token": payload.token,
        "nonce": payload.nonce,
        "expires_at": payload.expires_at,
        "expired": payload.is_expired(now_unix_seconds()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
