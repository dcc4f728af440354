use crate::bearer::{BearerAuthority, MemoryTokenRecords, TokenRecords};
use crate::cli::actions::{audit_sink, now_unix_seconds};
use crate::cli::commands::security;
use anyhow::{Context, Result, anyhow};
use serde_json::json;

fn authority(security: &security::Options) -> Result<BearerAuthority> {
    let secret = security
        .jwt_secret
        .clone()
        .context("missing --jwt-secret (or GARDI_JWT_SECRET)")?;
    Ok(BearerAuthority::new(
        secret,
        security.jwt_issuer.clone(),
        security.jwt_audience.clone(),
        audit_sink(security),
    ))
}

/// Issue a token and print it together with the record the platform's token
/// repository must persist.
///
/// # Errors
/// Returns an error if configuration is incomplete or signing fails.
pub fn issue(
    security: &security::Options,
    name: &str,
    endpoints: &[String],
    ttl_days: i64,
    created_by: &str,
) -> Result<()> {
    let authority = authority(security)?;
    let records = MemoryTokenRecords::new();
    let now = now_unix_seconds();

    let issued = authority.issue_and_store(&records, name, endpoints, ttl_days, created_by, now)?;
    let record = records
        .find(issued.token_id)
        .map_err(|err| anyhow!("token record lookup failed: {err}"))?
        .context("issued record missing")?;

    let output = json!({
        "token": issued.token,
        "token_id": issued.token_id.to_string(),
        "jti": issued.jti.to_string(),
        "expires_at": issued.expires_at,
        "record": {
            "token_id": record.token_id.to_string(),
            "token_name": record.token_name,
            "token_hash": record.token_hash,
            "salt": record.salt,
            "created_at": record.created_at,
            "expires_at": record.expires_at,
            "is_active": record.is_active,
            "created_by": record.created_by,
            "allowed_endpoints": record.allowed_endpoints,
            "usage_count": record.usage_count,
            "last_used_at": record.last_used_at,
        },
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Validate a presented token and print its claims.
///
/// # Errors
/// Returns an error if configuration is incomplete or the token is rejected.
pub fn validate(security: &security::Options, token: &str) -> Result<()> {
    let authority = authority(security)?;
    let claims = authority
        .validate(token, now_unix_seconds())
        .map_err(|err| anyhow!("token rejected: {err}"))?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}
