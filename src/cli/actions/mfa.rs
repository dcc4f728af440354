use crate::cli::commands::security;
use crate::mfa::MfaVerifier;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;

/// Generate an enrollment secret and provisioning URI, optionally writing
/// the QR code PNG.
///
/// # Errors
/// Returns an error if secret generation or the QR file write fails.
pub fn enroll(security: &security::Options, email: &str, qr_out: Option<&str>) -> Result<()> {
    let verifier = MfaVerifier::new(security.mfa_issuer.clone());
    let secret = verifier.generate_secret()?;
    let uri = verifier.provisioning_uri(email, &secret);

    if let Some(path) = qr_out {
        let png = verifier.qr_png(email, &secret)?;
        fs::write(path, png).with_context(|| format!("failed to write QR code: {path}"))?;
    }

    let output = json!({
        "secret": secret,
        "uri": uri,
        "qr_file": qr_out,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Check a submitted code against a secret.
///
/// # Errors
/// Returns an error only if output serialization fails; a rejected code is
/// reported in the printed result, never distinguished further.
pub fn verify(security: &security::Options, secret: &str, code: &str) -> Result<()> {
    let verifier = MfaVerifier::new(security.mfa_issuer.clone());
    let valid = verifier.verify(secret, code);
    println!("{}", serde_json::to_string_pretty(&json!({ "valid": valid }))?);
    Ok(())
}
