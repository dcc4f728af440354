use crate::cli::actions::audit_sink;
use crate::cli::commands::security;
use crate::sanitize::{SanitizePolicy, Sanitizer};
use anyhow::Result;
use serde_json::json;

/// Run one input through the sanitizer and print the outcome.
///
/// # Errors
/// Returns an error if the sanitizer fails to construct.
pub fn run(security: &security::Options, input: &str) -> Result<()> {
    let sanitizer = Sanitizer::new(SanitizePolicy::default(), audit_sink(security))?;

    let output = match sanitizer.sanitize(input) {
        Ok(clean) => json!({ "clean": clean }),
        Err(violation) => json!({ "rejected": violation.to_string() }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
