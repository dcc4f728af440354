//! Shared security configuration arguments.
//!
//! Keys, salts, and sinks are loaded once at startup; individual subcommands
//! validate that the pieces they need are present.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_ISSUER: &str = "jwt-issuer";
pub const ARG_JWT_AUDIENCE: &str = "jwt-audience";
pub const ARG_LINK_SALT: &str = "link-salt";
pub const ARG_RSA_PRIVATE_PEM: &str = "rsa-private-pem";
pub const ARG_MFA_ISSUER: &str = "mfa-issuer";
pub const ARG_AUDIT_DIR: &str = "audit-dir";
pub const ARG_AUDIT_ENABLED: &str = "audit-enabled";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Symmetric signing secret for API bearer tokens")
                .env("GARDI_JWT_SECRET")
                .global(true),
        )
        .arg(
            Arg::new(ARG_JWT_ISSUER)
                .long(ARG_JWT_ISSUER)
                .help("Issuer claim for API bearer tokens")
                .env("GARDI_JWT_ISSUER")
                .default_value("gardi")
                .global(true),
        )
        .arg(
            Arg::new(ARG_JWT_AUDIENCE)
                .long(ARG_JWT_AUDIENCE)
                .help("Audience claim for API bearer tokens")
                .env("GARDI_JWT_AUDIENCE")
                .default_value("gardi-api")
                .global(true),
        )
        .arg(
            Arg::new(ARG_LINK_SALT)
                .long(ARG_LINK_SALT)
                .help("Server salt embedded in sealed link tokens")
                .env("GARDI_LINK_SALT")
                .global(true),
        )
        .arg(
            Arg::new(ARG_RSA_PRIVATE_PEM)
                .long(ARG_RSA_PRIVATE_PEM)
                .help("Path to the RSA private key PEM used for link tokens")
                .env("GARDI_RSA_PRIVATE_PEM")
                .global(true),
        )
        .arg(
            Arg::new(ARG_MFA_ISSUER)
                .long(ARG_MFA_ISSUER)
                .help("Issuer name shown in authenticator apps")
                .env("GARDI_MFA_ISSUER")
                .default_value("Event Management System")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUDIT_DIR)
                .long(ARG_AUDIT_DIR)
                .help("Directory for security audit log files")
                .env("GARDI_AUDIT_DIR")
                .default_value("logs/security")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUDIT_ENABLED)
                .long(ARG_AUDIT_ENABLED)
                .help("Write security audit log files")
                .env("GARDI_AUDIT_ENABLED")
                .action(ArgAction::SetTrue)
                .global(true),
        )
}

/// Parsed security configuration shared by all subcommands.
#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: Option<SecretString>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub link_salt: Option<String>,
    pub rsa_private_pem: Option<String>,
    pub mfa_issuer: String,
    pub audit_dir: String,
    pub audit_enabled: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is unexpectedly missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            jwt_secret: matches
                .get_one::<String>(ARG_JWT_SECRET)
                .cloned()
                .map(SecretString::from),
            jwt_issuer: matches
                .get_one::<String>(ARG_JWT_ISSUER)
                .cloned()
                .context("missing --jwt-issuer")?,
            jwt_audience: matches
                .get_one::<String>(ARG_JWT_AUDIENCE)
                .cloned()
                .context("missing --jwt-audience")?,
            link_salt: matches.get_one::<String>(ARG_LINK_SALT).cloned(),
            rsa_private_pem: matches.get_one::<String>(ARG_RSA_PRIVATE_PEM).cloned(),
            mfa_issuer: matches
                .get_one::<String>(ARG_MFA_ISSUER)
                .cloned()
                .context("missing --mfa-issuer")?,
            audit_dir: matches
                .get_one::<String>(ARG_AUDIT_DIR)
                .cloned()
                .context("missing --audit-dir")?,
            audit_enabled: matches.get_flag(ARG_AUDIT_ENABLED),
        })
    }
}
