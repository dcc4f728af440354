//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments and maps them to the appropriate action
//! along with the shared security configuration.

use crate::cli::actions::Action;
use crate::cli::commands::security;
use anyhow::{Context, Result, bail};
use uuid::Uuid;

/// Everything the binary needs to run one subcommand.
#[derive(Debug)]
pub struct Invocation {
    pub security: security::Options,
    pub action: Action,
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Invocation> {
    let security = security::Options::parse(matches)?;

    let action = match matches.subcommand() {
        Some(("token", token)) => match token.subcommand() {
            Some(("issue", issue)) => Action::TokenIssue {
                name: required_string(issue, "name")?,
                endpoints: issue
                    .get_many::<String>("endpoints")
                    .context("missing required argument: --endpoints")?
                    .cloned()
                    .collect(),
                ttl_days: issue.get_one::<i64>("ttl-days").copied().unwrap_or(30),
                created_by: required_string(issue, "created-by")?,
            },
            Some(("validate", validate)) => Action::TokenValidate {
                token: required_string(validate, "token")?,
            },
            _ => bail!("unknown token subcommand"),
        },
        Some(("link", link)) => match link.subcommand() {
            Some(("seal", seal)) => Action::LinkSeal {
                user_id: required_string(seal, "user-id")?,
                token: required_string(seal, "token")?,
                nonce: seal
                    .get_one::<String>("nonce")
                    .cloned()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                ttl_seconds: seal.get_one::<i64>("ttl-seconds").copied().unwrap_or(86_400),
            },
            Some(("open", open)) => Action::LinkOpen {
                value: required_string(open, "value")?,
            },
            _ => bail!("unknown link subcommand"),
        },
        Some(("mfa", mfa)) => match mfa.subcommand() {
            Some(("enroll", enroll)) => Action::MfaEnroll {
                email: required_string(enroll, "email")?,
                qr_out: enroll.get_one::<String>("qr-out").cloned(),
            },
            Some(("verify", verify)) => Action::MfaVerify {
                secret: required_string(verify, "secret")?,
                code: required_string(verify, "code")?,
            },
            _ => bail!("unknown mfa subcommand"),
        },
        Some(("sanitize", sanitize)) => Action::Sanitize {
            input: required_string(sanitize, "input")?,
        },
        _ => bail!("unknown subcommand"),
    };

    Ok(Invocation { security, action })
}

fn required_string(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}
