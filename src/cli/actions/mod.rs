pub mod link;
pub mod mfa;
pub mod sanitize;
pub mod token;

use crate::audit::{FileAuditLog, SharedAudit};
use crate::cli::commands::security;
use crate::cli::dispatch::Invocation;
use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    TokenIssue {
        name: String,
        endpoints: Vec<String>,
        ttl_days: i64,
        created_by: String,
    },
    TokenValidate {
        token: String,
    },
    LinkSeal {
        user_id: String,
        token: String,
        nonce: String,
        ttl_seconds: i64,
    },
    LinkOpen {
        value: String,
    },
    MfaEnroll {
        email: String,
        qr_out: Option<String>,
    },
    MfaVerify {
        secret: String,
        code: String,
    },
    Sanitize {
        input: String,
    },
}

/// Execute the parsed action.
///
/// # Errors
/// Returns an error if the action's configuration is incomplete or the
/// operation itself fails.
pub fn handle(invocation: Invocation) -> Result<()> {
    let Invocation { security, action } = invocation;

    match action {
        Action::TokenIssue {
            name,
            endpoints,
            ttl_days,
            created_by,
        } => token::issue(&security, &name, &endpoints, ttl_days, &created_by),
        Action::TokenValidate { token } => token::validate(&security, &token),
        Action::LinkSeal {
            user_id,
            token,
            nonce,
            ttl_seconds,
        } => link::seal(&security, &user_id, &token, &nonce, ttl_seconds),
        Action::LinkOpen { value } => link::open(&security, &value),
        Action::MfaEnroll { email, qr_out } => mfa::enroll(&security, &email, qr_out.as_deref()),
        Action::MfaVerify { secret, code } => mfa::verify(&security, &secret, &code),
        Action::Sanitize { input } => sanitize::run(&security, &input),
    }
}

pub(crate) fn audit_sink(security: &security::Options) -> SharedAudit {
    FileAuditLog::shared(&security.audit_dir, security.audit_enabled)
}

pub(crate) fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
