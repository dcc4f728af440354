//! # Gardi (Trust & Token Security Core)
//!
//! `gardi` is the trust layer of an event and certificate management
//! platform: everything that mints or checks a security-critical artifact
//! under adversarial input lives here.
//!
//! ## Components
//!
//! - **`sanitize`** — multi-round decoding sanitizer for untrusted request
//!   fields, with a bounded decode loop and a dangerous-token scan. Rejection
//!   is distinct from "benign but empty".
//! - **`envelope`** — hybrid-encrypted, salted, expiring link tokens for
//!   email verification. The codec returns the embedded expiry; enforcement
//!   belongs to the caller.
//! - **`bearer`** — scoped, expiring API bearer tokens (HS256, zero skew)
//!   with hash-only persistence and a soft record lifecycle.
//! - **`mfa`** — TOTP secrets, provisioning URIs, QR codes, and windowed
//!   code verification; backup codes as single-use fallbacks.
//! - **`audit`** — best-effort security audit sink, one file per UTC day.
//!
//! Every component is stateless after construction and safe to share across
//! request-handling threads; configuration (keys, salts, policy bounds) is
//! loaded once and never mutated. The audit sink is injected explicitly —
//! there is no process-wide logger state.
//!
//! Registration, password storage, session cookies, routing, and persistence
//! are external collaborators and intentionally absent.

pub mod audit;
pub mod bearer;
pub mod cli;
pub mod envelope;
pub mod mfa;
pub mod sanitize;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
