//! End-to-end flow across the security components with a real audit file.

use chrono::Utc;
use gardi::audit::FileAuditLog;
use gardi::bearer::{BearerAuthority, MemoryTokenRecords, TokenRecords, Unauthorized};
use gardi::envelope::EnvelopeCodec;
use gardi::sanitize::{SanitizePolicy, Sanitizer};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use secrecy::SecretString;
use std::fs;

const NOW: i64 = 1_700_000_000;

#[test]
fn bearer_lifecycle_with_audit_trail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audit = FileAuditLog::shared(dir.path(), true);

    let authority = BearerAuthority::new(
        SecretString::from("integration-signing-secret".to_string()),
        "https://events.example.test",
        "gardi",
        audit,
    );
    let records = MemoryTokenRecords::new();

    let issued = authority
        .issue_and_store(
            &records,
            "nightly-export",
            &["/api/events".to_string()],
            30,
            "ops",
            NOW,
        )
        .expect("issue");

    // Fresh token admits and bumps usage.
    let claims = authority
        .admit(&records, &issued.token, "/api/events", NOW + 5)
        .expect("admitted");
    assert_eq!(claims.token_name, "nightly-export");
    let record = records.find(issued.token_id).expect("find").expect("record");
    assert_eq!(record.usage_count, 1);
    assert_eq!(record.last_used_at, Some(NOW + 5));

    // Out-of-scope endpoint and revocation are both opaque denials.
    assert_eq!(
        authority.admit(&records, &issued.token, "/api/users", NOW + 6),
        Err(Unauthorized)
    );
    records.revoke(issued.token_id).expect("revoke");
    assert_eq!(
        authority.admit(&records, &issued.token, "/api/events", NOW + 7),
        Err(Unauthorized)
    );

    // The audit file names the causes the caller never sees.
    let file = dir
        .path()
        .join(format!("log_{}.txt", Utc::now().format("%Y%m%d")));
    let contents = fs::read_to_string(file).expect("audit file");
    assert!(contents.contains("Message: Token issued | Details: nightly-export"));
    assert!(contents.contains("Message: Token admitted"));
    assert!(contents.contains("Message: endpoint not allowed for token"));
    assert!(contents.contains("Message: token is revoked"));
}

#[test]
fn verification_link_flow_over_sanitized_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audit = FileAuditLog::shared(dir.path(), true);

    // The address arrives as untrusted input and must survive sanitization
    // unchanged before a link is minted for it.
    let sanitizer = Sanitizer::new(SanitizePolicy::default(), audit.clone()).expect("sanitizer");
    let email = sanitizer
        .sanitize("alice@example.test")
        .expect("benign address");
    assert_eq!(email, "alice@example.test");

    let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate key");
    let codec = EnvelopeCodec::new(key, "integration-salt", audit);

    let sealed = codec
        .seal("user-42", "verification-token", "nonce-7", NOW + 86_400)
        .expect("seal");
    let payload = codec.open(&sealed).expect("open");

    assert_eq!(payload.user_id, "user-42");
    assert_eq!(payload.token, "verification-token");
    assert!(!payload.is_expired(NOW));
    assert!(payload.is_expired(NOW + 86_400));
}
