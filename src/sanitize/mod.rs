//! Untrusted-input sanitizer.
//!
//! Normalizes and neutralizes request strings before they reach business
//! logic. Single-pass stripping is bypassed by nested or alternate encodings,
//! so the engine runs a bounded decode-and-normalize loop to a fixed point,
//! rejects inputs that keep expanding, and only then applies the hardening
//! pass. The token list and strip steps are a defense-in-depth heuristic,
//! not a proof of XSS-safety.

pub mod fields;

use crate::audit::SharedAudit;
use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

pub use fields::{scrub, FieldViolation, SanitizedFields};

/// Why an input was rejected instead of cleaned.
///
/// Distinct from a successfully sanitized empty string: a violation means the
/// caller should refuse the request outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    /// A percent-encoded `<` survived the first decode, in plain, doubled, or
    /// malformed-unicode form. Classic filter-bypass shape.
    #[error("encoded markup detected")]
    EncodedMarkup,
    /// The input did not reach a decode fixed point within the round cap.
    #[error("decode limit exceeded")]
    DecodeBomb,
    /// A script token, event handler, or script protocol was found after full
    /// decoding.
    #[error("dangerous content detected")]
    DangerousContent,
}

/// Bounds for the decode loop and output lengths. Immutable; one instance is
/// shared across all calls.
#[derive(Debug, Clone, Copy)]
pub struct SanitizePolicy {
    pub max_decode_rounds: usize,
    pub absolute_max_length: usize,
    pub logical_max_length: usize,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            max_decode_rounds: 10,
            absolute_max_length: 2000,
            logical_max_length: 255,
        }
    }
}

pub struct Sanitizer {
    policy: SanitizePolicy,
    audit: SharedAudit,
    encoded_markup: Regex,
    dangerous: Regex,
    control: Regex,
    tags: Regex,
    fragments: Regex,
    specials: Regex,
}

impl Sanitizer {
    /// Compile the pattern set once. Construction happens at startup; the
    /// engine itself is infallible afterwards.
    ///
    /// # Errors
    /// Returns an error if a pattern fails to compile.
    pub fn new(policy: SanitizePolicy, audit: SharedAudit) -> Result<Self> {
        Ok(Self {
            policy,
            audit,
            encoded_markup: Regex::new(r"(?i)(%25){0,}\s*%3C|%3C|%253C|%u003C")
                .context("encoded markup pattern")?,
            dangerous: Regex::new(
                r"(?i)<\s*script\b|on\w+\s*=|javascript:|vbscript:|eval\(|document\.cookie|window\.location|<\s*iframe\b",
            )
            .context("dangerous token pattern")?,
            control: Regex::new(r"\p{C}+").context("control character pattern")?,
            tags: Regex::new(r"(?s)<[^>]*>").context("tag pattern")?,
            fragments: Regex::new(
                r"(?i)javascript:|vbscript:|data:text/html|on\w+\s*=|document\.|window\.|eval\(|alert\(|cookie",
            )
            .context("keyword fragment pattern")?,
            specials: Regex::new(r#"[<>"'`%&()]"#).context("special character pattern")?,
        })
    }

    #[must_use]
    pub fn policy(&self) -> &SanitizePolicy {
        &self.policy
    }

    /// Sanitize one untrusted string.
    ///
    /// Empty or whitespace-only input short-circuits to `Ok("")` — benign but
    /// empty is not a violation.
    ///
    /// # Errors
    /// Returns a [`Violation`] when the input must be rejected rather than
    /// cleaned; the specific cause is also written to the audit sink.
    pub fn sanitize(&self, input: &str) -> Result<String, Violation> {
        if input.trim().is_empty() {
            return Ok(String::new());
        }

        let decoded = url_decode(input);
        let original = decoded.trim().to_string();

        // Decode-bypass attempts are caught before the expansion loop runs:
        // an encoded "<" that survived one decode only exists to defeat it.
        if self.encoded_markup.is_match(&original) {
            self.reject("Encoded angle bracket detected", &original);
            return Err(Violation::EncodedMarkup);
        }

        let mut current = original.clone();
        let mut rounds = 0;

        while rounds < self.policy.max_decode_rounds {
            let url_decoded = url_decode(&current);
            let html_decoded = html_decode(&url_decoded);

            if html_decoded == current {
                break;
            }
            current = html_decoded;

            if current.chars().count() > self.policy.absolute_max_length {
                current = truncate_chars(&current, self.policy.absolute_max_length);
                self.audit.log(
                    "SECURITY",
                    "sanitize",
                    "Input truncated after expansion",
                    Some(&original),
                );
            }

            rounds += 1;
        }

        if rounds >= self.policy.max_decode_rounds {
            self.reject("Too many decode rounds", &original);
            return Err(Violation::DecodeBomb);
        }

        if self.dangerous.is_match(&current) {
            self.reject("Dangerous script token found", &current);
            return Err(Violation::DangerousContent);
        }

        let mut hardened = truncate_chars(&current, self.policy.logical_max_length);
        hardened = self.control.replace_all(&hardened, "").into_owned();
        hardened = self.tags.replace_all(&hardened, "").into_owned();
        hardened = self.fragments.replace_all(&hardened, "").into_owned();
        hardened = self.specials.replace_all(&hardened, "").into_owned();

        Ok(html_encode(&hardened))
    }

    fn reject(&self, message: &str, offending: &str) {
        self.audit
            .log("SECURITY", "sanitize", message, Some(offending));
    }
}

/// Percent-decode with `+` treated as space. Malformed sequences pass through
/// untouched and invalid UTF-8 is replaced; decoding never fails the call.
fn url_decode(input: &str) -> String {
    let plus_decoded = input.replace('+', " ");
    let decoded = urlencoding::decode_binary(plus_decoded.as_bytes()).into_owned();
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Single-pass HTML entity decode: named core entities plus decimal and hex
/// character references. One call unwraps exactly one nesting level, which is
/// what lets the round counter measure nesting depth.
fn html_decode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let Some(semi) = rest[1..].find(';').map(|offset| offset + 1) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let name = &rest[1..semi];
        if is_entity_body(name) {
            match decode_entity(name) {
                Some(ch) => out.push(ch),
                // Unknown entity: keep verbatim.
                None => out.push_str(&rest[..=semi]),
            }
            rest = &rest[semi + 1..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

fn is_entity_body(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '#')
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = if let Some(hex) = number
            .strip_prefix('x')
            .or_else(|| number.strip_prefix('X'))
        {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            number.parse::<u32>().ok()?
        };
        return char::from_u32(code);
    }
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Entity-encode for safe display. The hardening pass has already stripped
/// the raw specials; this guards whatever survives composition with them.
fn html_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::CapturingAudit;
    use crate::audit::NullAudit;
    use std::sync::Arc;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(SanitizePolicy::default(), NullAudit::shared()).expect("patterns compile")
    }

    #[test]
    fn benign_input_passes_through() {
        let clean = sanitizer().sanitize("Hello, World! 2024").expect("benign");
        assert_eq!(clean, "Hello, World! 2024");
    }

    #[test]
    fn empty_and_whitespace_become_empty_not_rejected() {
        let engine = sanitizer();
        assert_eq!(engine.sanitize(""), Ok(String::new()));
        assert_eq!(engine.sanitize("   \t "), Ok(String::new()));
    }

    #[test]
    fn known_xss_payloads_are_rejected() {
        let engine = sanitizer();
        let rejected = [
            "<script>alert(1)</script>",
            "%3Cscript%3E",
            "javascript:alert(1)",
            "<img onerror=alert(1)>",
        ];
        for payload in rejected {
            assert_eq!(
                engine.sanitize(payload),
                Err(Violation::DangerousContent),
                "payload: {payload}"
            );
        }
    }

    #[test]
    fn double_encoded_angle_bracket_is_rejected_before_the_loop() {
        assert_eq!(
            sanitizer().sanitize("%253Cscript%253E"),
            Err(Violation::EncodedMarkup)
        );
    }

    #[test]
    fn malformed_unicode_escape_is_rejected() {
        assert_eq!(
            sanitizer().sanitize("%u003Cscript%u003E"),
            Err(Violation::EncodedMarkup)
        );
    }

    #[test]
    fn nested_entities_beyond_round_cap_are_a_decode_bomb() {
        // Twelve nesting levels; each round unwraps exactly one.
        let mut payload = String::from("&");
        for _ in 0..12 {
            payload.push_str("amp;");
        }
        payload.push_str("#120;");

        assert_eq!(sanitizer().sanitize(&payload), Err(Violation::DecodeBomb));
    }

    #[test]
    fn shallow_nesting_decodes_to_a_fixed_point() {
        // Three levels resolve well inside the cap.
        let clean = sanitizer().sanitize("&amp;amp;#120;").expect("decodes");
        assert_eq!(clean, "x");
    }

    #[test]
    fn expansion_is_truncated_and_audited() {
        let audit = Arc::new(CapturingAudit::default());
        let engine = Sanitizer::new(
            SanitizePolicy {
                max_decode_rounds: 10,
                absolute_max_length: 10,
                logical_max_length: 8,
            },
            audit.clone(),
        )
        .expect("patterns compile");

        let clean = engine
            .sanitize("&amp;#120;0123456789ABCDEF")
            .expect("truncated, not rejected");
        assert_eq!(clean, "x0123");
        assert!(audit
            .messages()
            .iter()
            .any(|message| message == "Input truncated after expansion"));
    }

    #[test]
    fn rejections_are_audited() {
        let audit = Arc::new(CapturingAudit::default());
        let engine =
            Sanitizer::new(SanitizePolicy::default(), audit.clone()).expect("patterns compile");

        let _ = engine.sanitize("<script>alert(1)</script>");
        assert_eq!(
            audit.messages(),
            vec!["Dangerous script token found".to_string()]
        );
    }

    #[test]
    fn hardening_strips_tags_controls_and_specials() {
        let engine = sanitizer();
        assert_eq!(engine.sanitize("Hello <b>world</b>"), Ok("Hello world".into()));
        assert_eq!(engine.sanitize("abc\u{7}def"), Ok("abcdef".into()));
        assert_eq!(
            engine.sanitize("O'Brien & Sons (Ltd) 50%"),
            Ok("OBrien  Sons Ltd 50".into())
        );
    }

    #[test]
    fn residual_keyword_fragments_are_stripped() {
        // "cookie" alone is not dangerous enough to reject, but it never
        // survives the hardening pass.
        assert_eq!(sanitizer().sanitize("chocolate cookie jar"), Ok("chocolate  jar".into()));
    }

    #[test]
    fn plus_decodes_to_space_before_the_loop() {
        assert_eq!(sanitizer().sanitize("a+b"), Ok("a b".into()));
    }

    #[test]
    fn logical_length_is_enforced_in_characters() {
        let engine = Sanitizer::new(
            SanitizePolicy {
                logical_max_length: 4,
                ..SanitizePolicy::default()
            },
            NullAudit::shared(),
        )
        .expect("patterns compile");
        assert_eq!(engine.sanitize("ünïcödé"), Ok("ünïc".into()));
    }
}
