//! Per-request-type sanitized-field declarations.
//!
//! Request types declare which of their string fields carry untrusted input;
//! [`scrub`] cleans them in place and names the first field that trips a
//! violation so the transport layer can reject the whole request.

use super::{Sanitizer, Violation};
use thiserror::Error;

/// Implemented by request types whose string fields must pass sanitization
/// before the request reaches business logic.
pub trait SanitizedFields {
    /// The untrusted fields, as `(field name, value)` pairs.
    fn sanitized_fields(&mut self) -> Vec<(&'static str, &mut String)>;
}

/// A request field the sanitizer refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("field {field} rejected: {violation}")]
pub struct FieldViolation {
    pub field: &'static str,
    pub violation: Violation,
}

/// Sanitize every declared field of `form` in place.
///
/// # Errors
/// Returns the first [`FieldViolation`] encountered; fields before it have
/// already been replaced with their sanitized form.
pub fn scrub<T: SanitizedFields>(form: &mut T, sanitizer: &Sanitizer) -> Result<(), FieldViolation> {
    for (field, value) in form.sanitized_fields() {
        match sanitizer.sanitize(value) {
            Ok(clean) => *value = clean,
            Err(violation) => return Err(FieldViolation { field, violation }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAudit;
    use crate::sanitize::SanitizePolicy;

    struct EventForm {
        title: String,
        description: String,
        capacity: u32,
    }

    impl SanitizedFields for EventForm {
        fn sanitized_fields(&mut self) -> Vec<(&'static str, &mut String)> {
            vec![
                ("title", &mut self.title),
                ("description", &mut self.description),
            ]
        }
    }

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(SanitizePolicy::default(), NullAudit::shared()).expect("patterns compile")
    }

    #[test]
    fn clean_fields_are_rewritten_in_place() {
        let mut form = EventForm {
            title: "Rust Meetup <b>2024</b>".to_string(),
            description: "  ".to_string(),
            capacity: 120,
        };

        scrub(&mut form, &sanitizer()).expect("benign form");
        assert_eq!(form.title, "Rust Meetup 2024");
        assert_eq!(form.description, "");
        assert_eq!(form.capacity, 120);
    }

    #[test]
    fn first_violating_field_is_named() {
        let mut form = EventForm {
            title: "ok".to_string(),
            description: "<script>alert(1)</script>".to_string(),
            capacity: 1,
        };

        let err = scrub(&mut form, &sanitizer()).expect_err("dangerous description");
        assert_eq!(err.field, "description");
        assert_eq!(err.violation, Violation::DangerousContent);
        // The earlier field was already cleaned before the rejection.
        assert_eq!(form.title, "ok");
    }
}
