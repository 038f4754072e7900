//! Field-level input validation for the public auth flows.

use serde::Serialize;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
    /// Constraint that failed (`NotBlank`, `Email`, `Size`).
    pub code: &'static str,
}

impl FieldError {
    fn new(field: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
            code,
        }
    }
}

pub const MAX_NAME_LEN: usize = 200;

/// Collects every failing field instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and records an error) when `value` is blank.
    pub fn not_blank(&mut self, field: &'static str, label: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.errors
                .push(FieldError::new(field, "NotBlank", format!("{label} is required")));
            return false;
        }
        true
    }

    pub fn email(&mut self, field: &'static str, value: &str) {
        if self.not_blank(field, "Email", value) && !is_plausible_email(value) {
            self.errors
                .push(FieldError::new(field, "Email", "Email must be valid"));
        }
    }

    pub fn length(&mut self, field: &'static str, label: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min || len > max {
            let message = if max == usize::MAX {
                format!("{label} must be at least {min} characters")
            } else {
                format!("{label} must be between {min} and {max} characters")
            };
            self.errors.push(FieldError::new(field, "Size", message));
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Syntactic check only: one `@`, a non-empty local part, a dotted domain and
/// no whitespace. Deliverability is not our concern.
pub fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("a@x.com"));
        assert!(is_plausible_email("first.last+tag@sub.example.org"));
        for bad in ["", "a", "a@", "@x.com", "a@x", "a@@x.com", "a b@x.com", "a@x..com", "a@.x.com"] {
            assert!(!is_plausible_email(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn collects_all_failures() {
        let mut v = Validator::new();
        v.email("email", "nope");
        v.not_blank("password", "Password", " ");
        v.length("name", "Name", "", 1, MAX_NAME_LEN);
        let errors = v.finish().unwrap_err();
        let codes: Vec<_> = errors.iter().map(|e| (e.field, e.code)).collect();
        assert_eq!(
            codes,
            vec![("email", "Email"), ("password", "NotBlank"), ("name", "Size")]
        );
    }

    #[test]
    fn blank_email_reports_not_blank_only() {
        let mut v = Validator::new();
        v.email("email", "");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "NotBlank");
        assert_eq!(errors[0].message, "Email is required");
    }
}
