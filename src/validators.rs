//! Validator Library - Composable Field Rules
//!
//! A validator maps a field value to `None` (pass) or an error message (fail).
//! Validators are composed into ordered chains; only the first failure is surfaced.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match";
pub const PASSWORD_SPECIAL_CHARS: &str = "@$!%*?&";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z\s]+$").expect("name pattern compiles")
});

/// A single field rule. Cheap to clone; shareable across rule sets.
#[derive(Clone)]
pub struct Validator {
    check: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl Validator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self { check: Arc::new(check) }
    }

    /// Run the rule against a value
    pub fn check(&self, value: &str) -> Option<String> {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Run a chain in order, returning the first failure message.
pub fn first_error(validators: &[Validator], value: &str) -> Option<String> {
    validators.iter().find_map(|v| v.check(value))
}

/// Fails with `"{label} is required"` when the trimmed value is empty.
pub fn required(label: impl Into<String>) -> Validator {
    let label = label.into();
    Validator::new(move |value| {
        if value.trim().is_empty() {
            Some(format!("{} is required", label))
        } else {
            None
        }
    })
}

pub fn email() -> Validator {
    Validator::new(|value| {
        if !value.is_empty() && !EMAIL_RE.is_match(value) {
            Some(EMAIL_MESSAGE.to_string())
        } else {
            None
        }
    })
}

pub fn min_length(min: usize) -> Validator {
    Validator::new(move |value| {
        if !value.is_empty() && value.chars().count() < min {
            Some(format!("Must be at least {} characters", min))
        } else {
            None
        }
    })
}

pub fn max_length(max: usize) -> Validator {
    Validator::new(move |value| {
        if !value.is_empty() && value.chars().count() > max {
            Some(format!("Must be no more than {} characters", max))
        } else {
            None
        }
    })
}

/// Password strength. Rules are checked in a fixed priority order:
/// length, lowercase, uppercase, digit, special character.
pub fn password() -> Validator {
    Validator::new(|value| {
        if value.is_empty() {
            return None;
        }
        if value.chars().count() < 8 {
            return Some("Password must be at least 8 characters".to_string());
        }
        if !value.chars().any(|c| c.is_ascii_lowercase()) {
            return Some("Password must contain at least one lowercase letter".to_string());
        }
        if !value.chars().any(|c| c.is_ascii_uppercase()) {
            return Some("Password must contain at least one uppercase letter".to_string());
        }
        if !value.chars().any(|c| c.is_ascii_digit()) {
            return Some("Password must contain at least one number".to_string());
        }
        if !value.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
            return Some(format!(
                "Password must contain at least one special character ({})",
                PASSWORD_SPECIAL_CHARS
            ));
        }
        None
    })
}

/// Cross-field rule. `other` is captured now, so callers rebuild this
/// validator whenever the compared field changes.
pub fn confirm_password(other: impl Into<String>) -> Validator {
    let other = other.into();
    Validator::new(move |value| {
        if !value.is_empty() && value != other {
            Some(PASSWORD_MISMATCH_MESSAGE.to_string())
        } else {
            None
        }
    })
}

/// Person or group name: at least two characters, letters and spaces only.
pub fn name() -> Validator {
    Validator::new(|value| {
        if value.is_empty() {
            return None;
        }
        if value.trim().chars().count() < 2 {
            return Some("Name must be at least 2 characters".to_string());
        }
        if !NAME_RE.is_match(value) {
            return Some("Name can only contain letters and spaces".to_string());
        }
        None
    })
}
