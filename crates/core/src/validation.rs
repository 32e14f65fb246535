//! Input validation
//!
//! Registration, profile edits, password resets and feedback are checked here
//! before anything reaches the backend.
//!
//! # Example
//!
//! ```rust
//! use sow_core::validation::Validator;
//!
//! let result = Validator::new()
//!     .required("species_name", "台灣藍鵲")
//!     .max_length("species_name", "台灣藍鵲", 100)
//!     .validate();
//!
//! assert!(result.is_valid());
//! ```

use crate::error::{Error, ErrorCode, Result};
use crate::models::{NewProfile, ProfileUpdate};
use crate::vocab::{BRANCHES, GROUPS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum password length accepted by the reset flow.
pub const MIN_PASSWORD_LEN: usize = 6;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[0-9][0-9\- ]{6,18}[0-9]$").expect("valid phone pattern")
});

/// Validation error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field that failed validation
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all errors
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Add an error
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Convert to Result type
    pub fn to_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
            Err(Error::new(
                ErrorCode::ValidationError,
                format!("Validation failed: {}", messages.join("; ")),
            ))
        }
    }
}

/// Fluent validator builder
#[derive(Default)]
pub struct Validator {
    result: ValidationResult,
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(mut self, field: &str, code: &str, message: String) -> Self {
        self.result.add_error(ValidationError {
            field: field.to_string(),
            message,
            code: code.to_string(),
        });
        self
    }

    /// Validate that a field is not blank
    pub fn required(self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            return self.fail(field, "REQUIRED", "Field is required".to_string());
        }
        self
    }

    /// Validate minimum length in characters
    pub fn min_length(self, field: &str, value: &str, min: usize) -> Self {
        if value.chars().count() < min {
            return self.fail(field, "MIN_LENGTH", format!("Must be at least {} characters", min));
        }
        self
    }

    /// Validate maximum length in characters
    pub fn max_length(self, field: &str, value: &str, max: usize) -> Self {
        if value.chars().count() > max {
            return self.fail(field, "MAX_LENGTH", format!("Must be at most {} characters", max));
        }
        self
    }

    /// Validate against a compiled pattern
    pub fn pattern(self, field: &str, value: &str, re: &Regex, description: &str) -> Self {
        if !re.is_match(value) {
            return self.fail(field, "PATTERN", format!("Must be {}", description));
        }
        self
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of(self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if !allowed.contains(&value) {
            return self.fail(field, "ONE_OF", format!("Must be one of: {}", allowed.join(", ")));
        }
        self
    }

    /// Validate a numeric range
    pub fn range<T: PartialOrd + std::fmt::Display>(
        self,
        field: &str,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        if value < min || value > max {
            return self.fail(field, "RANGE", format!("Must be between {} and {}", min, max));
        }
        self
    }

    /// Add a custom validation
    pub fn custom<F>(self, field: &str, f: F) -> Self
    where
        F: FnOnce() -> Option<String>,
    {
        match f() {
            Some(message) => self.fail(field, "CUSTOM", message),
            None => self,
        }
    }

    /// Complete validation and return result
    pub fn validate(self) -> ValidationResult {
        self.result
    }
}

/// Validate a registration before the profile row is written.
pub fn validate_registration(profile: &NewProfile) -> ValidationResult {
    let phone = profile.phone.as_deref().unwrap_or("");
    Validator::new()
        .required("full_name", &profile.full_name)
        .max_length("full_name", &profile.full_name, 50)
        .max_length("nature_name", &profile.nature_name, 50)
        .one_of("branch", &profile.branch, &BRANCHES)
        .one_of("volunteer_group", &profile.volunteer_group, &GROUPS)
        .required("phone", phone)
        .pattern("phone", phone, &PHONE_RE, "a phone number")
        .validate()
}

/// Validate the fields set on a profile edit.
pub fn validate_profile_update(update: &ProfileUpdate) -> ValidationResult {
    let mut v = Validator::new().custom("profile", || {
        update.is_empty().then(|| "Nothing to update".to_string())
    });
    if let Some(name) = &update.full_name {
        v = v.required("full_name", name).max_length("full_name", name, 50);
    }
    if let Some(name) = &update.nature_name {
        v = v.max_length("nature_name", name, 50);
    }
    if let Some(branch) = &update.branch {
        v = v.one_of("branch", branch, &BRANCHES);
    }
    if let Some(group) = &update.volunteer_group {
        v = v.one_of("volunteer_group", group, &GROUPS);
    }
    if let Some(phone) = &update.phone {
        v = v.pattern("phone", phone, &PHONE_RE, "a phone number");
    }
    v.validate()
}

/// Validate a new password and its confirmation.
pub fn validate_password_reset(password: &str, confirmation: &str) -> ValidationResult {
    Validator::new()
        .min_length("password", password, MIN_PASSWORD_LEN)
        .custom("confirmation", || {
            (password != confirmation).then(|| "Passwords do not match".to_string())
        })
        .validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewProfile {
        NewProfile {
            id: "u1".into(),
            full_name: "陳大文".into(),
            nature_name: "樹蛙".into(),
            branch: "台中分會".into(),
            volunteer_group: "棲地工作組".into(),
            training_period: Some("第 28 期".into()),
            phone: Some("0912-345-678".into()),
            email: Some("frog@example.org".into()),
        }
    }

    #[test]
    fn test_required_validation() {
        let result = Validator::new().required("name", "   ").validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].code, "REQUIRED");
    }

    #[test]
    fn test_length_counts_characters() {
        // Six CJK characters are eighteen bytes
        let result = Validator::new().max_length("name", "台灣藍鵲幼鳥", 6).validate();
        assert!(result.is_valid());
    }

    #[test]
    fn test_one_of_validation() {
        let result = Validator::new()
            .one_of("branch", "火星分會", &BRANCHES)
            .validate();
        assert_eq!(result.errors()[0].code, "ONE_OF");
    }

    #[test]
    fn test_range_validation() {
        let result = Validator::new().range("count", 150, 1, 100).validate();
        assert_eq!(result.errors()[0].code, "RANGE");
    }

    #[test]
    fn test_valid_registration() {
        assert!(validate_registration(&registration()).is_valid());
    }

    #[test]
    fn test_registration_rejects_unset_branch_and_missing_phone() {
        let mut reg = registration();
        reg.branch = crate::vocab::UNSET.into();
        reg.phone = None;

        let result = validate_registration(&reg);
        let fields: Vec<&str> = result.errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"branch"));
        assert!(fields.contains(&"phone"));
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(!validate_profile_update(&ProfileUpdate::default()).is_valid());

        let update = ProfileUpdate {
            volunteer_group: Some("研究發展組".into()),
            ..Default::default()
        };
        assert!(validate_profile_update(&update).is_valid());

        let bad = ProfileUpdate {
            phone: Some("call me".into()),
            ..Default::default()
        };
        assert!(!validate_profile_update(&bad).is_valid());
    }

    #[test]
    fn test_password_reset_rules() {
        assert!(validate_password_reset("secret1", "secret1").is_valid());

        let short = validate_password_reset("abc", "abc");
        assert_eq!(short.errors()[0].code, "MIN_LENGTH");

        let mismatch = validate_password_reset("secret1", "secret2");
        assert_eq!(mismatch.errors()[0].field, "confirmation");
    }

    #[test]
    fn test_to_result_joins_messages() {
        let err = validate_password_reset("a", "b").to_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("password"));
        assert!(err.message.contains("confirmation"));
    }
}
