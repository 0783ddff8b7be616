// src/auth/validators.rs

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use super::models::{LoginEmailRequest, SignupEmailRequest, VerifyOtpRequest};
use crate::common::{ValidationResult, Validator};

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

pub struct AuthValidator;

impl Validator<SignupEmailRequest> for AuthValidator {
    fn validate(&self, data: &SignupEmailRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(validate_email_field(&data.email));

        if data.name.trim().is_empty() {
            result.add_error("name", "Name is required");
        } else if data.name.len() > 100 {
            result.add_error("name", "Name too long");
        }

        if let Some(date_of_birth) = &data.date_of_birth {
            if NaiveDate::parse_from_str(date_of_birth, "%Y-%m-%d").is_err() {
                result.add_error("dateOfBirth", "Date of birth must be in YYYY-MM-DD format");
            }
        }

        result
    }
}

impl Validator<VerifyOtpRequest> for AuthValidator {
    fn validate(&self, data: &VerifyOtpRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.merge(validate_email_field(&data.email));

        if data.otp.len() != 6 || !data.otp.chars().all(|c| c.is_ascii_digit()) {
            result.add_error("otp", "OTP must be 6 digits");
        }

        result
    }
}

impl Validator<LoginEmailRequest> for AuthValidator {
    fn validate(&self, data: &LoginEmailRequest) -> ValidationResult {
        validate_email_field(&data.email)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn validate_email_field(email: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if !valid_email(email.trim()) {
        result.add_error("email", "Invalid email format");
    }
    result
}

/// Basic email format check; case folding happens at the storage layer.
/// The pattern compiles once and is reused for the process lifetime.
fn valid_email(email: &str) -> bool {
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(email))
}
