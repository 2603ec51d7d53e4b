//! Learner contact details captured at registration.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;

/// Who is attending, and where to send documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerContact {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
}

impl LearnerContact {
    /// Validates and normalizes contact details.
    ///
    /// Names and email are trimmed, email is lowercased, blank optional
    /// fields become `None`.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: Option<String>,
        company: Option<String>,
    ) -> Result<Self, ValidationError> {
        let first_name = required_name("first_name", first_name.into())?;
        let last_name = required_name("last_name", last_name.into())?;
        let email = validate_email(email.into())?;
        let phone = optional(phone);
        if let Some(p) = &phone {
            validate_phone(p)?;
        }

        Ok(Self {
            first_name,
            last_name,
            email,
            phone,
            company: optional(company),
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }
}

fn required_name(field: &str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::out_of_range(
            field,
            1,
            MAX_NAME_LENGTH as i64,
            trimmed.chars().count() as i64,
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_email(value: String) -> Result<String, ValidationError> {
    let email = value.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::empty_field("email"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::invalid_format("email", "address is too long"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::invalid_format("email", "not a valid email address"));
    }
    Ok(email)
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'));
    if !allowed || !(6..=20).contains(&digits) {
        return Err(ValidationError::invalid_format("phone", "not a valid phone number"));
    }
    Ok(())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
