/// Input validators
///
/// Each request body is checked here before any handler logic runs. Every
/// function returns the normalised value so callers never keep using the raw
/// input by accident.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 256;
const MIN_PASSWORD_LENGTH: usize = 6;
// bcrypt ignores everything past 72 bytes.
const MAX_PASSWORD_LENGTH: usize = 72;
const MAX_CATEGORY_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 200;
const MAX_PAGE_LIMIT: i64 = 100;
const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 9999;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();
}

/// Validates an email and returns it trimmed and lower-cased.
///
/// Emails are the login key and unique case-insensitively, so the stored and
/// looked-up forms must always go through here.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".into()));
    }
    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".into(), MIN_EMAIL_LENGTH));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".into(), MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) || has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::InvalidFormat("email".into()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".into(), MAX_NAME_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("name".into()));
    }

    Ok(trimmed.to_string())
}

/// Validates a password chosen at registration
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".into()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password".into(), MIN_PASSWORD_LENGTH));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".into(), MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Login only checks presence; strength rules apply at registration.
pub fn require_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".into()));
    }
    Ok(())
}

pub fn is_valid_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::InvalidFormat("amount".into()));
    }
    if amount < 0.0 {
        return Err(ValidationError::OutOfRange("amount".into()));
    }
    Ok(amount)
}

pub fn is_valid_category(category: &str) -> Result<String, ValidationError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("category".into()));
    }
    if trimmed.chars().count() > MAX_CATEGORY_LENGTH {
        return Err(ValidationError::TooLong("category".into(), MAX_CATEGORY_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("category".into()));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions collapse to `None`.
pub fn is_valid_description(description: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = description.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong("description".into(), MAX_DESCRIPTION_LENGTH));
    }
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

pub fn is_valid_month(month: u32) -> Result<u32, ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange("month".into()));
    }
    Ok(month)
}

pub fn is_valid_year(year: i32) -> Result<i32, ValidationError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange("year".into()));
    }
    Ok(year)
}

pub fn is_valid_page(page: i64) -> Result<i64, ValidationError> {
    if page < 1 {
        return Err(ValidationError::OutOfRange("page".into()));
    }
    Ok(page)
}

pub fn is_valid_limit(limit: i64) -> Result<i64, ValidationError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ValidationError::OutOfRange("limit".into()));
    }
    Ok(limit)
}

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ValidationError::InvalidFormat(field.to_string()))
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }
    email.matches('@').count() != 1 || email.contains('\0')
}
