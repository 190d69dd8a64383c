//! Form validation shared by the onboarding steps and the player-creation path.

use chrono::{Datelike, NaiveDate};

use crate::error::ValidationError;

pub const MIN_AGE_YEARS: i32 = 16;
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

/// Route names a username must never shadow.
pub const RESERVED_USERNAMES: &[&str] = &[
    "profile",
    "profiles",
    "browse",
    "teams",
    "team",
    "api",
    "terms-of-service",
    "privacy-policy",
    "login",
    "signup",
    "my-evals",
    "evaluations",
    "stripe",
    "auth",
    "admin",
    "settings",
    "money",
    "marketing",
    "favicon.ico",
    "playerparent",
];

/// Lowercase, map anything outside `[a-z0-9_-]` to `-`, collapse dash runs,
/// trim leading/trailing `-`/`_`, cap at 30 chars. Idempotent.
pub fn normalize_username(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '_');
    // Output is ASCII, so byte slicing is char slicing.
    let capped = &trimmed[..trimmed.len().min(USERNAME_MAX_LEN)];
    capped.trim_matches(|c| c == '-' || c == '_').to_string()
}

pub fn is_reserved(normalized: &str) -> bool {
    RESERVED_USERNAMES
        .iter()
        .any(|word| normalize_username(word) == normalized)
}

/// Normalizes and checks length and the reserved set. Uniqueness is the
/// store's job.
pub fn validate_username(raw: &str) -> Result<String, ValidationError> {
    let normalized = normalize_username(raw);
    if normalized.is_empty() {
        return Err(ValidationError::Missing("username"));
    }
    if normalized.len() < USERNAME_MIN_LEN {
        return Err(ValidationError::UsernameTooShort);
    }
    if is_reserved(&normalized) {
        return Err(ValidationError::UsernameReserved);
    }
    Ok(normalized)
}

/// Whole years between `birthday` and `today`.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    age
}

pub fn validate_birthday(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::Missing("birthday"));
    }
    let birthday = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidBirthday)?;
    if birthday > today {
        return Err(ValidationError::InvalidBirthday);
    }
    if age_on(birthday, today) < MIN_AGE_YEARS {
        return Err(ValidationError::Underage);
    }
    Ok(birthday)
}

pub fn validate_hudl_link(raw: &str) -> Result<String, ValidationError> {
    let link = raw.trim();
    if link.is_empty() {
        return Err(ValidationError::Missing("hudl link"));
    }
    if !link.contains("hudl.com") && !link.starts_with("http") {
        return Err(ValidationError::InvalidHudlLink);
    }
    Ok(link.to_string())
}

pub fn validate_graduation_month(month: Option<u8>) -> Result<Option<u8>, ValidationError> {
    match month {
        Some(m) if !(1..=12).contains(&m) => Err(ValidationError::InvalidGraduationMonth),
        other => Ok(other),
    }
}

/// Trimmed value, or a `Missing` error naming the field.
pub fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(value.to_string())
    }
}

/// Trimmed value, dropping blanks.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
