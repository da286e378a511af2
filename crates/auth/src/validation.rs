//! Field checks for registration and login payloads.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static username regex"));

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const EMAIL_MAX: usize = 254;
pub const PASSWORD_MIN: usize = 8;
// argon2 accepts more, but anything longer is almost certainly a paste accident
pub const PASSWORD_MAX: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every violated constraint of a payload, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (i, err) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", err.field, err.message)?;
        }
        Ok(())
    }
}

pub fn check_username(errors: &mut ValidationErrors, username: &str) {
    let len = username.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        errors.add("username", "must be between 3 and 32 characters");
    } else if !USERNAME_RE.is_match(username) {
        errors.add("username", "may only contain letters, digits and underscores");
    }
}

pub fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "is required");
    } else if email.len() > EMAIL_MAX || !EMAIL_RE.is_match(email) {
        errors.add("email", "must be a valid email address");
    }
}

/// Length plus the four character classes.
pub fn check_password_strength(errors: &mut ValidationErrors, password: &str) {
    let len = password.chars().count();
    if len < PASSWORD_MIN || len > PASSWORD_MAX {
        errors.add("password", "must be between 8 and 72 characters");
        return;
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());
    if !(has_upper && has_lower && has_digit && has_special) {
        errors.add(
            "password",
            "must contain an uppercase letter, a lowercase letter, a digit and a special character",
        );
    }
}

pub fn check_password_present(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "is required");
    }
}

/// Trim and lowercase so lookups and the unique index agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
