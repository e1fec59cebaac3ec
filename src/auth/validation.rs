//! Credential shape rules for admin signup.
//!
//! The boolean predicates mirror the rules the signup form enforces on the
//! client; [`validate_signup`] applies them in a fixed order and reports the
//! first failing field.

use thiserror::Error;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 8;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Signup validation errors.
///
/// The display strings are returned to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is too short or uses characters outside `[A-Za-z0-9_-]`.
    #[error("Username must be at least 8 characters")]
    InvalidUsername,

    /// Email is not of the form `local@domain.tld`.
    #[error("Invalid email")]
    InvalidEmail,

    /// Password fails the length or complexity rule.
    #[error("Password must be 12+ chars with mixed complexity")]
    WeakPassword,

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Check a username: at least 8 characters from `[A-Za-z0-9_-]`.
///
/// # Examples
///
/// ```
/// use haven::auth::validation::valid_username;
///
/// assert!(valid_username("admin_demo"));
/// assert!(!valid_username("short"));
/// ```
pub fn valid_username(username: &str) -> bool {
    username.chars().count() >= MIN_USERNAME_LENGTH
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check an email: a non-empty local part, `@`, and a domain with at least one
/// dot that has text on both sides. No whitespace and a single `@`.
pub fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .match_indices('.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}

/// Check a password: at least 12 characters with an uppercase letter, a
/// lowercase letter, a digit and a symbol.
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

/// Validate a complete signup form.
///
/// Fields are checked in the order username, email, password, confirmation.
pub fn validate_signup(
    username: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), ValidationError> {
    if !valid_username(username) {
        return Err(ValidationError::InvalidUsername);
    }
    if !valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if !valid_password(password) {
        return Err(ValidationError::WeakPassword);
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}
