//! Input validation for auth and profile payloads.
//!
//! Each check returns the client-facing message on failure; handlers wrap it
//! into a 400 response.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// Characters accepted as the "special" character of a strong password.
/// `+` counts as well; the client-side rule accepts the `)`..`,` range.
const SPECIAL_CHARACTERS: &str = "!@#$%^&*()+,-.?\":{}|<>";

const MIN_PASSWORD_LENGTH: usize = 8;

pub const NAME_REQUIRED: &str = "Username field should not be empty";
pub const EMAIL_INVALID: &str = "Email must be valid";
pub const PASSWORD_WEAK: &str = "Password should not be empty, must contain one uppercase letter, one lowercase letter, one special character, and be at least 8 characters long";
pub const EMAIL_REQUIRED: &str = "Email should not be empty";
pub const PASSWORD_REQUIRED: &str = "Password should not be empty";
pub const PROFILE_FIELDS_REQUIRED: &str = "At least one field (name or email) is required";
pub const PROFILE_EMAIL_INVALID: &str = "Invalid email format";

/// Check an email against the accepted pattern (surrounding whitespace ignored).
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// At least 8 characters with an uppercase letter, a lowercase letter,
/// a digit and a special character.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
}

pub fn validate_sign_up(name: &str, email: &str, password: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err(NAME_REQUIRED);
    }
    if email.trim().is_empty() || !is_valid_email(email) {
        return Err(EMAIL_INVALID);
    }
    if password.trim().is_empty() || !is_strong_password(password) {
        return Err(PASSWORD_WEAK);
    }
    Ok(())
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() {
        return Err(EMAIL_REQUIRED);
    }
    if password.trim().is_empty() {
        return Err(PASSWORD_REQUIRED);
    }
    Ok(())
}

/// Profile updates need at least one non-empty field, and a well-formed email if one is given.
pub fn validate_profile_update(name: Option<&str>, email: Option<&str>) -> Result<(), &'static str> {
    let name = name.filter(|n| !n.trim().is_empty());
    let email = email.filter(|e| !e.trim().is_empty());

    if name.is_none() && email.is_none() {
        return Err(PROFILE_FIELDS_REQUIRED);
    }
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(PROFILE_EMAIL_INVALID);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("  first.last+tag@sub.example.org "));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a@x.c"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("Passw0rd!"));
        assert!(is_strong_password("Abcdef1+"));
        assert!(!is_strong_password("Pa0!"));
        assert!(!is_strong_password("password1!"));
        assert!(!is_strong_password("PASSWORD1!"));
        assert!(!is_strong_password("Password!!"));
        assert!(!is_strong_password("Password12"));
    }

    #[test]
    fn test_sign_up_reports_first_failure() {
        assert_eq!(validate_sign_up("Ann", "a@x.com", "Passw0rd!"), Ok(()));
        assert_eq!(
            validate_sign_up("   ", "bad", "weak"),
            Err(NAME_REQUIRED)
        );
        assert_eq!(
            validate_sign_up("Ann", "bad", "weak"),
            Err(EMAIL_INVALID)
        );
        assert_eq!(
            validate_sign_up("Ann", "a@x.com", "weak"),
            Err(PASSWORD_WEAK)
        );
        assert_eq!(
            validate_sign_up("Ann", "a@x.com", "        "),
            Err(PASSWORD_WEAK)
        );
    }

    #[test]
    fn test_sign_in_requires_both_fields() {
        assert_eq!(validate_sign_in("a@x.com", "anything"), Ok(()));
        assert_eq!(validate_sign_in(" ", "anything"), Err(EMAIL_REQUIRED));
        assert_eq!(validate_sign_in("a@x.com", ""), Err(PASSWORD_REQUIRED));
    }

    #[test]
    fn test_profile_update() {
        assert_eq!(validate_profile_update(Some("Ann"), None), Ok(()));
        assert_eq!(validate_profile_update(None, Some("a@x.com")), Ok(()));
        assert_eq!(
            validate_profile_update(None, None),
            Err(PROFILE_FIELDS_REQUIRED)
        );
        assert_eq!(
            validate_profile_update(Some(" "), Some("")),
            Err(PROFILE_FIELDS_REQUIRED)
        );
        assert_eq!(
            validate_profile_update(Some("Ann"), Some("nope")),
            Err(PROFILE_EMAIL_INVALID)
        );
    }
}
