//! Input validation shared by user, order and blog post constructors.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,64}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex"));
static ORDER_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,64}$").expect("valid order number regex"));

pub(crate) const MAX_TITLE_CHARS: usize = 200;

/// Rejected input for user, profile or order fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidUsername(String),
    InvalidEmail(String),
    BlankFirstName,
    BlankLastName,
    InvalidDateOfBirth(String),
    InvalidOrderNumber(String),
    InvalidAmount(String),
    BlankTitle,
    /// Title longer than the stored limit; carries the char count.
    TitleTooLong(usize),
    BlankContent,
    BlankAuthor,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUsername(value) => write!(
                f,
                "invalid username `{value}`: expected 3-64 chars of [A-Za-z0-9_.-]"
            ),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::BlankFirstName => write!(f, "first_name must not be blank"),
            Self::BlankLastName => write!(f, "last_name must not be blank"),
            Self::InvalidDateOfBirth(value) => {
                write!(f, "invalid date_of_birth `{value}`: expected YYYY-MM-DD")
            }
            Self::InvalidOrderNumber(value) => write!(
                f,
                "invalid order_number `{value}`: expected 1-64 chars of [A-Za-z0-9_-]"
            ),
            Self::InvalidAmount(value) => write!(f, "invalid amount `{value}`"),
            Self::BlankTitle => write!(f, "title must not be blank"),
            Self::TitleTooLong(chars) => {
                write!(f, "title has {chars} chars; at most {MAX_TITLE_CHARS} allowed")
            }
            Self::BlankContent => write!(f, "content must not be blank"),
            Self::BlankAuthor => write!(f, "author must not be blank"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn check_username(value: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername(value.to_string()))
    }
}

pub(crate) fn check_email(value: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub(crate) fn check_date_of_birth(value: &str) -> Result<(), ValidationError> {
    if DATE_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDateOfBirth(value.to_string()))
    }
}

pub(crate) fn check_order_number(value: &str) -> Result<(), ValidationError> {
    if ORDER_NUMBER_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidOrderNumber(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{check_date_of_birth, check_email, check_order_number, check_username};

    #[test]
    fn username_rules() {
        assert!(check_username("alice_1990").is_ok());
        assert!(check_username("al").is_err());
        assert!(check_username("alice smith").is_err());
    }

    #[test]
    fn email_requires_domain_with_dot() {
        assert!(check_email("alice@example.com").is_ok());
        assert!(check_email("alice@localhost").is_err());
        assert!(check_email("alice example.com").is_err());
    }

    #[test]
    fn date_of_birth_is_iso_day() {
        assert!(check_date_of_birth("1990-05-15").is_ok());
        assert!(check_date_of_birth("1990-13-01").is_err());
        assert!(check_date_of_birth("15.05.1990").is_err());
    }

    #[test]
    fn order_number_accepts_dashes() {
        assert!(check_order_number("ORD-1700000000000-001").is_ok());
        assert!(check_order_number("").is_err());
        assert!(check_order_number("ORD 1").is_err());
    }
}
