//! Customer contact details.
//!
//! Credit sales are only allowed for customers with a phone number on file, so
//! [`PhoneNumber`] is validated at the edge and stored in normalised form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`] or [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("value cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("value must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not of the form `local@domain`.
    #[error("email must look like local@domain")]
    MalformedEmail,
    /// The phone number contains characters other than digits and separators.
    #[error("phone number may only contain digits, spaces, dashes, dots and parentheses")]
    InvalidPhoneCharacter,
    /// The phone number has too few or too many digits.
    #[error("phone number must have between {min} and {max} digits")]
    PhoneDigitCount {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// An email address with basic structural validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 254 characters, or
    /// does not have exactly one `@` with text on both sides.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        match s.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(s.to_owned()))
            }
            _ => Err(ContactError::MalformedEmail),
        }
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// A phone number normalised to digits with an optional leading `+`.
///
/// ```
/// use counterline_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+58 (412) 555-0199").unwrap();
/// assert_eq!(phone.as_str(), "+584125550199");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 7;
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse and normalise a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains letters or other
    /// symbols, or has a digit count outside 7..=15.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }

        let (plus, rest) = s.strip_prefix('+').map_or((false, s), |r| (true, r));
        let mut digits = String::with_capacity(rest.len() + 1);
        if plus {
            digits.push('+');
        }
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(ContactError::InvalidPhoneCharacter),
            }
        }

        let count = digits.trim_start_matches('+').len();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&count) {
            return Err(ContactError::PhoneDigitCount {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// Returns the normalised number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

// Both types are stored as TEXT. Database values were validated on the way in.
#[cfg(feature = "postgres")]
macro_rules! text_backed {
    ($name:ident) => {
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

#[cfg(feature = "postgres")]
text_backed!(Email);
#[cfg(feature = "postgres")]
text_backed!(PhoneNumber);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("  a@b.c ").is_ok());
    }

    #[test]
    fn test_email_invalid() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("@domain"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("user@"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c"), Err(ContactError::MalformedEmail));
    }

    #[test]
    fn test_phone_normalises_separators() {
        let phone = PhoneNumber::parse("0412-555.01 99").unwrap();
        assert_eq!(phone.as_str(), "04125550199");
    }

    #[test]
    fn test_phone_rejects_letters() {
        assert_eq!(
            PhoneNumber::parse("0412-CALL-ME"),
            Err(ContactError::InvalidPhoneCharacter)
        );
    }

    #[test]
    fn test_phone_digit_bounds() {
        assert!(matches!(
            PhoneNumber::parse("12345"),
            Err(ContactError::PhoneDigitCount { .. })
        ));
        assert!(matches!(
            PhoneNumber::parse("+1234567890123456"),
            Err(ContactError::PhoneDigitCount { .. })
        ));
    }

    #[test]
    fn test_phone_deserialize_validates() {
        let ok: Result<PhoneNumber, _> = serde_json::from_str("\"+1 555 010 9999\"");
        assert_eq!(ok.unwrap().as_str(), "+15550109999");

        let bad: Result<PhoneNumber, _> = serde_json::from_str("\"abc\"");
        assert!(bad.is_err());
    }
}
