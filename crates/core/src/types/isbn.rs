//! International Standard Book Number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Isbn`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IsbnError {
    /// Not 10 or 13 characters once separators are removed.
    #[error("ISBN must have 10 or 13 digits")]
    Length,
    /// A character other than a digit (or a trailing `X` for ISBN-10).
    #[error("ISBN contains an invalid character")]
    InvalidCharacter,
    /// The check digit does not match.
    #[error("ISBN check digit is wrong")]
    Checksum,
}

/// A checksum-validated ISBN-10 or ISBN-13, stored without separators.
///
/// ```
/// use bookstore_core::Isbn;
///
/// let isbn = Isbn::parse("978-0-306-40615-7").unwrap();
/// assert_eq!(isbn.as_str(), "9780306406157");
/// assert!(Isbn::parse("978-0-306-40615-8").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Parse an ISBN, ignoring hyphens and spaces.
    ///
    /// # Errors
    ///
    /// Returns [`IsbnError`] if the length, characters or check digit are wrong.
    pub fn parse(s: &str) -> Result<Self, IsbnError> {
        let compact: String = s
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match compact.len() {
            10 => validate_isbn10(&compact)?,
            13 => validate_isbn13(&compact)?,
            _ => return Err(IsbnError::Length),
        }

        Ok(Self(compact))
    }

    /// The compact form (digits, plus a possible trailing `X`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_isbn10(s: &str) -> Result<(), IsbnError> {
    let mut sum = 0_u32;
    for (i, c) in s.chars().enumerate() {
        let value = match c {
            '0'..='9' => c.to_digit(10).unwrap_or(0),
            'X' if i == 9 => 10,
            _ => return Err(IsbnError::InvalidCharacter),
        };
        // Weights run 10, 9, ..., 1.
        let weight = 10 - u32::try_from(i).map_err(|_| IsbnError::Length)?;
        sum += weight * value;
    }
    if sum % 11 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum)
    }
}

fn validate_isbn13(s: &str) -> Result<(), IsbnError> {
    let mut sum = 0_u32;
    for (i, c) in s.chars().enumerate() {
        let digit = c.to_digit(10).ok_or(IsbnError::InvalidCharacter)?;
        sum += if i % 2 == 0 { digit } else { digit * 3 };
    }
    if sum % 10 == 0 {
        Ok(())
    } else {
        Err(IsbnError::Checksum)
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Isbn {
    type Error = IsbnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Isbn {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Isbn {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Isbn {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn13() {
        assert_eq!(
            Isbn::parse("978-0-306-40615-7").unwrap().as_str(),
            "9780306406157"
        );
        assert_eq!(Isbn::parse("9780306406158"), Err(IsbnError::Checksum));
    }

    #[test]
    fn test_isbn10_with_x_check_digit() {
        assert_eq!(Isbn::parse("0-8044-2957-x").unwrap().as_str(), "080442957X");
        assert!(Isbn::parse("0306406152").is_ok());
        assert_eq!(Isbn::parse("0306406153"), Err(IsbnError::Checksum));
    }

    #[test]
    fn test_x_only_allowed_last_in_isbn10() {
        assert_eq!(Isbn::parse("X306406152"), Err(IsbnError::InvalidCharacter));
        assert_eq!(
            Isbn::parse("978030640615X"),
            Err(IsbnError::InvalidCharacter)
        );
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(Isbn::parse("12345"), Err(IsbnError::Length));
        assert_eq!(Isbn::parse(""), Err(IsbnError::Length));
    }
}
