use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Chilean taxpayer id: numeric body plus a check digit.
///
/// The check digit is not verified against the body; the portal is the
/// authority on that and rejects bad pairs at login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rut {
    number: String,
    dv: String,
}

impl Rut {
    /// Builds a RUT from its parts. Dots in the body are ignored and the
    /// check digit is upper-cased (`k` → `K`).
    pub fn new(number: &str, dv: &str) -> Result<Self, AuthError> {
        let number = number.trim().replace('.', "");
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::InvalidCredentials("Invalid numeric RUT.".into()));
        }
        let dv = dv.trim().to_uppercase();
        if dv.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "DV (check digit) cannot be empty.".into(),
            ));
        }
        Ok(Self { number, dv })
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn dv(&self) -> &str {
        &self.dv
    }

    /// Thousands-dotted rendering used by the login form, e.g. `12.345.678-9`.
    pub fn dotted(&self) -> String {
        let digits = self.number.as_bytes();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
        for (i, d) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push('.');
            }
            out.push(*d as char);
        }
        out.push('-');
        out.push_str(&self.dv);
        out
    }
}

impl FromStr for Rut {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, dv) = s.trim().rsplit_once('-').ok_or_else(|| {
            AuthError::InvalidCredentials("RUT must be in the format 12345678-9".into())
        })?;
        Self::new(number, dv)
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.dv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_and_plain() {
        let rut: Rut = "12.345.678-9".parse().unwrap();
        assert_eq!(rut.number(), "12345678");
        assert_eq!(rut.dv(), "9");
        assert_eq!(rut, "12345678-9".parse().unwrap());
    }

    #[test]
    fn uppercases_check_digit() {
        let rut: Rut = "7654321-k".parse().unwrap();
        assert_eq!(rut.dv(), "K");
        assert_eq!(rut.to_string(), "7654321-K");
    }

    #[test]
    fn dotted_groups_by_thousands() {
        assert_eq!(Rut::new("12345678", "9").unwrap().dotted(), "12.345.678-9");
        assert_eq!(Rut::new("7654321", "K").unwrap().dotted(), "7.654.321-K");
        assert_eq!(Rut::new("123", "4").unwrap().dotted(), "123-4");
    }

    #[test]
    fn rejects_malformed() {
        assert!("123456789".parse::<Rut>().is_err());
        assert!("12a45678-9".parse::<Rut>().is_err());
        assert!("12345678-".parse::<Rut>().is_err());
        assert!("-9".parse::<Rut>().is_err());
    }
}
