//! Envelope address types.

use crate::error::{Error, Result};
use std::fmt;

/// Address used in `MAIL FROM` and `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `local@domain` or contains
    /// characters that would break the command line.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.chars().any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        match addr.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(Error::InvalidAddress(format!(
                "Address must be local@domain: {addr}"
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_quoted_local_part_with_at() {
        assert!(Address::new("\"a@b\"@example.com").is_ok());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_rejects_command_injection() {
        assert!(Address::new("user@example.com>\r\nRCPT TO:<x@y").is_err());
        assert!(Address::new("us er@example.com").is_err());
    }
}
