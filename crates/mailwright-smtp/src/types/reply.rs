//! SMTP reply types.

use crate::error::{Error, Result};
use std::fmt;

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply text, one entry per line.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub const fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns the full text as a single string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Turns the reply into an error unless it carries `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] with the server's code and text.
    pub fn expect_code(self, expected: ReplyCode) -> Result<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(Error::smtp_error(self.code.as_u16(), self.text()))
        }
    }

    /// Turns the reply into an error unless it is a 2xx success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] with the server's code and text.
    pub fn expect_success(self) -> Result<Self> {
        if self.code.is_success() {
            Ok(self)
        } else {
            Err(Error::smtp_error(self.code.as_u16(), self.text()))
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_success() {
        let reply = Reply::new(ReplyCode::OK, vec!["OK".into()]);
        assert!(reply.expect_success().is_ok());

        let reply = Reply::new(ReplyCode::new(550), vec!["No such user".into()]);
        let err = reply.expect_success().unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.to_string(), "SMTP error 550: No such user");
    }

    #[test]
    fn test_expect_code() {
        let reply = Reply::new(ReplyCode::START_DATA, vec!["Go ahead".into()]);
        assert!(reply.clone().expect_code(ReplyCode::START_DATA).is_ok());
        assert!(reply.expect_code(ReplyCode::OK).is_err());
    }

    #[test]
    fn test_text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["smtp.example.com ESMTP".into(), "Ready".into()],
        );
        assert_eq!(reply.text(), "smtp.example.com ESMTP\nReady");
    }

    #[test]
    fn test_code_display() {
        assert_eq!(ReplyCode::OK.to_string(), "250");
        assert!(ReplyCode::AUTH_SUCCESS.is_success());
        assert!(!ReplyCode::AUTH_CONTINUE.is_success());
    }
}
