//! SMTP command builder.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// Base64 answer to an AUTH challenge.
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(resp),
            } => format!("AUTH {} {resp}", mechanism.as_str()),
            Self::Auth { mechanism, .. } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(resp) => resp.clone(),
            Self::MailFrom { from, size: None } => format!("MAIL FROM:<{from}>"),
            Self::MailFrom {
                from,
                size: Some(size),
            } => format!("MAIL FROM:<{from}> SIZE={size}"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Quit => "QUIT".to_string(),
        }
        .into_bytes();

        line.extend_from_slice(b"\r\n");
        line
    }

    /// The command as it may appear in logs, with credentials hidden.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth { mechanism, .. } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(_) => "<credentials>".to_string(),
            other => {
                let bytes = other.serialize();
                String::from_utf8_lossy(&bytes).trim_end().to_string()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_auth_plain() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.redacted(), "AUTH PLAIN");
    }

    #[test]
    fn test_auth_login() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(cmd.serialize(), b"AUTH LOGIN\r\n");
        assert_eq!(Command::AuthResponse("dXNlcg==".into()).serialize(), b"dXNlcg==\r\n");
        assert_eq!(Command::AuthResponse("dXNlcg==".into()).redacted(), "<credentials>");
    }

    #[test]
    fn test_mail_from() {
        let from = Address::new("sender@example.com").unwrap();
        let cmd = Command::MailFrom {
            from: from.clone(),
            size: None,
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");

        let cmd = Command::MailFrom {
            from,
            size: Some(12345),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com> SIZE=12345\r\n");
        assert_eq!(cmd.redacted(), "MAIL FROM:<sender@example.com> SIZE=12345");
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
