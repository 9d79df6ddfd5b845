//! Server capabilities announced in the EHLO reply.

/// SASL mechanisms this client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - credentials in the initial response
    Plain,
    /// LOGIN - username and password as two challenges
    Login,
}

impl AuthMechanism {
    /// Parses a mechanism name, ignoring mechanisms this client cannot use.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else if s.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else {
            None
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// What the server supports, as far as delivery is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// STARTTLS is offered.
    pub starttls: bool,
    /// Usable AUTH mechanisms, in the server's order.
    pub auth: Vec<AuthMechanism>,
    /// SIZE is offered, with the limit if one was given.
    pub size: Option<Option<usize>>,
    /// 8BITMIME is offered.
    pub eight_bit_mime: bool,
    /// SMTPUTF8 is offered.
    pub smtp_utf8: bool,
}

impl Capabilities {
    /// Parses the keyword lines of an EHLO reply (the greeting line excluded).
    #[must_use]
    pub fn from_ehlo<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut caps = Self::default();
        for line in lines {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };
            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => caps.starttls = true,
                "AUTH" => caps.auth.extend(words.filter_map(AuthMechanism::parse)),
                "SIZE" => caps.size = Some(words.next().and_then(|s| s.parse().ok())),
                "8BITMIME" => caps.eight_bit_mime = true,
                "SMTPUTF8" => caps.smtp_utf8 = true,
                _ => {}
            }
        }
        caps
    }

    /// The message size limit, if the server announced a non-zero one.
    #[must_use]
    pub fn size_limit(&self) -> Option<usize> {
        self.size.flatten().filter(|limit| *limit > 0)
    }

    /// Picks the mechanism to authenticate with, preferring PLAIN.
    #[must_use]
    pub fn preferred_auth(&self) -> Option<AuthMechanism> {
        [AuthMechanism::Plain, AuthMechanism::Login]
            .into_iter()
            .find(|mechanism| self.auth.contains(mechanism))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_ehlo() {
        let caps = Capabilities::from_ehlo([
            "PIPELINING",
            "SIZE 35882577",
            "starttls",
            "AUTH LOGIN PLAIN XOAUTH2",
            "8BITMIME",
            "SMTPUTF8",
        ]);
        assert!(caps.starttls);
        assert_eq!(caps.auth, vec![AuthMechanism::Login, AuthMechanism::Plain]);
        assert_eq!(caps.size_limit(), Some(35_882_577));
        assert!(caps.eight_bit_mime);
        assert!(caps.smtp_utf8);
    }

    #[test]
    fn test_prefers_plain() {
        let caps = Capabilities::from_ehlo(["AUTH LOGIN PLAIN"]);
        assert_eq!(caps.preferred_auth(), Some(AuthMechanism::Plain));

        let caps = Capabilities::from_ehlo(["AUTH LOGIN CRAM-MD5"]);
        assert_eq!(caps.preferred_auth(), Some(AuthMechanism::Login));

        let caps = Capabilities::from_ehlo(["AUTH CRAM-MD5"]);
        assert_eq!(caps.preferred_auth(), None);
    }

    #[test]
    fn test_size_without_limit() {
        let caps = Capabilities::from_ehlo(["SIZE"]);
        assert_eq!(caps.size, Some(None));
        assert_eq!(caps.size_limit(), None);

        let caps = Capabilities::from_ehlo(["SIZE 0"]);
        assert_eq!(caps.size_limit(), None);
    }

    #[test]
    fn test_mechanism_names() {
        assert_eq!(AuthMechanism::parse("plain"), Some(AuthMechanism::Plain));
        assert_eq!(AuthMechanism::parse("XOAUTH2"), None);
        assert_eq!(AuthMechanism::Login.as_str(), "LOGIN");
    }
}
