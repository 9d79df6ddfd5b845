//! Delivery configuration types.

use std::fmt;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// Username and password for SMTP AUTH.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password or app password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP delivery configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Credentials, if the server requires AUTH.
    pub credentials: Option<Credentials>,
    /// Name announced in EHLO.
    pub hello_name: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for each server reply.
    pub io_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 465.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Security::Implicit.default_port(),
            security: Security::Implicit,
            credentials: None,
            hello_name: "localhost".to_string(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for delivery configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    port: Option<u16>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: Config::new(host),
            port: None,
        }
    }

    /// Sets the port. Defaults to the security mode's port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the AUTH credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the EHLO name.
    #[must_use]
    pub fn hello_name(mut self, name: impl Into<String>) -> Self {
        self.config.hello_name = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let mut config = self.config;
        config.port = self.port.unwrap_or_else(|| config.security.default_port());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_builder_port_follows_security() {
        let config = Config::builder("smtp.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 587);

        let config = Config::builder("smtp.example.com")
            .security(Security::StartTls)
            .port(2525)
            .credentials("user", "secret")
            .hello_name("mailer.example.com")
            .build();
        assert_eq!(config.port, 2525);
        assert_eq!(config.hello_name, "mailer.example.com");
        assert_eq!(config.credentials.map(|c| c.username), Some("user".to_string()));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
