//! Type-state SMTP client.

use super::stream::{TlsStream, upgrade_to_tls};
use crate::command::Command;
use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Capabilities, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// SMTP client with type-state pattern.
///
/// `S` is the underlying stream: a [`TcpStream`], a [`TlsStream`] or anything
/// else that reads and writes bytes.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: BufReader<S>,
    capabilities: Capabilities,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State> {
    /// Returns what the server announced in its last EHLO reply.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn into_state<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            capabilities: self.capabilities,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, Connected> {
    /// Wraps a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server is not
    /// ready.
    pub async fn from_stream(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            capabilities: Capabilities::default(),
            io_timeout,
            _state: PhantomData,
        };
        let greeting = client.read_reply().await?.expect_code(ReplyCode::SERVICE_READY)?;
        tracing::debug!(greeting = %greeting.text(), "server ready");
        Ok(client)
    }

    /// Sends EHLO and records the server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?
            .expect_success()?;

        self.capabilities = Capabilities::from_ehlo(reply.lines.iter().skip(1).map(String::as_str));
        tracing::debug!(capabilities = ?self.capabilities, "EHLO");
        Ok(self)
    }

    /// Authenticates with the best mechanism both sides support.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server offers neither PLAIN nor
    /// LOGIN, or the server's error if the credentials are rejected.
    pub async fn authenticate(self, credentials: &Credentials) -> Result<Client<S, Authenticated>> {
        match self.capabilities.preferred_auth() {
            Some(AuthMechanism::Plain) => {
                self.auth_plain(&credentials.username, &credentials.password)
                    .await
            }
            Some(AuthMechanism::Login) => {
                self.auth_login(&credentials.username, &credentials.password)
                    .await
            }
            None => Err(Error::NotSupported("AUTH".into())),
        }
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let encoded = STANDARD.encode(format!("\0{username}\0{password}"));

        self.send_command(Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?
        .expect_code(ReplyCode::AUTH_SUCCESS)?;

        Ok(self.into_state())
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.send_command(Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        })
        .await?
        .expect_code(ReplyCode::AUTH_CONTINUE)?;

        self.send_command(Command::AuthResponse(STANDARD.encode(username)))
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;

        self.send_command(Command::AuthResponse(STANDARD.encode(password)))
            .await?
            .expect_code(ReplyCode::AUTH_SUCCESS)?;

        Ok(self.into_state())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large or MAIL FROM is rejected.
    pub async fn mail_from(
        self,
        from: Address,
        size: usize,
    ) -> Result<Client<S, MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl Client<TcpStream, Connected> {
    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(
        mut self,
        hostname: &str,
        client_hostname: &str,
    ) -> Result<Client<TlsStream, Connected>> {
        if !self.capabilities.starttls {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let tls = upgrade_to_tls(self.stream.into_inner(), hostname).await?;
        tracing::debug!(hostname, "TLS established");

        let client = Client {
            stream: BufReader::new(tls),
            capabilities: Capabilities::default(),
            io_timeout: self.io_timeout,
            _state: PhantomData,
        };
        client.ehlo(client_hostname).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large or MAIL FROM is rejected.
    pub async fn mail_from(
        self,
        from: Address,
        size: usize,
    ) -> Result<Client<S, MailTransaction>> {
        self.start_mail(from, size).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S, MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.send_command(Command::RcptTo { to })
            .await?
            .expect_success()?;
        Ok(self)
    }

    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// stuffed and the terminating `.` line is added.
    ///
    /// # Errors
    ///
    /// Returns an error if DATA is refused or the server rejects the message.
    pub async fn data(mut self, message: &[u8]) -> Result<Client<S, Connected>> {
        self.send_command(Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        self.write(&dot_stuff(message)).await?;
        let reply = self.read_reply().await?.expect_success()?;
        tracing::debug!(reply = %reply.text(), "message accepted");

        Ok(self.into_state())
    }
}

// Common implementation for all states
impl<S: AsyncRead + AsyncWrite + Unpin, State> Client<S, State> {
    async fn start_mail(mut self, from: Address, size: usize) -> Result<Client<S, MailTransaction>> {
        if let Some(limit) = self.capabilities.size_limit()
            && size > limit
        {
            return Err(Error::MessageTooLarge { size, limit });
        }

        let size = self.capabilities.size.map(|_| size);
        self.send_command(Command::MailFrom { from, size })
            .await?
            .expect_success()?;

        Ok(self.into_state())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::debug!(command = %cmd.redacted(), "C:");
        self.write(&cmd.serialize()).await?;
        self.read_reply().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.get_mut();
        tokio::time::timeout(io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(io_timeout))??;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = tokio::time::timeout(self.io_timeout, self.stream.read_line(&mut line))
                .await
                .map_err(|_| Error::Timeout(self.io_timeout))??;
            if read == 0 {
                return Err(Error::Protocol("Connection closed by server".into()));
            }

            let line = line.trim_end().to_string();
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        let reply = parse_reply(&lines)?;
        tracing::trace!(code = %reply.code, "S:");
        Ok(reply)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.code.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.text()));
        }

        Ok(())
    }
}

/// Frames a message for DATA: CRLF line endings, leading dots doubled and the
/// `.` terminator appended.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);

    if !message.is_empty() {
        let body = message.strip_suffix(b"\n").unwrap_or(message);
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b"a\r\n.b\r\n"), b"a\r\n..b\r\n.\r\n");
        assert_eq!(dot_stuff(b"a\nb"), b"a\r\nb\r\n.\r\n");
        assert_eq!(dot_stuff(b"."), b"..\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
    }

    #[tokio::test]
    async fn test_greeting_and_ehlo() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-smtp.example.com\r\n250-SIZE 1000\r\n250 AUTH LOGIN\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        let client = client.ehlo("client.example.com").await.unwrap();

        assert_eq!(client.capabilities().size_limit(), Some(1000));
        assert_eq!(client.capabilities().auth, vec![AuthMechanism::Login]);
    }

    #[tokio::test]
    async fn test_rejecting_greeting() {
        let mock = Builder::new().read(b"554 go away\r\n").build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let mock = Builder::new().read(b"220-still talking\r\n").build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_size_limit_checked_before_mail_from() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 SIZE 10\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        let from = Address::new("a@example.com").unwrap();
        let err = client.mail_from(from, 11).await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 11, limit: 10 }));
    }

    #[tokio::test]
    async fn test_auth_without_mechanism() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-hi\r\n250 AUTH CRAM-MD5\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();
        let err = client
            .authenticate(&Credentials::new("user", "pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_quit_accepts_closing() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        client.quit().await.unwrap();
    }
}
