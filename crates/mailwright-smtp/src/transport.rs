//! Message delivery.
//!
//! [`SmtpTransport`] takes a composed [`Message`], refuses it if any setter
//! recorded an error, builds the MIME bytes and walks the SMTP dialogue for
//! the configured security mode.

use crate::config::{Config, Security};
use crate::connection::{Client, Connected, connect, connect_tls};
use crate::error::{Error, Result};
use crate::types::Address;
use mailwright_mime::{Message, MimeBuilder};
use tokio::io::{AsyncRead, AsyncWrite};

/// Envelope sender and recipients, as used by `MAIL FROM` and `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path.
    pub from: Address,
    /// Forward paths, in delivery order.
    pub to: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(from: Address, to: Vec<Address>) -> Self {
        Self { from, to }
    }

    /// Derives the envelope from a message: the sender, then the receiver and
    /// the CC receiver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the message has no sender or no
    /// receiver, or an address cannot be used on the wire.
    pub fn from_message(message: &Message) -> Result<Self> {
        let from = message
            .from()
            .ok_or_else(|| Error::InvalidAddress("Message has no sender".into()))?;
        let receiver = message
            .receiver()
            .ok_or_else(|| Error::InvalidAddress("Message has no receiver".into()))?;

        let mut to = vec![Address::new(receiver.email.as_str())?];
        if let Some(cc) = message.receiver_cc() {
            to.push(Address::new(cc.email.as_str())?);
        }

        Ok(Self::new(Address::new(from.email.as_str())?, to))
    }
}

/// Sends messages through one SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    config: Config,
    builder: MimeBuilder,
}

impl SmtpTransport {
    /// Creates a transport for the given server.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            builder: MimeBuilder::new(),
        }
    }

    /// Uses a specific MIME builder, e.g. one with fixed boundaries.
    #[must_use]
    pub fn with_builder(mut self, builder: MimeBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Connects to the server and delivers `message`.
    ///
    /// Nothing is sent when the message carries recorded errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] with the recorded errors, an address
    /// error, or any connection and protocol failure.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let (envelope, body) = self.prepare(message)?;
        let config = &self.config;

        match config.security {
            Security::Implicit => {
                let stream = connect_tls(&config.host, config.port, config.connect_timeout).await?;
                let client = greet(stream, config).await?;
                deliver(client, config, &envelope, &body).await
            }
            Security::StartTls => {
                let stream = connect(&config.host, config.port, config.connect_timeout).await?;
                let client = greet(stream, config)
                    .await?
                    .starttls(&config.host, &config.hello_name)
                    .await?;
                deliver(client, config, &envelope, &body).await
            }
            Security::None => {
                let stream = connect(&config.host, config.port, config.connect_timeout).await?;
                let client = greet(stream, config).await?;
                deliver(client, config, &envelope, &body).await
            }
        }
    }

    /// Delivers `message` over an already established stream.
    ///
    /// The stream is used as is: no TLS is negotiated, whatever the
    /// configured security mode.
    ///
    /// # Errors
    ///
    /// Same as [`SmtpTransport::send`].
    pub async fn send_over<S>(&self, stream: S, message: &Message) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (envelope, body) = self.prepare(message)?;
        let client = greet(stream, &self.config).await?;
        deliver(client, &self.config, &envelope, &body).await
    }

    fn prepare(&self, message: &Message) -> Result<(Envelope, Vec<u8>)> {
        message.check()?;
        let envelope = Envelope::from_message(message)?;
        Ok((envelope, self.builder.build(message)))
    }
}

/// Reads the greeting and sends EHLO.
async fn greet<S>(stream: S, config: &Config) -> Result<Client<S, Connected>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Client::from_stream(stream, config.io_timeout)
        .await?
        .ehlo(&config.hello_name)
        .await
}

/// Authenticates if configured, runs the mail transaction and quits.
async fn deliver<S>(
    client: Client<S, Connected>,
    config: &Config,
    envelope: &Envelope,
    body: &[u8],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut transaction = match &config.credentials {
        Some(credentials) => {
            client
                .authenticate(credentials)
                .await?
                .mail_from(envelope.from.clone(), body.len())
                .await?
        }
        None => client.mail_from(envelope.from.clone(), body.len()).await?,
    };

    for to in &envelope.to {
        transaction = transaction.rcpt_to(to.clone()).await?;
    }

    transaction.data(body).await?.quit().await?;

    tracing::info!(
        host = %config.host,
        from = %envelope.from,
        recipients = envelope.to.len(),
        size = body.len(),
        "message delivered"
    );
    Ok(())
}
