//! # mailwright-smtp
//!
//! SMTP delivery (RFC 5321) for messages composed with `mailwright-mime`.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of valid
//!   SMTP state transitions
//! - **TLS support**: both implicit TLS (port 465) and STARTTLS (port 587)
//! - **Authentication**: PLAIN and LOGIN
//! - **Extensions**: SIZE is honoured before the message is sent
//! - **Validation first**: a message with recorded errors never opens a
//!   connection
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright_mime::Message;
//! use mailwright_smtp::{Config, Security, SmtpTransport};
//!
//! #[tokio::main]
//! async fn main() -> mailwright_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("news@example.com", "app-password")
//!         .build();
//!
//!     let mut message = Message::new();
//!     message
//!         .set_from("news@example.com", "Example News", "")
//!         .set_receiver("bob@example.com", "Bob")
//!         .set_subject("Weekly digest")
//!         .set_html("<p>Hello</p>", true);
//!
//!     SmtpTransport::new(config).send(&message).await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() ───→ Authenticated
//! └──────────────┘                              │
//!        │                                      │
//!        └─── mail_from() ───→ MailTransaction ←┘
//!                                   │
//!                      rcpt_to() ... data() ───→ Connected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (addresses, capabilities, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
pub mod parser;
mod transport;
pub mod types;

pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use connection::{Authenticated, Client, Connected, MailTransaction};
pub use error::{Error, Result};
pub use transport::{Envelope, SmtpTransport};
pub use types::{Address, AuthMechanism, Capabilities, Reply, ReplyCode};
