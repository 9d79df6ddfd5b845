//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected, MailTransaction};
pub use stream::{TlsStream, connect, connect_tls, upgrade_to_tls};
