//! # mailwright-mime
//!
//! Outgoing email composition: a fluent message model and a MIME builder.
//!
//! ## Features
//!
//! - **Batch validation**: setters record errors instead of failing, so one
//!   chain reports every problem
//! - **Plain-text fallback**: derived from HTML without losing link targets
//! - **Layout selection**: `multipart/alternative`, `related` and `mixed`
//!   nested according to the attachments present
//! - **Encoding**: RFC 2047 encoded-words for headers, wrapped Base64 bodies
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright_mime::Message;
//!
//! let mut message = Message::new();
//! message
//!     .set_from("news@example.com", "Example News", "")
//!     .set_receiver("bob@example.com", "Bob")
//!     .set_subject("Weekly digest")
//!     .set_html("<p>Read it <a href=\"https://example.com/digest\"></a></p>", true)
//!     .add_unsubscribe_mail("unsubscribe@example.com");
//!
//! let bytes = message.to_mime()?;
//! ```
//!
//! ### Inline images and attachments
//!
//! ```ignore
//! message
//!     .add_inline("logo", "logo.png", "image/png", logo_bytes)
//!     .add_attachment("invoice.pdf", "application/pdf", pdf_bytes);
//! ```
//!
//! ### Deterministic output
//!
//! ```ignore
//! use mailwright_mime::{Boundaries, MimeBuilder};
//!
//! let bytes = MimeBuilder::new()
//!     .with_boundaries(Boundaries::fixed())
//!     .with_message_id("1@example.com")
//!     .build(&message);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod error;
mod message;
mod template;

pub mod encoding;
pub mod html;

pub use builder::{Boundaries, Layout, MimeBuilder};
pub use error::{Error, Result};
pub use message::{
    Attachment, Mailbox, Message, MessageError, MessageErrorKind, MessageErrors, Operation,
    Unsubscribe,
};
pub use template::{Template, TemplateContext, TemplateError};
