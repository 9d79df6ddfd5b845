//! MIME serialization of a [`Message`].
//!
//! The multipart nesting depends on which attachments are present:
//!
//! ```text
//! no attachments     alternative(plain, html)
//! files only         mixed(alternative(plain, html), file...)
//! inline only        alternative(plain, related(html, inline...))
//! inline and files   mixed(alternative(plain, related(html, inline...)), file...)
//! ```
//!
//! Every leaf is Base64 encoded and wrapped at 76 columns. Lines end in CRLF.

use crate::encoding::{encode_base64_wrapped, encode_words};
use crate::message::{Attachment, Mailbox, Message};
use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::fmt::Write as _;
use std::iter;

const PREAMBLE: &str = "This is a message in MIME format. If you see this, your mail reader does not support this format.";

/// Multipart layout chosen for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `multipart/alternative` with plain text and HTML.
    Alternative,
    /// `multipart/alternative` whose HTML sits in a `multipart/related` with inline parts.
    AlternativeRelated,
    /// `multipart/mixed` with the alternative section followed by files.
    Mixed,
    /// `multipart/mixed` around an alternative section that holds a related section.
    MixedRelated,
}

impl Layout {
    /// Picks the layout for a message's attachments.
    #[must_use]
    pub fn of(message: &Message) -> Self {
        let has_inline = message.attachments().iter().any(Attachment::is_inline);
        let has_files = message.attachments().iter().any(|a| !a.is_inline());
        match (has_inline, has_files) {
            (false, false) => Self::Alternative,
            (true, false) => Self::AlternativeRelated,
            (false, true) => Self::Mixed,
            (true, true) => Self::MixedRelated,
        }
    }
}

/// Boundary strings, one per nesting depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundaries {
    outer: String,
    middle: String,
    inner: String,
}

impl Boundaries {
    /// Creates boundaries from explicit strings.
    #[must_use]
    pub fn new(
        outer: impl Into<String>,
        middle: impl Into<String>,
        inner: impl Into<String>,
    ) -> Self {
        Self {
            outer: outer.into(),
            middle: middle.into(),
            inner: inner.into(),
        }
    }

    /// The same literal boundaries for every message.
    ///
    /// Only safe because every body is Base64, which can never contain a
    /// `--` delimiter line.
    #[must_use]
    pub fn fixed() -> Self {
        Self::new(
            "===============main==",
            "===============boundary==",
            "===============boundary2==",
        )
    }

    /// Fresh random boundaries.
    #[must_use]
    pub fn random() -> Self {
        let token = random_token(24);
        Self::new(
            format!("=_outer_{token}"),
            format!("=_middle_{token}"),
            format!("=_inner_{token}"),
        )
    }

    fn at_depth(&self, depth: usize) -> &str {
        match depth {
            0 => &self.outer,
            1 => &self.middle,
            _ => &self.inner,
        }
    }
}

impl Default for Boundaries {
    fn default() -> Self {
        Self::random()
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A node of the part tree.
enum Part<'a> {
    Text {
        subtype: &'static str,
        body: &'a str,
    },
    Attachment(&'a Attachment),
    Multipart {
        subtype: &'static str,
        parts: Vec<Part<'a>>,
    },
}

impl<'a> Part<'a> {
    /// The top-level multipart for `layout`: its subtype and children.
    fn tree(message: &'a Message, layout: Layout) -> (&'static str, Vec<Self>) {
        let attachments = message.attachments().iter();
        let inline = attachments.clone().filter(|a| a.is_inline()).map(Part::Attachment);
        let files = attachments.filter(|a| !a.is_inline()).map(Part::Attachment);

        let plain = Part::Text {
            subtype: "plain",
            body: message.plain_text(),
        };
        let html = Part::Text {
            subtype: "html",
            body: message.html(),
        };

        let html = match layout {
            Layout::Alternative | Layout::Mixed => html,
            Layout::AlternativeRelated | Layout::MixedRelated => Part::Multipart {
                subtype: "related",
                parts: iter::once(html).chain(inline).collect(),
            },
        };
        let alternative = vec![plain, html];

        match layout {
            Layout::Alternative | Layout::AlternativeRelated => ("alternative", alternative),
            Layout::Mixed | Layout::MixedRelated => {
                let alternative = Part::Multipart {
                    subtype: "alternative",
                    parts: alternative,
                };
                ("mixed", iter::once(alternative).chain(files).collect())
            }
        }
    }
}

/// Serializes messages to MIME.
///
/// `build` does not consult the message's error list; use
/// [`Message::to_mime`] or [`Message::check`] first.
#[derive(Debug, Clone, Default)]
pub struct MimeBuilder {
    boundaries: Boundaries,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
}

impl MimeBuilder {
    /// Creates a builder with random boundaries, the current date and a
    /// generated Message-ID.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given boundaries.
    #[must_use]
    pub fn with_boundaries(mut self, boundaries: Boundaries) -> Self {
        self.boundaries = boundaries;
        self
    }

    /// Uses a fixed `Date` header.
    #[must_use]
    pub fn with_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Uses a fixed Message-ID, given without angle brackets.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Serializes `message` to a complete RFC 5322 message.
    #[must_use]
    pub fn build(&self, message: &Message) -> Vec<u8> {
        let mut out = String::with_capacity(estimate_size(message));
        self.write_headers(&mut out, message);

        let layout = Layout::of(message);
        tracing::trace!(?layout, attachments = message.attachment_count(), "building message");

        let (subtype, parts) = Part::tree(message, layout);
        let boundary = self.boundaries.at_depth(0);
        let _ = write!(
            out,
            "Content-Type: multipart/{subtype}; boundary=\"{boundary}\"\r\n"
        );
        out.push_str("MIME-Version: 1.0\r\n\r\n");
        out.push_str(PREAMBLE);
        out.push_str("\r\n\r\n");
        self.write_parts(&mut out, &parts, 0);

        out.into_bytes()
    }

    fn write_headers(&self, out: &mut String, message: &Message) {
        if let Some(from) = message.from() {
            if from.name.is_empty() {
                let _ = write!(out, "From: {}\r\n", from.email);
            } else {
                let _ = write!(out, "From: {}\r\n", format_mailbox(from));
            }
        }

        if let Some(to) = message.receiver() {
            let _ = write!(out, "To: {}\r\n", format_mailbox(to));
        }

        if let Some(cc) = message.receiver_cc() {
            let _ = write!(out, "Cc: {}\r\n", format_mailbox(cc));
        }

        if let Some(reply_to) = message.reply_to().or_else(|| message.from()) {
            let _ = write!(out, "Reply-To: {}\r\n", format_mailbox(reply_to));
        }

        let _ = write!(out, "Subject: {}\r\n", encode_words(message.subject()));

        if !message.unsubscribe().is_empty() {
            let targets: Vec<String> = message.unsubscribe().iter().map(ToString::to_string).collect();
            let _ = write!(out, "List-Unsubscribe: {}\r\n", targets.join(", "));
        }

        let date = self.date.unwrap_or_else(|| Utc::now().fixed_offset());
        let _ = write!(out, "Date: {}\r\n", date.to_rfc2822());

        let message_id = self.message_id.clone().unwrap_or_else(|| {
            let domain = message
                .from()
                .and_then(|from| from.email.rsplit_once('@'))
                .map_or("localhost", |(_, domain)| domain);
            format!("{}@{domain}", random_token(32))
        });
        let _ = write!(out, "Message-ID: <{message_id}>\r\n");
    }

    fn write_parts(&self, out: &mut String, parts: &[Part<'_>], depth: usize) {
        let boundary = self.boundaries.at_depth(depth);
        for part in parts {
            let _ = write!(out, "--{boundary}\r\n");
            self.write_part(out, part, depth + 1);
        }
        let _ = write!(out, "--{boundary}--\r\n");
    }

    fn write_part(&self, out: &mut String, part: &Part<'_>, depth: usize) {
        match part {
            Part::Text { subtype, body } => {
                let _ = write!(out, "Content-Type: text/{subtype}; charset=utf-8\r\n");
                out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                write_body(out, body.as_bytes());
            }
            Part::Attachment(attachment) => {
                let name = encode_words(attachment.name());
                let disposition = if attachment.is_inline() {
                    "inline"
                } else {
                    "attachment"
                };
                let _ = write!(
                    out,
                    "Content-Type: {}; name=\"{name}\"\r\n",
                    attachment.content_type()
                );
                let _ = write!(
                    out,
                    "Content-Disposition: {disposition}; filename=\"{name}\"\r\n"
                );
                if attachment.is_inline() {
                    let _ = write!(out, "Content-ID: <{}>\r\n", attachment.content_id());
                }
                out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                write_body(out, attachment.data());
            }
            Part::Multipart { subtype, parts } => {
                let boundary = self.boundaries.at_depth(depth);
                let _ = write!(
                    out,
                    "Content-Type: multipart/{subtype}; boundary=\"{boundary}\"\r\n\r\n"
                );
                self.write_parts(out, parts, depth);
            }
        }
    }
}

fn write_body(out: &mut String, data: &[u8]) {
    if data.is_empty() {
        // Keeps the delimiter from swallowing the blank line after the headers.
        out.push_str("\r\n");
    } else {
        out.push_str(&encode_base64_wrapped(data));
    }
}

fn format_mailbox(mailbox: &Mailbox) -> String {
    format!("{} <{}>", encode_words(&mailbox.name), mailbox.email)
}

fn estimate_size(message: &Message) -> usize {
    let payload = message.plain_text().len()
        + message.html().len()
        + message.attachments().iter().map(Attachment::size).sum::<usize>();
    payload * 4 / 3 + 2048
}
