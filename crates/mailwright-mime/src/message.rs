//! Outgoing message model.
//!
//! A [`Message`] is filled in through chained setters. Setters never fail:
//! invalid arguments are recorded as [`MessageError`]s and the field is left
//! untouched, so a single chain reports every problem at once. The error list
//! is the only thing that decides whether a message may be built.

use crate::builder::MimeBuilder;
use crate::html;
use crate::template::{Template, TemplateContext};
use std::fmt;

/// Display name plus address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailbox {
    /// Email address.
    pub email: String,
    /// Display name, possibly empty.
    pub name: String,
}

impl Mailbox {
    /// Creates a mailbox.
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }
}

/// A file attachment or an inline resource.
///
/// An attachment with a content id is inline: the HTML body refers to it as
/// `cid:<id>`. Without one it is an ordinary downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    content_id: String,
    name: String,
    content_type: String,
    data: Vec<u8>,
}

impl Attachment {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Content id, empty for file attachments.
    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Raw payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether the attachment is referenced from the HTML body.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        !self.content_id.is_empty()
    }
}

/// One `List-Unsubscribe` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsubscribe {
    /// Unsubscribe by mail.
    Mail(String),
    /// Unsubscribe by visiting an http(s) link.
    Link(String),
}

impl fmt::Display for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mail(email) => write!(f, "<mailto:{email}?subject=unsubscribe>"),
            Self::Link(url) => write!(f, "<{url}>"),
        }
    }
}

/// Message operation that recorded an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Message::set_from`]
    SetFrom,
    /// [`Message::set_reply_to`]
    SetReplyTo,
    /// [`Message::set_receiver`]
    SetReceiver,
    /// [`Message::set_receiver_cc`]
    SetReceiverCc,
    /// [`Message::set_subject`]
    SetSubject,
    /// [`Message::set_plain_text`]
    SetPlainText,
    /// [`Message::set_html`]
    SetHtml,
    /// [`Message::set_html_from_template`]
    SetHtmlFromTemplate,
    /// [`Message::set_plain_text_from_template`]
    SetPlainTextFromTemplate,
    /// [`Message::add_unsubscribe_mail`]
    AddUnsubscribeMail,
    /// [`Message::add_unsubscribe_link`]
    AddUnsubscribeLink,
    /// [`Message::add_attachment`]
    AddAttachment,
    /// [`Message::add_inline`]
    AddInline,
}

impl Operation {
    /// Method name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetFrom => "set_from",
            Self::SetReplyTo => "set_reply_to",
            Self::SetReceiver => "set_receiver",
            Self::SetReceiverCc => "set_receiver_cc",
            Self::SetSubject => "set_subject",
            Self::SetPlainText => "set_plain_text",
            Self::SetHtml => "set_html",
            Self::SetHtmlFromTemplate => "set_html_from_template",
            Self::SetPlainTextFromTemplate => "set_plain_text_from_template",
            Self::AddUnsubscribeMail => "add_unsubscribe_mail",
            Self::AddUnsubscribeLink => "add_unsubscribe_link",
            Self::AddAttachment => "add_attachment",
            Self::AddInline => "add_inline",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong in a recorded error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageErrorKind {
    /// A required argument was empty or malformed.
    #[error("{0}")]
    Validation(&'static str),

    /// A template failed to render.
    #[error("template render failed: {0}")]
    TemplateRender(String),

    /// The HTML body could not be converted to plain text.
    #[error("plain text derivation failed: {0}")]
    HtmlParse(String),
}

/// An error recorded on a [`Message`], tagged with the operation that raised it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation}: {kind}")]
pub struct MessageError {
    operation: Operation,
    kind: MessageErrorKind,
}

impl MessageError {
    /// Creates an error.
    #[must_use]
    pub const fn new(operation: Operation, kind: MessageErrorKind) -> Self {
        Self { operation, kind }
    }

    /// Operation that recorded the error.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Error details.
    #[must_use]
    pub const fn kind(&self) -> &MessageErrorKind {
        &self.kind
    }
}

/// Every error accumulated on a message, reported as one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageErrors(Vec<MessageError>);

impl MessageErrors {
    /// The individual errors, in the order they were recorded.
    #[must_use]
    pub fn errors(&self) -> &[MessageError] {
        &self.0
    }
}

impl fmt::Display for MessageErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message has {} error(s):", self.0.len())?;
        for error in &self.0 {
            write!(f, "\r\n{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MessageErrors {}

/// An outgoing email under construction.
#[derive(Debug, Clone, Default)]
pub struct Message {
    from: Option<Mailbox>,
    reply_to: Option<Mailbox>,
    receiver: Option<Mailbox>,
    receiver_cc: Option<Mailbox>,
    subject: String,
    html: String,
    plain: String,
    unsubscribe: Vec<Unsubscribe>,
    attachments: Vec<Attachment>,
    data: serde_json::Value,
    errors: Vec<MessageError>,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, operation: Operation, kind: MessageErrorKind) -> &mut Self {
        tracing::debug!(%operation, error = %kind, "message error recorded");
        self.errors.push(MessageError::new(operation, kind));
        self
    }

    fn invalid(&mut self, operation: Operation, reason: &'static str) -> &mut Self {
        self.record(operation, MessageErrorKind::Validation(reason))
    }

    /// Sets the sender. A non-empty `reply_to` address also sets the reply-to
    /// mailbox under the sender's name.
    pub fn set_from(&mut self, email: &str, name: &str, reply_to: &str) -> &mut Self {
        if let Some(reason) = address_error(email) {
            return self.invalid(Operation::SetFrom, reason);
        }
        if name.is_empty() {
            return self.invalid(Operation::SetFrom, "empty name");
        }
        if breaks_brackets(reply_to) {
            return self.invalid(Operation::SetFrom, "reply-to contains line breaks or angle brackets");
        }
        self.from = Some(Mailbox::new(email, name));
        if !reply_to.is_empty() {
            self.reply_to = Some(Mailbox::new(reply_to, name));
        }
        self
    }

    /// Sets the reply-to mailbox. When never set, replies go to the sender.
    pub fn set_reply_to(&mut self, email: &str, name: &str) -> &mut Self {
        if let Some(reason) = address_error(email) {
            return self.invalid(Operation::SetReplyTo, reason);
        }
        self.reply_to = Some(Mailbox::new(email, name));
        self
    }

    /// Sets the primary recipient. The name may be empty.
    pub fn set_receiver(&mut self, email: &str, name: &str) -> &mut Self {
        if let Some(reason) = address_error(email) {
            return self.invalid(Operation::SetReceiver, reason);
        }
        self.receiver = Some(Mailbox::new(email, name));
        self
    }

    /// Sets the carbon-copy recipient. The name may be empty.
    pub fn set_receiver_cc(&mut self, email: &str, name: &str) -> &mut Self {
        if let Some(reason) = address_error(email) {
            return self.invalid(Operation::SetReceiverCc, reason);
        }
        self.receiver_cc = Some(Mailbox::new(email, name));
        self
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: &str) -> &mut Self {
        if subject.is_empty() {
            return self.invalid(Operation::SetSubject, "empty subject");
        }
        self.subject = subject.to_string();
        self
    }

    /// Sets the plain-text body.
    pub fn set_plain_text(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self.invalid(Operation::SetPlainText, "empty text");
        }
        self.plain = text.to_string();
        self
    }

    /// Sets the HTML body, optionally deriving the plain-text body from it.
    ///
    /// A failed derivation is recorded but the HTML body is kept.
    pub fn set_html(&mut self, body: &str, derive_plain_text: bool) -> &mut Self {
        self.store_html(Operation::SetHtml, body, derive_plain_text)
    }

    fn store_html(&mut self, operation: Operation, body: &str, derive: bool) -> &mut Self {
        if body.is_empty() {
            return self.invalid(operation, "empty html");
        }
        self.html = body.to_string();
        if derive {
            match html::to_plain_text(body) {
                Ok(text) => {
                    self.set_plain_text(&text);
                }
                Err(err) => {
                    self.record(operation, MessageErrorKind::HtmlParse(err.to_string()));
                }
            }
        }
        self
    }

    /// Renders `template` against this message and stores the result as the HTML body.
    pub fn set_html_from_template<T>(&mut self, template: &T, derive_plain_text: bool) -> &mut Self
    where
        T: Template + ?Sized,
    {
        match template.render(&self.template_context()) {
            Ok(body) => self.store_html(Operation::SetHtmlFromTemplate, &body, derive_plain_text),
            Err(err) => self.record(
                Operation::SetHtmlFromTemplate,
                MessageErrorKind::TemplateRender(err.to_string()),
            ),
        }
    }

    /// Renders `template` against this message and stores the result as the plain-text body.
    pub fn set_plain_text_from_template<T>(&mut self, template: &T) -> &mut Self
    where
        T: Template + ?Sized,
    {
        match template.render(&self.template_context()) {
            Ok(text) if text.is_empty() => {
                self.invalid(Operation::SetPlainTextFromTemplate, "empty text")
            }
            Ok(text) => {
                self.plain = text;
                self
            }
            Err(err) => self.record(
                Operation::SetPlainTextFromTemplate,
                MessageErrorKind::TemplateRender(err.to_string()),
            ),
        }
    }

    /// Adds a mail unsubscribe target.
    pub fn add_unsubscribe_mail(&mut self, email: &str) -> &mut Self {
        if let Some(reason) = address_error(email) {
            return self.invalid(Operation::AddUnsubscribeMail, reason);
        }
        self.unsubscribe.push(Unsubscribe::Mail(email.to_string()));
        self
    }

    /// Adds an http(s) unsubscribe target.
    pub fn add_unsubscribe_link(&mut self, url: &str) -> &mut Self {
        if url.is_empty() {
            return self.invalid(Operation::AddUnsubscribeLink, "empty link");
        }
        if breaks_brackets(url) {
            return self.invalid(
                Operation::AddUnsubscribeLink,
                "link contains line breaks or angle brackets",
            );
        }
        let scheme = url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
        if !matches!(scheme.as_deref(), Some("http" | "https")) {
            return self.invalid(Operation::AddUnsubscribeLink, "link is not http(s)");
        }
        self.unsubscribe.push(Unsubscribe::Link(url.to_string()));
        self
    }

    /// Adds a downloadable file attachment.
    pub fn add_attachment(
        &mut self,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push_attachment(Operation::AddAttachment, String::new(), name, content_type, data.into())
    }

    /// Adds an inline resource the HTML body references as `cid:<content_id>`.
    pub fn add_inline(
        &mut self,
        content_id: &str,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        if content_id.is_empty() {
            return self.invalid(Operation::AddInline, "empty content id");
        }
        if breaks_brackets(content_id) {
            return self.invalid(
                Operation::AddInline,
                "content id contains line breaks or angle brackets",
            );
        }
        self.push_attachment(
            Operation::AddInline,
            content_id.to_string(),
            name,
            content_type,
            data.into(),
        )
    }

    fn push_attachment(
        &mut self,
        operation: Operation,
        content_id: String,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> &mut Self {
        if name.is_empty() {
            return self.invalid(operation, "empty name");
        }
        if content_type.is_empty() {
            return self.invalid(operation, "empty content type");
        }
        if breaks_line(content_type) {
            return self.invalid(operation, "content type contains line breaks");
        }
        if data.is_empty() {
            return self.invalid(operation, "empty data");
        }
        self.attachments.push(Attachment {
            content_id,
            name: name.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    /// Sets caller data made available to templates.
    pub fn set_data(&mut self, data: serde_json::Value) -> &mut Self {
        self.data = data;
        self
    }

    /// Whether any error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[MessageError] {
        &self.errors
    }

    /// Returns every recorded error as one failure.
    ///
    /// # Errors
    ///
    /// Returns [`MessageErrors`] if any error has been recorded.
    pub fn check(&self) -> Result<(), MessageErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MessageErrors(self.errors.clone()))
        }
    }

    /// Builds the message with default builder settings.
    ///
    /// # Errors
    ///
    /// Returns [`MessageErrors`] without building if any error has been recorded.
    pub fn to_mime(&self) -> Result<Vec<u8>, MessageErrors> {
        self.check()?;
        Ok(MimeBuilder::new().build(self))
    }

    /// Sender mailbox.
    #[must_use]
    pub const fn from(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    /// Explicit reply-to mailbox.
    #[must_use]
    pub const fn reply_to(&self) -> Option<&Mailbox> {
        self.reply_to.as_ref()
    }

    /// Primary recipient.
    #[must_use]
    pub const fn receiver(&self) -> Option<&Mailbox> {
        self.receiver.as_ref()
    }

    /// Carbon-copy recipient.
    #[must_use]
    pub const fn receiver_cc(&self) -> Option<&Mailbox> {
        self.receiver_cc.as_ref()
    }

    /// Subject, empty when unset.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// HTML body, empty when unset.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Plain-text body, empty when unset.
    #[must_use]
    pub fn plain_text(&self) -> &str {
        &self.plain
    }

    /// Length of the plain-text body in bytes.
    #[must_use]
    pub fn plain_text_len(&self) -> usize {
        self.plain.len()
    }

    /// Unsubscribe targets in insertion order.
    #[must_use]
    pub fn unsubscribe(&self) -> &[Unsubscribe] {
        &self.unsubscribe
    }

    /// Attachments in insertion order.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Number of accepted attachments.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Caller data for templates.
    #[must_use]
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Context handed to templates.
    #[must_use]
    pub fn template_context(&self) -> TemplateContext<'_> {
        let from = self.from.as_ref();
        let receiver = self.receiver.as_ref();
        TemplateContext {
            sender_email: from.map_or("", |m| m.email.as_str()),
            sender_name: from.map_or("", |m| m.name.as_str()),
            receiver_email: receiver.map_or("", |m| m.email.as_str()),
            receiver_name: receiver.map_or("", |m| m.name.as_str()),
            subject: &self.subject,
            data: &self.data,
        }
    }
}

/// Whether `value` would end the header line it is written on.
fn breaks_line(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// Why `email` cannot be written inside `<...>` in a header, if it cannot.
fn address_error(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        Some("empty email")
    } else if breaks_brackets(email) {
        Some("email contains line breaks or angle brackets")
    } else {
        None
    }
}

/// Whether `value` would escape the `<...>` it is written in.
fn breaks_brackets(value: &str) -> bool {
    breaks_line(value) || value.contains(['<', '>'])
}
