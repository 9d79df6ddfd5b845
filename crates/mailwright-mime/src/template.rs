//! Template rendering seam.
//!
//! Rendering engines live outside this crate. Anything implementing
//! [`Template`] can produce a body from a [`TemplateContext`] built from the
//! message being composed.

use serde::Serialize;

/// Error returned by a template implementation.
pub type TemplateError = Box<dyn std::error::Error + Send + Sync>;

/// Values a template may reference.
///
/// The context is [`Serialize`], so serde-driven engines can take it as is.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateContext<'a> {
    /// Sender address.
    pub sender_email: &'a str,
    /// Sender display name.
    pub sender_name: &'a str,
    /// Primary recipient address.
    pub receiver_email: &'a str,
    /// Primary recipient display name.
    pub receiver_name: &'a str,
    /// Subject line.
    pub subject: &'a str,
    /// Caller-supplied data, not interpreted by this crate.
    pub data: &'a serde_json::Value,
}

/// A body template.
pub trait Template {
    /// Renders the template against the given context.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&self, context: &TemplateContext<'_>) -> Result<String, TemplateError>;
}

impl<F, E> Template for F
where
    F: Fn(&TemplateContext<'_>) -> Result<String, E>,
    E: Into<TemplateError>,
{
    fn render(&self, context: &TemplateContext<'_>) -> Result<String, TemplateError> {
        self(context).map_err(Into::into)
    }
}
