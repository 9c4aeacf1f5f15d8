//! Inline rich-text rendering.
//!
//! Remote text arrives as a list of annotated spans. Spans are flattened to
//! inline Markdown when decoded; outgoing text is sent as a single plain span.

/// A run of text with uniform annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    /// Raw text content.
    pub text: String,
    /// Link target, if the span is a link.
    pub link: Option<String>,
    /// Bold annotation.
    pub bold: bool,
    /// Italic annotation.
    pub italic: bool,
    /// Inline code annotation.
    pub code: bool,
    /// Strikethrough annotation.
    pub strikethrough: bool,
    /// Underline annotation.
    pub underline: bool,
}

impl Span {
    /// Creates a plain span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Renders this span as inline Markdown.
    ///
    /// Annotations wrap in a fixed order: link, bold, italic, code,
    /// strikethrough, underline.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = match &self.link {
            Some(url) => format!("[{}]({})", self.text, url),
            None => self.text.clone(),
        };
        if self.bold {
            out = format!("**{out}**");
        }
        if self.italic {
            out = format!("*{out}*");
        }
        if self.code {
            out = format!("`{out}`");
        }
        if self.strikethrough {
            out = format!("~~{out}~~");
        }
        if self.underline {
            out = format!("<u>{out}</u>");
        }
        out
    }
}

/// Concatenates spans into a single inline Markdown string.
#[must_use]
pub fn spans_to_markdown(spans: &[Span]) -> String {
    spans.iter().map(Span::to_markdown).collect()
}
