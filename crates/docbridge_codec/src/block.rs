//! Content blocks.
//!
//! A remote page body is an ordered list of blocks. Payloads from the remote
//! side are decoded into these variants once, at the adapter boundary; the
//! rest of the system never looks at untyped block JSON.

use crate::error::{CodecError, CodecResult};

/// Heading level (1 to 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    /// Level 1 heading.
    pub const H1: Self = Self(1);
    /// Level 2 heading.
    pub const H2: Self = Self(2);
    /// Level 3 heading.
    pub const H3: Self = Self(3);

    /// Creates a heading level, rejecting anything outside 1..=3.
    pub fn new(level: u8) -> CodecResult<Self> {
        if (1..=3).contains(&level) {
            Ok(Self(level))
        } else {
            Err(CodecError::UnsupportedHeadingLevel { level })
        }
    }

    /// Returns the numeric level.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

/// A single content block.
///
/// Text carried by blocks is already inline Markdown (bold, links, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Heading of level 1 to 3.
    Heading {
        /// Heading level.
        level: HeadingLevel,
        /// Heading text.
        text: String,
    },
    /// Plain paragraph.
    Paragraph(String),
    /// Bulleted list item.
    BulletedItem(String),
    /// Numbered list item.
    NumberedItem(String),
    /// Fenced code block.
    Code {
        /// Language tag, `plain` when unspecified.
        language: String,
        /// Code text (may span lines).
        text: String,
    },
    /// Block quote.
    Quote(String),
    /// Horizontal divider.
    Divider,
    /// Checkbox item.
    ToDo {
        /// Whether the box is ticked.
        checked: bool,
        /// Item text.
        text: String,
    },
    /// Collapsible toggle (summary only).
    Toggle(String),
    /// Callout with an icon.
    Callout {
        /// Emoji icon.
        icon: String,
        /// Callout text.
        text: String,
    },
    /// A block kind outside the supported subset.
    Unsupported {
        /// Remote block type name.
        kind: String,
    },
}

impl Block {
    /// Creates a heading block.
    pub fn heading(level: HeadingLevel, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            text: text.into(),
        }
    }

    /// Creates a paragraph block.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(text.into())
    }

    /// Creates a code block.
    pub fn code(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Code {
            language: language.into(),
            text: text.into(),
        }
    }

    /// Creates a checkbox block.
    pub fn todo(checked: bool, text: impl Into<String>) -> Self {
        Self::ToDo {
            checked,
            text: text.into(),
        }
    }

    /// Remote type name of this block.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Block::Heading { level, .. } => match level.get() {
                1 => "heading_1",
                2 => "heading_2",
                _ => "heading_3",
            },
            Block::Paragraph(_) => "paragraph",
            Block::BulletedItem(_) => "bulleted_list_item",
            Block::NumberedItem(_) => "numbered_list_item",
            Block::Code { .. } => "code",
            Block::Quote(_) => "quote",
            Block::Divider => "divider",
            Block::ToDo { .. } => "to_do",
            Block::Toggle(_) => "toggle",
            Block::Callout { .. } => "callout",
            Block::Unsupported { kind } => kind,
        }
    }

    /// Returns true if the block belongs to the common round-trip subset.
    #[must_use]
    pub fn is_portable(&self) -> bool {
        !matches!(
            self,
            Block::Toggle(_) | Block::Callout { .. } | Block::Unsupported { .. }
        )
    }
}
