//! # docbridge Codec
//!
//! Pure text conversions shared by the vault and the remote adapters.
//!
//! This crate provides:
//! - The block model for remote page content
//! - Inline rich-text span rendering
//! - Markdown ↔ block conversion for the common formatting subset
//! - YAML front matter split/parse/render
//!
//! Nothing here touches the filesystem or the network.
//!
//! ## Usage
//!
//! ```
//! use docbridge_codec::{blocks_to_body, body_to_blocks, Block, HeadingLevel};
//!
//! let blocks = body_to_blocks("# Notes\n\n- first\n- second\n");
//! assert_eq!(blocks[0], Block::heading(HeadingLevel::H1, "Notes"));
//! assert_eq!(blocks_to_body(&blocks), "# Notes\n\n- first\n- second\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod block;
mod error;
pub mod frontmatter;
mod inline;
mod markdown;

pub use block::{Block, HeadingLevel};
pub use error::{CodecError, CodecResult};
pub use inline::{spans_to_markdown, Span};
pub use markdown::{blocks_to_body, body_to_blocks};
