//! Markdown ↔ block conversion.
//!
//! The parser is line oriented. Blank lines separate blocks, consecutive
//! non-special lines join into one paragraph, and fenced code runs to the
//! next fence (or the end of the text if the fence is never closed).
//!
//! Only the common subset round-trips: headings 1-3, paragraphs, bulleted
//! and numbered items, code with a language, quotes, dividers and
//! checkboxes. Toggles, callouts and unsupported blocks render to readable
//! Markdown but come back as other kinds.

use crate::block::{Block, HeadingLevel};

const FENCE: &str = "```";
const DEFAULT_LANGUAGE: &str = "plain";

/// Parses a Markdown body into blocks.
pub fn body_to_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() {
            i += 1;
            continue;
        }

        if let Some(rest) = line.strip_prefix(FENCE) {
            let language = match rest.trim() {
                "" => DEFAULT_LANGUAGE.to_string(),
                lang => lang.to_string(),
            };
            i += 1;
            let mut code = Vec::new();
            while i < lines.len() && !lines[i].trim().starts_with(FENCE) {
                code.push(lines[i]);
                i += 1;
            }
            // Skip the closing fence.
            i += 1;
            blocks.push(Block::Code {
                language,
                text: code.join("\n"),
            });
            continue;
        }

        if let Some(block) = parse_single_line(line) {
            blocks.push(block);
            i += 1;
            continue;
        }

        let mut paragraph = vec![line];
        i += 1;
        while i < lines.len() && may_continue(line) {
            let next = lines[i].trim();
            if next.is_empty() || is_special_line(next) {
                break;
            }
            paragraph.push(next);
            i += 1;
        }
        blocks.push(Block::Paragraph(paragraph.join(" ")));
    }

    blocks
}

fn parse_single_line(line: &str) -> Option<Block> {
    if let Some(text) = line.strip_prefix("# ") {
        return Some(Block::heading(HeadingLevel::H1, text.trim()));
    }
    if let Some(text) = line.strip_prefix("## ") {
        return Some(Block::heading(HeadingLevel::H2, text.trim()));
    }
    if let Some(text) = line.strip_prefix("### ") {
        return Some(Block::heading(HeadingLevel::H3, text.trim()));
    }
    if let Some(text) = line.strip_prefix("- [ ] ") {
        return Some(Block::todo(false, text.trim()));
    }
    if let Some(text) = line
        .strip_prefix("- [x] ")
        .or_else(|| line.strip_prefix("- [X] "))
    {
        return Some(Block::todo(true, text.trim()));
    }
    if let Some(text) = line.strip_prefix("- ") {
        return Some(Block::BulletedItem(text.trim().to_string()));
    }
    if let Some(text) = strip_ordinal(line) {
        return Some(Block::NumberedItem(text.trim().to_string()));
    }
    if let Some(text) = line.strip_prefix("> ") {
        return Some(Block::Quote(text.trim().to_string()));
    }
    if line == "---" {
        return Some(Block::Divider);
    }
    None
}

/// Strips a `<digits>. ` prefix.
fn strip_ordinal(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let after_dot = rest.strip_prefix('.')?;
    if after_dot.starts_with(char::is_whitespace) {
        Some(after_dot.trim_start())
    } else {
        None
    }
}

/// A paragraph opened by a marker-like line stays on one line, so that
/// joining never turns it into a different block on the next parse.
fn may_continue(first: &str) -> bool {
    if first.starts_with(['#', '-', '>', '`']) {
        return false;
    }
    let rest = first.trim_start_matches(|c: char| c.is_ascii_digit());
    !(rest.len() < first.len() && rest.starts_with('.'))
}

/// Lines that end a running paragraph.
fn is_special_line(line: &str) -> bool {
    line.starts_with('#')
        || line.starts_with('-')
        || line.starts_with('>')
        || line.starts_with(FENCE)
        || strip_ordinal(line).is_some()
}

/// Renders blocks as a Markdown body.
///
/// The output ends with a single newline, or is empty when there are no
/// blocks.
pub fn blocks_to_body(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        render_block(block, &mut out);
    }
    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

fn render_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, text } => {
            out.push_str(&"#".repeat(usize::from(level.get())));
            out.push(' ');
            out.push_str(text);
            out.push_str("\n\n");
        }
        Block::Paragraph(text) => {
            out.push_str(text);
            out.push_str("\n\n");
        }
        Block::BulletedItem(text) => {
            out.push_str("- ");
            out.push_str(text);
            out.push('\n');
        }
        Block::NumberedItem(text) => {
            out.push_str("1. ");
            out.push_str(text);
            out.push('\n');
        }
        Block::Code { language, text } => {
            out.push_str(FENCE);
            out.push_str(language);
            out.push('\n');
            out.push_str(text);
            out.push('\n');
            out.push_str(FENCE);
            out.push_str("\n\n");
        }
        Block::Quote(text) => {
            out.push_str("> ");
            out.push_str(text);
            out.push_str("\n\n");
        }
        Block::Divider => out.push_str("---\n\n"),
        Block::ToDo { checked, text } => {
            out.push_str(if *checked { "- [x] " } else { "- [ ] " });
            out.push_str(text);
            out.push('\n');
        }
        Block::Toggle(text) => {
            out.push_str("<details>\n<summary>");
            out.push_str(text);
            out.push_str("</summary>\n</details>\n\n");
        }
        Block::Callout { icon, text } => {
            out.push_str("> ");
            out.push_str(icon);
            out.push_str(" **Callout:** ");
            out.push_str(text);
            out.push_str("\n\n");
        }
        Block::Unsupported { kind } => {
            out.push_str("<!-- Unsupported block type: ");
            out.push_str(kind);
            out.push_str(" -->\n\n");
        }
    }
}
