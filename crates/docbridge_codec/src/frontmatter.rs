//! YAML front matter.
//!
//! A document is laid out as:
//!
//! ```text
//! ---
//! key: value
//! ---
//!
//! body
//! ```
//!
//! Text that does not open with a `---` line has no front matter and parses
//! to the default metadata.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

const DELIMITER: &str = "---";

/// Splits raw text into its YAML preamble (if any) and body.
///
/// One blank line after the closing delimiter belongs to the layout and is
/// not part of the body.
pub fn split(text: &str) -> CodecResult<(Option<&str>, &str)> {
    let Some(after_open) = strip_delimiter_line(text) else {
        return Ok((None, text));
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &after_open[..offset];
            let mut body = &after_open[offset + line.len()..];
            body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err(CodecError::unterminated(
        "front matter opened with '---' but never closed",
    ))
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(DELIMITER)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Parses a document into its metadata and body.
pub fn parse<T>(text: &str) -> CodecResult<(T, String)>
where
    T: DeserializeOwned + Default,
{
    let (yaml, body) = split(text)?;
    let metadata = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)
            .map_err(|e| CodecError::invalid_front_matter(e.to_string()))?,
        _ => T::default(),
    };
    Ok((metadata, body.to_string()))
}

/// Renders metadata and body into document text.
///
/// Metadata that serializes to an empty mapping produces no preamble.
pub fn render<T: Serialize>(metadata: &T, body: &str) -> CodecResult<String> {
    let yaml =
        serde_yaml::to_string(metadata).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    let trimmed = yaml.trim();
    if trimmed.is_empty() || trimmed == "{}" {
        return Ok(body.to_string());
    }
    let mut out = String::with_capacity(yaml.len() + body.len() + 10);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Meta {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
    }

    #[test]
    fn split_without_front_matter() {
        let (yaml, body) = split("# Hello\n").unwrap();
        assert!(yaml.is_none());
        assert_eq!(body, "# Hello\n");
    }

    #[test]
    fn split_with_front_matter() {
        let (yaml, body) = split("---\ntitle: x\n---\n\nbody\n").unwrap();
        assert_eq!(yaml, Some("title: x\n"));
        assert_eq!(body, "body\n");
    }

    #[test]
    fn split_crlf() {
        let (yaml, body) = split("---\r\ntitle: x\r\n---\r\n\r\nbody").unwrap();
        assert_eq!(yaml, Some("title: x\r\n"));
        assert_eq!(body, "body");
    }

    #[test]
    fn unterminated_is_an_error() {
        assert!(matches!(
            split("---\ntitle: x\nbody"),
            Err(CodecError::UnterminatedFrontMatter { .. })
        ));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result: CodecResult<(Meta, String)> = parse("---\ntitle: [unclosed\n---\n");
        assert!(matches!(
            result,
            Err(CodecError::InvalidFrontMatter { .. })
        ));
    }

    #[test]
    fn empty_preamble_gives_default() {
        let (meta, body): (Meta, String) = parse("---\n---\ntext").unwrap();
        assert_eq!(meta, Meta::default());
        assert_eq!(body, "text");
    }

    #[test]
    fn render_then_parse() {
        let meta = Meta {
            title: Some("Plan".into()),
            count: Some(3),
        };
        let text = render(&meta, "# Plan\n").unwrap();
        assert!(text.starts_with("---\ntitle: Plan\n"));
        let (parsed, body): (Meta, String) = parse(&text).unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(body, "# Plan\n");
    }

    #[test]
    fn empty_metadata_renders_body_only() {
        let text = render(&Meta::default(), "hello").unwrap();
        assert_eq!(text, "hello");
    }
}
