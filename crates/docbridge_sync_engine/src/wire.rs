//! JSON payloads of the page/block REST API.
//!
//! Raw payloads are decoded here into [`Node`] and [`Block`] values and
//! never leave this module untyped.

use crate::error::{SyncError, SyncResult};
use docbridge_codec::{spans_to_markdown, Block, HeadingLevel, Span};
use docbridge_core::{Node, NodeId, NodeKind, Properties, PropertyValue, Timestamp};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Longest text run the API accepts in one rich text object.
pub(crate) const MAX_TEXT_CHUNK: usize = 2000;

/// Most children the API accepts in one append call.
pub(crate) const MAX_BLOCKS_PER_REQUEST: usize = 100;

const DEFAULT_CALLOUT_ICON: &str = "💡";

#[derive(Debug, Deserialize)]
pub(crate) struct RawList {
    #[serde(default)]
    pub(crate) results: Vec<Value>,
    #[serde(default)]
    pub(crate) next_cursor: Option<String>,
    #[serde(default)]
    pub(crate) has_more: bool,
}

impl RawList {
    /// Cursor for the next page, if the listing says there is one.
    pub(crate) fn cursor(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    object: String,
    id: String,
    #[serde(default)]
    parent: RawParent,
    #[serde(default)]
    properties: BTreeMap<String, RawProperty>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    last_edited_time: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    in_trash: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawParent {
    PageId {
        page_id: String,
    },
    BlockId {
        block_id: String,
    },
    DatabaseId {
        database_id: String,
    },
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawProperty {
    Title {
        #[serde(default)]
        title: Vec<RawRichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RawRichText>,
    },
    Select {
        #[serde(default)]
        select: Option<RawOption>,
    },
    Status {
        #[serde(default)]
        status: Option<RawOption>,
    },
    Date {
        #[serde(default)]
        date: Option<RawDate>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRichText {
    #[serde(default)]
    plain_text: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    text: Option<RawTextContent>,
    #[serde(default)]
    annotations: RawAnnotations,
}

#[derive(Debug, Deserialize)]
struct RawTextContent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    link: Option<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnnotations {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    underline: bool,
    code: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBlockBody {
    rich_text: Vec<RawRichText>,
    language: Option<String>,
    checked: bool,
    icon: Option<RawIcon>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawIcon {
    Emoji {
        emoji: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    #[serde(default)]
    object: String,
    id: String,
    #[serde(default)]
    title: Vec<RawRichText>,
    #[serde(default)]
    description: Vec<RawRichText>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    last_edited_time: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    in_trash: bool,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl RawRichText {
    fn to_span(&self) -> Span {
        let (text, link) = match &self.text {
            Some(t) => (t.content.clone(), t.link.as_ref().map(|l| l.url.clone())),
            None => (self.plain_text.clone(), None),
        };
        Span {
            text,
            link: link.or_else(|| self.href.clone()),
            bold: self.annotations.bold,
            italic: self.annotations.italic,
            code: self.annotations.code,
            strikethrough: self.annotations.strikethrough,
            underline: self.annotations.underline,
        }
    }
}

fn plain_text(runs: &[RawRichText]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

fn markdown_text(runs: &[RawRichText]) -> String {
    let spans: Vec<Span> = runs.iter().map(RawRichText::to_span).collect();
    spans_to_markdown(&spans)
}

fn parse_time(raw: Option<&str>) -> Option<Timestamp> {
    raw.and_then(Timestamp::parse)
}

/// Parses a JSON body.
pub(crate) fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8]) -> SyncResult<T> {
    serde_json::from_slice(body).map_err(|e| SyncError::Protocol(format!("invalid payload: {e}")))
}

/// Decodes a page payload.
///
/// Returns `None` for non-page objects and for archived or trashed pages.
/// Pages whose parent is `records` become synchronization records.
pub(crate) fn decode_node(value: Value, records: Option<&NodeId>) -> SyncResult<Option<Node>> {
    let raw: RawPage =
        serde_json::from_value(value).map_err(|e| SyncError::Protocol(format!("invalid page: {e}")))?;
    if raw.object != "page" || raw.archived || raw.in_trash {
        return Ok(None);
    }

    let (parent, kind) = match raw.parent {
        RawParent::PageId { page_id } => (Some(NodeId::new(page_id)), NodeKind::Page),
        RawParent::BlockId { block_id } => (Some(NodeId::new(block_id)), NodeKind::Page),
        RawParent::DatabaseId { database_id } => {
            let database = NodeId::new(database_id);
            if records == Some(&database) {
                (None, NodeKind::SyncRecord)
            } else {
                (Some(database), NodeKind::Page)
            }
        }
        RawParent::Other => (None, NodeKind::Page),
    };

    let mut title = String::new();
    let mut properties = Properties::new();
    for (name, property) in raw.properties {
        let value = match property {
            RawProperty::Title { title: runs } => {
                title = plain_text(&runs);
                PropertyValue::Title(title.clone())
            }
            RawProperty::RichText { rich_text } => PropertyValue::Text(markdown_text(&rich_text)),
            RawProperty::Select { select: Some(o) } | RawProperty::Status { status: Some(o) } => {
                PropertyValue::Select(o.name)
            }
            RawProperty::Date { date: Some(d) } => match parse_time(d.start.as_deref()) {
                Some(at) => PropertyValue::Date(at),
                None => continue,
            },
            RawProperty::Checkbox { checkbox } => PropertyValue::Checkbox(checkbox),
            _ => continue,
        };
        properties.insert(name, value);
    }

    let title = title.trim();
    Ok(Some(Node {
        id: NodeId::new(raw.id),
        parent,
        kind,
        title: if title.is_empty() { "Untitled".to_string() } else { title.to_string() },
        properties,
        description: None,
        created: parse_time(raw.created_time.as_deref()),
        last_edited: parse_time(raw.last_edited_time.as_deref()),
    }))
}

/// Decodes every page in a listing, skipping entries that do not decode.
pub(crate) fn decode_nodes(results: Vec<Value>, records: Option<&NodeId>) -> Vec<Node> {
    results
        .into_iter()
        .filter_map(|value| match decode_node(value, records) {
            Ok(node) => node,
            Err(e) => {
                warn!(error = %e, "skipping undecodable page");
                None
            }
        })
        .collect()
}

/// Decodes a database payload.
///
/// Returns `None` for other objects, for archived or trashed databases and
/// for the synchronization record collection.
pub(crate) fn decode_database(value: Value, records: Option<&NodeId>) -> SyncResult<Option<Node>> {
    let raw: RawDatabase = serde_json::from_value(value)
        .map_err(|e| SyncError::Protocol(format!("invalid database: {e}")))?;
    let id = NodeId::new(&raw.id);
    if raw.object != "database" || raw.archived || raw.in_trash || records == Some(&id) {
        return Ok(None);
    }

    let title = plain_text(&raw.title).trim().to_string();
    let title = if title.is_empty() {
        format!("Database_{}", id.short())
    } else {
        title
    };
    let description = markdown_text(&raw.description);
    let mut node = Node::database(id, title);
    node.description = (!description.trim().is_empty()).then_some(description);
    node.created = parse_time(raw.created_time.as_deref());
    node.last_edited = parse_time(raw.last_edited_time.as_deref());
    Ok(Some(node))
}

/// Decodes every database in a listing, skipping entries that do not decode.
pub(crate) fn decode_databases(results: Vec<Value>, records: Option<&NodeId>) -> Vec<Node> {
    results
        .into_iter()
        .filter_map(|value| match decode_database(value, records) {
            Ok(node) => node,
            Err(e) => {
                warn!(error = %e, "skipping undecodable database");
                None
            }
        })
        .collect()
}

/// Decodes a block payload.
///
/// Returns `None` for blocks that are not body content (child pages and
/// child databases, which surface as nodes of their own).
pub(crate) fn decode_block(value: &Value) -> Option<Block> {
    let kind = value.get("type").and_then(Value::as_str)?;
    let body: RawBlockBody = value
        .get(kind)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let text = || markdown_text(&body.rich_text);

    let block = match kind {
        "heading_1" => Block::heading(HeadingLevel::H1, text()),
        "heading_2" => Block::heading(HeadingLevel::H2, text()),
        "heading_3" => Block::heading(HeadingLevel::H3, text()),
        "paragraph" => Block::Paragraph(text()),
        "bulleted_list_item" => Block::BulletedItem(text()),
        "numbered_list_item" => Block::NumberedItem(text()),
        "code" => {
            let language = match body.language.as_deref() {
                None | Some("") | Some("plain text") => "plain".to_string(),
                Some(other) => other.to_string(),
            };
            Block::code(language, plain_text(&body.rich_text))
        }
        "quote" => Block::Quote(text()),
        "divider" => Block::Divider,
        "to_do" => Block::todo(body.checked, text()),
        "toggle" => Block::Toggle(text()),
        "callout" => {
            let icon = match &body.icon {
                Some(RawIcon::Emoji { emoji }) => emoji.clone(),
                _ => DEFAULT_CALLOUT_ICON.to_string(),
            };
            Block::Callout { icon, text: text() }
        }
        "child_page" | "child_database" => return None,
        other => Block::Unsupported {
            kind: other.to_string(),
        },
    };
    Some(block)
}

/// Decodes the content blocks of a listing.
pub(crate) fn decode_blocks(results: &[Value]) -> Vec<Block> {
    results.iter().filter_map(decode_block).collect()
}

/// Finds a database with the given title in a search listing.
pub(crate) fn find_database_id(results: &[Value], title: &str) -> Option<NodeId> {
    results.iter().find_map(|value| {
        let raw: RawDatabase = serde_json::from_value(value.clone()).ok()?;
        plain_text(&raw.title)
            .trim()
            .eq_ignore_ascii_case(title.trim())
            .then(|| NodeId::new(raw.id))
    })
}

/// Extracts the error message from an error payload.
pub(crate) fn error_message(status: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<RawError>(body) {
        Ok(err) if !err.message.is_empty() => format!("{status} {}: {}", err.code, err.message),
        _ => format!("http status {status}"),
    }
}

/// Splits text into rich text objects no longer than the API limit.
pub(crate) fn rich_text(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return json!([]);
    }
    let runs: Vec<Value> = chars
        .chunks(MAX_TEXT_CHUNK)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect();
    Value::Array(runs)
}

/// Encodes a block for an append request.
///
/// Unsupported blocks have no outgoing form and yield `None`.
pub(crate) fn encode_block(block: &Block) -> Option<Value> {
    let kind = block.kind().to_string();
    let body = match block {
        Block::Heading { text, .. }
        | Block::Paragraph(text)
        | Block::BulletedItem(text)
        | Block::NumberedItem(text)
        | Block::Quote(text)
        | Block::Toggle(text) => json!({ "rich_text": rich_text(text) }),
        Block::Code { language, text } => {
            let language = if language == "plain" { "plain text" } else { language.as_str() };
            json!({ "rich_text": rich_text(text), "language": language })
        }
        Block::Divider => json!({}),
        Block::ToDo { checked, text } => json!({ "rich_text": rich_text(text), "checked": checked }),
        Block::Callout { icon, text } => json!({
            "rich_text": rich_text(text),
            "icon": { "type": "emoji", "emoji": icon },
        }),
        Block::Unsupported { .. } => return None,
    };
    let mut object = Map::new();
    object.insert("object".into(), json!("block"));
    object.insert("type".into(), json!(kind));
    object.insert(kind, body);
    Some(Value::Object(object))
}

/// Encodes blocks, dropping those without an outgoing form.
pub(crate) fn encode_blocks(blocks: &[Block]) -> Vec<Value> {
    blocks.iter().filter_map(encode_block).collect()
}

/// Encodes a property map for a create or update request.
pub(crate) fn encode_properties(properties: &Properties) -> Value {
    let mut out = Map::new();
    for (name, value) in properties {
        let encoded = match value {
            PropertyValue::Title(text) => json!({ "title": rich_text(text) }),
            PropertyValue::Text(text) => json!({ "rich_text": rich_text(text) }),
            PropertyValue::Select(name) => json!({ "select": { "name": name } }),
            PropertyValue::Date(at) => json!({ "date": { "start": at.to_rfc3339() } }),
            PropertyValue::Checkbox(value) => json!({ "checkbox": value }),
        };
        out.insert(name.clone(), encoded);
    }
    Value::Object(out)
}
