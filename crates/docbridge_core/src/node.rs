//! Remote nodes.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a remote node.
///
/// Identifiers are normalized on construction (trimmed, hyphens removed,
/// lowercased) so that the dashed and undashed spellings of the same id
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Creates a normalized node id.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized: String = raw
            .as_ref()
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self(normalized)
    }

    /// Returns the normalized id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used for name disambiguation.
    #[must_use]
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Returns true if the id is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An ordinary page in the remote hierarchy.
    Page,
    /// An entry in the synchronization-record collection.
    SyncRecord,
    /// A database object. Materialized as a container index.
    Database,
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Title property.
    Title(String),
    /// Rich text property, flattened to Markdown.
    Text(String),
    /// Single select.
    Select(String),
    /// Date property.
    Date(Timestamp),
    /// Checkbox property.
    Checkbox(bool),
}

impl PropertyValue {
    /// Textual content, if the property carries any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Title(s) | PropertyValue::Text(s) | PropertyValue::Select(s) => {
                Some(s)
            }
            PropertyValue::Date(_) | PropertyValue::Checkbox(_) => None,
        }
    }
}

/// Named node properties, ordered by name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Property names that describe where a node came from.
const SOURCE_PROPERTIES: [&str; 3] = ["source", "created_by", "origin"];

/// A remote entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id.
    pub id: NodeId,
    /// Parent page, if any.
    pub parent: Option<NodeId>,
    /// Node kind.
    pub kind: NodeKind,
    /// Display title.
    pub title: String,
    /// Typed properties.
    pub properties: Properties,
    /// Creation time.
    pub created: Option<Timestamp>,
    /// Last edit time.
    pub last_edited: Option<Timestamp>,
    /// Description text, set for databases.
    pub description: Option<String>,
}

impl Node {
    /// Creates a root page with no properties.
    pub fn page(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            kind: NodeKind::Page,
            title: title.into(),
            properties: Properties::new(),
            created: None,
            last_edited: None,
            description: None,
        }
    }

    /// Creates a root database.
    pub fn database(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self::page(id, title).with_kind(NodeKind::Database)
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the last edit time.
    #[must_use]
    pub fn with_last_edited(mut self, at: Timestamp) -> Self {
        self.last_edited = Some(at);
        self
    }

    /// Returns true for synchronization records.
    #[must_use]
    pub fn is_sync_record(&self) -> bool {
        self.kind == NodeKind::SyncRecord
    }

    /// Returns true for databases.
    #[must_use]
    pub fn is_database(&self) -> bool {
        self.kind == NodeKind::Database
    }

    /// The lowercased value of the first source-like property
    /// (`source`, `created_by` or `origin`, matched case-insensitively).
    #[must_use]
    pub fn source(&self) -> Option<String> {
        self.properties.iter().find_map(|(name, value)| {
            let name = name.to_lowercase();
            if SOURCE_PROPERTIES.contains(&name.as_str()) {
                value
                    .as_text()
                    .filter(|s| !s.is_empty())
                    .map(str::to_lowercase)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_normalize() {
        let dashed = NodeId::new("1A2B3C4D-0000-1111-2222-333344445555");
        let plain = NodeId::new("1a2b3c4d000011112222333344445555");
        assert_eq!(dashed, plain);
        assert_eq!(dashed.short(), "1a2b3c4d");
        assert_eq!(NodeId::new("ab").short(), "ab");
    }

    #[test]
    fn id_serde_normalizes() {
        let id: NodeId = serde_json::from_str("\"AB-CD\"").unwrap();
        assert_eq!(id.as_str(), "abcd");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abcd\"");
    }

    #[test]
    fn source_property_lookup() {
        let node = Node::page("n1", "Plan")
            .with_property("Source", PropertyValue::Select("Collaboration".into()));
        assert_eq!(node.source().as_deref(), Some("collaboration"));

        let plain = Node::page("n2", "Other")
            .with_property("Tags", PropertyValue::Select("x".into()));
        assert!(plain.source().is_none());
    }
}
