//! HTTP remote store.
//!
//! [`HttpRemote`] speaks a Notion-compatible page/block REST API. The
//! actual HTTP client is abstracted behind [`HttpClient`] so the adapter can
//! be driven by reqwest in the binary and by a scripted client in tests.

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{
    collect_pages, record_path, CreateNode, CreateParent, NodeFilter, Page, RemoteStore,
    LOCAL_PATH_PROPERTY,
};
use crate::wire::{self, RawList, MAX_BLOCKS_PER_REQUEST};
use docbridge_codec::Block;
use docbridge_core::{Node, NodeId, Properties, PropertyValue};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations attach authentication and version headers and send
/// JSON bodies. A transport failure (no response at all) is an `Err`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<HttpResponse, String>;
}

#[derive(Debug, Clone)]
enum RecordLookup {
    Unresolved,
    Resolved(Option<NodeId>),
}

/// Remote store backed by the page/block REST API.
pub struct HttpRemote<C: HttpClient> {
    config: RemoteConfig,
    client: C,
    page_size: u32,
    records: Mutex<RecordLookup>,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Largest page size the API accepts.
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Creates an adapter.
    pub fn new(config: RemoteConfig, client: C) -> Self {
        let records = match &config.record_database {
            Some(id) => RecordLookup::Resolved(Some(id.clone())),
            None => RecordLookup::Unresolved,
        };
        Self {
            config,
            client,
            page_size: Self::MAX_PAGE_SIZE,
            records: Mutex::new(records),
        }
    }

    /// Sets the page size requested from listings.
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, Self::MAX_PAGE_SIZE);
        self
    }

    /// Page size requested from listings.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Searches for a database by title.
    pub fn find_database(&self, title: &str) -> SyncResult<Option<NodeId>> {
        let body = json!({
            "query": title,
            "filter": { "property": "object", "value": "database" },
            "page_size": self.page_size,
        });
        let list: RawList = self.request_json(Method::Post, "/search", Some(body))?;
        Ok(wire::find_database_id(&list.results, title))
    }

    /// The synchronization record collection, discovered by title on first
    /// use when not configured.
    pub fn record_database(&self) -> SyncResult<Option<NodeId>> {
        let mut lookup = self.records.lock();
        if let RecordLookup::Resolved(id) = &*lookup {
            return Ok(id.clone());
        }
        let found = self.find_database(&self.config.record_database_title)?;
        match &found {
            Some(id) => info!(database = %id, "found synchronization record database"),
            None => warn!(
                title = %self.config.record_database_title,
                "synchronization record database not found"
            ),
        }
        *lookup = RecordLookup::Resolved(found.clone());
        Ok(found)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn send(&self, method: Method, path: &str, body: Option<Value>) -> SyncResult<HttpResponse> {
        let body = body
            .map(|b| serde_json::to_vec(&b))
            .transpose()
            .map_err(|e| SyncError::Protocol(format!("cannot encode request: {e}")))?;
        debug!(method = method.as_str(), path, "remote request");
        self.client
            .send(method, &self.url(path), body)
            .map_err(SyncError::remote_retryable)
    }

    fn check(response: &HttpResponse) -> SyncResult<()> {
        if response.is_success() {
            return Ok(());
        }
        let message = wire::error_message(response.status, &response.body);
        Err(match response.status {
            401 | 403 => SyncError::Unauthorized(message),
            409 | 429 | 500..=599 => SyncError::remote_retryable(message),
            _ => SyncError::remote_fatal(message),
        })
    }

    fn request_json<T: for<'de> serde::Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SyncResult<T> {
        let response = self.send(method, path, body)?;
        Self::check(&response)?;
        wire::parse_json(&response.body)
    }

    fn children_page(&self, id: &NodeId, cursor: Option<&str>) -> SyncResult<RawList> {
        let mut path = format!("/blocks/{id}/children?page_size={}", self.page_size);
        if let Some(cursor) = cursor {
            path.push_str("&start_cursor=");
            path.push_str(cursor);
        }
        self.request_json(Method::Get, &path, None)
    }

    fn append_children(&self, id: &NodeId, children: &[Value]) -> SyncResult<()> {
        for chunk in children.chunks(MAX_BLOCKS_PER_REQUEST) {
            let _: Value = self.request_json(
                Method::Patch,
                &format!("/blocks/{id}/children"),
                Some(json!({ "children": chunk })),
            )?;
        }
        Ok(())
    }

    fn paged_body(&self, mut body: Value, cursor: Option<&str>) -> Value {
        body["page_size"] = json!(self.page_size);
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }
}

impl<C: HttpClient> RemoteStore for HttpRemote<C> {
    fn list_nodes(&self, filter: NodeFilter, cursor: Option<&str>) -> SyncResult<Page<Node>> {
        let records = self.record_database()?;
        let list: RawList = match filter {
            NodeFilter::SyncRecords => {
                let Some(db) = &records else {
                    return Ok(Page::last(Vec::new()));
                };
                let body = self.paged_body(json!({}), cursor);
                self.request_json(Method::Post, &format!("/databases/{db}/query"), Some(body))?
            }
            NodeFilter::All | NodeFilter::Pages => {
                let body = self.paged_body(
                    json!({ "filter": { "property": "object", "value": "page" } }),
                    cursor,
                );
                self.request_json(Method::Post, "/search", Some(body))?
            }
            NodeFilter::Databases => {
                let body = self.paged_body(
                    json!({ "filter": { "property": "object", "value": "database" } }),
                    cursor,
                );
                let list: RawList = self.request_json(Method::Post, "/search", Some(body))?;
                let next_cursor = list.cursor();
                let items = wire::decode_databases(list.results, records.as_ref());
                return Ok(Page { items, next_cursor });
            }
        };
        let next_cursor = list.cursor();
        let items = wire::decode_nodes(list.results, records.as_ref())
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect();
        Ok(Page { items, next_cursor })
    }

    fn list_children(&self, id: &NodeId, cursor: Option<&str>) -> SyncResult<Page<Block>> {
        let list = self.children_page(id, cursor)?;
        Ok(Page {
            items: wire::decode_blocks(&list.results),
            next_cursor: list.cursor(),
        })
    }

    fn create_node(&self, request: &CreateNode) -> SyncResult<Node> {
        let mut properties = match &request.parent {
            CreateParent::Page(_) => Properties::new(),
            CreateParent::Records => request.properties.clone(),
        };
        if !properties.values().any(|v| matches!(v, PropertyValue::Title(_))) {
            properties.insert("title".into(), PropertyValue::Title(request.title.clone()));
        }

        let records = self.record_database()?;
        let parent = match &request.parent {
            CreateParent::Page(id) => json!({ "page_id": id.as_str() }),
            CreateParent::Records => {
                let db = records.as_ref().ok_or(SyncError::RecordsUnavailable)?;
                json!({ "database_id": db.as_str() })
            }
        };

        let children = wire::encode_blocks(&request.blocks);
        let split = children.len().min(MAX_BLOCKS_PER_REQUEST);
        let (first, rest) = children.split_at(split);
        let body = json!({
            "parent": parent,
            "properties": wire::encode_properties(&properties),
            "children": first,
        });
        let created: Value = self.request_json(Method::Post, "/pages", Some(body))?;
        let node = wire::decode_node(created, records.as_ref())?
            .ok_or_else(|| SyncError::Protocol("created object is not a live page".into()))?;
        self.append_children(&node.id, rest)?;
        Ok(node)
    }

    fn update_properties(&self, id: &NodeId, properties: &Properties) -> SyncResult<()> {
        let body = json!({ "properties": wire::encode_properties(properties) });
        let _: Value = self.request_json(Method::Patch, &format!("/pages/{id}"), Some(body))?;
        Ok(())
    }

    fn replace_blocks(&self, id: &NodeId, blocks: &[Block]) -> SyncResult<()> {
        let existing = collect_pages(|cursor| {
            let list = self.children_page(id, cursor)?;
            Ok(Page {
                next_cursor: list.cursor(),
                items: list.results,
            })
        })?;

        for block in &existing {
            let kind = block.get("type").and_then(Value::as_str).unwrap_or_default();
            // Child pages live on as nodes of their own.
            if matches!(kind, "child_page" | "child_database") {
                continue;
            }
            let Some(block_id) = block.get("id").and_then(Value::as_str) else {
                continue;
            };
            let response = self.send(Method::Delete, &format!("/blocks/{block_id}"), None)?;
            if response.status != 404 {
                Self::check(&response)?;
            }
        }

        self.append_children(id, &wire::encode_blocks(blocks))
    }

    fn get_node(&self, id: &NodeId) -> SyncResult<Option<Node>> {
        let response = self.send(Method::Get, &format!("/pages/{id}"), None)?;
        if response.status == 404 {
            return Ok(None);
        }
        Self::check(&response)?;
        let value: Value = wire::parse_json(&response.body)?;
        let records = self.record_database()?;
        wire::decode_node(value, records.as_ref())
    }

    fn find_record(&self, path: &str) -> SyncResult<Option<Node>> {
        let Some(db) = self.record_database()? else {
            return Ok(None);
        };
        let body = json!({
            "filter": { "property": LOCAL_PATH_PROPERTY, "rich_text": { "equals": path } },
            "page_size": 1,
        });
        let list: RawList =
            self.request_json(Method::Post, &format!("/databases/{db}/query"), Some(body))?;
        Ok(wire::decode_nodes(list.results, Some(&db))
            .into_iter()
            .find(|node| node.is_sync_record() && record_path(node) == Some(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        method: Method,
        url: String,
        body: Option<Value>,
    }

    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        sent: Mutex<Vec<Sent>>,
    }

    impl ScriptedClient {
        fn respond(&self, status: u16, body: Value) {
            self.responses
                .lock()
                .push_back(Ok(HttpResponse::new(status, body.to_string())));
        }

        fn fail(&self, message: &str) {
            self.responses.lock().push_back(Err(message.to_string()));
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }
    }

    impl HttpClient for &ScriptedClient {
        fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<HttpResponse, String> {
            self.sent.lock().push(Sent {
                method,
                url: url.to_string(),
                body: body.map(|b| serde_json::from_slice(&b).unwrap()),
            });
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(200, "{}")))
        }
    }

    fn remote(client: &ScriptedClient) -> HttpRemote<&ScriptedClient> {
        let config = RemoteConfig::new()
            .with_base_url("http://remote.test/v1")
            .with_token("t")
            .with_record_database("db");
        HttpRemote::new(config, client)
    }

    fn page(id: &str, title: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "parent": { "type": "workspace", "workspace": true },
            "properties": { "title": { "type": "title", "title": [{ "plain_text": title }] } }
        })
    }

    #[test]
    fn lists_pages_with_cursor() {
        let client = ScriptedClient::default();
        client.respond(200, json!({ "results": [page("a1", "A")], "has_more": true, "next_cursor": "c2" }));
        let remote = remote(&client);

        let first = remote.list_nodes(NodeFilter::Pages, None).unwrap();
        assert_eq!(first.items[0].title, "A");
        assert_eq!(first.next_cursor.as_deref(), Some("c2"));

        client.respond(200, json!({ "results": [], "has_more": false, "next_cursor": null }));
        let second = remote.list_nodes(NodeFilter::Pages, Some("c2")).unwrap();
        assert!(second.next_cursor.is_none());

        let sent = client.sent();
        assert_eq!(sent[0].url, "http://remote.test/v1/search");
        assert_eq!(sent[1].body.as_ref().unwrap()["start_cursor"], "c2");
    }

    #[test]
    fn status_mapping() {
        let client = ScriptedClient::default();
        let remote = remote(&client);
        let id = NodeId::new("a1");

        client.respond(404, json!({ "code": "object_not_found", "message": "gone" }));
        assert!(remote.get_node(&id).unwrap().is_none());

        client.respond(401, json!({ "code": "unauthorized", "message": "bad token" }));
        assert!(matches!(remote.get_node(&id), Err(SyncError::Unauthorized(_))));

        client.respond(429, json!({ "code": "rate_limited", "message": "slow down" }));
        assert!(remote.get_node(&id).unwrap_err().is_retryable());

        client.respond(400, json!({ "code": "validation_error", "message": "no" }));
        assert!(!remote.get_node(&id).unwrap_err().is_retryable());

        client.fail("connection reset");
        assert!(remote.get_node(&id).unwrap_err().is_retryable());
    }

    #[test]
    fn create_record_chunks_children() {
        let client = ScriptedClient::default();
        let mut created = page("new1", "Doc");
        created["parent"] = json!({ "type": "database_id", "database_id": "db" });
        client.respond(200, created);
        let remote = remote(&client);

        let blocks: Vec<Block> = (0..150).map(|i| Block::paragraph(format!("p{i}"))).collect();
        let node = remote
            .create_node(&CreateNode {
                parent: CreateParent::Records,
                title: "Doc".into(),
                blocks,
                properties: Properties::new(),
            })
            .unwrap();
        assert!(node.is_sync_record());

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        let create = sent[0].body.as_ref().unwrap();
        assert_eq!(create["parent"]["database_id"], "db");
        assert_eq!(create["properties"]["title"]["title"][0]["text"]["content"], "Doc");
        assert_eq!(create["children"].as_array().unwrap().len(), 100);
        assert_eq!(sent[1].method, Method::Patch);
        assert_eq!(sent[1].url, "http://remote.test/v1/blocks/new1/children");
        assert_eq!(sent[1].body.as_ref().unwrap()["children"].as_array().unwrap().len(), 50);
    }

    #[test]
    fn replace_blocks_keeps_child_pages() {
        let client = ScriptedClient::default();
        client.respond(
            200,
            json!({ "results": [
                { "id": "b1", "type": "paragraph", "paragraph": { "rich_text": [] } },
                { "id": "b2", "type": "child_page", "child_page": { "title": "Sub" } }
            ], "has_more": false }),
        );
        let remote = remote(&client);

        remote
            .replace_blocks(&NodeId::new("p1"), &[Block::paragraph("new")])
            .unwrap();
        let sent = client.sent();
        let deletes: Vec<&Sent> = sent.iter().filter(|s| s.method == Method::Delete).collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].url, "http://remote.test/v1/blocks/b1");
        assert_eq!(sent.last().unwrap().method, Method::Patch);
    }

    #[test]
    fn lists_databases_apart_from_records() {
        let client = ScriptedClient::default();
        client.respond(
            200,
            json!({ "results": [
                { "object": "database", "id": "db", "title": [{ "plain_text": "Obsidian Sync" }] },
                { "object": "database", "id": "tasks1", "title": [{ "plain_text": "Tasks" }] }
            ], "has_more": false }),
        );
        let remote = remote(&client).with_page_size(25);
        assert_eq!(remote.page_size(), 25);

        let listed = remote.list_nodes(NodeFilter::Databases, None).unwrap();
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].title, "Tasks");
        assert!(listed.items[0].is_database());

        let body = client.sent()[0].body.clone().unwrap();
        assert_eq!(body["filter"]["value"], "database");
        assert_eq!(body["page_size"], 25);
    }

    #[test]
    fn finds_record_by_local_path() {
        let client = ScriptedClient::default();
        let mut record = page("r1", "Note");
        record["parent"] = json!({ "type": "database_id", "database_id": "db" });
        record["properties"]["Local Path"] = json!({
            "type": "rich_text",
            "rich_text": [{ "plain_text": "Notes/Note.md" }]
        });
        client.respond(200, json!({ "results": [record], "has_more": false }));
        let remote = remote(&client);

        let found = remote.find_record("Notes/Note.md").unwrap().unwrap();
        assert_eq!(found.id, NodeId::new("r1"));

        let sent = client.sent();
        assert_eq!(sent[0].url, "http://remote.test/v1/databases/db/query");
        let filter = &sent[0].body.as_ref().unwrap()["filter"];
        assert_eq!(filter["property"], "Local Path");
        assert_eq!(filter["rich_text"]["equals"], "Notes/Note.md");

        client.respond(200, json!({ "results": [], "has_more": false }));
        assert!(remote.find_record("Other.md").unwrap().is_none());
    }

    #[test]
    fn discovers_record_database_once() {
        let client = ScriptedClient::default();
        client.respond(
            200,
            json!({ "results": [
                { "object": "database", "id": "db9", "title": [{ "plain_text": "Obsidian Sync" }] }
            ], "has_more": false }),
        );
        let config = RemoteConfig::new().with_base_url("http://remote.test/v1").with_token("t");
        let remote = HttpRemote::new(config, &client);

        assert_eq!(remote.record_database().unwrap(), Some(NodeId::new("db9")));
        assert_eq!(remote.record_database().unwrap(), Some(NodeId::new("db9")));
        assert_eq!(client.sent().len(), 1);
    }
}
