//! Remote store abstraction.
//!
//! The engine talks to the remote document store only through
//! [`RemoteStore`]. Listings are paginated with opaque cursors; the
//! [`collect_pages`] helper drains them.

use crate::error::{SyncError, SyncResult};
use docbridge_codec::Block;
use docbridge_core::{Node, NodeId, NodeKind, Properties, PropertyValue, Timestamp};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Record property holding the vault-relative path of its document.
pub const LOCAL_PATH_PROPERTY: &str = "Local Path";

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page, if any.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Which nodes a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFilter {
    /// Every node.
    All,
    /// Ordinary pages only.
    Pages,
    /// Synchronization records only.
    SyncRecords,
    /// Databases, except the synchronization record collection.
    Databases,
}

impl NodeFilter {
    /// Returns true if `node` passes the filter.
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::Pages => node.kind == NodeKind::Page,
            NodeFilter::SyncRecords => node.is_sync_record(),
            NodeFilter::Databases => node.is_database(),
        }
    }
}

/// Where a new node is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateParent {
    /// As a child page of an existing node.
    Page(NodeId),
    /// As a synchronization record.
    Records,
}

/// Request to create a node.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateNode {
    /// Parent of the new node.
    pub parent: CreateParent,
    /// Node title.
    pub title: String,
    /// Initial content.
    pub blocks: Vec<Block>,
    /// Initial properties. Ignored for child pages.
    pub properties: Properties,
}

/// A remote document store.
pub trait RemoteStore: Send + Sync {
    /// Lists one page of nodes.
    fn list_nodes(&self, filter: NodeFilter, cursor: Option<&str>) -> SyncResult<Page<Node>>;

    /// Lists one page of a node's content blocks.
    fn list_children(&self, id: &NodeId, cursor: Option<&str>) -> SyncResult<Page<Block>>;

    /// Creates a node and returns it with its assigned id.
    fn create_node(&self, request: &CreateNode) -> SyncResult<Node>;

    /// Updates properties of a node.
    fn update_properties(&self, id: &NodeId, properties: &Properties) -> SyncResult<()>;

    /// Replaces all content blocks of a node.
    fn replace_blocks(&self, id: &NodeId, blocks: &[Block]) -> SyncResult<()>;

    /// Fetches a node, or `None` if it does not exist.
    fn get_node(&self, id: &NodeId) -> SyncResult<Option<Node>>;

    /// Finds the synchronization record whose local path property equals
    /// `path`.
    fn find_record(&self, path: &str) -> SyncResult<Option<Node>> {
        let records = collect_pages(|cursor| self.list_nodes(NodeFilter::SyncRecords, cursor))?;
        Ok(records.into_iter().find(|node| record_path(node) == Some(path)))
    }
}

/// Local path a synchronization record was written for.
pub fn record_path(node: &Node) -> Option<&str> {
    node.properties
        .get(LOCAL_PATH_PROPERTY)
        .and_then(PropertyValue::as_text)
}

/// Drains a paginated listing.
///
/// Fails if the remote hands back a cursor it already returned.
pub fn collect_pages<T>(
    mut fetch: impl FnMut(Option<&str>) -> SyncResult<Page<T>>,
) -> SyncResult<Vec<T>> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();
    loop {
        let page = fetch(cursor.as_deref())?;
        items.extend(page.items);
        match page.next_cursor {
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(SyncError::Protocol(format!("repeated cursor {next}")));
                }
                cursor = Some(next);
            }
            None => return Ok(items),
        }
    }
}

/// Lists every node passing `filter`.
pub fn list_all_nodes<R: RemoteStore + ?Sized>(remote: &R, filter: NodeFilter) -> SyncResult<Vec<Node>> {
    collect_pages(|cursor| remote.list_nodes(filter, cursor))
}

/// Lists every content block of a node.
pub fn list_all_blocks<R: RemoteStore + ?Sized>(remote: &R, id: &NodeId) -> SyncResult<Vec<Block>> {
    collect_pages(|cursor| remote.list_children(id, cursor))
}

/// A mutating call recorded by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// A node was created.
    Create {
        /// New node id.
        id: NodeId,
        /// Requested parent.
        parent: CreateParent,
    },
    /// Properties were updated.
    UpdateProperties(NodeId),
    /// Content was replaced.
    ReplaceBlocks(NodeId),
}

impl RemoteCall {
    /// Node the call targeted.
    pub fn target(&self) -> &NodeId {
        match self {
            RemoteCall::Create { id, .. } => id,
            RemoteCall::UpdateProperties(id) | RemoteCall::ReplaceBlocks(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    remaining: u32,
    retryable: bool,
}

/// An in-memory remote store.
///
/// Records every mutating call and can be told to fail mutations.
#[derive(Debug)]
pub struct MemoryRemote {
    nodes: RwLock<Vec<Node>>,
    blocks: RwLock<HashMap<NodeId, Vec<Block>>>,
    calls: RwLock<Vec<RemoteCall>>,
    failure: RwLock<Option<InjectedFailure>>,
    page_size: usize,
    records_available: AtomicBool,
}

impl MemoryRemote {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            blocks: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            page_size: 100,
            records_available: AtomicBool::new(true),
        }
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Adds or replaces a node and its content.
    pub fn insert(&self, node: Node, blocks: Vec<Block>) {
        let id = node.id.clone();
        let mut nodes = self.nodes.write();
        match nodes.iter_mut().find(|n| n.id == id) {
            Some(existing) => *existing = node,
            None => nodes.push(node),
        }
        self.blocks.write().insert(id, blocks);
    }

    /// Replaces a node's content and bumps its last-edit time, as a remote
    /// user edit would.
    pub fn edit(&self, id: &NodeId, blocks: Vec<Block>, at: Timestamp) {
        if let Some(node) = self.nodes.write().iter_mut().find(|n| &n.id == id) {
            node.last_edited = Some(at);
        }
        self.blocks.write().insert(id.clone(), blocks);
    }

    /// Fetches a node without recording anything.
    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.read().iter().find(|n| &n.id == id).cloned()
    }

    /// Current content of a node.
    pub fn blocks(&self, id: &NodeId) -> Vec<Block> {
        self.blocks.read().get(id).cloned().unwrap_or_default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Every mutating call so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.read().clone()
    }

    /// Mutating calls that targeted `id`.
    pub fn mutating_calls_for(&self, id: &NodeId) -> usize {
        self.calls.read().iter().filter(|c| c.target() == id).count()
    }

    /// Makes the next `count` mutating calls fail.
    pub fn fail_mutations(&self, count: u32, retryable: bool) {
        *self.failure.write() = Some(InjectedFailure {
            remaining: count,
            retryable,
        });
    }

    /// Enables or disables the synchronization record collection.
    pub fn set_records_available(&self, available: bool) {
        self.records_available.store(available, Ordering::SeqCst);
    }

    fn injected_failure(&self) -> SyncResult<()> {
        let mut failure = self.failure.write();
        let Some(current) = failure.as_mut() else {
            return Ok(());
        };
        if current.remaining == 0 {
            *failure = None;
            return Ok(());
        }
        current.remaining -= 1;
        let retryable = current.retryable;
        if current.remaining == 0 {
            *failure = None;
        }
        Err(SyncError::Remote {
            message: "injected failure".into(),
            retryable,
        })
    }

    fn paginate<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> SyncResult<Page<T>> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| SyncError::Protocol(format!("invalid cursor {c}")))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let slice = items.get(start..end).unwrap_or_default().to_vec();
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: slice,
            next_cursor,
        })
    }

    fn missing(id: &NodeId) -> SyncError {
        SyncError::remote_fatal(format!("node {id} not found"))
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemote {
    fn list_nodes(&self, filter: NodeFilter, cursor: Option<&str>) -> SyncResult<Page<Node>> {
        let nodes: Vec<Node> = self
            .nodes
            .read()
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        self.paginate(&nodes, cursor)
    }

    fn list_children(&self, id: &NodeId, cursor: Option<&str>) -> SyncResult<Page<Block>> {
        let blocks = self.blocks(id);
        self.paginate(&blocks, cursor)
    }

    fn create_node(&self, request: &CreateNode) -> SyncResult<Node> {
        self.injected_failure()?;
        let id = NodeId::new(uuid::Uuid::new_v4().simple().to_string());
        let now = Timestamp::now();
        let mut node = Node::page(id.clone(), request.title.clone());
        node.created = Some(now);
        node.last_edited = Some(now);

        match &request.parent {
            CreateParent::Page(parent) => {
                if self.node(parent).is_none() {
                    return Err(Self::missing(parent));
                }
                node.parent = Some(parent.clone());
            }
            CreateParent::Records => {
                if !self.records_available.load(Ordering::SeqCst) {
                    return Err(SyncError::RecordsUnavailable);
                }
                node.kind = NodeKind::SyncRecord;
                node.properties = request.properties.clone();
            }
        }

        self.nodes.write().push(node.clone());
        self.blocks.write().insert(id.clone(), request.blocks.clone());
        self.calls.write().push(RemoteCall::Create {
            id,
            parent: request.parent.clone(),
        });
        Ok(node)
    }

    fn update_properties(&self, id: &NodeId, properties: &Properties) -> SyncResult<()> {
        self.injected_failure()?;
        {
            let mut nodes = self.nodes.write();
            let node = nodes
                .iter_mut()
                .find(|n| &n.id == id)
                .ok_or_else(|| Self::missing(id))?;
            for (name, value) in properties {
                if let PropertyValue::Title(title) = value {
                    node.title = title.clone();
                }
                node.properties.insert(name.clone(), value.clone());
            }
            node.last_edited = Some(Timestamp::now());
        }
        self.calls.write().push(RemoteCall::UpdateProperties(id.clone()));
        Ok(())
    }

    fn replace_blocks(&self, id: &NodeId, blocks: &[Block]) -> SyncResult<()> {
        self.injected_failure()?;
        if self.node(id).is_none() {
            return Err(Self::missing(id));
        }
        self.blocks.write().insert(id.clone(), blocks.to_vec());
        self.calls.write().push(RemoteCall::ReplaceBlocks(id.clone()));
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> SyncResult<Option<Node>> {
        Ok(self.node(id))
    }
}
