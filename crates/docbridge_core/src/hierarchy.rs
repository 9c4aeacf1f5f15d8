//! Hierarchy planning.
//!
//! Turns a flat node listing into a folder layout. A node with children
//! becomes a container directory holding an index document named after it;
//! a node without children becomes a single document:
//!
//! ```text
//! from-remote/
//! ├─ Project/
//! │  ├─ _Project.md     # composite node
//! │  └─ Task.md         # leaf child
//! └─ Notes.md           # leaf root
//! ```
//!
//! Nodes whose parent is not in the listing are promoted to roots. Nodes
//! that cannot be reached from any root (parent cycles) are reported and
//! left out of the plan. Databases are always containers.
//!
//! Planning can take the paths documents already hold ([`PathClaims`]): a
//! node stays in the slot it holds, and no node is given a path held by a
//! different node.

use crate::config::VaultConfig;
use crate::document::{file_stem, is_index_path, join, parent_dir, NodeType};
use crate::node::{Node, NodeId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Longest sanitized name, in characters.
const MAX_NAME_CHARS: usize = 100;

/// Problems found while planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// The node sits on a parent cycle and is not reachable from a root.
    #[error("parent cycle at node {id}")]
    Cycle {
        /// Offending node.
        id: NodeId,
    },
}

/// Chooses the top-level subtree for a root node.
pub trait Router {
    /// Subtree directory name for `root`.
    fn subtree(&self, root: &Node) -> String;
}

impl<F> Router for F
where
    F: Fn(&Node) -> String,
{
    fn subtree(&self, root: &Node) -> String {
        self(root)
    }
}

/// Routes roots by their source property: roots naming the local author or
/// `collaboration` go to the collaboration subtree, everything else to the
/// pulled subtree.
#[derive(Debug, Clone)]
pub struct SourceRouter {
    pulled: String,
    collaboration: String,
    local_author: String,
}

impl SourceRouter {
    /// Builds a router from the vault layout.
    #[must_use]
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            pulled: config.pulled_dir.clone(),
            collaboration: config.collaboration_dir.clone(),
            local_author: config.local_author.to_lowercase(),
        }
    }
}

impl Router for SourceRouter {
    fn subtree(&self, root: &Node) -> String {
        match root.source() {
            Some(source)
                if source == "collaboration"
                    || (!self.local_author.is_empty() && source.contains(&self.local_author)) =>
            {
                self.collaboration.clone()
            }
            _ => self.pulled.clone(),
        }
    }
}

/// Document paths already held by known nodes.
///
/// Paths compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PathClaims {
    by_path: HashMap<String, NodeId>,
    by_id: HashMap<NodeId, String>,
}

impl PathClaims {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds claims from an id to path index.
    #[must_use]
    pub fn from_index(index: &HashMap<NodeId, String>) -> Self {
        let mut claims = Self::new();
        for (id, path) in index {
            claims.claim(id.clone(), path);
        }
        claims
    }

    /// Records that `id` holds `path`.
    pub fn claim(&mut self, id: NodeId, path: &str) {
        self.by_path.insert(path.to_lowercase(), id.clone());
        self.by_id.insert(id, path.to_string());
    }

    /// Path held by `id`.
    #[must_use]
    pub fn path_of(&self, id: &NodeId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    fn held_by_other(&self, path: &str, id: &NodeId) -> bool {
        self.by_path
            .get(&path.to_lowercase())
            .is_some_and(|holder| holder != id)
    }

    /// Name of the slot `id` holds directly inside `dir`, in either shape.
    fn held_name(&self, id: &NodeId, dir: &str) -> Option<&str> {
        let slot = slot_of(self.path_of(id)?);
        (parent_dir(slot) == dir).then(|| file_stem(slot))
    }
}

/// Slot a document occupies: `a/B/_B.md` and `a/B.md` are both `a/B`.
#[must_use]
pub fn slot_of(path: &str) -> &str {
    if is_index_path(path) {
        parent_dir(path)
    } else {
        path.strip_suffix(".md").unwrap_or(path)
    }
}

fn planned_path(dir: &str, name: &str, composite: bool) -> String {
    if composite {
        join(&join(dir, name), &format!("_{name}.md"))
    } else {
        join(dir, &format!("{name}.md"))
    }
}

/// One node's place in the local tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry<'a> {
    /// The node.
    pub node: &'a Node,
    /// Vault-relative document path.
    pub path: String,
    /// Container directory, for composite nodes.
    pub container: Option<String>,
    /// Depth below the root (roots are 0).
    pub level: usize,
    /// Leaf or container index.
    pub node_type: NodeType,
    /// Number of direct children.
    pub children_count: usize,
}

/// A materialization plan in depth-first pre-order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyPlan<'a> {
    /// Planned documents.
    pub entries: Vec<PlanEntry<'a>>,
    /// Nodes left out.
    pub errors: Vec<HierarchyError>,
}

struct Frame {
    idx: usize,
    dir: String,
    name: String,
    level: usize,
}

/// Builds the plan for `nodes` with no existing documents.
pub fn build_plan<'a, R: Router + ?Sized>(nodes: &'a [Node], router: &R) -> HierarchyPlan<'a> {
    build_plan_with_claims(nodes, router, &PathClaims::new())
}

/// Builds the plan for `nodes` around the paths in `claims`.
///
/// Duplicate ids keep their first occurrence. Traversal is iterative with a
/// visited set, so arbitrarily deep or malformed graphs cannot overflow the
/// stack.
pub fn build_plan_with_claims<'a, R: Router + ?Sized>(
    nodes: &'a [Node],
    router: &R,
    claims: &PathClaims,
) -> HierarchyPlan<'a> {
    let mut index: HashMap<&NodeId, usize> = HashMap::new();
    let mut unique = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        if index.contains_key(&node.id) {
            warn!(id = %node.id, "duplicate node id in listing, keeping first");
            continue;
        }
        index.insert(&node.id, idx);
        unique.push(idx);
    }

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for &idx in &unique {
        match nodes[idx].parent.as_ref().and_then(|p| index.get(p)) {
            Some(&parent) => children.entry(parent).or_default().push(idx),
            None => roots.push(idx),
        }
    }

    let mut root_groups: Vec<(String, Vec<usize>)> = Vec::new();
    for &idx in &roots {
        let subtree = router.subtree(&nodes[idx]);
        match root_groups.iter_mut().find(|(s, _)| *s == subtree) {
            Some((_, group)) => group.push(idx),
            None => root_groups.push((subtree, vec![idx])),
        }
    }

    let composite = |idx: usize| nodes[idx].is_database() || children.contains_key(&idx);

    let mut stack = Vec::new();
    for (subtree, group) in root_groups.iter().rev() {
        let names = sibling_names(nodes, group, subtree, &composite, claims);
        for (&idx, name) in group.iter().zip(names).rev() {
            stack.push(Frame {
                idx,
                dir: subtree.clone(),
                name,
                level: 0,
            });
        }
    }

    let mut plan = HierarchyPlan::default();
    let mut visited = HashSet::new();

    while let Some(frame) = stack.pop() {
        let node = &nodes[frame.idx];
        if !visited.insert(frame.idx) {
            plan.errors.push(HierarchyError::Cycle {
                id: node.id.clone(),
            });
            continue;
        }

        let kids = children.get(&frame.idx).map(Vec::as_slice).unwrap_or(&[]);
        if !composite(frame.idx) {
            plan.entries.push(PlanEntry {
                node,
                path: planned_path(&frame.dir, &frame.name, false),
                container: None,
                level: frame.level,
                node_type: NodeType::Leaf,
                children_count: 0,
            });
            continue;
        }

        let container = join(&frame.dir, &frame.name);
        plan.entries.push(PlanEntry {
            node,
            path: planned_path(&frame.dir, &frame.name, true),
            container: Some(container.clone()),
            level: frame.level,
            node_type: NodeType::ContainerIndex,
            children_count: kids.len(),
        });

        let names = sibling_names(nodes, kids, &container, &composite, claims);
        for (&idx, name) in kids.iter().zip(names).rev() {
            stack.push(Frame {
                idx,
                dir: container.clone(),
                name,
                level: frame.level + 1,
            });
        }
    }

    for &idx in &unique {
        if !visited.contains(&idx) {
            warn!(id = %nodes[idx].id, "node unreachable from any root, skipping");
            plan.errors.push(HierarchyError::Cycle {
                id: nodes[idx].id.clone(),
            });
        }
    }

    plan
}

/// Names for one sibling group in `dir`, in the group's order.
///
/// A node keeps the slot it already holds in `dir`. The others are named
/// after their titles; siblings whose names collide (case-insensitively) are
/// ordered by id, the first keeps the bare name and the rest get `_<id8>`,
/// then the full id. A name whose path is held by another node is skipped
/// the same way.
fn sibling_names(
    nodes: &[Node],
    group: &[usize],
    dir: &str,
    composite: &dyn Fn(usize) -> bool,
    claims: &PathClaims,
) -> Vec<String> {
    let mut names: Vec<Option<String>> = vec![None; group.len()];
    let mut taken: HashSet<String> = HashSet::new();

    for (pos, &idx) in group.iter().enumerate() {
        let id = &nodes[idx].id;
        let Some(held) = claims.held_name(id, dir) else {
            continue;
        };
        let path = planned_path(dir, held, composite(idx));
        if !claims.held_by_other(&path, id) && taken.insert(held.to_lowercase()) {
            names[pos] = Some(held.to_string());
        }
    }

    let bases: Vec<String> = group
        .iter()
        .map(|&idx| sanitize_name(&nodes[idx].title, &nodes[idx].id))
        .collect();
    let mut open: Vec<usize> = (0..group.len()).filter(|&pos| names[pos].is_none()).collect();
    open.sort_by(|&a, &b| {
        bases[a]
            .to_lowercase()
            .cmp(&bases[b].to_lowercase())
            .then_with(|| nodes[group[a]].id.cmp(&nodes[group[b]].id))
    });

    for pos in open {
        let idx = group[pos];
        let id = &nodes[idx].id;
        let base = &bases[pos];
        let candidates = [
            base.clone(),
            format!("{base}_{}", id.short()),
            format!("{base}_{}", id.as_str()),
        ];
        let name = candidates
            .iter()
            .find(|name| {
                !taken.contains(&name.to_lowercase())
                    && !claims.held_by_other(&planned_path(dir, name, composite(idx)), id)
            })
            .unwrap_or(&candidates[2])
            .clone();
        taken.insert(name.to_lowercase());
        names[pos] = Some(name);
    }

    names.into_iter().map(Option::unwrap_or_default).collect()
}

/// Turns a title into a safe file name.
///
/// Forbidden characters become `_`, runs of `_` and whitespace collapse to
/// one `_`, anything other than word characters and `-` is dropped, the
/// result is capped at 100 characters and stripped of `_` at both ends.
/// An empty result falls back to `Page_<id8>`.
#[must_use]
pub fn sanitize_name(title: &str, id: &NodeId) -> String {
    let mut collapsed = String::with_capacity(title.len());
    let mut in_run = false;
    for c in title.chars() {
        let c = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            '_'
        } else {
            c
        };
        if c == '_' || c.is_whitespace() {
            if !in_run {
                collapsed.push('_');
                in_run = true;
            }
            continue;
        }
        in_run = false;
        collapsed.push(c);
    }

    let kept: String = collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_NAME_CHARS)
        .collect();
    let name = kept.trim_matches('_');

    if name.is_empty() {
        format!("Page_{}", id.short())
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyValue;

    fn pulled(_: &Node) -> String {
        "from-remote".to_string()
    }

    fn paths(plan: &HierarchyPlan<'_>) -> Vec<String> {
        plan.entries.iter().map(|e| e.path.clone()).collect()
    }

    #[test]
    fn composite_and_leaf() {
        let nodes = vec![
            Node::page("A", "A"),
            Node::page("B", "B").with_parent("A"),
        ];
        let plan = build_plan(&nodes, &pulled);
        assert!(plan.errors.is_empty());
        assert_eq!(paths(&plan), vec!["from-remote/A/_A.md", "from-remote/A/B.md"]);

        let a = &plan.entries[0];
        assert_eq!(a.node.id, NodeId::new("A"));
        assert_eq!(a.node_type, NodeType::ContainerIndex);
        assert_eq!(a.container.as_deref(), Some("from-remote/A"));
        assert_eq!(a.children_count, 1);
        assert_eq!(a.level, 0);

        let b = &plan.entries[1];
        assert_eq!(b.node_type, NodeType::Leaf);
        assert_eq!(b.level, 1);
    }

    #[test]
    fn pre_order_deep_tree() {
        let nodes = vec![
            Node::page("c", "C").with_parent("b"),
            Node::page("a", "A"),
            Node::page("b", "B").with_parent("a"),
            Node::page("d", "D").with_parent("a"),
        ];
        let plan = build_plan(&nodes, &pulled);
        assert_eq!(
            paths(&plan),
            vec![
                "from-remote/A/_A.md",
                "from-remote/A/B/_B.md",
                "from-remote/A/B/C.md",
                "from-remote/A/D.md",
            ]
        );
    }

    #[test]
    fn orphans_become_roots() {
        let nodes = vec![Node::page("x", "Orphan").with_parent("missing")];
        let plan = build_plan(&nodes, &pulled);
        assert_eq!(paths(&plan), vec!["from-remote/Orphan.md"]);
        assert_eq!(plan.entries[0].level, 0);
    }

    #[test]
    fn cycles_are_reported_not_materialized() {
        let nodes = vec![
            Node::page("root", "Root"),
            Node::page("p", "P").with_parent("q"),
            Node::page("q", "Q").with_parent("p"),
            Node::page("s", "Self").with_parent("s"),
        ];
        let plan = build_plan(&nodes, &pulled);
        assert_eq!(paths(&plan), vec!["from-remote/Root.md"]);
        let ids: HashSet<NodeId> = plan
            .errors
            .iter()
            .map(|HierarchyError::Cycle { id }| id.clone())
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&NodeId::new("s")));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let nodes = vec![Node::page("a", "First"), Node::page("a", "Second")];
        let plan = build_plan(&nodes, &pulled);
        assert_eq!(paths(&plan), vec!["from-remote/First.md"]);
    }

    #[test]
    fn sibling_collisions_get_id_suffix() {
        let nodes = vec![
            Node::page("bbbbbbbb22", "Meeting: Notes"),
            Node::page("aaaaaaaa11", "Meeting Notes"),
            Node::page("cccccccc33", "meeting notes"),
        ];
        let plan = build_plan(&nodes, &pulled);
        let mut got = paths(&plan);
        got.sort();
        assert_eq!(
            got,
            vec![
                "from-remote/Meeting_Notes.md",
                "from-remote/Meeting_Notes_bbbbbbbb.md",
                "from-remote/meeting_notes_cccccccc.md",
            ]
        );
        // The lowest id keeps the bare name.
        let bare = plan
            .entries
            .iter()
            .find(|e| e.path == "from-remote/Meeting_Notes.md")
            .unwrap();
        assert_eq!(bare.node.id, NodeId::new("aaaaaaaa11"));
    }

    #[test]
    fn held_paths_are_not_handed_to_other_nodes() {
        let nodes = vec![
            Node::page("bbbbbbbb22", "Notes"),
            Node::page("aaaaaaaa11", "Notes"),
        ];
        let mut claims = PathClaims::new();
        claims.claim(NodeId::new("bbbbbbbb22"), "from-remote/Notes.md");

        let plan = build_plan_with_claims(&nodes, &pulled, &claims);
        let path_of = |id: &str| {
            plan.entries
                .iter()
                .find(|e| e.node.id == NodeId::new(id))
                .map(|e| e.path.clone())
                .unwrap()
        };
        assert_eq!(path_of("bbbbbbbb22"), "from-remote/Notes.md");
        assert_eq!(path_of("aaaaaaaa11"), "from-remote/Notes_aaaaaaaa.md");
    }

    #[test]
    fn held_slot_survives_shape_change_and_rename() {
        let nodes = vec![
            Node::page("a", "Renamed"),
            Node::page("b", "B").with_parent("a"),
        ];
        let mut claims = PathClaims::new();
        claims.claim(NodeId::new("a"), "from-remote/Old.md");

        let plan = build_plan_with_claims(&nodes, &pulled, &claims);
        assert_eq!(paths(&plan), vec!["from-remote/Old/_Old.md", "from-remote/Old/B.md"]);
        assert_eq!(plan.entries[0].container.as_deref(), Some("from-remote/Old"));
    }

    #[test]
    fn slots_ignore_shape() {
        assert_eq!(slot_of("from-remote/A/_A.md"), "from-remote/A");
        assert_eq!(slot_of("from-remote/A.md"), "from-remote/A");
        assert_eq!(slot_of("from-remote/A/B.md"), "from-remote/A/B");
    }

    #[test]
    fn databases_are_containers() {
        let nodes = vec![Node::database("db", "Tasks"), Node::page("p", "Page")];
        let plan = build_plan(&nodes, &pulled);
        assert_eq!(paths(&plan), vec!["from-remote/Tasks/_Tasks.md", "from-remote/Page.md"]);
        assert_eq!(plan.entries[0].node_type, NodeType::ContainerIndex);
        assert_eq!(plan.entries[0].children_count, 0);
    }

    #[test]
    fn sanitize_rules() {
        let id = NodeId::new("0123456789abcdef");
        assert_eq!(sanitize_name("Plan: Q1/Q2", &id), "Plan_Q1_Q2");
        assert_eq!(sanitize_name("  lots   of   space ", &id), "lots_of_space");
        assert_eq!(sanitize_name("🚀 Launch!", &id), "Launch");
        assert_eq!(sanitize_name("a-b_c", &id), "a-b_c");
        assert_eq!(sanitize_name("???", &id), "Page_01234567");
        assert_eq!(sanitize_name("", &id), "Page_01234567");
        assert_eq!(sanitize_name(&"x".repeat(150), &id).len(), 100);
    }

    #[test]
    fn router_sends_collaboration_roots_elsewhere() {
        let config = VaultConfig::new("/v").with_local_author("claude");
        let router = SourceRouter::from_config(&config);
        let nodes = vec![
            Node::page("a", "Shared")
                .with_property("Source", PropertyValue::Select("Claude".into())),
            Node::page("b", "Child").with_parent("a"),
            Node::page("c", "Plain"),
        ];
        let plan = build_plan(&nodes, &router);
        assert_eq!(
            paths(&plan),
            vec![
                "collaboration/Shared/_Shared.md",
                "collaboration/Shared/Child.md",
                "from-remote/Plain.md",
            ]
        );
    }
}
