//! Integration tests for the sync engine against an in-memory remote.

use docbridge_codec::{body_to_blocks, Block};
use docbridge_core::{
    ChangeDetector, Node, NodeId, NodeKind, NodeType, PropertyValue, PushResult, SyncDirection,
    SyncStatus, Timestamp,
};
use docbridge_sync_engine::{
    CreateParent, MemoryRemote, RemoteCall, RetryConfig, SyncConfig, SyncEngine, SyncState,
};
use docbridge_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn config() -> SyncConfig {
    SyncConfig::new().with_retry(RetryConfig::no_retry())
}

fn engine(vault: &TestVault, remote: MemoryRemote) -> SyncEngine<MemoryRemote> {
    SyncEngine::new(config(), vault.open(), remote)
}

fn edited(day: u32) -> Timestamp {
    ts(&format!("2024-01-{day:02}T00:00:00Z"))
}

#[test]
fn parent_with_child_becomes_container_and_leaf() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("a", "A").with_last_edited(edited(1)),
        vec![Block::paragraph("root text")],
    );
    remote.insert(
        Node::page("b", "B").with_parent("a").with_last_edited(edited(1)),
        vec![Block::paragraph("leaf text")],
    );

    let engine = engine(&vault, remote);
    let report = engine.pull().unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(engine.state(), SyncState::Synced);

    let index = vault.read("from-remote/A/_A.md");
    assert_eq!(index.metadata.remote_id, Some(NodeId::new("a")));
    assert_eq!(index.metadata.children_count, Some(1));
    assert_eq!(index.body, "# A\n\nroot text\n");

    let leaf = vault.read("from-remote/A/B.md");
    assert_eq!(leaf.metadata.remote_id, Some(NodeId::new("b")));
    assert_eq!(leaf.metadata.parent_id, Some(NodeId::new("a")));
    assert_eq!(leaf.metadata.level, Some(1));
    assert_eq!(leaf.metadata.sync_direction, Some(SyncDirection::FromRemote));
}

#[test]
fn unlinked_local_document_becomes_record() {
    let vault = TestVault::new();
    vault.write_doc(
        &DocBuilder::new("from-local/X.md")
            .pending()
            .body("# X\n\nhello world\n")
            .build(),
    );

    let engine = engine(&vault, MemoryRemote::new());
    let result = engine.sync().unwrap();
    assert!(result.success);
    assert_eq!(result.push.as_ref().unwrap().created_records, 1);

    let doc = vault.read("from-local/X.md");
    let id = doc.metadata.remote_id.clone().expect("remote id adopted");
    assert_eq!(doc.metadata.sync_status, Some(SyncStatus::Synced));
    assert!(doc.metadata.synced_at.is_some());
    assert_eq!(doc.metadata.sync_direction, Some(SyncDirection::FromRemote));
    assert_eq!(doc.metadata.push_result, Some(PushResult::CreatedRecord));
    assert_eq!(doc.metadata.needs_sync, Some(false));

    let node = engine.remote().node(&id).unwrap();
    assert_eq!(node.kind, NodeKind::SyncRecord);
    assert_eq!(node.title, "X");
    assert_eq!(
        node.properties.get("Local Path"),
        Some(&PropertyValue::Text("from-local/X.md".into()))
    );
    assert_eq!(engine.remote().blocks(&id), vec![Block::paragraph("hello world")]);
}

#[test]
fn original_page_is_never_mutated() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("r", "Original"), vec![Block::paragraph("theirs")]);
    vault.write_doc(
        &DocBuilder::new("from-remote/Original.md")
            .remote_id("r")
            .pending()
            .body("# Original\n\nmine\n")
            .build(),
    );

    let engine = engine(&vault, remote);
    let report = engine.push().unwrap();
    assert_eq!(report.skipped_original, 1);

    let r = NodeId::new("r");
    assert_eq!(engine.remote().mutating_calls_for(&r), 0);
    assert!(engine.remote().calls().is_empty());
    assert_eq!(engine.remote().blocks(&r), vec![Block::paragraph("theirs")]);

    let doc = vault.read("from-remote/Original.md");
    assert_eq!(doc.metadata.sync_status, Some(SyncStatus::Synced));
    assert_eq!(doc.metadata.push_result, Some(PushResult::SkippedOriginal));
    assert_eq!(doc.body, "# Original\n\nmine\n");
}

#[test]
fn conflict_keeps_local_work_in_archive_and_live_document() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("p", "Plan").with_last_edited(edited(1)),
        vec![Block::paragraph("remote v1")],
    );
    let engine = engine(&vault, remote);
    engine.pull().unwrap();

    let mut local = vault.read("from-remote/Plan.md");
    local.metadata.created_by = Some("local".into());
    local.metadata.updated_at = Some(Timestamp::now());
    local.body = "local notes\n".into();
    vault.write_doc(&local);

    engine
        .remote()
        .edit(&NodeId::new("p"), vec![Block::paragraph("remote v2")], edited(2));
    let report = engine.pull().unwrap();
    assert_eq!(report.merged, 1);

    let live = vault.read("from-remote/Plan.md");
    assert_eq!(
        live.body,
        "# Plan\n\nremote v2\n\n---\n\n## Local additions\n\nlocal notes\n"
    );
    assert_eq!(live.metadata.conflict_resolved, Some(true));

    let archived = vault.files_in("archive");
    assert_eq!(archived.len(), 1);
    assert_eq!(live.metadata.local_backup.as_deref(), Some(archived[0].as_str()));
    let record = vault.read(&archived[0]);
    assert_eq!(record.body, "local notes\n");
    assert_eq!(record.metadata.original_path.as_deref(), Some("from-remote/Plan.md"));
}

#[test]
fn repeated_cycles_are_quiet() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("x")]);
    remote.insert(
        Node::page("b", "B").with_parent("a").with_last_edited(edited(1)),
        vec![],
    );
    let engine = engine(&vault, remote);

    let first = engine.sync().unwrap();
    assert!(first.success);
    assert_eq!(first.pull.unwrap().written, 2);
    assert_eq!(first.push.unwrap().candidates, 0);

    let second = engine.sync().unwrap();
    assert_eq!(second.pull.unwrap().unchanged, 2);
    let push = second.push.unwrap();
    assert_eq!(push.detection.changed(), 0);
    assert_eq!(push.candidates, 0);
    assert!(engine.remote().calls().is_empty());

    let detector = ChangeDetector::new(engine.vault());
    assert!(detector.detect().unwrap().changes.is_empty());
    assert_eq!(engine.vault().ledger_store().load().cycle_count, 2);
}

#[test]
fn unchanged_remote_keeps_pending_local_edit() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("x")]);
    let engine = engine(&vault, remote);
    engine.pull().unwrap();

    let mut doc = vault.read("from-remote/A.md");
    doc.body = "# A\n\nedited locally\n".into();
    doc.metadata.sync_status = Some(SyncStatus::Pending);
    vault.write_doc(&doc);

    let report = engine.pull().unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(vault.read("from-remote/A.md").body, "# A\n\nedited locally\n");
}

#[test]
fn local_edit_in_pulled_tree_is_detected_and_skipped_safely() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("x")]);
    let engine = engine(&vault, remote);
    engine.pull().unwrap();

    let mut doc = vault.read("from-remote/A.md");
    doc.body.push_str("\nmore\n");
    vault.write_doc(&doc);

    let report = engine.push().unwrap();
    assert_eq!(report.detection.changed(), 1);
    assert_eq!(report.skipped_original, 1);
    assert!(engine.remote().calls().is_empty());

    let pushed = vault.read("from-remote/A.md");
    assert_eq!(pushed.metadata.sync_status, Some(SyncStatus::Synced));
    assert!(pushed.metadata.change_reason.is_some());
    assert!(pushed.body.ends_with("more\n"));
}

#[test]
fn existing_record_is_updated_in_place() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("rec", "Old title").with_kind(NodeKind::SyncRecord),
        vec![Block::paragraph("old")],
    );
    vault.write_doc(
        &DocBuilder::new("from-local/Note.md")
            .title("Note")
            .remote_id("rec")
            .pending()
            .body("# Note\n\n- one\n- two\n")
            .build(),
    );

    let engine = engine(&vault, remote);
    let report = engine.push().unwrap();
    assert_eq!(report.updated, 1);

    let id = NodeId::new("rec");
    assert_eq!(
        engine.remote().calls(),
        vec![RemoteCall::UpdateProperties(id.clone()), RemoteCall::ReplaceBlocks(id.clone())]
    );
    assert_eq!(engine.remote().node(&id).unwrap().title, "Note");
    assert_eq!(engine.remote().blocks(&id), body_to_blocks("- one\n- two\n"));
    assert_eq!(vault.read("from-local/Note.md").metadata.remote_id, Some(id));
}

#[test]
fn folder_index_makes_a_child_page() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("proj", "Proj"), vec![]);
    vault.write_doc(
        &DocBuilder::new("from-local/Proj/_Proj.md")
            .title("Proj")
            .remote_id("proj")
            .synced(Timestamp::now())
            .build(),
    );
    vault.write_doc(
        &DocBuilder::new("from-local/Proj/Task.md")
            .pending()
            .body("# Task\n\ndo it\n")
            .build(),
    );

    let engine = engine(&vault, remote);
    let report = engine.push().unwrap();
    assert_eq!(report.created_children, 1);

    let doc = vault.read("from-local/Proj/Task.md");
    let id = doc.metadata.remote_id.clone().unwrap();
    assert_eq!(doc.metadata.parent_id, Some(NodeId::new("proj")));
    assert_eq!(doc.metadata.created_locally, Some(true));
    assert_eq!(doc.metadata.push_result, Some(PushResult::CreatedChild));

    let node = engine.remote().node(&id).unwrap();
    assert_eq!(node.parent, Some(NodeId::new("proj")));
    assert_eq!(node.kind, NodeKind::Page);
    assert_eq!(
        engine.remote().calls(),
        vec![RemoteCall::Create {
            id,
            parent: CreateParent::Page(NodeId::new("proj")),
        }]
    );
}

#[test]
fn new_folder_index_is_created_before_its_children() {
    let vault = TestVault::new();
    vault.write_doc(&DocBuilder::new("from-local/Trip/Day1.md").pending().body("# Day1\n").build());
    vault.write_doc(&DocBuilder::new("from-local/Trip/_Trip.md").pending().body("# Trip\n").build());

    let engine = engine(&vault, MemoryRemote::new());
    let report = engine.push().unwrap();
    assert_eq!(report.created_records, 1);
    assert_eq!(report.created_children, 1);

    let index = vault.read("from-local/Trip/_Trip.md");
    let day = vault.read("from-local/Trip/Day1.md");
    assert_eq!(day.metadata.parent_id, index.metadata.remote_id);
}

#[test]
fn failed_child_creation_falls_back_to_record() {
    let vault = TestVault::new();
    vault.write_doc(
        &DocBuilder::new("from-local/Proj/_Proj.md")
            .remote_id("gone")
            .synced(Timestamp::now())
            .build(),
    );
    vault.write_doc(&DocBuilder::new("from-local/Proj/Task.md").pending().body("x\n").build());

    let engine = engine(&vault, MemoryRemote::new());
    let report = engine.push().unwrap();
    assert_eq!(report.created_records, 1);
    assert_eq!(report.created_children, 0);

    let doc = vault.read("from-local/Proj/Task.md");
    let node = engine.remote().node(&doc.metadata.remote_id.unwrap()).unwrap();
    assert!(node.is_sync_record());
}

#[test]
fn dangling_remote_id_is_reclassified() {
    let vault = TestVault::new();
    vault.write_doc(
        &DocBuilder::new("from-local/Old.md")
            .remote_id("deleted")
            .pending()
            .body("text\n")
            .build(),
    );

    let engine = engine(&vault, MemoryRemote::new());
    engine.push().unwrap();

    let doc = vault.read("from-local/Old.md");
    let id = doc.metadata.remote_id.unwrap();
    assert_ne!(id, NodeId::new("deleted"));
    assert!(engine.remote().node(&id).unwrap().is_sync_record());
}

#[test]
fn push_degrades_after_consecutive_failures() {
    let vault = TestVault::new();
    for name in ["a", "b", "c", "d"] {
        vault.write_doc(
            &DocBuilder::new(format!("from-local/{name}.md"))
                .pending()
                .body("x\n")
                .build(),
        );
    }
    let remote = MemoryRemote::new();
    remote.fail_mutations(u32::MAX, true);
    let config = config().with_max_consecutive_failures(2);
    let engine = SyncEngine::new(config, vault.open(), remote);

    let report = engine.push().unwrap();
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.degraded, 2);
    assert!(engine.remote().calls().is_empty());

    let failed = vault.read("from-local/a.md");
    assert_eq!(failed.metadata.sync_status, Some(SyncStatus::Synced));
    assert_eq!(failed.metadata.push_result, Some(PushResult::Failed));
    assert!(failed.metadata.pushed_at.is_some());
    assert_eq!(vault.read("from-local/b.md").metadata.push_result, Some(PushResult::Failed));
    let degraded = vault.read("from-local/c.md");
    assert_eq!(degraded.metadata.sync_status, Some(SyncStatus::Synced));
    assert_eq!(degraded.metadata.push_result, Some(PushResult::Degraded));
    assert!(degraded.metadata.remote_id.is_none());
}

#[test]
fn retry_recovers_from_transient_failures() {
    let vault = TestVault::new();
    vault.write_doc(&DocBuilder::new("from-local/a.md").pending().body("x\n").build());
    let remote = MemoryRemote::new();
    remote.fail_mutations(2, true);
    let retry = RetryConfig::new(3)
        .with_initial_delay(std::time::Duration::ZERO)
        .with_jitter(false);
    let engine = SyncEngine::new(SyncConfig::new().with_retry(retry), vault.open(), remote);

    let report = engine.push().unwrap();
    assert_eq!(report.created_records, 1);
    assert_eq!(engine.stats().retries, 2);
}

#[test]
fn records_are_not_pulled_and_listings_paginate() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new().with_page_size(2);
    for i in 0..5 {
        remote.insert(Node::page(format!("p{i}"), format!("Page {i}")), vec![]);
    }
    remote.insert(Node::page("rec", "Record").with_kind(NodeKind::SyncRecord), vec![]);

    let engine = engine(&vault, remote);
    let report = engine.pull().unwrap();
    assert_eq!(report.listed, 5);
    assert_eq!(vault.files_in("from-remote").len(), 5);
    assert!(!vault.exists("from-remote/Record.md"));
}

#[test]
fn routing_orphans_and_collisions() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("shared", "Shared")
            .with_property("Source", PropertyValue::Select("Collaboration".into())),
        vec![],
    );
    remote.insert(Node::page("orphan", "Orphan").with_parent("not-listed"), vec![]);
    remote.insert(Node::page("aaaaaaaa1", "Notes"), vec![]);
    remote.insert(Node::page("bbbbbbbb2", "notes"), vec![]);

    let engine = engine(&vault, remote);
    engine.pull().unwrap();

    assert!(vault.exists("collaboration/Shared.md"));
    assert!(vault.exists("from-remote/Orphan.md"));
    assert!(vault.exists("from-remote/Notes.md"));
    assert!(vault.exists("from-remote/notes_bbbbbbbb.md"));
}

#[test]
fn moved_document_keeps_its_path() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("v1")]);
    vault.write_doc(
        &DocBuilder::new("from-remote/Elsewhere/Mine.md")
            .remote_id("a")
            .updated(edited(1))
            .body("# A\n\nold\n")
            .build(),
    );

    let engine = engine(&vault, remote);
    engine
        .remote()
        .edit(&NodeId::new("a"), vec![Block::paragraph("v2")], edited(3));
    engine.pull().unwrap();

    assert!(!vault.exists("from-remote/A.md"));
    assert_eq!(vault.read("from-remote/Elsewhere/Mine.md").body, "# A\n\nv2\n");
}

#[test]
fn new_sibling_with_same_title_gets_its_own_file() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("bbbbbbbb22", "Notes").with_last_edited(edited(1)),
        vec![Block::paragraph("from b")],
    );
    let engine = engine(&vault, remote);
    engine.pull().unwrap();
    assert!(vault.exists("from-remote/Notes.md"));

    engine.remote().insert(
        Node::page("aaaaaaaa11", "Notes").with_last_edited(edited(2)),
        vec![Block::paragraph("from a")],
    );
    let report = engine.pull().unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.unchanged, 1);

    let files = vault.files_in("from-remote");
    assert_eq!(files.len(), 2);
    let kept = vault.read("from-remote/Notes.md");
    assert_eq!(kept.metadata.remote_id, Some(NodeId::new("bbbbbbbb22")));
    assert_eq!(kept.body, "# Notes\n\nfrom b\n");
    let added = vault.read("from-remote/Notes_aaaaaaaa.md");
    assert_eq!(added.metadata.remote_id, Some(NodeId::new("aaaaaaaa11")));
    assert_eq!(added.body, "# Notes\n\nfrom a\n");
}

#[test]
fn leaf_that_gains_a_child_moves_into_its_folder() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("v1")]);
    let engine = engine(&vault, remote);
    engine.pull().unwrap();
    assert!(vault.exists("from-remote/A.md"));

    let a = NodeId::new("a");
    engine.remote().insert(
        Node::page("b", "B").with_parent("a").with_last_edited(edited(2)),
        vec![Block::paragraph("child")],
    );
    engine.remote().edit(&a, vec![Block::paragraph("v2")], edited(2));
    let report = engine.pull().unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.moved, 1);

    assert!(!vault.exists("from-remote/A.md"));
    let index = vault.read("from-remote/A/_A.md");
    assert_eq!(index.metadata.remote_id, Some(a.clone()));
    assert_eq!(index.metadata.node_type, Some(NodeType::ContainerIndex));
    assert_eq!(index.metadata.children_count, Some(1));
    assert_eq!(index.body, "# A\n\nv2\n");
    assert!(vault.exists("from-remote/A/B.md"));

    let detection = ChangeDetector::new(engine.vault()).detect().unwrap();
    assert!(detection.changes.is_empty());

    vault.write_doc(&DocBuilder::new("from-remote/A/New.md").pending().body("# New\n\nmine\n").build());
    let pushed = engine.push().unwrap();
    assert_eq!(pushed.created_children, 1);
    assert!(matches!(
        engine.remote().calls().as_slice(),
        [RemoteCall::Create { parent: CreateParent::Page(parent), .. }] if *parent == a
    ));
}

#[test]
fn current_container_moves_back_to_a_leaf() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(Node::page("a", "A").with_last_edited(edited(1)), vec![Block::paragraph("text")]);
    let engine = engine(&vault, remote);
    vault.write_doc(
        &DocBuilder::new("from-remote/A/_A.md")
            .remote_id("a")
            .updated(edited(1))
            .body("# A\n\ntext\n")
            .build(),
    );

    let report = engine.pull().unwrap();
    assert_eq!(report.moved, 1);
    assert_eq!(report.written, 0);
    assert!(!vault.exists("from-remote/A/_A.md"));
    let leaf = vault.read("from-remote/A.md");
    assert_eq!(leaf.metadata.node_type, Some(NodeType::Leaf));
    assert_eq!(leaf.body, "# A\n\ntext\n");
}

#[test]
fn databases_become_container_indexes() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::database("tasks1", "Tasks")
            .with_description("Open work")
            .with_last_edited(edited(1)),
        vec![],
    );
    remote.insert(
        Node::page("row1", "Draft").with_parent("tasks1").with_last_edited(edited(1)),
        vec![Block::paragraph("soon")],
    );
    let engine = engine(&vault, remote);
    let report = engine.pull().unwrap();
    assert_eq!(report.listed, 2);
    assert_eq!(report.written, 2);

    let index = vault.read("from-remote/Tasks/_Tasks.md");
    assert!(index.is_database());
    assert_eq!(index.metadata.database_name.as_deref(), Some("Tasks"));
    assert_eq!(index.metadata.node_type, Some(NodeType::ContainerIndex));
    assert_eq!(index.body, "# Tasks\n\nOpen work\n");
    assert!(vault.read_raw("from-remote/Tasks/_Tasks.md").contains("object_type: database_main"));
    assert!(vault.exists("from-remote/Tasks/Draft.md"));

    let mut edited_index = index;
    edited_index.body.push_str("\nlocal note\n");
    edited_index.metadata.sync_status = Some(SyncStatus::Pending);
    vault.write_doc(&edited_index);
    vault.write_doc(&DocBuilder::new("from-remote/Tasks/Idea.md").pending().body("# Idea\n").build());

    let pushed = engine.push().unwrap();
    assert_eq!(pushed.skipped_original, 1);
    assert_eq!(pushed.created_records, 1);
    assert_eq!(engine.remote().mutating_calls_for(&NodeId::new("tasks1")), 0);
}

#[test]
fn record_with_matching_local_path_is_reused() {
    let vault = TestVault::new();
    let remote = MemoryRemote::new();
    remote.insert(
        Node::page("rec", "Note")
            .with_kind(NodeKind::SyncRecord)
            .with_property("Local Path", PropertyValue::Text("from-local/Note.md".into())),
        vec![Block::paragraph("old")],
    );
    vault.write_doc(
        &DocBuilder::new("from-local/Note.md")
            .pending()
            .body("# Note\n\nnew text\n")
            .build(),
    );

    let engine = engine(&vault, remote);
    let report = engine.push().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.created_records, 0);

    let id = NodeId::new("rec");
    assert_eq!(
        engine.remote().calls(),
        vec![RemoteCall::UpdateProperties(id.clone()), RemoteCall::ReplaceBlocks(id.clone())]
    );
    assert_eq!(engine.remote().blocks(&id), vec![Block::paragraph("new text")]);
    let doc = vault.read("from-local/Note.md");
    assert_eq!(doc.metadata.remote_id, Some(id));
    assert_eq!(doc.metadata.push_result, Some(PushResult::Updated));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pulled_tree_mirrors_remote_hierarchy(nodes in forest_strategy(10)) {
        let vault = TestVault::new();
        let remote = MemoryRemote::new();
        for node in &nodes {
            remote.insert(node.clone(), vec![Block::paragraph("body")]);
        }
        let engine = engine(&vault, remote);
        let report = engine.pull().unwrap();
        prop_assert_eq!(report.materialized(), nodes.len());

        let mut path_of: HashMap<NodeId, String> = HashMap::new();
        for rel in vault.files_in("from-remote") {
            let doc = vault.read(&rel);
            let id = doc.metadata.remote_id.clone().unwrap();
            prop_assert!(path_of.insert(id, rel).is_none());
        }
        prop_assert_eq!(path_of.len(), nodes.len());

        let unique: HashSet<&String> = path_of.values().collect();
        prop_assert_eq!(unique.len(), nodes.len());

        let composites: HashSet<&NodeId> = nodes.iter().filter_map(|n| n.parent.as_ref()).collect();
        let dir_of = |path: &str| path.rsplit_once('/').map(|(dir, _)| dir.to_string()).unwrap();
        for node in &nodes {
            let own = &path_of[&node.id];
            let mut home = dir_of(own);
            if composites.contains(&node.id) {
                prop_assert!(docbridge_core::is_index_path(own));
                home = dir_of(&home);
            }
            match &node.parent {
                Some(parent) => prop_assert_eq!(home, dir_of(&path_of[parent])),
                None => prop_assert_eq!(home, "from-remote"),
            }
        }
    }
}
