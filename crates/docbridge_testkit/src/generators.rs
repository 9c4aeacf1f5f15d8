//! Property-based test generators using proptest.
//!
//! Forests are generated acyclic: a node may only point at an earlier node
//! as its parent, so every node is reachable from some root.

use docbridge_codec::{Block, HeadingLevel};
use docbridge_core::{Node, NodeId};
use proptest::prelude::*;

/// Strategy for remote ids (32 lowercase hex digits).
pub fn node_id_strategy() -> impl Strategy<Value = NodeId> {
    prop::string::string_regex("[0-9a-f]{32}")
        .expect("Invalid regex")
        .prop_map(NodeId::new)
}

/// Strategy for page titles, including characters that are unsafe in file
/// names and case variants that collide after sanitization.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Notes".to_string()),
        Just("notes".to_string()),
        Just("Plan: v2?".to_string()),
        Just("   ".to_string()),
        prop::string::string_regex("[a-zA-Z0-9 <>:\"/|?*._-]{0,30}").expect("Invalid regex"),
    ]
}

/// Strategy for plain inline text that survives a Markdown round trip.
pub fn inline_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9 ,]{0,30}[a-zA-Z0-9]")
        .expect("Invalid regex")
}

/// Strategy for blocks of the portable subset.
pub fn portable_block_strategy() -> impl Strategy<Value = Block> {
    prop_oneof![
        (1u8..=3, inline_text_strategy()).prop_map(|(level, text)| {
            let level = HeadingLevel::new(level).unwrap_or(HeadingLevel::H1);
            Block::heading(level, text)
        }),
        inline_text_strategy().prop_map(Block::Paragraph),
        inline_text_strategy().prop_map(Block::BulletedItem),
        inline_text_strategy().prop_map(Block::NumberedItem),
        inline_text_strategy().prop_map(Block::Quote),
        (any::<bool>(), inline_text_strategy()).prop_map(|(checked, text)| Block::todo(checked, text)),
        Just(Block::Divider),
    ]
}

/// Strategy for a page body.
pub fn blocks_strategy() -> impl Strategy<Value = Vec<Block>> {
    prop::collection::vec(portable_block_strategy(), 0..8)
}

/// Strategy for an acyclic forest of up to `max_nodes` pages.
///
/// Ids come from [`forest_id`]; titles are drawn from [`title_strategy`]
/// to provoke sibling collisions.
pub fn forest_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Node>> {
    (1..=max_nodes.max(1)).prop_flat_map(|count| {
        (
            prop::collection::vec(title_strategy(), count),
            prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), count),
        )
            .prop_map(move |(titles, parents)| {
                (0..count)
                    .map(|i| {
                        let mut node = Node::page(forest_id(i), titles[i].clone());
                        if i > 0 {
                            if let Some(parent) = &parents[i] {
                                node = node.with_parent(forest_id(parent.index(i)));
                            }
                        }
                        node
                    })
                    .collect()
            })
    })
}

/// Id of the `i`th node of a generated forest.
pub fn forest_id(i: usize) -> NodeId {
    NodeId::new(format!("{i:032x}"))
}
