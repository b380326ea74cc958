use std::collections::{HashMap, HashSet};

use chatarc_core::conversation::MessageNode;
use chatarc_core::tree::mapping_order;
use proptest::prelude::*;
use serde_json::json;

/// Build a mapping of `n` nodes with arbitrary parent/children wiring,
/// including self-references, cycles, and dangling ids.
fn arb_mapping() -> impl Strategy<Value = HashMap<String, MessageNode>> {
    (1usize..40).prop_flat_map(|n| {
        let parent = prop::option::of(0usize..n + 5); // may dangle past n
        let children = prop::collection::vec(0usize..n + 5, 0..4);
        prop::collection::vec((parent, children), n).prop_map(|nodes| {
            nodes
                .into_iter()
                .enumerate()
                .map(|(idx, (parent, children))| {
                    let id = format!("node-{idx}");
                    let node: MessageNode = serde_json::from_value(json!({
                        "id": id,
                        "parent": parent.map(|p| format!("node-{p}")),
                        "children": children
                            .into_iter()
                            .map(|c| format!("node-{c}"))
                            .collect::<Vec<_>>(),
                        "message": null,
                    }))
                    .unwrap();
                    (id, node)
                })
                .collect()
        })
    })
}

proptest! {
    /// Traversal terminates on arbitrary graphs and never visits a node
    /// twice, even with cycles and dangling references.
    #[test]
    fn prop_traversal_terminates_and_is_unique(mapping in arb_mapping()) {
        let order = mapping_order(&mapping);

        prop_assert!(order.len() <= mapping.len());
        let unique: HashSet<&String> = order.iter().collect();
        prop_assert_eq!(unique.len(), order.len());
        for id in &order {
            prop_assert!(mapping.contains_key(id));
        }
    }

    /// On acyclic mappings every node reachable from a root is visited
    /// exactly once: the visited count equals the reachable count.
    #[test]
    fn prop_acyclic_reachable_visited_exactly_once(n in 1usize..30) {
        // chain with a branch at every even node: guaranteed acyclic
        let mut mapping = HashMap::new();
        for idx in 0..n {
            let parent = if idx == 0 { None } else { Some(format!("node-{}", idx - 1)) };
            let mut children = Vec::new();
            if idx + 1 < n {
                children.push(format!("node-{}", idx + 1));
            }
            if idx % 2 == 0 {
                children.push(format!("leaf-{idx}"));
            }
            let node: MessageNode = serde_json::from_value(json!({
                "id": format!("node-{idx}"),
                "parent": parent,
                "children": children,
                "message": null,
            })).unwrap();
            mapping.insert(format!("node-{idx}"), node);

            if idx % 2 == 0 {
                let leaf: MessageNode = serde_json::from_value(json!({
                    "id": format!("leaf-{idx}"),
                    "parent": format!("node-{idx}"),
                    "children": [],
                    "message": null,
                })).unwrap();
                mapping.insert(format!("leaf-{idx}"), leaf);
            }
        }

        let order = mapping_order(&mapping);
        prop_assert_eq!(order.len(), mapping.len());
    }
}
