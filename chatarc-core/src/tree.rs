//! Message-tree algorithms: mapping traversal order and parent/child
//! regrouping of processed messages.
//!
//! Both stages are explicit work-list algorithms over an arena of nodes
//! indexed by id, returning immutable result structures. Cycle and
//! dangling-reference safety lives entirely in `mapping_order`'s visited
//! set; `MessageTree` only regroups what the traversal already vetted.

use std::collections::{HashMap, HashSet};

use crate::conversation::{ExtractedMessage, MessageNode};

/// Depth-first traversal order over a conversation's node mapping.
///
/// Roots are nodes with no parent, or whose parent is absent from the
/// mapping; root order is sorted by id so the result is stable regardless of
/// map iteration order. Children are visited in declared array order. Every
/// node is visited at most once, so cycles terminate and nodes only
/// reachable through a cycle are simply left out.
pub fn mapping_order(mapping: &HashMap<String, MessageNode>) -> Vec<String> {
    let mut roots: Vec<&str> = mapping
        .values()
        .filter(|node| match &node.parent {
            None => true,
            Some(parent) => !mapping.contains_key(parent),
        })
        .map(|node| node.id.as_str())
        .collect();
    roots.sort_unstable();

    let mut order = Vec::with_capacity(mapping.len());
    let mut visited: HashSet<&str> = HashSet::with_capacity(mapping.len());
    let mut stack: Vec<&str> = roots.into_iter().rev().collect();

    while let Some(id) = stack.pop() {
        let Some(node) = mapping.get(id) else {
            continue; // dangling child reference
        };
        if !visited.insert(id) {
            continue;
        }
        order.push(node.id.clone());
        for child in node.children.iter().rev() {
            if !visited.contains(child.as_str()) {
                stack.push(child);
            }
        }
    }

    order
}

/// A rooted forest over processed messages, grouped by parent id.
///
/// Indices refer into the message slice the tree was built from. Within a
/// children group, order matches the order messages were appended during
/// traversal, preserving the source tree's branch-exploration order.
#[derive(Debug, Clone)]
pub struct MessageTree {
    pub roots: Vec<usize>,
    pub children_by_parent: HashMap<String, Vec<usize>>,
}

impl MessageTree {
    /// A message is a root if it has no parent reference or its parent is
    /// not among the provided messages (orphaned branch after traversal
    /// pruning).
    pub fn build(messages: &[ExtractedMessage]) -> MessageTree {
        let ids: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();

        let mut roots = Vec::new();
        let mut children_by_parent: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, message) in messages.iter().enumerate() {
            match message.parent_id.as_deref() {
                Some(parent) if ids.contains(parent) && parent != message.id => {
                    children_by_parent
                        .entry(parent.to_owned())
                        .or_default()
                        .push(idx);
                }
                _ => roots.push(idx),
            }
        }

        MessageTree {
            roots,
            children_by_parent,
        }
    }

    /// Depth-first walk yielding `(depth, message)` in render order.
    pub fn walk<'a>(&'a self, messages: &'a [ExtractedMessage]) -> TreeWalk<'a> {
        let stack = self
            .roots
            .iter()
            .rev()
            .map(|&idx| (0usize, idx))
            .collect();
        TreeWalk {
            tree: self,
            messages,
            stack,
        }
    }
}

pub struct TreeWalk<'a> {
    tree: &'a MessageTree,
    messages: &'a [ExtractedMessage],
    stack: Vec<(usize, usize)>,
}

impl<'a> Iterator for TreeWalk<'a> {
    type Item = (usize, &'a ExtractedMessage);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, idx) = self.stack.pop()?;
        let message = &self.messages[idx];
        if let Some(children) = self.tree.children_by_parent.get(&message.id) {
            for &child in children.iter().rev() {
                self.stack.push((depth + 1, child));
            }
        }
        Some((depth, message))
    }
}
