// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{NodePath, Pulldown};
use crate::core::memory::BufferCollection;
use crate::core::nodes::ProcessNode;
use crate::core::rational::Fraction;

/// A live node plus the bookkeeping the graph keeps about it.
#[derive(Debug)]
pub struct FrameGraphNode {
    pub node: ProcessNode,
    children: BTreeSet<NodePath>,
    owned_collection: Option<Arc<BufferCollection>>,
    pulldown: Pulldown,
}

impl FrameGraphNode {
    /// `interval` is the node's own frame interval; it paces what the node
    /// accepts from a faster parent.
    pub fn new(
        node: ProcessNode,
        interval: Fraction,
        owned_collection: Option<Arc<BufferCollection>>,
    ) -> Self {
        Self {
            node,
            children: BTreeSet::new(),
            owned_collection,
            pulldown: Pulldown::new(interval),
        }
    }

    pub fn children(&self) -> &BTreeSet<NodePath> {
        &self.children
    }

    /// The collection this node allocated, if it is not in place.
    pub fn owned_collection(&self) -> Option<&Arc<BufferCollection>> {
        self.owned_collection.as_ref()
    }

    pub fn interval(&self) -> Fraction {
        self.pulldown.interval()
    }

    pub fn pulldown_mut(&mut self) -> &mut Pulldown {
        &mut self.pulldown
    }
}

/// Live nodes keyed by path.
///
/// Paths sort parents before children, so iteration order is a valid
/// construction order and its reverse a valid teardown order.
#[derive(Debug, Default)]
pub struct FrameGraph {
    nodes: BTreeMap<NodePath, FrameGraphNode>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn get(&self, path: &NodePath) -> Option<&FrameGraphNode> {
        self.nodes.get(path)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut FrameGraphNode> {
        self.nodes.get_mut(path)
    }

    pub fn node(&self, path: &NodePath) -> Option<&ProcessNode> {
        self.nodes.get(path).map(|entry| &entry.node)
    }

    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut ProcessNode> {
        self.nodes.get_mut(path).map(|entry| &mut entry.node)
    }

    /// Add a node and register it with its parent. The parent must exist
    /// unless the path is a root.
    pub fn insert(&mut self, entry: FrameGraphNode) {
        let path = entry.node.path().clone();
        if let Some(parent) = path.parent() {
            match self.nodes.get_mut(&parent) {
                Some(parent) => {
                    parent.children.insert(path.clone());
                }
                None => tracing::error!("[{}] Inserted without parent {}", path, parent),
            }
        }
        if self.nodes.insert(path.clone(), entry).is_some() {
            tracing::error!("[{}] Replaced a live node", path);
        }
    }

    /// Remove a node and unregister it from its parent.
    pub fn remove(&mut self, path: &NodePath) -> Option<FrameGraphNode> {
        let entry = self.nodes.remove(path)?;
        if !entry.children.is_empty() {
            tracing::warn!(
                "[{}] Removed with {} children still attached",
                path,
                entry.children.len()
            );
        }
        if let Some(parent) = path.parent().and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.remove(path);
        }
        Some(entry)
    }

    pub fn children(&self, path: &NodePath) -> Vec<NodePath> {
        self.nodes
            .get(path)
            .map(|entry| entry.children.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodePath, &FrameGraphNode)> {
        self.nodes.iter()
    }

    /// Nodes with no children.
    pub fn leaves(&self) -> Vec<NodePath> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.children.is_empty())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// A non-output node left with no children and not already going away.
    /// Deepest paths are considered first.
    pub fn find_orphan(&self) -> Option<NodePath> {
        self.nodes
            .iter()
            .rev()
            .find(|(_, entry)| {
                entry.children.is_empty()
                    && !entry.node.is_output()
                    && !entry.node.is_shutting_down()
            })
            .map(|(path, _)| path.clone())
    }

    /// The nearest strict ancestor that owns a collection.
    pub fn nearest_collection_owner(&self, path: &NodePath) -> Option<&FrameGraphNode> {
        path.ancestors()
            .filter_map(|ancestor| self.nodes.get(&ancestor))
            .find(|entry| entry.owned_collection.is_some())
    }

    /// The node at `path` if it owns a collection, otherwise its nearest owner.
    pub fn owner_at_or_above(&self, path: &NodePath) -> Option<&FrameGraphNode> {
        match self.nodes.get(path) {
            Some(entry) if entry.owned_collection.is_some() => Some(entry),
            _ => self.nearest_collection_owner(path),
        }
    }

    /// `path` and every live descendant, children before parents.
    pub fn subtree(&self, path: &NodePath) -> Vec<NodePath> {
        let mut paths: Vec<NodePath> = self
            .nodes
            .keys()
            .filter(|candidate| *candidate == path || path.is_ancestor_of(candidate))
            .cloned()
            .collect();
        paths.reverse();
        paths
    }
}
