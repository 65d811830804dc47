// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

/// Position of a node in the config tree.
///
/// The first element is the root index; each following element is a child
/// index one level deeper. Parent/child relations are prefix relations,
/// so paths never need to point at each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<u8>);

impl NodePath {
    pub fn root(index: u8) -> Self {
        Self(vec![index])
    }

    pub fn from_indices(indices: impl Into<Vec<u8>>) -> Self {
        Self(indices.into())
    }

    pub fn child(&self, index: u8) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// The path with its last element removed, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn is_root(&self) -> bool {
        self.0.len() <= 1
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn root_index(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<u8> {
        self.0.last().copied()
    }

    pub fn indices(&self) -> &[u8] {
        &self.0
    }

    /// Strict prefix test.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..self.0.len())
            .rev()
            .map(move |len| NodePath(self.0[..len].to_vec()))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_is_prefix() {
        let path = NodePath::root(0).child(1).child(2);
        assert_eq!(path.parent(), Some(NodePath::from_indices([0, 1])));
        assert_eq!(NodePath::root(3).parent(), None);
        assert_eq!(path.depth(), 3);
        assert_eq!(path.root_index(), Some(0));
        assert_eq!(path.last(), Some(2));
    }

    #[test]
    fn test_ancestry() {
        let root = NodePath::root(0);
        let leaf = root.child(1).child(0);
        assert!(root.is_ancestor_of(&leaf));
        assert!(!leaf.is_ancestor_of(&root));
        assert!(!root.is_ancestor_of(&root));
        assert!(!NodePath::root(1).is_ancestor_of(&leaf));

        let ancestors: Vec<_> = leaf.ancestors().collect();
        assert_eq!(ancestors, vec![root.child(1), root]);
    }

    #[test]
    fn test_ordering_puts_parents_first() {
        let mut paths = vec![
            NodePath::from_indices([0, 1]),
            NodePath::from_indices([1]),
            NodePath::from_indices([0]),
            NodePath::from_indices([0, 0, 3]),
        ];
        paths.sort();
        assert_eq!(
            paths,
            vec![
                NodePath::from_indices([0]),
                NodePath::from_indices([0, 0, 3]),
                NodePath::from_indices([0, 1]),
                NodePath::from_indices([1]),
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(NodePath::from_indices([0, 1, 2]).to_string(), "0.1.2");
        assert_eq!(NodePath::root(4).to_string(), "4");
    }
}
