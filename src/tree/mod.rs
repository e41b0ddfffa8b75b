//! Binary merge trees.
//!
//! A [`MergeTree`] is an arena of [`MergeNode`]s addressed by index. Leaves
//! carry the dataset indices assigned to them; internal nodes have exactly
//! two ordered children. Each node holds an optional [`MergePromise`] that the
//! scheduler sets at most once.
//!
//! ```text
//! sequential (k = 4)          balanced (k = 4)
//!
//!        0                          0
//!       / \                       /   \
//!      1   4                     1     2
//!     / \                       / \   / \
//!    2   5                     3   4 5   6
//!   / \
//!  3   6
//! ```
//!
//! ## Structural invariants
//!
//! - Exactly one root (a node that is nobody's child).
//! - Every node is reachable from the root, and has at most one parent.
//! - Leaves have sample assignments, internal nodes do not.

mod builders;

pub use builders::{balanced, chunk_indices, sequential, split_even, TreeShape};

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::promise::MergePromise;

/// Index of a node in its [`MergeTree`].
pub type NodeId = usize;

/// One point in the binary reduction.
#[derive(Debug, Clone)]
pub struct MergeNode {
    id: NodeId,
    children: Option<(NodeId, NodeId)>,
    leaf_samples: Option<Vec<usize>>,
    promise: Option<MergePromise>,
}

impl MergeNode {
    /// A leaf holding the dataset rows `samples`.
    pub fn leaf(id: NodeId, samples: Vec<usize>) -> Self {
        Self {
            id,
            children: None,
            leaf_samples: Some(samples),
            promise: None,
        }
    }

    /// An internal node merging `left` and `right`.
    pub fn internal(id: NodeId, left: NodeId, right: NodeId) -> Self {
        Self {
            id,
            children: Some((left, right)),
            leaf_samples: None,
            promise: None,
        }
    }

    /// Position of this node in the arena.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Ordered children, `None` for leaves.
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        self.children
    }

    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Dataset rows assigned to this leaf.
    pub fn leaf_samples(&self) -> Option<&[usize]> {
        self.leaf_samples.as_deref()
    }

    /// The node's promise, once initialized or dispatched.
    pub fn promise(&self) -> Option<&MergePromise> {
        self.promise.as_ref()
    }
}

/// A rooted binary tree guiding the order of dictionary merges.
#[derive(Debug, Clone)]
pub struct MergeTree {
    nodes: Vec<MergeNode>,
    root: NodeId,
}

impl MergeTree {
    /// Build a tree from an arena, checking structure.
    ///
    /// Node ids must equal their position in `nodes`.
    pub fn new(nodes: Vec<MergeNode>, root: NodeId) -> Result<Self> {
        let tree = Self { nodes, root };
        tree.validate()?;
        Ok(tree)
    }

    /// Build a tree from adjacency lists and leaf assignments.
    ///
    /// `children[i]` lists the children of node `i`; it must hold zero or two
    /// entries. The root is inferred as the only node without a parent.
    pub fn from_children(
        children: &[Vec<NodeId>],
        mut leaf_samples: HashMap<NodeId, Vec<usize>>,
    ) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = children.len();
        let mut has_parent = vec![false; n];
        let mut nodes = Vec::with_capacity(n);

        for (id, kids) in children.iter().enumerate() {
            let node = match kids.as_slice() {
                [] => {
                    let samples = leaf_samples.remove(&id).ok_or_else(|| Error::MalformedTree {
                        node: id,
                        reason: "leaf without assigned samples".to_string(),
                    })?;
                    MergeNode::leaf(id, samples)
                }
                &[l, r] => MergeNode::internal(id, l, r),
                other => {
                    return Err(Error::MalformedTree {
                        node: id,
                        reason: format!("{} children, expected 0 or 2", other.len()),
                    })
                }
            };
            for &c in kids {
                if c < n {
                    has_parent[c] = true;
                }
            }
            nodes.push(node);
        }

        if let Some((&id, _)) = leaf_samples.iter().next() {
            return Err(Error::MalformedTree {
                node: id,
                reason: "samples assigned to a node that is not a leaf".to_string(),
            });
        }

        let mut roots = (0..n).filter(|&i| !has_parent[i]);
        let root = roots.next().ok_or_else(|| Error::MalformedTree {
            node: 0,
            reason: "no root: every node has a parent".to_string(),
        })?;
        if let Some(extra) = roots.next() {
            return Err(Error::MalformedTree {
                node: extra,
                reason: format!("second root besides node {root}"),
            });
        }

        Self::new(nodes, root)
    }

    /// Check that the arena is a single rooted binary tree with assigned leaves.
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        if self.root >= n {
            return Err(Error::MalformedTree {
                node: self.root,
                reason: format!("root out of range for {n} nodes"),
            });
        }

        let mut parent: Vec<Option<NodeId>> = vec![None; n];
        for (pos, node) in self.nodes.iter().enumerate() {
            if node.id != pos {
                return Err(Error::MalformedTree {
                    node: pos,
                    reason: format!("stored id {} differs from arena position", node.id),
                });
            }
            match (node.children, &node.leaf_samples) {
                (None, None) => {
                    return Err(Error::MalformedTree {
                        node: pos,
                        reason: "leaf without assigned samples".to_string(),
                    })
                }
                (Some(_), Some(_)) => {
                    return Err(Error::MalformedTree {
                        node: pos,
                        reason: "internal node with assigned samples".to_string(),
                    })
                }
                _ => {}
            }
            if let Some((l, r)) = node.children {
                for c in [l, r] {
                    if c >= n {
                        return Err(Error::MalformedTree {
                            node: pos,
                            reason: format!("child {c} out of range"),
                        });
                    }
                    if c == self.root {
                        return Err(Error::MalformedTree {
                            node: pos,
                            reason: "root listed as a child".to_string(),
                        });
                    }
                    if let Some(p) = parent[c] {
                        return Err(Error::MalformedTree {
                            node: c,
                            reason: format!("two parents: {p} and {pos}"),
                        });
                    }
                    parent[c] = Some(pos);
                }
            }
        }

        // With one parent per node, reaching everything from the root rules out cycles.
        let reached = self.post_order().len();
        if reached != n {
            let orphan = (0..n)
                .find(|&i| i != self.root && parent[i].is_none())
                .unwrap_or(self.root);
            return Err(Error::MalformedTree {
                node: orphan,
                reason: format!("{} of {n} nodes unreachable from root", n - reached),
            });
        }
        Ok(())
    }

    /// Nodes below the root, children before parents, left before right.
    pub fn post_order(&self) -> Vec<NodeId> {
        let n = self.nodes.len();
        let mut out = Vec::with_capacity(n);
        if self.root >= n {
            return out;
        }
        let mut seen = vec![false; n];
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            if seen[id] {
                continue;
            }
            seen[id] = true;
            stack.push((id, true));
            if let Some((l, r)) = self.nodes[id].children {
                for c in [r, l] {
                    if c < n && !seen[c] {
                        stack.push((c, false));
                    }
                }
            }
        }
        out
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node.
    pub fn node(&self, id: NodeId) -> Option<&MergeNode> {
        self.nodes.get(id)
    }

    /// Iterate over all nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &MergeNode> {
        self.nodes.iter()
    }

    /// Ids of all leaves, in arena order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
            .collect()
    }

    /// Number of internal nodes, i.e. merges needed to reach the root.
    pub fn internal_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_leaf()).count()
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut best = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, d)) = stack.pop() {
            best = best.max(d);
            if let Some((l, r)) = self.nodes.get(id).and_then(|n| n.children) {
                stack.push((l, d + 1));
                stack.push((r, d + 1));
            }
        }
        best
    }

    pub(crate) fn promise_of(&self, id: NodeId) -> Option<&MergePromise> {
        self.nodes.get(id).and_then(|n| n.promise.as_ref())
    }

    /// Attach a promise to a node. A node's promise is set at most once.
    pub(crate) fn set_promise(&mut self, id: NodeId, promise: MergePromise) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or_else(|| Error::MalformedTree {
            node: id,
            reason: "node out of range".to_string(),
        })?;
        if node.promise.is_some() {
            return Err(Error::MalformedTree {
                node: id,
                reason: "promise already set".to_string(),
            });
        }
        node.promise = Some(promise);
        Ok(())
    }
}
