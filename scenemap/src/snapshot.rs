//! Whole-map snapshots, the unit of persistence.

use std::collections::HashMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{MapError, MapResult};
use crate::node::{Node, NodeId, NodeRegistry};

/// Opaque version token issued by a persistence gateway.
///
/// Callers pass the token from their last load or save back into the
/// next save; a mismatch means another writer updated the store in
/// between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> VersionToken {
        VersionToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The entire index as persisted in one unit: the root node plus every
/// node reachable from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub root_id: NodeId,
    pub nodes: Vec<Node>,
}

/// A snapshot paired with the store version it was loaded at.
#[derive(Debug, Clone)]
pub struct VersionedSnapshot {
    pub snapshot: Snapshot,
    pub version: VersionToken,
}

impl Snapshot {
    /// Captures the reachable tree under `root_id` in descent order.
    pub fn capture(registry: &NodeRegistry, root_id: NodeId) -> MapResult<Snapshot> {
        let mut nodes = Vec::with_capacity(registry.len());
        Self::collect(registry, root_id, &mut nodes)?;
        Ok(Snapshot { root_id, nodes })
    }

    fn collect(registry: &NodeRegistry, node_id: NodeId, out: &mut Vec<Node>) -> MapResult<()> {
        let node = registry.node(&node_id)?;
        out.push(node.clone());
        for child in [node.left_child, node.right_child].into_iter().flatten() {
            Self::collect(registry, child, out)?;
        }
        Ok(())
    }

    /// Rebuilds the registry by walking child ids from the root.
    ///
    /// A child id with no matching node, or a node reached twice, makes
    /// the snapshot unusable and is rejected. Nodes not reachable from
    /// the root are dropped with a warning, restoring the no-orphan
    /// invariant.
    pub fn restore(&self) -> MapResult<NodeRegistry> {
        let mut by_id: HashMap<NodeId, &Node> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if by_id.insert(node.id, node).is_some() {
                return Err(MapError::CorruptSnapshot(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut registry = NodeRegistry::new();
        let mut stack = vec![self.root_id];
        while let Some(id) = stack.pop() {
            if registry.contains(&id) {
                return Err(MapError::CorruptSnapshot(format!(
                    "node '{id}' is referenced by more than one parent"
                )));
            }
            let node = *by_id
                .get(&id)
                .ok_or_else(|| MapError::CorruptSnapshot(format!("dangling node id '{id}'")))?;
            for child in [node.left_child, node.right_child].into_iter().flatten() {
                stack.push(child);
            }
            registry.register(node.clone());
        }

        let dropped = self.nodes.len() - registry.len();
        if dropped > 0 {
            warn!("snapshot held {dropped} node(s) unreachable from the root; dropped");
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Boundary;

    fn linked_pair() -> (NodeRegistry, NodeId) {
        let mut registry = NodeRegistry::new();
        let mut root = Node::new(Boundary::new(-10.0, -10.0, -10.0, 10.0, 10.0, 10.0));
        let child = Node::new(Boundary::new(-10.0, -10.0, -10.0, 10.0, 0.0, 10.0));
        root.left_child = Some(child.id);
        let root_id = root.id;
        registry.register(root);
        registry.register(child);
        (registry, root_id)
    }

    #[test]
    fn test_capture_restore_round_trip() {
        let (registry, root_id) = linked_pair();
        let snapshot = Snapshot::capture(&registry, root_id).unwrap();
        assert_eq!(snapshot.root_id, root_id);
        assert_eq!(snapshot.nodes.len(), 2);
        // Descent order: root first.
        assert_eq!(snapshot.nodes[0].id, root_id);

        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.len(), registry.len());
        assert_eq!(restored.get(&root_id), registry.get(&root_id));
    }

    #[test]
    fn test_restore_rejects_dangling_child() {
        let (registry, root_id) = linked_pair();
        let mut snapshot = Snapshot::capture(&registry, root_id).unwrap();
        snapshot.nodes.pop();

        assert!(matches!(
            snapshot.restore(),
            Err(MapError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_drops_unreachable_nodes() {
        let (registry, root_id) = linked_pair();
        let mut snapshot = Snapshot::capture(&registry, root_id).unwrap();
        snapshot
            .nodes
            .push(Node::new(Boundary::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0)));

        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn test_restore_rejects_shared_child() {
        let mut registry = NodeRegistry::new();
        let child = Node::new(Boundary::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0));
        let mut root = Node::new(Boundary::new(-10.0, -10.0, -10.0, 10.0, 10.0, 10.0));
        root.left_child = Some(child.id);
        root.right_child = Some(child.id);
        let root_id = root.id;
        registry.register(root);
        registry.register(child);

        let snapshot = Snapshot::capture(&registry, root_id);
        // Capture itself tolerates the shape; restore refuses it.
        let snapshot = snapshot.unwrap();
        assert!(matches!(
            snapshot.restore(),
            Err(MapError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_serializes_as_one_document() {
        let (registry, root_id) = linked_pair();
        let snapshot = Snapshot::capture(&registry, root_id).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
