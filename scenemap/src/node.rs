//! Tree nodes and the flat registry they live in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boundary::Boundary;
use crate::errors::{MapError, MapResult};

/// Unique identifier of a kd-tree node
pub type NodeId = Uuid;

/// An asset's routing record: its id plus the bounding box used for
/// geometric placement. Asset content itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_id: String,
    pub boundary: Boundary,
}

/// A single cell of the kd-tree.
///
/// Children are referenced by id into the [`NodeRegistry`], never by
/// direct handle, so the structure serializes without cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub boundary: Boundary,
    pub assets: Vec<AssetRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_child: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_child: Option<NodeId>,
}

impl Node {
    /// Creates an empty node with a fresh id covering the given volume.
    pub fn new(boundary: Boundary) -> Node {
        Node {
            id: Uuid::new_v4(),
            boundary,
            assets: Vec::new(),
            left_child: None,
            right_child: None,
        }
    }
}

/// Flat storage substrate of the tree.
///
/// Every node lives here keyed by its id; parent→child relationships are
/// ids into this map. The registry and the set of nodes reachable from
/// the root must coincide: no orphans, no dangling ids.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> NodeRegistry {
        NodeRegistry {
            nodes: HashMap::new(),
        }
    }

    /// Adds a node under its own id and returns that id.
    pub fn register(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up a node that must exist. A miss means a parent→child link
    /// points at nothing, so the tree state is no longer trustworthy.
    pub(crate) fn node(&self, id: &NodeId) -> MapResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| MapError::CorruptSnapshot(format!("dangling node id '{id}'")))
    }

    /// Mutable variant of [`NodeRegistry::node`].
    pub(crate) fn node_mut(&mut self, id: &NodeId) -> MapResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| MapError::CorruptSnapshot(format!("dangling node id '{id}'")))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}
