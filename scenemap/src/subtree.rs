//! Read-only subtree projections for transfer to remote consumers.

use serde::{Deserialize, Serialize};

use crate::boundary::Boundary;
use crate::errors::MapResult;
use crate::node::{AssetRef, NodeId, NodeRegistry};

/// A serializable projection of a node and its descendants.
///
/// Ids in the view are opaque identifiers, not live references; handing a
/// view to a remote consumer exposes no mutation handles. Empty asset
/// lists and absent children are omitted from the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeView {
    pub id: NodeId,
    pub boundary: Boundary,
    pub has_assets: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<SubtreeView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<SubtreeView>>,
}

impl SubtreeView {
    /// Builds the view of `node_id` and everything beneath it.
    pub(crate) fn build(registry: &NodeRegistry, node_id: NodeId) -> MapResult<SubtreeView> {
        let node = registry.node(&node_id)?;
        let left = match node.left_child {
            Some(child) => Some(Box::new(Self::build(registry, child)?)),
            None => None,
        };
        let right = match node.right_child {
            Some(child) => Some(Box::new(Self::build(registry, child)?)),
            None => None,
        };
        Ok(SubtreeView {
            id: node.id,
            boundary: node.boundary,
            has_assets: !node.assets.is_empty(),
            assets: node.assets.clone(),
            left,
            right,
        })
    }

    /// Collects every asset id in this view, depth first.
    pub fn asset_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_asset_ids(&mut ids);
        ids
    }

    fn collect_asset_ids(&self, out: &mut Vec<String>) {
        out.extend(self.assets.iter().map(|a| a.asset_id.clone()));
        if let Some(left) = &self.left {
            left.collect_asset_ids(out);
        }
        if let Some(right) = &self.right {
            right.collect_asset_ids(out);
        }
    }

    /// Number of levels in the view, counting this node as one.
    pub fn depth(&self) -> u32 {
        let left = self.left.as_ref().map_or(0, |v| v.depth());
        let right = self.right.as_ref().map_or(0, |v| v.depth());
        1 + left.max(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn sample_registry() -> (NodeRegistry, NodeId, NodeId) {
        let mut registry = NodeRegistry::new();
        let mut root = Node::new(Boundary::new(-10.0, -10.0, -10.0, 10.0, 10.0, 10.0));
        let mut left = Node::new(Boundary::new(-10.0, -10.0, -10.0, 10.0, 0.0, 10.0));
        left.assets.push(AssetRef {
            asset_id: "teapot".to_string(),
            boundary: Boundary::new(-5.0, -5.0, -5.0, -1.0, -1.0, -1.0),
        });
        root.left_child = Some(left.id);
        let root_id = root.id;
        let left_id = left.id;
        registry.register(root);
        registry.register(left);
        (registry, root_id, left_id)
    }

    #[test]
    fn test_build_mirrors_structure() {
        let (registry, root_id, left_id) = sample_registry();
        let view = SubtreeView::build(&registry, root_id).unwrap();

        assert_eq!(view.id, root_id);
        assert!(!view.has_assets);
        assert!(view.right.is_none());

        let left = view.left.as_ref().unwrap();
        assert_eq!(left.id, left_id);
        assert!(left.has_assets);
        assert_eq!(left.assets.len(), 1);
        assert_eq!(view.depth(), 2);
    }

    #[test]
    fn test_asset_ids_walks_whole_view() {
        let (registry, root_id, _) = sample_registry();
        let view = SubtreeView::build(&registry, root_id).unwrap();
        assert_eq!(view.asset_ids(), vec!["teapot".to_string()]);
    }

    #[test]
    fn test_wire_form_omits_empty_fields() {
        let (registry, root_id, _) = sample_registry();
        let view = SubtreeView::build(&registry, root_id).unwrap();
        let json = serde_json::to_string(&view).unwrap();

        // The root holds no assets and has no right child.
        assert!(!json.contains("\"right\""));
        assert!(json.contains("\"has_assets\":false"));
        assert!(json.contains("teapot"));

        let back: SubtreeView = serde_json::from_str(&json).unwrap();
        assert_eq!(view, back);
    }

    #[test]
    fn test_build_fails_on_dangling_child() {
        let mut registry = NodeRegistry::new();
        let mut root = Node::new(Boundary::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0));
        root.left_child = Some(uuid::Uuid::new_v4());
        let root_id = registry.register(root);
        assert!(SubtreeView::build(&registry, root_id).is_err());
    }
}
