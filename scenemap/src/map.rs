//! The asset map aggregate: a kd-tree over a fixed world volume.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::boundary::{Axis, Boundary, HalfSide, Intersection};
use crate::config::MapConfig;
use crate::errors::{MapError, MapResult};
use crate::gateway::PersistenceGateway;
use crate::node::{AssetRef, Node, NodeId, NodeRegistry};
use crate::snapshot::{Snapshot, VersionToken};
use crate::subtree::SubtreeView;

/// The spatial index over one fixed world volume.
///
/// Assets are routed into a recursively-split kd-tree by their bounding
/// box: each node halves its volume at the midpoint of an axis that
/// rotates with depth, children are created lazily on first descent, and
/// an asset straddling a split plane stays at the node whose plane it
/// straddles. Every successful mutation is persisted through the
/// configured [`PersistenceGateway`] before the call returns.
///
/// Uses the pimpl pattern for cheap cloning; all clones share one tree.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use scenemap::{AssetMap, Boundary, MapConfig, MemoryGateway};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MapConfig::new()
///     .with_world_boundary(Boundary::new(-100.0, -100.0, -100.0, 100.0, 100.0, 100.0));
/// let map = AssetMap::open_or_create(config, Arc::new(MemoryGateway::new()))?;
///
/// map.insert("teapot", Boundary::new(-60.0, -60.0, -60.0, -40.0, -40.0, -40.0))?;
/// assert_eq!(map.asset_ids_in_boundary(None)?, vec!["teapot".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AssetMap {
    inner: Arc<AssetMapInner>,
}

struct AssetMapInner {
    config: MapConfig,
    gateway: Arc<dyn PersistenceGateway>,
    /// Single-writer lock over the whole tree. Mutations and the
    /// snapshot taken for persistence happen under one write hold, so a
    /// save can never observe a partially-linked node.
    state: RwLock<TreeState>,
}

/// The mutable tree state guarded by the writer lock.
struct TreeState {
    root_id: NodeId,
    registry: NodeRegistry,
    persisted_version: Option<VersionToken>,
    dirty: bool,
}

impl AssetMap {
    /// Loads the map from the gateway, or creates and persists a fresh
    /// root covering the configured world boundary when the store is
    /// empty.
    ///
    /// The root boundary is fixed at first creation; on subsequent opens
    /// the persisted boundary wins and a differing configured boundary
    /// only logs a warning.
    pub fn open_or_create(
        config: MapConfig,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> MapResult<AssetMap> {
        config.world_boundary().validate()?;

        let state = match gateway.load()? {
            Some(versioned) => {
                let registry = versioned.snapshot.restore()?;
                let root_id = versioned.snapshot.root_id;
                let root_boundary = registry.node(&root_id)?.boundary;
                if root_boundary != config.world_boundary() {
                    warn!(
                        "configured world boundary {} differs from persisted root {}; keeping persisted",
                        config.world_boundary(),
                        root_boundary
                    );
                }
                info!(
                    "loaded asset map: {} node(s) at version {}",
                    registry.len(),
                    versioned.version
                );
                TreeState {
                    root_id,
                    registry,
                    persisted_version: Some(versioned.version),
                    dirty: false,
                }
            }
            None => {
                info!("no persisted asset map found; creating root");
                let root = Node::new(config.world_boundary());
                let root_id = root.id;
                let mut registry = NodeRegistry::new();
                registry.register(root);
                let snapshot = Snapshot::capture(&registry, root_id)?;
                let version = gateway.save(&snapshot, None)?;
                TreeState {
                    root_id,
                    registry,
                    persisted_version: Some(version),
                    dirty: false,
                }
            }
        };

        Ok(AssetMap {
            inner: Arc::new(AssetMapInner {
                config,
                gateway,
                state: RwLock::new(state),
            }),
        })
    }

    /// Inserts an asset by its bounding box.
    ///
    /// Fails with [`MapError::OutOfBounds`] when the boundary does not
    /// intersect the world volume, leaving the tree unchanged. Duplicate
    /// inserts of the same asset are kept as duplicate entries; the tree
    /// structure itself never gains a second child for the same split.
    pub fn insert(&self, asset_id: impl Into<String>, boundary: Boundary) -> MapResult<()> {
        boundary.validate()?;
        let asset = AssetRef {
            asset_id: asset_id.into(),
            boundary,
        };

        let mut state = self.inner.state.write();
        debug!("insert '{}' at {}", asset.asset_id, asset.boundary);
        let root_id = state.root_id;
        state.insert_at(root_id, asset, Axis::X, 0, self.inner.config.max_depth())?;
        state.dirty = true;
        self.persist(&mut state)
    }

    /// Removes an asset from the node its boundary routes to.
    ///
    /// The descent mirrors insertion (same axis rotation and depth
    /// bound) but never creates children; a missing child on the path,
    /// or no matching entry at the reached node, is
    /// [`MapError::AssetNotFound`].
    pub fn remove(&self, asset_id: &str, boundary: Boundary) -> MapResult<()> {
        boundary.validate()?;

        let mut state = self.inner.state.write();
        debug!("remove '{asset_id}' at {boundary}");
        let root_id = state.root_id;
        state.remove_at(
            root_id,
            asset_id,
            &boundary,
            Axis::X,
            0,
            self.inner.config.max_depth(),
        )?;
        state.dirty = true;
        self.persist(&mut state)
    }

    /// Finds the smallest subtree answering "what exists in or near this
    /// region?".
    ///
    /// Without a boundary the whole tree is returned. A boundary
    /// enclosing a node selects that node's subtree; a boundary that
    /// only overlaps a node falls back to the node's parent, so the
    /// result is never smaller than the overlapped region. `Ok(None)`
    /// means the region lies entirely outside the world volume.
    pub fn query(&self, boundary: Option<Boundary>) -> MapResult<Option<SubtreeView>> {
        let state = self.inner.state.read();
        let Some(boundary) = boundary else {
            return SubtreeView::build(&state.registry, state.root_id).map(Some);
        };
        boundary.validate()?;
        let found = state.find_containing_node(None, state.root_id, &boundary)?;
        match found {
            Some(node_id) => SubtreeView::build(&state.registry, node_id).map(Some),
            None => Ok(None),
        }
    }

    /// The entire tree as a transferable view.
    pub fn whole_tree(&self) -> MapResult<SubtreeView> {
        let state = self.inner.state.read();
        SubtreeView::build(&state.registry, state.root_id)
    }

    /// The subtree beneath a known node id, if that node exists.
    pub fn subtree_of(&self, node_id: NodeId) -> MapResult<Option<SubtreeView>> {
        let state = self.inner.state.read();
        if !state.registry.contains(&node_id) {
            return Ok(None);
        }
        SubtreeView::build(&state.registry, node_id).map(Some)
    }

    /// Ids of the assets in or near the given region; all asset ids when
    /// no region is given.
    pub fn asset_ids_in_boundary(&self, boundary: Option<Boundary>) -> MapResult<Vec<String>> {
        let state = self.inner.state.read();
        let start = match boundary {
            Some(b) => {
                b.validate()?;
                state.find_containing_node(None, state.root_id, &b)?
            }
            None => Some(state.root_id),
        };
        let mut ids = Vec::new();
        if let Some(node_id) = start {
            state.collect_asset_ids(node_id, &mut ids)?;
        }
        Ok(ids)
    }

    /// The asset refs held directly by one node.
    ///
    /// Lets a consumer fetch content for a node that just became visible
    /// or near, without pulling the whole subtree.
    pub fn node_assets(&self, node_id: NodeId) -> Option<Vec<AssetRef>> {
        let state = self.inner.state.read();
        state.registry.get(&node_id).map(|node| node.assets.clone())
    }

    /// Re-attempts persistence after a failed save. No-op when the
    /// in-memory state already matches the store.
    pub fn flush(&self) -> MapResult<()> {
        let mut state = self.inner.state.write();
        if !state.dirty {
            return Ok(());
        }
        self.persist(&mut state)
    }

    pub fn root_id(&self) -> NodeId {
        self.inner.state.read().root_id
    }

    /// The fixed extent of the indexed world volume.
    pub fn world_boundary(&self) -> MapResult<Boundary> {
        let state = self.inner.state.read();
        Ok(state.registry.node(&state.root_id)?.boundary)
    }

    pub fn node_count(&self) -> usize {
        self.inner.state.read().registry.len()
    }

    pub fn asset_count(&self) -> usize {
        let state = self.inner.state.read();
        state.registry.values().map(|node| node.assets.len()).sum()
    }

    /// Whether the in-memory state has mutations the store has not seen.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.read().dirty
    }

    pub fn persisted_version(&self) -> Option<VersionToken> {
        self.inner.state.read().persisted_version.clone()
    }

    fn persist(&self, state: &mut TreeState) -> MapResult<()> {
        let snapshot = Snapshot::capture(&state.registry, state.root_id)?;
        let version = self
            .inner
            .gateway
            .save(&snapshot, state.persisted_version.as_ref())?;
        state.persisted_version = Some(version);
        state.dirty = false;
        Ok(())
    }
}

impl TreeState {
    /// Insertion descent. `axis` and `depth` are threaded explicitly so
    /// concurrent calls can never interfere through shared counters.
    fn insert_at(
        &mut self,
        node_id: NodeId,
        asset: AssetRef,
        axis: Axis,
        depth: u32,
        max_depth: u32,
    ) -> MapResult<()> {
        let node_boundary = self.registry.node(&node_id)?.boundary;
        if asset.boundary.classify(&node_boundary) == Intersection::AOutsideB {
            // Children are only entered when the asset fits inside them,
            // so this can only trip at the root.
            return Err(MapError::OutOfBounds);
        }

        let depth = depth + 1;
        if depth >= max_depth {
            warn!(
                "insert '{}': depth cap {} reached, attaching to current node",
                asset.asset_id, max_depth
            );
            self.registry.node_mut(&node_id)?.assets.push(asset);
            return Ok(());
        }

        let axis = axis.next();
        let left = node_boundary.half(axis, HalfSide::Lower);
        match asset.boundary.classify(&left) {
            Intersection::AInsideB => {
                let child_id = self.child_or_create(node_id, left, HalfSide::Lower)?;
                self.insert_at(child_id, asset, axis, depth, max_depth)
            }
            // BInsideA cannot occur against a half of a boundary the
            // asset already fit inside; treat it as a straddle.
            Intersection::AOverlapsB | Intersection::BInsideA => {
                self.registry.node_mut(&node_id)?.assets.push(asset);
                Ok(())
            }
            Intersection::AOutsideB => {
                let right = node_boundary.half(axis, HalfSide::Upper);
                let child_id = self.child_or_create(node_id, right, HalfSide::Upper)?;
                self.insert_at(child_id, asset, axis, depth, max_depth)
            }
        }
    }

    /// Returns the child on `side`, creating it lazily with the given
    /// boundary. The new node is registered and linked to its parent
    /// under the same exclusive borrow, so no dangling id or orphan is
    /// ever observable.
    fn child_or_create(
        &mut self,
        parent_id: NodeId,
        boundary: Boundary,
        side: HalfSide,
    ) -> MapResult<NodeId> {
        let parent = self.registry.node(&parent_id)?;
        let existing = match side {
            HalfSide::Lower => parent.left_child,
            HalfSide::Upper => parent.right_child,
        };
        if let Some(child_id) = existing {
            return Ok(child_id);
        }

        let child = Node::new(boundary);
        let child_id = child.id;
        self.registry.register(child);
        let parent = self.registry.node_mut(&parent_id)?;
        match side {
            HalfSide::Lower => parent.left_child = Some(child_id),
            HalfSide::Upper => parent.right_child = Some(child_id),
        }
        Ok(child_id)
    }

    /// Removal descent, mirroring [`TreeState::insert_at`] without
    /// creating children.
    fn remove_at(
        &mut self,
        node_id: NodeId,
        asset_id: &str,
        boundary: &Boundary,
        axis: Axis,
        depth: u32,
        max_depth: u32,
    ) -> MapResult<()> {
        let node = self.registry.node(&node_id)?;
        let node_boundary = node.boundary;
        let (left_child, right_child) = (node.left_child, node.right_child);

        if boundary.classify(&node_boundary) == Intersection::AOutsideB {
            return Err(MapError::OutOfBounds);
        }

        let depth = depth + 1;
        if depth >= max_depth {
            return self.detach(node_id, asset_id);
        }

        let axis = axis.next();
        let left = node_boundary.half(axis, HalfSide::Lower);
        match boundary.classify(&left) {
            Intersection::AInsideB => match left_child {
                Some(child_id) => {
                    self.remove_at(child_id, asset_id, boundary, axis, depth, max_depth)
                }
                None => Err(MapError::AssetNotFound(asset_id.to_string())),
            },
            Intersection::AOverlapsB | Intersection::BInsideA => self.detach(node_id, asset_id),
            Intersection::AOutsideB => match right_child {
                Some(child_id) => {
                    self.remove_at(child_id, asset_id, boundary, axis, depth, max_depth)
                }
                None => Err(MapError::AssetNotFound(asset_id.to_string())),
            },
        }
    }

    /// Removes the first entry matching `asset_id` from one node's asset
    /// list. The node itself stays, even when its list becomes empty.
    fn detach(&mut self, node_id: NodeId, asset_id: &str) -> MapResult<()> {
        let node = self.registry.node_mut(&node_id)?;
        match node.assets.iter().position(|a| a.asset_id == asset_id) {
            Some(index) => {
                node.assets.remove(index);
                Ok(())
            }
            None => Err(MapError::AssetNotFound(asset_id.to_string())),
        }
    }

    /// Selects the kd-subtree that answers a region query.
    ///
    /// A boundary enclosing this node selects it outright. A partial
    /// overlap selects the parent when there is one: never hand back a
    /// node smaller than the overlapped region, or content at the
    /// query's edge would be cut off. A boundary fully inside this node
    /// descends; when no existing child covers it, this node is the
    /// answer.
    fn find_containing_node(
        &self,
        parent: Option<NodeId>,
        node_id: NodeId,
        boundary: &Boundary,
    ) -> MapResult<Option<NodeId>> {
        let node = self.registry.node(&node_id)?;
        match boundary.classify(&node.boundary) {
            Intersection::AOutsideB => Ok(None),
            Intersection::BInsideA => Ok(Some(node_id)),
            Intersection::AOverlapsB => Ok(Some(parent.unwrap_or(node_id))),
            Intersection::AInsideB => {
                for child_id in [node.left_child, node.right_child].into_iter().flatten() {
                    if let Some(found) =
                        self.find_containing_node(Some(node_id), child_id, boundary)?
                    {
                        return Ok(Some(found));
                    }
                }
                // The halves tile this node, so a miss in both children
                // means the covering child simply does not exist yet.
                Ok(Some(node_id))
            }
        }
    }

    fn collect_asset_ids(&self, node_id: NodeId, out: &mut Vec<String>) -> MapResult<()> {
        let node = self.registry.node(&node_id)?;
        out.extend(node.assets.iter().map(|a| a.asset_id.clone()));
        for child_id in [node.left_child, node.right_child].into_iter().flatten() {
            self.collect_asset_ids(child_id, out)?;
        }
        Ok(())
    }
}
