//! # Scenemap - A persistent kd-tree asset map
//!
//! This crate indexes spatially-tagged content ("assets") inside a fixed
//! three-dimensional world volume, so a scene server can answer "what
//! exists in or near this region?" as a remote viewpoint moves, and can
//! accept new assets by their bounding box.
//!
//! ## Features
//!
//! - **Recursive midpoint partitioning**: each node halves its volume
//!   along an axis that rotates with depth; children are created lazily
//!   on first descent
//! - **Straddle-aware routing**: an asset crossing a split plane stays at
//!   the node whose plane it crosses, so range queries never truncate
//!   content at a region's edge
//! - **Bounded descent**: a configurable depth cap turns pathological
//!   insertions into coarser grouping instead of unbounded recursion
//! - **Flat id registry**: parent→child links are ids into one map, so
//!   the whole tree serializes without cycles
//! - **Versioned persistence**: every successful mutation is saved as one
//!   whole-document snapshot through a pluggable gateway, with
//!   compare-and-swap version tokens against lost updates
//! - **Transferable views**: subtrees are handed out as read-only
//!   projections with opaque ids, never live handles
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use scenemap::{AssetMap, Boundary, MapConfig, MemoryGateway};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MapConfig::new()
//!     .with_world_boundary(Boundary::new(-100.0, -100.0, -100.0, 100.0, 100.0, 100.0));
//! let map = AssetMap::open_or_create(config, Arc::new(MemoryGateway::new()))?;
//!
//! map.insert("teapot", Boundary::new(-60.0, -60.0, -60.0, -40.0, -40.0, -40.0))?;
//!
//! let view = map.query(Some(Boundary::new(-70.0, -70.0, -70.0, -30.0, -30.0, -30.0)))?;
//! assert!(view.unwrap().asset_ids().contains(&"teapot".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod boundary;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod map;
pub mod node;
pub mod snapshot;
pub mod subtree;

pub use boundary::{Axis, Boundary, HalfSide, Intersection};
pub use config::{MapConfig, DEFAULT_MAX_DEPTH, DEFAULT_WORLD_BOUNDARY};
pub use errors::{MapError, MapResult};
pub use gateway::{check_revision, MemoryGateway, PersistenceGateway};
pub use map::AssetMap;
pub use node::{AssetRef, Node, NodeId, NodeRegistry};
pub use snapshot::{Snapshot, VersionToken, VersionedSnapshot};
pub use subtree::SubtreeView;
