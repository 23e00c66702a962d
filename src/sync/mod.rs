//! Synchronization Engine
//!
//! Mirrors a live host document into a target scene, one pass at a time.
//!
//! # Pass Structure
//!
//! [`SyncRegistry::synchronize`] runs four phases in order:
//!
//! 1. **Reset**: every node forgets whether it was touched or modified.
//! 2. **Scan**: the live model is enumerated; each live object touches (and
//!    on first sight creates) the node with its stable id, then reconciles
//!    the node against its change tags.
//! 3. **Clean**: a post-order sweep destroys every node the scan did not
//!    touch, together with its target element and asset reference.
//! 4. **Process**: a top-down walk writes new and modified nodes into the
//!    target scene.
//!
//! Synthesized nodes (scene root, layers, current view) are re-marked at the
//! start of every scan and never swept.

pub mod asset_cache;
pub mod context;
pub mod node;
pub mod process;
pub mod registry;
mod scan;

pub use asset_cache::{Acquired, AssetCache};
pub use context::{PassTimings, SyncContext, SyncReport};
pub use node::{
    ActorData, CameraData, CameraSetData, ChangeFlags, ElementData, HotlinkInstanceData,
    HotlinkNodeData, LayerData, LightData, NO_PASS_INDEX, NodeKey, NodeKind, SyncNode, UNTOUCHED,
};
pub use process::ProcessInfo;
pub use registry::SyncRegistry;
