//! Target Scene
//!
//! The write side of a synchronization pass. Every surviving sync node owns
//! at most one element in the target scene, created and updated through
//! [`TargetScene`]. Mesh assets are added once per distinct content and
//! shared between elements by the registry's asset cache.

pub mod memory;

pub use memory::{MemoryAsset, MemoryScene, SceneCounters, TargetElement};

use glam::Affine3A;
use slotmap::new_key_type;

use crate::live::{CameraParams, LightParams, MeshData};

new_key_type! {
    /// An element materialized in the target scene.
    pub struct ElementHandle;
    /// A mesh asset registered with the target scene.
    pub struct AssetHandle;
}

/// What a target element carries besides its transform.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetPayload {
    /// Grouping actor without content.
    Empty,
    Mesh(AssetHandle),
    Light(LightParams),
    Camera(CameraParams),
}

/// Full description of a target element, sent on every create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttrs {
    pub name: String,
    /// Unique label, the stable id of the owning sync node.
    pub label: String,
    pub parent: Option<ElementHandle>,
    pub transform: Affine3A,
    pub payload: TargetPayload,
    pub visible: bool,
}

/// Write access to the scene being built.
pub trait TargetScene {
    /// Creates a new element, or updates `existing` in place when it is
    /// still alive. Returns the handle to use from now on.
    fn create_or_update_node(
        &mut self,
        existing: Option<ElementHandle>,
        attrs: &NodeAttrs,
    ) -> ElementHandle;

    fn remove_node(&mut self, handle: ElementHandle);

    fn add_asset(&mut self, mesh: &MeshData) -> AssetHandle;

    fn remove_asset(&mut self, handle: AssetHandle);

    fn set_metadata(&mut self, handle: ElementHandle, metadata: &[(String, String)]);

    fn remove_metadata(&mut self, handle: ElementHandle);

    /// Called once per pass with every element created during that pass.
    fn initialize_nodes(&mut self, _handles: &[ElementHandle]) {}
}
