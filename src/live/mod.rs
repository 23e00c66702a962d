//! Live Model
//!
//! The read side of a synchronization pass. A host application exposes its
//! document through [`LiveModel`]; the engine only ever reads from it.
//!
//! - [`LiveModel`]: element enumeration, headers, lights, cameras, hotlinks
//! - [`records`]: plain snapshot types handed across the trait
//! - [`MemoryModel`]: an in-memory host, used by tests, benches and tools

pub mod memory;
pub mod records;

pub use memory::{MemoryElement, MemoryModel};
pub use records::{
    BoundingBox, CameraParams, CameraRecord, CameraSetRecord, ElementRef, Header, HotlinkKind,
    HotlinkRecord, LightKind, LightParams, LiveSnapshot, MeshData, ViewRecord,
};

use crate::id::StableId;

/// Read access to the host document.
///
/// Calls may block on the host; the engine treats each one as an opaque
/// synchronous call. Optional capabilities have empty defaults.
pub trait LiveModel {
    /// Number of element ordinals to enumerate.
    fn element_count(&self) -> usize;

    /// Element at `index`, or `None` if the host cannot produce it.
    fn element(&self, index: usize) -> Option<ElementRef>;

    fn is_valid(&self, _element: &ElementRef) -> bool {
        true
    }

    fn bounding_box(&self, element: &ElementRef) -> Option<BoundingBox>;

    fn read_header(&self, element: &ElementRef) -> Option<Header>;

    fn light_count(&self, _element: &ElementRef) -> u32 {
        0
    }

    /// Light record `light_index` of `element`; `None` if unreadable.
    fn light(&self, _element: &ElementRef, _light_index: u32) -> Option<LightParams> {
        None
    }

    /// Geometry of an element. Only queried for elements being processed.
    fn mesh(&self, id: StableId) -> Option<MeshData>;

    fn camera_sets(&self) -> Vec<CameraSetRecord> {
        Vec::new()
    }

    fn camera(&self, _id: StableId) -> Option<CameraRecord> {
        None
    }

    fn current_view(&self) -> Option<ViewRecord> {
        None
    }

    fn hotlinks(&self) -> Vec<HotlinkRecord> {
        Vec::new()
    }

    fn layer_name(&self, _layer_index: u32) -> Option<String> {
        None
    }

    /// Elements on a hidden layer are left out of the pass.
    fn layer_hidden(&self, _layer_index: u32) -> bool {
        false
    }
}
