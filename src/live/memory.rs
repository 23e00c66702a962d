use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Affine3A, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::id::StableId;
use crate::live::LiveModel;
use crate::live::records::{
    BoundingBox, CameraParams, CameraRecord, CameraSetRecord, ElementRef, Header, HotlinkKind,
    HotlinkRecord, LightParams, MeshData, ViewRecord,
};

/// One element of a [`MemoryModel`].
///
/// The `Option` fields model host read failures: `None` bounds, header or
/// light record behave exactly like an unreadable record on a real host.
#[derive(Debug, Clone)]
pub struct MemoryElement {
    pub id: StableId,
    pub generation_id: u32,
    pub modification_stamp: u64,
    pub valid: bool,
    pub bounds: Option<BoundingBox>,
    pub header: Option<Header>,
    pub lights: Vec<Option<LightParams>>,
    pub mesh: Option<MeshData>,
}

impl MemoryElement {
    /// A valid unit-box element on layer 0 with no geometry.
    #[must_use]
    pub fn new(id: StableId, name: &str) -> Self {
        Self {
            id,
            generation_id: 1,
            modification_stamp: 1,
            valid: true,
            bounds: Some(BoundingBox::new(Vec3::ZERO, Vec3::ONE)),
            header: Some(Header {
                name: name.to_string(),
                type_name: "Object".to_string(),
                has_geometry: false,
                ..Default::default()
            }),
            lights: Vec::new(),
            mesh: None,
        }
    }

    #[must_use]
    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        if let Some(header) = &mut self.header {
            header.has_geometry = true;
        }
        self.mesh = Some(mesh);
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer_index: u32) -> Self {
        if let Some(header) = &mut self.header {
            header.layer_index = layer_index;
        }
        self
    }

    #[must_use]
    pub fn with_stamp(mut self, modification_stamp: u64) -> Self {
        self.modification_stamp = modification_stamp;
        self
    }

    #[must_use]
    pub fn with_light(mut self, light: LightParams) -> Self {
        self.lights.push(Some(light));
        self
    }

    #[must_use]
    pub fn with_hotlink_instance(mut self, instance: StableId) -> Self {
        if let Some(header) = &mut self.header {
            header.hotlink_instance = Some(instance);
        }
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        if let Some(header) = &mut self.header {
            header.transform = transform;
        }
        self
    }
}

/// In-memory [`LiveModel`].
///
/// Element ordinals are positions in insertion order; removing an element
/// shifts later ordinals, exactly like a host that re-enumerates its document.
#[derive(Debug, Default)]
pub struct MemoryModel {
    elements: Vec<MemoryElement>,
    camera_sets: Vec<CameraSetRecord>,
    cameras: FxHashMap<StableId, CameraRecord>,
    current_view: Option<ViewRecord>,
    hotlinks: Vec<HotlinkRecord>,
    layer_names: FxHashMap<u32, String>,
    hidden_layers: FxHashSet<u32>,
    layer_name_queries: AtomicUsize,
    mesh_queries: AtomicUsize,
}

impl MemoryModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Elements
    // ========================================================================

    pub fn add_element(&mut self, element: MemoryElement) -> StableId {
        let id = element.id;
        self.elements.push(element);
        id
    }

    pub fn element_mut(&mut self, id: StableId) -> Option<&mut MemoryElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn remove_element(&mut self, id: StableId) -> Option<MemoryElement> {
        let pos = self.elements.iter().position(|e| e.id == id)?;
        Some(self.elements.remove(pos))
    }

    /// Bumps the modification stamp, as a host does on a property edit.
    pub fn touch(&mut self, id: StableId) {
        if let Some(element) = self.element_mut(id) {
            element.modification_stamp += 1;
        }
    }

    #[must_use]
    pub fn elements(&self) -> &[MemoryElement] {
        &self.elements
    }

    pub fn clear_elements(&mut self) {
        self.elements.clear();
    }

    // ========================================================================
    // Layers
    // ========================================================================

    pub fn set_layer_hidden(&mut self, layer_index: u32, hidden: bool) {
        if hidden {
            self.hidden_layers.insert(layer_index);
        } else {
            self.hidden_layers.remove(&layer_index);
        }
    }

    pub fn set_layer_name(&mut self, layer_index: u32, name: &str) {
        self.layer_names.insert(layer_index, name.to_string());
    }

    /// How many times the engine asked for a layer name.
    #[must_use]
    pub fn layer_name_queries(&self) -> usize {
        self.layer_name_queries.load(Ordering::Relaxed)
    }

    /// How many times the engine asked for element geometry.
    #[must_use]
    pub fn mesh_queries(&self) -> usize {
        self.mesh_queries.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    /// Adds a camera set whose cameras are chained in the given order.
    /// Returns the set id and the camera ids.
    pub fn add_camera_set(
        &mut self,
        name: &str,
        cameras: Vec<CameraParams>,
    ) -> (StableId, Vec<StableId>) {
        let set_id = StableId::new_random();
        let ids: Vec<StableId> = cameras.iter().map(|_| StableId::new_random()).collect();

        for (i, params) in cameras.into_iter().enumerate() {
            let record = CameraRecord {
                id: ids[i],
                next: ids.get(i + 1).copied(),
                modification_stamp: 1,
                params,
            };
            self.cameras.insert(record.id, record);
        }

        self.camera_sets.push(CameraSetRecord {
            id: set_id,
            name: name.to_string(),
            first_camera: ids.first().copied(),
        });
        (set_id, ids)
    }

    pub fn remove_camera_set(&mut self, set_id: StableId) {
        let Some(pos) = self.camera_sets.iter().position(|s| s.id == set_id) else {
            return;
        };
        let set = self.camera_sets.remove(pos);
        let mut next = set.first_camera;
        while let Some(id) = next {
            next = self.cameras.remove(&id).and_then(|c| c.next);
        }
    }

    pub fn camera_set_mut(&mut self, set_id: StableId) -> Option<&mut CameraSetRecord> {
        self.camera_sets.iter_mut().find(|s| s.id == set_id)
    }

    pub fn camera_mut(&mut self, id: StableId) -> Option<&mut CameraRecord> {
        self.cameras.get_mut(&id)
    }

    /// Drops a camera record while leaving the chain pointing at it.
    pub fn forget_camera(&mut self, id: StableId) -> Option<CameraRecord> {
        self.cameras.remove(&id)
    }

    pub fn set_current_view(&mut self, view: Option<ViewRecord>) {
        self.current_view = view;
    }

    // ========================================================================
    // Hotlinks
    // ========================================================================

    pub fn add_hotlink_module(&mut self, parent: Option<StableId>, name: &str) -> StableId {
        let id = StableId::new_random();
        self.hotlinks.push(HotlinkRecord {
            id,
            parent,
            kind: HotlinkKind::Module {
                name: name.to_string(),
            },
            modification_stamp: 1,
        });
        id
    }

    pub fn add_hotlink_instance(&mut self, module: StableId, transform: Affine3A) -> StableId {
        let id = StableId::new_random();
        self.hotlinks.push(HotlinkRecord {
            id,
            parent: Some(module),
            kind: HotlinkKind::Instance { transform },
            modification_stamp: 1,
        });
        id
    }

    pub fn remove_hotlink(&mut self, id: StableId) {
        self.hotlinks.retain(|h| h.id != id);
    }

    /// Reverses host enumeration order of hotlink records.
    pub fn reverse_hotlinks(&mut self) {
        self.hotlinks.reverse();
    }

    fn find(&self, element: &ElementRef) -> Option<&MemoryElement> {
        self.elements
            .get(element.index)
            .filter(|e| e.id == element.id)
    }
}

impl LiveModel for MemoryModel {
    fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn element(&self, index: usize) -> Option<ElementRef> {
        self.elements.get(index).map(|e| ElementRef {
            id: e.id,
            index,
            generation_id: e.generation_id,
            modification_stamp: e.modification_stamp,
        })
    }

    fn is_valid(&self, element: &ElementRef) -> bool {
        self.find(element).is_some_and(|e| e.valid)
    }

    fn bounding_box(&self, element: &ElementRef) -> Option<BoundingBox> {
        self.find(element)?.bounds
    }

    fn read_header(&self, element: &ElementRef) -> Option<Header> {
        self.find(element)?.header.clone()
    }

    fn light_count(&self, element: &ElementRef) -> u32 {
        self.find(element).map_or(0, |e| e.lights.len() as u32)
    }

    fn light(&self, element: &ElementRef, light_index: u32) -> Option<LightParams> {
        self.find(element)?
            .lights
            .get(light_index as usize)?
            .clone()
    }

    fn mesh(&self, id: StableId) -> Option<MeshData> {
        self.mesh_queries.fetch_add(1, Ordering::Relaxed);
        self.elements.iter().find(|e| e.id == id)?.mesh.clone()
    }

    fn camera_sets(&self) -> Vec<CameraSetRecord> {
        self.camera_sets.clone()
    }

    fn camera(&self, id: StableId) -> Option<CameraRecord> {
        self.cameras.get(&id).cloned()
    }

    fn current_view(&self) -> Option<ViewRecord> {
        self.current_view.clone()
    }

    fn hotlinks(&self) -> Vec<HotlinkRecord> {
        self.hotlinks.clone()
    }

    fn layer_name(&self, layer_index: u32) -> Option<String> {
        self.layer_name_queries.fetch_add(1, Ordering::Relaxed);
        self.layer_names.get(&layer_index).cloned()
    }

    fn layer_hidden(&self, layer_index: u32) -> bool {
        self.hidden_layers.contains(&layer_index)
    }
}
