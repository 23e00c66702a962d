use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::live::MeshData;
use crate::target::{AssetHandle, ElementHandle, NodeAttrs, TargetScene};

/// An element held by a [`MemoryScene`].
#[derive(Debug, Clone)]
pub struct TargetElement {
    pub attrs: NodeAttrs,
    pub(crate) parent: Option<ElementHandle>,
    pub(crate) children: Vec<ElementHandle>,
    pub initialized: bool,
}

impl TargetElement {
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ElementHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[ElementHandle] {
        &self.children
    }
}

#[derive(Debug, Clone)]
pub struct MemoryAsset {
    pub content_hash: u128,
    pub triangle_count: usize,
}

/// Call counts, for asserting how much work a pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneCounters {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub assets_added: usize,
    pub assets_removed: usize,
    pub initialized: usize,
}

/// In-memory [`TargetScene`].
///
/// Keeps the same parent/child bookkeeping as a real scene graph so tests can
/// check the mirrored hierarchy.
#[derive(Debug, Default)]
pub struct MemoryScene {
    elements: SlotMap<ElementHandle, TargetElement>,
    root_elements: Vec<ElementHandle>,
    assets: SlotMap<AssetHandle, MemoryAsset>,
    metadata: FxHashMap<ElementHandle, Vec<(String, String)>>,
    counters: SceneCounters,
}

impl MemoryScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn element(&self, handle: ElementHandle) -> Option<&TargetElement> {
        self.elements.get(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.elements.contains_key(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn root_elements(&self) -> &[ElementHandle] {
        &self.root_elements
    }

    /// Finds an element by the label (stable id) it was created with.
    #[must_use]
    pub fn find_by_label(&self, label: &str) -> Option<ElementHandle> {
        self.elements
            .iter()
            .find_map(|(handle, e)| (e.attrs.label == label).then_some(handle))
    }

    #[must_use]
    pub fn asset(&self, handle: AssetHandle) -> Option<&MemoryAsset> {
        self.assets.get(handle)
    }

    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn metadata(&self, handle: ElementHandle) -> Option<&[(String, String)]> {
        self.metadata.get(&handle).map(Vec::as_slice)
    }

    #[must_use]
    pub fn counters(&self) -> SceneCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = SceneCounters::default();
    }

    fn unlink(&mut self, handle: ElementHandle, parent: Option<ElementHandle>) {
        if let Some(p) = parent {
            if let Some(parent) = self.elements.get_mut(p)
                && let Some(pos) = parent.children.iter().position(|&x| x == handle)
            {
                parent.children.remove(pos);
            }
        } else if let Some(pos) = self.root_elements.iter().position(|&x| x == handle) {
            self.root_elements.remove(pos);
        }
    }

    fn link(&mut self, handle: ElementHandle, parent: Option<ElementHandle>) {
        match parent.and_then(|p| self.elements.get_mut(p).map(|e| (p, e))) {
            Some((p, parent)) => {
                parent.children.push(handle);
                if let Some(e) = self.elements.get_mut(handle) {
                    e.parent = Some(p);
                }
            }
            None => {
                if parent.is_some() {
                    log::error!("Parent element not found, element placed at root");
                }
                self.root_elements.push(handle);
                if let Some(e) = self.elements.get_mut(handle) {
                    e.parent = None;
                }
            }
        }
    }
}

impl TargetScene for MemoryScene {
    fn create_or_update_node(
        &mut self,
        existing: Option<ElementHandle>,
        attrs: &NodeAttrs,
    ) -> ElementHandle {
        if let Some(handle) = existing
            && let Some(element) = self.elements.get_mut(handle)
        {
            let old_parent = element.parent;
            element.attrs = attrs.clone();
            self.counters.updated += 1;
            if old_parent != attrs.parent {
                self.unlink(handle, old_parent);
                self.link(handle, attrs.parent);
            }
            return handle;
        }

        let handle = self.elements.insert(TargetElement {
            attrs: attrs.clone(),
            parent: None,
            children: Vec::new(),
            initialized: false,
        });
        self.link(handle, attrs.parent);
        self.counters.created += 1;
        handle
    }

    fn remove_node(&mut self, handle: ElementHandle) {
        let Some(element) = self.elements.get(handle) else {
            log::warn!("Removing unknown target element");
            return;
        };
        let parent = element.parent;
        let orphans = element.children.clone();

        self.unlink(handle, parent);
        for orphan in orphans {
            if let Some(e) = self.elements.get_mut(orphan) {
                e.parent = None;
            }
            self.root_elements.push(orphan);
        }

        self.metadata.remove(&handle);
        self.elements.remove(handle);
        self.counters.removed += 1;
    }

    fn add_asset(&mut self, mesh: &MeshData) -> AssetHandle {
        self.counters.assets_added += 1;
        self.assets.insert(MemoryAsset {
            content_hash: mesh.content_hash(),
            triangle_count: mesh.triangle_count(),
        })
    }

    fn remove_asset(&mut self, handle: AssetHandle) {
        if self.assets.remove(handle).is_some() {
            self.counters.assets_removed += 1;
        } else {
            log::warn!("Removing unknown asset");
        }
    }

    fn set_metadata(&mut self, handle: ElementHandle, metadata: &[(String, String)]) {
        if self.elements.contains_key(handle) {
            self.metadata.insert(handle, metadata.to_vec());
        }
    }

    fn remove_metadata(&mut self, handle: ElementHandle) {
        self.metadata.remove(&handle);
    }

    fn initialize_nodes(&mut self, handles: &[ElementHandle]) {
        for &handle in handles {
            if let Some(e) = self.elements.get_mut(handle) {
                e.initialized = true;
                self.counters.initialized += 1;
            }
        }
    }
}
