use std::mem;

use bitflags::bitflags;
use glam::Affine3A;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::id::StableId;
use crate::live::{CameraParams, Header, LightParams, LiveSnapshot};
use crate::target::{AssetHandle, ElementHandle};

new_key_type! {
    /// Arena key of a [`SyncNode`] inside its registry.
    pub struct NodeKey;
}

/// `index_in_pass` of a node the current scan has not reached.
pub const UNTOUCHED: i32 = 0;
/// `index_in_pass` of a node that exists without a live ordinal.
pub const NO_PASS_INDEX: i32 = -1;

bitflags! {
    /// Why a node counts as modified in the current pass.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u8 {
        /// Created during this pass.
        const NEW        = 1 << 0;
        /// Generation id differs from the last pass.
        const GENERATION = 1 << 1;
        /// Modification stamp differs from the last pass.
        const STAMP      = 1 << 2;
        /// Moved under a different parent.
        const PARENT     = 1 << 3;
        /// Switched variant (e.g. an element lost its geometry).
        const KIND       = 1 << 4;
        /// Kind data without a host tag changed (names, chain order).
        const PROPERTIES = 1 << 5;
    }
}

/// Geometry-less element, materialized as an empty actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorData {
    pub name: String,
    pub type_name: String,
    pub layer_index: u32,
    pub transform: Affine3A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerData {
    pub index: u32,
    /// Host visibility as of the last scan.
    pub hidden: bool,
}

/// Element with geometry; holds one reference on its deduplicated asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub type_name: String,
    pub layer_index: u32,
    pub transform: Affine3A,
    pub asset: Option<AssetHandle>,
    pub content_hash: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSetData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraData {
    /// Position in the camera-set chain; `None` for the current view.
    pub chain_index: Option<usize>,
    pub params: CameraParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightData {
    pub light_index: u32,
    pub params: LightParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotlinkNodeData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotlinkInstanceData {
    pub transform: Affine3A,
}

/// Per-kind state of a sync node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scene,
    Actor(ActorData),
    Layer(LayerData),
    Element(ElementData),
    CameraSet(CameraSetData),
    Camera(CameraData),
    Light(LightData),
    HotlinkRoot,
    HotlinkNode(HotlinkNodeData),
    HotlinkInstance(HotlinkInstanceData),
}

impl NodeKind {
    /// Kind for a live element: `Element` when it has geometry, `Actor` otherwise.
    #[must_use]
    pub fn from_header(header: &Header) -> Self {
        if header.has_geometry {
            NodeKind::Element(ElementData {
                name: header.name.clone(),
                type_name: header.type_name.clone(),
                layer_index: header.layer_index,
                transform: header.transform,
                asset: None,
                content_hash: None,
            })
        } else {
            NodeKind::Actor(ActorData {
                name: header.name.clone(),
                type_name: header.type_name.clone(),
                layer_index: header.layer_index,
                transform: header.transform,
            })
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Scene => "Scene",
            NodeKind::Actor(_) => "Actor",
            NodeKind::Layer(_) => "Layer",
            NodeKind::Element(_) => "Element",
            NodeKind::CameraSet(_) => "CameraSet",
            NodeKind::Camera(_) => "Camera",
            NodeKind::Light(_) => "Light",
            NodeKind::HotlinkRoot => "HotlinkRoot",
            NodeKind::HotlinkNode(_) => "HotlinkNode",
            NodeKind::HotlinkInstance(_) => "HotlinkInstance",
        }
    }

    #[inline]
    #[must_use]
    pub fn same_variant(&self, other: &NodeKind) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Scene root, layers and the current-view camera exist outside the
    /// mark-and-sweep lifecycle.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        match self {
            NodeKind::Scene | NodeKind::Layer(_) => true,
            NodeKind::Camera(camera) => camera.chain_index.is_none(),
            _ => false,
        }
    }

    /// Refreshes header-derived fields of an element or actor in place,
    /// keeping its asset reference.
    pub(crate) fn absorb_header(&mut self, header: &Header) {
        match self {
            NodeKind::Element(data) => {
                data.name.clone_from(&header.name);
                data.type_name.clone_from(&header.type_name);
                data.layer_index = header.layer_index;
                data.transform = header.transform;
            }
            NodeKind::Actor(data) => {
                data.name.clone_from(&header.name);
                data.type_name.clone_from(&header.type_name);
                data.layer_index = header.layer_index;
                data.transform = header.transform;
            }
            _ => {}
        }
    }
}

/// One tracked identity in the mirrored hierarchy.
///
/// # Lifecycle
///
/// ```text
/// New --reconcile--> Clean | Modified --sweep survives--> ... --sweep fails--> Destroyed
/// ```
///
/// [`reset_for_new_pass`](Self::reset_for_new_pass) returns a node to the
/// pre-pass baseline; the scan then touches and reconciles it. Only the
/// registry's sweep destroys nodes.
///
/// Hierarchy links live in the node but are only edited by
/// [`SyncRegistry::attach`](crate::sync::SyncRegistry::attach) and
/// [`SyncRegistry::detach`](crate::sync::SyncRegistry::detach), which keep
/// both ends consistent.
#[derive(Debug, Clone)]
pub struct SyncNode {
    id: StableId,
    index_in_pass: i32,
    generation_id: u32,
    modification_stamp: u64,
    changes: ChangeFlags,

    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: SmallVec<[NodeKey; 4]>,

    pub kind: NodeKind,
    pub(crate) target: Option<ElementHandle>,
}

impl SyncNode {
    #[must_use]
    pub fn new(id: StableId, kind: NodeKind) -> Self {
        Self {
            id,
            index_in_pass: UNTOUCHED,
            generation_id: 0,
            modification_stamp: 0,
            changes: ChangeFlags::NEW,
            parent: None,
            children: SmallVec::new(),
            kind,
            target: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> StableId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn index_in_pass(&self) -> i32 {
        self.index_in_pass
    }

    #[inline]
    #[must_use]
    pub fn generation_id(&self) -> u32 {
        self.generation_id
    }

    #[inline]
    #[must_use]
    pub fn modification_stamp(&self) -> u64 {
        self.modification_stamp
    }

    #[inline]
    #[must_use]
    pub fn changes(&self) -> ChangeFlags {
        self.changes
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.changes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.index_in_pass != UNTOUCHED
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Element this node materialized in the target scene, if any yet.
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<ElementHandle> {
        self.target
    }

    /// Takes the tags of `snapshot` and returns whether the node is modified.
    /// Does not look at children.
    pub fn reconcile(&mut self, snapshot: LiveSnapshot) -> bool {
        if self.generation_id != snapshot.generation_id {
            self.changes |= ChangeFlags::GENERATION;
        }
        if self.modification_stamp != snapshot.modification_stamp {
            self.changes |= ChangeFlags::STAMP;
        }
        self.generation_id = snapshot.generation_id;
        self.modification_stamp = snapshot.modification_stamp;
        self.is_modified()
    }

    /// Records that the scan reached this node at live ordinal `pass_index`.
    pub fn mark_touched(&mut self, pass_index: i32) {
        debug_assert_ne!(pass_index, UNTOUCHED, "touching with the untouched marker");
        self.index_in_pass = pass_index;
    }

    /// Keeps the node alive through this pass's sweep without a live ordinal.
    pub fn mark_permanently_existing(&mut self) {
        self.index_in_pass = NO_PASS_INDEX;
    }

    /// Clears the touch marker and change flags. A node that was never
    /// materialized keeps [`ChangeFlags::NEW`] until it is.
    pub fn reset_for_new_pass(&mut self) {
        self.index_in_pass = UNTOUCHED;
        self.changes = if self.target.is_none() {
            ChangeFlags::NEW
        } else {
            ChangeFlags::empty()
        };
    }

    pub fn mark_modified(&mut self, reason: ChangeFlags) {
        self.changes |= reason;
    }

    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.kind.is_synthesized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_node() -> SyncNode {
        let mut node = SyncNode::new(StableId::from_u128(1), NodeKind::Scene);
        node.target = Some(ElementHandle::default());
        node
    }

    #[test]
    fn test_new_node_is_modified() {
        let mut node = element_node();
        assert!(node.reconcile(LiveSnapshot::new(0, 0)));
        assert!(node.changes().contains(ChangeFlags::NEW));
    }

    #[test]
    fn test_state_machine_follows_stamps() {
        let mut node = element_node();
        assert!(node.reconcile(LiveSnapshot::stamp_only(5)));

        node.reset_for_new_pass();
        assert!(!node.reconcile(LiveSnapshot::stamp_only(5)));

        node.reset_for_new_pass();
        assert!(node.reconcile(LiveSnapshot::stamp_only(6)));
        assert_eq!(node.changes(), ChangeFlags::STAMP);

        node.reset_for_new_pass();
        assert!(node.reconcile(LiveSnapshot::new(2, 6)));
        assert_eq!(node.changes(), ChangeFlags::GENERATION);
    }

    #[test]
    fn test_touch_markers() {
        let mut node = element_node();
        assert!(!node.is_touched());
        node.mark_touched(4);
        assert_eq!(node.index_in_pass(), 4);
        node.mark_permanently_existing();
        assert_eq!(node.index_in_pass(), NO_PASS_INDEX);
        node.reset_for_new_pass();
        assert!(!node.is_touched());
        assert!(!node.is_modified());
    }

    #[test]
    fn test_unmaterialized_node_stays_new() {
        let mut node = SyncNode::new(StableId::from_u128(2), NodeKind::HotlinkRoot);
        node.reset_for_new_pass();
        assert_eq!(node.changes(), ChangeFlags::NEW);
    }

    #[test]
    fn test_synthesized_kinds() {
        assert!(NodeKind::Scene.is_synthesized());
        assert!(NodeKind::Layer(LayerData { index: 3, hidden: false }).is_synthesized());
        assert!(NodeKind::Camera(CameraData { chain_index: None, params: CameraParams::default() }).is_synthesized());
        assert!(!NodeKind::Camera(CameraData { chain_index: Some(0), params: CameraParams::default() }).is_synthesized());
        assert!(!NodeKind::HotlinkRoot.is_synthesized());
    }

    #[test]
    fn test_kind_from_header() {
        let mut header = Header::default();
        assert!(matches!(NodeKind::from_header(&header), NodeKind::Element(_)));
        header.has_geometry = false;
        assert!(matches!(NodeKind::from_header(&header), NodeKind::Actor(_)));
    }
}
