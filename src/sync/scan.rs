//! Scan phase: walks the live model and touches one node per live object.
//!
//! Order: synthesized nodes, hotlinks, elements with their lights, cameras.
//! Node creation goes through `get_or_create`, so nothing here depends on a
//! parent having been seen first except where noted.

use rustc_hash::FxHashSet;

use crate::errors::{Result, SyncError};
use crate::id::{CURRENT_VIEW_CAMERA_ID, HOTLINK_ROOT_ID, StableId, light_id};
use crate::live::{CameraSetRecord, ElementRef, Header, HotlinkKind, LiveSnapshot};
use crate::sync::context::SyncContext;
use crate::sync::node::{
    CameraData, CameraSetData, ChangeFlags, HotlinkInstanceData, HotlinkNodeData, LightData,
    NodeKey, NodeKind, SyncNode,
};

impl SyncContext<'_> {
    pub(crate) fn scan(&mut self) {
        // Records without a host ordinal are numbered after the elements.
        self.ordinal = i32::try_from(self.model.element_count()).unwrap_or(i32::MAX);
        self.registry.mark_synthesized();

        if self.registry.settings.export_hotlinks {
            self.scan_hotlinks();
        }
        self.scan_elements();
        if self.registry.settings.export_cameras {
            self.scan_cameras();
        }

        log::debug!(
            "Scan: {} elements, {} skipped, {} hidden, {} new nodes",
            self.report.scanned,
            self.report.skipped,
            self.report.hidden,
            self.registry.pass.created
        );
    }

    /// Ordinal for hotlinks, camera sets and cameras.
    fn next_ordinal(&mut self) -> i32 {
        self.ordinal = self.ordinal.saturating_add(1);
        self.ordinal
    }

    /// Touches the node for `id`, creating it from `kind` or refreshing the
    /// kind of an existing node. With `parent`, also places it there.
    fn touch_record(
        &mut self,
        id: StableId,
        parent: Option<NodeKey>,
        kind: NodeKind,
        snapshot: LiveSnapshot,
    ) -> Result<NodeKey> {
        let key = match self.registry.find(id) {
            Some(key) => {
                let node = &mut self.registry.nodes[key];
                if node.is_touched() {
                    return Err(SyncError::DuplicateId { id });
                }
                if node.kind.same_variant(&kind) {
                    if untracked_change(&node.kind, &kind) {
                        node.mark_modified(ChangeFlags::PROPERTIES);
                    }
                    node.kind = kind;
                } else {
                    self.registry.change_kind(key, kind, self.target);
                }
                key
            }
            None => self.registry.get_or_create(id, || SyncNode::new(id, kind)),
        };

        if let Some(parent) = parent {
            self.registry.ensure_parent(key, parent)?;
        }
        let ordinal = self.next_ordinal();
        let node = &mut self.registry.nodes[key];
        node.mark_touched(ordinal);
        node.reconcile(snapshot);
        Ok(key)
    }

    // ========================================================================
    // Hotlinks
    // ========================================================================

    /// Touches every hotlink record first, then links parents, so the host's
    /// enumeration order does not matter.
    fn scan_hotlinks(&mut self) {
        let records = self.model.hotlinks();
        if records.is_empty() {
            return;
        }

        let root = self.registry.root();
        let hotlink_root = match self.registry.get_or_create_under(HOTLINK_ROOT_ID, root, || {
            SyncNode::new(HOTLINK_ROOT_ID, NodeKind::HotlinkRoot)
        }) {
            Ok(key) => key,
            Err(err) => {
                log::error!("Cannot place hotlink root: {err}");
                return;
            }
        };
        self.registry.nodes[hotlink_root].mark_permanently_existing();

        let mut keys = Vec::with_capacity(records.len());
        for record in &records {
            let kind = match &record.kind {
                HotlinkKind::Module { name } => NodeKind::HotlinkNode(HotlinkNodeData { name: name.clone() }),
                HotlinkKind::Instance { transform } => {
                    NodeKind::HotlinkInstance(HotlinkInstanceData { transform: *transform })
                }
            };
            let snapshot = LiveSnapshot::stamp_only(record.modification_stamp);
            // Nested records are placed once every parent has been touched.
            let parent = record.parent.is_none().then_some(hotlink_root);
            match self.touch_record(record.id, parent, kind, snapshot) {
                Ok(key) => keys.push(Some(key)),
                Err(err) => {
                    self.skip(&err);
                    keys.push(None);
                }
            }
        }

        for (record, key) in records.iter().zip(keys) {
            let (Some(key), Some(parent_id)) = (key, record.parent) else {
                continue;
            };
            let parent = self.registry.find(parent_id).filter(|&p| {
                let node = &self.registry.nodes[p];
                node.is_touched() && is_hotlink(&node.kind)
            });
            let parent = parent.unwrap_or_else(|| {
                log::warn!("Hotlink {} names unknown parent {parent_id}", record.id);
                hotlink_root
            });
            if let Err(err) = self.registry.ensure_parent(key, parent) {
                log::warn!("Hotlink {} placed under the hotlink root: {err}", record.id);
                if let Err(err) = self.registry.ensure_parent(key, hotlink_root) {
                    log::error!("Cannot place hotlink {}: {err}", record.id);
                }
            }
        }
    }

    // ========================================================================
    // Elements
    // ========================================================================

    fn scan_elements(&mut self) {
        let count = self.model.element_count();
        self.progress.begin_phase("Scanning elements", count);

        for index in 0..count {
            match self.scan_element(index) {
                Ok(true) => self.report.scanned += 1,
                Ok(false) => self.report.hidden += 1,
                Err(err) => self.skip(&err),
            }
            self.progress.advance(index + 1);
        }
        self.refresh_layers();
    }

    /// Touches the element at `index`. `Ok(false)` when its layer is hidden.
    fn scan_element(&mut self, index: usize) -> Result<bool> {
        let element = self
            .model
            .element(index)
            .ok_or(SyncError::InvalidElement { index })?;
        if !self.model.is_valid(&element) {
            return Err(SyncError::InvalidElement { index });
        }

        let id = element.id;
        let bounds = self
            .model
            .bounding_box(&element)
            .ok_or(SyncError::InvalidBounds { id })?;
        if !bounds.is_valid() || bounds.is_empty() {
            return Err(SyncError::InvalidBounds { id });
        }
        let header = self
            .model
            .read_header(&element)
            .ok_or(SyncError::UnreadableHeader { id })?;
        if self.layer_hidden(header.layer_index) {
            return Ok(false);
        }

        let key = match self.registry.find(id) {
            Some(key) => {
                if self.registry.nodes[key].is_touched() {
                    return Err(SyncError::DuplicateId { id });
                }
                self.refresh_element_kind(key, &header);
                key
            }
            None => self
                .registry
                .get_or_create(id, || SyncNode::new(id, NodeKind::from_header(&header))),
        };

        let parent = self.element_parent(&header);
        self.registry.ensure_parent(key, parent)?;

        let ordinal = i32::try_from(index + 1).unwrap_or(i32::MAX);
        let node = &mut self.registry.nodes[key];
        node.mark_touched(ordinal);
        node.reconcile(LiveSnapshot::from(&element));

        if self.registry.settings.export_lights {
            self.scan_lights(&element, key, ordinal);
        }
        Ok(true)
    }

    /// Flags every known layer whose visibility flipped since the last pass.
    fn refresh_layers(&mut self) {
        let layers: Vec<(u32, NodeKey)> = self.registry.layers.iter().map(|(&i, &k)| (i, k)).collect();
        for (index, key) in layers {
            let hidden = self.layer_hidden(index);
            let Some(node) = self.registry.nodes.get_mut(key) else {
                continue;
            };
            if let NodeKind::Layer(data) = &mut node.kind
                && data.hidden != hidden
            {
                log::debug!("Layer {index} {}", if hidden { "hidden" } else { "shown" });
                data.hidden = hidden;
                node.mark_modified(ChangeFlags::PROPERTIES);
            }
        }
    }

    /// Keeps an existing node in step with its header. Gaining or losing
    /// geometry switches between `Element` and `Actor`.
    fn refresh_element_kind(&mut self, key: NodeKey, header: &Header) {
        let node = &mut self.registry.nodes[key];
        let has_geometry = matches!(node.kind, NodeKind::Element(_));
        let is_element = has_geometry || matches!(node.kind, NodeKind::Actor(_));
        if is_element && has_geometry == header.has_geometry {
            node.kind.absorb_header(header);
        } else {
            self.registry
                .change_kind(key, NodeKind::from_header(header), self.target);
        }
    }

    /// Hotlink instance named by the header, or the element's layer.
    fn element_parent(&mut self, header: &Header) -> NodeKey {
        if let Some(instance) = header.hotlink_instance
            && self.registry.settings.export_hotlinks
        {
            let placed = self.registry.find(instance).filter(|&k| {
                let node = &self.registry.nodes[k];
                node.is_touched() && matches!(node.kind, NodeKind::HotlinkInstance(_))
            });
            if let Some(key) = placed {
                return key;
            }
            log::warn!(
                "Unknown hotlink instance {instance}, placing '{}' on layer {}",
                header.name,
                header.layer_index
            );
        }
        self.registry.ensure_layer(header.layer_index)
    }

    /// Lights share the ordinal of their element.
    fn scan_lights(&mut self, element: &ElementRef, owner: NodeKey, ordinal: i32) {
        for light_index in 0..self.model.light_count(element) {
            let Some(params) = self.model.light(element, light_index) else {
                self.skip(&SyncError::UnreadableLight {
                    id: element.id,
                    light_index,
                });
                continue;
            };

            let id = light_id(element.id, light_index);
            let snapshot = LiveSnapshot::new(params.fingerprint(), element.modification_stamp);
            let kind = NodeKind::Light(LightData { light_index, params });

            let key = match self.registry.find(id) {
                Some(key) => {
                    let node = &mut self.registry.nodes[key];
                    if node.is_touched() {
                        self.skip(&SyncError::DuplicateId { id });
                        continue;
                    }
                    node.kind = kind;
                    key
                }
                None => self.registry.get_or_create(id, || SyncNode::new(id, kind)),
            };
            if let Err(err) = self.registry.ensure_parent(key, owner) {
                log::warn!("Light {light_index} of {}: {err}", element.id);
                continue;
            }

            let node = &mut self.registry.nodes[key];
            node.mark_touched(ordinal);
            node.reconcile(snapshot);
        }
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    fn scan_cameras(&mut self) {
        let sets = self.model.camera_sets();
        self.progress.begin_phase("Scanning cameras", sets.len());

        let root = self.registry.root();
        for (i, set) in sets.iter().enumerate() {
            self.scan_camera_set(set, root);
            self.progress.advance(i + 1);
        }
        self.scan_current_view(root);
    }

    /// Walks the `first_camera` / `next` chain of one set. Stops at the first
    /// unreadable record or at the first camera seen twice.
    fn scan_camera_set(&mut self, set: &CameraSetRecord, root: NodeKey) {
        let kind = NodeKind::CameraSet(CameraSetData {
            name: set.name.clone(),
        });
        let set_key = match self.touch_record(set.id, Some(root), kind, LiveSnapshot::default()) {
            Ok(key) => key,
            Err(err) => {
                self.skip(&err);
                return;
            }
        };

        let mut visited = FxHashSet::default();
        let mut next = set.first_camera;
        let mut chain_index = 0;
        while let Some(camera_id) = next {
            if !visited.insert(camera_id) {
                log::warn!(
                    "{}",
                    SyncError::CameraChainCycle {
                        set: set.id,
                        camera: camera_id
                    }
                );
                break;
            }
            let Some(record) = self.model.camera(camera_id) else {
                self.skip(&SyncError::UnreadableCamera { id: camera_id });
                break;
            };

            let kind = NodeKind::Camera(CameraData {
                chain_index: Some(chain_index),
                params: record.params,
            });
            let snapshot = LiveSnapshot::stamp_only(record.modification_stamp);
            if let Err(err) = self.touch_record(record.id, Some(set_key), kind, snapshot) {
                self.skip(&err);
                break;
            }

            next = record.next;
            chain_index += 1;
        }
    }

    /// The current view hangs under the root and is never swept. A pass where
    /// the host has no current view leaves the node as it was.
    fn scan_current_view(&mut self, root: NodeKey) {
        let Some(view) = self.model.current_view() else {
            return;
        };

        let id = CURRENT_VIEW_CAMERA_ID;
        let kind = NodeKind::Camera(CameraData {
            chain_index: None,
            params: view.params,
        });
        let key = match self.registry.find(id) {
            Some(key) => {
                self.registry.nodes[key].kind = kind;
                key
            }
            None => self.registry.get_or_create(id, || SyncNode::new(id, kind)),
        };
        if let Err(err) = self.registry.ensure_parent(key, root) {
            log::error!("Cannot place current view camera: {err}");
        }

        let node = &mut self.registry.nodes[key];
        node.mark_permanently_existing();
        node.reconcile(LiveSnapshot::stamp_only(view.modification_stamp));
    }

    fn skip(&mut self, err: &SyncError) {
        self.report.skipped += 1;
        if matches!(err, SyncError::DuplicateId { .. }) {
            self.registry.stats().report_bug(err.to_string());
        } else {
            log::warn!("Skipped: {err}");
        }
    }
}

/// Kind data that changes without the host bumping a stamp.
fn untracked_change(old: &NodeKind, new: &NodeKind) -> bool {
    match (old, new) {
        (NodeKind::Camera(a), NodeKind::Camera(b)) => a.chain_index != b.chain_index,
        (NodeKind::CameraSet(a), NodeKind::CameraSet(b)) => a != b,
        (NodeKind::HotlinkNode(a), NodeKind::HotlinkNode(b)) => a != b,
        _ => false,
    }
}

fn is_hotlink(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::HotlinkNode(_) | NodeKind::HotlinkInstance(_))
}
