//! Process phase: writes the surviving tree into the target scene.
//!
//! Top-down with an explicit stack, so a parent's target element always
//! exists before its children are written. Nodes that did not change since
//! the last pass are skipped unless their parent's element was recreated.

use glam::Affine3A;
use rustc_hash::FxHashSet;

use crate::settings::SyncSettings;
use crate::sync::context::SyncContext;
use crate::sync::node::{ChangeFlags, LayerData, NodeKey, NodeKind};
use crate::target::{ElementHandle, NodeAttrs, TargetPayload};

/// Accumulator carried through one process walk.
#[derive(Debug, Default)]
pub struct ProcessInfo {
    pub processed: usize,
    pub skipped: usize,
    /// Target elements created during this walk, initialized in one batch.
    pub created: Vec<ElementHandle>,
    /// Nodes that got a new target element; their children must follow.
    pub recreated: FxHashSet<NodeKey>,
}

impl SyncContext<'_> {
    pub(crate) fn process(&mut self) {
        let mut info = ProcessInfo::default();
        let total = if self.registry.settings.always_process {
            self.registry.len()
        } else {
            self.report.modified
        };
        self.progress.begin_phase("Processing", total);

        let mut stack = vec![self.registry.root()];
        while let Some(key) = stack.pop() {
            let Some(node) = self.registry.nodes.get(key) else {
                continue;
            };
            stack.extend(node.children.iter().rev().copied());

            if self.needs_process(key, &info) {
                self.process_node(key, &mut info);
                info.processed += 1;
                self.progress.advance(info.processed);
            } else {
                info.skipped += 1;
            }
        }

        if !info.created.is_empty() {
            self.target.initialize_nodes(&info.created);
        }
        log::debug!(
            "Process: {} written, {} unchanged, {} new target elements",
            info.processed,
            info.skipped,
            info.created.len()
        );
        self.report.processed = info.processed;
    }

    fn needs_process(&self, key: NodeKey, info: &ProcessInfo) -> bool {
        let node = &self.registry.nodes[key];
        self.registry.settings.always_process
            || node.is_modified()
            || node.target.is_none()
            || node.parent.is_some_and(|p| info.recreated.contains(&p))
    }

    fn process_node(&mut self, key: NodeKey, info: &mut ProcessInfo) {
        let parent = self.registry.nodes[key]
            .parent
            .and_then(|p| self.registry.nodes.get(p))
            .and_then(|p| p.target);

        if matches!(self.registry.nodes[key].kind, NodeKind::Element(_)) {
            self.refresh_mesh(key);
        }

        let layer = match self.registry.nodes[key].kind {
            NodeKind::Layer(LayerData { index, hidden }) => Some((index, hidden)),
            _ => None,
        };
        let visible = !layer.is_some_and(|(_, hidden)| hidden);
        let (name, transform, payload) = match layer {
            Some((index, _)) => (
                self.registry.layer_name(self.model, index).to_owned(),
                Affine3A::IDENTITY,
                TargetPayload::Empty,
            ),
            None => describe(&self.registry.nodes[key].kind, &self.registry.settings),
        };

        let node = &self.registry.nodes[key];
        let existing = node.target;
        let attrs = NodeAttrs {
            name,
            label: node.id().to_string(),
            parent,
            transform,
            payload,
            visible,
        };
        let handle = self.target.create_or_update_node(existing, &attrs);
        if existing != Some(handle) {
            info.created.push(handle);
            info.recreated.insert(key);
        }
        self.registry.nodes[key].target = Some(handle);

        if self.registry.settings.export_metadata {
            self.write_metadata(key, handle);
        }
    }

    /// Fetches and deduplicates the mesh of an element whose geometry may
    /// have changed. The previous asset reference is dropped afterwards, so
    /// an unchanged mesh keeps its asset alive throughout.
    fn refresh_mesh(&mut self, key: NodeKey) {
        let node = &self.registry.nodes[key];
        let NodeKind::Element(data) = &node.kind else {
            return;
        };
        let geometry_changed = node
            .changes()
            .intersects(ChangeFlags::NEW | ChangeFlags::GENERATION | ChangeFlags::KIND);
        if !geometry_changed && data.asset.is_some() && !self.registry.settings.always_process {
            return;
        }

        let id = node.id();
        let previous = data.asset;
        let acquired = match self.model.mesh(id) {
            Some(mesh) if !mesh.is_empty() => {
                let hash = mesh.content_hash();
                let handle = self.registry.dedup_asset(hash, || self.target.add_asset(&mesh));
                Some((handle, hash))
            }
            _ => {
                self.registry
                    .stats()
                    .report_bug(format!("Element {id} has geometry but no mesh"));
                None
            }
        };

        if let NodeKind::Element(data) = &mut self.registry.nodes[key].kind {
            data.asset = acquired.map(|(handle, _)| handle);
            data.content_hash = acquired.map(|(_, hash)| hash);
        }
        if let Some(previous) = previous {
            self.registry.release_asset(previous, self.target);
        }
    }

    fn write_metadata(&mut self, key: NodeKey, handle: ElementHandle) {
        let node = &self.registry.nodes[key];
        let (type_name, layer_index) = match &node.kind {
            NodeKind::Element(data) => (data.type_name.clone(), data.layer_index),
            NodeKind::Actor(data) => (data.type_name.clone(), data.layer_index),
            _ => return,
        };
        let id = node.id().to_string();
        let layer = self.registry.layer_name(self.model, layer_index).to_owned();

        self.target.set_metadata(
            handle,
            &[
                ("Id".to_string(), id),
                ("Type".to_string(), type_name),
                ("Layer".to_string(), layer),
            ],
        );
    }
}

/// Name, transform and payload of every kind that needs no host lookup.
fn describe(kind: &NodeKind, settings: &SyncSettings) -> (String, Affine3A, TargetPayload) {
    match kind {
        NodeKind::Scene => (settings.scene_name.clone(), Affine3A::IDENTITY, TargetPayload::Empty),
        NodeKind::Layer(data) => (format!("Layer {}", data.index), Affine3A::IDENTITY, TargetPayload::Empty),
        NodeKind::Actor(data) => (
            display_name(&data.name, &data.type_name),
            data.transform,
            TargetPayload::Empty,
        ),
        NodeKind::Element(data) => (
            display_name(&data.name, &data.type_name),
            data.transform,
            data.asset.map_or(TargetPayload::Empty, TargetPayload::Mesh),
        ),
        NodeKind::CameraSet(data) => (data.name.clone(), Affine3A::IDENTITY, TargetPayload::Empty),
        NodeKind::Camera(data) => {
            let name = match data.chain_index {
                _ if !data.params.name.is_empty() => data.params.name.clone(),
                Some(i) => format!("Camera {}", i + 1),
                None => "Current View".to_string(),
            };
            (
                name,
                Affine3A::from_translation(data.params.position),
                TargetPayload::Camera(data.params.clone()),
            )
        }
        NodeKind::Light(data) => (
            format!("Light {}", data.light_index),
            Affine3A::from_translation(data.params.position),
            TargetPayload::Light(data.params.clone()),
        ),
        NodeKind::HotlinkRoot => ("Hotlinks".to_string(), Affine3A::IDENTITY, TargetPayload::Empty),
        NodeKind::HotlinkNode(data) => (data.name.clone(), Affine3A::IDENTITY, TargetPayload::Empty),
        NodeKind::HotlinkInstance(data) => ("Instance".to_string(), data.transform, TargetPayload::Empty),
    }
}

fn display_name(name: &str, type_name: &str) -> String {
    if name.is_empty() {
        type_name.to_string()
    } else {
        name.to_string()
    }
}
