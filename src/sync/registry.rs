use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::errors::{Result, SyncError};
use crate::id::{SCENE_ROOT_ID, StableId, layer_id};
use crate::live::LiveModel;
use crate::progress::ProgressReporter;
use crate::settings::SyncSettings;
use crate::stats::SyncStats;
use crate::sync::asset_cache::{Acquired, AssetCache};
use crate::sync::context::{SyncContext, SyncReport};
use crate::sync::node::{ChangeFlags, LayerData, NodeKey, NodeKind, SyncNode};
use crate::target::{AssetHandle, TargetScene};

/// Node counts of the pass in progress.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PassCounters {
    pub created: usize,
    pub destroyed: usize,
}

/// Owner of every sync node of one session.
///
/// Nodes live in an arena addressed by [`NodeKey`]; the `ids` map makes the
/// registry a bijection between [`StableId`]s and nodes. The registry also
/// owns the content-addressed asset cache and the layer-name memo, and is the
/// entry point of a synchronization pass through [`synchronize`].
///
/// One registry per session: dropping it forgets all state. Passes need
/// `&mut self`, so two passes can never overlap on the same registry.
///
/// [`synchronize`]: Self::synchronize
pub struct SyncRegistry {
    pub(crate) nodes: SlotMap<NodeKey, SyncNode>,
    ids: FxHashMap<StableId, NodeKey>,
    root: NodeKey,
    pub(crate) layers: FxHashMap<u32, NodeKey>,
    layer_names: FxHashMap<u32, String>,
    pub(crate) assets: AssetCache,
    pub(crate) settings: SyncSettings,
    stats: Arc<SyncStats>,
    pub(crate) pass: PassCounters,
    passes: u64,
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl SyncRegistry {
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SyncNode::new(SCENE_ROOT_ID, NodeKind::Scene));
        let mut ids = FxHashMap::default();
        ids.insert(SCENE_ROOT_ID, root);

        Self {
            nodes,
            ids,
            root,
            layers: FxHashMap::default(),
            layer_names: FxHashMap::default(),
            assets: AssetCache::new(),
            settings,
            stats: Arc::new(SyncStats::new()),
            pass: PassCounters::default(),
            passes: 0,
        }
    }

    /// Runs one full pass: reset, scan, clean, process.
    ///
    /// Per-element failures are logged and counted in the report; they never
    /// abort the pass. Elements skipped this pass are retried on the next one.
    pub fn synchronize(
        &mut self,
        model: &dyn LiveModel,
        target: &mut dyn TargetScene,
        progress: &mut dyn ProgressReporter,
    ) -> SyncReport {
        self.passes += 1;
        SyncContext::new(self, model, target, progress).run()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn find(&self, id: StableId) -> Option<NodeKey> {
        self.ids.get(&id).copied()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: StableId) -> bool {
        self.ids.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&SyncNode> {
        self.nodes.get(key)
    }

    #[inline]
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SyncNode> {
        self.nodes.get_mut(key)
    }

    #[must_use]
    pub fn node_by_id(&self, id: StableId) -> Option<&SyncNode> {
        self.find(id).and_then(|key| self.nodes.get(key))
    }

    #[must_use]
    pub fn layer_node(&self, layer_index: u32) -> Option<NodeKey> {
        self.layers.get(&layer_index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &SyncNode)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true: the scene root always exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    /// Number of completed or running passes.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    // ========================================================================
    // Node Lifecycle
    // ========================================================================

    /// Returns the node for `id`, creating it with `factory` on first sight.
    ///
    /// New nodes start detached; attach them before the pass ends (see
    /// [`get_or_create_under`](Self::get_or_create_under)). The next clean
    /// destroys detached nodes the scan did not touch.
    pub fn get_or_create(&mut self, id: StableId, factory: impl FnOnce() -> SyncNode) -> NodeKey {
        if let Some(&key) = self.ids.get(&id) {
            return key;
        }

        let node = factory();
        debug_assert_eq!(node.id(), id, "factory built a node with a foreign id");
        log::trace!("New {} node {id}", node.kind.kind_name());
        let key = self.nodes.insert(node);
        self.ids.insert(id, key);
        self.pass.created += 1;
        key
    }

    /// [`get_or_create`](Self::get_or_create), then makes sure the node hangs
    /// under `parent`. A node that moved is flagged [`ChangeFlags::PARENT`].
    pub fn get_or_create_under(
        &mut self,
        id: StableId,
        parent: NodeKey,
        factory: impl FnOnce() -> SyncNode,
    ) -> Result<NodeKey> {
        let key = self.get_or_create(id, factory);
        self.ensure_parent(key, parent)?;
        Ok(key)
    }

    /// Attaches `key` under `parent` unless it is already there. Returns
    /// whether the node moved.
    pub fn ensure_parent(&mut self, key: NodeKey, parent: NodeKey) -> Result<bool> {
        let node = self.nodes.get(key).ok_or(SyncError::UnknownNode)?;
        if node.parent == Some(parent) {
            return Ok(false);
        }
        let had_parent = node.parent.is_some();
        self.attach(key, parent)?;
        if had_parent && let Some(node) = self.nodes.get_mut(key) {
            node.mark_modified(ChangeFlags::PARENT);
        }
        Ok(true)
    }

    /// Layer node for `layer_index`, created on first use under the root.
    pub(crate) fn ensure_layer(&mut self, layer_index: u32) -> NodeKey {
        if let Some(&key) = self.layers.get(&layer_index) {
            return key;
        }
        let id = layer_id(layer_index);
        let root = self.root;
        let key = self.get_or_create(id, || {
            SyncNode::new(id, NodeKind::Layer(LayerData {
                index: layer_index,
                hidden: false,
            }))
        });
        if let Err(err) = self.ensure_parent(key, root) {
            log::error!("Cannot place layer {layer_index}: {err}");
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.mark_permanently_existing();
        }
        self.layers.insert(layer_index, key);
        key
    }

    /// Replaces the variant of a node whose live element changed category.
    ///
    /// The old target element and asset reference are released so the node
    /// is rebuilt from scratch when processed.
    pub(crate) fn change_kind(&mut self, key: NodeKey, kind: NodeKind, target: &mut dyn TargetScene) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        log::debug!(
            "Node {} changes kind {} -> {}",
            node.id(),
            node.kind.kind_name(),
            kind.kind_name()
        );
        let old = std::mem::replace(&mut node.kind, kind);
        let old_target = node.target.take();
        node.mark_modified(ChangeFlags::KIND);

        if let Some(handle) = old_target {
            target.remove_metadata(handle);
            target.remove_node(handle);
        }
        if let NodeKind::Element(data) = old
            && let Some(asset) = data.asset
        {
            self.release_asset(asset, target);
        }
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Moves `child` under `parent`, detaching it from its previous parent.
    ///
    /// Refuses to attach a node under itself or one of its descendants.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(parent) {
            return Err(SyncError::UnknownNode);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SyncError::InvalidAttach {
                child: self.nodes[child].id(),
                parent: self.nodes[parent].id(),
            });
        }

        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Unlinks `child` from its parent. The node stays registered until the
    /// next clean.
    pub fn detach(&mut self, child: NodeKey) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            log::error!("Node parent is not registered");
            debug_assert!(false, "dangling parent link");
            return;
        };
        match parent_node.children.iter().position(|&k| k == child) {
            Some(pos) => {
                parent_node.children.remove(pos);
            }
            None => {
                log::error!("Node missing from its parent's children");
                debug_assert!(false, "inconsistent parent/child links");
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == ancestor {
                return true;
            }
            match self.nodes.get(key).and_then(|n| n.parent) {
                Some(parent) => key = parent,
                None => return false,
            }
        }
    }

    /// Checks the tree invariants: links agree in both directions, the id map
    /// is a bijection, and every node is reachable from the root.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.ids.len() != self.nodes.len() {
            return false;
        }
        for (key, node) in &self.nodes {
            if self.ids.get(&node.id()) != Some(&key) {
                return false;
            }
            for &child in &node.children {
                if self.nodes.get(child).and_then(|c| c.parent) != Some(key) {
                    return false;
                }
            }
            match node.parent {
                Some(parent) => {
                    let linked = self
                        .nodes
                        .get(parent)
                        .is_some_and(|p| p.children.iter().filter(|&&c| c == key).count() == 1);
                    if !linked || !self.is_ancestor_or_self(self.root, key) {
                        return false;
                    }
                }
                None if key != self.root => return false,
                None => {}
            }
        }
        true
    }

    // ========================================================================
    // Pass Phases
    // ========================================================================

    pub(crate) fn reset_pass(&mut self) {
        self.pass = PassCounters::default();
        for node in self.nodes.values_mut() {
            node.reset_for_new_pass();
        }
    }

    /// Marks the scene root, every layer and the current-view camera as
    /// existing for this pass.
    pub(crate) fn mark_synthesized(&mut self) {
        for node in self.nodes.values_mut() {
            if node.is_synthesized() {
                node.mark_permanently_existing();
            }
        }
    }

    /// Post-order sweep of the subtree at `key`.
    ///
    /// Children are swept first. An untouched node then releases its target
    /// element, metadata and asset reference, leaves its parent and the
    /// registry. Returns whether the node survived.
    pub fn sweep(&mut self, key: NodeKey, target: &mut dyn TargetScene) -> bool {
        let Some(node) = self.nodes.get(key) else {
            return false;
        };
        let children = node.children.clone();
        for child in children {
            self.sweep(child, target);
        }

        let Some(node) = self.nodes.get(key) else {
            return false;
        };
        if node.is_touched() {
            return true;
        }
        if key == self.root {
            log::error!("Scene root was not marked during the scan");
            debug_assert!(false, "sweeping the scene root");
            return true;
        }

        self.destroy(key, target);
        false
    }

    /// Handles nodes outside the root's subtree: created without a parent or
    /// detached since. Untouched ones are destroyed; touched ones are moved
    /// under the root. Returns how many were destroyed.
    pub fn sweep_detached(&mut self, target: &mut dyn TargetScene) -> usize {
        let root = self.root;
        let detached: Vec<NodeKey> = self
            .nodes
            .iter()
            .filter(|&(key, node)| key != root && node.parent.is_none())
            .map(|(key, _)| key)
            .collect();

        let mut destroyed = 0;
        for key in detached {
            // An earlier destroy may already have taken this one down.
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if !node.is_touched() {
                let children = node.children.clone();
                for child in children {
                    self.sweep(child, target);
                }
                self.destroy(key, target);
                destroyed += 1;
                continue;
            }

            log::warn!(
                "{} {} was touched but has no parent, placing it under the root",
                node.kind.kind_name(),
                node.id()
            );
            if let Err(err) = self.attach(key, root) {
                log::error!("Cannot place detached node: {err}");
            } else if let Some(node) = self.nodes.get_mut(key) {
                node.mark_modified(ChangeFlags::PARENT);
            }
        }
        destroyed
    }

    fn destroy(&mut self, key: NodeKey, target: &mut dyn TargetScene) {
        self.detach(key);

        let survivors = std::mem::take(&mut self.nodes[key].children);
        for child in survivors {
            if let Some(c) = self.nodes.get_mut(child) {
                log::warn!(
                    "{} {} outlived its parent, removing it",
                    c.kind.kind_name(),
                    c.id()
                );
                c.parent = None;
                self.destroy(child, target);
            }
        }

        let Some(node) = self.nodes.remove(key) else {
            return;
        };
        let id = node.id();
        log::trace!("Destroy {} node {id}", node.kind.kind_name());

        if let Some(handle) = node.target {
            target.remove_metadata(handle);
            target.remove_node(handle);
        }
        match node.kind {
            NodeKind::Element(data) => {
                if let Some(asset) = data.asset {
                    self.release_asset(asset, target);
                }
            }
            NodeKind::Layer(data) => {
                self.layers.remove(&data.index);
            }
            _ => {}
        }
        self.ids.remove(&id);
        self.pass.destroyed += 1;
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// Returns the cached asset for `content_hash` (one more reference), or
    /// builds, caches and returns it with one reference.
    pub fn dedup_asset(&mut self, content_hash: u128, build: impl FnOnce() -> AssetHandle) -> AssetHandle {
        match self.assets.acquire(content_hash, build) {
            Acquired::Built(handle) => {
                self.stats.mesh_created();
                handle
            }
            Acquired::Reused(handle) => {
                self.stats.mesh_reused();
                handle
            }
        }
    }

    /// Drops one reference; the asset leaves the target scene with the last.
    pub fn release_asset(&mut self, handle: AssetHandle, target: &mut dyn TargetScene) {
        if let Some(released) = self.assets.release(handle) {
            target.remove_asset(released);
        }
    }

    #[must_use]
    pub fn asset_ref_count(&self, handle: AssetHandle) -> u32 {
        self.assets.ref_count(handle)
    }

    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    // ========================================================================
    // Layer Names
    // ========================================================================

    /// Human-readable layer name, asked from the host once per registry.
    pub fn layer_name(&mut self, model: &dyn LiveModel, layer_index: u32) -> &str {
        self.layer_names.entry(layer_index).or_insert_with(|| {
            model
                .layer_name(layer_index)
                .unwrap_or_else(|| format!("Layer {layer_index}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryModel;
    use crate::target::MemoryScene;

    fn group(id: StableId) -> SyncNode {
        SyncNode::new(id, NodeKind::HotlinkRoot)
    }

    #[test]
    fn test_new_registry_has_root() {
        let registry = SyncRegistry::default();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(SCENE_ROOT_ID), Some(registry.root()));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = SyncRegistry::default();
        let id = StableId::from_u128(10);
        let a = registry.get_or_create(id, || group(id));
        let b = registry.get_or_create(id, || panic!("factory called twice"));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_attach_moves_between_parents() {
        let mut registry = SyncRegistry::default();
        let root = registry.root();
        let (a_id, b_id, c_id) = (StableId::from_u128(1), StableId::from_u128(2), StableId::from_u128(3));
        let a = registry.get_or_create_under(a_id, root, || group(a_id)).unwrap();
        let b = registry.get_or_create_under(b_id, root, || group(b_id)).unwrap();
        let c = registry.get_or_create_under(c_id, a, || group(c_id)).unwrap();

        registry.attach(c, b).unwrap();
        assert!(!registry.node(a).unwrap().children().contains(&c));
        assert_eq!(registry.node(c).unwrap().parent(), Some(b));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_attach_refuses_cycles() {
        let mut registry = SyncRegistry::default();
        let root = registry.root();
        let (a_id, b_id) = (StableId::from_u128(1), StableId::from_u128(2));
        let a = registry.get_or_create_under(a_id, root, || group(a_id)).unwrap();
        let b = registry.get_or_create_under(b_id, a, || group(b_id)).unwrap();

        assert!(matches!(registry.attach(a, b), Err(SyncError::InvalidAttach { .. })));
        assert!(matches!(registry.attach(a, a), Err(SyncError::InvalidAttach { .. })));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_ensure_parent_flags_moves_only() {
        let mut registry = SyncRegistry::default();
        let root = registry.root();
        let (a_id, b_id) = (StableId::from_u128(1), StableId::from_u128(2));
        let a = registry.get_or_create_under(a_id, root, || group(a_id)).unwrap();
        let b = registry.get_or_create_under(b_id, root, || group(b_id)).unwrap();
        registry.reset_pass();

        assert!(!registry.ensure_parent(b, root).unwrap());
        assert!(!registry.node(b).unwrap().changes().contains(ChangeFlags::PARENT));
        assert!(registry.ensure_parent(b, a).unwrap());
        assert!(registry.node(b).unwrap().changes().contains(ChangeFlags::PARENT));
    }

    #[test]
    fn test_sweep_removes_untouched_subtree() {
        let mut registry = SyncRegistry::default();
        let mut scene = MemoryScene::new();
        let root = registry.root();
        let (a_id, b_id) = (StableId::from_u128(1), StableId::from_u128(2));
        let a = registry.get_or_create_under(a_id, root, || group(a_id)).unwrap();
        registry.get_or_create_under(b_id, a, || group(b_id)).unwrap();

        registry.reset_pass();
        registry.mark_synthesized();
        assert!(registry.sweep(root, &mut scene));

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(a_id));
        assert!(!registry.contains(b_id));
        assert_eq!(registry.pass.destroyed, 2);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_sweep_keeps_layers() {
        let mut registry = SyncRegistry::default();
        let mut scene = MemoryScene::new();
        let layer = registry.ensure_layer(4);

        registry.reset_pass();
        registry.mark_synthesized();
        let root = registry.root();
        registry.sweep(root, &mut scene);

        assert_eq!(registry.layer_node(4), Some(layer));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_layer_name_is_memoized() {
        let mut registry = SyncRegistry::default();
        let mut model = MemoryModel::new();
        model.set_layer_name(2, "Walls");

        assert_eq!(registry.layer_name(&model, 2), "Walls");
        assert_eq!(registry.layer_name(&model, 2), "Walls");
        assert_eq!(registry.layer_name(&model, 9), "Layer 9");
        assert_eq!(model.layer_name_queries(), 2);
    }
}
