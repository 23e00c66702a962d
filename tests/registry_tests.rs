//! Registry Integration Tests
//!
//! Tests for:
//! - Node lookup and creation through the public API
//! - Hierarchy edits: attach, detach, cycle refusal
//! - Sweep of hand-built subtrees
//! - Asset dedup API
//! - Permanence of synthesized nodes over randomized passes

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use myth_sync::id::{CURRENT_VIEW_CAMERA_ID, SCENE_ROOT_ID};
use myth_sync::live::{MeshData, ViewRecord};
use myth_sync::progress::NoProgress;
use myth_sync::sync::{NodeKind, SyncNode};
use myth_sync::target::TargetScene;
use myth_sync::{MemoryElement, MemoryModel, MemoryScene, StableId, SyncError, SyncRegistry, layer_id};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn group(id: StableId, name: &str) -> SyncNode {
    SyncNode::new(
        id,
        NodeKind::HotlinkNode(myth_sync::sync::HotlinkNodeData {
            name: name.to_string(),
        }),
    )
}

fn quad() -> MeshData {
    MeshData {
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
        normals: vec![Vec3::Z; 4],
        uvs: vec![Vec2::ZERO; 4],
        indices: vec![0, 1, 2, 2, 1, 3],
        material_ids: vec![0, 0],
    }
}

// ============================================================================
// Lookup & Creation
// ============================================================================

#[test]
fn registry_starts_with_scene_root() {
    let registry = SyncRegistry::default();
    let root = registry.node(registry.root()).unwrap();
    assert_eq!(root.id(), SCENE_ROOT_ID);
    assert!(matches!(root.kind, NodeKind::Scene));
    assert!(root.is_synthesized());
    assert_eq!(registry.len(), 1);
}

#[test]
fn get_or_create_returns_same_key() {
    let mut registry = SyncRegistry::default();
    let id = StableId::new_random();
    let first = registry.get_or_create(id, || group(id, "A"));
    let second = registry.get_or_create(id, || group(id, "B"));

    assert_eq!(first, second);
    assert_eq!(registry.find(id), Some(first));
    match &registry.node(first).unwrap().kind {
        NodeKind::HotlinkNode(data) => assert_eq!(data.name, "A"),
        other => panic!("unexpected kind {other:?}"),
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

#[test]
fn detach_keeps_node_registered() {
    let mut registry = SyncRegistry::default();
    let root = registry.root();
    let id = StableId::new_random();
    let key = registry.get_or_create_under(id, root, || group(id, "A")).unwrap();

    registry.detach(key);
    assert!(registry.contains(id));
    assert_eq!(registry.node(key).unwrap().parent(), None);
    assert!(registry.node(root).unwrap().children().is_empty());

    registry.attach(key, root).unwrap();
    assert!(registry.is_consistent());
}

#[test]
fn attach_under_descendant_is_refused() {
    let mut registry = SyncRegistry::default();
    let root = registry.root();
    let ids: Vec<StableId> = (0..3).map(|_| StableId::new_random()).collect();

    let a = registry.get_or_create_under(ids[0], root, || group(ids[0], "A")).unwrap();
    let b = registry.get_or_create_under(ids[1], a, || group(ids[1], "B")).unwrap();
    let c = registry.get_or_create_under(ids[2], b, || group(ids[2], "C")).unwrap();

    let err = registry.attach(a, c).unwrap_err();
    assert!(matches!(err, SyncError::InvalidAttach { child, parent } if child == ids[0] && parent == ids[2]));
    assert_eq!(registry.node(a).unwrap().parent(), Some(root));
    assert!(registry.is_consistent());
}

#[test]
fn attach_unknown_node_fails() {
    let mut registry = SyncRegistry::default();
    let root = registry.root();
    let id = StableId::new_random();
    let key = registry.get_or_create_under(id, root, || group(id, "A")).unwrap();

    let mut scene = MemoryScene::new();
    registry.synchronize(&MemoryModel::new(), &mut scene, &mut NoProgress);
    assert!(!registry.contains(id));
    assert!(matches!(registry.attach(key, root), Err(SyncError::UnknownNode)));
}

// ============================================================================
// Sweep
// ============================================================================

#[test]
fn nodes_built_outside_a_scan_are_swept() {
    init_logger();
    let mut registry = SyncRegistry::default();
    let root = registry.root();
    let parent_id = StableId::new_random();
    let child_id = StableId::new_random();
    let parent = registry.get_or_create_under(parent_id, root, || group(parent_id, "P")).unwrap();
    registry.get_or_create_under(child_id, parent, || group(child_id, "C")).unwrap();

    let mut scene = MemoryScene::new();
    let report = registry.synchronize(&MemoryModel::new(), &mut scene, &mut NoProgress);

    assert_eq!(report.destroyed, 2);
    assert_eq!(registry.len(), 1);
    assert!(registry.is_consistent());
    // only the scene root reached the target
    assert_eq!(scene.len(), 1);
}

#[test]
fn unattached_and_detached_nodes_are_swept() {
    init_logger();
    let mut registry = SyncRegistry::default();
    let root = registry.root();
    let loose_id = StableId::new_random();
    registry.get_or_create(loose_id, || group(loose_id, "Loose"));

    let parent_id = StableId::new_random();
    let child_id = StableId::new_random();
    let parent = registry.get_or_create_under(parent_id, root, || group(parent_id, "P")).unwrap();
    registry.get_or_create_under(child_id, parent, || group(child_id, "C")).unwrap();
    registry.detach(parent);

    let mut scene = MemoryScene::new();
    let model = MemoryModel::new();
    let report = registry.synchronize(&model, &mut scene, &mut NoProgress);

    assert_eq!(report.destroyed, 3);
    assert!(!registry.contains(loose_id));
    assert!(!registry.contains(parent_id));
    assert!(!registry.contains(child_id));
    assert_eq!(report.node_count, 1);
    assert!(registry.is_consistent());

    for _ in 0..3 {
        let report = registry.synchronize(&model, &mut scene, &mut NoProgress);
        assert_eq!(report.destroyed, 0);
        assert_eq!(registry.len(), 1);
    }
}

#[test]
fn sweep_detached_spares_the_attached_tree() {
    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    let root = registry.root();
    let kept_id = StableId::new_random();
    let loose_id = StableId::new_random();
    registry.get_or_create_under(kept_id, root, || group(kept_id, "Kept")).unwrap();
    registry.get_or_create(loose_id, || group(loose_id, "Loose"));

    assert_eq!(registry.sweep_detached(&mut scene), 1);
    assert!(registry.contains(kept_id));
    assert!(!registry.contains(loose_id));
    assert!(registry.is_consistent());
}

#[test]
fn sweep_returns_survival() {
    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    let root = registry.root();
    let id = StableId::new_random();
    let key = registry.get_or_create_under(id, root, || group(id, "A")).unwrap();

    assert!(!registry.sweep(key, &mut scene));
    assert!(registry.node(key).is_none());
    assert!(!registry.sweep(key, &mut scene));
}

// ============================================================================
// Asset Dedup
// ============================================================================

#[test]
fn dedup_asset_counts_references() {
    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    let mesh = quad();
    let hash = mesh.content_hash();

    let a = registry.dedup_asset(hash, || scene.add_asset(&mesh));
    let b = registry.dedup_asset(hash, || scene.add_asset(&mesh));
    assert_eq!(a, b);
    assert_eq!(registry.asset_ref_count(a), 2);
    assert_eq!(scene.asset_count(), 1);

    registry.release_asset(a, &mut scene);
    assert_eq!(registry.asset_ref_count(a), 1);
    assert_eq!(scene.asset_count(), 1);

    registry.release_asset(a, &mut scene);
    assert_eq!(registry.asset_ref_count(a), 0);
    assert_eq!(scene.asset_count(), 0);
}

// ============================================================================
// Layer Names
// ============================================================================

#[test]
fn layer_names_are_queried_once() {
    let mut model = MemoryModel::new();
    model.set_layer_name(0, "Ground");
    for i in 0..20 {
        model.add_element(MemoryElement::new(StableId::new_random(), &format!("E{i}")));
    }

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    for _ in 0..3 {
        let id = model.elements()[0].id;
        model.touch(id);
        registry.synchronize(&model, &mut scene, &mut NoProgress);
    }

    assert_eq!(model.layer_name_queries(), 1);
    assert_eq!(registry.layer_name(&model, 0), "Ground");
}

// ============================================================================
// Permanence
// ============================================================================

#[test]
fn synthesized_nodes_survive_randomized_passes() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut model = MemoryModel::new();
    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();

    let mut seen_layers = Vec::new();
    let mut view_created = false;

    for pass in 0..1000 {
        match rng.random_range(0..4) {
            0 => {
                let layer = rng.random_range(0..6);
                model.add_element(MemoryElement::new(StableId::new_random(), "E").with_layer(layer));
            }
            1 if !model.elements().is_empty() => {
                let index = rng.random_range(0..model.elements().len());
                let id = model.elements()[index].id;
                model.remove_element(id);
            }
            2 => model.clear_elements(),
            _ => {
                if rng.random_bool(0.5) {
                    model.set_current_view(Some(ViewRecord {
                        modification_stamp: pass,
                        params: Default::default(),
                    }));
                } else {
                    model.set_current_view(None);
                }
            }
        }

        let report = registry.synchronize(&model, &mut scene, &mut NoProgress);
        assert_eq!(report.scanned, model.elements().len());

        for element in model.elements() {
            let layer = element.header.as_ref().map_or(0, |h| h.layer_index);
            if !seen_layers.contains(&layer) {
                seen_layers.push(layer);
            }
        }
        view_created |= registry.contains(CURRENT_VIEW_CAMERA_ID);

        assert!(registry.contains(SCENE_ROOT_ID), "root lost at pass {pass}");
        for &layer in &seen_layers {
            assert!(registry.contains(layer_id(layer)), "layer {layer} lost at pass {pass}");
        }
        if view_created {
            assert!(registry.contains(CURRENT_VIEW_CAMERA_ID), "current view lost at pass {pass}");
        }
        assert!(registry.is_consistent(), "inconsistent at pass {pass}");
    }

    assert!(view_created);
    assert_eq!(registry.passes(), 1000);
}
