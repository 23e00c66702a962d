//! Hotlink Synchronization Tests
//!
//! Tests for:
//! - Hotlink root, module and instance nodes
//! - Independence from host enumeration order
//! - Elements placed by hotlink instances
//! - Cleanup when hotlinks disappear

use glam::{Affine3A, Vec3};
use myth_sync::id::HOTLINK_ROOT_ID;
use myth_sync::progress::NoProgress;
use myth_sync::sync::{ChangeFlags, NodeKind};
use myth_sync::{MemoryElement, MemoryModel, MemoryScene, StableId, SyncRegistry, SyncReport, SyncSettings, layer_id};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sync(registry: &mut SyncRegistry, model: &MemoryModel, scene: &mut MemoryScene) -> SyncReport {
    registry.synchronize(model, scene, &mut NoProgress)
}

/// A module with one instance, and a nested module placed by that instance.
fn nested_model() -> (MemoryModel, StableId, StableId, StableId) {
    let mut model = MemoryModel::new();
    let module = model.add_hotlink_module(None, "Core");
    let instance = model.add_hotlink_instance(module, Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)));
    let nested = model.add_hotlink_module(Some(instance), "Stairs");
    (model, module, instance, nested)
}

// ============================================================================
// Tree Shape
// ============================================================================

#[test]
fn hotlinks_nest_under_hotlink_root() {
    init_logger();
    let (model, module, instance, nested) = nested_model();

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    let hotlink_root = registry.find(HOTLINK_ROOT_ID).unwrap();
    assert_eq!(registry.node(hotlink_root).unwrap().parent(), Some(registry.root()));
    assert_eq!(registry.node_by_id(module).unwrap().parent(), Some(hotlink_root));
    assert_eq!(registry.node_by_id(instance).unwrap().parent(), registry.find(module));
    assert_eq!(registry.node_by_id(nested).unwrap().parent(), registry.find(instance));

    assert!(matches!(registry.node_by_id(instance).unwrap().kind, NodeKind::HotlinkInstance(_)));
    let target = scene
        .element(registry.node_by_id(instance).unwrap().target().unwrap())
        .unwrap();
    assert_eq!(target.attrs.transform.translation.x, 10.0);
    assert!(registry.is_consistent());
}

#[test]
fn enumeration_order_does_not_matter() {
    let (mut model, _, instance, nested) = nested_model();

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    model.reverse_hotlinks();
    let report = sync(&mut registry, &model, &mut scene);
    assert!(report.is_idle(), "{report:?}");
    assert_eq!(registry.node_by_id(nested).unwrap().parent(), registry.find(instance));

    // a fresh registry fed children first builds the same tree
    let mut fresh = SyncRegistry::default();
    let mut fresh_scene = MemoryScene::new();
    sync(&mut fresh, &model, &mut fresh_scene);
    assert_eq!(fresh.len(), registry.len());
    assert_eq!(fresh.node_by_id(nested).unwrap().parent(), fresh.find(instance));
}

// ============================================================================
// Placed Elements
// ============================================================================

#[test]
fn elements_hang_under_their_instance() {
    let (mut model, _, instance, _) = nested_model();
    let stair = model.add_element(MemoryElement::new(StableId::new_random(), "Stair").with_hotlink_instance(instance));

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    let node = registry.node_by_id(stair).unwrap();
    assert_eq!(node.parent(), registry.find(instance));
    let target = scene.element(node.target().unwrap()).unwrap();
    assert_eq!(target.parent(), registry.node_by_id(instance).unwrap().target());
}

#[test]
fn removed_instance_moves_elements_to_layer() {
    init_logger();
    let (mut model, _, instance, nested) = nested_model();
    let stair = model.add_element(
        MemoryElement::new(StableId::new_random(), "Stair")
            .with_layer(2)
            .with_hotlink_instance(instance),
    );

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    model.remove_hotlink(instance);
    model.remove_hotlink(nested);
    let report = sync(&mut registry, &model, &mut scene);

    assert_eq!(report.destroyed, 2);
    assert!(!registry.contains(instance));
    let node = registry.node_by_id(stair).unwrap();
    assert_eq!(node.parent(), registry.find(layer_id(2)));
    assert!(node.changes().contains(ChangeFlags::PARENT));
    assert!(scene.contains(node.target().unwrap()));
    assert!(registry.is_consistent());
}

#[test]
fn hotlink_root_goes_with_last_hotlink() {
    let (mut model, module, instance, nested) = nested_model();

    let mut registry = SyncRegistry::default();
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    for id in [nested, instance, module] {
        model.remove_hotlink(id);
    }
    let report = sync(&mut registry, &model, &mut scene);

    assert_eq!(report.destroyed, 4);
    assert!(!registry.contains(HOTLINK_ROOT_ID));
    assert_eq!(scene.len(), 1);
}

#[test]
fn hotlinks_are_not_exported_when_disabled() {
    let (mut model, _, instance, _) = nested_model();
    let stair = model.add_element(MemoryElement::new(StableId::new_random(), "Stair").with_hotlink_instance(instance));

    let settings = SyncSettings {
        export_hotlinks: false,
        ..Default::default()
    };
    let mut registry = SyncRegistry::new(settings);
    let mut scene = MemoryScene::new();
    sync(&mut registry, &model, &mut scene);

    assert!(!registry.contains(HOTLINK_ROOT_ID));
    assert!(!registry.contains(instance));
    assert_eq!(registry.node_by_id(stair).unwrap().parent(), registry.find(layer_id(0)));
}
