//! Stable Identity
//!
//! Every tracked object is keyed by a [`StableId`]. Host elements carry a
//! native one; everything else gets one derived here by pure functions, so the
//! same logical object maps to the same id on every pass regardless of scan
//! order.
//!
//! - Lights: [`light_id`] = `element.combine(stable_hash(light_index))`
//! - Layers: [`layer_id`] = UUID v5 of the index in [`LAYER_NAMESPACE`]
//! - Scene root, hotlink root, current-view camera: fixed constants

use std::fmt;

use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

/// Identifier of a logical object that stays constant across passes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StableId(Uuid);

impl StableId {
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[inline]
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// A fresh random id. Hosts with native ids should not need this.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Derives a child id from this id and a discriminant.
    ///
    /// UUID v5 with `self` as the namespace: total, pure and independent of
    /// any iteration order.
    #[must_use]
    pub fn combine(self, discriminant: u64) -> Self {
        Self(Uuid::new_v5(&self.0, &discriminant.to_le_bytes()))
    }
}

impl From<Uuid> for StableId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Debug for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StableId({})", self.0)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Namespace for layer ids.
pub const LAYER_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_3a52_9d0e_4b8a_a7e1_52c4_90d3_1b77);

/// Id of the scene root node.
pub const SCENE_ROOT_ID: StableId = StableId::from_u128(0x2a4e_91c0_5b3d_4f6e_8c17_d0a2_63e9_f4b1);

/// Id of the node grouping all hotlink modules.
pub const HOTLINK_ROOT_ID: StableId = StableId::from_u128(0x8d27_6e14_c9a0_4d35_b2f8_1e6c_57a9_03d4);

/// Id of the singleton current-view camera.
pub const CURRENT_VIEW_CAMERA_ID: StableId =
    StableId::from_u128(0x51b9_0f7c_2e84_4a63_9d1e_c6a0_b8f2_7e35);

/// Hash used to turn small integers into id discriminants.
#[inline]
#[must_use]
pub fn stable_hash(value: u64) -> u64 {
    xxh3_64(&value.to_le_bytes())
}

/// Id of the `light_index`-th light attached to `element`.
#[must_use]
pub fn light_id(element: StableId, light_index: u32) -> StableId {
    element.combine(stable_hash(u64::from(light_index)))
}

/// Id of the layer with the given host index.
#[must_use]
pub fn layer_id(layer_index: u32) -> StableId {
    StableId(Uuid::new_v5(&LAYER_NAMESPACE, &layer_index.to_le_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_id_is_deterministic() {
        let element = StableId::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        let a = light_id(element, 3);
        let b = light_id(element, 3);
        assert_eq!(a.as_uuid().as_bytes(), b.as_uuid().as_bytes());
        assert_ne!(a, element);
    }

    #[test]
    fn test_light_id_distinguishes_index_and_element() {
        let e1 = StableId::from_u128(1);
        let e2 = StableId::from_u128(2);
        assert_ne!(light_id(e1, 0), light_id(e1, 1));
        assert_ne!(light_id(e1, 0), light_id(e2, 0));
    }

    #[test]
    fn test_layer_id_is_stable_and_distinct() {
        assert_eq!(layer_id(7), layer_id(7));
        assert_ne!(layer_id(7), layer_id(8));
        assert_ne!(layer_id(0), SCENE_ROOT_ID);
    }

    #[test]
    fn test_well_known_ids_are_distinct() {
        assert_ne!(SCENE_ROOT_ID, HOTLINK_ROOT_ID);
        assert_ne!(SCENE_ROOT_ID, CURRENT_VIEW_CAMERA_ID);
        assert_ne!(HOTLINK_ROOT_ID, CURRENT_VIEW_CAMERA_ID);
    }
}
