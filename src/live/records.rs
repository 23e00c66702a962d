use glam::{Affine3A, Vec2, Vec3};
use xxhash_rust::xxh3::Xxh3;

use crate::id::StableId;

/// A live element as enumerated by the host, before its header is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRef {
    pub id: StableId,
    /// Ordinal of the element in the host enumeration.
    pub index: usize,
    pub generation_id: u32,
    pub modification_stamp: u64,
}

/// The two change tags a node reconciles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveSnapshot {
    pub generation_id: u32,
    pub modification_stamp: u64,
}

impl LiveSnapshot {
    #[inline]
    #[must_use]
    pub fn new(generation_id: u32, modification_stamp: u64) -> Self {
        Self {
            generation_id,
            modification_stamp,
        }
    }

    /// Snapshot for records that only carry a modification stamp.
    #[inline]
    #[must_use]
    pub fn stamp_only(modification_stamp: u64) -> Self {
        Self {
            generation_id: 0,
            modification_stamp,
        }
    }
}

impl From<&ElementRef> for LiveSnapshot {
    fn from(element: &ElementRef) -> Self {
        Self::new(element.generation_id, element.modification_stamp)
    }
}

/// Axis-aligned bounds of a live element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Finite and not inverted on any axis. A flat box (zero extent on an
    /// axis) is still valid: walls and slabs can be planar.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Collapsed to a single point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min == self.max
    }
}

/// Properties read from an element header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub type_name: String,
    pub layer_index: u32,
    /// Hotlink instance the element was placed by, if any.
    pub hotlink_instance: Option<StableId>,
    pub transform: Affine3A,
    /// Whether the element produces a mesh. Geometry-less elements become
    /// plain actors.
    pub has_geometry: bool,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            name: String::new(),
            type_name: String::new(),
            layer_index: 0,
            hotlink_instance: None,
            transform: Affine3A::IDENTITY,
            has_geometry: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point { range: f32 },
    Spot { range: f32, inner_cone: f32, outer_cone: f32 },
    Directional,
    Area { width: f32, height: f32 },
}

/// Parameters of a light attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct LightParams {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Position relative to the owning element.
    pub position: Vec3,
    pub direction: Vec3,
    pub cast_shadows: bool,
}

impl LightParams {
    #[must_use]
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color,
            intensity,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            cast_shadows: false,
        }
    }

    /// Content tag of the parameters; lights have no host generation id.
    #[must_use]
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = Xxh3::new();
        match self.kind {
            LightKind::Point { range } => {
                hasher.update(&[0]);
                hasher.update(&range.to_le_bytes());
            }
            LightKind::Spot {
                range,
                inner_cone,
                outer_cone,
            } => {
                hasher.update(&[1]);
                hasher.update(&range.to_le_bytes());
                hasher.update(&inner_cone.to_le_bytes());
                hasher.update(&outer_cone.to_le_bytes());
            }
            LightKind::Directional => hasher.update(&[2]),
            LightKind::Area { width, height } => {
                hasher.update(&[3]);
                hasher.update(&width.to_le_bytes());
                hasher.update(&height.to_le_bytes());
            }
        }
        hasher.update(bytemuck::bytes_of(&self.color));
        hasher.update(&self.intensity.to_le_bytes());
        hasher.update(bytemuck::bytes_of(&self.position));
        hasher.update(bytemuck::bytes_of(&self.direction));
        hasher.update(&[u8::from(self.cast_shadows)]);
        hasher.digest() as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraParams {
    pub name: String,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::new(0.0, -10.0, 1.7),
            target: Vec3::new(0.0, 0.0, 1.7),
            up: Vec3::Z,
            fov_y_degrees: 45.0,
        }
    }
}

/// Head of a host camera chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSetRecord {
    pub id: StableId,
    pub name: String,
    pub first_camera: Option<StableId>,
}

/// One link of a host camera chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    pub id: StableId,
    pub next: Option<StableId>,
    pub modification_stamp: u64,
    pub params: CameraParams,
}

/// The host's current view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord {
    pub modification_stamp: u64,
    pub params: CameraParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HotlinkKind {
    /// A hotlinked module (the source file).
    Module { name: String },
    /// One placement of a module.
    Instance { transform: Affine3A },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotlinkRecord {
    pub id: StableId,
    /// `None` for top-level modules.
    pub parent: Option<StableId>,
    pub kind: HotlinkKind,
    pub modification_stamp: u64,
}

/// Triangle mesh produced by the host geometry stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// One material id per triangle.
    pub material_ids: Vec<u32>,
}

impl MeshData {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// xxh3-128 over all buffers; identical meshes share one asset.
    #[must_use]
    pub fn content_hash(&self) -> u128 {
        let mut hasher = Xxh3::new();
        for len in [
            self.positions.len(),
            self.normals.len(),
            self.uvs.len(),
            self.indices.len(),
            self.material_ids.len(),
        ] {
            hasher.update(&(len as u64).to_le_bytes());
        }
        hasher.update(bytemuck::cast_slice(&self.positions));
        hasher.update(bytemuck::cast_slice(&self.normals));
        hasher.update(bytemuck::cast_slice(&self.uvs));
        hasher.update(bytemuck::cast_slice(&self.indices));
        hasher.update(bytemuck::cast_slice(&self.material_ids));
        hasher.digest128()
    }
}
