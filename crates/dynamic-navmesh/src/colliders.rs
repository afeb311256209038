//! Collider types for dynamic obstacles

pub mod base;
pub mod box_collider;
pub mod capsule_collider;
pub mod composite_collider;
pub mod cylinder_collider;
pub mod sphere_collider;

use crate::heightfield::Heightfield;
use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use base::{
    ColliderBase, SAMPLE_POLYAREA_TYPE_DOOR, SAMPLE_POLYAREA_TYPE_GRASS,
    SAMPLE_POLYAREA_TYPE_GROUND, SAMPLE_POLYAREA_TYPE_JUMP, SAMPLE_POLYAREA_TYPE_ROAD,
    SAMPLE_POLYAREA_TYPE_WATER,
};
pub use box_collider::BoxCollider;
pub use capsule_collider::CapsuleCollider;
pub use composite_collider::CompositeCollider;
pub use cylinder_collider::CylinderCollider;
pub use sphere_collider::SphereCollider;

/// An obstacle that can be voxelized into a tile heightfield.
///
/// Colliders are shared between every tile they touch and between the
/// command queue and the tiles, so implementations must be thread safe.
pub trait Collider: Send + Sync {
    /// World-space bounding box. `None` means the collider may touch any tile.
    fn bounds(&self) -> Option<(Vec3, Vec3)>;

    /// Check if a point is inside this collider
    fn contains_point(&self, point: Vec3) -> bool;

    /// Adds the solid volume of this collider to `heightfield`.
    ///
    /// Parts of the shape outside the heightfield are clipped away.
    fn rasterize(&self, heightfield: &mut Heightfield);

    fn collider_type(&self) -> ColliderType;

    /// Area id assigned to the spans this collider produces
    fn area(&self) -> u8 {
        SAMPLE_POLYAREA_TYPE_GROUND
    }

    /// Max distance in voxels between span tops for their areas to merge
    fn flag_merge_threshold(&self) -> i32 {
        1
    }
}

/// Types of colliders supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderType {
    Box,
    Cylinder,
    Sphere,
    Capsule,
    Composite,
}

/// Utility functions for collider operations
pub mod utils {
    use glam::Vec3;

    /// Check if a point is inside an axis-aligned bounding box
    pub fn point_in_aabb(point: Vec3, min: Vec3, max: Vec3) -> bool {
        point.cmpge(min).all() && point.cmple(max).all()
    }

    /// Smallest box containing both inputs
    pub fn union_aabb(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> (Vec3, Vec3) {
        (a.0.min(b.0), a.1.max(b.1))
    }

    /// Calculate the intersection of two AABBs
    pub fn intersect_aabb(min1: Vec3, max1: Vec3, min2: Vec3, max2: Vec3) -> Option<(Vec3, Vec3)> {
        let min = min1.max(min2);
        let max = max1.min(max2);
        min.cmple(max).all().then_some((min, max))
    }
}
