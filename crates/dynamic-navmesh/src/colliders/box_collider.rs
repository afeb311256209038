//! Axis-aligned box collider

use super::{base::ColliderBase, utils, Collider, ColliderType};
use crate::heightfield::Heightfield;
use crate::rasterization::rasterize_filled_shape;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned solid box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxCollider {
    pub base: ColliderBase,
    pub center: Vec3,
    /// Half-extents of the box (distance from center to face)
    pub half_extents: Vec3,
}

impl BoxCollider {
    pub fn new(center: Vec3, half_extents: Vec3, area: u8, flag_merge_threshold: i32) -> Self {
        let half_extents = half_extents.abs();
        Self {
            base: ColliderBase::new(
                area,
                flag_merge_threshold,
                center - half_extents,
                center + half_extents,
            ),
            center,
            half_extents,
        }
    }

    /// Create a box from minimum and maximum coordinates
    pub fn from_bounds(min: Vec3, max: Vec3, area: u8, flag_merge_threshold: i32) -> Self {
        let (min, max) = (min.min(max), min.max(max));
        Self::new((min + max) * 0.5, (max - min) * 0.5, area, flag_merge_threshold)
    }

    pub fn min(&self) -> Vec3 {
        self.base.bounds_min
    }

    pub fn max(&self) -> Vec3 {
        self.base.bounds_max
    }
}

impl Collider for BoxCollider {
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        Some(self.base.bounds())
    }

    fn contains_point(&self, point: Vec3) -> bool {
        utils::point_in_aabb(point, self.min(), self.max())
    }

    fn rasterize(&self, heightfield: &mut Heightfield) {
        let (min, max) = self.base.bounds();
        rasterize_filled_shape(
            heightfield,
            min,
            max,
            self.base.area,
            self.base.flag_merge_threshold,
            |rect| rect.overlaps_xz(min, max).then_some((min.y, max.y)),
        );
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Box
    }

    fn area(&self) -> u8 {
        self.base.area
    }

    fn flag_merge_threshold(&self) -> i32 {
        self.base.flag_merge_threshold
    }
}
