//! Sphere collider

use super::{base::ColliderBase, Collider, ColliderType};
use crate::heightfield::Heightfield;
use crate::rasterization::rasterize_filled_shape;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereCollider {
    pub base: ColliderBase,
    /// Center of the sphere in world coordinates
    pub center: Vec3,
    pub radius: f32,
}

impl SphereCollider {
    pub fn new(center: Vec3, radius: f32, area: u8, flag_merge_threshold: i32) -> Self {
        let radius = radius.abs();
        let extent = Vec3::splat(radius);
        Self {
            base: ColliderBase::new(area, flag_merge_threshold, center - extent, center + extent),
            center,
            radius,
        }
    }
}

impl Collider for SphereCollider {
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        Some(self.base.bounds())
    }

    fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }

    fn rasterize(&self, heightfield: &mut Heightfield) {
        let (min, max) = self.base.bounds();
        let center = self.center;
        let radius_sq = self.radius * self.radius;
        rasterize_filled_shape(
            heightfield,
            min,
            max,
            self.base.area,
            self.base.flag_merge_threshold,
            |rect| {
                let distance_sq = rect.distance_sq_xz(center);
                if distance_sq > radius_sq {
                    return None;
                }
                let half_height = (radius_sq - distance_sq).sqrt();
                Some((center.y - half_height, center.y + half_height))
            },
        );
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Sphere
    }

    fn area(&self) -> u8 {
        self.base.area
    }

    fn flag_merge_threshold(&self) -> i32 {
        self.base.flag_merge_threshold
    }
}
