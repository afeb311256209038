//! Upright cylinder collider

use super::{base::ColliderBase, Collider, ColliderType};
use crate::heightfield::Heightfield;
use crate::rasterization::rasterize_filled_shape;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A cylinder whose axis is parallel to the y axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylinderCollider {
    pub base: ColliderBase,
    /// Center of the bottom cap
    pub bottom: Vec3,
    pub height: f32,
    pub radius: f32,
}

impl CylinderCollider {
    pub fn new(bottom: Vec3, height: f32, radius: f32, area: u8, flag_merge_threshold: i32) -> Self {
        let height = height.abs();
        let radius = radius.abs();
        Self {
            base: ColliderBase::new(
                area,
                flag_merge_threshold,
                bottom - Vec3::new(radius, 0.0, radius),
                bottom + Vec3::new(radius, height, radius),
            ),
            bottom,
            height,
            radius,
        }
    }

    pub fn top(&self) -> f32 {
        self.bottom.y + self.height
    }
}

impl Collider for CylinderCollider {
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        Some(self.base.bounds())
    }

    fn contains_point(&self, point: Vec3) -> bool {
        let dx = point.x - self.bottom.x;
        let dz = point.z - self.bottom.z;
        point.y >= self.bottom.y
            && point.y <= self.top()
            && dx * dx + dz * dz <= self.radius * self.radius
    }

    fn rasterize(&self, heightfield: &mut Heightfield) {
        let (min, max) = self.base.bounds();
        let bottom = self.bottom;
        let top = self.top();
        let radius_sq = self.radius * self.radius;
        rasterize_filled_shape(
            heightfield,
            min,
            max,
            self.base.area,
            self.base.flag_merge_threshold,
            |rect| (rect.distance_sq_xz(bottom) <= radius_sq).then_some((bottom.y, top)),
        );
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Cylinder
    }

    fn area(&self) -> u8 {
        self.base.area
    }

    fn flag_merge_threshold(&self) -> i32 {
        self.base.flag_merge_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_contains_point() {
        let cylinder = CylinderCollider::new(Vec3::new(0.0, 1.0, 0.0), 2.0, 1.0, 1, 1);

        assert!(cylinder.contains_point(Vec3::new(0.0, 2.0, 0.0)));
        assert!(cylinder.contains_point(Vec3::new(0.7, 1.0, 0.7)));
        assert!(!cylinder.contains_point(Vec3::new(0.0, 3.5, 0.0)));
        assert!(!cylinder.contains_point(Vec3::new(0.9, 2.0, 0.9)));
    }

    #[test]
    fn test_rasterize_cylinder_has_flat_caps() {
        let mut hf = Heightfield::new(
            6,
            6,
            Vec3::ZERO,
            Vec3::new(6.0, 6.0, 6.0),
            1.0,
            0.5,
        );
        let cylinder = CylinderCollider::new(Vec3::new(3.0, 1.0, 3.0), 2.0, 1.2, 2, 1);
        cylinder.rasterize(&mut hf);

        for (x, z) in [(2, 2), (3, 3), (2, 3), (3, 2)] {
            let spans = hf.column(x, z);
            assert_eq!(spans.len(), 1);
            assert_eq!((spans[0].min, spans[0].max, spans[0].area), (2, 6, 2));
        }
        // Corner cells beyond the radius stay empty
        assert!(hf.column(4, 4).is_empty());
        assert!(hf.column(0, 0).is_empty());
    }
}
