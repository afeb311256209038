//! Upright capsule collider

use super::{base::ColliderBase, Collider, ColliderType};
use crate::heightfield::Heightfield;
use crate::rasterization::rasterize_filled_shape;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A capsule (cylinder with hemispherical caps) standing along the y axis.
///
/// The central segment runs from `start` up to `start + (0, height, 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsuleCollider {
    pub base: ColliderBase,
    pub start: Vec3,
    pub height: f32,
    pub radius: f32,
}

impl CapsuleCollider {
    pub fn new(start: Vec3, height: f32, radius: f32, area: u8, flag_merge_threshold: i32) -> Self {
        let height = height.abs();
        let radius = radius.abs();
        Self {
            base: ColliderBase::new(
                area,
                flag_merge_threshold,
                start - Vec3::splat(radius),
                start + Vec3::new(radius, height + radius, radius),
            ),
            start,
            height,
            radius,
        }
    }

    pub fn end(&self) -> Vec3 {
        self.start + Vec3::new(0.0, self.height, 0.0)
    }
}

impl Collider for CapsuleCollider {
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        Some(self.base.bounds())
    }

    fn contains_point(&self, point: Vec3) -> bool {
        let y = point.y.clamp(self.start.y, self.start.y + self.height);
        let closest = Vec3::new(self.start.x, y, self.start.z);
        (point - closest).length_squared() <= self.radius * self.radius
    }

    fn rasterize(&self, heightfield: &mut Heightfield) {
        let (min, max) = self.base.bounds();
        let start = self.start;
        let end_y = self.start.y + self.height;
        let radius_sq = self.radius * self.radius;
        rasterize_filled_shape(
            heightfield,
            min,
            max,
            self.base.area,
            self.base.flag_merge_threshold,
            |rect| {
                let distance_sq = rect.distance_sq_xz(start);
                if distance_sq > radius_sq {
                    return None;
                }
                let cap = (radius_sq - distance_sq).sqrt();
                Some((start.y - cap, end_y + cap))
            },
        );
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Capsule
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
    fn test_capsule_bounds_and_containment() {
        let capsule = CapsuleCollider::new(Vec3::new(1.0, 2.0, 3.0), 4.0, 0.5, 1, 1);
        assert_eq!(capsule.end(), Vec3::new(1.0, 6.0, 3.0));
        assert_eq!(
            capsule.bounds(),
            Some((Vec3::new(0.5, 1.5, 2.5), Vec3::new(1.5, 6.5, 3.5)))
        );

        assert!(capsule.contains_point(Vec3::new(1.0, 6.4, 3.0)));
        assert!(capsule.contains_point(Vec3::new(1.4, 4.0, 3.0)));
        assert!(!capsule.contains_point(Vec3::new(1.4, 6.4, 3.0)));
        assert!(!capsule.contains_point(Vec3::new(1.0, 1.4, 3.0)));
    }

    #[test]
    fn test_rasterize_capsule_spans_full_height_at_axis() {
        let mut hf = Heightfield::new(
            4,
            4,
            Vec3::ZERO,
            Vec3::new(4.0, 8.0, 4.0),
            1.0,
            0.5,
        );
        let capsule = CapsuleCollider::new(Vec3::new(2.0, 1.0, 2.0), 2.0, 0.5, 1, 1);
        capsule.rasterize(&mut hf);

        // Axis lies on the corner shared by cells (1..=2, 1..=2)
        for (x, z) in [(1, 1), (2, 2)] {
            let spans = hf.column(x, z);
            assert_eq!(spans.len(), 1);
            assert_eq!((spans[0].min, spans[0].max), (1, 7));
        }
        assert!(hf.column(0, 0).is_empty());
        assert!(hf.column(3, 3).is_empty());
    }
}
