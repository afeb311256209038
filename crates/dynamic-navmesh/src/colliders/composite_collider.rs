//! Composite collider grouping several shapes under one collider id

use super::{utils, Collider, ColliderType, SAMPLE_POLYAREA_TYPE_GROUND};
use crate::heightfield::Heightfield;
use glam::Vec3;
use std::fmt;
use std::sync::Arc;

/// A collider made of child colliders that are added and removed together.
///
/// Each child rasterizes with its own area id and merge threshold.
#[derive(Clone, Default)]
pub struct CompositeCollider {
    pub colliders: Vec<Arc<dyn Collider>>,
}

impl CompositeCollider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_colliders(colliders: Vec<Arc<dyn Collider>>) -> Self {
        Self { colliders }
    }

    pub fn add_collider(&mut self, collider: Arc<dyn Collider>) {
        self.colliders.push(collider);
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }
}

impl Collider for CompositeCollider {
    /// Union of the children's bounds. An unbounded child makes the whole
    /// composite unbounded, and an empty composite has no bounds either.
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut children = self.colliders.iter().map(|collider| collider.bounds());
        let first = children.next()??;
        children.try_fold(first, |acc, bounds| Some(utils::union_aabb(acc, bounds?)))
    }

    fn contains_point(&self, point: Vec3) -> bool {
        self.colliders
            .iter()
            .any(|collider| collider.contains_point(point))
    }

    fn rasterize(&self, heightfield: &mut Heightfield) {
        for collider in &self.colliders {
            collider.rasterize(heightfield);
        }
    }

    fn collider_type(&self) -> ColliderType {
        ColliderType::Composite
    }

    fn area(&self) -> u8 {
        self.colliders
            .first()
            .map_or(SAMPLE_POLYAREA_TYPE_GROUND, |collider| collider.area())
    }
}

impl fmt::Debug for CompositeCollider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<ColliderType> = self
            .colliders
            .iter()
            .map(|collider| collider.collider_type())
            .collect();
        f.debug_struct("CompositeCollider")
            .field("colliders", &types)
            .finish()
    }
}
