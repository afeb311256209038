//! Data shared by the primitive colliders

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Area id and merge settings plus the cached world bounds of a collider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColliderBase {
    /// Area type for navigation mesh generation
    pub area: u8,
    /// Flag merge threshold in voxels
    pub flag_merge_threshold: i32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl ColliderBase {
    pub fn new(area: u8, flag_merge_threshold: i32, bounds_min: Vec3, bounds_max: Vec3) -> Self {
        Self {
            area,
            flag_merge_threshold,
            bounds_min,
            bounds_max,
        }
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }
}

/// Area type for walkable ground
pub const SAMPLE_POLYAREA_TYPE_GROUND: u8 = 1;
/// Area type for water surfaces
pub const SAMPLE_POLYAREA_TYPE_WATER: u8 = 2;
/// Area type for roads
pub const SAMPLE_POLYAREA_TYPE_ROAD: u8 = 3;
/// Area type for doors
pub const SAMPLE_POLYAREA_TYPE_DOOR: u8 = 4;
/// Area type for grass
pub const SAMPLE_POLYAREA_TYPE_GRASS: u8 = 5;
/// Area type for jump areas
pub const SAMPLE_POLYAREA_TYPE_JUMP: u8 = 6;
