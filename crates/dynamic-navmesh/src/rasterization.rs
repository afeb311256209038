//! Filled-volume rasterization shared by the convex colliders
//!
//! Colliders describe their volume column by column: for each heightfield
//! cell the shape reports the vertical interval it occupies over that cell's
//! footprint, and the driver turns the interval into a solid span.

use crate::heightfield::{Heightfield, Span, SPAN_MAX_HEIGHT};
use glam::Vec3;

/// Footprint of one heightfield column in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub min_x: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_z: f32,
    /// Bottom of the heightfield
    pub floor_y: f32,
}

impl CellRect {
    /// Squared horizontal distance from `point` to the closest point of the cell
    pub fn distance_sq_xz(&self, point: Vec3) -> f32 {
        let x = point.x.clamp(self.min_x, self.max_x) - point.x;
        let z = point.z.clamp(self.min_z, self.max_z) - point.z;
        x * x + z * z
    }

    /// True when the cell footprint overlaps the open xz rectangle `[min, max]`
    pub fn overlaps_xz(&self, min: Vec3, max: Vec3) -> bool {
        self.min_x < max.x && self.max_x > min.x && self.min_z < max.z && self.max_z > min.z
    }
}

/// Rasterizes a solid shape bounded by `shape_min..shape_max`.
///
/// `intersect` returns the world-space `(bottom, top)` interval covered by
/// the shape above a cell, or `None` when the shape misses the column.
pub fn rasterize_filled_shape<F>(
    heightfield: &mut Heightfield,
    shape_min: Vec3,
    shape_max: Vec3,
    area: u8,
    flag_merge_threshold: i32,
    intersect: F,
) where
    F: Fn(&CellRect) -> Option<(f32, f32)>,
{
    if !overlaps_bounds(heightfield, shape_min, shape_max) {
        return;
    }

    let min_x = shape_min.x.max(heightfield.bmin.x);
    let min_z = shape_min.z.max(heightfield.bmin.z);
    let max_x = shape_max.x.min(heightfield.bmax.x);
    let max_z = shape_max.z.min(heightfield.bmax.z);
    if max_x <= min_x || shape_max.y <= shape_min.y || max_z <= min_z {
        return;
    }

    let ics = 1.0 / heightfield.cs;
    let ich = 1.0 / heightfield.ch;
    let x0 = ((min_x - heightfield.bmin.x) * ics) as i32;
    let z0 = ((min_z - heightfield.bmin.z) * ics) as i32;
    let x1 = (((max_x - heightfield.bmin.x) * ics) as i32).min(heightfield.width - 1);
    let z1 = (((max_z - heightfield.bmin.z) * ics) as i32).min(heightfield.depth - 1);

    for z in z0..=z1 {
        for x in x0..=x1 {
            let cell_min_x = heightfield.bmin.x + x as f32 * heightfield.cs;
            let cell_min_z = heightfield.bmin.z + z as f32 * heightfield.cs;
            let rect = CellRect {
                min_x: cell_min_x,
                min_z: cell_min_z,
                max_x: cell_min_x + heightfield.cs,
                max_z: cell_min_z + heightfield.cs,
                floor_y: heightfield.bmin.y,
            };

            let Some((bottom, top)) = intersect(&rect) else {
                continue;
            };
            if top < heightfield.bmin.y {
                continue;
            }

            let smin = ((bottom - heightfield.bmin.y) * ich).floor() as i32;
            let smax = ((top - heightfield.bmin.y) * ich).ceil() as i32;
            if smin == smax {
                continue;
            }

            let ismin = smin.clamp(0, SPAN_MAX_HEIGHT);
            let ismax = smax.clamp(ismin + 1, SPAN_MAX_HEIGHT.max(ismin + 1));
            if let Some(index) = heightfield.column_index(x, z) {
                heightfield.merge_span(index, Span::new(ismin, ismax, area), flag_merge_threshold);
            }
        }
    }
}

fn overlaps_bounds(heightfield: &Heightfield, min: Vec3, max: Vec3) -> bool {
    min.x <= heightfield.bmax.x
        && max.x >= heightfield.bmin.x
        && min.y <= heightfield.bmax.y
        && max.y >= heightfield.bmin.y
        && min.z <= heightfield.bmax.z
        && max.z >= heightfield.bmin.z
}
