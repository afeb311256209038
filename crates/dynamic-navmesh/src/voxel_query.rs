//! Voxel raycasts across tiled heightfields
//!
//! Rays are walked with the fast voxel traversal of Amanatides and Woo twice
//! over: first across the tile grid, then across the cells of each tile's
//! heightfield, testing the spans of every visited column.

use crate::heightfield::{Heightfield, Span};
use crate::navmesh::NavMeshParams;
use crate::TileCoord;
use glam::Vec3;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source of per-tile heightfields for a [`VoxelQuery`]
pub trait HeightfieldProvider {
    /// Heightfield of a tile, or `None` when the tile is missing
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield>;
}

impl<P: HeightfieldProvider + ?Sized> HeightfieldProvider for &P {
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield> {
        (**self).heightfield(tile_x, tile_z)
    }
}

impl<P: HeightfieldProvider + ?Sized> HeightfieldProvider for Arc<P> {
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield> {
        (**self).heightfield(tile_x, tile_z)
    }
}

impl HeightfieldProvider for BTreeMap<TileCoord, Heightfield> {
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield> {
        self.get(&(tile_x, tile_z))
    }
}

/// Result of a voxel raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelRaycastHit {
    /// Ray parameter of the hit in `[0, 1]`
    pub t: f32,
    pub position: Vec3,
    pub tile_x: i32,
    pub tile_z: i32,
    /// Heightfield column that was hit
    pub cell_x: i32,
    pub cell_z: i32,
}

/// Voxel raycast over a grid of tile heightfields
pub struct VoxelQuery<P> {
    origin: Vec3,
    tile_width: f32,
    tile_depth: f32,
    provider: P,
}

impl<P: HeightfieldProvider> VoxelQuery<P> {
    pub fn new(origin: Vec3, tile_width: f32, tile_depth: f32, provider: P) -> Self {
        VoxelQuery {
            origin,
            tile_width,
            tile_depth,
            provider,
        }
    }

    pub fn from_params(params: &NavMeshParams, provider: P) -> Self {
        Self::new(params.origin, params.tile_width, params.tile_depth, provider)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Ray parameter of the first solid voxel between `start` and `end`
    pub fn raycast(&self, start: Vec3, end: Vec3) -> Option<f32> {
        self.raycast_hit(start, end).map(|hit| hit.t)
    }

    /// First solid voxel between `start` and `end`.
    ///
    /// Tiles without a heightfield are transparent.
    pub fn raycast_hit(&self, start: Vec3, end: Vec3) -> Option<VoxelRaycastHit> {
        if !start.is_finite() || !end.is_finite() {
            return None;
        }
        if self.tile_width <= 0.0 || self.tile_depth <= 0.0 {
            return None;
        }

        let delta = end - start;
        let rel = start - self.origin;
        let cell = (
            (rel.x / self.tile_width).floor() as i32,
            (rel.z / self.tile_depth).floor() as i32,
        );
        let mut walk = GridWalk::new(
            cell,
            (rel.x, rel.z),
            0.0,
            (delta.x, delta.z),
            (self.tile_width, self.tile_depth),
        );

        let mut t = 0.0;
        loop {
            let t_next = walk.next_t().min(1.0);
            if let Some(heightfield) = self.provider.heightfield(walk.x, walk.z) {
                let hit = traverse_heightfield(heightfield, (walk.x, walk.z), start, delta, t, t_next);
                if hit.is_some() {
                    return hit;
                }
            }
            if t_next >= 1.0 {
                return None;
            }
            t = t_next;
            walk.advance();
        }
    }
}

/// Walks the columns of one heightfield between `t_min` and `t_max`
fn traverse_heightfield(
    heightfield: &Heightfield,
    tile: TileCoord,
    start: Vec3,
    delta: Vec3,
    t_min: f32,
    t_max: f32,
) -> Option<VoxelRaycastHit> {
    if heightfield.width <= 0 || heightfield.depth <= 0 || heightfield.cs <= 0.0 {
        return None;
    }

    let entry = start + delta * t_min;
    let rel_x = entry.x - heightfield.bmin.x;
    let rel_z = entry.z - heightfield.bmin.z;
    // Entry points on a tile edge may round into the neighbouring cell
    let cell_x = (rel_x / heightfield.cs).floor() as i32;
    let cell_z = (rel_z / heightfield.cs).floor() as i32;
    if cell_x < -1 || cell_x > heightfield.width || cell_z < -1 || cell_z > heightfield.depth {
        return None;
    }
    let cell = (
        cell_x.clamp(0, heightfield.width - 1),
        cell_z.clamp(0, heightfield.depth - 1),
    );

    let mut walk = GridWalk::new(
        cell,
        (rel_x, rel_z),
        t_min,
        (delta.x, delta.z),
        (heightfield.cs, heightfield.cs),
    );

    let mut t = t_min;
    loop {
        if walk.x < 0 || walk.z < 0 || walk.x >= heightfield.width || walk.z >= heightfield.depth {
            return None;
        }

        let t_next = walk.next_t().min(t_max);
        let spans = heightfield.column(walk.x, walk.z);
        if let Some(t_hit) = column_hit(heightfield, spans, start.y, delta.y, t, t_next) {
            let t_hit = t_hit.clamp(0.0, 1.0);
            return Some(VoxelRaycastHit {
                t: t_hit,
                position: start + delta * t_hit,
                tile_x: tile.0,
                tile_z: tile.1,
                cell_x: walk.x,
                cell_z: walk.z,
            });
        }

        if t_next >= t_max {
            return None;
        }
        t = t_next;
        walk.advance();
    }
}

/// Earliest parameter in `[t0, t1]` where the ray meets a span of the column.
///
/// A span is hit when the vertical extent of the ray over the column overlaps
/// it; the ray enters through the top when descending and through the bottom
/// when ascending.
fn column_hit(heightfield: &Heightfield, spans: &[Span], y0: f32, dy: f32, t0: f32, t1: f32) -> Option<f32> {
    let ya = y0 + dy * t0;
    let yb = y0 + dy * t1;
    let (ray_min, ray_max) = (ya.min(yb), ya.max(yb));

    spans
        .iter()
        .filter_map(|span| {
            let bottom = heightfield.world_height(span.min);
            let top = heightfield.world_height(span.max);
            if ray_min > top || ray_max < bottom {
                return None;
            }
            let t = if dy < 0.0 && ya > top {
                t0 + (top - ya) / dy
            } else if dy > 0.0 && ya < bottom {
                t0 + (bottom - ya) / dy
            } else {
                t0
            };
            Some(t)
        })
        .min_by(f32::total_cmp)
}

/// Amanatides-Woo stepping state over a regular xz grid
struct GridWalk {
    x: i32,
    z: i32,
    step_x: i32,
    step_z: i32,
    t_max_x: f32,
    t_max_z: f32,
    t_delta_x: f32,
    t_delta_z: f32,
}

impl GridWalk {
    /// `rel` is the ray position at `t` relative to the grid origin and
    /// `dir` the ray displacement over the whole parameter range
    fn new(cell: (i32, i32), rel: (f32, f32), t: f32, dir: (f32, f32), size: (f32, f32)) -> Self {
        let (step_x, t_max_x, t_delta_x) = axis_step(cell.0, rel.0, t, dir.0, size.0);
        let (step_z, t_max_z, t_delta_z) = axis_step(cell.1, rel.1, t, dir.1, size.1);
        GridWalk {
            x: cell.0,
            z: cell.1,
            step_x,
            step_z,
            t_max_x,
            t_max_z,
            t_delta_x,
            t_delta_z,
        }
    }

    /// Parameter at which the ray leaves the current cell
    fn next_t(&self) -> f32 {
        self.t_max_x.min(self.t_max_z)
    }

    fn advance(&mut self) {
        if self.t_max_x < self.t_max_z {
            self.x += self.step_x;
            self.t_max_x += self.t_delta_x;
        } else {
            self.z += self.step_z;
            self.t_max_z += self.t_delta_z;
        }
    }
}

fn axis_step(cell: i32, rel: f32, t: f32, dir: f32, size: f32) -> (i32, f32, f32) {
    if dir > 0.0 {
        (1, t + ((cell + 1) as f32 * size - rel) / dir, size / dir)
    } else if dir < 0.0 {
        (-1, t + (cell as f32 * size - rel) / dir, -size / dir)
    } else {
        (0, f32::INFINITY, f32::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::WALKABLE_AREA;

    /// 10x10 cells of 1.0 with ground up to y = 1
    fn ground_tile(tile_x: i32, tile_z: i32) -> Heightfield {
        let bmin = Vec3::new(tile_x as f32 * 10.0, 0.0, tile_z as f32 * 10.0);
        let mut hf = Heightfield::new(10, 10, bmin, bmin + Vec3::new(10.0, 10.0, 10.0), 1.0, 0.5);
        for z in 0..10 {
            for x in 0..10 {
                hf.add_span(x, z, 0, 2, WALKABLE_AREA, 1).unwrap();
            }
        }
        hf
    }

    fn query(tiles: &[TileCoord]) -> VoxelQuery<BTreeMap<TileCoord, Heightfield>> {
        let provider = tiles
            .iter()
            .map(|&(x, z)| ((x, z), ground_tile(x, z)))
            .collect();
        VoxelQuery::new(Vec3::ZERO, 10.0, 10.0, provider)
    }

    #[test]
    fn test_vertical_ray_hits_ground_surface() {
        let query = query(&[(0, 0)]);
        let hit = query
            .raycast_hit(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -5.0, 0.0))
            .unwrap();
        assert!((hit.t - 0.4).abs() < 1e-6);
        assert!((hit.position.y - 1.0).abs() < 1e-5);
        assert_eq!((hit.tile_x, hit.tile_z, hit.cell_x, hit.cell_z), (0, 0, 0, 0));
    }

    #[test]
    fn test_ray_above_ground_misses() {
        let query = query(&[(0, 0)]);
        assert!(query
            .raycast(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 2.0, 0.0))
            .is_none());
        assert!(query
            .raycast(Vec3::new(0.5, 3.0, 0.5), Vec3::new(9.5, 3.0, 9.5))
            .is_none());
    }

    #[test]
    fn test_ray_starting_inside_span() {
        let query = query(&[(0, 0)]);
        assert_eq!(
            query.raycast(Vec3::new(2.5, 0.5, 2.5), Vec3::new(2.5, 5.0, 2.5)),
            Some(0.0)
        );
    }

    #[test]
    fn test_slanted_ray_crosses_into_next_tile() {
        let query = query(&[(0, 0), (1, 0)]);
        let hit = query
            .raycast_hit(Vec3::new(5.5, 2.0, 5.5), Vec3::new(15.5, 0.0, 5.5))
            .unwrap();
        assert_eq!((hit.tile_x, hit.tile_z), (1, 0));
        assert_eq!(hit.cell_x, 0);
        assert!((hit.t - 0.5).abs() < 1e-5);
        assert!((hit.position.x - 10.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_tiles_are_transparent() {
        let query = query(&[(1, 0)]);
        let hit = query
            .raycast_hit(Vec3::new(5.5, 2.0, 5.5), Vec3::new(15.5, 0.0, 5.5))
            .unwrap();
        assert_eq!((hit.tile_x, hit.tile_z), (1, 0));

        let empty = self::query(&[]);
        assert!(empty
            .raycast(Vec3::new(5.0, 5.0, 5.0), Vec3::new(5.0, -5.0, 5.0))
            .is_none());
    }

    #[test]
    fn test_backwards_ray() {
        let query = query(&[(0, 0), (1, 0)]);
        let hit = query
            .raycast_hit(Vec3::new(15.5, 2.0, 5.5), Vec3::new(5.5, 0.0, 5.5))
            .unwrap();
        assert_eq!((hit.tile_x, hit.cell_x), (1, 0));
        assert!((hit.t - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_obstacle_blocks_horizontal_ray() {
        let mut tiles = BTreeMap::new();
        let mut hf = ground_tile(0, 0);
        hf.add_span(6, 5, 2, 8, WALKABLE_AREA, 1).unwrap();
        tiles.insert((0, 0), hf);
        let query = VoxelQuery::new(Vec3::ZERO, 10.0, 10.0, &tiles);

        let hit = query
            .raycast_hit(Vec3::new(0.5, 2.0, 5.5), Vec3::new(9.5, 2.0, 5.5))
            .unwrap();
        assert_eq!((hit.cell_x, hit.cell_z), (6, 5));
        assert!((hit.position.x - 6.0).abs() < 1e-4);
    }
}
