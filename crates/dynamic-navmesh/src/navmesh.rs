//! Published navigation mesh snapshots
//!
//! Every publish assembles a fresh [`NavMesh`] from the latest per-tile
//! results and swaps it into a [`NavMeshHandle`]. Readers hold an
//! `Arc<NavMesh>` and never see a snapshot being assembled.

use crate::config::DynamicNavMeshConfig;
use crate::heightfield::Heightfield;
use crate::mesh_builder::TileMesh;
use crate::voxel_query::HeightfieldProvider;
use crate::TileCoord;
use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Layout of the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavMeshParams {
    /// World position of the corner of tile (0, 0)
    pub origin: Vec3,
    pub tile_width: f32,
    pub tile_depth: f32,
    pub max_tiles: usize,
}

impl NavMeshParams {
    pub fn from_config(config: &DynamicNavMeshConfig, max_tiles: usize) -> Self {
        Self {
            origin: config.world_min,
            tile_width: config.tile_width(),
            tile_depth: config.tile_depth(),
            max_tiles,
        }
    }

    /// Tile containing a world position
    pub fn tile_at(&self, position: Vec3) -> TileCoord {
        (
            ((position.x - self.origin.x) / self.tile_width).floor() as i32,
            ((position.z - self.origin.z) / self.tile_depth).floor() as i32,
        )
    }

    /// Inclusive range of tile coordinates overlapped by a world-space box.
    ///
    /// A box ending exactly on a tile edge does not reach into the next tile.
    pub fn tile_range(&self, min: Vec3, max: Vec3) -> (TileCoord, TileCoord) {
        let (min_x, max_x) = axis_range(min.x - self.origin.x, max.x - self.origin.x, self.tile_width);
        let (min_z, max_z) = axis_range(min.z - self.origin.z, max.z - self.origin.z, self.tile_depth);
        ((min_x, min_z), (max_x, max_z))
    }

    /// World-space xz footprint of a tile, with y taken from the origin
    pub fn tile_bounds(&self, tile_x: i32, tile_z: i32) -> (Vec3, Vec3) {
        let min = self.origin
            + Vec3::new(
                tile_x as f32 * self.tile_width,
                0.0,
                tile_z as f32 * self.tile_depth,
            );
        (min, min + Vec3::new(self.tile_width, 0.0, self.tile_depth))
    }
}

fn axis_range(rel_min: f32, rel_max: f32, extent: f32) -> (i32, i32) {
    let lo = (rel_min / extent).floor() as i32;
    let scaled_max = rel_max / extent;
    let mut hi = scaled_max.floor() as i32;
    if hi > lo && scaled_max == scaled_max.floor() {
        hi -= 1;
    }
    (lo, hi)
}

/// Result of the last successful build of one tile
#[derive(Debug, Clone)]
pub struct PublishedTile {
    /// `None` until the tile has been built successfully once
    pub mesh: Option<Arc<TileMesh>>,
    /// Voxels `mesh` was built from, so snapshot raycasts agree with the
    /// polygons; the loaded voxels until the first successful build
    pub heightfield: Arc<Heightfield>,
}

/// Immutable snapshot of every tile, as published by the dynamic navmesh
#[derive(Debug, Clone)]
pub struct NavMesh {
    params: NavMeshParams,
    version: u64,
    tiles: BTreeMap<TileCoord, PublishedTile>,
}

impl NavMesh {
    pub fn new(params: NavMeshParams, version: u64) -> Self {
        Self {
            params,
            version,
            tiles: BTreeMap::new(),
        }
    }

    pub(crate) fn insert_tile(&mut self, coord: TileCoord, tile: PublishedTile) {
        self.tiles.insert(coord, tile);
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Publish counter; 0 for the empty mesh available before the first build
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tile(&self, tile_x: i32, tile_z: i32) -> Option<&PublishedTile> {
        self.tiles.get(&(tile_x, tile_z))
    }

    pub fn tile_mesh(&self, tile_x: i32, tile_z: i32) -> Option<&TileMesh> {
        self.tile(tile_x, tile_z)?.mesh.as_deref()
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileCoord, &PublishedTile)> + '_ {
        self.tiles.iter().map(|(coord, tile)| (*coord, tile))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn poly_count(&self) -> usize {
        self.tiles
            .values()
            .filter_map(|tile| tile.mesh.as_ref())
            .map(|mesh| mesh.poly_count())
            .sum()
    }
}

impl HeightfieldProvider for NavMesh {
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield> {
        self.tile(tile_x, tile_z).map(|tile| tile.heightfield.as_ref())
    }
}

/// Shared slot holding the latest published [`NavMesh`]
#[derive(Debug, Clone)]
pub struct NavMeshHandle {
    slot: Arc<RwLock<Arc<NavMesh>>>,
}

impl NavMeshHandle {
    pub fn new(nav_mesh: NavMesh) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(nav_mesh))),
        }
    }

    /// Latest snapshot; stays valid after later publishes
    pub fn current(&self) -> Arc<NavMesh> {
        self.slot.read().clone()
    }

    pub(crate) fn publish(&self, nav_mesh: NavMesh) {
        let nav_mesh = Arc::new(nav_mesh);
        *self.slot.write() = nav_mesh;
    }
}
