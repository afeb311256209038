//! Dynamic tile management
//!
//! A tile owns the pristine voxel data loaded for its footprint, the colliders
//! currently overlapping it and the last mesh built from the combination.
//! Rebuilds are incremental: when a checkpoint still matches the live
//! colliders, only colliders added since the snapshot are rasterized.

use crate::checkpoint::Checkpoint;
use crate::colliders::Collider;
use crate::config::DynamicNavMeshConfig;
use crate::error::Result;
use crate::heightfield::Heightfield;
use crate::io::VoxelTile;
use crate::mesh_builder::{MeshBuilder, TileMesh};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Status of a dynamic tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileStatus {
    /// Tile is clean and up-to-date
    Clean,
    /// Tile is dirty and needs rebuilding
    Dirty,
    /// Tile is currently being rebuilt
    Building,
    /// Tile build failed; it is retried on the next update
    Failed,
}

/// A tile of the dynamic navmesh that can be modified at runtime
pub struct DynamicTile {
    pub tile_x: i32,
    pub tile_z: i32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    voxel_tile: VoxelTile,
    /// Voxel data as loaded, without any collider
    pristine: Arc<Heightfield>,
    /// Voxel data with every collider of the last rebuild rasterized in
    heightfield: Arc<Heightfield>,
    /// Voxel data `mesh` was built from; pristine before the first good build
    mesh_heightfield: Arc<Heightfield>,
    colliders: BTreeMap<u64, Arc<dyn Collider>>,
    checkpoint: Option<Checkpoint>,
    mesh: Option<Arc<TileMesh>>,
    status: TileStatus,
    /// Number of successful mesh builds
    version: u64,
}

impl DynamicTile {
    /// Creates a dirty tile from persisted voxel data
    pub fn from_voxel_tile(voxel_tile: VoxelTile) -> Result<Self> {
        let heightfield = Arc::new(voxel_tile.heightfield()?);

        Ok(Self {
            tile_x: voxel_tile.tile_x,
            tile_z: voxel_tile.tile_z,
            bounds_min: voxel_tile.bounds_min,
            bounds_max: voxel_tile.bounds_max,
            voxel_tile,
            pristine: Arc::clone(&heightfield),
            mesh_heightfield: Arc::clone(&heightfield),
            heightfield,
            colliders: BTreeMap::new(),
            checkpoint: None,
            mesh: None,
            status: TileStatus::Dirty,
            version: 0,
        })
    }

    /// Rebuilds the tile if it is dirty or failed.
    ///
    /// Returns true when a new mesh was produced.
    pub fn build(&mut self, builder: &dyn MeshBuilder, config: &DynamicNavMeshConfig) -> bool {
        if !self.needs_rebuild() {
            return false;
        }
        self.rebuild(builder, config)
    }

    /// Rebuilds the tile regardless of its status.
    ///
    /// On a builder failure the tile keeps its previous mesh, together with
    /// the heightfield it was built from, and is left `Failed`, which still
    /// counts as needing a rebuild.
    pub fn rebuild(&mut self, builder: &dyn MeshBuilder, config: &DynamicNavMeshConfig) -> bool {
        self.status = TileStatus::Building;

        let heightfield = self.rasterize_colliders();
        if config.enable_checkpoints {
            self.checkpoint = Some(Checkpoint::new(heightfield.clone(), self.collider_ids()));
        }
        self.heightfield = Arc::new(heightfield);

        match builder.build_tile_mesh(self.tile_x, self.tile_z, &self.heightfield, config) {
            Ok(mesh) => {
                log::debug!(
                    "Built tile ({}, {}): {} polygons, {} colliders",
                    self.tile_x,
                    self.tile_z,
                    mesh.poly_count(),
                    self.colliders.len()
                );
                self.mesh = Some(Arc::new(mesh));
                self.mesh_heightfield = Arc::clone(&self.heightfield);
                self.status = TileStatus::Clean;
                self.version += 1;
                true
            }
            Err(err) => {
                log::warn!(
                    "Mesh build failed for tile ({}, {}), keeping previous mesh: {}",
                    self.tile_x,
                    self.tile_z,
                    err
                );
                self.status = TileStatus::Failed;
                false
            }
        }
    }

    /// Produces the heightfield with every live collider rasterized in,
    /// starting from the checkpoint when it is still valid
    fn rasterize_colliders(&self) -> Heightfield {
        let live = self.collider_ids();
        let (mut heightfield, baked) = match &self.checkpoint {
            Some(checkpoint) if checkpoint.is_valid_for(&live) => {
                (checkpoint.heightfield.clone(), checkpoint.colliders.clone())
            }
            _ => ((*self.pristine).clone(), BTreeSet::new()),
        };

        for (id, collider) in &self.colliders {
            if baked.contains(id) {
                continue;
            }
            if let Some((_, max)) = collider.bounds() {
                heightfield.expand_top(max.y + 2.0 * heightfield.ch);
            }
            collider.rasterize(&mut heightfield);
        }
        heightfield
    }

    /// Adds or replaces a collider and marks the tile dirty
    pub fn add_collider(&mut self, collider_id: u64, collider: Arc<dyn Collider>) {
        if self.colliders.insert(collider_id, collider).is_some() {
            // A replaced shape may already be baked into the checkpoint
            self.checkpoint = None;
        }
        self.mark_dirty();
    }

    /// Removes a collider, discarding the checkpoint since it may contain it.
    ///
    /// Returns false if the collider was not on this tile.
    pub fn remove_collider(&mut self, collider_id: u64) -> bool {
        if self.colliders.remove(&collider_id).is_none() {
            return false;
        }
        self.checkpoint = None;
        self.mark_dirty();
        true
    }

    pub fn mark_dirty(&mut self) {
        self.status = TileStatus::Dirty;
    }

    pub fn needs_rebuild(&self) -> bool {
        matches!(self.status, TileStatus::Dirty | TileStatus::Failed)
    }

    pub fn discard_checkpoint(&mut self) {
        self.checkpoint = None;
    }

    pub fn contains_collider(&self, collider_id: u64) -> bool {
        self.colliders.contains_key(&collider_id)
    }

    pub fn collider_ids(&self) -> BTreeSet<u64> {
        self.colliders.keys().copied().collect()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn status(&self) -> TileStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Current heightfield; the pristine data until the first rebuild
    pub fn heightfield(&self) -> &Heightfield {
        &self.heightfield
    }

    /// Heightfield the last successful mesh was built from
    pub fn mesh_heightfield(&self) -> &Heightfield {
        &self.mesh_heightfield
    }

    pub(crate) fn mesh_heightfield_arc(&self) -> Arc<Heightfield> {
        Arc::clone(&self.mesh_heightfield)
    }

    pub fn pristine_heightfield(&self) -> &Heightfield {
        &self.pristine
    }

    pub fn voxel_tile(&self) -> &VoxelTile {
        &self.voxel_tile
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    /// Last successfully built mesh
    pub fn mesh(&self) -> Option<Arc<TileMesh>> {
        self.mesh.clone()
    }

    /// Approximate memory footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let shared_heightfield = if Arc::ptr_eq(&self.pristine, &self.heightfield) {
            0
        } else {
            self.heightfield.memory_usage()
        };
        let mesh_heightfield = if Arc::ptr_eq(&self.mesh_heightfield, &self.heightfield)
            || Arc::ptr_eq(&self.mesh_heightfield, &self.pristine)
        {
            0
        } else {
            self.mesh_heightfield.memory_usage()
        };
        std::mem::size_of::<Self>()
            + self.voxel_tile.span_data.len()
            + self.pristine.memory_usage()
            + shared_heightfield
            + mesh_heightfield
            + self.checkpoint.as_ref().map_or(0, Checkpoint::memory_usage)
    }
}

impl fmt::Debug for DynamicTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicTile")
            .field("tile_x", &self.tile_x)
            .field("tile_z", &self.tile_z)
            .field("status", &self.status)
            .field("colliders", &self.collider_ids())
            .field("has_checkpoint", &self.checkpoint.is_some())
            .field("has_mesh", &self.mesh.is_some())
            .field("version", &self.version)
            .finish()
    }
}
