//! Dynamic navigation mesh implementation
//!
//! This module provides the orchestrator owning the tile grid. Collider
//! changes are queued, applied to their tiles at the start of the next
//! build or update, and the rebuilt tiles are published as a new
//! [`NavMesh`] snapshot.

use crate::colliders::Collider;
use crate::commands::{ColliderCommand, CommandQueue};
use crate::config::DynamicNavMeshConfig;
use crate::dynamic_tile::DynamicTile;
use crate::error::{Error, Result};
use crate::heightfield::Heightfield;
use crate::io::{Endianness, VoxelFile, VoxelTile};
use crate::mesh_builder::MeshBuilder;
use crate::navmesh::{NavMesh, NavMeshHandle, NavMeshParams, PublishedTile};
use crate::voxel_query::{HeightfieldProvider, VoxelQuery, VoxelRaycastHit};
use crate::TileCoord;
use glam::Vec3;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Phase of a build or update pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateState {
    #[default]
    Idle,
    Draining,
    Rebuilding,
    Publishing,
}

/// Main dynamic navigation mesh manager
///
/// Tiles are created once from persisted voxel data. Colliders added or
/// removed afterwards are re-voxelized into the tiles they overlap, and
/// only those tiles are rebuilt. Work happens on the calling thread, or on a
/// caller supplied rayon pool for the `_parallel` variants.
pub struct DynamicNavMesh {
    config: DynamicNavMeshConfig,
    params: NavMeshParams,
    tiles: BTreeMap<TileCoord, DynamicTile>,
    queue: CommandQueue,
    mesh_builder: Arc<dyn MeshBuilder>,
    nav_mesh: NavMeshHandle,
    /// Last id handed out; ids start at 1
    last_collider_id: u64,
    state: UpdateState,
    version: u64,
}

impl DynamicNavMesh {
    /// Creates a navmesh from a loaded voxel file
    pub fn from_voxel_file(voxel_file: &VoxelFile, mesh_builder: Arc<dyn MeshBuilder>) -> Result<Self> {
        let config = DynamicNavMeshConfig::from_voxel_file(voxel_file);
        Self::from_tiles(config, voxel_file.tiles.clone(), mesh_builder)
    }

    /// Creates a navmesh over the given voxel tiles.
    ///
    /// The tile set is fixed for the lifetime of the navmesh. Nothing is
    /// built until [`build`](Self::build) or [`update`](Self::update).
    pub fn from_tiles(
        config: DynamicNavMeshConfig,
        voxel_tiles: Vec<VoxelTile>,
        mesh_builder: Arc<dyn MeshBuilder>,
    ) -> Result<Self> {
        config.validate()?;

        let mut tiles = BTreeMap::new();
        for voxel_tile in voxel_tiles {
            if (voxel_tile.cell_size - config.cell_size).abs() > f32::EPSILON {
                return Err(Error::InvalidConfig(format!(
                    "tile ({}, {}) has cell size {} but the navmesh uses {}",
                    voxel_tile.tile_x, voxel_tile.tile_z, voxel_tile.cell_size, config.cell_size
                )));
            }
            let coord = (voxel_tile.tile_x, voxel_tile.tile_z);
            if tiles.contains_key(&coord) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate tile ({}, {})",
                    coord.0, coord.1
                )));
            }
            tiles.insert(coord, DynamicTile::from_voxel_tile(voxel_tile)?);
        }

        let params = NavMeshParams::from_config(&config, tiles.len());
        log::info!(
            "Created dynamic navmesh with {} tiles ({}x{} world units each)",
            tiles.len(),
            params.tile_width,
            params.tile_depth
        );

        Ok(Self {
            config,
            params,
            tiles,
            queue: CommandQueue::new(),
            mesh_builder,
            nav_mesh: NavMeshHandle::new(NavMesh::new(params, 0)),
            last_collider_id: 0,
            state: UpdateState::Idle,
            version: 0,
        })
    }

    /// Creates a worker pool for the `_parallel` variants
    pub fn worker_pool(num_threads: usize) -> Result<ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("navmesh-worker-{index}"))
            .build()
            .map_err(|err| Error::WorkerPool(err.to_string()))
    }

    /// Queues a collider and returns its id.
    ///
    /// The collider is rasterized into the tiles its bounds overlap on the
    /// next build or update. Unbounded colliders affect every tile.
    pub fn add_collider(&mut self, collider: Arc<dyn Collider>) -> u64 {
        self.last_collider_id += 1;
        let collider_id = self.last_collider_id;

        let affected_tiles = self.tiles_overlapping(collider.bounds());
        log::debug!(
            "Queued {:?} collider {} for {} tiles",
            collider.collider_type(),
            collider_id,
            affected_tiles.len()
        );
        self.queue.push(ColliderCommand::Add {
            collider_id,
            collider,
            affected_tiles,
        });
        collider_id
    }

    /// Queues the removal of a collider.
    ///
    /// Returns false when no tile holds or is about to receive the collider.
    pub fn remove_collider(&mut self, collider_id: u64) -> bool {
        let mut affected_tiles: BTreeSet<TileCoord> = self
            .tiles
            .iter()
            .filter(|(_, tile)| tile.contains_collider(collider_id))
            .map(|(coord, _)| *coord)
            .collect();
        affected_tiles.extend(self.queue.pending_additions(collider_id));

        if affected_tiles.is_empty() {
            log::debug!("Ignoring removal of unknown collider {}", collider_id);
            return false;
        }

        log::debug!(
            "Queued removal of collider {} from {} tiles",
            collider_id,
            affected_tiles.len()
        );
        self.queue.push(ColliderCommand::Remove {
            collider_id,
            affected_tiles,
        });
        true
    }

    /// Existing tiles overlapped by a world-space box; all tiles for `None`.
    ///
    /// A tile is affected when the box reaches its grid footprint or the
    /// border cells its heightfield shares with a neighbour.
    fn tiles_overlapping(&self, bounds: Option<(Vec3, Vec3)>) -> BTreeSet<TileCoord> {
        let Some((min, max)) = bounds else {
            return self.tiles.keys().copied().collect();
        };
        let ((min_x, min_z), (max_x, max_z)) = self.params.tile_range(min, max);
        let in_footprint = |x: i32, z: i32| {
            (min_x..=max_x).contains(&x) && (min_z..=max_z).contains(&z)
        };
        // Borders never reach past the neighbouring tile
        let near = |x: i32, z: i32| {
            (min_x - 1..=max_x + 1).contains(&x) && (min_z - 1..=max_z + 1).contains(&z)
        };
        self.tiles
            .iter()
            .filter(|((x, z), tile)| {
                in_footprint(*x, *z)
                    || (near(*x, *z)
                        && axis_overlaps(min.x, max.x, tile.bounds_min.x, tile.bounds_max.x)
                        && axis_overlaps(min.z, max.z, tile.bounds_min.z, tile.bounds_max.z))
            })
            .map(|(coord, _)| *coord)
            .collect()
    }

    /// Applies every queued command to its tiles and returns the tiles touched
    pub fn process_queue(&mut self) -> BTreeSet<TileCoord> {
        let commands = self.queue.drain();
        if !commands.is_empty() {
            log::debug!("Draining {} collider commands", commands.len());
        }

        let mut touched = BTreeSet::new();
        for command in &commands {
            for coord in command.affected_tiles() {
                if let Some(tile) = self.tiles.get_mut(coord) {
                    command.apply(tile);
                    touched.insert(*coord);
                }
            }
        }
        touched
    }

    /// Rebuilds every tile and publishes unconditionally
    pub fn build(&mut self) {
        self.set_state(UpdateState::Draining);
        self.process_queue();

        self.set_state(UpdateState::Rebuilding);
        let builder = self.mesh_builder.as_ref();
        let config = &self.config;
        let built = self
            .tiles
            .values_mut()
            .map(|tile| tile.rebuild(builder, config))
            .filter(|&built| built)
            .count();
        log::info!("Built {} of {} tiles", built, self.tiles.len());

        self.publish();
    }

    /// Drains the queue and rebuilds dirty tiles.
    ///
    /// Returns true and publishes a new snapshot when at least one tile
    /// produced a new mesh.
    pub fn update(&mut self) -> bool {
        self.set_state(UpdateState::Draining);
        self.process_queue();

        self.set_state(UpdateState::Rebuilding);
        let builder = self.mesh_builder.as_ref();
        let config = &self.config;
        let rebuilt = self
            .tiles
            .values_mut()
            .map(|tile| tile.build(builder, config))
            .filter(|&built| built)
            .count();

        self.finish_update(rebuilt)
    }

    /// [`build`](Self::build) with one rebuild task per tile on `pool`
    pub fn build_parallel(&mut self, pool: &ThreadPool) {
        self.set_state(UpdateState::Draining);
        self.process_queue();

        self.set_state(UpdateState::Rebuilding);
        let builder = self.mesh_builder.as_ref();
        let config = &self.config;
        let mut tiles: Vec<&mut DynamicTile> = self.tiles.values_mut().collect();
        let built = pool.install(|| {
            tiles
                .par_iter_mut()
                .map(|tile| tile.rebuild(builder, config))
                .filter(|&built| built)
                .count()
        });
        log::info!(
            "Built {} of {} tiles on {} workers",
            built,
            self.tiles.len(),
            pool.current_num_threads()
        );

        self.publish();
    }

    /// [`update`](Self::update) with one rebuild task per dirty tile on `pool`
    pub fn update_parallel(&mut self, pool: &ThreadPool) -> bool {
        self.set_state(UpdateState::Draining);
        self.process_queue();

        self.set_state(UpdateState::Rebuilding);
        let builder = self.mesh_builder.as_ref();
        let config = &self.config;
        let mut dirty: Vec<&mut DynamicTile> = self
            .tiles
            .values_mut()
            .filter(|tile| tile.needs_rebuild())
            .collect();
        let rebuilt = pool.install(|| {
            dirty
                .par_iter_mut()
                .map(|tile| tile.build(builder, config))
                .filter(|&built| built)
                .count()
        });

        self.finish_update(rebuilt)
    }

    fn finish_update(&mut self, rebuilt: usize) -> bool {
        if rebuilt == 0 {
            self.set_state(UpdateState::Idle);
            return false;
        }
        log::info!("Rebuilt {} tiles", rebuilt);
        self.publish();
        true
    }

    /// Swaps in a snapshot of the latest result of every tile
    fn publish(&mut self) {
        self.set_state(UpdateState::Publishing);
        self.version += 1;

        let mut nav_mesh = NavMesh::new(self.params, self.version);
        for (coord, tile) in &self.tiles {
            nav_mesh.insert_tile(
                *coord,
                PublishedTile {
                    mesh: tile.mesh(),
                    heightfield: tile.mesh_heightfield_arc(),
                },
            );
        }
        log::info!(
            "Published navmesh v{} with {} polygons",
            self.version,
            nav_mesh.poly_count()
        );
        self.nav_mesh.publish(nav_mesh);

        self.set_state(UpdateState::Idle);
    }

    fn set_state(&mut self, state: UpdateState) {
        if self.state != state {
            log::debug!("Navmesh state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Latest published snapshot
    pub fn current_nav_mesh(&self) -> Arc<NavMesh> {
        self.nav_mesh.current()
    }

    /// Handle for reading published snapshots from other threads
    pub fn nav_mesh_handle(&self) -> NavMeshHandle {
        self.nav_mesh.clone()
    }

    /// Raycast against the live tile heightfields
    pub fn voxel_query(&self) -> VoxelQuery<&Self> {
        VoxelQuery::from_params(&self.params, self)
    }

    pub fn raycast(&self, start: Vec3, end: Vec3) -> Option<f32> {
        self.voxel_query().raycast(start, end)
    }

    pub fn raycast_hit(&self, start: Vec3, end: Vec3) -> Option<VoxelRaycastHit> {
        self.voxel_query().raycast_hit(start, end)
    }

    /// Enables or disables checkpoints, discarding every existing one
    pub fn set_checkpoints_enabled(&mut self, enabled: bool) {
        self.config.enable_checkpoints = enabled;
        for tile in self.tiles.values_mut() {
            tile.discard_checkpoint();
        }
        log::debug!(
            "Checkpoints {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Get statistics about the dynamic navigation mesh
    pub fn statistics(&self) -> DynamicNavMeshStatistics {
        let colliders: BTreeSet<u64> = self
            .tiles
            .values()
            .flat_map(|tile| tile.collider_ids())
            .collect();

        DynamicNavMeshStatistics {
            total_tiles: self.tiles.len(),
            dirty_tiles: self.tiles.values().filter(|t| t.needs_rebuild()).count(),
            pending_commands: self.queue.len(),
            live_colliders: colliders.len(),
            checkpoints: self
                .tiles
                .values()
                .filter(|t| t.checkpoint().is_some())
                .count(),
            version: self.version,
            memory_usage: self.tiles.values().map(DynamicTile::memory_usage).sum(),
        }
    }

    /// Exports the configuration and the pristine voxel data of every tile
    pub fn to_voxel_file(&self) -> VoxelFile {
        let mut file = VoxelFile::from_config(&self.config);
        file.endianness = self
            .tiles
            .values()
            .next()
            .map_or(Endianness::Big, |tile| tile.voxel_tile().endianness);
        for tile in self.tiles.values() {
            file.add_tile(tile.voxel_tile().clone());
        }
        file
    }

    pub fn has_pending_updates(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn config(&self) -> &DynamicNavMeshConfig {
        &self.config
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    pub fn tile(&self, tile_x: i32, tile_z: i32) -> Option<&DynamicTile> {
        self.tiles.get(&(tile_x, tile_z))
    }

    pub fn tiles(&self) -> impl Iterator<Item = &DynamicTile> + '_ {
        self.tiles.values()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl HeightfieldProvider for DynamicNavMesh {
    fn heightfield(&self, tile_x: i32, tile_z: i32) -> Option<&Heightfield> {
        self.tile(tile_x, tile_z).map(DynamicTile::heightfield)
    }
}

/// Statistics about the dynamic navigation mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicNavMeshStatistics {
    pub total_tiles: usize,
    /// Tiles dirty or failed, waiting for a rebuild
    pub dirty_tiles: usize,
    pub pending_commands: usize,
    pub live_colliders: usize,
    pub checkpoints: usize,
    /// Version of the last published snapshot
    pub version: u64,
    /// Approximate memory usage in bytes
    pub memory_usage: usize,
}

/// Whether `[min, max]` overlaps the half-open interval `[lo, hi)`
fn axis_overlaps(min: f32, max: f32, lo: f32, hi: f32) -> bool {
    if min == max {
        lo <= min && min < hi
    } else {
        min < hi && max > lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colliders::BoxCollider;
    use crate::heightfield::WALKABLE_AREA;
    use crate::mesh_builder::SpanTopMeshBuilder;

    /// 2x1 tiles of 4x4 cells, cell size 1
    fn navmesh() -> DynamicNavMesh {
        let config = DynamicNavMeshConfig::new(true, 4, 4, 1.0)
            .with_cell_height(0.5)
            .with_world_bounds(Vec3::ZERO, Vec3::new(8.0, 4.0, 4.0))
            .with_filters(false, false, false);
        let tiles = (0..2)
            .map(|tile_x| {
                let bmin = Vec3::new(tile_x as f32 * 4.0, 0.0, 0.0);
                let mut hf = Heightfield::new(4, 4, bmin, bmin + Vec3::new(4.0, 4.0, 4.0), 1.0, 0.5);
                for z in 0..4 {
                    for x in 0..4 {
                        hf.add_span(x, z, 0, 2, WALKABLE_AREA, 1).unwrap();
                    }
                }
                VoxelTile::from_heightfield(tile_x, 0, &hf, Endianness::Big)
            })
            .collect();
        DynamicNavMesh::from_tiles(config, tiles, Arc::new(SpanTopMeshBuilder)).unwrap()
    }

    fn crate_at(min: Vec3, max: Vec3) -> Arc<dyn Collider> {
        Arc::new(BoxCollider::from_bounds(min, max, 1, 1))
    }

    #[test]
    fn test_create_dynamic_navmesh() {
        let navmesh = navmesh();
        assert_eq!(navmesh.tiles().count(), 2);
        assert_eq!(navmesh.state(), UpdateState::Idle);
        assert_eq!(navmesh.current_nav_mesh().version(), 0);
        assert_eq!(navmesh.current_nav_mesh().tile_count(), 0);
    }

    #[test]
    fn test_rejects_mismatched_cell_size() {
        let config = DynamicNavMeshConfig::new(true, 4, 4, 0.5);
        let hf = Heightfield::new(4, 4, Vec3::ZERO, Vec3::splat(4.0), 1.0, 0.5);
        let tile = VoxelTile::from_heightfield(0, 0, &hf, Endianness::Big);
        let result = DynamicNavMesh::from_tiles(config, vec![tile], Arc::new(SpanTopMeshBuilder));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_duplicate_tiles() {
        let config = DynamicNavMeshConfig::new(true, 4, 4, 1.0);
        let hf = Heightfield::new(4, 4, Vec3::ZERO, Vec3::splat(4.0), 1.0, 0.5);
        let tile = VoxelTile::from_heightfield(0, 0, &hf, Endianness::Big);
        let result =
            DynamicNavMesh::from_tiles(config, vec![tile.clone(), tile], Arc::new(SpanTopMeshBuilder));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_collider_ids_increase() {
        let mut navmesh = navmesh();
        let a = navmesh.add_collider(crate_at(Vec3::ZERO, Vec3::ONE));
        let b = navmesh.add_collider(crate_at(Vec3::ZERO, Vec3::ONE));
        navmesh.remove_collider(a);
        let c = navmesh.add_collider(crate_at(Vec3::ZERO, Vec3::ONE));
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn test_resolves_affected_tiles() {
        let mut navmesh = navmesh();
        navmesh.add_collider(crate_at(Vec3::new(3.0, 0.0, 1.0), Vec3::new(5.0, 2.0, 2.0)));
        navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        navmesh.add_collider(crate_at(Vec3::new(20.0, 0.0, 1.0), Vec3::new(22.0, 2.0, 2.0)));

        let touched = navmesh.process_queue();
        assert_eq!(touched, BTreeSet::from([(0, 0), (1, 0)]));
        assert_eq!(navmesh.tile(0, 0).unwrap().collider_ids(), BTreeSet::from([1, 2]));
        assert_eq!(navmesh.tile(1, 0).unwrap().collider_ids(), BTreeSet::from([1]));
    }

    #[test]
    fn test_remove_pending_collider() {
        let mut navmesh = navmesh();
        let id = navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        assert!(navmesh.remove_collider(id));
        assert!(!navmesh.remove_collider(99));
        assert_eq!(navmesh.statistics().pending_commands, 2);

        navmesh.build();
        assert!(navmesh.tile(0, 0).unwrap().collider_ids().is_empty());
        assert_eq!(navmesh.statistics().live_colliders, 0);
    }

    #[test]
    fn test_update_publishes_only_on_change() {
        let mut navmesh = navmesh();
        assert!(navmesh.update());
        assert_eq!(navmesh.current_nav_mesh().version(), 1);
        assert!(!navmesh.update());
        assert_eq!(navmesh.current_nav_mesh().version(), 1);

        navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        assert!(navmesh.update());
        let published = navmesh.current_nav_mesh();
        assert_eq!(published.version(), 2);
        assert_eq!(navmesh.tile(0, 0).unwrap().version(), 2);
        assert_eq!(navmesh.tile(1, 0).unwrap().version(), 1);
        assert!(published.tile_mesh(1, 0).is_some());
    }

    #[test]
    fn test_build_always_publishes() {
        let mut navmesh = navmesh();
        navmesh.build();
        navmesh.build();
        assert_eq!(navmesh.current_nav_mesh().version(), 2);
        assert_eq!(navmesh.current_nav_mesh().poly_count(), 32);
    }

    #[test]
    fn test_checkpoint_toggle_discards() {
        let mut navmesh = navmesh();
        navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        navmesh.build();
        assert_eq!(navmesh.statistics().checkpoints, 2);

        navmesh.set_checkpoints_enabled(false);
        assert_eq!(navmesh.statistics().checkpoints, 0);
        assert!(!navmesh.update());
        assert!(!navmesh.config().enable_checkpoints);
    }

    #[test]
    fn test_raycast_sees_colliders() {
        let mut navmesh = navmesh();
        navmesh.build();
        let down = (Vec3::new(1.5, 3.5, 1.5), Vec3::new(1.5, -0.5, 1.5));
        let ground = navmesh.raycast(down.0, down.1).unwrap();
        assert!((ground - 0.625).abs() < 1e-5);

        navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        navmesh.update();
        let hit = navmesh.raycast_hit(down.0, down.1).unwrap();
        assert!((hit.position.y - 2.0).abs() < 1e-4);
        assert_eq!((hit.cell_x, hit.cell_z), (1, 1));
    }

    #[test]
    fn test_export_keeps_pristine_tiles() {
        let mut navmesh = navmesh();
        navmesh.add_collider(crate_at(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        navmesh.build();

        let file = navmesh.to_voxel_file();
        assert_eq!(file.tiles.len(), 2);
        assert_eq!(file.tile_size_x, 4);
        assert_eq!(
            file.tiles[0].heightfield().unwrap(),
            *navmesh.tile(0, 0).unwrap().pristine_heightfield()
        );
    }
}
