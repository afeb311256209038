//! Behaviour of the dynamic navmesh across build, update and query calls

use dynamic_navmesh::heightfield::WALKABLE_AREA;
use dynamic_navmesh::io::Lz4Compressor;
use dynamic_navmesh::{
    BoxCollider, Collider, CompositeCollider, DynamicNavMesh, DynamicNavMeshConfig, Endianness,
    Error, Heightfield, MeshBuilder, SpanTopMeshBuilder, SphereCollider, TileMesh, VoxelFile,
    VoxelFileError, VoxelFileReader, VoxelFileWriter, VoxelTile,
};
use glam::Vec3;
use std::io::Cursor;
use std::sync::Arc;

/// 2x2 tiles of 8x8 cells (4x4 world units), flat ground with its top at y = 1
fn flat_voxel_file() -> VoxelFile {
    let config = DynamicNavMeshConfig::new(true, 8, 8, 0.5)
        .with_cell_height(0.25)
        .with_world_bounds(Vec3::ZERO, Vec3::new(8.0, 4.0, 8.0));
    let mut file = VoxelFile::from_config(&config);

    for tile_z in 0..2 {
        for tile_x in 0..2 {
            let bmin = Vec3::new(tile_x as f32 * 4.0, 0.0, tile_z as f32 * 4.0);
            let mut hf = Heightfield::new(8, 8, bmin, bmin + Vec3::new(4.0, 4.0, 4.0), 0.5, 0.25);
            for z in 0..8 {
                for x in 0..8 {
                    hf.add_span(x, z, 0, 4, WALKABLE_AREA, 1).unwrap();
                }
            }
            file.add_tile(VoxelTile::from_heightfield(tile_x, tile_z, &hf, Endianness::Big));
        }
    }
    file
}

fn navmesh() -> DynamicNavMesh {
    DynamicNavMesh::from_voxel_file(&flat_voxel_file(), Arc::new(SpanTopMeshBuilder)).unwrap()
}

fn pillar(x: f32, z: f32) -> Arc<dyn Collider> {
    Arc::new(BoxCollider::new(
        Vec3::new(x, 1.5, z),
        Vec3::new(0.75, 1.5, 0.75),
        WALKABLE_AREA,
        1,
    ))
}

fn ball(x: f32, z: f32) -> Arc<dyn Collider> {
    Arc::new(SphereCollider::new(Vec3::new(x, 1.0, z), 1.2, WALKABLE_AREA, 1))
}

fn assert_same_heightfields(a: &DynamicNavMesh, b: &DynamicNavMesh) {
    assert_eq!(a.tiles().count(), b.tiles().count());
    for (tile_a, tile_b) in a.tiles().zip(b.tiles()) {
        assert_eq!((tile_a.tile_x, tile_a.tile_z), (tile_b.tile_x, tile_b.tile_z));
        assert_eq!(
            tile_a.heightfield(),
            tile_b.heightfield(),
            "tile ({}, {})",
            tile_a.tile_x,
            tile_a.tile_z
        );
    }
}

fn assert_same_meshes(a: &DynamicNavMesh, b: &DynamicNavMesh) {
    let (published_a, published_b) = (a.current_nav_mesh(), b.current_nav_mesh());
    for tile_z in 0..2 {
        for tile_x in 0..2 {
            assert!(published_a.tile_mesh(tile_x, tile_z).is_some());
            assert_eq!(
                published_a.tile_mesh(tile_x, tile_z),
                published_b.tile_mesh(tile_x, tile_z)
            );
        }
    }
}

#[test]
fn test_second_update_is_noop() {
    let mut navmesh = navmesh();
    navmesh.add_collider(pillar(2.0, 2.0));
    assert!(navmesh.update());
    assert!(!navmesh.update());
    assert_eq!(navmesh.current_nav_mesh().version(), 1);
    assert_eq!(navmesh.statistics().dirty_tiles, 0);
}

#[test]
fn test_checkpoint_rebuild_equals_scratch_rebuild() {
    let mut incremental = navmesh();
    incremental.add_collider(pillar(3.5, 2.0));
    incremental.update();
    incremental.add_collider(ball(4.5, 2.5));
    incremental.update();

    let mut scratch = navmesh();
    scratch.set_checkpoints_enabled(false);
    scratch.add_collider(pillar(3.5, 2.0));
    scratch.add_collider(ball(4.5, 2.5));
    scratch.update();

    assert_same_heightfields(&incremental, &scratch);
    assert_same_meshes(&incremental, &scratch);
}

#[test]
fn test_removal_equals_build_without_collider() {
    let mut removed = navmesh();
    let pillar_id = removed.add_collider(pillar(3.5, 2.0));
    removed.add_collider(ball(4.5, 2.5));
    removed.update();
    assert!(removed.remove_collider(pillar_id));
    assert!(removed.update());

    let mut scratch = navmesh();
    scratch.add_collider(ball(4.5, 2.5));
    scratch.update();

    assert_same_heightfields(&removed, &scratch);
    assert_same_meshes(&removed, &scratch);
    assert!(removed.tiles().all(|tile| !tile.contains_collider(pillar_id)));
}

#[test]
fn test_remove_unknown_collider_is_noop() {
    let mut navmesh = navmesh();
    navmesh.update();
    assert!(!navmesh.remove_collider(42));
    assert!(!navmesh.has_pending_updates());
    assert!(!navmesh.update());
}

#[test]
fn test_command_tile_resolution() {
    let mut navmesh = navmesh();
    let spanning = navmesh.add_collider(Arc::new(BoxCollider::from_bounds(
        Vec3::new(3.0, 0.0, 1.0),
        Vec3::new(5.0, 2.0, 2.0),
        WALKABLE_AREA,
        1,
    )));
    let inside = navmesh.add_collider(Arc::new(BoxCollider::from_bounds(
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(2.0, 2.0, 2.0),
        WALKABLE_AREA,
        1,
    )));
    let outside = navmesh.add_collider(pillar(40.0, 40.0));
    navmesh.process_queue();

    let holders = |id: u64| -> Vec<(i32, i32)> {
        navmesh
            .tiles()
            .filter(|tile| tile.contains_collider(id))
            .map(|tile| (tile.tile_x, tile.tile_z))
            .collect()
    };
    assert_eq!(holders(spanning), vec![(0, 0), (1, 0)]);
    assert_eq!(holders(inside), vec![(0, 0)]);
    assert!(holders(outside).is_empty());
}

/// Two tiles of 4x4 cells with a 2-cell border reaching into the neighbour
fn bordered_navmesh() -> DynamicNavMesh {
    let config = DynamicNavMeshConfig::new(true, 4, 4, 1.0)
        .with_cell_height(0.5)
        .with_world_bounds(Vec3::ZERO, Vec3::new(8.0, 4.0, 4.0));
    let mut file = VoxelFile::from_config(&config);

    for tile_x in 0..2 {
        let bmin = Vec3::new(tile_x as f32 * 4.0 - 2.0, 0.0, -2.0);
        let bmax = bmin + Vec3::new(8.0, 4.0, 8.0);
        let mut hf = Heightfield::new(8, 8, bmin, bmax, 1.0, 0.5).with_border_size(2);
        for z in 0..8 {
            for x in 0..8 {
                hf.add_span(x, z, 0, 2, WALKABLE_AREA, 1).unwrap();
            }
        }
        file.add_tile(VoxelTile::from_heightfield(tile_x, 0, &hf, Endianness::Big));
    }
    DynamicNavMesh::from_voxel_file(&file, Arc::new(SpanTopMeshBuilder)).unwrap()
}

#[test]
fn test_collider_in_neighbour_border_reaches_both_tiles() {
    let mut navmesh = bordered_navmesh();
    navmesh.build();

    // Inside tile (1, 0), within the border of tile (0, 0)
    let id = navmesh.add_collider(Arc::new(BoxCollider::from_bounds(
        Vec3::new(4.5, 0.0, 1.5),
        Vec3::new(5.5, 3.0, 2.5),
        WALKABLE_AREA,
        1,
    )));
    navmesh.update();

    let holders: Vec<(i32, i32)> = navmesh
        .tiles()
        .filter(|tile| tile.contains_collider(id))
        .map(|tile| (tile.tile_x, tile.tile_z))
        .collect();
    assert_eq!(holders, vec![(0, 0), (1, 0)]);

    // World cell x = 4 is border column 6 of tile (0, 0) and column 2 of tile (1, 0)
    let left = navmesh.tile(0, 0).unwrap().heightfield().column(6, 3).to_vec();
    let right = navmesh.tile(1, 0).unwrap().heightfield().column(2, 3).to_vec();
    assert_eq!(left, right);
    assert!(left[0].max > 2);

    // Beyond the border only the owning tile is touched
    let far = navmesh.add_collider(Arc::new(BoxCollider::from_bounds(
        Vec3::new(6.5, 0.0, 1.5),
        Vec3::new(7.5, 3.0, 2.5),
        WALKABLE_AREA,
        1,
    )));
    assert_eq!(navmesh.process_queue().into_iter().collect::<Vec<_>>(), vec![(1, 0)]);
    assert!(!navmesh.tile(0, 0).unwrap().contains_collider(far));
}

#[test]
fn test_unbounded_collider_touches_every_tile() {
    let mut navmesh = navmesh();
    let empty: Arc<dyn Collider> = Arc::new(CompositeCollider::new());
    assert!(empty.bounds().is_none());

    navmesh.add_collider(empty);
    assert_eq!(navmesh.process_queue().len(), 4);
}

#[test]
fn test_flat_ground_raycast() {
    let mut navmesh = navmesh();
    navmesh.build();

    let hit = navmesh
        .raycast_hit(Vec3::new(1.0, 5.0, 1.0), Vec3::new(1.0, -5.0, 1.0))
        .unwrap();
    assert!((hit.t - 0.4).abs() < 1e-5);
    assert!((hit.position.y - 1.0).abs() < 1e-4);

    assert!(navmesh
        .raycast(Vec3::new(1.0, 5.0, 1.0), Vec3::new(1.0, 2.0, 1.0))
        .is_none());

    // The published snapshot answers the same query
    let published = navmesh.current_nav_mesh();
    let query = dynamic_navmesh::VoxelQuery::from_params(published.params(), published.clone());
    assert_eq!(
        query.raycast(Vec3::new(1.0, 5.0, 1.0), Vec3::new(1.0, -5.0, 1.0)),
        Some(hit.t)
    );
}

#[test]
fn test_raycast_blocked_by_obstacle_in_next_tile() {
    let mut navmesh = navmesh();
    navmesh.add_collider(pillar(5.0, 2.0));
    navmesh.update();

    let hit = navmesh
        .raycast_hit(Vec3::new(1.0, 2.0, 2.0), Vec3::new(7.0, 2.0, 2.0))
        .unwrap();
    assert_eq!((hit.tile_x, hit.tile_z), (1, 0));
    assert!((hit.position.x - 4.0).abs() < 1e-4);
}

#[test]
fn test_parallel_update_matches_sequential() {
    let pool = DynamicNavMesh::worker_pool(4).unwrap();
    let mut sequential = navmesh();
    let mut parallel = navmesh();

    for navmesh in [&mut sequential, &mut parallel] {
        navmesh.add_collider(pillar(3.5, 3.5));
        navmesh.add_collider(ball(6.0, 6.0));
    }
    sequential.update();
    assert!(parallel.update_parallel(&pool));
    assert_same_meshes(&sequential, &parallel);

    let removed = 1;
    sequential.remove_collider(removed);
    parallel.remove_collider(removed);
    sequential.build();
    parallel.build_parallel(&pool);
    assert_same_heightfields(&sequential, &parallel);
    assert_same_meshes(&sequential, &parallel);
    assert!(!parallel.update_parallel(&pool));
}

#[test]
fn test_collider_ids_are_monotonic() {
    let mut navmesh = navmesh();
    let mut last = 0;
    for i in 0..10 {
        let id = navmesh.add_collider(ball(i as f32 * 0.5, 1.0));
        assert!(id > last);
        last = id;
        if i % 3 == 0 {
            navmesh.remove_collider(id);
            navmesh.update();
        }
    }
}

#[test]
fn test_builder_failure_keeps_previous_mesh() {
    // Rejects tile (0, 0) whenever an obstacle rises above the ground
    let builder = |tile_x: i32,
                   tile_z: i32,
                   hf: &Heightfield,
                   config: &DynamicNavMeshConfig|
     -> dynamic_navmesh::Result<TileMesh> {
        let obstructed = hf
            .columns()
            .any(|(_, _, spans)| spans.iter().any(|span| span.max > 4));
        if (tile_x, tile_z) == (0, 0) && obstructed {
            return Err(Error::mesh_build(tile_x, tile_z, "obstacle rejected"));
        }
        SpanTopMeshBuilder.build_tile_mesh(tile_x, tile_z, hf, config)
    };
    let mut navmesh = DynamicNavMesh::from_voxel_file(&flat_voxel_file(), Arc::new(builder)).unwrap();
    navmesh.build();
    let before = navmesh.current_nav_mesh();

    let id = navmesh.add_collider(pillar(4.0, 2.0));
    assert!(navmesh.update());
    let after = navmesh.current_nav_mesh();
    assert_eq!(after.version(), 2);

    let kept = after.tile(0, 0).unwrap().mesh.as_ref().unwrap();
    assert!(Arc::ptr_eq(kept, before.tile(0, 0).unwrap().mesh.as_ref().unwrap()));
    assert_ne!(after.tile_mesh(1, 0), before.tile_mesh(1, 0));
    assert_eq!(navmesh.statistics().dirty_tiles, 1);

    // The snapshot pairs the kept mesh with the voxels it was built from
    assert!(Arc::ptr_eq(
        &after.tile(0, 0).unwrap().heightfield,
        &before.tile(0, 0).unwrap().heightfield
    ));
    let down = (Vec3::new(3.5, 5.0, 2.0), Vec3::new(3.5, -5.0, 2.0));
    let live = navmesh.raycast(down.0, down.1).unwrap();
    assert!(live < 0.3);
    let query = dynamic_navmesh::VoxelQuery::from_params(after.params(), after.clone());
    let published = query.raycast(down.0, down.1).unwrap();
    assert!((published - 0.4).abs() < 1e-5);

    // Still failing: nothing new to publish
    assert!(!navmesh.update());

    navmesh.remove_collider(id);
    assert!(navmesh.update());
    assert_eq!(navmesh.statistics().dirty_tiles, 0);
}

#[test]
fn test_snapshot_readable_from_other_threads() {
    let mut navmesh = navmesh();
    let handle = navmesh.nav_mesh_handle();
    navmesh.build();

    let reader = std::thread::spawn(move || handle.current().version());
    let seen = reader.join().unwrap();
    assert!(seen >= 1);

    let held = navmesh.current_nav_mesh();
    navmesh.add_collider(pillar(2.0, 2.0));
    navmesh.update();
    assert_eq!(held.version(), 1);
    assert_eq!(navmesh.current_nav_mesh().version(), 2);
}

#[test]
fn test_voxel_file_round_trip_through_navmesh() {
    let mut original = navmesh();
    original.add_collider(pillar(2.0, 2.0));
    original.build();

    let mut exported = original.to_voxel_file();
    exported.endianness = Endianness::Little;
    let mut bytes = Vec::new();
    VoxelFileWriter::with_compressor(Box::new(Lz4Compressor))
        .write(&mut bytes, &exported, true)
        .unwrap();

    let file = VoxelFileReader::with_compressor(Box::new(Lz4Compressor))
        .read(&mut Cursor::new(&bytes))
        .unwrap();
    assert_eq!(file.endianness, Endianness::Little);
    assert!(file.is_compressed());

    let mut reloaded = DynamicNavMesh::from_voxel_file(&file, Arc::new(SpanTopMeshBuilder)).unwrap();
    reloaded.add_collider(pillar(2.0, 2.0));
    reloaded.build();
    assert_same_heightfields(&original, &reloaded);
    assert_same_meshes(&original, &reloaded);

    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(
        VoxelFileReader::with_compressor(Box::new(Lz4Compressor)).read(&mut Cursor::new(truncated)),
        Err(VoxelFileError::UnexpectedEof) | Err(VoxelFileError::InvalidFormat(_))
    ));
}
