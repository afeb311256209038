//! Dynamic Voxel Navigation Mesh
//!
//! This crate keeps a tile-partitioned voxel navigation mesh up to date while
//! solid obstacles are added to and removed from the world. Only the tiles an
//! obstacle touches are re-voxelized and rebuilt, and results are published
//! as immutable snapshots that reader threads can hold on to.
//!
//! # Features
//!
//! - **Dynamic Obstacle Management**: Add and remove colliders at runtime
//! - **Incremental Updates**: Checkpointed heightfields skip colliders already baked in
//! - **Parallel Rebuilds**: Dirty tiles fan out over a rayon thread pool
//! - **Collider Types**: Box, cylinder, sphere, capsule and composite colliders
//! - **Voxel Raycasts**: Two-level grid traversal against the span data
//! - **Voxel Files**: Big- and little-endian files with optional LZ4 compression
//!
//! # Example
//!
//! ```rust,no_run
//! use dynamic_navmesh::io::{Lz4Compressor, VoxelFileReader};
//! use dynamic_navmesh::{BoxCollider, DynamicNavMesh, SpanTopMeshBuilder};
//! use dynamic_navmesh::colliders::SAMPLE_POLYAREA_TYPE_GROUND;
//! use glam::Vec3;
//! use std::fs::File;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = VoxelFileReader::with_compressor(Box::new(Lz4Compressor));
//! let file = reader.read(&mut File::open("level.voxels")?)?;
//!
//! let mut navmesh = DynamicNavMesh::from_voxel_file(&file, Arc::new(SpanTopMeshBuilder))?;
//! navmesh.build();
//!
//! // Drop a crate in the world and rebuild the tiles it covers
//! let crate_id = navmesh.add_collider(Arc::new(BoxCollider::new(
//!     Vec3::new(5.0, 0.5, 5.0),
//!     Vec3::splat(0.5),
//!     SAMPLE_POLYAREA_TYPE_GROUND,
//!     1,
//! )));
//! if navmesh.update() {
//!     println!("{} polygons", navmesh.current_nav_mesh().poly_count());
//! }
//!
//! if let Some(t) = navmesh.raycast(Vec3::new(5.0, 10.0, 5.0), Vec3::new(5.0, -10.0, 5.0)) {
//!     println!("Hit at t = {t}");
//! }
//!
//! navmesh.remove_collider(crate_id);
//! navmesh.update();
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod colliders;
pub mod commands;
pub mod config;
pub mod dynamic_navmesh;
pub mod dynamic_tile;
pub mod error;
pub mod heightfield;
pub mod io;
pub mod mesh_builder;
pub mod navmesh;
pub mod rasterization;
pub mod voxel_query;

/// Integer coordinates of a tile in the tile grid
pub type TileCoord = (i32, i32);

pub use checkpoint::Checkpoint;
pub use commands::{ColliderCommand, CommandQueue};
pub use config::{DynamicNavMeshConfig, PartitionType};
pub use dynamic_navmesh::{DynamicNavMesh, DynamicNavMeshStatistics, UpdateState};
pub use dynamic_tile::{DynamicTile, TileStatus};
pub use error::{Error, Result, VoxelFileError};
pub use heightfield::{Heightfield, Span};
pub use mesh_builder::{MeshBuilder, SpanTopMeshBuilder, TileMesh, TilePolygon};
pub use navmesh::{NavMesh, NavMeshHandle, NavMeshParams, PublishedTile};

// Re-export collider types
pub use colliders::{
    BoxCollider, CapsuleCollider, Collider, ColliderType, CompositeCollider, CylinderCollider,
    SphereCollider,
};

// Re-export I/O types
pub use io::{Endianness, VoxelFile, VoxelFileReader, VoxelFileWriter, VoxelTile};

// Re-export voxel query
pub use voxel_query::{HeightfieldProvider, VoxelQuery, VoxelRaycastHit};
