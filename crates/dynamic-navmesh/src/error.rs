//! Error types for dynamic navmesh construction, rebuilds and voxel file IO

use std::io;

/// Errors raised while reading or writing persisted voxel data
#[derive(thiserror::Error, Debug)]
pub enum VoxelFileError {
    #[error("invalid voxel data: {0}")]
    InvalidFormat(String),

    #[error("unexpected end of voxel data")]
    UnexpectedEof,

    #[error("unsupported voxel file version {0:#06x}")]
    UnsupportedVersion(u32),

    #[error("voxel file I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for VoxelFileError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => VoxelFileError::UnexpectedEof,
            io::ErrorKind::InvalidData => VoxelFileError::InvalidFormat(err.to_string()),
            _ => VoxelFileError::Io(err),
        }
    }
}

/// Error type for the dynamic navmesh library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("heightfield error: {0}")]
    Heightfield(String),

    #[error("mesh build failed for tile ({tile_x}, {tile_z}): {reason}")]
    MeshBuild {
        tile_x: i32,
        tile_z: i32,
        reason: String,
    },

    #[error(transparent)]
    VoxelFile(#[from] VoxelFileError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Convenience constructor used by mesh builders
    pub fn mesh_build(tile_x: i32, tile_z: i32, reason: impl Into<String>) -> Self {
        Error::MeshBuild {
            tile_x,
            tile_z,
            reason: reason.into(),
        }
    }
}

/// Result type for dynamic navmesh operations
pub type Result<T> = std::result::Result<T, Error>;
