//! Persisted voxel navmesh format

mod compressor;
mod voxel_file;
mod voxel_file_reader;
mod voxel_file_writer;
mod voxel_tile;

pub use compressor::*;
pub use voxel_file::*;
pub use voxel_file_reader::*;
pub use voxel_file_writer::*;
pub use voxel_tile::*;
