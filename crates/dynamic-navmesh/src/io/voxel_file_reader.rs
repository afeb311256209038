use crate::error::VoxelFileError;
use crate::io::{
    Endianness, VoxelCompressor, VoxelFile, VoxelTile, VERSION_BASE_MASK,
    VERSION_COMPRESSION_LZ4, VERSION_COMPRESSION_MASK, VERSION_EXPORTER_MASK, VOXEL_FILE_MAGIC,
    VOXEL_FILE_VERSION,
};
use crate::io::voxel_tile::{tile_column_count, SERIALIZED_SPAN_COUNT_BYTES};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io::Read;

/// Reads voxel files in either byte order.
///
/// Compressed files need a compressor; without one they are rejected as
/// invalid rather than handed out with undecodable tiles.
pub struct VoxelFileReader {
    compressor: Option<Box<dyn VoxelCompressor>>,
}

impl Default for VoxelFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelFileReader {
    pub fn new() -> Self {
        VoxelFileReader { compressor: None }
    }

    pub fn with_compressor(compressor: Box<dyn VoxelCompressor>) -> Self {
        VoxelFileReader {
            compressor: Some(compressor),
        }
    }

    pub fn read<R: Read>(&self, reader: &mut R) -> Result<VoxelFile, VoxelFileError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if BigEndian::read_u32(&magic) == VOXEL_FILE_MAGIC {
            self.read_body::<BigEndian, R>(reader, Endianness::Big)
        } else if LittleEndian::read_u32(&magic) == VOXEL_FILE_MAGIC {
            self.read_body::<LittleEndian, R>(reader, Endianness::Little)
        } else {
            Err(VoxelFileError::InvalidFormat(format!(
                "bad magic {magic:02x?}"
            )))
        }
    }

    fn read_body<B: ByteOrder, R: Read>(
        &self,
        reader: &mut R,
        endianness: Endianness,
    ) -> Result<VoxelFile, VoxelFileError> {
        let mut file = VoxelFile::new();
        file.endianness = endianness;
        file.version = reader.read_u32::<B>()?;
        if file.version & VERSION_BASE_MASK != VOXEL_FILE_VERSION {
            return Err(VoxelFileError::UnsupportedVersion(file.version));
        }

        let is_exported_from_astar = (file.version & VERSION_EXPORTER_MASK) == 0;
        let compression = (file.version & VERSION_COMPRESSION_MASK) == VERSION_COMPRESSION_LZ4;
        if compression && self.compressor.is_none() {
            return Err(VoxelFileError::InvalidFormat(
                "compressed voxel file requires a compressor".to_string(),
            ));
        }

        file.walkable_radius = reader.read_f32::<B>()?;
        file.walkable_height = reader.read_f32::<B>()?;
        file.walkable_climb = reader.read_f32::<B>()?;
        file.walkable_slope_angle = reader.read_f32::<B>()?;
        file.cell_size = reader.read_f32::<B>()?;
        file.max_simplification_error = reader.read_f32::<B>()?;
        file.max_edge_len = reader.read_f32::<B>()?;
        file.min_region_area = reader.read_f32::<B>()?;

        if is_exported_from_astar {
            file.region_merge_area = 6.0 * file.min_region_area;
            file.verts_per_poly = 6;
            file.build_mesh_detail = true;
            file.detail_sample_distance = file.max_edge_len * 0.5;
            file.detail_sample_max_error = file.max_simplification_error * 0.8;
        } else {
            file.region_merge_area = reader.read_f32::<B>()?;
            file.verts_per_poly = reader.read_i32::<B>()?;
            file.build_mesh_detail = reader.read_u8()? != 0;
            file.detail_sample_distance = reader.read_f32::<B>()?;
            file.detail_sample_max_error = reader.read_f32::<B>()?;
        }

        file.use_tiles = reader.read_u8()? != 0;
        file.tile_size_x = reader.read_i32::<B>()?;
        file.tile_size_z = reader.read_i32::<B>()?;
        file.rotation = read_vec3::<B, R>(reader)?;
        for bound in file.bounds.iter_mut() {
            *bound = reader.read_f32::<B>()?;
        }

        if is_exported_from_astar {
            // Stored as center and size
            file.bounds[0] -= 0.5 * file.bounds[3];
            file.bounds[1] -= 0.5 * file.bounds[4];
            file.bounds[2] -= 0.5 * file.bounds[5];
            file.bounds[3] += file.bounds[0];
            file.bounds[4] += file.bounds[1];
            file.bounds[5] += file.bounds[2];
        }

        let tile_count = reader.read_i32::<B>()?;
        if tile_count < 0 {
            return Err(VoxelFileError::InvalidFormat(format!(
                "negative tile count {tile_count}"
            )));
        }

        for _ in 0..tile_count {
            let tile_x = reader.read_i32::<B>()?;
            let tile_z = reader.read_i32::<B>()?;
            let width = reader.read_i32::<B>()?;
            let depth = reader.read_i32::<B>()?;
            let border_size = reader.read_i32::<B>()?;
            let columns = tile_column_count(tile_x, tile_z, width, depth)?;

            let mut bounds_min = read_vec3::<B, R>(reader)?;
            let mut bounds_max = read_vec3::<B, R>(reader)?;
            if is_exported_from_astar {
                // Tile bounds are relative to the file bounds
                let offset = file.bounds_min();
                bounds_min += offset;
                bounds_max += offset;
            }

            let cell_size = reader.read_f32::<B>()?;
            let cell_height = reader.read_f32::<B>()?;
            let voxel_size = reader.read_i32::<B>()?;
            let voxel_size = u64::try_from(voxel_size).map_err(|_| {
                VoxelFileError::InvalidFormat(format!("negative span data size {voxel_size}"))
            })?;

            let mut voxel_data = Vec::new();
            reader.by_ref().take(voxel_size).read_to_end(&mut voxel_data)?;
            if (voxel_data.len() as u64) < voxel_size {
                return Err(VoxelFileError::UnexpectedEof);
            }

            if compression {
                if let Some(compressor) = &self.compressor {
                    voxel_data = compressor.decompress(&voxel_data)?;
                }
            }
            if voxel_data.len() / SERIALIZED_SPAN_COUNT_BYTES < columns {
                return Err(VoxelFileError::UnexpectedEof);
            }

            file.add_tile(VoxelTile::new(
                tile_x,
                tile_z,
                width,
                depth,
                bounds_min,
                bounds_max,
                cell_size,
                cell_height,
                border_size,
                voxel_data,
                endianness,
            ));
        }

        log::debug!(
            "Read voxel file v{:#06x} ({:?}) with {} tiles",
            file.version,
            endianness,
            file.tiles.len()
        );
        Ok(file)
    }
}

fn read_vec3<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Vec3, VoxelFileError> {
    Ok(Vec3::new(
        reader.read_f32::<B>()?,
        reader.read_f32::<B>()?,
        reader.read_f32::<B>()?,
    ))
}
