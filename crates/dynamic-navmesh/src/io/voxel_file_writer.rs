use crate::error::VoxelFileError;
use crate::io::{
    Endianness, VoxelCompressor, VoxelFile, VERSION_BASE_MASK, VERSION_COMPRESSION_LZ4,
    VERSION_EXPORTER_RECAST4J, VOXEL_FILE_MAGIC,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use glam::Vec3;
use std::borrow::Cow;
use std::io::Write;

/// Writes voxel files in the byte order recorded on the [`VoxelFile`]
pub struct VoxelFileWriter {
    compressor: Option<Box<dyn VoxelCompressor>>,
}

impl Default for VoxelFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelFileWriter {
    pub fn new() -> Self {
        VoxelFileWriter { compressor: None }
    }

    pub fn with_compressor(compressor: Box<dyn VoxelCompressor>) -> Self {
        VoxelFileWriter {
            compressor: Some(compressor),
        }
    }

    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        file: &VoxelFile,
        use_compression: bool,
    ) -> Result<(), VoxelFileError> {
        let compressor = match (use_compression, self.compressor.as_deref()) {
            (false, _) => None,
            (true, Some(compressor)) => Some(compressor),
            (true, None) => {
                return Err(VoxelFileError::InvalidFormat(
                    "compression requested but no compressor provided".to_string(),
                ))
            }
        };

        match file.endianness {
            Endianness::Big => write_file::<BigEndian, W>(writer, file, compressor),
            Endianness::Little => write_file::<LittleEndian, W>(writer, file, compressor),
        }
    }
}

fn write_file<B: ByteOrder, W: Write>(
    writer: &mut W,
    file: &VoxelFile,
    compressor: Option<&dyn VoxelCompressor>,
) -> Result<(), VoxelFileError> {
    writer.write_u32::<B>(VOXEL_FILE_MAGIC)?;

    let mut version = (file.version & VERSION_BASE_MASK) | VERSION_EXPORTER_RECAST4J;
    if compressor.is_some() {
        version |= VERSION_COMPRESSION_LZ4;
    }
    writer.write_u32::<B>(version)?;

    writer.write_f32::<B>(file.walkable_radius)?;
    writer.write_f32::<B>(file.walkable_height)?;
    writer.write_f32::<B>(file.walkable_climb)?;
    writer.write_f32::<B>(file.walkable_slope_angle)?;
    writer.write_f32::<B>(file.cell_size)?;
    writer.write_f32::<B>(file.max_simplification_error)?;
    writer.write_f32::<B>(file.max_edge_len)?;
    writer.write_f32::<B>(file.min_region_area)?;

    writer.write_f32::<B>(file.region_merge_area)?;
    writer.write_i32::<B>(file.verts_per_poly)?;
    writer.write_u8(u8::from(file.build_mesh_detail))?;
    writer.write_f32::<B>(file.detail_sample_distance)?;
    writer.write_f32::<B>(file.detail_sample_max_error)?;

    writer.write_u8(u8::from(file.use_tiles))?;
    writer.write_i32::<B>(file.tile_size_x)?;
    writer.write_i32::<B>(file.tile_size_z)?;
    write_vec3::<B, W>(writer, file.rotation)?;
    for bound in &file.bounds {
        writer.write_f32::<B>(*bound)?;
    }

    let tile_count = i32::try_from(file.tiles.len())
        .map_err(|_| VoxelFileError::InvalidFormat("too many tiles".to_string()))?;
    writer.write_i32::<B>(tile_count)?;

    for tile in &file.tiles {
        writer.write_i32::<B>(tile.tile_x)?;
        writer.write_i32::<B>(tile.tile_z)?;
        writer.write_i32::<B>(tile.width)?;
        writer.write_i32::<B>(tile.depth)?;
        writer.write_i32::<B>(tile.border_size)?;
        write_vec3::<B, W>(writer, tile.bounds_min)?;
        write_vec3::<B, W>(writer, tile.bounds_max)?;
        writer.write_f32::<B>(tile.cell_size)?;
        writer.write_f32::<B>(tile.cell_height)?;

        let tile = tile.to_endianness(file.endianness)?;
        let voxel_data = match compressor {
            Some(compressor) => Cow::Owned(compressor.compress(&tile.span_data)?),
            None => Cow::Borrowed(tile.span_data.as_slice()),
        };
        let voxel_size = i32::try_from(voxel_data.len()).map_err(|_| {
            VoxelFileError::InvalidFormat(format!(
                "span data of tile ({}, {}) too large",
                tile.tile_x, tile.tile_z
            ))
        })?;
        writer.write_i32::<B>(voxel_size)?;
        writer.write_all(&voxel_data)?;
    }

    Ok(())
}

fn write_vec3<B: ByteOrder, W: Write>(writer: &mut W, v: Vec3) -> Result<(), VoxelFileError> {
    writer.write_f32::<B>(v.x)?;
    writer.write_f32::<B>(v.y)?;
    writer.write_f32::<B>(v.z)?;
    Ok(())
}
