use crate::error::VoxelFileError;
use crate::heightfield::{Heightfield, Span};
use crate::io::Endianness;
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use glam::Vec3;

pub(crate) const SERIALIZED_SPAN_COUNT_BYTES: usize = 2;
const SERIALIZED_SPAN_BYTES: usize = 12;

/// Persisted voxel data of one tile.
///
/// `span_data` is the raw span blob in `endianness` byte order, kept as read
/// so a file can be written back without re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelTile {
    pub tile_x: i32,
    pub tile_z: i32,
    pub border_size: i32,
    pub width: i32,
    pub depth: i32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    pub span_data: Vec<u8>,
    pub endianness: Endianness,
}

impl VoxelTile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tile_x: i32,
        tile_z: i32,
        width: i32,
        depth: i32,
        bounds_min: Vec3,
        bounds_max: Vec3,
        cell_size: f32,
        cell_height: f32,
        border_size: i32,
        span_data: Vec<u8>,
        endianness: Endianness,
    ) -> Self {
        VoxelTile {
            tile_x,
            tile_z,
            border_size,
            width,
            depth,
            bounds_min,
            bounds_max,
            cell_size,
            cell_height,
            span_data,
            endianness,
        }
    }

    pub fn from_heightfield(
        tile_x: i32,
        tile_z: i32,
        heightfield: &Heightfield,
        endianness: Endianness,
    ) -> Self {
        VoxelTile {
            tile_x,
            tile_z,
            border_size: heightfield.border_size,
            width: heightfield.width,
            depth: heightfield.depth,
            bounds_min: heightfield.bmin,
            bounds_max: heightfield.bmax,
            cell_size: heightfield.cs,
            cell_height: heightfield.ch,
            span_data: heightfield_to_bytes(heightfield, endianness),
            endianness,
        }
    }

    /// Decodes the span blob into a heightfield
    pub fn heightfield(&self) -> Result<Heightfield, VoxelFileError> {
        let columns = self.column_count()?;
        if self.span_data.len() / SERIALIZED_SPAN_COUNT_BYTES < columns {
            return Err(VoxelFileError::UnexpectedEof);
        }
        let mut heightfield = Heightfield::new(
            self.width,
            self.depth,
            self.bounds_min,
            self.bounds_max,
            self.cell_size,
            self.cell_height,
        )
        .with_border_size(self.border_size);
        heightfield_from_bytes(&mut heightfield, &self.span_data, self.endianness)?;
        Ok(heightfield)
    }

    /// Number of span columns in the tile.
    ///
    /// Fails with `InvalidFormat` for negative sizes and for sizes whose
    /// column count does not fit the `i32` cell addressing.
    pub fn column_count(&self) -> Result<usize, VoxelFileError> {
        tile_column_count(self.tile_x, self.tile_z, self.width, self.depth)
    }

    /// Returns a copy whose span blob is encoded in `endianness`
    pub fn to_endianness(&self, endianness: Endianness) -> Result<VoxelTile, VoxelFileError> {
        if endianness == self.endianness {
            return Ok(self.clone());
        }
        let heightfield = self.heightfield()?;
        Ok(VoxelTile {
            span_data: heightfield_to_bytes(&heightfield, endianness),
            endianness,
            ..self.clone()
        })
    }
}

pub(crate) fn tile_column_count(
    tile_x: i32,
    tile_z: i32,
    width: i32,
    depth: i32,
) -> Result<usize, VoxelFileError> {
    if width < 0 || depth < 0 {
        return Err(VoxelFileError::InvalidFormat(format!(
            "tile ({tile_x}, {tile_z}) has negative size {width}x{depth}"
        )));
    }
    width
        .checked_mul(depth)
        .map(|columns| columns as usize)
        .ok_or_else(|| {
            VoxelFileError::InvalidFormat(format!(
                "tile ({tile_x}, {tile_z}) size {width}x{depth} is too large"
            ))
        })
}

/// Serializes every column in row-major order: a `u16` span count followed
/// by `(min, max, area)` as `i32` triples.
pub fn heightfield_to_bytes(heightfield: &Heightfield, endianness: Endianness) -> Vec<u8> {
    match endianness {
        Endianness::Big => write_spans::<BigEndian>(heightfield),
        Endianness::Little => write_spans::<LittleEndian>(heightfield),
    }
}

/// Fills an empty `heightfield` from a span blob produced by [`heightfield_to_bytes`]
pub fn heightfield_from_bytes(
    heightfield: &mut Heightfield,
    data: &[u8],
    endianness: Endianness,
) -> Result<(), VoxelFileError> {
    match endianness {
        Endianness::Big => read_spans::<BigEndian>(heightfield, data),
        Endianness::Little => read_spans::<LittleEndian>(heightfield, data),
    }
}

fn write_spans<B: ByteOrder>(heightfield: &Heightfield) -> Vec<u8> {
    let columns = heightfield.width as usize * heightfield.depth as usize;
    let data_size = heightfield.span_count() * SERIALIZED_SPAN_BYTES
        + columns * SERIALIZED_SPAN_COUNT_BYTES;
    let mut data = Vec::with_capacity(data_size);

    let mut count = [0u8; SERIALIZED_SPAN_COUNT_BYTES];
    let mut span_bytes = [0u8; SERIALIZED_SPAN_BYTES];
    for (_, _, spans) in heightfield.columns() {
        let span_count = u16::try_from(spans.len()).unwrap_or(u16::MAX);
        B::write_u16(&mut count, span_count);
        data.extend_from_slice(&count);

        for span in &spans[..span_count as usize] {
            B::write_i32(&mut span_bytes[0..4], span.min);
            B::write_i32(&mut span_bytes[4..8], span.max);
            B::write_i32(&mut span_bytes[8..12], i32::from(span.area));
            data.extend_from_slice(&span_bytes);
        }
    }

    data
}

fn read_spans<B: ByteOrder>(
    heightfield: &mut Heightfield,
    data: &[u8],
) -> Result<(), VoxelFileError> {
    let mut cursor = data;
    for z in 0..heightfield.depth {
        for x in 0..heightfield.width {
            let span_count = cursor.read_u16::<B>()?;
            if cursor.len() < span_count as usize * SERIALIZED_SPAN_BYTES {
                return Err(VoxelFileError::UnexpectedEof);
            }
            let index = (x + z * heightfield.width) as usize;

            for _ in 0..span_count {
                let min = cursor.read_i32::<B>()?;
                let max = cursor.read_i32::<B>()?;
                let area = cursor.read_i32::<B>()?;
                if min > max {
                    return Err(VoxelFileError::InvalidFormat(format!(
                        "span at ({x}, {z}) has min {min} above max {max}"
                    )));
                }
                let area = u8::try_from(area).map_err(|_| {
                    VoxelFileError::InvalidFormat(format!("span at ({x}, {z}) has area {area}"))
                })?;
                heightfield.push_span(index, Span::new(min, max, area));
            }
        }
    }

    if !cursor.is_empty() {
        return Err(VoxelFileError::InvalidFormat(format!(
            "{} trailing bytes after span data",
            cursor.len()
        )));
    }
    Ok(())
}
