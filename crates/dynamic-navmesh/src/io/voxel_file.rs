use super::VoxelTile;
use crate::config::DynamicNavMeshConfig;
use glam::Vec3;

pub const VOXEL_FILE_MAGIC: u32 =
    (b'V' as u32) << 24 | (b'O' as u32) << 16 | (b'X' as u32) << 8 | (b'L' as u32);
pub const VERSION_EXPORTER_MASK: u32 = 0xF000;
pub const VERSION_COMPRESSION_MASK: u32 = 0x0F00;
pub const VERSION_BASE_MASK: u32 = 0x00FF;
pub const VERSION_EXPORTER_RECAST4J: u32 = 0x1000;
pub const VERSION_COMPRESSION_LZ4: u32 = 0x0100;
pub const VOXEL_FILE_VERSION: u32 = 1;

/// Cell height used when a file carries no tiles to take it from
pub const DEFAULT_CELL_HEIGHT: f32 = 0.2;

/// Byte order of a voxel file, detected from its magic on read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Header and tiles of a persisted voxel navmesh
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelFile {
    pub version: u32,
    pub endianness: Endianness,
    pub partition: i32,
    pub filter_low_hanging_obstacles: bool,
    pub filter_ledge_spans: bool,
    pub filter_walkable_low_height_spans: bool,
    pub walkable_radius: f32,
    pub walkable_height: f32,
    pub walkable_climb: f32,
    pub walkable_slope_angle: f32,
    pub cell_size: f32,
    pub max_simplification_error: f32,
    pub max_edge_len: f32,
    pub min_region_area: f32,
    pub region_merge_area: f32,
    pub verts_per_poly: i32,
    pub build_mesh_detail: bool,
    pub detail_sample_distance: f32,
    pub detail_sample_max_error: f32,
    pub use_tiles: bool,
    pub tile_size_x: i32,
    pub tile_size_z: i32,
    pub rotation: Vec3,
    pub bounds: [f32; 6],
    pub tiles: Vec<VoxelTile>,
}

impl Default for VoxelFile {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelFile {
    pub fn new() -> Self {
        VoxelFile {
            version: VOXEL_FILE_VERSION,
            endianness: Endianness::Big,
            partition: 0,
            filter_low_hanging_obstacles: true,
            filter_ledge_spans: true,
            filter_walkable_low_height_spans: true,
            walkable_radius: 0.0,
            walkable_height: 0.0,
            walkable_climb: 0.0,
            walkable_slope_angle: 0.0,
            cell_size: 0.0,
            max_simplification_error: 0.0,
            max_edge_len: 0.0,
            min_region_area: 0.0,
            region_merge_area: 0.0,
            verts_per_poly: 6,
            build_mesh_detail: true,
            detail_sample_distance: 0.0,
            detail_sample_max_error: 0.0,
            use_tiles: false,
            tile_size_x: 0,
            tile_size_z: 0,
            rotation: Vec3::ZERO,
            bounds: [0.0; 6],
            tiles: Vec::new(),
        }
    }

    /// Header carrying the settings of `config`, without tiles
    pub fn from_config(config: &DynamicNavMeshConfig) -> Self {
        VoxelFile {
            partition: config.partition.index(),
            filter_low_hanging_obstacles: config.filter_low_hanging_obstacles,
            filter_ledge_spans: config.filter_ledge_spans,
            filter_walkable_low_height_spans: config.filter_walkable_low_height_spans,
            walkable_radius: config.walkable_radius,
            walkable_height: config.walkable_height,
            walkable_climb: config.walkable_climb,
            walkable_slope_angle: config.walkable_slope_angle,
            cell_size: config.cell_size,
            max_simplification_error: config.max_simplification_error,
            max_edge_len: config.max_edge_len,
            min_region_area: config.min_region_area,
            region_merge_area: config.region_merge_area,
            verts_per_poly: config.verts_per_poly,
            build_mesh_detail: config.build_detail_mesh,
            detail_sample_distance: config.detail_sample_distance,
            detail_sample_max_error: config.detail_sample_max_error,
            use_tiles: config.use_tiles,
            tile_size_x: config.tile_size_x,
            tile_size_z: config.tile_size_z,
            bounds: [
                config.world_min.x,
                config.world_min.y,
                config.world_min.z,
                config.world_max.x,
                config.world_max.y,
                config.world_max.z,
            ],
            ..Self::new()
        }
    }

    pub fn add_tile(&mut self, tile: VoxelTile) {
        self.tiles.push(tile);
    }

    /// Vertical voxel size; the header has none, so it comes from the first tile
    pub fn cell_height(&self) -> f32 {
        self.tiles
            .first()
            .map_or(DEFAULT_CELL_HEIGHT, |tile| tile.cell_height)
    }

    pub fn is_compressed(&self) -> bool {
        self.version & VERSION_COMPRESSION_MASK == VERSION_COMPRESSION_LZ4
    }

    pub fn bounds_min(&self) -> Vec3 {
        Vec3::new(self.bounds[0], self.bounds[1], self.bounds[2])
    }

    pub fn bounds_max(&self) -> Vec3 {
        Vec3::new(self.bounds[3], self.bounds[4], self.bounds[5])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::Heightfield;

    #[test]
    fn test_magic_spells_voxl() {
        assert_eq!(&VOXEL_FILE_MAGIC.to_be_bytes(), b"VOXL");
    }

    #[test]
    fn test_header_from_config() {
        let config = DynamicNavMeshConfig::new(true, 16, 8, 0.5)
            .with_walkable_height(1.8)
            .with_filters(false, true, false);
        let file = VoxelFile::from_config(&config);

        assert_eq!(file.version, VOXEL_FILE_VERSION);
        assert_eq!(file.tile_size_x, 16);
        assert_eq!(file.tile_size_z, 8);
        assert_eq!(file.walkable_height, 1.8);
        assert!(!file.filter_low_hanging_obstacles);
        assert!(file.filter_ledge_spans);
        assert_eq!(file.bounds_min(), config.world_min);
        assert_eq!(file.bounds_max(), config.world_max);
        assert!(!file.is_compressed());
    }

    #[test]
    fn test_cell_height_comes_from_tiles() {
        let mut file = VoxelFile::new();
        assert_eq!(file.cell_height(), DEFAULT_CELL_HEIGHT);

        let hf = Heightfield::new(1, 1, Vec3::ZERO, Vec3::ONE, 0.5, 0.1);
        file.add_tile(VoxelTile::from_heightfield(0, 0, &hf, Endianness::Big));
        assert_eq!(file.cell_height(), 0.1);
    }
}
