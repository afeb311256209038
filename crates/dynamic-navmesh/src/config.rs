use crate::error::{Error, Result};
use crate::io::VoxelFile;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Region partitioning strategy handed through to the mesh builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionType {
    #[default]
    Watershed,
    Monotone,
    Layers,
}

impl PartitionType {
    /// Maps the persisted partition index, falling back to watershed for unknown values
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => PartitionType::Monotone,
            2 => PartitionType::Layers,
            _ => PartitionType::Watershed,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            PartitionType::Watershed => 0,
            PartitionType::Monotone => 1,
            PartitionType::Layers => 2,
        }
    }
}

/// Build configuration shared by every tile of a dynamic navmesh.
///
/// Tile extents are expressed in cells: a tile covers `tile_size_x * cell_size`
/// world units along x when `use_tiles` is set, otherwise a single tile spans
/// the whole world bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicNavMeshConfig {
    pub use_tiles: bool,
    pub tile_size_x: i32,
    pub tile_size_z: i32,
    pub cell_size: f32,
    pub cell_height: f32,
    pub world_min: Vec3,
    pub world_max: Vec3,
    pub partition: PartitionType,
    pub walkable_area: u8,
    pub walkable_height: f32,
    pub walkable_slope_angle: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    pub min_region_area: f32,
    pub region_merge_area: f32,
    pub max_edge_len: f32,
    pub max_simplification_error: f32,
    pub verts_per_poly: i32,
    pub build_detail_mesh: bool,
    pub detail_sample_distance: f32,
    pub detail_sample_max_error: f32,
    pub filter_low_hanging_obstacles: bool,
    pub filter_ledge_spans: bool,
    pub filter_walkable_low_height_spans: bool,
    pub enable_checkpoints: bool,
}

impl DynamicNavMeshConfig {
    pub fn new(use_tiles: bool, tile_size_x: i32, tile_size_z: i32, cell_size: f32) -> Self {
        DynamicNavMeshConfig {
            use_tiles,
            tile_size_x,
            tile_size_z,
            cell_size,
            cell_height: 0.2,
            world_min: Vec3::new(-10.0, -5.0, -10.0),
            world_max: Vec3::new(10.0, 5.0, 10.0),
            partition: PartitionType::Watershed,
            walkable_area: 1,
            walkable_height: 2.0,
            walkable_slope_angle: 45.0,
            walkable_radius: 0.6,
            walkable_climb: 0.9,
            min_region_area: 8.0,
            region_merge_area: 20.0,
            max_edge_len: 12.0,
            max_simplification_error: 1.3,
            verts_per_poly: 6,
            build_detail_mesh: true,
            detail_sample_distance: 6.0,
            detail_sample_max_error: 1.0,
            filter_low_hanging_obstacles: true,
            filter_ledge_spans: true,
            filter_walkable_low_height_spans: true,
            enable_checkpoints: true,
        }
    }

    /// Reads the build settings stored in a voxel file header
    pub fn from_voxel_file(file: &VoxelFile) -> Self {
        Self::new(file.use_tiles, file.tile_size_x, file.tile_size_z, file.cell_size)
            .with_cell_height(file.cell_height())
            .with_world_bounds(
                Vec3::new(file.bounds[0], file.bounds[1], file.bounds[2]),
                Vec3::new(file.bounds[3], file.bounds[4], file.bounds[5]),
            )
            .with_partition(PartitionType::from_index(file.partition))
            .with_walkable_height(file.walkable_height)
            .with_walkable_radius(file.walkable_radius)
            .with_walkable_climb(file.walkable_climb)
            .with_walkable_slope_angle(file.walkable_slope_angle)
            .with_min_region_area(file.min_region_area)
            .with_region_merge_area(file.region_merge_area)
            .with_max_edge_len(file.max_edge_len)
            .with_max_simplification_error(file.max_simplification_error)
            .with_verts_per_poly(file.verts_per_poly)
            .with_detail_mesh(file.build_mesh_detail)
            .with_detail_sample_distance(file.detail_sample_distance)
            .with_detail_sample_max_error(file.detail_sample_max_error)
            .with_filters(
                file.filter_low_hanging_obstacles,
                file.filter_ledge_spans,
                file.filter_walkable_low_height_spans,
            )
    }

    pub fn with_walkable_height(mut self, walkable_height: f32) -> Self {
        self.walkable_height = walkable_height;
        self
    }

    pub fn with_walkable_radius(mut self, walkable_radius: f32) -> Self {
        self.walkable_radius = walkable_radius;
        self
    }

    pub fn with_walkable_climb(mut self, walkable_climb: f32) -> Self {
        self.walkable_climb = walkable_climb;
        self
    }

    pub fn with_walkable_slope_angle(mut self, walkable_slope_angle: f32) -> Self {
        self.walkable_slope_angle = walkable_slope_angle;
        self
    }

    pub fn with_min_region_area(mut self, min_region_area: f32) -> Self {
        self.min_region_area = min_region_area;
        self
    }

    pub fn with_region_merge_area(mut self, region_merge_area: f32) -> Self {
        self.region_merge_area = region_merge_area;
        self
    }

    pub fn with_max_edge_len(mut self, max_edge_len: f32) -> Self {
        self.max_edge_len = max_edge_len;
        self
    }

    pub fn with_max_simplification_error(mut self, max_simplification_error: f32) -> Self {
        self.max_simplification_error = max_simplification_error;
        self
    }

    pub fn with_verts_per_poly(mut self, verts_per_poly: i32) -> Self {
        self.verts_per_poly = verts_per_poly;
        self
    }

    pub fn with_detail_mesh(mut self, build_detail_mesh: bool) -> Self {
        self.build_detail_mesh = build_detail_mesh;
        self
    }

    pub fn with_detail_sample_distance(mut self, detail_sample_distance: f32) -> Self {
        self.detail_sample_distance = detail_sample_distance;
        self
    }

    pub fn with_detail_sample_max_error(mut self, detail_sample_max_error: f32) -> Self {
        self.detail_sample_max_error = detail_sample_max_error;
        self
    }

    pub fn with_partition(mut self, partition: PartitionType) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_filters(mut self, low_hanging: bool, ledge: bool, low_height: bool) -> Self {
        self.filter_low_hanging_obstacles = low_hanging;
        self.filter_ledge_spans = ledge;
        self.filter_walkable_low_height_spans = low_height;
        self
    }

    pub fn with_checkpoints(mut self, enable_checkpoints: bool) -> Self {
        self.enable_checkpoints = enable_checkpoints;
        self
    }

    pub fn with_world_bounds(mut self, world_min: Vec3, world_max: Vec3) -> Self {
        self.world_min = world_min;
        self.world_max = world_max;
        self
    }

    pub fn with_cell_height(mut self, cell_height: f32) -> Self {
        self.cell_height = cell_height;
        self
    }

    /// World-space width of one tile along x
    pub fn tile_width(&self) -> f32 {
        if self.use_tiles {
            self.cell_size * self.tile_size_x as f32
        } else {
            self.world_max.x - self.world_min.x
        }
    }

    /// World-space depth of one tile along z
    pub fn tile_depth(&self) -> f32 {
        if self.use_tiles {
            self.cell_size * self.tile_size_z as f32
        } else {
            self.world_max.z - self.world_min.z
        }
    }

    /// Walkable clearance expressed in voxels, rounded up
    pub fn walkable_height_voxels(&self) -> i32 {
        (self.walkable_height / self.cell_height).ceil() as i32
    }

    /// Walkable step height expressed in voxels, rounded down
    pub fn walkable_climb_voxels(&self) -> i32 {
        (self.walkable_climb / self.cell_height).floor() as i32
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_size <= 0.0 {
            return Err(Error::InvalidConfig("cell size must be positive".to_string()));
        }
        if self.cell_height <= 0.0 {
            return Err(Error::InvalidConfig("cell height must be positive".to_string()));
        }
        if self.use_tiles && (self.tile_size_x <= 0 || self.tile_size_z <= 0) {
            return Err(Error::InvalidConfig(format!(
                "tile size must be positive, got {}x{}",
                self.tile_size_x, self.tile_size_z
            )));
        }
        if self.walkable_height <= 0.0 {
            return Err(Error::InvalidConfig(
                "walkable height must be positive".to_string(),
            ));
        }
        if self.walkable_radius < 0.0 {
            return Err(Error::InvalidConfig(
                "walkable radius cannot be negative".to_string(),
            ));
        }
        if self.walkable_climb < 0.0 {
            return Err(Error::InvalidConfig(
                "walkable climb cannot be negative".to_string(),
            ));
        }
        if self.world_min.x >= self.world_max.x
            || self.world_min.y > self.world_max.y
            || self.world_min.z >= self.world_max.z
        {
            return Err(Error::InvalidConfig(
                "world bounds invalid: min must be less than max".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DynamicNavMeshConfig {
    fn default() -> Self {
        Self::new(true, 32, 32, 0.3).with_world_bounds(
            Vec3::new(-100.0, -10.0, -100.0),
            Vec3::new(100.0, 10.0, 100.0),
        )
    }
}
