//! CLI utility for dynamic voxel navmesh files

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dynamic_navmesh::colliders::SAMPLE_POLYAREA_TYPE_GROUND;
use dynamic_navmesh::heightfield::WALKABLE_AREA;
use dynamic_navmesh::io::Lz4Compressor;
use dynamic_navmesh::{
    BoxCollider, DynamicNavMesh, DynamicNavMeshConfig, Endianness, Heightfield,
    SpanTopMeshBuilder, VoxelFile, VoxelFileReader, VoxelFileWriter, VoxelTile,
};

/// Inspect, build and query dynamic voxel navigation meshes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header and tile summary of a voxel file
    Info {
        /// Input voxel file
        #[clap(value_parser)]
        input: PathBuf,
    },

    /// Build every tile of a voxel file and print polygon counts
    Build {
        /// Input voxel file
        #[clap(value_parser)]
        input: PathBuf,

        /// Box obstacle as min and max corners (x0,y0,z0,x1,y1,z1); repeatable
        #[clap(long = "obstacle", value_parser = parse_box)]
        obstacles: Vec<(Vec3, Vec3)>,

        /// Rebuild tiles on a worker pool with this many threads
        #[clap(long)]
        threads: Option<usize>,
    },

    /// Cast a voxel ray through a voxel file
    Raycast {
        /// Input voxel file
        #[clap(value_parser)]
        input: PathBuf,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        end: Vec3,

        /// Box obstacle as min and max corners (x0,y0,z0,x1,y1,z1); repeatable
        #[clap(long = "obstacle", value_parser = parse_box)]
        obstacles: Vec<(Vec3, Vec3)>,
    },

    /// Write a voxel file of flat ground for experiments
    Flat {
        /// Output voxel file
        #[clap(value_parser)]
        output: PathBuf,

        /// Number of tiles along x
        #[clap(long, default_value = "2")]
        tiles_x: i32,

        /// Number of tiles along z
        #[clap(long, default_value = "2")]
        tiles_z: i32,

        /// Tile size in cells
        #[clap(long, default_value = "32")]
        tile_size: i32,

        /// Cell size (horizontal resolution)
        #[clap(long, default_value = "0.3")]
        cs: f32,

        /// Cell height (vertical resolution)
        #[clap(long, default_value = "0.2")]
        ch: f32,

        /// Height of the ground surface
        #[clap(long, default_value = "1.0")]
        ground: f32,

        /// Write little-endian instead of big-endian
        #[clap(long)]
        little_endian: bool,

        /// Compress span data with LZ4
        #[clap(long)]
        compress: bool,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let values = parse_floats(s)?;
    match values.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("Vector must have 3 components, got {}", values.len())),
    }
}

/// Parse a box given as six comma-separated values
fn parse_box(s: &str) -> Result<(Vec3, Vec3), String> {
    let values = parse_floats(s)?;
    match values.as_slice() {
        [x0, y0, z0, x1, y1, z1] => Ok((Vec3::new(*x0, *y0, *z0), Vec3::new(*x1, *y1, *z1))),
        _ => Err(format!("Box must have 6 components, got {}", values.len())),
    }
}

fn parse_floats(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|e| e.to_string()))
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Info { input } => info(&input),
        Commands::Build {
            input,
            obstacles,
            threads,
        } => build(&input, &obstacles, threads),
        Commands::Raycast {
            input,
            start,
            end,
            obstacles,
        } => raycast(&input, start, end, &obstacles),
        Commands::Flat {
            output,
            tiles_x,
            tiles_z,
            tile_size,
            cs,
            ch,
            ground,
            little_endian,
            compress,
        } => {
            let endianness = if little_endian {
                Endianness::Little
            } else {
                Endianness::Big
            };
            flat(&output, tiles_x, tiles_z, tile_size, cs, ch, ground, endianness, compress)
        }
    }
}

fn read_voxel_file(path: &Path) -> Result<VoxelFile> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    VoxelFileReader::with_compressor(Box::new(Lz4Compressor))
        .read(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read voxel file {}", path.display()))
}

fn load_navmesh(path: &Path, obstacles: &[(Vec3, Vec3)]) -> Result<DynamicNavMesh> {
    let voxel_file = read_voxel_file(path)?;
    let mut navmesh = DynamicNavMesh::from_voxel_file(&voxel_file, Arc::new(SpanTopMeshBuilder))
        .context("Failed to create dynamic navmesh")?;

    for &(min, max) in obstacles {
        let id = navmesh.add_collider(Arc::new(BoxCollider::from_bounds(
            min,
            max,
            SAMPLE_POLYAREA_TYPE_GROUND,
            1,
        )));
        println!("Obstacle {}: {:?} - {:?}", id, min, max);
    }
    Ok(navmesh)
}

fn info(input: &Path) -> Result<()> {
    let file = read_voxel_file(input)?;

    println!("Voxel file {}", input.display());
    println!(
        "  version: {:#06x} ({:?}, {})",
        file.version,
        file.endianness,
        if file.is_compressed() { "lz4" } else { "uncompressed" }
    );
    println!(
        "  tiles: {} ({}x{} cells, tiled: {})",
        file.tiles.len(),
        file.tile_size_x,
        file.tile_size_z,
        file.use_tiles
    );
    println!("  cell size: {}, cell height: {}", file.cell_size, file.cell_height());
    println!("  bounds: {:?} - {:?}", file.bounds_min(), file.bounds_max());
    println!(
        "  agent: height {}, radius {}, climb {}, slope {}",
        file.walkable_height, file.walkable_radius, file.walkable_climb, file.walkable_slope_angle
    );

    for tile in &file.tiles {
        let heightfield = tile
            .heightfield()
            .with_context(|| format!("Failed to decode tile ({}, {})", tile.tile_x, tile.tile_z))?;
        println!(
            "  tile ({}, {}): {}x{} columns, {} spans, {} bytes",
            tile.tile_x,
            tile.tile_z,
            tile.width,
            tile.depth,
            heightfield.span_count(),
            tile.span_data.len()
        );
    }
    Ok(())
}

fn build(input: &Path, obstacles: &[(Vec3, Vec3)], threads: Option<usize>) -> Result<()> {
    let mut navmesh = load_navmesh(input, obstacles)?;

    match threads {
        Some(threads) => {
            let pool = DynamicNavMesh::worker_pool(threads)?;
            navmesh.build_parallel(&pool);
        }
        None => navmesh.build(),
    }

    let published = navmesh.current_nav_mesh();
    for (coord, tile) in published.tiles() {
        match &tile.mesh {
            Some(mesh) => println!(
                "Tile ({}, {}): {} polygons, {} vertices, {:.2} walkable area",
                coord.0,
                coord.1,
                mesh.poly_count(),
                mesh.vertex_count(),
                mesh.walkable_area()
            ),
            None => println!("Tile ({}, {}): build failed", coord.0, coord.1),
        }
    }

    let stats = navmesh.statistics();
    println!(
        "Published v{}: {} polygons over {} tiles, {} colliders, ~{} KiB",
        published.version(),
        published.poly_count(),
        stats.total_tiles,
        stats.live_colliders,
        stats.memory_usage / 1024
    );
    Ok(())
}

fn raycast(input: &Path, start: Vec3, end: Vec3, obstacles: &[(Vec3, Vec3)]) -> Result<()> {
    let mut navmesh = load_navmesh(input, obstacles)?;
    navmesh.build();

    match navmesh.raycast_hit(start, end) {
        Some(hit) => println!(
            "Hit at t = {:.4}, position {:?}, tile ({}, {}), cell ({}, {})",
            hit.t, hit.position, hit.tile_x, hit.tile_z, hit.cell_x, hit.cell_z
        ),
        None => println!("No hit"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn flat(
    output: &Path,
    tiles_x: i32,
    tiles_z: i32,
    tile_size: i32,
    cs: f32,
    ch: f32,
    ground: f32,
    endianness: Endianness,
    compress: bool,
) -> Result<()> {
    if tiles_x <= 0 || tiles_z <= 0 {
        bail!("Tile counts must be positive, got {}x{}", tiles_x, tiles_z);
    }
    if ground <= 0.0 {
        bail!("Ground height must be positive, got {}", ground);
    }

    let extent = tile_size as f32 * cs;
    let height = ground * 2.0;
    let config = DynamicNavMeshConfig::new(true, tile_size, tile_size, cs)
        .with_cell_height(ch)
        .with_world_bounds(
            Vec3::ZERO,
            Vec3::new(tiles_x as f32 * extent, height, tiles_z as f32 * extent),
        );
    config.validate().context("Invalid flat world settings")?;
    log::debug!("Flat world settings: {:?}", config);

    let top = (ground / ch).round() as i32;
    let mut voxel_file = VoxelFile::from_config(&config);
    voxel_file.endianness = endianness;
    for tile_z in 0..tiles_z {
        for tile_x in 0..tiles_x {
            let bmin = Vec3::new(tile_x as f32 * extent, 0.0, tile_z as f32 * extent);
            let bmax = bmin + Vec3::new(extent, height, extent);
            let mut heightfield = Heightfield::new(tile_size, tile_size, bmin, bmax, cs, ch);
            for z in 0..tile_size {
                for x in 0..tile_size {
                    heightfield.add_span(x, z, 0, top, WALKABLE_AREA, 1)?;
                }
            }
            voxel_file.add_tile(VoxelTile::from_heightfield(tile_x, tile_z, &heightfield, endianness));
        }
    }

    let file = File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    VoxelFileWriter::with_compressor(Box::new(Lz4Compressor))
        .write(&mut writer, &voxel_file, compress)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writer.flush()?;

    println!(
        "Wrote {} tiles of {}x{} cells to {}",
        voxel_file.tiles.len(),
        tile_size,
        tile_size,
        output.display()
    );
    Ok(())
}
