//! Polygon extraction seam
//!
//! Tiles hand their rasterized heightfield to a [`MeshBuilder`] and keep
//! whatever [`TileMesh`] it returns. A full contour and polygon pipeline lives
//! outside this crate; [`SpanTopMeshBuilder`] is a small reference builder
//! that emits one quad per walkable span top.

use crate::config::DynamicNavMeshConfig;
use crate::error::{Error, Result};
use crate::heightfield::{Heightfield, NULL_AREA};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A convex polygon indexing into [`TileMesh::vertices`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePolygon {
    pub vertices: Vec<u16>,
    pub area: u8,
}

/// Walkable polygons built for one tile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TileMesh {
    pub tile_x: i32,
    pub tile_z: i32,
    pub bmin: Vec3,
    pub bmax: Vec3,
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<TilePolygon>,
}

impl TileMesh {
    pub fn new(tile_x: i32, tile_z: i32, bmin: Vec3, bmax: Vec3) -> Self {
        Self {
            tile_x,
            tile_z,
            bmin,
            bmax,
            vertices: Vec::new(),
            polygons: Vec::new(),
        }
    }

    pub fn poly_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Total horizontal area covered by the polygons
    pub fn walkable_area(&self) -> f32 {
        self.polygons
            .iter()
            .map(|polygon| {
                let points: Vec<Vec3> = polygon
                    .vertices
                    .iter()
                    .map(|&i| self.vertices[i as usize])
                    .collect();
                let mut twice_area = 0.0_f32;
                for (i, a) in points.iter().enumerate() {
                    let b = points[(i + 1) % points.len()];
                    twice_area += a.x * b.z - b.x * a.z;
                }
                twice_area.abs() * 0.5
            })
            .sum()
    }
}

/// Turns a rasterized tile heightfield into walkable polygons
pub trait MeshBuilder: Send + Sync {
    fn build_tile_mesh(
        &self,
        tile_x: i32,
        tile_z: i32,
        heightfield: &Heightfield,
        config: &DynamicNavMeshConfig,
    ) -> Result<TileMesh>;
}

impl<F> MeshBuilder for F
where
    F: Fn(i32, i32, &Heightfield, &DynamicNavMeshConfig) -> Result<TileMesh> + Send + Sync,
{
    fn build_tile_mesh(
        &self,
        tile_x: i32,
        tile_z: i32,
        heightfield: &Heightfield,
        config: &DynamicNavMeshConfig,
    ) -> Result<TileMesh> {
        self(tile_x, tile_z, heightfield, config)
    }
}

/// Reference builder emitting one quad per walkable span top.
///
/// The configured span filters run on a private copy of the heightfield
/// first, so ledges, low ceilings and steppable obstacles are honoured.
/// Cells inside the tile border are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanTopMeshBuilder;

impl MeshBuilder for SpanTopMeshBuilder {
    fn build_tile_mesh(
        &self,
        tile_x: i32,
        tile_z: i32,
        heightfield: &Heightfield,
        config: &DynamicNavMeshConfig,
    ) -> Result<TileMesh> {
        let walkable_height = config.walkable_height_voxels();
        let walkable_climb = config.walkable_climb_voxels();

        let mut field = heightfield.clone();
        if config.filter_low_hanging_obstacles {
            field.filter_low_hanging_walkable_obstacles(walkable_climb);
        }
        if config.filter_ledge_spans {
            field.filter_ledge_spans(walkable_height, walkable_climb);
        }
        if config.filter_walkable_low_height_spans {
            field.filter_walkable_low_height_spans(walkable_height);
        }

        let mut mesh = TileMesh::new(tile_x, tile_z, field.bmin, field.bmax);
        let mut vertex_lookup: HashMap<(i32, i32, i32), u16> = HashMap::new();
        let border = field.border_size.max(0);

        for (x, z, spans) in field.columns() {
            if x < border || z < border || x >= field.width - border || z >= field.depth - border {
                continue;
            }
            for span in spans.iter().filter(|span| span.area != NULL_AREA) {
                let corners = [(x, z), (x, z + 1), (x + 1, z + 1), (x + 1, z)];
                let mut polygon = Vec::with_capacity(corners.len());
                for (cx, cz) in corners {
                    let key = (cx, span.max, cz);
                    let index = match vertex_lookup.get(&key) {
                        Some(&index) => index,
                        None => {
                            let index = u16::try_from(mesh.vertices.len()).map_err(|_| {
                                Error::mesh_build(tile_x, tile_z, "vertex count exceeds u16 indices")
                            })?;
                            mesh.vertices.push(Vec3::new(
                                field.bmin.x + cx as f32 * field.cs,
                                field.world_height(span.max),
                                field.bmin.z + cz as f32 * field.cs,
                            ));
                            vertex_lookup.insert(key, index);
                            index
                        }
                    };
                    polygon.push(index);
                }
                mesh.polygons.push(TilePolygon {
                    vertices: polygon,
                    area: span.area,
                });
            }
        }

        log::debug!(
            "Extracted {} polygons from tile ({}, {})",
            mesh.poly_count(),
            tile_x,
            tile_z
        );
        Ok(mesh)
    }
}
