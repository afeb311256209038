//! Heightfield representation for dynamic tiles
//!
//! A heightfield is a 2D grid of voxel columns. Each column holds the solid
//! spans found at that (x, z) cell, sorted bottom to top and never overlapping.
//! Columns are stored as small inline vectors in one flat allocation, so cloning
//! a heightfield (for checkpoints) is a plain copy and two heightfields can be
//! compared with `==`.

use crate::error::{Error, Result};
use glam::Vec3;
use smallvec::SmallVec;

/// Highest span height representable in voxel units
pub const SPAN_MAX_HEIGHT: i32 = (1 << 13) - 1;

/// Area id of spans that are solid but not walkable
pub const NULL_AREA: u8 = 0;

/// Default area id of walkable spans
pub const WALKABLE_AREA: u8 = 63;

/// A solid vertical interval `[min, max]` in voxel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub min: i32,
    pub max: i32,
    pub area: u8,
}

impl Span {
    pub fn new(min: i32, max: i32, area: u8) -> Self {
        Self { min, max, area }
    }
}

/// Spans of one voxel column, sorted by height
pub type SpanColumn = SmallVec<[Span; 4]>;

/// Grid of span columns covering one tile
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    /// Number of columns along x
    pub width: i32,
    /// Number of columns along z
    pub depth: i32,
    /// Cells on each side that belong to neighbouring tiles
    pub border_size: i32,
    /// The minimum bounds of the heightfield's AABB
    pub bmin: Vec3,
    /// The maximum bounds of the heightfield's AABB
    pub bmax: Vec3,
    /// Cell size (horizontal resolution)
    pub cs: f32,
    /// Cell height (vertical resolution)
    pub ch: f32,
    columns: Vec<SpanColumn>,
}

impl Heightfield {
    /// Creates an empty heightfield. Negative dimensions are treated as zero.
    pub fn new(width: i32, depth: i32, bmin: Vec3, bmax: Vec3, cs: f32, ch: f32) -> Self {
        let width = width.max(0);
        let depth = depth.max(0);
        Self {
            width,
            depth,
            border_size: 0,
            bmin,
            bmax,
            cs,
            ch,
            columns: vec![SpanColumn::new(); width as usize * depth as usize],
        }
    }

    pub fn with_border_size(mut self, border_size: i32) -> Self {
        self.border_size = border_size;
        self
    }

    /// Flat index of a column, or `None` when outside the grid
    pub fn column_index(&self, x: i32, z: i32) -> Option<usize> {
        if x < 0 || z < 0 || x >= self.width || z >= self.depth {
            return None;
        }
        Some((x + z * self.width) as usize)
    }

    /// Spans of a column; empty for cells outside the grid
    pub fn column(&self, x: i32, z: i32) -> &[Span] {
        match self.column_index(x, z) {
            Some(index) => &self.columns[index],
            None => &[],
        }
    }

    /// Iterates every column in row-major order as `(x, z, spans)`
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32, &[Span])> + '_ {
        let width = self.width.max(1);
        self.columns
            .iter()
            .enumerate()
            .map(move |(index, column)| {
                let index = index as i32;
                (index % width, index / width, column.as_slice())
            })
    }

    /// Total number of spans in the heightfield
    pub fn span_count(&self) -> usize {
        self.columns.iter().map(|column| column.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|column| column.is_empty())
    }

    /// Adds a span, merging it with any span it overlaps or touches.
    ///
    /// When a merge keeps the top of the resulting span within
    /// `flag_merge_threshold` voxels of an existing span's top, the higher of
    /// the two area ids wins.
    pub fn add_span(
        &mut self,
        x: i32,
        z: i32,
        min: i32,
        max: i32,
        area: u8,
        flag_merge_threshold: i32,
    ) -> Result<()> {
        let Some(index) = self.column_index(x, z) else {
            return Err(Error::Heightfield(format!(
                "span position out of bounds: ({x}, {z})"
            )));
        };
        if min > max {
            return Err(Error::Heightfield(format!(
                "invalid span height: min ({min}) > max ({max})"
            )));
        }
        self.merge_span(index, Span::new(min, max, area), flag_merge_threshold);
        Ok(())
    }

    pub(crate) fn merge_span(&mut self, index: usize, span: Span, flag_merge_threshold: i32) {
        let column = &mut self.columns[index];
        let mut merged = span;
        let mut insert_at = None;
        let mut i = 0;

        while i < column.len() {
            let current = column[i];
            if current.min > merged.max {
                insert_at = Some(i);
                break;
            }
            if current.max < merged.min {
                i += 1;
                continue;
            }

            merged.min = merged.min.min(current.min);
            merged.max = merged.max.max(current.max);
            if (merged.max - current.max).abs() <= flag_merge_threshold {
                merged.area = merged.area.max(current.area);
            }
            column.remove(i);
        }

        let at = insert_at.unwrap_or(column.len());
        column.insert(at, merged);
    }

    /// Appends a span read from persisted data. Spans arriving in column
    /// order are stored verbatim; anything else falls back to a merge.
    pub(crate) fn push_span(&mut self, index: usize, span: Span) {
        let column = &mut self.columns[index];
        match column.last() {
            Some(last) if last.max >= span.min => self.merge_span(index, span, 0),
            _ => column.push(span),
        }
    }

    /// Raises the top of the bounding box so rasterization of taller
    /// obstacles is not clipped
    pub fn expand_top(&mut self, max_y: f32) {
        if max_y > self.bmax.y {
            self.bmax.y = max_y;
        }
    }

    /// World-space height of a voxel boundary
    pub fn world_height(&self, voxel_y: i32) -> f32 {
        self.bmin.y + voxel_y as f32 * self.ch
    }

    /// Marks non-walkable spans walkable when they sit at most `walkable_climb`
    /// voxels above a walkable span, so agents can step over curbs and stairs.
    pub fn filter_low_hanging_walkable_obstacles(&mut self, walkable_climb: i32) {
        for column in &mut self.columns {
            let mut previous: Option<Span> = None;
            for span in column.iter_mut() {
                let original = *span;
                if let Some(prev) = previous {
                    if span.area == NULL_AREA
                        && prev.area != NULL_AREA
                        && span.max - prev.max <= walkable_climb
                    {
                        span.area = prev.area;
                    }
                }
                // Keep the unmodified span so chains of obstacles do not propagate
                previous = Some(original);
            }
        }
    }

    /// Removes the walkable flag from spans next to a drop deeper than
    /// `walkable_climb`, or whose reachable neighbours differ in height by
    /// more than `walkable_climb`.
    pub fn filter_ledge_spans(&mut self, walkable_height: i32, walkable_climb: i32) {
        const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];
        let mut ledges = Vec::new();

        for z in 0..self.depth {
            for x in 0..self.width {
                let column = self.column(x, z);
                for (i, span) in column.iter().enumerate() {
                    if span.area == NULL_AREA {
                        continue;
                    }
                    let bottom = span.max;
                    let top = ceiling_of(column, i);

                    let mut min_height = MAX_CLEARANCE;
                    let mut accessible_min = span.max;
                    let mut accessible_max = span.max;

                    for (dx, dz) in DIRECTIONS {
                        let (nx, nz) = (x + dx, z + dz);
                        if self.column_index(nx, nz).is_none() {
                            min_height = min_height.min(-walkable_climb - bottom);
                            continue;
                        }
                        let neighbour = self.column(nx, nz);

                        // Gap below the first neighbour span counts as a drop
                        let neighbour_bottom = -walkable_climb;
                        let neighbour_top = neighbour.first().map_or(MAX_CLEARANCE, |s| s.min);
                        if top.min(neighbour_top) - bottom.max(neighbour_bottom) > walkable_height {
                            min_height = min_height.min(neighbour_bottom - bottom);
                        }

                        for (j, other) in neighbour.iter().enumerate() {
                            let neighbour_bottom = other.max;
                            let neighbour_top = ceiling_of(neighbour, j);
                            if top.min(neighbour_top) - bottom.max(neighbour_bottom) > walkable_height
                            {
                                min_height = min_height.min(neighbour_bottom - bottom);
                                if (neighbour_bottom - bottom).abs() <= walkable_climb {
                                    accessible_min = accessible_min.min(neighbour_bottom);
                                    accessible_max = accessible_max.max(neighbour_bottom);
                                }
                            }
                        }
                    }

                    if min_height < -walkable_climb || accessible_max - accessible_min > walkable_climb {
                        ledges.push(((x + z * self.width) as usize, i));
                    }
                }
            }
        }

        for (index, i) in ledges {
            self.columns[index][i].area = NULL_AREA;
        }
    }

    /// Removes the walkable flag from spans with less than `walkable_height`
    /// voxels of clearance above them
    pub fn filter_walkable_low_height_spans(&mut self, walkable_height: i32) {
        for column in &mut self.columns {
            for i in 0..column.len() {
                let ceiling = ceiling_of(column, i);
                if ceiling - column[i].max < walkable_height {
                    column[i].area = NULL_AREA;
                }
            }
        }
    }

    /// Approximate heap and inline footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let spilled: usize = self
            .columns
            .iter()
            .filter(|column| column.spilled())
            .map(|column| column.capacity() * std::mem::size_of::<Span>())
            .sum();
        std::mem::size_of::<Self>() + self.columns.len() * std::mem::size_of::<SpanColumn>() + spilled
    }
}

/// Open space above the topmost span of a column
const MAX_CLEARANCE: i32 = 0xffff;

/// Bottom of the span above `column[i]`, or open sky
fn ceiling_of(column: &[Span], i: usize) -> i32 {
    column.get(i + 1).map_or(MAX_CLEARANCE, |next| next.min)
}
