//! Terrain grid - deep water, shallow water and land.
//!
//! The map is a uniform grid where one cell is one world unit. A continuous
//! position truncated toward zero gives its cell. Cells outside the grid
//! read as land so that nothing sails off the edge of the map.

use crate::error::{SimError, SimResult};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resource wrapper sharing the (immutable) terrain with systems and with
/// background path tasks.
#[derive(Resource, Clone)]
pub struct TerrainResource(pub Arc<TerrainGrid>);

impl TerrainResource {
    pub fn new(grid: TerrainGrid) -> Self {
        Self(Arc::new(grid))
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.0
    }
}

/// Terrain class of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainClass {
    /// Open sea - cheapest to cross.
    #[default]
    DeepWater,
    /// Coastal shallows - passable but routes avoid it.
    ShallowWater,
    /// Impassable for ships, fine for amphibious units.
    Land,
}

impl TerrainClass {
    /// Map alphabet: `~` deep water, `.` shallow water, `#` land.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '~' => Some(TerrainClass::DeepWater),
            '.' => Some(TerrainClass::ShallowWater),
            '#' => Some(TerrainClass::Land),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            TerrainClass::DeepWater => '~',
            TerrainClass::ShallowWater => '.',
            TerrainClass::Land => '#',
        }
    }

    /// Whether a unit may occupy this cell.
    #[inline]
    pub fn is_passable(self, amphibious: bool) -> bool {
        amphibious || self != TerrainClass::Land
    }
}

/// Grid-based terrain map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    /// Width of the grid in cells.
    pub width: usize,
    /// Height of the grid in cells.
    pub height: usize,
    /// Grid cells (row-major order).
    cells: Vec<TerrainClass>,
}

impl TerrainGrid {
    /// Create an all-deep-water grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![TerrainClass::DeepWater; width * height],
        }
    }

    /// Parse a grid from rows of map characters. All rows must be the same
    /// length.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> SimResult<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(SimError::InvalidMap("map is empty".to_string()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(SimError::InvalidMap(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, c) in row.chars().enumerate() {
                let class = TerrainClass::from_char(c).ok_or_else(|| {
                    SimError::InvalidMap(format!("unknown terrain '{}' at ({}, {})", c, x, y))
                })?;
                cells.push(class);
            }
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Parse a grid from newline-separated text. Blank lines are ignored.
    pub fn from_text(text: &str) -> SimResult<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_rows(&rows)
    }

    /// Create an open-sea map with a few islands ringed by shallows.
    pub fn new_with_features(width: usize, height: usize) -> Self {
        let mut grid = Self::new(width, height);
        grid.add_island(width / 2, height / 2, (height / 8).max(2));
        grid.add_island(width / 4, height / 4, (height / 12).max(1));
        grid.add_island(3 * width / 4, 3 * height / 4, (height / 12).max(1));
        grid
    }

    /// Raise a round island with a one-cell-deep ring of shallows around it.
    pub fn add_island(&mut self, cx: usize, cy: usize, radius: usize) {
        let shallow = radius + 2;
        for dy in 0..=shallow * 2 {
            for dx in 0..=shallow * 2 {
                let x = cx as i64 - shallow as i64 + dx as i64;
                let y = cy as i64 - shallow as i64 + dy as i64;
                let dist_sq = (x - cx as i64).pow(2) + (y - cy as i64).pow(2);
                let class = if dist_sq <= (radius as i64).pow(2) {
                    TerrainClass::Land
                } else if dist_sq <= (shallow as i64).pow(2) {
                    TerrainClass::ShallowWater
                } else {
                    continue;
                };
                if let Some(i) = self.cell_index(x as i32, y as i32) {
                    if self.cells[i] != TerrainClass::Land {
                        self.cells[i] = class;
                    }
                }
            }
        }
    }

    fn cell_index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width + x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Terrain class of a cell. Out of bounds reads as land.
    pub fn cell_at(&self, x: i32, y: i32) -> TerrainClass {
        self.cell_index(x, y)
            .map(|i| self.cells[i])
            .unwrap_or(TerrainClass::Land)
    }

    pub fn is_land(&self, x: i32, y: i32) -> bool {
        self.cell_at(x, y) == TerrainClass::Land
    }

    /// Terrain under a continuous position (truncated toward zero).
    pub fn class_at_world(&self, x: f32, y: f32) -> TerrainClass {
        self.cell_at(x as i32, y as i32)
    }

    pub fn set_cell(&mut self, x: i32, y: i32, class: TerrainClass) {
        if let Some(i) = self.cell_index(x, y) {
            self.cells[i] = class;
        }
    }

    /// World bounds `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Clamp a continuous position to stay strictly inside the map.
    pub fn clamp_to_bounds(&self, x: f32, y: f32) -> (f32, f32) {
        let max_x = (self.width as f32 - 0.001).max(0.0);
        let max_y = (self.height as f32 - 0.001).max(0.0);
        (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
    }

    /// Render the grid back into map characters, one string per row.
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|c| c.to_char()).collect())
            .collect()
    }
}

/// Snapshot of terrain for renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub width: usize,
    pub height: usize,
    pub rows: Vec<String>,
}

impl TerrainSnapshot {
    pub fn from_grid(grid: &TerrainGrid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            rows: grid.to_rows(),
        }
    }
}
