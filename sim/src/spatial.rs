//! Spatial partitioning for efficient neighbor queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of ships in nearby cells, rather than O(n) for brute force.

use crate::components::{Faction, Position, ShipId, Wreck};
use bevy_ecs::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

/// Grid-based spatial partitioning structure.
///
/// Divides the map into buckets and tracks which ships are in each one.
/// Rebuilt every tick from scratch, so it only ever holds ships afloat.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Bucket size in world units.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    count: usize,
}

/// Entry in a spatial bucket.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub uid: String,
    pub x: f32,
    pub y: f32,
    pub faction: Faction,
}

impl SpatialEntry {
    fn distance_sq(&self, x: f32, y: f32) -> f32 {
        (self.x - x).powi(2) + (self.y - y).powi(2)
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.count = 0;
    }

    pub fn insert(&mut self, entity: Entity, uid: &str, x: f32, y: f32, faction: Faction) {
        let cell = self.world_to_cell(x, y);
        self.cells.entry(cell).or_default().push(SpatialEntry {
            entity,
            uid: uid.to_string(),
            x,
            y,
            faction,
        });
        self.count += 1;
    }

    /// All ships within `radius` of a point, closest first. Equal distances
    /// are ordered by ship ID so results never depend on hash order.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil() as i32 + 1;
        let center = self.world_to_cell(x, y);

        let mut results = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if let Some(entries) = self.cells.get(&(center.0 + dx, center.1 + dy)) {
                    results.extend(
                        entries
                            .iter()
                            .filter(|e| e.distance_sq(x, y) <= radius_sq)
                            .cloned(),
                    );
                }
            }
        }

        results.sort_by(|a, b| {
            a.distance_sq(x, y)
                .partial_cmp(&b.distance_sq(x, y))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.uid.cmp(&b.uid))
        });
        results
    }

    /// Ships of other factions within radius, closest first.
    pub fn query_enemies(&self, x: f32, y: f32, radius: f32, my_faction: Faction) -> Vec<SpatialEntry> {
        let mut results = self.query_radius(x, y, radius);
        results.retain(|e| e.faction != my_faction);
        results
    }

    /// Nearest enemy within range, ties broken by ship ID.
    pub fn nearest_enemy(&self, x: f32, y: f32, max_radius: f32, my_faction: Faction) -> Option<SpatialEntry> {
        self.query_enemies(x, y, max_radius, my_faction).into_iter().next()
    }

    pub fn total_count(&self) -> usize {
        self.count
    }
}

/// System that rebuilds the spatial grid each tick.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &ShipId, &Position, &Faction), Without<Wreck>>,
) {
    grid.clear();
    for (entity, id, pos, faction) in query.iter() {
        grid.insert(entity, &id.0, pos.x, pos.y, *faction);
    }
    trace!(ships = grid.total_count(), "spatial grid rebuilt");
}
