// Terrain-aware A* over the map grid.
//
// Best-first search over 8-connected cells with a Manhattan heuristic. Node
// scores and came-from links live in `Vec`s indexed by cell so the search is
// deterministic (no `HashMap`). The open set is a `BinaryHeap` min-heap via
// reversed ordering.
//
// Step costs: 1 orthogonal, sqrt(2) diagonal, +5 for entering shallow water
// so routes hug deep water. Diagonals may not cut a land corner.
//
// Jump points: for every cell and each axis direction we precompute how far
// the same terrain class runs in a straight line. Expanding a cell also
// pushes the far end of that corridor, so long open stretches are crossed
// with one heap entry instead of one per cell.
//
// Compression: the raw cell path is first reduced to its turning points,
// then a line-of-sight pass drops every waypoint that can be skipped without
// crossing an impassable cell (segments sampled at unit steps). The second
// pass is a best-effort simplification, not a shortest-path guarantee.
//
// Unreachable or degenerate (< 2 point) results come back as `None`. Callers
// treat that as "nothing to do", never as a failure.

use crate::terrain::{TerrainClass, TerrainGrid};
use bevy_ecs::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Extra cost of entering a shallow-water cell.
pub const SHALLOW_PENALTY: f32 = 5.0;

const NO_PARENT: u32 = u32::MAX;

/// 8-connected neighbour offsets. The first four are the axis directions, in
/// the same order as the jump tables: north, east, south, west.
const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// A cell coordinate.
pub type Cell = (i32, i32);

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: u32,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Grid search state: terrain plus precomputed jump tables for both
/// traversal modes (naval and amphibious).
#[derive(Debug)]
pub struct Pathfinder {
    grid: Arc<TerrainGrid>,
    naval_jumps: Vec<[u16; 4]>,
    amphibious_jumps: Vec<[u16; 4]>,
}

impl Pathfinder {
    pub fn new(grid: Arc<TerrainGrid>) -> Self {
        let naval_jumps = build_jump_table(&grid, false);
        let amphibious_jumps = build_jump_table(&grid, true);
        Self {
            grid,
            naval_jumps,
            amphibious_jumps,
        }
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        cell.1 as usize * self.grid.width + cell.0 as usize
    }

    #[inline]
    fn cell_of(&self, index: usize) -> Cell {
        (
            (index % self.grid.width) as i32,
            (index / self.grid.width) as i32,
        )
    }

    #[inline]
    fn passable(&self, cell: Cell, amphibious: bool) -> bool {
        self.grid.in_bounds(cell.0, cell.1) && self.grid.cell_at(cell.0, cell.1).is_passable(amphibious)
    }

    fn enter_cost(&self, cell: Cell) -> f32 {
        match self.grid.cell_at(cell.0, cell.1) {
            TerrainClass::ShallowWater => SHALLOW_PENALTY,
            _ => 0.0,
        }
    }

    /// Find and compress a route from `start` to `goal`.
    ///
    /// Returns at least two waypoints (start and goal included) or `None`.
    pub fn find_path(&self, start: Cell, goal: Cell, amphibious: bool) -> Option<Vec<Cell>> {
        let raw = self.find_raw_path(start, goal, amphibious)?;
        let merged = merge_collinear(&raw);
        let smoothed = self.smooth_line_of_sight(&merged, amphibious);
        if smoothed.len() < 2 {
            None
        } else {
            Some(smoothed)
        }
    }

    /// Uncompressed cell-by-cell route from `start` to `goal`, inclusive.
    pub fn find_raw_path(&self, start: Cell, goal: Cell, amphibious: bool) -> Option<Vec<Cell>> {
        if !self.passable(start, amphibious) || !self.passable(goal, amphibious) {
            debug!(?start, ?goal, "path endpoint not traversable");
            return None;
        }
        if start == goal {
            return None;
        }

        let n = self.grid.width * self.grid.height;
        let jumps = if amphibious {
            &self.amphibious_jumps
        } else {
            &self.naval_jumps
        };

        let mut g_score = vec![f32::INFINITY; n];
        let mut came_from = vec![NO_PARENT; n];
        let mut closed = vec![false; n];

        let start_i = self.index(start);
        let goal_i = self.index(goal);
        g_score[start_i] = 0.0;

        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            node: start_i as u32,
            f_score: manhattan(start, goal),
        });

        while let Some(current) = open.pop() {
            let ci = current.node as usize;
            if ci == goal_i {
                return Some(self.reconstruct(&came_from, start_i, goal_i));
            }
            if closed[ci] {
                continue;
            }
            closed[ci] = true;

            let cell = self.cell_of(ci);
            let current_g = g_score[ci];

            let mut relax = |next: Cell, step_cost: f32, open: &mut BinaryHeap<OpenEntry>| {
                let ni = self.index(next);
                if closed[ni] {
                    return;
                }
                let tentative = current_g + step_cost;
                if tentative < g_score[ni] {
                    g_score[ni] = tentative;
                    came_from[ni] = ci as u32;
                    open.push(OpenEntry {
                        node: ni as u32,
                        f_score: tentative + manhattan(next, goal),
                    });
                }
            };

            for (dir, &(dx, dy)) in DIRECTIONS.iter().enumerate() {
                let next = (cell.0 + dx, cell.1 + dy);
                if !self.passable(next, amphibious) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (!self.passable((cell.0 + dx, cell.1), amphibious)
                        || !self.passable((cell.0, cell.1 + dy), amphibious))
                {
                    continue;
                }
                let base = if diagonal { std::f32::consts::SQRT_2 } else { 1.0 };
                relax(next, base + self.enter_cost(next), &mut open);

                // Axis corridor shortcut.
                if dir < 4 {
                    let run = jumps[ci][dir] as i32;
                    if run >= 2 {
                        let far = (cell.0 + dx * run, cell.1 + dy * run);
                        let per_cell = 1.0 + self.enter_cost(far);
                        relax(far, per_cell * run as f32, &mut open);
                    }
                }
            }
        }

        debug!(?start, ?goal, "no path");
        None
    }

    /// Walk came-from links back from the goal, filling in the cells skipped
    /// by corridor jumps.
    fn reconstruct(&self, came_from: &[u32], start_i: usize, goal_i: usize) -> Vec<Cell> {
        let mut nodes = vec![goal_i];
        let mut current = goal_i;
        while current != start_i {
            current = came_from[current] as usize;
            nodes.push(current);
        }
        nodes.reverse();

        let mut path = Vec::with_capacity(nodes.len());
        for window in nodes.windows(2) {
            let from = self.cell_of(window[0]);
            let to = self.cell_of(window[1]);
            let step = ((to.0 - from.0).signum(), (to.1 - from.1).signum());
            let mut c = from;
            while c != to {
                path.push(c);
                c = (c.0 + step.0, c.1 + step.1);
            }
        }
        path.push(self.cell_of(goal_i));
        path
    }

    /// Whether the straight segment between two cell centres stays on
    /// traversable terrain, sampled at unit-distance steps.
    pub fn line_clear(&self, a: Cell, b: Cell, amphibious: bool) -> bool {
        let (ax, ay) = (a.0 as f32 + 0.5, a.1 as f32 + 0.5);
        let (bx, by) = (b.0 as f32 + 0.5, b.1 as f32 + 0.5);
        let dist = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
        let steps = dist.ceil().max(1.0) as usize;
        (0..=steps).all(|k| {
            let t = k as f32 / steps as f32;
            let x = ax + (bx - ax) * t;
            let y = ay + (by - ay) * t;
            self.passable((x as i32, y as i32), amphibious)
        })
    }

    /// Drop intermediate waypoints that have a clear line of sight past them.
    pub fn smooth_line_of_sight(&self, path: &[Cell], amphibious: bool) -> Vec<Cell> {
        if path.len() <= 2 {
            return path.to_vec();
        }
        let last = path.len() - 1;
        let mut result = vec![path[0]];
        let mut anchor = 0;
        while anchor < last {
            let next = (anchor + 2..=last)
                .rev()
                .find(|&j| self.line_clear(path[anchor], path[j], amphibious))
                .unwrap_or(anchor + 1);
            result.push(path[next]);
            anchor = next;
        }
        result
    }
}

#[inline]
fn manhattan(a: Cell, b: Cell) -> f32 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as f32
}

/// Collapse runs of points that continue in the same direction, keeping only
/// the endpoints and the turning points.
pub fn merge_collinear(path: &[Cell]) -> Vec<Cell> {
    if path.len() <= 2 {
        return path.to_vec();
    }
    let direction = |a: Cell, b: Cell| ((b.0 - a.0).signum(), (b.1 - a.1).signum());

    let mut result = vec![path[0]];
    for i in 1..path.len() - 1 {
        if direction(path[i - 1], path[i]) != direction(path[i], path[i + 1]) {
            result.push(path[i]);
        }
    }
    result.push(path[path.len() - 1]);
    result
}

/// For every cell and axis direction, the number of cells the same terrain
/// class continues in that direction (0 if the neighbour differs or blocks).
fn build_jump_table(grid: &TerrainGrid, amphibious: bool) -> Vec<[u16; 4]> {
    let (w, h) = (grid.width as i32, grid.height as i32);
    let mut table = vec![[0u16; 4]; grid.width * grid.height];
    let idx = |x: i32, y: i32| (y * w + x) as usize;

    let continues = |x: i32, y: i32, nx: i32, ny: i32| {
        let here = grid.cell_at(x, y);
        grid.in_bounds(nx, ny)
            && here.is_passable(amphibious)
            && grid.cell_at(nx, ny) == here
    };

    for (dir, &(dx, dy)) in DIRECTIONS.iter().take(4).enumerate() {
        // Visit cells so the neighbour in `dir` is always computed first.
        let xs: Vec<i32> = if dx > 0 { (0..w).rev().collect() } else { (0..w).collect() };
        let ys: Vec<i32> = if dy > 0 { (0..h).rev().collect() } else { (0..h).collect() };
        for &y in &ys {
            for &x in &xs {
                let (nx, ny) = (x + dx, y + dy);
                if continues(x, y, nx, ny) {
                    let run = table[idx(nx, ny)][dir].saturating_add(1);
                    table[idx(x, y)][dir] = run;
                }
            }
        }
    }
    table
}

/// Result of a path request: the cell route, or `None` when unreachable.
#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub waypoints: Option<Vec<Cell>>,
}

/// Handle to a path being computed in the background.
///
/// The worker writes exactly once into the ticket's private slot; the
/// instruction holding the ticket polls it each tick. If the instruction is
/// dropped first, the result lands in an orphaned slot and is discarded.
/// The generation only identifies the request in logs.
#[derive(Debug, Clone)]
pub struct PathTicket {
    generation: u64,
    slot: Arc<OnceLock<PathOutcome>>,
}

impl PathTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The outcome, once the worker has finished.
    pub fn poll(&self) -> Option<&PathOutcome> {
        self.slot.get()
    }
}

/// Shared pathfinder plus the generation counter for requests.
#[derive(Resource, Clone)]
pub struct PathfinderResource {
    pathfinder: Arc<Pathfinder>,
    next_generation: Arc<AtomicU64>,
}

impl PathfinderResource {
    pub fn new(grid: Arc<TerrainGrid>) -> Self {
        Self {
            pathfinder: Arc::new(Pathfinder::new(grid)),
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    /// Start a path computation. With `synchronous` the route is computed
    /// before returning; otherwise it runs detached on the rayon pool.
    pub fn request(&self, start: Cell, goal: Cell, amphibious: bool, synchronous: bool) -> PathTicket {
        let generation = self.next_generation.fetch_add(1, AtomicOrdering::Relaxed);
        let ticket = PathTicket {
            generation,
            slot: Arc::new(OnceLock::new()),
        };

        let pathfinder = Arc::clone(&self.pathfinder);
        let slot = Arc::clone(&ticket.slot);
        let work = move || {
            let waypoints = pathfinder.find_path(start, goal, amphibious);
            trace!(generation, found = waypoints.is_some(), "path computed");
            let _ = slot.set(PathOutcome { waypoints });
        };

        if synchronous {
            work();
        } else {
            rayon::spawn(work);
        }
        ticket
    }
}
