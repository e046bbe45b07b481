//! Instruction pipeline.
//!
//! Every order in the game, human or computer issued, is an [`Instruction`]
//! keyed by `(kind, object)`. The [`InstructionSet`] keeps at most one live
//! instruction per key; each tick every instruction executes once and the
//! ones that report completion are purged.
//!
//! Immediate instructions (weapon toggles, summons) finish in one call.
//! Continuing ones (moves) drive their ship a tick at a time until arrival.

use crate::catalog::CatalogResource;
use crate::components::*;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::factory::UnitRegistry;
use crate::pathfinding::{Cell, PathTicket, PathfinderResource};
use crate::systems::movement::steer_ship;
use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

// ============================================================================
// KEYS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    Move,
    MoveAlongPath,
    EnableWeapon(WeaponClass),
    DisableWeapon(WeaponClass),
    Summon,
}

impl InstructionKind {
    pub fn is_movement(self) -> bool {
        matches!(self, InstructionKind::Move | InstructionKind::MoveAlongPath)
    }
}

/// Identity of an instruction: the kind and the ship (or reinforce point)
/// it acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionKey {
    pub kind: InstructionKind,
    pub object_id: String,
}

// ============================================================================
// INSTRUCTIONS
// ============================================================================

#[derive(Debug, Clone)]
enum PathStage {
    NotRequested,
    Requested(PathTicket),
    Following { waypoints: Vec<(f32, f32)>, next: usize },
}

/// A move that first asks the pathfinder for a route.
#[derive(Debug, Clone)]
pub struct PathMove {
    pub ship: String,
    pub target: (f32, f32),
    stage: PathStage,
    done: bool,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Move {
        ship: String,
        x: f32,
        y: f32,
        done: bool,
    },
    MoveAlongPath(PathMove),
    EnableWeapon {
        ship: String,
        class: WeaponClass,
        done: bool,
    },
    DisableWeapon {
        ship: String,
        class: WeaponClass,
        done: bool,
    },
    /// Queue a ship at a reinforce point.
    Summon {
        point: String,
        ship: String,
        done: bool,
    },
}

impl Instruction {
    pub fn move_to(ship: impl Into<String>, x: f32, y: f32) -> Self {
        Instruction::Move {
            ship: ship.into(),
            x,
            y,
            done: false,
        }
    }

    pub fn move_along_path(ship: impl Into<String>, x: f32, y: f32) -> Self {
        Instruction::MoveAlongPath(PathMove {
            ship: ship.into(),
            target: (x, y),
            stage: PathStage::NotRequested,
            done: false,
        })
    }

    pub fn enable_weapon(ship: impl Into<String>, class: WeaponClass) -> Self {
        Instruction::EnableWeapon {
            ship: ship.into(),
            class,
            done: false,
        }
    }

    pub fn disable_weapon(ship: impl Into<String>, class: WeaponClass) -> Self {
        Instruction::DisableWeapon {
            ship: ship.into(),
            class,
            done: false,
        }
    }

    pub fn summon(point: impl Into<String>, ship: impl Into<String>) -> Self {
        Instruction::Summon {
            point: point.into(),
            ship: ship.into(),
            done: false,
        }
    }

    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Move { .. } => InstructionKind::Move,
            Instruction::MoveAlongPath(_) => InstructionKind::MoveAlongPath,
            Instruction::EnableWeapon { class, .. } => InstructionKind::EnableWeapon(*class),
            Instruction::DisableWeapon { class, .. } => InstructionKind::DisableWeapon(*class),
            Instruction::Summon { .. } => InstructionKind::Summon,
        }
    }

    /// Ship ID, or reinforce point ID for summons.
    pub fn object_id(&self) -> &str {
        match self {
            Instruction::Move { ship, .. }
            | Instruction::EnableWeapon { ship, .. }
            | Instruction::DisableWeapon { ship, .. } => ship,
            Instruction::MoveAlongPath(path) => &path.ship,
            Instruction::Summon { point, .. } => point,
        }
    }

    pub fn key(&self) -> InstructionKey {
        InstructionKey {
            kind: self.kind(),
            object_id: self.object_id().to_string(),
        }
    }

    pub fn executed(&self) -> bool {
        match self {
            Instruction::Move { done, .. }
            | Instruction::EnableWeapon { done, .. }
            | Instruction::DisableWeapon { done, .. }
            | Instruction::Summon { done, .. } => *done,
            Instruction::MoveAlongPath(path) => path.done,
        }
    }

    fn mark_executed(&mut self) {
        match self {
            Instruction::Move { done, .. }
            | Instruction::EnableWeapon { done, .. }
            | Instruction::DisableWeapon { done, .. }
            | Instruction::Summon { done, .. } => *done = true,
            Instruction::MoveAlongPath(path) => path.done = true,
        }
    }

    /// Run one tick of the instruction.
    ///
    /// A ship that no longer exists (or is sinking) completes the
    /// instruction without error. On `Err` the caller drops the instruction.
    pub fn exec(&mut self, world: &mut World) -> SimResult<()> {
        if self.executed() {
            return Ok(());
        }
        let outcome = match self {
            Instruction::Move { ship, x, y, .. } => Ok(match live_ship(world, ship) {
                Some(entity) => steer_ship(world, entity, (*x, *y), true).unwrap_or(true),
                None => true,
            }),
            Instruction::MoveAlongPath(path) => path.advance(world),
            Instruction::EnableWeapon { ship, class, .. } => {
                toggle_weapons(world, ship, *class, true);
                Ok(true)
            }
            Instruction::DisableWeapon { ship, class, .. } => {
                toggle_weapons(world, ship, *class, false);
                Ok(true)
            }
            Instruction::Summon { point, ship, .. } => enqueue(world, point, ship).map(|()| true),
        };
        match outcome {
            Ok(false) => Ok(()),
            Ok(true) => {
                debug!(instruction = %self, "instruction complete");
                self.mark_executed();
                Ok(())
            }
            Err(err) => {
                self.mark_executed();
                Err(err)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Move { ship, x, y, .. } => write!(f, "move {} to ({:.1}, {:.1})", ship, x, y),
            Instruction::MoveAlongPath(path) => write!(
                f,
                "route {} to ({:.1}, {:.1})",
                path.ship, path.target.0, path.target.1
            ),
            Instruction::EnableWeapon { ship, class, .. } => write!(f, "enable {} on {}", class, ship),
            Instruction::DisableWeapon { ship, class, .. } => write!(f, "disable {} on {}", class, ship),
            Instruction::Summon { point, ship, .. } => write!(f, "summon {} at {}", ship, point),
        }
    }
}

/// Entity of a ship that is still afloat.
fn live_ship(world: &World, uid: &str) -> Option<Entity> {
    let entity = world.get_resource::<UnitRegistry>()?.get(uid)?;
    world.get::<ShipId>(entity)?;
    if world.get::<Wreck>(entity).is_some() {
        return None;
    }
    Some(entity)
}

/// Stop a ship where it is. Used whenever a route leaves it without a leg
/// to steer along.
fn halt(world: &mut World, entity: Entity) {
    if let Some(mut motion) = world.get_mut::<Motion>(entity) {
        motion.speed = 0.0;
    }
}

fn toggle_weapons(world: &mut World, uid: &str, class: WeaponClass, enabled: bool) {
    let Some(entity) = live_ship(world, uid) else {
        return;
    };
    if let Some(mut armament) = world.get_mut::<Armament>(entity) {
        let touched = armament.set_enabled(class, enabled);
        debug!(ship = uid, %class, enabled, touched, "weapons toggled");
    }
}

fn enqueue(world: &mut World, point_uid: &str, ship: &str) -> SimResult<()> {
    let template = {
        let catalog = world
            .get_resource::<CatalogResource>()
            .ok_or(SimError::MissingResource("catalog"))?;
        Arc::clone(catalog.ship(ship)?)
    };

    let mut points = world.query::<&mut ReinforcePoint>();
    let mut point = points
        .iter_mut(world)
        .find(|p| p.uid == point_uid)
        .ok_or_else(|| SimError::UnknownReinforcePoint(point_uid.to_string()))?;

    if !point.buildable.iter().any(|name| name == ship) {
        return Err(SimError::NotBuildable {
            point: point_uid.to_string(),
            ship: ship.to_string(),
        });
    }
    if point.queue.len() >= point.capacity {
        return Err(SimError::QueueFull {
            point: point_uid.to_string(),
            capacity: point.capacity,
        });
    }
    point.queue.push_back(OncomingShip {
        name: template.name.clone(),
        cost: template.cost,
        progress: 0,
        build_ticks: template.build_ticks,
    });
    debug!(point = point_uid, ship, queued = point.queue.len(), "ship queued");
    Ok(())
}

/// Waypoints to steer through: the start cell is dropped, interior cells
/// are aimed at their centres and the last leg ends on the exact target.
fn waypoints_from_cells(cells: &[Cell], target: (f32, f32)) -> Vec<(f32, f32)> {
    let mut points: Vec<(f32, f32)> = cells
        .iter()
        .skip(1)
        .map(|&(x, y)| (x as f32 + 0.5, y as f32 + 0.5))
        .collect();
    if let Some(last) = points.last_mut() {
        *last = target;
    }
    points
}

impl PathMove {
    /// Returns `true` once the ship has finished (or cannot start) the route.
    fn advance(&mut self, world: &mut World) -> SimResult<bool> {
        let Some(entity) = live_ship(world, &self.ship) else {
            return Ok(true);
        };

        if let PathStage::NotRequested = self.stage {
            let start = world
                .get::<Position>(entity)
                .map(Position::cell)
                .unwrap_or_default();
            let amphibious = world.get::<ShipStats>(entity).is_some_and(|s| s.amphibious);
            let synchronous = world
                .get_resource::<SimConfig>()
                .is_some_and(|c| c.synchronous_paths);
            let pathfinder = world
                .get_resource::<PathfinderResource>()
                .ok_or(SimError::MissingResource("pathfinder"))?;
            let goal = (self.target.0 as i32, self.target.1 as i32);
            let ticket = pathfinder.request(start, goal, amphibious, synchronous);
            debug!(ship = %self.ship, ?start, ?goal, generation = ticket.generation(), "path requested");
            self.stage = PathStage::Requested(ticket);
        }

        if let PathStage::Requested(ticket) = &self.stage {
            let Some(outcome) = ticket.poll() else {
                halt(world, entity);
                return Ok(false);
            };
            match &outcome.waypoints {
                None => {
                    debug!(ship = %self.ship, "no route; order dropped");
                    halt(world, entity);
                    return Ok(true);
                }
                Some(cells) => {
                    let waypoints = waypoints_from_cells(cells, self.target);
                    self.stage = PathStage::Following { waypoints, next: 0 };
                }
            }
        }

        let PathStage::Following { waypoints, next } = &mut self.stage else {
            return Ok(false);
        };
        let Some(&waypoint) = waypoints.get(*next) else {
            halt(world, entity);
            return Ok(true);
        };
        let final_leg = *next + 1 == waypoints.len();
        let arrived = steer_ship(world, entity, waypoint, final_leg).unwrap_or(true);
        if arrived {
            *next += 1;
        }
        Ok(*next >= waypoints.len())
    }
}

// ============================================================================
// INSTRUCTION SET
// ============================================================================

/// The live instructions, one per `(kind, object)`.
///
/// Shared behind a lock so input code running next to the tick can add
/// orders while the tick executes.
#[derive(Resource, Clone, Default)]
pub struct InstructionSet {
    inner: Arc<RwLock<BTreeMap<InstructionKey, Instruction>>>,
}

impl InstructionSet {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<InstructionKey, Instruction>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<InstructionKey, Instruction>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite by key. A ship follows one movement order at a
    /// time, so a new move replaces a path move for the same ship and the
    /// other way round.
    pub fn add(&self, instruction: Instruction) {
        let key = instruction.key();
        let mut items = self.write();
        if key.kind.is_movement() {
            items.retain(|k, _| !(k.kind.is_movement() && k.object_id == key.object_id));
        }
        items.insert(key, instruction);
    }

    pub fn assign(&self, instructions: impl IntoIterator<Item = Instruction>) {
        for instruction in instructions {
            self.add(instruction);
        }
    }

    /// Execute every pending instruction once, in key order. Failures are
    /// logged and the instruction is dropped at the next purge.
    pub fn execute_all(&self, world: &mut World) {
        let mut items = self.write();
        for instruction in items.values_mut() {
            if let Err(err) = instruction.exec(world) {
                warn!(instruction = %instruction, error = %err, "instruction failed");
                instruction.mark_executed();
            }
        }
    }

    /// Purge finished instructions. Returns how many were removed.
    pub fn remove_executed(&self) -> usize {
        let mut items = self.write();
        let before = items.len();
        items.retain(|_, instruction| !instruction.executed());
        before - items.len()
    }

    /// Copy of the live instructions in key order.
    pub fn items(&self) -> Vec<Instruction> {
        self.read().values().cloned().collect()
    }

    pub fn contains(&self, kind: InstructionKind, object_id: &str) -> bool {
        self.read().contains_key(&InstructionKey {
            kind,
            object_id: object_id.to_string(),
        })
    }

    /// Whether the ship has a live move or path move.
    pub fn is_moving(&self, ship: &str) -> bool {
        self.read()
            .iter()
            .any(|(k, i)| k.kind.is_movement() && k.object_id == ship && !i.executed())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Exclusive system running the pipeline for one tick.
pub fn instruction_system(world: &mut World) {
    let Some(set) = world.get_resource::<InstructionSet>().cloned() else {
        return;
    };
    set.execute_all(world);
    let purged = set.remove_executed();
    if purged > 0 {
        debug!(purged, remaining = set.len(), "instructions purged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::factory::spawn_ship;
    use crate::terrain::{TerrainClass, TerrainGrid, TerrainResource};
    use crate::world::SimEvents;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    fn world_with(grid: TerrainGrid) -> World {
        let mut world = World::new();
        let terrain = TerrainResource::new(grid);
        world.insert_resource(PathfinderResource::new(Arc::clone(&terrain.0)));
        world.insert_resource(terrain);
        world.insert_resource(CatalogResource(Arc::new(Catalog::builtin().unwrap())));
        world.insert_resource(UnitRegistry::default());
        world.insert_resource(SimEvents::default());
        world.insert_resource(SimConfig {
            synchronous_paths: true,
            ..SimConfig::default()
        });
        world.insert_resource(InstructionSet::default());
        world
    }

    fn position(world: &World, uid: &str) -> Position {
        let entity = world.resource::<UnitRegistry>().get(uid).unwrap();
        *world.get::<Position>(entity).unwrap()
    }

    /// Tick the pipeline until empty; returns ticks taken.
    fn run_until_idle(world: &mut World, max_ticks: usize) -> Option<usize> {
        for tick in 0..max_ticks {
            instruction_system(world);
            if world.resource::<InstructionSet>().is_empty() {
                return Some(tick);
            }
        }
        None
    }

    #[test]
    fn test_same_key_overwrites() {
        let set = InstructionSet::default();
        set.assign(vec![
            Instruction::move_to("destroyer#1", 1.0, 1.0),
            Instruction::move_to("destroyer#1", 9.0, 9.0),
            Instruction::disable_weapon("destroyer#1", WeaponClass::Gun),
            Instruction::disable_weapon("destroyer#1", WeaponClass::Torpedo),
        ]);
        assert_eq!(set.len(), 3);
        let moves: Vec<_> = set
            .items()
            .into_iter()
            .filter(|i| i.kind() == InstructionKind::Move)
            .collect();
        assert_eq!(moves.len(), 1);
        assert!(matches!(moves[0], Instruction::Move { x, .. } if x == 9.0));
    }

    #[test]
    fn test_movement_kinds_replace_each_other() {
        let set = InstructionSet::default();
        set.add(Instruction::move_along_path("destroyer#1", 5.0, 5.0));
        set.add(Instruction::move_to("destroyer#2", 5.0, 5.0));
        set.add(Instruction::move_to("destroyer#1", 7.0, 7.0));
        assert!(!set.contains(InstructionKind::MoveAlongPath, "destroyer#1"));
        assert!(set.contains(InstructionKind::Move, "destroyer#1"));
        assert!(set.is_moving("destroyer#2"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_executed_is_idempotent() {
        let mut world = world_with(TerrainGrid::new(20, 20));
        let set = world.resource::<InstructionSet>().clone();
        set.add(Instruction::disable_weapon("ghost#1", WeaponClass::Gun));
        set.add(Instruction::move_to("ghost#2", 3.0, 3.0));
        set.execute_all(&mut world);
        assert_eq!(set.remove_executed(), 2);
        assert_eq!(set.remove_executed(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_move_runs_until_arrival() {
        let mut world = world_with(TerrainGrid::new(40, 20));
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 10.0, 90.0).unwrap();
        world
            .resource::<InstructionSet>()
            .add(Instruction::move_to(uid.clone(), 20.0, 10.0));

        let ticks = run_until_idle(&mut world, 3000).expect("move never finished");
        assert!(ticks > 10);
        let pos = position(&world, &uid);
        assert!(pos.distance_to(&Position::new(20.0, 10.0)) <= 0.25);
    }

    #[test]
    fn test_sunk_ship_completes_silently() {
        let mut world = world_with(TerrainGrid::new(20, 20));
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 5.0, 90.0).unwrap();
        let entity = world.resource::<UnitRegistry>().get(&uid).unwrap();
        world.entity_mut(entity).insert(Wreck { frames_left: 5 });

        let set = world.resource::<InstructionSet>().clone();
        set.add(Instruction::move_along_path(uid.clone(), 15.0, 15.0));
        set.add(Instruction::enable_weapon(uid, WeaponClass::Gun));
        set.execute_all(&mut world);
        assert!(set.items().iter().all(Instruction::executed));
    }

    #[test]
    fn test_unreachable_route_completes_immediately() {
        let grid = TerrainGrid::from_rows(&[
            "~~~~#~~~~",
            "~~~~#~~~~",
            "~~~~#~~~~",
        ])
        .unwrap();
        let mut world = world_with(grid);
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 1.5, 1.5, 90.0).unwrap();
        world
            .resource::<InstructionSet>()
            .add(Instruction::move_along_path(uid.clone(), 7.5, 1.5));

        assert_eq!(run_until_idle(&mut world, 5), Some(0));
        assert_eq!(position(&world, &uid), Position::new(1.5, 1.5));
    }

    fn motion(world: &World, uid: &str) -> Motion {
        let entity = world.resource::<UnitRegistry>().get(uid).unwrap();
        *world.get::<Motion>(entity).unwrap()
    }

    fn pending_ticket(set: &InstructionSet, uid: &str) -> PathTicket {
        let found = set.items().into_iter().find_map(|i| match i {
            Instruction::MoveAlongPath(PathMove {
                ship,
                stage: PathStage::Requested(ticket),
                ..
            }) if ship == uid => Some(ticket),
            _ => None,
        });
        found.expect("route is not waiting on a path")
    }

    fn wait_for(ticket: &PathTicket) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while ticket.poll().is_none() {
            assert!(Instant::now() < deadline, "path never resolved");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Keeps every rayon worker blocked until dropped, so background path
    /// requests stay queued.
    struct BusyPool {
        open: Arc<(Mutex<bool>, Condvar)>,
    }

    impl BusyPool {
        fn hold() -> Self {
            let open = Arc::new((Mutex::new(false), Condvar::new()));
            let started = Arc::new(AtomicUsize::new(0));
            let workers = rayon::current_num_threads();
            for _ in 0..workers {
                let open = Arc::clone(&open);
                let started = Arc::clone(&started);
                rayon::spawn(move || {
                    started.fetch_add(1, AtomicOrdering::SeqCst);
                    let (lock, cvar) = &*open;
                    let mut released = lock.lock().unwrap();
                    while !*released {
                        released = cvar.wait(released).unwrap();
                    }
                });
            }
            while started.load(AtomicOrdering::SeqCst) < workers {
                std::thread::yield_now();
            }
            Self { open }
        }
    }

    impl Drop for BusyPool {
        fn drop(&mut self) {
            let (lock, cvar) = &*self.open;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }
    }

    fn background_paths(world: &mut World) {
        world.resource_mut::<SimConfig>().synchronous_paths = false;
    }

    #[test]
    fn test_rerouted_onto_land_stops_the_ship() {
        let mut grid = TerrainGrid::new(40, 20);
        for x in 30..34 {
            grid.set_cell(x, 10, TerrainClass::Land);
        }
        let mut world = world_with(grid);
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 10.5, 90.0).unwrap();
        let set = world.resource::<InstructionSet>().clone();
        set.add(Instruction::move_to(uid.clone(), 25.0, 10.5));
        for _ in 0..40 {
            instruction_system(&mut world);
        }
        assert!(motion(&world, &uid).speed > 0.0);

        set.add(Instruction::move_along_path(uid.clone(), 31.5, 10.5));
        assert_eq!(run_until_idle(&mut world, 5), Some(0));
        let stopped = motion(&world, &uid);
        assert_eq!(stopped.speed, 0.0);
        assert_eq!(stopped.velocity(), (0.0, 0.0));

        let before = position(&world, &uid);
        for _ in 0..200 {
            instruction_system(&mut world);
        }
        assert_eq!(position(&world, &uid), before);
    }

    #[test]
    fn test_ship_holds_still_while_route_is_computed() {
        let mut world = world_with(TerrainGrid::new(40, 20));
        background_paths(&mut world);
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 10.5, 90.0).unwrap();
        let set = world.resource::<InstructionSet>().clone();
        set.add(Instruction::move_to(uid.clone(), 25.0, 10.5));
        for _ in 0..40 {
            instruction_system(&mut world);
        }
        assert!(motion(&world, &uid).speed > 0.0);

        let pool = BusyPool::hold();
        set.add(Instruction::move_along_path(uid.clone(), 35.5, 10.5));
        instruction_system(&mut world);
        let ticket = pending_ticket(&set, &uid);
        let before = position(&world, &uid);
        for _ in 0..5 {
            instruction_system(&mut world);
        }
        assert!(ticket.poll().is_none());
        assert_eq!(position(&world, &uid), before);
        assert_eq!(motion(&world, &uid).speed, 0.0);
        assert!(set.is_moving(&uid));
        drop(pool);

        wait_for(&ticket);
        assert!(run_until_idle(&mut world, 5000).is_some());
        assert!(position(&world, &uid).x > 35.0);
    }

    #[test]
    fn test_late_path_is_dropped_when_ship_is_lost() {
        let mut world = world_with(TerrainGrid::new(40, 20));
        background_paths(&mut world);
        let sunk = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 5.5, 90.0).unwrap();
        let gone = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 15.5, 90.0).unwrap();
        let set = world.resource::<InstructionSet>().clone();

        let pool = BusyPool::hold();
        set.add(Instruction::move_along_path(sunk.clone(), 35.5, 5.5));
        set.add(Instruction::move_along_path(gone.clone(), 35.5, 15.5));
        instruction_system(&mut world);
        let sunk_ticket = pending_ticket(&set, &sunk);
        let gone_ticket = pending_ticket(&set, &gone);
        assert!(sunk_ticket.poll().is_none() && gone_ticket.poll().is_none());

        let sunk_entity = world.resource::<UnitRegistry>().get(&sunk).unwrap();
        world.entity_mut(sunk_entity).insert(Wreck { frames_left: 30 });
        let gone_entity = world.resource_mut::<UnitRegistry>().remove(&gone).unwrap();
        world.despawn(gone_entity);
        let wreck_at = position(&world, &sunk);
        drop(pool);

        wait_for(&sunk_ticket);
        wait_for(&gone_ticket);
        assert!(sunk_ticket.poll().unwrap().waypoints.is_some());

        instruction_system(&mut world);
        assert!(set.is_empty());
        assert_eq!(position(&world, &sunk), wreck_at);
        assert_eq!(motion(&world, &sunk).speed, 0.0);
        assert!(world.get_entity(gone_entity).is_err());
    }

    #[test]
    fn test_route_around_breakwater() {
        let mut grid = TerrainGrid::new(40, 40);
        for y in 0..9 {
            grid.set_cell(20, y, TerrainClass::Land);
        }
        let mut world = world_with(grid);
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.5, 5.5, 90.0).unwrap();
        world
            .resource::<InstructionSet>()
            .add(Instruction::move_along_path(uid.clone(), 35.5, 5.5));

        let terrain = world.resource::<TerrainResource>().clone();
        let mut finished = false;
        for _ in 0..4000 {
            instruction_system(&mut world);
            let pos = position(&world, &uid);
            assert!(!terrain.grid().is_land(pos.x as i32, pos.y as i32), "ran aground at {:?}", pos);
            if world.resource::<InstructionSet>().is_empty() {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert!(position(&world, &uid).x > 30.0);
    }

    #[test]
    fn test_weapon_toggle_is_immediate() {
        let mut world = world_with(TerrainGrid::new(20, 20));
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 5.0, 0.0).unwrap();
        let set = world.resource::<InstructionSet>().clone();
        set.add(Instruction::disable_weapon(uid.clone(), WeaponClass::Torpedo));
        set.execute_all(&mut world);
        assert_eq!(set.remove_executed(), 1);

        let entity = world.resource::<UnitRegistry>().get(&uid).unwrap();
        let armament = world.get::<Armament>(entity).unwrap();
        for weapon in &armament.0 {
            assert_eq!(weapon.enabled, weapon.class() != WeaponClass::Torpedo);
        }
    }

    fn add_point(world: &mut World, capacity: usize) {
        world.spawn(ReinforcePoint {
            uid: "yard-blue".into(),
            faction: Faction::BLUE,
            x: 2.0,
            y: 2.0,
            heading: 90.0,
            capacity,
            buildable: vec!["destroyer".into(), "cruiser".into()],
            queue: VecDeque::new(),
        });
    }

    fn queue_len(world: &mut World) -> usize {
        world
            .query::<&ReinforcePoint>()
            .iter(world)
            .map(|p| p.queue.len())
            .sum()
    }

    #[test]
    fn test_summon_queues_until_capacity() {
        let mut world = world_with(TerrainGrid::new(20, 20));
        add_point(&mut world, 1);

        let mut first = Instruction::summon("yard-blue", "cruiser");
        first.exec(&mut world).unwrap();
        assert!(first.executed());
        assert_eq!(queue_len(&mut world), 1);

        let mut second = Instruction::summon("yard-blue", "destroyer");
        assert!(matches!(
            second.exec(&mut world),
            Err(SimError::QueueFull { capacity: 1, .. })
        ));
        assert!(second.executed());
        assert_eq!(queue_len(&mut world), 1);
    }

    #[test]
    fn test_summon_errors_do_not_stop_the_batch() {
        let mut world = world_with(TerrainGrid::new(20, 20));
        add_point(&mut world, 3);
        let uid = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 5.0, 0.0).unwrap();

        let mut unknown = Instruction::summon("nowhere", "destroyer");
        assert!(matches!(unknown.exec(&mut world), Err(SimError::UnknownReinforcePoint(_))));
        let mut forbidden = Instruction::summon("yard-blue", "battleship");
        assert!(matches!(forbidden.exec(&mut world), Err(SimError::NotBuildable { .. })));

        let set = world.resource::<InstructionSet>().clone();
        set.assign(vec![
            Instruction::summon("nowhere", "destroyer"),
            Instruction::disable_weapon(uid, WeaponClass::Gun),
        ]);
        set.execute_all(&mut world);
        assert_eq!(set.remove_executed(), 2);
    }

    #[test]
    fn test_waypoints_end_on_exact_target() {
        let cells = vec![(1, 1), (5, 1), (9, 4)];
        let points = waypoints_from_cells(&cells, (9.2, 4.7));
        assert_eq!(points, vec![(5.5, 1.5), (9.2, 4.7)]);
    }
}
