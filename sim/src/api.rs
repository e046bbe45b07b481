//! Public API for the simulation.
//!
//! [`Mission`] owns the ECS world and schedule and is the only thing a host
//! (renderer, audio, input layer) needs to talk to.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When
//! `step(dt)` is called, the mission accumulates time and runs as many
//! fixed ticks as fit. Each tick:
//!
//! 1. asks every input handler for instructions (while `Running`),
//! 2. runs the schedule (see [`crate::systems`]),
//! 3. turns a recorded fatal fault into a crash dump.

use crate::catalog::{Catalog, CatalogResource};
use crate::cheats;
use crate::components::*;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::factory::{self, UnitRegistry};
use crate::handlers::{HumanHandler, InputHandler};
use crate::pathfinding::PathfinderResource;
use crate::spatial::SpatialGrid;
use crate::systems::*;
use crate::terrain::{TerrainGrid, TerrainResource, TerrainSnapshot};
use crate::world::{Camera, Funds, PointSnapshot, SimEvent, SimEvents, SimRng, SimTick, Snapshot};
use bevy_ecs::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

/// Viewport size in cells when a mission starts.
const VIEW_WIDTH: f32 = 48.0;
const VIEW_HEIGHT: f32 = 32.0;

/// A running mission: the ECS world, its schedule and the input handlers.
pub struct Mission {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    human: HumanHandler,
    handlers: Vec<Box<dyn InputHandler>>,
}

impl Mission {
    /// Create a mission on `terrain` with no ships.
    pub fn new(catalog: Arc<Catalog>, terrain: TerrainGrid, config: SimConfig) -> Self {
        let mut world = World::new();
        let terrain = TerrainResource::new(terrain);
        let (map_width, map_height) = (terrain.grid().width as f32, terrain.grid().height as f32);

        world.insert_resource(PathfinderResource::new(Arc::clone(&terrain.0)));
        world.insert_resource(terrain);
        world.insert_resource(CatalogResource(catalog));
        world.insert_resource(UnitRegistry::default());
        world.insert_resource(InstructionSet::default());
        world.insert_resource(MissionStatus::Running);
        world.insert_resource(Funds::new(&[Faction::BLUE, Faction::RED], config.starting_funds));
        world.insert_resource(SimTick(0));
        world.insert_resource(SimRng::seeded(config.rng_seed));
        world.insert_resource(SimEvents::default());
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(Camera::new(map_width, map_height, VIEW_WIDTH, VIEW_HEIGHT));
        world.insert_resource(BuildMenu::default());

        let human = HumanHandler::new(config.player_faction);
        world.insert_resource(config);

        Self {
            world,
            schedule: build_schedule(),
            time_accumulator: 0.0,
            human,
            handlers: Vec::new(),
        }
    }

    /// A ready-to-play skirmish on a generated archipelago: two small fleets,
    /// a shipyard each, and a computer player commanding red.
    pub fn demo(config: SimConfig) -> SimResult<Self> {
        let catalog = Arc::new(Catalog::builtin()?);
        let think_interval = config.ai_think_interval;
        let mut mission = Self::new(catalog, TerrainGrid::new_with_features(96, 64), config);

        let blue = [("destroyer", 10.0, 22.0), ("cruiser", 8.0, 30.0), ("destroyer", 10.0, 38.0)];
        for (template, x, y) in blue {
            let uid = mission.spawn_ship(template, Faction::BLUE, x, y, 90.0)?;
            mission.assign_group(&uid, Some(1))?;
        }
        let red = [("destroyer", 86.0, 22.0), ("cruiser", 88.0, 30.0), ("destroyer", 86.0, 38.0)];
        for (template, x, y) in red {
            mission.spawn_ship(template, Faction::RED, x, y, 270.0)?;
        }

        mission.add_reinforce_point(
            ReinforcePoint::new("yard-blue", Faction::BLUE, 4.0, 56.0, 90.0, 3)
                .with_buildable(&["destroyer", "cruiser", "landing-craft"]),
        )?;
        mission.add_reinforce_point(
            ReinforcePoint::new("yard-red", Faction::RED, 92.0, 8.0, 270.0, 3)
                .with_buildable(&["destroyer", "cruiser"]),
        )?;
        mission.add_handler(Box::new(ComputerHandler::new(Faction::RED, think_interval)));
        Ok(mission)
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Launch a ship from a catalog template. Returns its ID.
    pub fn spawn_ship(&mut self, template: &str, faction: Faction, x: f32, y: f32, heading: f32) -> SimResult<String> {
        factory::spawn_ship(&mut self.world, template, faction, x, y, heading)
    }

    /// Place a shipyard. Every buildable ship must exist in the catalog.
    pub fn add_reinforce_point(&mut self, point: ReinforcePoint) -> SimResult<()> {
        {
            let catalog = self.world.resource::<CatalogResource>();
            for name in &point.buildable {
                catalog.ship(name)?;
            }
        }
        info!(point = %point.uid, faction = point.faction.name(), "reinforce point placed");
        self.world.spawn(point);
        Ok(())
    }

    pub fn add_handler(&mut self, handler: Box<dyn InputHandler>) {
        self.handlers.push(handler);
    }

    /// The player's order buffer.
    pub fn human_mut(&mut self) -> &mut HumanHandler {
        &mut self.human
    }

    /// Put a ship in a control group, or take it out with `None`.
    pub fn assign_group(&mut self, uid: &str, group: Option<u8>) -> SimResult<()> {
        let entity = self
            .world
            .resource::<UnitRegistry>()
            .get(uid)
            .ok_or_else(|| SimError::UnknownShip(uid.to_string()))?;
        let mut ship = self.world.entity_mut(entity);
        match group {
            Some(g) => {
                ship.insert(Group(g));
            }
            None => {
                ship.remove::<Group>();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed
    /// updates as needed, so behaviour does not depend on frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self
            .world
            .get_resource::<SimConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 60.0);

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.tick();
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed tick.
    pub fn tick(&mut self) {
        self.world.resource_mut::<SimTick>().increment();
        if self.status() == MissionStatus::Running {
            self.collect_input();
        }
        self.schedule.run(&mut self.world);

        if let Some(fault) = self.world.remove_resource::<FatalFault>() {
            fatal(&mut self.world, &fault.0);
        }
    }

    fn collect_input(&mut self) {
        let set = self.world.resource::<InstructionSet>().clone();
        let state = Snapshot::from_world(&mut self.world);
        let mut issued = self.human.handle(&set, &state);
        for handler in &mut self.handlers {
            issued.extend(handler.handle(&set, &state));
        }
        set.assign(issued);
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn status(&self) -> MissionStatus {
        self.world
            .get_resource::<MissionStatus>()
            .copied()
            .unwrap_or_default()
    }

    /// Flip an overlay on or off. Returns the resulting status.
    pub fn toggle(&mut self, trigger: StatusTrigger) -> MissionStatus {
        let current = self.status();
        let next = current.toggled(trigger);
        if next != current {
            *self.world.resource_mut::<MissionStatus>() = next;
            info!(from = ?current, to = ?next, "mission status toggled");
            if next == MissionStatus::Building {
                *self.world.resource_mut::<BuildMenu>() = BuildMenu::default();
            }
        }
        next
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Get a snapshot of the current mission state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    pub fn terrain_snapshot(&self) -> TerrainSnapshot {
        TerrainSnapshot::from_grid(self.world.resource::<TerrainResource>().grid())
    }

    /// Events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.world.resource_mut::<SimEvents>().drain()
    }

    /// Copy of the live instruction set handle.
    pub fn instructions(&self) -> InstructionSet {
        self.world.resource::<InstructionSet>().clone()
    }

    pub fn camera(&self) -> Camera {
        *self.world.resource::<Camera>()
    }

    pub fn pan_camera(&mut self, dx: f32, dy: f32) {
        self.world.resource_mut::<Camera>().pan(dx, dy);
    }

    pub fn center_camera(&mut self, x: f32, y: f32) {
        self.world.resource_mut::<Camera>().center_on(x, y);
    }

    // ------------------------------------------------------------------
    // Overlays
    // ------------------------------------------------------------------

    /// Run a console line. Only does anything while the console is open.
    pub fn console(&mut self, line: &str) -> String {
        cheats::execute(&mut self.world, line)
    }

    fn player_points(&mut self) -> Vec<PointSnapshot> {
        let player = self.human.faction().0;
        self.snapshot()
            .points
            .into_iter()
            .filter(|p| p.faction == player)
            .collect()
    }

    /// Move the build menu cursor. Ignored outside `Building`.
    pub fn menu_navigate(&mut self, step: MenuStep) -> BuildMenu {
        if self.status() == MissionStatus::Building {
            let points = self.player_points();
            let refs: Vec<&PointSnapshot> = points.iter().collect();
            self.world.resource_mut::<BuildMenu>().navigate(step, &refs);
        }
        *self.world.resource::<BuildMenu>()
    }

    /// Order the highlighted ship. The summon is queued with the player's
    /// other orders and lands once the battle resumes.
    pub fn menu_confirm(&mut self) -> Option<String> {
        if self.status() != MissionStatus::Building {
            return None;
        }
        let points = self.player_points();
        let refs: Vec<&PointSnapshot> = points.iter().collect();
        let summon = self.world.resource::<BuildMenu>().confirm(&refs)?;
        let description = summon.to_string();
        self.human.order(summon);
        Some(description)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn funds(&self, faction: Faction) -> u32 {
        self.world.resource::<Funds>().get(faction)
    }

    pub fn set_funds(&mut self, faction: Faction, amount: u32) {
        self.world.resource_mut::<Funds>().set(faction, amount);
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimTick>().0
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

/// Stop the mission on an unrecoverable fault: dump the state next to the
/// log and panic.
pub fn fatal(world: &mut World, reason: &str) -> ! {
    let snapshot = Snapshot::from_world(world);
    match write_crash_dump(&snapshot, reason) {
        Ok(path) => error!(reason, dump = %path.display(), tick = snapshot.tick, "fatal simulation fault"),
        Err(err) => error!(reason, error = %err, "fatal simulation fault; crash dump failed"),
    }
    panic!("fatal simulation fault: {}", reason);
}
