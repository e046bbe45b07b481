//! Computer player.
//!
//! Plays through the same instruction pipeline as a human: it never touches
//! components directly, it only returns instructions.
//!
//! ## Behaviour
//! - Every think interval, each own ship without a movement order routes
//!   toward the nearest enemy, unless one is already well inside its reach.
//! - Each own reinforce point with an empty queue summons the cheapest
//!   buildable ship the faction can pay for.

use crate::components::Faction;
use crate::geometry::distance;
use crate::handlers::InputHandler;
use crate::systems::instruction::{Instruction, InstructionSet};
use crate::systems::status::MissionStatus;
use crate::world::{ShipSnapshot, Snapshot};
use tracing::debug;

/// Ships hold position once the nearest enemy is this fraction of their
/// longest weapon range away.
pub const ENGAGE_RANGE_FRACTION: f32 = 0.8;

#[derive(Debug, Clone)]
pub struct ComputerHandler {
    faction: Faction,
    think_interval: u64,
    last_think: Option<u64>,
}

impl ComputerHandler {
    pub fn new(faction: Faction, think_interval: u64) -> Self {
        Self {
            faction,
            think_interval: think_interval.max(1),
            last_think: None,
        }
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    fn due(&self, tick: u64) -> bool {
        match self.last_think {
            None => true,
            Some(last) => tick >= last + self.think_interval,
        }
    }

    fn manoeuvre(&self, current: &InstructionSet, state: &Snapshot, out: &mut Vec<Instruction>) {
        let enemies: Vec<&ShipSnapshot> = state
            .live_ships()
            .filter(|s| s.faction != self.faction.0)
            .collect();

        for ship in state.live_ships().filter(|s| s.faction == self.faction.0) {
            if current.is_moving(&ship.uid) {
                continue;
            }
            // Snapshot ships are in ID order, so the first minimum wins ties.
            let nearest = enemies
                .iter()
                .map(|e| (distance(ship.x, ship.y, e.x, e.y), *e))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            let Some((dist, enemy)) = nearest else {
                continue;
            };
            if dist <= ship.max_range * ENGAGE_RANGE_FRACTION {
                continue;
            }
            debug!(ship = %ship.uid, enemy = %enemy.uid, dist, "closing in");
            out.push(Instruction::move_along_path(ship.uid.as_str(), enemy.x, enemy.y));
        }
    }

    fn reinforce(&self, state: &Snapshot, out: &mut Vec<Instruction>) {
        let funds = state.funds_of(self.faction);
        for point in state.points.iter().filter(|p| p.faction == self.faction.0) {
            if !point.queue.is_empty() {
                continue;
            }
            let cheapest = point
                .buildable
                .iter()
                .min_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.name.cmp(&b.name)));
            if let Some(option) = cheapest.filter(|o| o.cost <= funds) {
                debug!(point = %point.uid, ship = %option.name, funds, "summoning");
                out.push(Instruction::summon(point.uid.as_str(), option.name.as_str()));
            }
        }
    }
}

impl InputHandler for ComputerHandler {
    fn handle(&mut self, current: &InstructionSet, state: &Snapshot) -> Vec<Instruction> {
        if state.status != MissionStatus::Running || !self.due(state.tick) {
            return Vec::new();
        }
        self.last_think = Some(state.tick);

        let mut out = Vec::new();
        self.manoeuvre(current, state, &mut out);
        self.reinforce(state, &mut out);
        out
    }
}
