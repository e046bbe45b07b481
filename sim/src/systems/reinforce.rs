//! Reinforcement and economy.
//!
//! Every faction earns a passive income. Each reinforce point works on the
//! head of its queue only while its faction can cover the job's cost, and
//! pays for the ship when it launches.

use crate::catalog::CatalogResource;
use crate::components::*;
use crate::config::SimConfig;
use crate::factory::{spawn_ship_deferred, UnitRegistry};
use crate::systems::instruction::Instruction;
use crate::world::{Funds, PointSnapshot, SimEvent, SimEvents};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Set when a tick hits a fault it cannot recover from. The mission facade
/// turns it into a crash dump.
#[derive(Resource, Debug, Clone)]
pub struct FatalFault(pub String);

/// Credit the passive income to every faction.
pub fn income_system(config: Res<SimConfig>, mut funds: ResMut<Funds>) {
    if config.income_per_tick == 0 {
        return;
    }
    let factions: Vec<Faction> = funds.factions().collect();
    for faction in factions {
        funds.credit(faction, config.income_per_tick);
    }
}

/// Advance build queues and launch finished ships.
///
/// ## Data Access
/// - Reads: CatalogResource
/// - Writes: Funds, UnitRegistry, SimEvents, ReinforcePoint
/// - Spawns: ships
pub fn reinforce_system(
    mut commands: Commands,
    catalog: Res<CatalogResource>,
    mut registry: ResMut<UnitRegistry>,
    mut funds: ResMut<Funds>,
    mut events: ResMut<SimEvents>,
    mut points: Query<&mut ReinforcePoint>,
) {
    let mut points: Vec<Mut<ReinforcePoint>> = points.iter_mut().collect();
    points.sort_by(|a, b| a.uid.cmp(&b.uid));

    for point in points.iter_mut() {
        let faction = point.faction;
        let Some(job) = point.queue.front_mut() else {
            continue;
        };
        // Stall without losing progress until the faction can pay.
        if funds.get(faction) < job.cost {
            continue;
        }
        job.progress = job.progress.saturating_add(1);
        if !job.is_complete() || !funds.debit(faction, job.cost) {
            continue;
        }
        let Some(job) = point.queue.pop_front() else {
            continue;
        };

        match spawn_ship_deferred(
            &mut commands,
            &mut registry,
            &catalog,
            &job.name,
            faction,
            point.x,
            point.y,
            point.heading,
        ) {
            Ok(uid) => {
                info!(point = %point.uid, ship = %uid, cost = job.cost, "reinforcement launched");
                events.push(SimEvent::Spawned {
                    ship: uid,
                    x: point.x,
                    y: point.y,
                });
            }
            Err(err) => {
                error!(point = %point.uid, ship = %job.name, error = %err, "queued template is gone");
                commands.insert_resource(FatalFault(format!(
                    "reinforce point {} cannot build '{}': {}",
                    point.uid, job.name, err
                )));
            }
        }
    }
}

// ============================================================================
// BUILD MENU
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuStep {
    NextPoint,
    PrevPoint,
    NextShip,
    PrevShip,
}

/// Cursor over the player's reinforce points and their buildable ships.
/// Only navigated while the mission is in `Building`.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMenu {
    pub point: usize,
    pub ship: usize,
}

fn wrap(index: usize, forward: bool, len: usize) -> usize {
    if len == 0 {
        0
    } else if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

impl BuildMenu {
    pub fn navigate(&mut self, step: MenuStep, points: &[&PointSnapshot]) {
        match step {
            MenuStep::NextPoint | MenuStep::PrevPoint => {
                self.point = wrap(self.point, step == MenuStep::NextPoint, points.len());
                self.ship = 0;
            }
            MenuStep::NextShip | MenuStep::PrevShip => {
                let len = points.get(self.point).map_or(0, |p| p.buildable.len());
                self.ship = wrap(self.ship, step == MenuStep::NextShip, len);
            }
        }
    }

    /// Summon for the highlighted point and ship, if the cursor is valid.
    pub fn confirm(&self, points: &[&PointSnapshot]) -> Option<Instruction> {
        let point = points.get(self.point)?;
        let option = point.buildable.get(self.ship)?;
        Some(Instruction::summon(point.uid.as_str(), option.name.as_str()))
    }
}
