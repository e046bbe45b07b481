//! Combat system - target acquisition and firing.
//!
//! Two phases, as before:
//!
//! 1. **Gather** - for every ship afloat, look up the nearest enemy within
//!    its longest weapon range in the spatial grid. Read-only, so with the
//!    `parallel` feature it runs on rayon.
//! 2. **Apply** - sequentially tick every weapon's reload and let each
//!    weapon decide on its own whether it can fire at the chosen target.
//!
//! Impact resolution happens later in the tick, in the ordnance system.

use crate::components::*;
use crate::config::SimConfig;
use crate::spatial::SpatialGrid;
use crate::systems::weapons::Engagement;
use crate::world::{SimEvent, SimEvents, SimRng};
use bevy_ecs::prelude::*;
use tracing::trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A shooter and what it can reach, captured before target lookup.
#[derive(Debug, Clone, Copy)]
struct Shooter {
    entity: Entity,
    faction: Faction,
    x: f32,
    y: f32,
    reach: f32,
}

fn acquire(grid: &SpatialGrid, shooter: &Shooter) -> Option<Entity> {
    if shooter.reach <= 0.0 {
        return None;
    }
    grid.nearest_enemy(shooter.x, shooter.y, shooter.reach, shooter.faction)
        .map(|entry| entry.entity)
}

/// Pair every shooter with its nearest enemy, if any.
pub fn gather_targets(grid: &SpatialGrid, shooters: &[(Entity, Faction, f32, f32, f32)]) -> Vec<(Entity, Option<Entity>)> {
    let shooters: Vec<Shooter> = shooters
        .iter()
        .map(|&(entity, faction, x, y, reach)| Shooter {
            entity,
            faction,
            x,
            y,
            reach,
        })
        .collect();

    #[cfg(feature = "parallel")]
    let picks = shooters
        .par_iter()
        .map(|s| (s.entity, acquire(grid, s)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let picks = shooters
        .iter()
        .map(|s| (s.entity, acquire(grid, s)))
        .collect();

    picks
}

/// System that cools every weapon down and fires at the nearest enemy.
///
/// ## Data Access
/// - Reads: SpatialGrid, SimConfig, Position, Motion, Faction, ShipId
/// - Writes: Armament, SimRng, SimEvents
/// - Spawns: Bullet entities
#[allow(clippy::type_complexity)]
pub fn combat_fire_system(
    mut commands: Commands,
    grid: Res<SpatialGrid>,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut events: ResMut<SimEvents>,
    mut shooters: Query<
        (Entity, &ShipId, &Faction, &Position, &Motion, &mut Armament),
        Without<Wreck>,
    >,
    targets: Query<(&Position, &Motion), Without<Wreck>>,
) {
    let mut roster: Vec<_> = shooters
        .iter()
        .map(|(entity, id, faction, pos, _, armament)| {
            (id.0.clone(), (entity, *faction, pos.x, pos.y, armament.max_range()))
        })
        .collect();
    // Fire order decides who draws which random numbers.
    roster.sort_by(|a, b| a.0.cmp(&b.0));
    let roster: Vec<_> = roster.into_iter().map(|(_, s)| s).collect();

    for (entity, target) in gather_targets(&grid, &roster) {
        let Ok((_, id, faction, pos, motion, mut armament)) = shooters.get_mut(entity) else {
            continue;
        };
        for weapon in armament.0.iter_mut() {
            weapon.cool_down();
        }

        let Some((target_pos, target_motion)) = target.and_then(|t| targets.get(t).ok()) else {
            continue;
        };
        let engagement = Engagement {
            shooter: &id.0,
            faction: *faction,
            origin: (pos.x, pos.y),
            hull_heading: motion.heading,
            target: (target_pos.x, target_pos.y),
            target_velocity: target_motion.velocity(),
        };

        for weapon in armament.0.iter_mut() {
            let rounds = weapon.try_fire(&engagement, &config.combat, &mut rng.0);
            if rounds.is_empty() {
                continue;
            }
            trace!(ship = %id, weapon = weapon.name(), rounds = rounds.len(), "fired");
            events.push(SimEvent::Fired {
                ship: id.0.clone(),
                weapon: weapon.class(),
                x: pos.x,
                y: pos.y,
            });
            for bullet in rounds {
                commands.spawn(bullet);
            }
        }
    }
}
