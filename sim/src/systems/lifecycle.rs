//! Wreck and trail lifecycle.
//!
//! A sunk ship stays in the world as a wreck while its explosion plays out,
//! then leaves the roster. Trails age and vanish on their own.

use crate::catalog::BulletKind;
use crate::components::*;
use crate::config::SimConfig;
use crate::factory::UnitRegistry;
use crate::world::SimTick;
use bevy_ecs::prelude::*;
use tracing::debug;

/// Count explosion frames down and remove finished wrecks.
pub fn wreck_system(
    mut commands: Commands,
    mut registry: ResMut<UnitRegistry>,
    mut wrecks: Query<(Entity, &ShipId, &mut Wreck)>,
) {
    for (entity, id, mut wreck) in wrecks.iter_mut() {
        wreck.frames_left = wreck.frames_left.saturating_sub(1);
        if wreck.frames_left == 0 {
            commands.entity(entity).despawn();
            registry.remove(&id.0);
            debug!(ship = %id, "wreck cleared");
        }
    }
}

/// Age trails and drop new ones behind moving ships and running torpedoes.
pub fn trail_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    tick: Res<SimTick>,
    ships: Query<(&Position, &Motion), (With<ShipId>, Without<Wreck>)>,
    bullets: Query<&Bullet>,
    mut trails: Query<(Entity, &mut Trail)>,
) {
    for (entity, mut trail) in trails.iter_mut() {
        trail.life = trail.life.saturating_sub(1);
        if trail.life == 0 {
            commands.entity(entity).despawn();
        }
    }

    if config.trail_interval == 0 || config.trail_life == 0 || tick.0 % config.trail_interval != 0 {
        return;
    }
    let wakes = ships
        .iter()
        .filter(|(_, motion)| motion.speed > 0.0)
        .map(|(pos, motion)| Trail {
            kind: TrailKind::Wake,
            x: pos.x,
            y: pos.y,
            heading: motion.heading,
            life: config.trail_life,
        });
    let bubbles = bullets
        .iter()
        .filter(|b| b.kind() == BulletKind::Torpedo)
        .map(|b| Trail {
            kind: TrailKind::Bubble,
            x: b.x,
            y: b.y,
            heading: b.heading,
            life: config.trail_life,
        });
    for trail in wakes.chain(bubbles) {
        commands.spawn(trail);
    }
}
