//! Ballistics - ordnance flight, impact resolution and damage.
//!
//! Runs after every ship has moved for the tick. Direct-fire rounds sweep
//! their whole step in sub-steps and hit the first hull they cross; arcing
//! rounds only test the aim point once they arrive there.

use crate::catalog::{BulletKind, BulletTemplate};
use crate::components::*;
use crate::config::{CombatConfig, SimConfig};
use crate::geometry::{bearing, distance, heading_vector, RotatedRect};
use crate::terrain::{TerrainGrid, TerrainResource};
use crate::world::{SimEvent, SimEvents, SimRng};
use bevy_ecs::prelude::*;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// Decide whether a shot flies flat or is lobbed. `ratio` is the fraction
/// of the weapon's range the shot has to cover. Heavier guns switch to
/// plunging fire at shorter ratios.
pub fn classify(kind: BulletKind, calibre: f32, ratio: f32, combat: &CombatConfig) -> FireMode {
    match kind {
        BulletKind::Torpedo => FireMode::Direct,
        BulletKind::Bomb => FireMode::Arcing,
        BulletKind::Shell => {
            let threshold = if calibre <= combat.light_calibre {
                combat.light_direct_ratio
            } else if calibre <= combat.medium_calibre {
                combat.medium_direct_ratio
            } else {
                combat.heavy_direct_ratio
            };
            if ratio <= threshold {
                FireMode::Direct
            } else {
                FireMode::Arcing
            }
        }
    }
}

/// Ticks a direct-fire round lives: time to its aim point plus slack.
pub fn direct_lifetime(distance: f32, speed: f32, slack: u32) -> i32 {
    (distance / speed).floor() as i32 + slack as i32
}

/// Ticks an arcing round lives. It needs to reach the aim point exactly.
pub fn arcing_lifetime(distance: f32, speed: f32, slack: u32) -> i32 {
    (distance / speed).ceil() as i32 + slack as i32
}

/// Sub-steps per tick so a round never skips over something as thin as itself.
pub fn substeps(speed: f32, width: f32) -> u32 {
    ((4.0 * speed / width).ceil() as u32).max(1)
}

/// Damage multiplier for a uniform roll in `[0, 1)`.
pub fn critical_multiplier(roll: f32, combat: &CombatConfig) -> f32 {
    if roll < combat.critical_x10_threshold {
        10.0
    } else if roll < combat.critical_x3_threshold {
        3.0
    } else {
        1.0
    }
}

/// Damage after armour and criticals.
pub fn resolve_damage(base: f32, reduction: f32, multiplier: f32) -> f32 {
    base * (1.0 - reduction.clamp(0.0, 1.0)) * multiplier
}

/// Create a round leaving `from` toward `aim`.
pub fn launch(
    template: &Arc<BulletTemplate>,
    mode: FireMode,
    faction: Faction,
    shooter: &str,
    from: (f32, f32),
    aim: (f32, f32),
    slack: u32,
) -> Bullet {
    let dist = distance(from.0, from.1, aim.0, aim.1);
    let life = match mode {
        FireMode::Direct => direct_lifetime(dist, template.speed, slack),
        FireMode::Arcing => arcing_lifetime(dist, template.speed, slack),
    };
    Bullet {
        template: Arc::clone(template),
        faction,
        shooter: shooter.to_string(),
        x: from.0,
        y: from.1,
        target_x: aim.0,
        target_y: aim.1,
        heading: bearing(from.0, from.1, aim.0, aim.1),
        mode,
        life,
        critical: 1.0,
    }
}

/// A hull ordnance can hit this tick.
#[derive(Debug, Clone)]
pub struct Target {
    pub entity: Entity,
    pub uid: String,
    pub faction: Faction,
    pub rect: RotatedRect,
    pub horizontal_reduction: f32,
    pub vertical_reduction: f32,
    pub hp: f32,
}

impl Target {
    fn hittable_by(&self, faction: Faction) -> bool {
        self.faction != faction && self.hp > 0.0
    }
}

/// Result of one tick of flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    InFlight,
    /// Index into the target list.
    Hit(usize),
    /// Landed in open water or ran aground.
    Splashed,
}

/// Advance a direct-fire round one tick.
pub fn advance_direct(bullet: &mut Bullet, targets: &[Target], terrain: &TerrainGrid) -> Flight {
    let steps = substeps(bullet.template.speed, bullet.template.width);
    let (hx, hy) = heading_vector(bullet.heading);
    let step = bullet.template.speed / steps as f32;

    for _ in 0..steps {
        let prev = (bullet.x, bullet.y);
        bullet.x += hx * step;
        bullet.y += hy * step;

        if bullet.kind() == BulletKind::Torpedo && terrain.is_land(bullet.x as i32, bullet.y as i32) {
            return Flight::Splashed;
        }

        let hit = targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.hittable_by(bullet.faction))
            .filter(|(_, t)| t.rect.intersects_segment(prev, (bullet.x, bullet.y)))
            .min_by(|(_, a), (_, b)| {
                let da = distance(prev.0, prev.1, a.rect.cx, a.rect.cy);
                let db = distance(prev.0, prev.1, b.rect.cx, b.rect.cy);
                da.total_cmp(&db)
            });
        if let Some((index, _)) = hit {
            return Flight::Hit(index);
        }
    }
    Flight::InFlight
}

/// Advance an arcing round one tick. It can only hit on arrival.
pub fn advance_arcing(bullet: &mut Bullet, targets: &[Target], epsilon: f32) -> Flight {
    let remaining = distance(bullet.x, bullet.y, bullet.target_x, bullet.target_y);
    if remaining <= bullet.template.speed {
        bullet.x = bullet.target_x;
        bullet.y = bullet.target_y;
    } else {
        let (hx, hy) = heading_vector(bearing(bullet.x, bullet.y, bullet.target_x, bullet.target_y));
        bullet.x += hx * bullet.template.speed;
        bullet.y += hy * bullet.template.speed;
    }

    if distance(bullet.x, bullet.y, bullet.target_x, bullet.target_y) > epsilon {
        return Flight::InFlight;
    }
    targets
        .iter()
        .position(|t| t.hittable_by(bullet.faction) && t.rect.contains(bullet.x, bullet.y))
        .map(Flight::Hit)
        .unwrap_or(Flight::Splashed)
}

/// System that flies every round, applies hits and sinks ships at zero HP.
#[allow(clippy::type_complexity)]
pub fn ordnance_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    terrain: Res<TerrainResource>,
    mut rng: ResMut<SimRng>,
    mut events: ResMut<SimEvents>,
    mut bullets: Query<(Entity, &mut Bullet)>,
    mut ships: Query<
        (Entity, &ShipId, &Faction, &Position, &mut Motion, &ShipStats, &mut Hull),
        Without<Wreck>,
    >,
) {
    let combat = &config.combat;

    let mut targets: Vec<Target> = ships
        .iter()
        .map(|(entity, id, faction, pos, motion, stats, hull)| Target {
            entity,
            uid: id.0.clone(),
            faction: *faction,
            rect: stats.hit_box(pos, motion.heading),
            horizontal_reduction: stats.horizontal_reduction,
            vertical_reduction: stats.vertical_reduction,
            hp: hull.current,
        })
        .collect();
    targets.sort_by(|a, b| a.uid.cmp(&b.uid));
    let mut dealt = vec![0.0f32; targets.len()];

    for (entity, mut bullet) in bullets.iter_mut() {
        let flight = match bullet.mode {
            FireMode::Direct => advance_direct(&mut bullet, &targets, terrain.grid()),
            FireMode::Arcing => advance_arcing(&mut bullet, &targets, combat.arrival_epsilon),
        };

        match flight {
            Flight::Hit(index) => {
                let target = &mut targets[index];
                let multiplier = critical_multiplier(rng.0.gen::<f32>(), combat);
                bullet.critical = bullet.critical.max(multiplier);
                let reduction = match bullet.mode {
                    FireMode::Direct => target.horizontal_reduction,
                    FireMode::Arcing => target.vertical_reduction,
                };
                let damage = resolve_damage(bullet.template.damage, reduction, multiplier);
                target.hp = (target.hp - damage).max(0.0);
                dealt[index] += damage;

                debug!(ship = %target.uid, damage, critical = bullet.critical, "hit");
                events.push(SimEvent::Hit {
                    ship: target.uid.clone(),
                    damage,
                    critical: bullet.critical,
                    x: bullet.x,
                    y: bullet.y,
                });
                commands.entity(entity).despawn();
            }
            Flight::Splashed => {
                events.push(SimEvent::Expired {
                    kind: bullet.kind(),
                    x: bullet.x,
                    y: bullet.y,
                });
                commands.entity(entity).despawn();
            }
            Flight::InFlight => {
                bullet.life -= 1;
                if bullet.life <= 0 {
                    events.push(SimEvent::Expired {
                        kind: bullet.kind(),
                        x: bullet.x,
                        y: bullet.y,
                    });
                    commands.entity(entity).despawn();
                }
            }
        }
    }

    for (target, damage) in targets.iter().zip(&dealt).filter(|(_, d)| **d > 0.0) {
        let Ok((entity, id, _, pos, mut motion, _, mut hull)) = ships.get_mut(target.entity) else {
            continue;
        };
        hull.damage(*damage);
        if !hull.is_afloat() {
            motion.speed = 0.0;
            commands.entity(entity).insert(Wreck {
                frames_left: config.explosion_frames,
            });
            events.push(SimEvent::Exploded {
                ship: id.0.clone(),
                x: pos.x,
                y: pos.y,
            });
            info!(ship = %id, "ship sunk");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BulletTemplate;
    use crate::terrain::TerrainClass;

    fn template(kind: BulletKind, damage: f32, speed: f32) -> Arc<BulletTemplate> {
        Arc::new(BulletTemplate {
            name: "test-round".into(),
            kind,
            damage,
            speed,
            width: 0.2,
        })
    }

    #[test]
    fn test_classification() {
        let combat = CombatConfig::default();
        assert_eq!(classify(BulletKind::Torpedo, 533.0, 0.99, &combat), FireMode::Direct);
        assert_eq!(classify(BulletKind::Bomb, 0.0, 0.0, &combat), FireMode::Arcing);
        assert_eq!(classify(BulletKind::Shell, 127.0, 0.4, &combat), FireMode::Direct);
        assert_eq!(classify(BulletKind::Shell, 203.0, 0.4, &combat), FireMode::Arcing);
        assert_eq!(classify(BulletKind::Shell, 356.0, 0.1, &combat), FireMode::Direct);
        assert_eq!(classify(BulletKind::Shell, 356.0, 0.3, &combat), FireMode::Arcing);
    }

    #[test]
    fn test_critical_and_damage() {
        let combat = CombatConfig::default();
        assert_eq!(critical_multiplier(0.005, &combat), 10.0);
        assert_eq!(critical_multiplier(0.05, &combat), 3.0);
        assert_eq!(critical_multiplier(0.5, &combat), 1.0);

        // Roll under the x3 threshold but over the x10 one.
        let damage = resolve_damage(100.0, 0.3, critical_multiplier(0.05, &combat));
        assert!((damage - 210.0).abs() < 1e-3, "got {}", damage);
    }

    #[test]
    fn test_substeps_scale_with_speed_over_width() {
        assert_eq!(substeps(1.2, 0.2), 24);
        assert_eq!(substeps(0.01, 1.0), 1);
    }

    fn run_ordnance(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(ordnance_system);
        schedule.run(world);
    }

    fn world_with(terrain: TerrainGrid, config: SimConfig) -> World {
        let mut world = World::new();
        world.insert_resource(SimRng::seeded(7));
        world.insert_resource(config);
        world.insert_resource(TerrainResource::new(terrain));
        world.insert_resource(SimEvents::default());
        world
    }

    fn spawn_target(world: &mut World, uid: &str, faction: Faction, x: f32, y: f32, hp: f32) -> Entity {
        world
            .spawn((
                ShipId(uid.into()),
                faction,
                Position::new(x, y),
                Motion::new(0.0),
                ShipStats {
                    max_speed: 0.1,
                    acceleration: 0.01,
                    rotate_speed: 1.0,
                    length: 4.0,
                    width: 1.0,
                    horizontal_reduction: 0.3,
                    vertical_reduction: 0.5,
                    amphibious: false,
                },
                Hull::new(hp),
            ))
            .id()
    }

    #[test]
    fn test_direct_round_expires_within_budget() {
        let mut world = world_with(TerrainGrid::new(200, 200), SimConfig::default());
        let round = template(BulletKind::Shell, 50.0, 1.3);
        let from = (10.0, 100.0);
        let bullet = launch(&round, FireMode::Direct, Faction::BLUE, "a#1", from, (47.0, 100.0), 10);
        let lifetime = bullet.life;
        assert_eq!(lifetime, (37.0f32 / 1.3).floor() as i32 + 10);
        let entity = world.spawn(bullet).id();

        let mut ticks = 0;
        loop {
            let Some(b) = world.get::<Bullet>(entity) else {
                break;
            };
            let travelled = distance(from.0, from.1, b.x, b.y);
            assert!(travelled <= lifetime as f32 * 1.3 + 1e-3);
            run_ordnance(&mut world);
            ticks += 1;
            assert!(ticks <= lifetime, "round outlived its budget");
        }
        assert_eq!(ticks, lifetime);
        assert!(matches!(
            world.resource_mut::<SimEvents>().drain().as_slice(),
            [SimEvent::Expired { .. }]
        ));
    }

    #[test]
    fn test_direct_hit_with_forced_triple_critical() {
        let mut config = SimConfig::default();
        config.combat.critical_x3_threshold = 1.0;
        config.combat.critical_x10_threshold = 0.0;
        let mut world = world_with(TerrainGrid::new(60, 60), config);

        // Broadside-on target: hull runs north-south at x = 30.
        let target = spawn_target(&mut world, "red#1", Faction::RED, 30.0, 20.0, 1000.0);
        let round = template(BulletKind::Shell, 100.0, 1.0);
        world.spawn(launch(&round, FireMode::Direct, Faction::BLUE, "blue#1", (20.0, 20.0), (30.0, 20.0), 10));

        for _ in 0..15 {
            run_ordnance(&mut world);
        }
        let hull = world.get::<Hull>(target).unwrap();
        assert!((hull.total - hull.current - 210.0).abs() < 1e-3, "hp {}", hull.current);
        let events = world.resource_mut::<SimEvents>().drain();
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::Hit { critical, .. } if *critical == 3.0)));
    }

    #[test]
    fn test_friendly_hull_is_ignored() {
        let mut world = world_with(TerrainGrid::new(60, 60), SimConfig::default());
        let friend = spawn_target(&mut world, "blue#2", Faction::BLUE, 25.0, 20.0, 500.0);
        let round = template(BulletKind::Shell, 100.0, 1.0);
        world.spawn(launch(&round, FireMode::Direct, Faction::BLUE, "blue#1", (20.0, 20.0), (30.0, 20.0), 2));

        for _ in 0..20 {
            run_ordnance(&mut world);
        }
        assert_eq!(world.get::<Hull>(friend).unwrap().current, 500.0);
    }

    #[test]
    fn test_torpedo_runs_aground() {
        let mut terrain = TerrainGrid::new(60, 60);
        terrain.set_cell(25, 20, TerrainClass::Land);
        let mut world = world_with(terrain, SimConfig::default());
        let target = spawn_target(&mut world, "red#1", Faction::RED, 30.0, 20.0, 500.0);
        let fish = template(BulletKind::Torpedo, 300.0, 0.5);
        world.spawn(launch(&fish, FireMode::Direct, Faction::BLUE, "blue#1", (20.5, 20.5), (30.5, 20.5), 10));

        for _ in 0..40 {
            run_ordnance(&mut world);
        }
        assert_eq!(world.get::<Hull>(target).unwrap().current, 500.0);
        assert_eq!(world.query::<&Bullet>().iter(&world).count(), 0);
    }

    #[test]
    fn test_arcing_round_only_hits_on_arrival() {
        let mut config = SimConfig::default();
        config.combat.critical_x3_threshold = 0.0;
        config.combat.critical_x10_threshold = 0.0;
        let mut world = world_with(TerrainGrid::new(60, 60), config);
        // A hull sitting on the flight path is overflown.
        let screen = spawn_target(&mut world, "red#1", Faction::RED, 25.0, 20.0, 500.0);
        let target = spawn_target(&mut world, "red#2", Faction::RED, 30.0, 20.0, 500.0);
        let round = template(BulletKind::Shell, 100.0, 1.0);
        world.spawn(launch(&round, FireMode::Arcing, Faction::BLUE, "blue#1", (20.0, 20.0), (30.0, 20.0), 5));

        for _ in 0..12 {
            run_ordnance(&mut world);
        }
        assert_eq!(world.get::<Hull>(screen).unwrap().current, 500.0);
        // Plunging hits use deck armour.
        assert_eq!(world.get::<Hull>(target).unwrap().current, 450.0);
    }

    #[test]
    fn test_zero_hp_becomes_wreck() {
        let mut world = world_with(TerrainGrid::new(60, 60), SimConfig::default());
        let target = spawn_target(&mut world, "red#1", Faction::RED, 30.0, 20.0, 10.0);
        let round = template(BulletKind::Shell, 100.0, 1.0);
        world.spawn(launch(&round, FireMode::Direct, Faction::BLUE, "blue#1", (20.0, 20.0), (30.0, 20.0), 10));

        for _ in 0..15 {
            run_ordnance(&mut world);
        }
        assert_eq!(world.get::<Hull>(target).unwrap().current, 0.0);
        let wreck = world.get::<Wreck>(target).unwrap();
        assert_eq!(wreck.frames_left, SimConfig::default().explosion_frames);
    }
}
