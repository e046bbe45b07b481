//! Movement system - per-tick steering toward a target point.
//!
//! Ships only move while a movement instruction drives them; the
//! instruction calls [`steer_ship`] once per tick and finishes when it
//! reports arrival.

use crate::components::*;
use crate::config::{SimConfig, SteeringConfig};
use crate::geometry::{angle_delta, bearing, distance, heading_vector, rotate_towards};
use crate::terrain::{TerrainGrid, TerrainResource};
use bevy_ecs::prelude::*;

/// Heading error (degrees) under which a ship counts as pointed at its target.
const ALIGNED_DEGREES: f32 = 1.0;

/// Share of a clamped step that must still close on the target for the
/// ship to keep sliding along the map edge.
const EDGE_PROGRESS: f32 = 0.1;

/// Advance one tick toward `target`. Returns `true` on arrival, which
/// includes being stopped by terrain the hull cannot enter or by the map
/// edge when the target lies outside the map.
///
/// `near_goal` marks the final leg of a route: only then does the ship
/// slow down as it closes in.
pub fn steer(
    pos: &mut Position,
    motion: &mut Motion,
    stats: &ShipStats,
    target: (f32, f32),
    near_goal: bool,
    steering: &SteeringConfig,
    terrain: &TerrainGrid,
) -> bool {
    let dist = distance(pos.x, pos.y, target.0, target.1);
    if dist <= steering.arrive_tolerance {
        motion.speed = 0.0;
        return true;
    }

    let decel_radius = stats.length * steering.decel_hull_lengths;
    if near_goal && dist < decel_radius {
        // Never brake to a full stop short of the target.
        let crawl = stats.acceleration.max(0.01).min(stats.max_speed);
        motion.speed = (motion.speed - stats.acceleration).max(crawl);
    } else {
        motion.speed += stats.acceleration;
    }
    motion.speed = motion.speed.clamp(0.0, stats.max_speed);

    let desired = bearing(pos.x, pos.y, target.0, target.1);
    motion.heading = rotate_towards(motion.heading, desired, stats.rotate_speed);

    let turn_radius = stats.length * steering.turn_in_place_hull_lengths;
    if dist < turn_radius && angle_delta(motion.heading, desired).abs() > ALIGNED_DEGREES {
        motion.speed = 0.0;
        return false;
    }

    let step = motion.speed.min(dist);
    let (dx, dy) = heading_vector(motion.heading);
    let (rx, ry) = (pos.x + dx * step, pos.y + dy * step);
    let (nx, ny) = terrain.clamp_to_bounds(rx, ry);
    if !terrain.class_at_world(nx, ny).is_passable(stats.amphibious) {
        motion.speed = 0.0;
        return true;
    }
    // Pinned against the map edge with the target beyond it: as close as
    // the ship can get.
    let clamped = (nx, ny) != (rx, ry);
    let target_off_map = terrain.clamp_to_bounds(target.0, target.1) != target;
    if clamped
        && target_off_map
        && angle_delta(motion.heading, desired).abs() <= ALIGNED_DEGREES
        && dist - distance(nx, ny, target.0, target.1) < step * EDGE_PROGRESS
    {
        pos.x = nx;
        pos.y = ny;
        motion.speed = 0.0;
        return true;
    }

    pos.x = nx;
    pos.y = ny;
    false
}

/// Steer a ship entity. Components are copied out and written back so the
/// caller only needs `&mut World`. Returns `None` if the entity is not a ship.
pub fn steer_ship(world: &mut World, entity: Entity, target: (f32, f32), near_goal: bool) -> Option<bool> {
    let mut pos = *world.get::<Position>(entity)?;
    let mut motion = *world.get::<Motion>(entity)?;
    let stats = *world.get::<ShipStats>(entity)?;

    let arrived = {
        let steering = &world.get_resource::<SimConfig>()?.steering;
        let terrain = world.get_resource::<TerrainResource>()?;
        steer(&mut pos, &mut motion, &stats, target, near_goal, steering, terrain.grid())
    };

    if let Some(mut p) = world.get_mut::<Position>(entity) {
        *p = pos;
    }
    if let Some(mut m) = world.get_mut::<Motion>(entity) {
        *m = motion;
    }
    Some(arrived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainClass;

    fn stats() -> ShipStats {
        ShipStats {
            max_speed: 0.15,
            acceleration: 0.01,
            rotate_speed: 3.0,
            length: 4.0,
            width: 1.0,
            horizontal_reduction: 0.1,
            vertical_reduction: 0.05,
            amphibious: false,
        }
    }

    fn drive(
        pos: &mut Position,
        motion: &mut Motion,
        stats: &ShipStats,
        target: (f32, f32),
        terrain: &TerrainGrid,
        max_ticks: usize,
    ) -> Option<usize> {
        let steering = SteeringConfig::default();
        for tick in 0..max_ticks {
            let arrived = steer(pos, motion, stats, target, true, &steering, terrain);
            assert!(motion.speed >= 0.0 && motion.speed <= stats.max_speed);
            assert!(motion.heading >= 0.0 && motion.heading < 360.0);
            if arrived {
                return Some(tick);
            }
        }
        None
    }

    #[test]
    fn test_ship_reaches_target_behind_it() {
        let terrain = TerrainGrid::new(60, 60);
        let stats = stats();
        let mut pos = Position::new(30.0, 30.0);
        let mut motion = Motion::new(0.0);

        let ticks = drive(&mut pos, &mut motion, &stats, (30.0, 50.0), &terrain, 2000);
        assert!(ticks.is_some(), "ship never arrived, ended at {:?}", pos);
        assert!(pos.distance_to(&Position::new(30.0, 50.0)) <= 0.2 + 0.01);
        assert_eq!(motion.speed, 0.0);
    }

    #[test]
    fn test_rotation_takes_short_way() {
        let terrain = TerrainGrid::new(60, 60);
        let stats = stats();
        let mut pos = Position::new(30.0, 30.0);
        // Facing 350, target due east: turning clockwise through 0 is shorter.
        let mut motion = Motion::new(350.0);
        steer(
            &mut pos,
            &mut motion,
            &stats,
            (50.0, 30.0),
            false,
            &SteeringConfig::default(),
            &terrain,
        );
        assert!((motion.heading - 353.0).abs() < 1e-3);
    }

    #[test]
    fn test_turns_in_place_when_close_and_misaligned() {
        let terrain = TerrainGrid::new(60, 60);
        let stats = stats();
        let mut pos = Position::new(30.0, 30.0);
        let mut motion = Motion {
            heading: 0.0,
            speed: 0.1,
        };
        // Target two cells astern, inside one hull length.
        let arrived = steer(
            &mut pos,
            &mut motion,
            &stats,
            (30.0, 32.0),
            false,
            &SteeringConfig::default(),
            &terrain,
        );
        assert!(!arrived);
        assert_eq!(motion.speed, 0.0);
        assert_eq!(pos, Position::new(30.0, 30.0));
    }

    #[test]
    fn test_land_stops_ship() {
        let mut terrain = TerrainGrid::new(20, 20);
        for y in 0..20 {
            terrain.set_cell(10, y, TerrainClass::Land);
        }
        let stats = stats();
        let mut pos = Position::new(5.5, 10.5);
        let mut motion = Motion::new(90.0);

        let ticks = drive(&mut pos, &mut motion, &stats, (15.5, 10.5), &terrain, 2000);
        assert!(ticks.is_some());
        assert!(pos.x < 10.0);
        assert_eq!(motion.speed, 0.0);
    }

    #[test]
    fn test_target_beyond_map_edge_stops_at_edge() {
        let terrain = TerrainGrid::new(40, 20);
        let stats = stats();
        let mut pos = Position::new(30.0, 10.0);
        let mut motion = Motion::new(90.0);

        let ticks = drive(&mut pos, &mut motion, &stats, (55.0, 10.0), &terrain, 2000);
        assert!(ticks.is_some(), "ship never gave up, ended at {:?}", pos);
        assert!(pos.x > 39.0 && pos.x < 40.0);
        assert_eq!(motion.speed, 0.0);
    }

    #[test]
    fn test_slides_along_edge_toward_corner_target() {
        let terrain = TerrainGrid::new(40, 20);
        let stats = stats();
        let mut pos = Position::new(30.0, 5.0);
        let mut motion = Motion::new(90.0);

        let ticks = drive(&mut pos, &mut motion, &stats, (60.0, 40.0), &terrain, 5000);
        assert!(ticks.is_some(), "ship never gave up, ended at {:?}", pos);
        // Worked its way into the corner nearest the target.
        assert!(pos.x > 38.0 && pos.y > 18.0, "stopped at {:?}", pos);
        assert_eq!(motion.speed, 0.0);
    }

    #[test]
    fn test_amphibious_crosses_land() {
        let mut terrain = TerrainGrid::new(20, 20);
        for y in 0..20 {
            terrain.set_cell(10, y, TerrainClass::Land);
        }
        let stats = ShipStats {
            amphibious: true,
            ..stats()
        };
        let mut pos = Position::new(5.5, 10.5);
        let mut motion = Motion::new(90.0);

        drive(&mut pos, &mut motion, &stats, (15.5, 10.5), &terrain, 2000);
        assert!(pos.x > 15.0);
    }

    #[test]
    fn test_steer_ship_writes_back() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(TerrainResource::new(TerrainGrid::new(40, 40)));
        let entity = world
            .spawn((Position::new(10.0, 10.0), Motion::new(90.0), stats()))
            .id();

        assert_eq!(steer_ship(&mut world, entity, (30.0, 10.0), false), Some(false));
        let pos = world.get::<Position>(entity).unwrap();
        assert!(pos.x > 10.0);
        assert!(world.get::<Motion>(entity).unwrap().speed > 0.0);

        let not_a_ship = world.spawn_empty().id();
        assert_eq!(steer_ship(&mut world, not_a_ship, (0.0, 0.0), false), None);
    }
}
