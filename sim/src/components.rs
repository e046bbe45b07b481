//! ECS Components for the Iron Tide simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use crate::catalog::{BulletKind, BulletTemplate, GunTemplate, ReleaserTemplate, TorpedoTemplate};
use crate::geometry::{heading_vector, FiringArc, RotatedRect};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Continuous position on the map, in cells (x = east, y = south).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Grid cell under this position (truncated toward zero).
    #[inline]
    pub fn cell(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Heading (degrees, `[0, 360)`, 0 = north, clockwise) and scalar speed.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub heading: f32,
    pub speed: f32,
}

impl Motion {
    pub fn new(heading: f32) -> Self {
        Self {
            heading: crate::geometry::normalize_heading(heading),
            speed: 0.0,
        }
    }

    /// Displacement per tick.
    pub fn velocity(&self) -> (f32, f32) {
        let (dx, dy) = heading_vector(self.heading);
        (dx * self.speed, dy * self.speed)
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Unique ship identifier, `"<template>#<serial>"`.
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipId(pub String);

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Template the ship was built from.
#[derive(Component, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipClass(pub String);

/// Faction/side identifier.
#[derive(
    Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Faction(pub u8);

impl Faction {
    pub const BLUE: Faction = Faction(0);
    pub const RED: Faction = Faction(1);

    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "Blue",
            1 => "Red",
            _ => "Neutral",
        }
    }
}

/// Control group a player assigned the ship to.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group(pub u8);

// ============================================================================
// HULL COMPONENTS
// ============================================================================

/// Hit points. `current` never leaves `[0, total]`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hull {
    pub current: f32,
    pub total: f32,
}

impl Hull {
    pub fn new(total: f32) -> Self {
        Self {
            current: total,
            total,
        }
    }

    pub fn is_afloat(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.total);
    }

    pub fn repair(&mut self) {
        self.current = self.total;
    }
}

/// Template-derived handling and armour.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShipStats {
    pub max_speed: f32,
    pub acceleration: f32,
    /// Degrees per tick.
    pub rotate_speed: f32,
    pub length: f32,
    pub width: f32,
    pub horizontal_reduction: f32,
    pub vertical_reduction: f32,
    pub amphibious: bool,
}

impl ShipStats {
    /// Footprint of a hull with these dimensions.
    pub fn hit_box(&self, pos: &Position, heading: f32) -> RotatedRect {
        RotatedRect::new(pos.x, pos.y, self.length, self.width, heading)
    }
}

/// A sunk ship still on the roster while its explosion plays out.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Wreck {
    pub frames_left: u32,
}

// ============================================================================
// WEAPON COMPONENTS
// ============================================================================

/// Weapon family; instructions enable and disable weapons per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponClass {
    Gun,
    Torpedo,
    Releaser,
}

impl fmt::Display for WeaponClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeaponClass::Gun => "guns",
            WeaponClass::Torpedo => "torpedoes",
            WeaponClass::Releaser => "releasers",
        };
        f.write_str(name)
    }
}

/// Immutable spec a weapon instance was stamped from.
#[derive(Debug, Clone)]
pub enum WeaponSpec {
    Gun(Arc<GunTemplate>),
    Torpedo(Arc<TorpedoTemplate>),
    Releaser(Arc<ReleaserTemplate>),
}

/// One mounted weapon: a shared spec plus its own reload state.
#[derive(Debug, Clone)]
pub struct Weapon {
    pub spec: WeaponSpec,
    pub bullet: Arc<BulletTemplate>,
    pub enabled: bool,
    /// Ticks until the next cycle may start.
    pub reload_left: u32,
    /// Ticks until the next torpedo of the current cycle.
    pub shot_cooldown: u32,
    /// Torpedoes already launched in the current cycle.
    pub salvo_fired: u32,
}

impl Weapon {
    pub fn new(spec: WeaponSpec, bullet: Arc<BulletTemplate>) -> Self {
        Self {
            spec,
            bullet,
            enabled: true,
            reload_left: 0,
            shot_cooldown: 0,
            salvo_fired: 0,
        }
    }

    pub fn class(&self) -> WeaponClass {
        match self.spec {
            WeaponSpec::Gun(_) => WeaponClass::Gun,
            WeaponSpec::Torpedo(_) => WeaponClass::Torpedo,
            WeaponSpec::Releaser(_) => WeaponClass::Releaser,
        }
    }

    pub fn name(&self) -> &str {
        match &self.spec {
            WeaponSpec::Gun(g) => &g.name,
            WeaponSpec::Torpedo(t) => &t.name,
            WeaponSpec::Releaser(r) => &r.name,
        }
    }

    pub fn range(&self) -> f32 {
        match &self.spec {
            WeaponSpec::Gun(g) => g.range,
            WeaponSpec::Torpedo(t) => t.range,
            WeaponSpec::Releaser(r) => r.range,
        }
    }

    /// Hull-relative arcs. Releasers drop over the side in any direction.
    pub fn arcs(&self) -> [FiringArc; 2] {
        match &self.spec {
            WeaponSpec::Gun(g) => g.arcs,
            WeaponSpec::Torpedo(t) => t.arcs,
            WeaponSpec::Releaser(_) => [FiringArc::FULL, FiringArc::FULL],
        }
    }
}

/// Everything a ship carries, in template order.
#[derive(Component, Debug, Clone, Default)]
pub struct Armament(pub Vec<Weapon>);

impl Armament {
    /// Longest reach over all mounted weapons.
    pub fn max_range(&self) -> f32 {
        self.0.iter().map(Weapon::range).fold(0.0, f32::max)
    }

    /// Flip every weapon of a class. Returns how many were touched.
    pub fn set_enabled(&mut self, class: WeaponClass, enabled: bool) -> usize {
        let mut touched = 0;
        for weapon in self.0.iter_mut().filter(|w| w.class() == class) {
            weapon.enabled = enabled;
            touched += 1;
        }
        touched
    }
}

// ============================================================================
// ORDNANCE COMPONENTS
// ============================================================================

/// How a round resolves damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireMode {
    /// Flat trajectory: hits the first hull it crosses.
    Direct,
    /// Lobbed: only hits what is at the aim point on arrival.
    Arcing,
}

/// A round in flight. Carries its own position so ordnance never aliases
/// ship queries.
#[derive(Component, Debug, Clone)]
pub struct Bullet {
    pub template: Arc<BulletTemplate>,
    pub faction: Faction,
    pub shooter: String,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    /// Direction of travel for direct fire.
    pub heading: f32,
    pub mode: FireMode,
    /// Ticks left before the round is discarded as a miss.
    pub life: i32,
    /// Highest critical multiplier this round has rolled.
    pub critical: f32,
}

impl Bullet {
    pub fn kind(&self) -> BulletKind {
        self.template.kind
    }
}

// ============================================================================
// VISUAL COMPONENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailKind {
    /// Behind a moving ship.
    Wake,
    /// Behind a running torpedo.
    Bubble,
}

/// Short-lived marker left on the water. Has no effect on the battle.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trail {
    pub kind: TrailKind,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub life: u32,
}

// ============================================================================
// REINFORCEMENT COMPONENTS
// ============================================================================

/// A ship waiting in a reinforce point's build queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OncomingShip {
    pub name: String,
    pub cost: u32,
    pub progress: u32,
    pub build_ticks: u32,
}

impl OncomingShip {
    /// Build progress in `[0, 100]`.
    pub fn percent(&self) -> f32 {
        if self.build_ticks == 0 {
            100.0
        } else {
            (self.progress as f32 / self.build_ticks as f32 * 100.0).min(100.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.build_ticks
    }
}

/// Faction-owned shipyard with a bounded FIFO build queue.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct ReinforcePoint {
    pub uid: String,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    /// Heading given to ships launched here.
    pub heading: f32,
    pub capacity: usize,
    /// Templates this point can build.
    pub buildable: Vec<String>,
    pub queue: VecDeque<OncomingShip>,
}

impl ReinforcePoint {
    pub fn new(uid: impl Into<String>, faction: Faction, x: f32, y: f32, heading: f32, capacity: usize) -> Self {
        Self {
            uid: uid.into(),
            faction,
            x,
            y,
            heading: crate::geometry::normalize_heading(heading),
            capacity,
            buildable: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn with_buildable(mut self, ships: &[&str]) -> Self {
        self.buildable = ships.iter().map(|s| s.to_string()).collect();
        self
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete ship entity.
#[derive(Bundle)]
pub struct ShipBundle {
    pub id: ShipId,
    pub class: ShipClass,
    pub faction: Faction,
    pub position: Position,
    pub motion: Motion,
    pub hull: Hull,
    pub stats: ShipStats,
    pub armament: Armament,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hull_stays_in_bounds() {
        let mut hull = Hull::new(100.0);
        hull.damage(-50.0);
        assert_eq!(hull.current, 100.0);
        hull.damage(30.0);
        assert_eq!(hull.current, 70.0);
        hull.damage(1000.0);
        assert_eq!(hull.current, 0.0);
        assert!(!hull.is_afloat());
        hull.repair();
        assert_eq!(hull.current, hull.total);
    }

    #[test]
    fn test_position_cell_truncates() {
        assert_eq!(Position::new(3.9, 7.1).cell(), (3, 7));
        assert_eq!(Position::new(0.2, 0.0).cell(), (0, 0));
    }

    #[test]
    fn test_motion_velocity_follows_heading() {
        let motion = Motion {
            heading: 90.0,
            speed: 2.0,
        };
        let (vx, vy) = motion.velocity();
        assert!((vx - 2.0).abs() < 1e-5);
        assert!(vy.abs() < 1e-5);
        assert_eq!(Motion::new(-90.0).heading, 270.0);
    }

    #[test]
    fn test_oncoming_ship_progress() {
        let job = OncomingShip {
            name: "destroyer".into(),
            cost: 500,
            progress: 150,
            build_ticks: 600,
        };
        assert_eq!(job.percent(), 25.0);
        assert!(!job.is_complete());
    }
}
