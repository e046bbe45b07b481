//! Mission state resources and snapshot types.
//!
//! The ECS `World` is the mission state: ships, ordnance, trails and
//! reinforce points are entities, and the singletons below are resources.
//! `Snapshot` is the serializable read-only view handed to renderers and
//! input handlers.

use crate::catalog::{BulletKind, CatalogResource};
use crate::components::*;
use crate::systems::status::MissionStatus;
use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// RESOURCES
// ============================================================================

/// Number of fixed ticks run so far.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Funds per faction.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Funds(BTreeMap<Faction, u32>);

impl Funds {
    pub fn new(factions: &[Faction], amount: u32) -> Self {
        Self(factions.iter().map(|f| (*f, amount)).collect())
    }

    pub fn get(&self, faction: Faction) -> u32 {
        self.0.get(&faction).copied().unwrap_or(0)
    }

    pub fn set(&mut self, faction: Faction, amount: u32) {
        self.0.insert(faction, amount);
    }

    pub fn credit(&mut self, faction: Faction, amount: u32) {
        let entry = self.0.entry(faction).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Take `amount` if the faction can afford it.
    pub fn debit(&mut self, faction: Faction, amount: u32) -> bool {
        match self.0.get_mut(&faction) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                true
            }
            _ => false,
        }
    }

    pub fn factions(&self) -> impl Iterator<Item = Faction> + '_ {
        self.0.keys().copied()
    }
}

/// Seeded source for spread and critical rolls.
#[derive(Resource)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Viewport over the map in world units. The simulation never reads it.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub map_width: f32,
    pub map_height: f32,
}

impl Camera {
    pub fn new(map_width: f32, map_height: f32, width: f32, height: f32) -> Self {
        let mut camera = Self {
            x: 0.0,
            y: 0.0,
            width: width.min(map_width),
            height: height.min(map_height),
            map_width,
            map_height,
        };
        camera.clamp();
        camera
    }

    fn clamp(&mut self) {
        self.x = self.x.clamp(0.0, (self.map_width - self.width).max(0.0));
        self.y = self.y.clamp(0.0, (self.map_height - self.height).max(0.0));
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        self.clamp();
    }

    pub fn center_on(&mut self, x: f32, y: f32) {
        self.x = x - self.width / 2.0;
        self.y = y - self.height / 2.0;
        self.clamp();
    }

    /// Widen the viewport to the whole map.
    pub fn reveal(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.width = self.map_width;
        self.height = self.map_height;
    }
}

/// Something audio or effects may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Fired {
        ship: String,
        weapon: WeaponClass,
        x: f32,
        y: f32,
    },
    Hit {
        ship: String,
        damage: f32,
        critical: f32,
        x: f32,
        y: f32,
    },
    Exploded {
        ship: String,
        x: f32,
        y: f32,
    },
    Spawned {
        ship: String,
        x: f32,
        y: f32,
    },
    Expired {
        kind: BulletKind,
        x: f32,
        y: f32,
    },
}

/// Events raised during ticks, drained by the host.
#[derive(Resource, Debug, Default)]
pub struct SimEvents(Vec<SimEvent>);

impl SimEvents {
    pub fn push(&mut self, event: SimEvent) {
        self.0.push(event);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Snapshot of a single ship's state for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub uid: String,
    pub class: String,
    pub faction: u8,
    pub x: f32,
    pub y: f32,
    pub cell: (i32, i32),
    pub heading: f32,
    pub speed: f32,
    pub hp: f32,
    pub total_hp: f32,
    pub length: f32,
    pub width: f32,
    pub max_range: f32,
    pub group: Option<u8>,
    /// Sunk and still exploding.
    pub sinking: bool,
}

/// Snapshot of a round in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub kind: BulletKind,
    pub mode: FireMode,
    pub faction: u8,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub life: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOption {
    pub name: String,
    pub cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntrySnapshot {
    pub name: String,
    pub percent: f32,
}

/// Snapshot of a reinforce point and its queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSnapshot {
    pub uid: String,
    pub faction: u8,
    pub x: f32,
    pub y: f32,
    pub capacity: usize,
    pub queue: Vec<QueueEntrySnapshot>,
    pub buildable: Vec<BuildOption>,
}

/// Complete mission state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub status: MissionStatus,
    pub camera: Option<Camera>,
    pub funds: BTreeMap<u8, u32>,
    pub ships: Vec<ShipSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub trails: Vec<Trail>,
    pub points: Vec<PointSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Ships are ordered by ID.
    pub fn from_world(world: &mut World) -> Self {
        let tick = world.get_resource::<SimTick>().map(|t| t.0).unwrap_or(0);
        let status = world
            .get_resource::<MissionStatus>()
            .copied()
            .unwrap_or_default();
        let camera = world.get_resource::<Camera>().copied();
        let funds = world
            .get_resource::<Funds>()
            .map(|f| f.factions().map(|fa| (fa.0, f.get(fa))).collect())
            .unwrap_or_default();

        let mut ships = Vec::new();
        let mut ship_query = world.query::<(
            &ShipId,
            &ShipClass,
            &Faction,
            &Position,
            &Motion,
            &Hull,
            &ShipStats,
            &Armament,
            Option<&Group>,
            Option<&Wreck>,
        )>();
        for (id, class, faction, pos, motion, hull, stats, armament, group, wreck) in
            ship_query.iter(world)
        {
            ships.push(ShipSnapshot {
                uid: id.0.clone(),
                class: class.0.clone(),
                faction: faction.0,
                x: pos.x,
                y: pos.y,
                cell: pos.cell(),
                heading: motion.heading,
                speed: motion.speed,
                hp: hull.current,
                total_hp: hull.total,
                length: stats.length,
                width: stats.width,
                max_range: armament.max_range(),
                group: group.map(|g| g.0),
                sinking: wreck.is_some(),
            });
        }
        ships.sort_by(|a, b| a.uid.cmp(&b.uid));

        let mut bullet_query = world.query::<&Bullet>();
        let bullets = bullet_query
            .iter(world)
            .map(|b| BulletSnapshot {
                kind: b.kind(),
                mode: b.mode,
                faction: b.faction.0,
                x: b.x,
                y: b.y,
                target_x: b.target_x,
                target_y: b.target_y,
                life: b.life,
            })
            .collect();

        let mut trail_query = world.query::<&Trail>();
        let trails = trail_query.iter(world).copied().collect();

        let catalog = world.get_resource::<CatalogResource>().cloned();
        let mut point_query = world.query::<&ReinforcePoint>();
        let mut points: Vec<PointSnapshot> = point_query
            .iter(world)
            .map(|p| PointSnapshot {
                uid: p.uid.clone(),
                faction: p.faction.0,
                x: p.x,
                y: p.y,
                capacity: p.capacity,
                queue: p
                    .queue
                    .iter()
                    .map(|job| QueueEntrySnapshot {
                        name: job.name.clone(),
                        percent: job.percent(),
                    })
                    .collect(),
                buildable: p
                    .buildable
                    .iter()
                    .filter_map(|name| {
                        let template = catalog.as_ref()?.ship(name).ok()?;
                        Some(BuildOption {
                            name: name.clone(),
                            cost: template.cost,
                        })
                    })
                    .collect(),
            })
            .collect();
        points.sort_by(|a, b| a.uid.cmp(&b.uid));

        Self {
            tick,
            status,
            camera,
            funds,
            ships,
            bullets,
            trails,
            points,
        }
    }

    /// Ships still afloat.
    pub fn live_ships(&self) -> impl Iterator<Item = &ShipSnapshot> {
        self.ships.iter().filter(|s| !s.sinking)
    }

    pub fn ship(&self, uid: &str) -> Option<&ShipSnapshot> {
        self.ships.iter().find(|s| s.uid == uid)
    }

    pub fn funds_of(&self, faction: Faction) -> u32 {
        self.funds.get(&faction.0).copied().unwrap_or(0)
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
