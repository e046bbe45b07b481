//! Template catalog - read-only ship, weapon and ordnance definitions.
//!
//! Loaded once, validated, then shared as `Arc<Catalog>`. Loading happens in
//! one explicit phase so there is no ordering dependency between tables:
//! every cross reference (ship -> weapon -> bullet) is checked before the
//! catalog is handed to a mission.

use crate::error::{SimError, SimResult};
use crate::geometry::FiringArc;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Ordnance family. Decides how a round is resolved on impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletKind {
    /// Gun shell - direct or arcing depending on range.
    Shell,
    /// Torpedo - always direct, stopped by land.
    Torpedo,
    /// Bomb or depth charge - always arcing.
    Bomb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletTemplate {
    pub name: String,
    pub kind: BulletKind,
    /// Base damage before armour and criticals.
    pub damage: f32,
    /// Distance travelled per tick.
    pub speed: f32,
    /// Width of the round; thinner rounds are swept in finer sub-steps.
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GunTemplate {
    pub name: String,
    pub bullet: String,
    pub range: f32,
    pub reload_ticks: u32,
    /// Scatter per unit of range-utilization.
    pub spread: f32,
    /// Shells per salvo.
    pub barrels: u32,
    /// Bore in millimetres; heavier guns lob shells at shorter ranges.
    pub calibre: f32,
    pub arcs: [FiringArc; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorpedoTemplate {
    pub name: String,
    pub bullet: String,
    pub range: f32,
    pub reload_ticks: u32,
    /// Torpedoes launched per reload cycle.
    pub shots_per_cycle: u32,
    /// Ticks between consecutive torpedoes within a cycle.
    pub shot_interval: u32,
    pub arcs: [FiringArc; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaserTemplate {
    pub name: String,
    pub bullet: String,
    pub range: f32,
    pub reload_ticks: u32,
    pub release_count: u32,
    pub spread: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipTemplate {
    pub name: String,
    /// Funds needed to build one at a reinforce point.
    pub cost: u32,
    /// Ticks of progress a reinforce point needs to finish one.
    pub build_ticks: u32,
    pub total_hp: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    /// Degrees of heading change per tick.
    pub rotate_speed: f32,
    pub length: f32,
    pub width: f32,
    /// Damage fraction absorbed by belt armour (direct hits).
    pub horizontal_reduction: f32,
    /// Damage fraction absorbed by deck armour (plunging hits).
    pub vertical_reduction: f32,
    #[serde(default)]
    pub amphibious: bool,
    #[serde(default)]
    pub guns: Vec<String>,
    #[serde(default)]
    pub torpedoes: Vec<String>,
    #[serde(default)]
    pub releasers: Vec<String>,
}

/// On-disk layout: one array per table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    bullets: Vec<BulletTemplate>,
    guns: Vec<GunTemplate>,
    torpedoes: Vec<TorpedoTemplate>,
    releasers: Vec<ReleaserTemplate>,
    ships: Vec<ShipTemplate>,
}

/// Immutable template tables keyed by name. Templates are handed out as
/// `Arc`s so live weapons can hold on to the spec they were stamped from.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    bullets: BTreeMap<String, Arc<BulletTemplate>>,
    guns: BTreeMap<String, Arc<GunTemplate>>,
    torpedoes: BTreeMap<String, Arc<TorpedoTemplate>>,
    releasers: BTreeMap<String, Arc<ReleaserTemplate>>,
    ships: BTreeMap<String, Arc<ShipTemplate>>,
}

fn keyed<T>(
    kind: &'static str,
    items: Vec<T>,
    name: impl Fn(&T) -> &str,
) -> SimResult<BTreeMap<String, Arc<T>>> {
    let mut map = BTreeMap::new();
    for item in items {
        let key = name(&item).to_string();
        if map.contains_key(&key) {
            return Err(SimError::InvalidCatalog(format!("duplicate {} '{}'", kind, key)));
        }
        map.insert(key, Arc::new(item));
    }
    Ok(map)
}

fn lookup<'a, T>(
    map: &'a BTreeMap<String, Arc<T>>,
    kind: &'static str,
    name: &str,
) -> SimResult<&'a Arc<T>> {
    map.get(name).ok_or_else(|| SimError::UnknownTemplate {
        kind,
        name: name.to_string(),
    })
}

impl Catalog {
    /// Parse and validate a catalog from JSON.
    pub fn from_json_str(data: &str) -> SimResult<Self> {
        let file: CatalogFile = serde_json::from_str(data)?;
        let catalog = Self {
            bullets: keyed("bullet", file.bullets, |b| &b.name)?,
            guns: keyed("gun", file.guns, |g| &g.name)?,
            torpedoes: keyed("torpedo", file.torpedoes, |t| &t.name)?,
            releasers: keyed("releaser", file.releasers, |r| &r.name)?,
            ships: keyed("ship", file.ships, |s| &s.name)?,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> SimResult<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    fn validate(&self) -> SimResult<()> {
        for gun in self.guns.values() {
            let bullet = self.bullet(&gun.bullet)?;
            if bullet.kind != BulletKind::Shell {
                return Err(SimError::InvalidCatalog(format!(
                    "gun '{}' must fire shells, not {:?}",
                    gun.name, bullet.kind
                )));
            }
        }
        for torpedo in self.torpedoes.values() {
            let bullet = self.bullet(&torpedo.bullet)?;
            if bullet.kind != BulletKind::Torpedo {
                return Err(SimError::InvalidCatalog(format!(
                    "launcher '{}' must fire torpedoes, not {:?}",
                    torpedo.name, bullet.kind
                )));
            }
        }
        for releaser in self.releasers.values() {
            self.bullet(&releaser.bullet)?;
        }
        for bullet in self.bullets.values() {
            if bullet.speed <= 0.0 || bullet.width <= 0.0 {
                return Err(SimError::InvalidCatalog(format!(
                    "bullet '{}' needs positive speed and width",
                    bullet.name
                )));
            }
        }
        for ship in self.ships.values() {
            for gun in &ship.guns {
                self.gun(gun)?;
            }
            for torpedo in &ship.torpedoes {
                self.torpedo(torpedo)?;
            }
            for releaser in &ship.releasers {
                self.releaser(releaser)?;
            }
            if ship.total_hp <= 0.0 || ship.max_speed < 0.0 {
                return Err(SimError::InvalidCatalog(format!(
                    "ship '{}' has invalid hit points or speed",
                    ship.name
                )));
            }
        }
        Ok(())
    }

    pub fn bullet(&self, name: &str) -> SimResult<&Arc<BulletTemplate>> {
        lookup(&self.bullets, "bullet", name)
    }

    pub fn gun(&self, name: &str) -> SimResult<&Arc<GunTemplate>> {
        lookup(&self.guns, "gun", name)
    }

    pub fn torpedo(&self, name: &str) -> SimResult<&Arc<TorpedoTemplate>> {
        lookup(&self.torpedoes, "torpedo", name)
    }

    pub fn releaser(&self, name: &str) -> SimResult<&Arc<ReleaserTemplate>> {
        lookup(&self.releasers, "releaser", name)
    }

    pub fn ship(&self, name: &str) -> SimResult<&Arc<ShipTemplate>> {
        lookup(&self.ships, "ship", name)
    }

    pub fn ship_names(&self) -> impl Iterator<Item = &str> {
        self.ships.keys().map(String::as_str)
    }
}

/// Resource sharing the catalog with systems.
#[derive(Resource, Clone)]
pub struct CatalogResource(pub Arc<Catalog>);

impl std::ops::Deref for CatalogResource {
    type Target = Catalog;

    fn deref(&self) -> &Catalog {
        &self.0
    }
}
