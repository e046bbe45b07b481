//! Ship factory - stamps live units out of catalog templates.
//!
//! A live ship shares its templates through `Arc`s and owns only its mutable
//! state (position, motion, hull, reload timers).

use crate::catalog::{Catalog, CatalogResource};
use crate::components::*;
use crate::error::SimResult;
use crate::geometry::normalize_heading;
use crate::world::{SimEvent, SimEvents};
use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Ship ID to entity, plus the serial counter for new IDs.
#[derive(Resource, Debug, Default)]
pub struct UnitRegistry {
    ships: BTreeMap<String, Entity>,
    next_serial: u64,
}

impl UnitRegistry {
    /// Reserve a fresh `"<template>#<serial>"` ID.
    pub fn next_uid(&mut self, template: &str) -> String {
        self.next_serial += 1;
        format!("{}#{}", template, self.next_serial)
    }

    pub fn register(&mut self, uid: String, entity: Entity) {
        self.ships.insert(uid, entity);
    }

    pub fn get(&self, uid: &str) -> Option<Entity> {
        self.ships.get(uid).copied()
    }

    pub fn remove(&mut self, uid: &str) -> Option<Entity> {
        self.ships.remove(uid)
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    /// Registered ships in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Entity)> {
        self.ships.iter().map(|(uid, e)| (uid.as_str(), *e))
    }
}

/// Build the component bundle for a ship without spawning it.
pub fn ship_bundle(
    catalog: &Catalog,
    template: &str,
    uid: String,
    faction: Faction,
    x: f32,
    y: f32,
    heading: f32,
) -> SimResult<ShipBundle> {
    let spec = catalog.ship(template)?;

    let mut weapons = Vec::with_capacity(spec.guns.len() + spec.torpedoes.len() + spec.releasers.len());
    for name in &spec.guns {
        let gun = catalog.gun(name)?;
        let bullet = catalog.bullet(&gun.bullet)?;
        weapons.push(Weapon::new(WeaponSpec::Gun(Arc::clone(gun)), Arc::clone(bullet)));
    }
    for name in &spec.torpedoes {
        let launcher = catalog.torpedo(name)?;
        let bullet = catalog.bullet(&launcher.bullet)?;
        weapons.push(Weapon::new(
            WeaponSpec::Torpedo(Arc::clone(launcher)),
            Arc::clone(bullet),
        ));
    }
    for name in &spec.releasers {
        let releaser = catalog.releaser(name)?;
        let bullet = catalog.bullet(&releaser.bullet)?;
        weapons.push(Weapon::new(
            WeaponSpec::Releaser(Arc::clone(releaser)),
            Arc::clone(bullet),
        ));
    }

    Ok(ShipBundle {
        id: ShipId(uid),
        class: ShipClass(spec.name.clone()),
        faction,
        position: Position::new(x, y),
        motion: Motion::new(heading),
        hull: Hull::new(spec.total_hp),
        stats: ShipStats {
            max_speed: spec.max_speed,
            acceleration: spec.acceleration,
            rotate_speed: spec.rotate_speed,
            length: spec.length,
            width: spec.width,
            horizontal_reduction: spec.horizontal_reduction,
            vertical_reduction: spec.vertical_reduction,
            amphibious: spec.amphibious,
        },
        armament: Armament(weapons),
    })
}

/// Spawn a ship from a template and register it. Returns the new ship ID.
pub fn spawn_ship(
    world: &mut World,
    template: &str,
    faction: Faction,
    x: f32,
    y: f32,
    heading: f32,
) -> SimResult<String> {
    let catalog = world.resource::<CatalogResource>().clone();
    let uid = world.resource_mut::<UnitRegistry>().next_uid(template);
    let bundle = ship_bundle(&catalog, template, uid.clone(), faction, x, y, heading)?;

    let entity = world.spawn(bundle).id();
    world.resource_mut::<UnitRegistry>().register(uid.clone(), entity);
    if let Some(mut events) = world.get_resource_mut::<SimEvents>() {
        events.push(SimEvent::Spawned {
            ship: uid.clone(),
            x,
            y,
        });
    }
    info!(ship = %uid, faction = faction.name(), x, y, heading = normalize_heading(heading), "ship launched");
    Ok(uid)
}

/// Deferred variant for systems holding `Commands`.
#[allow(clippy::too_many_arguments)]
pub fn spawn_ship_deferred(
    commands: &mut Commands,
    registry: &mut UnitRegistry,
    catalog: &Catalog,
    template: &str,
    faction: Faction,
    x: f32,
    y: f32,
    heading: f32,
) -> SimResult<String> {
    let uid = registry.next_uid(template);
    let bundle = ship_bundle(catalog, template, uid.clone(), faction, x, y, heading)?;
    let entity = commands.spawn(bundle).id();
    registry.register(uid.clone(), entity);
    info!(ship = %uid, faction = faction.name(), x, y, "ship launched");
    Ok(uid)
}
