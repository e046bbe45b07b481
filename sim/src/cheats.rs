//! Console commands.
//!
//! A line is a command name and an optional argument. Commands mutate the
//! world directly and answer with a line of text. They only run while the
//! console is open (`MissionStatus::Terminal`), when the battle is frozen.

use crate::components::*;
use crate::config::SimConfig;
use crate::systems::status::MissionStatus;
use crate::world::{Camera, Funds, SimEvent, SimEvents};
use bevy_ecs::prelude::*;
use tracing::info;

const HELP: &str = "commands: funds <amount>, repair, sink_enemies, reveal, help";

/// Run one console line.
pub fn execute(world: &mut World, line: &str) -> String {
    let status = world.get_resource::<MissionStatus>().copied().unwrap_or_default();
    if status != MissionStatus::Terminal {
        return "console is closed".to_string();
    }
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return HELP.to_string();
    };
    let arg = words.next();
    let player = world
        .get_resource::<SimConfig>()
        .map(|c| c.player_faction)
        .unwrap_or_default();

    let reply = match name {
        "funds" => set_funds(world, player, arg),
        "repair" => repair(world, player),
        "sink_enemies" => sink_enemies(world, player),
        "reveal" => reveal(world),
        "help" => HELP.to_string(),
        other => format!("unknown command '{}'; {}", other, HELP),
    };
    info!(command = line, %reply, "console");
    reply
}

fn set_funds(world: &mut World, player: Faction, arg: Option<&str>) -> String {
    let Some(amount) = arg.and_then(|a| a.parse::<u32>().ok()) else {
        return "usage: funds <amount>".to_string();
    };
    match world.get_resource_mut::<Funds>() {
        Some(mut funds) => {
            funds.set(player, amount);
            format!("funds set to {}", amount)
        }
        None => "no treasury in this mission".to_string(),
    }
}

fn repair(world: &mut World, player: Faction) -> String {
    let mut ships = world.query_filtered::<(&Faction, &mut Hull), Without<Wreck>>();
    let mut repaired = 0;
    for (faction, mut hull) in ships.iter_mut(world) {
        if *faction == player {
            hull.repair();
            repaired += 1;
        }
    }
    format!("repaired {} ships", repaired)
}

fn sink_enemies(world: &mut World, player: Faction) -> String {
    let frames = world
        .get_resource::<SimConfig>()
        .map(|c| c.explosion_frames)
        .unwrap_or(1)
        .max(1);
    let mut ships = world.query_filtered::<(Entity, &ShipId, &Faction, &Position), Without<Wreck>>();
    let targets: Vec<(Entity, String, f32, f32)> = ships
        .iter(world)
        .filter(|(_, _, faction, _)| **faction != player)
        .map(|(entity, id, _, pos)| (entity, id.0.clone(), pos.x, pos.y))
        .collect();

    for (entity, uid, x, y) in &targets {
        if let Some(mut hull) = world.get_mut::<Hull>(*entity) {
            hull.current = 0.0;
        }
        if let Some(mut motion) = world.get_mut::<Motion>(*entity) {
            motion.speed = 0.0;
        }
        world.entity_mut(*entity).insert(Wreck { frames_left: frames });
        if let Some(mut events) = world.get_resource_mut::<SimEvents>() {
            events.push(SimEvent::Exploded {
                ship: uid.clone(),
                x: *x,
                y: *y,
            });
        }
    }
    format!("sank {} ships", targets.len())
}

fn reveal(world: &mut World) -> String {
    match world.get_resource_mut::<Camera>() {
        Some(mut camera) => {
            camera.reveal();
            "map revealed".to_string()
        }
        None => "no camera".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogResource};
    use crate::factory::{spawn_ship, UnitRegistry};
    use std::sync::Arc;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(CatalogResource(Arc::new(Catalog::builtin().unwrap())));
        world.insert_resource(UnitRegistry::default());
        world.insert_resource(SimEvents::default());
        world.insert_resource(SimConfig::default());
        world.insert_resource(Funds::new(&[Faction::BLUE, Faction::RED], 100));
        world.insert_resource(Camera::new(100.0, 60.0, 40.0, 30.0));
        world.insert_resource(MissionStatus::Terminal);
        world
    }

    #[test]
    fn test_only_runs_in_terminal() {
        let mut world = world();
        world.insert_resource(MissionStatus::Running);
        assert_eq!(execute(&mut world, "funds 9000"), "console is closed");
        assert_eq!(world.resource::<Funds>().get(Faction::BLUE), 100);
    }

    #[test]
    fn test_funds_and_reveal() {
        let mut world = world();
        assert_eq!(execute(&mut world, "funds 9000"), "funds set to 9000");
        assert_eq!(world.resource::<Funds>().get(Faction::BLUE), 9000);
        assert_eq!(world.resource::<Funds>().get(Faction::RED), 100);
        assert_eq!(execute(&mut world, "funds lots"), "usage: funds <amount>");

        execute(&mut world, "reveal");
        assert_eq!(world.resource::<Camera>().width, 100.0);
    }

    #[test]
    fn test_repair_and_sink() {
        let mut world = world();
        let own = spawn_ship(&mut world, "destroyer", Faction::BLUE, 5.0, 5.0, 0.0).unwrap();
        let foe = spawn_ship(&mut world, "cruiser", Faction::RED, 50.0, 5.0, 0.0).unwrap();
        let own = world.resource::<UnitRegistry>().get(&own).unwrap();
        let foe = world.resource::<UnitRegistry>().get(&foe).unwrap();
        world.get_mut::<Hull>(own).unwrap().damage(500.0);

        assert_eq!(execute(&mut world, "repair"), "repaired 1 ships");
        assert_eq!(world.get::<Hull>(own).unwrap().current, 1200.0);

        assert_eq!(execute(&mut world, "sink_enemies"), "sank 1 ships");
        assert!(world.get::<Wreck>(foe).is_some());
        assert_eq!(world.get::<Hull>(foe).unwrap().current, 0.0);
        assert!(world.get::<Wreck>(own).is_none());
    }

    #[test]
    fn test_unknown_command_explains() {
        let mut world = world();
        let reply = execute(&mut world, "warp 9");
        assert!(reply.starts_with("unknown command 'warp'"));
        assert_eq!(execute(&mut world, "   "), HELP);
    }
}
