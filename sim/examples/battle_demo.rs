//! Two computer-commanded fleets fight over the demo archipelago.
//!
//! Run with: cargo run --example battle_demo

use irontide_sim::{init_tracing, ComputerHandler, Faction, Mission, SimConfig, SimEvent, SimResult};

fn main() -> SimResult<()> {
    init_tracing();
    println!("=== Iron Tide - Battle Demo ===\n");

    let config = SimConfig {
        synchronous_paths: true,
        ..SimConfig::default()
    };
    let think_interval = config.ai_think_interval;
    let mut mission = Mission::demo(config)?;
    // Autoplay the player's side too.
    mission.add_handler(Box::new(ComputerHandler::new(Faction::BLUE, think_interval)));

    println!("Initial state:");
    print_fleets(&mut mission);

    let (mut shots, mut hits, mut sunk) = (0, 0, 0);
    // 60 ticks per simulated second, ten simulated minutes at most.
    for second in 1..=600 {
        mission.step(1.0);
        for event in mission.drain_events() {
            match event {
                SimEvent::Fired { .. } => shots += 1,
                SimEvent::Hit { .. } => hits += 1,
                SimEvent::Exploded { .. } => sunk += 1,
                _ => {}
            }
        }
        if second % 30 == 0 {
            println!(
                "--- t={}s tick {} status {:?} shots {} hits {} sunk {} ---",
                second,
                mission.current_tick(),
                mission.status(),
                shots,
                hits,
                sunk
            );
            print_fleets(&mut mission);
        }
        if mission.status().is_over() {
            break;
        }
    }

    println!("\n=== Outcome: {:?} ===\n", mission.status());
    let final_state = mission.snapshot().to_json_pretty()?;
    println!("{}", final_state);
    Ok(())
}

fn print_fleets(mission: &mut Mission) {
    let snapshot = mission.snapshot();
    for faction in [Faction::BLUE, Faction::RED] {
        println!("  {} (funds {}):", faction.name(), snapshot.funds_of(faction));
        for ship in snapshot.ships.iter().filter(|s| s.faction == faction.0) {
            println!(
                "    {}: pos=({:.1}, {:.1}) hdg={:.0} spd={:.3} hp={:.0}/{:.0}{}",
                ship.uid,
                ship.x,
                ship.y,
                ship.heading,
                ship.speed,
                ship.hp,
                ship.total_hp,
                if ship.sinking { " [sinking]" } else { "" }
            );
        }
    }
}
