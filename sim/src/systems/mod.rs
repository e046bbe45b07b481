//! ECS systems for the Iron Tide mission simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Order
//!
//! One fixed tick runs the battle systems in a strict chain, all gated on
//! the mission being `Running`:
//!
//! 1. `instruction_system` - executes orders, which also steers ships
//! 2. `spatial_grid_update_system` - rebuilds the neighbour grid
//! 3. `combat_fire_system` - targeting, reloads and firing
//! 4. `ordnance_system` - moves rounds and resolves impacts
//! 5. `wreck_system`, `trail_system` - lifecycle cleanup
//! 6. `income_system`, `reinforce_system` - economy and build queues
//!
//! `mission_status_system` runs after the chain on every tick, so an
//! overlay state still sees win/lose evaluation where it applies.

pub mod ai;
pub mod ballistics;
pub mod combat;
pub mod instruction;
pub mod lifecycle;
pub mod movement;
pub mod reinforce;
pub mod serialization;
pub mod status;
pub mod weapons;

pub use ai::ComputerHandler;
pub use ballistics::ordnance_system;
pub use combat::combat_fire_system;
pub use instruction::{instruction_system, Instruction, InstructionKey, InstructionKind, InstructionSet};
pub use lifecycle::{trail_system, wreck_system};
pub use movement::{steer, steer_ship};
pub use reinforce::{income_system, reinforce_system, BuildMenu, FatalFault, MenuStep};
pub use serialization::*;
pub use status::{battle_running, mission_status_system, MissionStatus, StatusTrigger};

use crate::spatial::spatial_grid_update_system;
use bevy_ecs::prelude::*;

/// The per-tick schedule.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            (
                instruction_system,
                spatial_grid_update_system,
                combat_fire_system,
                ordnance_system,
                wreck_system,
                trail_system,
                income_system,
                reinforce_system,
            )
                .chain()
                .run_if(battle_running),
            mission_status_system,
        )
            .chain(),
    );
    schedule
}
