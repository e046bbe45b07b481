//! Mission status state machine.
//!
//! Status gates the battle: the chained battle systems only run while the
//! mission is `Running`. Toggles switch between `Running` and one overlay
//! state; win/lose evaluation runs while `Running` or `Map`.

use crate::components::{Faction, ShipId};
use crate::config::SimConfig;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionStatus {
    #[default]
    Running,
    Paused,
    /// Full-screen map overview.
    Map,
    /// Cheat console open.
    Terminal,
    /// Reinforcement menu open.
    Building,
    Success,
    Failed,
}

/// Discrete inputs that flip the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTrigger {
    Pause,
    Map,
    Terminal,
    Building,
}

impl StatusTrigger {
    fn target(self) -> MissionStatus {
        match self {
            StatusTrigger::Pause => MissionStatus::Paused,
            StatusTrigger::Map => MissionStatus::Map,
            StatusTrigger::Terminal => MissionStatus::Terminal,
            StatusTrigger::Building => MissionStatus::Building,
        }
    }
}

impl MissionStatus {
    pub fn is_over(self) -> bool {
        matches!(self, MissionStatus::Success | MissionStatus::Failed)
    }

    /// Apply a toggle. From `Running` it opens the overlay; pressing the same
    /// trigger again returns to `Running`. Anything else is ignored.
    pub fn toggled(self, trigger: StatusTrigger) -> MissionStatus {
        let target = trigger.target();
        if self == MissionStatus::Running {
            target
        } else if self == target {
            MissionStatus::Running
        } else {
            self
        }
    }

    /// Win/lose evaluation. `own` and `enemy` count ships afloat plus ships
    /// still exploding. Defeat is checked before victory.
    pub fn evaluated(self, own: usize, enemy: usize) -> MissionStatus {
        if !matches!(self, MissionStatus::Running | MissionStatus::Map) {
            return self;
        }
        if own == 0 {
            MissionStatus::Failed
        } else if enemy == 0 {
            MissionStatus::Success
        } else {
            self
        }
    }
}

/// Run condition for the battle systems.
pub fn battle_running(status: Res<MissionStatus>) -> bool {
    *status == MissionStatus::Running
}

/// System that judges the mission from the player's side. Wrecks count as
/// "destroying" units, so the outcome waits for the last explosion.
pub fn mission_status_system(
    mut status: ResMut<MissionStatus>,
    config: Res<SimConfig>,
    ships: Query<&Faction, With<ShipId>>,
) {
    let player = config.player_faction;
    let (own, enemy) = ships.iter().fold((0, 0), |(own, enemy), faction| {
        if *faction == player {
            (own + 1, enemy)
        } else {
            (own, enemy + 1)
        }
    });

    let current = *status;
    let next = current.evaluated(own, enemy);
    if next != current {
        info!(from = ?current, to = ?next, own, enemy, "mission status changed");
        *status = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Wreck;

    #[test]
    fn test_toggles_round_trip_through_running() {
        let status = MissionStatus::Running.toggled(StatusTrigger::Pause);
        assert_eq!(status, MissionStatus::Paused);
        // Another overlay cannot open on top of a pause.
        assert_eq!(status.toggled(StatusTrigger::Map), MissionStatus::Paused);
        assert_eq!(status.toggled(StatusTrigger::Pause), MissionStatus::Running);
        assert_eq!(
            MissionStatus::Success.toggled(StatusTrigger::Terminal),
            MissionStatus::Success
        );
    }

    #[test]
    fn test_evaluation_rules() {
        assert_eq!(MissionStatus::Running.evaluated(0, 0), MissionStatus::Failed);
        assert_eq!(MissionStatus::Running.evaluated(2, 0), MissionStatus::Success);
        assert_eq!(MissionStatus::Map.evaluated(1, 0), MissionStatus::Success);
        assert_eq!(MissionStatus::Running.evaluated(1, 1), MissionStatus::Running);
        // Overlays other than the map freeze evaluation.
        assert_eq!(MissionStatus::Paused.evaluated(0, 3), MissionStatus::Paused);
        assert_eq!(MissionStatus::Terminal.evaluated(1, 0), MissionStatus::Terminal);
    }

    fn run_status(world: &mut World) -> MissionStatus {
        let mut schedule = Schedule::default();
        schedule.add_systems(mission_status_system);
        schedule.run(world);
        *world.resource::<MissionStatus>()
    }

    #[test]
    fn test_running_to_success_when_enemies_gone() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(MissionStatus::Running);
        world.spawn((ShipId("destroyer#1".into()), Faction::BLUE));

        assert_eq!(run_status(&mut world), MissionStatus::Success);
    }

    #[test]
    fn test_exploding_enemy_delays_success() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(MissionStatus::Running);
        world.spawn((ShipId("destroyer#1".into()), Faction::BLUE));
        let wreck = world
            .spawn((ShipId("cruiser#2".into()), Faction::RED, Wreck { frames_left: 3 }))
            .id();

        assert_eq!(run_status(&mut world), MissionStatus::Running);
        world.despawn(wreck);
        assert_eq!(run_status(&mut world), MissionStatus::Success);
    }

    #[test]
    fn test_failed_checked_first() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(MissionStatus::Running);
        assert_eq!(run_status(&mut world), MissionStatus::Failed);
    }
}
