//! Simulation tuning.
//!
//! Every constant the tick loop depends on lives in [`SimConfig`] so that a
//! mission can override it from JSON. Missing fields fall back to defaults.

use crate::components::Faction;
use crate::error::SimResult;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for the mission simulation.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (1/60 = one tick per rendered frame at 60 Hz).
    pub fixed_timestep: f32,
    /// Faction controlled by the player; win/lose is judged from its side.
    pub player_faction: Faction,
    /// Funds every faction starts the mission with.
    pub starting_funds: u32,
    /// Funds credited to every faction each tick.
    pub income_per_tick: u32,
    /// Ticks a sunk ship spends exploding before it leaves the roster.
    pub explosion_frames: u32,
    /// A wake trail is dropped behind a moving ship every this many ticks.
    pub trail_interval: u64,
    /// Lifetime of a trail in ticks.
    pub trail_life: u32,
    /// Ballistics and damage tuning.
    pub combat: CombatConfig,
    /// Steering tuning.
    pub steering: SteeringConfig,
    /// Ticks between computer handler decisions.
    pub ai_think_interval: u64,
    /// Seed for spread and critical rolls.
    pub rng_seed: u64,
    /// Compute paths on the calling thread instead of in the background.
    pub synchronous_paths: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            player_faction: Faction::BLUE,
            starting_funds: 2000,
            income_per_tick: 1,
            explosion_frames: 45,
            trail_interval: 6,
            trail_life: 90,
            combat: CombatConfig::default(),
            steering: SteeringConfig::default(),
            ai_think_interval: 120,
            rng_seed: 0x1f0e_51de,
            synchronous_paths: false,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON. Absent fields keep their defaults.
    pub fn from_json_str(data: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Ballistics and damage constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Calibres (mm) at or below this are light guns.
    pub light_calibre: f32,
    /// Calibres (mm) at or below this (and above light) are medium guns.
    pub medium_calibre: f32,
    /// Max range-utilization for a light gun shot to be direct fire.
    pub light_direct_ratio: f32,
    /// Max range-utilization for a medium gun shot to be direct fire.
    pub medium_direct_ratio: f32,
    /// Max range-utilization for a heavy gun shot to be direct fire.
    pub heavy_direct_ratio: f32,
    /// A critical roll below this multiplies damage by 3.
    pub critical_x3_threshold: f32,
    /// A critical roll below this multiplies damage by 10.
    pub critical_x10_threshold: f32,
    /// Extra ticks of life given to direct-fire ordnance past its aim point.
    pub direct_life_slack: u32,
    /// Radius around the aim point within which arcing ordnance has arrived.
    pub arrival_epsilon: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            light_calibre: 155.0,
            medium_calibre: 283.0,
            light_direct_ratio: 0.5,
            medium_direct_ratio: 0.35,
            heavy_direct_ratio: 0.2,
            critical_x3_threshold: 0.08,
            critical_x10_threshold: 0.01,
            direct_life_slack: 10,
            arrival_epsilon: 0.05,
        }
    }
}

/// Steering constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Distance within which a ship has arrived at its target.
    pub arrive_tolerance: f32,
    /// Deceleration starts at this many hull lengths from a final target.
    pub decel_hull_lengths: f32,
    /// Within this many hull lengths a misaligned ship turns in place.
    pub turn_in_place_hull_lengths: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            arrive_tolerance: 0.2,
            decel_hull_lengths: 1.5,
            turn_in_place_hull_lengths: 1.0,
        }
    }
}
