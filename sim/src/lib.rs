//! Iron Tide - Simulation Core
//!
//! A deterministic, fixed-timestep naval battle simulation: fleets steer
//! through an archipelago, trade gunfire and torpedoes, and reinforce from
//! shipyards. Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod catalog;
pub mod cheats;
pub mod components;
pub mod config;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod handlers;
pub mod logging;
pub mod pathfinding;
pub mod spatial;
pub mod systems;
pub mod terrain;
pub mod world;

pub use api::Mission;
pub use catalog::{Catalog, CatalogResource};
pub use components::*;
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use handlers::{HumanHandler, InputHandler};
pub use logging::init_tracing;
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use terrain::{TerrainClass, TerrainGrid, TerrainResource, TerrainSnapshot};
pub use world::{SimEvent, Snapshot};
