//! Error types for the simulation core.
//!
//! Stale references (an instruction whose ship has sunk) and unreachable
//! paths are not errors; they complete the instruction silently. Everything
//! here is either a data error caught while loading, or an execution error
//! that gets logged and dropped by the instruction pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown {kind} template '{name}'")]
    UnknownTemplate { kind: &'static str, name: String },

    #[error("unknown ship '{0}'")]
    UnknownShip(String),

    #[error("unknown reinforce point '{0}'")]
    UnknownReinforcePoint(String),

    #[error("reinforce point '{point}' queue is full (capacity {capacity})")]
    QueueFull { point: String, capacity: usize },

    #[error("ship '{ship}' cannot be built at reinforce point '{point}'")]
    NotBuildable { point: String, ship: String },

    #[error("simulation resource '{0}' is not installed")]
    MissingResource(&'static str),

    #[error("invalid map: {0}")]
    InvalidMap(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
