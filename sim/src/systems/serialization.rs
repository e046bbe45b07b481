//! Serialization utilities for mission state.

use crate::world::Snapshot;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

/// Serialize a snapshot to JSON bytes.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(snapshot)
}

/// Deserialize a snapshot from JSON bytes.
pub fn snapshot_from_json(data: &[u8]) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Deserialize a snapshot from a JSON string.
pub fn snapshot_from_json_string(data: &str) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_str(data)
}

#[derive(Serialize)]
struct CrashDump<'a> {
    reason: &'a str,
    snapshot: &'a Snapshot,
}

/// Write `snapshot` and the fault that stopped the mission to a file in the
/// temp directory. Returns the file's path.
pub fn write_crash_dump(snapshot: &Snapshot, reason: &str) -> io::Result<PathBuf> {
    let path = std::env::temp_dir().join(format!(
        "irontide-crash-{}-{}.json",
        std::process::id(),
        snapshot.tick
    ));
    let body = serde_json::to_vec_pretty(&CrashDump { reason, snapshot })?;
    std::fs::write(&path, body)?;
    Ok(path)
}
