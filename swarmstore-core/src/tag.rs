//! Upload tags
//!
//! A tag is a server-side counter object tracking one upload's replication
//! into the network: created before the upload, bound into each chunk
//! request via the `Swarm-Tag` header, then polled until `synced` catches
//! up with `total`. The node owns tag retention; there is no delete call.

use serde::{Deserialize, Serialize};

/// Sync counters for one upload tag
///
/// Decoded directly from the node's tag object; fields the client does not
/// consume (e.g. `startedAt`) are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatus {
    /// Server-assigned tag UID
    #[serde(default)]
    pub uid: u32,

    /// Chunks belonging to the tagged upload
    #[serde(default)]
    pub total: i64,

    /// Chunks processed locally by the node
    #[serde(default)]
    pub processed: i64,

    /// Chunks synced to the network
    #[serde(default)]
    pub synced: i64,
}

impl TagStatus {
    /// Whether replication of the tagged upload has completed
    pub fn is_synced(&self) -> bool {
        self.total > 0 && self.synced >= self.total
    }
}
