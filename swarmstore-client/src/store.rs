//! Content-addressed store adapter
//!
//! A thin put/get façade over the protocol client, binding one upload tag,
//! postage batch, redundancy level and pin flag for its lifetime.

use crate::client::BeeClient;
use async_trait::async_trait;
use std::sync::Arc;
use swarmstore_core::{Address, Chunk, Result};
use tokio_util::sync::CancellationToken;

/// Generic key-addressable chunk store capability
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Fetch the chunk at an address
    async fn get(&self, cancel: &CancellationToken, address: &Address) -> Result<Chunk>;

    /// Store a chunk under its content address
    async fn put(&self, chunk: &Chunk) -> Result<()>;
}

/// Network-backed chunk store
///
/// All puts run under the one tag allocated at construction, so the
/// server-side counters accumulate across every put made through this
/// adapter, concurrent ones included.
pub struct NetworkChunkStore {
    client: Arc<BeeClient>,
    tag: u32,
    batch: String,
    redundancy: String,
    pin: bool,
}

impl NetworkChunkStore {
    /// Create the adapter, allocating its bound upload tag.
    ///
    /// Fails when tag creation fails (e.g. node unreachable); there is no
    /// lazy fallback — reconstruct the adapter to retry.
    pub async fn new(
        client: Arc<BeeClient>,
        batch: impl Into<String>,
        redundancy: impl Into<String>,
        pin: bool,
    ) -> Result<Self> {
        let tag = client.create_tag(&Address::zero()).await?;
        Ok(Self {
            client,
            tag,
            batch: batch.into(),
            redundancy: redundancy.into(),
            pin,
        })
    }

    /// The bound upload tag UID
    pub fn tag(&self) -> u32 {
        self.tag
    }
}

#[async_trait]
impl ChunkStore for NetworkChunkStore {
    async fn get(&self, cancel: &CancellationToken, address: &Address) -> Result<Chunk> {
        self.client.download_chunk(cancel, address).await
    }

    async fn put(&self, chunk: &Chunk) -> Result<()> {
        self.client
            .upload_chunk(self.tag, chunk, &self.batch, &self.redundancy, self.pin)
            .await?;
        Ok(())
    }
}
