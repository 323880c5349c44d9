//! Swarmstore Client Library
//!
//! HTTP client for a Swarm storage-network node. This crate provides:
//! - [`BeeClient`]: one HTTP round trip per network operation (chunks,
//!   blobs, collections, tags, pins, feeds)
//! - [`TarStream`]: single-pass assembler for multi-file collection uploads
//! - [`NetworkChunkStore`]: a generic put/get chunk store bound to one
//!   upload tag, postage batch, redundancy level and pin flag

pub mod client;
pub mod store;
pub mod tar;

pub use client::{BeeClient, ByteStream, NodeMode};
pub use store::{ChunkStore, NetworkChunkStore};
pub use tar::{CollectionItem, TarStream};
