//! Swarmstore Core Library
//!
//! Shared data model for the swarmstore client crates:
//! - Content-addressed references ([`Address`]) and chunks ([`Chunk`])
//! - Erasure-coding redundancy levels requested per upload
//! - Upload tag sync counters ([`TagStatus`])
//! - Unified error taxonomy ([`SwarmstoreError`])

pub mod address;
pub mod chunk;
pub mod error;
pub mod redundancy;
pub mod tag;

pub use address::{Address, ADDRESS_LENGTH};
pub use chunk::Chunk;
pub use error::{Result, SwarmstoreError};
pub use redundancy::RedundancyLevel;
pub use tag::TagStatus;
