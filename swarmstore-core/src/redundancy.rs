//! Erasure-coding redundancy levels
//!
//! The level requested for an upload is an instruction to the network's
//! redundancy policy; the client never erasure-codes locally. On the wire
//! the level is the numeric string `"0"` through `"4"`, and an absent value
//! means "none".

use crate::error::SwarmstoreError;
use std::fmt;
use std::str::FromStr;

/// Requested erasure-coding strength for network-side durability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedundancyLevel {
    #[default]
    Off,
    Medium,
    Strong,
    Insane,
    Paranoid,
}

impl RedundancyLevel {
    /// Wire form sent in the `Swarm-Redundancy-Level` header
    pub fn as_str(&self) -> &'static str {
        match self {
            RedundancyLevel::Off => "0",
            RedundancyLevel::Medium => "1",
            RedundancyLevel::Strong => "2",
            RedundancyLevel::Insane => "3",
            RedundancyLevel::Paranoid => "4",
        }
    }
}

impl fmt::Display for RedundancyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RedundancyLevel {
    type Err = SwarmstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(RedundancyLevel::Off),
            "1" => Ok(RedundancyLevel::Medium),
            "2" => Ok(RedundancyLevel::Strong),
            "3" => Ok(RedundancyLevel::Insane),
            "4" => Ok(RedundancyLevel::Paranoid),
            other => Err(SwarmstoreError::Decode(format!(
                "unknown redundancy level: {other}"
            ))),
        }
    }
}
