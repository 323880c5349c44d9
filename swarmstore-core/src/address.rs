//! Swarm addresses
//!
//! A reference into the storage network is the 32-byte hash of the content
//! it points at, printed as hex. Two sentinel states exist and must never be
//! sent to the network as a reference: the all-zero address ("no address")
//! and the empty address (zero-length backing data).

use crate::error::{Result, SwarmstoreError};
use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of a full content-hash address
pub const ADDRESS_LENGTH: usize = 32;

/// Content-addressed reference into the storage network
///
/// Wire representation (JSON and URL paths) is the lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address(Bytes);

impl Address {
    /// Create an address from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The all-zero sentinel address ("no address")
    pub fn zero() -> Self {
        Self(Bytes::from_static(&[0u8; ADDRESS_LENGTH]))
    }

    /// An address with no backing data
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| SwarmstoreError::InvalidAddress(e.to_string()))?;
        Ok(Self(Bytes::from(bytes)))
    }

    /// Whether this is the all-zero sentinel
    pub fn is_zero(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == 0)
    }

    /// Whether the backing data is zero-length
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this address may be sent to the network as a reference
    pub fn is_valid_reference(&self) -> bool {
        !self.is_zero() && !self.is_empty()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to the lowercase hex wire form
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Address({})", &hex[..hex.len().min(8)])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = SwarmstoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let addr = Address::new(vec![0xaa; ADDRESS_LENGTH]);
        let hex = addr.to_hex();
        assert_eq!(hex.len(), ADDRESS_LENGTH * 2);
        let recovered = Address::from_hex(&hex).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn test_zero_and_empty_are_distinct() {
        let zero = Address::zero();
        let empty = Address::empty();

        assert!(zero.is_zero());
        assert!(!zero.is_empty());
        assert!(empty.is_empty());
        assert!(!empty.is_zero());
        assert_ne!(zero, empty);

        assert!(!zero.is_valid_reference());
        assert!(!empty.is_valid_reference());
        assert!(Address::new(vec![1u8; ADDRESS_LENGTH]).is_valid_reference());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::new(vec![0x01; ADDRESS_LENGTH]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(ADDRESS_LENGTH)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            Address::from_hex("not-hex"),
            Err(SwarmstoreError::InvalidAddress(_))
        ));
    }
}
