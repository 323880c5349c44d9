//! Chunk types
//!
//! A chunk is the smallest content-addressed unit in the network. The
//! invariant is that the address is the network's digest of the data; the
//! client does not verify this locally, it trusts what it uploads and what
//! the node returns on download.

use crate::address::Address;
use bytes::Bytes;

/// An immutable byte payload keyed by its content address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    address: Address,
    data: Bytes,
}

impl Chunk {
    /// Pair an address with its payload
    pub fn new(address: Address, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }

    /// The content address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The raw payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ADDRESS_LENGTH;

    #[test]
    fn test_chunk_accessors() {
        let addr = Address::new(vec![0x0f; ADDRESS_LENGTH]);
        let chunk = Chunk::new(addr.clone(), Bytes::from_static(b"test data"));

        assert_eq!(chunk.address(), &addr);
        assert_eq!(chunk.data().as_ref(), b"test data");
        assert_eq!(chunk.size(), 9);
    }
}
