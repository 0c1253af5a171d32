//! The content address used throughout the storage layer.

use std::fmt::{self, Debug, Display, Formatter};

use blake2::{
    digest::{Input, VariableOutput},
    VarBlake2b,
};
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use crate::bytesrepr::{self, FromBytes, ToBytes};

/// The number of bytes in a [`Blake2bHash`].
pub const BLAKE2B_DIGEST_LENGTH: usize = 32;

/// A 32-byte Blake2b digest.
///
/// Trie nodes are stored under the `Blake2bHash` of their canonical byte
/// representation, so a digest is both an identity and an address: equal
/// digests imply structurally equal nodes, and any node a digest was ever
/// computed for can be fetched back by it.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Blake2bHash([u8; BLAKE2B_DIGEST_LENGTH]);

impl Blake2bHash {
    /// Hashes `data`, producing a 32-byte digest.
    pub fn new(data: &[u8]) -> Self {
        let mut ret = [0u8; BLAKE2B_DIGEST_LENGTH];
        let mut hasher = VarBlake2b::new(BLAKE2B_DIGEST_LENGTH).expect("digest length is valid");
        hasher.input(data);
        hasher.variable_result(|hash| ret.clone_from_slice(hash));
        Blake2bHash(ret)
    }

    /// Returns the underlying byte array.
    pub fn value(&self) -> [u8; BLAKE2B_DIGEST_LENGTH] {
        self.0
    }

    /// Converts the underlying byte array to a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; BLAKE2B_DIGEST_LENGTH]> for Blake2bHash {
    fn from(bytes: [u8; BLAKE2B_DIGEST_LENGTH]) -> Self {
        Blake2bHash(bytes)
    }
}

impl AsRef<[u8]> for Blake2bHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for Blake2bHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Blake2bHash({})", HexFmt(&self.0))
    }
}

impl Display for Blake2bHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", HexFmt(&self.0))
    }
}

impl ToBytes for Blake2bHash {
    fn to_bytes(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        Ok(self.0.to_vec())
    }

    fn serialized_length(&self) -> usize {
        BLAKE2B_DIGEST_LENGTH
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), bytesrepr::Error> {
        writer.extend_from_slice(&self.0);
        Ok(())
    }
}

impl FromBytes for Blake2bHash {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        if bytes.len() < BLAKE2B_DIGEST_LENGTH {
            return Err(bytesrepr::Error::EarlyEndOfStream);
        }
        let (hash_bytes, remainder) = bytes.split_at(BLAKE2B_DIGEST_LENGTH);
        let mut ret = [0u8; BLAKE2B_DIGEST_LENGTH];
        ret.copy_from_slice(hash_bytes);
        Ok((Blake2bHash(ret), remainder))
    }
}
