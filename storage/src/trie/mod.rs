//! Core types for the content-addressed radix trie.
//!
//! A trie node is either a [`Leaf`](Trie::Leaf) binding a key to a value, or
//! a [`Node`](Trie::Node) fanning out through a [`PointerBlock`] of 256
//! optional child hashes, one per possible value of the next byte of the
//! encoded key. Nodes are addressed by the Blake2b-256 hash of their
//! canonical byte representation and are immutable once stored; mutations
//! build fresh nodes bottom-up and publish a new root.

use std::{
    fmt::{self, Debug, Formatter},
    ops::{Index, IndexMut},
};

use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    bytesrepr::{self, FromBytes, ToBytes, U8_SERIALIZED_LENGTH},
    shared::newtypes::Blake2bHash,
};


/// The number of slots in a [`PointerBlock`]. The trie consumes one byte of
/// the encoded key per level, giving this fan-out.
pub const RADIX: usize = 256;

const LEAF_TAG: u8 = 0;
const NODE_TAG: u8 = 1;

/// A fixed-width block of `RADIX` optional child hashes, indexed by one byte
/// of an encoded key.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PointerBlock([Option<Blake2bHash>; RADIX]);

impl PointerBlock {
    /// Creates a block with all slots vacant.
    pub fn new() -> Self {
        PointerBlock([None; RADIX])
    }

    /// Creates a block from occupied slots.
    pub fn from_indexed_pointers(indexed_pointers: &[(u8, Blake2bHash)]) -> Self {
        let mut ret = PointerBlock::new();
        for (index, hash) in indexed_pointers {
            ret.0[usize::from(*index)] = Some(*hash);
        }
        ret
    }

    /// Returns a copy of this block with the given slots replaced.
    ///
    /// All replacements are applied to `self`, not to intermediate copies,
    /// so the order of the pairs is irrelevant as long as their indices are
    /// distinct.
    pub fn with_pointers(&self, indexed_pointers: &[(u8, Option<Blake2bHash>)]) -> Self {
        let mut ret = *self;
        for (index, maybe_hash) in indexed_pointers {
            ret.0[usize::from(*index)] = *maybe_hash;
        }
        ret
    }

    /// Returns the number of occupied slots.
    pub fn child_count(&self) -> usize {
        self.0.iter().filter(|maybe_hash| maybe_hash.is_some()).count()
    }
}

impl Default for PointerBlock {
    fn default() -> Self {
        PointerBlock::new()
    }
}

impl Index<usize> for PointerBlock {
    type Output = Option<Blake2bHash>;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        let PointerBlock(dat) = self;
        &dat[index]
    }
}

impl IndexMut<usize> for PointerBlock {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let PointerBlock(dat) = self;
        &mut dat[index]
    }
}

impl Debug for PointerBlock {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let mut debug_map = formatter.debug_map();
        for (index, maybe_hash) in self.0.iter().enumerate() {
            if let Some(hash) = maybe_hash {
                debug_map.entry(&index, hash);
            }
        }
        debug_map.finish()
    }
}

impl ToBytes for PointerBlock {
    fn to_bytes(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        let mut buffer = bytesrepr::allocate_buffer(self)?;
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn serialized_length(&self) -> usize {
        self.0
            .iter()
            .map(|maybe_hash| maybe_hash.serialized_length())
            .sum()
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), bytesrepr::Error> {
        for maybe_hash in self.0.iter() {
            maybe_hash.write_bytes(writer)?;
        }
        Ok(())
    }
}

impl FromBytes for PointerBlock {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let mut ret = PointerBlock::new();
        let mut remainder = bytes;
        for index in 0..RADIX {
            let (maybe_hash, rem) = Option::<Blake2bHash>::from_bytes(remainder)?;
            ret.0[index] = maybe_hash;
            remainder = rem;
        }
        Ok((ret, remainder))
    }
}

// Pointer blocks are serialized sparsely: occupied slots and their indices
// only.
impl Serialize for PointerBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let occupied = self.child_count();
        let mut map = serializer.serialize_map(Some(occupied))?;
        for (index, maybe_hash) in self.0.iter().enumerate() {
            if let Some(hash) = maybe_hash {
                map.serialize_entry(&index, hash)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PointerBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PointerBlockVisitor;

        impl<'de> Visitor<'de> for PointerBlockVisitor {
            type Value = PointerBlock;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of slot indices to hashes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut ret = PointerBlock::new();
                while let Some((index, hash)) = access.next_entry::<usize, Blake2bHash>()? {
                    if index >= RADIX {
                        return Err(de::Error::custom(format!(
                            "invalid pointer block index: {}",
                            index
                        )));
                    }
                    ret.0[index] = Some(hash);
                }
                Ok(ret)
            }
        }

        deserializer.deserialize_map(PointerBlockVisitor)
    }
}

/// Represents a node in the radix trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trie<K, V> {
    /// A terminal entry binding `key` to `value`.
    Leaf {
        /// The key under which the value is stored.
        key: K,
        /// The stored value; opaque to the trie.
        value: V,
    },
    /// An internal node fanning out through a pointer block.
    Node {
        /// The block of optional child hashes.
        pointer_block: Box<PointerBlock>,
    },
}

impl<K, V> Trie<K, V> {
    fn tag(&self) -> u8 {
        match self {
            Trie::Leaf { .. } => LEAF_TAG,
            Trie::Node { .. } => NODE_TAG,
        }
    }

    /// Constructs a leaf.
    pub fn leaf(key: K, value: V) -> Self {
        Trie::Leaf { key, value }
    }

    /// Constructs a node whose pointer block holds the given children.
    pub fn node(indexed_pointers: &[(u8, Blake2bHash)]) -> Self {
        let pointer_block = PointerBlock::from_indexed_pointers(indexed_pointers);
        let pointer_block = Box::new(pointer_block);
        Trie::Node { pointer_block }
    }

    /// Returns the key of a leaf.
    pub fn key(&self) -> Option<&K> {
        match self {
            Trie::Leaf { key, .. } => Some(key),
            Trie::Node { .. } => None,
        }
    }
}

impl<K: ToBytes, V: ToBytes> Trie<K, V> {
    /// Returns the content address of this node: the Blake2b-256 digest of
    /// its canonical byte representation.
    pub fn trie_hash(&self) -> Result<Blake2bHash, bytesrepr::Error> {
        self.to_bytes().map(|bytes| Blake2bHash::new(&bytes))
    }
}

impl<K: ToBytes, V: ToBytes> ToBytes for Trie<K, V> {
    fn to_bytes(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        let mut buffer = bytesrepr::allocate_buffer(self)?;
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn serialized_length(&self) -> usize {
        U8_SERIALIZED_LENGTH
            + match self {
                Trie::Leaf { key, value } => key.serialized_length() + value.serialized_length(),
                Trie::Node { pointer_block } => pointer_block.serialized_length(),
            }
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), bytesrepr::Error> {
        writer.push(self.tag());
        match self {
            Trie::Leaf { key, value } => {
                key.write_bytes(writer)?;
                value.write_bytes(writer)?;
            }
            Trie::Node { pointer_block } => pointer_block.write_bytes(writer)?,
        }
        Ok(())
    }
}

impl<K: FromBytes, V: FromBytes> FromBytes for Trie<K, V> {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let (tag, remainder) = u8::from_bytes(bytes)?;
        match tag {
            LEAF_TAG => {
                let (key, remainder) = K::from_bytes(remainder)?;
                let (value, remainder) = V::from_bytes(remainder)?;
                Ok((Trie::Leaf { key, value }, remainder))
            }
            NODE_TAG => {
                let (pointer_block, remainder) = PointerBlock::from_bytes(remainder)?;
                let pointer_block = Box::new(pointer_block);
                Ok((Trie::Node { pointer_block }, remainder))
            }
            _ => Err(bytesrepr::Error::Formatting),
        }
    }
}
