//! Stores of trie nodes, addressed by the Blake2b-256 hashes of their byte
//! representations.

pub mod in_memory;
pub mod lmdb;
pub mod operations;

use crate::{shared::newtypes::Blake2bHash, store::Store, trie::Trie};

pub(crate) const NAME: &str = "TRIE_STORE";

/// An entity which persists instances of `Trie<K, V>` keyed by their hashes.
///
/// Writes are idempotent: a node's bytes determine its key, so overwriting
/// an entry can only rewrite the same bytes.
pub trait TrieStore<K, V>: Store<Blake2bHash, Trie<K, V>> {}
