//! Operations over a trie store: reading keys and radix-splitting writes.
//!
//! Both operations descend along the byte path given by a key's canonical
//! encoding. All keys used with one trie must share the same encoded length,
//! which bounds the descent depth; the store trusts its callers on this.
//!
//! A write never modifies a stored node. It builds the replacement nodes for
//! the touched path bottom-up, stores each under its hash, and returns the
//! hash of the last one as the new root. Unchanged subtrees are shared
//! between the old and new roots.

use tracing::error;

use crate::{
    bytesrepr::{self, FromBytes, ToBytes},
    shared::newtypes::Blake2bHash,
    store::Store,
    transaction_source::{Readable, Writable},
    trie::{PointerBlock, Trie},
    trie_store::TrieStore,
};

#[cfg(test)]
mod tests;

/// A missing trie node while following a pointer that must resolve.
///
/// Every hash held by a reachable pointer block names a node the store is
/// required to contain; failing to find one means the store is corrupt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("trie node not found: {0:?}")]
pub struct LookupError(pub Blake2bHash);

/// Insertions the trie core refuses to perform.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InsertError {
    /// The key is already bound to a different value. Rebinding a key is
    /// left to higher layers, which must delete and re-insert out-of-band.
    #[error("key is already bound to a different value")]
    KeyAlreadyBound,

    /// Two distinct keys of equal encoded length shared their entire paths.
    #[error("shared key prefix as long as the keys themselves")]
    SharedPrefixTooLong,
}

/// The result of reading a key from a trie.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadResult<V> {
    /// The key was bound to this value.
    Found(V),
    /// The key is not bound.
    NotFound,
    /// The root to read from was not found.
    RootNotFound,
}

impl<V> ReadResult<V> {
    /// Returns `true` if the result is a `Found` variant.
    pub fn is_found(&self) -> bool {
        matches!(self, ReadResult::Found(_))
    }
}

/// The result of writing a key-value pair into a trie.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// The hash of the new root, under which the pair is bound.
    Written(Blake2bHash),
    /// The exact key-value pair was already present.
    AlreadyExists,
    /// The root to write into was not found.
    RootNotFound,
}

/// Creates the node an empty trie consists of, paired with its hash.
pub fn create_hashed_empty_trie<K: ToBytes, V: ToBytes>(
) -> Result<(Blake2bHash, Trie<K, V>), bytesrepr::Error> {
    let empty_trie = Trie::<K, V>::node(&[]);
    let empty_trie_hash = empty_trie.trie_hash()?;
    Ok((empty_trie_hash, empty_trie))
}

/// Returns a value from the corresponding key at a given root.
pub fn read<K, V, T, S, E>(
    txn: &T,
    store: &S,
    root: &Blake2bHash,
    key: &K,
) -> Result<ReadResult<V>, E>
where
    K: ToBytes + FromBytes + Eq,
    V: FromBytes,
    T: Readable<Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<T::Error>,
    E: From<S::Error> + From<bytesrepr::Error> + From<LookupError>,
{
    let path: Vec<u8> = key.to_bytes()?;

    let mut current: Trie<K, V> = match store.get(txn, root)? {
        Some(root_trie) => root_trie,
        None => return Ok(ReadResult::RootNotFound),
    };
    let mut depth: usize = 0;

    loop {
        match current {
            Trie::Leaf {
                key: leaf_key,
                value: leaf_value,
            } => {
                return if leaf_key == *key {
                    Ok(ReadResult::Found(leaf_value))
                } else {
                    Ok(ReadResult::NotFound)
                };
            }
            Trie::Node { pointer_block } => {
                let index = match path.get(depth) {
                    Some(byte) => *byte,
                    None => return Ok(ReadResult::NotFound),
                };
                let child_hash = match pointer_block[usize::from(index)] {
                    Some(child_hash) => child_hash,
                    None => return Ok(ReadResult::NotFound),
                };
                current = match store.get(txn, &child_hash)? {
                    Some(child) => child,
                    None => {
                        error!(?child_hash, "trie pointer to missing node");
                        return Err(LookupError(child_hash).into());
                    }
                };
                depth += 1;
            }
        }
    }
}

/// The internal nodes traversed on the way to a tip, each paired with the
/// index of the slot the descent left it through, in root-first order.
type Parents = Vec<(u8, PointerBlock)>;

/// The terminal node of a descent, together with the parents traversed.
struct TrieScan<K, V> {
    /// Either a leaf, or a node whose slot for the next path byte is vacant.
    tip: Trie<K, V>,
    parents: Parents,
}

/// Walks the trie from `root` along `path`, accumulating the internal nodes
/// traversed. The walk stops at a leaf, or at a node whose slot for the next
/// path byte is vacant; the depth of the tip equals `parents.len()`.
fn scan<K, V, T, S, E>(
    txn: &T,
    store: &S,
    path: &[u8],
    root: Trie<K, V>,
) -> Result<TrieScan<K, V>, E>
where
    K: FromBytes,
    V: FromBytes,
    T: Readable<Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<T::Error>,
    E: From<S::Error> + From<LookupError>,
{
    let mut current = root;
    let mut parents: Parents = Vec::new();

    loop {
        let pointer_block = match current {
            leaf @ Trie::Leaf { .. } => {
                return Ok(TrieScan { tip: leaf, parents });
            }
            Trie::Node { pointer_block } => pointer_block,
        };
        let index = path[parents.len()];
        match pointer_block[usize::from(index)] {
            Some(child_hash) => {
                current = match store.get(txn, &child_hash)? {
                    Some(child) => child,
                    None => {
                        error!(?child_hash, "trie pointer to missing node");
                        return Err(LookupError(child_hash).into());
                    }
                };
                parents.push((index, *pointer_block));
            }
            None => {
                return Ok(TrieScan {
                    tip: Trie::Node { pointer_block },
                    parents,
                });
            }
        }
    }
}

/// Returns the length of the longest common prefix of two paths.
fn common_prefix_length(ls: &[u8], rs: &[u8]) -> usize {
    ls.iter().zip(rs).take_while(|(l, r)| l == r).count()
}

/// Rewrites each parent's slot to point at the hash of the node below it,
/// bottom-up, starting from `head`.
///
/// The returned chain begins with `head` and proceeds upward; the hash of
/// its last element names the new root.
fn rehash<K, V>(
    head: Trie<K, V>,
    parents: Parents,
) -> Result<Vec<(Blake2bHash, Trie<K, V>)>, bytesrepr::Error>
where
    K: ToBytes,
    V: ToBytes,
{
    let mut ret = Vec::with_capacity(1 + parents.len());
    let mut last_hash = head.trie_hash()?;
    ret.push((last_hash, head));

    for (index, pointer_block) in parents.into_iter().rev() {
        let node = Trie::Node {
            pointer_block: Box::new(pointer_block.with_pointers(&[(index, Some(last_hash))])),
        };
        last_hash = node.trie_hash()?;
        ret.push((last_hash, node));
    }
    Ok(ret)
}

/// Writes a key-value pair into the trie at a given root, returning the hash
/// of the new root.
///
/// Nothing reachable from `root` is modified; the caller decides whether and
/// when to publish the returned hash.
pub fn write<K, V, T, S, E>(
    txn: &mut T,
    store: &S,
    root: &Blake2bHash,
    key: &K,
    value: &V,
) -> Result<WriteResult, E>
where
    K: ToBytes + FromBytes + Clone + Eq,
    V: ToBytes + FromBytes + Clone + Eq,
    T: Readable<Handle = S::Handle> + Writable<Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<T::Error>,
    E: From<S::Error> + From<bytesrepr::Error> + From<LookupError> + From<InsertError>,
{
    let root_trie: Trie<K, V> = match store.get(txn, root)? {
        Some(root_trie) => root_trie,
        None => return Ok(WriteResult::RootNotFound),
    };

    let path: Vec<u8> = key.to_bytes()?;
    let new_leaf = Trie::Leaf {
        key: key.to_owned(),
        value: value.to_owned(),
    };
    let new_leaf_hash = new_leaf.trie_hash()?;

    let TrieScan { tip, parents } = scan::<K, V, T, S, E>(txn, store, &path, root_trie)?;

    let new_elements: Vec<(Blake2bHash, Trie<K, V>)> = match tip {
        leaf @ Trie::Leaf { .. } if leaf == new_leaf => {
            return Ok(WriteResult::AlreadyExists);
        }
        Trie::Leaf {
            key: existing_key, ..
        } if existing_key == *key => {
            return Err(InsertError::KeyAlreadyBound.into());
        }
        Trie::Leaf {
            key: existing_key,
            value: existing_value,
        } => {
            // The tip is a leaf for a different key sharing a prefix of its
            // path with ours. Replace it with a node at the first diverging
            // byte holding both leaves, threaded onto the existing parents
            // through a chain of fresh single-child nodes covering the
            // shared bytes the parents do not already cover.
            let existing_path = existing_key.to_bytes()?;
            let shared_length = common_prefix_length(&path, &existing_path);
            if shared_length >= path.len() {
                // Distinct keys of equal encoded length diverge before their
                // paths end.
                return Err(InsertError::SharedPrefixTooLong.into());
            }
            debug_assert!(
                parents.len() <= shared_length,
                "descent cannot outrun the shared prefix"
            );
            let new_index = path[shared_length];
            let existing_index = existing_path[shared_length];
            let existing_leaf = Trie::Leaf {
                key: existing_key,
                value: existing_value,
            };
            let existing_leaf_hash = existing_leaf.trie_hash()?;
            let head: Trie<K, V> = Trie::node(&[
                (new_index, new_leaf_hash),
                (existing_index, existing_leaf_hash),
            ]);
            let mut nodes = parents;
            for depth in nodes.len()..shared_length {
                nodes.push((path[depth], PointerBlock::new()));
            }
            rehash(head, nodes)?
        }
        Trie::Node { pointer_block } => {
            // The tip has a vacant slot for our next path byte; point it at
            // the new leaf.
            let index = path[parents.len()];
            let head = Trie::Node {
                pointer_block: Box::new(
                    pointer_block.with_pointers(&[(index, Some(new_leaf_hash))]),
                ),
            };
            rehash(head, parents)?
        }
    };

    store.put(txn, &new_leaf_hash, &new_leaf)?;
    let mut new_root_hash = *root;
    for (hash, trie) in new_elements.iter() {
        store.put(txn, hash, trie)?;
        new_root_hash = *hash;
    }
    Ok(WriteResult::Written(new_root_hash))
}
