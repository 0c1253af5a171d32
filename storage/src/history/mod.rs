//! The versioned history of the tuple space.
//!
//! A history pairs a trie store with a *working root*: a single-slot cell
//! naming the current live version of the trie. Writers [`take`] the cell,
//! perform one write transaction, and [`put`] a root back - the new one on
//! success, the original on every failure - so at most one insertion is in
//! flight at a time and the cell is vacant only while its holder is running.
//! Readers snapshot the cell without taking it and see a consistent version:
//! nodes are immutable once stored, so everything reachable from a published
//! root stays intact.
//!
//! [`take`]: crate::shared::sync_cell::SyncCell::take
//! [`put`]: crate::shared::sync_cell::SyncCell::put

pub mod in_memory;
pub mod lmdb;

use tracing::error;

use crate::{
    bytesrepr::{self, FromBytes, ToBytes},
    shared::{newtypes::Blake2bHash, sync_cell::SyncCell},
    store::Store,
    transaction_source::{Transaction, TransactionSource},
    trie_store::{
        operations::{self, read, write, InsertError, LookupError, ReadResult, WriteResult},
        TrieStore,
    },
};


/// Default maximum size (in bytes) of the LMDB map.
pub const DEFAULT_MAX_DB_SIZE: usize = 483_183_820_800;

/// Default maximum number of readers of the LMDB environment.
pub const DEFAULT_MAX_READERS: u32 = 512;

/// The working root: a single-slot cell naming the current live version of
/// the trie.
pub type WorkingRoot = SyncCell<Blake2bHash>;

/// Creates an empty root node, writes it under its hash, and publishes that
/// hash as the working root.
///
/// Any previously published working root is overwritten; the nodes reachable
/// from it remain in the store.
pub fn initialize<'a, K, V, R, S, E>(
    environment: &'a R,
    store: &S,
    working_root: &WorkingRoot,
) -> Result<Blake2bHash, E>
where
    K: ToBytes,
    V: ToBytes,
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<R::Error>,
    E: From<R::Error> + From<S::Error> + From<bytesrepr::Error>,
{
    let (root_hash, root) = operations::create_hashed_empty_trie::<K, V>()?;
    let mut txn = environment.create_read_write_txn()?;
    store.put(&mut txn, &root_hash, &root)?;
    txn.commit()?;
    working_root.put(root_hash);
    Ok(root_hash)
}

/// Returns the value bound to `key` under the current working root, if any.
///
/// The root is snapshotted without taking the cell, so lookups never block
/// behind writers beyond the snapshot itself.
pub fn lookup<'a, K, V, R, S, E>(
    environment: &'a R,
    store: &S,
    working_root: &WorkingRoot,
    key: &K,
) -> Result<Option<V>, E>
where
    K: ToBytes + FromBytes + Eq,
    V: FromBytes,
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<R::Error>,
    E: From<R::Error> + From<S::Error> + From<bytesrepr::Error> + From<LookupError>,
{
    let root = working_root.read();
    let txn = environment.create_read_txn()?;
    let result = read::<K, V, _, _, E>(&txn, store, &root, key)?;
    txn.commit()?;
    Ok(match result {
        ReadResult::Found(value) => Some(value),
        ReadResult::NotFound | ReadResult::RootNotFound => None,
    })
}

/// Binds `key` to `value` in the trie, publishing the resulting root as the
/// new working root and returning it.
///
/// Re-inserting an already present pair publishes the unchanged root.
/// Inserting an existing key with a different value fails with
/// [`InsertError::KeyAlreadyBound`].
///
/// The working root is taken for the duration of the write transaction,
/// serializing insertions, and is refilled on every exit path - with the
/// original root on failure - so a failed writer never leaves the store
/// locked.
pub fn insert<'a, K, V, R, S, E>(
    environment: &'a R,
    store: &S,
    working_root: &WorkingRoot,
    key: &K,
    value: &V,
) -> Result<Blake2bHash, E>
where
    K: ToBytes + FromBytes + Clone + Eq,
    V: ToBytes + FromBytes + Clone + Eq,
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<R::Error>,
    E: From<R::Error>
        + From<S::Error>
        + From<bytesrepr::Error>
        + From<LookupError>
        + From<InsertError>,
{
    let initial_root = working_root.take();
    match insert_under_root(environment, store, &initial_root, key, value) {
        Ok(WriteResult::Written(new_root)) => {
            working_root.put(new_root);
            Ok(new_root)
        }
        Ok(WriteResult::AlreadyExists) => {
            working_root.put(initial_root);
            Ok(initial_root)
        }
        Ok(WriteResult::RootNotFound) => {
            error!(?initial_root, "working root missing from the trie store");
            working_root.put(initial_root);
            Err(LookupError(initial_root).into())
        }
        Err(error) => {
            working_root.put(initial_root);
            Err(error)
        }
    }
}

/// Runs a single write under its own transaction, committed only on success.
fn insert_under_root<'a, K, V, R, S, E>(
    environment: &'a R,
    store: &S,
    root: &Blake2bHash,
    key: &K,
    value: &V,
) -> Result<WriteResult, E>
where
    K: ToBytes + FromBytes + Clone + Eq,
    V: ToBytes + FromBytes + Clone + Eq,
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<K, V>,
    S::Error: From<R::Error>,
    E: From<R::Error>
        + From<S::Error>
        + From<bytesrepr::Error>
        + From<LookupError>
        + From<InsertError>,
{
    let mut txn = environment.create_read_write_txn()?;
    // An error drops the transaction, aborting it.
    let result = write::<K, V, _, _, E>(&mut txn, store, root, key, value)?;
    txn.commit()?;
    Ok(result)
}