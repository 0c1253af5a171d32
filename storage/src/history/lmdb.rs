//! LMDB-backed history.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    bytesrepr::{FromBytes, ToBytes},
    error,
    history::{self, WorkingRoot},
    shared::newtypes::Blake2bHash,
    transaction_source::lmdb::LmdbEnvironment,
    trie_store::lmdb::LmdbTrieStore,
};

/// An LMDB-backed history of the tuple space.
///
/// Cheap to share across threads behind an [`Arc`]; insertions are
/// serialized by the working root, lookups run concurrently.
#[derive(Debug)]
pub struct LmdbHistory<K, V> {
    environment: Arc<LmdbEnvironment>,
    trie_store: Arc<LmdbTrieStore>,
    working_root: WorkingRoot,
    phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> LmdbHistory<K, V>
where
    K: ToBytes + FromBytes + Clone + Eq,
    V: ToBytes + FromBytes + Clone + Eq,
{
    /// Creates a history whose working root is a known hash, e.g. one
    /// persisted by a higher layer across restarts.
    pub fn new(
        environment: Arc<LmdbEnvironment>,
        trie_store: Arc<LmdbTrieStore>,
        root_hash: Blake2bHash,
    ) -> Self {
        LmdbHistory {
            environment,
            trie_store,
            working_root: WorkingRoot::new(root_hash),
            phantom: PhantomData,
        }
    }

    /// Creates a history over an empty trie, writing the empty root node to
    /// the store and publishing its hash.
    pub fn empty(
        environment: Arc<LmdbEnvironment>,
        trie_store: Arc<LmdbTrieStore>,
    ) -> Result<Self, error::Error> {
        let ret = LmdbHistory {
            environment,
            trie_store,
            working_root: WorkingRoot::vacant(),
            phantom: PhantomData,
        };
        ret.initialize()?;
        Ok(ret)
    }

    /// Resets the working root to the empty trie. Previously published
    /// versions remain in the store.
    pub fn initialize(&self) -> Result<Blake2bHash, error::Error> {
        history::initialize::<K, V, _, _, error::Error>(
            self.environment.as_ref(),
            self.trie_store.as_ref(),
            &self.working_root,
        )
    }

    /// Returns the value bound to `key` under the current working root.
    pub fn lookup(&self, key: &K) -> Result<Option<V>, error::Error> {
        history::lookup::<K, V, _, _, error::Error>(
            self.environment.as_ref(),
            self.trie_store.as_ref(),
            &self.working_root,
            key,
        )
    }

    /// Binds `key` to `value`, publishing and returning the new working
    /// root.
    pub fn insert(&self, key: &K, value: &V) -> Result<Blake2bHash, error::Error> {
        history::insert::<K, V, _, _, error::Error>(
            self.environment.as_ref(),
            self.trie_store.as_ref(),
            &self.working_root,
            key,
            value,
        )
    }

    /// Returns the working root cell.
    pub fn working_root(&self) -> &WorkingRoot {
        &self.working_root
    }

    /// Returns the current working root hash, waiting out any in-flight
    /// insertion.
    pub fn working_root_hash(&self) -> Blake2bHash {
        self.working_root.read()
    }
}
