//! In-memory history, intended to be used for testing.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    bytesrepr::{FromBytes, ToBytes},
    error::in_memory::Error,
    history::{self, WorkingRoot},
    shared::newtypes::Blake2bHash,
    transaction_source::in_memory::InMemoryEnvironment,
    trie_store::in_memory::InMemoryTrieStore,
};

/// An in-memory history of the tuple space.
#[derive(Debug)]
pub struct InMemoryHistory<K, V> {
    environment: Arc<InMemoryEnvironment>,
    trie_store: Arc<InMemoryTrieStore>,
    working_root: WorkingRoot,
    phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> InMemoryHistory<K, V>
where
    K: ToBytes + FromBytes + Clone + Eq,
    V: ToBytes + FromBytes + Clone + Eq,
{
    /// Creates a history whose working root is a known hash.
    pub fn new(
        environment: Arc<InMemoryEnvironment>,
        trie_store: Arc<InMemoryTrieStore>,
        root_hash: Blake2bHash,
    ) -> Self {
        InMemoryHistory {
            environment,
            trie_store,
            working_root: WorkingRoot::new(root_hash),
            phantom: PhantomData,
        }
    }

    /// Creates a history over an empty trie, writing the empty root node to
    /// the store and publishing its hash.
    pub fn empty() -> Result<Self, Error> {
        let environment = Arc::new(InMemoryEnvironment::new());
        let trie_store = Arc::new(InMemoryTrieStore::new(&environment, None));
        let ret = InMemoryHistory {
            environment,
            trie_store,
            working_root: WorkingRoot::vacant(),
            phantom: PhantomData,
        };
        ret.initialize()?;
        Ok(ret)
    }

    /// Resets the working root to the empty trie.
    pub fn initialize(&self) -> Result<Blake2bHash, Error> {
        history::initialize::<K, V, _, _, Error>(
            self.environment.as_ref(),
            self.trie_store.as_ref(),
            &self.working_root,
        )
    }

    /// Returns the value bound to `key` under the current working root.
    pub fn lookup(&self, key: &K) -> Result<Option<V>, Error> {
        history::lookup::<K, V, _, _, Error>(
            self.environment.as_ref(),
            self.trie_store.as_ref(),
            &self.working_root,
            key,
        )
    }

    /// Binds `key` to `value`, publishing and returning the new working
    /// root.
    pub fn insert(&self, key: &K, value: &V) -> Result<Blake2bHash, Error> {
        history::insert::<K, V, _, _, Error>(
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
