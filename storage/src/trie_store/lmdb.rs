//! An LMDB-backed trie store.
//!
//! Nodes live in a named LMDB database, keyed by their content addresses.
//! The store itself is only a handle; all reads and writes go through
//! transactions handed out by the
//! [`LmdbEnvironment`](crate::transaction_source::lmdb::LmdbEnvironment).
//!
//! # Usage
//!
//! ```
//! use lmdb::DatabaseFlags;
//! use rspace_storage::store::Store;
//! use rspace_storage::transaction_source::lmdb::LmdbEnvironment;
//! use rspace_storage::transaction_source::{Transaction, TransactionSource};
//! use rspace_storage::trie::Trie;
//! use rspace_storage::trie_store::lmdb::LmdbTrieStore;
//! use tempfile::tempdir;
//!
//! // Two channels of a tuple space, as four-byte keys, with the data
//! // stored at them.
//! let datum_a: Trie<Vec<u8>, Vec<u8>> = Trie::leaf(vec![0, 0, 0, 1], b"ping".to_vec());
//! let datum_b: Trie<Vec<u8>, Vec<u8>> = Trie::leaf(vec![0, 0, 0, 2], b"pong".to_vec());
//! let datum_a_hash = datum_a.trie_hash().unwrap();
//! let datum_b_hash = datum_b.trie_hash().unwrap();
//!
//! // An internal node routing the final key byte to each datum.
//! let node: Trie<Vec<u8>, Vec<u8>> = Trie::node(&[(1, datum_a_hash), (2, datum_b_hash)]);
//! let node_hash = node.trie_hash().unwrap();
//!
//! // The environment owns the LMDB map; the store names a database in it.
//! let storage_dir = tempdir().unwrap();
//! let map_size = 4096 * 1280; // a multiple of the OS page size
//! let env = LmdbEnvironment::new(storage_dir.path(), map_size, 8, true).unwrap();
//! let store = LmdbTrieStore::new(&env, Some("history"), DatabaseFlags::empty()).unwrap();
//!
//! // A write transaction dropped without a commit leaves no trace.
//! {
//!     let mut txn = env.create_read_write_txn().unwrap();
//!     store.put(&mut txn, &datum_a_hash, &datum_a).unwrap();
//! }
//! {
//!     let txn = env.create_read_txn().unwrap();
//!     let missing: Option<Trie<Vec<u8>, Vec<u8>>> = store.get(&txn, &datum_a_hash).unwrap();
//!     assert!(missing.is_none());
//!     txn.commit().unwrap();
//! }
//!
//! // Committed nodes are retrievable by their hashes.
//! {
//!     let mut txn = env.create_read_write_txn().unwrap();
//!     store.put(&mut txn, &datum_a_hash, &datum_a).unwrap();
//!     store.put(&mut txn, &datum_b_hash, &datum_b).unwrap();
//!     store.put(&mut txn, &node_hash, &node).unwrap();
//!     txn.commit().unwrap();
//! }
//! {
//!     let txn = env.create_read_txn().unwrap();
//!     assert_eq!(store.get(&txn, &node_hash).unwrap(), Some(node));
//!     assert_eq!(store.get(&txn, &datum_b_hash).unwrap(), Some(datum_b));
//!     txn.commit().unwrap();
//! }
//! ```

use lmdb::{Database, DatabaseFlags};

use crate::{
    error,
    shared::newtypes::Blake2bHash,
    store::Store,
    transaction_source::lmdb::LmdbEnvironment,
    trie::Trie,
    trie_store::{self, TrieStore},
};

/// A content-addressed node store backed by a named LMDB database.
///
/// Cheap to clone; the handle refers to the database, not to any cached
/// state.
#[derive(Debug, Clone)]
pub struct LmdbTrieStore {
    db: Database,
}

impl LmdbTrieStore {
    /// Creates the store's database in `env`, or opens it if a previous run
    /// already created it.
    pub fn new(
        env: &LmdbEnvironment,
        maybe_name: Option<&str>,
        flags: DatabaseFlags,
    ) -> Result<Self, error::Error> {
        let name = Self::name(maybe_name);
        let db = env.env().create_db(Some(&name), flags)?;
        Ok(LmdbTrieStore { db })
    }

    /// Opens the store's database in `env`, failing if it was never created.
    pub fn open(env: &LmdbEnvironment, maybe_name: Option<&str>) -> Result<Self, error::Error> {
        let name = Self::name(maybe_name);
        let db = env.env().open_db(Some(&name))?;
        Ok(LmdbTrieStore { db })
    }

    fn name(maybe_name: Option<&str>) -> String {
        maybe_name
            .map(|name| format!("{}-{}", trie_store::NAME, name))
            .unwrap_or_else(|| String::from(trie_store::NAME))
    }

    /// Returns the wrapped database handle.
    pub fn get_db(&self) -> Database {
        self.db
    }
}

impl<K, V> Store<Blake2bHash, Trie<K, V>> for LmdbTrieStore {
    type Error = error::Error;

    type Handle = Database;

    fn handle(&self) -> Self::Handle {
        self.db
    }
}

impl<K, V> TrieStore<K, V> for LmdbTrieStore {}
