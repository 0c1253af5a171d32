//! An in-memory trie store, intended to be used for testing.

use crate::{
    error::in_memory::Error,
    shared::newtypes::Blake2bHash,
    store::Store,
    transaction_source::in_memory::InMemoryEnvironment,
    trie::Trie,
    trie_store::{self, TrieStore},
};

/// An in-memory trie store.
#[derive(Debug, Clone)]
pub struct InMemoryTrieStore {
    maybe_name: Option<String>,
}

impl InMemoryTrieStore {
    /// Constructor for new `InMemoryTrieStore`.
    pub fn new(_environment: &InMemoryEnvironment, maybe_name: Option<&str>) -> Self {
        let name = maybe_name
            .map(|name| format!("{}-{}", trie_store::NAME, name))
            .unwrap_or_else(|| String::from(trie_store::NAME));
        InMemoryTrieStore {
            maybe_name: Some(name),
        }
    }
}

impl<K, V> Store<Blake2bHash, Trie<K, V>> for InMemoryTrieStore {
    type Error = Error;

    type Handle = Option<String>;

    fn handle(&self) -> Self::Handle {
        self.maybe_name.clone()
    }
}

impl<K, V> TrieStore<K, V> for InMemoryTrieStore {}
