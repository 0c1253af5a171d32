//! Errors for the in-memory backend.

use std::sync;

use thiserror::Error;

use crate::{
    bytesrepr,
    trie_store::operations::{InsertError, LookupError},
};

/// Error enum representing possible errors in in-memory storage.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum Error {
    /// A (de)serialization error.
    #[error(transparent)]
    BytesRepr(#[from] bytesrepr::Error),

    /// A missing trie node while following a pointer that must resolve.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// An insertion the trie core refuses to perform.
    #[error(transparent)]
    Insert(#[from] InsertError),

    /// Another thread panicked while holding a lock.
    #[error("another thread panicked while holding a lock")]
    Poison,
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_error: sync::PoisonError<T>) -> Self {
        Error::Poison
    }
}
