//! In-memory transactions, intended for testing.
//!
//! Mirrors the LMDB semantics: a read transaction sees a snapshot of the
//! environment at creation time, and the effects of a read-write transaction
//! become visible only when it commits. Writers are expected to be
//! serialized by the caller, as they are for the real store.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    error::in_memory::Error,
    transaction_source::{Readable, Transaction, TransactionSource, Writable},
};

type BytesMap = HashMap<Vec<u8>, Vec<u8>>;

type Data = HashMap<Option<String>, BytesMap>;

/// An environment for in-memory transactions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnvironment {
    data: Arc<RwLock<Data>>,
}

impl InMemoryEnvironment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Default::default()
    }
}

/// A read transaction over a snapshot of the environment.
pub struct InMemoryReadTransaction {
    view: Data,
}

impl InMemoryReadTransaction {
    fn new(environment: &InMemoryEnvironment) -> Result<Self, Error> {
        let view = environment.data.read()?.clone();
        Ok(InMemoryReadTransaction { view })
    }
}

impl Transaction for InMemoryReadTransaction {
    type Error = Error;

    type Handle = Option<String>;

    fn commit(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Readable for InMemoryReadTransaction {
    fn read(&self, handle: Self::Handle, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let maybe_value = self.view.get(&handle).and_then(|map| map.get(key));
        Ok(maybe_value.cloned())
    }
}

/// A read-write transaction over a private copy of the environment, written
/// back on commit.
pub struct InMemoryReadWriteTransaction<'a> {
    environment: &'a InMemoryEnvironment,
    view: Data,
}

impl<'a> InMemoryReadWriteTransaction<'a> {
    fn new(environment: &'a InMemoryEnvironment) -> Result<Self, Error> {
        let view = environment.data.read()?.clone();
        Ok(InMemoryReadWriteTransaction { environment, view })
    }
}

impl<'a> Transaction for InMemoryReadWriteTransaction<'a> {
    type Error = Error;

    type Handle = Option<String>;

    fn commit(self) -> Result<(), Self::Error> {
        let mut data = self.environment.data.write()?;
        *data = self.view;
        Ok(())
    }
}

impl<'a> Readable for InMemoryReadWriteTransaction<'a> {
    fn read(&self, handle: Self::Handle, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let maybe_value = self.view.get(&handle).and_then(|map| map.get(key));
        Ok(maybe_value.cloned())
    }
}

impl<'a> Writable for InMemoryReadWriteTransaction<'a> {
    fn write(&mut self, handle: Self::Handle, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.view
            .entry(handle)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl<'a> TransactionSource<'a> for InMemoryEnvironment {
    type Error = Error;

    type Handle = Option<String>;

    type ReadTransaction = InMemoryReadTransaction;

    type ReadWriteTransaction = InMemoryReadWriteTransaction<'a>;

    fn create_read_txn(&'a self) -> Result<InMemoryReadTransaction, Self::Error> {
        InMemoryReadTransaction::new(self)
    }

    fn create_read_write_txn(&'a self) -> Result<InMemoryReadWriteTransaction<'a>, Self::Error> {
        InMemoryReadWriteTransaction::new(self)
    }
}
