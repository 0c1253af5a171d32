//! An abstraction for scoped transactions over a key-value store.
//!
//! A transaction is acquired from a [`TransactionSource`], used through the
//! [`Readable`] and [`Writable`] traits, and committed explicitly. Dropping
//! a transaction without committing aborts it, so every failure path rolls
//! back automatically.

/// In-memory implementation of the transaction abstraction.
pub mod in_memory;

/// LMDB implementation of the transaction abstraction.
pub mod lmdb;

/// A transaction which can be committed.
pub trait Transaction: Sized {
    /// An error which can occur while reading, writing or committing.
    type Error;

    /// A handle to the database the transaction operates over.
    type Handle;

    /// Commits the transaction, making its effects visible to transactions
    /// created afterwards.
    fn commit(self) -> Result<(), Self::Error>;
}

/// A transaction which can be read from.
pub trait Readable: Transaction {
    /// Returns the value (if any) stored under `key` in the database named
    /// by `handle`.
    fn read(&self, handle: Self::Handle, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;
}

/// A transaction which can be written to.
pub trait Writable: Transaction {
    /// Inserts `value` under `key` in the database named by `handle`,
    /// overwriting any previous value.
    fn write(&mut self, handle: Self::Handle, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;
}

/// A source of transactions over some underlying environment.
pub trait TransactionSource<'a> {
    /// An error which can occur while creating a transaction.
    type Error;

    /// A handle to the database transactions operate over.
    type Handle;

    /// A read-only transaction.
    type ReadTransaction: Readable<Error = Self::Error, Handle = Self::Handle>;

    /// A read-write transaction.
    type ReadWriteTransaction: Readable<Error = Self::Error, Handle = Self::Handle>
        + Writable<Error = Self::Error, Handle = Self::Handle>;

    /// Begins a read-only transaction.
    fn create_read_txn(&'a self) -> Result<Self::ReadTransaction, Self::Error>;

    /// Begins a read-write transaction. The underlying environment grants
    /// the write lock to one transaction at a time.
    fn create_read_write_txn(&'a self) -> Result<Self::ReadWriteTransaction, Self::Error>;
}
