//! A store abstraction: typed reads and writes within a transaction.

use crate::{
    bytesrepr::{self, FromBytes, ToBytes},
    transaction_source::{Readable, Writable},
};

/// A transactional map from keys to values, stored under the keys' byte
/// representations.
pub trait Store<K, V> {
    /// An error which can occur when accessing the store.
    type Error: From<bytesrepr::Error>;

    /// A handle to the underlying database.
    type Handle;

    /// Returns the handle.
    fn handle(&self) -> Self::Handle;

    /// Returns an optional value from the corresponding key.
    fn get<T>(&self, txn: &T, key: &K) -> Result<Option<V>, Self::Error>
    where
        T: Readable<Handle = Self::Handle>,
        K: AsRef<[u8]>,
        V: FromBytes,
        Self::Error: From<T::Error>,
    {
        let handle = self.handle();
        match txn.read(handle, key.as_ref())? {
            None => Ok(None),
            Some(value_bytes) => {
                let value = bytesrepr::deserialize(&value_bytes)?;
                Ok(Some(value))
            }
        }
    }

    /// Inserts a key-value pair, overwriting any previous value.
    fn put<T>(&self, txn: &mut T, key: &K, value: &V) -> Result<(), Self::Error>
    where
        T: Writable<Handle = Self::Handle>,
        K: AsRef<[u8]>,
        V: ToBytes,
        Self::Error: From<T::Error>,
    {
        let handle = self.handle();
        txn.write(handle, key.as_ref(), &value.to_bytes()?)
            .map_err(Into::into)
    }
}
