//! Deterministic binary serialization for keys, values and trie nodes.
//!
//! Every type stored in the trie must have a total, canonical byte
//! representation: the bytes of a key are the descent path through the trie,
//! and the bytes of a node are the input to its content address. Two
//! structurally equal values must therefore always serialize to the same
//! bytes.

use std::{convert::TryFrom, fmt::Debug};

/// The number of bytes in a serialized `u8`.
pub const U8_SERIALIZED_LENGTH: usize = 1;
/// The number of bytes in a serialized `u32`.
pub const U32_SERIALIZED_LENGTH: usize = 4;

/// Tag for a serialized `Option::None`.
pub const OPTION_NONE_TAG: u8 = 0;
/// Tag for a serialized `Option::Some`.
pub const OPTION_SOME_TAG: u8 = 1;

/// Serialization and deserialization errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Early end of stream while deserializing.
    #[error("deserialization error: early end of stream")]
    EarlyEndOfStream,
    /// Formatting error while deserializing.
    #[error("deserialization error: formatting")]
    Formatting,
    /// Not all input bytes were consumed.
    #[error("deserialization error: left-over bytes")]
    LeftOverBytes,
    /// Out of memory while serializing.
    #[error("serialization error: out of memory")]
    OutOfMemory,
}

/// A type which can be serialized to a `Vec<u8>`.
pub trait ToBytes {
    /// Serializes `&self`.
    fn to_bytes(&self) -> Result<Vec<u8>, Error>;

    /// The number of bytes `to_bytes` would return.
    fn serialized_length(&self) -> usize;

    /// Writes `&self` into a mutable `writer`.
    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        writer.extend(self.to_bytes()?);
        Ok(())
    }
}

/// A type which can be deserialized from a `&[u8]`.
pub trait FromBytes: Sized {
    /// Deserializes the slice into `Self`, returning the unconsumed
    /// remainder.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error>;
}

/// Returns a `Vec<u8>` big enough to hold the serialized value, or
/// `Error::OutOfMemory` if the claimed length is absurd.
pub fn allocate_buffer<T: ToBytes>(to_be_serialized: &T) -> Result<Vec<u8>, Error> {
    let serialized_length = to_be_serialized.serialized_length();
    if serialized_length > u32::max_value() as usize {
        return Err(Error::OutOfMemory);
    }
    Ok(Vec::with_capacity(serialized_length))
}

/// Deserializes `bytes` into an instance of `T`.
///
/// Returns `Error::LeftOverBytes` if any bytes remain unconsumed.
pub fn deserialize<T: FromBytes>(bytes: &[u8]) -> Result<T, Error> {
    let (t, remainder) = T::from_bytes(bytes)?;
    if remainder.is_empty() {
        Ok(t)
    } else {
        Err(Error::LeftOverBytes)
    }
}

fn safe_split_at(bytes: &[u8], n: usize) -> Result<(&[u8], &[u8]), Error> {
    if n > bytes.len() {
        Err(Error::EarlyEndOfStream)
    } else {
        Ok(bytes.split_at(n))
    }
}

impl ToBytes for u8 {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(vec![*self])
    }

    fn serialized_length(&self) -> usize {
        U8_SERIALIZED_LENGTH
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        writer.push(*self);
        Ok(())
    }
}

impl FromBytes for u8 {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        match bytes.split_first() {
            Some((byte, rem)) => Ok((*byte, rem)),
            None => Err(Error::EarlyEndOfStream),
        }
    }
}

impl ToBytes for u32 {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.to_le_bytes().to_vec())
    }

    fn serialized_length(&self) -> usize {
        U32_SERIALIZED_LENGTH
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        writer.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl FromBytes for u32 {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (bytes, remainder) = safe_split_at(bytes, U32_SERIALIZED_LENGTH)?;
        let mut result = [0u8; U32_SERIALIZED_LENGTH];
        result.copy_from_slice(bytes);
        Ok((u32::from_le_bytes(result), remainder))
    }
}

impl ToBytes for Vec<u8> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = allocate_buffer(self)?;
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn serialized_length(&self) -> usize {
        U32_SERIALIZED_LENGTH + self.len()
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        let length = u32::try_from(self.len()).map_err(|_| Error::OutOfMemory)?;
        length.write_bytes(writer)?;
        writer.extend_from_slice(self);
        Ok(())
    }
}

impl FromBytes for Vec<u8> {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (length, remainder) = u32::from_bytes(bytes)?;
        let (bytes, remainder) = safe_split_at(remainder, length as usize)?;
        Ok((bytes.to_vec(), remainder))
    }
}

impl ToBytes for String {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = allocate_buffer(self)?;
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn serialized_length(&self) -> usize {
        U32_SERIALIZED_LENGTH + self.as_bytes().len()
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        let length = u32::try_from(self.len()).map_err(|_| Error::OutOfMemory)?;
        length.write_bytes(writer)?;
        writer.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl FromBytes for String {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (str_bytes, remainder) = Vec::<u8>::from_bytes(bytes)?;
        let result = String::from_utf8(str_bytes).map_err(|_| Error::Formatting)?;
        Ok((result, remainder))
    }
}

impl<T: ToBytes> ToBytes for Option<T> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = allocate_buffer(self)?;
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    fn serialized_length(&self) -> usize {
        U8_SERIALIZED_LENGTH
            + match self {
                Some(value) => value.serialized_length(),
                None => 0,
            }
    }

    fn write_bytes(&self, writer: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            None => writer.push(OPTION_NONE_TAG),
            Some(value) => {
                writer.push(OPTION_SOME_TAG);
                value.write_bytes(writer)?;
            }
        }
        Ok(())
    }
}

impl<T: FromBytes> FromBytes for Option<T> {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (tag, remainder) = u8::from_bytes(bytes)?;
        match tag {
            OPTION_NONE_TAG => Ok((None, remainder)),
            OPTION_SOME_TAG => {
                let (value, remainder) = T::from_bytes(remainder)?;
                Ok((Some(value), remainder))
            }
            _ => Err(Error::Formatting),
        }
    }
}

/// Asserts that `t` serializes to its claimed length and deserializes back
/// to an equal value.
pub fn test_serialization_roundtrip<T>(t: &T)
where
    T: ToBytes + FromBytes + Debug + PartialEq,
{
    let serialized = t.to_bytes().expect("serialization should succeed");
    assert_eq!(
        serialized.len(),
        t.serialized_length(),
        "serialized_length of {:?} should agree with to_bytes", t
    );
    let deserialized = deserialize::<T>(&serialized).expect("deserialization should succeed");
    assert_eq!(*t, deserialized);
}
