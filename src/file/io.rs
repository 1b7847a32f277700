//! Bounds-checked little-endian reads for PE and metadata parsing.
//!
//! Every structure this crate inspects (PE headers, the CLI header, metadata root, table rows,
//! strong-name key blobs) is stored little-endian. The helpers in this module read primitive
//! values at an offset, advance the offset, and report [`crate::Error::OutOfBounds`] instead of
//! panicking when the buffer is too short.
//!
//! # Key Components
//!
//! - [`CilIO`] - Primitive types that can be decoded from a fixed-size byte array
//! - [`read_le`] - Read a value from the start of a buffer
//! - [`read_le_at`] - Read a value at an offset and advance the offset
//! - [`read_le_at_dyn`] - Read a 2- or 4-byte heap/table index

use crate::{Error::OutOfBounds, Result};

/// Primitive values that can be decoded from little-endian bytes.
pub trait CilIO: Sized {
    /// The fixed-size byte array a value of this type is decoded from.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io! {
    u8 => 1,
    u16 => 2,
    u32 => 4,
    u64 => 8,
    i32 => 4,
}

/// Read a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Read a value of type `T` at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value would extend past the end of `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Read a heap or table index that is either 2 or 4 bytes wide.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the index would extend past the end of `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}
