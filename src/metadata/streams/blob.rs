//! Blob heap (`#Blob`), ECMA-335 II.24.2.4.

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// View over the `#Blob` heap.
///
/// Each blob is prefixed with its length as a compressed unsigned integer; [`Blob::get`] strips
/// the prefix and returns the payload.
///
/// # Examples
///
/// ```rust
/// use dotsign::metadata::streams::Blob;
///
/// let heap = Blob::from(&[0x00, 0x03, 0x41, 0x42, 0x43])?;
/// assert_eq!(heap.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), dotsign::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a view over heap data. The first byte must be the empty blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with 0.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get the payload of the blob at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the blob extends past the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }
}
