//! String heap (`#Strings`), ECMA-335 II.24.2.3.

use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// View over the `#Strings` heap: null-terminated UTF-8 identifiers addressed by byte offset.
///
/// # Examples
///
/// ```rust
/// use dotsign::metadata::streams::Strings;
///
/// let heap = Strings::from(b"\0Lib.Core\0System.Runtime\0")?;
/// assert_eq!(heap.get(1)?, "Lib.Core");
/// assert_eq!(heap.get(10)?, "System.Runtime");
/// # Ok::<(), dotsign::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a view over heap data. The first byte must be the empty string.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with 0.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get the string starting at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap, or
    /// [`crate::Error::Malformed`] for an unterminated or non-UTF-8 string.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        CStr::from_bytes_until_nul(&self.data[index..])
            .ok()
            .and_then(|result| result.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}
