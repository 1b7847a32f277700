//! Stream headers of the metadata root (ECMA-335 II.24.2.2).

use crate::{file::io::read_le, Error::OutOfBounds, Result};

/// Stream names this reader recognizes.
pub const KNOWN_STREAMS: [&str; 8] = [
    "#Strings", "#US", "#Blob", "#GUID", "#~", "#-", "#Pdb", "#JTD",
];

/// Location and name of one metadata stream, relative to the metadata root.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, at most 32 bytes including the terminator
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short, or
    /// [`crate::Error::Malformed`] for an unknown stream name.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let name_bytes = &data[8..std::cmp::min(data.len(), 8 + 32)];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| malformed_error!("Unterminated stream header name"))?;
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        if !KNOWN_STREAMS.iter().any(|valid_name| name == *valid_name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Bytes this header occupies in the root, including the 4-byte aligned name.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}
