//! Byte sources behind a [`crate::file::File`].
//!
//! Inputs of a signing batch are mapped read-only; images produced by tests and fuzzers
//! live in owned buffers.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{
    Error::{Error, FileError, OutOfBounds},
    Result,
};

/// Read-only bytes of an image.
pub trait Backend: Send + Sync {
    /// The complete data.
    fn bytes(&self) -> &[u8];

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(OutOfBounds)?;
        self.bytes().get(offset..end).ok_or(OutOfBounds)
    }

    /// Number of bytes available.
    fn len(&self) -> usize {
        self.bytes().len()
    }
}

impl Backend for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }
}

/// A file on disk mapped into memory.
///
/// Most components of a batch are only inspected, so only the pages holding the CLI header
/// and the metadata tables are ever faulted in.
#[derive(Debug)]
pub struct Mapped {
    map: Mmap,
}

impl Mapped {
    /// Map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, or
    /// [`crate::Error::Error`] if it cannot be mapped.
    pub fn open(path: &Path) -> Result<Mapped> {
        let file = fs::File::open(path).map_err(FileError)?;

        // Inputs are never written during a run.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|error| Error(format!("Cannot map {} - {error}", path.display())))?;

        Ok(Mapped { map })
    }
}

impl Backend for Mapped {
    fn bytes(&self) -> &[u8] {
        &self.map
    }
}
