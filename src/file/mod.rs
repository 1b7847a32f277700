//! PE image access for .NET assemblies.
//!
//! This module abstracts over where the bytes of an image live (a memory-mapped file or an
//! owned buffer) and exposes the handful of PE facts the metadata reader needs: whether the
//! image carries a CLI header, where that header is, and how to translate RVAs into file
//! offsets.
//!
//! # Key Components
//!
//! - [`File`] - A parsed PE image together with its backing data
//! - [`Backend`] - Byte sources (mapped files, owned buffers)
//! - [`parser::Parser`] - Cursor used by the metadata reader
//! - [`io`] - Little-endian primitive readers
//!
//! # Classification
//!
//! [`File::from_file`] and [`File::from_mem`] distinguish inputs that are simply not .NET
//! assemblies from inputs that are damaged:
//!
//! - [`crate::Error::Empty`] - zero-length input
//! - [`crate::Error::NotSupported`] - not a PE image, or a native PE without a CLI header
//! - [`crate::Error::GoblinErr`] / [`crate::Error::Malformed`] - a PE image that cannot be parsed
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsign::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("bin/MyLibrary.dll"))?;
//! let (clr_rva, clr_size) = file.clr();
//! let offset = file.rva_to_offset(clr_rva)?;
//! println!("CLI header: {} bytes at file offset 0x{:x}", clr_size, offset);
//! # Ok::<(), dotsign::Error>(())
//! ```

pub mod io;
pub mod parser;

mod backend;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr, NotSupported},
    Result,
};
use goblin::pe::{section_table::SectionTable, PE};
use ouroboros::self_referencing;

pub use backend::{Backend, Mapped};

/// A PE image that is known to carry a CLI header.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Memory-map and parse the file at `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, and the
    /// classification errors described in the module documentation otherwise.
    pub fn from_file(file: &Path) -> Result<File> {
        Self::load(Mapped::open(file)?)
    }

    /// Parse an image held in memory.
    ///
    /// # Errors
    /// See the classification errors described in the module documentation.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(data)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        if data.slice(0, 2)? != b"MZ" {
            return Err(NotSupported);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let pe = PE::parse(data.bytes()).map_err(GoblinErr)?;
            let has_cli_header = pe.header.optional_header.as_ref().is_some_and(|header| {
                header
                    .data_directories
                    .get_clr_runtime_header()
                    .is_some_and(|dir| dir.size > 0)
            });

            if has_cli_header {
                Ok(pe)
            } else {
                Err(NotSupported)
            }
        })
    }

    /// Returns the size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// Returns `true` if the image has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the RVA and size of the CLI header directory.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|header| header.data_directories.get_clr_runtime_header())
                .map_or((0, 0), |dir| {
                    (dir.virtual_address as usize, dir.size as usize)
                })
        })
    }

    /// Returns the section headers of the image.
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.with_pe(|pe| pe.sections.iter())
    }

    /// Returns the complete image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.bytes())
    }

    /// Returns a bounds-checked slice of the image data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.slice(offset, len))
    }

    /// Converts a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains the RVA.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let rva_u32 = u32::try_from(rva)
                .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

            for section in &pe.sections {
                let size = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_max) = section.virtual_address.checked_add(size) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}
