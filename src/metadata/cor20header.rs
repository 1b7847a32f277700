//! CLI header (`IMAGE_COR20_HEADER`), ECMA-335 II.25.3.3.
//!
//! The CLI header locates the metadata root and the strong-name signature directory of an
//! assembly. Only the fields needed to reach the metadata and to report the signing state are
//! retained.

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// `COMIMAGE_FLAGS_STRONGNAMESIGNED`: the image carries a strong-name signature.
pub const COMIMAGE_FLAGS_STRONGNAMESIGNED: u32 = 0x0000_0008;

/// Flags defined by ECMA-335 plus `COMIMAGE_FLAGS_TRACKDEBUGDATA`.
const VALID_FLAGS: u32 = 0x0001_001F;

/// The parsed CLI header.
#[derive(Clone, Debug, PartialEq)]
pub struct Cor20Header {
    /// Size of the header, always 72
    pub cb: u32,
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// `COMIMAGE_FLAGS_*`
    pub flags: u32,
    /// Entry point token or RVA
    pub entry_point_token: u32,
    /// RVA of the strong-name signature, 0 if absent
    pub strong_name_signature_rva: u32,
    /// Size of the strong-name signature
    pub strong_name_signature_size: u32,
}

impl Cor20Header {
    /// Parse the CLI header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than 72 bytes, or
    /// [`crate::Error::Malformed`] for an invalid header.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < 72 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header has no metadata directory"));
        }

        let flags = parser.read_le::<u32>()?;
        if flags & !VALID_FLAGS != 0 {
            return Err(malformed_error!(
                "Invalid CLR flags: 0x{:08X} contains undefined bits",
                flags
            ));
        }

        let entry_point_token = parser.read_le::<u32>()?;

        // Resources
        parser.read_le::<u64>()?;

        let strong_name_signature_rva = parser.read_le::<u32>()?;
        let strong_name_signature_size = parser.read_le::<u32>()?;
        if (strong_name_signature_rva == 0) != (strong_name_signature_size == 0) {
            return Err(malformed_error!("Strong name values are invalid"));
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
            strong_name_signature_rva,
            strong_name_signature_size,
        })
    }

    /// Returns `true` if the image declares a strong-name signature.
    #[must_use]
    pub fn is_strong_name_signed(&self) -> bool {
        self.flags & COMIMAGE_FLAGS_STRONGNAMESIGNED != 0
    }
}
