//! Decoding of custom attribute values (ECMA-335 II.23.3).
//!
//! The signing engine only inspects attributes whose constructor takes a single string, such as
//! `InternalsVisibleToAttribute(string assemblyName)`. Their value blob is the prolog `0x0001`,
//! one `SerString`, and a named-argument count.

use crate::{file::parser::Parser, Result};

/// Custom attribute value prolog.
pub const CUSTOM_ATTRIBUTE_PROLOG: u16 = 0x0001;

/// Namespace of the friend-assembly attribute.
pub const INTERNALS_VISIBLE_TO_NAMESPACE: &str = "System.Runtime.CompilerServices";

/// Type name of the friend-assembly attribute.
pub const INTERNALS_VISIBLE_TO_NAME: &str = "InternalsVisibleToAttribute";

/// Decode the first fixed argument of a custom attribute as a `SerString`.
///
/// Returns `Ok(None)` for a null string (`0xFF`).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a missing prolog or invalid UTF-8, and
/// [`crate::Error::OutOfBounds`] for a truncated blob.
pub fn read_string_argument(value: &[u8]) -> Result<Option<String>> {
    let mut parser = Parser::new(value);

    let prolog = parser.read_le::<u16>()?;
    if prolog != CUSTOM_ATTRIBUTE_PROLOG {
        return Err(malformed_error!(
            "Invalid custom attribute prolog - 0x{:04X}",
            prolog
        ));
    }

    read_ser_string(&mut parser)
}

/// Read a `SerString`: `0xFF` for null, otherwise a compressed length and UTF-8 bytes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid UTF-8 and [`crate::Error::OutOfBounds`] if
/// the string is truncated.
pub fn read_ser_string(parser: &mut Parser<'_>) -> Result<Option<String>> {
    let position = parser.pos();
    if parser.read_le::<u8>()? == 0xFF {
        return Ok(None);
    }
    parser.seek(position)?;

    let length = parser.read_compressed_uint()? as usize;
    let bytes = parser.read_bytes(length)?;

    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|e| malformed_error!("Invalid UTF-8 in SerString: {}", e.utf8_error()))
}
