//! Metadata streams referenced from the metadata root.
//!
//! - [`StreamHeader`] - name, offset and size of each stream
//! - [`Strings`] - the `#Strings` identifier heap
//! - [`Blob`] - the `#Blob` heap (public keys, custom attribute values)
//! - [`TablesHeader`] - the `#~` / `#-` tables stream

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::{StreamHeader, KNOWN_STREAMS};
pub use strings::Strings;
pub use tablesheader::TablesHeader;
