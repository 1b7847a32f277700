//! Reading the signing-relevant metadata of .NET assemblies.
//!
//! This module is the binary metadata reader the signing engine consumes. It walks from the CLI
//! header to the metadata root, locates the `#~` tables stream and the `#Strings` / `#Blob`
//! heaps, and extracts the three things strong-name signing depends on:
//!
//! - the assembly's own identity and public key (`Assembly` table),
//! - its references and whether each already embeds a public-key token (`AssemblyRef` table),
//! - its friend-assembly declarations (`InternalsVisibleToAttribute` on the assembly).
//!
//! # Module Structure
//!
//! - [`cor20header`] - CLI header
//! - [`root`] - Metadata root and stream directory
//! - [`streams`] - Heaps and the tables stream
//! - [`tables`] - Table schemas, coded indices and raw rows
//! - [`identity`] - Assembly identities and public-key tokens
//! - [`customattributes`] - Custom attribute value decoding
//! - [`view`] - [`view::AssemblyView`], the structured result
//! - [`reader`] - [`reader::MetadataReader`] and its PE implementation
//!
//! # Reference
//! - [ECMA-335 Partition II](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

pub mod cor20header;
pub mod customattributes;
pub mod identity;
pub mod reader;
pub mod root;
pub mod streams;
pub mod tables;
pub mod view;
