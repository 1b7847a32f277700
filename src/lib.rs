// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
// - 'file/backend.rs' maps input files read-only with mmap

//! # dotsign
//!
//! Strong-name signing for batches of unsigned .NET assemblies that reference each other.
//!
//! Once an assembly is signed, every assembly referencing it must embed its public-key token,
//! so assemblies are finalized in dependency order: a component is rewritten only after every
//! unsigned component it references has been signed. `dotsign` reads the assemblies'
//! metadata straight from their PE images, builds the reference graph, drains a readiness
//! worklist and commits the finalized files atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotsign::prelude::*;
//!
//! # struct Writer;
//! # impl MetadataWriter for Writer {
//! #     fn rewrite(&self, _: &AssemblyView, _: &RewritePlan, _: &StrongNameKey) -> dotsign::Result<Vec<u8>> {
//! #         Ok(Vec::new())
//! #     }
//! # }
//! let config = SignerConfig::new("obj/signed", KeySource::File("release.snk".into()));
//! let namer = StrongNamer::with_writer(config, Writer);
//!
//! let mut batch = SigningBatch::new();
//! batch.add_group("direct", ["bin/Lib.App.dll"])?;
//! batch.add_group("copy-local", ["bin/Lib.Core.dll", "bin/Lib.Core.xml"])?;
//!
//! let report = namer.run(&batch)?;
//! println!("signing order: {:?}", report.signing_order());
//! # Ok::<(), dotsign::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - ECMA-335 metadata access: CLI header, streams, the handful of tables that
//!   carry identity and references, and the [`metadata::view::AssemblyView`] built from them
//! - [`signing`] - the signing engine: key material, component graph, worklist, rewrite plans,
//!   output staging and batch orchestration
//! - [`prelude`] - re-exports for glob import
//! - [`Error`] and [`Result`] - error handling
//!
//! The binary rewrite itself (growing heaps, computing the RSA signature) is a collaborator
//! behind [`signing::MetadataWriter`].
//!
//! ## Logging
//!
//! Events are emitted through [`tracing`]; install a subscriber to see them. Finalized
//! components are reported at `info`, skipped and unchanged files at `debug`, and unreadable
//! assemblies at `warn`.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use dotsign::prelude::*;
///
/// let view = AssemblyView::from_file("bin/Lib.App.dll".as_ref())?;
/// println!("{}", view.identity_string());
/// # Ok::<(), dotsign::Error>(())
/// ```
pub mod prelude;

/// Reading of the signing-relevant metadata of .NET assemblies, based on ECMA-335
///
/// # Key Components
///
/// - [`metadata::reader::MetadataReader`] - classifies input files and reads their view
/// - [`metadata::view::AssemblyView`] - identity, public key, references, friend declarations
/// - [`metadata::identity`] - assembly identities and public-key tokens
/// - [`metadata::cor20header`], [`metadata::root`], [`metadata::streams`], [`metadata::tables`] -
///   the underlying binary structures
pub mod metadata;

/// The dependency-ordered signing engine
pub mod signing;

/// `dotsign` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotsign` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Raw PE access and the little-endian reader used by all binary parsing
pub use file::{parser::Parser, File};
