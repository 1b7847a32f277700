//! The binary metadata reader consumed by the signing engine.
//!
//! [`MetadataReader`] classifies every input file of a batch:
//!
//! - `Ok(Some(view))` - a .NET assembly; `view` carries identity, signing state and references
//! - `Ok(None)` - a readable file that is not an assembly (content files, native images)
//! - `Err(_)` - an assembly that could not be parsed
//!
//! [`PeMetadataReader`] implements it for PE images on disk. Files are memory-mapped and only
//! the CLI header, metadata root and the handful of tables the view needs are touched.

use std::path::{Path, PathBuf};

use crate::{
    metadata::view::AssemblyView,
    Error::{Empty, NotSupported},
    Result,
};

/// Directories probed when resolving an assembly name to a file.
///
/// Shared read-only across a whole signing run.
#[derive(Clone, Debug, Default)]
pub struct ResolutionContext {
    probe_dirs: Vec<PathBuf>,
}

impl ResolutionContext {
    /// Create a context probing `probe_dirs` in order.
    #[must_use]
    pub fn new(probe_dirs: Vec<PathBuf>) -> Self {
        ResolutionContext { probe_dirs }
    }

    /// The probed directories.
    #[must_use]
    pub fn probe_dirs(&self) -> &[PathBuf] {
        &self.probe_dirs
    }

    /// Locate `<dir>/<simple_name>.dll` or `.exe` in the first directory that has one.
    #[must_use]
    pub fn resolve(&self, simple_name: &str) -> Option<PathBuf> {
        self.probe_dirs.iter().find_map(|dir| {
            ["dll", "exe"]
                .iter()
                .map(|extension| dir.join(format!("{simple_name}.{extension}")))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// Reads the signing-relevant metadata of a file.
pub trait MetadataReader: Send + Sync {
    /// Read `path`.
    ///
    /// Returns `Ok(None)` for files that are readable but not .NET assemblies.
    ///
    /// # Errors
    /// Returns an error for files that cannot be read or are damaged assemblies.
    fn read(&self, path: &Path, context: &ResolutionContext) -> Result<Option<AssemblyView>>;
}

/// [`MetadataReader`] over memory-mapped PE images.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeMetadataReader;

impl PeMetadataReader {
    /// Create a new reader.
    #[must_use]
    pub fn new() -> Self {
        PeMetadataReader
    }
}

impl MetadataReader for PeMetadataReader {
    fn read(&self, path: &Path, _context: &ResolutionContext) -> Result<Option<AssemblyView>> {
        match AssemblyView::from_file(path) {
            Ok(view) => Ok(Some(view)),
            Err(NotSupported | Empty) => Ok(None),
            Err(error) => Err(error),
        }
    }
}
