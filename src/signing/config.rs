//! Configuration of a signing run.

use std::path::PathBuf;

use crate::{
    metadata::reader::ResolutionContext,
    signing::{key::KeySource, worklist::WorklistOrder},
};

/// Settings shared by every component of one run.
///
/// # Examples
///
/// ```rust
/// use dotsign::signing::{KeySource, SignerConfig, WorklistOrder};
///
/// let config = SignerConfig::new("obj/signed", KeySource::File("release.snk".into()))
///     .with_order(WorklistOrder::Lifo)
///     .with_debug_symbols(false)
///     .with_probe_dir("bin/Release");
///
/// assert_eq!(config.resolution_context().probe_dirs().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct SignerConfig {
    /// Directory the signed components are written to
    pub output_dir: PathBuf,
    /// The key pair all components are signed with
    pub key: KeySource,
    /// Removal order of ready components
    pub order: WorklistOrder,
    /// Carry `<name>.pdb` beside each signed component
    pub copy_debug_symbols: bool,
    /// Directories probed to locate referenced assemblies
    pub probe_dirs: Vec<PathBuf>,
}

impl SignerConfig {
    /// Create a configuration with the required settings and defaults for the rest.
    ///
    /// ## Arguments
    /// * 'output_dir' - Output root of the run
    /// * 'key' - Source of the key material
    pub fn new(output_dir: impl Into<PathBuf>, key: KeySource) -> Self {
        SignerConfig {
            output_dir: output_dir.into(),
            key,
            order: WorklistOrder::default(),
            copy_debug_symbols: true,
            probe_dirs: Vec::new(),
        }
    }

    /// Set the worklist removal order
    ///
    /// ## Arguments
    /// * 'order' - FIFO or LIFO
    #[must_use]
    pub fn with_order(mut self, order: WorklistOrder) -> Self {
        self.order = order;
        self
    }

    /// Enable or disable copying of companion debug symbols
    #[must_use]
    pub fn with_debug_symbols(mut self, copy: bool) -> Self {
        self.copy_debug_symbols = copy;
        self
    }

    /// Add a probing directory
    ///
    /// ## Arguments
    /// * 'dir' - Directory appended to the probing list
    #[must_use]
    pub fn with_probe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.probe_dirs.push(dir.into());
        self
    }

    /// The resolution context of the run.
    #[must_use]
    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext::new(self.probe_dirs.clone())
    }
}
