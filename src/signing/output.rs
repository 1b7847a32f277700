//! Atomic staging of finalized components.
//!
//! Finalized bytes are written to temporary files next to their destination while the worklist
//! runs. Only [`OutputStage::commit`] moves them into place, so a run that fails (cycle, writer
//! error, collision) leaves every previous output untouched: dropping the stage deletes the
//! temporary files.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Error, Result};

/// Outcome of signing one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignStatus {
    /// Signed before the run, left untouched
    AlreadySigned,
    /// The destination was created or replaced
    Written,
    /// The destination already held identical bytes
    Unchanged,
}

struct StagedFile {
    owner: String,
    destination: PathBuf,
    digest: [u8; 20],
    len: u64,
    file: NamedTempFile,
}

/// Result of [`OutputStage::commit`].
#[derive(Clone, Debug, Default)]
pub struct CommitReport {
    pub(crate) statuses: HashMap<PathBuf, SignStatus>,
    pub(crate) written: Vec<PathBuf>,
}

impl CommitReport {
    /// Status of the file committed to `destination`.
    #[must_use]
    pub fn status(&self, destination: &Path) -> Option<SignStatus> {
        self.statuses.get(destination).copied()
    }

    /// Files created or replaced, companions included, in staging order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Temporary outputs of a run, committed all at once.
pub struct OutputStage {
    output_dir: PathBuf,
    copy_debug_symbols: bool,
    staged: Vec<StagedFile>,
    owners: HashMap<PathBuf, String>,
}

impl OutputStage {
    /// Create a stage writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, copy_debug_symbols: bool) -> Self {
        OutputStage {
            output_dir: output_dir.into(),
            copy_debug_symbols,
            staged: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// The output root.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of staged files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Where a component read from `source` is written.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `source` has no file name.
    pub fn destination_for(&self, source: &Path) -> Result<PathBuf> {
        match source.file_name() {
            Some(name) => Ok(self.output_dir.join(name)),
            None => Err(Error::Error(format!(
                "{} has no file name",
                source.display()
            ))),
        }
    }

    /// Stage the finalized `bytes` of the component `identity` read from `source`, together
    /// with its `.pdb` if one sits beside `source`. Returns the destination.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutputCollision`] if another component already claimed the
    /// destination, or [`crate::Error::Rewrite`] if a temporary file cannot be written.
    pub fn stage(&mut self, identity: &str, source: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let destination = self.destination_for(source)?;

        let symbols = source.with_extension("pdb");
        let companion = if self.copy_debug_symbols && symbols.is_file() {
            Some((symbols, destination.with_extension("pdb")))
        } else {
            None
        };

        self.claim(&destination, identity)?;
        if let Some((_, symbols_destination)) = &companion {
            self.claim(symbols_destination, identity)?;
        }

        self.write_temp(identity, destination.clone(), bytes)
            .map_err(|error| rewrite_error(identity, error))?;

        if let Some((symbols, symbols_destination)) = companion {
            fs::read(&symbols)
                .map_err(Error::from)
                .and_then(|data| self.write_temp(identity, symbols_destination, &data))
                .map_err(|error| rewrite_error(identity, error))?;
        }

        Ok(destination)
    }

    /// Move every staged file into place.
    ///
    /// A destination that already holds the staged bytes is left alone and reported
    /// [`SignStatus::Unchanged`]; every other one is atomically replaced.
    ///
    /// # Errors
    /// Returns [`crate::Error::Rewrite`] if a destination cannot be read or replaced.
    pub fn commit(self) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        for staged in self.staged {
            let owner = staged.owner.clone();
            let destination = staged.destination.clone();

            let status = commit_file(staged).map_err(|error| rewrite_error(&owner, error))?;
            if status == SignStatus::Written {
                report.written.push(destination.clone());
            } else {
                debug!(destination = %destination.display(), "output unchanged");
            }

            report.statuses.insert(destination, status);
        }

        Ok(report)
    }

    fn claim(&mut self, destination: &Path, identity: &str) -> Result<()> {
        if let Some(first) = self.owners.get(destination) {
            if first != identity {
                return Err(Error::OutputCollision {
                    path: destination.to_path_buf(),
                    first: first.clone(),
                    second: identity.to_string(),
                });
            }
        }

        self.owners
            .insert(destination.to_path_buf(), identity.to_string());
        Ok(())
    }

    fn write_temp(&mut self, identity: &str, destination: PathBuf, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let mut file = NamedTempFile::new_in(&self.output_dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        self.staged.push(StagedFile {
            owner: identity.to_string(),
            destination,
            digest: Sha1::digest(bytes).into(),
            len: bytes.len() as u64,
            file,
        });
        Ok(())
    }
}

fn commit_file(staged: StagedFile) -> Result<SignStatus> {
    if let Ok(metadata) = fs::metadata(&staged.destination) {
        if metadata.is_file() && metadata.len() == staged.len {
            let existing = fs::read(&staged.destination)?;
            let digest: [u8; 20] = Sha1::digest(&existing).into();
            if digest == staged.digest {
                return Ok(SignStatus::Unchanged);
            }
        }
    }

    staged
        .file
        .persist(&staged.destination)
        .map_err(|error| Error::from(error.error))?;
    Ok(SignStatus::Written)
}

fn rewrite_error(identity: &str, error: Error) -> Error {
    match error {
        Error::OutputCollision { .. } | Error::Rewrite { .. } => error,
        other => Error::Rewrite {
            component: identity.to_string(),
            source: Box::new(other),
        },
    }
}
