//! Reassembly of results into the caller's groupings.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::{
    signing::{
        graph::SigningGraph,
        output::{CommitReport, SignStatus},
        record::{ComponentId, FinalizedHandle},
    },
    Error, Result,
};

/// A named grouping of input files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputGroup {
    /// Caller-chosen name, e.g. `"direct"` or `"copy-local"`
    pub name: String,
    /// Input files in caller order
    pub paths: Vec<PathBuf>,
}

/// How an input file took part in the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEntry {
    /// The file is the component `id`
    Component(ComponentId),
    /// The file is not a component, or could not be read
    PassThrough,
}

/// One result of a grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputItem {
    /// A component, signed before or by this run
    Signed {
        /// Identity before signing
        identity: String,
        /// The signed file: the input for already-signed components, the output otherwise
        path: PathBuf,
        /// What the run did
        status: SignStatus,
    },
    /// A file handed back unchanged
    PassThrough {
        /// The input file
        path: PathBuf,
    },
}

impl OutputItem {
    /// The file this item stands for.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            OutputItem::Signed { path, .. } | OutputItem::PassThrough { path } => path,
        }
    }

    /// The component identity, `None` for pass-through files.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        match self {
            OutputItem::Signed { identity, .. } => Some(identity),
            OutputItem::PassThrough { .. } => None,
        }
    }

    /// The signing status, `None` for pass-through files.
    #[must_use]
    pub fn status(&self) -> Option<SignStatus> {
        match self {
            OutputItem::Signed { status, .. } => Some(*status),
            OutputItem::PassThrough { .. } => None,
        }
    }
}

/// The results of one grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputGroup {
    /// Name of the input grouping
    pub name: String,
    /// Results in input order
    pub items: Vec<OutputItem>,
}

/// Build the per-grouping results of a finished run.
///
/// Each grouping lists, in input order, the finalized handle of every component supplied in it
/// and every pass-through file. A component supplied twice in one grouping, under the same or
/// another path, is listed once; so is a pass-through path.
///
/// # Errors
/// Returns [`crate::Error::Error`] if a listed component was never finalized or its output
/// was never committed.
pub fn partition(
    groups: &[InputGroup],
    entries: &HashMap<PathBuf, InputEntry>,
    graph: &SigningGraph,
    commit: &CommitReport,
) -> Result<Vec<OutputGroup>> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let mut seen = HashSet::new();
            let mut passed = HashSet::new();
            let mut items = Vec::with_capacity(group.paths.len());

            for path in &group.paths {
                match entries.get(path) {
                    Some(InputEntry::Component(id)) => {
                        let record = graph.record(*id);
                        if !record.membership().in_group(index) || !seen.insert(*id) {
                            continue;
                        }

                        let Some(handle) = record.handle() else {
                            return Err(Error::Error(format!(
                                "{} was not finalized",
                                record.identity()
                            )));
                        };

                        let status = match handle {
                            FinalizedHandle::AlreadySigned { .. } => SignStatus::AlreadySigned,
                            FinalizedHandle::Staged { destination, .. } => {
                                commit.status(destination).ok_or_else(|| {
                                    Error::Error(format!(
                                        "{} was not committed",
                                        destination.display()
                                    ))
                                })?
                            }
                        };

                        items.push(OutputItem::Signed {
                            identity: record.identity().to_string(),
                            path: handle.path().to_path_buf(),
                            status,
                        });
                    }
                    Some(InputEntry::PassThrough) | None => {
                        if !passed.insert(path.as_path()) {
                            continue;
                        }
                        items.push(OutputItem::PassThrough { path: path.clone() });
                    }
                }
            }

            Ok(OutputGroup {
                name: group.name.clone(),
                items,
            })
        })
        .collect()
}
