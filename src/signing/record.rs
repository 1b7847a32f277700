//! Per-component signing state.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use bitflags::bitflags;

use crate::metadata::identity::PublicKeyToken;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    /// The input groupings a component was supplied in. Bit `i` is the `i`-th grouping of a batch.
    pub struct GroupMembership: u64 {
        /// First grouping, conventionally the direct references
        const DIRECT = 1;
        /// Second grouping, conventionally the copy-local references
        const COPY_LOCAL = 1 << 1;

        const _ = !0;
    }
}

impl GroupMembership {
    /// Maximum number of groupings one batch can carry.
    pub const MAX_GROUPS: usize = 64;

    /// The membership of the `index`-th grouping alone.
    ///
    /// ## Arguments
    /// * 'index' - Grouping index, must be below [`GroupMembership::MAX_GROUPS`]
    #[must_use]
    pub fn group(index: usize) -> GroupMembership {
        debug_assert!(index < Self::MAX_GROUPS);
        GroupMembership::from_bits_retain(1_u64 << index)
    }

    /// Returns `true` if the `index`-th grouping is part of this membership.
    #[must_use]
    pub fn in_group(self, index: usize) -> bool {
        index < Self::MAX_GROUPS && self.contains(Self::group(index))
    }
}

/// Index of a [`ComponentRecord`] in its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// Position of the record in insertion order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a component stands in the signing run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentState {
    /// Unsigned, waiting on unsigned dependencies
    Blocked,
    /// Unsigned, every dependency is signed
    Ready,
    /// Already signed, or finalized by this run
    Signed,
}

/// Result of signing a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizedHandle {
    /// The component carried a public key before the run and was left as is
    AlreadySigned {
        /// Location of the component
        path: PathBuf,
        /// Its own public-key token
        token: PublicKeyToken,
    },
    /// The component was rewritten and staged for output
    Staged {
        /// Output location once committed
        destination: PathBuf,
        /// Token of the signing key
        token: PublicKeyToken,
    },
}

impl FinalizedHandle {
    /// Token that references to this component must embed.
    #[must_use]
    pub fn token(&self) -> PublicKeyToken {
        match self {
            FinalizedHandle::AlreadySigned { token, .. } | FinalizedHandle::Staged { token, .. } => {
                *token
            }
        }
    }

    /// Location of the finalized component.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            FinalizedHandle::AlreadySigned { path, .. } => path,
            FinalizedHandle::Staged { destination, .. } => destination,
        }
    }
}

/// One component of a signing run.
///
/// A record is created once per distinct identity by the graph builder. Afterwards only the
/// worklist mutates it: `outstanding` counts down and the record turns signed exactly once.
#[derive(Clone, Debug)]
pub struct ComponentRecord {
    pub(crate) identity: String,
    pub(crate) signed: bool,
    pub(crate) outstanding: usize,
    pub(crate) unsigned_references: Vec<String>,
    pub(crate) dependents: BTreeSet<String>,
    pub(crate) membership: GroupMembership,
    pub(crate) handle: Option<FinalizedHandle>,
}

impl ComponentRecord {
    pub(crate) fn new(identity: String, membership: GroupMembership) -> ComponentRecord {
        ComponentRecord {
            identity,
            signed: false,
            outstanding: 0,
            unsigned_references: Vec::new(),
            dependents: BTreeSet::new(),
            membership,
            handle: None,
        }
    }

    /// The identity key of the component.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns `true` if the component carries a public key.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Unsigned dependencies that are not finalized yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Identities of the unsigned components this one references, without duplicates.
    #[must_use]
    pub fn unsigned_references(&self) -> &[String] {
        &self.unsigned_references
    }

    /// Identities of the components holding an unsigned reference to this one.
    #[must_use]
    pub fn dependents(&self) -> &BTreeSet<String> {
        &self.dependents
    }

    /// Groupings the component was supplied in.
    #[must_use]
    pub fn membership(&self) -> GroupMembership {
        self.membership
    }

    /// The signing result, once signed.
    #[must_use]
    pub fn handle(&self) -> Option<&FinalizedHandle> {
        self.handle.as_ref()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ComponentState {
        if self.signed {
            ComponentState::Signed
        } else if self.outstanding == 0 {
            ComponentState::Ready
        } else {
            ComponentState::Blocked
        }
    }

    /// Count one dependency as finalized. Returns `true` if this released the component.
    pub(crate) fn release_one(&mut self) -> bool {
        debug_assert!(self.outstanding > 0, "{} released twice", self.identity);
        self.outstanding = self.outstanding.saturating_sub(1);
        self.outstanding == 0 && !self.signed
    }

    pub(crate) fn finalize(&mut self, handle: FinalizedHandle) {
        self.signed = true;
        self.outstanding = 0;
        self.handle = Some(handle);
    }
}
