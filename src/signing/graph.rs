//! The component graph of a signing run.
//!
//! [`GraphBuilder`] collects every component of a batch, merges components that recur across
//! groupings, and wires the reverse edges: for each unsigned reference `C -> R`, `C` becomes a
//! dependent of `R`. Records live in an arena addressed by [`ComponentId`]; edges are identity
//! keys resolved through the graph's index.
//!
//! # Examples
//!
//! ```rust
//! use dotsign::signing::{GroupMembership, SigningGraph};
//!
//! let mut builder = SigningGraph::builder();
//! builder.add_unsigned("Lib.App", ["Lib.Core"], GroupMembership::DIRECT);
//! builder.add_unsigned("Lib.Core", Vec::<String>::new(), GroupMembership::COPY_LOCAL);
//! let graph = builder.build()?;
//!
//! assert_eq!(graph.get("Lib.App").unwrap().outstanding(), 1);
//! assert!(graph.get("Lib.Core").unwrap().dependents().contains("Lib.App"));
//! # Ok::<(), dotsign::Error>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use tracing::debug;

use crate::{
    metadata::identity::PublicKeyToken,
    signing::record::{
        ComponentId, ComponentRecord, ComponentState, FinalizedHandle, GroupMembership,
    },
    Error, Result,
};

/// Collects components and produces a [`SigningGraph`].
#[derive(Default)]
pub struct GraphBuilder {
    records: Vec<ComponentRecord>,
    index: HashMap<String, ComponentId>,
    aliases: HashMap<String, ComponentId>,
}

impl GraphBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        GraphBuilder::default()
    }

    /// Add a component that already carries a public key.
    ///
    /// Signed components have nothing outstanding, whatever they reference.
    pub fn add_signed(
        &mut self,
        identity: impl Into<String>,
        path: impl Into<PathBuf>,
        token: PublicKeyToken,
        membership: GroupMembership,
    ) -> ComponentId {
        let identity = identity.into();
        if let Some(id) = self.merge(&identity, membership) {
            return id;
        }

        let mut record = ComponentRecord::new(identity, membership);
        record.finalize(FinalizedHandle::AlreadySigned {
            path: path.into(),
            token,
        });
        self.insert(record)
    }

    /// Add an unsigned component with the identities of the unsigned components it references.
    ///
    /// Repeated references are collapsed.
    pub fn add_unsigned<I, S>(
        &mut self,
        identity: impl Into<String>,
        references: I,
        membership: GroupMembership,
    ) -> ComponentId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identity = identity.into();
        if let Some(id) = self.merge(&identity, membership) {
            return id;
        }

        let mut seen = HashSet::new();
        let mut record = ComponentRecord::new(identity, membership);
        record.unsigned_references = references
            .into_iter()
            .map(Into::into)
            .filter(|reference: &String| seen.insert(reference.clone()))
            .collect();

        self.insert(record)
    }

    /// Make `id` resolvable under a second identity.
    ///
    /// A signed component is typically aliased by its token-less identity, which is how
    /// assemblies built against its unsigned predecessor still refer to it. Aliases only
    /// affect lookups: a component added under the same identity still gets its own record,
    /// and resolution prefers it over the alias. Returns `false` if `alias` already names
    /// another component's alias.
    pub fn alias(&mut self, alias: impl Into<String>, id: ComponentId) -> bool {
        let alias = alias.into();
        match self.aliases.get(&alias) {
            Some(&existing) => existing == id,
            None => {
                self.aliases.insert(alias, id);
                true
            }
        }
    }

    /// Resolve every unsigned reference and wire the dependents.
    ///
    /// # Errors
    /// Returns [`crate::Error::DanglingReference`] for the first unsigned reference, in
    /// insertion order, whose identity is not part of the graph.
    pub fn build(mut self) -> Result<SigningGraph> {
        let mut edges = Vec::new();

        for (position, record) in self.records.iter().enumerate() {
            if record.signed {
                continue;
            }

            let mut targets = HashSet::new();
            for reference in &record.unsigned_references {
                let Some(target) = lookup(&self.index, &self.aliases, reference) else {
                    return Err(Error::DanglingReference {
                        component: record.identity.clone(),
                        reference: reference.clone(),
                    });
                };

                if targets.insert(target) {
                    edges.push((target, ComponentId(position)));
                }
            }
        }

        for (target, dependent) in edges {
            let identity = self.records[dependent.0].identity.clone();
            self.records[dependent.0].outstanding += 1;
            self.records[target.0].dependents.insert(identity);
        }

        Ok(SigningGraph {
            records: self.records,
            index: self.index,
            aliases: self.aliases,
        })
    }

    fn merge(&mut self, identity: &str, membership: GroupMembership) -> Option<ComponentId> {
        let id = *self.index.get(identity)?;
        let record = &mut self.records[id.0];
        record.membership |= membership;

        debug!(identity, membership = ?record.membership, "merged recurring component");
        Some(id)
    }

    fn insert(&mut self, record: ComponentRecord) -> ComponentId {
        let id = ComponentId(self.records.len());
        self.index.insert(record.identity.clone(), id);
        self.records.push(record);
        id
    }
}

fn lookup(
    index: &HashMap<String, ComponentId>,
    aliases: &HashMap<String, ComponentId>,
    identity: &str,
) -> Option<ComponentId> {
    index.get(identity).or_else(|| aliases.get(identity)).copied()
}

/// The components of a run, addressed by [`ComponentId`] or identity.
#[derive(Debug)]
pub struct SigningGraph {
    records: Vec<ComponentRecord>,
    index: HashMap<String, ComponentId>,
    aliases: HashMap<String, ComponentId>,
}

impl SigningGraph {
    /// Start building a graph.
    #[must_use]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Number of distinct components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the graph holds no component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve an identity, falling back to aliases.
    #[must_use]
    pub fn resolve(&self, identity: &str) -> Option<ComponentId> {
        lookup(&self.index, &self.aliases, identity)
    }

    /// Look up a record by identity or alias.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&ComponentRecord> {
        self.resolve(identity).map(|id| &self.records[id.0])
    }

    /// The record of `id`.
    ///
    /// # Panics
    /// Panics if `id` was issued by a different graph and is out of range.
    #[must_use]
    pub fn record(&self, id: ComponentId) -> &ComponentRecord {
        &self.records[id.0]
    }

    pub(crate) fn record_mut(&mut self, id: ComponentId) -> &mut ComponentRecord {
        &mut self.records[id.0]
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(position, record)| (ComponentId(position), record))
    }

    /// Sum of the outstanding counters: unsigned-reference edges not yet satisfied.
    #[must_use]
    pub fn outstanding_total(&self) -> usize {
        self.records.iter().map(ComponentRecord::outstanding).sum()
    }

    /// Identities still blocked, sorted.
    #[must_use]
    pub fn blocked(&self) -> Vec<String> {
        let mut blocked: Vec<String> = self
            .records
            .iter()
            .filter(|record| record.state() == ComponentState::Blocked)
            .map(|record| record.identity.clone())
            .collect();
        blocked.sort();
        blocked
    }
}
