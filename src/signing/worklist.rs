//! The readiness worklist that drives components from blocked to signed.
//!
//! The worklist is seeded with every already-signed component (visited as a no-op so it
//! releases its dependents) followed by every unsigned component with nothing outstanding.
//! Each removal finalizes one component and decrements the counter of each of its
//! dependents; a dependent reaching zero is pushed. When the list drains, any component still
//! blocked sits on or behind a reference cycle.
//!
//! Which ready component is removed first is irrelevant to the outcome, so both queue and stack
//! discipline are offered through [`WorklistOrder`].

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    signing::{
        graph::SigningGraph,
        record::{ComponentId, ComponentState, FinalizedHandle},
    },
    Error, Result,
};

/// Removal discipline among ready components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorklistOrder {
    /// First released, first finalized
    #[default]
    Fifo,
    /// Last released, first finalized
    Lifo,
}

/// Performs the rewrite of one component once its dependencies are signed.
pub trait Finalizer {
    /// Finalize `id`.
    ///
    /// Every unsigned reference of the record resolves to a signed record in `graph`, whose
    /// handle carries the token to embed.
    ///
    /// # Errors
    /// Any error aborts the run.
    fn finalize(&mut self, graph: &SigningGraph, id: ComponentId) -> Result<FinalizedHandle>;

    /// Visit a component that was signed before the run. Nothing is rewritten.
    fn visit_signed(&mut self, _graph: &SigningGraph, _id: ComponentId) {}
}

/// The order in which components reached the signed state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SigningTrace {
    /// Every component in visiting order, already-signed ones included
    pub visited: Vec<ComponentId>,
    /// Components finalized by the run
    pub finalized: usize,
}

impl SigningTrace {
    /// Position of `id` in the visiting order.
    #[must_use]
    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.visited.iter().position(|visited| *visited == id)
    }
}

/// Drains the readiness worklist of a [`SigningGraph`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Signer {
    order: WorklistOrder,
}

impl Signer {
    /// Create a signer with the given removal order.
    #[must_use]
    pub fn new(order: WorklistOrder) -> Self {
        Signer { order }
    }

    /// The removal order.
    #[must_use]
    pub fn order(&self) -> WorklistOrder {
        self.order
    }

    /// Finalize every component of `graph` in dependency order.
    ///
    /// # Errors
    /// Propagates the first error of `finalizer`, and returns
    /// [`crate::Error::CyclicReferences`] listing every still-blocked component if the graph
    /// has no valid order.
    pub fn run<F: Finalizer>(
        &self,
        graph: &mut SigningGraph,
        finalizer: &mut F,
    ) -> Result<SigningTrace> {
        let mut worklist: VecDeque<ComponentId> = graph
            .iter()
            .filter(|(_, record)| record.state() == ComponentState::Signed)
            .chain(
                graph
                    .iter()
                    .filter(|(_, record)| record.state() == ComponentState::Ready),
            )
            .map(|(id, _)| id)
            .collect();

        let mut trace = SigningTrace {
            visited: Vec::with_capacity(graph.len()),
            finalized: 0,
        };

        while let Some(id) = self.next(&mut worklist) {
            let record = graph.record(id);
            if record.is_signed() {
                debug!(identity = record.identity(), "already signed");
                finalizer.visit_signed(graph, id);
            } else {
                let handle = finalizer.finalize(graph, id)?;
                graph.record_mut(id).finalize(handle);
                trace.finalized += 1;
            }

            trace.visited.push(id);

            let dependents: Vec<ComponentId> = graph
                .record(id)
                .dependents()
                .iter()
                .filter_map(|dependent| graph.resolve(dependent))
                .collect();

            for dependent in dependents {
                if graph.record_mut(dependent).release_one() {
                    worklist.push_back(dependent);
                }
            }
        }

        let blocked = graph.blocked();
        if !blocked.is_empty() {
            return Err(Error::CyclicReferences(blocked));
        }

        debug_assert_eq!(graph.outstanding_total(), 0);
        Ok(trace)
    }

    fn next(&self, worklist: &mut VecDeque<ComponentId>) -> Option<ComponentId> {
        match self.order {
            WorklistOrder::Fifo => worklist.pop_front(),
            WorklistOrder::Lifo => worklist.pop_back(),
        }
    }
}
