//! The dependency-ordered signing engine.
//!
//! A run takes a closed batch of components, some signed and some not. An unsigned component
//! that references another unsigned one can only be finalized once the referenced one is
//! signed, because the reference must embed the referenced component's public-key token.
//!
//! The pieces, leaves first:
//!
//! - [`key`] - key material and the public-key token ([`StrongNameKey`])
//! - [`record`] - per-component state ([`ComponentRecord`], [`GroupMembership`])
//! - [`graph`] - identity map and reverse edges ([`GraphBuilder`], [`SigningGraph`])
//! - [`worklist`] - readiness-driven finalization ([`Signer`], [`Finalizer`])
//! - [`rewrite`] - what the binary writer must change ([`RewritePlan`], [`MetadataWriter`])
//! - [`output`] - atomic staging of finalized files ([`OutputStage`])
//! - [`partition`] - results per input grouping ([`OutputItem`])
//! - [`batch`] - end-to-end orchestration ([`StrongNamer`], [`SigningBatch`], [`SigningReport`])
//!
//! # Examples
//!
//! Driving the engine directly, without files:
//!
//! ```rust
//! use dotsign::signing::{
//!     ComponentId, FinalizedHandle, Finalizer, GroupMembership, Signer, SigningGraph,
//! };
//! use dotsign::metadata::identity::PublicKeyToken;
//!
//! struct Collect(Vec<String>);
//!
//! impl Finalizer for Collect {
//!     fn finalize(&mut self, graph: &SigningGraph, id: ComponentId) -> dotsign::Result<FinalizedHandle> {
//!         self.0.push(graph.record(id).identity().to_string());
//!         Ok(FinalizedHandle::Staged {
//!             destination: "out".into(),
//!             token: PublicKeyToken::new([0; 8]),
//!         })
//!     }
//! }
//!
//! let mut builder = SigningGraph::builder();
//! builder.add_unsigned("App", ["Core"], GroupMembership::DIRECT);
//! builder.add_unsigned("Core", Vec::<String>::new(), GroupMembership::DIRECT);
//! let mut graph = builder.build()?;
//!
//! let mut collect = Collect(Vec::new());
//! Signer::default().run(&mut graph, &mut collect)?;
//! assert_eq!(collect.0, ["Core", "App"]);
//! # Ok::<(), dotsign::Error>(())
//! ```

pub mod batch;
pub mod config;
pub mod graph;
pub mod key;
pub mod output;
pub mod partition;
pub mod record;
pub mod rewrite;
pub mod worklist;

pub use batch::{SigningBatch, SigningReport, StrongNamer};
pub use config::SignerConfig;
pub use graph::{GraphBuilder, SigningGraph};
pub use key::{KeySource, StrongNameKey};
pub use output::{CommitReport, OutputStage, SignStatus};
pub use partition::{partition, InputEntry, InputGroup, OutputGroup, OutputItem};
pub use record::{ComponentId, ComponentRecord, ComponentState, FinalizedHandle, GroupMembership};
pub use rewrite::{
    is_qualified, qualify_visibility, visibility_fixes, MetadataWriter, ReferenceRewrite,
    RewritePlan, VisibilityFix,
};
pub use worklist::{Finalizer, Signer, SigningTrace, WorklistOrder};
