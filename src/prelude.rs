//! # dotsign Prelude
//!
//! The types needed to sign a batch, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotsign operations
pub use crate::Error;

/// The result type used throughout dotsign
pub use crate::Result;

// ================================================================================================
// Metadata
// ================================================================================================

/// Assembly identities and public-key tokens
pub use crate::metadata::identity::{AssemblyIdentity, AssemblyVersion, PublicKeyToken};

/// The binary metadata reader
pub use crate::metadata::reader::{MetadataReader, PeMetadataReader, ResolutionContext};

/// Structured view of one assembly
pub use crate::metadata::view::{AssemblyReference, AssemblyView};

// ================================================================================================
// Signing
// ================================================================================================

/// Batch orchestration
pub use crate::signing::{
    KeySource, OutputItem, SignStatus, SignerConfig, SigningBatch, SigningReport, StrongNameKey,
    StrongNamer, WorklistOrder,
};

/// Writer contract
pub use crate::signing::{MetadataWriter, ReferenceRewrite, RewritePlan, VisibilityFix};

/// Engine internals for custom drivers
pub use crate::signing::{
    ComponentId, ComponentRecord, ComponentState, FinalizedHandle, Finalizer, GroupMembership,
    Signer, SigningGraph,
};
