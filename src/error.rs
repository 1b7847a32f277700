use std::path::PathBuf;

use thiserror::Error;

/// Builds an [`Error::Malformed`] tagged with the current source location.
macro_rules! malformed_error {
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Errors produced while reading assemblies and signing a batch.
///
/// The variants fall into two groups. Parsing errors describe why a single file could not be
/// read as a .NET assembly; the batch treats those as non-fatal and passes the file through
/// unchanged. Signing errors describe a broken batch and abort the whole run before anything
/// is committed.
///
/// ## Parsing
/// - [`Error::Malformed`] - metadata structure is inconsistent
/// - [`Error::OutOfBounds`] - a header, stream or row points past its container
/// - [`Error::NotSupported`] - not a PE image, or a PE image without a CLI header
/// - [`Error::Empty`] - zero-length input
/// - [`Error::FileError`] - the file could not be opened or read
/// - [`Error::GoblinErr`] - goblin rejected the PE headers
///
/// ## Signing
/// - [`Error::InvalidKey`] - strong-name key material could not be parsed
/// - [`Error::DanglingReference`] - unsigned reference to an assembly outside the batch
/// - [`Error::CyclicReferences`] - unsigned assemblies referencing each other in a cycle
/// - [`Error::OutputCollision`] - two assemblies would be written to the same path
/// - [`Error::Rewrite`] - producing or staging the signed image of an assembly failed
/// - [`Error::UnknownGroup`] - a grouping was queried that the batch never contained
///
/// ```rust,no_run
/// use dotsign::Error;
///
/// fn report(result: dotsign::Result<()>) {
///     match result {
///         Ok(()) => println!("batch signed"),
///         Err(Error::CyclicReferences(cycle)) => {
///             eprintln!("unsigned assemblies reference each other: {}", cycle.join(" <-> "));
///         }
///         Err(Error::DanglingReference { component, reference }) => {
///             eprintln!("{component} references {reference} which is not part of the batch");
///         }
///         Err(error) => eprintln!("signing failed: {error}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Metadata that contradicts itself, with the reader location that noticed it.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// What was inconsistent
        message: String,
        /// Reader source file
        file: &'static str,
        /// Reader source line
        line: u32,
    },

    /// A read ran past the end of the image, a stream or a table.
    #[error("Read past the end of the data")]
    OutOfBounds,

    /// The input is not a .NET assembly.
    #[error("Not a .NET assembly")]
    NotSupported,

    /// The input has no bytes.
    #[error("Input is empty")]
    Empty,

    /// I/O failure on an input, key or output file.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Miscellaneous failure described by its message.
    #[error("{0}")]
    Error(String),

    /// goblin could not parse the PE headers.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    // Signing Errors
    /// The strong-name key material could not be parsed.
    ///
    /// Raised while constructing a [`crate::signing::StrongNameKey`]; token derivation
    /// itself never fails.
    #[error("Invalid strong-name key - {0}")]
    InvalidKey(String),

    /// An unsigned assembly references an identity that is not part of the batch.
    ///
    /// Every unsigned reference has to be resolved against the batch, because the
    /// referenced assembly must be signed before the reference can carry its token.
    #[error("{component} references unsigned assembly {reference} which is not part of the batch")]
    DanglingReference {
        /// Identity of the referencing assembly
        component: String,
        /// The referenced identity that could not be found
        reference: String,
    },

    /// Unsigned assemblies reference each other in a cycle.
    ///
    /// Carries the identities that were still blocked when the worklist ran dry. No valid
    /// signing order exists for them.
    #[error("Cyclic unsigned references between: {}", .0.join(", "))]
    CyclicReferences(Vec<String>),

    /// Two different assemblies map onto the same output file.
    #[error("Output collision at {}: {first} and {second}", path.display())]
    OutputCollision {
        /// The contested output path
        path: PathBuf,
        /// Identity that claimed the path first
        first: String,
        /// Identity that tried to claim it afterwards
        second: String,
    },

    /// Producing or staging the signed image of an assembly failed.
    #[error("Failed to rewrite {component}: {source}")]
    Rewrite {
        /// Identity of the assembly being finalized
        component: String,
        /// The underlying failure
        source: Box<Error>,
    },

    /// A grouping was queried that the batch never contained.
    #[error("Unknown grouping - {0}")]
    UnknownGroup(String),
}
