//! Assembly identity and public-key tokens.
//!
//! # Key Components
//!
//! - [`AssemblyIdentity`] - Name, version, culture and public-key token of an assembly
//! - [`AssemblyVersion`] - Four-part version number
//! - [`PublicKeyToken`] - 8-byte fingerprint of a strong-name public key
//!
//! The display name produced by [`AssemblyIdentity::display_name`] is the identity string the
//! signing engine keys its records by. An unsigned `AssemblyRef` and the unsigned `Assembly` it
//! points to therefore produce the same string.
//!
//! ```rust
//! use dotsign::metadata::identity::{AssemblyIdentity, PublicKeyToken};
//!
//! let mscorlib = AssemblyIdentity::parse(
//!     "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
//! )?;
//! assert_eq!(mscorlib.public_key_token, Some("b77a5c561934e089".parse::<PublicKeyToken>()?));
//! # Ok::<(), dotsign::Error>(())
//! ```

mod assembly;
mod token;

pub use assembly::{AssemblyIdentity, AssemblyVersion};
pub use token::PublicKeyToken;
