use std::{fmt, str::FromStr};

use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// The 8-byte public-key token of a strong-named assembly.
///
/// The token is the last 8 bytes of the SHA-1 digest of the public key, in reverse order.
/// Bytes are stored in display order, so `b77a5c561934e089` is `[0xb7, 0x7a, ..., 0x89]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKeyToken([u8; 8]);

impl PublicKeyToken {
    /// Create a token from its bytes in display order.
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> PublicKeyToken {
        PublicKeyToken(bytes)
    }

    /// Derive the token of a public key.
    ///
    /// `public_key` is hashed as given; callers pass the canonical strong-name public key blob
    /// (or the 16-byte ECMA standard key).
    #[must_use]
    pub fn from_public_key(public_key: &[u8]) -> PublicKeyToken {
        let digest = Sha1::digest(public_key);

        let mut token = [0_u8; 8];
        for (slot, byte) in token.iter_mut().zip(digest.iter().rev()) {
            *slot = *byte;
        }

        PublicKeyToken(token)
    }

    /// Create a token from the 8 bytes stored in an `AssemblyRef` blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `data` is not exactly 8 bytes.
    pub fn from_slice(data: &[u8]) -> Result<PublicKeyToken> {
        let bytes: [u8; 8] = data.try_into().map_err(|_| {
            malformed_error!("Public key token must be 8 bytes, got {}", data.len())
        })?;

        Ok(PublicKeyToken(bytes))
    }

    /// Returns the token bytes in display order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyToken({})", self)
    }
}

impl FromStr for PublicKeyToken {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.len() != 16 || !value.is_ascii() {
            return Err(malformed_error!(
                "PublicKeyToken must be exactly 16 hex characters, got '{}'",
                value
            ));
        }

        let mut bytes = [0_u8; 8];
        for (index, slot) in bytes.iter_mut().enumerate() {
            let pair = &value[index * 2..index * 2 + 2];
            *slot = u8::from_str_radix(pair, 16)
                .map_err(|e| malformed_error!("Invalid hex in PublicKeyToken '{}': {}", value, e))?;
        }

        Ok(PublicKeyToken(bytes))
    }
}
