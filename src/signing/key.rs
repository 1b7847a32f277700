//! Strong-name key material and the public-key fingerprint.
//!
//! Three encodings are accepted by [`StrongNameKey::from_bytes`]:
//!
//! - a CAPI `PRIVATEKEYBLOB` as written by `sn -k` (`.snk`, blob type `0x07`, `RSA2`)
//! - a CAPI `PUBLICKEYBLOB` (blob type `0x06`, `RSA1`), for delay-signing style runs
//! - a strong-name public key: the 12-byte `SigAlgId`/`HashAlgId`/`cbPublicKey` header followed
//!   by a `PUBLICKEYBLOB`, as stored in the `Assembly` table
//!
//! Whatever the input, [`StrongNameKey::public_key`] is the canonical strong-name public key and
//! [`StrongNameKey::public_key_token`] its token.

use std::{fmt, fs, path::PathBuf};

use crate::{metadata::identity::PublicKeyToken, Error, Parser, Result};

const PUBLICKEYBLOB: u8 = 0x06;
const PRIVATEKEYBLOB: u8 = 0x07;
const CUR_BLOB_VERSION: u8 = 0x02;
const RSA1_MAGIC: u32 = 0x3141_5352;
const RSA2_MAGIC: u32 = 0x3241_5352;
const CALG_RSA_SIGN: u32 = 0x0000_2400;
const CALG_SHA1: u32 = 0x0000_8004;
/// `BLOBHEADER` + `RSAPUBKEY`
const RSA_BLOB_HEADER_SIZE: usize = 20;
/// `SigAlgId` + `HashAlgId` + `cbPublicKey`
const STRONG_NAME_HEADER_SIZE: usize = 12;

/// Where the key material of a run comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// A key file on disk (`.snk` or public key)
    File(PathBuf),
    /// Key bytes held in memory
    Bytes(Vec<u8>),
}

/// Key material shared by every component of a run.
#[derive(Clone)]
pub struct StrongNameKey {
    key_blob: Vec<u8>,
    public_key: Vec<u8>,
    token: PublicKeyToken,
    bit_len: u32,
    has_private_key: bool,
}

struct RsaBlob {
    blob_type: u8,
    bit_len: u32,
    public_exponent: u32,
    modulus: Vec<u8>,
}

impl StrongNameKey {
    /// Load key material from `source`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the key file cannot be read, or
    /// [`crate::Error::InvalidKey`] if the bytes are not a supported key encoding.
    pub fn from_source(source: &KeySource) -> Result<StrongNameKey> {
        match source {
            KeySource::File(path) => Self::from_bytes(&fs::read(path)?),
            KeySource::Bytes(data) => Self::from_bytes(data),
        }
    }

    /// Parse key material.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidKey`] if `data` is truncated, carries an unknown blob type
    /// or magic, or its lengths do not match the declared modulus size.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use dotsign::signing::StrongNameKey;
    ///
    /// let key = StrongNameKey::from_bytes(&std::fs::read("release.snk")?)?;
    /// println!("PublicKeyToken={}", key.public_key_token());
    /// # Ok::<(), dotsign::Error>(())
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<StrongNameKey> {
        let (blob, rsa) = match data.first() {
            Some(&PRIVATEKEYBLOB | &PUBLICKEYBLOB) => (data, parse_rsa_blob(data)?),
            Some(_) if data.len() > STRONG_NAME_HEADER_SIZE => {
                let blob = strong_name_payload(data)?;
                (blob, parse_rsa_blob(blob)?)
            }
            _ => return Err(invalid_key("unrecognized key format")),
        };

        let public_key = canonical_public_key(&rsa);
        let token = PublicKeyToken::from_public_key(&public_key);

        Ok(StrongNameKey {
            key_blob: blob.to_vec(),
            public_key,
            token,
            bit_len: rsa.bit_len,
            has_private_key: rsa.blob_type == PRIVATEKEYBLOB,
        })
    }

    /// The canonical strong-name public key, as embedded in a signed `Assembly` row.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Lowercase hex of [`StrongNameKey::public_key`], the form used by `PublicKey=` clauses.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        self.public_key
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// The fingerprint of the public key.
    #[must_use]
    pub fn public_key_token(&self) -> PublicKeyToken {
        self.token
    }

    /// The CAPI blob the key was loaded from, for writers that compute the RSA signature.
    #[must_use]
    pub fn key_blob(&self) -> &[u8] {
        &self.key_blob
    }

    /// RSA modulus size in bits.
    #[must_use]
    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    /// Returns `true` if the key can produce signatures.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.has_private_key
    }
}

impl fmt::Debug for StrongNameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongNameKey")
            .field("token", &self.token)
            .field("bit_len", &self.bit_len)
            .field("has_private_key", &self.has_private_key)
            .finish_non_exhaustive()
    }
}

fn invalid_key(message: &str) -> Error {
    Error::InvalidKey(message.to_string())
}

fn strong_name_payload(data: &[u8]) -> Result<&[u8]> {
    let mut parser = Parser::new(data);
    let _sig_alg_id = parser.read_le::<u32>()?;
    let _hash_alg_id = parser.read_le::<u32>()?;
    let size = parser.read_le::<u32>()? as usize;

    if size != parser.remaining() {
        return Err(invalid_key("public key length does not match its header"));
    }

    parser.read_bytes(size)
}

fn parse_rsa_blob(data: &[u8]) -> Result<RsaBlob> {
    if data.len() < RSA_BLOB_HEADER_SIZE {
        return Err(invalid_key("truncated key blob"));
    }

    let mut parser = Parser::new(data);
    let blob_type = parser.read_le::<u8>()?;
    let version = parser.read_le::<u8>()?;
    let _reserved = parser.read_le::<u16>()?;
    let _alg_id = parser.read_le::<u32>()?;
    let magic = parser.read_le::<u32>()?;
    let bit_len = parser.read_le::<u32>()?;
    let public_exponent = parser.read_le::<u32>()?;

    if version != CUR_BLOB_VERSION {
        return Err(invalid_key("unsupported key blob version"));
    }

    match (blob_type, magic) {
        (PUBLICKEYBLOB, RSA1_MAGIC) | (PRIVATEKEYBLOB, RSA2_MAGIC) => {}
        _ => return Err(invalid_key("blob type and RSA magic do not match")),
    }

    if bit_len == 0 || bit_len % 16 != 0 {
        return Err(invalid_key("invalid modulus size"));
    }

    let modulus_len = (bit_len / 8) as usize;
    let expected = if blob_type == PRIVATEKEYBLOB {
        // prime1, prime2, exponent1, exponent2, coefficient, privateExponent
        modulus_len + (bit_len / 16) as usize * 5 + modulus_len
    } else {
        modulus_len
    };

    if parser.remaining() != expected {
        return Err(invalid_key("key blob length does not match its modulus size"));
    }

    Ok(RsaBlob {
        blob_type,
        bit_len,
        public_exponent,
        modulus: parser.read_bytes(modulus_len)?.to_vec(),
    })
}

fn canonical_public_key(rsa: &RsaBlob) -> Vec<u8> {
    let blob_len = RSA_BLOB_HEADER_SIZE + rsa.modulus.len();

    let mut key = Vec::with_capacity(STRONG_NAME_HEADER_SIZE + blob_len);
    key.extend_from_slice(&CALG_RSA_SIGN.to_le_bytes());
    key.extend_from_slice(&CALG_SHA1.to_le_bytes());
    key.extend_from_slice(&(blob_len as u32).to_le_bytes());

    key.extend_from_slice(&[PUBLICKEYBLOB, CUR_BLOB_VERSION, 0x00, 0x00]);
    key.extend_from_slice(&CALG_RSA_SIGN.to_le_bytes());
    key.extend_from_slice(&RSA1_MAGIC.to_le_bytes());
    key.extend_from_slice(&rsa.bit_len.to_le_bytes());
    key.extend_from_slice(&rsa.public_exponent.to_le_bytes());
    key.extend_from_slice(&rsa.modulus);
    key
}
