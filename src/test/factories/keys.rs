//! Synthetic strong-name key material.
//!
//! The blobs are structurally valid CAPI key blobs over a 1024-bit modulus filled with a
//! seeded byte pattern. They are not usable RSA keys; the crate never performs RSA math.

const BIT_LEN: u32 = 1024;
const PUBLIC_EXPONENT: u32 = 65537;

fn modulus(seed: u8) -> Vec<u8> {
    (0..BIT_LEN / 8)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) | 0x01)
        .collect()
}

fn rsa_header(blob_type: u8, magic: &[u8; 4]) -> Vec<u8> {
    let mut blob = vec![blob_type, 0x02, 0x00, 0x00];
    blob.extend_from_slice(&0x2400_u32.to_le_bytes());
    blob.extend_from_slice(magic);
    blob.extend_from_slice(&BIT_LEN.to_le_bytes());
    blob.extend_from_slice(&PUBLIC_EXPONENT.to_le_bytes());
    blob
}

/// A `.snk` style `PRIVATEKEYBLOB` (596 bytes).
pub fn key_pair(seed: u8) -> Vec<u8> {
    let mut blob = rsa_header(0x07, b"RSA2");
    blob.extend_from_slice(&modulus(seed));

    let private_len = (BIT_LEN / 16 * 5 + BIT_LEN / 8) as usize;
    blob.extend((0..private_len).map(|i| (i as u8) ^ seed));
    blob
}

/// A CAPI `PUBLICKEYBLOB` (148 bytes).
pub fn public_key_blob(seed: u8) -> Vec<u8> {
    let mut blob = rsa_header(0x06, b"RSA1");
    blob.extend_from_slice(&modulus(seed));
    blob
}

/// The 160-byte strong-name public key matching [`key_pair`].
pub fn strong_name_public_key(seed: u8) -> Vec<u8> {
    let blob = public_key_blob(seed);

    let mut key = Vec::with_capacity(12 + blob.len());
    key.extend_from_slice(&0x2400_u32.to_le_bytes());
    key.extend_from_slice(&0x8004_u32.to_le_bytes());
    key.extend_from_slice(&(blob.len() as u32).to_le_bytes());
    key.extend_from_slice(&blob);
    key
}

/// The strong-name public key of `key_pair(1)`.
pub fn canonical_public_key() -> Vec<u8> {
    strong_name_public_key(1)
}
