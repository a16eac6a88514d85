//! Cryptographic primitives for the weftnet core.
//!
//! All cryptography uses well-audited primitives:
//!
//! - **X25519**: Key exchange (Diffie-Hellman)
//! - **Ed25519**: Digital signatures (identity, announces, link proofs)
//! - **SHA-256**: Hashing and address derivation
//! - **HKDF-SHA256**: Key derivation
//! - **AES-128-CBC + HMAC-SHA256**: Token encryption ([`Fernet`])
//!
//! Truncated hashes (the first 16 bytes of SHA-256) are used throughout
//! as compact identifiers for identities, destinations and packets.

mod fernet;
mod keys;
mod pkcs7;

pub use fernet::{Fernet, FERNET_OVERHEAD};
pub use keys::{EphemeralKeypair, SharedSecret, StaticKeypair, X25519PublicKey, X25519_KEY_SIZE};
pub use pkcs7::{pad, unpad, BLOCK_SIZE};

use crate::error::{Error, Result};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of a full SHA-256 hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// Length of a truncated hash in bytes (128 bits).
pub const TRUNCATED_HASH_LENGTH: usize = 16;

/// Compute a SHA-256 hash of the passed data.
pub fn sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute a truncated SHA-256 hash: the first 16 bytes of the digest.
pub fn truncated_hash(data: &[u8]) -> [u8; TRUNCATED_HASH_LENGTH] {
    let full = sha256(data);
    let mut out = [0u8; TRUNCATED_HASH_LENGTH];
    out.copy_from_slice(&full[..TRUNCATED_HASH_LENGTH]);
    out
}

/// Derive key material using HKDF-SHA256.
///
/// A missing salt defaults to a zero-filled block of hash length.
///
/// # Errors
/// Fails if `output_length` is zero, the input key material is empty, or
/// the requested output exceeds what HKDF can expand.
pub fn hkdf_derive(
    salt: Option<&[u8]>,
    input_key_material: &[u8],
    info: &[u8],
    output_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if output_length < 1 {
        return Err(Error::Crypto("HKDF output length must be positive".into()));
    }
    if input_key_material.is_empty() {
        return Err(Error::Crypto("HKDF input material must not be empty".into()));
    }

    let zero_salt = [0u8; HASH_LENGTH];
    let salt = salt.unwrap_or(&zero_salt);

    let hkdf = Hkdf::<Sha256>::new(Some(salt), input_key_material);
    let mut output = Zeroizing::new(vec![0u8; output_length]);
    hkdf.expand(info, &mut output)
        .map_err(|_| Error::Crypto("HKDF expansion failed".into()))?;
    Ok(output)
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
    bytes
}
