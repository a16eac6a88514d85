//! PKCS7 padding for a fixed 16-byte cipher block size.

use crate::error::{Error, Result};

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Pad data up to the next block boundary.
///
/// Always appends between 1 and [`BLOCK_SIZE`] bytes, each holding the
/// padding length, so the result is a non-empty multiple of the block
/// size even for empty input.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let padding_length = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + padding_length);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat(padding_length as u8).take(padding_length));
    padded
}

/// Remove PKCS7 padding.
///
/// # Errors
/// Rejects input that is empty, not block-aligned, or whose trailing
/// length byte falls outside `[1, BLOCK_SIZE]`.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    if padded.is_empty() || padded.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto("padded data is not block aligned".into()));
    }

    let padding_length = padded[padded.len() - 1] as usize;
    if padding_length < 1 || padding_length > BLOCK_SIZE {
        return Err(Error::Crypto("invalid padding length".into()));
    }

    Ok(padded[..padded.len() - padding_length].to_vec())
}
