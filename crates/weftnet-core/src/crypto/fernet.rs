//! Fernet-style token encryption.
//!
//! A 32-byte key splits into a 16-byte HMAC signing key and a 16-byte
//! AES-128 cipher key. Tokens are `iv(16) ‖ cbc-ciphertext ‖ hmac(32)`
//! with the MAC computed over `iv ‖ ciphertext`. Unlike the eponymous
//! standard construction there is no version or timestamp header; this
//! layout is what peers put on the wire, so it is authoritative.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroizing, ZeroizeOnDrop};

use super::pkcs7;
use crate::error::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Token key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Length of the random IV prepended to every token.
const IV_SIZE: usize = 16;

/// Length of the HMAC-SHA256 tag appended to every token.
const MAC_SIZE: usize = 32;

/// Fixed per-token overhead: IV plus MAC.
pub const FERNET_OVERHEAD: usize = IV_SIZE + MAC_SIZE;

/// Authenticated token cipher over a 32-byte symmetric key.
#[derive(ZeroizeOnDrop)]
pub struct Fernet {
    signing_key: [u8; 16],
    encryption_key: [u8; 16],
}

impl Fernet {
    /// Create a token cipher from a 32-byte key.
    ///
    /// The first half keys the MAC, the second half the block cipher.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        let mut signing_key = [0u8; 16];
        let mut encryption_key = [0u8; 16];
        signing_key.copy_from_slice(&key[..16]);
        encryption_key.copy_from_slice(&key[16..]);
        Self {
            signing_key,
            encryption_key,
        }
    }

    /// Generate a fresh random token key.
    pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
        Zeroizing::new(super::random_bytes())
    }

    /// Encrypt plaintext into a token.
    ///
    /// A fresh random IV is drawn per call, so encrypting the same
    /// plaintext twice yields different tokens.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let iv: [u8; IV_SIZE] = super::random_bytes();
        let padded = pkcs7::pad(plaintext);

        let ciphertext = Aes128CbcEnc::new(&self.encryption_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        let mut token = Vec::with_capacity(IV_SIZE + ciphertext.len() + MAC_SIZE);
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let mut mac = self.mac();
        mac.update(&token);
        token.extend_from_slice(&mac.finalize().into_bytes());

        token
    }

    /// Decrypt a token.
    ///
    /// # Errors
    /// Returns a crypto error if the token is too short, misaligned,
    /// fails MAC verification (checked in constant time before any
    /// decryption), or carries invalid padding.
    pub fn decrypt(&self, token: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        // shortest valid token: iv + one cipher block + mac
        if token.len() < FERNET_OVERHEAD + pkcs7::BLOCK_SIZE {
            return Err(Error::Crypto("token too short".into()));
        }

        let (signed, tag) = token.split_at(token.len() - MAC_SIZE);
        let mut mac = self.mac();
        mac.update(signed);
        mac.verify_slice(tag)
            .map_err(|_| Error::Crypto("token MAC was invalid".into()))?;

        let (iv, ciphertext) = signed.split_at(IV_SIZE);
        if ciphertext.len() % pkcs7::BLOCK_SIZE != 0 {
            return Err(Error::Crypto("token ciphertext misaligned".into()));
        }

        let mut iv_bytes = [0u8; IV_SIZE];
        iv_bytes.copy_from_slice(iv);
        let padded = Aes128CbcDec::new(&self.encryption_key.into(), &iv_bytes.into())
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| Error::Crypto("token decryption failed".into()))?;

        Ok(Zeroizing::new(pkcs7::unpad(&padded)?))
    }

    fn mac(&self) -> HmacSha256 {
        // 16-byte keys are always a valid HMAC key length
        HmacSha256::new_from_slice(&self.signing_key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"))
    }
}
