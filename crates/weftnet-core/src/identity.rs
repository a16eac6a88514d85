//! Cryptographic identities.
//!
//! An identity bundles two keypairs: an X25519 keypair for encryption
//! and an Ed25519 keypair for signatures. The concatenated 64-byte
//! public key hashes down to a 16-byte identity hash used as a stable
//! short identifier in addressing.
//!
//! Identities come in two flavours: public-only (verify and encrypt-to)
//! and private (additionally sign and decrypt). They are immutable once
//! loaded.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::{
    self, EphemeralKeypair, Fernet, StaticKeypair, X25519PublicKey, TRUNCATED_HASH_LENGTH,
    X25519_KEY_SIZE,
};
use crate::error::{Error, Result};
use crate::logging::short_hex;

/// Length of the combined public key: X25519(32) ‖ Ed25519(32).
pub const PUBLIC_KEY_LENGTH: usize = 64;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// How receipt proofs are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofStrategy {
    /// Signature only; the proved hash is recovered from the proof
    /// packet's destination hash.
    #[default]
    Implicit,
    /// Full packet hash followed by the signature.
    Explicit,
}

/// Private half of an identity.
struct IdentitySecrets {
    encryption: StaticKeypair,
    signing: SigningKey,
}

impl Clone for IdentitySecrets {
    fn clone(&self) -> Self {
        Self {
            encryption: self.encryption.clone(),
            signing: self.signing.clone(),
        }
    }
}

/// An asymmetric keypair bundle identifying a principal.
#[derive(Clone)]
pub struct Identity {
    public_key: X25519PublicKey,
    signature_public_key: VerifyingKey,
    secrets: Option<IdentitySecrets>,
    hash: [u8; TRUNCATED_HASH_LENGTH],
}

impl Identity {
    /// Generate a fresh identity with both private keypairs.
    pub fn create() -> Self {
        let encryption = StaticKeypair::generate();
        let signing = SigningKey::generate(&mut OsRng);

        let public_key = *encryption.public_key();
        let signature_public_key = signing.verifying_key();
        let hash = Self::hash_public_keys(&public_key, &signature_public_key);

        Self {
            public_key,
            signature_public_key,
            secrets: Some(IdentitySecrets { encryption, signing }),
            hash,
        }
    }

    /// Load a verify/encrypt-only identity from a 64-byte public key.
    ///
    /// # Errors
    /// Fails on a wrong length or an invalid Ed25519 point. A failed
    /// load means "no usable identity"; it never panics.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != PUBLIC_KEY_LENGTH {
            return Err(Error::InvalidKey(format!(
                "public key must be {} bytes, not {}",
                PUBLIC_KEY_LENGTH,
                public_key.len()
            )));
        }

        let mut encryption_bytes = [0u8; X25519_KEY_SIZE];
        encryption_bytes.copy_from_slice(&public_key[..X25519_KEY_SIZE]);
        let mut signature_bytes = [0u8; 32];
        signature_bytes.copy_from_slice(&public_key[X25519_KEY_SIZE..]);

        let public_key = X25519PublicKey::from_bytes(encryption_bytes);
        let signature_public_key = VerifyingKey::from_bytes(&signature_bytes)
            .map_err(|_| Error::InvalidKey("invalid signature public key".into()))?;
        let hash = Self::hash_public_keys(&public_key, &signature_public_key);

        Ok(Self {
            public_key,
            signature_public_key,
            secrets: None,
            hash,
        })
    }

    /// Load a full identity from a 64-byte private key, re-deriving both
    /// public keys.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        if private_key.len() != PUBLIC_KEY_LENGTH {
            return Err(Error::InvalidKey(format!(
                "private key must be {} bytes, not {}",
                PUBLIC_KEY_LENGTH,
                private_key.len()
            )));
        }

        let mut encryption_bytes = [0u8; X25519_KEY_SIZE];
        encryption_bytes.copy_from_slice(&private_key[..X25519_KEY_SIZE]);
        let mut signing_bytes = [0u8; 32];
        signing_bytes.copy_from_slice(&private_key[X25519_KEY_SIZE..]);

        let encryption = StaticKeypair::from_secret_bytes(encryption_bytes);
        let signing = SigningKey::from_bytes(&signing_bytes);

        let public_key = *encryption.public_key();
        let signature_public_key = signing.verifying_key();
        let hash = Self::hash_public_keys(&public_key, &signature_public_key);

        Ok(Self {
            public_key,
            signature_public_key,
            secrets: Some(IdentitySecrets { encryption, signing }),
            hash,
        })
    }

    fn hash_public_keys(
        public_key: &X25519PublicKey,
        signature_public_key: &VerifyingKey,
    ) -> [u8; TRUNCATED_HASH_LENGTH] {
        let mut blob = [0u8; PUBLIC_KEY_LENGTH];
        blob[..X25519_KEY_SIZE].copy_from_slice(public_key.as_bytes());
        blob[X25519_KEY_SIZE..].copy_from_slice(signature_public_key.as_bytes());
        crypto::truncated_hash(&blob)
    }

    /// The concatenated 64-byte public key.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut blob = [0u8; PUBLIC_KEY_LENGTH];
        blob[..X25519_KEY_SIZE].copy_from_slice(self.public_key.as_bytes());
        blob[X25519_KEY_SIZE..].copy_from_slice(self.signature_public_key.as_bytes());
        blob
    }

    /// Export the concatenated 64-byte private key, if loaded.
    ///
    /// # Security
    /// The returned container zeroizes on drop; handle with care.
    pub fn private_key_bytes(&self) -> Option<Zeroizing<[u8; PUBLIC_KEY_LENGTH]>> {
        self.secrets.as_ref().map(|secrets| {
            let mut blob = Zeroizing::new([0u8; PUBLIC_KEY_LENGTH]);
            blob[..X25519_KEY_SIZE].copy_from_slice(&secrets.encryption.secret_bytes());
            blob[X25519_KEY_SIZE..].copy_from_slice(&secrets.signing.to_bytes());
            blob
        })
    }

    /// The 16-byte identity hash.
    pub fn hash(&self) -> &[u8; TRUNCATED_HASH_LENGTH] {
        &self.hash
    }

    /// The identity hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// The X25519 encryption public key.
    pub fn encryption_public_key(&self) -> &X25519PublicKey {
        &self.public_key
    }

    /// The Ed25519 signature verification key.
    pub fn signature_public_key(&self) -> &VerifyingKey {
        &self.signature_public_key
    }

    // links established to a local destination sign with its identity key
    pub(crate) fn signing_key(&self) -> Option<&SigningKey> {
        self.secrets.as_ref().map(|secrets| &secrets.signing)
    }

    /// Whether this identity can sign and decrypt.
    pub fn has_private_keys(&self) -> bool {
        self.secrets.is_some()
    }

    /// Sign data with the identity's Ed25519 key.
    ///
    /// # Errors
    /// Fails with [`Error::MissingPrivateKey`] on a public-only identity.
    pub fn sign(&self, data: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
        let secrets = self.secrets.as_ref().ok_or(Error::MissingPrivateKey)?;
        Ok(secrets.signing.sign(data).to_bytes())
    }

    /// Validate a signature over data against this identity.
    pub fn validate(&self, signature: &[u8], data: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.signature_public_key.verify(data, &signature).is_ok()
    }

    /// Encrypt plaintext to this identity.
    ///
    /// A fresh ephemeral X25519 keypair is generated per call; the token
    /// is the 32-byte ephemeral public key followed by a [`Fernet`]
    /// token under a key derived from the shared secret, salted with
    /// this identity's hash.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ephemeral = EphemeralKeypair::generate();
        let shared = ephemeral.diffie_hellman(&self.public_key);
        let derived = self.derive_token_key(shared.as_bytes())?;

        let mut token = Vec::with_capacity(X25519_KEY_SIZE + plaintext.len() + 64);
        token.extend_from_slice(ephemeral.public_key().as_bytes());
        token.extend_from_slice(&Fernet::new(&derived).encrypt(plaintext));
        Ok(token)
    }

    /// Decrypt a token produced by [`Identity::encrypt`].
    ///
    /// # Errors
    /// Fails on a public-only identity, a short token, or any integrity
    /// failure in the inner token cipher.
    pub fn decrypt(&self, token: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let secrets = self.secrets.as_ref().ok_or(Error::MissingPrivateKey)?;

        if token.len() <= X25519_KEY_SIZE {
            return Err(Error::Crypto("token too short".into()));
        }

        let mut peer_bytes = [0u8; X25519_KEY_SIZE];
        peer_bytes.copy_from_slice(&token[..X25519_KEY_SIZE]);
        let peer_public = X25519PublicKey::from_bytes(peer_bytes);

        let shared = secrets.encryption.diffie_hellman(&peer_public);
        let derived = self.derive_token_key(shared.as_bytes())?;

        Fernet::new(&derived).decrypt(&token[X25519_KEY_SIZE..])
    }

    /// Build a receipt proof payload for a packet hash.
    ///
    /// Implicit proofs carry the signature alone; explicit proofs prefix
    /// it with the full 32-byte packet hash.
    pub fn make_proof(
        &self,
        packet_hash: &[u8; crypto::HASH_LENGTH],
        strategy: ProofStrategy,
    ) -> Result<Vec<u8>> {
        let signature = self.sign(packet_hash)?;
        match strategy {
            ProofStrategy::Implicit => Ok(signature.to_vec()),
            ProofStrategy::Explicit => {
                let mut proof = Vec::with_capacity(crypto::HASH_LENGTH + SIGNATURE_LENGTH);
                proof.extend_from_slice(packet_hash);
                proof.extend_from_slice(&signature);
                Ok(proof)
            }
        }
    }

    // token keys are bound to the receiving identity via the hash salt
    fn derive_token_key(&self, shared: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let derived = crypto::hkdf_derive(Some(&self.hash), shared, b"", 32)?;
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&derived);
        Ok(key)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("hash", &short_hex(&self.hash))
            .field("private", &self.has_private_keys())
            .finish()
    }
}
