//! Addressable destinations.
//!
//! A destination is named by an application name plus ordered aspect
//! strings (`app.aspect1.aspect2`), optionally bound to an identity.
//! The 10-byte name hash is computed over the name *without* the
//! identity suffix; the 16-byte address hash covers name hash plus
//! identity hash, which is what announces let peers verify.

use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::{self, TRUNCATED_HASH_LENGTH};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::logging::short_hex;
use crate::protocol::{DestinationType, Packet, PacketContext, PacketType};

/// Length of a destination name hash in bytes (80 bits).
pub const NAME_HASH_LENGTH: usize = 10;

/// Length of the random material carried in an announce.
pub const RANDOM_HASH_LENGTH: usize = 10;

/// Whether a destination terminates locally or names a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Locally terminated; inbound traffic is delivered to it.
    In,
    /// A remote peer; used for outbound addressing.
    Out,
}

/// A validated destination name.
#[derive(Debug, Clone)]
pub struct DestinationName {
    app_name: String,
    aspects: Vec<String>,
    name: String,
    name_hash: [u8; NAME_HASH_LENGTH],
}

impl DestinationName {
    /// Build a name from an application name and aspects.
    ///
    /// # Errors
    /// Dots are the component separator, so a dot inside the app name or
    /// any aspect is a caller error.
    pub fn new(app_name: &str, aspects: &[&str]) -> Result<Self> {
        if app_name.contains('.') {
            return Err(Error::InvalidName(
                "dots can't be used in app names".into(),
            ));
        }

        let mut name = String::from(app_name);
        for aspect in aspects {
            if aspect.contains('.') {
                return Err(Error::InvalidName("dots can't be used in aspects".into()));
            }
            name.push('.');
            name.push_str(aspect);
        }

        let full_hash = crypto::sha256(name.as_bytes());
        let mut name_hash = [0u8; NAME_HASH_LENGTH];
        name_hash.copy_from_slice(&full_hash[..NAME_HASH_LENGTH]);

        Ok(Self {
            app_name: app_name.to_string(),
            aspects: aspects.iter().map(|a| a.to_string()).collect(),
            name,
            name_hash,
        })
    }

    /// The application name component.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The aspect components in order.
    pub fn aspects(&self) -> &[String] {
        &self.aspects
    }

    /// The dot-joined name, without any identity suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 10-byte name hash.
    pub fn name_hash(&self) -> &[u8; NAME_HASH_LENGTH] {
        &self.name_hash
    }

    /// The fully expanded name including an identity suffix.
    pub fn expand_with_identity(&self, identity: &Identity) -> String {
        format!("{}.{}", self.name, identity.hash_hex())
    }
}

/// An addressable endpoint, optionally owned by an identity.
pub struct Destination {
    name: DestinationName,
    identity: Option<Identity>,
    direction: Direction,
    destination_type: DestinationType,
    hash: [u8; TRUNCATED_HASH_LENGTH],
}

impl Destination {
    /// Create a destination.
    ///
    /// Only [`DestinationType::Single`] destinations can be
    /// instantiated; group and plain types exist on the wire but have no
    /// local entity, and link addressing is handled by links themselves.
    pub fn new(
        identity: Option<Identity>,
        direction: Direction,
        destination_type: DestinationType,
        name: DestinationName,
    ) -> Result<Self> {
        if destination_type != DestinationType::Single {
            return Err(Error::Unsupported(format!(
                "cannot instantiate {:?} destinations",
                destination_type
            )));
        }

        let hash = Self::address_hash(identity.as_ref(), &name);
        Ok(Self {
            name,
            identity,
            direction,
            destination_type,
            hash,
        })
    }

    /// Derive the 16-byte address hash for a name and optional identity.
    ///
    /// With an identity the hash covers `name_hash ‖ identity_hash`;
    /// without one it covers the name hash alone (an unaddressed
    /// placeholder).
    pub fn address_hash(
        identity: Option<&Identity>,
        name: &DestinationName,
    ) -> [u8; TRUNCATED_HASH_LENGTH] {
        let mut material = Vec::with_capacity(NAME_HASH_LENGTH + TRUNCATED_HASH_LENGTH);
        material.extend_from_slice(name.name_hash());
        if let Some(identity) = identity {
            material.extend_from_slice(identity.hash());
        }
        crypto::truncated_hash(&material)
    }

    /// The 16-byte address hash.
    pub fn hash(&self) -> &[u8; TRUNCATED_HASH_LENGTH] {
        &self.hash
    }

    /// The owning identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Local or remote.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The destination type.
    pub fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    /// The validated name.
    pub fn name(&self) -> &DestinationName {
        &self.name
    }

    /// Encrypt a payload to this destination.
    ///
    /// # Errors
    /// Requires a single-type destination with a known identity.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match (&self.destination_type, &self.identity) {
            (DestinationType::Single, Some(identity)) => identity.encrypt(plaintext),
            _ => Err(Error::Unsupported(
                "encryption requires a single destination with an identity".into(),
            )),
        }
    }

    /// Decrypt a payload addressed to this destination.
    ///
    /// # Errors
    /// Requires a single-type destination with a private identity.
    pub fn decrypt(&self, token: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match (&self.destination_type, &self.identity) {
            (DestinationType::Single, Some(identity)) => identity.decrypt(token),
            _ => Err(Error::Unsupported(
                "decryption requires a single destination with an identity".into(),
            )),
        }
    }

    /// Build a signed announce packet for this destination.
    ///
    /// Payload layout: `public_key(64) ‖ name_hash(10) ‖ random(10) ‖
    /// signature(64) ‖ app_data?`, signed over the same fields prefixed
    /// with the destination hash. No ratchet key is sent, so the context
    /// flag stays clear.
    pub fn announce_packet(&self, app_data: Option<&[u8]>) -> Result<Packet> {
        let identity = self.identity.as_ref().ok_or(Error::MissingPrivateKey)?;

        // 5 random bytes, then 5 more in the slot peers fill with a
        // truncated timestamp (upstream fills it randomly as well)
        let mut random_hash = [0u8; RANDOM_HASH_LENGTH];
        random_hash[..5].copy_from_slice(&crypto::random_bytes::<5>());
        random_hash[5..].copy_from_slice(&crypto::random_bytes::<5>());

        let public_key = identity.public_key_bytes();

        let mut signed_data = Vec::new();
        signed_data.extend_from_slice(&self.hash);
        signed_data.extend_from_slice(&public_key);
        signed_data.extend_from_slice(self.name.name_hash());
        signed_data.extend_from_slice(&random_hash);
        if let Some(app_data) = app_data {
            signed_data.extend_from_slice(app_data);
        }

        let signature = identity.sign(&signed_data)?;

        let mut announce_data = Vec::new();
        announce_data.extend_from_slice(&public_key);
        announce_data.extend_from_slice(self.name.name_hash());
        announce_data.extend_from_slice(&random_hash);
        announce_data.extend_from_slice(&signature);
        if let Some(app_data) = app_data {
            announce_data.extend_from_slice(app_data);
        }

        Ok(Packet::new(
            PacketType::Announce,
            PacketContext::None,
            false,
            self.destination_type,
            self.hash,
            announce_data,
        ))
    }

    /// Build an encrypted data packet addressed to this destination.
    pub fn data_packet(&self, data: &[u8]) -> Result<Packet> {
        let ciphertext = self.encrypt(data)?;
        Ok(Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            self.destination_type,
            self.hash,
            ciphertext,
        ))
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name.name())
            .field("hash", &short_hex(&self.hash))
            .field("direction", &self.direction)
            .finish()
    }
}
