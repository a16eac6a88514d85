//! Announce parsing and validation.
//!
//! An announce is a signed, broadcast proof-of-existence for a
//! destination. Validation reconstructs the announcing identity from
//! the embedded public key, checks the signature, and re-derives the
//! destination hash from the name hash and identity hash; all three
//! must hold or the announce is rejected.

use std::fmt;

use crate::crypto::{self, TRUNCATED_HASH_LENGTH};
use crate::destination::{NAME_HASH_LENGTH, RANDOM_HASH_LENGTH};
use crate::error::{Error, Result};
use crate::identity::{Identity, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use crate::logging::short_hex;
use crate::protocol::{Packet, PacketType};

/// Length of an announce ratchet key in bytes.
pub const RATCHET_LENGTH: usize = 32;

/// A validated announce, derived read-only from an `Announce` packet.
pub struct Announce {
    destination_hash: [u8; TRUNCATED_HASH_LENGTH],
    identity: Identity,
    name_hash: [u8; NAME_HASH_LENGTH],
    random_hash: [u8; RANDOM_HASH_LENGTH],
    ratchet: Option<[u8; RATCHET_LENGTH]>,
    app_data: Option<Vec<u8>>,
    hops: u8,
}

impl Announce {
    /// Parse and validate an announce from a decoded packet.
    ///
    /// # Errors
    /// Rejects non-announce packets, short payloads, invalid embedded
    /// public keys, bad signatures, and destination hashes that do not
    /// match the announced name and identity.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        if packet.packet_type() != PacketType::Announce {
            return Err(Error::Protocol("packet is not an announce".into()));
        }

        let data = packet.payload();
        let ratchet_length = if packet.context_flag() {
            RATCHET_LENGTH
        } else {
            0
        };
        let fixed_length =
            PUBLIC_KEY_LENGTH + NAME_HASH_LENGTH + RANDOM_HASH_LENGTH + ratchet_length
                + SIGNATURE_LENGTH;
        if data.len() < fixed_length {
            return Err(Error::Protocol("announce payload too short".into()));
        }

        let mut offset = 0;
        let public_key = &data[offset..offset + PUBLIC_KEY_LENGTH];
        offset += PUBLIC_KEY_LENGTH;

        let mut name_hash = [0u8; NAME_HASH_LENGTH];
        name_hash.copy_from_slice(&data[offset..offset + NAME_HASH_LENGTH]);
        offset += NAME_HASH_LENGTH;

        let mut random_hash = [0u8; RANDOM_HASH_LENGTH];
        random_hash.copy_from_slice(&data[offset..offset + RANDOM_HASH_LENGTH]);
        offset += RANDOM_HASH_LENGTH;

        let ratchet = if packet.context_flag() {
            let mut ratchet = [0u8; RATCHET_LENGTH];
            ratchet.copy_from_slice(&data[offset..offset + RATCHET_LENGTH]);
            offset += RATCHET_LENGTH;
            Some(ratchet)
        } else {
            None
        };

        let signature = &data[offset..offset + SIGNATURE_LENGTH];
        offset += SIGNATURE_LENGTH;

        let app_data = &data[offset..];

        let mut signed_data = Vec::new();
        signed_data.extend_from_slice(packet.destination_hash());
        signed_data.extend_from_slice(public_key);
        signed_data.extend_from_slice(&name_hash);
        signed_data.extend_from_slice(&random_hash);
        if let Some(ratchet) = &ratchet {
            signed_data.extend_from_slice(ratchet);
        }
        signed_data.extend_from_slice(app_data);

        let identity = Identity::from_public_key(public_key)
            .map_err(|_| Error::Protocol("announce carries an invalid public key".into()))?;

        if !identity.validate(signature, &signed_data) {
            return Err(Error::Protocol("announce signature invalid".into()));
        }

        let mut hash_material = Vec::with_capacity(NAME_HASH_LENGTH + TRUNCATED_HASH_LENGTH);
        hash_material.extend_from_slice(&name_hash);
        hash_material.extend_from_slice(identity.hash());
        let expected_hash = crypto::truncated_hash(&hash_material);
        if &expected_hash != packet.destination_hash() {
            return Err(Error::Protocol("announce destination hash mismatch".into()));
        }

        Ok(Self {
            destination_hash: *packet.destination_hash(),
            identity,
            name_hash,
            random_hash,
            ratchet,
            app_data: if app_data.is_empty() {
                None
            } else {
                Some(app_data.to_vec())
            },
            hops: packet.hops(),
        })
    }

    /// The announced destination hash.
    pub fn destination_hash(&self) -> &[u8; TRUNCATED_HASH_LENGTH] {
        &self.destination_hash
    }

    /// The identity reconstructed from the embedded public key.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The announced 10-byte name hash.
    pub fn name_hash(&self) -> &[u8; NAME_HASH_LENGTH] {
        &self.name_hash
    }

    /// The announce's random material.
    pub fn random_hash(&self) -> &[u8; RANDOM_HASH_LENGTH] {
        &self.random_hash
    }

    /// The optional ratchet key. Accepted on the wire but never sent.
    pub fn ratchet(&self) -> Option<&[u8; RATCHET_LENGTH]> {
        self.ratchet.as_ref()
    }

    /// Raw application data, if any was attached.
    pub fn app_data(&self) -> Option<&[u8]> {
        self.app_data.as_deref()
    }

    /// Hop count the announce travelled.
    pub fn hops(&self) -> u8 {
        self.hops
    }

    /// Extract a display name from the application data.
    ///
    /// App data starting with a msgpack array marker decodes as an array
    /// whose first element is the display name; anything else is treated
    /// as raw text.
    pub fn display_name(&self) -> Option<String> {
        let app_data = self.app_data.as_deref()?;
        let first = *app_data.first()?;

        // fixarray or array16 marker
        if (0x90..=0x9f).contains(&first) || first == 0xdc {
            let value = rmpv::decode::read_value(&mut &app_data[..]).ok()?;
            let items = value.as_array()?;
            match items.first()? {
                rmpv::Value::String(name) => name.as_str().map(str::to_string),
                rmpv::Value::Binary(bytes) => {
                    Some(String::from_utf8_lossy(bytes).into_owned())
                }
                _ => None,
            }
        } else {
            Some(String::from_utf8_lossy(app_data).into_owned())
        }
    }
}

impl fmt::Debug for Announce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announce")
            .field("destination", &short_hex(&self.destination_hash))
            .field("identity", &self.identity)
            .field("hops", &self.hops)
            .field("app_data_len", &self.app_data.as_ref().map(Vec::len))
            .finish()
    }
}
