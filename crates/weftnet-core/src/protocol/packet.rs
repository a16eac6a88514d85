//! Binary packet encode/decode and hash derivation.
//!
//! Packets are encoded once at construction (or captured raw at decode)
//! and immutable afterwards, so the cached packet hash can never drift
//! from the bytes that produced it.

use super::types::{DestinationType, HeaderType, PacketContext, PacketType, TransportType};
use crate::crypto::{self, HASH_LENGTH, TRUNCATED_HASH_LENGTH};
use crate::error::{Error, Result};
use crate::logging::short_hex;
use std::fmt;

/// Length of a destination hash in bytes.
pub const DESTINATION_HASH_LENGTH: usize = TRUNCATED_HASH_LENGTH;

/// Smallest decodable packet: flags, hops, destination hash, context.
const MIN_PACKET_LENGTH: usize = 2 + DESTINATION_HASH_LENGTH + 1;

/// A single wire message.
#[derive(Clone)]
pub struct Packet {
    header_type: HeaderType,
    context_flag: bool,
    transport_type: TransportType,
    destination_type: DestinationType,
    packet_type: PacketType,
    hops: u8,
    transport_id: Option<[u8; DESTINATION_HASH_LENGTH]>,
    destination_hash: [u8; DESTINATION_HASH_LENGTH],
    context: PacketContext,
    payload: Vec<u8>,
    raw: Vec<u8>,
    packet_hash: [u8; HASH_LENGTH],
}

impl Packet {
    /// Build and encode an outbound packet.
    ///
    /// Outbound packets always use the single-hop header, broadcast
    /// transport and a zero hop count; relayed headers only occur on
    /// inbound traffic.
    pub fn new(
        packet_type: PacketType,
        context: PacketContext,
        context_flag: bool,
        destination_type: DestinationType,
        destination_hash: [u8; DESTINATION_HASH_LENGTH],
        payload: Vec<u8>,
    ) -> Self {
        let mut packet = Self {
            header_type: HeaderType::Type1,
            context_flag,
            transport_type: TransportType::Broadcast,
            destination_type,
            packet_type,
            hops: 0,
            transport_id: None,
            destination_hash,
            context,
            payload,
            raw: Vec::new(),
            packet_hash: [0u8; HASH_LENGTH],
        };
        packet.raw = packet.encode();
        packet.packet_hash = crypto::sha256(&packet.hashable_part());
        packet
    }

    /// Decode a packet from deframed carrier bytes.
    ///
    /// The packet hash is computed and cached immediately.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_PACKET_LENGTH {
            return Err(Error::Protocol("packet too short".into()));
        }

        let flags = bytes[0];
        let hops = bytes[1];

        let header_type = HeaderType::from_bit((flags & 0b0100_0000) >> 6);
        let context_flag = (flags & 0b0010_0000) != 0;
        let transport_type = TransportType::from_bit((flags & 0b0001_0000) >> 4);
        let destination_type = DestinationType::from_bits((flags & 0b0000_1100) >> 2)?;
        let packet_type = PacketType::from_bits(flags & 0b0000_0011)?;

        let mut offset = 2;
        let transport_id = match header_type {
            HeaderType::Type1 => None,
            HeaderType::Type2 => {
                if bytes.len() < MIN_PACKET_LENGTH + DESTINATION_HASH_LENGTH {
                    return Err(Error::Protocol("relay packet too short".into()));
                }
                let mut id = [0u8; DESTINATION_HASH_LENGTH];
                id.copy_from_slice(&bytes[offset..offset + DESTINATION_HASH_LENGTH]);
                offset += DESTINATION_HASH_LENGTH;
                Some(id)
            }
        };

        let mut destination_hash = [0u8; DESTINATION_HASH_LENGTH];
        destination_hash.copy_from_slice(&bytes[offset..offset + DESTINATION_HASH_LENGTH]);
        offset += DESTINATION_HASH_LENGTH;

        let context = PacketContext::from_byte(bytes[offset])?;
        offset += 1;

        let payload = bytes[offset..].to_vec();

        let mut packet = Self {
            header_type,
            context_flag,
            transport_type,
            destination_type,
            packet_type,
            hops,
            transport_id,
            destination_hash,
            context,
            payload,
            raw: bytes.to_vec(),
            packet_hash: [0u8; HASH_LENGTH],
        };
        packet.packet_hash = crypto::sha256(&packet.hashable_part());
        Ok(packet)
    }

    fn encode(&self) -> Vec<u8> {
        let flags = (self.header_type.to_bit() << 6)
            | ((self.context_flag as u8) << 5)
            | (self.transport_type.to_bit() << 4)
            | (self.destination_type.to_bits() << 2)
            | self.packet_type.to_bits();

        let mut raw = Vec::with_capacity(MIN_PACKET_LENGTH + self.payload.len());
        raw.push(flags);
        raw.push(self.hops);
        if let Some(transport_id) = &self.transport_id {
            raw.extend_from_slice(transport_id);
        }
        raw.extend_from_slice(&self.destination_hash);
        raw.push(self.context.to_byte());
        raw.extend_from_slice(&self.payload);
        raw
    }

    /// The hashed subset of the encoded bytes.
    ///
    /// The first byte keeps only the destination-type and packet-type
    /// bits, and the hop count (plus any transport id) is skipped, so a
    /// relayed packet keeps a stable identity hash even though relays
    /// rewrite the header.
    fn hashable_part(&self) -> Vec<u8> {
        let after_header = match self.header_type {
            HeaderType::Type1 => &self.raw[2..],
            HeaderType::Type2 => &self.raw[2 + DESTINATION_HASH_LENGTH..],
        };
        let mut hashable = Vec::with_capacity(1 + after_header.len());
        hashable.push(self.raw[0] & 0b0000_1111);
        hashable.extend_from_slice(after_header);
        hashable
    }

    /// The encoded wire bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The full 32-byte packet hash.
    pub fn packet_hash(&self) -> &[u8; HASH_LENGTH] {
        &self.packet_hash
    }

    /// The first 16 bytes of the packet hash.
    pub fn truncated_hash(&self) -> [u8; TRUNCATED_HASH_LENGTH] {
        let mut truncated = [0u8; TRUNCATED_HASH_LENGTH];
        truncated.copy_from_slice(&self.packet_hash[..TRUNCATED_HASH_LENGTH]);
        truncated
    }

    /// Header layout variant.
    pub fn header_type(&self) -> HeaderType {
        self.header_type
    }

    /// Whether the context flag bit is set.
    pub fn context_flag(&self) -> bool {
        self.context_flag
    }

    /// Transport propagation variant.
    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    /// The 2-bit destination type.
    pub fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    /// The 2-bit packet type.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Hop count, zero at origin.
    pub fn hops(&self) -> u8 {
        self.hops
    }

    /// Transport relay id, present only with [`HeaderType::Type2`].
    pub fn transport_id(&self) -> Option<&[u8; DESTINATION_HASH_LENGTH]> {
        self.transport_id.as_ref()
    }

    /// The destination hash this packet is addressed to.
    pub fn destination_hash(&self) -> &[u8; DESTINATION_HASH_LENGTH] {
        &self.destination_hash
    }

    /// The context byte.
    pub fn context(&self) -> PacketContext {
        self.context
    }

    /// The payload bytes after the header.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type", &self.packet_type)
            .field("context", &self.context)
            .field("destination", &short_hex(&self.destination_hash))
            .field("hops", &self.hops)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            DestinationType::Single,
            [0x42u8; DESTINATION_HASH_LENGTH],
            b"payload bytes".to_vec(),
        )
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let packet = sample_packet();
        let decoded = Packet::decode(packet.raw()).expect("should decode");

        assert_eq!(decoded.packet_type(), packet.packet_type());
        assert_eq!(decoded.context(), packet.context());
        assert_eq!(decoded.destination_type(), packet.destination_type());
        assert_eq!(decoded.destination_hash(), packet.destination_hash());
        assert_eq!(decoded.payload(), packet.payload());
        assert_eq!(decoded.packet_hash(), packet.packet_hash());
    }

    #[test]
    fn test_flag_byte_layout() {
        let packet = Packet::new(
            PacketType::Announce,
            PacketContext::None,
            true,
            DestinationType::Single,
            [0u8; DESTINATION_HASH_LENGTH],
            Vec::new(),
        );
        // header1(0), ctxflag(1), broadcast(0), single(00), announce(01)
        assert_eq!(packet.raw()[0], 0b0010_0001);
        assert_eq!(packet.raw()[1], 0);
    }

    #[test]
    fn test_relay_header_decode() {
        let packet = sample_packet();
        let mut relayed = packet.raw().to_vec();
        // rewrite as a transport relay would: set the header-type bit,
        // bump hops and insert a transport id
        relayed[0] |= 0b0100_0000;
        relayed[1] = 3;
        let transport_id = [0xaau8; DESTINATION_HASH_LENGTH];
        relayed.splice(2..2, transport_id.iter().copied());

        let decoded = Packet::decode(&relayed).expect("should decode");
        assert_eq!(decoded.header_type(), HeaderType::Type2);
        assert_eq!(decoded.hops(), 3);
        assert_eq!(decoded.transport_id(), Some(&transport_id));
        assert_eq!(decoded.destination_hash(), packet.destination_hash());
        assert_eq!(decoded.payload(), packet.payload());
    }

    #[test]
    fn test_hash_stable_across_relaying() {
        let packet = sample_packet();

        // hop count is excluded from the hash
        let mut hopped = packet.raw().to_vec();
        hopped[1] = 7;
        let decoded = Packet::decode(&hopped).expect("should decode");
        assert_eq!(decoded.packet_hash(), packet.packet_hash());

        // so are the header-type and context-flag bits, and the
        // transport id a relay inserts
        let mut relayed = packet.raw().to_vec();
        relayed[0] |= 0b0110_0000 | 0b0100_0000;
        relayed[1] = 1;
        relayed.splice(2..2, [0x11u8; DESTINATION_HASH_LENGTH]);
        let decoded = Packet::decode(&relayed).expect("should decode");
        assert_eq!(decoded.packet_hash(), packet.packet_hash());
    }

    #[test]
    fn test_hash_covers_payload_and_addressing() {
        let packet = sample_packet();

        let mut other = packet.raw().to_vec();
        let last = other.len() - 1;
        other[last] ^= 0xff;
        let decoded = Packet::decode(&other).expect("should decode");
        assert_ne!(decoded.packet_hash(), packet.packet_hash());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(Packet::decode(&[]).is_err());
        assert!(Packet::decode(&[0u8; MIN_PACKET_LENGTH - 1]).is_err());

        // unknown context byte
        let mut raw = sample_packet().raw().to_vec();
        raw[2 + DESTINATION_HASH_LENGTH] = 0x55;
        assert!(Packet::decode(&raw).is_err());

        // relay header without room for the transport id
        let mut short = sample_packet().raw().to_vec();
        short[0] |= 0b0100_0000;
        short.truncate(MIN_PACKET_LENGTH);
        assert!(Packet::decode(&short).is_err());
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            DestinationType::Single,
            [1u8; DESTINATION_HASH_LENGTH],
            Vec::new(),
        );
        let decoded = Packet::decode(packet.raw()).expect("should decode");
        assert!(decoded.payload().is_empty());
    }
}
