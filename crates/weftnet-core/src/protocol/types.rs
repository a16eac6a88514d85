//! Wire enums and packet classification.
//!
//! Every field packed into the flag byte has a closed enum here, and
//! inbound traffic is classified over (packet type, context, destination
//! type) tuples so that every combination the dispatcher can see is
//! either handled or explicitly rejected.

use crate::error::{Error, Result};

/// Header layout variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    /// Normal single-hop header.
    Type1 = 0x00,
    /// Header carrying a 16-byte transport relay id.
    Type2 = 0x01,
}

impl HeaderType {
    /// Parse from the two-valued header bit.
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Type1
        } else {
            Self::Type2
        }
    }

    /// The header bit value.
    pub fn to_bit(self) -> u8 {
        self as u8
    }
}

/// Transport propagation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Flood to all carriers.
    Broadcast = 0x00,
    /// Relayed via a transport node.
    Transport = 0x01,
}

impl TransportType {
    /// Parse from the transport-type bit.
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Broadcast
        } else {
            Self::Transport
        }
    }

    /// The transport-type bit value.
    pub fn to_bit(self) -> u8 {
        self as u8
    }
}

/// Destination type, a 2-bit wire field.
///
/// Group and plain destinations exist on the wire but no local entity of
/// those types can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationType {
    /// Point-to-point, identity-addressed.
    Single = 0x00,
    /// Shared-key group (unsupported).
    Group = 0x01,
    /// Unencrypted (unsupported).
    Plain = 0x02,
    /// Session-scoped link traffic.
    Link = 0x03,
}

impl DestinationType {
    /// Parse the 2-bit destination type field.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0x00 => Ok(Self::Single),
            0x01 => Ok(Self::Group),
            0x02 => Ok(Self::Plain),
            0x03 => Ok(Self::Link),
            _ => Err(Error::Protocol(format!(
                "destination type out of range: {:#04x}",
                bits
            ))),
        }
    }

    /// The 2-bit field value.
    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Packet type, a 2-bit wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Application or session data.
    Data = 0x00,
    /// Signed destination announcement.
    Announce = 0x01,
    /// Link establishment request.
    LinkRequest = 0x02,
    /// Receipt or link establishment proof.
    Proof = 0x03,
}

impl PacketType {
    /// Parse the 2-bit packet type field.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0x00 => Ok(Self::Data),
            0x01 => Ok(Self::Announce),
            0x02 => Ok(Self::LinkRequest),
            0x03 => Ok(Self::Proof),
            _ => Err(Error::Protocol(format!(
                "packet type out of range: {:#04x}",
                bits
            ))),
        }
    }

    /// The 2-bit field value.
    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Packet context byte.
///
/// Contexts the core does not know are rejected at decode time; the
/// resource-transfer and request/response ranges are extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketContext {
    /// Generic data packet.
    None = 0x00,
    /// Link close message.
    LinkClose = 0xFC,
    /// Proof for a packet carried over a link.
    LinkProof = 0xFD,
    /// Link request round-trip time measurement.
    LinkRequestRtt = 0xFE,
    /// Link request proof.
    LinkRequestProof = 0xFF,
}

impl PacketContext {
    /// Parse a context byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::None),
            0xFC => Ok(Self::LinkClose),
            0xFD => Ok(Self::LinkProof),
            0xFE => Ok(Self::LinkRequestRtt),
            0xFF => Ok(Self::LinkRequestProof),
            other => Err(Error::Protocol(format!(
                "unknown packet context: {:#04x}",
                other
            ))),
        }
    }

    /// The raw context byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Closed classification of inbound packets.
///
/// The dispatcher matches this exhaustively; anything that does not fit
/// a known (type, context, destination type) combination lands in
/// [`PacketClass::Unsupported`] and is dropped with a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketClass {
    /// Signed destination announcement.
    Announce,
    /// Session payload for an active link.
    LinkData,
    /// Round-trip-time measurement finishing a link handshake.
    LinkRtt,
    /// Link teardown message.
    LinkClose,
    /// Receipt proof for a packet sent over a link.
    LinkPacketProof,
    /// Opportunistic data for a single destination.
    DestinationData,
    /// Link establishment request.
    LinkRequest,
    /// Proof answering a link establishment request.
    LinkRequestProof,
    /// Receipt proof for an opportunistic packet.
    PacketProof,
    /// A combination the core does not route.
    Unsupported,
}

/// Classify a decoded packet by its (type, context, destination type).
pub fn classify(
    packet_type: PacketType,
    context: PacketContext,
    destination_type: DestinationType,
) -> PacketClass {
    use DestinationType as D;
    use PacketContext as C;
    use PacketType as P;

    match (packet_type, context, destination_type) {
        (P::Announce, C::None, D::Single) => PacketClass::Announce,
        (P::Data, C::None, D::Link) => PacketClass::LinkData,
        (P::Data, C::LinkRequestRtt, D::Link) => PacketClass::LinkRtt,
        (P::Data, C::LinkClose, D::Link) => PacketClass::LinkClose,
        (P::Proof, C::None, D::Link) => PacketClass::LinkPacketProof,
        (P::Data, C::None, D::Single) => PacketClass::DestinationData,
        (P::LinkRequest, C::None, D::Single) => PacketClass::LinkRequest,
        (P::Proof, C::LinkRequestProof, D::Link) => PacketClass::LinkRequestProof,
        (P::Proof, C::None, D::Single) => PacketClass::PacketProof,
        _ => PacketClass::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_bit_fields_roundtrip() {
        for bits in 0..4u8 {
            assert_eq!(
                DestinationType::from_bits(bits)
                    .expect("should parse")
                    .to_bits(),
                bits
            );
            assert_eq!(
                PacketType::from_bits(bits).expect("should parse").to_bits(),
                bits
            );
        }
        assert!(DestinationType::from_bits(4).is_err());
        assert!(PacketType::from_bits(4).is_err());
    }

    #[test]
    fn test_context_roundtrip() {
        for context in [
            PacketContext::None,
            PacketContext::LinkClose,
            PacketContext::LinkProof,
            PacketContext::LinkRequestRtt,
            PacketContext::LinkRequestProof,
        ] {
            assert_eq!(
                PacketContext::from_byte(context.to_byte()).expect("should parse"),
                context
            );
        }
        assert!(PacketContext::from_byte(0x01).is_err());
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify(
                PacketType::Announce,
                PacketContext::None,
                DestinationType::Single
            ),
            PacketClass::Announce
        );
        assert_eq!(
            classify(PacketType::Data, PacketContext::None, DestinationType::Link),
            PacketClass::LinkData
        );
        // announces never target links
        assert_eq!(
            classify(
                PacketType::Announce,
                PacketContext::None,
                DestinationType::Link
            ),
            PacketClass::Unsupported
        );
        // group traffic is not routed
        assert_eq!(
            classify(PacketType::Data, PacketContext::None, DestinationType::Group),
            PacketClass::Unsupported
        );
    }
}
