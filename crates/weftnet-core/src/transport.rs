//! Packet dispatch between carriers, destinations and links.
//!
//! The transport owns the registries and routes every inbound frame
//! through one synchronous pass: decode, classify, hand off. Nothing in
//! here blocks or awaits; carriers deliver deframed byte buffers via
//! [`Transport::on_packet_received`] and hosts with genuinely parallel
//! carriers must serialize those calls (one mutex or queue around the
//! transport is enough, the registries are the only shared state).
//!
//! Malformed, unverifiable or mis-stated traffic is dropped with a log
//! line and no side effects; "drop and move on" is the cheap path.

use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::announce::Announce;
use crate::crypto;
use crate::destination::{Destination, Direction};
use crate::error::{Error, Result};
use crate::identity::ProofStrategy;
use crate::link::{Link, LinkStatus, PROOF_SIZE};
use crate::logging::short_hex;
use crate::protocol::{classify, DestinationType, Packet, PacketClass, PacketContext, PacketType};

/// Stable identifier for an attached carrier: the hash of its name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarrierId([u8; 32]);

impl CarrierId {
    /// Derive the id for a carrier name.
    pub fn of_name(name: &str) -> Self {
        Self(crypto::sha256(name.as_bytes()))
    }

    /// The raw id bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for CarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CarrierId({})", short_hex(&self.0))
    }
}

/// A byte transport attached to the dispatcher.
///
/// Implementations frame/deframe and move raw bytes; they must call
/// [`Transport::on_packet_received`] once per complete, unescaped frame.
pub trait Carrier: Send {
    /// Bring the carrier up. Called once when attached.
    fn connect(&mut self) -> Result<()>;

    /// Transmit one frame worth of packet bytes.
    fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Human-readable carrier name; its hash is the carrier id.
    fn name(&self) -> &str;
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportConfig {
    /// How receipt proofs for opportunistic packets are encoded.
    pub proof_strategy: ProofStrategy,
}

/// Why a link left the active part of its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close packet.
    Remote,
    /// This side closed the link.
    Local,
    /// Establishment timed out.
    Timeout,
}

/// Notifications emitted by the dispatcher.
///
/// Per link, `LinkEstablished` fires at most once and always before the
/// first `LinkPacket` for that link.
#[derive(Debug)]
pub enum TransportEvent {
    /// A validated announce arrived.
    Announce {
        /// The validated announce.
        announce: Announce,
        /// Carrier the announce arrived on.
        carrier: CarrierId,
    },
    /// Decrypted data arrived for a registered destination.
    PacketReceived {
        /// The addressed destination.
        destination_hash: [u8; 16],
        /// Decrypted payload.
        data: Vec<u8>,
        /// The original packet, kept for proof issuance.
        packet: Packet,
        /// Carrier the packet arrived on.
        carrier: CarrierId,
    },
    /// A remote peer wants to establish a link; accept it with
    /// [`Transport::accept_link`] or ignore it.
    LinkRequest {
        /// Id of the pending link.
        link_id: [u8; 16],
        /// The destination the request targeted.
        destination_hash: [u8; 16],
    },
    /// A link reached the active state.
    LinkEstablished {
        /// The established link.
        link_id: [u8; 16],
        /// Settled round-trip time.
        rtt: Duration,
    },
    /// Decrypted session data arrived over an active link.
    LinkPacket {
        /// The carrying link.
        link_id: [u8; 16],
        /// Decrypted payload.
        data: Vec<u8>,
        /// The original packet, kept for proof issuance.
        packet: Packet,
    },
    /// A receipt proof arrived over a link; validate it against the
    /// proved packet with [`Link::validate_packet_proof`] semantics via
    /// [`Transport::validate_link_packet_proof`].
    LinkPacketProof {
        /// The carrying link.
        link_id: [u8; 16],
        /// Decrypted proof payload: packet hash and signature.
        proof: Vec<u8>,
    },
    /// A receipt proof for an opportunistic packet arrived.
    PacketProof {
        /// Truncated hash of the packet being proved.
        proof_for: [u8; 16],
        /// Raw proof payload (signature, optionally hash-prefixed).
        payload: Vec<u8>,
        /// Carrier the proof arrived on.
        carrier: CarrierId,
    },
    /// A link left service.
    LinkClosed {
        /// The closed link.
        link_id: [u8; 16],
        /// What ended it.
        reason: CloseReason,
    },
}

struct AttachedCarrier {
    id: CarrierId,
    name: String,
    carrier: Box<dyn Carrier>,
}

/// The packet dispatcher.
pub struct Transport {
    config: TransportConfig,
    carriers: Vec<AttachedCarrier>,
    destinations: Vec<Destination>,
    links: Vec<Link>,
    events: UnboundedSender<TransportEvent>,
}

impl Transport {
    /// Create a dispatcher and the receiving end of its event channel.
    pub fn new(config: TransportConfig) -> (Self, UnboundedReceiver<TransportEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                config,
                carriers: Vec::new(),
                destinations: Vec::new(),
                links: Vec::new(),
                events,
            },
            receiver,
        )
    }

    /// Attach and connect a carrier.
    pub fn attach_carrier(&mut self, mut carrier: Box<dyn Carrier>) -> Result<CarrierId> {
        let id = CarrierId::of_name(carrier.name());
        carrier.connect()?;
        debug!(carrier = carrier.name(), "carrier attached");
        self.carriers.push(AttachedCarrier {
            id,
            name: carrier.name().to_string(),
            carrier,
        });
        Ok(id)
    }

    /// Look up an attached carrier's name.
    pub fn carrier_name(&self, id: CarrierId) -> Option<&str> {
        self.carriers
            .iter()
            .find(|attached| attached.id == id)
            .map(|attached| attached.name.as_str())
    }

    /// Register a destination and return its address hash.
    pub fn register_destination(&mut self, destination: Destination) -> [u8; 16] {
        let hash = *destination.hash();
        debug!(destination = %short_hex(&hash), "destination registered");
        self.destinations.push(destination);
        hash
    }

    /// Look up a registered destination by address hash.
    pub fn destination(&self, hash: &[u8; 16]) -> Option<&Destination> {
        self.destinations
            .iter()
            .find(|destination| destination.hash() == hash)
    }

    /// Broadcast a signed announce for a registered destination.
    pub fn announce(&mut self, destination_hash: &[u8; 16], app_data: Option<&[u8]>) -> Result<()> {
        let destination = self
            .destination(destination_hash)
            .ok_or_else(|| Error::NotFound("destination not registered".into()))?;
        let packet = destination.announce_packet(app_data)?;
        let raw = packet.raw().to_vec();
        self.send_data(&raw, None);
        Ok(())
    }

    /// Encrypt and broadcast data to a registered destination.
    pub fn send_to_destination(&mut self, destination_hash: &[u8; 16], data: &[u8]) -> Result<()> {
        let destination = self
            .destination(destination_hash)
            .ok_or_else(|| Error::NotFound("destination not registered".into()))?;
        let packet = destination.data_packet(data)?;
        let raw = packet.raw().to_vec();
        self.send_data(&raw, None);
        Ok(())
    }

    /// Initiate a link to a registered remote destination.
    ///
    /// Returns the new link's id; establishment completes asynchronously
    /// and is reported with [`TransportEvent::LinkEstablished`].
    pub fn establish_link(&mut self, destination_hash: &[u8; 16]) -> Result<[u8; 16]> {
        let destination = self
            .destination(destination_hash)
            .ok_or_else(|| Error::NotFound("destination not registered".into()))?;
        let (link, packet) = Link::establish(destination)?;
        let link_id = *link.id();
        let raw = packet.raw().to_vec();
        self.links.push(link);
        self.send_data(&raw, None);
        Ok(link_id)
    }

    /// Accept a pending inbound link, sending the establishment proof.
    pub fn accept_link(&mut self, link_id: &[u8; 16]) -> Result<()> {
        let link = self
            .link_mut(link_id)
            .ok_or_else(|| Error::NotFound("link not registered".into()))?;
        let packet = link.accept()?;
        let raw = packet.raw().to_vec();
        self.send_data(&raw, None);
        Ok(())
    }

    /// Encrypt and send data over an active link.
    pub fn send_over_link(&mut self, link_id: &[u8; 16], data: &[u8]) -> Result<()> {
        let link = self
            .link(link_id)
            .ok_or_else(|| Error::NotFound("link not registered".into()))?;
        let packet = link.data_packet(data)?;
        let raw = packet.raw().to_vec();
        self.send_data(&raw, None);
        Ok(())
    }

    /// Send a receipt proof for a packet received over an active link.
    pub fn prove_link_packet(&mut self, link_id: &[u8; 16], packet: &Packet) -> Result<()> {
        let link = self
            .link(link_id)
            .ok_or_else(|| Error::NotFound("link not registered".into()))?;
        let proof = link.prove_packet(packet)?;
        let raw = proof.raw().to_vec();
        self.send_data(&raw, None);
        Ok(())
    }

    /// Validate a link packet proof received via
    /// [`TransportEvent::LinkPacketProof`].
    pub fn validate_link_packet_proof(
        &self,
        link_id: &[u8; 16],
        proof: &[u8],
        proved_packet: &Packet,
    ) -> bool {
        self.link(link_id)
            .is_some_and(|link| link.validate_packet_proof(proof, proved_packet.packet_hash()))
    }

    /// Close a link and notify the peer.
    pub fn close_link(&mut self, link_id: &[u8; 16]) -> Result<()> {
        let link = self
            .link_mut(link_id)
            .ok_or_else(|| Error::NotFound("link not registered".into()))?;
        let packet = link.close_packet()?;
        let raw = packet.raw().to_vec();
        self.send_data(&raw, None);
        self.emit(TransportEvent::LinkClosed {
            link_id: *link_id,
            reason: CloseReason::Local,
        });
        Ok(())
    }

    /// Issue an identity receipt proof for an opportunistically received
    /// packet, sent only on the carrier it arrived on.
    pub fn prove_packet(&mut self, packet: &Packet, carrier: CarrierId) -> Result<()> {
        let identity = self
            .destinations
            .iter()
            .find_map(|destination| {
                if destination.hash() == packet.destination_hash() {
                    destination
                        .identity()
                        .filter(|identity| identity.has_private_keys())
                } else {
                    None
                }
            })
            .ok_or_else(|| Error::NotFound("no local identity for packet".into()))?;

        let payload = identity.make_proof(packet.packet_hash(), self.config.proof_strategy)?;
        let proof = Packet::new(
            PacketType::Proof,
            PacketContext::None,
            false,
            DestinationType::Single,
            packet.truncated_hash(),
            payload,
        );
        let raw = proof.raw().to_vec();
        self.send_data(&raw, Some(carrier));
        Ok(())
    }

    /// Current lifecycle state of a link.
    pub fn link_status(&self, link_id: &[u8; 16]) -> Option<LinkStatus> {
        self.link(link_id).map(Link::status)
    }

    /// Settled round-trip time of a link.
    pub fn link_rtt(&self, link_id: &[u8; 16]) -> Option<Duration> {
        self.link(link_id).and_then(Link::rtt)
    }

    /// Transition links stuck in establishment past their deadline.
    ///
    /// Hosts call this periodically; a link going stale is reported as
    /// [`TransportEvent::LinkClosed`] with [`CloseReason::Timeout`].
    pub fn sweep_stale_links(&mut self) {
        let now = Instant::now();
        let mut stale = Vec::new();
        for link in &mut self.links {
            if link.check_timeout(now) {
                stale.push(*link.id());
            }
        }
        for link_id in stale {
            self.emit(TransportEvent::LinkClosed {
                link_id,
                reason: CloseReason::Timeout,
            });
        }
    }

    /// Entry point for carriers: one call per complete deframed frame.
    ///
    /// Never propagates errors back to the carrier; every failure mode
    /// is a logged drop.
    pub fn on_packet_received(&mut self, frame: &[u8], carrier: CarrierId) {
        // frames with the high bit set open an interface-authentication
        // extension this core does not speak
        if frame.first().is_some_and(|byte| byte & 0x80 == 0x80) {
            debug!("skipping interface-authenticated frame");
            return;
        }

        let packet = match Packet::decode(frame) {
            Ok(packet) => packet,
            Err(error) => {
                debug!(%error, "dropping undecodable frame");
                return;
            }
        };

        match classify(
            packet.packet_type(),
            packet.context(),
            packet.destination_type(),
        ) {
            PacketClass::Announce => self.handle_announce(packet, carrier),
            PacketClass::LinkData => self.handle_link_data(packet),
            PacketClass::LinkRtt => self.handle_link_rtt(packet),
            PacketClass::LinkClose => self.handle_link_close(packet),
            PacketClass::LinkPacketProof => self.handle_link_packet_proof(packet),
            PacketClass::DestinationData => self.handle_destination_data(packet, carrier),
            PacketClass::LinkRequest => self.handle_link_request(packet),
            PacketClass::LinkRequestProof => self.handle_link_request_proof(packet),
            PacketClass::PacketProof => self.emit(TransportEvent::PacketProof {
                proof_for: *packet.destination_hash(),
                payload: packet.payload().to_vec(),
                carrier,
            }),
            PacketClass::Unsupported => {
                debug!(packet = ?packet, "dropping unroutable packet");
            }
        }
    }

    /// Fan packet bytes out to one carrier or all of them.
    pub fn send_data(&mut self, data: &[u8], target: Option<CarrierId>) {
        for attached in &mut self.carriers {
            if target.is_some_and(|target| target != attached.id) {
                continue;
            }
            if let Err(error) = attached.carrier.send_data(data) {
                warn!(carrier = attached.name.as_str(), %error, "carrier send failed");
            }
        }
    }

    fn handle_announce(&mut self, packet: Packet, carrier: CarrierId) {
        // no self-announce processing
        let local = self.destinations.iter().any(|destination| {
            destination.direction() == Direction::In
                && destination.hash() == packet.destination_hash()
        });
        if local {
            return;
        }

        match Announce::from_packet(&packet) {
            Ok(announce) => {
                debug!(
                    destination = %short_hex(announce.destination_hash()),
                    hops = announce.hops(),
                    "validated announce"
                );
                self.emit(TransportEvent::Announce { announce, carrier });
            }
            Err(error) => debug!(%error, "dropping invalid announce"),
        }
    }

    fn handle_destination_data(&mut self, packet: Packet, carrier: CarrierId) {
        let mut deliveries = Vec::new();
        for destination in &self.destinations {
            if destination.hash() != packet.destination_hash() {
                continue;
            }
            match destination.decrypt(packet.payload()) {
                Ok(plaintext) => deliveries.push(plaintext.to_vec()),
                Err(error) => {
                    debug!(
                        destination = %short_hex(destination.hash()),
                        %error,
                        "dropping undecryptable packet"
                    );
                }
            }
        }
        for data in deliveries {
            self.emit(TransportEvent::PacketReceived {
                destination_hash: *packet.destination_hash(),
                data,
                packet: packet.clone(),
                carrier,
            });
        }
    }

    fn handle_link_data(&mut self, packet: Packet) {
        // links only receive session payloads once active
        let Some(link) = self
            .links
            .iter()
            .find(|link| link.id() == packet.destination_hash() && link.status() == LinkStatus::Active)
        else {
            debug!(
                link = %short_hex(packet.destination_hash()),
                "dropping data for inactive link"
            );
            return;
        };

        match link.handle_data(&packet) {
            Ok(plaintext) => {
                let link_id = *link.id();
                self.emit(TransportEvent::LinkPacket {
                    link_id,
                    data: plaintext.to_vec(),
                    packet,
                });
            }
            Err(error) => debug!(%error, "dropping undecryptable link packet"),
        }
    }

    fn handle_link_rtt(&mut self, packet: Packet) {
        let established = {
            let Some(link) = self
                .links
                .iter_mut()
                .find(|link| link.id() == packet.destination_hash())
            else {
                return;
            };
            match link.handle_rtt(&packet) {
                Ok(()) => Some((*link.id(), link.rtt().unwrap_or_default())),
                Err(error) => {
                    debug!(%error, "ignoring rtt packet");
                    None
                }
            }
        };

        if let Some((link_id, rtt)) = established {
            self.emit(TransportEvent::LinkEstablished { link_id, rtt });
        }
    }

    fn handle_link_close(&mut self, packet: Packet) {
        let closed = {
            let Some(link) = self
                .links
                .iter_mut()
                .find(|link| link.id() == packet.destination_hash())
            else {
                return;
            };
            match link.handle_close(&packet) {
                Ok(()) => Some(*link.id()),
                Err(error) => {
                    debug!(%error, "ignoring close packet");
                    None
                }
            }
        };

        if let Some(link_id) = closed {
            self.emit(TransportEvent::LinkClosed {
                link_id,
                reason: CloseReason::Remote,
            });
        }
    }

    fn handle_link_packet_proof(&mut self, packet: Packet) {
        let Some(link) = self
            .links
            .iter()
            .find(|link| link.id() == packet.destination_hash() && link.status() == LinkStatus::Active)
        else {
            return;
        };

        match link.decrypt_proof(&packet) {
            Ok(proof) => {
                let link_id = *link.id();
                self.emit(TransportEvent::LinkPacketProof {
                    link_id,
                    proof: proof.to_vec(),
                });
            }
            Err(error) => debug!(%error, "dropping undecryptable link proof"),
        }
    }

    fn handle_link_request(&mut self, packet: Packet) {
        let mut new_links = Vec::new();
        for destination in &self.destinations {
            if destination.hash() != packet.destination_hash()
                || destination.destination_type() != packet.destination_type()
                || destination.direction() != Direction::In
            {
                continue;
            }
            match Link::from_request(&packet, destination) {
                Ok(link) => new_links.push(link),
                Err(error) => debug!(%error, "dropping invalid link request"),
            }
        }

        for link in new_links {
            let link_id = *link.id();
            self.links.push(link);
            self.emit(TransportEvent::LinkRequest {
                link_id,
                destination_hash: *packet.destination_hash(),
            });
        }
    }

    fn handle_link_request_proof(&mut self, packet: Packet) {
        // dispatcher-level length gate, matching the expected
        // signature-plus-key payload exactly
        if packet.payload().len() != PROOF_SIZE {
            debug!("dropping link proof with unexpected length");
            return;
        }

        let established = {
            let Some(link) = self.links.iter_mut().find(|link| {
                link.id() == packet.destination_hash()
                    && link.is_initiator()
                    && link.status() == LinkStatus::Pending
            }) else {
                debug!(
                    link = %short_hex(packet.destination_hash()),
                    "no pending initiator link for proof"
                );
                return;
            };
            match link.validate_proof(&packet) {
                Ok(rtt_packet) => Some((
                    *link.id(),
                    link.rtt().unwrap_or_default(),
                    rtt_packet.raw().to_vec(),
                )),
                Err(error) => {
                    debug!(%error, "link proof validation failed");
                    None
                }
            }
        };

        if let Some((link_id, rtt, raw)) = established {
            self.send_data(&raw, None);
            self.emit(TransportEvent::LinkEstablished { link_id, rtt });
        }
    }

    fn link(&self, link_id: &[u8; 16]) -> Option<&Link> {
        self.links.iter().find(|link| link.id() == link_id)
    }

    fn link_mut(&mut self, link_id: &[u8; 16]) -> Option<&mut Link> {
        self.links.iter_mut().find(|link| link.id() == link_id)
    }

    fn emit(&self, event: TransportEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::DestinationName;
    use crate::identity::Identity;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Test carrier that records everything sent through it.
    struct QueueCarrier {
        name: String,
        outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
    }

    impl QueueCarrier {
        fn new(name: &str) -> (Self, Arc<Mutex<VecDeque<Vec<u8>>>>) {
            let outbox = Arc::new(Mutex::new(VecDeque::new()));
            (
                Self {
                    name: name.to_string(),
                    outbox: Arc::clone(&outbox),
                },
                outbox,
            )
        }
    }

    impl Carrier for QueueCarrier {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn send_data(&mut self, data: &[u8]) -> Result<()> {
            self.outbox
                .lock()
                .map_err(|_| Error::Carrier("outbox poisoned".into()))?
                .push_back(data.to_vec());
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn in_destination(identity: Identity) -> Destination {
        Destination::new(
            Some(identity),
            Direction::In,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create")
    }

    #[test]
    fn test_self_announce_is_dropped() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        let destination = in_destination(Identity::create());
        let announce = destination.announce_packet(None).expect("should announce");
        transport.register_destination(destination);

        transport.on_packet_received(announce.raw(), carrier_id);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_remote_announce_is_validated_and_emitted() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        // announce built elsewhere, not registered locally
        let destination = in_destination(Identity::create());
        let announce = destination.announce_packet(Some(b"peer")).expect("should announce");

        transport.on_packet_received(announce.raw(), carrier_id);
        match events.try_recv().expect("should emit") {
            TransportEvent::Announce { announce, carrier } => {
                assert_eq!(announce.destination_hash(), destination.hash());
                assert_eq!(carrier, carrier_id);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_announce_is_dropped() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        let destination = in_destination(Identity::create());
        let announce = destination.announce_packet(None).expect("should announce");
        let mut raw = announce.raw().to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        transport.on_packet_received(&raw, carrier_id);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_destination_data_is_decrypted_and_delivered() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        let identity = Identity::create();
        let destination = in_destination(identity.clone());
        let hash = transport.register_destination(destination);

        // a peer encrypts to the public identity
        let peer_view = Destination::new(
            Some(Identity::from_public_key(&identity.public_key_bytes()).expect("should load")),
            Direction::Out,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create");
        let packet = peer_view.data_packet(b"opportunistic hello").expect("should build");

        transport.on_packet_received(packet.raw(), carrier_id);
        match events.try_recv().expect("should emit") {
            TransportEvent::PacketReceived {
                destination_hash,
                data,
                ..
            } => {
                assert_eq!(destination_hash, hash);
                assert_eq!(data, b"opportunistic hello");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_ifac_frames_are_skipped() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        transport.on_packet_received(&[0x80, 0x00, 0x01], carrier_id);
        transport.on_packet_received(&[], carrier_id);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_data_for_inactive_link_is_not_delivered() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());
        let carrier_id = CarrierId::of_name("loop");

        // register a remote destination and initiate, leaving the link
        // pending
        let identity = Identity::create();
        let remote = Destination::new(
            Some(Identity::from_public_key(&identity.public_key_bytes()).expect("should load")),
            Direction::Out,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create");
        let remote_hash = transport.register_destination(remote);
        let (_carrier, _outbox) = QueueCarrier::new("loop");
        let link_id = transport.establish_link(&remote_hash).expect("should establish");
        assert_eq!(transport.link_status(&link_id), Some(LinkStatus::Pending));

        let stray = Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            DestinationType::Link,
            link_id,
            vec![0u8; 64],
        );
        transport.on_packet_received(stray.raw(), carrier_id);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_proof_is_sent_only_to_originating_carrier() {
        let (mut transport, _events) = Transport::new(TransportConfig {
            proof_strategy: ProofStrategy::Explicit,
        });

        let (carrier_a, outbox_a) = QueueCarrier::new("carrier-a");
        let (carrier_b, outbox_b) = QueueCarrier::new("carrier-b");
        let id_a = transport.attach_carrier(Box::new(carrier_a)).expect("should attach");
        let _id_b = transport.attach_carrier(Box::new(carrier_b)).expect("should attach");

        let identity = Identity::create();
        let destination = in_destination(identity.clone());
        transport.register_destination(destination);

        let peer_view = Destination::new(
            Some(Identity::from_public_key(&identity.public_key_bytes()).expect("should load")),
            Direction::Out,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create");
        let packet = peer_view.data_packet(b"prove this").expect("should build");
        let received = Packet::decode(packet.raw()).expect("should decode");

        transport.prove_packet(&received, id_a).expect("should prove");

        assert_eq!(outbox_a.lock().expect("lock").len(), 1);
        assert!(outbox_b.lock().expect("lock").is_empty());

        // the proof is addressed to the proved packet's truncated hash
        // and carries hash plus signature
        let proof_raw = outbox_a.lock().expect("lock").pop_front().expect("proof");
        let proof = Packet::decode(&proof_raw).expect("should decode");
        assert_eq!(proof.destination_hash(), &received.truncated_hash());
        assert_eq!(proof.payload().len(), 32 + 64);
        assert!(identity.validate(&proof.payload()[32..], received.packet_hash()));
    }

    #[test]
    fn test_implicit_proof_payload_is_signature_only() {
        let (mut transport, _events) = Transport::new(TransportConfig::default());
        let (carrier, outbox) = QueueCarrier::new("loop");
        let id = transport.attach_carrier(Box::new(carrier)).expect("should attach");

        let identity = Identity::create();
        let destination = in_destination(identity.clone());
        transport.register_destination(destination);

        let peer_view = Destination::new(
            Some(Identity::from_public_key(&identity.public_key_bytes()).expect("should load")),
            Direction::Out,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create");
        let packet = peer_view.data_packet(b"implicit").expect("should build");

        transport.prove_packet(&packet, id).expect("should prove");
        let proof_raw = outbox.lock().expect("lock").pop_front().expect("proof");
        let proof = Packet::decode(&proof_raw).expect("should decode");
        assert_eq!(proof.payload().len(), 64);
        assert!(identity.validate(proof.payload(), packet.packet_hash()));
    }

    #[test]
    fn test_sweep_reports_timeouts() {
        let (mut transport, mut events) = Transport::new(TransportConfig::default());

        let identity = Identity::create();
        let remote = Destination::new(
            Some(Identity::from_public_key(&identity.public_key_bytes()).expect("should load")),
            Direction::Out,
            DestinationType::Single,
            DestinationName::new("lxmf", &["delivery"]).expect("should build name"),
        )
        .expect("should create");
        let remote_hash = transport.register_destination(remote);
        let link_id = transport.establish_link(&remote_hash).expect("should establish");

        // nothing stale yet
        transport.sweep_stale_links();
        assert!(events.try_recv().is_err());
        assert_eq!(transport.link_status(&link_id), Some(LinkStatus::Pending));
    }
}
