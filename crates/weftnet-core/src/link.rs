//! Encrypted sessions between two destinations.
//!
//! A link is established with an ephemeral key exchange: the initiator
//! sends a link request carrying fresh X25519 and Ed25519 public keys,
//! the responder answers with a proof signed by the destination's
//! long-term identity key, and both sides derive the same session key
//! from the ephemeral Diffie-Hellman secret, salted with the link id.
//! The id doubles as the session's destination hash and is the
//! truncated hash of the encoded link request.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──▶ Handshake ──▶ Active ──▶ Closed
//!    │            │                      ▲
//!    └────────────┴──▶ Stale (timeout)   └── close packet / local close
//! ```
//!
//! The responder signs with the destination identity's long-term key;
//! only the initiator uses an ephemeral signature keypair. Validation
//! failures log and abort without corrupting link state.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{self, EphemeralKeypair, Fernet, X25519PublicKey, TRUNCATED_HASH_LENGTH};
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::identity::SIGNATURE_LENGTH;
use crate::logging::short_hex;
use crate::protocol::{DestinationType, Packet, PacketContext, PacketType};

/// Size of the link request payload: two 32-byte public keys.
pub const ECPUB_SIZE: usize = 64;

/// Size of the link request proof payload: signature plus one public key.
pub const PROOF_SIZE: usize = SIGNATURE_LENGTH + 32;

/// How long a link may sit in Pending/Handshake before going stale.
pub const ESTABLISHMENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Link lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Request sent or received, session key not yet derived.
    Pending,
    /// Session key derived, waiting for proof or RTT confirmation.
    Handshake,
    /// Established; session traffic flows.
    Active,
    /// Establishment timed out.
    Stale,
    /// Torn down by either side.
    Closed,
}

impl LinkStatus {
    /// Whether this state accepts no further traffic.
    pub fn is_terminal(self) -> bool {
        matches!(self, LinkStatus::Stale | LinkStatus::Closed)
    }
}

/// An authenticated, encrypted session between two destinations.
pub struct Link {
    id: [u8; TRUNCATED_HASH_LENGTH],
    status: LinkStatus,
    initiator: bool,
    destination_hash: [u8; TRUNCATED_HASH_LENGTH],
    ephemeral: EphemeralKeypair,
    signing: SigningKey,
    peer_public_key: X25519PublicKey,
    peer_signature_public_key: VerifyingKey,
    derived_key: Option<Zeroizing<[u8; 32]>>,
    request_time: Option<Instant>,
    activated_at: Option<Instant>,
    rtt: Option<Duration>,
    deadline: Option<Instant>,
}

impl Link {
    /// Initiate a link to a remote destination.
    ///
    /// Generates ephemeral X25519 and Ed25519 keypairs and returns the
    /// pending link together with the encoded link request packet. The
    /// link id is the truncated hash of that packet.
    ///
    /// # Errors
    /// The destination must carry the peer's identity (learned from an
    /// announce).
    pub fn establish(destination: &Destination) -> Result<(Self, Packet)> {
        let identity = destination.identity().ok_or_else(|| {
            Error::Unsupported("link establishment requires a destination identity".into())
        })?;

        let ephemeral = EphemeralKeypair::generate();
        let signing = SigningKey::generate(&mut OsRng);

        let mut request_data = Vec::with_capacity(ECPUB_SIZE);
        request_data.extend_from_slice(ephemeral.public_key().as_bytes());
        request_data.extend_from_slice(signing.verifying_key().as_bytes());

        let packet = Packet::new(
            PacketType::LinkRequest,
            PacketContext::None,
            false,
            destination.destination_type(),
            *destination.hash(),
            request_data,
        );

        let now = Instant::now();
        let link = Self {
            id: packet.truncated_hash(),
            status: LinkStatus::Pending,
            initiator: true,
            destination_hash: *destination.hash(),
            ephemeral,
            signing,
            peer_public_key: *identity.encryption_public_key(),
            peer_signature_public_key: *identity.signature_public_key(),
            derived_key: None,
            request_time: Some(now),
            activated_at: None,
            rtt: None,
            deadline: Some(now + ESTABLISHMENT_TIMEOUT),
        };

        debug!(
            link = %short_hex(&link.id),
            destination = %short_hex(destination.hash()),
            "sending link request"
        );

        Ok((link, packet))
    }

    /// Validate an inbound link request and build the responder-side
    /// link.
    ///
    /// The responder generates a fresh ephemeral X25519 keypair but
    /// signs with the destination identity's long-term key, and derives
    /// the session key immediately.
    ///
    /// # Errors
    /// Rejects payloads that are not exactly two public keys, invalid
    /// peer keys, and destinations without a private identity.
    pub fn from_request(packet: &Packet, destination: &Destination) -> Result<Self> {
        let identity = destination
            .identity()
            .ok_or(Error::MissingPrivateKey)?;
        let signing = identity.signing_key().ok_or(Error::MissingPrivateKey)?.clone();

        let data = packet.payload();
        if data.len() != ECPUB_SIZE {
            return Err(Error::Protocol(
                "link request payload length mismatch".into(),
            ));
        }

        let mut peer_public = [0u8; 32];
        peer_public.copy_from_slice(&data[..32]);
        let mut peer_signature_public = [0u8; 32];
        peer_signature_public.copy_from_slice(&data[32..]);
        let peer_signature_public_key = VerifyingKey::from_bytes(&peer_signature_public)
            .map_err(|_| Error::Protocol("link request carries an invalid signature key".into()))?;

        let now = Instant::now();
        let mut link = Self {
            id: packet.truncated_hash(),
            status: LinkStatus::Pending,
            initiator: false,
            destination_hash: *packet.destination_hash(),
            ephemeral: EphemeralKeypair::generate(),
            signing,
            peer_public_key: X25519PublicKey::from_bytes(peer_public),
            peer_signature_public_key,
            derived_key: None,
            request_time: None,
            activated_at: None,
            rtt: None,
            deadline: Some(now + ESTABLISHMENT_TIMEOUT),
        };

        link.handshake()?;

        debug!(link = %short_hex(&link.id), "validated link request");
        Ok(link)
    }

    /// Derive the session key from the ephemeral shared secret.
    ///
    /// Only valid from `Pending`. The key is HKDF output salted with the
    /// link id, so both sides agree on it exactly when they agree on the
    /// request packet bytes.
    fn handshake(&mut self) -> Result<()> {
        if self.status != LinkStatus::Pending {
            return Err(Error::LinkState(format!(
                "handshake attempted in {:?}",
                self.status
            )));
        }

        let shared = self.ephemeral.diffie_hellman(&self.peer_public_key);
        let derived = crypto::hkdf_derive(Some(&self.id), shared.as_bytes(), b"", 32)?;
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&derived);

        self.derived_key = Some(key);
        self.status = LinkStatus::Handshake;
        Ok(())
    }

    /// Accept an inbound link: build the link request proof packet.
    ///
    /// The proof payload is `sign(id ‖ eph_pub ‖ sig_pub)` followed by
    /// the responder's ephemeral public key, signed with the destination
    /// identity's long-term key. Starts the responder's RTT clock.
    pub fn accept(&mut self) -> Result<Packet> {
        if self.initiator {
            return Err(Error::LinkState("initiator cannot accept".into()));
        }
        if self.status != LinkStatus::Handshake {
            return Err(Error::LinkState(format!(
                "accept attempted in {:?}",
                self.status
            )));
        }

        let local_public = *self.ephemeral.public_key().as_bytes();
        let local_signature_public = self.signing.verifying_key().to_bytes();

        let mut signed_data = Vec::with_capacity(TRUNCATED_HASH_LENGTH + ECPUB_SIZE);
        signed_data.extend_from_slice(&self.id);
        signed_data.extend_from_slice(&local_public);
        signed_data.extend_from_slice(&local_signature_public);
        let signature = self.signing.sign(&signed_data);

        let mut proof_data = Vec::with_capacity(PROOF_SIZE);
        proof_data.extend_from_slice(&signature.to_bytes());
        proof_data.extend_from_slice(&local_public);

        self.request_time = Some(Instant::now());

        debug!(link = %short_hex(&self.id), "accepting link request");

        Ok(Packet::new(
            PacketType::Proof,
            PacketContext::LinkRequestProof,
            false,
            DestinationType::Link,
            self.id,
            proof_data,
        ))
    }

    /// Validate the responder's proof and activate the link
    /// (initiator only).
    ///
    /// On success the link turns `Active`, the measured RTT is recorded,
    /// and the returned packet reports it to the responder so both ends
    /// settle on the slower measurement.
    pub fn validate_proof(&mut self, packet: &Packet) -> Result<Packet> {
        if !self.initiator {
            return Err(Error::LinkState(
                "proof received for a link we did not initiate".into(),
            ));
        }
        if self.status != LinkStatus::Pending {
            return Err(Error::LinkState(format!(
                "proof received in {:?}",
                self.status
            )));
        }

        let data = packet.payload();
        if data.len() != PROOF_SIZE {
            return Err(Error::Protocol("link proof payload length mismatch".into()));
        }

        let signature = Signature::from_slice(&data[..SIGNATURE_LENGTH])
            .map_err(|_| Error::Protocol("malformed link proof signature".into()))?;
        let mut peer_public = [0u8; 32];
        peer_public.copy_from_slice(&data[SIGNATURE_LENGTH..]);

        // signed material: id, peer ephemeral key, peer long-term
        // signature key
        let mut signed_data = Vec::with_capacity(TRUNCATED_HASH_LENGTH + ECPUB_SIZE);
        signed_data.extend_from_slice(&self.id);
        signed_data.extend_from_slice(&peer_public);
        signed_data.extend_from_slice(self.peer_signature_public_key.as_bytes());

        self.peer_signature_public_key
            .verify(&signed_data, &signature)
            .map_err(|_| Error::Crypto("invalid link proof signature".into()))?;

        // swap the peer's static key for its ephemeral one and derive
        self.peer_public_key = X25519PublicKey::from_bytes(peer_public);
        self.handshake()?;

        let rtt = self
            .request_time
            .map(|requested| requested.elapsed())
            .unwrap_or_default();
        self.rtt = Some(rtt);
        self.activate();

        debug!(
            link = %short_hex(&self.id),
            rtt_ms = rtt.as_millis() as u64,
            "link established"
        );

        let mut rtt_data = Vec::new();
        rmpv::encode::write_value(&mut rtt_data, &rmpv::Value::F64(rtt.as_secs_f64()))
            .map_err(|_| Error::Protocol("failed to encode rtt".into()))?;
        let ciphertext = self.encrypt_payload(&rtt_data)?;

        Ok(Packet::new(
            PacketType::Data,
            PacketContext::LinkRequestRtt,
            false,
            DestinationType::Link,
            self.id,
            ciphertext,
        ))
    }

    /// Handle the initiator's RTT report and activate (responder only).
    ///
    /// The session RTT becomes the slower of the local measurement and
    /// the reported value.
    pub fn handle_rtt(&mut self, packet: &Packet) -> Result<()> {
        if self.initiator {
            return Err(Error::LinkState("rtt report received by initiator".into()));
        }
        if self.status != LinkStatus::Handshake {
            return Err(Error::LinkState(format!(
                "rtt report received in {:?}",
                self.status
            )));
        }

        let measured = self
            .request_time
            .map(|requested| requested.elapsed())
            .unwrap_or_default();

        let plaintext = self.decrypt_payload(packet.payload())?;
        let value = rmpv::decode::read_value(&mut &plaintext[..])
            .map_err(|_| Error::Protocol("malformed rtt payload".into()))?;
        let reported = match value {
            rmpv::Value::F64(v) => v,
            rmpv::Value::F32(v) => f64::from(v),
            rmpv::Value::Integer(i) => i
                .as_f64()
                .ok_or_else(|| Error::Protocol("rtt out of range".into()))?,
            _ => return Err(Error::Protocol("rtt payload is not a number".into())),
        };
        if !reported.is_finite() || reported < 0.0 {
            return Err(Error::Protocol("rtt out of range".into()));
        }

        self.rtt = Some(measured.max(Duration::from_secs_f64(reported)));
        self.activate();

        debug!(
            link = %short_hex(&self.id),
            rtt_ms = self.rtt.unwrap_or_default().as_millis() as u64,
            "link established"
        );
        Ok(())
    }

    fn activate(&mut self) {
        self.status = LinkStatus::Active;
        self.activated_at = Some(Instant::now());
        // establishment completed, cancel the timeout
        self.deadline = None;
    }

    /// Build an encrypted session data packet.
    pub fn data_packet(&self, data: &[u8]) -> Result<Packet> {
        if self.status != LinkStatus::Active {
            return Err(Error::LinkState(format!(
                "send attempted in {:?}",
                self.status
            )));
        }
        let ciphertext = self.encrypt_payload(data)?;
        Ok(Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            DestinationType::Link,
            self.id,
            ciphertext,
        ))
    }

    /// Decrypt an inbound session data payload.
    pub fn handle_data(&self, packet: &Packet) -> Result<Zeroizing<Vec<u8>>> {
        if self.status != LinkStatus::Active {
            return Err(Error::LinkState(format!(
                "data received in {:?}",
                self.status
            )));
        }
        self.decrypt_payload(packet.payload())
    }

    /// Build a receipt proof for a packet received over this link.
    ///
    /// Always explicit: `packet_hash(32) ‖ signature(64)`, signed with
    /// the local link signature key and session-encrypted.
    pub fn prove_packet(&self, packet: &Packet) -> Result<Packet> {
        if self.status != LinkStatus::Active {
            return Err(Error::LinkState(format!(
                "proof attempted in {:?}",
                self.status
            )));
        }

        let packet_hash = packet.packet_hash();
        let signature = self.signing.sign(packet_hash);

        let mut proof_data = Vec::with_capacity(32 + SIGNATURE_LENGTH);
        proof_data.extend_from_slice(packet_hash);
        proof_data.extend_from_slice(&signature.to_bytes());
        let ciphertext = self.encrypt_payload(&proof_data)?;

        Ok(Packet::new(
            PacketType::Proof,
            PacketContext::None,
            false,
            DestinationType::Link,
            self.id,
            ciphertext,
        ))
    }

    /// Validate a decrypted packet proof against an expected hash.
    pub fn validate_packet_proof(&self, proof: &[u8], expected_hash: &[u8; 32]) -> bool {
        if proof.len() != 32 + SIGNATURE_LENGTH {
            return false;
        }
        if &proof[..32] != expected_hash {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&proof[32..]) else {
            return false;
        };
        self.peer_signature_public_key
            .verify(expected_hash, &signature)
            .is_ok()
    }

    /// Decrypt an inbound proof payload (any non-terminal keyed state).
    pub fn decrypt_proof(&self, packet: &Packet) -> Result<Zeroizing<Vec<u8>>> {
        if self.status != LinkStatus::Active {
            return Err(Error::LinkState(format!(
                "proof received in {:?}",
                self.status
            )));
        }
        self.decrypt_payload(packet.payload())
    }

    /// Build a close packet and transition this side to `Closed`.
    ///
    /// The payload is the session-encrypted link id, which lets the
    /// receiver reject forged teardowns.
    pub fn close_packet(&mut self) -> Result<Packet> {
        if self.status.is_terminal() {
            return Err(Error::LinkState("link already closed".into()));
        }
        let ciphertext = self.encrypt_payload(&self.id)?;
        self.status = LinkStatus::Closed;
        Ok(Packet::new(
            PacketType::Data,
            PacketContext::LinkClose,
            false,
            DestinationType::Link,
            self.id,
            ciphertext,
        ))
    }

    /// Handle an inbound close packet.
    ///
    /// # Errors
    /// Rejects closes for links without a session key and payloads that
    /// do not decrypt to this link's id.
    pub fn handle_close(&mut self, packet: &Packet) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::LinkState("link already closed".into()));
        }
        let plaintext = self.decrypt_payload(packet.payload())?;
        if plaintext[..] != self.id[..] {
            return Err(Error::Crypto("close payload does not match link id".into()));
        }
        self.status = LinkStatus::Closed;
        debug!(link = %short_hex(&self.id), "link closed by peer");
        Ok(())
    }

    /// Transition a link stuck in establishment past its deadline.
    ///
    /// Returns true if the link went stale.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        let expired = matches!(self.status, LinkStatus::Pending | LinkStatus::Handshake)
            && self.deadline.is_some_and(|deadline| now >= deadline);
        if expired {
            self.status = LinkStatus::Stale;
            self.deadline = None;
            debug!(link = %short_hex(&self.id), "link establishment timed out");
        }
        expired
    }

    fn encrypt_payload(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .derived_key
            .as_ref()
            .ok_or_else(|| Error::LinkState("no session key derived".into()))?;
        Ok(Fernet::new(key).encrypt(plaintext))
    }

    fn decrypt_payload(&self, token: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = self
            .derived_key
            .as_ref()
            .ok_or_else(|| Error::LinkState("no session key derived".into()))?;
        Fernet::new(key).decrypt(token)
    }

    /// The link id, also the session's destination hash.
    pub fn id(&self) -> &[u8; TRUNCATED_HASH_LENGTH] {
        &self.id
    }

    /// Current lifecycle state.
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Whether this side initiated the link.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// The destination the link was requested to.
    pub fn destination_hash(&self) -> &[u8; TRUNCATED_HASH_LENGTH] {
        &self.destination_hash
    }

    /// Measured round-trip time, available once established.
    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    /// When the link became active.
    pub fn activated_at(&self) -> Option<Instant> {
        self.activated_at
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &short_hex(&self.id))
            .field("status", &self.status)
            .field("initiator", &self.initiator)
            .field("rtt", &self.rtt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{DestinationName, Direction};
    use crate::identity::Identity;

    fn destination_pair() -> (Destination, Destination) {
        let identity = Identity::create();
        let name = DestinationName::new("lxmf", &["delivery"]).expect("should build name");

        let local = Destination::new(
            Some(identity.clone()),
            Direction::In,
            DestinationType::Single,
            name.clone(),
        )
        .expect("should create");

        let remote_identity =
            Identity::from_public_key(&identity.public_key_bytes()).expect("should load");
        let remote = Destination::new(
            Some(remote_identity),
            Direction::Out,
            DestinationType::Single,
            name,
        )
        .expect("should create");

        (local, remote)
    }

    fn established_pair() -> (Link, Link) {
        let (local, remote) = destination_pair();

        let (mut initiator, request) = Link::establish(&remote).expect("should establish");
        let request = Packet::decode(request.raw()).expect("should decode");

        let mut responder = Link::from_request(&request, &local).expect("should validate");
        let proof = responder.accept().expect("should accept");
        let proof = Packet::decode(proof.raw()).expect("should decode");

        let rtt_packet = initiator.validate_proof(&proof).expect("should validate");
        let rtt_packet = Packet::decode(rtt_packet.raw()).expect("should decode");
        responder.handle_rtt(&rtt_packet).expect("should handle rtt");

        (initiator, responder)
    }

    #[test]
    fn test_full_handshake() {
        let (initiator, responder) = established_pair();

        assert_eq!(initiator.status(), LinkStatus::Active);
        assert_eq!(responder.status(), LinkStatus::Active);
        assert_eq!(initiator.id(), responder.id());
        assert!(initiator.rtt().is_some());
        assert!(responder.rtt().is_some());

        // both sides hold the same session key
        let a = initiator.derived_key.as_ref().expect("initiator key");
        let b = responder.derived_key.as_ref().expect("responder key");
        assert_eq!(&**a, &**b);
    }

    #[test]
    fn test_session_transfer_both_directions() {
        let (initiator, responder) = established_pair();

        let packet = initiator.data_packet(b"from initiator").expect("should send");
        let packet = Packet::decode(packet.raw()).expect("should decode");
        assert_eq!(packet.destination_hash(), responder.id());
        let plaintext = responder.handle_data(&packet).expect("should decrypt");
        assert_eq!(&*plaintext, b"from initiator");

        let packet = responder.data_packet(b"from responder").expect("should send");
        let plaintext = initiator.handle_data(&packet).expect("should decrypt");
        assert_eq!(&*plaintext, b"from responder");
    }

    #[test]
    fn test_request_length_is_checked() {
        let (local, remote) = destination_pair();
        let packet = Packet::new(
            PacketType::LinkRequest,
            PacketContext::None,
            false,
            DestinationType::Single,
            *remote.hash(),
            vec![0u8; ECPUB_SIZE - 1],
        );
        assert!(Link::from_request(&packet, &local).is_err());
    }

    #[test]
    fn test_proof_length_is_checked() {
        let (local, remote) = destination_pair();
        let (mut initiator, _request) = Link::establish(&remote).expect("should establish");

        let bad_proof = Packet::new(
            PacketType::Proof,
            PacketContext::LinkRequestProof,
            false,
            DestinationType::Link,
            *initiator.id(),
            vec![0u8; PROOF_SIZE + 1],
        );
        assert!(initiator.validate_proof(&bad_proof).is_err());
        assert_eq!(initiator.status(), LinkStatus::Pending);
        drop(local);
    }

    #[test]
    fn test_proof_signature_must_come_from_destination_identity() {
        let (local, remote) = destination_pair();
        let (mut initiator, request) = Link::establish(&remote).expect("should establish");
        let request = Packet::decode(request.raw()).expect("should decode");

        let mut responder = Link::from_request(&request, &local).expect("should validate");
        let proof = responder.accept().expect("should accept");

        // tamper with the signature
        let mut raw = proof.raw().to_vec();
        let payload_start = raw.len() - PROOF_SIZE;
        raw[payload_start] ^= 0x01;
        let tampered = Packet::decode(&raw).expect("should decode");

        assert!(initiator.validate_proof(&tampered).is_err());
        // a failed proof leaves the link pending, not corrupted
        assert_eq!(initiator.status(), LinkStatus::Pending);
    }

    #[test]
    fn test_proof_ignored_by_responder_and_wrong_state() {
        let (initiator, mut responder) = established_pair();

        let stray = Packet::new(
            PacketType::Proof,
            PacketContext::LinkRequestProof,
            false,
            DestinationType::Link,
            *responder.id(),
            vec![0u8; PROOF_SIZE],
        );
        // responder never validates link request proofs
        assert!(responder.validate_proof(&stray).is_err());
        // and an active initiator ignores late proofs
        let mut initiator = initiator;
        assert!(initiator.validate_proof(&stray).is_err());
        assert_eq!(initiator.status(), LinkStatus::Active);
    }

    #[test]
    fn test_data_refused_before_active() {
        let (local, remote) = destination_pair();
        let (initiator, request) = Link::establish(&remote).expect("should establish");
        assert!(initiator.data_packet(b"too early").is_err());

        let request = Packet::decode(request.raw()).expect("should decode");
        let responder = Link::from_request(&request, &local).expect("should validate");
        let packet = Packet::new(
            PacketType::Data,
            PacketContext::None,
            false,
            DestinationType::Link,
            *responder.id(),
            vec![0u8; 64],
        );
        assert!(responder.handle_data(&packet).is_err());
    }

    #[test]
    fn test_link_packet_proof() {
        let (initiator, responder) = established_pair();

        // responder receives a data packet and proves receipt
        let data = initiator.data_packet(b"prove me").expect("should send");
        let data = Packet::decode(data.raw()).expect("should decode");
        let proof = responder.prove_packet(&data).expect("should prove");
        let proof = Packet::decode(proof.raw()).expect("should decode");

        let plaintext = initiator.decrypt_proof(&proof).expect("should decrypt");
        assert!(initiator.validate_packet_proof(&plaintext, data.packet_hash()));

        // the proof does not validate against another packet's hash
        let other = initiator.data_packet(b"other").expect("should send");
        assert!(!initiator.validate_packet_proof(&plaintext, other.packet_hash()));
    }

    #[test]
    fn test_close_roundtrip() {
        let (mut initiator, mut responder) = established_pair();

        let close = initiator.close_packet().expect("should close");
        assert_eq!(initiator.status(), LinkStatus::Closed);

        let close = Packet::decode(close.raw()).expect("should decode");
        responder.handle_close(&close).expect("should close");
        assert_eq!(responder.status(), LinkStatus::Closed);

        // closed links refuse further traffic
        assert!(responder.data_packet(b"late").is_err());
    }

    #[test]
    fn test_forged_close_rejected() {
        let (initiator, mut responder) = established_pair();

        let forged = Packet::new(
            PacketType::Data,
            PacketContext::LinkClose,
            false,
            DestinationType::Link,
            *responder.id(),
            vec![0u8; 64],
        );
        assert!(responder.handle_close(&forged).is_err());
        assert_eq!(responder.status(), LinkStatus::Active);
        drop(initiator);
    }

    #[test]
    fn test_establishment_timeout() {
        let (local, remote) = destination_pair();
        let (mut initiator, request) = Link::establish(&remote).expect("should establish");

        // not yet expired
        assert!(!initiator.check_timeout(Instant::now()));
        assert_eq!(initiator.status(), LinkStatus::Pending);

        let later = Instant::now() + ESTABLISHMENT_TIMEOUT + Duration::from_secs(1);
        assert!(initiator.check_timeout(later));
        assert_eq!(initiator.status(), LinkStatus::Stale);

        // activation cancels the deadline
        let request = Packet::decode(request.raw()).expect("should decode");
        let mut responder = Link::from_request(&request, &local).expect("should validate");
        let _proof = responder.accept().expect("should accept");
        // responder still in handshake: deadline applies
        assert!(responder.check_timeout(later));
        assert_eq!(responder.status(), LinkStatus::Stale);
    }

    #[test]
    fn test_active_link_never_goes_stale() {
        let (mut initiator, _responder) = established_pair();
        let later = Instant::now() + ESTABLISHMENT_TIMEOUT * 10;
        assert!(!initiator.check_timeout(later));
        assert_eq!(initiator.status(), LinkStatus::Active);
    }
}
