//! Wire protocol for the weftnet core.
//!
//! A compact bit-packed binary format. Every packet carries a flag
//! byte, a hop count, an optional 16-byte transport id, a 16-byte
//! destination hash, a context byte and a payload.
//!
//! ## Packet structure
//!
//! ```text
//! ┌───────┬──────┬──────────────┬─────────────┬─────────┬─────────┐
//! │ flags │ hops │ transport id │ destination │ context │ payload │
//! │  (1)  │ (1)  │  (0 or 16)   │    (16)     │   (1)   │  (var)  │
//! └───────┴──────┴──────────────┴─────────────┴─────────┴─────────┘
//! ```
//!
//! Flag byte: `(header<<6) | (ctxflag<<5) | (ttype<<4) | (dtype<<2) | ptype`.
//!
//! The packet hash is computed over the first byte masked down to its
//! destination-type/packet-type bits, concatenated with everything after
//! the header, so hop-count rewrites and relay headers do not change a
//! packet's identity.

mod packet;
mod types;

pub use packet::{Packet, DESTINATION_HASH_LENGTH};
pub use types::{
    classify, DestinationType, HeaderType, PacketClass, PacketContext, PacketType, TransportType,
};
