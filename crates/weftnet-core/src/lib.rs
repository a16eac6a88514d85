//! # weftnet core
//!
//! The protocol engine for a peer-to-peer mesh network: cryptographic
//! identities, addressable destinations, signed broadcast announces, a
//! two-party encrypted session ("link") built over unreliable
//! point-to-point carriers, and a dispatcher that routes wire packets
//! to the right local entity.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Application                │
//! ├─────────────────────────────────────────┤
//! │        transport (dispatcher)           │
//! ├─────────────┬──────────┬────────────────┤
//! │ destination │ announce │      link      │
//! ├─────────────┴──────────┴────────────────┤
//! │        protocol (wire format)           │
//! ├─────────────────────────────────────────┤
//! │       crypto       │     identity       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Carriers (TCP streams, websockets, serial radios) live outside the
//! core; they implement [`transport::Carrier`], deframe inbound bytes
//! and feed complete frames to [`transport::Transport::on_packet_received`].
//! Everything in the core runs synchronously to completion per frame,
//! and every network-facing failure is a silent, logged drop.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod announce;
pub mod crypto;
pub mod destination;
pub mod error;
pub mod identity;
pub mod link;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
