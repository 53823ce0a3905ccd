//! Seam to the external packet/radio core.
//!
//! The mesh core owns modulation, packet framing, flood/direct routing,
//! retries, and the cryptographic primitives. This crate only decides *when*
//! to send and *with what key material*; everything below that line is
//! consumed through [`MeshTransport`] and observed through [`MeshEvent`].

use thiserror::Error;

use crate::channels::ChannelKey;
use crate::contacts::{ContactRecord, ContactType};

/// How an inbound packet reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Direct,
    Flood { hops: u8 },
}

/// How the core dispatched an outbound direct message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    Flood,
    Direct,
}

/// Errors reported by the mesh core.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no radio driver attached")]
    NoRadio,
    #[error("unable to send: {0}")]
    SendFailed(String),
    #[error("invalid advert payload")]
    BadAdvert,
}

/// Decoded self-advertisement, as delivered by the core on discovery.
#[derive(Debug, Clone)]
pub struct AdvertInfo {
    pub public_key: [u8; 32],
    pub name: String,
    pub contact_type: ContactType,
    pub timestamp: u32,
}

/// Events the core delivers synchronously during [`MeshTransport::poll`].
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// A peer advert was discovered (new contact or re-advertisement).
    ContactDiscovered { info: AdvertInfo, path: Vec<u8> },
    /// The outbound route to a known peer changed.
    PathUpdated { public_key: [u8; 32], path: Vec<u8> },
    /// An acknowledgment payload arrived; `tag` is the sender-side checksum.
    AckReceived { tag: u32 },
    /// A direct text message addressed to this node.
    DirectMessage {
        from: [u8; 32],
        sender_timestamp: u32,
        route: RouteKind,
        text: String,
    },
    /// A group datagram on some channel, identified by the channel hash.
    GroupMessage {
        channel_hash: [u8; 32],
        route: RouteKind,
        text: String,
    },
    /// The routing layer gave up waiting for an acknowledgment.
    SendTimedOut,
}

/// Interface consumed from the external mesh core.
///
/// Timeout windows are supplied by the caller (see [`crate::messaging`]);
/// the core owns enforcement and retries.
pub trait MeshTransport {
    /// Estimated radio airtime for a payload of `payload_len` bytes, in ms.
    fn estimate_airtime_ms(&self, payload_len: usize) -> u32;

    /// Encode and transmit a direct text message. Returns whether the core
    /// chose a learned route or fell back to flood.
    fn send_direct_text(
        &mut self,
        dest: &ContactRecord,
        timestamp: u32,
        text: &str,
        ack_tag: u32,
        timeout_ms: u32,
    ) -> Result<SendKind, TransportError>;

    /// Encode and flood a group datagram secured by `key`.
    fn send_group_text(
        &mut self,
        key: &ChannelKey,
        timestamp: u32,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Broadcast a self-advertisement (flood or zero-hop).
    fn send_self_advert(
        &mut self,
        name: &str,
        lat: f64,
        lon: f64,
        zero_hop: bool,
    ) -> Result<(), TransportError>;

    /// Build the raw self-advert packet bytes for card export.
    fn export_self_advert(&mut self, name: &str, lat: f64, lon: f64)
        -> Result<Vec<u8>, TransportError>;

    /// Ingest a peer advert packet (card import). Discovery is reported via
    /// a later [`MeshEvent::ContactDiscovered`].
    fn import_advert(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Forget the learned route to a peer.
    fn reset_path(&mut self, dest: &[u8; 32]);

    /// Advance the core's own state machine and collect pending events.
    fn poll(&mut self) -> Vec<MeshEvent>;
}

/// Transport used when no radio driver is linked in. The node still runs as
/// a console (prefs, channels, contacts all work); every send fails with
/// [`TransportError::NoRadio`].
#[derive(Debug, Default)]
pub struct DisconnectedTransport;

impl MeshTransport for DisconnectedTransport {
    fn estimate_airtime_ms(&self, payload_len: usize) -> u32 {
        // Rough LoRa figure so timeout math stays exercised offline.
        64 + (payload_len as u32) * 8
    }

    fn send_direct_text(
        &mut self,
        _dest: &ContactRecord,
        _timestamp: u32,
        _text: &str,
        _ack_tag: u32,
        _timeout_ms: u32,
    ) -> Result<SendKind, TransportError> {
        Err(TransportError::NoRadio)
    }

    fn send_group_text(
        &mut self,
        _key: &ChannelKey,
        _timestamp: u32,
        _text: &str,
    ) -> Result<(), TransportError> {
        Err(TransportError::NoRadio)
    }

    fn send_self_advert(
        &mut self,
        _name: &str,
        _lat: f64,
        _lon: f64,
        _zero_hop: bool,
    ) -> Result<(), TransportError> {
        Err(TransportError::NoRadio)
    }

    fn export_self_advert(
        &mut self,
        _name: &str,
        _lat: f64,
        _lon: f64,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::NoRadio)
    }

    fn import_advert(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NoRadio)
    }

    fn reset_path(&mut self, _dest: &[u8; 32]) {}

    fn poll(&mut self) -> Vec<MeshEvent> {
        Vec::new()
    }
}
