//! Direct and group messaging glue: single-slot acknowledgment tracking,
//! adaptive timeout-window estimation, and inbound message normalization.
//!
//! Delivery retries and timeout enforcement belong to the external routing
//! layer; this module only supplies the timeout estimates and observes the
//! outcomes.

use crc::{Crc, CRC_32_ISO_HDLC};
use log::debug;

use crate::channels::ChannelRegistry;
use crate::contacts::ContactRecord;
use crate::error::CommandError;
use crate::mesh::{MeshTransport, RouteKind, SendKind, TransportError};
use crate::textutil::fold_to_ascii;

/// Base timeout applied to every tracked send, in milliseconds.
pub const SEND_TIMEOUT_BASE_MILLIS: u32 = 500;
/// Flood deliveries wait this many airtimes before giving up.
pub const FLOOD_SEND_TIMEOUT_FACTOR: f32 = 16.0;
/// Direct deliveries wait this many airtimes per hop.
pub const DIRECT_SEND_PERHOP_FACTOR: f32 = 6.0;
/// Fixed per-hop slack for direct deliveries, in milliseconds.
pub const DIRECT_SEND_PERHOP_EXTRA_MILLIS: u32 = 250;

/// Reserved message phrase that advances the local wall clock to the
/// sender's timestamp plus one second.
pub const CLOCK_SYNC_PHRASE: &str = "clock sync";

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Correlation tag for an outbound direct message: a short checksum over
/// recipient, timestamp, and text. The recipient's acknowledgment echoes it.
pub fn ack_tag(dest: &[u8; 32], timestamp: u32, text: &str) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(dest);
    digest.update(&timestamp.to_le_bytes());
    digest.update(text.as_bytes());
    digest.finalize()
}

/// Timeout window for a flood delivery. Heuristic, not a measured
/// round-trip: network-wide rebroadcast needs many airtimes to settle.
pub fn flood_timeout_ms(airtime_ms: u32) -> u32 {
    SEND_TIMEOUT_BASE_MILLIS + (FLOOD_SEND_TIMEOUT_FACTOR * airtime_ms as f32) as u32
}

/// Timeout window for a direct delivery along a known path. Longer paths
/// widen the window.
pub fn direct_timeout_ms(airtime_ms: u32, path_len: u8) -> u32 {
    SEND_TIMEOUT_BASE_MILLIS
        + ((airtime_ms as f32 * DIRECT_SEND_PERHOP_FACTOR) as u32
            + DIRECT_SEND_PERHOP_EXTRA_MILLIS)
            * (u32::from(path_len) + 1)
}

/// The one outstanding direct send awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAck {
    pub tag: u32,
    pub recipient: [u8; 32],
    pub sent_at_ms: u64,
}

/// What an inbound direct message asks of the node.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundDirect {
    /// Normalized text ready for display.
    pub display_text: String,
    /// Wall-clock target when the sender requested a clock sync.
    pub clock_advance_to: Option<u32>,
}

/// Single-slot acknowledgment tracker plus inbound normalization.
#[derive(Debug, Default)]
pub struct MessagingAdapter {
    pending: Option<PendingAck>,
}

impl MessagingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingAck> {
        self.pending.as_ref()
    }

    /// Send a direct text message and start tracking its acknowledgment.
    ///
    /// The timeout window handed to the routing layer depends on whether a
    /// route is known: direct windows scale with path length, flood windows
    /// with the flood factor. Starting a new tracked send silently replaces
    /// any unresolved previous one.
    pub fn send_direct(
        &mut self,
        transport: &mut dyn MeshTransport,
        contact: &ContactRecord,
        timestamp: u32,
        now_ms: u64,
        text: &str,
    ) -> Result<SendKind, TransportError> {
        let airtime = transport.estimate_airtime_ms(text.len());
        let timeout_ms = match contact.path_len() {
            Some(len) => direct_timeout_ms(airtime, len),
            None => flood_timeout_ms(airtime),
        };
        let tag = ack_tag(&contact.public_key, timestamp, text);
        let kind = transport.send_direct_text(contact, timestamp, text, tag, timeout_ms)?;
        if self.pending.is_some() {
            debug!("replacing unresolved pending ack");
        }
        self.pending = Some(PendingAck {
            tag,
            recipient: contact.public_key,
            sent_at_ms: now_ms,
        });
        Ok(kind)
    }

    /// Send to a group channel by runtime index. Fails explicitly when the
    /// selected index has no runtime channel (e.g. added but not yet
    /// activated by a restart, or Public key derivation failed).
    pub fn send_group(
        &mut self,
        transport: &mut dyn MeshTransport,
        registry: &ChannelRegistry,
        channel_idx: usize,
        node_name: &str,
        timestamp: u32,
        text: &str,
    ) -> Result<(), CommandError> {
        let channel = registry
            .get(channel_idx)
            .ok_or_else(|| CommandError::NotFound("selected channel not initialized".to_string()))?;
        // Group datagrams carry "<sender>: <text>" like the mobile client.
        let body = format!("{}: {}", node_name, text);
        transport.send_group_text(&channel.key, timestamp, &body)?;
        Ok(())
    }

    /// Handle an inbound acknowledgment tag. An exact match clears the slot
    /// and returns the elapsed milliseconds since send; a mismatched or
    /// replayed tag is ignored without error (the transport may redeliver
    /// the same acknowledgment).
    pub fn on_ack(&mut self, tag: u32, now_ms: u64) -> Option<u64> {
        match &self.pending {
            Some(p) if p.tag == tag => {
                let elapsed = now_ms.saturating_sub(p.sent_at_ms);
                self.pending = None;
                Some(elapsed)
            }
            _ => {
                debug!("ignoring unexpected ack tag {:08x}", tag);
                None
            }
        }
    }

    /// Normalize an inbound direct message and detect the reserved clock
    /// sync phrase. The clock target is sender timestamp + 1; the caller
    /// must still refuse to move the clock backwards.
    pub fn on_direct_message(&self, sender_timestamp: u32, text: &str) -> InboundDirect {
        let clock_advance_to = if text == CLOCK_SYNC_PHRASE {
            Some(sender_timestamp.saturating_add(1))
        } else {
            None
        };
        InboundDirect {
            display_text: fold_to_ascii(text),
            clock_advance_to,
        }
    }

    /// Resolve an inbound group datagram to its channel and format a display
    /// line. Returns `None` when the channel is muted (the message is
    /// dropped entirely) and a line tagged `UNKNOWN` for unmatched hashes.
    pub fn on_group_message(
        &self,
        registry: &ChannelRegistry,
        channel_hash: &[u8; 32],
        route: RouteKind,
        text: &str,
    ) -> Option<String> {
        let (name, muted) = match registry.find_by_hash(channel_hash) {
            Some(idx) => (
                registry.name_of(idx).unwrap_or("UNKNOWN").to_string(),
                registry.is_muted(idx),
            ),
            None => ("UNKNOWN".to_string(), false),
        };
        if muted {
            return None;
        }
        let body = fold_to_ascii(text);
        Some(match route {
            RouteKind::Direct => format!("[{}] DIRECT | {}", name, body),
            RouteKind::Flood { hops } => format!("[{}] FLOOD (hops {}) | {}", name, hops, body),
        })
    }
}
