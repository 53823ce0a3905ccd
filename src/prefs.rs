//! Operator-mutable node preferences, persisted as an explicitly versioned
//! record.
//!
//! The record on disk is a 4-byte magic, a little-endian `u16` schema
//! version, then a bincode body. Loading a missing, truncated, or
//! unknown-version file falls back to defaults with a warning; persistence
//! degradation is never fatal. Every mutating command rewrites the file
//! synchronously.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

/// Total runtime channel capacity, including the built-in Public channel.
pub const MAX_GROUP_CHANNELS: usize = 8;
/// Persisted user-channel slots (Public occupies the remaining runtime slot).
pub const MAX_USER_CHANNELS: usize = MAX_GROUP_CHANNELS - 1;
/// Longest accepted channel or node name, in bytes.
pub const MAX_NAME_LEN: usize = 31;

const PREFS_MAGIC: [u8; 4] = *b"MCPR";
const PREFS_VERSION: u16 = 1;

/// One persisted group-channel slot. Slots are tombstoned (`active = false`)
/// rather than removed, so later additions can reuse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChannel {
    /// Channel name; a leading `#` marks a hashtag channel whose key is
    /// derived from the name alone.
    pub name: String,
    /// Pre-shared key as 32 or 64 hex characters; empty for hashtag channels.
    pub key_hex: String,
    pub muted: bool,
    pub active: bool,
}

impl UserChannel {
    pub fn vacant() -> Self {
        Self {
            name: String::new(),
            key_hex: String::new(),
            muted: false,
            active: false,
        }
    }

    pub fn is_hashtag(&self) -> bool {
        self.name.starts_with('#')
    }
}

/// Persisted node preferences.
///
/// Channel selection is keyed by name (empty string means the built-in
/// Public channel), so deleting and re-adding channels in a different order
/// cannot silently re-point the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePrefs {
    pub node_name: String,
    pub node_lat: f64,
    pub node_lon: f64,
    /// Radio tuning. Applied by the radio driver at startup only.
    pub freq_mhz: f32,
    pub bandwidth_khz: f32,
    pub spreading_factor: u8,
    pub coding_rate: u8,
    pub tx_power_dbm: u8,
    /// Airtime-budget scaling factor handed to the mesh core.
    pub airtime_factor: f32,
    pub mute_adverts: bool,
    /// Fixed array of user-channel slots; length is always
    /// [`MAX_USER_CHANNELS`].
    pub channels: Vec<UserChannel>,
    /// Selected channel name; empty means Public.
    pub selected_channel: String,
    /// Per-endpoint console output enables; index 0 is always on.
    pub console_enabled: Vec<bool>,
}

impl Default for NodePrefs {
    fn default() -> Self {
        Self {
            node_name: "NONAME".to_string(),
            node_lat: 0.0,
            node_lon: 0.0,
            freq_mhz: 915.0,
            bandwidth_khz: 250.0,
            spreading_factor: 10,
            coding_rate: 5,
            tx_power_dbm: 20,
            airtime_factor: 2.0,
            mute_adverts: false,
            channels: vec![UserChannel::vacant(); MAX_USER_CHANNELS],
            selected_channel: String::new(),
            console_enabled: vec![true],
        }
    }
}

impl NodePrefs {
    /// Load preferences from `path`, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(e) => {
                warn!("prefs: read failed ({}); using defaults", e);
                return Self::default();
            }
        };
        match Self::decode(&bytes) {
            Ok(prefs) => prefs,
            Err(reason) => {
                warn!("prefs: {}; using defaults", reason);
                Self::default()
            }
        }
    }

    /// Persist preferences to `path`, overwriting any previous record.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.encode())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&PREFS_MAGIC);
        out.extend_from_slice(&PREFS_VERSION.to_le_bytes());
        match bincode::serialize(self) {
            Ok(body) => out.extend_from_slice(&body),
            Err(e) => warn!("prefs: serialize failed: {}", e),
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 6 {
            return Err("record truncated".to_string());
        }
        if bytes[..4] != PREFS_MAGIC {
            return Err("bad magic".to_string());
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        let body = &bytes[6..];
        // Per-version decode; new schema versions add a migration arm here.
        let mut prefs: NodePrefs = match version {
            PREFS_VERSION => {
                bincode::deserialize(body).map_err(|e| format!("decode failed: {}", e))?
            }
            v => return Err(format!("unknown schema version {}", v)),
        };
        prefs.normalize();
        Ok(prefs)
    }

    /// Clamp loaded data back into invariants: fixed slot-array length,
    /// bounded names, endpoint 0 enabled.
    fn normalize(&mut self) {
        self.channels.resize(MAX_USER_CHANNELS, UserChannel::vacant());
        self.channels.truncate(MAX_USER_CHANNELS);
        self.node_name.truncate(MAX_NAME_LEN);
        for ch in &mut self.channels {
            ch.name.truncate(MAX_NAME_LEN);
        }
        if self.console_enabled.is_empty() {
            self.console_enabled.push(true);
        }
        self.console_enabled[0] = true;
    }

    /// Active user-channel slots in persisted order.
    pub fn active_channels(&self) -> impl Iterator<Item = (usize, &UserChannel)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.active)
    }

    /// Find the active slot whose name matches case-insensitively.
    pub fn find_channel_slot(&self, name: &str) -> Option<usize> {
        self.active_channels()
            .find(|(_, ch)| ch.name.eq_ignore_ascii_case(name))
            .map(|(i, _)| i)
    }

    /// Record an endpoint enable state, growing the flag vector as needed.
    pub fn set_console_enabled(&mut self, idx: usize, enabled: bool) {
        if self.console_enabled.len() <= idx {
            self.console_enabled.resize(idx + 1, false);
        }
        self.console_enabled[idx] = enabled;
        self.console_enabled[0] = true;
    }
}
