//! Group-channel registry: derives runtime cryptographic channel handles
//! from persisted slots and resolves names to runtime indices.
//!
//! The registry is the single authoritative ordered list of active channels,
//! built once at startup. Both initialization and name resolution read from
//! this list, so they cannot disagree. Persisted slot edits (add, remove,
//! key change) take effect in the runtime list only after a restart.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::error::CommandError;
use crate::prefs::{NodePrefs, UserChannel, MAX_GROUP_CHANNELS, MAX_NAME_LEN};

/// Compiled-in pre-shared key for the built-in Public channel, shared with
/// the companion mobile client.
pub const PUBLIC_GROUP_PSK_B64: &str = "izOH6cXN6mrJ5e26oRXNcg==";
/// Name of the built-in channel at runtime index 0.
pub const PUBLIC_CHANNEL_NAME: &str = "Public";

/// Symmetric group key; the mesh core accepts 128-bit or 256-bit keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKey {
    K128([u8; 16]),
    K256([u8; 32]),
}

impl ChannelKey {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ChannelKey::K128(k) => k,
            ChannelKey::K256(k) => k,
        }
    }

    pub fn bits(&self) -> usize {
        self.as_bytes().len() * 8
    }
}

/// Derive the key for a hashtag channel: the first 16 bytes of
/// SHA-256(name). A pure function of the name, matching the companion
/// mobile client, so no out-of-band key exchange is needed.
pub fn derive_hashtag_key(name: &str) -> ChannelKey {
    let digest = Sha256::digest(name.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    ChannelKey::K128(key)
}

/// Parse a stored hex key. Only 32-character (128-bit) and 64-character
/// (256-bit) strings are accepted.
pub fn parse_hex_key(key_hex: &str) -> Result<ChannelKey, CommandError> {
    let bytes = hex::decode(key_hex)
        .map_err(|_| CommandError::Format("key is not valid hex".to_string()))?;
    match bytes.len() {
        16 => {
            let mut key = [0u8; 16];
            key.copy_from_slice(&bytes);
            Ok(ChannelKey::K128(key))
        }
        32 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes);
            Ok(ChannelKey::K256(key))
        }
        _ => Err(CommandError::Format(
            "key must be 32 (128-bit) or 64 (256-bit) hex characters".to_string(),
        )),
    }
}

fn public_channel_key() -> Option<ChannelKey> {
    let bytes = BASE64.decode(PUBLIC_GROUP_PSK_B64).ok()?;
    if bytes.len() != 16 {
        return None;
    }
    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Some(ChannelKey::K128(key))
}

/// Identifying hash for a channel key, used to match inbound group
/// datagrams to a runtime channel.
pub fn channel_hash(key: &ChannelKey) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Runtime handle for one registered channel. Never persisted; rebuilt from
/// [`NodePrefs`] at every boot.
#[derive(Debug, Clone)]
pub struct ActiveChannel {
    pub name: String,
    pub key: ChannelKey,
    pub hash: [u8; 32],
    /// Runtime mute flag. For user channels this mirrors the persisted slot
    /// flag; for Public (index 0) it is runtime-only.
    pub muted: bool,
    /// Persisted slot index backing this channel; `None` for Public.
    pub slot: Option<usize>,
}

/// Outcome of adding or updating a persisted channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEdit {
    AddedHashtag,
    AddedKeyed { bits: usize },
    UpdatedKeyed { bits: usize },
}

/// Fixed-capacity runtime channel table. Index 0 is reserved for Public;
/// it is `None` only when Public key derivation failed at startup.
#[derive(Debug)]
pub struct ChannelRegistry {
    slots: Vec<Option<ActiveChannel>>,
}

impl ChannelRegistry {
    /// Build the runtime table from persisted preferences.
    ///
    /// Slot 0 is always the built-in Public channel. Each active persisted
    /// slot is then registered in slot order: hashtag channels derive their
    /// key from the name, keyed channels parse the stored hex; malformed or
    /// wrong-length keys are skipped (the slot stays persisted but inactive
    /// at runtime). Registration stops when the table is full.
    pub fn initialize(prefs: &NodePrefs) -> Self {
        let mut slots: Vec<Option<ActiveChannel>> = vec![None; MAX_GROUP_CHANNELS];

        match public_channel_key() {
            Some(key) => {
                let hash = channel_hash(&key);
                slots[0] = Some(ActiveChannel {
                    name: PUBLIC_CHANNEL_NAME.to_string(),
                    key,
                    hash,
                    muted: false,
                    slot: None,
                });
            }
            None => {
                warn!("failed to derive Public channel key; group messaging on Public unavailable");
            }
        }

        let mut next = 1;
        for (slot_idx, ch) in prefs.active_channels() {
            if next >= MAX_GROUP_CHANNELS {
                break;
            }
            let key = if ch.is_hashtag() {
                derive_hashtag_key(&ch.name)
            } else {
                match parse_hex_key(&ch.key_hex) {
                    Ok(key) => key,
                    Err(e) => {
                        debug!("channel '{}' skipped: {}", ch.name, e);
                        continue;
                    }
                }
            };
            let hash = channel_hash(&key);
            slots[next] = Some(ActiveChannel {
                name: ch.name.clone(),
                key,
                hash,
                muted: ch.muted,
                slot: Some(slot_idx),
            });
            next += 1;
        }

        Self { slots }
    }

    /// Resolve a channel name to its runtime index, case-insensitively.
    /// `"public"` and `"pub"` always map to index 0.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        if name.eq_ignore_ascii_case("public") || name.eq_ignore_ascii_case("pub") {
            return Some(0);
        }
        self.slots.iter().enumerate().skip(1).find_map(|(i, ch)| {
            ch.as_ref()
                .filter(|c| c.name.eq_ignore_ascii_case(name))
                .map(|_| i)
        })
    }

    pub fn get(&self, idx: usize) -> Option<&ActiveChannel> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    pub fn name_of(&self, idx: usize) -> Option<&str> {
        self.get(idx).map(|c| c.name.as_str())
    }

    /// Match an inbound group datagram's channel hash to a runtime index.
    pub fn find_by_hash(&self, hash: &[u8; 32]) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, ch)| ch.as_ref().filter(|c| &c.hash == hash).map(|_| i))
    }

    pub fn is_muted(&self, idx: usize) -> bool {
        self.get(idx).map(|c| c.muted).unwrap_or(false)
    }

    /// Whether Public channel key derivation succeeded at startup.
    pub fn public_available(&self) -> bool {
        self.slots[0].is_some()
    }

    /// Registered channels in runtime-index order, including index 0.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ActiveChannel)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, ch)| ch.as_ref().map(|c| (i, c)))
    }

    /// Toggle a channel's runtime mute flag. For user channels the persisted
    /// slot flag is updated as well; Public's flag is runtime-only.
    pub fn set_muted(
        &mut self,
        idx: usize,
        muted: bool,
        prefs: &mut NodePrefs,
    ) -> Result<(), CommandError> {
        let ch = self
            .slots
            .get_mut(idx)
            .and_then(|s| s.as_mut())
            .ok_or_else(|| CommandError::NotFound("channel".to_string()))?;
        ch.muted = muted;
        if let Some(slot) = ch.slot {
            prefs.channels[slot].muted = muted;
        }
        Ok(())
    }

    /// Add or update a persisted channel slot. `key_hex = None` creates a
    /// hashtag channel. The runtime table is unaffected until restart;
    /// callers must say so to the operator.
    pub fn add_or_update(
        prefs: &mut NodePrefs,
        name: &str,
        key_hex: Option<&str>,
    ) -> Result<ChannelEdit, CommandError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(CommandError::Format(format!(
                "channel name must be 1-{} bytes",
                MAX_NAME_LEN
            )));
        }
        let (key_hex, edit_bits) = match key_hex {
            None => {
                if !name.starts_with('#') {
                    return Err(CommandError::Format(
                        "keyless channel name must start with '#'".to_string(),
                    ));
                }
                (String::new(), None)
            }
            Some(hex_str) => {
                // Validate now so a bad key never lands in a slot.
                let key = parse_hex_key(hex_str)?;
                (hex_str.to_string(), Some(key.bits()))
            }
        };

        if let Some(slot) = prefs.find_channel_slot(name) {
            prefs.channels[slot].key_hex = key_hex;
            return Ok(match edit_bits {
                Some(bits) => ChannelEdit::UpdatedKeyed { bits },
                None => ChannelEdit::AddedHashtag,
            });
        }

        let vacant = prefs
            .channels
            .iter()
            .position(|ch| !ch.active)
            .ok_or_else(|| CommandError::Capacity("channel slots".to_string()))?;
        prefs.channels[vacant] = UserChannel {
            name: name.to_string(),
            key_hex,
            muted: false,
            active: true,
        };
        Ok(match edit_bits {
            Some(bits) => ChannelEdit::AddedKeyed { bits },
            None => ChannelEdit::AddedHashtag,
        })
    }

    /// Tombstone a persisted channel slot. Removing Public is always
    /// rejected. If the removed channel was selected, selection resets to
    /// Public. Takes effect in the runtime table after restart.
    pub fn remove(prefs: &mut NodePrefs, name: &str) -> Result<(), CommandError> {
        if name.eq_ignore_ascii_case("public") || name.eq_ignore_ascii_case("pub") {
            return Err(CommandError::Format(
                "cannot delete the Public channel".to_string(),
            ));
        }
        let slot = prefs
            .find_channel_slot(name)
            .ok_or_else(|| CommandError::NotFound(format!("channel '{}'", name)))?;
        prefs.channels[slot].active = false;
        if prefs.selected_channel.eq_ignore_ascii_case(name) {
            prefs.selected_channel.clear();
        }
        Ok(())
    }
}
