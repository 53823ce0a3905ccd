//! Bounded, persisted directory of known peers.
//!
//! The backing file is a stream of fixed 140-byte records (the layout is an
//! external interface shared with other implementations). Loading stops
//! quietly on the first short read; saving rewrites the whole file after
//! every contact-affecting event. Capacity is fixed; once full, new
//! contacts are rejected rather than evicted.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::CommandError;

/// Fixed directory capacity. The (capacity+1)-th distinct contact is
/// rejected; this is the designed backpressure mechanism.
pub const MAX_CONTACTS: usize = 100;
/// On-disk record size in bytes.
pub const CONTACT_RECORD_LEN: usize = 140;
/// Longest outbound route, in path bytes.
pub const MAX_PATH_LEN: usize = 64;

const NAME_FIELD_LEN: usize = 32;
const NO_PATH: u8 = 0xFF;

/// Advertised peer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    Chat,
    Repeater,
    Room,
    Unknown(u8),
}

impl ContactType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => ContactType::Chat,
            2 => ContactType::Repeater,
            3 => ContactType::Room,
            other => ContactType::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ContactType::Chat => 1,
            ContactType::Repeater => 2,
            ContactType::Room => 3,
            ContactType::Unknown(b) => b,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContactType::Chat => "Chat",
            ContactType::Repeater => "Repeater",
            ContactType::Room => "Room",
            ContactType::Unknown(_) => "??",
        }
    }
}

/// One known peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub public_key: [u8; 32],
    pub name: String,
    pub contact_type: ContactType,
    pub flags: u8,
    /// Learned outbound route; `None` means direct sends fall back to flood.
    pub out_path: Option<Vec<u8>>,
    /// Epoch seconds of the most recent advert.
    pub last_advert: u32,
    /// Local modification marker; runtime-only, not persisted.
    pub lastmod: u32,
}

impl ContactRecord {
    /// Serialize into the fixed on-disk layout:
    /// 32B public key, 32B name (NUL padded), 1B type, 1B flags, 1B + 4B
    /// reserved, 1B path length (0xFF = none), 4B last-advert timestamp,
    /// 64B path buffer.
    pub fn encode(&self) -> [u8; CONTACT_RECORD_LEN] {
        let mut out = [0u8; CONTACT_RECORD_LEN];
        out[0..32].copy_from_slice(&self.public_key);
        let name_bytes = self.name.as_bytes();
        let n = name_bytes.len().min(NAME_FIELD_LEN - 1);
        out[32..32 + n].copy_from_slice(&name_bytes[..n]);
        out[64] = self.contact_type.as_byte();
        out[65] = self.flags;
        // out[66] and out[67..71] reserved.
        match &self.out_path {
            Some(path) => {
                let len = path.len().min(MAX_PATH_LEN);
                out[71] = len as u8;
                out[76..76 + len].copy_from_slice(&path[..len]);
            }
            None => out[71] = NO_PATH,
        }
        out[72..76].copy_from_slice(&self.last_advert.to_le_bytes());
        out
    }

    /// Parse one fixed-layout record. Returns `None` for a structurally
    /// impossible record (path length between 65 and 254).
    pub fn decode(bytes: &[u8; CONTACT_RECORD_LEN]) -> Option<Self> {
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&bytes[0..32]);
        let name_field = &bytes[32..64];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN);
        let name = String::from_utf8_lossy(&name_field[..name_len]).into_owned();
        let path_len = bytes[71];
        let out_path = match path_len {
            NO_PATH => None,
            len if (len as usize) <= MAX_PATH_LEN => {
                Some(bytes[76..76 + len as usize].to_vec())
            }
            _ => return None,
        };
        let last_advert = u32::from_le_bytes([bytes[72], bytes[73], bytes[74], bytes[75]]);
        Some(Self {
            public_key,
            name,
            contact_type: ContactType::from_byte(bytes[64]),
            flags: bytes[65],
            out_path,
            last_advert,
            lastmod: 0,
        })
    }

    pub fn path_len(&self) -> Option<u8> {
        self.out_path.as_ref().map(|p| p.len() as u8)
    }
}

/// Result of merging a discovered advert into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
}

/// Persisted contact directory with prefix search and recency scan.
pub struct ContactStore {
    path: PathBuf,
    contacts: Vec<ContactRecord>,
}

impl ContactStore {
    /// Load the directory from `path`. A missing file yields an empty
    /// store; a short read ends the load without error (end-of-data, not
    /// corruption); loading stops silently at capacity.
    pub fn load(path: &Path) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            contacts: Vec::new(),
        };
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return store,
            Err(e) => {
                warn!("contacts: read failed ({}); starting empty", e);
                return store;
            }
        };
        for chunk in bytes.chunks(CONTACT_RECORD_LEN) {
            if chunk.len() < CONTACT_RECORD_LEN {
                break; // short read = end of data
            }
            if store.contacts.len() >= MAX_CONTACTS {
                break;
            }
            let mut record = [0u8; CONTACT_RECORD_LEN];
            record.copy_from_slice(chunk);
            match ContactRecord::decode(&record) {
                Some(contact) => store.contacts.push(contact),
                None => break, // malformed record ends the load
            }
        }
        debug!("contacts: loaded {}", store.contacts.len());
        store
    }

    /// Rewrite the whole directory to the backing file, in iteration order.
    pub fn save(&self) -> std::io::Result<()> {
        let mut out = Vec::with_capacity(self.contacts.len() * CONTACT_RECORD_LEN);
        for contact in &self.contacts {
            out.extend_from_slice(&contact.encode());
        }
        std::fs::write(&self.path, out)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactRecord> {
        self.contacts.iter()
    }

    pub fn find_by_key(&self, public_key: &[u8; 32]) -> Option<&ContactRecord> {
        self.contacts.iter().find(|c| &c.public_key == public_key)
    }

    pub fn find_by_key_mut(&mut self, public_key: &[u8; 32]) -> Option<&mut ContactRecord> {
        self.contacts
            .iter_mut()
            .find(|c| &c.public_key == public_key)
    }

    /// Insert a new contact or update the existing record for the same
    /// public key. A full store rejects new contacts with a capacity error.
    pub fn upsert(&mut self, record: ContactRecord) -> Result<UpsertOutcome, CommandError> {
        if let Some(existing) = self.find_by_key_mut(&record.public_key) {
            *existing = record;
            return Ok(UpsertOutcome::Updated);
        }
        if self.contacts.len() >= MAX_CONTACTS {
            return Err(CommandError::Capacity("contact directory".to_string()));
        }
        self.contacts.push(record);
        Ok(UpsertOutcome::Added)
    }

    /// First contact whose name starts with `text`, case-insensitively, in
    /// store order.
    pub fn find_first_by_prefix(&self, text: &str) -> Option<&ContactRecord> {
        self.contacts
            .iter()
            .find(|c| starts_with_ignore_case(&c.name, text))
    }

    /// Names of all contacts matching a case-insensitive prefix, for
    /// autocomplete. Capped at store capacity by construction.
    pub fn find_names_by_prefix(&self, text: &str) -> Vec<String> {
        self.contacts
            .iter()
            .filter(|c| !c.name.is_empty() && starts_with_ignore_case(&c.name, text))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Contacts in most-recent-advert-first order. `n = 0` means all.
    pub fn recent(&self, n: usize) -> Vec<&ContactRecord> {
        let mut all: Vec<&ContactRecord> = self.contacts.iter().collect();
        all.sort_by(|a, b| b.last_advert.cmp(&a.last_advert));
        if n > 0 {
            all.truncate(n);
        }
        all
    }
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name
            .chars()
            .zip(prefix.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, key_byte: u8, last_advert: u32) -> ContactRecord {
        ContactRecord {
            public_key: [key_byte; 32],
            name: name.to_string(),
            contact_type: ContactType::Chat,
            flags: 0,
            out_path: None,
            last_advert,
            lastmod: 0,
        }
    }

    #[test]
    fn record_codec_roundtrip() {
        let mut rec = contact("Alice", 7, 1_700_000_000);
        rec.out_path = Some(vec![0x10, 0x20, 0x30]);
        rec.flags = 0x05;
        let decoded = ContactRecord::decode(&rec.encode()).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn pathless_record_roundtrip() {
        let rec = contact("Bob", 9, 42);
        let decoded = ContactRecord::decode(&rec.encode()).unwrap();
        assert_eq!(decoded.out_path, None);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn prefix_search_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ContactStore::load(&dir.path().join("contacts"));
        store.upsert(contact("Alice", 1, 10)).unwrap();
        for probe in ["al", "AL", "Al"] {
            assert_eq!(store.find_first_by_prefix(probe).unwrap().name, "Alice");
        }
        assert!(store.find_first_by_prefix("alice2").is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ContactStore::load(&dir.path().join("contacts"));
        for i in 0..MAX_CONTACTS {
            store
                .upsert(contact(&format!("peer{}", i), i as u8, i as u32))
                .unwrap();
        }
        let overflow = ContactRecord {
            public_key: [0xEE; 32],
            ..contact("late", 0, 0)
        };
        assert!(matches!(
            store.upsert(overflow),
            Err(CommandError::Capacity(_))
        ));
        assert_eq!(store.len(), MAX_CONTACTS);
        // The first `capacity` contacts remain retrievable.
        assert!(store.find_first_by_prefix("peer0").is_some());
    }

    #[test]
    fn upsert_updates_existing_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ContactStore::load(&dir.path().join("contacts"));
        store.upsert(contact("Alice", 1, 10)).unwrap();
        let mut renamed = contact("Alicia", 1, 20);
        renamed.out_path = Some(vec![1, 2]);
        assert_eq!(store.upsert(renamed).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().name, "Alicia");
    }

    #[test]
    fn recent_orders_by_last_advert() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ContactStore::load(&dir.path().join("contacts"));
        store.upsert(contact("old", 1, 100)).unwrap();
        store.upsert(contact("new", 2, 300)).unwrap();
        store.upsert(contact("mid", 3, 200)).unwrap();
        let names: Vec<_> = store.recent(0).iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["new", "mid", "old"]);
        assert_eq!(store.recent(2).len(), 2);
    }

    #[test]
    fn loads_consecutive_records_written_by_other_implementations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts");

        // Two records laid out by hand, byte-for-byte per the shared
        // format; record boundaries fall every 140 bytes.
        let mut bytes = Vec::new();
        for (name, key_byte) in [("Alice", 1u8), ("Bob", 2u8)] {
            let mut rec = [0u8; CONTACT_RECORD_LEN];
            rec[0..32].copy_from_slice(&[key_byte; 32]);
            rec[32..32 + name.len()].copy_from_slice(name.as_bytes());
            rec[64] = ContactType::Chat.as_byte();
            rec[71] = NO_PATH;
            rec[72..76].copy_from_slice(&100u32.to_le_bytes());
            bytes.extend_from_slice(&rec);
        }
        assert_eq!(bytes.len(), 280);
        std::fs::write(&path, bytes).unwrap();

        let store = ContactStore::load(&path);
        let names: Vec<_> = store.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[test]
    fn save_and_load_roundtrip_with_short_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts");
        let mut store = ContactStore::load(&path);
        store.upsert(contact("Alice", 1, 10)).unwrap();
        store.upsert(contact("Bob", 2, 20)).unwrap();
        store.save().unwrap();

        // Truncate mid-record: the partial tail is treated as end-of-data.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(CONTACT_RECORD_LEN + 10);
        std::fs::write(&path, bytes).unwrap();

        let reloaded = ContactStore::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.iter().next().unwrap().name, "Alice");
    }
}
