//! Persisted node identity.
//!
//! The identity file holds the 32-byte public key followed by the 64-byte
//! secret key. When no identity exists, generation blocks until the
//! operator presses ENTER; this is the one permitted blocking wait and it
//! happens before networking begins. The leading public-key byte values
//! 0x00 and 0xFF are reserved hash prefixes in the mesh protocol and are
//! never used for a fresh identity.

use std::path::Path;

use log::info;
use rand::RngCore;

use crate::console::ConsoleMux;

pub const PUB_KEY_SIZE: usize = 32;
const SECRET_KEY_SIZE: usize = 64;
const IDENTITY_FILE_LEN: usize = PUB_KEY_SIZE + SECRET_KEY_SIZE;
const RESERVED_PREFIXES: [u8; 2] = [0x00, 0xFF];
const MAX_GENERATE_ATTEMPTS: usize = 10;

/// Local signing identity. The secret half never leaves this struct.
#[derive(Clone)]
pub struct LocalIdentity {
    pub public_key: [u8; PUB_KEY_SIZE],
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl LocalIdentity {
    /// Generate a fresh identity, retrying while the leading public-key
    /// byte is reserved.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut identity = Self::generate_once(rng);
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            if !RESERVED_PREFIXES.contains(&identity.public_key[0]) {
                break;
            }
            identity = Self::generate_once(rng);
        }
        identity
    }

    fn generate_once<R: RngCore>(rng: &mut R) -> Self {
        let mut public_key = [0u8; PUB_KEY_SIZE];
        let mut secret_key = [0u8; SECRET_KEY_SIZE];
        rng.fill_bytes(&mut public_key);
        rng.fill_bytes(&mut secret_key);
        Self {
            public_key,
            secret_key,
        }
    }

    /// Read the identity file. `Ok(None)` when it does not exist; a
    /// truncated file is treated the same (a new identity gets generated).
    pub fn load(path: &Path) -> std::io::Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if bytes.len() < IDENTITY_FILE_LEN {
            return Ok(None);
        }
        let mut public_key = [0u8; PUB_KEY_SIZE];
        let mut secret_key = [0u8; SECRET_KEY_SIZE];
        public_key.copy_from_slice(&bytes[..PUB_KEY_SIZE]);
        secret_key.copy_from_slice(&bytes[PUB_KEY_SIZE..IDENTITY_FILE_LEN]);
        Ok(Some(Self {
            public_key,
            secret_key,
        }))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut out = Vec::with_capacity(IDENTITY_FILE_LEN);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.secret_key);
        std::fs::write(path, out)
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public_key)
    }
}

/// Load the persisted identity, or generate and save one after waiting for
/// an operator keypress (entropy seed plus explicit consent, before any
/// networking starts).
pub fn load_or_generate(path: &Path, mux: &mut ConsoleMux) -> std::io::Result<LocalIdentity> {
    if let Some(identity) = LocalIdentity::load(path)? {
        return Ok(identity);
    }
    mux.println("Press ENTER to generate key:");
    loop {
        match mux.read_byte() {
            Some(b'\n') | Some(b'\r') => break,
            Some(_) => {}
            None => std::thread::sleep(std::time::Duration::from_millis(10)),
        }
    }
    let identity = LocalIdentity::generate(&mut rand::thread_rng());
    identity.save(path)?;
    info!("generated new identity {}", identity.public_hex());
    Ok(identity)
}
