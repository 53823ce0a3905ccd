//! Test utilities & fixtures.
//! Provides a scriptable in-memory mesh transport and console harness for
//! driving a full `ChatNode` without a radio.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use meshchat::channels::ChannelKey;
use meshchat::console::{ConsoleMux, ScriptHandle, ScriptedEndpoint};
use meshchat::contacts::{ContactRecord, ContactType};
use meshchat::mesh::{AdvertInfo, MeshEvent, MeshTransport, SendKind, TransportError};
use meshchat::node::ChatNode;

pub const FAKE_AIRTIME_MS: u32 = 100;

#[derive(Debug, Clone)]
pub struct DirectSend {
    pub dest: [u8; 32],
    pub timestamp: u32,
    pub text: String,
    pub ack_tag: u32,
    pub timeout_ms: u32,
}

#[derive(Debug, Clone)]
pub struct GroupSend {
    pub key: Vec<u8>,
    pub timestamp: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AdvertSend {
    pub name: String,
    pub zero_hop: bool,
}

#[derive(Default)]
struct Inner {
    events: VecDeque<MeshEvent>,
    direct_sends: Vec<DirectSend>,
    group_sends: Vec<GroupSend>,
    adverts: Vec<AdvertSend>,
    imported: Vec<Vec<u8>>,
    path_resets: Vec<[u8; 32]>,
}

/// In-memory mesh core: records every send and replays queued events on
/// `poll`. Clones share state, so tests keep a handle after the node takes
/// ownership.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

#[allow(dead_code)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: MeshEvent) {
        self.inner.lock().unwrap().events.push_back(event);
    }

    pub fn direct_sends(&self) -> Vec<DirectSend> {
        self.inner.lock().unwrap().direct_sends.clone()
    }

    pub fn group_sends(&self) -> Vec<GroupSend> {
        self.inner.lock().unwrap().group_sends.clone()
    }

    pub fn adverts(&self) -> Vec<AdvertSend> {
        self.inner.lock().unwrap().adverts.clone()
    }

    pub fn imported(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().imported.clone()
    }

    pub fn path_resets(&self) -> Vec<[u8; 32]> {
        self.inner.lock().unwrap().path_resets.clone()
    }
}

impl MeshTransport for FakeTransport {
    fn estimate_airtime_ms(&self, _payload_len: usize) -> u32 {
        FAKE_AIRTIME_MS
    }

    fn send_direct_text(
        &mut self,
        dest: &ContactRecord,
        timestamp: u32,
        text: &str,
        ack_tag: u32,
        timeout_ms: u32,
    ) -> Result<SendKind, TransportError> {
        self.inner.lock().unwrap().direct_sends.push(DirectSend {
            dest: dest.public_key,
            timestamp,
            text: text.to_string(),
            ack_tag,
            timeout_ms,
        });
        Ok(if dest.out_path.is_some() {
            SendKind::Direct
        } else {
            SendKind::Flood
        })
    }

    fn send_group_text(
        &mut self,
        key: &ChannelKey,
        timestamp: u32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.inner.lock().unwrap().group_sends.push(GroupSend {
            key: key.as_bytes().to_vec(),
            timestamp,
            text: text.to_string(),
        });
        Ok(())
    }

    fn send_self_advert(
        &mut self,
        name: &str,
        _lat: f64,
        _lon: f64,
        zero_hop: bool,
    ) -> Result<(), TransportError> {
        self.inner.lock().unwrap().adverts.push(AdvertSend {
            name: name.to_string(),
            zero_hop,
        });
        Ok(())
    }

    fn export_self_advert(
        &mut self,
        name: &str,
        _lat: f64,
        _lon: f64,
    ) -> Result<Vec<u8>, TransportError> {
        let mut bytes = vec![0xAD];
        bytes.extend_from_slice(name.as_bytes());
        Ok(bytes)
    }

    fn import_advert(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.is_empty() {
            return Err(TransportError::BadAdvert);
        }
        self.inner.lock().unwrap().imported.push(bytes.to_vec());
        Ok(())
    }

    fn reset_path(&mut self, dest: &[u8; 32]) {
        self.inner.lock().unwrap().path_resets.push(*dest);
    }

    fn poll(&mut self) -> Vec<MeshEvent> {
        self.inner.lock().unwrap().events.drain(..).collect()
    }
}

/// Boot a node from `dir` with a scripted console and a fake transport.
/// The identity keypress is pre-fed so boot never waits.
pub fn boot_node(dir: &Path) -> (ChatNode<FakeTransport>, ScriptHandle, FakeTransport) {
    let endpoint = ScriptedEndpoint::new();
    let handle = endpoint.handle();
    handle.feed("\n");
    let mux = ConsoleMux::new(Box::new(endpoint));
    let transport = FakeTransport::new();
    let node = ChatNode::boot(dir, transport.clone(), mux).expect("boot");
    handle.clear_output();
    (node, handle, transport)
}

/// Type one command line into the node and return the console output it
/// produced.
#[allow(dead_code)]
pub fn run_command(
    node: &mut ChatNode<FakeTransport>,
    handle: &ScriptHandle,
    line: &str,
) -> String {
    handle.clear_output();
    handle.feed(line);
    handle.feed("\r");
    node.tick();
    handle.output_text()
}

/// Deliver a peer advert through the mesh event path.
#[allow(dead_code)]
pub fn discover_contact(
    node: &mut ChatNode<FakeTransport>,
    transport: &FakeTransport,
    name: &str,
    key_byte: u8,
    path: Vec<u8>,
) {
    transport.push_event(MeshEvent::ContactDiscovered {
        info: AdvertInfo {
            public_key: [key_byte; 32],
            name: name.to_string(),
            contact_type: ContactType::Chat,
            timestamp: u32::from(key_byte) + 1_000,
        },
        path,
    });
    node.tick();
}
