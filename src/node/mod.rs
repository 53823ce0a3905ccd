//! The chat node: owns all operator-facing state and drives it from a
//! single cooperative tick.
//!
//! Each tick drains pending console bytes through the line editor, then
//! lets the mesh core advance and deliver its events. Everything runs in
//! one task, so no state here needs locking; the only rule is that no
//! handler may block.

mod commands;
mod editor;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};

use crate::channels::ChannelRegistry;
use crate::clock::{MonotonicClock, WallClock};
use crate::console::ConsoleMux;
use crate::contacts::{ContactRecord, ContactStore, UpsertOutcome};
use crate::identity::{self, LocalIdentity};
use crate::mesh::{MeshEvent, MeshTransport, RouteKind};
use crate::messaging::MessagingAdapter;
use crate::prefs::NodePrefs;
use crate::textutil::escape_log;

pub use editor::{EditorAction, LineEditor, COMMAND_BUF_LEN, PROMPT};

const PREFS_FILE: &str = "node_prefs";
const CONTACTS_FILE: &str = "contacts";
const IDENTITY_FILE: &str = "identity";

/// Interactive mesh chat node over a mesh transport `T`.
pub struct ChatNode<T: MeshTransport> {
    transport: T,
    mux: ConsoleMux,
    identity: LocalIdentity,
    prefs: NodePrefs,
    prefs_path: PathBuf,
    registry: ChannelRegistry,
    contacts: ContactStore,
    adapter: MessagingAdapter,
    editor: LineEditor,
    mono: MonotonicClock,
    wall: WallClock,
    /// Runtime index of the selected channel; 0 is Public.
    selected_channel_idx: usize,
    /// Public key of the current direct-message recipient.
    current_recipient: Option<[u8; 32]>,
    reboot_requested: bool,
}

impl<T: MeshTransport> ChatNode<T> {
    /// Bring the node up from persisted state under `data_dir`.
    ///
    /// A missing identity blocks here for an operator ENTER before
    /// generation; this is the only blocking wait and it happens before
    /// any networking. Missing prefs or contacts fall back to defaults.
    pub fn boot(data_dir: &Path, transport: T, mut mux: ConsoleMux) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let identity = identity::load_or_generate(&data_dir.join(IDENTITY_FILE), &mut mux)?;

        let prefs_path = data_dir.join(PREFS_FILE);
        let prefs = NodePrefs::load(&prefs_path);
        let contacts = ContactStore::load(&data_dir.join(CONTACTS_FILE));
        let registry = ChannelRegistry::initialize(&prefs);
        let selected_channel_idx = Self::resolve_selection(&registry, &prefs);

        // Re-enable persisted auxiliary console endpoints.
        for idx in 1..prefs.console_enabled.len() {
            if prefs.console_enabled[idx] {
                if let Err(e) = mux.enable(idx) {
                    warn!("console port {} not re-enabled: {}", idx, e);
                }
            }
        }

        info!(
            "node '{}' up: {} contacts, {} channels",
            prefs.node_name,
            contacts.len(),
            registry.iter().count()
        );

        Ok(Self {
            transport,
            mux,
            identity,
            prefs,
            prefs_path,
            registry,
            contacts,
            adapter: MessagingAdapter::new(),
            editor: LineEditor::new(),
            mono: MonotonicClock::new(),
            wall: WallClock::new(),
            selected_channel_idx,
            current_recipient: None,
            reboot_requested: false,
        })
    }

    fn resolve_selection(registry: &ChannelRegistry, prefs: &NodePrefs) -> usize {
        if prefs.selected_channel.is_empty() {
            return 0;
        }
        match registry.resolve(&prefs.selected_channel) {
            Some(idx) => idx,
            None => {
                warn!(
                    "selected channel '{}' not active; selection reset to Public",
                    prefs.selected_channel
                );
                0
            }
        }
    }

    /// Reload all persisted state in place and reprint the welcome screen.
    /// The transport and console endpoints stay attached.
    pub fn reboot(&mut self) {
        self.prefs = NodePrefs::load(&self.prefs_path);
        self.contacts = ContactStore::load(&self.prefs_path.with_file_name(CONTACTS_FILE));
        self.registry = ChannelRegistry::initialize(&self.prefs);
        self.selected_channel_idx = Self::resolve_selection(&self.registry, &self.prefs);
        self.current_recipient = None;
        self.adapter = MessagingAdapter::new();
        self.editor.clear();
        self.reboot_requested = false;
        info!("node '{}' rebooted", self.prefs.node_name);
        self.show_welcome();
        self.check_public_channel();
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }

    pub fn node_name(&self) -> &str {
        &self.prefs.node_name
    }

    /// Startup banner, node identity, and the initial prompt.
    pub fn show_welcome(&mut self) {
        self.mux.println("");
        self.mux.println("  __  __        _    ___ _        _   ");
        self.mux.println(" |  \\/  |___ __| |_ / __| |_  __ _| |_ ");
        self.mux.println(" | |\\/| / -_|_-< ' \\ (__| ' \\/ _` |  _|");
        self.mux.println(" |_|  |_\\___/__/_||_\\___|_||_\\__,_|\\__|");
        self.mux.println("    ===== Mesh Chat Terminal =====");
        self.mux.println("");
        self.mux.println(&format!("WELCOME  {}", self.prefs.node_name));
        self.mux.println(&self.identity.public_hex());
        self.mux.println("(enter 'help' for basic commands)");
        self.mux.println("");
        self.mux.print(PROMPT);
        self.mux.flush();
    }

    /// Report Public channel health and the loaded user-channel count.
    pub fn check_public_channel(&mut self) {
        if self.registry.public_available() {
            self.mux.println("Public channel initialized successfully!");
        } else {
            self.mux.println("ERROR: Failed to add Public channel!");
            self.mux
                .println("Group messaging on Public is unavailable until corrected.");
        }
        let user_count = self.prefs.active_channels().count();
        if user_count > 0 {
            self.mux
                .println(&format!("{} user channel(s) loaded", user_count));
        }
    }

    /// Flood the initial self-advertisement shortly after boot.
    pub fn send_boot_advert(&mut self) {
        if let Err(e) =
            self.transport
                .send_self_advert(&self.prefs.node_name, self.prefs.node_lat, self.prefs.node_lon, false)
        {
            warn!("boot advert not sent: {}", e);
        }
    }

    /// One cooperative tick: drain console input, then poll the mesh core.
    pub fn tick(&mut self) {
        while let Some(byte) = self.mux.read_byte() {
            self.feed_console_byte(byte);
            if self.reboot_requested {
                return;
            }
        }
        for event in self.transport.poll() {
            self.handle_mesh_event(event);
        }
        self.mux.flush();
    }

    fn feed_console_byte(&mut self, byte: u8) {
        match self.editor.feed(byte) {
            EditorAction::Echo(ch) => {
                let mut buf = [0u8; 4];
                self.mux.print(ch.encode_utf8(&mut buf));
            }
            EditorAction::Submit(line) => {
                self.mux.println("");
                self.handle_command(line.trim());
                if !self.reboot_requested {
                    self.mux.print(&format!("\r{}", PROMPT));
                }
            }
            EditorAction::Tab => self.autocomplete(),
            EditorAction::Cancel { discarded } => {
                // Blank the whole line, then redraw an empty prompt.
                let width = PROMPT.len() + discarded;
                self.mux.print(&format!("\r{}\r{}", " ".repeat(width), PROMPT));
            }
            EditorAction::Erase => self.mux.print("\x08 \x08"),
            EditorAction::Overflow => {
                self.mux.println("");
                self.mux.println("   ERROR: command too long");
                self.mux.print(&format!("\r{}", PROMPT));
            }
            EditorAction::None => {}
        }
    }

    /// Reprint the prompt and any partial input after asynchronous output.
    fn redraw_prompt(&mut self) {
        self.mux
            .print(&format!("\r{}{}", PROMPT, self.editor.buffer()));
    }

    fn handle_mesh_event(&mut self, event: MeshEvent) {
        match event {
            MeshEvent::ContactDiscovered { info, path } => self.on_contact_discovered(info, path),
            MeshEvent::PathUpdated { public_key, path } => self.on_path_updated(public_key, path),
            MeshEvent::AckReceived { tag } => self.on_ack_received(tag),
            MeshEvent::DirectMessage {
                from,
                sender_timestamp,
                route,
                text,
            } => self.on_direct_message(from, sender_timestamp, route, &text),
            MeshEvent::GroupMessage {
                channel_hash,
                route,
                text,
            } => self.on_group_message(&channel_hash, route, &text),
            MeshEvent::SendTimedOut => {
                self.mux.print("\r\n");
                self.mux.println("   (send timed out; no ack)");
                self.redraw_prompt();
            }
        }
    }

    fn on_contact_discovered(&mut self, info: crate::mesh::AdvertInfo, path: Vec<u8>) {
        let record = match self.contacts.find_by_key(&info.public_key) {
            Some(existing) => ContactRecord {
                name: info.name.clone(),
                contact_type: info.contact_type,
                last_advert: info.timestamp,
                ..existing.clone()
            },
            None => ContactRecord {
                public_key: info.public_key,
                name: info.name.clone(),
                contact_type: info.contact_type,
                flags: 0,
                out_path: if path.is_empty() { None } else { Some(path) },
                last_advert: info.timestamp,
                lastmod: 0,
            },
        };
        match self.contacts.upsert(record) {
            Ok(outcome) => {
                if outcome == UpsertOutcome::Added {
                    info!("new contact '{}'", escape_log(&info.name));
                }
                self.save_contacts();
            }
            Err(e) => {
                warn!("advert from '{}' dropped: {}", escape_log(&info.name), e);
                return;
            }
        }
        if !self.prefs.mute_adverts {
            self.mux.print("\r\n");
            self.mux.println(&format!(
                "ADVERT from -> {} | type: {} | public key: {}",
                info.name,
                info.contact_type.label(),
                hex::encode(info.public_key)
            ));
            self.redraw_prompt();
        }
    }

    fn on_path_updated(&mut self, public_key: [u8; 32], path: Vec<u8>) {
        let name = match self.contacts.find_by_key_mut(&public_key) {
            Some(contact) => {
                contact.out_path = Some(path);
                contact.name.clone()
            }
            None => return, // path for a peer we never met; ignore
        };
        self.save_contacts();
        let path_len = self
            .contacts
            .find_by_key(&public_key)
            .and_then(|c| c.path_len())
            .unwrap_or(0);
        self.mux.print("\r\n");
        self.mux
            .println(&format!("PATH to: {}, path_len={}", name, path_len));
        self.redraw_prompt();
    }

    fn on_ack_received(&mut self, tag: u32) {
        if let Some(elapsed) = self.adapter.on_ack(tag, self.mono.millis()) {
            self.mux.print("\r\n");
            self.mux
                .println(&format!("   Got ACK! (round trip: {} millis)", elapsed));
            self.redraw_prompt();
        }
    }

    fn on_direct_message(&mut self, from: [u8; 32], sender_timestamp: u32, route: RouteKind, text: &str) {
        let inbound = self.adapter.on_direct_message(sender_timestamp, text);
        let sender = self
            .contacts
            .find_by_key(&from)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "(unknown)".to_string());
        let route_tag = match route {
            RouteKind::Direct => "DIRECT",
            RouteKind::Flood { .. } => "FLOOD",
        };
        self.mux.print("\r\n");
        self.mux.println(&format!(
            "({}) MSG -> from {} | {}",
            route_tag, sender, inbound.display_text
        ));
        if let Some(target) = inbound.clock_advance_to {
            if self.wall.advance_to(target) {
                self.mux.println("   (OK - clock set!)");
            } else {
                self.mux.println("   (ERR: clock cannot go backwards)");
            }
        }
        self.redraw_prompt();
    }

    fn on_group_message(&mut self, channel_hash: &[u8; 32], route: RouteKind, text: &str) {
        if let Some(line) = self
            .adapter
            .on_group_message(&self.registry, channel_hash, route, text)
        {
            self.mux.print("\r\n");
            self.mux.println(&line);
            self.redraw_prompt();
        }
    }

    fn save_prefs(&mut self) {
        if let Err(e) = self.prefs.save(&self.prefs_path) {
            warn!("prefs not saved: {}", e);
            self.mux.println("   WARNING: settings not saved");
        }
    }

    fn save_contacts(&mut self) {
        if let Err(e) = self.contacts.save() {
            warn!("contacts not saved: {}", e);
        }
    }
}
