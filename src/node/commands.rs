//! Command dispatch and context-sensitive autocomplete.
//!
//! Matching is by literal prefix, most specific first: `set ch ` is tested
//! before `set `, the channel mute forms before the advert mute forms.
//! Handlers never block and never propagate errors; every failure becomes
//! one line of console text.

use log::debug;

use crate::channels::{ChannelEdit, ChannelRegistry};
use crate::error::CommandError;
use crate::mesh::{MeshTransport, SendKind};
use crate::prefs::MAX_NAME_LEN;
use crate::textutil::escape_log;

use super::{ChatNode, PROMPT};

const VERSION_TEXT: &str = concat!("meshchat v", env!("CARGO_PKG_VERSION"));
const CARD_SCHEME: &str = "meshcore://";
const BELL: &str = "\x07";

/// Commands whose final argument is a channel name, for autocomplete.
const CHANNEL_ARG_PREFIXES: [&str; 4] = ["chsel ", "mute ch ", "unmute ch ", "del ch "];

impl<T: MeshTransport> ChatNode<T> {
    pub(super) fn handle_command(&mut self, command: &str) {
        debug!("command: {}", escape_log(command));
        if let Some(text) = command.strip_prefix("send ") {
            self.cmd_send(text);
        } else if let Some(text) = command.strip_prefix("ch ") {
            self.cmd_send_channel(text);
        } else if let Some(name) = command.strip_prefix("chsel ") {
            self.cmd_select_channel(name.trim());
        } else if let Some(params) = command.strip_prefix("set ch ") {
            self.cmd_set_channel(params.trim());
        } else if let Some(name) = command.strip_prefix("del ch ") {
            self.cmd_delete_channel(name.trim());
        } else if let Some(name) = command.strip_prefix("mute ch ") {
            self.cmd_mute_channel(name.trim(), true);
        } else if let Some(name) = command.strip_prefix("unmute ch ") {
            self.cmd_mute_channel(name.trim(), false);
        } else if let Some(rest) = command.strip_prefix("set ") {
            self.cmd_set(rest);
        } else if command == "get" || command.starts_with("get ") {
            self.cmd_get(command[3..].trim());
        } else if command == "list" || command.starts_with("list ") {
            self.cmd_list(command[4..].trim());
        } else if let Some(prefix) = command.strip_prefix("to ") {
            self.cmd_select_recipient(prefix.trim());
        } else if command == "to" {
            self.cmd_show_recipient();
        } else if command == "clock" {
            let line = format!("   {}", self.wall.display());
            self.mux.println(&line);
        } else if let Some(secs) = command.strip_prefix("time ") {
            self.cmd_set_time(secs.trim());
        } else if command == "advert" {
            self.cmd_advert();
        } else if command == "reset path" {
            self.cmd_reset_path();
        } else if command == "card" {
            self.cmd_card();
        } else if let Some(card) = command.strip_prefix("import ") {
            self.cmd_import(card.trim());
        } else if command == "mute" || command.starts_with("mute ") {
            self.cmd_mute_adverts(command[4..].trim(), true);
        } else if command == "unmute" || command.starts_with("unmute ") {
            self.cmd_mute_adverts(command[6..].trim(), false);
        } else if let Some(rest) = command.strip_prefix("serial ") {
            self.cmd_serial(rest.trim());
        } else if command == "ver" {
            self.mux.println(VERSION_TEXT);
        } else if command == "reboot" {
            self.mux.println("Rebooting...");
            self.mux.flush();
            self.reboot_requested = true;
        } else if command == "help" {
            self.cmd_help();
        } else if !command.is_empty() {
            let line = format!("   ERROR: unknown command: {}", command);
            self.mux.println(&line);
        }
    }

    fn cmd_send(&mut self, text: &str) {
        let Some(key) = self.current_recipient else {
            self.mux
                .println("   ERROR: no recipient selected (use 'to' cmd).");
            return;
        };
        let Some(contact) = self.contacts.find_by_key(&key) else {
            self.mux.println("   ERROR: recipient no longer known.");
            self.current_recipient = None;
            return;
        };
        let timestamp = self.wall.now_secs();
        let now_ms = self.mono.millis();
        match self
            .adapter
            .send_direct(&mut self.transport, contact, timestamp, now_ms, text)
        {
            Ok(kind) => {
                let route = match kind {
                    SendKind::Flood => "FLOOD",
                    SendKind::Direct => "DIRECT",
                };
                self.mux
                    .println(&format!("   (message sent - {})", route));
            }
            Err(e) => {
                debug!("direct send failed: {}", e);
                self.mux.println("   ERROR: unable to send.");
            }
        }
    }

    fn cmd_send_channel(&mut self, text: &str) {
        let timestamp = self.wall.now_secs();
        let idx = self.selected_channel_idx;
        let result = {
            let node_name = self.prefs.node_name.clone();
            self.adapter
                .send_group(&mut self.transport, &self.registry, idx, &node_name, timestamp, text)
        };
        match result {
            Ok(()) => {
                let name = self.registry.name_of(idx).unwrap_or("?").to_string();
                self.mux.println(&format!("   Sent to [{}]", name));
            }
            Err(CommandError::NotFound(_)) => {
                self.mux
                    .println("   ERROR: Selected channel not initialized!");
            }
            Err(e) => {
                debug!("group send failed: {}", e);
                self.mux.println("   ERROR: unable to send");
            }
        }
    }

    fn cmd_select_channel(&mut self, name: &str) {
        match self.registry.resolve(name) {
            Some(idx) => {
                self.selected_channel_idx = idx;
                // Public is stored as the empty selection.
                self.prefs.selected_channel = if idx == 0 {
                    String::new()
                } else {
                    self.registry.name_of(idx).unwrap_or(name).to_string()
                };
                self.save_prefs();
                let display = self.registry.name_of(idx).unwrap_or(name).to_string();
                self.mux
                    .println(&format!("   Channel '{}' selected", display));
            }
            None => self.mux.println("   ERROR: Channel not found"),
        }
    }

    fn cmd_set_channel(&mut self, params: &str) {
        let result = if params.starts_with('#') {
            let name = params.split_whitespace().next().unwrap_or(params);
            ChannelRegistry::add_or_update(&mut self.prefs, name, None)
        } else {
            let mut parts = params.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(key_hex)) => {
                    ChannelRegistry::add_or_update(&mut self.prefs, name, Some(key_hex))
                }
                _ => {
                    self.mux
                        .println("   Usage: set ch <name> <hex_key>  (32 or 64 hex chars)");
                    self.mux
                        .println("          set ch #<name>           (hashtag channel)");
                    return;
                }
            }
        };
        let name = params.split_whitespace().next().unwrap_or(params);
        match result {
            Ok(ChannelEdit::AddedHashtag) => {
                self.save_prefs();
                self.mux.println(&format!(
                    "   Channel '{}' added (hashtag) - reboot to activate",
                    name
                ));
            }
            Ok(ChannelEdit::AddedKeyed { bits }) => {
                self.save_prefs();
                self.mux.println(&format!(
                    "   Channel '{}' added ({}-bit) - reboot to activate",
                    name, bits
                ));
            }
            Ok(ChannelEdit::UpdatedKeyed { bits }) => {
                self.save_prefs();
                self.mux.println(&format!(
                    "   Channel '{}' updated ({}-bit) - reboot to activate",
                    name, bits
                ));
            }
            Err(CommandError::Capacity(_)) => {
                self.mux.println("   ERROR: Channel limit reached");
            }
            Err(e) => self.mux.println(&format!("   ERROR: {}", e)),
        }
    }

    fn cmd_delete_channel(&mut self, name: &str) {
        match ChannelRegistry::remove(&mut self.prefs, name) {
            Ok(()) => {
                // The runtime selection follows the persisted reset.
                if self.prefs.selected_channel.is_empty() {
                    self.selected_channel_idx = 0;
                }
                self.save_prefs();
                self.mux.println(&format!(
                    "   Channel '{}' removed - reboot to apply",
                    name
                ));
            }
            Err(CommandError::NotFound(_)) => {
                self.mux.println("   ERROR: Channel not found");
            }
            Err(_) => {
                self.mux.println("   ERROR: Cannot delete Public channel");
            }
        }
    }

    fn cmd_mute_channel(&mut self, name: &str, muted: bool) {
        match self.registry.resolve(name) {
            Some(idx) => {
                if let Err(e) = self.registry.set_muted(idx, muted, &mut self.prefs) {
                    self.mux.println(&format!("   ERROR: {}", e));
                    return;
                }
                self.save_prefs();
                let display = self.registry.name_of(idx).unwrap_or(name).to_string();
                self.mux.println(&format!(
                    "   Channel '{}' {}",
                    display,
                    if muted { "muted" } else { "unmuted" }
                ));
            }
            None => self.mux.println("   ERROR: Channel not found"),
        }
    }

    fn cmd_mute_adverts(&mut self, kind: &str, muted: bool) {
        if kind.is_empty() || kind == "advert" {
            self.prefs.mute_adverts = muted;
            self.save_prefs();
            self.mux.println(&format!(
                "   ADVERT messages {}",
                if muted { "muted" } else { "unmuted" }
            ));
        } else {
            self.mux.println(&format!(
                "   ERROR: unknown {} type (try: advert, or 'ch <name>')",
                if muted { "mute" } else { "unmute" }
            ));
        }
    }

    fn cmd_set(&mut self, rest: &str) {
        let (param, value) = match rest.split_once(' ') {
            Some((p, v)) => (p, v.trim()),
            None => {
                self.mux
                    .println(&format!("  ERROR: unknown config: {}", rest));
                return;
            }
        };
        let outcome: Result<&str, ()> = match param {
            "name" => {
                let mut name = value.to_string();
                name.truncate(MAX_NAME_LEN);
                self.prefs.node_name = name;
                Ok("  OK")
            }
            "lat" => value.parse().map(|v| {
                self.prefs.node_lat = v;
                "  OK"
            }).map_err(|_| ()),
            "lon" => value.parse().map(|v| {
                self.prefs.node_lon = v;
                "  OK"
            }).map_err(|_| ()),
            "af" => value.parse().map(|v| {
                self.prefs.airtime_factor = v;
                "  OK"
            }).map_err(|_| ()),
            "freq" => value.parse().map(|v| {
                self.prefs.freq_mhz = v;
                "  OK - reboot to apply"
            }).map_err(|_| ()),
            "bw" => value.parse().map(|v| {
                self.prefs.bandwidth_khz = v;
                "  OK - reboot to apply"
            }).map_err(|_| ()),
            "sf" => value.parse().map(|v| {
                self.prefs.spreading_factor = v;
                "  OK - reboot to apply"
            }).map_err(|_| ()),
            "cr" => value.parse().map(|v| {
                self.prefs.coding_rate = v;
                "  OK - reboot to apply"
            }).map_err(|_| ()),
            "tx" => value.parse().map(|v| {
                self.prefs.tx_power_dbm = v;
                "  OK - reboot to apply"
            }).map_err(|_| ()),
            _ => {
                self.mux
                    .println(&format!("  ERROR: unknown config: {}", rest));
                return;
            }
        };
        match outcome {
            Ok(line) => {
                self.save_prefs();
                self.mux.println(line);
            }
            Err(()) => self
                .mux
                .println(&format!("  ERROR: invalid value for '{}'", param)),
        }
    }

    fn cmd_get(&mut self, param: &str) {
        let show_all = param.is_empty();
        let mut lines: Vec<String> = Vec::new();
        if show_all || param == "name" {
            lines.push(format!("  name: {}", self.prefs.node_name));
        }
        if show_all || param == "lat" {
            lines.push(format!("  lat:  {:.6}", self.prefs.node_lat));
        }
        if show_all || param == "lon" {
            lines.push(format!("  lon:  {:.6}", self.prefs.node_lon));
        }
        if show_all || param == "freq" {
            lines.push(format!("  freq: {:.3} MHz", self.prefs.freq_mhz));
        }
        if show_all || param == "tx" {
            lines.push(format!("  tx:   {} dBm", self.prefs.tx_power_dbm));
        }
        if show_all || param == "sf" {
            lines.push(format!("  sf:   {}", self.prefs.spreading_factor));
        }
        if show_all || param == "cr" {
            lines.push(format!("  cr:   {}", self.prefs.coding_rate));
        }
        if show_all || param == "bw" {
            lines.push(format!("  bw:   {:.1} kHz", self.prefs.bandwidth_khz));
        }
        if show_all || param == "af" {
            lines.push(format!("  af:   {:.2}", self.prefs.airtime_factor));
        }
        if show_all || param == "ch" {
            lines.push("  Channels:".to_string());
            for (idx, ch) in self.registry.iter() {
                lines.push(format!(
                    "    [{}] {}{}{}",
                    idx,
                    ch.name,
                    if idx == self.selected_channel_idx { " *" } else { "" },
                    if ch.muted { " (muted)" } else { "" }
                ));
            }
        }
        if lines.is_empty() {
            lines.push(format!("  ERROR: unknown param: {}", param));
        }
        for line in lines {
            self.mux.println(&line);
        }
    }

    fn cmd_list(&mut self, arg: &str) {
        let n = arg.parse::<usize>().unwrap_or(0);
        let lines: Vec<String> = self
            .contacts
            .recent(n)
            .iter()
            .map(|c| {
                format!(
                    "   {} ({}){}",
                    c.name,
                    c.contact_type.label(),
                    match c.path_len() {
                        Some(len) => format!(" - path_len {}", len),
                        None => String::new(),
                    }
                )
            })
            .collect();
        if lines.is_empty() {
            self.mux.println("   (no contacts)");
        }
        for line in lines {
            self.mux.println(&line);
        }
    }

    fn cmd_select_recipient(&mut self, prefix: &str) {
        match self.contacts.find_first_by_prefix(prefix) {
            Some(contact) => {
                let name = contact.name.clone();
                self.current_recipient = Some(contact.public_key);
                self.mux
                    .println(&format!("   Recipient {} now selected.", name));
            }
            None => self.mux.println("   Error: Name prefix not found."),
        }
    }

    fn cmd_show_recipient(&mut self) {
        let line = match self
            .current_recipient
            .and_then(|key| self.contacts.find_by_key(&key))
        {
            Some(contact) => format!("   Current: {}", contact.name),
            None => "   Err: no recipient selected".to_string(),
        };
        self.mux.println(&line);
    }

    fn cmd_set_time(&mut self, arg: &str) {
        let Ok(secs) = arg.parse::<u32>() else {
            self.mux.println("   ERROR: invalid epoch seconds");
            return;
        };
        if self.wall.advance_to(secs) {
            self.mux.println("   (OK - clock set!)");
        } else {
            self.mux.println("   (ERR: clock cannot go backwards)");
        }
    }

    fn cmd_advert(&mut self) {
        match self.transport.send_self_advert(
            &self.prefs.node_name,
            self.prefs.node_lat,
            self.prefs.node_lon,
            true,
        ) {
            Ok(()) => self.mux.println("   (advert sent, zero hop)."),
            Err(e) => {
                debug!("advert failed: {}", e);
                self.mux.println("   ERR: unable to send");
            }
        }
    }

    fn cmd_reset_path(&mut self) {
        let Some(key) = self.current_recipient else {
            self.mux
                .println("   ERROR: no recipient selected (use 'to' cmd).");
            return;
        };
        self.transport.reset_path(&key);
        if let Some(contact) = self.contacts.find_by_key_mut(&key) {
            contact.out_path = None;
        }
        self.save_contacts();
        self.mux.println("   Done.");
    }

    fn cmd_card(&mut self) {
        match self.transport.export_self_advert(
            &self.prefs.node_name,
            self.prefs.node_lat,
            self.prefs.node_lon,
        ) {
            Ok(bytes) => {
                self.mux.println("Your MeshCore biz card:");
                self.mux
                    .println(&format!("{}{}", CARD_SCHEME, hex::encode(bytes)));
                self.mux.println("");
            }
            Err(e) => {
                debug!("card export failed: {}", e);
                self.mux.println("  Error");
            }
        }
    }

    fn cmd_import(&mut self, card: &str) {
        let Some(body) = card.strip_prefix(CARD_SCHEME) else {
            self.mux.println("   error: invalid format");
            return;
        };
        // Trailing junk (whitespace, punctuation from copy-paste) is trimmed
        // back to the last hex digit.
        let body = body.trim_end_matches(|c: char| !c.is_ascii_hexdigit());
        let bytes = match hex::decode(body) {
            Ok(b) if !b.is_empty() => b,
            _ => {
                self.mux.println("   error: invalid format");
                return;
            }
        };
        match self.transport.import_advert(&bytes) {
            Ok(()) => self.mux.println("   (card imported)"),
            Err(e) => {
                debug!("card import failed: {}", e);
                self.mux.println("   error: invalid format");
            }
        }
    }

    fn cmd_serial(&mut self, rest: &str) {
        if rest == "list" {
            self.mux.println("Available serial ports:");
            let lines: Vec<String> = (0..self.mux.len())
                .map(|i| {
                    format!(
                        "   {}: {} - {}",
                        i,
                        self.mux.name(i).unwrap_or("?"),
                        if self.mux.is_enabled(i) { "ENABLED" } else { "disabled" }
                    )
                })
                .collect();
            for line in lines {
                self.mux.println(&line);
            }
            self.mux.println("Note: Port 0 cannot be disabled");
        } else if let Some(arg) = rest.strip_prefix("enable ") {
            self.cmd_serial_toggle(arg.trim(), true);
        } else if let Some(arg) = rest.strip_prefix("disable ") {
            self.cmd_serial_toggle(arg.trim(), false);
        } else {
            self.mux
                .println("   Usage: serial list|enable <N>|disable <N>");
        }
    }

    fn cmd_serial_toggle(&mut self, arg: &str, enable: bool) {
        let Ok(idx) = arg.parse::<usize>() else {
            self.mux.println("   ERROR: Invalid port number");
            return;
        };
        let result = if enable {
            self.mux.enable(idx)
        } else {
            self.mux.disable(idx)
        };
        match result {
            Ok(()) => {
                self.prefs.set_console_enabled(idx, enable);
                self.save_prefs();
                let name = self.mux.name(idx).unwrap_or("?").to_string();
                self.mux.println(&format!(
                    "{} {}",
                    if enable { "Enabled" } else { "Disabled" },
                    name
                ));
            }
            Err(e) => self.mux.println(&format!("   ERROR: {}", e)),
        }
    }

    fn cmd_help(&mut self) {
        for line in [
            "Commands:",
            "   set {name|lat|lon|freq|tx|sf|cr|bw|af} {value}",
            "   set ch <name> <hex_key>  - add channel (32/64 hex chars)",
            "   set ch #<name>           - add hashtag channel",
            "   get [{name|lat|lon|freq|tx|sf|cr|bw|af|ch}]",
            "   del ch <name>            - delete channel",
            "   card                     - show your biz card",
            "   import {biz card}        - import contact from biz card",
            "   clock                    - show current time",
            "   time <epoch-seconds>     - set current time",
            "   list {n}                 - list recent contacts",
            "   to <recipient name>      - select recipient by name",
            "   send <text>              - send to selected recipient",
            "   chsel <name>             - select channel",
            "   ch <text>                - send to selected channel",
            "   mute|unmute ch <name>    - mute/unmute channel",
            "   mute|unmute [advert]     - mute/unmute adverts",
            "   serial list              - list serial ports",
            "   serial enable|disable <N> - enable/disable serial port",
            "   advert                   - send advert",
            "   reset path               - reset route path",
            "   reboot                   - reboot node",
            "   ver                      - show version",
            "",
            "Keyboard shortcuts:",
            "   TAB - autocomplete contact or channel names",
            "   ESC - clear current input line",
        ] {
            self.mux.println(line);
        }
    }

    /// TAB handler: complete the trailing name argument of the recipient or
    /// channel commands. One match rewrites the buffer and redraws; several
    /// are listed with the buffer kept; none rings the bell.
    pub(super) fn autocomplete(&mut self) {
        let buffer = self.editor.buffer().to_string();
        let (head, matches) = if let Some(prefix) = buffer.strip_prefix("to ") {
            ("to ", self.contacts.find_names_by_prefix(prefix))
        } else if let Some((head, prefix)) = CHANNEL_ARG_PREFIXES
            .iter()
            .find_map(|p| buffer.strip_prefix(p).map(|rest| (*p, rest)))
        {
            (head, self.channel_name_matches(prefix))
        } else {
            return;
        };

        match matches.len() {
            0 => self.mux.print(BELL),
            1 => {
                self.editor.set_buffer(format!("{}{}", head, matches[0]));
                self.mux
                    .print(&format!("\r{}{}", PROMPT, self.editor.buffer()));
            }
            _ => {
                self.mux.println("");
                self.mux.println("Matches:");
                for name in &matches {
                    self.mux.println(&format!("   {}", name));
                }
                self.redraw_prompt();
            }
        }
    }

    /// "Public" plus the active persisted channel names matching a
    /// case-insensitive prefix. Persisted names, not runtime ones, so newly
    /// added channels complete before the activating reboot.
    fn channel_name_matches(&self, prefix: &str) -> Vec<String> {
        let mut matches = Vec::new();
        if starts_with_ignore_case(crate::channels::PUBLIC_CHANNEL_NAME, prefix) {
            matches.push(crate::channels::PUBLIC_CHANNEL_NAME.to_string());
        }
        for (_, ch) in self.prefs.active_channels() {
            if starts_with_ignore_case(&ch.name, prefix) {
                matches.push(ch.name.clone());
            }
        }
        matches
    }
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name
            .chars()
            .zip(prefix.chars())
            .all(|(a, b)| a.eq_ignore_ascii_case(&b))
}
