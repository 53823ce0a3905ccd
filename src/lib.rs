//! # Meshchat - Secure Mesh-Network Chat Terminal
//!
//! Meshchat is the operator-facing half of a battery-powered mesh chat node:
//! it turns a lower-level packet/radio core into a usable secure
//! multi-channel messaging endpoint with an interactive console.
//!
//! ## Features
//!
//! - **Group channels**: the built-in Public channel plus up to seven user
//!   channels, keyed by 128/256-bit pre-shared keys or derived from a
//!   `#hashtag` name, compatible with the companion mobile client.
//! - **Contact directory**: bounded, persisted directory of discovered
//!   peers with case-insensitive prefix search and recency listing.
//! - **Direct messaging**: single in-flight acknowledged send with adaptive
//!   timeout-window estimation handed to the routing layer.
//! - **Interactive console**: line editing, context-sensitive TAB
//!   autocomplete, and output multiplexed across several endpoints.
//! - **Cooperative design**: one Tokio task drives both console input and
//!   mesh events; nothing blocks after boot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshchat::config::Config;
//! use meshchat::console::{ConsoleMux, StdioEndpoint};
//! use meshchat::mesh::DisconnectedTransport;
//! use meshchat::node::ChatNode;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mux = ConsoleMux::new(Box::new(StdioEndpoint::new()));
//!     let mut node = ChatNode::boot(
//!         std::path::Path::new(&config.node.data_dir),
//!         DisconnectedTransport,
//!         mux,
//!     )?;
//!     node.show_welcome();
//!     loop {
//!         node.tick();
//!         tokio::time::sleep(std::time::Duration::from_millis(20)).await;
//!     }
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`node`] - The chat node: line editor, command dispatch, mesh event handling
//! - [`channels`] - Group-channel registry and key derivation
//! - [`contacts`] - Persisted contact directory
//! - [`messaging`] - Ack tracking, timeout estimation, inbound normalization
//! - [`console`] - Console endpoint multiplexer
//! - [`mesh`] - Seam to the external packet/radio core
//! - [`prefs`] - Operator-mutable persisted preferences
//! - [`identity`] - Persisted node identity
//! - [`config`] - Host configuration file

pub mod channels;
pub mod clock;
pub mod config;
pub mod console;
pub mod contacts;
pub mod error;
pub mod identity;
pub mod mesh;
pub mod messaging;
pub mod node;
pub mod prefs;
pub mod textutil;
