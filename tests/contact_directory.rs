//! Contact directory behavior through the full event path: discovery,
//! persistence across restarts, path updates, and the recency listing.

mod common;

use common::{boot_node, discover_contact, run_command};
use meshchat::mesh::MeshEvent;

#[test]
fn discovered_contacts_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, transport) = boot_node(dir.path());
        discover_contact(&mut node, &transport, "Alice", 1, vec![0x11]);
        discover_contact(&mut node, &transport, "Bob", 2, Vec::new());
        let out = handle.output_text();
        assert!(out.contains("ADVERT from -> Alice"));
        assert!(out.contains("ADVERT from -> Bob"));
    }

    let (mut node, handle, _transport) = boot_node(dir.path());
    let out = run_command(&mut node, &handle, "list");
    assert!(out.contains("Alice"));
    assert!(out.contains("Bob"));

    // Prefix recipient selection is case-insensitive.
    let out = run_command(&mut node, &handle, "to ALI");
    assert!(out.contains("Recipient Alice now selected."));
}

#[test]
fn readvertisement_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    discover_contact(&mut node, &transport, "Alice", 1, vec![0x11]);
    // Same public key, new display name.
    discover_contact(&mut node, &transport, "Alicia", 1, Vec::new());

    let out = run_command(&mut node, &handle, "list");
    assert!(out.contains("Alicia"));
    assert!(!out.contains("Alice ("));
}

#[test]
fn list_orders_by_recency_and_caps_at_n() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    // discover_contact derives last_advert from the key byte, ascending.
    discover_contact(&mut node, &transport, "Old", 1, Vec::new());
    discover_contact(&mut node, &transport, "Mid", 5, Vec::new());
    discover_contact(&mut node, &transport, "New", 9, Vec::new());

    let out = run_command(&mut node, &handle, "list");
    let new_pos = out.find("New").unwrap();
    let mid_pos = out.find("Mid").unwrap();
    let old_pos = out.find("Old").unwrap();
    assert!(new_pos < mid_pos && mid_pos < old_pos);

    let out = run_command(&mut node, &handle, "list 2");
    assert!(out.contains("New") && out.contains("Mid"));
    assert!(!out.contains("Old"));
}

#[test]
fn path_update_is_announced_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    discover_contact(&mut node, &transport, "Alice", 1, Vec::new());

    handle.clear_output();
    transport.push_event(MeshEvent::PathUpdated {
        public_key: [1; 32],
        path: vec![0xAA, 0xBB, 0xCC],
    });
    node.tick();
    assert!(handle.output_text().contains("PATH to: Alice, path_len=3"));

    // A later direct send now takes the learned route.
    run_command(&mut node, &handle, "to Alice");
    let out = run_command(&mut node, &handle, "send hi");
    assert!(out.contains("(message sent - DIRECT)"));
}

#[test]
fn reset_path_clears_route_and_notifies_core() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    discover_contact(&mut node, &transport, "Alice", 1, vec![0x11]);
    run_command(&mut node, &handle, "to Alice");

    let out = run_command(&mut node, &handle, "reset path");
    assert!(out.contains("Done."));
    assert_eq!(transport.path_resets(), vec![[1u8; 32]]);

    // Route is gone, so the next send floods.
    let out = run_command(&mut node, &handle, "send still there?");
    assert!(out.contains("(message sent - FLOOD)"));
}

#[test]
fn inbound_direct_message_shows_sender_and_folds_text() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    discover_contact(&mut node, &transport, "Karel", 1, Vec::new());

    handle.clear_output();
    transport.push_event(MeshEvent::DirectMessage {
        from: [1; 32],
        sender_timestamp: 1_700_000_000,
        route: meshchat::mesh::RouteKind::Flood { hops: 2 },
        text: "přijď večer 🌲".to_string(),
    });
    node.tick();
    let out = handle.output_text();
    assert!(out.contains("(FLOOD) MSG -> from Karel | prijd vecer"));
    assert!(!out.contains('🌲'));
}

#[test]
fn card_export_and_import_round_trip_through_transport() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());

    let out = run_command(&mut node, &handle, "card");
    assert!(out.contains("Your MeshCore biz card:"));
    let line = out
        .lines()
        .find(|l| l.starts_with("meshcore://"))
        .expect("card line");

    // Re-import our own card, with pasted trailing junk.
    let out = run_command(&mut node, &handle, &format!("import {}  >>", line));
    assert!(out.contains("(card imported)"));
    let imported = transport.imported();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0][0], 0xAD);
}
