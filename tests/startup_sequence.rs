//! Boot-time behavior: identity generation, welcome screen, Public channel
//! health report, and the advert commands.

mod common;

use common::{boot_node, run_command};

#[test]
fn first_boot_generates_and_persists_identity() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (_node, _handle, _transport) = boot_node(dir.path());
    }
    let identity = dir.path().join("identity");
    assert!(identity.exists());
    let first = std::fs::read(&identity).unwrap();
    assert_eq!(first.len(), 96); // 32-byte public + 64-byte secret

    // A second boot reuses the same identity.
    let (_node, _handle, _transport) = boot_node(dir.path());
    assert_eq!(std::fs::read(&identity).unwrap(), first);
}

#[test]
fn welcome_screen_names_the_node_and_reports_public_channel() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, _transport) = boot_node(dir.path());
    node.show_welcome();
    node.check_public_channel();
    let out = handle.output_text();
    assert!(out.contains("WELCOME  NONAME"));
    assert!(out.contains("(enter 'help' for basic commands)"));
    assert!(out.contains("Public channel initialized successfully!"));
    // Hex public key line: 64 lowercase hex chars.
    assert!(out
        .lines()
        .any(|l| l.len() == 64 && l.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn user_channel_count_is_reported_at_boot() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        run_command(&mut node, &handle, "set ch #camp");
        run_command(&mut node, &handle, "set ch #trail");
    }
    let (mut node, handle, _transport) = boot_node(dir.path());
    node.check_public_channel();
    assert!(handle.output_text().contains("2 user channel(s) loaded"));
}

#[test]
fn boot_advert_floods_and_advert_command_goes_zero_hop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, transport) = boot_node(dir.path());
    node.send_boot_advert();
    let out = run_command(&mut node, &handle, "advert");
    assert!(out.contains("(advert sent, zero hop)."));

    let adverts = transport.adverts();
    assert_eq!(adverts.len(), 2);
    assert!(!adverts[0].zero_hop);
    assert!(adverts[1].zero_hop);
    assert_eq!(adverts[0].name, "NONAME");
}

#[test]
fn reboot_command_reloads_persisted_state_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, _transport) = boot_node(dir.path());
    run_command(&mut node, &handle, "set ch #camp");
    let out = run_command(&mut node, &handle, "reboot");
    assert!(out.contains("Rebooting..."));
    assert!(node.reboot_requested());

    handle.clear_output();
    node.reboot();
    assert!(!node.reboot_requested());
    let out = handle.output_text();
    assert!(out.contains("WELCOME  NONAME"));
    assert!(out.contains("1 user channel(s) loaded"));

    // The added channel became active through the in-place reboot.
    let out = run_command(&mut node, &handle, "chsel #camp");
    assert!(out.contains("Channel '#camp' selected"));
}

#[test]
fn help_lists_the_command_surface() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, _transport) = boot_node(dir.path());
    let out = run_command(&mut node, &handle, "help");
    for needle in [
        "set ch <name> <hex_key>",
        "chsel <name>",
        "to <recipient name>",
        "TAB - autocomplete",
    ] {
        assert!(out.contains(needle), "missing: {}", needle);
    }
}
