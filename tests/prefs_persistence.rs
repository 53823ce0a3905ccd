//! Operator settings persist across restarts, and a damaged prefs record
//! degrades to defaults instead of failing the boot.

mod common;

use common::{boot_node, run_command};

#[test]
fn set_parameters_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        assert!(run_command(&mut node, &handle, "set name relay-7").contains("OK"));
        assert!(run_command(&mut node, &handle, "set lat 50.087").contains("OK"));
        assert!(run_command(&mut node, &handle, "set lon 14.421").contains("OK"));
        assert!(run_command(&mut node, &handle, "set freq 869.525").contains("reboot to apply"));
        assert!(run_command(&mut node, &handle, "set tx 17").contains("reboot to apply"));
        assert!(run_command(&mut node, &handle, "set af 1.5").contains("OK"));
    }

    let (mut node, handle, _transport) = boot_node(dir.path());
    assert_eq!(node.node_name(), "relay-7");
    let out = run_command(&mut node, &handle, "get");
    assert!(out.contains("name: relay-7"));
    assert!(out.contains("lat:  50.087000"));
    assert!(out.contains("lon:  14.421000"));
    assert!(out.contains("freq: 869.525 MHz"));
    assert!(out.contains("tx:   17 dBm"));
    assert!(out.contains("af:   1.50"));
}

#[test]
fn invalid_set_values_change_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, _transport) = boot_node(dir.path());
    let out = run_command(&mut node, &handle, "set freq fast");
    assert!(out.contains("ERROR: invalid value"));
    let out = run_command(&mut node, &handle, "set warp 9");
    assert!(out.contains("ERROR: unknown config"));
    let out = run_command(&mut node, &handle, "get freq");
    assert!(out.contains("freq: 915.000 MHz"));
}

#[test]
fn advert_mute_flag_persists() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        assert!(run_command(&mut node, &handle, "mute").contains("ADVERT messages muted"));
    }
    let (mut node, handle, transport) = boot_node(dir.path());
    handle.clear_output();
    common::discover_contact(&mut node, &transport, "Quiet", 4, Vec::new());
    // Stored, but not announced.
    assert!(!handle.output_text().contains("ADVERT from"));
    let out = run_command(&mut node, &handle, "list");
    assert!(out.contains("Quiet"));

    assert!(run_command(&mut node, &handle, "unmute").contains("ADVERT messages unmuted"));
}

#[test]
fn corrupt_prefs_record_boots_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        run_command(&mut node, &handle, "set name keeper");
    }
    std::fs::write(dir.path().join("node_prefs"), b"scrambled bytes").unwrap();

    let (mut node, handle, _transport) = boot_node(dir.path());
    assert_eq!(node.node_name(), "NONAME");
    let out = run_command(&mut node, &handle, "get ch");
    assert!(out.contains("[0] Public *"));
}

#[test]
fn channel_mute_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        run_command(&mut node, &handle, "set ch #camp");
    }
    {
        let (mut node, handle, _transport) = boot_node(dir.path());
        assert!(run_command(&mut node, &handle, "mute ch #camp").contains("muted"));
    }
    let (mut node, handle, _transport) = boot_node(dir.path());
    let out = run_command(&mut node, &handle, "get ch");
    assert!(out.contains("[1] #camp (muted)"));
}

#[test]
fn time_and_clock_commands_cooperate() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, handle, _transport) = boot_node(dir.path());
    let out = run_command(&mut node, &handle, "time 1000");
    assert!(out.contains("clock cannot go backwards"));
    let out = run_command(&mut node, &handle, "clock");
    assert!(out.contains("UTC"));
}
