//! Scan acceptance scenarios driven against a plain ScanSession

use stockcam::config::ScanConfig;
use stockcam::scan::{ScanDecision, ScanGate, ScanSession};

/// Apply an accepted decision the way the engine does
fn accept(session: &mut ScanSession, code: &str) {
    session.activate(code, 1);
}

#[test]
fn test_two_items_without_enough_photos() {
    let gate = ScanGate::default();
    let mut session = ScanSession::default();

    assert_eq!(gate.on_scan("INV001", &session, false, false), ScanDecision::Accepted);
    accept(&mut session, "INV001");

    assert_eq!(
        gate.on_scan("INV002", &session, false, false),
        ScanDecision::TooFewPhotos
    );
    // Session untouched by the refusal
    assert_eq!(session.current_inventory_id.as_deref(), Some("INV001"));
    assert_eq!(session.photo_count, 1);
}

#[test]
fn test_repeated_scan_is_ignored() {
    let gate = ScanGate::default();
    let mut session = ScanSession::default();
    accept(&mut session, "INV001");
    session.photo_count = 5;

    for _ in 0..10 {
        assert_eq!(gate.on_scan("INV001", &session, false, false), ScanDecision::Ignored);
    }
    assert_eq!(session.photo_count, 5);
}

#[test]
fn test_rejected_format_keeps_state() {
    let gate = ScanGate::default();
    let mut session = ScanSession::default();
    accept(&mut session, "INV001");
    let before = session.clone();

    for code in ["", "XYZ", "INV", "https://example.com/INV001", " INV002"] {
        let decision = gate.on_scan(code, &session, false, false);
        if code == "INV" {
            // Bare prefix passes the format check
            assert_ne!(decision, ScanDecision::RejectedFormat);
        } else {
            assert_eq!(decision, ScanDecision::RejectedFormat, "{:?}", code);
        }
    }
    assert_eq!(session, before);
}

#[test]
fn test_third_photo_unlocks_next_item() {
    let gate = ScanGate::default();
    let mut session = ScanSession::default();
    accept(&mut session, "INV001");

    for count in 1..=3 {
        session.photo_count = count;
        let decision = gate.on_scan("INV002", &session, false, false);
        if count < 3 {
            assert_eq!(decision, ScanDecision::TooFewPhotos);
        } else {
            assert_eq!(decision, ScanDecision::Accepted);
        }
    }
}

#[test]
fn test_duplicate_after_restart() {
    let gate = ScanGate::default();
    // Fresh session, but the code is already in the persisted log
    assert_eq!(
        gate.on_scan("INV001", &ScanSession::default(), false, true),
        ScanDecision::Duplicate
    );
}

#[test]
fn test_capture_in_flight_blocks_scans() {
    let gate = ScanGate::default();
    let mut session = ScanSession::default();
    accept(&mut session, "INV001");
    session.photo_count = 4;

    assert_eq!(gate.on_scan("INV002", &session, true, false), ScanDecision::Ignored);
    assert_eq!(gate.on_scan("INV002", &session, false, false), ScanDecision::Accepted);
}

#[test]
fn test_gate_from_custom_config() {
    let config = ScanConfig {
        required_prefix: "LOT-".to_string(),
        min_photos_per_item: 5,
        snapshot_jpeg_quality: 90,
    };
    let gate = ScanGate::from_config(&config);
    let mut session = ScanSession::default();
    assert_eq!(gate.on_scan("INV001", &session, false, false), ScanDecision::RejectedFormat);
    assert_eq!(gate.on_scan("LOT-7", &session, false, false), ScanDecision::Accepted);

    accept(&mut session, "LOT-7");
    session.photo_count = 4;
    assert_eq!(gate.on_scan("LOT-8", &session, false, false), ScanDecision::TooFewPhotos);
}
