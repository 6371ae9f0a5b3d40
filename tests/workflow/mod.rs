//! Full station workflows across restarts

mod station;

use station::Station;
use stockcam::batch::BatchCounter;
use stockcam::capture::CaptureOutcome;
use stockcam::feedback::Prompt;
use stockcam::scan::ScanDecision;
use stockcam::store::{InventoryStore, UploadStatus};
use stockcam::testing::{FrameScript, MemoryImageHost};
use stockcam::types::CaptureMode;
use stockcam::upload::upload_pending_batch;

async fn shoot(station: &Station, count: usize) {
    for _ in 0..count {
        let outcome = station
            .engine
            .trigger_capture()
            .await
            .unwrap()
            .outcome()
            .await;
        assert!(outcome.is_accepted(), "{:?}", outcome);
    }
}

#[tokio::test]
async fn test_shift_restart_and_upload() {
    let root = tempfile::tempdir().unwrap();

    // First session: two items, one blurry retry, one duplicate attempt
    let station = Station::open(root.path());
    assert_eq!(
        station.engine.scan("INV100").await.unwrap(),
        ScanDecision::Accepted
    );
    station
        .device
        .push_script(&[FrameScript::Blurry, FrameScript::Sharp]);
    let blurry = station.engine.trigger_capture().await.unwrap();
    assert!(matches!(
        blurry.outcome().await,
        CaptureOutcome::RejectedBlur { .. }
    ));
    shoot(&station, 2).await;

    assert_eq!(
        station.engine.scan("INV101").await.unwrap(),
        ScanDecision::Accepted
    );
    station.engine.set_mode(CaptureMode::Macro).await.unwrap();
    shoot(&station, 1).await;

    assert_eq!(
        station.engine.scan("INV100").await.unwrap(),
        ScanDecision::Duplicate
    );
    assert!(station.sink.prompts().contains(&Prompt::Duplicate {
        inventory_id: "INV100".to_string()
    }));
    assert!(station.engine.acknowledge_prompt().await);
    station.close().await;

    // Restart: the unfinished item comes back
    let station = Station::open(root.path());
    assert_eq!(
        station.engine.restore().await.unwrap().as_deref(),
        Some("INV101")
    );
    let status = station.engine.status().await.unwrap();
    assert_eq!(status.photo_count, 2);
    shoot(&station, 1).await;

    let names: Vec<String> = station
        .store
        .photos_for("INV101")
        .await
        .unwrap()
        .iter()
        .map(|p| p.handle.name())
        .collect();
    assert_eq!(names, vec!["INV101-1", "INV101-2", "INV101-3"]);

    // Upload closes the batch
    let host = MemoryImageHost::new();
    let report = upload_pending_batch(
        station.store.as_ref(),
        &host,
        station.batches.as_ref(),
        &station.config.storage.upload_folder_prefix,
    )
    .await
    .unwrap();
    println!("upload report: {:?}", report);
    assert!(report.is_success());
    assert_eq!(report.images_uploaded, 6);
    assert_eq!(report.next_batch.as_deref(), Some("BX00002"));
    assert!(host
        .uploads()
        .iter()
        .all(|(folder, _)| folder == "batch-BX00001"));
    station.close().await;

    // Next session starts in the new batch with nothing to restore
    let station = Station::open(root.path());
    assert_eq!(station.batches.current_id(), "BX00002");
    assert_eq!(station.engine.restore().await.unwrap(), None);
    assert_eq!(
        station.engine.scan("INV102").await.unwrap(),
        ScanDecision::Accepted
    );
    let log = station.store.scan_log("INV102").await.unwrap().unwrap();
    assert_eq!(log.batch_id, "BX00002");
    assert_eq!(log.status, UploadStatus::PendingUpload);
    assert_eq!(
        station
            .store
            .scan_log("INV100")
            .await
            .unwrap()
            .unwrap()
            .status,
        UploadStatus::UploadComplete
    );
    station.close().await;
}

#[tokio::test]
async fn test_scan_notifications_carry_batch() {
    let root = tempfile::tempdir().unwrap();
    let station = Station::open(root.path());

    station.engine.scan("INV200").await.unwrap();
    shoot(&station, 2).await;
    station.engine.scan("INV201").await.unwrap();

    for _ in 0..100 {
        if station.notifier.calls().len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let calls = station.notifier.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, batch)| batch == "BX00001"));
    station.close().await;
}

#[tokio::test]
async fn test_captures_land_in_output_directory() {
    let root = tempfile::tempdir().unwrap();
    let station = Station::open(root.path());

    station.engine.scan("INV300").await.unwrap();
    shoot(&station, 1).await;

    let output = root.path().join("captures");
    let mut files: Vec<String> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["INV300-1.jpg", "INV300-2.jpg"]);
    assert!(root.path().join("store.json").exists());
    station.close().await;
}
