//! Full and incremental sync passes against a shared in-memory cloud.

use fieldbook_model::{ConflictChoice, ConflictOrigin, ConflictSubject, Entry, SyncRecord};
use fieldbook_remote::Collection;
use fieldbook_sync_engine::{Bootstrap, PassKind, SyncState};
use fieldbook_testkit::prelude::*;

#[tokio::test]
async fn offline_entry_reaches_cloud_on_sign_in() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);

    device
        .engine
        .save_entry(entry("2025-07-10", 5, 1_000))
        .await
        .unwrap();
    assert_eq!(device.outbox_len().await, 1);
    assert_eq!(cloud.entry_count(), 0);

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.kind, PassKind::Full);
    assert_eq!(report.replayed, 1);

    assert_eq!(cloud.entry_count(), 1);
    let remote = cloud.remote_entry("2025-07-10").unwrap();
    assert_eq!(remote.record.points, 5);
    assert_eq!(device.outbox_len().await, 0);

    let local = device.local_entry("2025-07-10").await.unwrap();
    assert_eq!(local.modified_at, remote.remote_updated_at);
    assert_eq!(device.engine.state(), SyncState::Idle);
}

#[tokio::test]
async fn newer_local_version_overwrites_cloud() {
    let cloud = TestCloud::new(2_000);
    cloud.seed(&entry("2025-07-10", 3, 1_000), 1_000);
    let device = TestDevice::new(&cloud);
    device.put_local(&[entry("2025-07-10", 5, 2_000)]).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.uploaded, 1);

    let remote = cloud.remote_entry("2025-07-10").unwrap();
    assert_eq!(remote.record.points, 5);
    assert!(remote.remote_updated_at >= 2_000);
    assert_eq!(device.resolver.prompt_count(), 0);
}

#[tokio::test]
async fn newer_cloud_version_overwrites_local() {
    let cloud = TestCloud::new(3_000);
    cloud.seed(&entry("2025-07-10", 9, 2_500), 2_500);
    let device = TestDevice::new(&cloud);
    device.put_local(&[entry("2025-07-10", 5, 1_000)]).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.downloaded, 1);

    let local = device.local_entry("2025-07-10").await.unwrap();
    assert_eq!(local.points, 9);
    assert_eq!(local.modified_at, 2_500);
}

#[tokio::test]
async fn equal_timestamps_keep_cloud_leaves_no_outbox_entry() {
    let cloud = TestCloud::new(1_000);
    cloud.seed(&entry("2025-07-10", 8, 1_000), 1_000);
    let device = TestDevice::new(&cloud);
    device.put_local(&[entry("2025-07-10", 5, 1_000)]).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.conflicts, 1);

    let prompts = device.resolver.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].key, "2025-07-10");
    assert_eq!(prompts[0].origin, ConflictOrigin::Sync);
    match &prompts[0].subject {
        ConflictSubject::Entry(pair) => {
            assert_eq!(pair.local.points, 5);
            assert_eq!(pair.remote.points, 8);
            assert_eq!(pair.differing_fields(), vec!["points"]);
        }
        other => panic!("unexpected subject {other:?}"),
    }

    assert_eq!(device.local_entry("2025-07-10").await.unwrap().points, 8);
    assert_eq!(device.outbox_len().await, 0);
    assert_eq!(cloud.remote_entry("2025-07-10").unwrap().record.points, 8);
}

#[tokio::test]
async fn equal_timestamps_keep_local_overwrites_cloud() {
    let cloud = TestCloud::new(1_000);
    cloud.seed(&entry("2025-07-10", 8, 1_000), 1_000);
    let device = TestDevice::new(&cloud);
    device.resolver.set_fallback(ConflictChoice::KeepLocal);
    device.put_local(&[entry("2025-07-10", 5, 1_000)]).await;

    device.sign_in().await.unwrap();

    let remote = cloud.remote_entry("2025-07-10").unwrap();
    assert_eq!(remote.record.points, 5);
    assert!(remote.remote_updated_at > 1_000);
    let local = device.local_entry("2025-07-10").await.unwrap();
    assert_eq!(local.modified_at, remote.remote_updated_at);
    assert_eq!(device.outbox_len().await, 0);
}

#[tokio::test]
async fn identical_content_with_equal_timestamps_is_silent() {
    let cloud = TestCloud::new(1_000);
    cloud.seed(&entry("2025-07-10", 5, 1_000), 1_000);
    let device = TestDevice::new(&cloud);
    device.put_local(&[entry("2025-07-10", 5, 1_000)]).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.in_sync, 1);
    assert_eq!(device.resolver.prompt_count(), 0);
}

#[tokio::test]
async fn failing_outbox_item_is_retried_alone() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    for (day, points) in [("2025-07-10", 1), ("2025-07-11", 2), ("2025-07-12", 3)] {
        device
            .engine
            .save_entry(entry(day, points, 1_000))
            .await
            .unwrap();
    }
    assert_eq!(device.outbox_len().await, 3);

    cloud.remote.fail_key("2025-07-12");
    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.replayed, 2);
    assert_eq!(cloud.entry_count(), 2);

    let pending = device.engine.pending_writes().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, "2025-07-12");

    cloud.remote.clear_failures();
    cloud.remote.reset_write_count();
    let report = device.engine.perform_manual_sync_all().await.unwrap().unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(cloud.remote.write_count(), 1);
    assert_eq!(cloud.entry_count(), 3);
    assert_eq!(device.outbox_len().await, 0);
}

#[tokio::test]
async fn repeated_passes_write_nothing() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    device
        .put_local(&[entry("2025-07-10", 1, 1_000), entry("2025-07-11", 2, 1_000)])
        .await;
    device.engine.save_settings(settings(1.5, 20.0, 0.6, 1_000)).await.unwrap();
    device.sign_in().await.unwrap();

    cloud.remote.reset_write_count();
    for _ in 0..3 {
        let report = device.engine.perform_manual_sync_all().await.unwrap().unwrap();
        assert_eq!(report.uploaded + report.downloaded + report.replayed, 0);
        assert_eq!(report.in_sync, 3);
    }
    assert_eq!(cloud.remote.write_count(), 0);
}

#[tokio::test]
async fn empty_cloud_bootstraps_by_upload() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    let local = vec![
        entry("2025-07-10", 1, 1_000),
        entry("2025-07-11", 2, 1_000),
        entry("2025-07-12", 3, 1_000),
    ];
    device.put_local(&local).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(
        report.bootstraps,
        vec![Bootstrap::Uploaded {
            kind: Entry::KIND,
            count: 3
        }]
    );
    assert!(device.notifier.contains("Uploaded 3 entries to the cloud"));

    for record in &local {
        let remote = cloud.remote_entry(record.date.as_str()).unwrap();
        assert_eq!(remote.record.points, record.points);
    }
    assert_eq!(cloud.entry_count(), 3);
}

#[tokio::test]
async fn empty_device_bootstraps_by_download() {
    let cloud = TestCloud::new(5_000);
    cloud.seed(&entry("2025-07-10", 1, 1_000), 1_000);
    cloud.seed(&entry("2025-07-11", 2, 2_000), 2_000);
    cloud.seed(&settings(2.0, 25.0, 0.5, 1_500), 1_500);
    let device = TestDevice::new(&cloud);

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.bootstraps.len(), 2);
    assert!(device.notifier.contains("Downloaded 2 entries from the cloud"));

    let entries = device.engine.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].points, 2);
    assert_eq!(entries[1].modified_at, 2_000);
    let settings = device.engine.settings().await.unwrap().unwrap();
    assert_eq!(settings.hourly_rate, 25.0);
    assert_eq!(settings.modified_at, 1_500);
}

#[tokio::test]
async fn two_devices_converge() {
    let cloud = TestCloud::new(1_000);
    let first = TestDevice::new(&cloud);
    let second = TestDevice::new(&cloud);

    first.sign_in().await.unwrap();
    first
        .engine
        .save_entry(entry("2025-07-10", 4, 1_000))
        .await
        .unwrap();

    second.sign_in().await.unwrap();
    assert_eq!(second.local_entry("2025-07-10").await.unwrap().points, 4);

    cloud.clock.advance(100);
    second
        .engine
        .save_entry(entry("2025-07-11", 6, 1_100))
        .await
        .unwrap();
    first.engine.perform_manual_sync_all().await.unwrap();

    let a = first.engine.entries().await.unwrap();
    let b = second.engine.entries().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let cloud = TestCloud::new(10_000);
    let device = TestDevice::new(&cloud);
    device.sign_in().await.unwrap();
    let status = device.engine.status().await.unwrap();
    assert_eq!(status.last_sync_time, Some(10_000));

    cloud.clock.set(4_000);
    device.engine.perform_manual_sync_all().await.unwrap();
    let status = device.engine.status().await.unwrap();
    assert_eq!(status.last_sync_time, Some(10_000));

    cloud.clock.set(12_000);
    device.engine.perform_manual_sync_all().await.unwrap();
    let status = device.engine.status().await.unwrap();
    assert_eq!(status.last_sync_time, Some(12_000));
}

#[tokio::test]
async fn incremental_pass_pushes_changed_records_only() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    device.put_local(&[entry("2025-07-10", 1, 1_000)]).await;
    device.sign_in().await.unwrap();

    cloud.clock.set(5_000);
    device.put_local(&[entry("2025-07-11", 3, 5_000)]).await;
    let report = device
        .engine
        .perform_incremental_sync()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.kind, PassKind::Incremental);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.in_sync, 1);
    assert_eq!(cloud.remote_entry("2025-07-11").unwrap().record.points, 3);

    // Last written before the watermark, so the next pass skips it.
    cloud.seed(&entry("2025-07-10", 7, 5_100), 5_100);
    let report = device
        .engine
        .perform_incremental_sync()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.uploaded + report.downloaded, 0);
    assert_eq!(device.local_entry("2025-07-10").await.unwrap().points, 1);
}

#[tokio::test]
async fn unreachable_cloud_fails_pass_and_goes_offline() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    device.sign_in().await.unwrap();

    cloud.remote.set_online(false);
    let err = device.engine.perform_manual_sync_all().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(device.engine.state(), SyncState::Offline);
    assert!(device.engine.stats().last_error.is_some());

    let status = device.engine.status().await.unwrap();
    assert!(!status.is_online);
    assert!(status.is_signed_in);
}

#[tokio::test]
async fn unreachable_uploads_leave_engine_offline_until_reconnect() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    let days = ["2025-07-10", "2025-07-11", "2025-07-12"];
    let local: Vec<Entry> = days.iter().map(|day| entry(day, 2, 1_000)).collect();
    device.put_local(&local).await;
    for day in days {
        cloud.remote.fail_key(day);
    }

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.queued, 3);
    assert!(report.was_interrupted());

    let status = device.engine.status().await.unwrap();
    assert_eq!(status.state, SyncState::Offline);
    assert!(!status.is_online);
    assert_eq!(status.pending_outbox, 3);
    assert!(device.engine.stats().last_error.is_some());

    cloud.remote.clear_failures();
    let report = device.engine.set_online(true).await.unwrap().unwrap();
    assert_eq!(report.replayed, 3);
    assert!(!report.was_interrupted());
    assert_eq!(device.engine.state(), SyncState::Idle);
    assert_eq!(device.outbox_len().await, 0);
    assert_eq!(cloud.entry_count(), 3);
}

#[tokio::test]
async fn concurrent_bootstrap_upload_uploads_everything() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::with_config(&cloud, test_config().with_upload_concurrency(2));
    let local: Vec<Entry> = (1..=20)
        .map(|day| entry(&format!("2025-08-{day:02}"), day, 1_000))
        .collect();
    device.put_local(&local).await;

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.uploaded, 20);
    assert_eq!(cloud.entry_count(), 20);
    for record in device.engine.entries().await.unwrap() {
        let remote = cloud.remote_entry(record.date.as_str()).unwrap();
        assert_eq!(record.modified_at, remote.remote_updated_at);
    }
}

#[tokio::test]
async fn undecodable_remote_document_is_skipped() {
    let cloud = TestCloud::new(1_000);
    cloud.remote.seed(
        Collection::Entries,
        TEST_USER,
        "2025-07-10",
        serde_json::json!({"points": "many"}),
        900,
    );
    cloud.seed(&entry("2025-07-11", 2, 950), 950);
    let device = TestDevice::new(&cloud);

    let report = device.sign_in().await.unwrap().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 1);
    assert!(device.local_entry("2025-07-10").await.is_none());
}

#[tokio::test]
async fn replaying_the_same_item_twice_leaves_one_remote_record() {
    let cloud = TestCloud::new(1_000);
    let device = TestDevice::new(&cloud);
    device
        .engine
        .save_entry(entry("2025-07-10", 5, 1_000))
        .await
        .unwrap();
    let item = device
        .engine
        .tables()
        .outbox_item::<Entry>("2025-07-10")
        .await
        .unwrap()
        .unwrap();
    device.sign_in().await.unwrap();
    assert_eq!(cloud.entry_count(), 1);

    device.engine.tables().put_outbox_item(&item).await.unwrap();
    let report = device.engine.perform_manual_sync_all().await.unwrap().unwrap();
    assert_eq!(report.conflicts, 0);
    assert_eq!(cloud.entry_count(), 1);
    assert_eq!(cloud.remote_entry("2025-07-10").unwrap().record.points, 5);
    assert_eq!(device.outbox_len().await, 0);
}
