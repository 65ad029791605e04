// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Size statistics and backend statistics.

use std::time::{Duration, UNIX_EPOCH};

use cachegen::{Cache, Entry, SizeStats};
use cachegen_backend::testing::{BackendOp, MockBackend};
use futures::executor::block_on;
use tick::{Clock, ClockControl};

fn far_future() -> std::time::SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(u32::MAX))
}

#[test]
fn counts_this_instance_only() {
    let mock = MockBackend::with_servers(3);
    let mine = Cache::builder(Clock::new_frozen()).backend(mock.clone()).build();
    let theirs = Cache::builder(Clock::new_frozen())
        .backend(mock.clone())
        .namespace(cachegen::KeyNamespace::new().host("other.example"))
        .build();

    block_on(async {
        for i in 0..12 {
            mine.set(&format!("k{i}"), &Entry::new(i), None, "g").await;
        }
        theirs.set("x", &Entry::new("ignored"), None, "g").await;
    });

    let expected_bytes: u64 = mock
        .keys()
        .iter()
        .filter(|key| key.starts_with(&mine.namespace().key_prefix()))
        .map(|key| mock.raw(key).unwrap().len() as u64)
        .sum();

    let stats = block_on(mine.get_stats_size(far_future()));
    assert_eq!(
        stats,
        SizeStats {
            bytes: Some(expected_bytes),
            items: Some(12),
            timeout_occurred: false,
        }
    );
}

#[test]
fn deadline_returns_partial_totals() {
    let mock = MockBackend::new();
    let control = ClockControl::new().auto_advance(Duration::from_secs(1));
    let cache = Cache::builder(control.to_clock()).backend(mock.clone()).build();
    let prefix = cache.namespace().key_prefix();
    for i in 0..100 {
        mock.insert_raw(format!("{prefix}{i:03}"), "ab");
    }

    // the clock is read every tenth item and moves one second per read
    let stats = block_on(cache.get_stats_size(UNIX_EPOCH + Duration::from_secs(5)));
    assert!(stats.timeout_occurred);
    assert_eq!(stats.items, Some(59));
    assert_eq!(stats.bytes, Some(118));
}

#[test]
fn unreachable_server_is_skipped() {
    let mock = MockBackend::with_servers(2);
    let cache = Cache::builder(Clock::new_frozen()).backend(mock.clone()).build();
    let prefix = cache.namespace().key_prefix();
    for i in 0..40 {
        mock.insert_raw(format!("{prefix}{i}"), "x");
    }
    mock.fail_when(|op| matches!(op, BackendOp::StorageUnits(server) if server == "mock:1"));

    let stats = block_on(cache.get_stats_size(far_future()));
    let items = stats.items.unwrap();
    assert!(items > 0 && items < 40, "counted {items}");
    assert_eq!(stats.bytes, Some(items));
}

#[test]
fn total_failure_reports_unknown_sizes() {
    let mock = MockBackend::with_servers(2);
    let cache = Cache::builder(Clock::new_frozen()).backend(mock.clone()).build();
    mock.insert_raw(format!("{}a", cache.namespace().key_prefix()), "x");
    mock.fail_when(|op| matches!(op, BackendOp::StorageUnits(_)));

    let stats = block_on(cache.get_stats_size(far_future()));
    assert_eq!(stats.bytes, None);
    assert_eq!(stats.items, None);
    assert!(!stats.timeout_occurred);
}

#[test]
fn refused_dumps_report_unknown_sizes() {
    let mock = MockBackend::with_servers(2);
    let cache = Cache::builder(Clock::new_frozen()).backend(mock.clone()).build();
    mock.insert_raw(format!("{}a", cache.namespace().key_prefix()), "x");
    mock.fail_when(|op| matches!(op, BackendOp::DumpUnit(_)));

    let stats = block_on(cache.get_stats_size(far_future()));
    assert_eq!(stats, SizeStats::default());
}

#[cfg(feature = "memory")]
#[test]
fn memory_backend_statistics() {
    let cache = Cache::builder(Clock::new_frozen()).memory().build();

    block_on(async {
        cache.set("a", &Entry::new(1), None, "g").await;
        cache.set("b", &Entry::new(2), None, "g").await;

        let stats = cache.get_stats_size(far_future()).await;
        assert_eq!(stats.items, Some(2));

        let native = cache.get_statistics().await.unwrap();
        assert!(native.contains_key("curr_items"));
    });
}
