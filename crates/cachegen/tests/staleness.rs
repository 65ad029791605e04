// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Classification of cached entries against their group's version, and stale serving.

use std::time::{Duration, UNIX_EPOCH};

use cachegen::{Cache, Entry};
use cachegen_backend::testing::MockBackend;
use futures::executor::block_on;
use proptest::prelude::*;
use serde_json::Value;
use tick::ClockControl;

fn build(mock: &MockBackend, control: &ClockControl, allow_stale: bool) -> Cache<MockBackend> {
    Cache::builder(control.to_clock())
        .backend(mock.clone())
        .allow_stale(allow_stale)
        .build()
}

fn stored(mock: &MockBackend, cache: &Cache<MockBackend>, key: &str) -> Value {
    serde_json::from_slice(&mock.raw(&cache.namespace().item_key(key)).unwrap()).unwrap()
}

proptest! {
    #[test]
    fn entries_are_classified_by_version(entry_version in 1_u64..40, current in 1_u64..40, allow_stale: bool) {
        let mock = MockBackend::new();
        let control = ClockControl::new_at(UNIX_EPOCH + Duration::from_secs(10_000));
        let cache = build(&mock, &control, allow_stale);
        mock.insert_raw(cache.namespace().version_key("g"), current.to_string());
        mock.insert_raw(
            cache.namespace().item_key("k"),
            format!(r#"{{"content":"v","key_version":{entry_version}}}"#),
        );

        let (entry, claimed) = block_on(cache.get_with_old::<String>("k", "g"));

        if entry_version >= current {
            prop_assert_eq!(entry.map(Entry::into_content), Some("v".to_owned()));
            prop_assert!(!claimed);
            prop_assert_eq!(block_on(cache.version("g")), entry_version);
        } else if allow_stale {
            prop_assert!(entry.is_none());
            prop_assert!(claimed);
            prop_assert_eq!(stored(&mock, &cache, "k")["expires_at"].as_u64(), Some(10_030));
        } else {
            prop_assert!(entry.is_none());
            prop_assert!(!claimed);
            prop_assert_eq!(block_on(cache.version("g")), current);
        }
    }
}

#[test]
fn only_one_instance_claims_regeneration() {
    let mock = MockBackend::new();
    let control = ClockControl::new_at(UNIX_EPOCH + Duration::from_secs(1_000));
    let writer = build(&mock, &control, true);
    let first = build(&mock, &control, true);
    let second = build(&mock, &control, true);

    block_on(async {
        writer.set("front", &Entry::new("old".to_owned()), None, "pages").await;
        writer.flush("pages").await;

        let (entry, claimed) = first.get_with_old::<String>("front", "pages").await;
        assert!(entry.is_none());
        assert!(claimed);

        let (entry, claimed) = second.get_with_old::<String>("front", "pages").await;
        assert_eq!(entry.map(Entry::into_content).as_deref(), Some("old"));
        assert!(!claimed);
    });
}

#[test]
fn claim_expires_after_window() {
    let mock = MockBackend::new();
    let control = ClockControl::new_at(UNIX_EPOCH + Duration::from_secs(1_000));
    let first = build(&mock, &control, true);
    let second = build(&mock, &control, true);

    block_on(async {
        first.set("front", &Entry::new(1), None, "pages").await;
        first.flush("pages").await;
        assert_eq!(first.get_with_old::<i32>("front", "pages").await, (None, true));

        control.advance(Duration::from_secs(29));
        assert!(!second.get_with_old::<i32>("front", "pages").await.1);

        // the claim still holds on the second it expires
        control.advance(Duration::from_secs(1));
        let (entry, claimed) = second.get_with_old::<i32>("front", "pages").await;
        assert_eq!(entry.map(Entry::into_content), Some(1));
        assert!(!claimed);

        // the first claimant never wrote back, so the next reader takes over
        control.advance(Duration::from_secs(1));
        assert_eq!(second.get_with_old::<i32>("front", "pages").await, (None, true));
    });
}

#[test]
fn custom_claim_window_is_stamped() {
    let mock = MockBackend::new();
    let cache = Cache::builder(tick::Clock::new_frozen_at(UNIX_EPOCH + Duration::from_secs(50)))
        .backend(mock.clone())
        .allow_stale(true)
        .stale_claim_window(Duration::from_secs(5))
        .build();

    block_on(async {
        cache.set("k", &Entry::new(1), None, "g").await;
        cache.flush("g").await;
        cache.get_with_old::<i32>("k", "g").await;
    });

    assert_eq!(stored(&mock, &cache, "k")["expires_at"].as_u64(), Some(55));
}

#[test]
fn soft_delete_leaves_a_tombstone() {
    let mock = MockBackend::new();
    let control = ClockControl::new_at(UNIX_EPOCH + Duration::from_secs(1_000));
    let cache = build(&mock, &control, true);

    block_on(async {
        cache.set("post:1", &Entry::new("body".to_owned()), None, "posts").await;
        assert!(cache.delete("post:1", "posts").await);

        assert_eq!(stored(&mock, &cache, "post:1")["key_version"].as_u64(), Some(0));
        assert!(cache.get::<String>("post:1", "posts").await.is_none());

        assert!(cache.set("post:1", &Entry::new("new body".to_owned()), None, "posts").await);
        assert_eq!(
            cache.get::<String>("post:1", "posts").await.map(Entry::into_content).as_deref(),
            Some("new body")
        );
    });
}

#[test]
fn tombstone_is_served_to_others_while_one_regenerates() {
    let mock = MockBackend::new();
    let control = ClockControl::new_at(UNIX_EPOCH + Duration::from_secs(1_000));
    let first = build(&mock, &control, true);
    let second = build(&mock, &control, true);

    block_on(async {
        first.set("k", &Entry::new(7), None, "g").await;
        first.delete("k", "g").await;

        assert_eq!(first.get_with_old::<i32>("k", "g").await, (None, true));
        let (entry, claimed) = second.get_with_old::<i32>("k", "g").await;
        assert_eq!(entry.map(Entry::into_content), Some(7));
        assert!(!claimed);
    });
}
