// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `InMemoryBackend`.

use std::time::Duration;

use bytes::Bytes;
use cachegen_backend::{Backend, CasToken, ErrorKind, StorageUnit};
use cachegen_memory::InMemoryBackend;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn new_creates_empty_backend() {
    let backend = InMemoryBackend::new();
    assert_eq!(backend.entry_count(), 0);
}

#[test]
fn get_returns_none_for_missing_key() {
    block_on(async {
        let backend = InMemoryBackend::with_capacity(10);
        assert!(backend.get("missing").await.expect("get failed").is_none());
    });
}

#[test]
fn set_overwrites_existing_value() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("k", Bytes::from_static(b"1"), None).await.expect("set failed");
        backend.set("k", Bytes::from_static(b"2"), None).await.expect("set failed");
        assert_eq!(backend.get("k").await.expect("get failed"), Some(Bytes::from_static(b"2")));
    });
}

#[test]
fn delete_reports_whether_key_existed() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("k", Bytes::from_static(b"v"), None).await.expect("set failed");
        assert!(backend.delete("k").await.expect("delete failed"));
        assert!(!backend.delete("k").await.expect("delete failed"));
        assert!(backend.get("k").await.expect("get failed").is_none());
    });
}

#[test]
fn short_ttl_expires_entry() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend
            .set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(20)))
            .await
            .expect("set failed");
        std::thread::sleep(Duration::from_millis(60));
        assert!(backend.get("k").await.expect("get failed").is_none());
    });
}

#[test]
fn zero_ttl_never_expires() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend
            .set("k", Bytes::from_static(b"v"), Some(Duration::ZERO))
            .await
            .expect("set failed");
        assert!(backend.get("k").await.expect("get failed").is_some());
    });
}

#[test]
fn increment_adds_to_existing_counter() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("n", Bytes::from_static(b"10"), None).await.expect("set failed");
        assert_eq!(backend.increment("n", 5).await.expect("increment failed"), Some(15));
        assert_eq!(backend.increment("n", -20).await.expect("increment failed"), Some(-5));
        assert_eq!(backend.get("n").await.expect("get failed"), Some(Bytes::from_static(b"-5")));
    });
}

#[test]
fn increment_leaves_missing_key_absent() {
    block_on(async {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.increment("n", 1).await.expect("increment failed"), None);
        assert!(backend.get("n").await.expect("get failed").is_none());
    });
}

#[test]
fn increment_rejects_non_numeric_value() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("n", Bytes::from_static(b"{}"), None).await.expect("set failed");
        let err = backend.increment("n", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    });
}

#[test]
fn compare_and_swap_succeeds_with_fresh_token() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("k", Bytes::from_static(b"a"), None).await.expect("set failed");
        let (value, token) = backend.get_with_token("k").await.expect("get failed").expect("missing");
        assert_eq!(value, Bytes::from_static(b"a"));

        let swapped = backend
            .compare_and_swap("k", &token, Bytes::from_static(b"b"), None)
            .await
            .expect("cas failed");
        assert!(swapped);
        assert_eq!(backend.get("k").await.expect("get failed"), Some(Bytes::from_static(b"b")));
    });
}

#[test]
fn compare_and_swap_fails_after_intervening_write() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("k", Bytes::from_static(b"a"), None).await.expect("set failed");
        let (_, token) = backend.get_with_token("k").await.expect("get failed").expect("missing");
        backend.set("k", Bytes::from_static(b"a"), None).await.expect("set failed");

        let swapped = backend
            .compare_and_swap("k", &token, Bytes::from_static(b"b"), None)
            .await
            .expect("cas failed");
        assert!(!swapped);
        assert_eq!(backend.get("k").await.expect("get failed"), Some(Bytes::from_static(b"a")));
    });
}

#[test]
fn compare_and_swap_accepts_value_tokens() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("k", Bytes::from_static(b"a"), None).await.expect("set failed");
        let token = CasToken::Value(Bytes::from_static(b"a"));
        assert!(
            backend
                .compare_and_swap("k", &token, Bytes::from_static(b"b"), None)
                .await
                .expect("cas failed")
        );
        assert!(
            !backend
                .compare_and_swap("missing", &token, Bytes::from_static(b"b"), None)
                .await
                .expect("cas failed")
        );
    });
}

#[test]
fn dump_lists_prefixed_keys_with_sizes() {
    block_on(async {
        let backend = InMemoryBackend::new();
        backend.set("app_a", Bytes::from_static(b"12345"), None).await.expect("set failed");
        backend.set("app_b", Bytes::from_static(b"12"), None).await.expect("set failed");
        backend.set("other", Bytes::from_static(b"1"), None).await.expect("set failed");

        let servers = backend.servers();
        assert_eq!(servers, vec!["memory".to_owned()]);
        let units = backend.storage_units(&servers[0]).await.expect("units failed");
        assert_eq!(units, vec![StorageUnit::new("memory", 0)]);

        let mut items = backend.dump_unit(&units[0], "app_").await.expect("dump failed");
        items.sort_by(|a, b| a.key.cmp(&b.key));
        let summary: Vec<(&str, u64)> = items.iter().map(|i| (i.key.as_str(), i.size)).collect();
        assert_eq!(summary, vec![("app_a", 5), ("app_b", 2)]);
    });
}

#[test]
fn unknown_server_is_an_error() {
    block_on(async {
        let backend = InMemoryBackend::new();
        assert!(backend.storage_units("elsewhere").await.is_err());
    });
}

#[test]
fn statistics_report_entry_count_and_name() {
    block_on(async {
        let backend = InMemoryBackend::builder().name("pages").build();
        backend.set("k", Bytes::from_static(b"v"), None).await.expect("set failed");
        let stats = backend.statistics().await.expect("stats failed");
        assert_eq!(stats.get("curr_items").map(String::as_str), Some("1"));
        assert_eq!(stats.get("name").map(String::as_str), Some("pages"));
    });
}

#[test]
fn advertises_cas_and_introspection() {
    let caps = InMemoryBackend::new().capabilities();
    assert!(caps.cas);
    assert!(caps.introspection);
    assert!(!caps.sasl);
}
