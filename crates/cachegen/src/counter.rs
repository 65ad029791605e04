// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integer counters stored next to, but independent of, versioned entries.

use bytes::Bytes;
use cachegen_backend::Backend;

use crate::cache::Cache;
use crate::telemetry::{CacheActivity, CacheOperation};

/// Counters live under item storage keys as ASCII decimals. They carry no version and are
/// not affected by group flushes.
impl<B: Backend> Cache<B> {
    /// Adds `delta` to the counter under `key` and returns the new value.
    ///
    /// A missing counter starts at zero. A `delta` of zero only reads the counter.
    /// Returns `None` when the backend could not be updated.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::Cache;
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let cache = Cache::builder(Clock::new_frozen()).memory().build();
    /// assert_eq!(cache.counter_add("hits", 5).await, Some(5));
    /// assert_eq!(cache.counter_add("hits", -2).await, Some(3));
    /// assert_eq!(cache.counter_get("hits").await, 3);
    /// # });
    /// ```
    pub async fn counter_add(&self, key: &str, delta: i64) -> Option<i64> {
        if delta == 0 {
            return Some(self.counter_get(key).await);
        }

        let storage_key = self.namespace.item_key(key);
        let mut value = self.connector.raw_increment(&storage_key, delta).await;
        if value.is_none() && self.connector.raw_set(&storage_key, Bytes::from_static(b"0"), None).await {
            value = self.connector.raw_increment(&storage_key, delta).await;
        }

        self.record_counter(if value.is_some() { CacheActivity::Inserted } else { CacheActivity::Error });
        value
    }

    /// Overwrites the counter under `key`.
    pub async fn counter_set(&self, key: &str, value: i64) -> bool {
        let written = self
            .connector
            .raw_set(&self.namespace.item_key(key), Bytes::from(value.to_string()), None)
            .await;
        self.record_counter(if written { CacheActivity::Inserted } else { CacheActivity::Error });
        written
    }

    /// Reads the counter under `key`; missing or non-numeric counters read as zero.
    pub async fn counter_get(&self, key: &str) -> i64 {
        let value = self
            .connector
            .raw_get(&self.namespace.item_key(key))
            .await
            .and_then(|raw| std::str::from_utf8(&raw).ok()?.trim().parse().ok());
        self.record_counter(if value.is_some() { CacheActivity::Hit } else { CacheActivity::Miss });
        value.unwrap_or(0)
    }

    fn record_counter(&self, activity: CacheActivity) {
        self.telemetry.record(&self.name, CacheOperation::Counter, activity, None);
    }
}
