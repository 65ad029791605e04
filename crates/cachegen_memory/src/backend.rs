// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory backend implementation using moka.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use cachegen_backend::{Backend, Capabilities, CasToken, Error, ItemInfo, StorageUnit};
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use crate::builder::InMemoryBackendBuilder;

/// The single server an in-memory backend reports.
pub const SERVER_NAME: &str = "memory";

#[derive(Debug, Clone)]
struct Slot {
    value: Bytes,
    revision: u64,
    ttl: Option<Duration>,
}

/// Expires each slot after the TTL it was written with.
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        slot.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        slot.ttl
    }
}

/// An in-process backend backed by moka.
///
/// Clones share the same storage. Every write stamps the slot with a fresh revision,
/// which [`get_with_token`](Backend::get_with_token) hands out as a
/// [`CasToken::Revision`] for native compare-and-swap.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use cachegen_backend::Backend;
/// use cachegen_memory::InMemoryBackend;
///
/// # futures::executor::block_on(async {
/// let backend = InMemoryBackend::new();
/// backend.set("hits", Bytes::from_static(b"41"), None).await?;
/// assert_eq!(backend.increment("hits", 1).await?, Some(42));
/// assert_eq!(backend.increment("misses", 1).await?, None);
/// # Ok::<(), cachegen_backend::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    inner: Cache<String, Slot>,
    revision: Arc<AtomicU64>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Creates a new unbounded in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory backend holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory backend.
    #[must_use]
    pub fn builder() -> InMemoryBackendBuilder {
        InMemoryBackendBuilder::new()
    }

    pub(crate) fn from_builder(builder: &InMemoryBackendBuilder) -> Self {
        let mut moka_builder = Cache::builder().expire_after(SlotExpiry);

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(ttl) = builder.time_to_live {
            moka_builder = moka_builder.time_to_live(ttl);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the approximate number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    fn slot(&self, value: Bytes, ttl: Option<Duration>) -> Slot {
        Slot {
            value,
            revision: self.revision.fetch_add(1, Ordering::Relaxed) + 1,
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }
}

fn parse_counter(value: &[u8]) -> Option<i64> {
    std::str::from_utf8(value).ok().and_then(|s| s.trim().parse().ok())
}

impl Backend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.inner.get(key).await.map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        self.inner.insert(key.to_owned(), self.slot(value, ttl)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.inner.remove(key).await.is_some())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, Error> {
        let replacement = self.slot(Bytes::new(), None);
        let result = self
            .inner
            .entry_by_ref(key)
            .and_compute_with(|existing| async move {
                let Some(existing) = existing else {
                    return Op::Nop;
                };
                let slot = existing.into_value();
                match parse_counter(&slot.value) {
                    Some(current) => Op::Put(Slot {
                        value: Bytes::from(current.saturating_add(delta).to_string()),
                        ttl: slot.ttl,
                        ..replacement
                    }),
                    None => Op::Nop,
                }
            })
            .await;

        match result {
            CompResult::ReplacedWith(entry) => Ok(parse_counter(&entry.value().value)),
            CompResult::Unchanged(_) => Err(Error::protocol(format!("cannot increment non-numeric value under {key}"))),
            _ => Ok(None),
        }
    }

    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, CasToken)>, Error> {
        Ok(self
            .inner
            .get(key)
            .await
            .map(|slot| (slot.value, CasToken::Revision(slot.revision))))
    }

    async fn compare_and_swap(&self, key: &str, token: &CasToken, value: Bytes, ttl: Option<Duration>) -> Result<bool, Error> {
        let replacement = self.slot(value, ttl);
        let result = self
            .inner
            .entry_by_ref(key)
            .and_compute_with(|existing| async move {
                let matches = existing.is_some_and(|entry| match token {
                    CasToken::Revision(revision) => entry.value().revision == *revision,
                    CasToken::Value(bytes) => entry.value().value == *bytes,
                });
                if matches { Op::Put(replacement) } else { Op::Nop }
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    fn servers(&self) -> Vec<String> {
        vec![SERVER_NAME.to_owned()]
    }

    async fn storage_units(&self, server: &str) -> Result<Vec<StorageUnit>, Error> {
        if server != SERVER_NAME {
            return Err(Error::connection(format!("unknown server {server}")));
        }
        Ok(vec![StorageUnit::new(SERVER_NAME, 0)])
    }

    async fn dump_unit(&self, unit: &StorageUnit, prefix: &str) -> Result<Vec<ItemInfo>, Error> {
        if unit.server != SERVER_NAME || unit.id != 0 {
            return Err(Error::connection(format!("unknown storage unit {}:{}", unit.server, unit.id)));
        }
        Ok(self
            .inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, slot)| ItemInfo::new(key.as_str(), slot.value.len() as u64))
            .collect())
    }

    async fn statistics(&self) -> Result<BTreeMap<String, String>, Error> {
        self.inner.run_pending_tasks().await;
        let mut stats = BTreeMap::from([("curr_items".to_owned(), self.inner.entry_count().to_string())]);
        if let Some(name) = self.inner.name() {
            stats.insert("name".to_owned(), name.to_owned());
        }
        Ok(stats)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().with_cas(true).with_introspection(true)
    }
}
