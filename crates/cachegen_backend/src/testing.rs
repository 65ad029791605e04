// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock backend for testing.
//!
//! This module provides `MockBackend`, a configurable in-memory backend that records all
//! operations, supports failure injection, and lets tests switch capabilities on and off
//! to exercise native and degraded code paths alike.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{Backend, Capabilities, CasToken, Error, ItemInfo, StorageUnit};

/// Recorded backend operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    /// A get was performed with the given key.
    Get(String),
    /// A get-with-token was performed with the given key.
    GetWithToken(String),
    /// A set was performed.
    Set {
        /// The key written.
        key: String,
        /// The bytes written.
        value: Bytes,
        /// The requested expiry.
        ttl: Option<Duration>,
    },
    /// A delete was performed with the given key.
    Delete(String),
    /// An increment was performed.
    Increment {
        /// The counter key.
        key: String,
        /// The amount added.
        delta: i64,
    },
    /// A compare-and-swap was performed.
    CompareAndSwap {
        /// The key targeted.
        key: String,
        /// The replacement bytes.
        value: Bytes,
    },
    /// Storage units of the given server were listed.
    StorageUnits(String),
    /// A storage unit was dumped.
    DumpUnit(StorageUnit),
    /// Backend statistics were requested.
    Statistics,
}

type FailPredicate = Box<dyn Fn(&BackendOp) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct Slot {
    value: Bytes,
    revision: u64,
    ttl: Option<Duration>,
}

/// A configurable mock backend for testing.
///
/// Values live in a shared map, so clones of a `MockBackend` observe each other's
/// writes, which is how tests simulate several processes sharing one server. All
/// operations are recorded for later verification.
///
/// By default the mock advertises native compare-and-swap and introspection, and hosts
/// a single server named `mock:0`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use cachegen_backend::Backend;
/// use cachegen_backend::testing::{BackendOp, MockBackend};
///
/// # futures::executor::block_on(async {
/// let backend = MockBackend::new();
/// backend.set("k", Bytes::from_static(b"v"), None).await.unwrap();
///
/// backend.fail_when(|op| matches!(op, BackendOp::Get(_)));
/// assert!(backend.get("k").await.is_err());
/// # });
/// ```
pub struct MockBackend {
    data: Arc<Mutex<HashMap<String, Slot>>>,
    operations: Arc<Mutex<Vec<BackendOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
    capabilities: Arc<Mutex<Capabilities>>,
    servers: Arc<Vec<String>>,
    revision: Arc<AtomicU64>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("entries", &self.data.lock().len())
            .field("operations", &self.operations.lock().len())
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("capabilities", &*self.capabilities.lock())
            .field("servers", &self.servers)
            .finish()
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            capabilities: Arc::clone(&self.capabilities),
            servers: Arc::clone(&self.servers),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates an empty mock backend with one server.
    #[must_use]
    pub fn new() -> Self {
        Self::with_servers(1)
    }

    /// Creates an empty mock backend spreading keys over `count` servers.
    ///
    /// Server names are `mock:0`, `mock:1`, and so on; each server exposes one storage unit.
    #[must_use]
    pub fn with_servers(count: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            capabilities: Arc::new(Mutex::new(Capabilities::new().with_cas(true).with_introspection(true))),
            servers: Arc::new((0..count.max(1)).map(|i| format!("mock:{i}")).collect()),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replaces the advertised capabilities.
    ///
    /// Clearing [`Capabilities::cas`] makes [`Backend::compare_and_swap`] fail as
    /// unsupported and makes [`Backend::get_with_token`] hand out value tokens, like a
    /// backend family without native CAS.
    #[must_use]
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        *self.capabilities.lock() = capabilities;
        self
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// Failing operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackendOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<BackendOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the raw bytes stored under `key`, bypassing recording and failures.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.data.lock().get(key).map(|slot| slot.value.clone())
    }

    /// Returns the expiry requested for `key` when it was last written.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Option<Duration>> {
        self.data.lock().get(key).map(|slot| slot.ttl)
    }

    /// Stores raw bytes under `key`, bypassing recording and failures.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        let revision = self.next_revision();
        self.data.lock().insert(
            key.into(),
            Slot {
                value: value.into(),
                revision,
                ttl: None,
            },
        );
    }

    /// Returns the stored keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn check(&self, op: BackendOp) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            Err(Error::connection("mock: injected failure"))
        } else {
            Ok(())
        }
    }

    fn server_of(&self, key: &str) -> &str {
        let sum: usize = key.bytes().map(usize::from).sum();
        &self.servers[sum % self.servers.len()]
    }
}

fn parse_counter(value: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| Error::protocol("mock: cannot increment non-numeric value"))
}

impl Backend for MockBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        self.check(BackendOp::Get(key.to_owned()))?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        self.check(BackendOp::Set {
            key: key.to_owned(),
            value: value.clone(),
            ttl,
        })?;
        let revision = self.next_revision();
        self.data.lock().insert(key.to_owned(), Slot { value, revision, ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.check(BackendOp::Delete(key.to_owned()))?;
        Ok(self.data.lock().remove(key).is_some())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, Error> {
        self.check(BackendOp::Increment {
            key: key.to_owned(),
            delta,
        })?;
        let revision = self.next_revision();
        let mut data = self.data.lock();
        let Some(slot) = data.get_mut(key) else {
            return Ok(None);
        };
        let next = parse_counter(&slot.value)?.saturating_add(delta);
        slot.value = Bytes::from(next.to_string());
        slot.revision = revision;
        Ok(Some(next))
    }

    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, CasToken)>, Error> {
        self.check(BackendOp::GetWithToken(key.to_owned()))?;
        let native = self.capabilities.lock().cas;
        Ok(self.data.lock().get(key).map(|slot| {
            let token = if native {
                CasToken::Revision(slot.revision)
            } else {
                CasToken::Value(slot.value.clone())
            };
            (slot.value.clone(), token)
        }))
    }

    async fn compare_and_swap(&self, key: &str, token: &CasToken, value: Bytes, ttl: Option<Duration>) -> Result<bool, Error> {
        self.check(BackendOp::CompareAndSwap {
            key: key.to_owned(),
            value: value.clone(),
        })?;
        if !self.capabilities.lock().cas {
            return Err(Error::unsupported("mock: compare-and-swap disabled"));
        }
        let revision = self.next_revision();
        let mut data = self.data.lock();
        let Some(slot) = data.get_mut(key) else {
            return Ok(false);
        };
        let matches = match token {
            CasToken::Revision(expected) => slot.revision == *expected,
            CasToken::Value(expected) => slot.value == *expected,
        };
        if matches {
            *slot = Slot { value, revision, ttl };
        }
        Ok(matches)
    }

    fn servers(&self) -> Vec<String> {
        self.servers.as_ref().clone()
    }

    async fn storage_units(&self, server: &str) -> Result<Vec<StorageUnit>, Error> {
        self.check(BackendOp::StorageUnits(server.to_owned()))?;
        if !self.capabilities.lock().introspection {
            return Err(Error::unsupported("mock: introspection disabled"));
        }
        if !self.servers.iter().any(|s| s == server) {
            return Err(Error::connection(format!("mock: unknown server {server}")));
        }
        Ok(vec![StorageUnit::new(server, 1)])
    }

    async fn dump_unit(&self, unit: &StorageUnit, _prefix: &str) -> Result<Vec<ItemInfo>, Error> {
        self.check(BackendOp::DumpUnit(unit.clone()))?;
        let data = self.data.lock();
        let mut items: Vec<ItemInfo> = data
            .iter()
            .filter(|(key, _)| self.server_of(key) == unit.server)
            .map(|(key, slot)| ItemInfo::new(key.clone(), slot.value.len() as u64))
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    async fn statistics(&self) -> Result<BTreeMap<String, String>, Error> {
        self.check(BackendOp::Statistics)?;
        let data = self.data.lock();
        let bytes: usize = data.values().map(|slot| slot.value.len()).sum();
        Ok(BTreeMap::from([
            ("curr_items".to_owned(), data.len().to_string()),
            ("bytes".to_owned(), bytes.to_string()),
        ]))
    }

    fn capabilities(&self) -> Capabilities {
        *self.capabilities.lock()
    }
}
