// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-group generation counters.

use std::collections::HashMap;

use bytes::Bytes;
use cachegen_backend::Backend;
use parking_lot::Mutex;

use crate::connector::Connector;
use crate::storage_key::KeyNamespace;

/// Version assumed for a group whose version key is absent.
pub const DEFAULT_VERSION: u64 = 1;

/// Version written when flushing a group whose version key is absent.
pub const INITIAL_FLUSH_VERSION: u64 = 2;

/// Group versions persisted in the backend, cached per cache instance.
///
/// The local cache is never invalidated: once a group's version has been looked up it is
/// reused for the lifetime of the instance, except where this instance changes it.
#[derive(Debug)]
pub(crate) struct KeyVersionStore {
    local: Mutex<HashMap<String, u64>>,
    initial_flush_version: u64,
}

impl KeyVersionStore {
    pub fn new(initial_flush_version: u64) -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            initial_flush_version,
        }
    }

    fn cached(&self, group: &str) -> Option<u64> {
        self.local.lock().get(group).copied().filter(|v| *v > 0)
    }

    fn remember(&self, group: &str, version: u64) {
        self.local.lock().insert(group.to_owned(), version);
    }

    /// Returns the group's current version; an absent or unreadable key reads as 1.
    pub async fn get_version<B: Backend>(&self, connector: &Connector<B>, namespace: &KeyNamespace, group: &str) -> u64 {
        if let Some(version) = self.cached(group) {
            return version;
        }

        let stored = connector
            .raw_get(&namespace.version_key(group))
            .await
            .and_then(|raw| parse_version(&raw))
            .filter(|v| *v > 0);
        let version = stored.unwrap_or(DEFAULT_VERSION);
        self.remember(group, version);
        version
    }

    /// Persists `version` without expiry and adopts it locally even if the write failed.
    pub async fn set_version<B: Backend>(&self, connector: &Connector<B>, namespace: &KeyNamespace, group: &str, version: u64) {
        let written = connector
            .raw_set(&namespace.version_key(group), Bytes::from(version.to_string()), None)
            .await;
        if !written {
            tracing::warn!(group, version, "failed to persist group version, using it locally");
        }
        self.remember(group, version);
    }

    /// Atomically advances the group's version.
    ///
    /// A group without a version key is initialised to the initial flush version.
    pub async fn increment_version<B: Backend>(&self, connector: &Connector<B>, namespace: &KeyNamespace, group: &str) -> u64 {
        let incremented = connector
            .raw_increment(&namespace.version_key(group), 1)
            .await
            .and_then(|v| u64::try_from(v).ok());

        match incremented {
            Some(version) => {
                self.remember(group, version);
                version
            }
            None => {
                self.set_version(connector, namespace, group, self.initial_flush_version)
                    .await;
                self.initial_flush_version
            }
        }
    }
}

fn parse_version(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
