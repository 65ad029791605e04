// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The boundary where backend errors stop.
//!
//! Every raw operation of the cache goes through a [`Connector`], which turns backend
//! failures into misses or `false` and logs them. Nothing above this layer sees a
//! backend error.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use cachegen_backend::{Backend, Capabilities, CasToken, Error, ItemInfo, StorageUnit};

/// Wraps a single backend and collapses its errors.
#[derive(Debug, Clone)]
pub struct Connector<B> {
    backend: B,
}

impl<B> Connector<B> {
    /// Wraps `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn swallow(operation: &'static str, key: &str, error: &Error) {
    tracing::warn!(operation, key, error = %error, kind = error.kind().as_str(), "backend operation failed");
}

impl<B: Backend> Connector<B> {
    /// Returns the wrapped backend's capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Reads the bytes under `key`; failures read as a miss.
    pub async fn raw_get(&self, key: &str) -> Option<Bytes> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                swallow("get", key, &e);
                None
            }
        }
    }

    /// Writes `value` under `key`, returning whether the write succeeded.
    pub async fn raw_set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool {
        match self.backend.set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                swallow("set", key, &e);
                false
            }
        }
    }

    /// Removes `key`, returning whether it existed.
    pub async fn raw_delete(&self, key: &str) -> bool {
        self.backend.delete(key).await.unwrap_or_else(|e| {
            swallow("delete", key, &e);
            false
        })
    }

    /// Adds `delta` to the counter under `key`.
    ///
    /// Returns `None` when the key is absent or the backend failed; absent keys are not
    /// created.
    pub async fn raw_increment(&self, key: &str, delta: i64) -> Option<i64> {
        self.backend.increment(key, delta).await.unwrap_or_else(|e| {
            swallow("increment", key, &e);
            None
        })
    }

    /// Reads the bytes under `key` with a token for [`raw_cas`](Self::raw_cas).
    pub async fn raw_get_with_token(&self, key: &str) -> Option<(Bytes, CasToken)> {
        self.backend.get_with_token(key).await.unwrap_or_else(|e| {
            swallow("get_with_token", key, &e);
            None
        })
    }

    /// Replaces the value under `key` if it still matches `token`.
    ///
    /// Atomic when the backend advertises [`Capabilities::cas`]. Otherwise this reads the
    /// current bytes, compares them with the token and writes: **not atomic**. A writer
    /// that lands between the read and the write is silently overwritten.
    pub async fn raw_cas(&self, key: &str, token: &CasToken, value: Bytes, ttl: Option<Duration>) -> bool {
        if self.capabilities().cas {
            return self
                .backend
                .compare_and_swap(key, token, value, ttl)
                .await
                .unwrap_or_else(|e| {
                    swallow("compare_and_swap", key, &e);
                    false
                });
        }

        let CasToken::Value(expected) = token else {
            tracing::warn!(key, "revision token issued by a backend without compare-and-swap");
            return false;
        };

        // not atomic: a write landing between these two calls is overwritten
        match self.raw_get(key).await {
            Some(current) if current == *expected => self.raw_set(key, value, ttl).await,
            _ => false,
        }
    }

    /// Lists the servers behind the backend.
    pub fn servers(&self) -> Vec<String> {
        self.backend.servers()
    }

    /// Lists the storage units of `server`; `None` when the listing failed.
    pub async fn storage_units(&self, server: &str) -> Option<Vec<StorageUnit>> {
        self.backend
            .storage_units(server)
            .await
            .inspect_err(|e| swallow("storage_units", server, e))
            .ok()
    }

    /// Lists the keys of `unit`; `None` when the dump failed.
    pub async fn dump_unit(&self, unit: &StorageUnit, prefix: &str) -> Option<Vec<ItemInfo>> {
        self.backend
            .dump_unit(unit, prefix)
            .await
            .inspect_err(|e| swallow("dump_unit", &unit.server, e))
            .ok()
    }

    /// Returns backend-native statistics; `None` when they could not be read.
    pub async fn statistics(&self) -> Option<BTreeMap<String, String>> {
        self.backend
            .statistics()
            .await
            .inspect_err(|e| swallow("statistics", "", e))
            .ok()
    }
}
