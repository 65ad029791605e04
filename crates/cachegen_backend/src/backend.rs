// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`Backend`] is deliberately narrow: opaque bytes in, opaque bytes out, under keys the
//! caller has already namespaced. Anything smarter (versions, groups, stale serving) is
//! built on top of these primitives.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use crate::{Capabilities, CasToken, Error, ItemInfo, StorageUnit};

/// Trait for cache storage backends.
///
/// Four methods are required: [`get`](Self::get), [`set`](Self::set),
/// [`delete`](Self::delete), [`increment`](Self::increment). Everything else has a
/// default that either degrades gracefully or reports [`ErrorKind::Unsupported`]:
///
/// - `get_with_token`: reads the value and uses the bytes themselves as the token
/// - `compare_and_swap`: unsupported unless [`Capabilities::cas`] is advertised
/// - `servers`, `storage_units`, `dump_unit`: no introspection
/// - `statistics`: an empty map
/// - `capabilities`: nothing supported
///
/// Implementations report every failure as an [`Error`]; deciding which failures are
/// harmless is the caller's job.
///
/// [`ErrorKind::Unsupported`]: crate::ErrorKind::Unsupported
#[cfg_attr(
    feature = "dynamic",
    dynosaur::dynosaur(pub(crate) DynBackend = dyn(box) Backend, bridge(none))
)]
pub trait Backend: Send + Sync {
    /// Reads the raw value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;

    /// Stores `value` under `key`. A `ttl` of `None` means the value never expires.
    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes `key`, returning whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Adds `delta` to the decimal integer stored under `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist: backends must not create it.
    fn increment(&self, key: &str, delta: i64) -> impl Future<Output = Result<Option<i64>, Error>> + Send;

    /// Reads the raw value stored under `key` together with a token for
    /// [`compare_and_swap`](Self::compare_and_swap).
    fn get_with_token(&self, key: &str) -> impl Future<Output = Result<Option<(Bytes, CasToken)>, Error>> + Send {
        async move {
            Ok(self.get(key).await?.map(|value| {
                let token = CasToken::Value(value.clone());
                (value, token)
            }))
        }
    }

    /// Atomically replaces the value under `key` if it still matches `token`.
    ///
    /// Returns `Ok(false)` when the value changed (or vanished) since the token was issued.
    fn compare_and_swap(
        &self,
        key: &str,
        token: &CasToken,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        let _ = (key, token, value, ttl);
        async { Err(Error::unsupported("compare-and-swap is not supported by this backend")) }
    }

    /// Lists the servers this backend talks to, in a stable order.
    fn servers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Lists the enumerable storage units of one server.
    fn storage_units(&self, server: &str) -> impl Future<Output = Result<Vec<StorageUnit>, Error>> + Send {
        let _ = server;
        async { Err(Error::unsupported("keyspace introspection is not supported by this backend")) }
    }

    /// Lists the keys held by a storage unit.
    ///
    /// `prefix` is a hint: backends may use it to narrow the enumeration, but callers
    /// must still filter the returned keys themselves.
    fn dump_unit(&self, unit: &StorageUnit, prefix: &str) -> impl Future<Output = Result<Vec<ItemInfo>, Error>> + Send {
        let _ = (unit, prefix);
        async { Err(Error::unsupported("keyspace introspection is not supported by this backend")) }
    }

    /// Returns backend-native statistics as name/value pairs.
    fn statistics(&self) -> impl Future<Output = Result<BTreeMap<String, String>, Error>> + Send {
        async { Ok(BTreeMap::new()) }
    }

    /// Returns the features this backend supports natively.
    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
    }
}
