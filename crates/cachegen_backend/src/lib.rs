// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Backend abstractions for generation-versioned caches.
//!
//! This crate defines the [`Backend`] trait that every storage engine implements: raw
//! get/set/delete, atomic increment, compare-and-swap, and optional keyspace
//! introspection. Backends know nothing about versions, groups or entry formats; they
//! move opaque bytes under fully computed storage keys. The `cachegen` crate layers
//! generation-based invalidation and stale serving on top.
//!
//! # Capabilities
//!
//! Backends differ in what they can do atomically. Rather than duplicating the caching
//! logic per backend family, each backend advertises [`Capabilities`] and callers pick
//! the strongest strategy available. A backend without native compare-and-swap, for
//! example, leaves [`Capabilities::cas`] unset and callers fall back to a
//! read-compare-write sequence.
//!
//! # Implementing a Backend
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use cachegen_backend::{Backend, Error};
//!
//! struct TinyBackend(Mutex<HashMap<String, Bytes>>);
//!
//! impl Backend for TinyBackend {
//!     async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
//!         Ok(self.0.lock().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> Result<(), Error> {
//!         self.0.lock().unwrap().insert(key.to_owned(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &str) -> Result<bool, Error> {
//!         Ok(self.0.lock().unwrap().remove(key).is_some())
//!     }
//!
//!     async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, Error> {
//!         let mut map = self.0.lock().unwrap();
//!         let Some(current) = map.get(key) else { return Ok(None) };
//!         let current: i64 = std::str::from_utf8(current)
//!             .ok()
//!             .and_then(|s| s.parse().ok())
//!             .ok_or_else(|| Error::protocol("value is not numeric"))?;
//!         let next = current + delta;
//!         map.insert(key.to_owned(), Bytes::from(next.to_string()));
//!         Ok(Some(next))
//!     }
//! }
//! ```

pub mod backend;
pub mod connection;
#[cfg(feature = "dynamic")]
mod dynamic;
pub mod error;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub mod types;

#[doc(inline)]
pub use backend::Backend;
#[doc(inline)]
pub use connection::{ConnectionSettings, ServerAddress};
#[cfg(feature = "dynamic")]
#[doc(inline)]
pub use dynamic::{DynamicBackend, DynamicBackendExt};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use types::{Capabilities, CasToken, ItemInfo, StorageUnit};
