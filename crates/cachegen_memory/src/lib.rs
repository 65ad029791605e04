// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process cache backend backed by moka.
//!
//! This crate provides [`InMemoryBackend`], a concurrent in-memory [`Backend`] using
//! moka's `TinyLFU` eviction. It supports per-key expiry, native compare-and-swap
//! through per-slot revisions, and keyspace introspection, which makes it a complete
//! stand-in for a shared server in single-process deployments and tests.
//! Use [`InMemoryBackendBuilder`] to configure capacity and expiry ceilings without
//! exposing moka types directly.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use cachegen_backend::Backend;
//! use cachegen_memory::InMemoryBackend;
//!
//! # futures::executor::block_on(async {
//! let backend = InMemoryBackend::builder()
//!     .max_capacity(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build();
//!
//! backend.set("key", Bytes::from_static(b"value"), None).await?;
//! assert_eq!(backend.get("key").await?, Some(Bytes::from_static(b"value")));
//! # Ok::<(), cachegen_backend::Error>(())
//! # });
//! ```
//!
//! [`Backend`]: cachegen_backend::Backend

pub mod backend;
pub mod builder;

#[doc(inline)]
pub use backend::InMemoryBackend;
#[doc(inline)]
pub use builder::InMemoryBackendBuilder;
