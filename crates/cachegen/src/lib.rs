// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A key-value cache with generation-based group invalidation and stale serving.
//!
//! Entries are grouped. Each group has a version (generation) stored in the backend, and
//! every entry remembers the version it was written under. Flushing a group increments
//! its version, which invalidates all of its entries in constant time: outdated entries
//! are simply never served as current again and age out of the backend.
//!
//! On top of that, [`Cache`] offers:
//!
//! - **Stale serving.** When an outdated entry is read, the first reader claims its
//!   regeneration for a short window and gets a miss; everybody else keeps being served
//!   the old value. This keeps a flushed hot key from stampeding the origin.
//! - **Ahead generation.** Content can be produced for the *next* generation and
//!   activated atomically afterwards, see [`Cache::get_ahead_generation_extension`].
//! - **Optimistic updates** with [`Cache::set_if_maybe_equals`], atomic where the
//!   backend supports compare-and-swap.
//! - **Counters** and **size statistics** for the instance's namespace.
//!
//! Backends implement [`cachegen_backend::Backend`]. The in-process backend is enabled
//! by the default `memory` feature; Redis support is behind the `redis` feature.
//!
//! # Quick Start
//!
//! ```
//! use cachegen::{Cache, Entry};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let cache = Cache::builder(Clock::new_frozen())
//!     .memory()
//!     .allow_stale(true)
//!     .build();
//!
//! cache.set("front-page", &Entry::new("<html>…</html>".to_owned()), None, "pages").await;
//!
//! match cache.get_with_old::<String>("front-page", "pages").await {
//!     (Some(entry), _) => println!("serving {}", entry.content()),
//!     (None, true) => println!("this caller regenerates the page"),
//!     (None, false) => println!("plain miss"),
//! }
//! # });
//! ```
//!
//! # Configuration
//!
//! [`CacheConfig`] describes an engine, its connection and the key namespace. It
//! deserializes with serde, or reads flat settings through [`Settings`]:
//!
//! ```
//! use cachegen::{Cache, CacheConfig};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let config = CacheConfig::default();
//! let cache = Cache::connect(&config, Clock::new_frozen()).await?;
//! # Ok::<(), cachegen_backend::Error>(())
//! # });
//! ```
//!
//! # Time
//!
//! Claim windows, stats deadlines and telemetry timings read a [`tick::Clock`]. Tests
//! drive it with `tick::ClockControl`.
//!
//! # Failure Model
//!
//! Backend failures never propagate out of cache operations. Reads degrade to misses and
//! writes return `false`; each failure is logged through `tracing` at warn level. Only
//! [`Cache::connect`] returns errors.
//!
//! # Telemetry
//!
//! [`CacheTelemetry`] reports every operation as a structured `tracing` event and, with
//! the `metrics` feature, as OpenTelemetry instruments.

pub mod builder;
pub mod cache;
mod config;
mod connector;
mod counter;
mod engine;
mod entry;
mod stats;
mod storage_key;
mod telemetry;
mod versions;

#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use cachegen_backend::{Backend, ConnectionSettings, DynamicBackend, Error, ErrorKind, Result};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use cachegen_memory::InMemoryBackend;
#[cfg(feature = "redis")]
#[doc(inline)]
pub use cachegen_redis::RedisBackend;
pub use config::{CacheConfig, DEFAULT_CACHE_NAME, STALE_CLAIM_WINDOW, Settings};
pub use connector::Connector;
pub use engine::Engine;
pub use entry::{AheadGeneration, Entry};
pub use stats::SizeStats;
pub use storage_key::{DEFAULT_PREFIX, KeyNamespace};
pub use telemetry::CacheTelemetry;
pub use versions::{DEFAULT_VERSION, INITIAL_FLUSH_VERSION};
