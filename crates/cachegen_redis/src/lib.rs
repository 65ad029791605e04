// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis backend for generation-versioned caches.
//!
//! [`RedisBackend`] spreads keys over one or more Redis servers by hashing the storage
//! key, authenticates with `AUTH` when credentials are configured, and can share one
//! multiplexed connection per server across every backend in the process.
//!
//! Increment and compare-and-swap run as Lua scripts, so both are atomic on the server:
//! increment refuses to create missing keys and compare-and-swap compares the stored
//! bytes against the value observed by the read.
//!
//! # Examples
//!
//! ```no_run
//! use cachegen_backend::ConnectionSettings;
//! use cachegen_redis::RedisBackend;
//!
//! # async fn example() -> Result<(), cachegen_backend::Error> {
//! let settings = ConnectionSettings::new(["127.0.0.1:6379"]);
//! let backend = RedisBackend::connect(&settings).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod info;
mod registry;
mod scripts;

pub use backend::{DEFAULT_PORT, RedisBackend};
