// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mapping from logical keys and groups to backend storage keys.

use std::fmt::Write as _;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Leading token of every storage key unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "cachegen";

/// The namespace every storage key of one cache instance lives in.
///
/// Storage keys have the shape `{prefix}_{instance_id}_{host}_{tenant_id}_{module}_{md5(key)}`,
/// so co-located sites, tenants and modules sharing one backend never collide. Groups are
/// not part of item keys; they only namespace version keys
/// (`{prefix}_{instance_id}_{host}_{tenant_id}_{module}_{group}_key_version`). Logical keys
/// must therefore be unique across groups.
///
/// Whitespace and control characters are replaced by `_` so the keys are safe for
/// text-based protocols.
///
/// # Examples
///
/// ```
/// use cachegen::KeyNamespace;
///
/// let namespace = KeyNamespace::new().instance_id(7).host("example.com").module("pages");
/// assert_eq!(
///     namespace.item_key("home"),
///     "cachegen_7_example.com_0_pages_106a6c241b8797f52e1e77317b96a201"
/// );
/// assert_eq!(namespace.version_key("posts"), "cachegen_7_example.com_0_pages_posts_key_version");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyNamespace {
    /// Leading key token.
    pub prefix: String,
    /// Identifies the installation.
    pub instance_id: u64,
    /// Host name of the site.
    pub host: String,
    /// Identifies the tenant (blog) within a multi-tenant installation.
    pub tenant_id: u64,
    /// Name of the module using the cache.
    pub module: String,
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            instance_id: 0,
            host: String::new(),
            tenant_id: 0,
            module: String::new(),
        }
    }
}

impl KeyNamespace {
    /// Creates the default namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the leading key token.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the installation id.
    #[must_use]
    pub fn instance_id(mut self, instance_id: u64) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Sets the host name.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the tenant id.
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: u64) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Sets the module name.
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Returns the prefix shared by every key of this instance.
    ///
    /// Used to recognise this instance's keys when enumerating a backend.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        sanitize(&format!(
            "{}_{}_{}_{}_{}_",
            self.prefix, self.instance_id, self.host, self.tenant_id, self.module
        ))
    }

    /// Returns the storage key for a logical item key.
    #[must_use]
    pub fn item_key(&self, key: &str) -> String {
        let digest = Md5::digest(key.as_bytes());
        let mut storage_key = self.key_prefix();
        for byte in digest {
            let _ = write!(storage_key, "{byte:02x}");
        }
        storage_key
    }

    /// Returns the storage key holding the version of `group`.
    #[must_use]
    pub fn version_key(&self, group: &str) -> String {
        let mut storage_key = self.key_prefix();
        storage_key.push_str(&sanitize(group));
        storage_key.push_str("_key_version");
        storage_key
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect()
}
