// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value types shared by backends and their callers.

use bytes::Bytes;

/// Optional features a backend supports natively.
///
/// Callers consult these flags to choose between a native primitive and a weaker
/// emulation. All flags default to `false`.
///
/// # Examples
///
/// ```
/// use cachegen_backend::Capabilities;
///
/// let caps = Capabilities::new().with_cas(true).with_introspection(true);
/// assert!(caps.cas);
/// assert!(!caps.sasl);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[expect(clippy::struct_excessive_bools, reason = "independent capability flags")]
pub struct Capabilities {
    /// Native, atomic compare-and-swap.
    pub cas: bool,
    /// Authenticated connections (SASL or an equivalent AUTH handshake).
    pub sasl: bool,
    /// A binary wire protocol can be negotiated.
    pub binary_protocol: bool,
    /// Keys and their sizes can be enumerated per storage unit.
    pub introspection: bool,
}

impl Capabilities {
    /// Creates a capability set with every flag cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cas: false,
            sasl: false,
            binary_protocol: false,
            introspection: false,
        }
    }

    /// Sets [`cas`](Self::cas).
    #[must_use]
    pub const fn with_cas(mut self, enabled: bool) -> Self {
        self.cas = enabled;
        self
    }

    /// Sets [`sasl`](Self::sasl).
    #[must_use]
    pub const fn with_sasl(mut self, enabled: bool) -> Self {
        self.sasl = enabled;
        self
    }

    /// Sets [`binary_protocol`](Self::binary_protocol).
    #[must_use]
    pub const fn with_binary_protocol(mut self, enabled: bool) -> Self {
        self.binary_protocol = enabled;
        self
    }

    /// Sets [`introspection`](Self::introspection).
    #[must_use]
    pub const fn with_introspection(mut self, enabled: bool) -> Self {
        self.introspection = enabled;
        self
    }
}

/// Proof of the value observed by a read, handed back to a compare-and-swap.
///
/// Backends with versioned slots hand out a [`Revision`](Self::Revision); backends that
/// can only compare contents use the observed bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasToken {
    /// An opaque revision number assigned by the backend on every write.
    Revision(u64),
    /// The exact bytes observed by the read.
    Value(Bytes),
}

/// One enumerable partition of a server's keyspace, such as a memcached slab class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageUnit {
    /// The server this unit lives on, as reported by [`Backend::servers`](crate::Backend::servers).
    pub server: String,
    /// Backend-specific unit identifier.
    pub id: u32,
}

impl StorageUnit {
    /// Creates a storage unit descriptor.
    pub fn new(server: impl Into<String>, id: u32) -> Self {
        Self {
            server: server.into(),
            id,
        }
    }
}

/// A key found while enumerating a storage unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    /// The full storage key.
    pub key: String,
    /// Stored size in bytes, as reported by the backend.
    pub size: u64,
}

impl ItemInfo {
    /// Creates an item descriptor.
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self { key: key.into(), size }
    }
}
