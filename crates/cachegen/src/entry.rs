// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cached values and their version metadata.

use std::ops::Deref;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Version reserved for soft-deleted entries; real versions start at 1.
pub(crate) const TOMBSTONE_VERSION: u64 = 0;

/// A cached value together with the generation it was written under.
///
/// Entries created with [`Entry::new`] carry no version; the cache stamps the group's
/// current version when the entry is stored. Entries fetched from the cache always carry
/// one.
///
/// `Entry` dereferences to its content.
///
/// # Examples
///
/// ```
/// use cachegen::Entry;
///
/// let entry = Entry::new(vec![1, 2, 3]);
/// assert_eq!(entry.len(), 3);
/// assert_eq!(entry.key_version(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    content: V,
    key_version: Option<u64>,
    key_version_at_creation: Option<u64>,
    expires_at: Option<u64>,
}

impl<V> Entry<V> {
    /// Creates an unversioned entry.
    pub fn new(content: V) -> Self {
        Self {
            content,
            key_version: None,
            key_version_at_creation: None,
            expires_at: None,
        }
    }

    /// Pins the entry to an explicit generation instead of the group's current one.
    #[must_use]
    pub fn with_key_version(mut self, key_version: u64) -> Self {
        self.key_version = Some(key_version);
        self
    }

    /// Tags the entry with a generation obtained from
    /// [`Cache::get_ahead_generation_extension`](crate::Cache::get_ahead_generation_extension).
    ///
    /// The entry is served as soon as it is written, but reading it leaves the group's
    /// version alone. The group moves to the entry's version when flushed with
    /// [`Cache::flush_group_after_ahead_generation`](crate::Cache::flush_group_after_ahead_generation).
    #[must_use]
    pub fn with_ahead_generation(mut self, extension: &AheadGeneration) -> Self {
        self.key_version = Some(extension.key_version);
        self.key_version_at_creation = Some(extension.key_version_at_creation);
        self
    }

    /// Returns the cached content.
    pub fn content(&self) -> &V {
        &self.content
    }

    /// Consumes the entry and returns the cached content.
    pub fn into_content(self) -> V {
        self.content
    }

    /// Returns the generation this entry was written under.
    pub fn key_version(&self) -> Option<u64> {
        self.key_version
    }

    /// Returns the group version that was current when an ahead-generated entry was written.
    pub fn key_version_at_creation(&self) -> Option<u64> {
        self.key_version_at_creation
    }

    /// Returns the end of the regeneration claim window (unix seconds), if one was stamped.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    pub(crate) fn to_stored(&self, key_version: u64) -> Result<StoredEntry, serde_json::Error>
    where
        V: Serialize,
    {
        Ok(StoredEntry {
            content: serde_json::to_value(&self.content)?,
            key_version: self.key_version.unwrap_or(key_version),
            key_version_at_creation: self.key_version_at_creation,
            expires_at: self.expires_at,
        })
    }
}

impl<V> Deref for Entry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.content
    }
}

/// The versions to tag content with when generating it ahead of a flush.
///
/// `key_version` is one past the group's current version; `key_version_at_creation` is
/// the current version itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AheadGeneration {
    /// The generation the content will be current under.
    pub key_version: u64,
    /// The generation current while the content was produced.
    pub key_version_at_creation: u64,
}

/// The representation of an entry in the backend.
///
/// Content is kept as a JSON value so the cache can inspect and rewrite metadata without
/// knowing the content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub content: serde_json::Value,
    pub key_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_version_at_creation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    /// Decodes a stored entry; anything without `content` and `key_version` is malformed.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn into_entry<V: DeserializeOwned>(self) -> Result<Entry<V>, serde_json::Error> {
        Ok(Entry {
            content: serde_json::from_value(self.content)?,
            key_version: Some(self.key_version),
            key_version_at_creation: self.key_version_at_creation,
            expires_at: self.expires_at,
        })
    }
}
