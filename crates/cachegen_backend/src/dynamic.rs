// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic backend wrapper for type erasure.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::backend::DynBackend;
use crate::{Backend, Capabilities, CasToken, Error, ItemInfo, StorageUnit};

/// Extension trait for converting any `Backend` into a `DynamicBackend`.
///
/// This trait is automatically implemented for all types that implement `Backend`.
pub trait DynamicBackendExt: Sized {
    /// Converts this backend into a `DynamicBackend`.
    fn into_dynamic(self) -> DynamicBackend;
}

impl<T> DynamicBackendExt for T
where
    T: Backend + 'static,
{
    fn into_dynamic(self) -> DynamicBackend {
        DynamicBackend::new(self)
    }
}

/// A clonable backend with type erasure.
///
/// `DynamicBackend` wraps a trait object in an `Arc`, so engines chosen at runtime from
/// configuration can be handed around as one concrete type.
pub struct DynamicBackend(Arc<DynBackend<'static>>);

impl DynamicBackend {
    /// Creates a new dynamic backend from any `Backend` implementation.
    pub fn new<T>(backend: T) -> Self
    where
        T: Backend + 'static,
    {
        Self(DynBackend::new_arc(backend))
    }
}

impl Debug for DynamicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBackend")
            .field("capabilities", &self.0.capabilities())
            .finish()
    }
}

impl Clone for DynamicBackend {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Backend for DynamicBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        self.0.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.0.delete(key).await
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, Error> {
        self.0.increment(key, delta).await
    }

    async fn get_with_token(&self, key: &str) -> Result<Option<(Bytes, CasToken)>, Error> {
        self.0.get_with_token(key).await
    }

    async fn compare_and_swap(&self, key: &str, token: &CasToken, value: Bytes, ttl: Option<Duration>) -> Result<bool, Error> {
        self.0.compare_and_swap(key, token, value, ttl).await
    }

    fn servers(&self) -> Vec<String> {
        self.0.servers()
    }

    async fn storage_units(&self, server: &str) -> Result<Vec<StorageUnit>, Error> {
        self.0.storage_units(server).await
    }

    async fn dump_unit(&self, unit: &StorageUnit, prefix: &str) -> Result<Vec<ItemInfo>, Error> {
        self.0.dump_unit(unit, prefix).await
    }

    async fn statistics(&self) -> Result<BTreeMap<String, String>, Error> {
        self.0.statistics().await
    }

    fn capabilities(&self) -> Capabilities {
        self.0.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[test]
    fn dynamic_backend_forwards_to_inner() {
        futures::executor::block_on(async {
            let mock = MockBackend::new();
            let dynamic = mock.clone().into_dynamic();

            dynamic.set("k", Bytes::from_static(b"v"), None).await.unwrap();
            assert_eq!(mock.raw("k"), Some(Bytes::from_static(b"v")));
            assert_eq!(dynamic.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
            assert!(dynamic.delete("k").await.unwrap());
            assert_eq!(dynamic.capabilities(), mock.capabilities());
        });
    }

    #[test]
    fn clones_share_the_backend() {
        futures::executor::block_on(async {
            let dynamic = MockBackend::new().into_dynamic();
            let clone = dynamic.clone();

            dynamic.set("n", Bytes::from_static(b"1"), None).await.unwrap();
            assert_eq!(clone.increment("n", 2).await.unwrap(), Some(3));
        });
    }
}
