// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Object Store
//!
//! Map-backed [`ObjectStore`] with the same semantics the S3 store exposes:
//! whole-object bodies, idempotent deletes, sorted prefix listings, and
//! `KeyNotFound` for absent keys. Integration tests run the full backend
//! engine against it; it also serves for dry runs where no store is
//! reachable.
//!
//! All sessions handed out by one [`MemoryStoreProvider`] share the same
//! underlying map, mirroring how per-worker S3 sessions all see one bucket.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use blockhaul_domain::{ObjectStore, ObjectStoreProvider, TransferError};

type SharedObjects = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// Factory for sessions over one shared in-memory bucket.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreProvider {
    objects: SharedObjects,
}

impl MemoryStoreProvider {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl ObjectStoreProvider for MemoryStoreProvider {
    fn open_store(&self) -> Result<Box<dyn ObjectStore>, TransferError> {
        Ok(Box::new(MemoryObjectStore {
            objects: Arc::clone(&self.objects),
        }))
    }
}

/// One session over the shared map.
pub struct MemoryObjectStore {
    objects: SharedObjects,
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, TransferError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TransferError::key_not_found(format!("key {key} not found")))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), TransferError> {
        self.objects.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn head(&self, key: &str) -> Result<(), TransferError> {
        if self.objects.read().contains_key(key) {
            Ok(())
        } else {
            Err(TransferError::key_not_found(format!("key {key} not found")))
        }
    }

    fn delete(&self, key: &str) -> Result<(), TransferError> {
        // Deletes are idempotent, as on S3; rm() HEADs first when a
        // deterministic missing-key error is wanted.
        self.objects.write().remove(key);
        Ok(())
    }

    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, TransferError> {
        let objects = self.objects.read();
        let keys = match prefix {
            Some(prefix) => objects
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => objects.keys().cloned().collect(),
        };
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Box<dyn ObjectStore> {
        MemoryStoreProvider::new().open_store().unwrap()
    }

    #[test]
    fn test_put_get_delete() {
        let provider = MemoryStoreProvider::new();
        let store = provider.open_store().unwrap();

        store.put("k1", b"hello").unwrap();
        assert_eq!(store.get("k1").unwrap(), b"hello");
        assert_eq!(provider.object_count(), 1);

        store.head("k1").unwrap();
        store.delete("k1").unwrap();
        assert!(store.get("k1").unwrap_err().is_missing_key());
        // Idempotent delete
        store.delete("k1").unwrap();
    }

    #[test]
    fn test_missing_key_classification() {
        let store = store();
        assert!(store.get("absent").unwrap_err().is_missing_key());
        assert!(store.head("absent").unwrap_err().is_missing_key());
    }

    #[test]
    fn test_sessions_share_the_bucket() {
        let provider = MemoryStoreProvider::new();
        let a = provider.open_store().unwrap();
        let b = provider.open_store().unwrap();
        a.put("shared", b"x").unwrap();
        assert_eq!(b.get("shared").unwrap(), b"x");
    }

    #[test]
    fn test_list_with_prefix_is_sorted() {
        let store = store();
        store.put("bb", b"2").unwrap();
        store.put("ab", b"1").unwrap();
        store.put("aa", b"0").unwrap();

        assert_eq!(store.list(None).unwrap(), vec!["aa", "ab", "bb"]);
        assert_eq!(store.list(Some("a")).unwrap(), vec!["aa", "ab"]);
        assert!(store.list(Some("zz")).unwrap().is_empty());
    }
}
