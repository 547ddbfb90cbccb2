//! Redb-backed durable store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety: a
//! power cut during a write leaves either the old or the new value, never a
//! torn one. All state survives restarts.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use super::{Namespace, Store, StoreError};

/// Table: dailykeys
/// Key: value name (`start_epoch`, `last_epoch`, `last_daily_key`)
const KEY_CHAIN: TableDefinition<&str, &[u8]> = TableDefinition::new("dailykeys");

/// Table: identity
/// Key: value name (`master_key`, `device_id`)
const IDENTITY: TableDefinition<&str, &[u8]> = TableDefinition::new("identity");

/// Table: payload
/// Key: value name (`counter`)
const COUNTER: TableDefinition<&str, &[u8]> = TableDefinition::new("payload");

/// Table: lorawan
/// Key: value name (`dev_nonce`, `session`)
const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("lorawan");

const fn table_for(namespace: Namespace) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match namespace {
        Namespace::KeyChain => KEY_CHAIN,
        Namespace::Identity => IDENTITY,
        Namespace::Counter => COUNTER,
        Namespace::Session => SESSION,
    }
}

/// Durable store backed by Redb, one table per namespace.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates one table per [`Namespace`] if missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        for namespace in Namespace::ALL {
            let _ =
                txn.open_table(table_for(namespace)).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Store for RedbStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table =
            txn.open_table(table_for(namespace)).map_err(|e| StoreError::Io(e.to_string()))?;

        let value = table.get(key).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn put_batch(&self, namespace: Namespace, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(table_for(namespace)).map_err(|e| StoreError::Io(e.to_string()))?;

            for (key, value) in entries {
                table.insert(*key, *value).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn clear(&self, namespaces: &[Namespace]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;

        for namespace in namespaces {
            // Drop and recreate so readers never see a missing table
            txn.delete_table(table_for(*namespace)).map_err(|e| StoreError::Io(e.to_string()))?;
            let _ =
                txn.open_table(table_for(*namespace)).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn put_get_in_one_session() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("node.redb")).unwrap();

        store.put_u32(Namespace::Counter, "counter", 41).unwrap();
        assert_eq!(store.get_u32(Namespace::Counter, "counter").unwrap(), Some(41));
        assert_eq!(store.get(Namespace::Counter, "missing").unwrap(), None);
    }

    #[test]
    fn clear_leaves_other_namespaces() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("node.redb")).unwrap();

        store.put_u32(Namespace::Counter, "counter", 41).unwrap();
        store.put_string(Namespace::Identity, "device_id", "VEH-001").unwrap();

        store.clear(&[Namespace::Counter]).unwrap();

        assert_eq!(store.get_u32(Namespace::Counter, "counter").unwrap(), None);
        assert_eq!(
            store.get_string(Namespace::Identity, "device_id").unwrap().as_deref(),
            Some("VEH-001")
        );
    }
}
