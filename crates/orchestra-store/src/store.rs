//! Typed key-value stores over redb.
//!
//! [`Storage`] owns the database; [`Store`] is a typed view over one named
//! table. The store supports both on-disk and in-memory backends — the
//! latter is the default and the required one, the former backs the
//! `persistent` dbtype.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe storage backed by redb.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open (or create) a persistent database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        debug!(?path, "storage opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an ephemeral in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        debug!("in-memory storage opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// A typed store over the named table, created if absent.
    pub fn store<V>(&self, table: &'static str) -> StoreResult<Store<V>>
    where
        V: Serialize + DeserializeOwned,
    {
        let definition = TableDefinition::new(table);
        // Opening a table in a write transaction creates it if absent.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(definition).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;

        Ok(Store {
            db: self.db.clone(),
            table: definition,
            _value: PhantomData,
        })
    }
}

/// A typed view over one redb table.
///
/// Values are JSON-serialized; readers get point-in-time snapshots via
/// read transactions and never observe partial writes.
pub struct Store<V> {
    db: Arc<Database>,
    table: TableDefinition<'static, &'static str, &'static [u8]>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Store {
            db: self.db.clone(),
            table: self.table,
            _value: PhantomData,
        }
    }
}

impl<V> Store<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Insert or update a value under the given key.
    pub fn put(&self, key: &str, value: &V) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the value under the given key, erring when it is absent.
    pub fn get(&self, key: &str) -> StoreResult<V> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// Unordered snapshot of all values.
    pub fn list(&self) -> StoreResult<Vec<V>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let v: V = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(v);
        }
        Ok(results)
    }

    /// Number of stored values.
    pub fn count(&self) -> StoreResult<usize> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        let len = table.len().map_err(map_err!(Read))?;
        Ok(len as usize)
    }
}
