//! Partitions and the transactional handles used to read and write them.

use std::fmt::{Display, Formatter};

use lmdb::{Cursor, Database, RoTransaction, RwTransaction, Transaction, WriteFlags};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// One of the three named key/object collections inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    MainReviews,
    OfflineReviews,
    Favorites,
}

impl Partition {
    pub const ALL: [Partition; 3] = [
        Partition::MainReviews,
        Partition::OfflineReviews,
        Partition::Favorites,
    ];

    /// LMDB database name of the partition.
    pub fn name(&self) -> &'static str {
        match self {
            Partition::MainReviews => "main-reviews",
            Partition::OfflineReviews => "offline-reviews",
            Partition::Favorites => "fav-restaurants",
        }
    }

    pub fn from_name(name: &str) -> Option<Partition> {
        Partition::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Partition::MainReviews => 0,
            Partition::OfflineReviews => 1,
            Partition::Favorites => 2,
        }
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    ReadOnly,
    ReadWrite,
}

/// Big-endian so that LMDB's byte ordering matches numeric ordering.
pub(crate) fn encode_key(key: u64) -> [u8; 8] {
    key.to_be_bytes()
}

pub(crate) fn decode_key(bytes: &[u8]) -> Result<u64, AppResponse> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AppResponse::DatabaseError(format!("Malformed key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

enum TxnInner<'env> {
    Ro(RoTransaction<'env>),
    Rw(RwTransaction<'env>),
}

/// A transaction scoped to a single partition.
///
/// Dropping a handle without [`PartitionTxn::commit`] aborts it, so writes are
/// only visible after an explicit commit.
pub struct PartitionTxn<'env> {
    partition: Partition,
    db: Database,
    inner: TxnInner<'env>,
}

impl<'env> PartitionTxn<'env> {
    pub(crate) fn read_only(partition: Partition, db: Database, txn: RoTransaction<'env>) -> Self {
        Self { partition, db, inner: TxnInner::Ro(txn) }
    }

    pub(crate) fn read_write(partition: Partition, db: Database, txn: RwTransaction<'env>) -> Self {
        Self { partition, db, inner: TxnInner::Rw(txn) }
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn mode(&self) -> TxnMode {
        match self.inner {
            TxnInner::Ro(_) => TxnMode::ReadOnly,
            TxnInner::Rw(_) => TxnMode::ReadWrite,
        }
    }

    fn raw_get(&self, key: &[u8; 8]) -> Result<&[u8], lmdb::Error> {
        match &self.inner {
            TxnInner::Ro(txn) => txn.get(self.db, key),
            TxnInner::Rw(txn) => txn.get(self.db, key),
        }
    }

    /// Reads the object stored under `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: u64) -> Result<Option<T>, AppResponse> {
        match self.raw_get(&encode_key(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(AppResponse::from(e)),
        }
    }

    pub fn contains(&self, key: u64) -> Result<bool, AppResponse> {
        match self.raw_get(&encode_key(key)) {
            Ok(_) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(AppResponse::from(e)),
        }
    }

    /// Writes `value` under `key`, overwriting any previous object.
    pub fn put<T: Serialize>(&mut self, key: u64, value: &T) -> Result<(), AppResponse> {
        let json = serde_json::to_vec(value)?;
        match &mut self.inner {
            TxnInner::Rw(txn) => {
                txn.put(self.db, &encode_key(key), &json, WriteFlags::empty())?;
                Ok(())
            }
            TxnInner::Ro(_) => Err(AppResponse::BadRequest(format!(
                "put on read-only transaction for partition '{}'",
                self.partition
            ))),
        }
    }

    /// Removes `key`. Returns false when it was absent.
    pub fn delete(&mut self, key: u64) -> Result<bool, AppResponse> {
        match &mut self.inner {
            TxnInner::Rw(txn) => match txn.del(self.db, &encode_key(key), None) {
                Ok(()) => Ok(true),
                Err(lmdb::Error::NotFound) => Ok(false),
                Err(e) => Err(AppResponse::from(e)),
            },
            TxnInner::Ro(_) => Err(AppResponse::BadRequest(format!(
                "delete on read-only transaction for partition '{}'",
                self.partition
            ))),
        }
    }

    /// All keys in ascending order.
    ///
    /// Scans use `Cursor::iter`; `iter_start` panics on an empty database.
    pub fn keys(&self) -> Result<Vec<u64>, AppResponse> {
        let mut keys = Vec::new();
        match &self.inner {
            TxnInner::Ro(txn) => {
                let mut cursor = txn.open_ro_cursor(self.db)?;
                for (key, _) in cursor.iter() {
                    keys.push(decode_key(key)?);
                }
            }
            TxnInner::Rw(txn) => {
                let mut cursor = txn.open_ro_cursor(self.db)?;
                for (key, _) in cursor.iter() {
                    keys.push(decode_key(key)?);
                }
            }
        }
        Ok(keys)
    }

    /// All `(key, object)` pairs in ascending key order.
    pub fn entries<T: DeserializeOwned>(&self) -> Result<Vec<(u64, T)>, AppResponse> {
        fn collect<T: DeserializeOwned>(
            cursor: &mut lmdb::RoCursor<'_>,
        ) -> Result<Vec<(u64, T)>, AppResponse> {
            let mut out = Vec::new();
            for (key, value) in cursor.iter() {
                out.push((decode_key(key)?, serde_json::from_slice(value)?));
            }
            Ok(out)
        }

        match &self.inner {
            TxnInner::Ro(txn) => collect(&mut txn.open_ro_cursor(self.db)?),
            TxnInner::Rw(txn) => collect(&mut txn.open_ro_cursor(self.db)?),
        }
    }

    pub fn values<T: DeserializeOwned>(&self) -> Result<Vec<T>, AppResponse> {
        Ok(self.entries()?.into_iter().map(|(_, value)| value).collect())
    }

    pub fn count(&self) -> Result<u64, AppResponse> {
        Ok(self.keys()?.len() as u64)
    }

    pub fn last_key(&self) -> Result<Option<u64>, AppResponse> {
        Ok(self.keys()?.last().copied())
    }

    /// Removes every entry. Returns how many were removed.
    pub fn clear(&mut self) -> Result<u64, AppResponse> {
        let removed = self.count()?;
        match &mut self.inner {
            TxnInner::Rw(txn) => {
                txn.clear_db(self.db)?;
                Ok(removed)
            }
            TxnInner::Ro(_) => Err(AppResponse::BadRequest(format!(
                "clear on read-only transaction for partition '{}'",
                self.partition
            ))),
        }
    }

    /// Commits a read-write handle. Read-only handles are simply released.
    pub fn commit(self) -> Result<(), AppResponse> {
        match self.inner {
            TxnInner::Ro(txn) => {
                txn.abort();
                Ok(())
            }
            TxnInner::Rw(txn) => Ok(txn.commit()?),
        }
    }

    /// Points the same underlying transaction at another partition, so one
    /// commit can span several partitions.
    pub(crate) fn retarget(mut self, partition: Partition, db: Database) -> Self {
        self.partition = partition;
        self.db = db;
        self
    }
}
