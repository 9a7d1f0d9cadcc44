use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags};
use log::{debug, info, warn};

use crate::app_response::AppResponse;
use crate::local_db_partition::{Partition, PartitionTxn, TxnMode};

const META_DB: &str = "meta";
const VERSION_KEY: &[u8] = b"schema_version";
const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;
const MAX_DBS: u32 = 8;

/// Directory holding the LMDB environment for a store named `name`.
pub fn store_dir(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.lmdb"))
}

/// Opens (creating if needed) an LMDB environment directory.
///
/// Reader slots are tied to transactions rather than threads (`NO_TLS`), so a
/// thread may hold several read transactions at once.
pub(crate) fn open_environment(dir: &Path, map_size: usize, max_dbs: u32) -> Result<Environment, AppResponse> {
    fs::create_dir_all(dir)?;
    let env = Environment::new()
        .set_flags(EnvironmentFlags::NO_TLS)
        .set_max_dbs(max_dbs)
        .set_map_size(map_size)
        .open(dir)?;
    Ok(env)
}

/// The versioned local store: a `meta` database plus the three partitions.
pub struct RestaurantDbState {
    env: Environment,
    partitions: [Database; 3],
    path: PathBuf,
    version: u32,
    last_upgrade: Option<(u32, u32)>,
}

impl RestaurantDbState {
    /// Opens the store `<name>.lmdb` at schema `version`.
    ///
    /// A stored version lower than `version` triggers partition creation; an
    /// equal one just opens the existing partitions. Both paths are safe to
    /// repeat. A stored version higher than `version` is refused.
    pub fn open(name: &str, version: u32) -> Result<Self, AppResponse> {
        Self::open_with_map_size(name, version, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(name: &str, version: u32, map_size: usize) -> Result<Self, AppResponse> {
        if version == 0 {
            return Err(AppResponse::BadRequest("Schema version must be at least 1".to_string()));
        }

        let path = store_dir(name);
        info!("Opening restaurant store at {} (schema v{version})", path.display());
        let env = open_environment(&path, map_size, MAX_DBS)?;

        let meta = env.create_db(Some(META_DB), DatabaseFlags::empty())?;
        let stored = read_version(&env, meta)?;

        let last_upgrade = if stored > version {
            warn!("Store {} is at v{stored}, refusing to open at v{version}", path.display());
            return Err(AppResponse::DatabaseError(format!(
                "Stored schema version {stored} is newer than requested version {version}"
            )));
        } else if stored < version {
            info!("Upgrading store schema v{stored} -> v{version}");
            for partition in Partition::ALL {
                env.create_db(Some(partition.name()), DatabaseFlags::empty())?;
                debug!("Partition '{partition}' ready");
            }
            let mut txn = env.begin_rw_txn()?;
            txn.put(meta, &VERSION_KEY, &version.to_be_bytes(), WriteFlags::empty())?;
            txn.commit()?;
            Some((stored, version))
        } else {
            None
        };

        let partitions = [
            env.open_db(Some(Partition::MainReviews.name()))?,
            env.open_db(Some(Partition::OfflineReviews.name()))?,
            env.open_db(Some(Partition::Favorites.name()))?,
        ];

        Ok(Self {
            env,
            partitions,
            path,
            version,
            last_upgrade,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// `(from, to)` when this open performed a schema upgrade.
    pub fn last_upgrade(&self) -> Option<(u32, u32)> {
        self.last_upgrade
    }

    fn db(&self, partition: Partition) -> Database {
        self.partitions[partition.index()]
    }

    /// Begins a transaction on one partition.
    pub fn partition(&self, partition: Partition, mode: TxnMode) -> Result<PartitionTxn<'_>, AppResponse> {
        let db = self.db(partition);
        match mode {
            TxnMode::ReadOnly => Ok(PartitionTxn::read_only(partition, db, self.env.begin_ro_txn()?)),
            TxnMode::ReadWrite => Ok(PartitionTxn::read_write(partition, db, self.env.begin_rw_txn()?)),
        }
    }

    /// Moves an open transaction to another partition without committing.
    pub fn switch_partition<'env>(&'env self, txn: PartitionTxn<'env>, partition: Partition) -> PartitionTxn<'env> {
        txn.retarget(partition, self.db(partition))
    }

    /// Names of every named database except `meta`.
    pub fn partition_names(&self) -> Result<Vec<String>, AppResponse> {
        let root = self.env.open_db(None)?;
        let txn = self.env.begin_ro_txn()?;
        let mut names = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(root)?;
            for (key, _) in cursor.iter() {
                let name = String::from_utf8_lossy(key).into_owned();
                if name != META_DB {
                    names.push(name);
                }
            }
        }
        txn.abort();
        Ok(names)
    }

    pub fn clear_partition(&self, partition: Partition) -> Result<u64, AppResponse> {
        let mut txn = self.partition(partition, TxnMode::ReadWrite)?;
        let removed = txn.clear()?;
        txn.commit()?;
        info!("Cleared {removed} record(s) from '{partition}'");
        Ok(removed)
    }

    /// Clears all three partitions in one transaction. Returns the total removed.
    pub fn clear_all_records(&self) -> Result<u64, AppResponse> {
        let mut txn = self.partition(Partition::MainReviews, TxnMode::ReadWrite)?;
        let mut removed = txn.clear()?;
        for partition in [Partition::OfflineReviews, Partition::Favorites] {
            txn = self.switch_partition(txn, partition);
            removed += txn.clear()?;
        }
        txn.commit()?;
        info!("Cleared {removed} record(s) from all partitions");
        Ok(removed)
    }

    /// Flushes to disk. LMDB releases the environment on drop.
    pub fn close_database(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        info!("Store {} synced and ready to close", self.path.display());
        Ok(())
    }
}

fn read_version(env: &Environment, meta: Database) -> Result<u32, AppResponse> {
    let txn = env.begin_ro_txn()?;
    let version = match txn.get(meta, &VERSION_KEY) {
        Ok(bytes) => {
            let raw: [u8; 4] = bytes
                .try_into()
                .map_err(|_| AppResponse::DatabaseError("Malformed schema version".to_string()))?;
            u32::from_be_bytes(raw)
        }
        Err(lmdb::Error::NotFound) => 0,
        Err(e) => return Err(AppResponse::from(e)),
    };
    txn.abort();
    Ok(version)
}
