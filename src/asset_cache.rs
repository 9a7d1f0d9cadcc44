//! Install-once, cache-first static asset cache.
//!
//! A bucket is an LMDB environment `<dir>/<bucket>.lmdb` holding the cached
//! responses and an install marker. Install is all-or-nothing: every manifest
//! path is fetched before anything is written. Once active, manifest paths are
//! served from the bucket and everything else goes to the network without
//! being stored.

use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::app_config::AppConfig;
use crate::app_response::AppResponse;
use crate::local_db_state::open_environment;
use crate::remote_api::build_client;

const ENTRIES_DB: &str = "entries";
const STATE_DB: &str = "state";
const INSTALLED_KEY: &[u8] = b"installed";
const CACHE_MAP_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Installing,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
    pub path: String,
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(with = "body_serde")]
    pub body: Vec<u8>,
}

mod body_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(body: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(body).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub source: AssetSource,
    pub asset: CachedAsset,
}

/// Where responses come from when the cache misses.
pub trait AssetFetcher {
    fn fetch(&self, path: &str) -> Result<CachedAsset, AppResponse>;
}

impl<F: AssetFetcher + ?Sized> AssetFetcher for &F {
    fn fetch(&self, path: &str) -> Result<CachedAsset, AppResponse> {
        (**self).fetch(path)
    }
}

/// Fetches `<base_url><path>` over HTTP.
pub struct HttpAssetFetcher {
    client: Client,
    base_url: String,
}

impl HttpAssetFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, AppResponse> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.asset_base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(&self, path: &str) -> Result<CachedAsset, AppResponse> {
        let path = normalize_path(path);
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");

        let response = self.client.get(&url).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();

        Ok(CachedAsset {
            path,
            status,
            content_type,
            body,
        })
    }
}

/// Cache keys always start with `/`, so `dist/js/all.js` and
/// `/dist/js/all.js` name the same entry.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub struct AssetCache {
    env: Environment,
    entries: Database,
    meta: Database,
    bucket: String,
    dir: PathBuf,
    state: CacheState,
}

impl AssetCache {
    /// Opens bucket `bucket` under `dir`; `Active` if a previous install finished.
    pub fn open(dir: impl AsRef<Path>, bucket: &str) -> Result<Self, AppResponse> {
        if bucket.trim().is_empty() {
            return Err(AppResponse::BadRequest("Cache bucket name must not be empty".to_string()));
        }
        let dir = dir.as_ref().join(format!("{bucket}.lmdb"));
        let env = open_environment(&dir, CACHE_MAP_SIZE, 2)?;
        let entries = env.create_db(Some(ENTRIES_DB), DatabaseFlags::empty())?;
        let meta = env.create_db(Some(STATE_DB), DatabaseFlags::empty())?;

        let installed = {
            let txn = env.begin_ro_txn()?;
            let found = match txn.get(meta, &INSTALLED_KEY) {
                Ok(_) => true,
                Err(lmdb::Error::NotFound) => false,
                Err(e) => return Err(AppResponse::from(e)),
            };
            txn.abort();
            found
        };
        let state = if installed { CacheState::Active } else { CacheState::Installing };
        info!("Asset cache '{bucket}' opened ({state:?})");

        Ok(Self {
            env,
            entries,
            meta,
            bucket: bucket.to_string(),
            dir,
            state,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Populates the bucket with every manifest path, or with nothing.
    ///
    /// Reinstalling an active bucket is a no-op; ship a new manifest under a
    /// new bucket name.
    pub fn install<F: AssetFetcher + ?Sized>(&mut self, manifest: &[String], fetcher: &F) -> Result<usize, AppResponse> {
        if self.state == CacheState::Active {
            debug!("Asset cache '{}' already installed", self.bucket);
            return Ok(0);
        }

        let mut fetched = Vec::with_capacity(manifest.len());
        for path in manifest {
            let asset = fetcher.fetch(path).map_err(|e| {
                warn!("Install of '{}' failed on {path}: {e}", self.bucket);
                e
            })?;
            if !(200..300).contains(&asset.status) {
                warn!("Install of '{}' failed: {path} answered {}", self.bucket, asset.status);
                return Err(AppResponse::NetworkError(format!(
                    "Manifest fetch for {path} returned status {}",
                    asset.status
                )));
            }
            fetched.push(CachedAsset {
                path: normalize_path(path),
                ..asset
            });
        }

        let mut txn = self.env.begin_rw_txn()?;
        for asset in &fetched {
            let json = serde_json::to_vec(asset)?;
            txn.put(self.entries, &asset.path, &json, WriteFlags::empty())?;
        }
        txn.put(self.meta, &INSTALLED_KEY, &(fetched.len() as u64).to_be_bytes(), WriteFlags::empty())?;
        txn.commit()?;

        self.state = CacheState::Active;
        info!("Asset cache '{}' installed with {} entries", self.bucket, fetched.len());
        Ok(fetched.len())
    }

    /// Exact-match lookup, without consulting the network.
    pub fn lookup(&self, path: &str) -> Result<Option<CachedAsset>, AppResponse> {
        let key = normalize_path(path);
        let txn = self.env.begin_ro_txn()?;
        let asset = match txn.get(self.entries, &key) {
            Ok(bytes) => Some(serde_json::from_slice(bytes)?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(AppResponse::from(e)),
        };
        txn.abort();
        Ok(asset)
    }

    /// Serves `path` from the cache when active and present, else from `fetcher`.
    ///
    /// Network responses are returned as-is and never stored.
    pub fn respond<F: AssetFetcher + ?Sized>(&self, path: &str, fetcher: &F) -> Result<AssetResponse, AppResponse> {
        if self.state == CacheState::Active {
            if let Some(asset) = self.lookup(path)? {
                return Ok(AssetResponse {
                    source: AssetSource::Cache,
                    asset,
                });
            }
        }

        let asset = fetcher.fetch(path)?;
        Ok(AssetResponse {
            source: AssetSource::Network,
            asset,
        })
    }

    pub fn len(&self) -> Result<usize, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let count = {
            let mut cursor = txn.open_ro_cursor(self.entries)?;
            cursor.iter().count()
        };
        txn.abort();
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, AppResponse> {
        Ok(self.len()? == 0)
    }
}
