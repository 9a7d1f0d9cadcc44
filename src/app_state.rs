//! Long-lived state behind the FFI handles.

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::app_config::AppConfig;
use crate::app_response::AppResponse;
use crate::asset_cache::{AssetCache, AssetResponse, HttpAssetFetcher};
use crate::connectivity::NetworkStatus;
use crate::favorite_flow::FavoriteOutcome;
use crate::local_db_model::ReviewForm;
use crate::local_db_state::RestaurantDbState;
use crate::offline_sync::{FlushReport, OfflineSync};
use crate::page_session::{PageSession, RestaurantView};
use crate::remote_api::HttpRemoteApi;
use crate::review_flow::SubmitOutcome;

/// Review form as sent by the UI shell.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitReviewRequest {
    pub restaurant_id: u64,
    #[serde(flatten)]
    pub form: ReviewForm,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitReviewReply {
    pub outcome: SubmitOutcome,
    pub view: RestaurantView,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteReply {
    pub outcome: FavoriteOutcome,
    pub view: RestaurantView,
}

/// Store, remote API and connectivity flag for one page host.
pub struct RestaurantApp {
    pub config: AppConfig,
    pub db: RestaurantDbState,
    pub remote: HttpRemoteApi,
    pub network: NetworkStatus,
    pub sync: OfflineSync,
}

impl RestaurantApp {
    pub fn init(config: AppConfig) -> Result<Self, AppResponse> {
        config.validate()?;
        let db = RestaurantDbState::open_with_map_size(&config.db_name, config.schema_version, config.map_size())?;
        let remote = HttpRemoteApi::new(config.clone())?;
        let sync = OfflineSync::new(config.retry);
        info!("Restaurant app ready on store '{}'", config.db_name);
        Ok(Self {
            config,
            db,
            remote,
            network: NetworkStatus::default(),
            sync,
        })
    }

    fn session(&self, restaurant_id: u64) -> Result<PageSession<'_, HttpRemoteApi, NetworkStatus>, AppResponse> {
        PageSession::load(&self.db, &self.remote, &self.network, restaurant_id)
    }

    pub fn view(&self, restaurant_id: u64) -> Result<RestaurantView, AppResponse> {
        Ok(self.session(restaurant_id)?.into_view())
    }

    pub fn submit_review(&self, request: SubmitReviewRequest) -> Result<SubmitReviewReply, AppResponse> {
        let mut session = self.session(request.restaurant_id)?;
        let outcome = session.submit_review(request.form)?;
        Ok(SubmitReviewReply {
            outcome,
            view: session.into_view(),
        })
    }

    pub fn add_to_favorites(&self, restaurant_id: u64) -> Result<FavoriteReply, AppResponse> {
        let mut session = self.session(restaurant_id)?;
        let outcome = session.add_to_favorites()?;
        Ok(FavoriteReply {
            outcome,
            view: session.into_view(),
        })
    }

    pub fn flush_offline(&self) -> Result<FlushReport, AppResponse> {
        self.sync.flush(&self.db, &self.remote, &self.network)
    }
}

/// The asset cache together with the manifest and fetcher it installs from.
pub struct AssetWorker {
    pub cache: AssetCache,
    pub fetcher: HttpAssetFetcher,
    pub manifest: Vec<String>,
}

impl AssetWorker {
    pub fn init(dir: PathBuf, config: &AppConfig) -> Result<Self, AppResponse> {
        config.validate()?;
        Ok(Self {
            cache: AssetCache::open(dir, &config.cache_bucket)?,
            fetcher: HttpAssetFetcher::new(config)?,
            manifest: config.asset_manifest.clone(),
        })
    }

    pub fn install(&mut self) -> Result<usize, AppResponse> {
        self.cache.install(&self.manifest, &self.fetcher)
    }

    pub fn respond(&self, path: &str) -> Result<AssetResponse, AppResponse> {
        self.cache.respond(path, &self.fetcher)
    }
}
