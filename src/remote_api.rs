//! The remote reviews/favorites API.

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::app_config::AppConfig;
use crate::app_response::AppResponse;
use crate::local_db_model::{NewReview, PostedReview};

pub trait RemoteApi {
    /// `POST <reviews_url>` with the review; returns the server-assigned fields.
    fn post_review(&self, review: &NewReview) -> Result<PostedReview, AppResponse>;

    /// `PUT` the favorite status of a restaurant. The body is ignored.
    fn put_favorite(&self, restaurant_id: u64) -> Result<(), AppResponse>;
}

impl<R: RemoteApi + ?Sized> RemoteApi for &R {
    fn post_review(&self, review: &NewReview) -> Result<PostedReview, AppResponse> {
        (**self).post_review(review)
    }

    fn put_favorite(&self, restaurant_id: u64) -> Result<(), AppResponse> {
        (**self).put_favorite(restaurant_id)
    }
}

/// [`RemoteApi`] over HTTP.
pub struct HttpRemoteApi {
    client: Client,
    config: AppConfig,
}

impl HttpRemoteApi {
    pub fn new(config: AppConfig) -> Result<Self, AppResponse> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }
}

pub(crate) fn build_client(config: &AppConfig) -> Result<Client, AppResponse> {
    Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("restaurant-offline-core/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppResponse::NetworkError(format!("Cannot build HTTP client: {e}")))
}

impl RemoteApi for HttpRemoteApi {
    fn post_review(&self, review: &NewReview) -> Result<PostedReview, AppResponse> {
        let url = &self.config.reviews_url;
        debug!("POST {url} for restaurant {}", review.restaurant_id);

        let response = self
            .client
            .post(url)
            .json(review)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Review POST to {url} failed: {e}");
                AppResponse::from(e)
            })?;

        Ok(response.json::<PostedReview>()?)
    }

    fn put_favorite(&self, restaurant_id: u64) -> Result<(), AppResponse> {
        let url = self.config.favorite_url(restaurant_id);
        debug!("PUT {url}");

        self.client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Favorite PUT to {url} failed: {e}");
                AppResponse::from(e)
            })?;
        Ok(())
    }
}
