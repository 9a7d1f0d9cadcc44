//! Explicit page context for one restaurant page.
//!
//! The session owns the current [`RestaurantView`] and refreshes it from the
//! store after each confirmed write, instead of reloading the page.

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::connectivity::Connectivity;
use crate::favorite_flow::{self, FavoriteOutcome};
use crate::local_db_model::{Review, ReviewForm};
use crate::local_db_partition::Partition;
use crate::local_db_state::RestaurantDbState;
use crate::offline_sync::{FlushReport, OfflineSync};
use crate::remote_api::RemoteApi;
use crate::review_flow::{self, SubmitOutcome};

/// What the page shows for a restaurant, read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantView {
    pub restaurant_id: u64,
    pub reviews: Vec<Review>,
    pub pending_reviews: Vec<Review>,
    pub is_favorite: bool,
}

impl RestaurantView {
    pub fn load(db: &RestaurantDbState, restaurant_id: u64) -> Result<Self, AppResponse> {
        Ok(Self {
            restaurant_id,
            reviews: review_flow::reviews_for(db, Partition::MainReviews, restaurant_id)?,
            pending_reviews: review_flow::reviews_for(db, Partition::OfflineReviews, restaurant_id)?,
            is_favorite: favorite_flow::is_favorite(db, restaurant_id)?,
        })
    }
}

pub struct PageSession<'a, R: ?Sized, C: ?Sized> {
    db: &'a RestaurantDbState,
    remote: &'a R,
    network: &'a C,
    view: RestaurantView,
}

impl<'a, R, C> PageSession<'a, R, C>
where
    R: RemoteApi + ?Sized,
    C: Connectivity + ?Sized,
{
    pub fn load(
        db: &'a RestaurantDbState,
        remote: &'a R,
        network: &'a C,
        restaurant_id: u64,
    ) -> Result<Self, AppResponse> {
        let view = RestaurantView::load(db, restaurant_id)?;
        Ok(Self { db, remote, network, view })
    }

    pub fn restaurant_id(&self) -> u64 {
        self.view.restaurant_id
    }

    pub fn view(&self) -> &RestaurantView {
        &self.view
    }

    pub fn into_view(self) -> RestaurantView {
        self.view
    }

    pub fn refresh(&mut self) -> Result<&RestaurantView, AppResponse> {
        self.view = RestaurantView::load(self.db, self.view.restaurant_id)?;
        Ok(&self.view)
    }

    /// Validation failures leave the view untouched.
    pub fn submit_review(&mut self, form: ReviewForm) -> Result<SubmitOutcome, AppResponse> {
        let outcome = review_flow::submit_review(self.db, self.remote, self.network, self.restaurant_id(), form)?;
        self.refresh()?;
        Ok(outcome)
    }

    pub fn add_to_favorites(&mut self) -> Result<FavoriteOutcome, AppResponse> {
        let outcome = favorite_flow::add_to_favorites(self.db, self.remote, self.network, self.restaurant_id())?;
        if outcome == FavoriteOutcome::Marked {
            self.refresh()?;
        }
        Ok(outcome)
    }

    /// Replays the whole offline queue, not only this restaurant's reviews.
    pub fn sync_offline(&mut self, sync: &OfflineSync) -> Result<FlushReport, AppResponse> {
        let report = sync.flush(self.db, self.remote, self.network)?;
        if !report.replayed.is_empty() {
            self.refresh()?;
        }
        Ok(report)
    }
}
