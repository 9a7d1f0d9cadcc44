//! Review submission: post online, queue offline.

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::connectivity::Connectivity;
use crate::local_db_model::{NewReview, Review, ReviewForm};
use crate::local_db_partition::{Partition, TxnMode};
use crate::local_db_state::RestaurantDbState;
use crate::remote_api::RemoteApi;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "review", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Accepted by the server and mirrored into `main-reviews`.
    Posted(Review),
    /// Stored in `offline-reviews` awaiting replay.
    Queued(Review),
}

impl SubmitOutcome {
    pub fn review(&self) -> &Review {
        match self {
            SubmitOutcome::Posted(review) | SubmitOutcome::Queued(review) => review,
        }
    }
}

pub fn submit_review<R, C>(
    db: &RestaurantDbState,
    remote: &R,
    network: &C,
    restaurant_id: u64,
    form: ReviewForm,
) -> Result<SubmitOutcome, AppResponse>
where
    R: RemoteApi + ?Sized,
    C: Connectivity + ?Sized,
{
    form.validate()?;
    let review = form.into_new_review(restaurant_id);

    if network.is_online() {
        post_and_mirror(db, remote, &review).map(SubmitOutcome::Posted)
    } else {
        queue_offline(db, &review).map(SubmitOutcome::Queued)
    }
}

/// Posts a review and writes the server's version into `main-reviews`.
///
/// On failure nothing is stored and the review is not queued.
pub fn post_and_mirror<R: RemoteApi + ?Sized>(
    db: &RestaurantDbState,
    remote: &R,
    review: &NewReview,
) -> Result<Review, AppResponse> {
    let posted = remote.post_review(review).map_err(|e| {
        warn!("Error on the review POST for restaurant {}: {e}", review.restaurant_id);
        e
    })?;
    let stored = posted.into_review(review)?;

    let mut txn = db.partition(Partition::MainReviews, TxnMode::ReadWrite)?;
    txn.put(stored.id, &stored)?;
    txn.commit()?;

    info!("Review {} posted for restaurant {}", stored.id, stored.restaurant_id);
    Ok(stored)
}

/// Appends a review to `offline-reviews`.
///
/// The id is picked and written inside one write transaction, so concurrent
/// submitters never share an id.
pub fn queue_offline(db: &RestaurantDbState, review: &NewReview) -> Result<Review, AppResponse> {
    let mut txn = db.partition(Partition::OfflineReviews, TxnMode::ReadWrite)?;

    let keys = txn.keys()?;
    let count = keys.len() as u64;
    // count == last + 1 while keys are dense; after a partial replay the
    // surviving tail would otherwise be overwritten.
    let id = match keys.last() {
        Some(&last) => count.max(last + 1),
        None => count,
    };

    let now = Utc::now();
    let queued = Review {
        id,
        restaurant_id: review.restaurant_id,
        name: review.name.clone(),
        rating: review.rating.clone(),
        comments: review.comments.clone(),
        created_at: now,
        updated_at: now,
    };
    txn.put(id, &queued)?;
    txn.commit()?;

    info!("Offline: queued review {id} for restaurant {}", review.restaurant_id);
    Ok(queued)
}

/// Reviews of one restaurant stored in `partition`, in key order.
pub fn reviews_for(
    db: &RestaurantDbState,
    partition: Partition,
    restaurant_id: u64,
) -> Result<Vec<Review>, AppResponse> {
    let txn = db.partition(partition, TxnMode::ReadOnly)?;
    let reviews: Vec<Review> = txn.values()?;
    txn.commit()?;
    Ok(reviews
        .into_iter()
        .filter(|r| r.restaurant_id == restaurant_id)
        .collect())
}
