use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::connectivity::Connectivity;
use crate::local_db_model::FavoriteMarker;
use crate::local_db_partition::{Partition, TxnMode};
use crate::local_db_state::RestaurantDbState;
use crate::remote_api::RemoteApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteOutcome {
    Marked,
    /// Offline: nothing was sent and nothing was written.
    SkippedOffline,
}

/// Marks a restaurant as favorite on the server, then locally.
pub fn add_to_favorites<R, C>(
    db: &RestaurantDbState,
    remote: &R,
    network: &C,
    restaurant_id: u64,
) -> Result<FavoriteOutcome, AppResponse>
where
    R: RemoteApi + ?Sized,
    C: Connectivity + ?Sized,
{
    if !network.is_online() {
        debug!("Offline: favorite for restaurant {restaurant_id} skipped");
        return Ok(FavoriteOutcome::SkippedOffline);
    }

    remote.put_favorite(restaurant_id).map_err(|e| {
        warn!("Error on the favorite PUT for restaurant {restaurant_id}: {e}");
        e
    })?;

    let mut txn = db.partition(Partition::Favorites, TxnMode::ReadWrite)?;
    txn.put(restaurant_id, &FavoriteMarker { id: restaurant_id })?;
    txn.commit()?;

    info!("Restaurant {restaurant_id} added to favorites");
    Ok(FavoriteOutcome::Marked)
}

pub fn is_favorite(db: &RestaurantDbState, restaurant_id: u64) -> Result<bool, AppResponse> {
    let txn = db.partition(Partition::Favorites, TxnMode::ReadOnly)?;
    let found = txn.contains(restaurant_id)?;
    txn.commit()?;
    Ok(found)
}
