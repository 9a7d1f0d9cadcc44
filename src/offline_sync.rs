//! FIFO replay of `offline-reviews` once the network is back.
//!
//! Each queued review is posted in key order. A review that still fails after
//! the retry policy is exhausted stops the replay, so later reviews never
//! overtake it. Successful entries move to `main-reviews` under their server
//! id and leave the queue in the same commit. Only one replay runs at a time
//! per [`OfflineSync`].

use std::sync::{Mutex, PoisonError};
use std::thread;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_config::RetryPolicy;
use crate::app_response::AppResponse;
use crate::connectivity::Connectivity;
use crate::local_db_model::{NewReview, PostedReview, Review};
use crate::local_db_partition::{Partition, TxnMode};
use crate::local_db_state::RestaurantDbState;
use crate::remote_api::RemoteApi;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Queue ids that were posted and moved, in replay order.
    pub replayed: Vec<u64>,
    /// Entries still queued after this flush.
    pub remaining: u64,
    pub last_error: Option<String>,
}

pub struct OfflineSync {
    policy: RetryPolicy,
    running: Mutex<()>,
}

impl OfflineSync {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            running: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn flush<R, C>(&self, db: &RestaurantDbState, remote: &R, network: &C) -> Result<FlushReport, AppResponse>
    where
        R: RemoteApi + ?Sized,
        C: Connectivity + ?Sized,
    {
        // Held until the last entry is committed; a concurrent flush then
        // reads the already drained queue.
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        let pending: Vec<(u64, Review)> = {
            let txn = db.partition(Partition::OfflineReviews, TxnMode::ReadOnly)?;
            let entries = txn.entries()?;
            txn.commit()?;
            entries
        };

        let mut report = FlushReport {
            remaining: pending.len() as u64,
            ..FlushReport::default()
        };

        if !network.is_online() {
            debug!("Offline: {} queued review(s) left for later", pending.len());
            return Ok(report);
        }
        if pending.is_empty() {
            return Ok(report);
        }

        info!("Replaying {} queued review(s)", pending.len());
        for (queue_id, queued) in pending {
            let body = NewReview::from(&queued);
            let posted = match self.post_with_retry(remote, &body) {
                Ok(posted) => posted,
                Err(e) => {
                    warn!("Replay stopped at queued review {queue_id}: {e}");
                    report.last_error = Some(e.to_string());
                    break;
                }
            };

            // The server has the review now; it must leave the queue even if
            // its timestamps are unreadable.
            let server_id = posted.id;
            let stored = match posted.into_review(&body) {
                Ok(review) => review,
                Err(e) => {
                    warn!("Queued review {queue_id} accepted as {server_id}, keeping local timestamps: {e}");
                    Review { id: server_id, ..queued }
                }
            };

            let mut txn = db.partition(Partition::MainReviews, TxnMode::ReadWrite)?;
            txn.put(stored.id, &stored)?;
            let mut txn = db.switch_partition(txn, Partition::OfflineReviews);
            txn.delete(queue_id)?;
            txn.commit()?;

            debug!("Queued review {queue_id} stored as review {}", stored.id);
            report.replayed.push(queue_id);
            report.remaining -= 1;
        }

        info!(
            "Replay finished: {} sent, {} still queued",
            report.replayed.len(),
            report.remaining
        );
        Ok(report)
    }

    fn post_with_retry<R: RemoteApi + ?Sized>(&self, remote: &R, body: &NewReview) -> Result<PostedReview, AppResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match remote.post_review(body) {
                Ok(posted) => return Ok(posted),
                Err(e) if !e.is_retryable() || attempt >= self.policy.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Replay attempt {attempt}/{} failed: {e}; retrying in {delay:?}",
                        self.policy.max_attempts
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}

impl Default for OfflineSync {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
