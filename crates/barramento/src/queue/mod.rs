//! Work queue of items waiting to be packaged and submitted.
//!
//! One row per (item, collection). Entries are claimed atomically, deleted
//! when processed, and retried on later passes until the retry budget is
//! spent, after which they stay `failed` until a forced enqueue.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::db::queue_repo::{self, EnqueueOutcome, NewQueueEntry, QueueRow};
use crate::db::{format_timestamp, Database, DatabaseError};

#[derive(Clone)]
pub struct QueueManager {
    db: Database,
    max_retries: u32,
}

impl QueueManager {
    pub fn new(db: Database, max_retries: u32) -> Self {
        Self {
            db,
            max_retries: max_retries.max(1),
        }
    }

    pub fn new_batch_id() -> String {
        format!("batch-{}", Uuid::new_v4().simple())
    }

    /// Queues an item. Returns `false` when a worker currently holds the
    /// entry, or when `force` is not set and the item is queued, submitted,
    /// preserved or failed for good.
    pub fn enqueue(
        &self,
        item_id: u64,
        collection_id: u64,
        batch_id: Option<&str>,
        force: bool,
    ) -> Result<bool, DatabaseError> {
        let outcome = self.enqueue_entry(&NewQueueEntry {
            collection_id,
            item_id,
            priority: 0,
            batch_id: batch_id.map(str::to_string),
            scheduled_date: None,
            force,
        })?;
        Ok(outcome.is_added())
    }

    pub fn enqueue_entry(&self, entry: &NewQueueEntry) -> Result<EnqueueOutcome, DatabaseError> {
        let outcome = queue_repo::enqueue(&self.db, entry)?;
        log::debug!(
            "Enqueue item {} (collection {}): {:?}",
            entry.item_id,
            entry.collection_id,
            outcome
        );
        Ok(outcome)
    }

    /// Due pending entries in dispatch order, without claiming them.
    pub fn dequeue_batch(&self, limit: usize) -> Result<Vec<QueueRow>, DatabaseError> {
        queue_repo::dequeue_batch(&self.db, limit)
    }

    /// Claims up to `limit` due entries for processing.
    pub fn claim_batch(&self, limit: usize) -> Result<Vec<QueueRow>, DatabaseError> {
        queue_repo::claim_next(&self.db, limit)
    }

    pub fn mark_processing(&self, entry_id: i64) -> Result<bool, DatabaseError> {
        queue_repo::mark_processing(&self.db, entry_id)
    }

    /// Deletes a claimed entry. `false` when it was no longer claimed.
    pub fn complete(&self, entry_id: i64) -> Result<bool, DatabaseError> {
        queue_repo::complete(&self.db, entry_id)
    }

    /// Counts a failed attempt. The returned row tells whether the entry
    /// went back to `pending` or is now `failed`.
    pub fn mark_failed(&self, entry_id: i64, error: &str) -> Result<Option<QueueRow>, DatabaseError> {
        let row = queue_repo::mark_failed(&self.db, entry_id, error, self.max_retries)?;
        if let Some(row) = &row {
            if row.status == queue_repo::STATUS_FAILED {
                log::warn!(
                    "Queue entry {} (item {}) failed after {} attempts: {}",
                    row.id,
                    row.item_id,
                    row.retries,
                    error
                );
            }
        }
        Ok(row)
    }

    /// Releases entries that have been `processing` for longer than
    /// `threshold`.
    pub fn recover_stale(&self, threshold: Duration) -> Result<usize, DatabaseError> {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(threshold)
            .map(format_timestamp)
            .unwrap_or_default();
        let recovered = queue_repo::recover_stale(&self.db, &cutoff, self.max_retries)?;
        if recovered > 0 {
            log::warn!("Released {} stale queue entries", recovered);
        }
        Ok(recovered)
    }

    pub fn find(&self, item_id: u64, collection_id: u64) -> Result<Option<QueueRow>, DatabaseError> {
        queue_repo::find_by_item(&self.db, item_id, collection_id)
    }

    pub fn counts(&self, collection_id: Option<u64>) -> Result<Vec<(String, u64)>, DatabaseError> {
        queue_repo::count_by_status(&self.db, collection_id)
    }
}
