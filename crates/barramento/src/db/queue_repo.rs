//! Work queue repository.
//!
//! Entries move `pending` -> `processing` and are deleted on success. A
//! failure sends the entry back to `pending` until `retries` reaches the
//! limit, then parks it as `failed`.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now, Database, DatabaseError};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_FAILED: &str = "failed";

/// Object statuses that make an item ineligible for a non-forced enqueue.
const PRESERVED_STATUSES: [&str; 2] = ["aip_stored", "fully_preserved"];
/// Submitted and still being tracked against the backend.
const IN_FLIGHT_STATUSES: [&str; 2] = ["transfer_started", "ingest_started"];

#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub id: i64,
    pub collection_id: u64,
    pub item_id: u64,
    pub status: String,
    pub priority: i64,
    pub retries: u32,
    pub batch_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl QueueRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            collection_id: row.get("collection_id")?,
            item_id: row.get("item_id")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            retries: row.get("retries")?,
            batch_id: row.get("batch_id")?,
            scheduled_date: row.get("scheduled_date")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub collection_id: u64,
    pub item_id: u64,
    pub priority: i64,
    pub batch_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub force: bool,
}

/// What `enqueue` did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    /// A forced enqueue reset an existing entry back to `pending`.
    Reset,
    /// Already pending, or claimed by a worker. A claimed entry is skipped
    /// even when forced.
    SkippedActive,
    /// The object is already stored in the archive.
    SkippedPreserved,
    /// The object's transfer or ingest is still running.
    SkippedInFlight,
    /// A failed entry exists; only a forced enqueue revives it.
    SkippedFailed,
}

impl EnqueueOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Inserted | Self::Reset)
    }
}

/// Adds an item to the queue, or decides why not, in one transaction.
pub fn enqueue(db: &Database, entry: &NewQueueEntry) -> Result<EnqueueOutcome, DatabaseError> {
    db.transaction(|conn| {
        let existing = find_by_item_on(conn, entry.item_id, entry.collection_id)?;

        if let Some(row) = &existing {
            if row.status == STATUS_PROCESSING {
                return Ok(EnqueueOutcome::SkippedActive);
            }
        }

        if !entry.force {
            if let Some(row) = &existing {
                return Ok(if row.status == STATUS_FAILED {
                    EnqueueOutcome::SkippedFailed
                } else {
                    EnqueueOutcome::SkippedActive
                });
            }

            let object_status: Option<String> = conn
                .query_row(
                    "SELECT preservation_status FROM objects WHERE item_id = ?1",
                    params![entry.item_id],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(status) = object_status {
                if PRESERVED_STATUSES.contains(&status.as_str()) {
                    return Ok(EnqueueOutcome::SkippedPreserved);
                }
                if IN_FLIGHT_STATUSES.contains(&status.as_str()) {
                    return Ok(EnqueueOutcome::SkippedInFlight);
                }
            }
        }

        let ts = now();
        match existing {
            Some(row) => {
                conn.execute(
                    "UPDATE queue SET status = 'pending', priority = ?1, retries = 0,
                     batch_id = ?2, scheduled_date = ?3, last_error = NULL, updated_at = ?4
                     WHERE id = ?5",
                    params![
                        entry.priority,
                        entry.batch_id,
                        entry.scheduled_date,
                        ts,
                        row.id
                    ],
                )?;
                Ok(EnqueueOutcome::Reset)
            }
            None => {
                conn.execute(
                    "INSERT INTO queue (collection_id, item_id, status, priority, batch_id,
                     scheduled_date, created_at, updated_at)
                     VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?6)",
                    params![
                        entry.collection_id,
                        entry.item_id,
                        entry.priority,
                        entry.batch_id,
                        entry.scheduled_date,
                        ts,
                    ],
                )?;
                Ok(EnqueueOutcome::Inserted)
            }
        }
    })
}

const DISPATCH_ORDER: &str = "SELECT * FROM queue
     WHERE status = 'pending' AND (scheduled_date IS NULL OR scheduled_date <= ?1)
     ORDER BY priority DESC, created_at ASC, id ASC LIMIT ?2";

/// Pending entries in dispatch order, without claiming them.
pub fn dequeue_batch(db: &Database, limit: usize) -> Result<Vec<QueueRow>, DatabaseError> {
    db.with_conn(|conn| select_due(conn, limit))
}

fn select_due(conn: &Connection, limit: usize) -> Result<Vec<QueueRow>, DatabaseError> {
    let mut stmt = conn.prepare(DISPATCH_ORDER)?;
    let rows = stmt
        .query_map(params![now(), limit as i64], QueueRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Selects up to `limit` due entries and marks them `processing` in one
/// transaction, so no two callers receive the same entry.
pub fn claim_next(db: &Database, limit: usize) -> Result<Vec<QueueRow>, DatabaseError> {
    db.transaction(|conn| {
        let rows = select_due(conn, limit)?;
        let ts = now();
        let mut claimed = Vec::with_capacity(rows.len());
        for mut row in rows {
            let n = conn.execute(
                "UPDATE queue SET status = 'processing', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![ts, row.id],
            )?;
            if n == 1 {
                row.status = STATUS_PROCESSING.to_string();
                row.updated_at = ts.clone();
                claimed.push(row);
            }
        }
        Ok(claimed)
    })
}

/// Claims a single entry. Returns `false` when it is no longer pending.
pub fn mark_processing(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "UPDATE queue SET status = 'processing', updated_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now(), id],
        )?;
        Ok(n == 1)
    })
}

/// Removes a finished entry. Returns `false` when the entry is no longer
/// claimed, for instance after stale recovery released it.
pub fn complete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "DELETE FROM queue WHERE id = ?1 AND status = 'processing'",
            params![id],
        )?;
        Ok(n == 1)
    })
}

/// Records a failed attempt on a claimed entry. Returns the row, whose
/// status is `failed` once `max_retries` attempts have been used. An entry
/// that is not `processing` is returned unchanged.
pub fn mark_failed(
    db: &Database,
    id: i64,
    error: &str,
    max_retries: u32,
) -> Result<Option<QueueRow>, DatabaseError> {
    db.transaction(|conn| {
        conn.execute(
            "UPDATE queue SET retries = retries + 1,
                status = CASE WHEN retries + 1 >= ?1 THEN 'failed' ELSE 'pending' END,
                last_error = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'processing'",
            params![max_retries, error, now(), id],
        )?;
        find_by_id_on(conn, id)
    })
}

/// Releases entries stuck in `processing` since before `before`. Each one
/// counts as a failed attempt, so an entry that keeps hanging ends up
/// `failed` like any other.
pub fn recover_stale(db: &Database, before: &str, max_retries: u32) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "UPDATE queue SET retries = retries + 1,
                status = CASE WHEN retries + 1 >= ?1 THEN 'failed' ELSE 'pending' END,
                last_error = 'processing timed out', updated_at = ?2
             WHERE status = 'processing' AND updated_at < ?3",
            params![max_retries, now(), before],
        )?;
        Ok(n)
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<QueueRow>, DatabaseError> {
    db.with_conn(|conn| find_by_id_on(conn, id))
}

fn find_by_id_on(conn: &Connection, id: i64) -> Result<Option<QueueRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM queue WHERE id = ?1",
            params![id],
            QueueRow::from_row,
        )
        .optional()?)
}

pub fn find_by_item(
    db: &Database,
    item_id: u64,
    collection_id: u64,
) -> Result<Option<QueueRow>, DatabaseError> {
    db.with_conn(|conn| find_by_item_on(conn, item_id, collection_id))
}

fn find_by_item_on(
    conn: &Connection,
    item_id: u64,
    collection_id: u64,
) -> Result<Option<QueueRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM queue WHERE item_id = ?1 AND collection_id = ?2",
            params![item_id, collection_id],
            QueueRow::from_row,
        )
        .optional()?)
}

/// Number of entries per status, optionally for one collection.
pub fn count_by_status(
    db: &Database,
    collection_id: Option<u64>,
) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM queue
             WHERE (?1 IS NULL OR collection_id = ?1)
             GROUP BY status ORDER BY status",
        )?;
        let rows = stmt
            .query_map(params![collection_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
