//! Preservation object repository: one row per repository item.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::hash_repo::{self, NewHashRow};
use super::{now, Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRow {
    pub id: i64,
    pub collection_id: u64,
    pub item_id: u64,
    pub preservation_status: String,
    pub transfer_status: Option<String>,
    pub ingest_status: Option<String>,
    pub sip_id: Option<String>,
    pub aip_id: Option<String>,
    pub dip_id: Option<String>,
    pub backend_transfer_ref: Option<String>,
    pub backend_sip_ref: Option<String>,
    pub status_message: Option<String>,
    pub sip_creation_date: Option<String>,
    pub aip_creation_date: Option<String>,
    pub last_status_update: Option<String>,
    pub archivematica_url: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: String,
}

impl ObjectRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            collection_id: row.get("collection_id")?,
            item_id: row.get("item_id")?,
            preservation_status: row.get("preservation_status")?,
            transfer_status: row.get("transfer_status")?,
            ingest_status: row.get("ingest_status")?,
            sip_id: row.get("sip_id")?,
            aip_id: row.get("aip_id")?,
            dip_id: row.get("dip_id")?,
            backend_transfer_ref: row.get("backend_transfer_ref")?,
            backend_sip_ref: row.get("backend_sip_ref")?,
            status_message: row.get("status_message")?,
            sip_creation_date: row.get("sip_creation_date")?,
            aip_creation_date: row.get("aip_creation_date")?,
            last_status_update: row.get("last_status_update")?,
            archivematica_url: row.get("archivematica_url")?,
            batch_id: row.get("batch_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields written when a package has been built for an item.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub item_id: u64,
    pub collection_id: u64,
    pub sip_id: String,
    pub batch_id: Option<String>,
}

/// A status change plus the optional fields that travel with it.
///
/// `None` leaves a column untouched. `sip_id` is only written when the
/// object has none yet; `aip_id` also stamps `aip_creation_date`.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub status: String,
    pub transfer_status: Option<String>,
    pub ingest_status: Option<String>,
    pub sip_id: Option<String>,
    pub aip_id: Option<String>,
    pub dip_id: Option<String>,
    pub archivematica_url: Option<String>,
    pub batch_id: Option<String>,
    pub backend_transfer_ref: Option<String>,
    pub backend_sip_ref: Option<String>,
    pub status_message: Option<String>,
}

impl StatusChange {
    pub fn to(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The row was updated; carries the status it had before.
    Applied { old_status: String },
    /// A new row was inserted.
    Inserted,
    /// The row's current status did not match the expected one.
    Conflict { current: String },
    /// No row for the item and no collection to create one with.
    Missing,
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<ObjectRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM objects WHERE id = ?1",
                params![id],
                ObjectRow::from_row,
            )
            .optional()?)
    })
}

pub fn find_by_item(db: &Database, item_id: u64) -> Result<Option<ObjectRow>, DatabaseError> {
    db.with_conn(|conn| find_by_item_on(conn, item_id))
}

fn find_by_item_on(conn: &Connection, item_id: u64) -> Result<Option<ObjectRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM objects WHERE item_id = ?1",
            params![item_id],
            ObjectRow::from_row,
        )
        .optional()?)
}

/// Creates or resets the object for a freshly built package and replaces
/// its hash records, in one transaction. Returns the object id.
pub fn record_package(
    db: &Database,
    record: &PackageRecord,
    hashes: &[NewHashRow],
) -> Result<i64, DatabaseError> {
    db.transaction(|conn| {
        let ts = now();
        conn.execute(
            "INSERT INTO objects (collection_id, item_id, preservation_status, sip_id, batch_id,
             sip_creation_date, last_status_update, created_at)
             VALUES (?1, ?2, 'sip_created', ?3, ?4, ?5, ?5, ?5)
             ON CONFLICT(item_id) DO UPDATE SET
                collection_id = excluded.collection_id,
                preservation_status = 'sip_created',
                sip_id = excluded.sip_id,
                batch_id = COALESCE(excluded.batch_id, objects.batch_id),
                sip_creation_date = excluded.sip_creation_date,
                last_status_update = excluded.last_status_update,
                transfer_status = NULL,
                ingest_status = NULL,
                backend_transfer_ref = NULL,
                backend_sip_ref = NULL,
                status_message = NULL",
            params![
                record.collection_id,
                record.item_id,
                record.sip_id,
                record.batch_id,
                ts,
            ],
        )?;

        let object_id: i64 = conn.query_row(
            "SELECT id FROM objects WHERE item_id = ?1",
            params![record.item_id],
            |r| r.get(0),
        )?;

        conn.execute("DELETE FROM hashes WHERE object_id = ?1", params![object_id])?;
        for hash in hashes {
            hash_repo::insert_on(conn, object_id, record.item_id, hash, &ts)?;
        }

        Ok(object_id)
    })
}

/// Applies a status change to the object for `item_id`.
///
/// When `expected` is given the update only happens if the stored status
/// still equals it, which keeps concurrent pollers from regressing an
/// object another caller already advanced. When no row exists and a
/// `collection_id` is given, a new row is inserted.
pub fn update_status(
    db: &Database,
    item_id: u64,
    collection_id: Option<u64>,
    expected: Option<&str>,
    change: &StatusChange,
) -> Result<StatusOutcome, DatabaseError> {
    db.transaction(|conn| {
        let ts = now();
        let existing = find_by_item_on(conn, item_id)?;

        let Some(existing) = existing else {
            let Some(collection_id) = collection_id else {
                return Ok(StatusOutcome::Missing);
            };
            insert_with_status(conn, item_id, collection_id, change, &ts)?;
            return Ok(StatusOutcome::Inserted);
        };

        if let Some(expected) = expected {
            if existing.preservation_status != expected {
                return Ok(StatusOutcome::Conflict {
                    current: existing.preservation_status,
                });
            }
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut push = |column: &str, value: Box<dyn rusqlite::types::ToSql>| {
            values.push(value);
            sets.push(format!("{} = ?{}", column, values.len()));
        };

        push("preservation_status", Box::new(change.status.clone()));
        push("last_status_update", Box::new(ts.clone()));
        if let Some(v) = &change.transfer_status {
            push("transfer_status", Box::new(v.clone()));
        }
        if let Some(v) = &change.ingest_status {
            push("ingest_status", Box::new(v.clone()));
        }
        if let Some(v) = &change.sip_id {
            if existing.sip_id.as_deref().unwrap_or("").is_empty() {
                push("sip_id", Box::new(v.clone()));
            }
        }
        if let Some(v) = &change.aip_id {
            push("aip_id", Box::new(v.clone()));
            push("aip_creation_date", Box::new(ts.clone()));
        }
        if let Some(v) = &change.dip_id {
            push("dip_id", Box::new(v.clone()));
        }
        if let Some(v) = &change.archivematica_url {
            push("archivematica_url", Box::new(v.clone()));
        }
        if let Some(v) = &change.batch_id {
            push("batch_id", Box::new(v.clone()));
        }
        if let Some(v) = &change.backend_transfer_ref {
            push("backend_transfer_ref", Box::new(v.clone()));
        }
        if let Some(v) = &change.backend_sip_ref {
            push("backend_sip_ref", Box::new(v.clone()));
        }
        if let Some(v) = &change.status_message {
            push("status_message", Box::new(v.clone()));
        }

        values.push(Box::new(existing.id));
        let sql = format!(
            "UPDATE objects SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_ref.as_slice())?;

        Ok(StatusOutcome::Applied {
            old_status: existing.preservation_status,
        })
    })
}

fn insert_with_status(
    conn: &Connection,
    item_id: u64,
    collection_id: u64,
    change: &StatusChange,
    ts: &str,
) -> Result<(), DatabaseError> {
    let aip_creation_date = change.aip_id.as_ref().map(|_| ts.to_string());
    conn.execute(
        "INSERT INTO objects (collection_id, item_id, preservation_status, transfer_status,
         ingest_status, sip_id, aip_id, dip_id, archivematica_url, batch_id,
         backend_transfer_ref, backend_sip_ref, status_message, aip_creation_date,
         last_status_update, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            collection_id,
            item_id,
            change.status,
            change.transfer_status,
            change.ingest_status,
            change.sip_id,
            change.aip_id,
            change.dip_id,
            change.archivematica_url,
            change.batch_id,
            change.backend_transfer_ref,
            change.backend_sip_ref,
            change.status_message,
            aip_creation_date,
            ts,
        ],
    )?;
    Ok(())
}

/// Objects in any of `statuses`, least recently updated first.
pub fn list_by_status(
    db: &Database,
    statuses: &[&str],
    limit: usize,
) -> Result<Vec<ObjectRow>, DatabaseError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    db.with_conn(|conn| {
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT * FROM objects WHERE preservation_status IN ({})
             ORDER BY last_status_update ASC, id ASC LIMIT ?{}",
            placeholders.join(", "),
            statuses.len() + 1
        );
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = statuses
            .iter()
            .map(|s| Box::new(s.to_string()) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        values.push(Box::new(limit as i64));
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), ObjectRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of objects per preservation status, optionally for one collection.
pub fn count_by_status(
    db: &Database,
    collection_id: Option<u64>,
) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT preservation_status, COUNT(*) FROM objects
             WHERE (?1 IS NULL OR collection_id = ?1)
             GROUP BY preservation_status ORDER BY preservation_status",
        )?;
        let rows = stmt
            .query_map(params![collection_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute("DELETE FROM objects WHERE id = ?1", params![id])?;
        Ok(n > 0)
    })
}
