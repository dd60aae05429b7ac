//! Fixity records: one row per payload file plus one for the whole package.

use rusqlite::{params, Connection, Row};

use super::{now, Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct HashRow {
    pub id: i64,
    pub object_id: i64,
    pub item_id: u64,
    pub hash_type: String,
    pub hash_value: String,
    pub file_path: String,
    pub file_size: u64,
    pub is_package: bool,
    pub created_at: String,
    pub verification_date: Option<String>,
    pub verification_status: Option<String>,
}

impl HashRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            object_id: row.get("object_id")?,
            item_id: row.get("item_id")?,
            hash_type: row.get("hash_type")?,
            hash_value: row.get("hash_value")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            is_package: row.get("is_package")?,
            created_at: row.get("created_at")?,
            verification_date: row.get("verification_date")?,
            verification_status: row.get("verification_status")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewHashRow {
    pub hash_type: String,
    pub hash_value: String,
    pub file_path: String,
    pub file_size: u64,
    pub is_package: bool,
}

pub(crate) fn insert_on(
    conn: &Connection,
    object_id: i64,
    item_id: u64,
    hash: &NewHashRow,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hashes (object_id, item_id, hash_type, hash_value, file_path, file_size,
         is_package, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            object_id,
            item_id,
            hash.hash_type,
            hash.hash_value,
            hash.file_path,
            hash.file_size,
            hash.is_package,
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Hash records of an object, payload files first and the package record last.
pub fn list_by_object(db: &Database, object_id: i64) -> Result<Vec<HashRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM hashes WHERE object_id = ?1 ORDER BY is_package ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![object_id], HashRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Stamps the outcome of a fixity check on a hash record.
pub fn update_verification(db: &Database, id: i64, status: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE hashes SET verification_status = ?1, verification_date = ?2 WHERE id = ?3",
            params![status, now(), id],
        )?;
        Ok(())
    })
}
