//! Audit log repository.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub item_id: Option<u64>,
    pub collection_id: Option<u64>,
    pub batch_id: Option<String>,
    pub aip_id: Option<String>,
    pub created_at: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let context: Option<String> = row.get("context")?;
        Ok(Self {
            id: row.get("id")?,
            level: row.get("level")?,
            message: row.get("message")?,
            context: context.and_then(|s| serde_json::from_str(&s).ok()),
            item_id: row.get("item_id")?,
            collection_id: row.get("collection_id")?,
            batch_id: row.get("batch_id")?,
            aip_id: row.get("aip_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLogRow {
    pub level: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub item_id: Option<u64>,
    pub collection_id: Option<u64>,
    pub batch_id: Option<String>,
    pub aip_id: Option<String>,
    pub created_at: String,
}

/// Filter for querying audit entries.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: Option<String>,
    pub item_id: Option<u64>,
    pub collection_id: Option<u64>,
    pub batch_id: Option<String>,
    pub since: Option<String>,
    /// Substring match on the message.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub fn insert(db: &Database, entry: &NewLogRow) -> Result<i64, DatabaseError> {
    let context = entry
        .context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO logs (level, message, context, item_id, collection_id, batch_id,
             aip_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.level,
                entry.message,
                context,
                entry.item_id,
                entry.collection_id,
                entry.batch_id,
                entry.aip_id,
                entry.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Newest entries first. Returns the page and the total matching count.
pub fn query(db: &Database, filter: &LogFilter) -> Result<(Vec<LogRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref level) = filter.level {
            param_values.push(Box::new(level.clone()));
            conditions.push(format!("level = ?{}", param_values.len()));
        }
        if let Some(item_id) = filter.item_id {
            param_values.push(Box::new(item_id));
            conditions.push(format!("item_id = ?{}", param_values.len()));
        }
        if let Some(collection_id) = filter.collection_id {
            param_values.push(Box::new(collection_id));
            conditions.push(format!("collection_id = ?{}", param_values.len()));
        }
        if let Some(ref batch_id) = filter.batch_id {
            param_values.push(Box::new(batch_id.clone()));
            conditions.push(format!("batch_id = ?{}", param_values.len()));
        }
        if let Some(ref since) = filter.since {
            param_values.push(Box::new(since.clone()));
            conditions.push(format!("created_at >= ?{}", param_values.len()));
        }
        if let Some(ref search) = filter.search {
            param_values.push(Box::new(format!("%{}%", search)));
            conditions.push(format!("message LIKE ?{}", param_values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM logs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100);
        let offset = filter.offset.unwrap_or(0);
        let select_sql = format!(
            "SELECT * FROM logs {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );

        let mut stmt = conn.prepare(&select_sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), LogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Deletes entries created before `before`. Critical entries survive when
/// `keep_critical` is set.
pub fn cleanup(db: &Database, before: &str, keep_critical: bool) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let n = if keep_critical {
            conn.execute(
                "DELETE FROM logs WHERE created_at < ?1 AND level <> 'critical'",
                params![before],
            )?
        } else {
            conn.execute("DELETE FROM logs WHERE created_at < ?1", params![before])?
        };
        Ok(n)
    })
}
