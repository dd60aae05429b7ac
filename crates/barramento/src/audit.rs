//! Audit log: persisted log entries mirrored as `tracing` events.

use std::fmt;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::db::log_repo::{self, LogFilter, LogRow, NewLogRow};
use crate::db::{format_timestamp, now, Database, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Unknown names fall back to `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            "critical" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AuditLog {
    db: Database,
    debug_mode: bool,
}

impl AuditLog {
    pub fn new(db: Database, debug_mode: bool) -> Self {
        Self { db, debug_mode }
    }

    /// Records one entry. `item_id`, `collection_id`, `batch_id` and
    /// `aip_id` found in `context` also go into their own columns.
    ///
    /// Never fails: a row that cannot be stored is reported through
    /// `tracing` instead.
    pub fn log(&self, level: LogLevel, message: &str, context: Value) {
        if level == LogLevel::Debug && !self.debug_mode {
            return;
        }

        emit(level, message, &context);

        let item_id = context.get("item_id").and_then(Value::as_u64);
        let collection_id = context.get("collection_id").and_then(Value::as_u64);
        let batch_id = string_field(&context, "batch_id");
        let aip_id = string_field(&context, "aip_id");
        let context = match context {
            Value::Null => None,
            Value::Object(ref map) if map.is_empty() => None,
            other => Some(other),
        };

        let entry = NewLogRow {
            level: level.as_str().to_string(),
            message: message.to_string(),
            context,
            item_id,
            collection_id,
            batch_id,
            aip_id,
            created_at: now(),
        };

        if let Err(e) = log_repo::insert(&self.db, &entry) {
            tracing::error!(error = %e, entry = message, "Failed to store audit entry");
        }
    }

    pub fn debug(&self, message: &str, context: Value) {
        self.log(LogLevel::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: Value) {
        self.log(LogLevel::Info, message, context);
    }

    pub fn warning(&self, message: &str, context: Value) {
        self.log(LogLevel::Warning, message, context);
    }

    pub fn error(&self, message: &str, context: Value) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn critical(&self, message: &str, context: Value) {
        self.log(LogLevel::Critical, message, context);
    }

    /// Deletes entries older than `days`. Returns how many were removed.
    pub fn cleanup_logs(&self, days: u32, keep_critical: bool) -> Result<usize, DatabaseError> {
        let cutoff = format_timestamp(Utc::now() - chrono::Duration::days(i64::from(days)));
        let deleted = log_repo::cleanup(&self.db, &cutoff, keep_critical)?;
        log::info!("Removed {} audit entries older than {} days", deleted, days);
        Ok(deleted)
    }

    pub fn query(&self, filter: &LogFilter) -> Result<(Vec<LogRow>, u64), DatabaseError> {
        log_repo::query(&self.db, filter)
    }
}

fn string_field(context: &Value, key: &str) -> Option<String> {
    match context.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn emit(level: LogLevel, message: &str, context: &Value) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "barramento::audit", %context, "{}", message),
        LogLevel::Info => tracing::info!(target: "barramento::audit", %context, "{}", message),
        LogLevel::Warning => tracing::warn!(target: "barramento::audit", %context, "{}", message),
        LogLevel::Error => tracing::error!(target: "barramento::audit", %context, "{}", message),
        LogLevel::Critical => {
            tracing::error!(target: "barramento::audit", critical = true, %context, "{}", message)
        }
    }
}
