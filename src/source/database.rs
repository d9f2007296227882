//! DuckDB page source
//!
//! Pages a SQL query with `LIMIT`/`OFFSET`. Each fetch runs on its own
//! cloned connection so concurrent workers never wait on each other's
//! queries.

use crate::error::{Error, Result};
use crate::pagination::{CountSupplier, PageFetcher};
use crate::types::{pages_for, JsonObject, JsonValue, PageRequest, PageResult};
use duckdb::Connection;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Configuration for a DuckDB page source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuckDbSourceConfig {
    /// Database file; in-memory when unset
    #[serde(default)]
    pub database: Option<String>,
    /// SQL statements run once when the source opens
    #[serde(default)]
    pub setup: Option<String>,
    /// Query to page over; needs a stable `ORDER BY` for deterministic pages
    pub query: String,
}

/// Page source over a DuckDB query
pub struct DuckDbSource {
    conn: Mutex<Connection>,
    query: String,
    count: OnceCell<u64>,
}

impl DuckDbSource {
    /// Open the configured database and run its setup statements
    pub fn open(config: &DuckDbSourceConfig) -> Result<Self> {
        let conn = match config.database.as_deref() {
            None | Some(":memory:") => Connection::open_in_memory(),
            Some(path) => Connection::open(path),
        }
        .map_err(|e| Error::database(format!("Failed to open DuckDB: {e}")))?;

        if let Some(ref setup) = config.setup {
            conn.execute_batch(setup)
                .map_err(|e| Error::database(format!("Setup failed: {e}")))?;
        }

        tracing::debug!(database = ?config.database, "Opened DuckDB source");
        Ok(Self::from_connection(conn, config.query.clone()))
    }

    /// Page over `query` on an existing connection
    pub fn from_connection(conn: Connection, query: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            query: query.into().trim().trim_end_matches(';').to_string(),
            count: OnceCell::new(),
        }
    }

    /// The paged query
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Row count of the query, computed once
    pub fn row_count(&self) -> Result<u64> {
        self.count
            .get_or_try_init(|| {
                let conn = self.connection()?;
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM ({}) AS q", self.query), [], |row| {
                        row.get(0)
                    })
                    .map_err(|e| Error::database(format!("Count failed: {e}")))?;
                tracing::debug!(rows = count, "Counted query rows");
                Ok(u64::try_from(count).unwrap_or(0))
            })
            .copied()
    }

    /// Run one page query on a fresh connection clone
    pub fn fetch_rows(&self, request: PageRequest) -> Result<Vec<JsonValue>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT * FROM ({}) AS q LIMIT {} OFFSET {}",
            self.query,
            request.size,
            request.offset()
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::database(format!("Failed to prepare query: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| Error::database(format!("Query failed: {e}")))?;
        let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| Error::database(format!("Failed to read row: {e}")))?
        {
            let mut record = JsonObject::new();
            for (i, column) in columns.iter().enumerate() {
                let value: duckdb::types::Value = row
                    .get(i)
                    .map_err(|e| Error::database(format!("Failed to read '{column}': {e}")))?;
                record.insert(column.clone(), duckdb_value_to_json(value));
            }
            records.push(JsonValue::Object(record));
        }
        Ok(records)
    }

    fn connection(&self) -> Result<Connection> {
        self.conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_clone()
            .map_err(|e| Error::database(format!("Failed to clone connection: {e}")))
    }
}

impl PageFetcher<PageResult<JsonValue>> for DuckDbSource {
    fn fetch(&self, request: PageRequest) -> Result<PageResult<JsonValue>> {
        let load = || -> Result<PageResult<JsonValue>> {
            let total = self.row_count()?;
            let rows = self.fetch_rows(request)?;
            let end = request.offset().saturating_add(rows.len() as u64);
            Ok(PageResult::new(rows)
                .with_is_last(end >= total)
                .with_total_pages(pages_for(total, request.size)))
        };
        load().map_err(|e| Error::fetch(request.index, e.to_string()))
    }
}

impl CountSupplier for DuckDbSource {
    fn count(&self) -> Result<u64> {
        self.row_count()
    }
}

impl std::fmt::Debug for DuckDbSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSource")
            .field("query", &self.query)
            .field("count", &self.count.get())
            .finish()
    }
}

/// Convert DuckDB Value to JSON Value
pub(crate) fn duckdb_value_to_json(value: duckdb::types::Value) -> JsonValue {
    use duckdb::types::Value;

    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => i.into(),
        Value::SmallInt(i) => i.into(),
        Value::Int(i) => i.into(),
        Value::BigInt(i) => i.into(),
        Value::UTinyInt(i) => i.into(),
        Value::USmallInt(i) => i.into(),
        Value::UInt(i) => i.into(),
        Value::UBigInt(i) => i.into(),
        Value::Float(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Double(f) => serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(s) => JsonValue::String(s),
        Value::Blob(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        Value::Timestamp(_, micros) => {
            chrono::DateTime::from_timestamp_micros(micros).map_or(micros.into(), |dt| {
                dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string().into()
            })
        }
        Value::Date32(days) => chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .map_or(days.into(), |date| date.format("%Y-%m-%d").to_string().into()),
        Value::Time64(_, micros) => {
            let secs = micros / 1_000_000;
            format!(
                "{:02}:{:02}:{:02}.{:06}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                micros % 1_000_000
            )
            .into()
        }
        other => JsonValue::String(format!("{other:?}")),
    }
}
