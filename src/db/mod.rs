pub mod db_pool;
pub mod fixtures;
pub mod ingest;
pub mod schema_manager;

use crate::config::DatabaseConfig;
use crate::db::db_pool::DuckDBConnectionManager;
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::Connection;
use r2d2::Pool;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("{0}")]
    InvalidInput(String),
}

/// Tabular result of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    /// Renders rows as a list of tuples, e.g. `[(45,)]` or `[('Nike', 12)]`.
    pub fn to_prompt_string(&self) -> String {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(prompt_cell).collect();
                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();
        format!("[{}]", rows.join(", "))
    }
}

fn prompt_cell(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => quote_text(s),
        other => other.to_string(),
    }
}

// Single quotes unless the text has one and no double quote, e.g. "Levi's"
fn quote_text(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        return format!("\"{}\"", s.replace('\\', "\\\\"));
    }
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Runs `sql` and collects every row as JSON values.
pub fn query_rows(conn: &Connection, sql: &str) -> Result<QueryRows, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names().into_iter().map(|n| n.to_string()).collect())
        .unwrap_or_default();

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(to_json(row.get::<_, DuckValue>(i)?));
        }
        data.push(cells);
    }

    Ok(QueryRows {
        columns,
        rows: data,
    })
}

fn to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(v) => v.into(),
        DuckValue::SmallInt(v) => v.into(),
        DuckValue::Int(v) => v.into(),
        DuckValue::BigInt(v) => v.into(),
        DuckValue::HugeInt(v) => i64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        DuckValue::UTinyInt(v) => v.into(),
        DuckValue::USmallInt(v) => v.into(),
        DuckValue::UInt(v) => v.into(),
        DuckValue::UBigInt(v) => v.into(),
        DuckValue::Float(v) => Value::from(f64::from(v)),
        DuckValue::Double(v) => Value::from(v),
        DuckValue::Decimal(d) => decimal_json(&d.to_string()),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
        DuckValue::Date32(days) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(days))))
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        DuckValue::Timestamp(unit, v) => chrono::DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|t| Value::String(t.naive_utc().to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}

// Integral decimals (e.g. SUM over INTEGER) become JSON integers
fn decimal_json(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// Pooled handle to the inventory database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    pool: Pool<DuckDBConnectionManager>,
    include_tables: Vec<String>,
    sample_rows: usize,
}

impl Database {
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let manager = DuckDBConnectionManager::new(config.connection_string.clone())?;
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1) as u32)
            .build(manager)?;

        Ok(Self {
            pool,
            include_tables: config.include_tables.clone(),
            sample_rows: config.sample_rows_in_table_info,
        })
    }

    /// Runs `f` with a pooled connection on a blocking thread.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&*conn)
        })
        .await?
    }

    pub async fn run_query(&self, sql: &str) -> Result<QueryRows, DbError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            let start = Instant::now();
            let rows = query_rows(conn, &sql)?;
            info!(
                "Query returned {} rows in {}ms",
                rows.rows.len(),
                start.elapsed().as_millis()
            );
            Ok(rows)
        })
        .await
    }

    pub async fn table_info(&self) -> Result<String, DbError> {
        let include = self.include_tables.clone();
        let sample_rows = self.sample_rows;
        let info = self
            .with_connection(move |conn| schema_manager::table_info(conn, &include, sample_rows))
            .await?;
        debug!("Table info:\n{}", info);
        Ok(info)
    }

    pub async fn table_names(&self) -> Result<Vec<String>, DbError> {
        let include = self.include_tables.clone();
        self.with_connection(move |conn| {
            Ok(schema_manager::list_tables(conn, &include)?
                .into_iter()
                .map(|t| t.name)
                .collect())
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.with_connection(|conn| Ok(conn.execute_batch("SELECT 1")?)).await
    }

    pub async fn seed(&self) -> Result<usize, DbError> {
        self.with_connection(|conn| fixtures::seed_inventory(conn)).await
    }

    pub async fn load_csv(&self, path: PathBuf, table: String) -> Result<usize, DbError> {
        self.with_connection(move |conn| ingest::load_csv(conn, &path, &table)).await
    }
}
