use crate::db::DbError;
use duckdb::Connection;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table name regex"));

/// Replaces `table` with the contents of a CSV file, letting DuckDB infer the schema.
pub fn load_csv(conn: &Connection, path: &Path, table: &str) -> Result<usize, DbError> {
    if !TABLE_NAME.is_match(table) {
        return Err(DbError::InvalidInput(format!("invalid table name: {}", table)));
    }
    if !path.is_file() {
        return Err(DbError::InvalidInput(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }

    let escaped_path = path.to_string_lossy().replace('\'', "''");
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE \"{}\" AS SELECT * FROM read_csv_auto('{}', header = true)",
        table, escaped_path
    ))?;

    let count: i64 = conn.query_row(&format!("SELECT count(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })?;

    info!("Loaded {} rows into {} from {}", count, table, path.display());
    Ok(count as usize)
}
