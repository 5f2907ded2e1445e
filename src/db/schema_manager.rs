use crate::db::{query_rows, DbError};
use duckdb::Connection;
use serde_json::Value;
use tracing::debug;

/// A base table visible to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    /// Tables in `main` are referenced unqualified.
    pub fn qualified(&self) -> String {
        if self.schema == "main" {
            format!("\"{}\"", self.name)
        } else {
            format!("\"{}\".\"{}\"", self.schema, self.name)
        }
    }
}

pub fn list_tables(conn: &Connection, include: &[String]) -> Result<Vec<TableRef>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT table_schema, table_name FROM information_schema.tables
         WHERE table_type = 'BASE TABLE'
           AND table_schema NOT IN ('information_schema', 'pg_catalog')
         ORDER BY table_schema, table_name",
    )?;

    let tables = stmt
        .query_map([], |row| {
            Ok(TableRef {
                schema: row.get::<_, String>(0)?,
                name: row.get::<_, String>(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tables
        .into_iter()
        .filter(|t| include.is_empty() || include.iter().any(|i| i == &t.name))
        .collect())
}

/// `CREATE TABLE` DDL followed by a comment block of sample rows, per table.
pub fn table_info(
    conn: &Connection,
    include: &[String],
    sample_rows: usize,
) -> Result<String, DbError> {
    let tables = list_tables(conn, include)?;
    debug!("Describing {} tables for the prompt", tables.len());

    let mut sections = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut section = create_table_ddl(conn, table)?;
        if sample_rows > 0 {
            section.push_str("\n\n");
            section.push_str(&sample_block(conn, table, sample_rows)?);
        }
        sections.push(section);
    }

    Ok(sections.join("\n\n"))
}

fn create_table_ddl(conn: &Connection, table: &TableRef) -> Result<String, DbError> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable
         FROM information_schema.columns
         WHERE table_schema = ? AND table_name = ?
         ORDER BY ordinal_position",
    )?;

    let columns: Vec<(String, String, bool)> = stmt
        .query_map(duckdb::params![table.schema, table.name], |row| {
            Ok((
                row.get::<_, String>(0)?,         // column_name
                row.get::<_, String>(1)?,         // data_type
                row.get::<_, String>(2)? == "YES", // is_nullable
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let column_defs: Vec<String> = columns
        .iter()
        .map(|(name, data_type, nullable)| {
            let null_str = if *nullable { "" } else { " NOT NULL" };
            format!("\t\"{}\" {}{}", name, data_type, null_str)
        })
        .collect();

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        table.qualified(),
        column_defs.join(",\n")
    ))
}

fn sample_block(conn: &Connection, table: &TableRef, limit: usize) -> Result<String, DbError> {
    let sample = query_rows(
        conn,
        &format!("SELECT * FROM {} LIMIT {}", table.qualified(), limit),
    )?;

    let mut block = format!("/*\n{} rows from {} table:\n", limit, table.name);
    block.push_str(&sample.columns.join("\t"));
    for row in &sample.rows {
        block.push('\n');
        block.push_str(
            &row.iter()
                .map(plain_cell)
                .collect::<Vec<_>>()
                .join("\t"),
        );
    }
    block.push_str("\n*/");
    Ok(block)
}

fn plain_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
