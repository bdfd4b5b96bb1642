//! SQLite-backed structured store serving the query box.

use crate::data::processor::days_to_date;
use crate::store::guard::{QueryGuard, QueryRejection};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("{0}")]
    Rejected(#[from] QueryRejection),
    #[error("Statement would modify the store; queries are read-only")]
    WritesStatement,
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("cannot store a table without columns")]
    NoColumns,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreColumn {
    pub cid: i64,
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    InMemory,
    File(PathBuf),
}

/// Session-owned connection to the structured store.
#[derive(Debug)]
pub struct SalesStore {
    conn: Connection,
    table: String,
    location: StoreLocation,
    guard: QueryGuard,
}

impl SalesStore {
    /// Open (creating if needed) an on-disk store for read/write.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            table: table.to_string(),
            location: StoreLocation::File(path.to_path_buf()),
            guard: QueryGuard::default(),
        })
    }

    /// Open an existing on-disk store for querying. The table must exist.
    pub fn open_existing(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn,
            table: table.to_string(),
            location: StoreLocation::File(path.to_path_buf()),
            guard: QueryGuard::default(),
        };
        if !store.has_table()? {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        store.set_query_only(true)?;
        Ok(store)
    }

    /// Ephemeral store used when the data came from a flat file.
    pub fn in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            table: table.to_string(),
            location: StoreLocation::InMemory,
            guard: QueryGuard::default(),
        })
    }

    pub fn with_guard(mut self, guard: QueryGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn has_table(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn set_query_only(&self, on: bool) -> Result<()> {
        self.conn.pragma_update(None, "query_only", on)?;
        Ok(())
    }

    /// Replace the table with the frame's contents in one transaction.
    ///
    /// The connection is read-only afterwards.
    pub fn load_table(&mut self, df: &DataFrame) -> Result<usize> {
        if df.width() == 0 {
            return Err(StoreError::NoColumns);
        }
        self.set_query_only(false)?;

        let table = quote_ident(&self.table);
        let columns = df.get_columns();
        let defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c.name()), sql_affinity(c.dtype())))
            .collect();
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c.name())).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
            defs.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ))?;
            for row in 0..df.height() {
                let values = columns
                    .iter()
                    .map(|c| c.get(row).map(any_to_sql))
                    .collect::<PolarsResult<Vec<Value>>>()?;
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        self.set_query_only(true)?;
        tracing::info!(
            "Loaded {} rows into store table '{}' ({:?})",
            df.height(),
            self.table,
            self.location
        );
        Ok(df.height())
    }

    /// The whole table as a frame.
    pub fn read_table(&self) -> Result<DataFrame> {
        if !self.has_table()? {
            return Err(StoreError::TableNotFound(self.table.clone()));
        }
        self.run(&format!("SELECT * FROM {}", quote_ident(&self.table)))
    }

    /// Column list for display.
    pub fn columns(&self) -> Result<Vec<StoreColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let rows = stmt.query_map(params![self.table], |r| {
            Ok(StoreColumn {
                cid: r.get(0)?,
                name: r.get(1)?,
                decl_type: r.get(2)?,
                not_null: r.get::<_, i64>(3)? != 0,
                default_value: r.get(4)?,
                primary_key: r.get::<_, i64>(5)? != 0,
            })
        })?;
        let columns = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Run a user query. Failures are reported, never fatal.
    pub fn query(&self, sql: &str) -> Result<DataFrame> {
        if let Err(rejection) = self.guard.check(sql) {
            tracing::warn!("Query rejected: {}", rejection);
            return Err(rejection.into());
        }
        match self.run(sql) {
            Ok(df) => {
                tracing::info!("Query returned {} rows", df.height());
                Ok(df)
            }
            Err(e) => {
                tracing::warn!("Query failed: {}", e);
                Err(e)
            }
        }
    }

    fn run(&self, sql: &str) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(sql)?;
        if self.guard.requires_read_only() && !stmt.readonly() {
            return Err(StoreError::WritesStatement);
        }
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = names.len();

        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); width];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, column) in cells.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(i)?);
            }
        }

        frame_from_cells(names, cells)
    }
}

/// Double-quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_affinity(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INTEGER",
        DataType::Float32 | DataType::Float64 => "REAL",
        _ => "TEXT",
    }
}

fn any_to_sql(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Integer(i64::from(b)),
        AnyValue::Int8(v) => Value::Integer(v.into()),
        AnyValue::Int16(v) => Value::Integer(v.into()),
        AnyValue::Int32(v) => Value::Integer(v.into()),
        AnyValue::Int64(v) => Value::Integer(v),
        AnyValue::UInt8(v) => Value::Integer(v.into()),
        AnyValue::UInt16(v) => Value::Integer(v.into()),
        AnyValue::UInt32(v) => Value::Integer(v.into()),
        AnyValue::UInt64(v) => match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Real(v as f64),
        },
        AnyValue::Float32(v) => Value::Real(v.into()),
        AnyValue::Float64(v) => Value::Real(v),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        AnyValue::Date(days) => match days_to_date(days) {
            Some(date) => Value::Text(date.to_string()),
            None => Value::Null,
        },
        other => Value::Text(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Empty,
    Integer,
    Real,
    Text,
}

impl CellKind {
    fn widen(self, value: &Value) -> Self {
        match (self, value) {
            (kind, Value::Null) => kind,
            (CellKind::Text, _) | (_, Value::Text(_)) | (_, Value::Blob(_)) => CellKind::Text,
            (CellKind::Empty | CellKind::Integer, Value::Integer(_)) => CellKind::Integer,
            (_, Value::Integer(_)) | (_, Value::Real(_)) => CellKind::Real,
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

/// Build a frame from column-major SQLite values, picking each column's dtype
/// from the storage classes it holds.
fn frame_from_cells(names: Vec<String>, cells: Vec<Vec<Value>>) -> Result<DataFrame> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());

    for (name, values) in names.into_iter().zip(cells) {
        let mut unique = name.clone();
        let mut suffix = 1;
        while !seen.insert(unique.clone()) {
            unique = format!("{name}_{suffix}");
            suffix += 1;
        }

        let kind = values.iter().fold(CellKind::Empty, |k, v| k.widen(v));
        let column = match kind {
            CellKind::Integer => {
                let data: Vec<Option<i64>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                Column::new(unique.into(), data)
            }
            CellKind::Real => {
                let data: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Integer(i) => Some(*i as f64),
                        Value::Real(f) => Some(*f),
                        _ => None,
                    })
                    .collect();
                Column::new(unique.into(), data)
            }
            CellKind::Text | CellKind::Empty => {
                let data: Vec<Option<String>> = values.iter().map(value_text).collect();
                Column::new(unique.into(), data)
            }
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::guard::QueryPolicy;

    fn sample() -> DataFrame {
        df! {
            "Date" => ["2023-12-01", "2023-12-02", "2023-12-03"],
            "Category" => ["Toys", "Food", "Toys"],
            "Region" => ["North", "South", "North"],
            "Sales" => [100i64, 50, 75],
        }
        .unwrap()
    }

    fn loaded() -> SalesStore {
        let mut store = SalesStore::in_memory("sales").unwrap();
        store.load_table(&sample()).unwrap();
        store
    }

    #[test]
    fn count_query_returns_single_cell() {
        let out = loaded().query("SELECT COUNT(*) FROM sales").unwrap();
        assert_eq!(out.shape(), (1, 1));
        let value = out.get_columns()[0].i64().unwrap().get(0);
        assert_eq!(value, Some(3));
    }

    #[test]
    fn unknown_table_is_a_reported_error() {
        let store = loaded();
        let err = store.query("SELECT * FROM nonexistent").unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(err.to_string().contains("nonexistent"));
        // The store is still usable.
        assert_eq!(store.read_table().unwrap().height(), 3);
    }

    #[test]
    fn writes_are_rejected_by_the_guard() {
        let store = loaded();
        assert!(matches!(
            store.query("DELETE FROM sales"),
            Err(StoreError::Rejected(QueryRejection::NotReadOnly(_)))
        ));
        assert!(matches!(
            store.query("WITH x AS (SELECT 1) DELETE FROM sales"),
            Err(StoreError::WritesStatement)
        ));
        assert_eq!(store.read_table().unwrap().height(), 3);
    }

    #[test]
    fn trailing_statements_are_reported_not_dropped() {
        let store = loaded();
        assert!(matches!(
            store.query("SELECT 1; DELETE FROM sales"),
            Err(StoreError::Rejected(QueryRejection::MultipleStatements))
        ));
        let open = loaded().with_guard(QueryGuard::new(QueryPolicy::Unrestricted));
        assert!(matches!(
            open.query("SELECT COUNT(*) FROM sales; SELECT 2"),
            Err(StoreError::Rejected(QueryRejection::MultipleStatements))
        ));
        let out = store.query("SELECT COUNT(*) FROM sales;").unwrap();
        assert_eq!(out.shape(), (1, 1));
        assert_eq!(store.read_table().unwrap().height(), 3);
    }

    #[test]
    fn connection_is_read_only_even_without_the_guard() {
        let store = loaded().with_guard(QueryGuard::new(QueryPolicy::Unrestricted));
        assert!(store.query("DELETE FROM sales").is_err());
        assert_eq!(store.read_table().unwrap().height(), 3);
    }

    #[test]
    fn read_table_keeps_types() {
        let out = loaded().read_table().unwrap();
        assert_eq!(out.shape(), (3, 4));
        assert_eq!(out.column("Sales").unwrap().dtype(), &DataType::Int64);
        assert_eq!(out.column("Region").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        let out = loaded()
            .query("SELECT 1 AS v UNION ALL SELECT 2.5 UNION ALL SELECT NULL")
            .unwrap();
        assert_eq!(out.column("v").unwrap().dtype(), &DataType::Float64);
        assert_eq!(out.column("v").unwrap().null_count(), 1);
    }

    #[test]
    fn duplicate_result_names_are_suffixed() {
        let out = loaded().query("SELECT Region, Region FROM sales").unwrap();
        let names: Vec<String> = out
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["Region", "Region_1"]);
    }

    #[test]
    fn column_list_matches_loaded_frame() {
        let columns = loaded().columns().unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Date", "Category", "Region", "Sales"]);
        assert_eq!(columns[3].decl_type, "INTEGER");
        assert_eq!(columns[0].decl_type, "TEXT");
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.db");
        {
            let mut store = SalesStore::open(&path, "sales").unwrap();
            store.load_table(&sample()).unwrap();
        }
        let store = SalesStore::open_existing(&path, "sales").unwrap();
        assert_eq!(store.read_table().unwrap().height(), 3);
        assert_eq!(store.location(), &StoreLocation::File(path.clone()));
    }

    #[test]
    fn open_existing_requires_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        SalesStore::open(&path, "sales").unwrap();
        assert!(matches!(
            SalesStore::open_existing(&path, "sales"),
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("Unit \"Price\""), "\"Unit \"\"Price\"\"\"");
    }
}
