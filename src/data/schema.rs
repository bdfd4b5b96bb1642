//! Schema Introspector
//! Pure inspection of a Working Table's columns.

use crate::data::loader::get_columns;
use polars::prelude::*;

/// Column that enables the date filter.
pub const DATE_COLUMN: &str = "Date";
pub const CATEGORY_COLUMN: &str = "Category";
pub const REGION_COLUMN: &str = "Region";

/// Lowercase tokens marking a revenue-like column.
const REVENUE_TOKENS: [&str; 2] = ["revenue", "sales"];

/// What the downstream stages need to know about the table's shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaInfo {
    pub columns: Vec<String>,
    pub revenue_column: Option<String>,
    pub numeric_columns: Vec<String>,
    pub has_date: bool,
}

impl SchemaInfo {
    pub fn inspect(df: &DataFrame) -> Self {
        let columns = get_columns(df);
        Self {
            revenue_column: detect_revenue_column(&columns),
            numeric_columns: numeric_columns(df),
            has_date: has_date_column(df),
            columns,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// First column, in column order, whose lowercased name contains
/// "revenue" or "sales".
pub fn detect_revenue_column<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    columns
        .iter()
        .map(AsRef::as_ref)
        .find(|name| {
            let lower = name.to_lowercase();
            REVENUE_TOKENS.iter().any(|token| lower.contains(token))
        })
        .map(str::to_string)
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Get list of numeric column names.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

pub fn has_date_column(df: &DataFrame) -> bool {
    df.get_column_names().iter().any(|name| name.as_str() == DATE_COLUMN)
}
