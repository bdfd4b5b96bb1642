//! Statistics Calculator Module
//! KPIs, grouped revenue totals and the Pearson correlation matrix.

use crate::data::schema::{is_numeric, SchemaInfo, CATEGORY_COLUMN, REGION_COLUMN};
use polars::prelude::*;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::cmp::Ordering;

const TOTAL_ALIAS: &str = "__total";

/// A KPI value, or the marker shown when its column is missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    Unavailable,
}

impl Metric {
    fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Metric::Value(value)
        } else {
            Metric::Unavailable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::Unavailable => None,
        }
    }

    /// `$1,234.56`, or `N/A`.
    pub fn as_currency(&self) -> String {
        match self {
            Metric::Value(v) => format_currency(*v),
            Metric::Unavailable => "N/A".to_string(),
        }
    }
}

/// Format with a dollar sign, thousands separators and two decimals.
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kpis {
    pub total_revenue: Metric,
    pub total_orders: usize,
    pub average_order_value: Metric,
}

/// Revenue summed for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotal {
    pub key: String,
    pub total: f64,
    /// Fraction of the breakdown's grand total.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Breakdown {
    Available(Vec<GroupTotal>),
    Unavailable,
}

impl Breakdown {
    pub fn groups(&self) -> &[GroupTotal] {
        match self {
            Breakdown::Available(groups) => groups,
            Breakdown::Unavailable => &[],
        }
    }

    pub fn grand_total(&self) -> Option<f64> {
        match self {
            Breakdown::Available(groups) => Some(groups.iter().map(|g| g.total).sum()),
            Breakdown::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownOrder {
    /// Largest total first, ties by key.
    DescendingTotal,
    /// Ascending group key.
    KeyOrder,
}

/// Pairwise Pearson coefficients; `NaN` marks an undefined pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(f64::NAN)
    }

    pub fn is_all_undefined(&self) -> bool {
        self.values.iter().flatten().all(|v| v.is_nan())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationView {
    Matrix(CorrelationMatrix),
    /// Fewer than two numeric columns, or fewer than two selected.
    InsufficientData,
    /// Every pair was undefined (e.g. constant columns).
    CouldNotBeGenerated,
}

/// Handles the Aggregation & Metrics Stage.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Non-null, non-NaN values of a numeric column as f64.
    pub fn numeric_values(df: &DataFrame, column: &str) -> Option<Vec<f64>> {
        let col = df.column(column).ok()?;
        if !is_numeric(col.dtype()) {
            return None;
        }
        let as_f64 = col.cast(&DataType::Float64).ok()?;
        let values = as_f64
            .f64()
            .ok()?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        Some(values)
    }

    /// Column values aligned by row, `None` where missing.
    fn aligned_values(df: &DataFrame, column: &str) -> Option<Vec<Option<f64>>> {
        let as_f64 = df.column(column).ok()?.cast(&DataType::Float64).ok()?;
        let values = as_f64
            .f64()
            .ok()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Some(values)
    }

    pub fn compute_kpis(df: &DataFrame, revenue_col: Option<&str>) -> Kpis {
        let total_orders = df.height();
        let Some(values) = revenue_col.and_then(|c| Self::numeric_values(df, c)) else {
            return Kpis {
                total_revenue: Metric::Unavailable,
                total_orders,
                average_order_value: Metric::Unavailable,
            };
        };

        let total = values.iter().sum::<f64>();
        let mean = if values.is_empty() {
            f64::NAN
        } else {
            values.iter().mean()
        };

        Kpis {
            total_revenue: Metric::from_f64(total),
            total_orders,
            average_order_value: Metric::from_f64(mean),
        }
    }

    /// Sum revenue per non-null value of `key`.
    ///
    /// Keys are ordered by their own dtype (numbers numerically) before being
    /// rendered as text.
    pub fn grouped_totals(
        df: &DataFrame,
        key: &str,
        revenue_col: &str,
        order: BreakdownOrder,
    ) -> PolarsResult<Vec<GroupTotal>> {
        let out = df
            .clone()
            .lazy()
            .filter(col(key).is_not_null())
            .group_by([col(key)])
            .agg([col(revenue_col)
                .cast(DataType::Float64)
                .sum()
                .alias(TOTAL_ALIAS)])
            .sort_by_exprs([col(key)], SortMultipleOptions::default())
            .with_column(col(key).cast(DataType::String))
            .collect()?;

        let keys = out.column(key)?.str()?;
        let totals = out.column(TOTAL_ALIAS)?.f64()?;
        let mut groups: Vec<GroupTotal> = keys
            .into_iter()
            .zip(totals.into_iter())
            .filter_map(|(k, t)| {
                Some(GroupTotal {
                    key: k?.to_string(),
                    total: t.unwrap_or(0.0),
                    share: 0.0,
                })
            })
            .collect();

        // Rows arrive in key order; the stable sort keeps it for ties.
        if order == BreakdownOrder::DescendingTotal {
            groups.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
        }

        let grand: f64 = groups.iter().map(|g| g.total).sum();
        if grand != 0.0 {
            for g in &mut groups {
                g.share = g.total / grand;
            }
        }
        Ok(groups)
    }

    fn breakdown(
        df: &DataFrame,
        schema: &SchemaInfo,
        key: &str,
        order: BreakdownOrder,
    ) -> Breakdown {
        let Some(revenue) = schema.revenue_column.as_deref() else {
            return Breakdown::Unavailable;
        };
        if !schema.has_column(key) || !schema.numeric_columns.iter().any(|c| c == revenue) {
            return Breakdown::Unavailable;
        }
        match Self::grouped_totals(df, key, revenue, order) {
            Ok(groups) => Breakdown::Available(groups),
            Err(e) => {
                tracing::warn!("{} breakdown failed: {}", key, e);
                Breakdown::Unavailable
            }
        }
    }

    /// Revenue by `Category`, largest first.
    pub fn category_breakdown(df: &DataFrame, schema: &SchemaInfo) -> Breakdown {
        Self::breakdown(df, schema, CATEGORY_COLUMN, BreakdownOrder::DescendingTotal)
    }

    /// Revenue by `Region`, in key order.
    pub fn region_breakdown(df: &DataFrame, schema: &SchemaInfo) -> Breakdown {
        Self::breakdown(df, schema, REGION_COLUMN, BreakdownOrder::KeyOrder)
    }

    /// Pearson coefficient over rows where both values are present.
    pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y.iter())
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .unzip();
        if xs.len() < 2 {
            return f64::NAN;
        }

        let sx = xs.iter().std_dev();
        let sy = ys.iter().std_dev();
        if !(sx > 0.0 && sy > 0.0) {
            return f64::NAN;
        }
        let r = xs.iter().covariance(ys.iter()) / (sx * sy);
        r.clamp(-1.0, 1.0)
    }

    /// Correlation over the selected numeric columns.
    pub fn correlation_matrix(
        df: &DataFrame,
        numeric_columns: &[String],
        selection: &[String],
    ) -> CorrelationView {
        if numeric_columns.len() < 2 {
            return CorrelationView::InsufficientData;
        }
        let mut selected: Vec<String> = Vec::with_capacity(selection.len());
        for column in selection {
            if numeric_columns.contains(column) && !selected.contains(column) {
                selected.push(column.clone());
            }
        }
        if selected.len() < 2 {
            return CorrelationView::InsufficientData;
        }

        let Some(series): Option<Vec<Vec<Option<f64>>>> = selected
            .iter()
            .map(|c| Self::aligned_values(df, c))
            .collect()
        else {
            return CorrelationView::InsufficientData;
        };

        let n = selected.len();
        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i..n)
                    .map(|j| {
                        let r = Self::pearson(&series[i], &series[j]);
                        if i == j && !r.is_nan() {
                            1.0
                        } else {
                            r
                        }
                    })
                    .collect()
            })
            .collect();

        let mut values = vec![vec![f64::NAN; n]; n];
        for (i, row) in upper.iter().enumerate() {
            for (offset, &r) in row.iter().enumerate() {
                let j = i + offset;
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        let matrix = CorrelationMatrix {
            columns: selected,
            values,
        };
        if matrix.is_all_undefined() {
            CorrelationView::CouldNotBeGenerated
        } else {
            CorrelationView::Matrix(matrix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> DataFrame {
        df! {
            "Date" => ["2023-12-01", "2023-12-02", "2023-12-03"],
            "Category" => ["Toys", "Food", "Toys"],
            "Region" => ["North", "South", "North"],
            "Sales" => [100i64, 50, 75],
        }
        .unwrap()
    }

    #[test]
    fn scenario_kpis() {
        let df = scenario();
        let kpis = StatsCalculator::compute_kpis(&df, Some("Sales"));
        assert_eq!(kpis.total_revenue, Metric::Value(225.0));
        assert_eq!(kpis.total_revenue.as_currency(), "$225.00");
        assert_eq!(kpis.total_orders, 3);
        assert_eq!(kpis.average_order_value, Metric::Value(75.0));
    }

    #[test]
    fn kpis_without_revenue_column_are_unavailable() {
        let df = df! { "Category" => ["Toys"], "Amount" => [1.0] }.unwrap();
        let kpis = StatsCalculator::compute_kpis(&df, None);
        assert_eq!(kpis.total_revenue, Metric::Unavailable);
        assert_eq!(kpis.average_order_value, Metric::Unavailable);
        assert_eq!(kpis.total_orders, 1);
        assert_eq!(kpis.total_revenue.as_currency(), "N/A");
    }

    #[test]
    fn kpis_on_empty_table() {
        let df = scenario().head(Some(0));
        let kpis = StatsCalculator::compute_kpis(&df, Some("Sales"));
        assert_eq!(kpis.total_revenue, Metric::Value(0.0));
        assert_eq!(kpis.average_order_value, Metric::Unavailable);
        assert_eq!(kpis.total_orders, 0);
    }

    #[test]
    fn text_revenue_column_is_unavailable() {
        let df = df! { "Sales" => ["lots", "few"] }.unwrap();
        let kpis = StatsCalculator::compute_kpis(&df, Some("Sales"));
        assert_eq!(kpis.total_revenue, Metric::Unavailable);
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.5), "-$42.50");
    }

    #[test]
    fn scenario_category_breakdown_sorted_descending() {
        let df = scenario();
        let schema = SchemaInfo::inspect(&df);
        let breakdown = StatsCalculator::category_breakdown(&df, &schema);
        let pairs: Vec<(&str, f64)> = breakdown
            .groups()
            .iter()
            .map(|g| (g.key.as_str(), g.total))
            .collect();
        assert_eq!(pairs, vec![("Toys", 175.0), ("Food", 50.0)]);
    }

    #[test]
    fn region_breakdown_in_key_order_with_shares() {
        let df = df! {
            "Region" => ["West", "East", "West", "North"],
            "Revenue" => [10.0, 30.0, 20.0, 40.0],
        }
        .unwrap();
        let schema = SchemaInfo::inspect(&df);
        let breakdown = StatsCalculator::region_breakdown(&df, &schema);
        let keys: Vec<&str> = breakdown.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["East", "North", "West"]);
        let shares: f64 = breakdown.groups().iter().map(|g| g.share).sum();
        assert!((shares - 1.0).abs() < 1e-12);
    }

    #[test]
    fn numeric_region_keys_sort_numerically() {
        let df = df! {
            "Region" => [10i64, 2, 10, 1],
            "Sales" => [5.0, 1.0, 5.0, 3.0],
        }
        .unwrap();
        let schema = SchemaInfo::inspect(&df);
        let region = StatsCalculator::region_breakdown(&df, &schema);
        let keys: Vec<&str> = region.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "10"]);

        let ties = df! {
            "Category" => [20i64, 3, 100],
            "Sales" => [4.0, 4.0, 9.0],
        }
        .unwrap();
        let schema = SchemaInfo::inspect(&ties);
        let category = StatsCalculator::category_breakdown(&ties, &schema);
        let keys: Vec<&str> = category.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["100", "3", "20"]);
    }

    #[test]
    fn breakdown_totals_match_grand_total() {
        let df = df! {
            "Category" => ["a", "b", "c", "a", "b", "a"],
            "Region" => ["x", "y", "x", "y", "x", "y"],
            "Sales" => [1.1, 2.2, 3.3, 4.4, 5.5, 6.6],
        }
        .unwrap();
        let schema = SchemaInfo::inspect(&df);
        let total = StatsCalculator::compute_kpis(&df, Some("Sales"))
            .total_revenue
            .value()
            .unwrap();
        for breakdown in [
            StatsCalculator::category_breakdown(&df, &schema),
            StatsCalculator::region_breakdown(&df, &schema),
        ] {
            assert!((breakdown.grand_total().unwrap() - total).abs() < 1e-9);
        }
    }

    #[test]
    fn breakdown_needs_group_and_revenue_columns() {
        let no_region = scenario();
        let schema = SchemaInfo::inspect(&no_region.drop("Region").unwrap());
        assert_eq!(
            StatsCalculator::region_breakdown(&no_region, &schema),
            Breakdown::Unavailable
        );

        let no_revenue = df! { "Category" => ["a"], "Units" => [1i64] }.unwrap();
        let schema = SchemaInfo::inspect(&no_revenue);
        assert_eq!(
            StatsCalculator::category_breakdown(&no_revenue, &schema),
            Breakdown::Unavailable
        );
        assert_eq!(Breakdown::Unavailable.grand_total(), None);
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let df = df! {
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "b" => [2.0, 4.1, 5.9, 8.2, 9.9],
            "c" => [5.0, 3.0, 4.0, 1.0, 2.0],
        }
        .unwrap();
        let cols = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let CorrelationView::Matrix(m) = StatsCalculator::correlation_matrix(&df, &cols, &cols)
        else {
            panic!("expected a matrix");
        };
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!(m.get(i, j) <= 1.0 && m.get(i, j) >= -1.0);
            }
        }
        assert!(m.get(0, 1) > 0.99);
        assert!(m.get(0, 2) < -0.7);
    }

    #[test]
    fn correlation_skips_rows_with_missing_values() {
        let x = [Some(1.0), Some(2.0), None, Some(3.0)];
        let y = [Some(2.0), Some(4.0), Some(100.0), Some(6.0)];
        assert!((StatsCalculator::pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_needs_two_selected_numeric_columns() {
        let df = df! { "a" => [1.0, 2.0], "b" => [3.0, 1.0], "t" => ["x", "y"] }.unwrap();
        let numeric = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            StatsCalculator::correlation_matrix(&df, &numeric, &["a".to_string()]),
            CorrelationView::InsufficientData
        );
        assert_eq!(
            StatsCalculator::correlation_matrix(&df, &numeric, &["a".to_string(), "t".to_string()]),
            CorrelationView::InsufficientData
        );
        assert_eq!(
            StatsCalculator::correlation_matrix(&df, &numeric[..1], &numeric),
            CorrelationView::InsufficientData
        );
    }

    #[test]
    fn repeated_selection_counts_once() {
        let df = df! { "Sales" => [1.0, 2.0, 3.0], "Units" => [3.0, 1.0, 2.0] }.unwrap();
        let numeric = vec!["Sales".to_string(), "Units".to_string()];
        let twice = vec!["Sales".to_string(), "Sales".to_string()];
        assert_eq!(
            StatsCalculator::correlation_matrix(&df, &numeric, &twice),
            CorrelationView::InsufficientData
        );
        let repeated = vec!["Units".to_string(), "Sales".to_string(), "Units".to_string()];
        match StatsCalculator::correlation_matrix(&df, &numeric, &repeated) {
            CorrelationView::Matrix(matrix) => assert_eq!(matrix.columns, vec!["Units", "Sales"]),
            other => panic!("expected a matrix, got {:?}", other),
        }
    }

    #[test]
    fn constant_columns_cannot_be_correlated() {
        let df = df! { "a" => [1.0, 1.0, 1.0], "b" => [2.0, 2.0, 2.0] }.unwrap();
        let cols = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            StatsCalculator::correlation_matrix(&df, &cols, &cols),
            CorrelationView::CouldNotBeGenerated
        );
    }
}
