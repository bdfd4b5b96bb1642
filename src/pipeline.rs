//! Per-interaction recomputation: Introspector -> Filter -> Aggregation.

use crate::data::{DataProcessor, DateRange, ProcessorError, SchemaInfo};
use crate::stats::{Breakdown, CorrelationView, Kpis, StatsCalculator};
use polars::prelude::*;

/// Control values for one interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selections {
    /// `None` means the observed min/max of the `Date` column.
    pub date_range: Option<DateRange>,
    /// `None` means every numeric column.
    pub correlation_columns: Option<Vec<String>>,
}

/// Everything the dashboard displays, derived from one Working Table.
#[derive(Debug, Clone)]
pub struct DerivedViews {
    pub schema: SchemaInfo,
    pub date_bounds: Option<DateRange>,
    pub applied_range: Option<DateRange>,
    pub filtered: DataFrame,
    pub kpis: Kpis,
    pub category: Breakdown,
    pub region: Breakdown,
    pub correlation_columns: Vec<String>,
    pub correlation: CorrelationView,
}

/// Derive every view from the Working Table and the current selections.
///
/// The Working Table itself is left untouched.
pub fn render_state(
    selections: &Selections,
    working_table: &DataFrame,
) -> Result<DerivedViews, ProcessorError> {
    let coerced = DataProcessor::coerce_dates(working_table)?;
    let schema = SchemaInfo::inspect(&coerced);

    let date_bounds = DataProcessor::date_bounds(&coerced);
    let applied_range = if schema.has_date {
        selections.date_range.or(date_bounds)
    } else {
        None
    };
    let filtered = match applied_range {
        Some(range) => DataProcessor::filter_by_date(&coerced, range)?,
        None => coerced,
    };

    let kpis = StatsCalculator::compute_kpis(&filtered, schema.revenue_column.as_deref());
    let category = StatsCalculator::category_breakdown(&filtered, &schema);
    let region = StatsCalculator::region_breakdown(&filtered, &schema);

    let correlation_columns = selections
        .correlation_columns
        .clone()
        .unwrap_or_else(|| schema.numeric_columns.clone());
    let correlation = StatsCalculator::correlation_matrix(
        &filtered,
        &schema.numeric_columns,
        &correlation_columns,
    );

    tracing::debug!(
        "Rendered views: {} of {} rows after filter",
        filtered.height(),
        working_table.height()
    );

    Ok(DerivedViews {
        schema,
        date_bounds,
        applied_range,
        filtered,
        kpis,
        category,
        region,
        correlation_columns,
        correlation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Metric;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

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
    fn default_selection_covers_everything() {
        let views = render_state(&Selections::default(), &scenario()).unwrap();
        assert_eq!(views.kpis.total_revenue, Metric::Value(225.0));
        assert_eq!(views.kpis.total_orders, 3);
        assert_eq!(
            views.applied_range,
            Some(DateRange::new(ymd(2023, 12, 1), ymd(2023, 12, 3)))
        );
        assert_eq!(views.date_bounds, views.applied_range);
        let categories: Vec<(&str, f64)> = views
            .category
            .groups()
            .iter()
            .map(|g| (g.key.as_str(), g.total))
            .collect();
        assert_eq!(categories, vec![("Toys", 175.0), ("Food", 50.0)]);
        // Only one numeric column.
        assert_eq!(views.correlation, CorrelationView::InsufficientData);
    }

    #[test]
    fn date_selection_narrows_every_view() {
        let selections = Selections {
            date_range: Some(DateRange::new(ymd(2023, 12, 2), ymd(2023, 12, 3))),
            correlation_columns: None,
        };
        let views = render_state(&selections, &scenario()).unwrap();
        assert_eq!(views.kpis.total_revenue, Metric::Value(125.0));
        assert_eq!(views.kpis.total_orders, 2);
        assert_eq!(views.region.groups().len(), 2);
        // Bounds still describe the unfiltered table.
        assert_eq!(
            views.date_bounds,
            Some(DateRange::new(ymd(2023, 12, 1), ymd(2023, 12, 3)))
        );
    }

    #[test]
    fn inverted_range_degrades_without_error() {
        let selections = Selections {
            date_range: Some(DateRange::new(ymd(2023, 12, 3), ymd(2023, 12, 1))),
            correlation_columns: None,
        };
        let views = render_state(&selections, &scenario()).unwrap();
        assert_eq!(views.filtered.height(), 0);
        assert_eq!(views.kpis.total_orders, 0);
        assert_eq!(views.kpis.average_order_value, Metric::Unavailable);
        assert!(views.category.groups().is_empty());
    }

    #[test]
    fn table_without_date_or_revenue() {
        let df = df! { "Units" => [1i64, 2, 3], "Price" => [2.0, 4.0, 7.0] }.unwrap();
        let views = render_state(&Selections::default(), &df).unwrap();
        assert_eq!(views.applied_range, None);
        assert_eq!(views.filtered.height(), 3);
        assert_eq!(views.kpis.total_revenue, Metric::Unavailable);
        assert_eq!(views.category, Breakdown::Unavailable);
        assert_eq!(views.correlation_columns, vec!["Units", "Price"]);
        assert!(matches!(views.correlation, CorrelationView::Matrix(_)));
    }

    #[test]
    fn working_table_is_not_mutated() {
        let table = scenario();
        let before = table.clone();
        let selections = Selections {
            date_range: Some(DateRange::new(ymd(2023, 12, 2), ymd(2023, 12, 2))),
            correlation_columns: None,
        };
        render_state(&selections, &table).unwrap();
        assert!(table.equals(&before));
    }
}
