//! Command line interface: GUI launcher plus headless `report` and `create-db`.

use crate::charts::StaticChartRenderer;
use crate::config::DashboardConfig;
use crate::data::{
    DataLoader, DataProcessor, DataSourceResolver, DateRange, SourceCandidates, UploadedFile,
};
use crate::export::CsvExporter;
use crate::pipeline::{render_state, DerivedViews, Selections};
use crate::stats::{format_currency, Breakdown, CorrelationView, Metric};
use crate::store::{SalesStore, StoreLocation};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sales-dashboard")]
#[command(about = "Sales data analysis dashboard", version)]
pub struct Cli {
    /// JSON configuration file (defaults to ./dashboard.json when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline headlessly and print every derived view
    Report {
        /// CSV file to analyse instead of the configured sources
        #[arg(long)]
        file: Option<PathBuf>,

        /// Prefer the structured store when it exists
        #[arg(long)]
        store: bool,

        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<NaiveDate>,

        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<NaiveDate>,

        /// Numeric columns for the correlation matrix
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Read-only SQL against the `sales` table
        #[arg(long)]
        query: Option<String>,

        /// Write the filtered table as CSV
        #[arg(long)]
        export: Option<PathBuf>,

        /// Directory for PNG charts
        #[arg(long)]
        charts_dir: Option<PathBuf>,
    },

    /// Load a CSV file into the `sales` table of a SQLite store
    CreateDb {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long, default_value = "sales.db")]
        db: PathBuf,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    DataProcessor::parse_date(value).ok_or_else(|| format!("invalid date: {value}"))
}

/// Options for one headless report.
#[derive(Debug, Default)]
pub struct ReportArgs {
    pub file: Option<PathBuf>,
    pub store: bool,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub columns: Option<Vec<String>>,
    pub query: Option<String>,
    pub export: Option<PathBuf>,
    pub charts_dir: Option<PathBuf>,
}

pub fn run_report(mut config: DashboardConfig, args: ReportArgs) -> Result<()> {
    if args.store {
        config.use_store = true;
    }
    let upload = match &args.file {
        Some(path) => Some(UploadedFile {
            name: path.display().to_string(),
            bytes: fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        }),
        None => None,
    };

    let resolver = DataSourceResolver::from_config(&config)?;
    let source = resolver.resolve(SourceCandidates::from_config(&config, upload))?;
    println!("{}", config.dataset_label);
    println!("{}: {} ({} rows)", source.origin, source.label, source.table.height());
    match source.store.location() {
        StoreLocation::InMemory => println!("Queries run against an in-memory copy"),
        StoreLocation::File(path) => println!("Queries run against {}", path.display()),
    }

    let date_range = match (args.start, args.end) {
        (None, None) => None,
        (start, end) => {
            let coerced = DataProcessor::coerce_dates(&source.table)?;
            let Some(bounds) = DataProcessor::date_bounds(&coerced) else {
                bail!("--start/--end given but the table has no usable Date column");
            };
            Some(DateRange::new(
                start.unwrap_or(bounds.start),
                end.unwrap_or(bounds.end),
            ))
        }
    };
    let selections = Selections {
        date_range,
        correlation_columns: args.columns,
    };
    let views = render_state(&selections, &source.table)?;
    print_views(&views);

    if let Some(sql) = &args.query {
        println!("\nQuery Results");
        match source.store.query(sql) {
            Ok(df) => println!("{}", df),
            Err(e) => println!("Query failed: {}", e),
        }
    }

    if let Some(path) = &args.export {
        let artifact = CsvExporter::artifact(&views.filtered, &config.export_file_name)?;
        let bytes = CsvExporter::save(&artifact, path)?;
        println!(
            "\nExported {} rows ({} bytes) to {}",
            views.filtered.height(),
            bytes,
            path.display()
        );
    }

    if let Some(dir) = &args.charts_dir {
        let written = StaticChartRenderer::save_all(&views, dir)?;
        for path in written {
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

fn print_views(views: &DerivedViews) {
    if let Some(range) = views.applied_range {
        println!("Date range: {} ({} rows)", range, views.filtered.height());
    }

    println!("\nKey Metrics");
    println!("  Total Revenue:   {}", views.kpis.total_revenue.as_currency());
    println!("  Total Orders:    {}", views.kpis.total_orders);
    println!("  Avg Order Value: {}", views.kpis.average_order_value.as_currency());
    if views.kpis.total_revenue == Metric::Unavailable {
        println!("  (no revenue or sales column)");
    }

    print_breakdown("Sales by Category", &views.category);
    print_breakdown("Sales by Region", &views.region);

    println!("\nCorrelation Heatmap");
    match &views.correlation {
        CorrelationView::Matrix(matrix) => {
            let width = matrix.columns.iter().map(|c| c.len()).max().unwrap_or(0).max(6);
            print!("  {:width$}", "");
            for name in &matrix.columns {
                print!(" {:>width$}", name);
            }
            println!();
            for (i, name) in matrix.columns.iter().enumerate() {
                print!("  {:width$}", name);
                for j in 0..matrix.columns.len() {
                    let r = matrix.get(i, j);
                    let cell = if r.is_nan() { "-".to_string() } else { format!("{:.2}", r) };
                    print!(" {:>width$}", cell);
                }
                println!();
            }
        }
        CorrelationView::InsufficientData => println!("  Not enough numeric columns."),
        CorrelationView::CouldNotBeGenerated => println!("  Could not be generated."),
    }
}

fn print_breakdown(title: &str, breakdown: &Breakdown) {
    println!("\n{}", title);
    match breakdown {
        Breakdown::Available(groups) if groups.is_empty() => println!("  (no rows)"),
        Breakdown::Available(groups) => {
            for group in groups {
                println!(
                    "  {:<24} {:>16} {:>6.1}%",
                    group.key,
                    format_currency(group.total),
                    group.share * 100.0
                );
            }
            if let Some(total) = breakdown.grand_total() {
                println!("  {:<24} {:>16}", "Total", format_currency(total));
            }
        }
        Breakdown::Unavailable => println!("  Unavailable"),
    }
}

pub fn run_create_db(config: &DashboardConfig, csv: &Path, db: &Path) -> Result<()> {
    let loader = DataLoader::from_config(config)?;
    let df = loader
        .load_csv(csv)
        .with_context(|| format!("Failed to load {}", csv.display()))?;

    let mut store = SalesStore::open(db, &config.table_name)?;
    let rows = store.load_table(&df)?;
    println!(
        "Loaded {} rows into table '{}' of {}",
        rows,
        config.table_name,
        db.display()
    );

    println!("{:>3}  {:<24} {:<8} {:>7} {:>4}", "cid", "name", "type", "notnull", "pk");
    for column in store.columns()? {
        println!(
            "{:>3}  {:<24} {:<8} {:>7} {:>4}",
            column.cid,
            column.name,
            column.decl_type,
            column.not_null as u8,
            column.primary_key as u8
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Date,Category,Region,Sales,Units\n\
                       2023-12-01,Toys,North,100,1\n\
                       2023-12-02,Food,South,50,3\n\
                       2023-12-03,Toys,North,75,2\n";

    #[test]
    fn parses_report_flags() {
        let cli = Cli::try_parse_from([
            "sales-dashboard",
            "report",
            "--start",
            "2023-12-02",
            "--columns",
            "Sales,Units",
            "--store",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Report {
                start,
                columns,
                store,
                ..
            }) => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2023, 12, 2));
                assert_eq!(columns, Some(vec!["Sales".to_string(), "Units".to_string()]));
                assert!(store);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn no_subcommand_means_gui() {
        let cli = Cli::try_parse_from(["sales-dashboard", "--config", "x.json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn rejects_bad_dates() {
        assert!(Cli::try_parse_from(["sales-dashboard", "report", "--end", "later"]).is_err());
    }

    #[test]
    fn create_db_then_report_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("input.csv");
        let db = dir.path().join("sales.db");
        fs::write(&csv, CSV).unwrap();

        let config = DashboardConfig {
            store_path: db.clone(),
            default_file: dir.path().join("missing.csv"),
            ..Default::default()
        };
        run_create_db(&config, &csv, &db).unwrap();

        let store = SalesStore::open_existing(&db, "sales").unwrap();
        let names: Vec<String> = store.columns().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Date", "Category", "Region", "Sales", "Units"]);

        let export = dir.path().join("out.csv");
        let charts = dir.path().join("charts");
        run_report(
            config,
            ReportArgs {
                store: true,
                query: Some("SELECT Region, SUM(Sales) FROM sales GROUP BY Region".into()),
                export: Some(export.clone()),
                charts_dir: Some(charts.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&export).unwrap().lines().count(), 4);
        assert!(charts.join("category_sales.png").exists());
        assert!(charts.join("correlation_heatmap.png").exists());
    }

    #[test]
    fn report_without_any_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            default_file: dir.path().join("missing.csv"),
            ..Default::default()
        };
        let err = run_report(config, ReportArgs::default()).unwrap_err();
        assert_eq!(err.to_string(), "No file uploaded or sample file found.");
    }
}
