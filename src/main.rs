//! Sales Dashboard - CSV / SQLite sales analysis with an interactive viewer
//!
//! Runs the desktop dashboard by default; `report` and `create-db` work headless.

mod charts;
mod cli;
mod config;
mod data;
mod export;
mod gui;
mod pipeline;
mod stats;
mod store;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ReportArgs};
use config::DashboardConfig;
use eframe::egui;
use gui::DashboardApp;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Report {
            file,
            store,
            start,
            end,
            columns,
            query,
            export,
            charts_dir,
        }) => cli::run_report(
            config,
            ReportArgs {
                file,
                store,
                start,
                end,
                columns,
                query,
                export,
                charts_dir,
            },
        ),
        Some(Commands::CreateDb { csv, db }) => cli::run_create_db(&config, &csv, &db),
        None => run_gui(config),
    }
}

fn run_gui(config: DashboardConfig) -> Result<()> {
    let title = config.dataset_label.clone();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_min_inner_size([1200.0, 700.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}
