//! Sales Dashboard Main Application
//! Main window with control panel and chart viewer.

use crate::charts::StaticChartRenderer;
use crate::config::DashboardConfig;
use crate::data::{DataSourceResolver, ResolveError, ResolvedSource, SourceCandidates, UploadedFile};
use crate::export::CsvExporter;
use crate::gui::chart_viewer::ViewerContent;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction};
use crate::pipeline::{render_state, DerivedViews};
use egui::SidePanel;
use polars::prelude::*;
use std::fs;
use std::sync::mpsc::{channel, Receiver};
use std::thread;

/// Source loading result from background thread
enum LoadResult {
    Complete(ResolvedSource),
    Unavailable(String),
    Error(String),
}

/// Main application window.
pub struct DashboardApp {
    config: DashboardConfig,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    upload: Option<UploadedFile>,
    source: Option<ResolvedSource>,
    unavailable: Option<String>,
    views: Option<DerivedViews>,
    render_error: Option<String>,
    query_result: Option<Result<DataFrame, String>>,
    dirty: bool,

    // Async source loading
    load_rx: Option<Receiver<LoadResult>>,
    is_loading: bool,
}

impl DashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        let mut app = Self {
            control_panel: ControlPanel::new(config.use_store),
            chart_viewer: ChartViewer::new(&config.dataset_label, config.preview_rows),
            config,
            upload: None,
            source: None,
            unavailable: None,
            views: None,
            render_error: None,
            query_result: None,
            dirty: false,
            load_rx: None,
            is_loading: false,
        };
        app.start_load();
        app
    }

    /// Resolve the data source on a background thread.
    fn start_load(&mut self) {
        if self.is_loading {
            return;
        }
        self.control_panel.set_status("Loading data...");
        self.is_loading = true;

        let (tx, rx) = channel();
        self.load_rx = Some(rx);
        let config = self.config.clone();
        let upload = self.upload.clone();

        thread::spawn(move || {
            let result = DataSourceResolver::from_config(&config)
                .and_then(|resolver| {
                    resolver.resolve(SourceCandidates::from_config(&config, upload))
                });
            let message = match result {
                Ok(source) => LoadResult::Complete(source),
                Err(ResolveError::SourceUnavailable) => {
                    LoadResult::Unavailable(ResolveError::SourceUnavailable.to_string())
                }
                Err(e) => LoadResult::Error(e.to_string()),
            };
            let _ = tx.send(message);
        });
    }

    /// Handle CSV upload; the file replaces the current source.
    fn handle_browse_csv(&mut self) {
        if self.is_loading {
            return;
        }
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        else {
            return;
        };

        match fs::read(&path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                self.upload = Some(UploadedFile { name, bytes });
                self.start_load();
            }
            Err(e) => {
                self.control_panel
                    .set_status(&format!("Error: cannot read {}: {}", path.display(), e));
            }
        }
    }

    /// Check for source loading results
    fn check_load_results(&mut self) {
        let rx = self.load_rx.take();
        if let Some(rx) = rx {
            let mut should_keep_receiver = true;

            while let Ok(result) = rx.try_recv() {
                match result {
                    LoadResult::Complete(source) => self.set_source(source),
                    LoadResult::Unavailable(message) => {
                        self.clear_source();
                        self.unavailable = Some(message);
                        self.control_panel.set_status("⚠ No data source");
                    }
                    LoadResult::Error(error) => {
                        self.clear_source();
                        self.control_panel.set_status(&format!("Error: {}", error));
                    }
                }
                self.is_loading = false;
                should_keep_receiver = false;
            }

            if should_keep_receiver {
                self.load_rx = Some(rx);
            }
        }
    }

    fn clear_source(&mut self) {
        self.source = None;
        self.views = None;
        self.query_result = None;
        self.control_panel.source_label = None;
        self.control_panel.can_export = false;
    }

    fn set_source(&mut self, source: ResolvedSource) {
        let store_columns = source.store.columns().unwrap_or_else(|e| {
            tracing::warn!("Could not list store columns: {}", e);
            Vec::new()
        });

        // Bounds and numeric columns come from a first render with defaults.
        match render_state(&Default::default(), &source.table) {
            Ok(views) => {
                self.control_panel.reset_for_source(
                    format!("{}: {}", source.origin, source.label),
                    views.date_bounds,
                    views.schema.has_date,
                    views.schema.numeric_columns.clone(),
                    store_columns,
                );
                self.control_panel.set_status(&format!(
                    "Loaded {} rows, {} columns",
                    source.table.height(),
                    source.table.width()
                ));
            }
            Err(e) => {
                self.control_panel.set_status(&format!("Error: {}", e));
            }
        }

        self.unavailable = None;
        self.query_result = None;
        self.source = Some(source);
        self.dirty = true;
    }

    /// Synchronous recomputation of every derived view.
    fn recompute(&mut self) {
        self.dirty = false;
        let Some(source) = &self.source else {
            return;
        };
        match render_state(&self.control_panel.selections(), &source.table) {
            Ok(views) => {
                self.views = Some(views);
                self.render_error = None;
                self.control_panel.can_export = true;
            }
            Err(e) => {
                tracing::error!("Render failed: {}", e);
                self.views = None;
                self.render_error = Some(e.to_string());
                self.control_panel.can_export = false;
            }
        }
    }

    fn handle_store_toggled(&mut self) {
        self.config.use_store = self.control_panel.settings.use_store;
        if self.upload.is_some() {
            self.control_panel
                .set_status("Uploaded file takes priority over the store");
            return;
        }
        self.start_load();
    }

    fn handle_reset_dates(&mut self) {
        let bounds = self.views.as_ref().and_then(|v| v.date_bounds);
        self.control_panel.set_date_range(bounds);
        self.dirty = true;
    }

    fn handle_run_query(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        let sql = self.control_panel.settings.query.trim();
        let result = source.store.query(sql).map_err(|e| e.to_string());
        match &result {
            Ok(df) => self
                .control_panel
                .set_status(&format!("Query returned {} rows", df.height())),
            Err(_) => self.control_panel.set_status("⚠ Query failed"),
        }
        self.query_result = Some(result);
    }

    fn handle_export_csv(&mut self) {
        let Some(views) = &self.views else {
            self.control_panel.set_status("No data to export");
            return;
        };

        let Some(output_path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .set_file_name(&self.config.export_file_name)
            .save_file()
        else {
            return;
        };

        let result = CsvExporter::artifact(&views.filtered, &self.config.export_file_name)
            .and_then(|artifact| CsvExporter::save(&artifact, &output_path));
        match result {
            Ok(bytes) => self.control_panel.set_status(&format!(
                "Exported {} rows ({} bytes)",
                views.filtered.height(),
                bytes
            )),
            Err(e) => self.control_panel.set_status(&format!("Export error: {}", e)),
        }
    }

    fn handle_save_charts(&mut self) {
        let Some(views) = &self.views else {
            return;
        };
        let Some(dir) = rfd::FileDialog::new().pick_folder() else {
            return;
        };
        match StaticChartRenderer::save_all(views, &dir) {
            Ok(paths) => self
                .control_panel
                .set_status(&format!("Saved {} charts to {}", paths.len(), dir.display())),
            Err(e) => self.control_panel.set_status(&format!("Render error: {}", e)),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();

        // Request repaint while loading
        if self.is_loading {
            ctx.request_repaint();
        }

        if self.dirty {
            self.recompute();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::BrowseCsv => self.handle_browse_csv(),
                        ControlPanelAction::StoreToggled => self.handle_store_toggled(),
                        ControlPanelAction::SelectionChanged => self.dirty = true,
                        ControlPanelAction::ResetDates => self.handle_reset_dates(),
                        ControlPanelAction::RunQuery => self.handle_run_query(),
                        ControlPanelAction::ExportCsv => self.handle_export_csv(),
                        ControlPanelAction::SaveCharts => self.handle_save_charts(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        if self.dirty {
            ctx.request_repaint();
        }

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer.show(
                ui,
                ViewerContent {
                    source: self.source.as_ref(),
                    views: self.views.as_ref(),
                    query: self.query_result.as_ref(),
                    unavailable: self.unavailable.as_deref(),
                    render_error: self.render_error.as_deref(),
                },
            );
        });
    }
}
