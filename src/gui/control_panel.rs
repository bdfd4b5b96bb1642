//! Control Panel Widget
//! Left side panel with data source, filter, correlation and query controls.

use crate::data::{DataProcessor, DateRange};
use crate::pipeline::Selections;
use crate::store::StoreColumn;
use egui::{Color32, RichText, ScrollArea};

/// Raw control values as typed by the user.
#[derive(Default, Clone)]
pub struct UserSettings {
    pub use_store: bool,
    pub start_date: String,
    pub end_date: String,
    pub query: String,
}

/// Left side control panel.
pub struct ControlPanel {
    pub settings: UserSettings,
    pub source_label: Option<String>,
    pub has_date: bool,
    pub numeric_columns: Vec<String>,
    pub selected_numeric: Vec<bool>,
    pub store_columns: Vec<StoreColumn>,
    pub status: String,
    pub can_export: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            settings: UserSettings::default(),
            source_label: None,
            has_date: false,
            numeric_columns: Vec::new(),
            selected_numeric: Vec::new(),
            store_columns: Vec::new(),
            status: "Ready".to_string(),
            can_export: false,
        }
    }
}

impl ControlPanel {
    pub fn new(use_store: bool) -> Self {
        let mut panel = Self::default();
        panel.settings.use_store = use_store;
        panel
    }

    /// Reset per-source controls after a new Working Table is loaded.
    pub fn reset_for_source(
        &mut self,
        label: String,
        bounds: Option<DateRange>,
        has_date: bool,
        numeric_columns: Vec<String>,
        store_columns: Vec<StoreColumn>,
    ) {
        self.source_label = Some(label);
        self.has_date = has_date;
        self.set_date_range(bounds);
        self.selected_numeric = vec![true; numeric_columns.len()];
        self.numeric_columns = numeric_columns;
        self.store_columns = store_columns;
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        match range {
            Some(range) => {
                self.settings.start_date = range.start.to_string();
                self.settings.end_date = range.end.to_string();
            }
            None => {
                self.settings.start_date.clear();
                self.settings.end_date.clear();
            }
        }
    }

    fn parsed_range(&self) -> Option<DateRange> {
        let start = DataProcessor::parse_date(&self.settings.start_date)?;
        let end = DataProcessor::parse_date(&self.settings.end_date)?;
        Some(DateRange::new(start, end))
    }

    /// Current selections; unparseable dates fall back to the observed bounds.
    pub fn selections(&self) -> Selections {
        Selections {
            date_range: self.parsed_range(),
            correlation_columns: Some(self.get_selected_numeric()),
        }
    }

    pub fn get_selected_numeric(&self) -> Vec<String> {
        self.numeric_columns
            .iter()
            .zip(self.selected_numeric.iter())
            .filter(|(_, &selected)| selected)
            .map(|(col, _)| col.clone())
            .collect()
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let label = self.source_label.as_deref().unwrap_or("No data loaded");
                    ui.label(RichText::new(label).size(12.0).color(
                        if self.source_label.is_some() {
                            ui.visuals().strong_text_color()
                        } else {
                            Color32::GRAY
                        },
                    ));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📤 Upload CSV").clicked() {
                            action = ControlPanelAction::BrowseCsv;
                        }
                    });
                });
                if ui
                    .checkbox(&mut self.settings.use_store, "Use local SQLite store")
                    .changed()
                {
                    action = ControlPanelAction::StoreToggled;
                }
            });

        ui.add_space(10.0);
        ui.separator();

        // ===== Filters Section =====
        ui.label(RichText::new("🔍 Filters").size(14.0).strong());
        ui.add_space(5.0);
        if self.has_date {
            let valid = self.parsed_range().is_some();
            for (label, value) in [
                ("Start Date:", &mut self.settings.start_date),
                ("End Date:", &mut self.settings.end_date),
            ] {
                ui.horizontal(|ui| {
                    ui.add_sized([80.0, 20.0], egui::Label::new(label));
                    let edit = egui::TextEdit::singleline(value)
                        .hint_text("YYYY-MM-DD")
                        .desired_width(110.0);
                    if ui.add(edit).changed() {
                        action = ControlPanelAction::SelectionChanged;
                    }
                });
            }
            if !valid {
                ui.label(
                    RichText::new("Invalid date; showing full range")
                        .size(11.0)
                        .color(Color32::from_rgb(220, 53, 69)),
                );
            }
            if ui.small_button("Reset range").clicked() {
                action = ControlPanelAction::ResetDates;
            }
        } else {
            ui.label(RichText::new("No Date column").size(11.0).color(Color32::GRAY));
        }

        ui.add_space(10.0);
        ui.separator();

        // ===== Correlation Columns Section =====
        ui.label(RichText::new("🧠 Heatmap Columns").size(14.0).strong());
        ui.add_space(5.0);
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(5.0)
            .show(ui, |ui| {
                ScrollArea::vertical()
                    .id_salt("numeric_columns")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for (i, col) in self.numeric_columns.iter().enumerate() {
                            if i < self.selected_numeric.len()
                                && ui.checkbox(&mut self.selected_numeric[i], col).changed()
                            {
                                action = ControlPanelAction::SelectionChanged;
                            }
                        }
                    });
            });
        ui.horizontal(|ui| {
            if ui.small_button("Select All").clicked() {
                self.selected_numeric.iter_mut().for_each(|v| *v = true);
                action = ControlPanelAction::SelectionChanged;
            }
            if ui.small_button("Clear All").clicked() {
                self.selected_numeric.iter_mut().for_each(|v| *v = false);
                action = ControlPanelAction::SelectionChanged;
            }
        });

        ui.add_space(10.0);
        ui.separator();

        // ===== Query Section =====
        ui.label(RichText::new("🗄 SQL Query").size(14.0).strong());
        ui.add_space(5.0);
        if !self.store_columns.is_empty() {
            ui.collapsing("Table columns", |ui| {
                for column in &self.store_columns {
                    ui.label(
                        RichText::new(format!("{} ({})", column.name, column.decl_type))
                            .size(11.0),
                    );
                }
            });
        }
        ui.add(
            egui::TextEdit::multiline(&mut self.settings.query)
                .code_editor()
                .hint_text("SELECT * FROM sales LIMIT 10")
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );
        ui.add_enabled_ui(self.source_label.is_some(), |ui| {
            if ui.button("▶ Run Query").clicked() {
                action = ControlPanelAction::RunQuery;
            }
        });

        ui.add_space(10.0);
        ui.separator();

        // ===== Action Buttons =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.can_export, |ui| {
                let button = egui::Button::new(RichText::new("📥 Download CSV").size(14.0))
                    .min_size(egui::vec2(180.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::ExportCsv;
                }
                ui.add_space(5.0);
                if ui.button("🖼 Save Charts").clicked() {
                    action = ControlPanelAction::SaveCharts;
                }
            });
        });

        ui.add_space(10.0);
        let status_color = if self.status.contains("Error") || self.status.contains("⚠") {
            Color32::from_rgb(220, 53, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseCsv,
    StoreToggled,
    SelectionChanged,
    ResetDates,
    RunQuery,
    ExportCsv,
    SaveCharts,
}
