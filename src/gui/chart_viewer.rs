//! Chart Viewer Widget
//! Central scrollable panel: title, preview, KPI row, charts and query output.

use crate::charts::ChartPlotter;
use crate::data::loader::preview;
use crate::data::ResolvedSource;
use crate::pipeline::DerivedViews;
use crate::stats::{Breakdown, CorrelationView};
use egui::{Color32, RichText, ScrollArea};
use polars::prelude::*;

const SECTION_SPACING: f32 = 15.0;
const CARD_WIDTH: f32 = 420.0;
const WARNING_COLOR: Color32 = Color32::from_rgb(255, 193, 7);
const ERROR_COLOR: Color32 = Color32::from_rgb(220, 53, 69);

/// What the central panel should draw this frame.
pub struct ViewerContent<'a> {
    pub source: Option<&'a ResolvedSource>,
    pub views: Option<&'a DerivedViews>,
    pub query: Option<&'a Result<DataFrame, String>>,
    /// Fatal message; when set nothing else is drawn.
    pub unavailable: Option<&'a str>,
    pub render_error: Option<&'a str>,
}

pub struct ChartViewer {
    title: String,
    preview_rows: usize,
}

impl ChartViewer {
    pub fn new(title: &str, preview_rows: usize) -> Self {
        Self {
            title: title.to_string(),
            preview_rows,
        }
    }

    pub fn show(&self, ui: &mut egui::Ui, content: ViewerContent<'_>) {
        ui.label(RichText::new(&self.title).size(22.0).strong());
        ui.add_space(8.0);

        if let Some(message) = content.unavailable {
            ui.label(RichText::new(format!("⚠ {}", message)).size(16.0).color(WARNING_COLOR));
            return;
        }
        let Some(source) = content.source else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Loading data...").size(20.0));
            });
            return;
        };

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.label(
                    RichText::new(format!("✓ {}: {}", source.origin, source.label))
                        .color(Color32::from_rgb(40, 167, 69)),
                );
                ui.add_space(SECTION_SPACING);

                ui.collapsing("Data Preview", |ui| {
                    let head = preview(&source.table, self.preview_rows);
                    ChartPlotter::draw_table(ui, "preview_table", &head, self.preview_rows);
                });
                ui.add_space(SECTION_SPACING);

                if let Some(error) = content.render_error {
                    ui.label(RichText::new(format!("Error: {}", error)).color(ERROR_COLOR));
                } else if let Some(views) = content.views {
                    Self::draw_views(ui, views);
                }

                if let Some(query) = content.query {
                    ui.add_space(SECTION_SPACING);
                    ui.separator();
                    ui.label(RichText::new("Query Results").size(16.0).strong());
                    match query {
                        Ok(df) => {
                            ui.label(
                                RichText::new(format!("{} rows", df.height()))
                                    .size(11.0)
                                    .color(Color32::GRAY),
                            );
                            ChartPlotter::draw_table(ui, "query_table", df, 200);
                        }
                        Err(message) => {
                            ui.label(
                                RichText::new(format!("Query failed: {}", message))
                                    .color(ERROR_COLOR),
                            );
                        }
                    }
                }
            });
    }

    fn draw_views(ui: &mut egui::Ui, views: &DerivedViews) {
        if let Some(range) = views.applied_range {
            ui.label(
                RichText::new(format!(
                    "Showing {} rows for {}",
                    views.filtered.height(),
                    range
                ))
                .size(12.0)
                .color(Color32::GRAY),
            );
            ui.add_space(6.0);
        }

        // KPI row
        ui.horizontal(|ui| {
            Self::kpi_card(ui, "Total Revenue", views.kpis.total_revenue.as_currency());
            Self::kpi_card(ui, "Total Orders", views.kpis.total_orders.to_string());
            Self::kpi_card(
                ui,
                "Avg Order Value",
                views.kpis.average_order_value.as_currency(),
            );
        });
        if views.kpis.total_revenue.value().is_none() {
            Self::placeholder(ui, "No revenue or sales column found.");
        }
        ui.add_space(SECTION_SPACING);

        ui.horizontal_top(|ui| {
            Self::card(ui, "Sales by Category", |ui| match &views.category {
                Breakdown::Available(groups) if !groups.is_empty() => {
                    ChartPlotter::draw_category_chart(ui, groups)
                }
                Breakdown::Available(_) => Self::placeholder(ui, "No rows in the selected range."),
                Breakdown::Unavailable => {
                    Self::placeholder(ui, "Category or revenue column not available.")
                }
            });
            ui.add_space(SECTION_SPACING);
            Self::card(ui, "Sales by Region", |ui| match &views.region {
                Breakdown::Available(groups) if !groups.is_empty() => {
                    ChartPlotter::draw_region_pie(ui, groups)
                }
                Breakdown::Available(_) => Self::placeholder(ui, "No rows in the selected range."),
                Breakdown::Unavailable => {
                    Self::placeholder(ui, "Region or revenue column not available.")
                }
            });
        });
        ui.add_space(SECTION_SPACING);

        Self::card(ui, "Correlation Heatmap", |ui| match &views.correlation {
            CorrelationView::Matrix(matrix) => ChartPlotter::draw_heatmap(ui, matrix),
            CorrelationView::InsufficientData => {
                Self::placeholder(ui, "Not enough numeric columns for a correlation heatmap.")
            }
            CorrelationView::CouldNotBeGenerated => {
                Self::placeholder(ui, "Correlation matrix could not be generated.")
            }
        });
    }

    fn kpi_card(ui: &mut egui::Ui, label: &str, value: String) {
        egui::Frame::none()
            .rounding(8.0)
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_min_width(180.0);
                ui.vertical(|ui| {
                    ui.label(RichText::new(label).size(12.0).color(Color32::GRAY));
                    ui.label(RichText::new(value).size(20.0).strong());
                });
            });
    }

    fn card(ui: &mut egui::Ui, title: &str, body: impl FnOnce(&mut egui::Ui)) {
        egui::Frame::none()
            .rounding(8.0)
            .stroke(egui::Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color))
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(CARD_WIDTH);
                ui.label(RichText::new(title).size(16.0).strong());
                ui.add_space(8.0);
                body(ui);
            });
    }

    fn placeholder(ui: &mut egui::Ui, message: &str) {
        ui.label(RichText::new(message).italics().color(WARNING_COLOR));
    }
}
