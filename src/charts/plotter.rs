//! Chart Plotter Module
//! Interactive dashboard charts using egui_plot and the egui painter.

use crate::charts::{coolwarm, palette_color, BAR_COLOR};
use crate::data::loader::cell_text;
use crate::stats::{format_currency, CorrelationMatrix, GroupTotal};
use egui::{Align2, Color32, FontId, RichText, Sense, Shape, Stroke};
use egui_plot::{Bar, BarChart, Plot};
use polars::prelude::*;
use std::f32::consts::{FRAC_PI_2, TAU};

fn color32(c: [u8; 3]) -> Color32 {
    Color32::from_rgb(c[0], c[1], c[2])
}

/// Creates the dashboard visualizations.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Bar chart of revenue per category, in breakdown order.
    pub fn draw_category_chart(ui: &mut egui::Ui, groups: &[GroupTotal]) {
        let labels: Vec<String> = groups.iter().map(|g| g.key.clone()).collect();
        let bars: Vec<Bar> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| Bar::new(i as f64, g.total).width(0.6).name(&g.key))
            .collect();

        Plot::new("category_revenue")
            .height(260.0)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .y_axis_label("Revenue")
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round();
                if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(
                    BarChart::new(bars)
                        .color(color32(BAR_COLOR))
                        .name("Revenue by Category"),
                );
            });
    }

    /// Pie chart of each region's share with percentage labels.
    pub fn draw_region_pie(ui: &mut egui::Ui, groups: &[GroupTotal]) {
        let size = ui.available_width().min(300.0);
        let (response, painter) = ui.allocate_painter(egui::vec2(size, size), Sense::hover());
        let center = response.rect.center();
        let radius = size * 0.42;
        let point = |angle: f32, r: f32| center + egui::vec2(r * angle.cos(), -r * angle.sin());

        let mut start = FRAC_PI_2;
        for (i, group) in groups.iter().enumerate() {
            let sweep = group.share.max(0.0) as f32 * TAU;
            if sweep <= 0.0 {
                continue;
            }
            let color = color32(palette_color(i));
            // Fan of thin triangles; each stays convex however wide the slice.
            let steps = ((sweep / 0.05).ceil() as usize).max(2);
            for k in 0..steps {
                let a0 = start + sweep * k as f32 / steps as f32;
                let a1 = start + sweep * (k + 1) as f32 / steps as f32;
                painter.add(Shape::convex_polygon(
                    vec![center, point(a0, radius), point(a1, radius)],
                    color,
                    Stroke::NONE,
                ));
            }

            let mid = start + sweep / 2.0;
            painter.text(
                point(mid, radius * 0.65),
                Align2::CENTER_CENTER,
                format!("{:.1}%", group.share * 100.0),
                FontId::proportional(12.0),
                Color32::WHITE,
            );
            start += sweep;
        }

        ui.horizontal_wrapped(|ui| {
            for (i, group) in groups.iter().enumerate() {
                ui.label(RichText::new("■").color(color32(palette_color(i))));
                ui.label(format!("{} ({})", group.key, format_currency(group.total)));
            }
        });
    }

    /// Annotated correlation heatmap.
    pub fn draw_heatmap(ui: &mut egui::Ui, matrix: &CorrelationMatrix) {
        let n = matrix.columns.len();
        if n == 0 {
            return;
        }
        let label_w = 110.0;
        let cell = ((ui.available_width() - label_w) / n as f32).clamp(28.0, 70.0);
        let side = label_w + cell * n as f32;
        let (response, painter) =
            ui.allocate_painter(egui::vec2(side, side + 20.0), Sense::hover());
        let origin = response.rect.min + egui::vec2(label_w, 20.0);
        let text_color = ui.visuals().text_color();

        for (j, name) in matrix.columns.iter().enumerate() {
            painter.text(
                origin + egui::vec2(cell * (j as f32 + 0.5), -10.0),
                Align2::CENTER_CENTER,
                Self::truncate(name, (cell / 7.0) as usize),
                FontId::proportional(10.0),
                text_color,
            );
        }

        for (i, name) in matrix.columns.iter().enumerate() {
            painter.text(
                origin + egui::vec2(-6.0, cell * (i as f32 + 0.5)),
                Align2::RIGHT_CENTER,
                Self::truncate(name, 16),
                FontId::proportional(11.0),
                text_color,
            );
            for j in 0..n {
                let r = matrix.get(i, j);
                let rect = egui::Rect::from_min_size(
                    origin + egui::vec2(cell * j as f32, cell * i as f32),
                    egui::vec2(cell - 1.0, cell - 1.0),
                );
                painter.rect_filled(rect, 0.0, color32(coolwarm(r)));
                let annotation = if r.is_nan() {
                    "-".to_string()
                } else {
                    format!("{:.2}", r)
                };
                let ink = if r.abs() > 0.6 {
                    Color32::WHITE
                } else {
                    Color32::BLACK
                };
                painter.text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    annotation,
                    FontId::proportional(11.0),
                    ink,
                );
            }
        }
    }

    /// Plain table of the first `max_rows` rows.
    pub fn draw_table(ui: &mut egui::Ui, id: &str, df: &DataFrame, max_rows: usize) {
        egui::ScrollArea::horizontal()
            .id_salt(id)
            .show(ui, |ui| {
                egui::Grid::new(id)
                    .striped(true)
                    .min_col_width(55.0)
                    .spacing([8.0, 4.0])
                    .show(ui, |ui| {
                        for column in df.get_columns() {
                            ui.label(RichText::new(column.name().as_str()).strong().size(11.0));
                        }
                        ui.end_row();

                        for row in 0..df.height().min(max_rows) {
                            for column in df.get_columns() {
                                ui.label(RichText::new(cell_text(column, row)).size(11.0));
                            }
                            ui.end_row();
                        }
                    });
            });
        if df.height() > max_rows {
            ui.label(
                RichText::new(format!("… {} more rows", df.height() - max_rows))
                    .size(10.0)
                    .color(Color32::GRAY),
            );
        }
    }

    fn truncate(text: &str, max_chars: usize) -> String {
        let max_chars = max_chars.max(3);
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let mut out: String = text.chars().take(max_chars - 1).collect();
            out.push('…');
            out
        }
    }
}
