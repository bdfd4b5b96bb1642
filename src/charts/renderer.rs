//! Static Chart Renderer
//! Draws the dashboard charts straight into RGBA buffers and encodes PNGs.
//!
//! Charts:
//! 1. Revenue by category: vertical bars on a light grid
//! 2. Revenue share by region: pie, first slice starting at 12 o'clock
//! 3. Correlation heatmap: one coolwarm cell per coefficient

use crate::charts::{coolwarm, palette_color, BAR_COLOR};
use crate::pipeline::DerivedViews;
use crate::stats::{CorrelationMatrix, CorrelationView, GroupTotal};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRAY: Rgba<u8> = Rgba([220, 220, 220, 255]); // Grid lines

const MARGIN: u32 = 30;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

fn rgba(c: [u8; 3]) -> Rgba<u8> {
    Rgba([c[0], c[1], c[2], 255])
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Bars scaled to the largest magnitude, baseline at zero.
    pub fn render_bar_chart(groups: &[GroupTotal], width: u32, height: u32) -> RgbaImage {
        let mut img = ImageBuffer::from_pixel(width, height, WHITE);
        if width <= 2 * MARGIN || height <= 2 * MARGIN {
            return img;
        }
        let plot_w = width - 2 * MARGIN;
        let plot_h = height - 2 * MARGIN;

        let y_max = groups.iter().map(|g| g.total).fold(0.0_f64, f64::max);
        let y_min = groups.iter().map(|g| g.total).fold(0.0_f64, f64::min);
        let (y_min, y_max) = if y_max - y_min > 0.0 {
            (y_min, y_max)
        } else {
            (0.0, 1.0)
        };

        // Grid
        let step = Self::nice_step(y_max - y_min, 5);
        let mut tick = (y_min / step).ceil() * step;
        while tick <= y_max {
            let y = Self::map_y(tick, y_min, y_max, MARGIN, plot_h);
            Self::fill_rect(&mut img, MARGIN, y, plot_w, 1, GRAY);
            tick += step;
        }

        if !groups.is_empty() {
            let slot = plot_w as f64 / groups.len() as f64;
            let bar_w = ((slot * 0.6) as u32).max(1);
            let zero_y = Self::map_y(0.0, y_min, y_max, MARGIN, plot_h);
            for (i, group) in groups.iter().enumerate() {
                let x = MARGIN + (slot * i as f64 + (slot - bar_w as f64) / 2.0) as u32;
                let top = Self::map_y(group.total, y_min, y_max, MARGIN, plot_h);
                let (y0, y1) = if top <= zero_y { (top, zero_y) } else { (zero_y, top) };
                Self::fill_rect(&mut img, x, y0, bar_w, (y1 - y0).max(1), rgba(BAR_COLOR));
            }
        }

        // Axes
        Self::fill_rect(&mut img, MARGIN, MARGIN, 1, plot_h, BLACK);
        let zero_y = Self::map_y(0.0, y_min, y_max, MARGIN, plot_h);
        Self::fill_rect(&mut img, MARGIN, zero_y, plot_w, 1, BLACK);
        img
    }

    /// Pie of each group's share, counter-clockwise from the top.
    pub fn render_pie_chart(groups: &[GroupTotal], size: u32) -> RgbaImage {
        let mut img = ImageBuffer::from_pixel(size, size, WHITE);
        let total: f64 = groups.iter().map(|g| g.total.max(0.0)).sum();
        if total <= 0.0 {
            return img;
        }

        // Cumulative end angle of each slice, measured from 12 o'clock.
        let mut ends = Vec::with_capacity(groups.len());
        let mut acc = 0.0;
        for group in groups {
            acc += group.total.max(0.0) / total * TAU;
            ends.push(acc);
        }

        let center = size as f64 / 2.0;
        let radius = center - MARGIN as f64 / 2.0;
        for y in 0..size {
            for x in 0..size {
                let dx = x as f64 + 0.5 - center;
                let dy = center - (y as f64 + 0.5);
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let angle = (dy.atan2(dx) - FRAC_PI_2).rem_euclid(TAU);
                let slice = ends.iter().position(|&end| angle < end).unwrap_or(ends.len() - 1);
                img.put_pixel(x, y, rgba(palette_color(slice)));
            }
        }
        img
    }

    /// Square cells in matrix order; undefined coefficients are gray.
    pub fn render_heatmap(matrix: &CorrelationMatrix, cell: u32) -> RgbaImage {
        let n = matrix.columns.len() as u32;
        let side = n * cell + 2 * MARGIN;
        let mut img = ImageBuffer::from_pixel(side, side, WHITE);
        for row in 0..n {
            for col in 0..n {
                let color = coolwarm(matrix.get(row as usize, col as usize));
                Self::fill_rect(
                    &mut img,
                    MARGIN + col * cell,
                    MARGIN + row * cell,
                    cell.saturating_sub(1).max(1),
                    cell.saturating_sub(1).max(1),
                    rgba(color),
                );
            }
        }
        img
    }

    pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Write every available chart into `dir`, returning the written paths.
    pub fn save_all(views: &DerivedViews, dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
        fs::create_dir_all(dir)?;
        let mut images: Vec<(&str, RgbaImage)> = Vec::new();

        if !views.category.groups().is_empty() {
            images.push((
                "category_sales.png",
                Self::render_bar_chart(views.category.groups(), 800, 400),
            ));
        }
        if !views.region.groups().is_empty() {
            images.push((
                "region_sales.png",
                Self::render_pie_chart(views.region.groups(), 400),
            ));
        }
        if let CorrelationView::Matrix(matrix) = &views.correlation {
            images.push(("correlation_heatmap.png", Self::render_heatmap(matrix, 60)));
        }

        let mut written = Vec::with_capacity(images.len());
        for (name, img) in images {
            let path = dir.join(name);
            fs::write(&path, Self::encode_png(&img)?)?;
            written.push(path);
        }
        tracing::info!("Saved {} chart images to {}", written.len(), dir.display());
        Ok(written)
    }

    // Helper functions
    fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
        let x_end = (x + w).min(img.width());
        let y_end = (y + h).min(img.height());
        for py in y..y_end {
            for px in x..x_end {
                img.put_pixel(px, py, color);
            }
        }
    }

    fn map_y(val: f64, y_min: f64, y_max: f64, plot_y: u32, plot_h: u32) -> u32 {
        let ratio = ((val - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
        plot_y + plot_h - (ratio * plot_h as f64) as u32
    }

    fn nice_step(range: f64, target_steps: usize) -> f64 {
        let raw_step = range / target_steps as f64;
        let magnitude = 10f64.powf(raw_step.log10().floor());
        let normalized = raw_step / magnitude;

        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };

        nice * magnitude
    }
}
