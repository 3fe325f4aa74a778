// PNG renderings for /stat: the yearly heatmap and charts-rs bar charts

use std::collections::BTreeMap;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use charts_rs::{svg_to_png, BarChart, Box as ChartBox, Color, Series, THEME_DARK};
use chrono::{Datelike, Duration, NaiveDate};
use image::{ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::error::{AyumiError, Result};
use crate::utils::formatters::format_points_short;

const BACKGROUND: Rgba<u8> = Rgba([0x2c, 0x2c, 0x2d, 255]);
const LABEL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MUTED: Rgba<u8> = Rgba([150, 150, 150, 255]);
const TODAY_OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Empty day first, then eight intensities
const PALETTE: [Rgba<u8>; 9] = [
    Rgba([0x22, 0x22, 0x22, 255]),
    Rgba([0x0e, 0x44, 0x29, 255]),
    Rgba([0x00, 0x6d, 0x32, 255]),
    Rgba([0x26, 0xa6, 0x41, 255]),
    Rgba([0x39, 0xd3, 0x53, 255]),
    Rgba([0x5b, 0xe3, 0x6b, 255]),
    Rgba([0x85, 0xee, 0x8f, 255]),
    Rgba([0xae, 0xf7, 0xad, 255]),
    Rgba([0xd1, 0xff, 0xcd, 255]),
];

const CELL: u32 = 14;
const GAP: u32 = 3;
const PAD_LEFT: u32 = 40;
const PAD_TOP: u32 = 65;
const PAD_RIGHT: u32 = 30;
const PAD_BOTTOM: u32 = 75;

const MONTHS: [&str; 12] = ["1月", "2月", "3月", "4月", "5月", "6月", "7月", "8月", "9月", "10月", "11月", "12月"];
const WEEKDAYS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// Reads a TTF for labels. Without one the heatmap is drawn unlabeled.
pub fn load_font(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Heatmap font {} unavailable: {}", path.display(), e);
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Heatmap font {} is not a valid font: {}", path.display(), e);
            None
        }
    }
}

/// Palette index for a day, log-scaled against the busiest day
pub fn heat_level(points: i64, max_points: i64) -> usize {
    if points <= 0 {
        return 0;
    }
    if max_points <= 1 {
        return 1;
    }
    let ratio = (points as f64 + 1.0).ln() / (max_points as f64 + 1.0).ln();
    (1 + (ratio * 7.0).round() as usize).clamp(1, PALETTE.len() - 1)
}

/// Monday on or before January 1st
pub fn grid_start(year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    Some(jan1 - Duration::days(i64::from(jan1.weekday().num_days_from_monday())))
}

/// Week column and weekday row of `date` in a grid starting at `start`
pub fn cell_position(date: NaiveDate, start: NaiveDate) -> (u32, u32) {
    let col = ((date - start).num_days() / 7) as u32;
    (col, date.weekday().num_days_from_monday())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapSummary {
    pub active_days: usize,
    pub total_points: i64,
    pub average: f64,
}

pub fn summarize(daily_points: &BTreeMap<NaiveDate, i64>) -> HeatmapSummary {
    let active_days = daily_points.values().filter(|p| **p > 0).count();
    let total_points: i64 = daily_points.values().sum();
    HeatmapSummary {
        active_days,
        total_points,
        average: if active_days > 0 { total_points as f64 / active_days as f64 } else { 0.0 },
    }
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| AyumiError::Render(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}

/// GitHub-style calendar of daily points for `year`
pub fn render_heatmap(
    daily_points: &BTreeMap<NaiveDate, i64>,
    year: i32,
    today: NaiveDate,
    font: Option<&FontArc>,
) -> Result<Vec<u8>> {
    let invalid = || AyumiError::Validation(format!("{year} is not a valid year"));
    let start = grid_start(year).ok_or_else(invalid)?;
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;

    let columns = cell_position(last, start).0 + 1;
    let width = PAD_LEFT + columns * (CELL + GAP) + PAD_RIGHT;
    let height = PAD_TOP + 7 * (CELL + GAP) + PAD_BOTTOM;
    let mut img = RgbaImage::from_pixel(width, height, BACKGROUND);

    let max_points = daily_points.values().copied().max().unwrap_or(0);
    let mut month_columns: [Option<u32>; 12] = [None; 12];

    for date in first.iter_days().take_while(|d| *d <= last) {
        let (col, row) = cell_position(date, start);
        let month = date.month0() as usize;
        month_columns[month].get_or_insert(col);

        let x = (PAD_LEFT + col * (CELL + GAP)) as i32;
        let y = (PAD_TOP + row * (CELL + GAP)) as i32;
        let points = daily_points.get(&date).copied().unwrap_or(0);

        if date == today {
            draw_hollow_rect_mut(&mut img, Rect::at(x - 2, y - 2).of_size(CELL + 4, CELL + 4), TODAY_OUTLINE);
        }
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(CELL, CELL), PALETTE[heat_level(points, max_points)]);
    }

    let legend_y = height - 35;
    let legend_x = PAD_LEFT + 35;
    for (i, color) in PALETTE.iter().enumerate() {
        let x = legend_x + i as u32 * 18;
        draw_filled_rect_mut(&mut img, Rect::at(x as i32, legend_y as i32).of_size(14, 14), *color);
    }

    if let Some(font) = font {
        let summary = summarize(daily_points);
        draw_text_mut(&mut img, LABEL, 15, 12, PxScale::from(18.0), font, &format!("Immersion Heatmap - {year}"));

        for (month, col) in month_columns.iter().enumerate() {
            if let Some(col) = col {
                let x = PAD_LEFT + col * (CELL + GAP);
                draw_text_mut(&mut img, LABEL, x as i32, 42, PxScale::from(13.0), font, MONTHS[month]);
            }
        }
        for (row, name) in WEEKDAYS.iter().enumerate() {
            let y = PAD_TOP + row as u32 * (CELL + GAP);
            draw_text_mut(&mut img, MUTED, 20, y as i32, PxScale::from(13.0), font, name);
        }

        let small = PxScale::from(12.0);
        draw_text_mut(&mut img, MUTED, (PAD_LEFT - 5) as i32, legend_y as i32, small, font, "Less");
        let more_x = legend_x + PALETTE.len() as u32 * 18 + 5;
        draw_text_mut(&mut img, MUTED, more_x as i32, legend_y as i32, small, font, "More");

        let stats_x = (width - PAD_RIGHT).saturating_sub(150) as i32;
        let base = (height - 30) as i32;
        let lines = [
            format!("{} days active", summary.active_days),
            format!("{} total points", format_points_short(summary.total_points as f64)),
            format!("{:.1} avg points/day", summary.average),
        ];
        for (i, line) in lines.iter().enumerate() {
            draw_text_mut(&mut img, MUTED, stats_x, base - 30 + i as i32 * 15, small, font, line);
        }
    }

    encode_png(&img)
}

/// One bar group per label, one series per media type
pub struct BarSeries {
    pub name: String,
    pub values: Vec<f32>,
    /// Hex colour; the theme palette is used unless every series has one
    pub color: Option<&'static str>,
}

fn series_colors(series: &[BarSeries]) -> Option<Vec<Color>> {
    series.iter().map(|s| s.color.map(Color::from)).collect()
}

pub fn render_bar_chart(title: &str, labels: Vec<String>, series: Vec<BarSeries>) -> Result<Vec<u8>> {
    if series.is_empty() || labels.is_empty() {
        return Err(AyumiError::Validation("Nothing to chart yet.".into()));
    }

    let colors = series_colors(&series);
    let series_list: Vec<Series> = series
        .into_iter()
        .map(|s| Series::new(s.name, s.values))
        .collect();

    let mut chart = BarChart::new_with_theme(series_list, labels, THEME_DARK);
    chart.width = 800.0;
    chart.height = 450.0;
    chart.title_text = title.to_string();
    chart.title_font_size = 22.0;
    if let Some(colors) = colors {
        chart.series_colors = colors;
    }
    chart.legend_show = Some(true);
    chart.legend_margin = Some(ChartBox {
        top: 45.0,
        bottom: 10.0,
        left: 10.0,
        right: 10.0,
    });

    let svg = chart
        .svg()
        .map_err(|e| AyumiError::Render(format!("SVG generation failed: {e:?}")))?;
    svg_to_png(&svg).map_err(|e| AyumiError::Render(format!("PNG conversion failed: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_heat_level_log_scale() {
        assert_eq!(heat_level(0, 500), 0);
        assert_eq!(heat_level(1, 1), 1);
        assert_eq!(heat_level(500, 500), 8);
        let mid = heat_level(20, 500);
        assert!(mid > 1 && mid < 8);
        assert!(heat_level(5, 500) <= heat_level(50, 500));
    }

    #[test]
    fn test_grid_is_monday_first() {
        // 2025-01-01 is a Wednesday
        let start = grid_start(2025).unwrap();
        assert_eq!(start, day(2024, 12, 30));
        assert_eq!(cell_position(day(2025, 1, 1), start), (0, 2));
        assert_eq!(cell_position(day(2025, 1, 6), start), (1, 0));
        assert_eq!(cell_position(day(2025, 12, 31), start).0, 52);
    }

    #[test]
    fn test_summary() {
        let mut points = BTreeMap::new();
        points.insert(day(2025, 1, 1), 30);
        points.insert(day(2025, 1, 2), 0);
        points.insert(day(2025, 1, 3), 10);
        let summary = summarize(&points);
        assert_eq!(summary.active_days, 2);
        assert_eq!(summary.total_points, 40);
        assert!((summary.average - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_heatmap_without_font() {
        let mut points = BTreeMap::new();
        points.insert(day(2024, 2, 29), 120);
        let png = render_heatmap(&points, 2024, day(2024, 3, 1), None).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_empty_bar_chart_is_rejected() {
        assert!(render_bar_chart("x", vec![], vec![]).is_err());
    }

    #[test]
    fn test_series_colors_need_every_series() {
        let series = |color| BarSeries { name: "s".into(), values: vec![1.0], color };
        let colored = series_colors(&[series(Some("#3498db")), series(Some("#e74c3c"))]);
        assert_eq!(colored.map(|c| c.len()), Some(2));
        assert!(series_colors(&[series(Some("#3498db")), series(None)]).is_none());
    }
}
