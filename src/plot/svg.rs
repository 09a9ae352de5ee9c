//! Plotters-powered SVG rendering of chart specifications.
//!
//! Renderers are data-driven: every series, bin and bound is already computed in
//! the `ChartSpec` (or derived from it by `charts::aggregate`), so this module
//! only draws.

use std::f64::consts::PI;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::charts::aggregate::stack_bins;
use crate::domain::{ChartData, ChartSpec, DensityGrid, PieSlice, StatusSeries, YearPoint, HISTOGRAM_BINS};
use crate::error::{AppError, ErrorKind};

pub const DEFAULT_WIDTH: u32 = 900;
pub const DEFAULT_HEIGHT: u32 = 420;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type DrawResult = Result<(), Box<dyn std::error::Error>>;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);
const TEXT_GRAY: RGBColor = RGBColor(110, 110, 110);
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Colors for slices and for statuses outside the fixed enumeration.
const PALETTE: [RGBColor; 10] = [
    RGBColor(99, 110, 250),
    RGBColor(239, 85, 59),
    RGBColor(0, 204, 150),
    RGBColor(171, 99, 250),
    RGBColor(255, 161, 90),
    RGBColor(25, 211, 243),
    RGBColor(255, 102, 146),
    RGBColor(182, 232, 128),
    RGBColor(255, 151, 255),
    RGBColor(254, 203, 82),
];

/// Render a chart to a standalone, responsive SVG document.
pub fn render_chart_svg(spec: &ChartSpec, width: u32, height: u32) -> Result<String, AppError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_chart(&root, spec).map_err(|e| {
            AppError::new(
                ErrorKind::Render,
                format!("Failed to render chart '{}': {e}", spec.id.slug()),
            )
        })?;
    }
    Ok(make_svg_responsive(svg, width, height))
}

fn draw_chart(root: &Area<'_>, spec: &ChartSpec) -> DrawResult {
    root.fill(&WHITE)?;

    if spec.is_empty() {
        draw_no_data(root, &spec.title)?;
    } else {
        match &spec.data {
            ChartData::Histogram { series } => draw_histogram(root, spec, series)?,
            ChartData::DensityHeatmap { grid } => draw_heatmap(root, spec, grid)?,
            ChartData::Pie { slices } => draw_pie(root, &spec.title, slices)?,
            ChartData::Line { points } => draw_line(root, spec, points)?,
        }
    }

    root.present()?;
    Ok(())
}

fn draw_no_data(root: &Area<'_>, title: &str) -> DrawResult {
    let area = root.titled(title, CAPTION_FONT)?;
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        "No data",
        (w as i32 / 2 - 28, h as i32 / 2),
        ("sans-serif", 16).into_font().color(&TEXT_GRAY),
    ))?;
    Ok(())
}

fn draw_histogram(root: &Area<'_>, spec: &ChartSpec, series: &[StatusSeries]) -> DrawResult {
    let bins = stack_bins(series, HISTOGRAM_BINS);
    if bins.edges.len() < 2 {
        return draw_no_data(root, &spec.title);
    }
    let edges = &bins.edges;
    let n_bins = edges.len() - 1;
    let y_max = (f64::from(bins.max_stack()) * 1.05).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(edges[0]..edges[n_bins], 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(spec.x_label.clone())
        .y_desc(spec.y_label.clone())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .draw()?;

    // Stack each status on top of the ones drawn before it.
    let mut base = vec![0u32; n_bins];
    for (idx, s) in series.iter().enumerate() {
        let color = series_color(s.color.as_deref(), idx);
        let counts = &bins.counts[idx];
        let bars: Vec<Rectangle<(f64, f64)>> = (0..n_bins)
            .filter(|&b| counts[b] > 0)
            .map(|b| {
                let lo = f64::from(base[b]);
                let hi = lo + f64::from(counts[b]);
                Rectangle::new([(edges[b], lo), (edges[b + 1], hi)], color.filled())
            })
            .collect();
        for (acc, c) in base.iter_mut().zip(counts) {
            *acc += c;
        }

        chart
            .draw_series(bars)?
            .label(s.status.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .label_font(("sans-serif", 11))
        .draw()?;

    Ok(())
}

fn draw_heatmap(root: &Area<'_>, spec: &ChartSpec, grid: &DensityGrid) -> DrawResult {
    let (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) = (
        grid.x_edges.first(),
        grid.x_edges.last(),
        grid.y_edges.first(),
        grid.y_edges.last(),
    ) else {
        return draw_no_data(root, &spec.title);
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(spec.x_label.clone())
        .y_desc(spec.y_label.clone())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .draw()?;

    let max = f64::from(grid.max_count().max(1));
    let mut cells = Vec::new();
    for (yi, row) in grid.counts.iter().enumerate() {
        for (xi, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            cells.push(Rectangle::new(
                [
                    (grid.x_edges[xi], grid.y_edges[yi]),
                    (grid.x_edges[xi + 1], grid.y_edges[yi + 1]),
                ],
                heat_color(f64::from(count) / max).filled(),
            ));
        }
    }
    chart.draw_series(cells)?;

    Ok(())
}

fn draw_pie(root: &Area<'_>, title: &str, slices: &[PieSlice]) -> DrawResult {
    let area = root.titled(title, CAPTION_FONT)?;
    let (w, h) = area.dim_in_pixel();
    let (pie_area, legend_area) = area.split_horizontally((w * 3 / 5) as i32);

    let (pw, ph) = pie_area.dim_in_pixel();
    let (cx, cy) = (pw as i32 / 2, ph as i32 / 2);
    let radius = f64::from(pw.min(ph)) * 0.42;
    let total: u64 = slices.iter().map(|s| s.count).sum();
    let total = total.max(1) as f64;

    let legend_rows = ((h.saturating_sub(30)) / 18).max(1) as usize;
    let mut start = -PI / 2.0;

    for (idx, slice) in slices.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let share = slice.count as f64 / total;
        let sweep = 2.0 * PI * share;

        let steps = ((share * 120.0).ceil() as usize).max(2);
        let mut outline = Vec::with_capacity(steps + 2);
        outline.push((cx, cy));
        for s in 0..=steps {
            let a = start + sweep * s as f64 / steps as f64;
            outline.push((
                cx + (radius * a.cos()).round() as i32,
                cy + (radius * a.sin()).round() as i32,
            ));
        }
        pie_area.draw(&Polygon::new(outline, color.filled()))?;
        start += sweep;

        if idx < legend_rows {
            let y = 10 + idx as i32 * 18;
            legend_area.draw(&Rectangle::new([(4, y), (16, y + 12)], color.filled()))?;
            legend_area.draw(&Text::new(
                format!("{} ({:.1}%)", slice.label, share * 100.0),
                (22, y),
                ("sans-serif", 13),
            ))?;
        } else if idx == legend_rows {
            let y = 10 + idx as i32 * 18;
            legend_area.draw(&Text::new(
                format!("… {} more", slices.len() - legend_rows),
                (22, y),
                ("sans-serif", 13).into_font().color(&TEXT_GRAY),
            ))?;
        }
    }

    Ok(())
}

fn draw_line(root: &Area<'_>, spec: &ChartSpec, points: &[YearPoint]) -> DrawResult {
    let (x0, x1) = year_bounds(points);
    let y_hi = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let y_lo = points.iter().map(|p| p.value).fold(0.0_f64, f64::min);
    let y_hi = if y_hi > y_lo { y_hi * 1.1 } else { y_lo + 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, CAPTION_FONT)
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y_lo..y_hi)?;

    let year_span = (x1 - x0).round() as usize;
    chart
        .configure_mesh()
        .x_desc(spec.x_label.clone())
        .y_desc(spec.y_label.clone())
        .x_labels(year_span.clamp(2, 12))
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .draw()?;

    let series: Vec<(f64, f64)> = points.iter().map(|p| (f64::from(p.year), p.value)).collect();
    chart.draw_series(LineSeries::new(
        series.iter().copied(),
        ShapeStyle::from(&LINE_COLOR).stroke_width(2),
    ))?;
    chart.draw_series(
        series
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, LINE_COLOR.filled())),
    )?;

    Ok(())
}

/// X range covering every year, padded by half a year on each side.
fn year_bounds(points: &[YearPoint]) -> (f64, f64) {
    let lo = points.iter().map(|p| p.year).min().unwrap_or(0);
    let hi = points.iter().map(|p| p.year).max().unwrap_or(0);
    (f64::from(lo) - 0.5, f64::from(hi) + 0.5)
}

/// Legend color for a status: its fixed color, else a palette color.
fn series_color(name: Option<&str>, idx: usize) -> RGBColor {
    name.and_then(css_color)
        .unwrap_or(PALETTE[idx % PALETTE.len()])
}

/// RGB values for the CSS color names used by the status enumeration.
pub fn css_color(name: &str) -> Option<RGBColor> {
    let rgb = match name {
        "blue" => RGBColor(0, 0, 255),
        "red" => RGBColor(255, 0, 0),
        "orange" => RGBColor(255, 165, 0),
        "yellow" => RGBColor(255, 255, 0),
        "purple" => RGBColor(128, 0, 128),
        "black" => RGBColor(0, 0, 0),
        "magenta" => RGBColor(255, 0, 255),
        "green" => RGBColor(0, 128, 0),
        "lightblue" => RGBColor(173, 216, 230),
        _ => return None,
    };
    Some(rgb)
}

/// Light-to-dark blue ramp for `t` in `0..=1`.
fn heat_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(lerp(222, 8), lerp(235, 48), lerp(247, 107))
}

/// Let the SVG scale with its container instead of a fixed pixel size.
fn make_svg_responsive(svg: String, width: u32, height: u32) -> String {
    let needle = format!("width=\"{width}\" height=\"{height}\"");
    if !svg.contains(&needle) {
        return svg;
    }
    let replacement = if svg.contains("viewBox=") {
        "width=\"100%\" preserveAspectRatio=\"xMidYMid meet\"".to_string()
    } else {
        format!("viewBox=\"0 0 {width} {height}\" width=\"100%\" preserveAspectRatio=\"xMidYMid meet\"")
    };
    svg.replacen(&needle, &replacement, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::build;
    use crate::domain::{ChartId, LoanRow};

    fn rows() -> Vec<LoanRow> {
        (0..40)
            .map(|i| LoanRow {
                grade: Some("C".to_string()),
                loan_amnt: Some(1000.0 + f64::from(i) * 250.0),
                int_rate: Some(12.0 + f64::from(i % 7) * 0.5),
                loan_status: Some(if i % 5 == 0 { "Charged Off" } else { "Fully Paid" }.to_string()),
                purpose: Some(if i % 3 == 0 { "car" } else { "credit_card" }.to_string()),
                issue_d: Some(format!("{}-03-01", 2010 + i % 4)),
                earliest_cr_line: Some(format!("Jan-{}", 1995 + i % 6)),
            })
            .collect()
    }

    #[test]
    fn every_chart_kind_renders_to_svg() {
        let rows = rows();
        for id in ChartId::ALL {
            let spec = build::build_chart(id, "C", &rows);
            let svg = render_chart_svg(&spec, DEFAULT_WIDTH, DEFAULT_HEIGHT).unwrap();
            assert!(svg.contains("<svg"), "{id:?} did not produce svg");
            assert_eq!(svg.matches("viewBox=").count(), 1);
            assert!(svg.contains("viewBox=\"0 0 900 420\""));
            assert!(svg.contains("width=\"100%\""));
            assert!(svg.contains("</svg>"));
        }
    }

    #[test]
    fn empty_chart_renders_placeholder() {
        let spec = build::issuance(&[]);
        let svg = render_chart_svg(&spec, 400, 300).unwrap();
        assert!(svg.contains("No data"));
        assert!(svg.contains("(No Data)"));
    }

    #[test]
    fn status_colors_are_known() {
        for status in crate::domain::LoanStatus::ALL {
            assert!(css_color(status.color()).is_some(), "{}", status.color());
        }
        assert_eq!(series_color(None, 0), PALETTE[0]);
        assert_eq!(series_color(Some("red"), 3), RGBColor(255, 0, 0));
    }

    #[test]
    fn heat_ramp_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(222, 235, 247));
        assert_eq!(heat_color(1.0), RGBColor(8, 48, 107));
        assert_eq!(heat_color(7.0), RGBColor(8, 48, 107));
    }
}
