//! Terminal formatting of a dashboard cycle.
//!
//! Formatting lives here so the chart derivation stays free of presentation
//! and output changes stay local.

use crate::domain::{
    ChartData, ChartOutcome, ChartSpec, DashboardCharts, DensityGrid, GradeOption, PieSlice, StatusSeries, YearPoint,
};

const BAR_WIDTH: usize = 40;
const TOP_PURPOSES: usize = 8;

/// Format the full summary: header plus one block per chart.
pub fn format_dashboard_summary(charts: &DashboardCharts, grades: &[GradeOption]) -> String {
    let mut out = String::new();

    out.push_str("=== loandash - Loan Dashboard ===\n");
    out.push_str(&format!("Grade: {}\n", charts.grade));
    if !grades.is_empty() {
        let labels: Vec<&str> = grades.iter().map(|g| g.label.as_str()).collect();
        out.push_str(&format!("Available grades: {}\n", labels.join(", ")));
    }

    for outcome in charts.outcomes() {
        out.push('\n');
        match outcome {
            ChartOutcome::Ready { chart } => out.push_str(&format_chart(chart)),
            ChartOutcome::Failed { id, message } => {
                out.push_str(&format!("[{}] FAILED: {message}\n", id.slug()));
            }
        }
    }

    out
}

/// Format one chart as a titled text block.
pub fn format_chart(chart: &ChartSpec) -> String {
    let mut out = format!("[{}] {}\n", chart.id.slug(), chart.title);
    if chart.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }

    match &chart.data {
        ChartData::Histogram { series } => out.push_str(&format_status_table(series)),
        ChartData::DensityHeatmap { grid } => out.push_str(&format_density(grid)),
        ChartData::Pie { slices } => out.push_str(&format_slices(slices)),
        ChartData::Line { points } => out.push_str(&format_years(points, &chart.y_label)),
    }
    out
}

fn format_status_table(series: &[StatusSeries]) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {:<52} {:>7} {:>12}\n", "status", "loans", "median"));
    for s in series.iter().filter(|s| !s.values.is_empty()) {
        let median = median(&s.values).map(fmt_money).unwrap_or_default();
        out.push_str(&format!(
            "  {:<52} {:>7} {:>12}\n",
            truncate(&s.status, 52),
            s.values.len(),
            median
        ));
    }
    out
}

fn format_density(grid: &DensityGrid) -> String {
    let mut out = format!("  loans: {}\n", grid.total());

    let densest = grid
        .counts
        .iter()
        .enumerate()
        .flat_map(|(yi, row)| row.iter().enumerate().map(move |(xi, &c)| (c, xi, yi)))
        .max_by_key(|&(c, xi, yi)| (c, std::cmp::Reverse((yi, xi))));

    if let Some((count, xi, yi)) = densest.filter(|&(c, _, _)| c > 0) {
        out.push_str(&format!(
            "  densest cell: amount {}-{} at rate {:.2}-{:.2} ({count} loans)\n",
            fmt_money(grid.x_edges[xi]),
            fmt_money(grid.x_edges[xi + 1]),
            grid.y_edges[yi],
            grid.y_edges[yi + 1],
        ));
    }
    out
}

fn format_slices(slices: &[PieSlice]) -> String {
    let total: u64 = slices.iter().map(|s| s.count).sum();
    let max = slices.iter().map(|s| s.count).max().unwrap_or(0) as f64;
    let mut out = String::new();
    for s in slices.iter().take(TOP_PURPOSES) {
        let share = if total > 0 { s.count as f64 / total as f64 * 100.0 } else { 0.0 };
        out.push_str(&format!(
            "  {:<20} {:>7} {:>5.1}% {}\n",
            truncate(&s.label, 20),
            s.count,
            share,
            bar(s.count as f64, max)
        ));
    }
    if slices.len() > TOP_PURPOSES {
        out.push_str(&format!("  ... {} more\n", slices.len() - TOP_PURPOSES));
    }
    out
}

fn format_years(points: &[YearPoint], y_label: &str) -> String {
    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let mut out = format!("  {:<6} {:>16}\n", "year", truncate(y_label, 16));
    for p in points {
        out.push_str(&format!(
            "  {:<6} {:>16} {}\n",
            p.year,
            fmt_value(p.value),
            bar(p.value, max)
        ));
    }
    out
}

/// Horizontal bar scaled so `max` fills `BAR_WIDTH` columns.
fn bar(value: f64, max: f64) -> String {
    if max.is_nan() || max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let n = ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize;
    "#".repeat(n.min(BAR_WIDTH))
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn fmt_money(v: f64) -> String {
    format!("${}", group_thousands(v.round() as i64))
}

/// Whole numbers get thousands separators; fractional values keep two decimals.
fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        group_thousands(v as i64)
    } else {
        format!("{v:.2}")
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
