//! Dashboard page rendering.
//!
//! Produces one self-contained HTML document: the grade dropdown plus the five
//! chart regions with their SVGs inlined. Changing the dropdown resubmits the
//! form, so all five regions are always refreshed together.

use crate::domain::{ChartId, ChartOutcome, DashboardCharts, GradeOption};
use crate::plot::{render_chart_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Inputs for `render_dashboard`.
pub struct DashboardView<'a> {
    pub options: &'a [GradeOption],
    /// The dropdown value as submitted; `None` leaves the placeholder selected.
    pub selected: Option<&'a str>,
    /// `None` when the cycle failed before any chart could be derived.
    pub charts: Option<&'a DashboardCharts>,
    pub banner: Option<&'a str>,
    pub table: &'a str,
}

pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let regions: String = ChartId::ALL
        .iter()
        .map(|&id| render_region(id, view.charts))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Loan Default Risk Dashboard</title>
    <style>{css}</style>
</head>
<body>
    <h1>Loan Default Risk Dashboard</h1>
    {banner}
    {controls}
    {regions}
    <footer>Source table: {table}</footer>
</body>
</html>"#,
        css = inline_css(),
        banner = render_banner(view.banner),
        controls = render_controls(view.options, view.selected),
        regions = regions,
        table = html_escape(view.table),
    )
}

fn render_banner(message: Option<&str>) -> String {
    match message {
        Some(msg) => format!(
            r#"<div class="banner error" role="alert">Could not load loan data: {}</div>"#,
            html_escape(msg)
        ),
        None => String::new(),
    }
}

fn render_controls(options: &[GradeOption], selected: Option<&str>) -> String {
    let mut opts = String::new();
    let placeholder = if selected.is_none() { " selected" } else { "" };
    opts.push_str(&format!(
        r#"<option value=""{placeholder} disabled>Select...</option>"#
    ));
    for opt in options {
        let mark = if selected == Some(opt.value.as_str()) { " selected" } else { "" };
        opts.push_str(&format!(
            r#"<option value="{}"{mark}>{}</option>"#,
            html_escape(&opt.value),
            html_escape(&opt.label)
        ));
    }

    format!(
        r#"<form class="controls" method="get" action="/">
        <label for="grade-dropdown">Select Credit Grade:</label>
        <select id="grade-dropdown" name="grade" onchange="this.form.submit()">{opts}</select>
        <noscript><button type="submit">Show</button></noscript>
    </form>"#
    )
}

fn render_region(id: ChartId, charts: Option<&DashboardCharts>) -> String {
    let inner = match charts.map(|c| c.get(id)) {
        Some(ChartOutcome::Ready { chart }) => match render_chart_svg(chart, DEFAULT_WIDTH, DEFAULT_HEIGHT) {
            Ok(svg) => svg,
            Err(err) => {
                tracing::warn!(chart = id.slug(), error = %err, "chart render failed");
                chart_error(err.message())
            }
        },
        Some(ChartOutcome::Failed { message, .. }) => chart_error(message),
        None => String::new(),
    };

    format!(r#"<div class="graph" id="{}">{inner}</div>"#, id.dom_id())
}

fn chart_error(message: &str) -> String {
    format!(r#"<div class="chart-error">{}</div>"#, html_escape(message))
}

fn inline_css() -> &'static str {
    r#"
body { font-family: sans-serif; margin: 0 auto; max-width: 1000px; padding: 0 16px; color: #222; }
h1 { text-align: center; }
.controls { width: 50%; margin: auto; padding-bottom: 20px; }
.controls select { width: 100%; padding: 6px; font-size: 1em; }
.graph { margin: 12px 0; min-height: 40px; }
.graph svg { display: block; }
.banner.error, .chart-error { background: #fdecea; border: 1px solid #f5c2c0; color: #8a1f17; padding: 10px 14px; border-radius: 4px; }
footer { color: #888; font-size: 0.85em; text-align: center; margin: 24px 0; }
"#
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
