//! Reporting utilities: plain-text rendering of dashboard charts.

mod format;

pub use format::{format_chart, format_dashboard_summary};
