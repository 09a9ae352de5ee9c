//! Dashboard exports.
//!
//! The JSON file is the portable form of one `update_charts` cycle:
//! - which tool wrote it and when
//! - the resolved grade and all five outcomes, as served by `/api/charts`
//!
//! SVG exports write one standalone file per ready chart.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChartOutcome, DashboardCharts};
use crate::error::{AppError, ErrorKind};
use crate::plot::{render_chart_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// On-disk schema of `loandash export --out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartsFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub charts: DashboardCharts,
}

/// Write a charts JSON file.
pub fn write_charts_json(path: &Path, charts: &DashboardCharts) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            ErrorKind::Io,
            format!("Failed to create charts JSON '{}': {e}", path.display()),
        )
    })?;

    let doc = ChartsFile {
        tool: "loandash".to_string(),
        generated_at: Utc::now(),
        charts: charts.clone(),
    };

    serde_json::to_writer_pretty(file, &doc)
        .map_err(|e| AppError::new(ErrorKind::Io, format!("Failed to write charts JSON: {e}")))?;

    Ok(())
}

/// Read a charts JSON file.
pub fn read_charts_json(path: &Path) -> Result<ChartsFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            ErrorKind::Io,
            format!("Failed to open charts JSON '{}': {e}", path.display()),
        )
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::invalid_input(format!("Invalid charts JSON: {e}")))
}

/// Render every ready chart to `dir/<slug>.svg`. Failed outcomes are skipped.
///
/// Returns the paths written, in display order.
pub fn write_chart_svgs(dir: &Path, charts: &DashboardCharts) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::new(
            ErrorKind::Io,
            format!("Failed to create SVG directory '{}': {e}", dir.display()),
        )
    })?;

    let mut written = Vec::new();
    for outcome in charts.outcomes() {
        let ChartOutcome::Ready { chart } = outcome else {
            continue;
        };
        let svg = render_chart_svg(chart, DEFAULT_WIDTH, DEFAULT_HEIGHT)?;
        let path = dir.join(format!("{}.svg", chart.id.slug()));
        std::fs::write(&path, svg).map_err(|e| {
            AppError::new(ErrorKind::Io, format!("Failed to write '{}': {e}", path.display()))
        })?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::update_charts;
    use crate::data::MemoryStore;
    use crate::domain::{ChartId, LoanRow};

    fn charts() -> DashboardCharts {
        let rows = (0..12)
            .map(|i| LoanRow {
                grade: Some("D".to_string()),
                loan_amnt: Some(1000.0 * f64::from(i + 1)),
                int_rate: Some(15.0 + f64::from(i) * 0.25),
                loan_status: Some("Fully Paid".to_string()),
                purpose: Some("house".to_string()),
                issue_d: Some(format!("{}-01-15", 2011 + i % 3)),
                earliest_cr_line: Some("Mar-1998".to_string()),
            })
            .collect();
        update_charts(&MemoryStore::new(rows), None).unwrap()
    }

    #[test]
    fn json_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        let charts = charts();

        write_charts_json(&path, &charts).unwrap();
        let doc = read_charts_json(&path).unwrap();

        assert_eq!(doc.tool, "loandash");
        assert_eq!(doc.charts, charts);

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["charts"]["grade"], "D");
        assert_eq!(raw["charts"]["issuance"]["status"], "ready");
        assert_eq!(raw["charts"]["issuance"]["chart"]["data"]["type"], "line");
    }

    #[test]
    fn invalid_json_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_charts_json(&path).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn svg_export_skips_failed_charts() {
        let dir = tempfile::tempdir().unwrap();
        let mut charts = charts();
        charts.purpose = ChartOutcome::Failed {
            id: ChartId::Purpose,
            message: "no such column: purpose".to_string(),
        };

        let written = write_chart_svgs(&dir.path().join("svg"), &charts).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["default-rate.svg", "loan-int.svg", "time-series.svg", "credit-history.svg"]
        );
        let body = std::fs::read_to_string(&written[0]).unwrap();
        assert!(body.contains("<svg"));
    }
}
