//! Shared dashboard logic used by the HTTP server and the CLI.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! selected grade -> resolved grade -> five independent fetch+derive steps
//!
//! The server and the `report`/`export` commands then only deal with
//! presentation (HTML/SVG/JSON vs terminal text).

use std::time::Instant;

use tracing::{info, warn};

use crate::charts::{build_chart, columns_for};
use crate::data::LoanStore;
use crate::domain::{ChartId, ChartOutcome, ChartSpec, DashboardCharts, GradeOption};
use crate::error::{AppError, ErrorKind};

/// Dropdown options, one per distinct grade. Nothing is pre-selected.
pub fn grade_options(store: &dyn LoanStore) -> Result<Vec<GradeOption>, AppError> {
    let grades = store.distinct_grades()?;
    Ok(grades
        .into_iter()
        .map(|g| GradeOption {
            label: g.clone(),
            value: g,
        })
        .collect())
}

/// Turn the dropdown value into a concrete grade.
///
/// No selection (absent, empty, or whitespace) falls back to the first grade
/// in ascending order.
pub fn resolve_grade(store: &dyn LoanStore, selected: Option<&str>) -> Result<String, AppError> {
    if let Some(grade) = selected.filter(|g| !g.trim().is_empty()) {
        return Ok(grade.to_string());
    }

    store
        .distinct_grades()?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::new(ErrorKind::NoData, "No loan grades found in the database."))
}

/// Fetch and derive a single chart.
pub fn derive_chart(store: &dyn LoanStore, id: ChartId, grade: &str) -> Result<ChartSpec, AppError> {
    let rows = store.fetch_rows(grade, columns_for(id))?;
    Ok(build_chart(id, grade, &rows))
}

/// Produce all five charts for the selected grade.
///
/// Each chart is fetched and derived on its own; a query failure in one is
/// recorded as `ChartOutcome::Failed` and the remaining charts are still
/// attempted. An unreachable store fails the whole call, as does failing to
/// resolve the grade.
pub fn update_charts(store: &dyn LoanStore, selected: Option<&str>) -> Result<DashboardCharts, AppError> {
    let started = Instant::now();
    let grade = resolve_grade(store, selected)?;

    let outcome = |id: ChartId| match derive_chart(store, id, &grade) {
        Ok(chart) => Ok(ChartOutcome::Ready { chart }),
        Err(err) if err.kind() == ErrorKind::StoreUnavailable => Err(err),
        Err(err) => {
            warn!(chart = id.slug(), grade = %grade, error = %err, "chart derivation failed");
            Ok(ChartOutcome::Failed {
                id,
                message: err.to_string(),
            })
        }
    };

    let charts = DashboardCharts {
        default_rate: outcome(ChartId::DefaultRate)?,
        amount_vs_rate: outcome(ChartId::AmountVsRate)?,
        purpose: outcome(ChartId::Purpose)?,
        issuance: outcome(ChartId::Issuance)?,
        credit_history: outcome(ChartId::CreditHistory)?,
        grade: grade.clone(),
    };

    let failed = charts
        .outcomes()
        .iter()
        .filter(|o| matches!(o, ChartOutcome::Failed { .. }))
        .count();
    info!(
        grade = %grade,
        failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "updated dashboard charts"
    );

    Ok(charts)
}
