//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - filled from the loans store
//! - returned from the HTTP API as JSON
//! - exported to disk and rendered to SVG later

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database file used when neither `--db` nor `LOANDASH_DB` is given.
pub const DEFAULT_DB_PATH: &str = "data/loans50k.db";
/// Table holding one row per loan.
pub const DEFAULT_TABLE: &str = "loans50k";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8060;

/// Bins per axis for the amount-vs-rate density heatmap.
pub const DENSITY_BINS: usize = 30;
/// Bins used when the loan amount histogram is drawn.
pub const HISTOGRAM_BINS: usize = 30;

/// The fixed set of loan statuses, each with a stable legend color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    FullyPaid,
    ChargedOff,
    Late31To120,
    InGracePeriod,
    Late16To30,
    Default,
    PolicyFullyPaid,
    PolicyChargedOff,
    Current,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 9] = [
        LoanStatus::FullyPaid,
        LoanStatus::ChargedOff,
        LoanStatus::Late31To120,
        LoanStatus::InGracePeriod,
        LoanStatus::Late16To30,
        LoanStatus::Default,
        LoanStatus::PolicyFullyPaid,
        LoanStatus::PolicyChargedOff,
        LoanStatus::Current,
    ];

    /// Status text exactly as stored in `loan_status`.
    pub fn label(self) -> &'static str {
        match self {
            LoanStatus::FullyPaid => "Fully Paid",
            LoanStatus::ChargedOff => "Charged Off",
            LoanStatus::Late31To120 => "Late (31-120 days)",
            LoanStatus::InGracePeriod => "In Grace Period",
            LoanStatus::Late16To30 => "Late (16-30 days)",
            LoanStatus::Default => "Default",
            LoanStatus::PolicyFullyPaid => "Does not meet the credit policy. Status:Fully Paid",
            LoanStatus::PolicyChargedOff => "Does not meet the credit policy. Status:Charged Off",
            LoanStatus::Current => "Current",
        }
    }

    /// CSS color name used for this status in every chart legend.
    pub fn color(self) -> &'static str {
        match self {
            LoanStatus::FullyPaid => "blue",
            LoanStatus::ChargedOff => "red",
            LoanStatus::Late31To120 => "orange",
            LoanStatus::InGracePeriod => "yellow",
            LoanStatus::Late16To30 => "purple",
            LoanStatus::Default => "black",
            LoanStatus::PolicyFullyPaid => "magenta",
            LoanStatus::PolicyChargedOff => "green",
            LoanStatus::Current => "lightblue",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        LoanStatus::ALL.into_iter().find(|s| s.label() == label)
    }
}

/// Columns of the loans table the dashboard reads.
///
/// Queries are only ever built from this closed set, never from caller text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoanColumn {
    Grade,
    LoanAmnt,
    IntRate,
    LoanStatus,
    Purpose,
    IssueD,
    EarliestCrLine,
}

impl LoanColumn {
    pub const ALL: [LoanColumn; 7] = [
        LoanColumn::Grade,
        LoanColumn::LoanAmnt,
        LoanColumn::IntRate,
        LoanColumn::LoanStatus,
        LoanColumn::Purpose,
        LoanColumn::IssueD,
        LoanColumn::EarliestCrLine,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            LoanColumn::Grade => "grade",
            LoanColumn::LoanAmnt => "loan_amnt",
            LoanColumn::IntRate => "int_rate",
            LoanColumn::LoanStatus => "loan_status",
            LoanColumn::Purpose => "purpose",
            LoanColumn::IssueD => "issue_d",
            LoanColumn::EarliestCrLine => "earliest_cr_line",
        }
    }
}

/// One loan record, restricted to the projected columns.
///
/// Columns that were not requested (or are NULL in the store) are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanRow {
    pub grade: Option<String>,
    pub loan_amnt: Option<f64>,
    pub int_rate: Option<f64>,
    pub loan_status: Option<String>,
    pub purpose: Option<String>,
    pub issue_d: Option<String>,
    pub earliest_cr_line: Option<String>,
}

impl LoanRow {
    /// Keep only the given columns, clearing everything else.
    pub fn project(&self, columns: &[LoanColumn]) -> LoanRow {
        let mut out = LoanRow::default();
        for column in columns {
            match column {
                LoanColumn::Grade => out.grade = self.grade.clone(),
                LoanColumn::LoanAmnt => out.loan_amnt = self.loan_amnt,
                LoanColumn::IntRate => out.int_rate = self.int_rate,
                LoanColumn::LoanStatus => out.loan_status = self.loan_status.clone(),
                LoanColumn::Purpose => out.purpose = self.purpose.clone(),
                LoanColumn::IssueD => out.issue_d = self.issue_d.clone(),
                LoanColumn::EarliestCrLine => out.earliest_cr_line = self.earliest_cr_line.clone(),
            }
        }
        out
    }
}

/// A selectable dropdown entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOption {
    pub label: String,
    pub value: String,
}

/// Identity of each of the five dashboard charts (in display order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartId {
    DefaultRate,
    AmountVsRate,
    Purpose,
    Issuance,
    CreditHistory,
}

impl ChartId {
    pub const ALL: [ChartId; 5] = [
        ChartId::DefaultRate,
        ChartId::AmountVsRate,
        ChartId::Purpose,
        ChartId::Issuance,
        ChartId::CreditHistory,
    ];

    /// Element id of the chart region on the dashboard page.
    pub fn dom_id(self) -> &'static str {
        match self {
            ChartId::DefaultRate => "default-rate-graph",
            ChartId::AmountVsRate => "loan-int-graph",
            ChartId::Purpose => "loan-purpose-graph",
            ChartId::Issuance => "time-series-graph",
            ChartId::CreditHistory => "credit-history-graph",
        }
    }

    /// Short name used in URLs (`/api/charts/{slug}.svg`).
    pub fn slug(self) -> &'static str {
        match self {
            ChartId::DefaultRate => "default-rate",
            ChartId::AmountVsRate => "loan-int",
            ChartId::Purpose => "loan-purpose",
            ChartId::Issuance => "time-series",
            ChartId::CreditHistory => "credit-history",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        ChartId::ALL.into_iter().find(|id| id.slug() == slug)
    }
}

/// Raw loan amounts for one status (one stacked layer of the histogram).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSeries {
    pub status: String,
    /// Fixed legend color, or `None` for statuses outside the enumeration.
    pub color: Option<String>,
    pub values: Vec<f64>,
}

/// Counts over a regular 2D grid.
///
/// `counts[yi][xi]` is the number of loans with amount in
/// `x_edges[xi]..x_edges[xi + 1]` and rate in `y_edges[yi]..y_edges[yi + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Vec<Vec<u32>>,
}

impl DensityGrid {
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().map(|&c| u64::from(c)).sum()
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub count: u64,
}

/// One point of a yearly line chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearPoint {
    pub year: i32,
    pub value: f64,
}

/// Chart payload, tagged by chart type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartData {
    Histogram { series: Vec<StatusSeries> },
    DensityHeatmap { grid: DensityGrid },
    Pie { slices: Vec<PieSlice> },
    Line { points: Vec<YearPoint> },
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Histogram { series } => series.iter().all(|s| s.values.is_empty()),
            ChartData::DensityHeatmap { grid } => grid.total() == 0,
            ChartData::Pie { slices } => slices.is_empty(),
            ChartData::Line { points } => points.is_empty(),
        }
    }
}

/// Declarative chart description handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: ChartId,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub data: ChartData,
}

impl ChartSpec {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of deriving a single chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartOutcome {
    Ready { chart: ChartSpec },
    Failed { id: ChartId, message: String },
}

impl ChartOutcome {
    pub fn id(&self) -> ChartId {
        match self {
            ChartOutcome::Ready { chart } => chart.id,
            ChartOutcome::Failed { id, .. } => *id,
        }
    }

    pub fn chart(&self) -> Option<&ChartSpec> {
        match self {
            ChartOutcome::Ready { chart } => Some(chart),
            ChartOutcome::Failed { .. } => None,
        }
    }
}

/// All five charts for one grade, always produced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCharts {
    pub grade: String,
    pub default_rate: ChartOutcome,
    pub amount_vs_rate: ChartOutcome,
    pub purpose: ChartOutcome,
    pub issuance: ChartOutcome,
    pub credit_history: ChartOutcome,
}

impl DashboardCharts {
    /// The five outcomes in display order.
    pub fn outcomes(&self) -> [&ChartOutcome; 5] {
        [
            &self.default_rate,
            &self.amount_vs_rate,
            &self.purpose,
            &self.issuance,
            &self.credit_history,
        ]
    }

    pub fn get(&self, id: ChartId) -> &ChartOutcome {
        match id {
            ChartId::DefaultRate => &self.default_rate,
            ChartId::AmountVsRate => &self.amount_vs_rate,
            ChartId::Purpose => &self.purpose,
            ChartId::Issuance => &self.issuance,
            ChartId::CreditHistory => &self.credit_history,
        }
    }
}

/// Where the loans live and how the server is exposed.
///
/// Derived from CLI flags (plus `.env` / defaults).
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub db_path: PathBuf,
    pub table: String,
    pub host: String,
    pub port: u16,
    /// Development mode: verbose logging and request tracing.
    pub debug: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            table: DEFAULT_TABLE.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip_and_colors_are_distinct() {
        let mut colors = std::collections::HashSet::new();
        for status in LoanStatus::ALL {
            assert_eq!(LoanStatus::from_label(status.label()), Some(status));
            assert!(colors.insert(status.color()));
        }
        assert_eq!(LoanStatus::from_label("Charged Off"), Some(LoanStatus::ChargedOff));
        assert_eq!(LoanStatus::from_label("charged off"), None);
    }

    #[test]
    fn chart_slugs_resolve() {
        for id in ChartId::ALL {
            assert_eq!(ChartId::from_slug(id.slug()), Some(id));
        }
        assert_eq!(ChartId::from_slug("nope"), None);
    }

    #[test]
    fn project_clears_unrequested_columns() {
        let row = LoanRow {
            grade: Some("B".to_string()),
            loan_amnt: Some(1000.0),
            purpose: Some("car".to_string()),
            ..LoanRow::default()
        };
        let projected = row.project(&[LoanColumn::LoanAmnt]);
        assert_eq!(projected.loan_amnt, Some(1000.0));
        assert_eq!(projected.grade, None);
        assert_eq!(projected.purpose, None);
    }

    #[test]
    fn outcome_json_is_tagged() {
        let outcome = ChartOutcome::Failed {
            id: ChartId::Purpose,
            message: "boom".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["id"], "purpose");
    }
}
