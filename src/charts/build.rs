//! Chart specification builders.
//!
//! One builder per dashboard chart. Each takes the grade and the rows fetched
//! for that chart and returns a complete `ChartSpec`; an empty row set gives a
//! well-formed empty chart.

use crate::charts::aggregate;
use crate::domain::{ChartData, ChartId, ChartSpec, LoanColumn, LoanRow, DENSITY_BINS};

/// Columns each chart needs from the store.
pub fn columns_for(id: ChartId) -> &'static [LoanColumn] {
    match id {
        ChartId::DefaultRate => &[LoanColumn::LoanAmnt, LoanColumn::LoanStatus],
        ChartId::AmountVsRate => &[LoanColumn::LoanAmnt, LoanColumn::IntRate],
        ChartId::Purpose => &[LoanColumn::Purpose],
        ChartId::Issuance => &[LoanColumn::IssueD, LoanColumn::LoanAmnt],
        ChartId::CreditHistory => &[LoanColumn::EarliestCrLine, LoanColumn::LoanStatus],
    }
}

/// Build the chart `id` from its rows.
pub fn build_chart(id: ChartId, grade: &str, rows: &[LoanRow]) -> ChartSpec {
    match id {
        ChartId::DefaultRate => default_rate(grade, rows),
        ChartId::AmountVsRate => amount_vs_rate(grade, rows),
        ChartId::Purpose => purpose(grade, rows),
        ChartId::Issuance => issuance(rows),
        ChartId::CreditHistory => credit_history(rows),
    }
}

/// Loan amount histogram stacked by status.
pub fn default_rate(grade: &str, rows: &[LoanRow]) -> ChartSpec {
    ChartSpec {
        id: ChartId::DefaultRate,
        title: format!("Default Rate by Loan Amount for Grade {grade}"),
        x_label: "Loan Amount ($)".to_string(),
        y_label: "Count".to_string(),
        data: ChartData::Histogram {
            series: aggregate::status_series(rows),
        },
    }
}

pub fn amount_vs_rate(grade: &str, rows: &[LoanRow]) -> ChartSpec {
    let points: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|r| Some((r.loan_amnt?, r.int_rate?)))
        .collect();
    ChartSpec {
        id: ChartId::AmountVsRate,
        title: format!("Loan Amount vs. Interest Rate (Density) - Grade {grade}"),
        x_label: "Loan Amount ($)".to_string(),
        y_label: "Interest Rate".to_string(),
        data: ChartData::DensityHeatmap {
            grid: aggregate::density_grid(&points, DENSITY_BINS, DENSITY_BINS),
        },
    }
}

pub fn purpose(grade: &str, rows: &[LoanRow]) -> ChartSpec {
    ChartSpec {
        id: ChartId::Purpose,
        title: format!("Loan Purpose Distribution for Grade {grade}"),
        x_label: String::new(),
        y_label: String::new(),
        data: ChartData::Pie {
            slices: aggregate::purpose_counts(rows),
        },
    }
}

/// Total issued amount per year; titled "(No Data)" when nothing parses.
pub fn issuance(rows: &[LoanRow]) -> ChartSpec {
    let totals = aggregate::issuance_by_year(rows);
    if totals.dropped > 0 {
        tracing::debug!(dropped = totals.dropped, "issue_d rows excluded from issuance chart");
    }
    let title = if totals.points.is_empty() {
        "Total Loan Issuance Over Time (No Data)"
    } else {
        "Total Loan Issuance Over Time"
    };
    ChartSpec {
        id: ChartId::Issuance,
        title: title.to_string(),
        x_label: "Year".to_string(),
        y_label: "Total Loan Amount ($)".to_string(),
        data: ChartData::Line {
            points: totals.points,
        },
    }
}

/// Charged-off count per earliest-credit-line year.
pub fn credit_history(rows: &[LoanRow]) -> ChartSpec {
    let points = aggregate::charged_off_by_year(rows);
    let title = if points.is_empty() {
        "Loan Defaults vs. Borrower Credit History (No Data)"
    } else {
        "Loan Defaults vs. Borrower Credit History"
    };
    ChartSpec {
        id: ChartId::CreditHistory,
        title: title.to_string(),
        x_label: "Year".to_string(),
        y_label: "Number of Defaults".to_string(),
        data: ChartData::Line { points },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearPoint;

    #[test]
    fn empty_rows_build_empty_charts() {
        for id in ChartId::ALL {
            let chart = build_chart(id, "G", &[]);
            assert_eq!(chart.id, id);
            assert!(chart.is_empty(), "{id:?} should be empty");
        }
        assert!(issuance(&[]).title.ends_with("(No Data)"));
        assert!(credit_history(&[]).title.ends_with("(No Data)"));
    }

    #[test]
    fn titles_mention_grade() {
        assert_eq!(default_rate("B", &[]).title, "Default Rate by Loan Amount for Grade B");
        assert_eq!(
            amount_vs_rate("B", &[]).title,
            "Loan Amount vs. Interest Rate (Density) - Grade B"
        );
        assert_eq!(purpose("B", &[]).title, "Loan Purpose Distribution for Grade B");
    }

    #[test]
    fn amount_vs_rate_skips_rows_missing_a_value() {
        let rows = vec![
            LoanRow { loan_amnt: Some(1000.0), int_rate: Some(7.5), ..LoanRow::default() },
            LoanRow { loan_amnt: Some(2000.0), int_rate: None, ..LoanRow::default() },
        ];
        let ChartData::DensityHeatmap { grid } = amount_vs_rate("A", &rows).data else {
            panic!("expected heatmap");
        };
        assert_eq!(grid.total(), 1);
        assert_eq!(grid.counts.len(), DENSITY_BINS);
    }

    #[test]
    fn issuance_example_points() {
        let row = |amount: f64, d: &str| LoanRow {
            loan_amnt: Some(amount),
            issue_d: Some(d.to_string()),
            ..LoanRow::default()
        };
        let chart = issuance(&[row(1000.0, "2013-06-01"), row(500.0, "2013-09-01"), row(2000.0, "2014-01-01")]);
        assert_eq!(chart.title, "Total Loan Issuance Over Time");
        assert_eq!(
            chart.data,
            ChartData::Line {
                points: vec![
                    YearPoint { year: 2013, value: 1500.0 },
                    YearPoint { year: 2014, value: 2000.0 },
                ]
            }
        );
    }

    #[test]
    fn every_chart_requests_columns() {
        for id in ChartId::ALL {
            assert!(!columns_for(id).is_empty());
        }
    }
}
