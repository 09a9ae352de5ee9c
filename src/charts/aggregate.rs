//! In-memory reshaping of loan rows into chart-ready tables.
//!
//! Everything here is a pure function of its input rows. Row-level problems
//! (unparsable dates, missing values) drop the row from the affected table and
//! never fail the call.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::domain::{DensityGrid, LoanRow, LoanStatus, PieSlice, StatusSeries, YearPoint};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a stored date.
///
/// Accepts ISO dates (optionally with a time), `YYYY/MM/DD`, `MM/DD/YYYY`,
/// `YYYY-MM`, and month-year forms like `Dec-2011` or `Dec-11`.
pub fn parse_loan_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    parse_year_month(s).or_else(|| parse_month_year(s))
}

/// `2013-06`
fn parse_year_month(s: &str) -> Option<NaiveDate> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// `Dec-2011` / `Dec-11`
fn parse_month_year(s: &str) -> Option<NaiveDate> {
    let (month, year) = s.split_once('-')?;
    if month.is_empty() || !month.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let fmt = match year.len() {
        4 => "%d-%b-%Y",
        2 => "%d-%b-%y",
        _ => return None,
    };
    NaiveDate::parse_from_str(&format!("01-{month}-{year}"), fmt).ok()
}

/// Yearly totals plus the number of rows that could not be placed in a year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearTotals {
    pub points: Vec<YearPoint>,
    pub dropped: usize,
}

/// Sum `loan_amnt` per issue year.
///
/// Rows whose `issue_d` does not parse are dropped. A parseable row with a
/// missing amount still places its year on the axis but adds nothing.
pub fn issuance_by_year(rows: &[LoanRow]) -> YearTotals {
    let mut sums: BTreeMap<i32, f64> = BTreeMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let Some(date) = row.issue_d.as_deref().and_then(parse_loan_date) else {
            dropped += 1;
            continue;
        };
        *sums.entry(date.year()).or_insert(0.0) += row.loan_amnt.unwrap_or(0.0);
    }

    YearTotals {
        points: sums
            .into_iter()
            .map(|(year, value)| YearPoint { year, value })
            .collect(),
        dropped,
    }
}

/// Per-year occurrence count of each loan status, keyed by earliest credit line year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCountsByYear {
    pub years: BTreeMap<i32, BTreeMap<String, u64>>,
    pub dropped: usize,
}

impl StatusCountsByYear {
    /// Count of `status` for every year present; years without it report 0.
    pub fn series_for(&self, status: &str) -> Vec<YearPoint> {
        self.years
            .iter()
            .map(|(&year, counts)| YearPoint {
                year,
                value: counts.get(status).copied().unwrap_or(0) as f64,
            })
            .collect()
    }
}

/// Group rows by the year of `earliest_cr_line` and count statuses.
///
/// Rows with an unparsable date or no status are dropped.
pub fn status_counts_by_year(rows: &[LoanRow]) -> StatusCountsByYear {
    let mut out = StatusCountsByYear::default();

    for row in rows {
        let date = row.earliest_cr_line.as_deref().and_then(parse_loan_date);
        let (Some(date), Some(status)) = (date, row.loan_status.as_deref()) else {
            out.dropped += 1;
            continue;
        };
        *out.years
            .entry(date.year())
            .or_default()
            .entry(status.to_string())
            .or_insert(0) += 1;
    }

    out
}

/// Charged-off count per earliest-credit-line year.
pub fn charged_off_by_year(rows: &[LoanRow]) -> Vec<YearPoint> {
    status_counts_by_year(rows).series_for(LoanStatus::ChargedOff.label())
}

/// Split loan amounts into one series per status.
///
/// Known statuses come first in enumeration order with their fixed colors;
/// statuses outside the enumeration follow alphabetically without a color.
pub fn status_series(rows: &[LoanRow]) -> Vec<StatusSeries> {
    let mut by_status: HashMap<&str, Vec<f64>> = HashMap::new();
    for row in rows {
        if let (Some(amount), Some(status)) = (row.loan_amnt, row.loan_status.as_deref()) {
            if amount.is_finite() {
                by_status.entry(status).or_default().push(amount);
            }
        }
    }

    let mut out = Vec::with_capacity(by_status.len());
    for status in LoanStatus::ALL {
        if let Some(values) = by_status.remove(status.label()) {
            out.push(StatusSeries {
                status: status.label().to_string(),
                color: Some(status.color().to_string()),
                values,
            });
        }
    }

    let mut unmapped: Vec<(&str, Vec<f64>)> = by_status.into_iter().collect();
    unmapped.sort_by(|a, b| a.0.cmp(b.0));
    out.extend(unmapped.into_iter().map(|(status, values)| StatusSeries {
        status: status.to_string(),
        color: None,
        values,
    }));

    out
}

/// Count loans per purpose, largest first (ties by label).
pub fn purpose_counts(rows: &[LoanRow]) -> Vec<PieSlice> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for purpose in rows.iter().filter_map(|r| r.purpose.as_deref()) {
        *counts.entry(purpose).or_insert(0) += 1;
    }

    let mut slices: Vec<PieSlice> = counts
        .into_iter()
        .map(|(label, count)| PieSlice {
            label: label.to_string(),
            count,
        })
        .collect();
    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    slices
}

/// `n + 1` equal-width edges spanning `min..=max`.
///
/// A degenerate range (all values equal) is widened by 0.5 on each side.
pub fn bin_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let n = n.max(1);
    let (lo, hi) = if max - min <= f64::EPSILON * max.abs().max(1.0) {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (hi - lo) / n as f64;
    let mut edges: Vec<f64> = (0..n).map(|i| lo + width * i as f64).collect();
    edges.push(hi);
    edges
}

/// Bin index of `value`; the last bin is closed on the right.
pub fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    let n = edges.len().checked_sub(1).filter(|&n| n > 0)?;
    let lo = edges[0];
    let hi = edges[n];
    if !value.is_finite() || value < lo || value > hi {
        return None;
    }
    if value >= hi {
        return Some(n - 1);
    }
    let idx = ((value - lo) / (hi - lo) * n as f64).floor() as usize;
    Some(idx.min(n - 1))
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut range: Option<(f64, f64)> = None;
    for v in values.filter(|v| v.is_finite()) {
        range = Some(match range {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        });
    }
    range
}

/// Count `(x, y)` points over an `nx × ny` grid spanning their observed ranges.
pub fn density_grid(points: &[(f64, f64)], nx: usize, ny: usize) -> DensityGrid {
    let points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let (Some((x_min, x_max)), Some((y_min, y_max))) = (
        finite_range(points.iter().map(|p| p.0)),
        finite_range(points.iter().map(|p| p.1)),
    ) else {
        return DensityGrid::default();
    };

    let x_edges = bin_edges(x_min, x_max, nx);
    let y_edges = bin_edges(y_min, y_max, ny);
    let mut counts = vec![vec![0u32; x_edges.len() - 1]; y_edges.len() - 1];

    for (x, y) in points {
        if let (Some(xi), Some(yi)) = (bin_index(x, &x_edges), bin_index(y, &y_edges)) {
            counts[yi][xi] += 1;
        }
    }

    DensityGrid {
        x_edges,
        y_edges,
        counts,
    }
}

/// Histogram bins shared by every series, for stacked drawing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackedBins {
    pub edges: Vec<f64>,
    /// `counts[series][bin]`, in the same order as the input series.
    pub counts: Vec<Vec<u32>>,
}

impl StackedBins {
    /// Total height of the tallest stacked bar.
    pub fn max_stack(&self) -> u32 {
        let bins = self.edges.len().saturating_sub(1);
        (0..bins)
            .map(|b| self.counts.iter().map(|c| c[b]).sum::<u32>())
            .max()
            .unwrap_or(0)
    }
}

/// Bin every series over the combined value range.
pub fn stack_bins(series: &[StatusSeries], n: usize) -> StackedBins {
    let Some((lo, hi)) = finite_range(series.iter().flat_map(|s| s.values.iter().copied())) else {
        return StackedBins {
            edges: Vec::new(),
            counts: vec![Vec::new(); series.len()],
        };
    };

    let edges = bin_edges(lo, hi, n);
    let bins = edges.len() - 1;
    let counts = series
        .iter()
        .map(|s| {
            let mut c = vec![0u32; bins];
            for &v in &s.values {
                if let Some(idx) = bin_index(v, &edges) {
                    c[idx] += 1;
                }
            }
            c
        })
        .collect();

    StackedBins { edges, counts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued(amount: f64, issue_d: &str) -> LoanRow {
        LoanRow {
            grade: Some("B".to_string()),
            loan_amnt: Some(amount),
            issue_d: Some(issue_d.to_string()),
            ..LoanRow::default()
        }
    }

    fn history(earliest: &str, status: &str) -> LoanRow {
        LoanRow {
            earliest_cr_line: Some(earliest.to_string()),
            loan_status: Some(status.to_string()),
            ..LoanRow::default()
        }
    }

    #[test]
    fn parses_supported_date_forms() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(parse_loan_date("2013-06-01"), d(2013, 6, 1));
        assert_eq!(parse_loan_date(" 2013-06-01 "), d(2013, 6, 1));
        assert_eq!(parse_loan_date("2013-06-01 00:00:00"), d(2013, 6, 1));
        assert_eq!(parse_loan_date("2013/06/01"), d(2013, 6, 1));
        assert_eq!(parse_loan_date("06/01/2013"), d(2013, 6, 1));
        assert_eq!(parse_loan_date("2013-06"), d(2013, 6, 1));
        assert_eq!(parse_loan_date("Dec-2011"), d(2011, 12, 1));
        assert_eq!(parse_loan_date("Dec-11"), d(2011, 12, 1));
        assert_eq!(parse_loan_date("not-a-date"), None);
        assert_eq!(parse_loan_date(""), None);
    }

    #[test]
    fn issuance_sums_per_year() {
        let rows = vec![
            issued(1000.0, "2013-06-01"),
            issued(500.0, "2013-09-01"),
            issued(2000.0, "2014-01-01"),
        ];
        let totals = issuance_by_year(&rows);
        assert_eq!(
            totals.points,
            vec![
                YearPoint { year: 2013, value: 1500.0 },
                YearPoint { year: 2014, value: 2000.0 },
            ]
        );
        assert_eq!(totals.dropped, 0);
    }

    #[test]
    fn issuance_drops_unparsable_dates() {
        let rows = vec![issued(1000.0, "2013-06-01"), issued(700.0, "not-a-date")];
        let totals = issuance_by_year(&rows);
        assert_eq!(totals.points, vec![YearPoint { year: 2013, value: 1000.0 }]);
        assert_eq!(totals.dropped, 1);
    }

    #[test]
    fn issuance_total_matches_parseable_rows() {
        let rows = vec![
            issued(120.0, "2010-01-05"),
            issued(80.0, "Mar-2011"),
            issued(55.5, "2011-12-31"),
            issued(999.0, "garbage"),
            issued(1.5, "2019/02/02"),
        ];
        let total: f64 = issuance_by_year(&rows).points.iter().map(|p| p.value).sum();
        assert!((total - (120.0 + 80.0 + 55.5 + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn charged_off_reports_zero_for_years_without_defaults() {
        let rows = vec![
            history("Jan-2001", "Charged Off"),
            history("Mar-2001", "Charged Off"),
            history("Jun-2001", "Fully Paid"),
            history("Feb-2003", "Current"),
            history("bad", "Charged Off"),
        ];
        assert_eq!(
            charged_off_by_year(&rows),
            vec![
                YearPoint { year: 2001, value: 2.0 },
                YearPoint { year: 2003, value: 0.0 },
            ]
        );
    }

    #[test]
    fn status_counts_keep_every_status() {
        let rows = vec![history("2001-01-01", "Current"), history("2001-05-01", "Current"), history("2001-05-01", "Default")];
        let counts = status_counts_by_year(&rows);
        let y2001 = &counts.years[&2001];
        assert_eq!(y2001["Current"], 2);
        assert_eq!(y2001["Default"], 1);
    }

    #[test]
    fn status_series_orders_known_then_unmapped() {
        let row = |amount: f64, status: &str| LoanRow {
            loan_amnt: Some(amount),
            loan_status: Some(status.to_string()),
            ..LoanRow::default()
        };
        let rows = vec![
            row(1.0, "Zombie"),
            row(2.0, "Current"),
            row(3.0, "Fully Paid"),
            row(4.0, "Alien"),
            row(5.0, "Current"),
        ];
        let series = status_series(&rows);
        let names: Vec<&str> = series.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(names, vec!["Fully Paid", "Current", "Alien", "Zombie"]);
        assert_eq!(series[0].color.as_deref(), Some("blue"));
        assert_eq!(series[1].values, vec![2.0, 5.0]);
        assert_eq!(series[2].color, None);
    }

    #[test]
    fn purpose_counts_sorted_by_size() {
        let row = |p: &str| LoanRow {
            purpose: Some(p.to_string()),
            ..LoanRow::default()
        };
        let rows = vec![row("car"), row("credit_card"), row("car"), row("wedding"), LoanRow::default()];
        let slices = purpose_counts(&rows);
        assert_eq!(slices[0], PieSlice { label: "car".to_string(), count: 2 });
        assert_eq!(slices[1].label, "credit_card");
        assert_eq!(slices[2].label, "wedding");
    }

    #[test]
    fn density_grid_is_30_by_30_and_counts_every_point() {
        let points: Vec<(f64, f64)> = (0..100).map(|i| (i as f64 * 100.0, 5.0 + i as f64 * 0.1)).collect();
        let grid = density_grid(&points, 30, 30);
        assert_eq!(grid.x_edges.len(), 31);
        assert_eq!(grid.y_edges.len(), 31);
        assert_eq!(grid.counts.len(), 30);
        assert!(grid.counts.iter().all(|row| row.len() == 30));
        assert_eq!(grid.total(), 100);
        // Max values land in the last, right-closed bin.
        assert!(grid.counts[29][29] >= 1);
    }

    #[test]
    fn density_grid_handles_degenerate_and_empty_input() {
        let grid = density_grid(&[(1000.0, 10.0), (1000.0, 10.0)], 30, 30);
        assert_eq!(grid.total(), 2);
        assert_eq!(grid.x_edges.first(), Some(&999.5));
        assert_eq!(grid.x_edges.last(), Some(&1000.5));

        let empty = density_grid(&[], 30, 30);
        assert!(empty.x_edges.is_empty());
        assert_eq!(empty.total(), 0);
    }

    #[test]
    fn bin_index_boundaries() {
        let edges = bin_edges(0.0, 10.0, 5);
        assert_eq!(edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(bin_index(0.0, &edges), Some(0));
        assert_eq!(bin_index(2.0, &edges), Some(1));
        assert_eq!(bin_index(10.0, &edges), Some(4));
        assert_eq!(bin_index(10.5, &edges), None);
        assert_eq!(bin_index(f64::NAN, &edges), None);
        assert_eq!(bin_index(1.0, &[]), None);
    }

    #[test]
    fn stack_bins_share_edges_across_series() {
        let series = vec![
            StatusSeries { status: "Fully Paid".to_string(), color: None, values: vec![0.0, 1.0, 10.0] },
            StatusSeries { status: "Charged Off".to_string(), color: None, values: vec![10.0] },
        ];
        let bins = stack_bins(&series, 2);
        assert_eq!(bins.edges, vec![0.0, 5.0, 10.0]);
        assert_eq!(bins.counts, vec![vec![2, 1], vec![0, 1]]);
        assert_eq!(bins.max_stack(), 2);

        let empty = stack_bins(&[], 30);
        assert!(empty.edges.is_empty());
        assert_eq!(empty.max_stack(), 0);
    }
}
