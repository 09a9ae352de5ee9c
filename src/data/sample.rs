//! Synthetic loan book generation.
//!
//! Used to build a demo database (`loandash sample`) and the in-memory store
//! behind `loandash report --demo`. Output is deterministic for a given seed.

use std::path::Path;

use chrono::{Datelike, Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal};
use rusqlite::Connection;
use tracing::info;

use crate::data::store::replace_loans_table;
use crate::domain::{LoanRow, LoanStatus};
use crate::error::AppError;

pub const GRADES: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

const PURPOSES: [(&str, f64); 8] = [
    ("debt_consolidation", 0.47),
    ("credit_card", 0.20),
    ("home_improvement", 0.07),
    ("other", 0.09),
    ("major_purchase", 0.05),
    ("small_business", 0.04),
    ("car", 0.04),
    ("medical", 0.04),
];

/// Share of rows whose `issue_d` is deliberately unparsable.
const BAD_DATE_RATE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub count: usize,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            count: 5_000,
            seed: 42,
        }
    }
}

/// Generate `config.count` synthetic loans spread over all grades.
pub fn generate_loans(config: &SampleConfig) -> Result<Vec<LoanRow>, AppError> {
    if config.count == 0 {
        return Err(AppError::invalid_input("Sample count must be > 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let amount_dist = LogNormal::new(9.3, 0.55)
        .map_err(|e| AppError::invalid_input(format!("Amount distribution error: {e}")))?;
    let rate_noise = Normal::new(0.0, 0.8)
        .map_err(|e| AppError::invalid_input(format!("Rate distribution error: {e}")))?;

    let first_issue = NaiveDate::from_ymd_opt(2007, 6, 1)
        .ok_or_else(|| AppError::invalid_input("Invalid sample start date."))?;

    let mut rows = Vec::with_capacity(config.count);
    for _ in 0..config.count {
        let grade_idx = pick_grade(&mut rng);
        let grade = GRADES[grade_idx];

        // Amounts are quoted in multiples of $25, capped like the source book.
        let raw_amount: f64 = amount_dist.sample(&mut rng);
        let loan_amnt = ((raw_amount / 25.0).round() * 25.0).clamp(500.0, 35_000.0);

        let base_rate = 7.0 + grade_idx as f64 * 3.2;
        let int_rate = ((base_rate + rate_noise.sample(&mut rng)).max(5.0) * 100.0).round() / 100.0;

        let issue = first_issue
            .checked_add_months(Months::new(rng.gen_range(0..138)))
            .unwrap_or(first_issue);
        let issue_d = if rng.gen_bool(BAD_DATE_RATE) {
            "not-a-date".to_string()
        } else {
            issue.format("%Y-%m-%d").to_string()
        };

        let history_years = rng.gen_range(3..30);
        let earliest = NaiveDate::from_ymd_opt(issue.year() - history_years, rng.gen_range(1..=12), 1)
            .unwrap_or(issue);
        let earliest_cr_line = earliest.format("%b-%Y").to_string();

        rows.push(LoanRow {
            grade: Some(grade.to_string()),
            loan_amnt: Some(loan_amnt),
            int_rate: Some(int_rate),
            loan_status: Some(pick_status(&mut rng, grade_idx).label().to_string()),
            purpose: Some(pick_purpose(&mut rng).to_string()),
            issue_d: Some(issue_d),
            earliest_cr_line: Some(earliest_cr_line),
        });
    }

    Ok(rows)
}

/// Write a fresh synthetic loans table to `path`. An existing table of the
/// same name is replaced, so reruns never accumulate rows.
pub fn write_sample_db(path: &Path, table: &str, config: &SampleConfig) -> Result<usize, AppError> {
    let rows = generate_loans(config)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut conn = Connection::open(path).map_err(|e| {
        AppError::store_unavailable(format!("Failed to create database '{}': {e}", path.display()))
    })?;
    let written = replace_loans_table(&mut conn, table, &rows)?;
    info!(rows = written, path = %path.display(), table, "wrote synthetic loans");
    Ok(written)
}

/// Better grades are more common.
fn pick_grade(rng: &mut StdRng) -> usize {
    const WEIGHTS: [f64; 7] = [0.20, 0.30, 0.25, 0.14, 0.07, 0.03, 0.01];
    weighted_index(rng, &WEIGHTS)
}

/// Charge-off odds rise with the grade index.
fn pick_status(rng: &mut StdRng, grade_idx: usize) -> LoanStatus {
    let charged_off = 0.05 + grade_idx as f64 * 0.05;
    let weights = [
        0.55 - charged_off * 0.5,
        charged_off,
        0.02,
        0.01,
        0.01,
        0.005,
        0.01,
        0.005,
        0.30 - charged_off * 0.5,
    ];
    LoanStatus::ALL[weighted_index(rng, &weights)]
}

fn pick_purpose(rng: &mut StdRng) -> &'static str {
    let weights: Vec<f64> = PURPOSES.iter().map(|(_, w)| *w).collect();
    PURPOSES[weighted_index(rng, &weights)].0
}

fn weighted_index(rng: &mut StdRng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let mut target = rng.gen_range(0.0..total);
    for (idx, w) in weights.iter().enumerate() {
        let w = w.max(0.0);
        if target < w {
            return idx;
        }
        target -= w;
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::{LoanStore, SqliteStore};
    use crate::domain::LoanColumn;

    #[test]
    fn generation_is_deterministic_per_seed() {
        let config = SampleConfig { count: 200, seed: 7 };
        let a = generate_loans(&config).unwrap();
        let b = generate_loans(&config).unwrap();
        assert_eq!(a, b);

        let c = generate_loans(&SampleConfig { count: 200, seed: 8 }).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn generated_rows_are_well_formed() {
        let rows = generate_loans(&SampleConfig { count: 500, seed: 1 }).unwrap();
        assert_eq!(rows.len(), 500);
        for r in &rows {
            let amount = r.loan_amnt.unwrap();
            assert!((500.0..=35_000.0).contains(&amount));
            assert!(GRADES.contains(&r.grade.as_deref().unwrap()));
            assert!(LoanStatus::from_label(r.loan_status.as_deref().unwrap()).is_some());
        }
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(generate_loans(&SampleConfig { count: 0, seed: 1 }).is_err());
    }

    #[test]
    fn sample_db_is_readable_by_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.db");
        let written = write_sample_db(&path, "loans50k", &SampleConfig { count: 300, seed: 3 }).unwrap();
        assert_eq!(written, 300);

        let store = SqliteStore::new(&path, "loans50k").unwrap();
        let grades = store.distinct_grades().unwrap();
        assert!(grades.contains(&"A".to_string()));
        assert!(grades.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rerunning_sample_replaces_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.db");
        let config = SampleConfig { count: 100, seed: 3 };
        write_sample_db(&path, "loans50k", &config).unwrap();
        write_sample_db(&path, "loans50k", &config).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM loans50k", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 100);
        drop(conn);

        let store = SqliteStore::new(&path, "loans50k").unwrap();
        let stored = store.fetch_rows("A", &[LoanColumn::LoanAmnt]).unwrap();
        let expected = generate_loans(&config)
            .unwrap()
            .into_iter()
            .filter(|r| r.grade.as_deref() == Some("A"))
            .count();
        assert_eq!(stored.len(), expected);
    }
}
