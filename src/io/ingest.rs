//! CSV ingest into the loans store.
//!
//! Turns a loans CSV export into `LoanRow`s and writes them to a fresh SQLite
//! table. Only `grade` is required per row; every other column is optional and
//! stays NULL when absent or unparseable. Dates are stored as the raw text so
//! the chart layer sees exactly what the export contained.
//!
//! Bad rows are skipped and reported, never fatal.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::data::store::{create_and_insert_loans, parse_number, validate_table_name};
use crate::domain::{LoanColumn, LoanRow};
use crate::error::{AppError, ErrorKind};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed CSV content: usable rows plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct IngestedLoans {
    pub rows: Vec<LoanRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Result of `import_loans_csv`.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub row_errors: Vec<RowError>,
}

/// Read loans from any CSV source.
pub fn read_loans_csv<R: Read>(source: R) -> Result<IngestedLoans, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid_input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    if !header_map.contains_key(LoanColumn::Grade.column_name()) {
        return Err(AppError::invalid_input("Missing required column: `grade`"));
    }

    let mut out = IngestedLoans::default();

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(row) => out.rows.push(row),
            Err(message) => out.row_errors.push(RowError { line, message }),
        }
    }

    Ok(out)
}

/// Load `csv_path` into a new table `table` of the SQLite file at `db_path`.
///
/// Fails if the table already exists so an import never mixes two exports.
pub fn import_loans_csv(csv_path: &Path, db_path: &Path, table: &str) -> Result<ImportSummary, AppError> {
    validate_table_name(table)?;

    let file = File::open(csv_path).map_err(|e| {
        AppError::new(
            ErrorKind::Io,
            format!("Failed to open CSV '{}': {e}", csv_path.display()),
        )
    })?;
    let ingested = read_loans_csv(file)?;

    if ingested.rows.is_empty() {
        return Err(AppError::invalid_input(format!(
            "No usable loan rows in '{}' ({} read, {} rejected).",
            csv_path.display(),
            ingested.rows_read,
            ingested.row_errors.len()
        )));
    }

    let mut conn = Connection::open(db_path).map_err(|e| {
        AppError::store_unavailable(format!("Failed to open database '{}': {e}", db_path.display()))
    })?;

    if table_exists(&conn, table)? {
        return Err(AppError::invalid_input(format!(
            "Table '{table}' already exists in '{}'.",
            db_path.display()
        )));
    }

    let rows_written = create_and_insert_loans(&mut conn, table, &ingested.rows)?;

    for err in ingested.row_errors.iter().take(10) {
        warn!(line = err.line, "{}", err.message);
    }
    info!(
        rows_read = ingested.rows_read,
        rows_written,
        rejected = ingested.row_errors.len(),
        table,
        "imported loans CSV"
    );

    Ok(ImportSummary {
        rows_read: ingested.rows_read,
        rows_written,
        row_errors: ingested.row_errors,
    })
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<LoanRow, String> {
    let grade = get_required(record, header_map, LoanColumn::Grade)?.to_string();

    let loan_amnt = parse_opt_number(record, header_map, LoanColumn::LoanAmnt)?;
    let int_rate = parse_opt_number(record, header_map, LoanColumn::IntRate)?;

    Ok(LoanRow {
        grade: Some(grade),
        loan_amnt,
        int_rate,
        loan_status: get_optional(record, header_map, LoanColumn::LoanStatus).map(str::to_string),
        purpose: get_optional(record, header_map, LoanColumn::Purpose).map(str::to_string),
        issue_d: get_optional(record, header_map, LoanColumn::IssueD).map(str::to_string),
        earliest_cr_line: get_optional(record, header_map, LoanColumn::EarliestCrLine).map(str::to_string),
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    column: LoanColumn,
) -> Result<&'a str, String> {
    get_optional(record, header_map, column)
        .ok_or_else(|| format!("Missing required value: `{}`", column.column_name()))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, column: LoanColumn) -> Option<&'a str> {
    let idx = header_map.get(column.column_name())?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Empty is fine (NULL); present but unparseable rejects the row.
fn parse_opt_number(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    column: LoanColumn,
) -> Result<Option<f64>, String> {
    match get_optional(record, header_map, column) {
        None => Ok(None),
        Some(raw) => parse_number(raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid `{}` value: '{raw}'", column.column_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LoanStore, SqliteStore};

    const CSV: &str = "\u{feff}Grade,loan_amnt,int_rate,loan_status,purpose,issue_d,earliest_cr_line\n\
        B,1000, 10.65%,Charged Off,car,2013-06-01,Jan-2001\n\
        B,500,9.5,Fully Paid,,2013-09-01,\n\
        ,700,9.5,Fully Paid,car,2013-09-01,Jan-2001\n\
        A,lots,7.1,Current,car,2014-01-01,Jan-1999\n\
        A,2500,,Current,wedding,2014-01-01,May-2004\n";

    #[test]
    fn reads_rows_and_reports_bad_ones() {
        let ingested = read_loans_csv(CSV.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 5);
        assert_eq!(ingested.rows.len(), 3);
        assert_eq!(
            ingested.row_errors.iter().map(|e| e.line).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert!(ingested.row_errors[1].message.contains("loan_amnt"));

        let first = &ingested.rows[0];
        assert_eq!(first.grade.as_deref(), Some("B"));
        assert_eq!(first.int_rate, Some(10.65));
        assert_eq!(first.earliest_cr_line.as_deref(), Some("Jan-2001"));

        let second = &ingested.rows[1];
        assert_eq!(second.purpose, None);
        assert_eq!(second.earliest_cr_line, None);

        assert_eq!(ingested.rows[2].int_rate, None);
    }

    #[test]
    fn missing_grade_column_is_rejected() {
        let err = read_loans_csv("loan_amnt,int_rate\n100,5\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.message().contains("grade"));
    }

    #[test]
    fn import_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("loans.csv");
        let db_path = dir.path().join("loans.db");
        std::fs::write(&csv_path, CSV).unwrap();

        let summary = import_loans_csv(&csv_path, &db_path, "loans50k").unwrap();
        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.row_errors.len(), 2);

        let store = SqliteStore::new(&db_path, "loans50k").unwrap();
        assert_eq!(store.distinct_grades().unwrap(), vec!["A", "B"]);
        let rows = store.fetch_rows("B", &[LoanColumn::LoanAmnt]).unwrap();
        assert_eq!(rows.len(), 2);

        let err = import_loans_csv(&csv_path, &db_path, "loans50k").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.message().contains("already exists"));
    }

    #[test]
    fn import_of_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_loans_csv(&dir.path().join("nope.csv"), &dir.path().join("x.db"), "loans").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.exit_code(), 2);
    }
}
