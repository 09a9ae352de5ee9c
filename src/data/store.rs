//! Loan record access.
//!
//! `LoanStore` is the only way the dashboard reads loans. Two implementations:
//!
//! - `SqliteStore`: the real store, one read-only connection per call
//! - `MemoryStore`: a fixed set of rows, used for demos and tests
//!
//! Grade values are always bound as parameters. Column names come from the
//! closed `LoanColumn` set and the table name is checked once at construction.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use crate::domain::{LoanColumn, LoanRow};
use crate::error::AppError;

/// Read access to the loans table.
pub trait LoanStore: Send + Sync {
    /// Every distinct non-blank grade, ascending.
    fn distinct_grades(&self) -> Result<Vec<String>, AppError>;

    /// Rows whose grade equals `grade`, with only `columns` filled in.
    ///
    /// Zero matching rows is `Ok(vec![])`, not an error.
    fn fetch_rows(&self, grade: &str, columns: &[LoanColumn]) -> Result<Vec<LoanRow>, AppError>;
}

/// SQLite-backed loan store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    table: String,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self, AppError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            path: path.into(),
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn connect(&self) -> Result<Connection, AppError> {
        if !self.path.is_file() {
            return Err(AppError::store_unavailable(format!(
                "Loans database not found: {}",
                self.path.display()
            )));
        }
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AppError::store_unavailable(format!(
                "Failed to open loans database '{}': {e}",
                self.path.display()
            ))
        })
    }
}

impl LoanStore for SqliteStore {
    fn distinct_grades(&self) -> Result<Vec<String>, AppError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT DISTINCT CAST(grade AS TEXT) AS g FROM \"{}\" \
             WHERE grade IS NOT NULL AND TRIM(CAST(grade AS TEXT)) <> '' ORDER BY g",
            self.table
        );
        let mut stmt = conn.prepare(&sql)?;
        let grades = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = grades.len(), table = %self.table, "listed distinct grades");
        Ok(grades)
    }

    fn fetch_rows(&self, grade: &str, columns: &[LoanColumn]) -> Result<Vec<LoanRow>, AppError> {
        if columns.is_empty() {
            return Err(AppError::invalid_input("At least one column must be requested."));
        }

        let conn = self.connect()?;
        let select_list = columns
            .iter()
            .map(|c| c.column_name())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {select_list} FROM \"{}\" WHERE grade = ?1", self.table);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![grade], |row| {
                let mut out = LoanRow::default();
                for (idx, column) in columns.iter().enumerate() {
                    let value = row.get_ref(idx)?;
                    match column {
                        LoanColumn::Grade => out.grade = value_to_text(value),
                        LoanColumn::LoanAmnt => out.loan_amnt = value_to_number(value),
                        LoanColumn::IntRate => out.int_rate = value_to_number(value),
                        LoanColumn::LoanStatus => out.loan_status = value_to_text(value),
                        LoanColumn::Purpose => out.purpose = value_to_text(value),
                        LoanColumn::IssueD => out.issue_d = value_to_text(value),
                        LoanColumn::EarliestCrLine => out.earliest_cr_line = value_to_text(value),
                    }
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(grade, columns = %select_list, rows = rows.len(), "fetched loan rows");
        Ok(rows)
    }
}

/// In-memory loan store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<LoanRow>,
}

impl MemoryStore {
    pub fn new(rows: Vec<LoanRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LoanRow] {
        &self.rows
    }
}

impl LoanStore for MemoryStore {
    fn distinct_grades(&self) -> Result<Vec<String>, AppError> {
        let mut grades: Vec<String> = self
            .rows
            .iter()
            .filter_map(|r| r.grade.clone())
            .filter(|g| !g.trim().is_empty())
            .collect();
        grades.sort();
        grades.dedup();
        Ok(grades)
    }

    fn fetch_rows(&self, grade: &str, columns: &[LoanColumn]) -> Result<Vec<LoanRow>, AppError> {
        if columns.is_empty() {
            return Err(AppError::invalid_input("At least one column must be requested."));
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| r.grade.as_deref() == Some(grade))
            .map(|r| r.project(columns))
            .collect())
    }
}

fn loans_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            grade TEXT,
            loan_amnt REAL,
            int_rate REAL,
            loan_status TEXT,
            purpose TEXT,
            issue_d TEXT,
            earliest_cr_line TEXT
        );
        CREATE INDEX IF NOT EXISTS \"{table}_grade_idx\" ON \"{table}\" (grade);"
    )
}

/// Create the table and fill it as one transaction. On error the database is
/// left as it was, with no empty table behind.
pub fn create_and_insert_loans(
    conn: &mut Connection,
    table: &str,
    rows: &[LoanRow],
) -> Result<usize, AppError> {
    validate_table_name(table)?;
    let tx = conn.transaction()?;
    tx.execute_batch(&loans_table_sql(table))?;
    write_rows(&tx, table, rows)?;
    tx.commit()?;
    Ok(rows.len())
}

/// Drop any existing table of that name, then recreate and fill it, all in
/// one transaction.
pub fn replace_loans_table(conn: &mut Connection, table: &str, rows: &[LoanRow]) -> Result<usize, AppError> {
    validate_table_name(table)?;
    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\";"))?;
    tx.execute_batch(&loans_table_sql(table))?;
    write_rows(&tx, table, rows)?;
    tx.commit()?;
    Ok(rows.len())
}

fn write_rows(conn: &Connection, table: &str, rows: &[LoanRow]) -> Result<(), AppError> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO \"{table}\" (grade, loan_amnt, int_rate, loan_status, purpose, issue_d, earliest_cr_line)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ))?;
    for r in rows {
        stmt.execute(params![
            r.grade,
            r.loan_amnt,
            r.int_rate,
            r.loan_status,
            r.purpose,
            r.issue_d,
            r.earliest_cr_line,
        ])?;
    }
    Ok(())
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed.
pub fn validate_table_name(table: &str) -> Result<(), AppError> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::invalid_input(format!(
            "Invalid table name '{table}': use letters, digits and underscores only."
        )));
    }
    Ok(())
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn value_to_number(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(bytes) => parse_number(&String::from_utf8_lossy(bytes)),
    }
}

/// Parse numeric text such as `"10000"`, `" 10.65%"` or `"13.5 "`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
