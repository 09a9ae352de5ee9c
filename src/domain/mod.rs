//! Domain types used throughout the dashboard.
//!
//! This module defines:
//!
//! - the loan record and its queryable columns (`LoanRow`, `LoanColumn`)
//! - the fixed status-color enumeration (`LoanStatus`)
//! - chart specifications and per-chart outcomes (`ChartSpec`, `DashboardCharts`)

pub mod types;

pub use types::*;
