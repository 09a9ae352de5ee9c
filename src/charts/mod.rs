//! Chart derivation.
//!
//! - row reshaping: date parsing, yearly grouping, binning (`aggregate`)
//! - chart specifications for the five dashboard charts (`build`)

pub mod aggregate;
pub mod build;

pub use build::{build_chart, columns_for};
