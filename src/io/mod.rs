//! Input/output helpers.
//!
//! - loans CSV import into SQLite (`ingest`)
//! - chart exports (JSON/SVG) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
