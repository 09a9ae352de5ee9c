//! Data sources: the loans store and synthetic sample generation.

pub mod sample;
pub mod store;

pub use sample::{generate_loans, write_sample_db, SampleConfig};
pub use store::{LoanStore, MemoryStore, SqliteStore};
