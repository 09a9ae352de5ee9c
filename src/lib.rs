//! `loandash` library crate.
//!
//! The binary (`loandash`) is a thin wrapper around this library so that:
//!
//! - the dashboard cycle is testable without a browser or a running server
//! - the same chart derivation backs the HTTP API, the page and the CLI reports
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod charts;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod server;
