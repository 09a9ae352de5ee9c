//! Command-line parsing for the loan dashboard.
//!
//! Argument parsing and command dispatch stay separate from the chart and
//! storage code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TABLE};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "loandash", version, about = "Loan Default Risk Dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the dashboard over HTTP (the default when no subcommand is given).
    Serve(ServeArgs),
    /// Print a text summary of the five charts for one grade.
    Report(ReportArgs),
    /// Write the five chart outcomes for one grade to JSON (and optionally SVG).
    Export(ExportArgs),
    /// Load a loans CSV into a new SQLite table.
    Import(ImportArgs),
    /// Write a synthetic loans table for demos.
    Sample(SampleArgs),
}

/// Where the loans live.
#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// SQLite database file [default: $LOANDASH_DB or data/loans50k.db].
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Loans table name.
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Interface to bind.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Development mode: debug-level logs and request tracing.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Grade to summarize [default: first grade].
    #[arg(short, long)]
    pub grade: Option<String>,

    /// Use generated in-memory loans instead of a database.
    #[arg(long)]
    pub demo: bool,

    /// Seed for `--demo` data.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output JSON file.
    #[arg(short, long, value_name = "JSON")]
    pub out: PathBuf,

    /// Grade to export [default: first grade].
    #[arg(short, long)]
    pub grade: Option<String>,

    /// Also render each ready chart to `<DIR>/<chart>.svg`.
    #[arg(long, value_name = "DIR")]
    pub svg_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    /// Loans CSV export (needs a `grade` column).
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// SQLite database file to create or extend.
    #[arg(long, value_name = "PATH")]
    pub db: PathBuf,

    /// Name of the new table.
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// SQLite database file to write.
    #[arg(long, value_name = "PATH")]
    pub db: PathBuf,

    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Number of loans to generate.
    #[arg(short = 'n', long, default_value_t = 5000)]
    pub count: usize,

    /// Random seed (same seed, same loans).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["loandash", "serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 8060);
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.store.table, "loans50k");
        assert!(args.store.db.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn export_requires_out() {
        assert!(Cli::try_parse_from(["loandash", "export"]).is_err());
        let cli = Cli::parse_from(["loandash", "export", "--out", "c.json", "-g", "C", "--svg-dir", "svg"]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.grade.as_deref(), Some("C"));
        assert_eq!(args.svg_dir, Some(PathBuf::from("svg")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
