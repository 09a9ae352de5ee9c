//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads `.env`
//! - sets up logging
//! - serves the dashboard, or runs one of the offline commands

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Command, ExportArgs, ImportArgs, ReportArgs, SampleArgs, ServeArgs, StoreArgs};
use crate::data::{generate_loans, write_sample_db, LoanStore, MemoryStore, SampleConfig, SqliteStore};
use crate::domain::{DashboardConfig, DEFAULT_DB_PATH};
use crate::error::{AppError, ErrorKind};
use crate::server::AppContext;

pub mod pipeline;

/// Environment variable naming the default loans database.
pub const DB_ENV_VAR: &str = "LOANDASH_DB";

/// Entry point for the `loandash` binary.
pub fn run() -> Result<(), AppError> {
    // `loandash` and `loandash --port 9000` should behave like `loandash serve ...`.
    // Clap requires a subcommand name, so argv is rewritten before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let debug = matches!(&cli.command, Command::Serve(args) if args.debug);
    init_tracing(debug);

    match cli.command {
        Command::Serve(args) => handle_serve(args),
        Command::Report(args) => handle_report(args),
        Command::Export(args) => handle_export(args),
        Command::Import(args) => handle_import(args),
        Command::Sample(args) => handle_sample(args),
    }
}

/// Logs go to stderr so `report` output stays pipeable.
///
/// `RUST_LOG` wins; otherwise `info`, or `debug` in development mode.
fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "loandash=debug,tower_http=debug"
    } else {
        "loandash=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Ignore "already set" so `run` stays callable more than once (tests).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = DashboardConfig {
        db_path: resolve_db_path(&args.store),
        table: args.store.table.clone(),
        host: args.host,
        port: args.port,
        debug: args.debug,
    };

    let store = SqliteStore::new(&config.db_path, &config.table)?;
    if !config.db_path.is_file() {
        // Not fatal: the page shows a banner until the file appears.
        warn!(db = %config.db_path.display(), "loans database not found");
    }

    let ctx = AppContext::new(Arc::new(store), config);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::new(ErrorKind::Internal, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(ctx))
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    let store: Box<dyn LoanStore> = if args.demo {
        let rows = generate_loans(&SampleConfig {
            seed: args.seed,
            ..SampleConfig::default()
        })?;
        info!(rows = rows.len(), seed = args.seed, "using generated demo loans");
        Box::new(MemoryStore::new(rows))
    } else {
        Box::new(open_store(&args.store)?)
    };

    let grades = pipeline::grade_options(store.as_ref())?;
    let charts = pipeline::update_charts(store.as_ref(), args.grade.as_deref())?;

    println!("{}", crate::report::format_dashboard_summary(&charts, &grades));
    Ok(())
}

fn handle_export(args: ExportArgs) -> Result<(), AppError> {
    let store = open_store(&args.store)?;
    let charts = pipeline::update_charts(&store, args.grade.as_deref())?;

    crate::io::export::write_charts_json(&args.out, &charts)?;
    info!(path = %args.out.display(), grade = %charts.grade, "wrote charts JSON");

    if let Some(dir) = &args.svg_dir {
        let written = crate::io::export::write_chart_svgs(dir, &charts)?;
        info!(dir = %dir.display(), files = written.len(), "wrote chart SVGs");
    }
    Ok(())
}

fn handle_import(args: ImportArgs) -> Result<(), AppError> {
    let summary = crate::io::ingest::import_loans_csv(&args.csv, &args.db, &args.table)?;

    println!(
        "Imported {} of {} rows into {}:{} ({} rejected)",
        summary.rows_written,
        summary.rows_read,
        args.db.display(),
        args.table,
        summary.row_errors.len()
    );
    for err in &summary.row_errors {
        println!("  line {}: {}", err.line, err.message);
    }
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = SampleConfig {
        count: args.count,
        seed: args.seed,
    };
    let written = write_sample_db(&args.db, &args.table, &config)?;
    println!("Wrote {written} synthetic loans to {}:{}", args.db.display(), args.table);
    Ok(())
}

fn open_store(args: &StoreArgs) -> Result<SqliteStore, AppError> {
    SqliteStore::new(resolve_db_path(args), args.table.clone())
}

/// `--db`, else `$LOANDASH_DB`, else the bundled default path.
fn resolve_db_path(args: &StoreArgs) -> PathBuf {
    db_path_from(args.db.clone(), std::env::var(DB_ENV_VAR).ok())
}

fn db_path_from(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

/// Rewrite argv so `loandash` defaults to `loandash serve`.
///
/// Rules:
/// - `loandash`                       -> `loandash serve`
/// - `loandash --port 9000 ...`       -> `loandash serve --port 9000 ...`
/// - `loandash --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("serve".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "serve" | "report" | "export" | "import" | "sample"
    );
    if is_subcommand {
        return argv;
    }

    // A leading flag belongs to `serve`.
    if arg1.starts_with('-') {
        argv.insert(1, "serve".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_serves() {
        assert_eq!(rewrite_args(argv(&["loandash"])), argv(&["loandash", "serve"]));
        assert_eq!(
            rewrite_args(argv(&["loandash", "--port", "9000"])),
            argv(&["loandash", "serve", "--port", "9000"])
        );
    }

    #[test]
    fn subcommands_and_help_untouched() {
        for args in [
            &["loandash", "report", "--demo"][..],
            &["loandash", "--help"][..],
            &["loandash", "-V"][..],
            &["loandash", "sample", "--db", "x.db"][..],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn rewritten_args_parse() {
        let cli = crate::cli::Cli::parse_from(rewrite_args(argv(&["loandash", "--debug"])));
        assert!(matches!(cli.command, Command::Serve(ref a) if a.debug));
    }

    #[test]
    fn db_path_precedence() {
        assert_eq!(
            db_path_from(Some(PathBuf::from("a.db")), Some("b.db".into())),
            PathBuf::from("a.db")
        );
        assert_eq!(db_path_from(None, Some("b.db".into())), PathBuf::from("b.db"));
        assert_eq!(db_path_from(None, Some("  ".into())), PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(db_path_from(None, None), PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn export_command_writes_json_from_sample_db() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("loans.db");
        write_sample_db(&db, "loans50k", &SampleConfig { count: 300, seed: 7 }).unwrap();

        let out = dir.path().join("charts.json");
        handle_export(ExportArgs {
            store: StoreArgs { db: Some(db), table: "loans50k".into() },
            out: out.clone(),
            grade: Some("B".into()),
            svg_dir: Some(dir.path().join("svg")),
        })
        .unwrap();

        let doc = crate::io::export::read_charts_json(&out).unwrap();
        assert_eq!(doc.charts.grade, "B");
        assert!(dir.path().join("svg").join("time-series.svg").is_file());
    }

    #[test]
    fn export_against_missing_database_fails_with_store_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("charts.json");
        let err = handle_export(ExportArgs {
            store: StoreArgs { db: Some(dir.path().join("missing.db")), table: "loans50k".into() },
            out: out.clone(),
            grade: Some("B".into()),
            svg_dir: None,
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert_eq!(err.exit_code(), 3);
        assert!(!out.exists());
    }
}
