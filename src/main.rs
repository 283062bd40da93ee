use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use timetable_sync::config::{CourseConfig, CourseScope};
use timetable_sync::sync::{self, SyncOptions};
use timetable_sync::{Result, TimetableError};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match catch_unwind(AssertUnwindSafe(|| run(cli))) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(error)) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
        Err(_) => {
            eprintln!("error: unexpected internal failure");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Extract(args) => {
            let config = CourseConfig::load(args.course, config_path)?;
            sync::extract_to_json(
                &args.input,
                args.output.as_deref(),
                args.sheet.as_deref(),
                &config,
            )
        }
        Command::Sync(args) => {
            let config = CourseConfig::load(args.course, config_path)?;
            let options = SyncOptions {
                sheet: args.sheet,
                create_store: args.create_store,
                dry_run: args.dry_run,
            };
            let summary = sync::sync_store(&args.input, &args.store, &config, &options)?;
            println!(
                "{}: {} matched, {} created, {} deactivated, {} codes assigned{}",
                config.code,
                summary.matched,
                summary.created,
                summary.deactivated,
                summary.codes_assigned,
                if options.dry_run { " (dry run)" } else { "" }
            );
            Ok(())
        }
        Command::Export(args) => sync::export_workbook(&args.store, &args.output),
    }
}

// RUST_LOG wins over the verbosity flag when set.
fn init_logging(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| TimetableError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract university timetable grids and reconcile them into a subject store."
)]
struct Cli {
    /// TOML file with per-course overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract subjects from a timetable workbook and print them as JSON.
    Extract(ExtractArgs),
    /// Reconcile a timetable workbook into the canonical subject store.
    Sync(SyncArgs),
    /// Write the canonical store as a review workbook.
    Export(ExportArgs),
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Course whose timetable is being read.
    #[arg(long, value_enum)]
    course: CourseScope,

    /// Timetable workbook path.
    #[arg(long)]
    input: PathBuf,

    /// Worksheet to read; every worksheet when omitted.
    #[arg(long)]
    sheet: Option<String>,

    /// Output JSON path; standard output when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Course whose timetable is being read.
    #[arg(long, value_enum)]
    course: CourseScope,

    /// Timetable workbook path.
    #[arg(long)]
    input: PathBuf,

    /// Canonical JSON store path.
    #[arg(long)]
    store: PathBuf,

    /// Worksheet to read; every worksheet when omitted.
    #[arg(long)]
    sheet: Option<String>,

    /// Start from an empty store if the store file does not exist.
    #[arg(long)]
    create_store: bool,

    /// Report what would change without writing the store.
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Canonical JSON store path.
    #[arg(long)]
    store: PathBuf,

    /// Review workbook path.
    #[arg(long)]
    output: PathBuf,
}
