//! Migration CLI.
//!
//! ```text
//! migrate run     apply pending migrations, exit 1 on the first failure
//! migrate status  list applied and pending migrations
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use bank_gateway::config::{load_from_environment, GatewayConfig};
use bank_gateway::database::Database;
use bank_gateway::migrations::{
    MigrationError, MigrationRegistry, MigrationRunner, MigrationState, StatusReport,
};
use bank_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Apply and inspect database schema migrations", long_about = None)]
struct Cli {
    /// Migrations directory (overrides MIGRATIONS_DIR and the config file)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Accept migration files without a timestamp prefix
    #[arg(long)]
    lenient: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Run,
    /// Show applied and pending migrations
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_from_environment() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_tracing(&config.observability, config.mode);

    if let Some(dir) = cli.dir {
        config.migrations.directory = dir;
    }
    if cli.lenient {
        config.migrations.lenient_filenames = true;
    }

    let runner = match open_runner(&config) {
        Ok(runner) => runner,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run => run(&runner),
        Commands::Status => status(&runner),
    }
}

fn open_runner(config: &GatewayConfig) -> Result<MigrationRunner, String> {
    if config.database.url.trim().is_empty() {
        return Err("DATABASE_URL is not set".to_string());
    }
    let database = Database::open(&config.database.url)
        .map_err(|e| format!("Cannot open database: {e}"))?;
    let registry = MigrationRegistry::new(config.migrations.directory.clone())
        .lenient(config.migrations.lenient_filenames);
    Ok(MigrationRunner::new(registry, Arc::new(database)))
}

fn run(runner: &MigrationRunner) -> ExitCode {
    println!("Starting database migrations...");
    match runner.run() {
        Ok(report) if report.applied.is_empty() && report.skipped.is_empty() => {
            println!("No pending migrations");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            for id in &report.applied {
                println!("Applied   {id}");
            }
            for id in &report.skipped {
                println!("Skipped   {id} (already recorded)");
            }
            println!("All migrations completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_failure(e: &MigrationError) {
    match e.filename() {
        Some(filename) => eprintln!("Migration failed at {filename}: {e}"),
        None => eprintln!("Migration failed: {e}"),
    }
}

fn status(runner: &MigrationRunner) -> ExitCode {
    match runner.status() {
        Ok(report) => {
            print_status(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn print_status(report: &StatusReport) {
    println!("Migration Status:");
    println!("==================");
    for migration in &report.migrations {
        match &migration.state {
            MigrationState::Applied {
                applied_at,
                checksum_matches,
            } => {
                let drift = if *checksum_matches == Some(false) {
                    "  (modified since applied)"
                } else {
                    ""
                };
                println!(
                    "Applied  - {}  {}{}",
                    migration.filename,
                    applied_at.format("%Y-%m-%d %H:%M:%S"),
                    drift
                );
            }
            MigrationState::Pending => println!("Pending  - {}", migration.filename),
        }
    }
    for orphan in &report.orphaned {
        println!("Missing  - {} (recorded, file not found)", orphan.filename);
    }

    println!();
    println!("Total: {} migrations", report.total);
    println!("Applied: {}", report.applied);
    println!("Pending: {}", report.pending);
}
