use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use driftcheck_catalog::{build_snapshot, CatalogAdapter};
use driftcheck_core::{
    Config, ConnectionConfig, DatabaseEngine, DiscrepancyKind, DiscrepancyReport, ReportFormat,
    Side,
};
use driftcheck_engine::{compare_schemas, compare_schemas_within};

const DEFAULT_CONFIG_FILE: &str = "driftcheck.toml";

/// Exit code of a successful run that found drift
const EXIT_DRIFT: i32 = 2;

/// driftcheck - Schema drift detection between two databases
#[derive(Parser)]
#[command(name = "driftcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: driftcheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the candidate database against the reference database
    Compare {
        /// Report file (default: report_path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format: text or json
        #[arg(short, long)]
        format: Option<ReportFormat>,
    },

    /// Dump the normalized schema snapshot of one database as JSON
    Snapshot {
        /// Which database to read
        #[arg(short, long, value_enum, default_value = "reference")]
        side: SnapshotSide,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify both databases are reachable
    CheckConnection,
}

#[derive(Clone, Copy, ValueEnum)]
enum SnapshotSide {
    Reference,
    Candidate,
}

impl From<SnapshotSide> for Side {
    fn from(side: SnapshotSide) -> Self {
        match side {
            SnapshotSide::Reference => Side::Reference,
            SnapshotSide::Candidate => Side::Candidate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing .env is fine; variables may come from the real environment
    let _ = dotenvy::dotenv();

    init_tracing(cli.verbose)?;

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Compare { output, format } => {
            compare_command(&config, output, format, cli.verbose).await
        }
        Commands::Snapshot { side, output } => {
            snapshot_command(&config, side.into(), output.as_deref(), cli.verbose).await
        }
        Commands::CheckConnection => check_connection_command(&config, cli.verbose).await,
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults and environment".yellow());
        }
        Config::default()
    };

    Ok(config)
}

fn connection_for(config: &Config, side: Side) -> Result<ConnectionConfig> {
    let connection = match side {
        Side::Reference => config.reference_connection(),
        Side::Candidate => config.candidate_connection(),
    };

    connection.with_context(|| format!("Missing connection settings for the {} database", side))
}

async fn connect(side: Side, connection: &ConnectionConfig) -> Result<Box<dyn CatalogAdapter>> {
    match connection.engine {
        DatabaseEngine::Postgres => connect_postgres(connection).await,
        DatabaseEngine::SqlServer => connect_sqlserver(connection).await,
    }
    .with_context(|| format!("Failed to connect to {} database", side))
}

#[cfg(feature = "postgres")]
async fn connect_postgres(connection: &ConnectionConfig) -> Result<Box<dyn CatalogAdapter>> {
    let adapter = driftcheck_catalog::PostgresAdapter::connect(connection).await?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_connection: &ConnectionConfig) -> Result<Box<dyn CatalogAdapter>> {
    Err(anyhow::anyhow!(
        "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
    ))
}

#[cfg(feature = "sqlserver")]
async fn connect_sqlserver(connection: &ConnectionConfig) -> Result<Box<dyn CatalogAdapter>> {
    let adapter = driftcheck_catalog::SqlServerAdapter::connect(connection).await?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlserver"))]
async fn connect_sqlserver(_connection: &ConnectionConfig) -> Result<Box<dyn CatalogAdapter>> {
    Err(anyhow::anyhow!(
        "SQL Server support not compiled. Rebuild with: cargo build --features sqlserver"
    ))
}

async fn connect_both(
    config: &Config,
    verbose: bool,
) -> Result<(Box<dyn CatalogAdapter>, Box<dyn CatalogAdapter>)> {
    let reference = connection_for(config, Side::Reference)?;
    let candidate = connection_for(config, Side::Candidate)?;

    if verbose {
        for (side, connection) in [(Side::Reference, &reference), (Side::Candidate, &candidate)] {
            eprintln!(
                "{} {} ({})",
                format!("{}:", side).cyan(),
                connection.display_target(),
                connection.engine
            );
        }
    }

    tokio::try_join!(
        connect(Side::Reference, &reference),
        connect(Side::Candidate, &candidate),
    )
}

/// Compare command - diff candidate against reference and write the report
async fn compare_command(
    config: &Config,
    output: Option<PathBuf>,
    format: Option<ReportFormat>,
    verbose: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| config.report_path.clone());
    let format = format.unwrap_or(config.report_format);

    if verbose {
        eprintln!("{}", "Comparing database schemas...".cyan());
    }

    let (reference, candidate) = connect_both(config, verbose).await?;

    let records = match config.timeout() {
        Some(deadline) => {
            compare_schemas_within(reference.as_ref(), candidate.as_ref(), &config.comparison, deadline).await
        }
        None => compare_schemas(reference.as_ref(), candidate.as_ref(), &config.comparison).await,
    }
    .context("Schema comparison failed")?;

    let report = DiscrepancyReport::from_records(records);

    let written = report
        .write_if_any(&output, format)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    if written {
        tracing::info!(path = %output.display(), records = report.len(), "report written");
    }

    print_summary(&report, written.then_some(output.as_path()));

    if !report.is_empty() {
        std::process::exit(EXIT_DRIFT);
    }

    Ok(())
}

/// Snapshot command - dump one normalized snapshot as JSON
async fn snapshot_command(
    config: &Config,
    side: Side,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let connection = connection_for(config, side)?;

    if verbose {
        eprintln!("{} {} ({})", "Reading".cyan(), connection.display_target(), side);
    }

    let adapter = connect(side, &connection).await?;
    let snapshot = build_snapshot(adapter.as_ref())
        .await
        .with_context(|| format!("Failed to read the {} catalog", side))?;

    let json = serde_json::to_string_pretty(&snapshot)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            if verbose {
                eprintln!(
                    "{} {} tables, {} columns -> {}",
                    "✓".green(),
                    snapshot.len(),
                    snapshot.column_count(),
                    path.display()
                );
            }
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Check connection command - fail fast on credentials
async fn check_connection_command(config: &Config, verbose: bool) -> Result<()> {
    let (reference, candidate) = connect_both(config, verbose).await?;

    for (side, adapter) in [(Side::Reference, &reference), (Side::Candidate, &candidate)] {
        adapter
            .test_connection()
            .await
            .with_context(|| format!("{} database is not reachable", side))?;

        println!("{} {} database ({})", "✓".green(), side, adapter.name());
    }

    Ok(())
}

fn print_summary(report: &DiscrepancyReport, written_to: Option<&Path>) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Schema Drift Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if report.is_empty() {
        println!("{}", "✓ Schemas match!".green().bold());
        println!();
        println!("{}", "=".repeat(60).bright_blue());
        return;
    }

    println!("{}", "Summary:".bold());
    println!("  Total discrepancies: {}", report.len().to_string().red().bold());
    println!("  Missing tables:      {}", report.count(DiscrepancyKind::TableMissing));
    println!("  Missing columns:     {}", report.count(DiscrepancyKind::ColumnMissing));
    println!("  Attribute mismatches: {}", report.count(DiscrepancyKind::ColumnAttributeMismatch));
    println!();

    println!("{}", "Details:".bold());
    for record in &report.discrepancies {
        let kind = match record.kind {
            DiscrepancyKind::TableMissing => record.kind.as_str().red().bold(),
            DiscrepancyKind::ColumnMissing => record.kind.as_str().yellow().bold(),
            DiscrepancyKind::ColumnAttributeMismatch => record.kind.as_str().cyan(),
        };
        println!("  [{}] {}", kind, record.message);
    }

    if let Some(path) = written_to {
        println!();
        println!("{} {}", "Report saved to:".green(), path.display());
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compare_flags() {
        let cli = Cli::try_parse_from(["driftcheck", "compare", "--format", "json", "-o", "drift.json"]).unwrap();
        match cli.command {
            Commands::Compare { output, format } => {
                assert_eq!(output, Some(PathBuf::from("drift.json")));
                assert_eq!(format, Some(ReportFormat::Json));
            }
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["driftcheck", "compare", "--format", "xml"]).is_err());
    }

    #[test]
    fn snapshot_side_defaults_to_reference() {
        let cli = Cli::try_parse_from(["driftcheck", "snapshot"]).unwrap();
        match cli.command {
            Commands::Snapshot { side, output } => {
                assert_eq!(Side::from(side), Side::Reference);
                assert!(output.is_none());
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn connection_from_config_file() {
        let config = Config::from_toml(
            r#"
            [reference]
            host = "app-db"
            user = "app"
            database = "shop"

            [candidate]
            host = "test-db"
            user = "ci"
            database = "shop_test"
            "#,
        )
        .unwrap();

        let candidate = connection_for(&config, Side::Candidate).unwrap();
        assert_eq!(candidate.display_target(), "test-db:5432/shop_test");
    }

    #[test]
    fn sql_server_connection_defaults_to_its_port() {
        let config = Config::from_toml(
            r#"
            [reference]
            engine = "mssql"
            host = "app-db"
            user = "sa"
            database = "shop"
            "#,
        )
        .unwrap();

        let reference = connection_for(&config, Side::Reference).unwrap();
        assert_eq!(reference.engine, DatabaseEngine::SqlServer);
        assert_eq!(reference.display_target(), "app-db:1433/shop");
    }
}
