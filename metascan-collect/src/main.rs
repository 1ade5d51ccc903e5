//! `metascan` binary: scans one data source and writes a schema snapshot.
//!
//! # Security Guarantees
//! - Only catalog and aggregate SQL reaches the source
//! - Passwords and tokens never appear in logs or output files

use anyhow::{Context, Result};
use clap::Parser;
use metascan_collect::diff::SnapshotDiff;
use metascan_collect::output::{load_snapshot, save_snapshot};
use metascan_collect::{Cli, Command, DiffArgs, ScanArgs, SourceArgs, TablesArgs};
use metascan_core::{
    ConnectionConfig, DialectCatalog, DialectKind, DriverConnectionProvider, PlaintextDecryptor,
    ScanEngine, ScanSettings, TypeMap, init_logging,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    match &cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::Tables(args) => run_tables(args).await,
        Command::Test(args) => run_test(&args.source).await,
        Command::Diff(args) => run_diff(args).await,
        Command::List => {
            list_supported_sources();
            Ok(())
        }
    }
}

/// Resolves the connection and the schema to scan.
fn resolve_source(source: &SourceArgs) -> Result<(ConnectionConfig, String)> {
    let password = if source.prompt_password {
        let password =
            rpassword::prompt_password("Password: ").context("Failed to read password")?;
        Some(password)
    } else {
        None
    };

    let descriptor = source.descriptor(password);
    let schema = descriptor
        .schema_name()
        .map(str::to_string)
        .context("No schema to scan: pass --schema or --database")?;
    let config = ConnectionConfig::resolve(&descriptor, &PlaintextDecryptor)?;
    Ok((config, schema))
}

fn engine_for(settings: ScanSettings) -> ScanEngine {
    let provider = Arc::new(DriverConnectionProvider::new(settings.connect_timeout));
    ScanEngine::new(provider).with_settings(settings)
}

async fn run_scan(args: &ScanArgs) -> Result<()> {
    let (config, schema) = resolve_source(&args.source)?;

    let mut type_map = TypeMap::defaults_for(config.dialect);
    if let Some(path) = &args.type_map {
        let overrides = TypeMap::load(path)
            .await
            .with_context(|| format!("Failed to load type map {}", path.display()))?;
        info!("Loaded {} type mappings from {}", overrides.len(), path.display());
        type_map.extend(overrides);
    }

    info!("Target: {}", config);
    info!("Output: {}", args.output.display());

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing tables in flight");
                cancel.cancel();
            }
        })
    };

    let engine = engine_for(args.settings());
    let scanned = engine.scan_schema(&config, &schema, &type_map, &cancel).await;
    interrupt.abort();
    let snapshot = scanned.with_context(|| format!("Scan of schema {} failed", schema))?;

    save_snapshot(&snapshot, &args.output, args.compress)
        .await
        .with_context(|| format!("Failed to save snapshot to {}", args.output.display()))?;

    let summary = &snapshot.summary;
    println!("Schema scan {}", if snapshot.cancelled { "cancelled" } else { "completed" });
    println!("Output: {}", args.output.display());
    println!("Tables: {}", summary.table_count);
    println!("Fields: {} ({} analyzed)", summary.field_count, summary.analyzed_field_count);
    println!("Rows: {}", summary.total_rows);
    println!("Size: {}", summary.total_size_formatted);
    if !snapshot.warnings.is_empty() {
        println!("Warnings: {}", snapshot.warnings.len());
    }
    if !snapshot.report.failures.is_empty() {
        println!("Failed statistics: {}", snapshot.report.failures.len());
    }
    Ok(())
}

async fn run_tables(args: &TablesArgs) -> Result<()> {
    let (config, schema) = resolve_source(&args.source)?;
    let settings = ScanSettings::default().with_connect_timeout(args.source.connect_timeout());
    let tables = engine_for(settings).list_tables(&config, &schema).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&tables).context("Failed to render tables")?;
        println!("{}", json);
        return Ok(());
    }

    for table in tables.values() {
        let kind = match table.scan_source_kind {
            Some(kind) => format!("{:?}", kind).to_lowercase(),
            None => "-".to_string(),
        };
        let rows = table
            .row_count
            .map_or_else(|| "-".to_string(), |rows| rows.to_string());
        println!("{}\t{}\t{}", table.name, kind, rows);
    }
    info!("{} tables in {}", tables.len(), schema);
    Ok(())
}

async fn run_test(source: &SourceArgs) -> Result<()> {
    let (config, _) = resolve_source(source)?;
    let settings = ScanSettings::default().with_connect_timeout(source.connect_timeout());
    engine_for(settings)
        .test_connection(&config)
        .await
        .with_context(|| format!("Connection test failed for {}", config.dialect))?;
    println!("Connection to {} data source successful", config.dialect);
    Ok(())
}

async fn run_diff(args: &DiffArgs) -> Result<()> {
    let old = load_snapshot(&args.old)
        .await
        .with_context(|| format!("Failed to load {}", args.old.display()))?;
    let new = load_snapshot(&args.new)
        .await
        .with_context(|| format!("Failed to load {}", args.new.display()))?;
    if old.schema != new.schema {
        warn!("Comparing different schemas: {} and {}", old.schema, new.schema);
    }

    let diff = SnapshotDiff::between(&old, &new);
    if args.json {
        let json = serde_json::to_string_pretty(&diff).context("Failed to render diff")?;
        println!("{}", json);
    } else if diff.is_empty() {
        println!("No changes");
    } else {
        print!("{}", diff.render());
    }
    Ok(())
}

/// Lists supported data-source types and whether their driver is built in
fn list_supported_sources() {
    println!("Supported Data Sources:");
    println!();
    for kind in DialectKind::ALL {
        let entry = DialectCatalog::entry(kind);
        let status = if entry.driver.is_available() {
            "available"
        } else {
            "not compiled in"
        };
        println!("{}:", kind);
        println!("  URL:    {}host:{}/database", entry.url_prefix, entry.default_port);
        println!("  Driver: {} ({})", entry.driver, status);
        if entry.requires_token {
            println!("  Auth:   bearer token (--token)");
        }
        println!();
    }

    println!("Output Formats:");
    println!("  .json      - Plain JSON (default)");
    #[cfg(feature = "compression")]
    println!("  .json.zst  - Compressed JSON (--compress)");
}
