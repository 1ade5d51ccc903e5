//! Command-line surface of the `metascan` collector.
//!
//! The argument types live here so that tests can parse command lines
//! without spawning the binary; `main.rs` only dispatches.

pub mod diff;
pub mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use metascan_core::{DataSourceDescriptor, LogFormat, ScanSettings};
use std::path::PathBuf;
use std::time::Duration;

/// Default snapshot file name.
pub const DEFAULT_OUTPUT: &str = "metascan-snapshot.json";

/// Parsed command line.
#[derive(Parser, Debug)]
#[command(name = "metascan")]
#[command(about = "Metadata introspection and statistics collector")]
#[command(version)]
#[command(long_about = "
metascan - schema metadata and column statistics for heterogeneous sources

Connects to one data source, pages through the tables of a schema, reads
column metadata and computes per-column statistics (null ratio, uniqueness,
top values) with sampling on large tables. Storage figures, primary key and
index counts are added per table where the dialect exposes them.

CREDENTIALS:
  --password or METASCAN_PASSWORD for password dialects
  --token or METASCAN_TOKEN for token dialects (inceptor)
  --prompt-password to read the password from the terminal

EXAMPLES:
  metascan scan --type postgresql --host db.internal --database sales -u reader
  metascan scan --type mysql --database shop --concurrency 4 -o shop.json
  metascan tables --type sqlserver --host mssql --database erp --schema dbo
  metascan diff yesterday.json today.json
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a schema and write the snapshot
    Scan(ScanArgs),
    /// List the tables of a schema
    Tables(TablesArgs),
    /// Test the connection to a data source
    Test(TestArgs),
    /// Compare the columns of two snapshot files
    Diff(DiffArgs),
    /// List supported data-source types
    List,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

/// `--log-format` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Where and how to connect.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Data-source type (mysql, mariadb, doris, postgresql, opengauss,
    /// hologres, oracle, sqlserver, inceptor)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub source_type: String,

    /// Host name or address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port; the dialect default applies when omitted
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Database (or service) name
    #[arg(short, long)]
    pub database: Option<String>,

    /// Schema to scan; defaults to the database name
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Login account
    #[arg(short = 'u', long, env = "METASCAN_ACCOUNT")]
    pub account: Option<String>,

    /// Login password
    #[arg(long, env = "METASCAN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from the terminal
    #[arg(long, conflicts_with = "password")]
    pub prompt_password: bool,

    /// Bearer token for token-authenticated sources
    #[arg(long, env = "METASCAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

impl SourceArgs {
    /// Builds the descriptor handed to the engine. `password` overrides the
    /// `--password` flag.
    pub fn descriptor(&self, password: Option<String>) -> DataSourceDescriptor {
        let mut descriptor = DataSourceDescriptor::new(&self.source_type, &self.host);
        descriptor.port = self.port;
        descriptor.database = self.database.clone();
        descriptor.schema = self.schema.clone();
        descriptor.account = self.account.clone();
        descriptor.encrypted_password = password.or_else(|| self.password.clone());
        descriptor.token = self.token.clone();
        descriptor
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// `metascan scan`
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_OUTPUT, help = "Output file path (.json or .json.zst)")]
    pub output: PathBuf,

    /// Enable compression
    #[arg(long, help = "Compress output using Zstandard (.json.zst)")]
    pub compress: bool,

    /// JSON object of source type to logical type, merged over the defaults
    #[arg(long, value_name = "FILE")]
    pub type_map: Option<PathBuf>,

    /// Tables scanned in parallel
    #[arg(short, long, default_value_t = 1)]
    pub concurrency: usize,

    /// Skip column statistics
    #[arg(long)]
    pub no_statistics: bool,

    /// Rows per table listing page
    #[arg(long, default_value_t = 1000)]
    pub page_size: u64,

    /// Per-statement timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub query_timeout: u64,
}

impl ScanArgs {
    /// Scan settings selected by the flags. Validation happens in the engine.
    pub fn settings(&self) -> ScanSettings {
        ScanSettings::default()
            .with_page_size(self.page_size)
            .with_query_timeout(Duration::from_secs(self.query_timeout))
            .with_connect_timeout(self.source.connect_timeout())
            .with_max_concurrency(self.concurrency)
            .with_statistics(!self.no_statistics)
    }
}

/// `metascan tables`
#[derive(Args, Debug)]
pub struct TablesArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

/// `metascan test`
#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

/// `metascan diff`
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Earlier snapshot
    pub old: PathBuf,

    /// Later snapshot
    pub new: PathBuf,

    /// Print the comparison as JSON
    #[arg(long)]
    pub json: bool,
}
