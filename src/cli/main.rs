//! CLI binary entry point for semantic-loader

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::ConfigArgs;
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::ddl::{DdlArgs, handle_ddl};
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::inventory::{InventoryArgs, handle_inventory};
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::query::{QueryArgs, handle_query};
#[cfg(feature = "cli")]
use semantic_loader::cli::commands::run::{ReportFormat, RunArgs, handle_run, handle_verify};
#[cfg(feature = "cli")]
use semantic_loader::cli::logging::{LogFormat, init_logging};
#[cfg(feature = "cli")]
use semantic_loader::models::SqlDialect;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "semantic-loader")]
#[command(about = "Load split tabular files into tables described by a semantic schema")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log line format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Args, Clone, Debug)]
struct ConfigOpts {
    /// Working directory that relative paths resolve against
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,
    /// Configuration file (defaults to .semantic-loader.toml in the workspace)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Schema document path
    #[arg(long)]
    schema: Option<String>,
    /// Source directory
    #[arg(long)]
    source: Option<String>,
    /// DuckDB database path, or ":memory:"
    #[arg(long)]
    database: Option<String>,
    /// Fail on unknown types and uncoercible values
    #[arg(long)]
    strict: bool,
}

#[cfg(feature = "cli")]
impl ConfigOpts {
    fn into_args(self) -> ConfigArgs {
        ConfigArgs {
            workspace: self.workspace,
            config: self.config,
            schema: self.schema,
            source: self.source,
            database: self.database,
            strict: self.strict,
            ..Default::default()
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Provision tables, load every source file and verify the result
    Run {
        #[command(flatten)]
        opts: ConfigOpts,
        /// Truncate every table before loading
        #[arg(long)]
        clear_existing: bool,
        /// Provisioning mode (replace, create-if-missing, skip)
        #[arg(long)]
        provision: Option<String>,
        /// Report format (text or json)
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,
        /// Also write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Exit with status 2 when any table is not PERFECT
        #[arg(long)]
        fail_on_issues: bool,
    },
    /// Verify loaded tables against the source files without loading
    Verify {
        #[command(flatten)]
        opts: ConfigOpts,
        /// Report format (text or json)
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,
        /// Also write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Exit with status 2 when any table is not PERFECT
        #[arg(long)]
        fail_on_issues: bool,
    },
    /// Print the CREATE statements for the schema document
    Ddl {
        #[command(flatten)]
        opts: ConfigOpts,
        /// SQL dialect (snowflake or duckdb)
        #[arg(short, long, default_value = "snowflake")]
        dialect: SqlDialect,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Survey source files and show which table each would load into
    Inventory {
        #[command(flatten)]
        opts: ConfigOpts,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Execute a SQL query against the destination database
    Query {
        /// SQL query to execute
        sql: String,
        #[command(flatten)]
        opts: ConfigOpts,
        /// Output format: table, text, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Write a sample configuration file
    Init {
        /// Directory to write .semantic-loader.toml into
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_format) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Run {
            opts,
            clear_existing,
            provision,
            format,
            report,
            fail_on_issues,
        } => {
            let mut config = opts.into_args();
            config.clear_existing = clear_existing;
            config.provision = provision;
            let args = RunArgs {
                config,
                format,
                report,
                fail_on_issues,
            };
            handle_run(&args)
        }
        Commands::Verify {
            opts,
            format,
            report,
            fail_on_issues,
        } => {
            let args = RunArgs {
                config: opts.into_args(),
                format,
                report,
                fail_on_issues,
            };
            handle_verify(&args)
        }
        Commands::Ddl {
            opts,
            dialect,
            output,
        } => {
            let args = DdlArgs {
                config: opts.into_args(),
                dialect,
                output,
            };
            handle_ddl(&args)
        }
        Commands::Inventory { opts, json } => {
            let args = InventoryArgs {
                config: opts.into_args(),
                json,
            };
            handle_inventory(&args)
        }
        Commands::Query { sql, opts, format } => {
            let args = QueryArgs {
                sql,
                config: opts.into_args(),
                format,
            };
            handle_query(&args)
        }
        Commands::Init { workspace, force } => handle_init(&InitArgs { workspace, force }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
