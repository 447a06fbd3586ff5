mod clean;
pub(crate) mod fetch;
mod glob_util;
pub(crate) mod import;
mod migrate;
mod prefs;
pub(crate) mod rates;
pub(crate) mod split;
mod transform;
pub(crate) mod validate;

use crate::config::Config;
use crate::rates::DayType;
use crate::transform::TransformMode;
use chrono::NaiveDate;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pcrm-import")]
#[command(version)]
#[command(about = "Import legacy PostgreSQL dumps into PCRM and preview booking rates", long_about = None)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ./pcrm-import.yaml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Strip psql metadata, comments and row counts from a dump
    Clean {
        /// Input SQL file (supports .gz, .bz2, .xz, .zst compression)
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a dump into statements and print them
    Split {
        /// Input SQL file (supports .gz, .bz2, .xz, .zst compression)
        file: PathBuf,

        /// Keep only executable statements (CREATE, INSERT, UPDATE, DELETE, ALTER, DROP, COPY)
        #[arg(long)]
        strict: bool,

        /// Close unterminated quotes at end of input instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename created and referenced objects with a suffix
    Transform {
        /// Input SQL file (supports .gz, .bz2, .xz, .zst compression)
        file: PathBuf,

        /// Identifier suffix (default: from config, or _PCRM)
        #[arg(long)]
        suffix: Option<String>,

        /// Rewrite mode: full, simple or none
        #[arg(long)]
        mode: Option<TransformMode>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check dump files before importing them
    Validate {
        /// Input SQL files or glob patterns (e.g., dumps/*.sql)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Stop on first file that fails
        #[arg(long)]
        fail_fast: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and transform dumps without executing anything
    TestParse {
        /// Schema dump file
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Data dump file
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import schema and/or data dumps through the SQL execution endpoint
    Import {
        /// Schema dump file
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Data dump file (imported after the schema when both are given)
        #[arg(long)]
        data: Option<PathBuf>,

        /// SQL execution endpoint URL (default: endpoint.url from config)
        #[arg(long)]
        url: Option<String>,

        /// Statements per remote call (1 = one call per statement)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between remote calls in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Import into this schema and tolerate already-exists errors
        #[arg(long)]
        isolated_schema: Option<String>,

        /// Identifier suffix
        #[arg(long)]
        suffix: Option<String>,

        /// Rewrite mode: full, simple or none
        #[arg(long)]
        mode: Option<TransformMode>,

        /// Close unterminated quotes at end of input instead of failing
        #[arg(long)]
        lenient: bool,

        /// Parse only; do not execute (same as test-parse)
        #[arg(long)]
        dry_run: bool,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch dump files from a GitHub repository
    Fetch {
        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Branch
        #[arg(long, default_value = "main")]
        branch: String,

        /// File or folder path inside the repository
        #[arg(long, default_value = "")]
        path: String,

        /// List the folder at --path (or branches if --path is empty) instead of downloading
        #[arg(long)]
        list: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call the legacy migration service
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Resolve booking rates from a rate table
    Rates {
        #[command(subcommand)]
        action: RatesAction,
    },

    /// Read and write saved preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Print JSON Schemas for --json output
    Schema {
        /// Only this command's schema
        #[arg(long)]
        command: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Check that the service can reach the legacy database
    Test {
        /// Legacy database connection string
        #[arg(long)]
        connection: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a full migration
    Run {
        /// Legacy database connection string
        #[arg(long)]
        connection: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync rows changed since a point in time
    Sync {
        /// Legacy database connection string
        #[arg(long)]
        connection: String,

        /// Only rows changed after this timestamp
        #[arg(long)]
        since: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RatesAction {
    /// Per-day rate breakdown for a date range
    Preview {
        /// Rate table (JSON or YAML list)
        #[arg(long)]
        rates: PathBuf,

        #[arg(long)]
        driver_class: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Night shift
        #[arg(long)]
        night: bool,

        /// No weekday fallback for missing weekend rates
        #[arg(long)]
        strict: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Single customer rate for one booking
    Booking {
        /// Rate table (JSON or YAML list)
        #[arg(long)]
        rates: PathBuf,

        #[arg(long)]
        customer: String,

        #[arg(long)]
        driver_class: String,

        /// weekday, saturday or sunday
        #[arg(long, default_value = "weekday")]
        day_type: DayType,

        /// Night shift
        #[arg(long)]
        night: bool,

        /// Booking date, for rate validity windows
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print a stored value
    Get {
        key: String,

        /// Preferences file (default: user config directory)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Store a value (parsed as JSON, or kept as a string)
    Set {
        key: String,
        value: String,

        /// Preferences file (default: user config directory)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show or change column visibility for a table view
    Columns {
        table: String,

        /// Columns to hide (comma-separated)
        #[arg(long)]
        hide: Option<String>,

        /// Columns to show (comma-separated)
        #[arg(long)]
        show: Option<String>,

        /// Preferences file (default: user config directory)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean { file, output } => clean::run(file, output),
        Commands::Split {
            file,
            strict,
            lenient,
            json,
        } => split::run(file, strict, lenient, json),
        Commands::Transform {
            file,
            suffix,
            mode,
            output,
        } => transform::run(&config, file, suffix, mode, output),
        Commands::Validate {
            files,
            fail_fast,
            json,
        } => validate::run(files, fail_fast, json),
        Commands::TestParse { schema, data, json } => import::run_test_parse(&config, schema, data, json),
        Commands::Import {
            schema,
            data,
            url,
            batch_size,
            delay_ms,
            isolated_schema,
            suffix,
            mode,
            lenient,
            dry_run,
            progress,
            json,
        } => {
            let mut import_config = config.import.clone();
            if let Some(n) = batch_size {
                import_config.batch_size = n;
            }
            if let Some(ms) = delay_ms {
                import_config.delay_ms = ms;
            }
            if isolated_schema.is_some() {
                import_config.isolated_schema = isolated_schema;
            }
            if let Some(suffix) = suffix {
                import_config.suffix = suffix;
            }
            if let Some(mode) = mode {
                import_config.transform = mode;
            }
            import_config.lenient_quotes |= lenient;

            let mut effective = config.clone();
            effective.import = import_config;
            if url.is_some() {
                effective.endpoint.url = url;
            }

            if dry_run {
                import::run_test_parse(&effective, schema, data, json)
            } else {
                import::run_import(&effective, schema, data, progress, json)
            }
        }
        Commands::Fetch {
            owner,
            repo,
            branch,
            path,
            list,
            output,
            json,
        } => fetch::run(&config, owner, repo, branch, path, list, output, json),
        Commands::Migrate { action } => migrate::run(&config, action),
        Commands::Rates { action } => rates::run(action),
        Commands::Prefs { action } => prefs::run(action),
        Commands::Schema { command } => print_schemas(command),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "pcrm-import", &mut io::stdout());
            Ok(())
        }
    }
}

fn print_schemas(command: Option<String>) -> anyhow::Result<()> {
    match command {
        Some(name) => {
            let schema = crate::json_schema::get_schema(&name).ok_or_else(|| {
                anyhow::anyhow!(
                    "no JSON schema for '{}'. Available: {}",
                    name,
                    crate::json_schema::schema_names().join(", ")
                )
            })?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&crate::json_schema::all_schemas())?);
        }
    }
    Ok(())
}

/// Write to `output`, or stdout when none is given.
fn write_output(output: Option<PathBuf>, text: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::io::Write;

    match output {
        Some(path) => {
            std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", text.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}
