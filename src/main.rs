// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{LevelFilter, Level, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use dataset_translator::app_config::{BackendId, ColumnSelection, LogLevel, OutputFormat};
use dataset_translator::{Config, Controller, RunStatus};

/// CLI wrapper for BackendId to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    Nvidia,
    Fanar,
}

impl From<CliBackend> for BackendId {
    fn from(cli_backend: CliBackend) -> Self {
        match cli_backend {
            CliBackend::Nvidia => BackendId::Nvidia,
            CliBackend::Fanar => BackendId::Fanar,
        }
    }
}

/// CLI wrapper for OutputFormat to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Csv,
    Json,
    Parquet,
}

impl From<CliFormat> for OutputFormat {
    fn from(cli_format: CliFormat) -> Self {
        match cli_format {
            CliFormat::Csv => OutputFormat::Csv,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Parquet => OutputFormat::Parquet,
        }
    }
}

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a dataset (default command)
    Translate(TranslateArgs),

    /// Send a test translation to every configured backend
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: PathBuf,

    /// Dataset file to translate
    #[arg(short, long, alias = "input")]
    dataset: Option<String>,

    /// Comma-separated columns to translate, or "auto"
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Primary translation backend
    #[arg(long, value_enum)]
    api: Option<CliBackend>,

    /// Enable or disable falling back to the other backend
    #[arg(long)]
    fallback: Option<bool>,

    /// Do not replace provider terms before translating
    #[arg(long)]
    no_normalize: bool,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<CliFormat>,

    /// Translate only the first N rows
    #[arg(short, long)]
    limit: Option<usize>,

    /// Keep results in memory only
    #[arg(long, conflicts_with = "resume")]
    no_checkpoint: bool,

    /// Continue from the checkpoint in the checkpoint directory
    #[arg(long)]
    resume: bool,

    /// Checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Comma-separated source columns to copy into the output
    #[arg(long, value_delimiter = ',')]
    keep_columns: Option<Vec<String>>,

    /// Set logging level
    #[arg(long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// dataset-translator - English to Arabic dataset translation
///
/// Translates the text columns of a CSV, JSON or Parquet dataset with the
/// NVIDIA or Fanar chat-completion APIs, checkpointing as it goes.
#[derive(Parser, Debug)]
#[command(name = "dataset-translator")]
#[command(version)]
#[command(about = "Translate tabular datasets from English to Arabic")]
#[command(long_about = "Translates the text columns of a dataset from English to Arabic.

EXAMPLES:
    dataset-translator --dataset prompts.csv                  # Translate using conf.json
    dataset-translator --dataset prompts.csv --columns prompt # Translate one column
    dataset-translator --dataset prompts.csv --api fanar      # Use Fanar as primary
    dataset-translator --dataset prompts.csv --resume         # Continue an interrupted run
    dataset-translator check                                  # Test API connections
    dataset-translator completions bash > dt.bash             # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file does not
    exist, a default one is created. API keys may also be supplied with the
    NVIDIA_API_KEY and FANAR_API_KEY environment variables.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // The global max level is raised or lowered after the config loads
        metadata.level() <= self.level.max(log::max_level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Info until the config is loaded
    if CustomLogger::init(LevelFilter::Info).is_err() {
        eprintln!("Failed to initialize logger");
    }

    let cli = CommandLineOptions::parse();
    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dataset-translator", &mut std::io::stdout());
            Ok(true)
        }
        Some(Commands::Check { config }) => run_check(config).await,
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.translate).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load the config file (creating a default one) and fill keys from the environment
fn load_config(path: &Path) -> Result<Config> {
    let (mut config, created) = Config::load_or_create(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    if created {
        warn!("Config file not found at '{}', created a default one.", path.display());
    }
    config.apply_env_overrides();
    Ok(config)
}

fn apply_log_level(level: LogLevel) {
    log::set_max_level(level.to_level_filter());
}

// @applies: Command-line overrides on top of the config file
fn apply_cli_overrides(config: &mut Config, args: &TranslateArgs) {
    if let Some(dataset) = &args.dataset {
        config.dataset.source = dataset.clone();
    }
    if let Some(columns) = &args.columns {
        if !(columns.len() == 1 && columns[0].eq_ignore_ascii_case("auto")) {
            config.dataset.columns_to_translate = ColumnSelection::Named(
                columns.iter().map(|c| c.trim().to_string()).collect(),
            );
        }
    }
    if let Some(limit) = args.limit {
        config.dataset.limit = Some(limit);
    }
    if let Some(api) = args.api {
        config.translation.primary_api = api.into();
    }
    if let Some(fallback) = args.fallback {
        config.translation.enable_fallback = fallback;
    }
    if args.no_normalize {
        config.translation.normalize_provider_terms = false;
    }
    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(keep) = &args.keep_columns {
        config.output.keep_columns = Some(keep.iter().map(|c| c.trim().to_string()).collect());
    }
    if args.no_checkpoint {
        config.checkpoint.enabled = false;
    }
    if args.resume {
        config.checkpoint.enabled = true;
        config.checkpoint.resume = true;
    }
    if let Some(dir) = &args.checkpoint_dir {
        config.checkpoint.directory = dir.clone();
    }
    if let Some(level) = args.log_level {
        config.log_level = level.into();
    }
}

/// Returns whether the run completed
async fn run_translate(args: TranslateArgs) -> Result<bool> {
    let mut config = load_config(&args.config)?;
    apply_cli_overrides(&mut config, &args);
    apply_log_level(config.log_level);

    if config.dataset.source.trim().is_empty() {
        return Err(anyhow!(
            "No dataset given; pass --dataset or set dataset.source in {}",
            args.config.display()
        ));
    }

    let controller = Controller::with_config(config)?;
    let report = controller.run().await?;

    match &report.status {
        RunStatus::Completed { cell_failures } => {
            if *cell_failures > 0 {
                warn!("{} cells could not be translated", cell_failures);
            }
            Ok(true)
        }
        RunStatus::Interrupted { .. } => {
            warn!("{}; rerun with --resume to continue", report.status);
            Ok(false)
        }
        RunStatus::Aborted { .. } => {
            error!("{}", report.status);
            Ok(false)
        }
    }
}

/// Returns whether every backend answered
async fn run_check(config_path: PathBuf) -> Result<bool> {
    let mut config = load_config(&config_path)?;
    apply_log_level(config.log_level);

    if config.dataset.source.trim().is_empty() {
        // Connection checks do not need a dataset
        config.dataset.source = "-".to_string();
    }

    let controller = Controller::with_config(config)?;
    let results = controller.check_connections().await?;
    let all_ok = results.iter().all(|(_, outcome)| outcome.is_ok());
    if all_ok {
        info!("All {} backends reachable", results.len());
    }
    Ok(all_ok)
}
