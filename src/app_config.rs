use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Run configuration as stored in `conf.json`.
/// Every section is optional in the file; omitted sections take their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Dataset source and column selection
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Backend selection and text normalization
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Per-backend API settings
    #[serde(default)]
    pub apis: ApisConfig,

    /// Retry and rate limit behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Checkpointing
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Output table settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Quality thresholds for translated text
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation backend identifier
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    #[default]
    Nvidia,
    Fanar,
}

impl BackendId {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Nvidia => "NVIDIA",
            Self::Fanar => "Fanar",
        }
    }

    // @returns: Lowercase backend identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nvidia => "nvidia",
            Self::Fanar => "fanar",
        }
    }

    /// The other backend, used as fallback
    pub fn other(&self) -> Self {
        match self {
            Self::Nvidia => Self::Fanar,
            Self::Fanar => Self::Nvidia,
        }
    }

    pub fn all() -> [BackendId; 2] {
        [Self::Nvidia, Self::Fanar]
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvidia" => Ok(Self::Nvidia),
            "fanar" => Ok(Self::Fanar),
            _ => Err(ConfigError::Invalid(format!("Invalid backend: {}", s))),
        }
    }
}

/// Marker for automatic text column detection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AutoColumns {
    Auto,
}

/// Columns to translate: `"auto"` or an explicit list
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ColumnSelection {
    Auto(AutoColumns),
    Named(Vec<String>),
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self::Auto(AutoColumns::Auto)
    }
}

/// Dataset configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatasetConfig {
    /// Local file path; `kaggle:` and `huggingface:` prefixes are recognized
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub columns_to_translate: ColumnSelection,

    /// Only translate the first N rows
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Translation behavior
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default)]
    pub primary_api: BackendId,

    /// Try the other backend when the primary fails or its output fails validation
    #[serde(default = "default_true")]
    pub enable_fallback: bool,

    /// Replace provider names with generic terms before translating
    #[serde(default = "default_true")]
    pub normalize_provider_terms: bool,

    /// Number of cells translated at the same time
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Extra provider term replacements, merged over the built-in table
    #[serde(default)]
    pub provider_terms: BTreeMap<String, String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            primary_api: BackendId::default(),
            enable_fallback: default_true(),
            normalize_provider_terms: default_true(),
            concurrent_requests: default_concurrent_requests(),
            provider_terms: BTreeMap::new(),
        }
    }
}

impl TranslationConfig {
    /// Backends in the order they are tried
    pub fn backend_chain(&self) -> Vec<BackendId> {
        let mut chain = vec![self.primary_api];
        if self.enable_fallback {
            chain.push(self.primary_api.other());
        }
        chain
    }
}

/// Settings for a single backend API
///
/// Empty strings and missing values fall back to the backend's own defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub top_p: Option<f32>,

    /// Requests per minute; `null` disables throttling for this backend
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            model: String::new(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            rate_limit_rpm: default_rate_limit_rpm(),
        }
    }
}

/// API settings for both backends
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApisConfig {
    #[serde(default)]
    pub nvidia: BackendConfig,

    #[serde(default)]
    pub fanar: BackendConfig,
}

impl ApisConfig {
    pub fn get(&self, id: BackendId) -> &BackendConfig {
        match id {
            BackendId::Nvidia => &self.nvidia,
            BackendId::Fanar => &self.fanar,
        }
    }

    pub fn get_mut(&mut self, id: BackendId) -> &mut BackendConfig {
        match id {
            BackendId::Nvidia => &mut self.nvidia,
            BackendId::Fanar => &mut self.fanar,
        }
    }
}

/// Retry configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before retry n is multiplier^n seconds
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Per-request timeout in seconds, also the backoff ceiling
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(default = "default_true")]
    pub respect_rate_limits: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_multiplier: default_backoff_multiplier(),
            request_timeout: default_request_timeout(),
            respect_rate_limits: default_true(),
        }
    }
}

/// Checkpoint configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Flush after this many completed cells
    #[serde(default = "default_checkpoint_interval")]
    pub interval: usize,

    #[serde(default)]
    pub resume: bool,

    #[serde(default = "default_checkpoint_directory")]
    pub directory: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval: default_checkpoint_interval(),
            resume: false,
            directory: default_checkpoint_directory(),
        }
    }
}

/// Output file format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "parquet" => Ok(Self::Parquet),
            _ => Err(ConfigError::Invalid(format!("Invalid output format: {}", s))),
        }
    }
}

/// Output configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Output file; derived from the dataset name when absent
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub format: OutputFormat,

    /// Original columns to carry over; all of them when absent
    #[serde(default)]
    pub keep_columns: Option<Vec<String>>,

    #[serde(default = "default_true")]
    pub save_statistics: bool,

    /// Add a `{column}_status` column per translated column
    #[serde(default)]
    pub include_status_columns: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: OutputFormat::default(),
            keep_columns: None,
            save_statistics: default_true(),
            include_status_columns: false,
        }
    }
}

/// Thresholds used to accept a translation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Minimum share of Arabic letters among non-whitespace characters
    #[serde(default = "default_min_arabic_ratio")]
    pub min_arabic_ratio: f64,

    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,

    #[serde(default = "default_max_length_ratio")]
    pub max_length_ratio: f64,

    /// Sources shorter than this skip the length ratio check
    #[serde(default)]
    pub min_source_chars_for_ratio: usize,

    #[serde(default = "default_min_translation_chars")]
    pub min_translation_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_arabic_ratio: default_min_arabic_ratio(),
            min_length_ratio: default_min_length_ratio(),
            max_length_ratio: default_max_length_ratio(),
            min_source_chars_for_ratio: 0,
            min_translation_chars: default_min_translation_chars(),
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrent_requests() -> usize {
    1
}

fn default_rate_limit_rpm() -> Option<u32> {
    // Both services allow 40 requests per minute on the free tier
    Some(40)
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_request_timeout() -> u64 {
    30
}

fn default_checkpoint_interval() -> usize {
    50
}

fn default_checkpoint_directory() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_min_arabic_ratio() -> f64 {
    0.5
}

fn default_min_length_ratio() -> f64 {
    0.3
}

fn default_max_length_ratio() -> f64 {
    3.0
}

fn default_min_translation_chars() -> usize {
    1
}

/// Environment variables holding (api key, endpoint) per backend
fn env_names(id: BackendId) -> (&'static str, &'static str) {
    match id {
        BackendId::Nvidia => ("NVIDIA_API_KEY", "NVIDIA_BASE_URL"),
        BackendId::Fanar => ("FANAR_API_KEY", "FANAR_API_URL"),
    }
}

impl Config {
    /// Load the configuration file, writing a default one when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool), ConfigError> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(io_error)?;
            let config: Config = serde_json::from_str(&content)?;
            return Ok((config, false));
        }

        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json).map_err(io_error)?;
        Ok((config, true))
    }

    /// Fill API keys and endpoints from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Fill empty API keys and endpoints from `lookup`
    ///
    /// Values already present in the config file win over the environment.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for id in BackendId::all() {
            let (key_var, url_var) = env_names(id);
            let api = self.apis.get_mut(id);
            if api.api_key.is_empty() {
                if let Some(key) = lookup(key_var).filter(|v| !v.trim().is_empty()) {
                    api.api_key = key.trim().to_string();
                }
            }
            if api.endpoint.is_empty() {
                if let Some(url) = lookup(url_var).filter(|v| !v.trim().is_empty()) {
                    api.endpoint = url.trim().to_string();
                }
            }
        }
    }

    /// Name of the environment variable that supplies a backend's API key
    pub fn api_key_env_var(id: BackendId) -> &'static str {
        env_names(id).0
    }

    /// Validate the configuration for consistency and required values
    ///
    /// API keys are checked later, when the backends are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.source.trim().is_empty() {
            return Err(ConfigError::Invalid("dataset.source is required".to_string()));
        }

        if let ColumnSelection::Named(columns) = &self.dataset.columns_to_translate {
            if columns.is_empty() {
                return Err(ConfigError::Invalid(
                    "dataset.columns_to_translate must name at least one column or be \"auto\"".to_string(),
                ));
            }
            let mut seen = std::collections::HashSet::new();
            if let Some(duplicate) = columns.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "dataset.columns_to_translate lists \"{}\" more than once",
                    duplicate
                )));
            }
        }

        if self.translation.concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "translation.concurrent_requests must be at least 1".to_string(),
            ));
        }

        if self.checkpoint.interval == 0 {
            return Err(ConfigError::Invalid("checkpoint.interval must be at least 1".to_string()));
        }

        for id in self.translation.backend_chain() {
            let api = self.apis.get(id);
            if api.rate_limit_rpm == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "apis.{}.rate_limit_rpm must be positive",
                    id
                )));
            }
            if !api.endpoint.is_empty() {
                url::Url::parse(&api.endpoint).map_err(|e| {
                    ConfigError::Invalid(format!("apis.{}.endpoint is not a valid URL: {}", id, e))
                })?;
            }
        }

        if !(self.retry.backoff_multiplier > 0.0) {
            return Err(ConfigError::Invalid("retry.backoff_multiplier must be positive".to_string()));
        }

        if self.retry.request_timeout == 0 {
            return Err(ConfigError::Invalid("retry.request_timeout must be at least 1 second".to_string()));
        }

        let v = &self.validation;
        if !(0.0..=1.0).contains(&v.min_arabic_ratio) {
            return Err(ConfigError::Invalid(
                "validation.min_arabic_ratio must be between 0 and 1".to_string(),
            ));
        }
        if !(v.min_length_ratio > 0.0) || !(v.max_length_ratio >= v.min_length_ratio) {
            return Err(ConfigError::Invalid(format!(
                "validation length ratio bounds are inconsistent: [{}, {}]",
                v.min_length_ratio, v.max_length_ratio
            )));
        }

        // Term replacements must not reintroduce a term they replace
        crate::translation::Preprocessor::new(
            self.translation.normalize_provider_terms,
            &self.translation.provider_terms,
        )?;

        Ok(())
    }
}
