//! Bootstrap configuration loading
//!
//! Configuration is resolved in priority order:
//! 1. Command-line argument (`--config <path>`)
//! 2. Environment variable (`EMOFUSE_CONFIG`)
//! 3. Platform config file (`<config_dir>/emofuse/config.toml`)
//! 4. Compiled defaults
//!
//! A missing or unreadable TOML file never aborts startup: a warning is logged
//! and the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EMOFUSE_CONFIG";

/// Environment variable holding the LLM API key
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Default HTTP port for the service
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Parent directory for per-request scratch directories
    /// (system temp directory if not specified)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub fusion: FusionSection,

    #[serde(default)]
    pub acquisition: AcquisitionSection,

    #[serde(default)]
    pub text_analyzer: TextAnalyzerSection,

    /// Facial-expression classifier service
    #[serde(default)]
    pub video_classifier: Option<ClassifierSection>,

    /// Acoustic classifier service
    #[serde(default)]
    pub audio_classifier: Option<ClassifierSection>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            temp_dir: None,
            logging: LoggingConfig::default(),
            fusion: FusionSection::default(),
            acquisition: AcquisitionSection::default(),
            text_analyzer: TextAnalyzerSection::default(),
            video_classifier: None,
            audio_classifier: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Fusion weighting and normalization policy
///
/// Raw values only; the service validates them into its weight type at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSection {
    #[serde(default = "default_text_weight")]
    pub text: f64,
    #[serde(default = "default_video_weight")]
    pub video: f64,
    #[serde(default = "default_audio_weight")]
    pub audio: f64,

    /// How a single-label output's unreported mass is spread: "uniform" or "prior"
    #[serde(default = "default_remainder")]
    pub remainder: String,

    /// Prior over emotions, used when `remainder = "prior"`
    #[serde(default)]
    pub prior: Option<std::collections::BTreeMap<String, f64>>,
}

impl Default for FusionSection {
    fn default() -> Self {
        Self {
            text: default_text_weight(),
            video: default_video_weight(),
            audio: default_audio_weight(),
            remainder: default_remainder(),
            prior: None,
        }
    }
}

/// Shared input acquisition (download + decode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSection {
    /// Path or name of the yt-dlp executable
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: String,

    /// Upper bound for each yt-dlp invocation
    #[serde(default = "default_acquisition_timeout")]
    pub timeout_seconds: u64,

    /// Maximum video height to download
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            yt_dlp_path: default_yt_dlp_path(),
            timeout_seconds: default_acquisition_timeout(),
            max_height: default_max_height(),
        }
    }
}

/// LLM-backed text sentiment analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalyzerSection {
    /// API key (the environment variable takes priority)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_text_model")]
    pub model: String,

    #[serde(default = "default_text_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_analyzer_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TextAnalyzerSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_text_model(),
            endpoint: default_text_endpoint(),
            timeout_seconds: default_analyzer_timeout(),
        }
    }
}

/// HTTP classifier service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    /// Full URL accepting `POST {"path": "..."}`
    pub endpoint: String,

    #[serde(default = "default_analyzer_timeout")]
    pub timeout_seconds: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_text_weight() -> f64 {
    0.30
}

fn default_video_weight() -> f64 {
    0.40
}

fn default_audio_weight() -> f64 {
    0.30
}

fn default_remainder() -> String {
    "uniform".to_string()
}

fn default_yt_dlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_acquisition_timeout() -> u64 {
    300
}

fn default_max_height() -> u32 {
    720
}

fn default_text_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_text_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_analyzer_timeout() -> u64 {
    120
}

/// Resolve which config file to load, if any
///
/// Returns `None` when no candidate exists; callers then use compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/emofuse/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("emofuse").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    /// No config file found
    Defaults,
    /// Loaded from this file
    File(PathBuf),
    /// File existed but could not be used
    Fallback { path: PathBuf, reason: String },
}

impl ConfigOrigin {
    /// Log the outcome; called once tracing is initialized
    pub fn log(&self) {
        match self {
            ConfigOrigin::Defaults => info!("No config file found, using compiled defaults"),
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Fallback { reason, .. } => {
                warn!("{} - using compiled defaults", reason)
            }
        }
    }
}

/// Load configuration with graceful degradation
///
/// Any failure to locate, read or parse the file yields compiled defaults.
/// Logging is left to the caller (see [`ConfigOrigin::log`]) because the
/// log level itself comes from this file.
pub fn load_or_default(cli_arg: Option<&Path>) -> (TomlConfig, ConfigOrigin) {
    let Some(path) = resolve_config_path(cli_arg) else {
        return (TomlConfig::default(), ConfigOrigin::Defaults);
    };

    match load_toml_config(&path) {
        Ok(config) => (config, ConfigOrigin::File(path)),
        Err(e) => (
            TomlConfig::default(),
            ConfigOrigin::Fallback {
                path,
                reason: e.to_string(),
            },
        ),
    }
}

/// Resolve the LLM API key
///
/// **Priority:** ENV → TOML. Warns when both are set.
pub fn resolve_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .text_analyzer
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Text analyzer API key found in both environment and TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Text analyzer API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("Text analyzer API key loaded from TOML config");
        return Some(key);
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
