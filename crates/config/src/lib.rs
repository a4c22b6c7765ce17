//! Configuration loading, validation, and management for refchat.
//!
//! Loads configuration from `./refchat.toml` (or an explicit `--config`
//! path) after reading `.env`, then applies environment variable overrides.
//! Validates all settings at startup.

use refchat_core::DataFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "refchat.toml";

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// The root configuration structure.
///
/// Maps directly to `refchat.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key; falls back to `GEMINI_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for both chat and token counting
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens per model answer (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where the instruction document, tables and greetings live
    #[serde(default)]
    pub data: DataConfig,

    /// Ordered edits applied to the instruction document
    #[serde(default)]
    pub enrichments: Vec<EnrichmentConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Directory relative paths resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("provider", &self.provider)
            .field("data", &self.data)
            .field("enrichments", &self.enrichments)
            .field("logging", &self.logging)
            .field("report", &self.report)
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Override the Gemini endpoint (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Base instruction document (markdown)
    #[serde(default = "default_instructions")]
    pub instructions: PathBuf,

    /// Directory scanned for tables
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,

    /// File extension (without dot) that marks a table file
    #[serde(default = "default_table_extension")]
    pub table_extension: String,

    /// JSON array of greeting strings
    #[serde(default = "default_welcome_messages")]
    pub welcome_messages: PathBuf,

    /// Where the assembled prompt is written for inspection
    #[serde(default = "default_prompt_dump")]
    pub prompt_dump: PathBuf,

    #[serde(default)]
    pub format: DataFormat,

    /// Text between the instructions and the data; format default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_header: Option<String>,
}

fn default_instructions() -> PathBuf {
    PathBuf::from("config_data/instructions.md")
}
fn default_tables_dir() -> PathBuf {
    PathBuf::from("config_data/settings_tables")
}
fn default_table_extension() -> String {
    "csv".into()
}
fn default_welcome_messages() -> PathBuf {
    PathBuf::from("config_data/welcome_messages.json")
}
fn default_prompt_dump() -> PathBuf {
    PathBuf::from("final_prompt.md")
}

impl DataConfig {
    /// The header placed between the enriched instructions and the data.
    pub fn reference_header(&self) -> &str {
        match (&self.reference_header, self.format) {
            (Some(header), _) => header,
            (None, DataFormat::Json) => "\n\n---\n# Reference Data (JSON Format)\n\n",
            (None, DataFormat::Markdown) => "\n\n---\n# Reference Data from Configuration Tables",
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
            tables_dir: default_tables_dir(),
            table_extension: default_table_extension(),
            welcome_messages: default_welcome_messages(),
            prompt_dump: default_prompt_dump(),
            format: DataFormat::default(),
            reference_header: None,
        }
    }
}

/// One edit applied to the instruction document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrichmentConfig {
    /// Replace everything from `start` up to (not including) `end` with `text`
    ReplaceSection {
        start: String,
        end: String,
        text: String,
    },
    /// Insert `text` right after `marker`
    InsertAfter {
        marker: String,
        #[serde(default)]
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON activity log (daily rolling)
    #[serde(default = "default_detailed_file")]
    pub detailed_file: String,

    /// One line per chat request (daily rolling)
    #[serde(default = "default_requests_file")]
    pub requests_file: String,

    /// Also log to stderr
    #[serde(default = "default_true")]
    pub console: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_detailed_file() -> String {
    "detailed_activity.log".into()
}
fn default_requests_file() -> String {
    "requests.log".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
            detailed_file: default_detailed_file(),
            requests_file: default_requests_file(),
            console: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Question measured by `refchat tokens` when none is given
    #[serde(default = "default_sample_question")]
    pub sample_question: String,
}

fn default_sample_question() -> String {
    "Which tables define how a KPI is calculated?".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sample_question: default_sample_question(),
        }
    }
}

impl AppConfig {
    /// Load configuration for this run.
    ///
    /// Reads `.env` first, then `path` (or `./refchat.toml`), then applies
    /// environment variable overrides:
    /// - `GEMINI_API_KEY` (only when `api_key` is not set in the file)
    /// - `REFCHAT_MODEL`
    /// - `REFCHAT_API_URL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("No .env loaded: {e}");
        }

        let mut config = match path {
            Some(explicit) if !explicit.exists() => {
                return Err(ConfigError::ReadError {
                    path: explicit.to_path_buf(),
                    reason: "file does not exist".into(),
                });
            }
            Some(explicit) => Self::load_from(explicit)?,
            None => Self::load_from(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults, resolved against the working
    /// directory.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_empty(API_KEY_ENV);
        }
        if let Some(model) = non_empty("REFCHAT_MODEL") {
            self.model = model;
        }
        if let Some(url) = non_empty("REFCHAT_API_URL") {
            self.provider.api_url = Some(url);
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.request_timeout_secs must be > 0".into(),
            ));
        }

        if self.data.table_extension.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "data.table_extension must not be empty".into(),
            ));
        }

        for (idx, enrichment) in self.enrichments.iter().enumerate() {
            match enrichment {
                EnrichmentConfig::ReplaceSection { start, end, .. } => {
                    if start.is_empty() || end.is_empty() {
                        return Err(ConfigError::ValidationError(format!(
                            "enrichments[{idx}]: replace_section markers must not be empty"
                        )));
                    }
                    if start == end {
                        return Err(ConfigError::ValidationError(format!(
                            "enrichments[{idx}]: replace_section start and end markers must differ"
                        )));
                    }
                }
                EnrichmentConfig::InsertAfter { marker, .. } => {
                    if marker.is_empty() {
                        return Err(ConfigError::ValidationError(format!(
                            "enrichments[{idx}]: insert_after marker must not be empty"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// The API key, or an error naming where to put one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn instructions_path(&self) -> PathBuf {
        self.resolve(&self.data.instructions)
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.resolve(&self.data.tables_dir)
    }

    pub fn welcome_messages_path(&self) -> PathBuf {
        self.resolve(&self.data.welcome_messages)
    }

    pub fn prompt_dump_path(&self) -> PathBuf {
        self.resolve(&self.data.prompt_dump)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.dir)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: None,
            max_output_tokens: None,
            provider: ProviderConfig::default(),
            data: DataConfig::default(),
            enrichments: vec![],
            logging: LoggingConfig::default(),
            report: ReportConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("{API_KEY_ENV} not found in .env file, environment variables or config file")]
    MissingApiKey,
}

impl From<ConfigError> for refchat_core::Error {
    fn from(err: ConfigError) -> Self {
        refchat_core::Error::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.data.format, DataFormat::Json);
        assert_eq!(config.provider.request_timeout_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig {
            enrichments: vec![EnrichmentConfig::InsertAfter {
                marker: "## Rules".into(),
                text: "\n\nextra".into(),
            }],
            ..AppConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.enrichments, config.enrichments);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: Some(5.0),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn identical_replace_markers_rejected() {
        let config = AppConfig {
            enrichments: vec![EnrichmentConfig::ReplaceSection {
                start: "## A".into(),
                end: "## A".into(),
                text: String::new(),
            }],
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/refchat.toml")).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.base_dir(), Path::new("."));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/refchat.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn enrichment_parsing() {
        let toml_str = r###"
model = "gemini-2.5-flash"

[data]
format = "markdown"

[[enrichments]]
type = "replace_section"
start = "## Knowledge Base"
end = "## Rules"
text = "## Knowledge Base (JSON)\n"

[[enrichments]]
type = "insert_after"
marker = "## Rules"
text = "\n\n8. Look for indirect links."
"###;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.data.format, DataFormat::Markdown);
        assert_eq!(config.enrichments.len(), 2);
        assert!(matches!(
            &config.enrichments[0],
            EnrichmentConfig::ReplaceSection { end, .. } if end == "## Rules"
        ));
        assert!(matches!(
            &config.enrichments[1],
            EnrichmentConfig::InsertAfter { marker, .. } if marker == "## Rules"
        ));
    }

    #[test]
    fn paths_resolve_against_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refchat.toml");
        std::fs::write(&path, "[data]\ntables_dir = \"tables\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.tables_dir(), dir.path().join("tables"));
        assert_eq!(
            config.instructions_path(),
            dir.path().join("config_data/instructions.md")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refchat.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "key-123"),
            ("REFCHAT_MODEL", "gemini-2.5-flash"),
            ("REFCHAT_API_URL", "http://localhost:9999"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.require_api_key().unwrap(), "key-123");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.provider.api_url.as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|_| Some("from-env".into()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let mut config = AppConfig::default();
        config.apply_env(|_| None);
        assert!(!config.has_api_key());
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn reference_header_follows_format() {
        let mut data = DataConfig::default();
        assert!(data.reference_header().contains("JSON Format"));
        data.format = DataFormat::Markdown;
        assert!(data.reference_header().contains("Configuration Tables"));
        data.reference_header = Some("\n# Data\n".into());
        assert_eq!(data.reference_header(), "\n# Data\n");
    }
}
