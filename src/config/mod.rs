//! Configuration management.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (including any loaded from `.env` by the binary).

use crate::observability::LogFormat;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default completion endpoint (OpenAI-compatible).
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast:free";

/// Default number of memories retrieved per turn.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 10;

/// Main configuration for anima.
#[derive(Debug, Clone)]
pub struct AnimaConfig {
    /// Directory holding the profile document and the memory index.
    pub data_dir: PathBuf,
    /// Memories retrieved per chat turn.
    pub retrieval_limit: usize,
    /// Embedding vector size for the local embedder.
    pub embedding_dimensions: usize,
    /// Entries kept in the embedding cache.
    pub embedding_cache_size: usize,
    /// Completion service settings.
    pub llm: LlmConfig,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Completion service configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base URL.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl LlmConfig {
    /// Returns true when a usable API key is configured.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| crate::llm::is_usable_api_key(key.expose_secret()))
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Retrieval limit.
    pub retrieval_limit: Option<usize>,
    /// Embedding dimensions.
    pub embedding_dimensions: Option<usize>,
    /// Embedding cache size.
    pub embedding_cache_size: Option<usize>,
    /// LLM configuration.
    pub llm: Option<ConfigFileLlm>,
    /// Logging configuration.
    pub logging: Option<ConfigFileLogging>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLlm {
    /// Base URL.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// "pretty" or "json".
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for AnimaConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            embedding_dimensions: crate::embedding::DEFAULT_DIMENSIONS,
            embedding_cache_size: 256,
            llm: LlmConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AnimaConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::storage("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config document.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::storage("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Looks for `anima/config.toml` in the platform config dir. Returns the
    /// default configuration if no file is found or it fails to load.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            },
        }
    }

    /// The platform-specific default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("anima").join("config.toml"))
    }

    /// Converts a `ConfigFile` to `AnimaConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(limit) = file.retrieval_limit {
            config.retrieval_limit = limit;
        }
        if let Some(dims) = file.embedding_dimensions {
            if dims == 0 {
                return Err(crate::Error::InvalidInput(
                    "embedding_dimensions must be positive".to_string(),
                ));
            }
            config.embedding_dimensions = dims;
        }
        if let Some(size) = file.embedding_cache_size {
            config.embedding_cache_size = size;
        }
        if let Some(llm) = file.llm {
            if let Some(base_url) = llm.base_url {
                config.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(key) = llm.api_key {
                config.llm.api_key = Some(SecretString::from(key));
            }
            if let Some(timeout) = llm.timeout_ms {
                config.llm.timeout_ms = timeout;
            }
            if let Some(timeout) = llm.connect_timeout_ms {
                config.llm.connect_timeout_ms = timeout;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format.parse()?;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or enum variable cannot be parsed.
    pub fn with_env_overrides(self) -> crate::Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or enum variable cannot be parsed.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("ANIMA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("ANIMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = get("ANIMA_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(limit) = get("ANIMA_RETRIEVAL_LIMIT") {
            self.retrieval_limit = parse_number("ANIMA_RETRIEVAL_LIMIT", &limit)?;
        }
        if let Some(timeout) = get("ANIMA_LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = parse_number("ANIMA_LLM_TIMEOUT_MS", &timeout)?;
        }
        if let Some(format) = get("ANIMA_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(file) = get("ANIMA_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.llm.api_key = Some(SecretString::from(key));
        }

        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the profile document.
    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }

    /// Directory holding the memory index.
    #[must_use]
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> crate::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::InvalidInput(format!("{key} must be a number, got '{value}'")))
}
