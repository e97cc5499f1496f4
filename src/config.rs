use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub build: BuildConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

/// Background analysis behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Quiet time after the last edit before analysis is dispatched.
    /// Every edit restarts the window.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on analyses running at once across all open files.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Extensions that get a synthesized compile context when the project
    /// index has no entry for the file.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_max_workers() -> usize {
    2
}

fn default_source_extensions() -> Vec<String> {
    ["c", "h", "cc", "cpp", "cxx", "hpp", "hh", "m", "mm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_workers: default_max_workers(),
            source_extensions: default_source_extensions(),
        }
    }
}

impl AnalysisConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.source_extensions.iter().any(|e| e == ext))
    }
}

/// Build daemon and build subprocess configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Command that starts the build daemon. `None` disables daemon
    /// queries; target lookups then report the daemon as unavailable.
    #[serde(default)]
    pub daemon_command: Option<String>,

    #[serde(default)]
    pub daemon_args: Vec<String>,

    /// Argv for running a build. A literal `{target}` element is replaced
    /// with the default build target. Empty disables builds.
    #[serde(default)]
    pub build_command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            daemon_command: None,
            daemon_args: Vec::new(),
            build_command: Vec::new(),
        }
    }
}

impl Config {
    pub const FILENAME: &'static str = "config.json";

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Load from the given path, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory paths for configuration and persistent state.
///
/// Only `main` constructs this from the system directories; everything else
/// receives it by parameter so tests can point it at temp directories.
#[derive(Debug, Clone)]
pub struct Directories {
    /// e.g. ~/.config/limn on Linux
    pub config_dir: PathBuf,

    /// e.g. ~/.local/share/limn on Linux
    pub data_dir: PathBuf,
}

impl Directories {
    pub fn from_system() -> std::io::Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine config directory",
                )
            })?
            .join("limn");

        let data_dir = dirs::data_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine data directory",
                )
            })?
            .join("limn");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn for_testing(temp_dir: &Path) -> Self {
        Self {
            config_dir: temp_dir.join("config"),
            data_dir: temp_dir.join("data"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(Config::FILENAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
