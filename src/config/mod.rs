// Configuration management module
// TOML-backed settings for every external capability and pipeline policy

pub mod settings;

pub use settings::{
    Config, ConfigError, OllamaConfig, OpenAiConfig, QdrantConfig, RetrievalConfig,
};

/// Get the default configuration directory path.
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
