use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4-turbo";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_CHUNK_SIZE: u32 = 2048;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_OUTPUT_STEM: &str = "output_qa";
const DEFAULT_LEDGER_FILE: &str = "processed_files.txt";
const DEFAULT_LOG_FILE: &str = "pdf_processing.log";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docqa").join("config.toml"))
    }

    /// Load the user config file, or defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a config file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.workers must be greater than 0".to_string(),
            ));
        }
        if let Some(path) = &self.chunking.tokenizer_path {
            if !path.is_file() {
                return Err(ConfigError::PathError(format!(
                    "tokenizer file not found: {}",
                    path.display()
                )));
            }
        }
        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.min_temperature)
            || !(0.0..=2.0).contains(&g.max_temperature)
            || g.min_temperature > g.max_temperature
        {
            return Err(ConfigError::ValidationError(format!(
                "invalid temperature range [{}, {}]",
                g.min_temperature, g.max_temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub min_temperature: f32,

    #[serde(default = "default_max_temperature")]
    pub max_temperature: f32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_temperature() -> f32 {
    0.7
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
            min_temperature: 0.0,
            max_temperature: default_max_temperature(),
            max_attempts: default_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Optional `tokenizer.json`; the built-in pattern tokenizer is used otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Output file name without extension.
    #[serde(default = "default_output_stem")]
    pub output_stem: String,

    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    /// Diagnostic log file, relative to the output path.
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Glob patterns matched against file names to leave out of a run.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_output_stem() -> String {
    DEFAULT_OUTPUT_STEM.to_string()
}

fn default_ledger_file() -> String {
    DEFAULT_LEDGER_FILE.to_string()
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            output_stem: default_output_stem(),
            ledger_file: default_ledger_file(),
            log_file: default_log_file(),
            exclude_patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.generation.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.chunking.chunk_size, 2048);
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline.ledger_file, "processed_files.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [generation]
            model = "gpt-4o-mini"

            [pipeline]
            workers = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.generation.timeout_secs, 120);
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.output_stem, "output_qa");
        assert_eq!(config.chunking.chunk_size, 2048);
    }

    #[test]
    fn test_validation_rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_inverted_temperature() {
        let mut config = Config::default();
        config.generation.min_temperature = 0.9;
        config.generation.max_temperature = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_missing_tokenizer() {
        let mut config = Config::default();
        config.chunking.tokenizer_path = Some("/nonexistent/tokenizer.json".into());
        assert!(matches!(config.validate(), Err(ConfigError::PathError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 512\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 512);
        assert!(config.chunking.tokenizer_path.is_none());
    }
}
