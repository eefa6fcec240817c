//! Error types for the QA dataset generator.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to turning a source file into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type '{extension}' for file {path}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("error reading text from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error extracting text from {path}: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// Errors related to tokenization and chunking.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("failed to load tokenizer from {path}: {message}")]
    TokenizerLoad { path: PathBuf, message: String },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

/// Errors related to generating a QA pair from a chunk.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("failed to connect to generation backend: {0}")]
    Connection(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation backend returned status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("generation backend rejected credentials (status {0})")]
    Auth(u16),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Connection(_) | GenerationError::Timeout => true,
            // Rate limits and transient upstream failures
            GenerationError::Server { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Request(e) => e.is_timeout() || e.is_connect(),
            GenerationError::MissingApiKey(_)
            | GenerationError::Auth(_)
            | GenerationError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to appending a record to the output artifact.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write data to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output writer lock poisoned")]
    LockPoisoned,
}

/// Errors related to the processed-files ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

/// Errors that abort the processing of a single file.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("chunking error for {file}: {source}")]
    Chunking {
        file: String,
        #[source]
        source: ChunkError,
    },

    #[error("processing task for {file} did not complete: {message}")]
    Join { file: String, message: String },
}

/// Errors that stop a run before any file is submitted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data directory does not exist or is not a directory: {0}")]
    DataDirectory(PathBuf),

    #[error("failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("directory walk error: {0}")]
    Walk(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
