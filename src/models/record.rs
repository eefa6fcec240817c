//! Output records and encodings.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

pub const KEY_QUESTION: &str = "question";
pub const KEY_ANSWER: &str = "answer";

/// One generated question/answer pair.
///
/// The originating chunk and file are not part of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
}

impl QaRecord {
    /// Build a record, rejecting blank fields.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let question = question.into();
        let answer = answer.into();

        if question.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "empty question".to_string(),
            ));
        }
        if answer.trim().is_empty() {
            return Err(GenerationError::InvalidResponse("empty answer".to_string()));
        }

        Ok(Self { question, answer })
    }
}

/// Encoding of the output artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    /// Comma-separated values with a header row
    Csv,
    /// Alias for `Jsonl`; still one object per line
    Json,
    /// One JSON object per line
    #[default]
    Jsonl,
}

impl OutputEncoding {
    /// Whether records are written as CSV rows.
    pub fn is_csv(self) -> bool {
        matches!(self, OutputEncoding::Csv)
    }

    /// File extension of the artifact. `json` shares the `jsonl` file.
    pub fn extension(self) -> &'static str {
        match self {
            OutputEncoding::Csv => "csv",
            OutputEncoding::Json | OutputEncoding::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for OutputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputEncoding::Csv),
            "json" => Ok(OutputEncoding::Json),
            "jsonl" => Ok(OutputEncoding::Jsonl),
            _ => Err(format!(
                "unknown file type: {} (expected csv, json or jsonl)",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputEncoding::Csv => write!(f, "csv"),
            OutputEncoding::Json => write!(f, "json"),
            OutputEncoding::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Output format for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
