//! Command-line interface for docqa.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::models::{OutputEncoding, OutputFormat};

const EXIT_STATUS_HELP: &str = "Exit status: 0 when the run completes, even if some files or chunks \
failed (those are logged and counted in the summary). Non-zero when startup fails: invalid \
configuration, missing data directory, missing API key or unreadable tokenizer file.";

/// Generate question/answer datasets from a directory of documents.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
#[command(after_help = EXIT_STATUS_HELP)]
pub struct Cli {
    /// Directory containing the PDF, text and markdown files to process
    #[arg(long = "data_directory", value_name = "PATH")]
    pub data_directory: PathBuf,

    /// Directory for the output file, ledger and log
    #[arg(long = "output_path", value_name = "PATH", default_value = ".")]
    pub output_path: PathBuf,

    /// Output file type: csv, json or jsonl (json is written as jsonl)
    #[arg(long, default_value = "jsonl")]
    pub filetype: OutputEncoding,

    /// Reprocess files already listed in the ledger
    #[arg(long)]
    pub force: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, env = "DOCQA_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of files processed concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum tokens per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<u32>,

    /// File name patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// List the files that would be processed without processing them
    #[arg(long)]
    pub dry_run: bool,

    /// Summary format: text or json
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,
}
