pub mod cli;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use cli::Cli;
pub use models::{Config, OutputEncoding, OutputFormat, QaRecord};
pub use pipeline::{Dispatcher, PipelineOptions, RunStats};
