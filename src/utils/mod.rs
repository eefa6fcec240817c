//! Utility modules.

pub mod file;
pub mod logging;
pub mod retry;

pub use file::{file_identifier, is_supported_file, list_supported_files};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
