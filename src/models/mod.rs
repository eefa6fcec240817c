mod config;
mod document;
mod record;

pub use config::{ChunkingConfig, Config, GenerationConfig, PipelineConfig};
pub use document::{DocumentKind, SourceFile, TextChunk};
pub use record::{KEY_ANSWER, KEY_QUESTION, OutputEncoding, OutputFormat, QaRecord};
