//! External capabilities of the pipeline: extraction, tokenization, generation.

mod chunker;
mod extractor;
mod generator;

pub use chunker::{HfTokenizer, PatternTokenizer, TextChunker, TokenCodec, codec_from_config};
pub use extractor::{DocumentExtractor, TextExtractor};
pub use generator::{ChatGenerator, QaGenerator};
