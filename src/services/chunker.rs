//! Token-bounded text chunking.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use crate::error::ChunkError;
use crate::models::{ChunkingConfig, TextChunk};

/// Pre-tokenization pattern close to the splits of GPT-style BPE encoders:
/// contractions, words and numbers with their leading space, punctuation runs,
/// and whitespace runs. Every character of the input belongs to exactly one match.
const TOKEN_PATTERN: &str = r"'(?:s|t|re|ve|m|ll|d)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+";

/// Capability that splits text into tokens.
///
/// Returns the byte span of every token in `text`, in order. Spans must not
/// overlap; gaps between spans are allowed and stay attached to the
/// preceding token when the text is cut into chunks.
pub trait TokenCodec: Send + Sync {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError>;
}

/// Deterministic regex tokenizer, used when no tokenizer file is configured.
#[derive(Debug, Clone)]
pub struct PatternTokenizer {
    pattern: Regex,
}

impl PatternTokenizer {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(TOKEN_PATTERN).expect("token pattern is valid"),
        }
    }
}

impl Default for PatternTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCodec for PatternTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError> {
        Ok(self.pattern.find_iter(text).map(|m| m.range()).collect())
    }
}

/// Tokenizer backed by a Hugging Face `tokenizer.json` file.
pub struct HfTokenizer {
    tokenizer: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer file. Any truncation or padding saved in the file is
    /// cleared so every token of the input gets a span.
    pub fn from_file(path: &Path) -> Result<Self, ChunkError> {
        let load_error = |message: String| ChunkError::TokenizerLoad {
            path: path.to_path_buf(),
            message,
        };

        let mut tokenizer =
            tokenizers::Tokenizer::from_file(path).map_err(|e| load_error(e.to_string()))?;
        tokenizer
            .with_truncation(None)
            .map_err(|e| load_error(e.to_string()))?;
        tokenizer.with_padding(None);

        Ok(Self { tokenizer })
    }
}

impl TokenCodec for HfTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| ChunkError::Tokenizer(e.to_string()))?;

        // Byte-level tokenizers can emit several tokens for one character, all
        // sharing the same offsets; keep only spans that advance.
        let mut spans: Vec<Range<usize>> = Vec::with_capacity(encoding.len());
        let mut cursor = 0usize;
        for &(start, end) in encoding.get_offsets() {
            if start < cursor || end <= start || end > text.len() {
                continue;
            }
            if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                continue;
            }
            spans.push(start..end);
            cursor = end;
        }
        Ok(spans)
    }
}

/// Build the codec selected by configuration.
pub fn codec_from_config(config: &ChunkingConfig) -> Result<Arc<dyn TokenCodec>, ChunkError> {
    match &config.tokenizer_path {
        Some(path) => Ok(Arc::new(HfTokenizer::from_file(path)?)),
        None => Ok(Arc::new(PatternTokenizer::new())),
    }
}

/// Splits text into contiguous windows of at most `max_tokens` tokens.
#[derive(Clone)]
pub struct TextChunker {
    codec: Arc<dyn TokenCodec>,
    max_tokens: usize,
}

impl TextChunker {
    pub fn new(codec: Arc<dyn TokenCodec>, max_tokens: usize) -> Self {
        Self {
            codec,
            max_tokens: max_tokens.max(1),
        }
    }

    /// Chunk `text` in order. The chunks' texts concatenate back to `text`.
    pub fn chunk(&self, file_id: &str, text: &str) -> Result<Vec<TextChunk>, ChunkError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let spans = self.codec.token_spans(text)?;
        if spans.is_empty() {
            // Nothing tokenizable (e.g. a lone control sequence); keep it whole.
            return Ok(vec![TextChunk {
                file_id: file_id.to_string(),
                index: 0,
                text: text.to_string(),
                token_count: 0,
            }]);
        }

        let windows: Vec<&[Range<usize>]> = spans.chunks(self.max_tokens).collect();
        let mut chunks = Vec::with_capacity(windows.len());

        for (index, window) in windows.iter().enumerate() {
            let start = if index == 0 { 0 } else { window[0].start };
            let end = windows
                .get(index + 1)
                .map_or(text.len(), |next| next[0].start);

            chunks.push(TextChunk {
                file_id: file_id.to_string(),
                index,
                text: text[start..end].to_string(),
                token_count: window.len(),
            });
        }

        Ok(chunks)
    }
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}
