//! Per-file orchestration: extract, chunk, generate, write, mark.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ExtractError, ProcessError};
use crate::pipeline::{Ledger, RecordWriter};
use crate::services::{QaGenerator, TextChunker, TextExtractor};
use crate::utils::file::file_identifier;
use crate::utils::logging::truncate_text;

/// Why a file was not processed.
#[derive(Debug)]
pub enum SkipReason {
    /// Already present in the ledger snapshot.
    AlreadyProcessed,
    /// Text could not be extracted.
    Extraction(ExtractError),
    /// The document has no text.
    EmptyText,
}

/// Counters for one fully walked file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub chunks: usize,
    pub records_written: usize,
    pub generation_failures: usize,
    pub write_failures: usize,
    /// False when the ledger append failed.
    pub marked: bool,
}

#[derive(Debug)]
pub enum FileOutcome {
    Processed(FileReport),
    Skipped(SkipReason),
}

impl FileOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, FileOutcome::Processed(_))
    }
}

/// Runs one file through the pipeline. Shared by all workers.
pub struct FileProcessor {
    extractor: Arc<dyn TextExtractor>,
    chunker: TextChunker,
    generator: Arc<dyn QaGenerator>,
    writer: Arc<RecordWriter>,
    ledger: Arc<Ledger>,
    /// Ledger contents loaded at startup; never updated during a run.
    processed: Arc<HashSet<String>>,
    force: bool,
}

impl FileProcessor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        chunker: TextChunker,
        generator: Arc<dyn QaGenerator>,
        writer: Arc<RecordWriter>,
        ledger: Arc<Ledger>,
        processed: Arc<HashSet<String>>,
        force: bool,
    ) -> Self {
        Self {
            extractor,
            chunker,
            generator,
            writer,
            ledger,
            processed,
            force,
        }
    }

    pub async fn process(&self, path: &Path) -> Result<FileOutcome, ProcessError> {
        let file_id = file_identifier(path);

        if !self.force && self.processed.contains(&file_id) {
            return Ok(FileOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        let text = match self.extract(path, &file_id).await? {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("{e}");
                return Ok(FileOutcome::Skipped(SkipReason::Extraction(e)));
            }
        };

        if text.is_empty() {
            tracing::info!("no text extracted from {}, skipping", path.display());
            return Ok(FileOutcome::Skipped(SkipReason::EmptyText));
        }

        let chunks = self
            .chunker
            .chunk(&file_id, &text)
            .map_err(|source| ProcessError::Chunking {
                file: file_id.clone(),
                source,
            })?;

        let mut report = FileReport {
            chunks: chunks.len(),
            ..Default::default()
        };

        for chunk in &chunks {
            let record = match self.generator.generate(chunk).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(
                        "error generating QA data for {} chunk {}: {e}",
                        file_id,
                        chunk.index
                    );
                    report.generation_failures += 1;
                    continue;
                }
            };

            tracing::info!(
                "generated QA data for {} chunk {}: {}",
                file_id,
                chunk.index,
                truncate_text(&record.question, 120)
            );

            match self.writer.write(&record) {
                Ok(()) => report.records_written += 1,
                Err(e) => {
                    tracing::error!("{e}");
                    report.write_failures += 1;
                }
            }
        }

        if report.records_written == 0 {
            tracing::warn!(
                "{} produced no records from {} chunk(s); marking it processed anyway",
                file_id,
                report.chunks
            );
        }

        match self.ledger.mark(&file_id) {
            Ok(()) => report.marked = true,
            Err(e) => tracing::error!("failed to mark {file_id} as processed: {e}"),
        }

        Ok(FileOutcome::Processed(report))
    }

    /// Extraction may parse large PDFs, so it runs on the blocking pool.
    async fn extract(
        &self,
        path: &Path,
        file_id: &str,
    ) -> Result<Result<String, ExtractError>, ProcessError> {
        let extractor = Arc::clone(&self.extractor);
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| ProcessError::Join {
                file: file_id.to_string(),
                message: e.to_string(),
            })
    }
}

impl std::fmt::Debug for FileProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProcessor")
            .field("chunker", &self.chunker)
            .field("writer", &self.writer)
            .field("ledger", &self.ledger)
            .field("processed", &self.processed.len())
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::{OutputEncoding, QaRecord, TextChunk};
    use crate::services::{DocumentExtractor, PatternTokenizer};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SpyExtractor {
        calls: AtomicUsize,
    }

    impl TextExtractor for SpyExtractor {
        fn extract(&self, path: &Path) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DocumentExtractor::new().extract(path)
        }
    }

    /// Fails the chunks whose index is listed, answers the rest.
    struct ScriptedGenerator {
        fail_indices: Vec<usize>,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl QaGenerator for ScriptedGenerator {
        async fn generate(&self, chunk: &TextChunk) -> Result<QaRecord, GenerationError> {
            self.seen.lock().unwrap().push(chunk.index);
            if self.fail_indices.contains(&chunk.index) {
                return Err(GenerationError::InvalidResponse("scripted".to_string()));
            }
            QaRecord::new(format!("Q{}?", chunk.index), format!("A{}.", chunk.index))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        extractor: Arc<SpyExtractor>,
        generator: Arc<ScriptedGenerator>,
        writer: Arc<RecordWriter>,
        ledger: Arc<Ledger>,
    }

    impl Fixture {
        fn new(fail_indices: Vec<usize>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let writer = Arc::new(RecordWriter::in_directory(
                dir.path(),
                "output_qa",
                OutputEncoding::Jsonl,
            ));
            let ledger = Arc::new(Ledger::new(dir.path().join("processed_files.txt")));
            Self {
                dir,
                extractor: Arc::new(SpyExtractor {
                    calls: AtomicUsize::new(0),
                }),
                generator: Arc::new(ScriptedGenerator {
                    fail_indices,
                    seen: Mutex::new(Vec::new()),
                }),
                writer,
                ledger,
            }
        }

        fn processor(&self, processed: &[&str], force: bool, max_tokens: usize) -> FileProcessor {
            FileProcessor::new(
                self.extractor.clone(),
                TextChunker::new(Arc::new(PatternTokenizer::new()), max_tokens),
                self.generator.clone(),
                self.writer.clone(),
                self.ledger.clone(),
                Arc::new(processed.iter().map(|s| s.to_string()).collect()),
                force,
            )
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn output_lines(&self) -> usize {
            std::fs::read_to_string(self.writer.path())
                .map(|c| c.lines().count())
                .unwrap_or(0)
        }

        fn ledger_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.ledger.path())
                .map(|c| c.lines().map(String::from).collect())
                .unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn test_ledgered_file_is_never_extracted() {
        let fx = Fixture::new(vec![]);
        let path = fx.file("done.txt", "Already handled text.");

        let outcome = fx.processor(&["done.txt"], false, 100).process(&path).await.unwrap();

        assert!(matches!(
            outcome,
            FileOutcome::Skipped(SkipReason::AlreadyProcessed)
        ));
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.output_lines(), 0);
    }

    #[tokio::test]
    async fn test_force_ignores_snapshot() {
        let fx = Fixture::new(vec![]);
        let path = fx.file("done.txt", "Already handled text.");

        let outcome = fx.processor(&["done.txt"], true, 100).process(&path).await.unwrap();

        assert!(outcome.is_processed());
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.output_lines(), 1);
    }

    #[tokio::test]
    async fn test_chunks_processed_in_order_and_failures_skipped() {
        let fx = Fixture::new(vec![1]);
        // 12 pattern tokens, 4 per chunk -> 3 chunks.
        let path = fx.file("doc.md", "one two three four five six seven eight nine ten eleven twelve");

        let outcome = fx.processor(&[], false, 4).process(&path).await.unwrap();

        let FileOutcome::Processed(report) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(report.chunks, 3);
        assert_eq!(report.records_written, 2);
        assert_eq!(report.generation_failures, 1);
        assert!(report.marked);
        assert_eq!(*fx.generator.seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(fx.output_lines(), 2);
        assert_eq!(fx.ledger_lines(), vec!["doc.md"]);
    }

    #[tokio::test]
    async fn test_all_chunks_failing_still_marks_file() {
        let fx = Fixture::new(vec![0, 1, 2]);
        let path = fx.file("hard.txt", "alpha beta gamma delta epsilon zeta");

        let outcome = fx.processor(&[], false, 2).process(&path).await.unwrap();

        let FileOutcome::Processed(report) = outcome else {
            panic!("expected processed outcome");
        };
        assert_eq!(report.records_written, 0);
        assert_eq!(report.generation_failures, 3);
        assert_eq!(fx.output_lines(), 0);
        assert_eq!(fx.ledger_lines(), vec!["hard.txt"]);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_not_marked() {
        let fx = Fixture::new(vec![]);
        let path = fx.file("broken.pdf", "this is not a pdf");

        let outcome = fx.processor(&[], false, 100).process(&path).await.unwrap();

        assert!(matches!(
            outcome,
            FileOutcome::Skipped(SkipReason::Extraction(ExtractError::Pdf { .. }))
        ));
        assert!(fx.ledger_lines().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_not_marked() {
        let fx = Fixture::new(vec![]);
        let path = fx.file("empty.txt", "");

        let outcome = fx.processor(&[], false, 100).process(&path).await.unwrap();

        assert!(matches!(
            outcome,
            FileOutcome::Skipped(SkipReason::EmptyText)
        ));
        assert!(fx.generator.seen.lock().unwrap().is_empty());
        assert!(fx.ledger_lines().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_counted_and_file_still_marked() {
        let fx = Fixture::new(vec![]);
        let path = fx.file("a.txt", "some words here");
        let broken_writer = Arc::new(RecordWriter::new(
            fx.dir.path().join("missing").join("out.jsonl"),
            OutputEncoding::Jsonl,
        ));
        let processor = FileProcessor::new(
            fx.extractor.clone(),
            TextChunker::new(Arc::new(PatternTokenizer::new()), 100),
            fx.generator.clone(),
            broken_writer,
            fx.ledger.clone(),
            Arc::new(HashSet::new()),
            false,
        );

        let FileOutcome::Processed(report) = processor.process(&path).await.unwrap() else {
            panic!("expected processed outcome");
        };
        assert_eq!(report.records_written, 0);
        assert_eq!(report.write_failures, 1);
        assert_eq!(fx.ledger_lines(), vec!["a.txt"]);
    }
}
