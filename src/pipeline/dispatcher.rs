//! Directory enumeration and the bounded worker pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::error::{PipelineError, ProcessError};
use crate::models::{Config, OutputEncoding};
use crate::pipeline::{FileOutcome, FileProcessor, Ledger, RecordWriter};
use crate::services::{QaGenerator, TextChunker, TextExtractor, TokenCodec};
use crate::utils::file::{file_identifier, list_supported_files};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub data_directory: PathBuf,
    pub output_path: PathBuf,
    pub encoding: OutputEncoding,
    pub force: bool,
    pub workers: usize,
    pub chunk_size: usize,
    pub output_stem: String,
    pub ledger_file: String,
    pub exclude_patterns: Vec<String>,
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn from_config(
        config: &Config,
        data_directory: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        encoding: OutputEncoding,
        force: bool,
    ) -> Self {
        Self {
            data_directory: data_directory.into(),
            output_path: output_path.into(),
            encoding,
            force,
            workers: config.pipeline.workers,
            chunk_size: config.chunking.chunk_size as usize,
            output_stem: config.pipeline.output_stem.clone(),
            ledger_file: config.pipeline.ledger_file.clone(),
            exclude_patterns: config.pipeline.exclude_patterns.clone(),
            show_progress: false,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_path.join(&self.ledger_file)
    }
}

/// The injected capabilities a run is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub codec: Arc<dyn TokenCodec>,
    pub generator: Arc<dyn QaGenerator>,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub found: usize,
    pub already_processed: usize,
    pub submitted: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks: usize,
    pub records: usize,
    pub generation_failures: usize,
    pub write_failures: usize,
    pub mark_failures: usize,
    /// Final position of the progress indicator; advances only for processed files.
    pub progress_ticks: u64,
    pub output_file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunStats {
    fn new(output_file: PathBuf) -> Self {
        Self {
            found: 0,
            already_processed: 0,
            submitted: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            chunks: 0,
            records: 0,
            generation_failures: 0,
            write_failures: 0,
            mark_failures: 0,
            progress_ticks: 0,
            output_file,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn record(&mut self, result: &Result<FileOutcome, ProcessError>) {
        match result {
            Ok(FileOutcome::Processed(report)) => {
                self.processed += 1;
                self.chunks += report.chunks;
                self.records += report.records_written;
                self.generation_failures += report.generation_failures;
                self.write_failures += report.write_failures;
                if !report.marked {
                    self.mark_failures += 1;
                }
            }
            Ok(FileOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

type WorkResult = (PathBuf, Result<FileOutcome, ProcessError>);

/// Lists the files a run would submit: supported direct children of `dir`,
/// minus `exclude` globs and, unless `force`, anything in `processed`.
pub fn collect_candidates(
    dir: &Path,
    processed: &HashSet<String>,
    force: bool,
    exclude: &[String],
) -> Result<Vec<PathBuf>, PipelineError> {
    let files = list_supported_files(dir, exclude)?;
    Ok(filter_processed(files, processed, force))
}

fn filter_processed(files: Vec<PathBuf>, processed: &HashSet<String>, force: bool) -> Vec<PathBuf> {
    if force {
        return files;
    }
    files
        .into_iter()
        .filter(|path| !processed.contains(&file_identifier(path)))
        .collect()
}

pub struct Dispatcher {
    options: PipelineOptions,
    collaborators: Collaborators,
}

impl Dispatcher {
    pub fn new(options: PipelineOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
        }
    }

    /// Process every candidate file and return once all workers have finished.
    pub async fn run(&self) -> Result<RunStats, PipelineError> {
        let start = Instant::now();
        let options = &self.options;

        if !options.data_directory.is_dir() {
            return Err(PipelineError::DataDirectory(options.data_directory.clone()));
        }
        std::fs::create_dir_all(&options.output_path).map_err(|source| {
            PipelineError::OutputDirectory {
                path: options.output_path.clone(),
                source,
            }
        })?;

        let writer = Arc::new(RecordWriter::in_directory(
            &options.output_path,
            &options.output_stem,
            options.encoding,
        ));
        let ledger = Arc::new(Ledger::new(options.ledger_path()));
        let processed = if options.force {
            HashSet::new()
        } else {
            ledger.load()?
        };

        let mut stats = RunStats::new(writer.path().to_path_buf());

        let files = list_supported_files(&options.data_directory, &options.exclude_patterns)?;
        stats.found = files.len();
        let candidates = filter_processed(files, &processed, options.force);
        stats.already_processed = stats.found - candidates.len();
        stats.submitted = candidates.len();

        tracing::info!(
            "found {} file(s) in {}, {} already processed, {} to process",
            stats.found,
            options.data_directory.display(),
            stats.already_processed,
            stats.submitted
        );

        if candidates.is_empty() {
            stats.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(stats);
        }

        let processor = Arc::new(FileProcessor::new(
            Arc::clone(&self.collaborators.extractor),
            TextChunker::new(Arc::clone(&self.collaborators.codec), options.chunk_size),
            Arc::clone(&self.collaborators.generator),
            writer,
            ledger,
            Arc::new(processed),
            options.force,
        ));

        let pb = self.progress_bar(candidates.len() as u64);
        let workers = options.workers.max(1);

        let (task_tx, task_rx) = mpsc::channel::<PathBuf>(workers * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<WorkResult>(workers * 2);

        let feeder = tokio::spawn(async move {
            for path in candidates {
                if task_tx.send(path).await.is_err() {
                    break;
                }
            }
        });

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                let processor = Arc::clone(&processor);
                tokio::spawn(worker_loop(task_rx, result_tx, processor))
            })
            .collect();
        drop(result_tx);

        while let Some((path, result)) = result_rx.recv().await {
            match &result {
                Ok(FileOutcome::Processed(report)) => {
                    pb.inc(1);
                    tracing::info!(
                        "processed {}: {} chunk(s), {} record(s)",
                        path.display(),
                        report.chunks,
                        report.records_written
                    );
                }
                Ok(FileOutcome::Skipped(reason)) => {
                    tracing::debug!("skipped {}: {:?}", path.display(), reason);
                }
                Err(e) => {
                    tracing::error!("task for {} failed: {e}", path.display());
                }
            }
            stats.record(&result);
        }

        if let Err(e) = feeder.await {
            tracing::error!("task feeder failed: {e}");
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("worker failed: {e}");
            }
        }

        stats.progress_ticks = pb.position();
        pb.finish_and_clear();
        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Pull paths until the queue closes. Each file runs in its own task so a
/// panic surfaces as a join error instead of killing the worker.
async fn worker_loop(
    task_rx: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    result_tx: mpsc::Sender<WorkResult>,
    processor: Arc<FileProcessor>,
) {
    loop {
        let next = task_rx.lock().await.recv().await;
        let Some(path) = next else {
            break;
        };

        let task_processor = Arc::clone(&processor);
        let task_path = path.clone();
        let result = tokio::spawn(async move { task_processor.process(&task_path).await })
            .await
            .unwrap_or_else(|e| {
                Err(ProcessError::Join {
                    file: file_identifier(&path),
                    message: e.to_string(),
                })
            });

        if result_tx.send((path, result)).await.is_err() {
            break;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::{QaRecord, TextChunk};
    use crate::services::{DocumentExtractor, PatternTokenizer};
    use async_trait::async_trait;

    struct PanicOn(&'static str);

    #[async_trait]
    impl QaGenerator for PanicOn {
        async fn generate(&self, chunk: &TextChunk) -> Result<QaRecord, GenerationError> {
            if chunk.file_id == self.0 {
                panic!("generator blew up on {}", chunk.file_id);
            }
            QaRecord::new("Q?", "A.")
        }
    }

    fn collaborators(generator: Arc<dyn QaGenerator>) -> Collaborators {
        Collaborators {
            extractor: Arc::new(DocumentExtractor::new()),
            codec: Arc::new(PatternTokenizer::new()),
            generator,
        }
    }

    fn options(data: &Path, out: &Path) -> PipelineOptions {
        PipelineOptions::from_config(&Config::default(), data, out, OutputEncoding::Jsonl, false)
    }

    #[test]
    fn test_collect_candidates_filters_snapshot_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.md", "c.pdf", "draft-d.txt", "e.docx"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let processed = HashSet::from(["b.md".to_string()]);
        let exclude = vec!["draft-*".to_string()];

        let names = |paths: Vec<PathBuf>| -> Vec<String> {
            paths.iter().map(|p| file_identifier(p)).collect()
        };

        let candidates = collect_candidates(dir.path(), &processed, false, &exclude).unwrap();
        assert_eq!(names(candidates), vec!["a.txt", "c.pdf"]);

        let forced = collect_candidates(dir.path(), &processed, true, &exclude).unwrap();
        assert_eq!(names(forced), vec!["a.txt", "b.md", "c.pdf"]);
    }

    #[test]
    fn test_options_from_config() {
        let opts = options(Path::new("/data"), Path::new("/out"));
        assert_eq!(opts.workers, 4);
        assert_eq!(opts.chunk_size, 2048);
        assert_eq!(opts.ledger_path(), PathBuf::from("/out/processed_files.txt"));
        assert!(!opts.show_progress);
    }

    #[tokio::test]
    async fn test_missing_data_directory_fails_before_work() {
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("no-such-dir");
        let output = out.path().join("results");

        let dispatcher = Dispatcher::new(
            options(&missing, &output),
            collaborators(Arc::new(PanicOn("none"))),
        );
        assert!(matches!(
            dispatcher.run().await,
            Err(PipelineError::DataDirectory(_))
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_output_directory_is_created() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let output = out.path().join("nested").join("results");

        let stats = Dispatcher::new(
            options(data.path(), &output),
            collaborators(Arc::new(PanicOn("none"))),
        )
        .run()
        .await
        .unwrap();

        assert!(output.is_dir());
        assert_eq!(stats.found, 0);
        assert_eq!(stats.submitted, 0);
    }

    #[tokio::test]
    async fn test_panicking_file_is_contained() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("bad.txt"), "explodes").unwrap();
        std::fs::write(data.path().join("good.txt"), "works fine").unwrap();
        std::fs::write(data.path().join("fine.md"), "also works").unwrap();

        let mut opts = options(data.path(), out.path());
        opts.workers = 2;
        let stats = Dispatcher::new(opts, collaborators(Arc::new(PanicOn("bad.txt"))))
            .run()
            .await
            .unwrap();

        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.records, 2);

        let ledger = Ledger::new(out.path().join("processed_files.txt"))
            .load()
            .unwrap();
        assert_eq!(
            ledger,
            HashSet::from(["good.txt".to_string(), "fine.md".to_string()])
        );
    }

    #[tokio::test]
    async fn test_progress_advances_only_for_processed_files() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("bad.txt"), "explodes").unwrap();
        std::fs::write(data.path().join("empty.txt"), "").unwrap();
        std::fs::write(data.path().join("good.txt"), "works fine").unwrap();

        let stats = Dispatcher::new(
            options(data.path(), out.path()),
            collaborators(Arc::new(PanicOn("bad.txt"))),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.progress_ticks, 1);
    }

    #[tokio::test]
    async fn test_many_files_with_few_workers() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for i in 0..25 {
            std::fs::write(data.path().join(format!("doc-{i:02}.txt")), format!("text {i}")).unwrap();
        }

        let mut opts = options(data.path(), out.path());
        opts.workers = 3;
        let stats = Dispatcher::new(opts, collaborators(Arc::new(PanicOn("none"))))
            .run()
            .await
            .unwrap();

        assert_eq!(stats.processed, 25);
        assert_eq!(stats.records, 25);
        let content = std::fs::read_to_string(out.path().join("output_qa.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 25);
    }
}
