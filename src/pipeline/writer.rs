//! Append-only output artifact shared by all workers.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::WriteError;
use crate::models::{OutputEncoding, QaRecord};

/// Appends records to the output file, one open-append-close per record.
///
/// All appends go through an internal lock so rows from concurrent workers
/// never interleave, and the CSV header is written at most once.
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
    encoding: OutputEncoding,
    lock: Mutex<()>,
}

impl RecordWriter {
    pub fn new(path: impl Into<PathBuf>, encoding: OutputEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
            lock: Mutex::new(()),
        }
    }

    /// `<output_dir>/<stem>.<csv|jsonl>`
    pub fn in_directory(output_dir: &Path, stem: &str, encoding: OutputEncoding) -> Self {
        Self::new(
            output_dir.join(format!("{stem}.{}", encoding.extension())),
            encoding,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, record: &QaRecord) -> Result<(), WriteError> {
        let _guard = self.lock.lock().map_err(|_| WriteError::LockPoisoned)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        if self.encoding.is_csv() {
            self.append_csv(file, record)
        } else {
            self.append_jsonl(file, record)
        }
    }

    fn append_csv(&self, file: File, record: &QaRecord) -> Result<(), WriteError> {
        let is_empty = file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len()
            == 0;

        // With headers on, the first serialized struct emits its field names.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        writer.serialize(record).map_err(|source| WriteError::Csv {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| self.io_error(source))
    }

    fn append_jsonl(&self, mut file: File, record: &QaRecord) -> Result<(), WriteError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> WriteError {
        WriteError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
