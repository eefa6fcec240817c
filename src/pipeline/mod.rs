pub mod dispatcher;
pub mod ledger;
pub mod processor;
pub mod writer;

pub use dispatcher::{Collaborators, Dispatcher, PipelineOptions, RunStats, collect_candidates};
pub use ledger::Ledger;
pub use processor::{FileOutcome, FileProcessor, FileReport, SkipReason};
pub use writer::RecordWriter;
