//! Parallel-parse, sequential-write bulk import into SQLite.
//!
//! Register input files with a [`RecordParser`] on an [`Importer`], then
//! call [`Importer::import_all`]. Parsing runs on a worker pool; writing goes
//! through the single connection, one transaction per input file.

pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod parsers;
pub mod pipeline;
pub mod worker;

pub use cancel::{install_signal_handler, CancellationToken};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{insert_rows, BatchWriter, Database, DatabaseError, Row};
pub use error::{ConfigError, ErrorKind, ImportError, Result, WorkerError};
pub use parsers::JsonLinesParser;
pub use pipeline::{
    ErrorCollector, ErrorSummary, ImportOptions, ImportReport, Importer, Progress,
    ProgressDetailed, ProgressTracker, RecordParser,
};
pub use worker::{Job, JobResult, PoolOutput, RunningPool, WorkerPool};
