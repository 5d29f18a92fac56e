//! Two-phase import orchestration.
//!
//! Phase 1 parses every registered input on the worker pool. Phase 2 writes
//! the parsed units one at a time through the single database connection,
//! one transaction per unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::collector::ErrorCollector;
use super::config::ImportOptions;
use super::parser::{erase, RecordParser, UnitParser};
use super::progress::ProgressTracker;
use super::task::{ParseOutcome, ParseTask};
use crate::cancel::CancellationToken;
use crate::db::{BatchWriter, Database};
use crate::error::{ImportError, Result, WorkerError};
use crate::worker::{Job, WorkerPool};

/// What one `import_all` call produced.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub progress: Arc<ProgressTracker>,
    pub errors: Arc<ErrorCollector>,
    pub parse_duration: Duration,
    pub insert_duration: Duration,
}

struct RunState {
    progress: Arc<ProgressTracker>,
    errors: Arc<ErrorCollector>,
}

pub struct Importer {
    db: Database,
    options: ImportOptions,
    inputs: Vec<(PathBuf, Arc<dyn UnitParser>)>,
    last_run: Mutex<Option<RunState>>,
}

impl Importer {
    pub fn new(db: Database, options: ImportOptions) -> Self {
        Self {
            db,
            options,
            inputs: Vec::new(),
            last_run: Mutex::new(None),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Registers one input file. Relative paths are resolved against the
    /// root passed to [`import_all`](Self::import_all).
    pub fn register<P, Q>(&mut self, path: Q, parser: Arc<P>) -> &mut Self
    where
        P: RecordParser,
        Q: Into<PathBuf>,
    {
        self.inputs.push((path.into(), erase(parser)));
        self
    }

    /// Registers several inputs handled by the same parser.
    pub fn register_all<P, I, Q>(&mut self, paths: I, parser: Arc<P>) -> &mut Self
    where
        P: RecordParser,
        I: IntoIterator<Item = Q>,
        Q: Into<PathBuf>,
    {
        let erased = erase(parser);
        for path in paths {
            self.inputs.push((path.into(), Arc::clone(&erased)));
        }
        self
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Error collector of the most recent run, if any run has started.
    pub fn error_collector(&self) -> Option<Arc<ErrorCollector>> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| Arc::clone(&run.errors))
    }

    /// Progress of the most recent run. Still readable when that run was
    /// cancelled.
    pub fn last_progress(&self) -> Option<Arc<ProgressTracker>> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| Arc::clone(&run.progress))
    }

    /// Parses all registered inputs in parallel, then inserts them
    /// sequentially.
    ///
    /// Per-unit failures are collected and the run continues. Cancellation
    /// stops the run with [`ImportError::Cancelled`]; units already committed
    /// stay in the database.
    pub fn import_all(&self, cancel: &CancellationToken, root: &Path) -> Result<ImportReport> {
        let tasks = self.create_tasks(root);
        if tasks.is_empty() {
            return Err(ImportError::NoInputs {
                root: root.to_path_buf(),
            });
        }

        let run_id = Uuid::new_v4();
        let progress = Arc::new(ProgressTracker::new(tasks.len() as u64));
        if let Some(rows) = self.options.expected_rows {
            progress.set_total_rows(rows);
        }
        let errors = Arc::new(ErrorCollector::new());
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(RunState {
            progress: Arc::clone(&progress),
            errors: Arc::clone(&errors),
        });

        let _run_span = info_span!("import", run_id = %run_id, tasks = tasks.len()).entered();
        info!("Starting import of {} inputs", tasks.len());

        let parse_started = Instant::now();
        let outcomes = {
            let _phase = info_span!("parse_phase").entered();
            self.parse_all(cancel, &tasks)?
        };
        let parse_duration = parse_started.elapsed();
        debug!("Parse phase finished in {:?}", parse_duration);

        let insert_started = Instant::now();
        {
            let _phase = info_span!("insert_phase").entered();
            self.insert_all(cancel, outcomes, &progress, &errors)?;
        }
        let insert_duration = insert_started.elapsed();

        let summary = progress.get_progress();
        info!(
            parsed = summary.parsed_files,
            failed = summary.failed_files,
            rows = summary.inserted_rows,
            "Import finished in {:?}",
            parse_duration + insert_duration
        );
        if !errors.is_empty() {
            warn!("{} units failed:\n{}", errors.len(), errors.summary());
        }

        Ok(ImportReport {
            run_id,
            progress,
            errors,
            parse_duration,
            insert_duration,
        })
    }

    fn create_tasks(&self, root: &Path) -> Vec<ParseTask> {
        self.inputs
            .iter()
            .map(|(path, parser)| {
                let path = if path.is_relative() {
                    root.join(path)
                } else {
                    path.clone()
                };
                ParseTask::new(path, Arc::clone(parser))
            })
            .collect()
    }

    /// Phase 1. Returns exactly one outcome per task; no database access.
    ///
    /// Tasks left unsubmitted after cancellation get a cancelled outcome.
    fn parse_all(&self, cancel: &CancellationToken, tasks: &[ParseTask]) -> Result<Vec<ParseOutcome>> {
        let pool = WorkerPool::new(self.options.worker_count).start::<ParseOutcome>(cancel.clone())?;

        let mut first_unsubmitted = tasks.len();
        let mut submit_error = None;
        for (index, task) in tasks.iter().enumerate() {
            let job_task = task.clone();
            let job = Job::new(task_job_id(index, task), move |cancel| Ok(job_task.run(cancel)));

            match pool.submit(job) {
                Ok(()) => {}
                Err(WorkerError::Cancelled { job_id }) => {
                    warn!("Cancelled while submitting {}, not submitting the rest", job_id);
                    first_unsubmitted = index + 1;
                    break;
                }
                Err(e) => {
                    submit_error = Some(e);
                    break;
                }
            }
        }

        let output = pool.wait();
        if let Some(e) = submit_error {
            return Err(e.into());
        }

        // Job ids carry the task index, so one path registered twice still
        // maps back to the right task.
        let by_id: HashMap<String, &ParseTask> = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (task_job_id(index, task), task))
            .collect();
        let mut outcomes: Vec<ParseOutcome> = output
            .results
            .into_iter()
            .filter_map(|result| match result.output {
                Ok(outcome) => Some(outcome),
                Err(e) => match by_id.get(&result.job_id) {
                    Some(task) => Some(task.outcome(Err(e))),
                    None => {
                        warn!("Dropping result for unknown job {}: {}", result.job_id, e);
                        None
                    }
                },
            })
            .collect();

        let never_submitted = &tasks[first_unsubmitted..];
        if !never_submitted.is_empty() {
            debug!("{} tasks never submitted", never_submitted.len());
        }
        outcomes.extend(
            never_submitted
                .iter()
                .map(|task| task.outcome(Err(ImportError::Cancelled))),
        );

        Ok(outcomes)
    }

    /// Phase 2. Writes units one at a time, each in its own transaction.
    fn insert_all(
        &self,
        cancel: &CancellationToken,
        outcomes: Vec<ParseOutcome>,
        progress: &ProgressTracker,
        errors: &ErrorCollector,
    ) -> Result<()> {
        let writer = BatchWriter::new(self.options.batch_size).with_progress(|done, total| {
            tracing::trace!("Wrote {}/{} rows", done, total);
        });
        let log_every = self.options.log_every;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancelled after {} units", index);
                return Err(ImportError::Cancelled);
            }

            progress.increment_parsed();
            let file = outcome.source_name();
            let table = outcome.table;
            let columns = outcome.columns;

            let written = outcome
                .records
                .and_then(|records| records.to_rows())
                .and_then(|rows| writer.insert(cancel, &self.db, &table, &columns, &rows));

            match written {
                Ok(rows) => {
                    progress.add_inserted_rows(rows as u64);
                    debug!("Inserted {} rows from {} into {}", rows, file, table);
                }
                Err(e) => {
                    progress.increment_failed();
                    let cancelled = e.is_cancelled();
                    warn!("Unit {} failed: {}", file, e);
                    errors.collect(e.with_context(Some(&file), Some(&table)));
                    if cancelled {
                        return Err(ImportError::Cancelled);
                    }
                }
            }

            if log_every > 0 && (index + 1) % log_every == 0 {
                info!("Progress: {}", progress.get_progress_detailed());
            }
        }

        Ok(())
    }
}

fn task_job_id(index: usize, task: &ParseTask) -> String {
    format!("{}#{}", index, task.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Row;
    use rusqlite::types::Value;

    /// Parses a file whose name is `<n>.rows` into `n` records; any other
    /// name fails.
    struct CountingParser {
        table: String,
        columns: Vec<String>,
    }

    impl CountingParser {
        fn new() -> Arc<Self> {
            Self::for_table("items")
        }

        fn for_table(table: &str) -> Arc<Self> {
            Arc::new(Self {
                table: table.to_string(),
                columns: vec!["id".to_string(), "source".to_string()],
            })
        }
    }

    impl RecordParser for CountingParser {
        type Record = (i64, String);

        fn parse_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<(i64, String)>> {
            cancel.check()?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let count: i64 = name
                .strip_suffix(".rows")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| ImportError::validation(format!("unreadable input {}", name)))?;
            Ok((0..count).map(|i| (i, name.to_string())).collect())
        }

        fn table_name(&self) -> &str {
            &self.table
        }

        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn to_row(&self, record: &(i64, String)) -> Result<Row> {
            Ok(vec![Value::Integer(record.0), Value::Text(record.1.clone())])
        }
    }

    fn database() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE items (id INTEGER NOT NULL, source TEXT NOT NULL)")
            .unwrap();
        db
    }

    fn options(worker_count: usize) -> ImportOptions {
        ImportOptions {
            worker_count,
            batch_size: 2,
            log_every: 1,
            expected_rows: None,
        }
    }

    #[test]
    fn test_no_inputs() {
        let importer = Importer::new(database(), options(2));
        let err = importer
            .import_all(&CancellationToken::new(), Path::new("/data"))
            .unwrap_err();
        assert!(matches!(err, ImportError::NoInputs { .. }));
        assert!(importer.last_progress().is_none());
    }

    #[test]
    fn test_import_counts_and_rows() {
        let db = database();
        let mut importer = Importer::new(db.clone(), options(3));
        importer
            .register_all(["5.rows", "3.rows"], CountingParser::new())
            .register("broken.txt", CountingParser::new());

        let report = importer
            .import_all(&CancellationToken::new(), Path::new("/in"))
            .unwrap();

        let progress = report.progress.get_progress();
        assert_eq!(progress.total_files, 3);
        assert_eq!(progress.parsed_files, 3);
        assert_eq!(progress.failed_files, 1);
        assert_eq!(progress.inserted_files, 2);
        assert_eq!(progress.inserted_rows, 8);
        assert_eq!(db.count_rows("items").unwrap(), 8);

        let errors = report.errors.get_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file.as_deref(), Some("/in/broken.txt"));
        assert_eq!(errors[0].table.as_deref(), Some("items"));

        let collector = importer.error_collector().unwrap();
        assert!(Arc::ptr_eq(&collector, &report.errors));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let importer = {
            let mut importer = Importer::new(database(), options(1));
            importer.register("/abs/2.rows", CountingParser::new());
            importer
        };
        let tasks = importer.create_tasks(Path::new("/root"));
        assert_eq!(tasks[0].path, PathBuf::from("/abs/2.rows"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let db = database();
        let mut importer = Importer::new(db.clone(), options(2));
        importer.register_all(["4.rows", "6.rows"], CountingParser::new());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = importer.import_all(&cancel, Path::new("/in")).unwrap_err();

        assert!(matches!(err, ImportError::Cancelled));
        assert_eq!(db.count_rows("items").unwrap(), 0);
        let progress = importer.last_progress().unwrap().get_progress();
        assert_eq!(progress.total_files, 2);
        assert_eq!(progress.inserted_rows, 0);
    }

    #[test]
    fn test_cancelled_parse_yields_one_outcome_per_task() {
        let mut importer = Importer::new(database(), options(1));
        importer.register_all(["1.rows", "2.rows", "3.rows", "4.rows"], CountingParser::new());
        let tasks = importer.create_tasks(Path::new("/in"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = importer.parse_all(&cancel, &tasks).unwrap();

        assert_eq!(outcomes.len(), tasks.len());
        for outcome in &outcomes {
            let err = outcome.records.as_ref().err().unwrap();
            assert!(err.is_cancelled(), "{}", err);
        }
        let mut sources: Vec<String> = outcomes.iter().map(|o| o.source_name()).collect();
        sources.sort();
        assert_eq!(sources, vec!["/in/1.rows", "/in/2.rows", "/in/3.rows", "/in/4.rows"]);
    }

    #[test]
    fn test_same_path_for_two_tables_keeps_both_tasks() {
        let mut importer = Importer::new(database(), options(1));
        importer
            .register("2.rows", CountingParser::for_table("items"))
            .register("2.rows", CountingParser::for_table("archive"));
        let tasks = importer.create_tasks(Path::new("/in"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = importer.parse_all(&cancel, &tasks).unwrap();

        let mut tables: Vec<&str> = outcomes.iter().map(|o| o.table.as_str()).collect();
        tables.sort_unstable();
        assert_eq!(tables, vec!["archive", "items"]);
    }

    #[test]
    fn test_expected_rows_feed_the_tracker() {
        let mut importer = Importer::new(
            database(),
            ImportOptions {
                expected_rows: Some(10),
                ..options(2)
            },
        );
        importer.register("5.rows", CountingParser::new());

        let report = importer
            .import_all(&CancellationToken::new(), Path::new("/in"))
            .unwrap();
        let detailed = report.progress.get_progress_detailed();
        assert_eq!(detailed.total_rows, Some(10));
        assert_eq!(detailed.percent_rows, 50.0);
    }

    #[test]
    fn test_runs_are_independent() {
        let db = database();
        let mut importer = Importer::new(db.clone(), options(2));
        importer.register("1.rows", CountingParser::new());

        let first = importer
            .import_all(&CancellationToken::new(), Path::new("/in"))
            .unwrap();
        let second = importer
            .import_all(&CancellationToken::new(), Path::new("/in"))
            .unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.progress.get_progress().parsed_files, 1);
        assert_eq!(db.count_rows("items").unwrap(), 2);
    }
}
