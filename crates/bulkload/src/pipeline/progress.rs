//! Import progress tracking.
//!
//! All counters are atomics, so workers and the writer can update one shared
//! `ProgressTracker` without locking. Snapshots are derived on every read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// File-level view kept for callers that predate row tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub parsed_files: u64,
    pub failed_files: u64,
    /// Always `parsed_files - failed_files`.
    pub inserted_files: u64,
    pub total_files: u64,
    pub inserted_rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressDetailed {
    pub parsed_files: u64,
    pub failed_files: u64,
    pub inserted_files: u64,
    pub total_files: u64,
    pub inserted_rows: u64,
    /// Expected row total, when the caller provided one.
    pub total_rows: Option<u64>,
    pub percent_files: f64,
    pub percent_rows: f64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub rows_per_second: f64,
    pub eta: Duration,
}

impl fmt::Display for ProgressDetailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} files ({:.1}%), {} failed, {} rows",
            self.parsed_files, self.total_files, self.percent_files, self.failed_files, self.inserted_rows
        )?;
        if let Some(total_rows) = self.total_rows {
            write!(f, "/{} ({:.1}%)", total_rows, self.percent_rows)?;
        }
        write!(
            f,
            ", {:.1} rows/s, elapsed {}s, ETA {}s",
            self.rows_per_second,
            self.elapsed.as_secs(),
            self.eta.as_secs()
        )
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    total_files: AtomicU64,
    parsed_files: AtomicU64,
    failed_files: AtomicU64,
    inserted_rows: AtomicU64,
    total_rows: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProgressTracker {
    pub fn new(total_files: u64) -> Self {
        Self {
            total_files: AtomicU64::new(total_files),
            parsed_files: AtomicU64::new(0),
            failed_files: AtomicU64::new(0),
            inserted_rows: AtomicU64::new(0),
            total_rows: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn set_total_files(&self, total: u64) {
        self.total_files.store(total, Ordering::Relaxed);
    }

    /// Records the expected number of rows, enabling row-based percentage and ETA.
    pub fn set_total_rows(&self, total: u64) {
        self.total_rows.store(total, Ordering::Relaxed);
    }

    /// Adds `files_delta` parsed files and `rows_delta` inserted rows.
    pub fn update(&self, files_delta: u64, rows_delta: u64) {
        self.parsed_files.fetch_add(files_delta, Ordering::Relaxed);
        self.inserted_rows.fetch_add(rows_delta, Ordering::Relaxed);
    }

    pub fn increment_parsed(&self) {
        self.parsed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inserted_rows(&self, rows: u64) {
        self.inserted_rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn get_progress(&self) -> Progress {
        let parsed_files = self.parsed_files.load(Ordering::Relaxed);
        let failed_files = self.failed_files.load(Ordering::Relaxed);
        Progress {
            parsed_files,
            failed_files,
            inserted_files: parsed_files.saturating_sub(failed_files),
            total_files: self.total_files.load(Ordering::Relaxed),
            inserted_rows: self.inserted_rows.load(Ordering::Relaxed),
        }
    }

    pub fn get_progress_detailed(&self) -> ProgressDetailed {
        self.detailed_at(self.started.elapsed())
    }

    fn detailed_at(&self, elapsed: Duration) -> ProgressDetailed {
        let progress = self.get_progress();
        let total_rows = self.total_rows.load(Ordering::Relaxed);

        let elapsed_secs = elapsed.as_secs_f64();
        let rate = |done: u64| {
            if elapsed_secs > 0.0 {
                done as f64 / elapsed_secs
            } else {
                0.0
            }
        };
        let rows_per_second = rate(progress.inserted_rows);
        let files_per_second = rate(progress.parsed_files);

        let eta_secs = if total_rows > 0 && rows_per_second > 0.0 {
            total_rows.saturating_sub(progress.inserted_rows) as f64 / rows_per_second
        } else if progress.total_files > 0 && files_per_second > 0.0 {
            progress.total_files.saturating_sub(progress.parsed_files) as f64 / files_per_second
        } else {
            0.0
        };

        ProgressDetailed {
            parsed_files: progress.parsed_files,
            failed_files: progress.failed_files,
            inserted_files: progress.inserted_files,
            total_files: progress.total_files,
            inserted_rows: progress.inserted_rows,
            total_rows: (total_rows > 0).then_some(total_rows),
            percent_files: percent(progress.parsed_files, progress.total_files),
            percent_rows: percent(progress.inserted_rows, total_rows),
            started_at: self.started_at,
            elapsed,
            rows_per_second,
            eta: Duration::try_from_secs_f64(eta_secs).unwrap_or_default(),
        }
    }
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 100.0).min(100.0)
}
