use std::fmt;

use crate::cancel::CancellationToken;
use crate::error::{ImportError, Result, WorkerError};

type JobFn<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T> + Send>;

/// A cancellable unit of work identified by `id`.
///
/// Jobs are expected to turn their own failures into `Err` values; a panic
/// inside a job is not caught by the pool.
pub struct Job<T> {
    pub id: String,
    run: JobFn<T>,
}

impl<T> Job<T> {
    pub fn new<S, F>(id: S, run: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        Self {
            id: id.into(),
            run: Box::new(run),
        }
    }

    pub(crate) fn execute(self, cancel: &CancellationToken) -> JobResult<T> {
        JobResult {
            output: (self.run)(cancel),
            job_id: self.id,
        }
    }

    /// Result for a job that never ran because the pool was cancelled.
    pub(crate) fn into_cancelled(self) -> JobResult<T> {
        JobResult::failure(
            self.id.clone(),
            WorkerError::Cancelled { job_id: self.id }.into(),
        )
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct JobResult<T> {
    pub job_id: String,
    pub output: Result<T>,
}

impl<T> JobResult<T> {
    pub fn success(job_id: String, value: T) -> Self {
        Self {
            job_id,
            output: Ok(value),
        }
    }

    pub fn failure(job_id: String, error: ImportError) -> Self {
        Self {
            job_id,
            output: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }

    pub fn error(&self) -> Option<&ImportError> {
        self.output.as_ref().err()
    }
}

/// A failed job as reported by [`PoolOutput::failures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job_id: String,
    pub error: String,
}

/// Everything a pool produced: one result per submitted job, in completion
/// order, plus the failed subset.
#[derive(Debug)]
pub struct PoolOutput<T> {
    pub results: Vec<JobResult<T>>,
    pub failures: Vec<JobFailure>,
}

impl<T> PoolOutput<T> {
    pub(crate) fn from_results(results: Vec<JobResult<T>>) -> Self {
        let failures = results
            .iter()
            .filter_map(|r| {
                r.error().map(|e| JobFailure {
                    job_id: r.job_id.clone(),
                    error: e.to_string(),
                })
            })
            .collect();
        Self { results, failures }
    }
}
