use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};
use log::{debug, error, info};

use crate::cancel::CancellationToken;
use crate::error::WorkerError;
use crate::worker::job::{Job, JobResult, PoolOutput};

/// How often blocked workers and submitters re-check the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An inert pool description. Call [`WorkerPool::start`] to spawn workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    /// Creates a pool of `worker_count` workers; zero is treated as one.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Spawns the workers. The job queue holds `2 * worker_count` jobs;
    /// beyond that `submit` blocks.
    pub fn start<T: Send + 'static>(
        self,
        cancel: CancellationToken,
    ) -> Result<RunningPool<T>, WorkerError> {
        let queue_capacity = self.worker_count * 2;
        let (job_sender, job_receiver) = bounded::<Job<T>>(queue_capacity);
        let (result_sender, result_receiver) = unbounded::<JobResult<T>>();

        let mut workers = Vec::with_capacity(self.worker_count);
        let live_workers = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..self.worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let worker_cancel = cancel.clone();
            let live = LiveWorker::register(&live_workers);

            let handle = thread::Builder::new()
                .name(format!("bulkload-worker-{}", worker_id))
                .spawn(move || {
                    let _live = live;
                    run_worker(worker_id, job_rx, result_tx, worker_cancel)
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", self.worker_count);

        Ok(RunningPool {
            job_sender,
            job_receiver,
            result_sender,
            result_receiver,
            workers,
            cancel,
            queue_capacity,
            live_workers,
        })
    }
}

/// A started pool. Consumed by [`RunningPool::wait`].
pub struct RunningPool<T> {
    job_sender: Sender<Job<T>>,
    /// Kept to collect jobs still queued when workers stop on cancellation.
    job_receiver: Receiver<Job<T>>,
    result_sender: Sender<JobResult<T>>,
    result_receiver: Receiver<JobResult<T>>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    queue_capacity: usize,
    /// Workers whose thread is still running, including those unwinding.
    live_workers: Arc<AtomicUsize>,
}

impl<T: Send + 'static> RunningPool<T> {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Enqueues a job, blocking while the queue is full.
    ///
    /// Must not be called from inside a job. If the token fires before the
    /// job is accepted, the job is recorded as cancelled (it still yields a
    /// result from `wait`) and `WorkerError::Cancelled` is returned. If every
    /// worker has died, `WorkerError::ChannelClosed` is returned so the caller
    /// can reach `wait` and see the panic.
    pub fn submit(&self, job: Job<T>) -> Result<(), WorkerError> {
        let mut job = job;
        loop {
            if self.cancel.is_cancelled() {
                let job_id = job.id.clone();
                debug!("Submission of job {} abandoned after cancellation", job_id);
                self.publish(job.into_cancelled())?;
                return Err(WorkerError::Cancelled { job_id });
            }

            match self.job_sender.send_timeout(job, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(pending)) => {
                    // The pool holds a receiver itself, so a pool whose
                    // workers all died never reports a disconnect.
                    if self.live_workers.load(Ordering::SeqCst) == 0 {
                        let job_id = pending.id.clone();
                        error!("No workers left to run job {}", job_id);
                        self.publish(JobResult::failure(job_id, WorkerError::ChannelClosed.into()))?;
                        return Err(WorkerError::ChannelClosed);
                    }
                    job = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(WorkerError::ChannelClosed),
            }
        }
    }

    fn publish(&self, result: JobResult<T>) -> Result<(), WorkerError> {
        self.result_sender
            .send(result)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Closes the queue, waits for every worker and returns all results.
    ///
    /// If a job panicked, the panic is resumed here once all workers have
    /// been joined.
    pub fn wait(self) -> PoolOutput<T> {
        let RunningPool {
            job_sender,
            job_receiver,
            result_sender,
            result_receiver,
            workers,
            ..
        } = self;

        // Drop sender to signal workers to exit once the queue is drained.
        drop(job_sender);

        let mut panic_payload = None;
        for (i, worker) in workers.into_iter().enumerate() {
            match worker.join() {
                Ok(()) => debug!("Worker {} finished", i),
                Err(payload) => {
                    error!("Worker {} panicked", i);
                    panic_payload.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }

        let mut abandoned = 0;
        for job in job_receiver.try_iter() {
            abandoned += 1;
            // The receiver is alive until the end of this function.
            let _ = result_sender.send(job.into_cancelled());
        }
        drop(result_sender);

        let results: Vec<JobResult<T>> = result_receiver.try_iter().collect();
        let output = PoolOutput::from_results(results);

        info!(
            "All workers have stopped: {} results, {} failed, {} never started",
            output.results.len(),
            output.failures.len(),
            abandoned
        );

        output
    }
}

/// Counts a worker as live until its thread exits, by return or by unwind.
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn register(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_worker<T>(
    worker_id: usize,
    job_receiver: Receiver<Job<T>>,
    result_sender: Sender<JobResult<T>>,
    cancel: CancellationToken,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if cancel.is_cancelled() {
            debug!("Worker {} received cancellation", worker_id);
            break;
        }

        match job_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                debug!("Worker {} processing job: {}", worker_id, job.id);
                let result = job.execute(&cancel);

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
