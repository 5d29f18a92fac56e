pub mod job;
pub mod pool;

pub use job::{Job, JobFailure, JobResult, PoolOutput};
pub use pool::{RunningPool, WorkerPool};
