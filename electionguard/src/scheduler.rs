use rayon::prelude::*;

/// How a batch of independent tasks is run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Parallel
    }
}

/// Runs batches of independent computations.
///
/// Results come back in input order regardless of the execution mode.
pub trait Scheduler {
    fn schedule<T, U, F>(&self, tasks: Vec<T>, f: F, mode: ExecutionMode) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send;
}

/// A [`Scheduler`] backed by the global rayon thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct RayonScheduler;

impl Scheduler for RayonScheduler {
    fn schedule<T, U, F>(&self, tasks: Vec<T>, f: F, mode: ExecutionMode) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        match mode {
            ExecutionMode::Sequential => tasks.into_iter().map(f).collect(),
            ExecutionMode::Parallel => tasks.into_par_iter().map(f).collect(),
        }
    }
}
