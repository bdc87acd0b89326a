//! Strategy selection and ensemble dispatch
//!
//! `run()` is the public surface of the engine: it validates a
//! [`RunRequest`] before any work begins, selects one of five execution
//! strategies, wires workers to the streaming aggregator where the strategy
//! calls for it, and returns the ordered result collection.
//!
//! # Strategies
//!
//! | Mode                | Parallelism            | Result routing          |
//! |---------------------|------------------------|-------------------------|
//! | `Serial`            | none                   | direct writes           |
//! | `SharedPool`        | rayon threads          | direct disjoint writes  |
//! | `WorkerMap`         | threads over folds     | completion channel      |
//! | `WorkerDistributed` | threads over a cursor  | completion channel      |
//! | `Hybrid`            | threads × rayon        | fold-grouped channel    |
//!
//! The shared-memory strategies write each trajectory into a pre-sized slot
//! owned by exactly one worker, so no locking is needed by construction. The
//! streaming strategies share no result memory at all: workers communicate
//! with the single aggregator exclusively through a bounded completion
//! channel, which also bounds peak memory when producers outrun the
//! consumer.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::aggregator::{self, CompletedBatch, CompletedTrajectory};
use super::batch::partition;
use super::error::EnsembleError;
use super::progress::ProgressReporter;
use super::sink::TrajectorySink;
use crate::physics::{state_sampler, SampleFn, Trajectory, TrajectoryProblem, TrajectorySolver};

/// Default bound of the completion channel.
///
/// An unbounded buffer would let memory grow without limit when the
/// aggregator lags behind the producers; the bound introduces backpressure
/// instead and is configurable per run.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// =================================================================================================
// Execution Mode
// =================================================================================================

/// The closed set of execution strategies.
///
/// Dispatch is an exhaustive match over this enum, validated once before any
/// computation; unrecognized mode *names* are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    /// Single-threaded loop; also the forced fast path for `n == 1`.
    Serial,

    /// Parallel iterations on a shared-memory thread pool with
    /// disjoint-index writes into a pre-sized result array.
    SharedPool,

    /// Independent workers over precomputed folds, streaming each finished
    /// trajectory through the completion channel.
    WorkerMap,

    /// Independent workers pulling indices from a shared cursor, streaming
    /// through the completion channel; batching granularity is implicit.
    WorkerDistributed,

    /// Two-level parallelism: fold-per-worker outside, a private thread
    /// pool inside, flushing each fold as one ordered burst.
    Hybrid,
}

impl ExecMode {
    /// Canonical name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Serial => "serial",
            ExecMode::SharedPool => "shared-pool",
            ExecMode::WorkerMap => "worker-map",
            ExecMode::WorkerDistributed => "worker-distributed",
            ExecMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecMode {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(ExecMode::Serial),
            "shared-pool" => Ok(ExecMode::SharedPool),
            "worker-map" => Ok(ExecMode::WorkerMap),
            "worker-distributed" => Ok(ExecMode::WorkerDistributed),
            "hybrid" => Ok(ExecMode::Hybrid),
            other => Err(EnsembleError::InvalidMode(other.to_string())),
        }
    }
}

// =================================================================================================
// Run Request
// =================================================================================================

/// Immutable description of one ensemble run.
///
/// Created once per run and never mutated afterwards. The degree of
/// parallelism is an explicit field fixed at construction (defaulting to the
/// machine's available parallelism), not hidden global state, and cannot be
/// reconfigured mid-run.
///
/// # Example
///
/// ```rust,ignore
/// use traj_rs::ensemble::{run, ExecMode, RunRequest};
///
/// let request = RunRequest::new(problem, 1000)
///     .mode(ExecMode::WorkerMap)
///     .workers(8)
///     .seed(42)
///     .persist("runs/decay.jsonl")
///     .metadata("gamma", serde_json::json!(0.5));
///
/// let outcome = run(&request, &solver)?;
/// ```
pub struct RunRequest {
    /// Problem shared by all trajectories.
    pub problem: TrajectoryProblem,

    /// Output-sampling function applied at every grid time.
    pub sampler: Arc<SampleFn>,

    /// Number of trajectories N.
    pub trajectories: usize,

    /// Worker count W; clamped to N at dispatch so the partition never sees
    /// an oversubscribed range.
    pub workers: usize,

    /// Threads of each worker's private pool in hybrid mode.
    pub inner_threads: usize,

    /// Requested execution strategy.
    pub mode: ExecMode,

    /// Base seed; trajectory `i` (0-based) runs with `seed + i`.
    pub seed: u64,

    /// Keep the ordered result collection in memory.
    pub return_results: bool,

    /// Persist incrementally to this dataset path.
    pub persist_path: Option<PathBuf>,

    /// Caller-supplied metadata, written before any trajectory entry.
    pub metadata: Vec<(String, serde_json::Value)>,

    /// Render a progress bar.
    pub show_progress: bool,

    /// Capacity of the bounded completion channel.
    pub channel_capacity: usize,
}

impl RunRequest {
    /// Create a request with defaults: serial mode, ambient worker count,
    /// base seed 0, results returned in memory, no persistence, hidden
    /// progress, full-state sampler.
    pub fn new(problem: TrajectoryProblem, trajectories: usize) -> Self {
        let ambient = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            problem,
            sampler: state_sampler(),
            trajectories,
            workers: ambient,
            inner_threads: ambient,
            mode: ExecMode::Serial,
            seed: 0,
            return_results: true,
            persist_path: None,
            metadata: Vec::new(),
            show_progress: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Builder pattern: set the execution mode.
    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder pattern: set the worker count.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder pattern: set the hybrid inner thread count.
    pub fn inner_threads(mut self, inner_threads: usize) -> Self {
        self.inner_threads = inner_threads;
        self
    }

    /// Builder pattern: set the base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder pattern: set the output sampler.
    pub fn sampler(mut self, sampler: Arc<SampleFn>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder pattern: choose whether results are kept in memory.
    pub fn return_results(mut self, return_results: bool) -> Self {
        self.return_results = return_results;
        self
    }

    /// Builder pattern: persist to the given dataset path.
    pub fn persist(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    /// Builder pattern: append one metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.push((key.into(), value));
        self
    }

    /// Builder pattern: render a progress bar.
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Builder pattern: set the completion-channel capacity.
    pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Seed for the 0-based trajectory `index`.
    fn seed_for(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }

    /// Fail fast on requests that could never produce a usable run.
    fn validate(&self) -> Result<(), EnsembleError> {
        if self.trajectories == 0 {
            return Err(EnsembleError::Config(
                "trajectory count must be at least 1".to_string(),
            ));
        }
        if !self.return_results && self.persist_path.is_none() {
            return Err(EnsembleError::Config(
                "run requests neither in-memory results nor persistence".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(EnsembleError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.inner_threads == 0 {
            return Err(EnsembleError::Config(
                "inner thread count must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(EnsembleError::Config(
                "completion channel capacity must be at least 1".to_string(),
            ));
        }
        self.problem.validate().map_err(EnsembleError::Config)
    }
}

// =================================================================================================
// Outcome
// =================================================================================================

/// Result of a successful ensemble run.
#[derive(Debug)]
pub struct EnsembleOutcome {
    /// The shared time grid all trajectories were sampled on.
    pub times: Vec<f64>,

    /// The ordered result collection, when requested. Index order for the
    /// serial and shared-pool strategies; arrival order for the streaming
    /// strategies.
    pub trajectories: Option<Vec<Trajectory>>,
}

// =================================================================================================
// Dispatch
// =================================================================================================

/// Run one trajectory ensemble.
///
/// Validates the request, opens the persistence sink (writing metadata
/// before any computation), selects the strategy and executes it. `n == 1`
/// or [`ExecMode::Serial`] always takes the serial fast path regardless of
/// the requested mode.
///
/// Any solver failure is fatal to the whole run; in the streaming strategies
/// it surfaces when the aggregator is awaited, possibly after other workers
/// have produced and persisted partial output.
pub fn run(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
) -> Result<EnsembleOutcome, EnsembleError> {
    request.validate()?;

    let n = request.trajectories;
    let workers = request.workers.min(n);
    let strategy = if n == 1 { ExecMode::Serial } else { request.mode };

    let progress = ProgressReporter::new(n, request.show_progress);
    let sink = open_sink(request)?;

    log::info!(
        "dispatching {} trajectories via {} ({} workers, solver '{}')",
        n,
        strategy,
        workers,
        solver.name()
    );

    let trajectories = match strategy {
        ExecMode::Serial => run_serial(request, solver, sink, &progress),
        ExecMode::SharedPool => run_shared_pool(request, solver, sink, &progress, workers),
        ExecMode::WorkerMap => {
            run_streaming(request, solver, sink, &progress, workers, Assignment::Folds)
        }
        ExecMode::WorkerDistributed => {
            run_streaming(request, solver, sink, &progress, workers, Assignment::Cursor)
        }
        ExecMode::Hybrid => run_hybrid(request, solver, sink, &progress, workers),
    }?;

    Ok(EnsembleOutcome {
        times: request.problem.times.clone(),
        trajectories,
    })
}

/// Open the sink (when persistence is requested) and write all caller
/// metadata before any trajectory is computed.
fn open_sink(request: &RunRequest) -> Result<Option<TrajectorySink>, EnsembleError> {
    let Some(path) = &request.persist_path else {
        return Ok(None);
    };
    let mut sink = TrajectorySink::create(path)?;
    for (key, value) in &request.metadata {
        sink.write_meta(key, value)?;
    }
    Ok(Some(sink))
}

// =================================================================================================
// Serial Strategy
// =================================================================================================

/// One thread, no channel: compute, persist and count each trajectory in
/// index order.
fn run_serial(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
    mut sink: Option<TrajectorySink>,
    progress: &ProgressReporter,
) -> Result<Option<Vec<Trajectory>>, EnsembleError> {
    let n = request.trajectories;
    let mut collected = request.return_results.then(|| Vec::with_capacity(n));

    for index in 0..n {
        let trajectory = solver
            .solve(&request.problem, &*request.sampler, request.seed_for(index))
            .map_err(|source| EnsembleError::Compute {
                index: index + 1,
                source,
            })?;

        if let Some(sink) = sink.as_mut() {
            if index == 0 {
                sink.write_time_grid(&trajectory.times)?;
            }
            sink.write_trajectory(index + 1, &trajectory)?;
        }
        if let Some(collected) = collected.as_mut() {
            collected.push(trajectory);
        }
        progress.advance();
    }

    progress.finish();
    if let Some(sink) = sink {
        sink.close()?;
    }
    Ok(collected)
}

// =================================================================================================
// Shared-Pool Strategy
// =================================================================================================

/// Parallel iterations on a dedicated rayon pool. Each worker writes into
/// its own slot of the pre-sized result array: target indices are disjoint,
/// so no synchronization guards the writes. Persistence happens after the
/// loop, from the calling thread, preserving the single-writer discipline.
fn run_shared_pool(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
    sink: Option<TrajectorySink>,
    progress: &ProgressReporter,
    workers: usize,
) -> Result<Option<Vec<Trajectory>>, EnsembleError> {
    let n = request.trajectories;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("traj-worker-{}", i))
        .build()
        .map_err(|e| EnsembleError::Config(format!("failed to build thread pool: {}", e)))?;

    let mut slots: Vec<Option<Trajectory>> = std::iter::repeat_with(|| None).take(n).collect();
    pool.install(|| {
        slots
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(index, slot)| {
                let trajectory = solver
                    .solve(&request.problem, &*request.sampler, request.seed_for(index))
                    .map_err(|source| EnsembleError::Compute {
                        index: index + 1,
                        source,
                    })?;
                *slot = Some(trajectory);
                progress.advance();
                Ok::<(), EnsembleError>(())
            })
    })?;

    // Unconditional flush: pending increments may have raced, the final
    // value must still be n.
    progress.finish();

    let results: Vec<Trajectory> = slots.into_iter().flatten().collect();
    assert_eq!(results.len(), n, "every slot must be filled exactly once");

    if let Some(mut sink) = sink {
        sink.write_time_grid(&results[0].times)?;
        for (index, trajectory) in results.iter().enumerate() {
            sink.write_trajectory(index + 1, trajectory)?;
        }
        sink.close()?;
    }
    Ok(request.return_results.then_some(results))
}

// =================================================================================================
// Streaming Strategies (worker-map / worker-distributed)
// =================================================================================================

/// How streaming workers obtain their trajectory indices.
enum Assignment {
    /// Precomputed contiguous folds, one per worker.
    Folds,
    /// A shared atomic cursor; granularity is one index at a time.
    Cursor,
}

/// Workers share no result memory: each finished trajectory is pushed onto
/// the bounded completion channel as soon as it is ready, and the single
/// aggregator drains exactly `n` of them.
fn run_streaming(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
    sink: Option<TrajectorySink>,
    progress: &ProgressReporter,
    workers: usize,
    assignment: Assignment,
) -> Result<Option<Vec<Trajectory>>, EnsembleError> {
    let n = request.trajectories;
    let want_results = request.return_results;
    let (sender, receiver) = crossbeam_channel::bounded(request.channel_capacity);
    let cursor = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        let aggregator =
            scope.spawn(move || aggregator::drain(receiver, n, sink, progress, want_results));

        match assignment {
            Assignment::Folds => {
                for fold in partition(n, workers) {
                    let sender = sender.clone();
                    scope.spawn(move || {
                        for index in fold {
                            if !produce(request, solver, index, &sender) {
                                break;
                            }
                        }
                    });
                }
            }
            Assignment::Cursor => {
                let cursor = &cursor;
                for _ in 0..workers {
                    let sender = sender.clone();
                    scope.spawn(move || loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        if index >= n || !produce(request, solver, index, &sender) {
                            break;
                        }
                    });
                }
            }
        }
        drop(sender);

        match aggregator.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

/// Compute one trajectory and push it onto the completion channel as a
/// singleton batch. Returns false when the worker should stop: either its
/// own solve failed (fatal to the run) or the aggregator has gone away.
fn produce(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
    index: usize,
    sender: &crossbeam_channel::Sender<CompletedBatch>,
) -> bool {
    let outcome = solver.solve(&request.problem, &*request.sampler, request.seed_for(index));
    let failed = outcome.is_err();
    let delivered = sender
        .send(vec![CompletedTrajectory {
            origin: index + 1,
            outcome,
        }])
        .is_ok();
    delivered && !failed
}

// =================================================================================================
// Hybrid Strategy
// =================================================================================================

/// Two-level parallelism: each outer worker owns one fold, computes it in
/// parallel on a private pool into a fold-local buffer (disjoint writes,
/// scoped to that buffer), then flushes the whole fold in index order onto
/// the channel. Streaming granularity is traded for intra-fold speedup: the
/// aggregator sees fold-grouped bursts.
fn run_hybrid(
    request: &RunRequest,
    solver: &dyn TrajectorySolver,
    sink: Option<TrajectorySink>,
    progress: &ProgressReporter,
    workers: usize,
) -> Result<Option<Vec<Trajectory>>, EnsembleError> {
    let n = request.trajectories;
    let want_results = request.return_results;
    let inner_threads = request.inner_threads;
    let (sender, receiver) = crossbeam_channel::bounded(request.channel_capacity);

    std::thread::scope(|scope| {
        let aggregator =
            scope.spawn(move || aggregator::drain(receiver, n, sink, progress, want_results));

        for fold in partition(n, workers) {
            let sender = sender.clone();
            scope.spawn(move || {
                let pool = match rayon::ThreadPoolBuilder::new()
                    .num_threads(inner_threads)
                    .build()
                {
                    Ok(pool) => pool,
                    Err(e) => {
                        let _ = sender.send(vec![CompletedTrajectory {
                            origin: fold.start + 1,
                            outcome: Err(crate::physics::SolverError::new(format!(
                                "failed to build inner thread pool: {}",
                                e
                            ))),
                        }]);
                        return;
                    }
                };

                let buffer: Result<Vec<(usize, Trajectory)>, (usize, crate::physics::SolverError)> =
                    pool.install(|| {
                        fold.clone()
                            .into_par_iter()
                            .map(|index| {
                                solver
                                    .solve(
                                        &request.problem,
                                        &*request.sampler,
                                        request.seed_for(index),
                                    )
                                    .map(|trajectory| (index, trajectory))
                                    .map_err(|source| (index, source))
                            })
                            .collect()
                    });

                // Flush the complete fold (or its failure) as one message;
                // per-item sends from concurrent workers could interleave
                // mid-fold and lose the grouping guarantee.
                match buffer {
                    Ok(items) => {
                        let batch: CompletedBatch = items
                            .into_iter()
                            .map(|(index, trajectory)| CompletedTrajectory {
                                origin: index + 1,
                                outcome: Ok(trajectory),
                            })
                            .collect();
                        let _ = sender.send(batch);
                    }
                    Err((index, source)) => {
                        let _ = sender.send(vec![CompletedTrajectory {
                            origin: index + 1,
                            outcome: Err(source),
                        }]);
                    }
                }
            });
        }
        drop(sender);

        match aggregator.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

// =================================================================================================
// Tests
// =================================================================================================
