//! Mock trajectory solvers for exercising the ensemble engine

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use nalgebra::dvector;
use num_complex::Complex;
use traj_rs::physics::{SampleFn, SolverError, Trajectory, TrajectoryProblem, TrajectorySolver};

/// Deterministic stub: every grid time carries the single sample `[seed]`,
/// so tests can recover which seed (and therefore which index) produced a
/// trajectory.
pub struct SeedEcho;

impl TrajectorySolver for SeedEcho {
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        _sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError> {
        let samples = problem
            .times
            .iter()
            .map(|_| dvector![Complex::new(seed as f64, 0.0)])
            .collect();
        Ok(Trajectory::new(problem.times.clone(), samples))
    }

    fn name(&self) -> &str {
        "seed echo"
    }
}

/// Wrapper counting how many trajectories were actually computed; used to
/// prove that precondition failures happen before any computation starts.
#[derive(Default)]
pub struct CountingSolver {
    calls: AtomicUsize,
}

impl CountingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TrajectorySolver for CountingSolver {
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SeedEcho.solve(problem, sampler, seed)
    }

    fn name(&self) -> &str {
        "counting seed echo"
    }
}

/// Index-ownership tracking wrapper: records how many times each trajectory
/// index was computed, to prove disjointness of the shared-pool writes.
pub struct OwnershipTracker {
    base_seed: u64,
    counts: Mutex<Vec<usize>>,
}

impl OwnershipTracker {
    pub fn new(base_seed: u64, trajectories: usize) -> Self {
        Self {
            base_seed,
            counts: Mutex::new(vec![0; trajectories]),
        }
    }

    pub fn counts(&self) -> Vec<usize> {
        self.counts.lock().unwrap().clone()
    }
}

impl TrajectorySolver for OwnershipTracker {
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError> {
        let index = (seed - self.base_seed) as usize;
        self.counts.lock().unwrap()[index] += 1;
        SeedEcho.solve(problem, sampler, seed)
    }

    fn name(&self) -> &str {
        "ownership tracker"
    }
}

/// Fails for exactly one seed, succeeds for all others.
pub struct FailAt {
    pub fail_seed: u64,
}

impl TrajectorySolver for FailAt {
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError> {
        if seed == self.fail_seed {
            Err(SolverError::new(format!("injected failure at seed {}", seed)))
        } else {
            SeedEcho.solve(problem, sampler, seed)
        }
    }

    fn name(&self) -> &str {
        "failing seed echo"
    }
}
