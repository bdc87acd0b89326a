//! Trajectory problem types and the solver trait
//!
//! This module defines the seam between the ensemble engine and the
//! numerical integration of a single trajectory:
//! - `TrajectoryProblem`: WHAT one trajectory must simulate
//! - `TrajectorySolver`: trait for anything that can compute one trajectory
//! - `Trajectory`: the time-aligned output of one computed trajectory
//!
//! The engine never looks inside the integration; it only hands a problem,
//! a sampler and a seed to a solver and collects the result.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

// =================================================================================================
// Core Type Aliases
// =================================================================================================

/// Complex amplitude (re + i·im).
pub type Amplitude = Complex<f64>;

/// Pure state vector |ψ⟩ in a finite-dimensional Hilbert space.
pub type StateVector = DVector<Amplitude>;

/// Dense operator acting on a `StateVector` (Hamiltonian, jump operator, ...).
pub type Operator = DMatrix<Amplitude>;

/// Output-sampling callback: maps the transient state at a grid time to the
/// values recorded for that time point.
///
/// The state reference is only valid for the duration of the call; samplers
/// must copy out whatever they want to keep and must not mutate global state.
pub type SampleFn = dyn Fn(f64, &StateVector) -> DVector<Amplitude> + Send + Sync;

// =================================================================================================
// Trajectory (one computed sample path)
// =================================================================================================

/// One complete stochastic sample path, sampled at a fixed time grid.
///
/// `samples[k]` is the sampler output at `times[k]`; all trajectories of one
/// run share an identical time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Time grid the samples are aligned to (echoed from the problem).
    pub times: Vec<f64>,

    /// Sampler output per grid time, in time order.
    pub samples: Vec<DVector<Amplitude>>,
}

impl Trajectory {
    /// Create a trajectory from aligned times and samples.
    pub fn new(times: Vec<f64>, samples: Vec<DVector<Amplitude>>) -> Self {
        Self { times, samples }
    }

    /// Number of recorded time points.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =================================================================================================
// Trajectory Problem (WHAT to simulate)
// =================================================================================================

/// Definition of a single-trajectory simulation problem.
///
/// Immutable once built; the same problem is shared by all N trajectories of
/// an ensemble run, each differing only in its seed.
///
/// # Example
///
/// ```rust
/// use nalgebra::{dmatrix, dvector};
/// use num_complex::Complex;
/// use traj_rs::physics::TrajectoryProblem;
///
/// let one = Complex::new(1.0, 0.0);
/// let zero = Complex::new(0.0, 0.0);
///
/// let problem = TrajectoryProblem::new(
///     vec![0.0, 0.5, 1.0],
///     dvector![zero, one],                      // start in the excited state
///     dmatrix![zero, zero; zero, one],          // H = |e⟩⟨e|
///     vec![dmatrix![zero, one; zero, zero]],    // σ⁻ decay channel
/// )
/// .with_decay_rates(vec![0.2]);
///
/// assert!(problem.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct TrajectoryProblem {
    /// Time grid at which output samples are recorded; strictly increasing.
    pub times: Vec<f64>,

    /// Initial state |ψ(t₀)⟩.
    pub initial_state: StateVector,

    /// System Hamiltonian.
    pub hamiltonian: Operator,

    /// Jump (collapse) operators driving the stochastic process.
    pub jump_operators: Vec<Operator>,

    /// Adjoints of the jump operators; defaults to conjugate transposes.
    pub jump_adjoints: Vec<Operator>,

    /// Decay rate γₖ per jump channel; defaults to 1.0 each.
    pub decay_rates: Vec<f64>,
}

impl TrajectoryProblem {
    /// Create a problem with default adjoints (conjugate transposes of the
    /// jump operators) and unit decay rates.
    pub fn new(
        times: Vec<f64>,
        initial_state: StateVector,
        hamiltonian: Operator,
        jump_operators: Vec<Operator>,
    ) -> Self {
        let jump_adjoints = jump_operators.iter().map(|op| op.adjoint()).collect();
        let decay_rates = vec![1.0; jump_operators.len()];
        Self {
            times,
            initial_state,
            hamiltonian,
            jump_operators,
            jump_adjoints,
            decay_rates,
        }
    }

    /// Builder pattern: override the decay rates.
    pub fn with_decay_rates(mut self, decay_rates: Vec<f64>) -> Self {
        self.decay_rates = decay_rates;
        self
    }

    /// Builder pattern: override the jump adjoints (e.g. precomputed forms
    /// instead of dense conjugate transposes).
    pub fn with_jump_adjoints(mut self, jump_adjoints: Vec<Operator>) -> Self {
        self.jump_adjoints = jump_adjoints;
        self
    }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize {
        self.initial_state.len()
    }

    /// Verify internal consistency: non-empty strictly increasing time grid,
    /// square operators matching the state dimension, one rate and one
    /// adjoint per jump channel.
    pub fn validate(&self) -> Result<(), String> {
        if self.times.len() < 2 {
            return Err("time grid needs at least two points".to_string());
        }
        if self.times.windows(2).any(|w| w[1] <= w[0]) {
            return Err("time grid must be strictly increasing".to_string());
        }

        let dim = self.dim();
        if dim == 0 {
            return Err("initial state is empty".to_string());
        }
        if self.hamiltonian.nrows() != dim || self.hamiltonian.ncols() != dim {
            return Err(format!(
                "Hamiltonian is {}x{} but the state has dimension {}",
                self.hamiltonian.nrows(),
                self.hamiltonian.ncols(),
                dim
            ));
        }
        if self.jump_adjoints.len() != self.jump_operators.len() {
            return Err(format!(
                "{} jump operators but {} adjoints",
                self.jump_operators.len(),
                self.jump_adjoints.len()
            ));
        }
        if self.decay_rates.len() != self.jump_operators.len() {
            return Err(format!(
                "{} jump operators but {} decay rates",
                self.jump_operators.len(),
                self.decay_rates.len()
            ));
        }
        for (k, op) in self.jump_operators.iter().enumerate() {
            if op.nrows() != dim || op.ncols() != dim {
                return Err(format!("jump operator {} does not match dimension {}", k, dim));
            }
        }
        for (k, rate) in self.decay_rates.iter().enumerate() {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(format!("decay rate {} is not finite and non-negative", k));
            }
        }
        Ok(())
    }
}

// =================================================================================================
// Solver Error
// =================================================================================================

/// Failure inside a trajectory compute unit.
///
/// Fatal to the entire ensemble run in every strategy: the engine performs no
/// retry, isolation or partial-result salvage.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SolverError {
    message: String,
}

impl SolverError {
    /// Create an error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =================================================================================================
// Trajectory Solver Trait
// =================================================================================================

/// Trait for anything that can compute one trajectory.
///
/// # Responsibility
///
/// Integrates a single stochastic sample path of `problem` and records the
/// sampler output at every grid time. The solver must be a pure function of
/// its inputs apart from the seed-driven random process, and must not mutate
/// anything it receives: the state handed to the sampler is transient.
///
/// # Contract with the engine
///
/// The ensemble engine calls `solve` once per trajectory, from whatever
/// execution context the selected strategy uses, so implementations must be
/// `Send + Sync` and keep any mutable scratch local to the call.
pub trait TrajectorySolver: Send + Sync {
    /// Compute one trajectory with the given seed.
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError>;

    /// Name of the solver (used for display and logging).
    fn name(&self) -> &str;
}

// =================================================================================================
// Expectation-Value Helpers
// =================================================================================================

/// Expectation value ⟨ψ|O|ψ⟩.
pub fn expectation(op: &Operator, psi: &StateVector) -> Amplitude {
    psi.dotc(&(op * psi))
}

/// Build a sampler recording the expectation value of each given operator.
///
/// The returned sampler yields one amplitude per operator, in order.
pub fn expectation_sampler(ops: Vec<Operator>) -> std::sync::Arc<SampleFn> {
    std::sync::Arc::new(move |_t, psi: &StateVector| {
        DVector::from_iterator(ops.len(), ops.iter().map(|op| expectation(op, psi)))
    })
}

/// Sampler that records the full state vector at every grid time.
pub fn state_sampler() -> std::sync::Arc<SampleFn> {
    std::sync::Arc::new(|_t, psi: &StateVector| psi.clone())
}

// =================================================================================================
// Tests
// =================================================================================================
