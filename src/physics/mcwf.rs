//! Monte Carlo wave-function trajectory solver
//!
//! # Mathematical Background
//!
//! The Monte Carlo wave-function (quantum jump) method unravels a Lindblad
//! master equation into an ensemble of stochastic pure-state trajectories.
//! Between jumps the state evolves under the non-Hermitian drift
//!
//! ```text
//! d|ψ⟩/dt = ( -iH - ½ Σₖ γₖ Lₖ†Lₖ ) |ψ⟩
//! ```
//!
//! and at each substep a jump through channel k occurs with probability
//! `γₖ ‖Lₖ|ψ⟩‖² dt`, after which the state collapses to `Lₖ|ψ⟩` and is
//! renormalized. Averaging projectors over many trajectories recovers the
//! density-matrix evolution.
//!
//! # Characteristics
//!
//! - **Order**: first-order in the substep width (forward Euler drift)
//! - **Stability**: conditionally stable; keep `γ·dt` and `‖H‖·dt` small
//! - **Memory**: O(dim²) for the precomputed drift generator
//!
//! This is the reference compute unit shipped with the crate; the ensemble
//! engine accepts any [`TrajectorySolver`], so higher-order integrators can
//! be dropped in without touching the orchestration.

use nalgebra::DVector;
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{
    Amplitude, Operator, SampleFn, SolverError, StateVector, Trajectory, TrajectoryProblem,
    TrajectorySolver,
};

// =================================================================================================
// Configuration
// =================================================================================================

/// Configuration for the MCWF integrator.
#[derive(Debug, Clone, Copy)]
pub struct McwfConfig {
    /// Number of Euler substeps per output-grid interval.
    pub substeps: usize,
}

impl Default for McwfConfig {
    fn default() -> Self {
        Self { substeps: 100 }
    }
}

impl McwfConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.substeps == 0 {
            return Err("substeps must be at least 1".to_string());
        }
        Ok(())
    }
}

// =================================================================================================
// Solver
// =================================================================================================

/// First-order quantum-jump integrator.
///
/// # Example
///
/// ```rust,ignore
/// use traj_rs::physics::{McwfSolver, TrajectorySolver, state_sampler};
///
/// let solver = McwfSolver::new();
/// let sampler = state_sampler();
/// let trajectory = solver.solve(&problem, &*sampler, 42)?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct McwfSolver {
    config: McwfConfig,
}

impl McwfSolver {
    /// Create a solver with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with an explicit configuration.
    pub fn with_config(config: McwfConfig) -> Self {
        Self { config }
    }

    /// Precompute the non-Hermitian drift generator `-iH - ½ Σ γₖ Lₖ†Lₖ`.
    fn drift_generator(problem: &TrajectoryProblem) -> Operator {
        let minus_i = Complex::new(0.0, -1.0);
        let mut generator = &problem.hamiltonian * minus_i;
        for ((op, adj), rate) in problem
            .jump_operators
            .iter()
            .zip(&problem.jump_adjoints)
            .zip(&problem.decay_rates)
        {
            generator -= (adj * op) * Complex::new(0.5 * rate, 0.0);
        }
        generator
    }

    /// Advance the state by one substep of width `dt`, drawing at most one
    /// jump. Returns an error when the state norm collapses to zero.
    fn substep(
        &self,
        problem: &TrajectoryProblem,
        generator: &Operator,
        psi: &mut StateVector,
        weights: &mut Vec<f64>,
        dt: f64,
        rng: &mut StdRng,
    ) -> Result<(), SolverError> {
        weights.clear();
        for (op, rate) in problem.jump_operators.iter().zip(&problem.decay_rates) {
            weights.push(rate * (op * &*psi).norm_squared());
        }
        let total: f64 = weights.iter().sum();
        let jump_probability = total * dt;

        if rng.gen::<f64>() < jump_probability {
            // Jump: pick a channel weighted by γₖ‖Lₖψ‖².
            let mut threshold = rng.gen::<f64>() * total;
            let mut channel = weights.len() - 1;
            for (k, weight) in weights.iter().enumerate() {
                threshold -= weight;
                if threshold <= 0.0 {
                    channel = k;
                    break;
                }
            }
            *psi = &problem.jump_operators[channel] * &*psi;
        } else {
            let delta: DVector<Amplitude> = generator * &*psi;
            *psi += delta * Complex::new(dt, 0.0);
        }

        let norm = psi.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(SolverError::new(
                "state norm collapsed during integration; reduce the substep width",
            ));
        }
        *psi *= Complex::new(1.0 / norm, 0.0);
        Ok(())
    }
}

impl TrajectorySolver for McwfSolver {
    fn solve(
        &self,
        problem: &TrajectoryProblem,
        sampler: &SampleFn,
        seed: u64,
    ) -> Result<Trajectory, SolverError> {
        problem.validate().map_err(SolverError::new)?;
        self.config.validate().map_err(SolverError::new)?;

        let generator = Self::drift_generator(problem);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut psi = problem.initial_state.clone();

        let norm = psi.norm();
        if norm <= f64::EPSILON {
            return Err(SolverError::new("initial state has zero norm"));
        }
        psi *= Complex::new(1.0 / norm, 0.0);

        let mut weights = Vec::with_capacity(problem.jump_operators.len());
        let mut samples = Vec::with_capacity(problem.times.len());
        samples.push(sampler(problem.times[0], &psi));

        for window in problem.times.windows(2) {
            let dt = (window[1] - window[0]) / self.config.substeps as f64;
            for _ in 0..self.config.substeps {
                self.substep(problem, &generator, &mut psi, &mut weights, dt, &mut rng)?;
            }
            samples.push(sampler(window[1], &psi));
        }

        Ok(Trajectory::new(problem.times.clone(), samples))
    }

    fn name(&self) -> &str {
        "MCWF (first-order quantum jump)"
    }
}

// =================================================================================================
// Tests
// =================================================================================================
