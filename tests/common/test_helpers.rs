//! Shared fixtures and assertions for integration tests

use nalgebra::{dmatrix, dvector};
use num_complex::Complex;
use traj_rs::physics::{Trajectory, TrajectoryProblem};

/// Minimal valid one-dimensional problem for stub solvers that never look
/// at the operators.
pub fn scalar_problem() -> TrajectoryProblem {
    let one = Complex::new(1.0, 0.0);
    let zero = Complex::new(0.0, 0.0);
    TrajectoryProblem::new(vec![0.0, 1.0], dvector![one], dmatrix![zero], Vec::new())
}

/// Recover the seed each [`super::SeedEcho`] trajectory was computed with.
pub fn seed_values(trajectories: &[Trajectory]) -> Vec<u64> {
    trajectories
        .iter()
        .map(|trajectory| trajectory.samples[0][0].re as u64)
        .collect()
}
