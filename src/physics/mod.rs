//! Physics layer: single-trajectory problems and solvers
//!
//! This module is the boundary between the ensemble engine and the numerics
//! of one trajectory:
//!
//! - **`traits`**: problem definition, the [`TrajectorySolver`] trait, output
//!   samplers and expectation helpers
//! - **`mcwf`**: the reference Monte Carlo wave-function integrator
//!
//! The engine in [`crate::ensemble`] is solver-agnostic: it treats a solver
//! as a pure function `(problem, sampler, seed) → trajectory` and owns all
//! scheduling, streaming, persistence and progress concerns itself.
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::{dmatrix, dvector};
//! use num_complex::Complex;
//! use traj_rs::physics::{McwfSolver, TrajectoryProblem, TrajectorySolver, state_sampler};
//!
//! let one = Complex::new(1.0, 0.0);
//! let zero = Complex::new(0.0, 0.0);
//!
//! let problem = TrajectoryProblem::new(
//!     vec![0.0, 0.5, 1.0],
//!     dvector![zero, one],
//!     dmatrix![zero, zero; zero, zero],
//!     vec![dmatrix![zero, one; zero, zero]],
//! );
//!
//! let solver = McwfSolver::new();
//! let sampler = state_sampler();
//! let trajectory = solver.solve(&problem, &*sampler, 42).unwrap();
//! assert_eq!(trajectory.len(), 3);
//! ```

pub mod mcwf;
pub mod traits;

pub use mcwf::{McwfConfig, McwfSolver};
pub use traits::{
    expectation, expectation_sampler, state_sampler, Amplitude, Operator, SampleFn, SolverError,
    StateVector, Trajectory, TrajectoryProblem, TrajectorySolver,
};
