//! traj-rs: Stochastic Trajectory Ensemble Framework
//!
//! A framework for running large ensembles of independent, stochastic
//! simulation trajectories across parallel execution contexts, streaming
//! completed trajectories through a single aggregation point, persisting
//! them incrementally and reporting progress.
//!
//! # Architecture
//!
//! traj-rs is built on two core principles:
//!
//! 1. **Separation of Orchestration and Numerics**
//!    - The ensemble engine decides WHERE and WHEN trajectories run
//!    - A trajectory solver decides HOW one trajectory is integrated
//!
//! 2. **Safety by Construction**
//!    - Shared-memory strategies write disjoint indices, never sharing a slot
//!    - Streaming strategies share no memory at all, only a bounded channel
//!    - The dataset has exactly one writer at every moment of a run
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::{dmatrix, dvector};
//! use num_complex::Complex;
//! use traj_rs::ensemble::{run, ExecMode, RunRequest};
//! use traj_rs::physics::{McwfSolver, TrajectoryProblem};
//!
//! let one = Complex::new(1.0, 0.0);
//! let zero = Complex::new(0.0, 0.0);
//!
//! // 1. Define the problem: a decaying two-level system
//! let problem = TrajectoryProblem::new(
//!     vec![0.0, 0.5, 1.0],                   // time grid
//!     dvector![zero, one],                   // start excited
//!     dmatrix![zero, zero; zero, zero],      // H = 0
//!     vec![dmatrix![zero, one; zero, zero]], // σ⁻ decay channel
//! );
//!
//! // 2. Describe the run
//! let request = RunRequest::new(problem, 32)
//!     .mode(ExecMode::WorkerMap)
//!     .workers(4)
//!     .seed(7);
//!
//! // 3. Run the ensemble
//! let outcome = run(&request, &McwfSolver::new()).unwrap();
//! assert_eq!(outcome.trajectories.unwrap().len(), 32);
//! ```
//!
//! # Modules
//!
//! - **`physics`**: trajectory problems, the solver trait, the reference
//!   MCWF integrator, samplers and expectation helpers
//! - **`ensemble`**: the orchestration engine: strategy dispatch, work
//!   batching, streaming aggregation, progress reporting and dataset
//!   persistence

pub mod ensemble;
pub mod physics;

pub use ensemble::{run, EnsembleError, EnsembleOutcome, ExecMode, RunRequest};
pub use physics::{McwfSolver, Trajectory, TrajectoryProblem, TrajectorySolver};
