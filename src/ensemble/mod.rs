//! Ensemble engine: orchestration, aggregation, persistence, progress
//!
//! This module is the core of the crate. It runs N independent stochastic
//! trajectories across parallel execution contexts, streams completions
//! through a single aggregation point, persists them incrementally and
//! reports progress, while keeping memory bounded and dataset writes
//! race-free by construction rather than by locking.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────────────┐
//! │ RunRequest  │────▶│ Dispatcher (validate, │
//! │ (immutable) │     │ select strategy)      │
//! └─────────────┘     └──────────┬────────────┘
//!                                │
//!            ┌───────────────────┼─────────────────────┐
//!            │ serial /          │ worker-map /         │
//!            │ shared-pool       │ worker-distributed / │
//!            │ (direct writes)   │ hybrid (streaming)   │
//!            ▼                   ▼                      │
//!    ┌───────────────┐   ┌───────────────────┐          │
//!    │ pre-sized     │   │ bounded completion│◀─ workers┘
//!    │ result array  │   │ channel (MPSC)    │
//!    └───────┬───────┘   └─────────┬─────────┘
//!            │                     ▼
//!            │           ┌───────────────────┐
//!            │           │ Streaming         │
//!            │           │ Aggregator        │
//!            ▼           └─────────┬─────────┘
//!    ┌─────────────────────────────┴────────┐
//!    │ Progress Reporter + Persistence Sink │
//!    └──────────────────────────────────────┘
//! ```
//!
//! # Concurrency discipline
//!
//! - The shared result array (shared-pool strategy) is pre-sized before the
//!   parallel loop and every index is written by exactly one worker; the
//!   disjointness is the safety argument, no locks are involved.
//! - The dataset file has exactly one writer at all times: the serial loop,
//!   the post-loop flush of the shared-pool strategy, or the aggregator.
//! - Streaming workers share no result memory and communicate solely
//!   through the bounded many-producer/single-consumer channel.
//! - Delivery is exactly-once in every strategy: each trajectory index is
//!   computed once and either lands in its own slot or is pushed onto the
//!   channel once, and the aggregator consumes exactly N items.
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
//! let problem = TrajectoryProblem::new(
//!     vec![0.0, 0.5, 1.0],
//!     dvector![zero, one],
//!     dmatrix![zero, zero; zero, zero],
//!     vec![dmatrix![zero, one; zero, zero]],
//! );
//!
//! let request = RunRequest::new(problem, 16)
//!     .mode(ExecMode::SharedPool)
//!     .workers(4)
//!     .seed(42);
//!
//! let outcome = run(&request, &McwfSolver::new()).unwrap();
//! assert_eq!(outcome.trajectories.unwrap().len(), 16);
//! ```

mod aggregator;
mod batch;
mod dispatch;
mod error;
mod progress;
mod sink;

pub use batch::partition;
pub use dispatch::{run, EnsembleOutcome, ExecMode, RunRequest};
pub use error::EnsembleError;
pub use progress::ProgressReporter;
pub use sink::{read_dataset, Dataset, TrajectorySink};
