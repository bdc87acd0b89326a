//! Common utilities for integration tests

pub mod mock_solvers;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_solvers::{CountingSolver, FailAt, OwnershipTracker, SeedEcho};
pub use test_helpers::{scalar_problem, seed_values};
