//! Integration tests: strategy dispatch across all execution modes
//!
//! These tests run the full engine with deterministic stub solvers and
//! verify the delivery, ordering and failure contracts of each strategy.

use traj_rs::ensemble::{run, EnsembleError, ExecMode, RunRequest};

mod common;
use common::{scalar_problem, seed_values, CountingSolver, FailAt, OwnershipTracker, SeedEcho};

const ALL_MODES: [ExecMode; 5] = [
    ExecMode::Serial,
    ExecMode::SharedPool,
    ExecMode::WorkerMap,
    ExecMode::WorkerDistributed,
    ExecMode::Hybrid,
];

// =================================================================================================
// Delivery Across All Modes
// =================================================================================================

#[test]
fn test_every_mode_delivers_all_trajectories_exactly_once() {
    for mode in ALL_MODES {
        let request = RunRequest::new(scalar_problem(), 10)
            .mode(mode)
            .workers(3)
            .inner_threads(2)
            .seed(100);

        let outcome = run(&request, &SeedEcho).unwrap();
        let trajectories = outcome.trajectories.unwrap();
        assert_eq!(trajectories.len(), 10, "mode {}", mode);

        // Every seed appears exactly once, whatever the arrival order.
        let mut seeds = seed_values(&trajectories);
        seeds.sort_unstable();
        let expected: Vec<u64> = (100..110).collect();
        assert_eq!(seeds, expected, "mode {}", mode);
    }
}

#[test]
fn test_direct_write_modes_preserve_index_order() {
    for mode in [ExecMode::Serial, ExecMode::SharedPool] {
        let request = RunRequest::new(scalar_problem(), 10)
            .mode(mode)
            .workers(4)
            .seed(50);

        let outcome = run(&request, &SeedEcho).unwrap();
        let seeds = seed_values(&outcome.trajectories.unwrap());
        let expected: Vec<u64> = (50..60).collect();
        assert_eq!(seeds, expected, "mode {}", mode);
    }
}

#[test]
fn test_outcome_echoes_time_grid() {
    let request = RunRequest::new(scalar_problem(), 3).mode(ExecMode::WorkerMap);
    let outcome = run(&request, &SeedEcho).unwrap();
    assert_eq!(outcome.times, vec![0.0, 1.0]);
}

// =================================================================================================
// Fast Path and Preconditions
// =================================================================================================

#[test]
fn test_single_trajectory_takes_serial_fast_path() {
    // Requested mode is a streaming strategy, but n == 1 must still run
    // serially and deliver one result.
    let request = RunRequest::new(scalar_problem(), 1)
        .mode(ExecMode::WorkerMap)
        .seed(9);

    let outcome = run(&request, &SeedEcho).unwrap();
    let trajectories = outcome.trajectories.unwrap();
    assert_eq!(trajectories.len(), 1);
    assert_eq!(seed_values(&trajectories), vec![9]);
}

#[test]
fn test_no_output_channel_fails_before_any_compute() {
    let solver = CountingSolver::new();
    let request = RunRequest::new(scalar_problem(), 5).return_results(false);

    let err = run(&request, &solver).unwrap_err();
    assert!(matches!(err, EnsembleError::Config(_)));
    assert_eq!(solver.calls(), 0);
}

#[test]
fn test_unrecognized_mode_name_rejected_before_dispatch() {
    let err = "greenlet-pool".parse::<ExecMode>().unwrap_err();
    assert!(matches!(err, EnsembleError::InvalidMode(_)));
}

#[test]
fn test_worker_count_clamped_to_trajectory_count() {
    // More workers than trajectories must not panic the partition or
    // produce duplicates.
    for mode in ALL_MODES {
        let request = RunRequest::new(scalar_problem(), 3)
            .mode(mode)
            .workers(16)
            .seed(0);

        let outcome = run(&request, &SeedEcho).unwrap();
        let mut seeds = seed_values(&outcome.trajectories.unwrap());
        seeds.sort_unstable();
        assert_eq!(seeds, vec![0, 1, 2], "mode {}", mode);
    }
}

// =================================================================================================
// Shared-Pool Disjointness
// =================================================================================================

#[test]
fn test_shared_pool_each_index_owned_by_exactly_one_worker() {
    let tracker = OwnershipTracker::new(1000, 100);
    let request = RunRequest::new(scalar_problem(), 100)
        .mode(ExecMode::SharedPool)
        .workers(8)
        .seed(1000);

    let outcome = run(&request, &tracker).unwrap();
    assert_eq!(outcome.trajectories.unwrap().len(), 100);
    assert!(
        tracker.counts().iter().all(|&count| count == 1),
        "every index must be computed exactly once"
    );
}

// =================================================================================================
// Hybrid Fold Grouping
// =================================================================================================

#[test]
fn test_hybrid_arrivals_are_grouped_by_fold_in_fold_order() {
    let n = 20;
    let outer_workers = 4;
    let fold_len = 5; // ceil(20 / 4)

    let request = RunRequest::new(scalar_problem(), n)
        .mode(ExecMode::Hybrid)
        .workers(outer_workers)
        .inner_threads(4)
        .seed(0);

    let outcome = run(&request, &SeedEcho).unwrap();
    let origins = seed_values(&outcome.trajectories.unwrap());
    assert_eq!(origins.len(), n);

    // Each worker flushes its complete fold as one ordered burst, so the
    // arrival sequence must consist of 4 blocks of 5, each block holding
    // one fold's indices in increasing order.
    for block in origins.chunks(fold_len) {
        let fold_id = block[0] / fold_len as u64;
        let expected: Vec<u64> =
            (fold_id * fold_len as u64..(fold_id + 1) * fold_len as u64).collect();
        assert_eq!(block, expected.as_slice(), "arrivals {:?}", origins);
    }
}

// =================================================================================================
// Failure Semantics
// =================================================================================================

#[test]
fn test_compute_failure_is_fatal_in_every_mode() {
    for mode in ALL_MODES {
        let request = RunRequest::new(scalar_problem(), 10)
            .mode(mode)
            .workers(3)
            .inner_threads(2)
            .seed(0);

        let err = run(&request, &FailAt { fail_seed: 4 }).unwrap_err();
        match err {
            EnsembleError::Compute { index, .. } => {
                assert_eq!(index, 5, "mode {}: 0-based index 4 is trajectory 5", mode)
            }
            other => panic!("mode {}: expected Compute error, got {}", mode, other),
        }
    }
}
