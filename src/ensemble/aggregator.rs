//! Streaming single-consumer aggregation of completed trajectories
//!
//! The aggregator is the only consumer of the completion channel and the
//! only writer of the dataset while a streaming strategy runs. It consumes
//! exactly N items in arrival order, interleaving I/O-bound persistence with
//! the workers' compute-bound production so that peak memory stays bounded
//! by the channel capacity plus whatever has not been flushed yet.
//!
//! Persisted entries are keyed by arrival sequence number, not by the
//! originating trajectory index: when folds interleave, `trajs/3` is the
//! third trajectory to *finish*, not trajectory 3. Callers who need origin
//! indices should encode them in their output sampler.

use crossbeam_channel::Receiver;

use super::error::EnsembleError;
use super::progress::ProgressReporter;
use super::sink::TrajectorySink;
use crate::physics::{SolverError, Trajectory};

/// One record on the completion channel: a finished (or failed) trajectory
/// tagged with its originating 1-based index.
pub(crate) struct CompletedTrajectory {
    pub origin: usize,
    pub outcome: Result<Trajectory, SolverError>,
}

/// One channel message. The per-trajectory streaming strategies send
/// singleton batches; the hybrid strategy flushes a whole fold as one batch,
/// which is what makes fold-grouped arrival a guarantee rather than a race.
pub(crate) type CompletedBatch = Vec<CompletedTrajectory>;

/// Drain exactly `expected` trajectories from the completion channel.
///
/// On the first item the shared time grid is written once (all trajectories
/// are assumed to share an identical grid; this is not checked). Per item:
/// persist under the arrival-sequence key, append to the in-memory
/// collection, advance progress. After the last item the progress reporter
/// is finalized and the sink is closed.
///
/// A compute failure aborts aggregation immediately: the error is returned,
/// progress stays non-finalized and the sink is dropped without close, so
/// the partial dataset reflects exactly what was flushed before the failure.
pub(crate) fn drain(
    receiver: Receiver<CompletedBatch>,
    expected: usize,
    mut sink: Option<TrajectorySink>,
    progress: &ProgressReporter,
    collect: bool,
) -> Result<Option<Vec<Trajectory>>, EnsembleError> {
    let mut collected = collect.then(|| Vec::with_capacity(expected));
    let mut sequence = 0usize;

    while sequence < expected {
        let batch = receiver
            .recv()
            .map_err(|_| EnsembleError::ChannelClosed {
                received: sequence,
                expected,
            })?;

        for item in batch {
            sequence += 1;
            assert!(
                sequence <= expected,
                "producers delivered more than {} trajectories",
                expected
            );
            let trajectory = item.outcome.map_err(|source| EnsembleError::Compute {
                index: item.origin,
                source,
            })?;

            if let Some(sink) = sink.as_mut() {
                if sequence == 1 {
                    sink.write_time_grid(&trajectory.times)?;
                }
                sink.write_trajectory(sequence, &trajectory)?;
            }
            if let Some(collected) = collected.as_mut() {
                collected.push(trajectory);
            }
            progress.advance();
        }
    }

    progress.finish();
    if let Some(sink) = sink.take() {
        sink.close()?;
    }
    log::debug!("aggregator consumed {} trajectories", expected);
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use nalgebra::dvector;
    use num_complex::Complex;

    fn trajectory(tag: f64) -> Trajectory {
        Trajectory::new(vec![0.0, 1.0], vec![
            dvector![Complex::new(tag, 0.0)],
            dvector![Complex::new(tag, 0.0)],
        ])
    }

    #[test]
    fn test_consumes_exactly_expected_in_arrival_order() {
        let (sender, receiver) = bounded(8);
        for origin in [3usize, 1, 2] {
            sender
                .send(vec![CompletedTrajectory {
                    origin,
                    outcome: Ok(trajectory(origin as f64)),
                }])
                .unwrap();
        }
        drop(sender);

        let progress = ProgressReporter::new(3, false);
        let collected = drain(receiver, 3, None, &progress, true)
            .unwrap()
            .unwrap();

        // Arrival order, not origin order.
        let tags: Vec<f64> = collected.iter().map(|t| t.samples[0][0].re).collect();
        assert_eq!(tags, vec![3.0, 1.0, 2.0]);
        assert!(progress.is_finalized());
    }

    #[test]
    fn test_failure_aborts_and_leaves_progress_open() {
        let (sender, receiver) = bounded(8);
        sender
            .send(vec![CompletedTrajectory {
                origin: 1,
                outcome: Ok(trajectory(1.0)),
            }])
            .unwrap();
        sender
            .send(vec![CompletedTrajectory {
                origin: 2,
                outcome: Err(SolverError::new("boom")),
            }])
            .unwrap();
        drop(sender);

        let progress = ProgressReporter::new(2, false);
        let err = drain(receiver, 2, None, &progress, true).unwrap_err();
        assert!(matches!(err, EnsembleError::Compute { index: 2, .. }));
        assert!(!progress.is_finalized());
        assert_eq!(progress.completed(), 1);
    }

    #[test]
    fn test_early_disconnect_is_reported() {
        let (sender, receiver) = bounded(8);
        sender
            .send(vec![CompletedTrajectory {
                origin: 1,
                outcome: Ok(trajectory(1.0)),
            }])
            .unwrap();
        drop(sender);

        let progress = ProgressReporter::new(5, false);
        let err = drain(receiver, 5, None, &progress, false).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::ChannelClosed {
                received: 1,
                expected: 5
            }
        ));
    }

    #[test]
    fn test_persists_time_grid_once_and_keys_by_arrival() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let sink = TrajectorySink::create(&path).unwrap();

        // One fold-style batch carrying both trajectories.
        let (sender, receiver) = bounded(8);
        sender
            .send(vec![
                CompletedTrajectory {
                    origin: 2,
                    outcome: Ok(trajectory(2.0)),
                },
                CompletedTrajectory {
                    origin: 1,
                    outcome: Ok(trajectory(1.0)),
                },
            ])
            .unwrap();
        drop(sender);

        let progress = ProgressReporter::new(2, false);
        drain(receiver, 2, Some(sink), &progress, false).unwrap();

        let dataset = super::super::sink::read_dataset(&path).unwrap();
        assert_eq!(dataset.time_grid, Some(vec![0.0, 1.0]));
        assert_eq!(dataset.trajectories.len(), 2);
        // trajs/1 is the first arrival (origin 2).
        assert_eq!(dataset.trajectories[&1].samples[0][0].re, 2.0);
        assert_eq!(dataset.trajectories[&2].samples[0][0].re, 1.0);
    }
}
