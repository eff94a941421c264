//! Bounded parallel execution of independent what-if runs.
//!
//! Each candidate runs on its own clone of the network, so workers share
//! nothing but read-only inputs. A sweep can be cancelled from another
//! thread, and it stops starting new candidates once its overall deadline
//! passes. Whatever finished is always reported.

use crate::config::SweepConfig;
use crate::error::{ScheduleError, ScheduleResult};
use crate::task::TaskId;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Outcome<T> {
    Completed(T),
    TimedOut(Duration),
    Skipped,
    Failed(ScheduleError),
}

/// What happened to every candidate of a sweep.
#[derive(Debug, Clone)]
pub struct SweepReport<T> {
    /// Results in candidate order unless the caller re-sorts them.
    pub completed: Vec<T>,
    pub failures: Vec<(TaskId, ScheduleError)>,
    /// Candidates whose run exceeded the per-candidate timeout.
    pub timed_out: Vec<TaskId>,
    /// Candidates never started because of cancellation or the deadline.
    pub skipped: Vec<TaskId>,
    pub cancelled: bool,
    pub deadline_reached: bool,
    pub elapsed: Duration,
}

impl<T> SweepReport<T> {
    /// True when every candidate produced a result.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.timed_out.is_empty() && self.skipped.is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.completed.len() + self.failures.len() + self.timed_out.len() + self.skipped.len()
    }
}

pub struct SweepRunner {
    config: SweepConfig,
    token: CancellationToken,
}

impl SweepRunner {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// A handle for cancelling this runner from elsewhere.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Calls `job` once per candidate on the worker pool.
    ///
    /// Cancellation and the overall deadline are checked before a candidate
    /// starts. A single CPM run cannot be interrupted, so the per-candidate
    /// timeout is checked when it returns and a late result is discarded.
    pub fn run<T, F>(&self, candidates: &[TaskId], job: F) -> SweepReport<T>
    where
        T: Send,
        F: Fn(TaskId) -> ScheduleResult<T> + Sync,
    {
        let started = Instant::now();
        let deadline = self
            .config
            .overall_timeout_ms
            .map(|ms| started + Duration::from_millis(ms));
        let per_candidate = self.config.per_candidate_timeout_ms.map(Duration::from_millis);
        let deadline_reached = AtomicBool::new(false);
        let finished = AtomicUsize::new(0);

        let evaluate = |task_id: TaskId| -> (TaskId, Outcome<T>) {
            if self.token.is_cancelled() {
                return (task_id, Outcome::Skipped);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                deadline_reached.store(true, Ordering::Relaxed);
                return (task_id, Outcome::Skipped);
            }
            let begun = Instant::now();
            let result = job(task_id);
            let elapsed = begun.elapsed();
            finished.fetch_add(1, Ordering::Relaxed);
            let outcome = match result {
                Ok(_) if per_candidate.is_some_and(|limit| elapsed > limit) => {
                    Outcome::TimedOut(elapsed)
                }
                Ok(value) => Outcome::Completed(value),
                Err(err) => Outcome::Failed(err),
            };
            (task_id, outcome)
        };

        let outcomes: Vec<(TaskId, Outcome<T>)> = match self.build_pool() {
            Some(pool) => pool.install(|| candidates.par_iter().map(|&id| evaluate(id)).collect()),
            None => candidates.par_iter().map(|&id| evaluate(id)).collect(),
        };

        let mut report = SweepReport {
            completed: Vec::new(),
            failures: Vec::new(),
            timed_out: Vec::new(),
            skipped: Vec::new(),
            cancelled: self.token.is_cancelled(),
            deadline_reached: deadline_reached.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        };
        for (task_id, outcome) in outcomes {
            match outcome {
                Outcome::Completed(value) => report.completed.push(value),
                Outcome::TimedOut(elapsed) => {
                    warn!(
                        task_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "candidate exceeded its timeout"
                    );
                    report.timed_out.push(task_id);
                }
                Outcome::Skipped => report.skipped.push(task_id),
                Outcome::Failed(err) => {
                    warn!(task_id, error = %err, "candidate failed");
                    report.failures.push((task_id, err));
                }
            }
        }

        if !report.skipped.is_empty() {
            warn!(
                skipped = report.skipped.len(),
                cancelled = report.cancelled,
                deadline_reached = report.deadline_reached,
                "sweep stopped early"
            );
        }
        debug!(
            candidates = candidates.len(),
            ran = finished.load(Ordering::Relaxed),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sweep finished"
        );
        report
    }

    /// A dedicated pool when a worker limit is set, else rayon's global pool.
    fn build_pool(&self) -> Option<rayon::ThreadPool> {
        if self.config.max_workers == 0 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(error = %err, "could not build sweep pool, using the global pool");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_runner_skips_every_candidate() {
        let runner = SweepRunner::new(SweepConfig::default());
        runner.token().cancel();
        let report = runner.run(&[1, 2, 3], |id| Ok(id * 10));
        assert!(report.completed.is_empty());
        assert_eq!(report.skipped, vec![1, 2, 3]);
        assert!(report.cancelled);
    }

    #[test]
    fn failures_are_kept_alongside_results() {
        let runner = SweepRunner::new(SweepConfig {
            max_workers: 2,
            ..SweepConfig::default()
        });
        let report = runner.run(&[1, 2, 3], |id| {
            if id == 2 {
                Err(ScheduleError::NotFound(id))
            } else {
                Ok(id)
            }
        });
        assert_eq!(report.completed, vec![1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 2);
        assert!(!report.is_complete());
        assert_eq!(report.candidate_count(), 3);
    }

    #[test]
    fn expired_deadline_skips_remaining_work() {
        let runner = SweepRunner::new(SweepConfig {
            overall_timeout_ms: Some(0),
            ..SweepConfig::default()
        });
        let report = runner.run(&[1, 2], |id| Ok(id));
        assert_eq!(report.skipped.len(), 2);
        assert!(report.deadline_reached);
    }

    #[test]
    fn slow_candidate_is_timed_out_and_its_result_dropped() {
        let runner = SweepRunner::new(SweepConfig {
            max_workers: 2,
            per_candidate_timeout_ms: Some(20),
            ..SweepConfig::default()
        });
        let report = runner.run(&[1, 2], |id| {
            if id == 2 {
                std::thread::sleep(Duration::from_millis(100));
            }
            Ok(id)
        });
        assert_eq!(report.completed, vec![1]);
        assert_eq!(report.timed_out, vec![2]);
        assert!(report.skipped.is_empty());
        assert!(!report.deadline_reached);
        assert!(!report.is_complete());
        assert_eq!(report.candidate_count(), 2);
    }
}
