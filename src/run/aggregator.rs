//! Result aggregation for a run.
//!
//! Invocation results arrive in completion order, one per task. The
//! aggregator folds them into the run outcome and refuses to finalize until
//! every task has reported back.

use crate::core::errors::{LocportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel exit code recorded when the tool process could not be started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Sentinel exit code recorded when the optional per-task timeout killed the tool.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// The outcome of one task's tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// The source path of the task this result belongs to.
    pub task_id: String,
    /// The tool's exit code, or a sentinel for spawn failure / timeout.
    pub exit_code: i32,
    /// Captured output lines, in the order the task produced them.
    pub captured_output: Vec<String>,
    /// Wall-clock duration of the invocation.
    pub duration_ms: u64,
    /// The final error message recorded (if any) when the invocation failed
    /// for a reason other than the tool's own exit code.
    pub final_error: Option<String>,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Aggregate success/failure for an entire run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub total_tasks: usize,
    /// Task ids with a non-zero exit code, ordered for deterministic output.
    pub failed_task_ids: BTreeSet<String>,
    /// True iff every invocation exited with code 0.
    pub overall_success: bool,
}

impl RunOutcome {
    /// Process-level exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.overall_success {
            0
        } else {
            1
        }
    }
}

#[derive(Debug)]
enum AggregatorState {
    Pending {
        total: usize,
    },
    Accumulating {
        total: usize,
        seen: BTreeSet<String>,
        failed: BTreeSet<String>,
    },
    Done {
        outcome: RunOutcome,
    },
}

/// Folds invocation results into a [`RunOutcome`].
///
/// State machine: `Pending(total)` → `Accumulating(received, failed_set)` →
/// `Done(outcome)`. The terminal transition fires exactly when the number of
/// recorded results reaches the planned total; duplicates and overflow are
/// rejected so the results-equals-total invariant holds by construction.
#[derive(Debug)]
pub struct RunAggregator {
    state: AggregatorState,
    results: Vec<InvocationResult>,
}

impl RunAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            state: AggregatorState::Pending { total },
            results: Vec::with_capacity(total),
        }
    }

    /// Record one task's result. Transitions to `Done` when the last result
    /// arrives; arrival order does not affect the outcome.
    pub fn record(&mut self, result: InvocationResult) -> Result<()> {
        let (total, mut seen, mut failed) = match std::mem::replace(
            &mut self.state,
            AggregatorState::Pending { total: 0 },
        ) {
            AggregatorState::Pending { total } => (total, BTreeSet::new(), BTreeSet::new()),
            AggregatorState::Accumulating {
                total,
                seen,
                failed,
            } => (total, seen, failed),
            AggregatorState::Done { outcome } => {
                self.state = AggregatorState::Done { outcome };
                return Err(LocportError::concurrency(
                    "aggregator_record",
                    format!("result for '{}' arrived after completion", result.task_id),
                ));
            }
        };

        if !seen.insert(result.task_id.clone()) {
            self.state = AggregatorState::Accumulating {
                total,
                seen,
                failed,
            };
            return Err(LocportError::concurrency(
                "aggregator_record",
                format!("duplicate result for '{}'", result.task_id),
            ));
        }

        if !result.success() {
            failed.insert(result.task_id.clone());
        }
        self.results.push(result);

        if seen.len() == total {
            let outcome = RunOutcome {
                total_tasks: total,
                overall_success: failed.is_empty(),
                failed_task_ids: failed,
            };
            self.state = AggregatorState::Done { outcome };
        } else {
            self.state = AggregatorState::Accumulating {
                total,
                seen,
                failed,
            };
        }
        Ok(())
    }

    /// Number of results recorded so far.
    pub fn received(&self) -> usize {
        self.results.len()
    }

    /// Whether the terminal state has been reached.
    pub fn is_done(&self) -> bool {
        matches!(self.state, AggregatorState::Done { .. })
    }

    /// The run outcome; only meaningful after every task has reported.
    pub fn finalize(&self) -> Result<RunOutcome> {
        match &self.state {
            AggregatorState::Done { outcome } => Ok(outcome.clone()),
            AggregatorState::Pending { total } => Err(LocportError::not_ready(0, *total)),
            AggregatorState::Accumulating { total, seen, .. } => {
                Err(LocportError::not_ready(seen.len(), *total))
            }
        }
    }

    /// Consume the aggregator, yielding the outcome and the owned results.
    pub fn into_parts(self) -> Result<(RunOutcome, Vec<InvocationResult>)> {
        let outcome = self.finalize()?;
        Ok((outcome, self.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(task_id: &str, exit_code: i32) -> InvocationResult {
        InvocationResult {
            task_id: task_id.to_string(),
            exit_code,
            captured_output: Vec::new(),
            duration_ms: 1,
            final_error: None,
        }
    }

    #[test]
    fn test_all_success() {
        let mut agg = RunAggregator::new(2);
        agg.record(result("a.xliff", 0)).unwrap();
        assert!(!agg.is_done());
        agg.record(result("b.xliff", 0)).unwrap();
        assert!(agg.is_done());

        let outcome = agg.finalize().unwrap();
        assert!(outcome.overall_success);
        assert!(outcome.failed_task_ids.is_empty());
        assert_eq!(outcome.total_tasks, 2);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_mixed_failure() {
        let mut agg = RunAggregator::new(3);
        agg.record(result("a.xliff", 0)).unwrap();
        agg.record(result("bad.xliff", 1)).unwrap();
        agg.record(result("c.xliff", 0)).unwrap();

        let outcome = agg.finalize().unwrap();
        assert!(!outcome.overall_success);
        assert_eq!(
            outcome.failed_task_ids,
            BTreeSet::from(["bad.xliff".to_string()])
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_all_failure() {
        let mut agg = RunAggregator::new(2);
        agg.record(result("a.xliff", 65)).unwrap();
        agg.record(result("b.xliff", SPAWN_FAILURE_EXIT_CODE)).unwrap();

        let outcome = agg.finalize().unwrap();
        assert!(!outcome.overall_success);
        assert_eq!(outcome.failed_task_ids.len(), 2);
    }

    #[test]
    fn test_finalize_before_done_is_not_ready() {
        let mut agg = RunAggregator::new(2);
        assert!(matches!(
            agg.finalize(),
            Err(LocportError::NotReady { received: 0, total: 2 })
        ));

        agg.record(result("a.xliff", 0)).unwrap();
        assert!(matches!(
            agg.finalize(),
            Err(LocportError::NotReady { received: 1, total: 2 })
        ));
    }

    #[test]
    fn test_duplicate_result_rejected() {
        let mut agg = RunAggregator::new(2);
        agg.record(result("a.xliff", 0)).unwrap();
        let err = agg.record(result("a.xliff", 1)).unwrap_err();
        assert_eq!(err.category(), "concurrency");
        // The duplicate must not have consumed the remaining slot
        assert_eq!(agg.received(), 1);
        agg.record(result("b.xliff", 0)).unwrap();
        assert!(agg.finalize().unwrap().overall_success);
    }

    #[test]
    fn test_record_after_done_rejected() {
        let mut agg = RunAggregator::new(1);
        agg.record(result("a.xliff", 0)).unwrap();
        let err = agg.record(result("b.xliff", 0)).unwrap_err();
        assert_eq!(err.category(), "concurrency");
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let results = vec![
            result("a.xliff", 0),
            result("b.xliff", 1),
            result("c.xliff", 0),
            result("d.xliff", 2),
        ];

        let mut forward = RunAggregator::new(4);
        for r in results.clone() {
            forward.record(r).unwrap();
        }
        let mut reverse = RunAggregator::new(4);
        for r in results.into_iter().rev() {
            reverse.record(r).unwrap();
        }

        assert_eq!(forward.finalize().unwrap(), reverse.finalize().unwrap());
    }

    #[test]
    fn test_into_parts_owns_results() {
        let mut agg = RunAggregator::new(1);
        agg.record(result("a.xliff", 0)).unwrap();
        let (outcome, results) = agg.into_parts().unwrap();
        assert!(outcome.overall_success);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].task_id, "a.xliff");
    }
}
