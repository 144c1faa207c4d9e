// Core infrastructure modules
pub mod core {
    pub mod errors;
    pub mod limits;
}

// The run pipeline: task planning, dispatch, output collection, aggregation
pub mod run;

// Re-exports for convenience
pub use crate::core::errors::{LocportError, Result};
pub use crate::core::limits::{SlotGuard, SlotTracker};
pub use run::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_plan_and_run_end_to_end() {
        // Two "imports" that just echo their path; sh stands in for xcodebuild
        let tasks = plan_tasks(vec!["a.xliff", "b.xliff"], "MyProj").unwrap();

        let sink = Arc::new(BufferSink::new());
        let collector = OutputCollector::new(sink.clone());
        let config = RunConfig {
            concurrency: 2,
            tool: ToolSpec::program("sh").with_fixed_flags(vec!["-c", "echo imported $2", "sh"]),
            task_timeout: None,
        };

        let report = execute_run(tasks, collector, config).await.unwrap();

        assert!(report.outcome.overall_success);
        assert_eq!(report.outcome.total_tasks, 2);
        assert_eq!(report.results.len(), 2);
        assert!(report.peak_in_flight <= 2);

        let mut lines = sink.lines();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "a.xliff: imported a.xliff".to_string(),
                "b.xliff: imported b.xliff".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let tasks = plan_tasks(vec!["a.xliff"], "MyProj").unwrap();
        let collector = OutputCollector::new(Arc::new(BufferSink::new()));
        let config = RunConfig {
            concurrency: 1,
            tool: ToolSpec::program("true"),
            task_timeout: None,
        };

        let report = execute_run(tasks, collector, config).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"]["overall_success"], true);
        assert_eq!(json["outcome"]["total_tasks"], 1);
        assert_eq!(json["results"][0]["task_id"], "a.xliff");
    }
}
