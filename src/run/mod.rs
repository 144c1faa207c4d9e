pub mod aggregator;
pub mod collector;
pub mod dispatcher;
pub mod invoke;
pub mod task;

pub use aggregator::{
    InvocationResult, RunAggregator, RunOutcome, SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE,
};
pub use collector::{BufferSink, LogSink, OutputCollector, StdoutSink, TracingSink};
pub use dispatcher::{execute_run, execute_run_with_invoker, RunConfig, RunReport, TaskState};
pub use invoke::{ProcessInvoker, ToolInvoker};
pub use task::{plan_tasks, ImportTask, ToolSpec};
