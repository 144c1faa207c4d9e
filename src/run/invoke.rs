//! External tool invocation.
//!
//! One invocation per task: spawn the import tool with a structured argument
//! vector, stream its combined output through the collector line by line, and
//! map the exit status (or the failure to spawn at all) into an
//! [`InvocationResult`]. A spawn failure never aborts the run; it is recorded
//! with a sentinel exit code so every remaining task still gets attempted.

use crate::run::aggregator::{InvocationResult, SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::run::collector::OutputCollector;
use crate::run::task::{ImportTask, ToolSpec};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Seam between the dispatcher and the external tool, so tests can substitute
/// the import tool without spawning processes.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, task: &ImportTask, collector: &OutputCollector) -> InvocationResult;
}

/// Invokes the configured tool as a child process.
pub struct ProcessInvoker {
    tool: ToolSpec,
    /// Optional per-task timeout; `None` matches the original behavior of
    /// waiting on the tool indefinitely.
    timeout: Option<Duration>,
}

impl ProcessInvoker {
    pub fn new(tool: ToolSpec) -> Self {
        Self {
            tool,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tool(&self) -> &ToolSpec {
        &self.tool
    }
}

/// Forward every line from one child stream to the collector while keeping a
/// copy for the invocation result. `lines()` yields a trailing line even when
/// the stream ends without a terminator, so no partial output is dropped.
async fn drain_stream<R: AsyncRead + Unpin>(
    stream: R,
    task_id: String,
    collector: OutputCollector,
    captured: Arc<Mutex<Vec<String>>>,
) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        collector.emit(&task_id, &line);
        captured
            .lock()
            .expect("captured output lock poisoned")
            .push(line);
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, task: &ImportTask, collector: &OutputCollector) -> InvocationResult {
        let task_id = task.id().to_string();
        let args = self.tool.args_for(task);
        let start = Instant::now();

        trace!(target: "locport.invoke", program = %self.tool.program, ?args, task = %task_id, "spawn");

        let mut cmd = Command::new(&self.tool.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(target: "locport.invoke", task = %task_id, error = %e, "failed to spawn tool");
                return InvocationResult {
                    task_id,
                    exit_code: SPAWN_FAILURE_EXIT_CODE,
                    captured_output: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    final_error: Some(format!("spawn failed: {}", e)),
                };
            }
        };

        let captured = Arc::new(Mutex::new(Vec::new()));
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");
        let out_handle = tokio::spawn(drain_stream(
            stdout,
            task_id.clone(),
            collector.clone(),
            captured.clone(),
        ));
        let err_handle = tokio::spawn(drain_stream(
            stderr,
            task_id.clone(),
            collector.clone(),
            captured.clone(),
        ));

        let mut final_error = None;
        let exit_code = match self.timeout {
            Some(dur) => match tokio::time::timeout(dur, child.wait()).await {
                Ok(status) => status_to_code(status, &mut final_error),
                Err(_) => {
                    warn!(target: "locport.invoke", task = %task_id, timeout_ms = dur.as_millis() as u64, "timeout; killing tool");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    final_error = Some(format!("timed out after {}ms", dur.as_millis()));
                    TIMEOUT_EXIT_CODE
                }
            },
            None => status_to_code(child.wait().await, &mut final_error),
        };

        // Collect the tail of the output before reporting
        let _ = out_handle.await;
        let _ = err_handle.await;

        debug!(target: "locport.invoke", task = %task_id, exit_code, "tool exited");

        let captured_output = std::mem::take(
            &mut *captured.lock().expect("captured output lock poisoned"),
        );
        InvocationResult {
            task_id,
            exit_code,
            captured_output,
            duration_ms: start.elapsed().as_millis() as u64,
            final_error,
        }
    }
}

fn status_to_code(
    status: std::io::Result<std::process::ExitStatus>,
    final_error: &mut Option<String>,
) -> i32 {
    match status {
        // Exit code -1 stands in for "terminated by signal"
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            *final_error = Some(format!("wait failed: {}", e));
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::collector::BufferSink;

    fn sh(script: &str) -> (ProcessInvoker, ImportTask) {
        let invoker = ProcessInvoker::new(
            ToolSpec::program("sh").with_fixed_flags(vec!["-c", script, "sh"]),
        );
        // With positional splicing, $1 is the project and $2 the path
        let task = ImportTask::new("a.xliff", "MyProj");
        (invoker, task)
    }

    fn collector() -> (OutputCollector, Arc<BufferSink>) {
        let sink = Arc::new(BufferSink::new());
        (OutputCollector::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_successful_invocation_captures_output() {
        let (invoker, task) = sh("echo importing $2; echo done");
        let (collector, sink) = collector();

        let result = invoker.invoke(&task, &collector).await;

        assert!(result.success());
        assert_eq!(result.exit_code, 0);
        assert_eq!(
            result.captured_output,
            vec!["importing a.xliff".to_string(), "done".to_string()]
        );
        assert_eq!(
            sink.lines(),
            vec![
                "a.xliff: importing a.xliff".to_string(),
                "a.xliff: done".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stderr_is_collected_too() {
        let (invoker, task) = sh("echo oops >&2; exit 3");
        let (collector, sink) = collector();

        let result = invoker.invoke(&task, &collector).await;

        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert_eq!(result.captured_output, vec!["oops".to_string()]);
        assert_eq!(sink.lines(), vec!["a.xliff: oops".to_string()]);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_kept() {
        let (invoker, task) = sh("printf 'no terminator'");
        let (collector, sink) = collector();

        let result = invoker.invoke(&task, &collector).await;

        assert_eq!(result.captured_output, vec!["no terminator".to_string()]);
        assert_eq!(sink.lines(), vec!["a.xliff: no terminator".to_string()]);
    }

    #[tokio::test]
    async fn test_spawn_failure_yields_sentinel_result() {
        let invoker =
            ProcessInvoker::new(ToolSpec::program("/definitely/not/a/real/tool-xyz"));
        let task = ImportTask::new("a.xliff", "MyProj");
        let (collector, sink) = collector();

        let result = invoker.invoke(&task, &collector).await;

        assert_eq!(result.exit_code, SPAWN_FAILURE_EXIT_CODE);
        assert!(result.final_error.as_deref().unwrap().contains("spawn failed"));
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_kills_hung_tool() {
        // `exec` so the shell process *is* the hung tool; some `sh`
        // implementations fork instead, and the orphaned grandchild would
        // hold the output pipe open after the shell itself is killed.
        let (invoker, task) = sh("exec sleep 30");
        let invoker = invoker.with_timeout(Duration::from_millis(100));
        let (collector, _sink) = collector();

        let start = Instant::now();
        let result = invoker.invoke(&task, &collector).await;

        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.final_error.as_deref().unwrap().contains("timed out"));
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "timeout should not wait for the tool: {:?}",
            start.elapsed()
        );
    }
}
