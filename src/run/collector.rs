//! Output collection for concurrent tool invocations.
//!
//! Every line a task's process produces is prefixed with the task's source
//! path and forwarded to the run's log sink as it arrives, so interleaved
//! output from parallel invocations stays attributable to its origin.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Sink for the aggregate run log.
///
/// `write_line` receives one complete, already-prefixed line at a time and
/// must write it atomically; implementations synchronize internally so two
/// tasks can never interleave partial lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes the aggregate log to the process's standard output.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A failed write to stdout is not worth failing the run over
        let _ = writeln!(out, "{}", line);
    }
}

/// Collects the aggregate log in memory; used by tests and the report path.
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("log buffer poisoned").clone()
    }

    pub fn clear(&self) {
        self.lines.lock().expect("log buffer poisoned").clear();
    }
}

impl LogSink for BufferSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .expect("log buffer poisoned")
            .push(line.to_string());
    }
}

/// Routes a forwarded line through `tracing` instead of a byte stream.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "locport.output", "{}", line);
    }
}

/// Tags each task's output lines with their origin and forwards them to the
/// injected sink in real time.
#[derive(Clone)]
pub struct OutputCollector {
    sink: Arc<dyn LogSink>,
}

impl OutputCollector {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Collector writing to standard output, the default for CLI runs.
    pub fn stdout() -> Self {
        Self::new(Arc::new(StdoutSink))
    }

    /// Forward one output line from the given task.
    pub fn emit(&self, task_id: &str, line: &str) {
        self.sink.write_line(&format!("{}: {}", task_id, line));
    }
}
