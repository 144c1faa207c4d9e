use thiserror::Error;

/// Unified error type for the entire locport library
#[derive(Debug, Error)]
pub enum LocportError {
    /// Pre-flight validation errors (empty path list, blank project, zero concurrency)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// OS-level failure to start an import tool process
    #[error("Spawn failed for {task_id}: {message}")]
    Spawn {
        task_id: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Aggregator queried before every task has reported back
    #[error("Run not complete: {received} of {total} results received")]
    NotReady { received: usize, total: usize },

    /// Concurrency errors (closed semaphore, broken result channel, duplicate results)
    #[error("Concurrency error: {operation} - {message}")]
    Concurrency { operation: String, message: String },

    /// Per-task timeout (only when the optional timeout extension is enabled)
    #[error("Task {task_id} timed out after {timeout_ms}ms")]
    Timeout { task_id: String, timeout_ms: u64 },

    /// IO errors outside of process spawning (report files, sinks)
    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LocportError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with the offending field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a spawn error
    pub fn spawn<S: Into<String>, M: Into<String>>(task_id: S, message: M) -> Self {
        Self::Spawn {
            task_id: task_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error carrying the OS error
    pub fn spawn_with_source<S: Into<String>>(task_id: S, source: std::io::Error) -> Self {
        Self::Spawn {
            task_id: task_id.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a not-ready error
    pub fn not_ready(received: usize, total: usize) -> Self {
        Self::NotReady { received, total }
    }

    /// Create a concurrency error
    pub fn concurrency<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Concurrency {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(task_id: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            task_id: task_id.into(),
            timeout_ms,
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable within a run.
    ///
    /// Spawn and timeout failures are recorded per task and never abort the
    /// run; validation and not-ready errors are contract violations.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Spawn { .. } | Self::Timeout { .. } | Self::Io { .. } => true,
            Self::Validation { .. } | Self::NotReady { .. } => false,
            Self::Concurrency { .. } => false,
            _ => false,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Spawn { .. } => "spawn",
            Self::NotReady { .. } => "not_ready",
            Self::Concurrency { .. } => "concurrency",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LocportError>;

impl From<std::io::Error> for LocportError {
    fn from(err: std::io::Error) -> Self {
        Self::io("io_operation", err)
    }
}

impl From<serde_json::Error> for LocportError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}
