//! Processor errors.

use spindle_machine::TableError;
use spindle_types::ErrorCode;
use thiserror::Error;

/// Error raised by processor operations.
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    /// The processor has been disposed or terminated; no further machines
    /// or events are admitted.
    #[error("processor is terminated")]
    Terminated,

    /// Building the machine type's dispatch table failed.
    ///
    /// Raised by the first spawn of a machine type whose `configure`
    /// declares a duplicate or misplaced handler.
    #[error("dispatch table construction failed: {0}")]
    Table(#[from] TableError),

    /// The OS refused to start the worker thread.
    #[error("failed to spawn worker thread: {reason}")]
    WorkerSpawn {
        /// The OS error.
        reason: String,
    },
}

impl ErrorCode for ProcessorError {
    fn code(&self) -> &'static str {
        match self {
            Self::Terminated => "PROC_TERMINATED",
            Self::Table(_) => "PROC_TABLE_BUILD",
            Self::WorkerSpawn { .. } => "PROC_WORKER_SPAWN",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::WorkerSpawn { .. })
    }
}
