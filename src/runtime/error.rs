use thiserror::Error;

/// Why a task stopped before producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Raised by the task body itself.
    #[error("task fault: {0}")]
    Fault(String),

    /// An awaited operation (single or join member) was rejected.
    #[error("operation rejected: {0}")]
    OperationRejected(String),

    /// A nested task failed while its parent was waiting on it.
    #[error("sub-task failed: {0}")]
    ChildFailed(Box<TaskError>),
}

impl TaskError {
    pub fn fault(msg: impl std::fmt::Display) -> Self {
        TaskError::Fault(msg.to_string())
    }

    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        TaskError::OperationRejected(reason.to_string())
    }

    /// Innermost error, following `ChildFailed` links.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::ChildFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}
