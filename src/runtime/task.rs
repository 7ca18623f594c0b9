use crate::runtime::awaitable::Awaitable;
use crate::runtime::body::{Resume, Step, TaskBody};
use crate::runtime::error::TaskError;
use crate::runtime::operation::{Operation, OpState};
use std::fmt;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fan-out wait over a set of operations.
pub struct Join<T> {
    ops: Vec<Option<Box<dyn Operation<T>>>>,
    results: Vec<T>,
    pending: usize,
}

impl<T> Join<T> {
    fn new(entries: Vec<Awaitable<T>>) -> Self {
        let mut ops = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Awaitable::Single(op) => ops.push(Some(op)),
                other => trace!(kind = other.kind(), "join entry is not an operation, skipped"),
            }
        }
        let pending = ops.len();
        Self {
            ops,
            results: Vec::with_capacity(pending),
            pending,
        }
    }

    /// Operations that have not resolved yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Results collected so far, in completion order.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// Polls every outstanding operation once. Fails fast on the first
    /// rejection; returns true once nothing is left pending.
    fn poll(&mut self) -> Result<bool, TaskError> {
        for slot in self.ops.iter_mut() {
            let Some(op) = slot else { continue };
            match op.poll_state() {
                OpState::Pending => {}
                OpState::Resolved(value) => {
                    self.results.push(value);
                    self.pending -= 1;
                    *slot = None;
                }
                OpState::Rejected(reason) => return Err(TaskError::OperationRejected(reason)),
            }
        }
        Ok(self.pending == 0)
    }
}

pub enum TaskState<T> {
    Ready(Resume<T>),
    AwaitingSingle(Box<dyn Operation<T>>),
    AwaitingAll(Join<T>),
    AwaitingChild(Box<Task<T>>),
    Done(T),
    Failed(TaskError),
}

impl<T> TaskState<T> {
    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Ready(_) => "ready",
            TaskState::AwaitingSingle(_) => "awaiting_single",
            TaskState::AwaitingAll(_) => "awaiting_all",
            TaskState::AwaitingChild(_) => "awaiting_child",
            TaskState::Done(_) => "done",
            TaskState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done(_) | TaskState::Failed(_))
    }
}

impl<T> fmt::Debug for TaskState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::AwaitingAll(join) => f
                .debug_struct("AwaitingAll")
                .field("pending", &join.pending)
                .field("collected", &join.results.len())
                .finish(),
            TaskState::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// A body plus the state the scheduler keeps for it.
pub struct Task<T> {
    id: TaskId,
    body: Box<dyn TaskBody<T>>,
    state: TaskState<T>,
    steps: u64,
}

impl<T> Task<T> {
    pub fn new(body: Box<dyn TaskBody<T>>) -> Self {
        Self {
            id: TaskId::new(),
            body,
            state: TaskState::Ready(Resume::Start),
            steps: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> &TaskState<T> {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Number of times this task has been stepped.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Final result, if the task reached a terminal state.
    pub fn into_outcome(self) -> Option<Result<T, TaskError>> {
        match self.state {
            TaskState::Done(value) => Some(Ok(value)),
            TaskState::Failed(e) => Some(Err(e)),
            _ => None,
        }
    }

    /// Advance by one logical step. Terminal tasks are left untouched.
    pub fn step(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.steps += 1;
        let state = std::mem::replace(&mut self.state, TaskState::Ready(Resume::Start));
        self.state = match state {
            TaskState::Ready(input) => self.resume(input),
            TaskState::AwaitingSingle(mut op) => match op.poll_state() {
                OpState::Pending => TaskState::AwaitingSingle(op),
                OpState::Resolved(value) => self.resume(Resume::Value(value)),
                OpState::Rejected(reason) => TaskState::Failed(TaskError::OperationRejected(reason)),
            },
            TaskState::AwaitingAll(mut join) => match join.poll() {
                Ok(false) => TaskState::AwaitingAll(join),
                Ok(true) => self.resume(Resume::All(join.results)),
                Err(e) => TaskState::Failed(e),
            },
            TaskState::AwaitingChild(mut child) => {
                child.step();
                Self::after_child(*child)
            }
            terminal => terminal,
        };
    }

    fn resume(&mut self, input: Resume<T>) -> TaskState<T> {
        match self.body.resume(input) {
            Ok(Step::Done(value)) => TaskState::Done(value),
            Ok(Step::Yield(awaitable)) => self.suspend(awaitable),
            Err(e) => TaskState::Failed(e),
        }
    }

    fn suspend(&self, awaitable: Awaitable<T>) -> TaskState<T> {
        trace!(task_id = %self.id, kind = awaitable.kind(), "task suspended");
        match awaitable {
            Awaitable::Value(value) => TaskState::Ready(Resume::Value(value)),
            Awaitable::Single(op) => TaskState::AwaitingSingle(op),
            Awaitable::All(entries) => TaskState::AwaitingAll(Join::new(entries)),
            Awaitable::Task(body) => {
                let mut child = Task::new(body);
                debug!(task_id = %self.id, child_id = %child.id, "starting sub-task");
                child.step();
                Self::after_child(child)
            }
        }
    }

    // A finished child hands its result over as the next resume input; the
    // parent picks it up on its following step.
    fn after_child(mut child: Task<T>) -> TaskState<T> {
        match child.state {
            TaskState::Done(value) => TaskState::Ready(Resume::Value(value)),
            TaskState::Failed(e) => TaskState::Failed(TaskError::ChildFailed(Box::new(e))),
            running => {
                child.state = running;
                TaskState::AwaitingChild(Box::new(child))
            }
        }
    }
}
