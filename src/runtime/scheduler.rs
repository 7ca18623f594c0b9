use crate::runtime::body::TaskBody;
use crate::runtime::error::TaskError;
use crate::runtime::task::{Task, TaskId};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Final result of a task as seen by its submitter.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Done(T),
    Failed(TaskError),
}

type OutcomeSlot<T> = Rc<RefCell<Option<TaskOutcome<T>>>>;

/// Submitter's view of a task. Filled in by the drive that removes the task;
/// stays empty forever if the task is cleared first.
pub struct TaskHandle<T> {
    id: TaskId,
    outcome: OutcomeSlot<T>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            outcome: self.outcome.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.outcome.borrow(), Some(TaskOutcome::Failed(_)))
    }

    pub fn error(&self) -> Option<TaskError> {
        match &*self.outcome.borrow() {
            Some(TaskOutcome::Failed(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Moves the outcome out; later calls (on any clone) return `None`.
    pub fn take_outcome(&self) -> Option<TaskOutcome<T>> {
        self.outcome.borrow_mut().take()
    }
}

impl<T: Clone> TaskHandle<T> {
    pub fn outcome(&self) -> Option<TaskOutcome<T>> {
        self.outcome.borrow().clone()
    }

    pub fn result(&self) -> Option<T> {
        match &*self.outcome.borrow() {
            Some(TaskOutcome::Done(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

struct Entry<T> {
    task: Task<T>,
    outcome: OutcomeSlot<T>,
}

type Inbox<T> = Rc<RefCell<Vec<Entry<T>>>>;

fn enqueue<T>(inbox: &Inbox<T>, body: Box<dyn TaskBody<T>>) -> TaskHandle<T> {
    let task = Task::new(body);
    let outcome = Rc::new(RefCell::new(None));
    let handle = TaskHandle {
        id: task.id(),
        outcome: outcome.clone(),
    };
    debug!(task_id = %handle.id, "task submitted");
    inbox.borrow_mut().push(Entry { task, outcome });
    handle
}

/// Cloneable submission handle, usable from inside a running task.
pub struct Spawner<T> {
    inbox: Inbox<T>,
}

impl<T> Clone for Spawner<T> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
        }
    }
}

impl<T> Spawner<T> {
    pub fn submit(&self, body: impl TaskBody<T> + 'static) -> TaskHandle<T> {
        enqueue(&self.inbox, Box::new(body))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveStats {
    pub stepped: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Tick-driven cooperative scheduler.
///
/// Submissions land in an inbox that is admitted at the start of each
/// `drive`, so a task submitted while a drive is in progress is first stepped
/// on the next one. Live tasks are stepped in submission order.
pub struct TaskScheduler<T> {
    live: Vec<Entry<T>>,
    inbox: Inbox<T>,
    ticks: u64,
}

impl<T> TaskScheduler<T> {
    pub fn new() -> Self {
        Self {
            live: Vec::new(),
            inbox: Rc::new(RefCell::new(Vec::new())),
            ticks: 0,
        }
    }

    pub fn submit(&self, body: impl TaskBody<T> + 'static) -> TaskHandle<T> {
        enqueue(&self.inbox, Box::new(body))
    }

    pub fn spawner(&self) -> Spawner<T> {
        Spawner {
            inbox: self.inbox.clone(),
        }
    }

    /// Step every live task once, then drop the ones that finished.
    pub fn drive(&mut self) -> DriveStats {
        self.ticks += 1;
        let admitted = std::mem::take(&mut *self.inbox.borrow_mut());
        self.live.extend(admitted);

        let mut stats = DriveStats::default();
        for entry in self.live.iter_mut() {
            entry.task.step();
            stats.stepped += 1;
        }

        let stepped = std::mem::take(&mut self.live);
        for entry in stepped {
            if !entry.task.is_terminal() {
                self.live.push(entry);
                continue;
            }
            let Entry { task, outcome } = entry;
            let id = task.id();
            match task.into_outcome() {
                Some(Ok(value)) => {
                    stats.completed += 1;
                    debug!(task_id = %id, "task completed");
                    *outcome.borrow_mut() = Some(TaskOutcome::Done(value));
                }
                Some(Err(e)) => {
                    stats.failed += 1;
                    warn!(task_id = %id, error = %e, "task failed");
                    *outcome.borrow_mut() = Some(TaskOutcome::Failed(e));
                }
                None => {}
            }
        }
        stats
    }

    /// Drop every task without stepping it again. Nothing is notified.
    pub fn clear(&mut self) {
        let discarded = self.len();
        self.live.clear();
        self.inbox.borrow_mut().clear();
        if discarded > 0 {
            debug!(discarded, "scheduler cleared");
        }
    }

    /// Live tasks plus submissions not yet admitted.
    pub fn len(&self) -> usize {
        self.live.len() + self.inbox.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `drive` calls so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
