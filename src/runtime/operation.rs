use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Observed state of an asynchronous operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpState<T> {
    Pending,
    Resolved(T),
    Rejected(String),
}

impl<T> OpState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OpState::Pending)
    }
}

/// An external computation the scheduler can poll.
///
/// The scheduler never registers wake-ups; it calls `poll_state` once per drive
/// until a terminal state is returned, then drops the operation. The value is
/// moved out on that terminal poll.
pub trait Operation<T> {
    fn poll_state(&mut self) -> OpState<T>;
}

const CONSUMED: &str = "operation result already consumed";

// --- Deferred / Resolver ---

enum Slot<T> {
    Pending,
    Resolved(T),
    Rejected(String),
    Consumed,
}

/// Operation side of a manually settled pair. See [`deferred`].
pub struct Deferred<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Settling side of a manually settled pair. Clones share the same slot.
pub struct Resolver<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone() }
    }
}

/// Create an operation that stays pending until its resolver settles it.
pub fn deferred<T>() -> (Deferred<T>, Resolver<T>) {
    let slot = Rc::new(RefCell::new(Slot::Pending));
    (Deferred { slot: slot.clone() }, Resolver { slot })
}

impl<T> Resolver<T> {
    /// Returns false if the operation was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Slot::Resolved(value))
    }

    /// Returns false if the operation was already settled.
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.settle(Slot::Rejected(reason.into()))
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Pending)
    }

    fn settle(&self, outcome: Slot<T>) -> bool {
        let mut slot = self.slot.borrow_mut();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = outcome;
        true
    }
}

impl<T> Operation<T> for Deferred<T> {
    fn poll_state(&mut self) -> OpState<T> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::replace(&mut *slot, Slot::Consumed) {
            Slot::Pending => {
                *slot = Slot::Pending;
                OpState::Pending
            }
            Slot::Resolved(value) => OpState::Resolved(value),
            Slot::Rejected(reason) => OpState::Rejected(reason),
            Slot::Consumed => OpState::Rejected(CONSUMED.to_string()),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.slot.borrow() {
            Slot::Pending => "pending",
            Slot::Resolved(_) => "resolved",
            Slot::Rejected(_) => "rejected",
            Slot::Consumed => "consumed",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

// --- Settled ---

/// An operation that is already settled when created.
pub struct Settled<T>(Option<Result<T, String>>);

pub fn resolved<T>(value: T) -> Settled<T> {
    Settled(Some(Ok(value)))
}

pub fn rejected<T>(reason: impl Into<String>) -> Settled<T> {
    Settled(Some(Err(reason.into())))
}

impl<T> Operation<T> for Settled<T> {
    fn poll_state(&mut self) -> OpState<T> {
        match self.0.take() {
            Some(Ok(value)) => OpState::Resolved(value),
            Some(Err(reason)) => OpState::Rejected(reason),
            None => OpState::Rejected(CONSUMED.to_string()),
        }
    }
}

// --- Spawned (tokio-backed) ---

/// Operation fed by a future running on a tokio runtime.
///
/// The future runs to completion even if the waiting task is cleared; its
/// result is then dropped along with the receiver.
#[derive(Debug)]
pub struct Spawned<T> {
    rx: oneshot::Receiver<Result<T, String>>,
}

pub fn spawn_operation<T, F>(handle: &Handle, future: F) -> Spawned<T>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    handle.spawn(async move {
        let result = future.await.map_err(|e| format!("{:#}", e));
        // Receiver is gone when the waiting task was cleared.
        let _ = tx.send(result);
    });
    Spawned { rx }
}

/// Resolves with `T::default()` once `duration` has elapsed.
pub fn wait<T>(handle: &Handle, duration: Duration) -> Spawned<T>
where
    T: Default + Send + 'static,
{
    spawn_operation(handle, async move {
        tokio::time::sleep(duration).await;
        Ok::<_, anyhow::Error>(T::default())
    })
}

impl<T> Operation<T> for Spawned<T> {
    fn poll_state(&mut self) -> OpState<T> {
        match self.rx.try_recv() {
            Ok(Ok(value)) => OpState::Resolved(value),
            Ok(Err(reason)) => OpState::Rejected(reason),
            Err(TryRecvError::Empty) => OpState::Pending,
            Err(TryRecvError::Closed) => {
                OpState::Rejected("operation dropped before settling".to_string())
            }
        }
    }
}
