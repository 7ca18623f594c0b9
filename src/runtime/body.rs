use crate::runtime::awaitable::Awaitable;
use crate::runtime::error::TaskError;
use std::collections::VecDeque;
use std::marker::PhantomData;

/// Input handed to a body when it continues.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume<T> {
    /// First resumption of a fresh task.
    Start,
    /// Result of an immediate value, a single operation or a nested task.
    Value(T),
    /// Join results, in the order the operations resolved.
    All(Vec<T>),
}

impl<T> Resume<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Resume::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_values(self) -> Vec<T> {
        match self {
            Resume::Start => Vec::new(),
            Resume::Value(v) => vec![v],
            Resume::All(vs) => vs,
        }
    }

    /// Single value or a body fault naming what was expected.
    pub fn into_required(self, what: &str) -> Result<T, TaskError> {
        match self {
            Resume::Value(v) => Ok(v),
            Resume::Start => Err(TaskError::fault(format!("expected {}, got start", what))),
            Resume::All(_) => Err(TaskError::fault(format!("expected {}, got join results", what))),
        }
    }
}

/// Outcome of resuming a body once.
#[derive(Debug)]
pub enum Step<T> {
    Yield(Awaitable<T>),
    Done(T),
}

/// A resumable sequence of yields.
///
/// Implementors keep whatever state they need to pick up where they left off
/// (usually an enum of resume points). The scheduler calls `resume` with
/// `Resume::Start` first, then with the result of each awaitable it yielded.
pub trait TaskBody<T> {
    fn resume(&mut self, input: Resume<T>) -> Result<Step<T>, TaskError>;
}

impl<T, B: TaskBody<T> + ?Sized> TaskBody<T> for Box<B> {
    fn resume(&mut self, input: Resume<T>) -> Result<Step<T>, TaskError> {
        (**self).resume(input)
    }
}

// --- Closure adapter ---

pub struct FnBody<T, F> {
    f: F,
    _value: PhantomData<fn(Resume<T>)>,
}

/// Wrap a closure as a body. The closure sees every resumption.
pub fn from_fn<T, F>(f: F) -> FnBody<T, F>
where
    F: FnMut(Resume<T>) -> Result<Step<T>, TaskError>,
{
    FnBody {
        f,
        _value: PhantomData,
    }
}

impl<T, F> TaskBody<T> for FnBody<T, F>
where
    F: FnMut(Resume<T>) -> Result<Step<T>, TaskError>,
{
    fn resume(&mut self, input: Resume<T>) -> Result<Step<T>, TaskError> {
        (self.f)(input)
    }
}

// --- Script ---

type StepFn<T> = Box<dyn FnOnce(Resume<T>) -> Result<Awaitable<T>, TaskError>>;
type FinishFn<T> = Box<dyn FnOnce(Resume<T>) -> Result<T, TaskError>>;

/// A body made of a fixed list of steps.
///
/// Each step receives the previous resume input and returns the next
/// awaitable; the finisher turns the last input into the task result.
pub struct Script<T> {
    steps: VecDeque<StepFn<T>>,
    finish: Option<FinishFn<T>>,
}

impl<T> TaskBody<T> for Script<T> {
    fn resume(&mut self, input: Resume<T>) -> Result<Step<T>, TaskError> {
        if let Some(step) = self.steps.pop_front() {
            return step(input).map(Step::Yield);
        }
        let finish = self
            .finish
            .take()
            .ok_or_else(|| TaskError::fault("script resumed after finishing"))?;
        finish(input).map(Step::Done)
    }
}

pub struct ScriptBuilder<T> {
    steps: VecDeque<StepFn<T>>,
}

impl<T: 'static> ScriptBuilder<T> {
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
        }
    }

    pub fn step<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Resume<T>) -> Result<Awaitable<T>, TaskError> + 'static,
    {
        self.steps.push_back(Box::new(f));
        self
    }

    pub fn finish<F>(self, f: F) -> Script<T>
    where
        F: FnOnce(Resume<T>) -> Result<T, TaskError> + 'static,
    {
        Script {
            steps: self.steps,
            finish: Some(Box::new(f)),
        }
    }
}

impl<T: 'static> Default for ScriptBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
