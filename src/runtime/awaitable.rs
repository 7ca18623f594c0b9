use crate::runtime::body::TaskBody;
use crate::runtime::operation::Operation;
use std::fmt;

/// What a task body yields when it suspends.
pub enum Awaitable<T> {
    /// Fed straight back as the next resume input, one drive later.
    Value(T),
    /// Wait for one operation.
    Single(Box<dyn Operation<T>>),
    /// Wait for every `Single` entry. Other entries do not take part in the
    /// join and never contribute to its results.
    All(Vec<Awaitable<T>>),
    /// Run a nested task to completion and resume with its result.
    Task(Box<dyn TaskBody<T>>),
}

impl<T> Awaitable<T> {
    pub fn op(op: impl Operation<T> + 'static) -> Self {
        Awaitable::Single(Box::new(op))
    }

    pub fn all<O>(ops: impl IntoIterator<Item = O>) -> Self
    where
        O: Operation<T> + 'static,
    {
        Awaitable::All(ops.into_iter().map(Awaitable::op).collect())
    }

    pub fn task(body: impl TaskBody<T> + 'static) -> Self {
        Awaitable::Task(Box::new(body))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Awaitable::Value(_) => "value",
            Awaitable::Single(_) => "single",
            Awaitable::All(_) => "all",
            Awaitable::Task(_) => "task",
        }
    }
}

impl<T> fmt::Debug for Awaitable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Awaitable::All(entries) => f.debug_tuple("All").field(&entries.len()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}
