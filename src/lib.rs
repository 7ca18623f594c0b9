pub mod runtime;
pub mod preload;
pub mod host;

pub use runtime::{
    Awaitable, DriveStats, Operation, OpState, Resume, Spawner, Step, TaskBody, TaskError,
    TaskHandle, TaskOutcome, TaskScheduler,
};
