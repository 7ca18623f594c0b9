pub mod error;
pub mod operation;
pub mod awaitable;
pub mod body;
pub mod task;
pub mod scheduler;

pub use error::TaskError;
pub use operation::{Operation, OpState};
pub use awaitable::Awaitable;
pub use body::{Resume, Step, TaskBody};
pub use task::{TaskId, TaskState};
pub use scheduler::{DriveStats, Spawner, TaskHandle, TaskOutcome, TaskScheduler};
