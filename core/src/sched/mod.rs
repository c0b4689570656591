mod process;
mod scheduler;
mod sync;

pub use process::{ProcMeta, ProcState};
pub use scheduler::{run_to_completion, step_process, RunOutcome, SchedRef, SchedulerCore};
pub use sync::{MonitorCore, SemaphoreCore, SharedQueueCore};
