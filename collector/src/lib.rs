mod clock;
mod job;
mod scheduler;

pub use clock::{Clock, SystemClock};
pub use job::{CollectorJob, Job, TickSummary};
pub use scheduler::Scheduler;
