pub mod pipeline;
pub mod report;
pub mod scheduler;

pub use pipeline::{AdapterPipeline, CycleRunner};
pub use report::CycleReport;
pub use scheduler::{PollingScheduler, SchedulerHandle, DEFAULT_INTERVAL, MIN_INTERVAL};
