pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod integrity;
pub mod polling;
pub mod report;
pub mod runner;
pub mod state;

pub use config::PreservationConfig;
pub use context::PipelineContext;
pub use error::PipelineWarning;
pub use report::{
    CollectionStats, ConnectionReport, ConnectionStatus, CycleReport, DetailStatus,
    EnqueueReport, HashCheck, IntegrityReport, ItemResult, PollDetail, PollOutcome, PollReport,
    QueueDetail, QueueReport, StatusReport,
};
pub use runner::Processor;
pub use state::{BackendStatus, PreservationStatus};
