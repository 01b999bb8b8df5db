//! Background workers that drain bus subscriptions into pipeline handlers.

mod pipeline_worker;

pub use pipeline_worker::{
    MAX_CONCURRENT_LIMIT, PipelineWorker, WorkerHandle, WorkerOptions, WorkerStats,
};
