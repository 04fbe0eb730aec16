pub mod pipeline;

pub use pipeline::{
    PipelineConfig, SubmissionKind, SubmissionRequest, TransactionPipeline,
};
