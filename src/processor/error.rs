use thiserror::Error;

use crate::translator::TranslatorError;

/// Failure of a single processor invocation.
///
/// Pipelines log these and move on; they never reach the caller of `pump`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Processor failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Translator(#[from] TranslatorError),
    #[error("Processor timed out")]
    Timeout,
    /// The main thread executor is gone or dropped the task
    #[error("Main thread executor is closed")]
    ExecutorClosed,
}

/// Errors raised while wiring a pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Processor with name {name} already registered in {pipeline}")]
    DuplicateProcessor { pipeline: String, name: String },
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;
