use qg_errors::{ConnectionError, ErrorClass, ExecutionError, PlannerError, ValidationError};
use serde::Serialize;

/// Union of every error a pipeline run may fail with (§4.7, §7). Each
/// variant already knows its own HTTP class; a front end never needs to
/// match on strings to pick a status code.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ErrorClass for PipelineError {
    fn http_status(&self) -> u16 {
        match self {
            PipelineError::Validation(e) => e.http_status(),
            PipelineError::Planner(e) => e.http_status(),
            PipelineError::Execution(e) => e.http_status(),
            PipelineError::Connection(e) => e.http_status(),
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PipelineError::Validation(e) => e.serialize(serializer),
            PipelineError::Planner(e) => e.serialize(serializer),
            PipelineError::Execution(e) => e.serialize(serializer),
            PipelineError::Connection(e) => e.serialize(serializer),
        }
    }
}
