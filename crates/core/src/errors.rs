use thiserror::Error;

/// Failure taxonomy for one chat turn. Model-call failures never appear here:
/// the model-backed components absorb them into deterministic fallbacks, so a
/// turn can only fail on input validation, chatbot resolution, or the user
/// message write.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}
