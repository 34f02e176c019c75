use crate::context::Context;

/// Why a run failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// The model request failed.
    #[error("model error: {0}")]
    Model(String),
    /// The model returned neither content nor tool calls.
    #[error("model returned neither content nor tool calls")]
    EmptyResponse,
    /// The turn budget ran out before a final answer.
    #[error("exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),
    /// Something unexpected happened inside the run.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The outcome of [`Runner::run`](crate::Runner::run).
#[derive(Clone, Debug)]
pub struct RunResult {
    /// The final answer, empty on failure.
    pub content: String,
    /// The context the run operated on, including partial turns of a
    /// failed run.
    pub context: Context,
    /// Why the run failed, if it did.
    pub error: Option<RunError>,
}

impl RunResult {
    /// Returns whether the run produced a final answer.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns a human-readable error message if the run failed.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}
