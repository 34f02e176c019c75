use std::fmt::{self, Display};
use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;
use crate::{ToolCall, Usage};

/// A response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
    /// The output was cut off by the token limit.
    Length,
    /// The output was withheld by the provider's content filter.
    ContentFilter,
    /// The request failed before the model could finish.
    Error,
}

impl ModelFinishReason {
    /// Maps a finish reason string reported by a provider.
    ///
    /// Unknown values are treated as [`ModelFinishReason::Stop`].
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
            "length" => ModelFinishReason::Length,
            "content_filter" => ModelFinishReason::ContentFilter,
            "error" => ModelFinishReason::Error,
            _ => ModelFinishReason::Stop,
        }
    }

    /// Returns the wire name of this reason.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFinishReason::ToolCalls => "tool_calls",
            ModelFinishReason::Stop => "stop",
            ModelFinishReason::Length => "length",
            ModelFinishReason::ContentFilter => "content_filter",
            ModelFinishReason::Error => "error",
        }
    }
}

impl Display for ModelFinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The response has been completed.
    Completed(ModelFinishReason),
    /// Received a message delta.
    MessageDelta(String),
    /// Received a delta of the model's separate reasoning channel, for
    /// providers that have one.
    ReasoningDelta(String),
    /// Received a complete tool call request.
    ToolCall(ToolCall),
    /// Received the token accounting of this response.
    Usage(Usage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        for reason in [
            ModelFinishReason::ToolCalls,
            ModelFinishReason::Stop,
            ModelFinishReason::Length,
            ModelFinishReason::ContentFilter,
            ModelFinishReason::Error,
        ] {
            let mapped = ModelFinishReason::from_provider(reason.as_str());
            assert_eq!(mapped, reason);
        }
        assert_eq!(
            ModelFinishReason::from_provider("function_call"),
            ModelFinishReason::ToolCalls
        );
        assert_eq!(
            ModelFinishReason::from_provider("eos"),
            ModelFinishReason::Stop
        );
    }
}
