use serde_json::Value;

/// Progress reported while a run is in progress.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    /// The user input that started the run.
    Question(String),
    /// A streamed piece of the reply text.
    ContentDelta(String),
    /// A streamed piece of reasoning or thinking text.
    ThinkingDelta(String),
    /// Narration the model produced alongside tool calls.
    Thinking(String),
    /// A tool is about to be called.
    ToolCall {
        /// Name of the requested tool.
        name: String,
        /// Decoded arguments.
        arguments: Value,
    },
    /// A tool call finished, or could not be dispatched.
    ToolResult {
        /// Name of the requested tool.
        name: String,
        /// Whether the tool succeeded.
        success: bool,
        /// The tool output, or the error message.
        output: String,
    },
    /// The final answer.
    Answer(String),
    /// The run failed.
    Error(String),
}
