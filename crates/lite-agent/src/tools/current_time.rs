use chrono::Local;
use lite_agent_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The tool takes no parameters.
#[derive(Deserialize, JsonSchema)]
pub struct CurrentTimeToolParameters {}

/// A tool reporting the local wall-clock time.
pub struct CurrentTimeTool {
    parameter_schema: Value,
}

impl CurrentTimeTool {
    /// Creates a new current time tool.
    #[inline]
    pub fn new() -> Self {
        CurrentTimeTool {
            parameter_schema: schema_for!(CurrentTimeToolParameters).to_value(),
        }
    }
}

impl Default for CurrentTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CurrentTimeTool {
    type Input = CurrentTimeToolParameters;

    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time as `YYYY-MM-DD HH:MM:SS`."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: CurrentTimeToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move { Ok(Local::now().format(FORMAT).to_string()) }
    }
}
