use lite_agent_model::ModelProvider;

use super::{Agent, ToolCallingStyle};
use crate::model_client::ModelClient;
use crate::tool::ToolHandle;

const DEFAULT_NAME: &str = "Assistant";
const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// [`Agent`] builder.
pub struct AgentBuilder {
    name: String,
    instructions: String,
    model: ModelClient,
    tools: Vec<ToolHandle>,
    tool_calling_style: ToolCallingStyle,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_model_client(ModelClient::new(provider))
    }

    /// Creates a new builder sharing an existing model client.
    #[inline]
    pub fn with_model_client(model: ModelClient) -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            instructions: DEFAULT_INSTRUCTIONS.to_owned(),
            model,
            tools: vec![],
            tool_calling_style: ToolCallingStyle::default(),
        }
    }

    /// Sets the name of the agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the static instructions of the agent.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool(mut self, tool: impl Into<ToolHandle>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Sets how tool calls are exchanged with the model.
    #[inline]
    pub fn with_tool_calling_style(mut self, style: ToolCallingStyle) -> Self {
        self.tool_calling_style = style;
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        let AgentBuilder {
            name,
            instructions,
            model,
            tools,
            tool_calling_style,
        } = self;
        Agent {
            name,
            instructions,
            model,
            tools,
            tool_calling_style,
        }
    }
}
