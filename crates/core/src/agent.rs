mod builder;
mod prompt;

use std::fmt::{self, Display};
use std::str::FromStr;

use lite_agent_model::{Message, ToolSchema};
use serde::{Deserialize, Serialize};

use crate::model_client::ModelClient;
use crate::tool::ToolHandle;
pub use builder::AgentBuilder;

/// How tool calls are exchanged with the model.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallingStyle {
    /// Tool schemas are sent with the request and the model replies with
    /// structured tool calls.
    #[default]
    Native,
    /// The system prompt teaches the model a tag grammar and tool calls are
    /// parsed out of its reply text. For models without native tool calling.
    TagGrammar,
}

impl ToolCallingStyle {
    /// Returns the canonical name of the style.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallingStyle::Native => "native",
            ToolCallingStyle::TagGrammar => "tag_grammar",
        }
    }
}

impl Display for ToolCallingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolCallingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(ToolCallingStyle::Native),
            "tag_grammar" | "tag-grammar" | "tags" => {
                Ok(ToolCallingStyle::TagGrammar)
            }
            other => Err(format!("unknown tool calling style: {other}")),
        }
    }
}

/// A persona: instructions, a model, and the tools it may call.
///
/// An agent holds no conversation state, the same agent can serve any
/// number of [`Context`](crate::Context)s.
#[derive(Clone, Debug)]
pub struct Agent {
    name: String,
    instructions: String,
    model: ModelClient,
    tools: Vec<ToolHandle>,
    tool_calling_style: ToolCallingStyle,
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the static instructions.
    #[inline]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Returns the model client.
    #[inline]
    pub fn model(&self) -> &ModelClient {
        &self.model
    }

    /// Returns the registered tools, in registration order.
    #[inline]
    pub fn tools(&self) -> &[ToolHandle] {
        &self.tools
    }

    /// Returns the tool calling style of this agent.
    #[inline]
    pub fn tool_calling_style(&self) -> ToolCallingStyle {
        self.tool_calling_style
    }

    /// Builds the system message for the agent's own tool calling style.
    #[inline]
    pub fn system_message(&self) -> Message {
        self.system_message_for(self.tool_calling_style)
    }

    /// Builds the system message for the given tool calling style.
    ///
    /// Without tools this is just the instructions. Otherwise a short list
    /// of tool names is appended for [`ToolCallingStyle::Native`], and full
    /// tool descriptions plus the grammar specification for
    /// [`ToolCallingStyle::TagGrammar`].
    pub fn system_message_for(&self, style: ToolCallingStyle) -> Message {
        Message::system(prompt::system_prompt(
            &self.instructions,
            &self.tools,
            style,
        ))
    }

    /// Exports the schemas of all tools.
    pub fn tools_schema(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolHandle::schema).collect()
    }

    /// Finds a tool by name. The first match wins.
    pub fn find_tool(&self, name: &str) -> Option<&ToolHandle> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Appends a tool.
    pub fn add_tool(&mut self, tool: impl Into<ToolHandle>) {
        self.tools.push(tool.into());
    }

    /// Removes the first tool with the given name. Returns whether a tool
    /// was removed.
    pub fn remove_tool(&mut self, name: &str) -> bool {
        match self.tools.iter().position(|tool| tool.name() == name) {
            Some(idx) => {
                self.tools.remove(idx);
                true
            }
            None => false,
        }
    }
}

impl Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent({}, {} tools)", self.name, self.tools.len())
    }
}
