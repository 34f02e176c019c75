use lite_agent_core::context::Context;
use lite_agent_core::tool::ToolHandle;
use lite_agent_core::{
    Agent, AgentBuilder, RunError, RunEvent, Runner, ToolCallingStyle,
};
use lite_agent_model::{ModelProvider, Usage};

use crate::settings::Settings;
use crate::tools::builtin_tools;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    runner: Runner,
    builtin_tools: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        Self::with_agent_builder(AgentBuilder::with_model_provider(provider))
    }

    /// Creates a session builder backed by the OpenAI-compatible provider
    /// described by `settings`.
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            runner: settings.runner(),
            ..Self::with_agent_builder(settings.agent_builder())
        }
    }

    fn with_agent_builder(agent_builder: AgentBuilder) -> Self {
        Self {
            agent_builder,
            runner: Runner::new(),
            builtin_tools: true,
        }
    }

    /// Sets the name of the agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent_builder = self.agent_builder.with_name(name);
        self
    }

    /// Sets the instructions for the agent.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.agent_builder =
            self.agent_builder.with_instructions(instructions);
        self
    }

    /// Registers an extra tool.
    #[inline]
    pub fn with_tool(mut self, tool: impl Into<ToolHandle>) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Controls whether the built-in tools are registered. They are by
    /// default.
    #[inline]
    pub fn with_builtin_tools(mut self, enabled: bool) -> Self {
        self.builtin_tools = enabled;
        self
    }

    /// Sets the maximum number of model calls per input.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.runner = self.runner.with_max_turns(max_turns);
        self
    }

    /// Sets how tool calls are exchanged with the model.
    #[inline]
    pub fn with_tool_calling_style(
        mut self,
        style: ToolCallingStyle,
    ) -> Self {
        self.agent_builder =
            self.agent_builder.with_tool_calling_style(style);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let mut agent_builder = self.agent_builder;
        if self.builtin_tools {
            for tool in builtin_tools() {
                agent_builder = agent_builder.with_tool(tool);
            }
        }

        Session {
            agent: agent_builder.build(),
            runner: self.runner,
            context: Context::new(),
        }
    }
}

/// A chat session, like a window that displays messages and has a input
/// box.
///
/// The session keeps one agent and one conversation across inputs, so each
/// message sees everything said before it.
pub struct Session {
    agent: Agent,
    runner: Runner,
    context: Context,
}

impl Session {
    /// Sends a message to the session and waits for the answer.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<String, RunError> {
        self.send_message_with_events(message, |_| {}).await
    }

    /// Same as [`Session::send_message`], reporting progress to `on_event`.
    ///
    /// Cancel safe: the run works on a copy of the conversation, which
    /// replaces the session's only when the run completes.
    pub async fn send_message_with_events(
        &mut self,
        message: &str,
        on_event: impl FnMut(RunEvent) + Send,
    ) -> Result<String, RunError> {
        let context = self.context.clone();
        let result = self
            .runner
            .run_with_events(&self.agent, message, Some(context), on_event)
            .await;
        self.context = result.context;
        match result.error {
            None => Ok(result.content),
            Some(err) => Err(err),
        }
    }

    /// Returns the agent driving this session.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the tokens used since the session started.
    #[inline]
    pub fn usage(&self) -> Usage {
        self.context.usage()
    }

    /// Forgets the conversation and starts over.
    pub fn reset(&mut self) {
        debug!("resetting session {}", self.context.id());
        self.context = Context::new();
    }
}
