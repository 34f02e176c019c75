//! The turn loop.

mod event;
mod result;

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use lite_agent_model::{ModelFinishReason, Role, ToolCall};
use serde_json::Value;
use tracing::Instrument;

use crate::agent::{Agent, ToolCallingStyle};
use crate::context::Context;
use crate::model_client::ResponseDelta;
use crate::tool::{coerce_arguments, decode_arguments};
pub use event::RunEvent;
pub use result::{RunError, RunResult};

const DEFAULT_MAX_TURNS: usize = 10;

type EventSink<'a> = &'a mut (dyn FnMut(RunEvent) + Send);

/// Drives an [`Agent`] until it produces a final answer.
///
/// Each turn sends the conversation to the model. Tool calls in the reply
/// are executed one after another, in the order the model emitted them,
/// and the loop continues so the model can see their results. A reply
/// with content and no tool calls ends the run.
///
/// Content that arrives together with tool calls is treated as narration.
/// It is reported as [`RunEvent::Thinking`] and, once the final answer
/// arrives, stored in front of it in the final assistant message.
#[derive(Clone, Copy, Debug)]
pub struct Runner {
    max_turns: usize,
    tool_calling_style: Option<ToolCallingStyle>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a runner with a budget of 10 turns.
    #[inline]
    pub fn new() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tool_calling_style: None,
        }
    }

    /// Sets the maximum number of model calls per run.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Overrides the agent's tool calling style for runs made by this
    /// runner. The agent itself is left untouched.
    #[inline]
    pub fn with_tool_calling_style(mut self, style: ToolCallingStyle) -> Self {
        self.tool_calling_style = Some(style);
        self
    }

    /// Returns the maximum number of model calls per run.
    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Runs `agent` on `input`.
    ///
    /// A fresh [`Context`] is created when `context` is `None`. The run
    /// never panics and never returns early with an error, every outcome
    /// is described by the returned [`RunResult`].
    pub async fn run(
        &self,
        agent: &Agent,
        input: impl Into<String>,
        context: Option<Context>,
    ) -> RunResult {
        self.run_with_events(agent, input, context, |_| {}).await
    }

    /// Same as [`Runner::run`], reporting progress to `on_event`.
    pub async fn run_with_events(
        &self,
        agent: &Agent,
        input: impl Into<String>,
        context: Option<Context>,
        mut on_event: impl FnMut(RunEvent) + Send,
    ) -> RunResult {
        let input = input.into();
        let mut context = context.unwrap_or_default();
        let style = self
            .tool_calling_style
            .unwrap_or_else(|| agent.tool_calling_style());
        let span = info_span!("run", agent = agent.name(), %style);

        let outcome = AssertUnwindSafe(self.drive(
            agent,
            &input,
            &mut context,
            style,
            &mut on_event,
        ))
        .catch_unwind()
        .instrument(span)
        .await
        .unwrap_or_else(|payload| {
            Err(RunError::Internal(panic_message(payload)))
        });
        context.record_turn(agent.name());

        match outcome {
            Ok(content) => RunResult {
                content,
                context,
                error: None,
            },
            Err(err) => {
                warn!("run failed: {err}");
                on_event(RunEvent::Error(err.to_string()));
                RunResult {
                    content: String::new(),
                    context,
                    error: Some(err),
                }
            }
        }
    }

    async fn drive(
        &self,
        agent: &Agent,
        input: &str,
        context: &mut Context,
        style: ToolCallingStyle,
        on_event: EventSink<'_>,
    ) -> Result<String, RunError> {
        on_event(RunEvent::Question(input.to_owned()));
        if context.messages().is_empty() {
            context.push(agent.system_message_for(style));
        }
        context.add_message(Role::User, input);

        let tools = agent.tools_schema();
        let mut narration: Vec<String> = vec![];
        for turn in 0..self.max_turns {
            let span = debug_span!("turn", turn);
            let resp = agent
                .model()
                .generate(context.messages_for_api(), &tools, style, |delta| {
                    on_event(match delta {
                        ResponseDelta::Content(text) => {
                            RunEvent::ContentDelta(text)
                        }
                        ResponseDelta::Reasoning(text) => {
                            RunEvent::ThinkingDelta(text)
                        }
                    })
                })
                .instrument(span.clone())
                .await;
            context.add_usage(resp.usage);
            debug!(
                parent: &span,
                finish_reason = %resp.finish_reason,
                tool_calls = resp.tool_calls.len(),
                "model replied"
            );

            if resp.finish_reason == ModelFinishReason::Error {
                return Err(RunError::Model(resp.content.unwrap_or_default()));
            }

            if !resp.tool_calls.is_empty() {
                if let Some(content) = &resp.content {
                    on_event(RunEvent::Thinking(content.clone()));
                }
                let mut succeeded = 0;
                for call in &resp.tool_calls {
                    if dispatch(agent, call, style, context, on_event)
                        .instrument(span.clone())
                        .await
                    {
                        succeeded += 1;
                    }
                }
                if succeeded > 0 {
                    narration.extend(resp.content);
                    continue;
                }
                // Nothing succeeded, so the content (if any) is all the
                // model has to say.
            }

            let Some(answer) = resp.content else {
                return Err(RunError::EmptyResponse);
            };
            narration.push(answer.clone());
            context.add_message(Role::Assistant, narration.join("\n\n"));
            on_event(RunEvent::Answer(answer.clone()));
            return Ok(answer);
        }

        Err(RunError::MaxTurnsExceeded(self.max_turns))
    }
}

/// Executes one tool call and records the outcome in the context. Returns
/// whether the tool succeeded.
///
/// Tag grammar arguments are text, so they are coerced to the types the
/// tool's schema declares first.
async fn dispatch(
    agent: &Agent,
    call: &ToolCall,
    style: ToolCallingStyle,
    context: &mut Context,
    on_event: EventSink<'_>,
) -> bool {
    let name = call.function.name.as_str();
    let tool = agent.find_tool(name);
    let mut arguments = decode_arguments(&call.function.arguments);
    if let (Some(tool), ToolCallingStyle::TagGrammar) = (tool, style) {
        coerce_arguments(&mut arguments, tool.parameter_schema());
    }
    let arguments = Value::Object(arguments);
    on_event(RunEvent::ToolCall {
        name: name.to_owned(),
        arguments: arguments.clone(),
    });

    let Some(tool) = tool else {
        warn!("model requested an unknown tool: {name}");
        let message = format!("Tool not found: {name}");
        context.add_message(Role::System, message.as_str());
        on_event(RunEvent::ToolResult {
            name: name.to_owned(),
            success: false,
            output: message,
        });
        return false;
    };

    match tool.execute(arguments.clone()).await {
        Ok(output) => {
            context.add_tool_call(name, &arguments, output.as_str());
            on_event(RunEvent::ToolResult {
                name: name.to_owned(),
                success: true,
                output,
            });
            true
        }
        Err(err) => {
            let message = format!("Tool {name} failed: {}", err.reason());
            context.add_message(Role::System, message.as_str());
            on_event(RunEvent::ToolResult {
                name: name.to_owned(),
                success: false,
                output: message,
            });
            false
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
