use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use lite_agent_model::{
    Message, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ToolCall, ToolSchema,
    Usage,
};
use tracing::Instrument;

use crate::agent::ToolCallingStyle;
use crate::tag_grammar::{self, TagStreamFilter};

type BoxedError = Box<dyn ModelProviderError>;

trait ErasedResponse: Send {
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, BoxedError>>;
}

impl<R: ModelResponse> ErasedResponse for R {
    #[inline]
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, BoxedError>> {
        ModelResponse::poll_next_event(self, cx)
            .map_err(|err| Box::new(err) as BoxedError)
    }
}

type BoxedResponse = Pin<Box<dyn ErasedResponse>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = Result<BoxedResponse, BoxedError>> + Send>>;
type HandlerFn =
    Arc<dyn Fn(&ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules, and normalizes a streamed response into one
/// [`ModelClientResponse`].
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    /// Wraps a model provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(
            move |req: &ModelRequest| -> BoxedSendRequestFuture {
                let fut = provider.send_request(req);
                Box::pin(async move {
                    let resp =
                        fut.await.map_err(|err| Box::new(err) as BoxedError)?;
                    Ok(Box::pin(resp) as BoxedResponse)
                })
            },
        );
        Self { handler_fn }
    }

    /// Sends one request and collects the whole response.
    ///
    /// With [`ToolCallingStyle::TagGrammar`], no tool schemas are sent and
    /// tool calls are parsed out of the reply text instead. `on_delta`
    /// observes the reply while it streams.
    ///
    /// This never fails. A transport failure is reported as a response with
    /// a descriptive `content` and [`ModelFinishReason::Error`].
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        tools: &[ToolSchema],
        style: ToolCallingStyle,
        mut on_delta: impl FnMut(ResponseDelta) + Send,
    ) -> ModelClientResponse {
        let req = ModelRequest {
            messages,
            tools: match style {
                ToolCallingStyle::Native => tools.to_vec(),
                ToolCallingStyle::TagGrammar => vec![],
            },
        };
        trace!("sending a request: {req:?}");
        let resp_or_err = self
            .collect(&req, style, &mut on_delta)
            .instrument(trace_span!("model client req"))
            .await;
        match resp_or_err {
            Ok(resp) => resp,
            Err(err) => {
                error!("model request failed: {err}");
                ModelClientResponse::failure(err.as_ref())
            }
        }
    }

    async fn collect(
        &self,
        req: &ModelRequest,
        style: ToolCallingStyle,
        on_delta: &mut (impl FnMut(ResponseDelta) + Send),
    ) -> Result<ModelClientResponse, BoxedError> {
        let mut resp = (self.handler_fn)(req).await?;

        let mut content = String::new();
        let mut reasoning = String::new();
        let mut tool_calls = vec![];
        let mut usage = Usage::default();
        let mut finish_reason = None;
        let mut filter = match style {
            ToolCallingStyle::Native => None,
            ToolCallingStyle::TagGrammar => Some(TagStreamFilter::new()),
        };

        trace!("start receiving events");
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            trace!("got an event: {event:?}");
            match event {
                ModelResponseEvent::MessageDelta(delta) => {
                    match &mut filter {
                        Some(filter) => {
                            for delta in filter.push(&delta) {
                                on_delta(delta);
                            }
                        }
                        None => on_delta(ResponseDelta::Content(delta.clone())),
                    }
                    content.push_str(&delta);
                }
                ModelResponseEvent::ReasoningDelta(delta) => {
                    reasoning.push_str(&delta);
                    on_delta(ResponseDelta::Reasoning(delta));
                }
                ModelResponseEvent::ToolCall(call) => tool_calls.push(call),
                ModelResponseEvent::Usage(u) => usage = u,
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason);
                }
            }
        }
        if let Some(filter) = filter {
            for delta in filter.finish() {
                on_delta(delta);
            }
        }
        trace!("finished a request");

        let mut finish_reason =
            finish_reason.unwrap_or(ModelFinishReason::Stop);
        if style == ToolCallingStyle::TagGrammar {
            let parsed = tag_grammar::parse(&content);
            content = parsed.content;
            if !parsed.tool_calls.is_empty() {
                tool_calls.splice(0..0, parsed.tool_calls);
                if finish_reason == ModelFinishReason::Stop {
                    finish_reason = ModelFinishReason::ToolCalls;
                }
            }
        }

        Ok(ModelClientResponse {
            content: non_blank(content),
            reasoning: non_blank(reasoning),
            tool_calls,
            usage,
            finish_reason,
        })
    }
}

impl Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").finish_non_exhaustive()
    }
}

fn non_blank(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

/// A piece of a reply observed while it streams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseDelta {
    /// Text meant for the user.
    Content(String),
    /// Reasoning or thinking text.
    Reasoning(String),
}

/// A completely received response from the model client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelClientResponse {
    /// The reply text. `None` when the model said nothing, or only
    /// whitespace.
    pub content: Option<String>,
    /// Reasoning text reported separately by the provider.
    pub reasoning: Option<String>,
    /// Tool calls requested by the model, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage reported by the provider, zero if absent.
    pub usage: Usage,
    /// The reason the model finished generating.
    pub finish_reason: ModelFinishReason,
}

impl ModelClientResponse {
    fn failure(err: &dyn ModelProviderError) -> Self {
        Self {
            content: Some(format!(
                "model request failed ({}): {err}",
                err.kind()
            )),
            reasoning: None,
            tool_calls: vec![],
            usage: Usage::default(),
            finish_reason: ModelFinishReason::Error,
        }
    }
}
