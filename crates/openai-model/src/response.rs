use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use lite_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent, ToolCall,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, ToolCallDelta};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // Tool calls arrive as fragments keyed by index. They are merged here
    // and only emitted once the choice finishes, so that every emitted call
    // carries its complete arguments.
    tool_calls: Vec<ToolCallDelta>,
    // Events decoded from the stream but not yet returned to the caller.
    pending_events: VecDeque<ModelResponseEvent>,
    completed: bool,
    exhausted: bool,
}

impl PartialState {
    fn absorb(&mut self, chunk: ChatCompletionChunk) {
        if let Some(usage) = chunk.usage {
            self.pending_events
                .push_back(ModelResponseEvent::Usage(usage.into()));
        }

        for choice in chunk.choices {
            let delta = choice.delta;
            if let Some(reasoning_content) = delta.reasoning_content {
                if !reasoning_content.is_empty() {
                    self.pending_events.push_back(
                        ModelResponseEvent::ReasoningDelta(reasoning_content),
                    );
                }
            }
            if let Some(content) = delta.content {
                if !content.is_empty() {
                    self.pending_events
                        .push_back(ModelResponseEvent::MessageDelta(content));
                }
            }
            for tool_call in delta.tool_calls.into_iter().flatten() {
                self.merge_tool_call(tool_call);
            }
            if let Some(finish_reason) = choice.finish_reason {
                self.flush_tool_calls();
                self.completed = true;
                self.pending_events.push_back(ModelResponseEvent::Completed(
                    ModelFinishReason::from_provider(&finish_reason),
                ));
            }
        }
    }

    fn merge_tool_call(&mut self, tool_call: ToolCallDelta) {
        let Some(partial_tool_call) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.tool_calls.push(tool_call);
            return;
        };
        // Patch the partial tool call.
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        if let Some(function) = tool_call.function {
            match partial_tool_call.function {
                Some(ref mut partial_func) => {
                    if let Some(name) = function.name {
                        partial_func
                            .name
                            .get_or_insert_default()
                            .push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial_func
                            .arguments
                            .get_or_insert_default()
                            .push_str(&arguments);
                    }
                }
                None => partial_tool_call.function = Some(function),
            }
        }
    }

    fn flush_tool_calls(&mut self) {
        for (idx, tool_call) in self.tool_calls.drain(..).enumerate() {
            let function = tool_call.function.unwrap_or_default();
            let id = tool_call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{idx}"));
            self.pending_events
                .push_back(ModelResponseEvent::ToolCall(ToolCall::function(
                    id,
                    function.name.unwrap_or_default(),
                    function.arguments.unwrap_or_default(),
                )));
        }
    }

    fn finish(&mut self) {
        if !self.completed {
            // The stream ended without a finish reason, deliver whatever
            // tool calls we have collected so far.
            self.flush_tool_calls();
        }
        self.exhausted = true;
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            tool_calls: Default::default(),
            pending_events: Default::default(),
            completed: false,
            exhausted: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.exhausted {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.finish();
                continue;
            }
            Err(err) => {
                let kind = match err {
                    SseError::ChunksError(_) => ErrorKind::Network,
                    SseError::InvalidPayload => ErrorKind::Other,
                };
                return Err(Error::new(format!("{err:?}"), kind));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finish();
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if let Some(api_error) = chunk.error {
            return Err(Error::new(api_error.message, ErrorKind::Other));
        }
        if !chunk.id.is_empty()
            && partial_state.id.get_or_insert_with(|| chunk.id.clone())
                != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }

        partial_state.absorb(chunk);
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use lite_agent_model::Usage;

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(fixture: &'static [u8]) -> Vec<ModelResponseEvent> {
        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(fixture)].into());
        let sse = Sse::new(chunks);
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_tool_call_events() {
        let events =
            collect_events(include_bytes!("../fixtures/tool_calls.txt")).await;

        let tool_calls: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            tool_calls,
            vec![
                ToolCall::function(
                    "call_abc",
                    "get_weather",
                    r#"{"city":"Beijing"}"#
                ),
                ToolCall::function(
                    "call_def",
                    "get_weather",
                    r#"{"city":"Shanghai"}"#
                ),
            ]
        );

        // Tool calls must be complete before the completion event.
        let completed_idx = events
            .iter()
            .position(|event| {
                *event
                    == ModelResponseEvent::Completed(
                        ModelFinishReason::ToolCalls,
                    )
            })
            .unwrap();
        assert!(events[..completed_idx].iter().any(|event| matches!(
            event,
            ModelResponseEvent::ToolCall(_)
        )));
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Usage(Usage::new(20, 12, 32)))
        );
    }

    #[tokio::test]
    async fn test_text_events() {
        let events =
            collect_events(include_bytes!("../fixtures/text.txt")).await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::ReasoningDelta("Simple.".to_owned()),
                ModelResponseEvent::MessageDelta("2+2 ".to_owned()),
                ModelResponseEvent::MessageDelta("is 4.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
                ModelResponseEvent::Usage(Usage::new(9, 5, 14)),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_payload() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(
                b"data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
            )]
            .into(),
        );
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "quota exceeded");
    }
}
