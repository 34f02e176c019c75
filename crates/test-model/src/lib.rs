//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use lite_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.events.is_empty() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        Poll::Ready(Ok(this.events.pop_front()))
    }
}

#[derive(Default)]
struct State {
    script: Vec<PresetResponse>,
    cursor: usize,
    failed_attempts: u64,
    repeat_last: bool,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Responses are served from a script in the order they were added, one
/// per successful request. Clones share the same script, so a test can keep
/// a handle to inspect the requests after handing the provider to an agent.
/// If the script is exhausted, an error will be returned unless
/// [`TestModelProvider::set_repeat_last`] is enabled.
#[derive(Clone)]
pub struct TestModelProvider {
    state: Arc<Mutex<State>>,
    delay: Duration,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self {
            state: Default::default(),
            delay: Duration::from_millis(1),
        }
    }
}

impl TestModelProvider {
    /// Creates a provider that serves `responses` in order.
    pub fn with_script(
        responses: impl IntoIterator<Item = PresetResponse>,
    ) -> Self {
        let provider = Self::default();
        provider.lock().script.extend(responses);
        provider
    }

    #[inline]
    pub fn add_response(&self, preset: PresetResponse) {
        self.lock().script.push(preset);
    }

    /// Keeps serving the last scripted response once the script runs out.
    #[inline]
    pub fn set_repeat_last(&self, repeat_last: bool) {
        self.lock().repeat_last = repeat_last;
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = duration;
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, Error> {
        let mut state = self.lock();
        state.requests.push(req.clone());

        let preset = match state.script.get(state.cursor) {
            Some(preset) => preset.clone(),
            None if state.repeat_last => match state.script.last() {
                Some(preset) => preset.clone(),
                None => return Err(exhausted()),
            },
            None => return Err(exhausted()),
        };

        match preset.failures {
            Some(0) => {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(failures) if state.failed_attempts < failures => {
                state.failed_attempts += 1;
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }
        state.failed_attempts = 0;
        if state.cursor < state.script.len() {
            state.cursor += 1;
        }

        let finish_reason = preset.resolved_finish_reason();
        let mut events: VecDeque<_> = preset
            .events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(delta) => {
                    ModelResponseEvent::MessageDelta(delta)
                }
                PresetEvent::ReasoningDelta(delta) => {
                    ModelResponseEvent::ReasoningDelta(delta)
                }
                PresetEvent::ToolCall(call) => {
                    ModelResponseEvent::ToolCall(call)
                }
                PresetEvent::Usage(usage) => ModelResponseEvent::Usage(usage),
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(finish_reason));

        Ok(TestModelResponse {
            events,
            delay: self.delay,
            sleep: None,
        })
    }
}

fn exhausted() -> Error {
    Error {
        message: "no enough steps",
        kind: ErrorKind::Other,
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use lite_agent_model::{
        Message, ModelFinishReason, ToolCall, ToolSchema, Usage,
    };
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Vec<ToolCall>, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_calls = vec![];
        let mut finish_reason = None;
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            match event {
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(call) => tool_calls.push(call),
                ModelResponseEvent::ReasoningDelta(_)
                | ModelResponseEvent::Usage(_) => {}
            }
        }
        (msg, tool_calls, finish_reason)
    }

    fn request(input: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![Message::user(input)],
            tools: vec![ToolSchema {
                name: "read_file".to_owned(),
                description: "Reads a file".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "The name of the file to read"
                        }
                    }
                }),
            }],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::with_script([
            PresetResponse::with_events([
                PresetEvent::MessageDelta("Hello, ".to_owned()),
                PresetEvent::MessageDelta("world!".to_owned()),
                PresetEvent::Usage(Usage::new(3, 2, 5)),
            ]),
            PresetResponse::with_events([
                PresetEvent::MessageDelta(
                    "Sure, let me take a look.".to_owned(),
                ),
                PresetEvent::tool_call(
                    "tool:1",
                    "read_file",
                    r#"{"filename":"todo.txt"}"#,
                ),
            ]),
        ]);

        let resp = provider.send_request(&request("Hi")).await.unwrap();
        let (msg, tool_calls, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert!(tool_calls.is_empty());
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        let resp =
            provider.send_request(&request("Check my todo")).await.unwrap();
        let (msg, tool_calls, reason) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me take a look.");
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].function.name, "read_file");
        assert_eq!(
            tool_calls[0].function.arguments,
            r#"{"filename":"todo.txt"}"#
        );
        assert_eq!(reason, Some(ModelFinishReason::ToolCalls));

        assert!(provider.send_request(&request("More")).await.is_err());
        assert_eq!(provider.request_count(), 3);
        assert_eq!(
            provider.requests()[1].messages[0].content.as_deref(),
            Some("Check my todo")
        );
    }

    #[tokio::test]
    async fn test_failures() {
        let provider = TestModelProvider::with_script([
            PresetResponse::text("ok").with_failures(2),
            PresetResponse::text("never").with_failures(0),
        ]);

        for _ in 0..2 {
            let err =
                provider.send_request(&request("hi")).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&request("hi")).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "ok");

        for _ in 0..3 {
            assert!(provider.send_request(&request("hi")).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_repeat_last() {
        let provider =
            TestModelProvider::with_script([PresetResponse::text("again")]);
        provider.set_repeat_last(true);
        for _ in 0..3 {
            let resp = provider.send_request(&request("hi")).await.unwrap();
            assert_eq!(collect_response(resp).await.0, "again");
        }
    }
}
