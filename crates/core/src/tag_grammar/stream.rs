use super::{THINKING_CLOSE, THINKING_OPEN, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::model_client::ResponseDelta;

const TEXT_TAGS: [&str; 3] = [THINKING_OPEN, THINKING_CLOSE, TOOL_CALL_OPEN];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Text,
    InThinking,
    InToolCall,
}

/// Splits streamed text into displayable deltas as it arrives.
///
/// Text inside `<thinking>` is reported as [`ResponseDelta::Reasoning`],
/// `<tool_call>` blocks are held back, and everything else is reported as
/// [`ResponseDelta::Content`]. A tag split across two deltas is buffered
/// until it can be recognized. An unterminated tool call block is released
/// as content by [`TagStreamFilter::finish`].
#[derive(Debug)]
pub struct TagStreamFilter {
    state: State,
    buf: String,
}

impl Default for TagStreamFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TagStreamFilter {
    /// Creates a filter in the plain text state.
    pub fn new() -> Self {
        Self {
            state: State::Text,
            buf: String::new(),
        }
    }

    /// Feeds a delta and returns whatever can be shown now.
    pub fn push(&mut self, delta: &str) -> Vec<ResponseDelta> {
        self.buf.push_str(delta);
        let mut out = vec![];
        loop {
            match self.state {
                State::Text => {
                    // A stray closing thinking tag is dropped.
                    let next_tag = [
                        (THINKING_OPEN, State::InThinking),
                        (THINKING_CLOSE, State::Text),
                        (TOOL_CALL_OPEN, State::InToolCall),
                    ]
                    .into_iter()
                    .filter_map(|(tag, state)| {
                        Some((self.buf.find(tag)?, tag, state))
                    })
                    .min_by_key(|(idx, _, _)| *idx);
                    match next_tag {
                        Some((idx, tag, state)) => {
                            emit_content(&mut out, self.buf.drain(..idx));
                            if state != State::InToolCall {
                                self.buf.drain(..tag.len());
                            }
                            self.state = state;
                        }
                        None => {
                            let keep =
                                partial_suffix_len(&self.buf, &TEXT_TAGS);
                            let end = self.buf.len() - keep;
                            emit_content(&mut out, self.buf.drain(..end));
                            break;
                        }
                    }
                }
                State::InThinking => match self.buf.find(THINKING_CLOSE) {
                    Some(idx) => {
                        emit_reasoning(&mut out, self.buf.drain(..idx));
                        self.buf.drain(..THINKING_CLOSE.len());
                        self.state = State::Text;
                    }
                    None => {
                        let keep =
                            partial_suffix_len(&self.buf, &[THINKING_CLOSE]);
                        let end = self.buf.len() - keep;
                        emit_reasoning(&mut out, self.buf.drain(..end));
                        break;
                    }
                },
                // The opening tag stays in the buffer so an unterminated
                // block can be released verbatim.
                State::InToolCall => match self.buf.find(TOOL_CALL_CLOSE) {
                    Some(idx) => {
                        self.buf.drain(..idx + TOOL_CALL_CLOSE.len());
                        self.state = State::Text;
                    }
                    None => break,
                },
            }
        }
        out
    }

    /// Releases anything still buffered at the end of the stream.
    pub fn finish(self) -> Vec<ResponseDelta> {
        let mut out = vec![];
        match self.state {
            State::Text | State::InToolCall => {
                emit_content(&mut out, self.buf.chars());
            }
            State::InThinking => emit_reasoning(&mut out, self.buf.chars()),
        }
        out
    }
}

fn emit_content(
    out: &mut Vec<ResponseDelta>,
    text: impl Iterator<Item = char>,
) {
    let text: String = text.collect();
    if !text.is_empty() {
        out.push(ResponseDelta::Content(text));
    }
}

fn emit_reasoning(
    out: &mut Vec<ResponseDelta>,
    text: impl Iterator<Item = char>,
) {
    let text: String = text.collect();
    if !text.is_empty() {
        out.push(ResponseDelta::Reasoning(text));
    }
}

/// Returns the length of the longest suffix of `buf` that is a proper
/// prefix of one of `tags`.
fn partial_suffix_len(buf: &str, tags: &[&str]) -> usize {
    tags.iter()
        .flat_map(|tag| {
            (1..tag.len().min(buf.len() + 1))
                .rev()
                .find(|&len| buf.ends_with(&tag[..len]))
        })
        .max()
        .unwrap_or(0)
}
