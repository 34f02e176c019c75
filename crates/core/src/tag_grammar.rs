//! The text-embedded tool call grammar.
//!
//! Models without native tool calling are instructed to emit calls as
//! tagged blocks inside their reply:
//!
//! ```text
//! <thinking>free text</thinking>
//! <tool_call><name>TOOL</name><args><PARAM>VALUE</PARAM>...</args></tool_call>
//! ```
//!
//! Parsing is lenient. A block that does not match the grammar exactly is
//! never an error, it is simply left in the content as text. Argument
//! values are taken verbatim up to their own closing tag, so a value can
//! contain anything except that tag. Thinking tags are removed wherever
//! they appear, paired or not, and their prose is kept.

mod stream;

use lite_agent_model::ToolCall;
use serde_json::{Map, Value};
use uuid::Uuid;

pub use stream::TagStreamFilter;

const TOOL_CALL_OPEN: &str = "<tool_call>";
const TOOL_CALL_CLOSE: &str = "</tool_call>";
const THINKING_OPEN: &str = "<thinking>";
const THINKING_CLOSE: &str = "</thinking>";

/// The result of [`parse`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedText {
    /// The text with recognized blocks removed and blank lines collapsed.
    pub content: String,
    /// Well-formed tool calls, in document order.
    pub tool_calls: Vec<ToolCall>,
}

/// Extracts tool calls from `text` and cleans up the remaining prose.
///
/// `<thinking>` and `</thinking>` tags are removed but the text between
/// them is kept.
pub fn parse(text: &str) -> ParsedText {
    let mut content = String::with_capacity(text.len());
    let mut tool_calls = vec![];
    let mut rest = text;

    while let Some(idx) = rest.find(TOOL_CALL_OPEN) {
        content.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match parse_tool_call(rest) {
            Some((call, consumed)) => {
                tool_calls.push(call);
                rest = &rest[consumed..];
            }
            None => {
                trace!("skipping malformed tool call block");
                content.push_str(TOOL_CALL_OPEN);
                rest = &rest[TOOL_CALL_OPEN.len()..];
            }
        }
    }
    content.push_str(rest);

    let content = content
        .replace(THINKING_OPEN, "")
        .replace(THINKING_CLOSE, "");
    ParsedText {
        content: collapse_blank_lines(&content),
        tool_calls,
    }
}

/// Parses one `<tool_call>` block at the start of `s`, returning the call
/// and the number of bytes it spans.
fn parse_tool_call(s: &str) -> Option<(ToolCall, usize)> {
    let mut cursor = Cursor { s, pos: 0 };
    cursor.expect(TOOL_CALL_OPEN)?;
    cursor.skip_ws();
    cursor.expect("<name>")?;
    let name = cursor.take_until("</name>")?.trim();
    if name.is_empty() || name.contains('<') {
        return None;
    }
    cursor.skip_ws();

    let mut arguments = Map::new();
    cursor.expect("<args>")?;
    loop {
        cursor.skip_ws();
        if cursor.eat("</args>") {
            break;
        }
        cursor.expect("<")?;
        let key = cursor.take_until(">")?;
        if !is_valid_key(key) {
            return None;
        }
        let value = cursor.take_until(&format!("</{key}>"))?;
        let value = Value::String(value.trim().to_owned());
        arguments.insert(key.to_owned(), value);
    }
    cursor.skip_ws();
    cursor.expect(TOOL_CALL_CLOSE)?;

    let id = format!("call_{}", Uuid::new_v4().simple());
    let arguments = Value::Object(arguments).to_string();
    Some((ToolCall::function(id, name, arguments), cursor.pos))
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Option<()> {
        self.eat(token).then_some(())
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Returns the text before `token` and moves past the token.
    fn take_until(&mut self, token: &str) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(token)?;
        self.pos += end + token.len();
        Some(&rest[..end])
    }
}

/// Collapses every run of blank lines into a single blank line and trims
/// the result.
pub(crate) fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_blank = false;
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(if blank { "" } else { line.trim_end() });
        previous_blank = blank;
    }
    out.trim().to_owned()
}
