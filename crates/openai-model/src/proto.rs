use lite_agent_model::{
    Message as ModelMessage, ModelRequest, Role, ToolCall as ModelToolCall,
    ToolSchema, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::OpenAIConfig;

// Fields of the request body that extra parameters may not override.
const RESERVED_FIELDS: &[&str] = &[
    "model",
    "messages",
    "tools",
    "tool_choice",
    "stream",
    "stream_options",
    "temperature",
    "max_tokens",
];

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct ToolCallDelta {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub r#type: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<UsageChunk>,
    pub error: Option<ApiError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
    pub reasoning_content: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct UsageChunk {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl From<UsageChunk> for Usage {
    #[inline]
    fn from(usage: UsageChunk) -> Self {
        Usage::new(
            usage.prompt_tokens.unwrap_or_default(),
            usage.completion_tokens.unwrap_or_default(),
            usage.total_tokens.unwrap_or_default(),
        )
    }
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ModelToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let tools: Vec<_> = req.tools.iter().map(create_tool).collect();
    let mut extra = config.extra_params.clone();
    extra.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        tools,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        stream: true,
        extra,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    Message {
        role: msg.role,
        content: msg.content.clone(),
        tool_calls: if msg.tool_calls.is_empty() {
            None
        } else {
            Some(msg.tool_calls.clone())
        },
        tool_call_id: msg.tool_call_id.clone(),
        extra: msg.extra.clone(),
    }
}

#[inline]
fn create_tool(tool: &ToolSchema) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::system("You are a helpful assistant."),
                ModelMessage::user("Hello"),
            ],
            tools: vec![ToolSchema {
                name: "shell".to_owned(),
                description: "Runs shell commands.".to_owned(),
                parameters: json!({
                    "type": "string",
                    "description": "The command line."
                }),
            }],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .with_max_tokens(256)
            .build();
        let expected = ChatCompletionRequest {
            model: "custom".to_owned(),
            messages: vec![
                Message {
                    role: Role::System,
                    content: Some("You are a helpful assistant.".to_owned()),
                    tool_calls: None,
                    tool_call_id: None,
                    extra: Map::new(),
                },
                Message {
                    role: Role::User,
                    content: Some("Hello".to_owned()),
                    tool_calls: None,
                    tool_call_id: None,
                    extra: Map::new(),
                },
            ],
            tools: vec![Tool {
                r#type: "function",
                function: FunctionTool {
                    name: "shell".to_owned(),
                    description: "Runs shell commands.".to_owned(),
                    parameters: json!({
                        "type": "string",
                        "description": "The command line."
                    }),
                },
            }],
            tool_choice: Some("auto"),
            temperature: 0.7,
            max_tokens: 256,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            stream: true,
            extra: Map::new(),
        };
        assert_eq!(create_request(&request, &config), expected);
    }

    #[test]
    fn test_serialize_request_body() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::user("What is 2+2?"),
                ModelMessage::tool_calls(vec![ModelToolCall::function(
                    "call_1",
                    "calculate",
                    r#"{"expression":"2+2"}"#,
                )]),
                ModelMessage::tool_result("call_1", "4"),
            ],
            tools: vec![],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .with_param("top_p", 0.9)
            .with_param("model", "ignored")
            .build();
        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();

        assert_eq!(body["model"], "custom");
        assert_eq!(body["top_p"], 0.9);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(
            body["messages"],
            json!([
                { "role": "user", "content": "What is 2+2?" },
                {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "calculate",
                            "arguments": "{\"expression\":\"2+2\"}"
                        }
                    }]
                },
                { "role": "tool", "content": "4", "tool_call_id": "call_1" }
            ])
        );
    }
}
