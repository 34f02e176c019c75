use std::fmt::{self, Debug};

use lite_agent_core::{AgentBuilder, Runner, ToolCallingStyle};
use lite_agent_openai_model::{
    OpenAIConfig, OpenAIConfigBuilder, OpenAIProvider,
};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5.2";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_MAX_TURNS: usize = 10;

/// Fully resolved settings for an OpenAI-backed session.
///
/// The library never reads the process environment. Hosts resolve the
/// settings once (the `chat` binary does it from flags, environment
/// variables and a `.env` file) and pass them down.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The API key sent as a bearer token.
    pub api_key: String,
    /// The base URL of the chat completions API.
    pub base_url: String,
    /// The model identifier.
    pub model: String,
    /// The sampling temperature.
    pub temperature: f32,
    /// The maximum number of tokens per completion.
    pub max_tokens: u32,
    /// The maximum number of model calls per run.
    pub max_turns: usize,
    /// How tool calls are exchanged with the model.
    pub tool_calling_style: ToolCallingStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_turns: DEFAULT_MAX_TURNS,
            tool_calling_style: ToolCallingStyle::default(),
        }
    }
}

impl Settings {
    /// Creates settings with the given API key and defaults elsewhere.
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Builds the transport configuration.
    pub fn openai_config(&self) -> OpenAIConfig {
        OpenAIConfigBuilder::with_api_key(self.api_key.as_str())
            .with_base_url(self.base_url.as_str())
            .with_model(self.model.as_str())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .build()
    }

    /// Creates the model provider described by these settings.
    #[inline]
    pub fn model_provider(&self) -> OpenAIProvider {
        OpenAIProvider::new(self.openai_config())
    }

    /// Creates an agent builder backed by the OpenAI-compatible provider,
    /// using the configured tool calling style.
    pub fn agent_builder(&self) -> AgentBuilder {
        AgentBuilder::with_model_provider(self.model_provider())
            .with_tool_calling_style(self.tool_calling_style)
    }

    /// Creates a runner honoring the turn budget. The tool calling style
    /// is set on the agent by [`Settings::agent_builder`].
    #[inline]
    pub fn runner(&self) -> Runner {
        Runner::new().with_max_turns(self.max_turns)
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .field("tool_calling_style", &self.tool_calling_style)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_transport() {
        let settings = Settings::with_api_key("sk-test");
        let config = settings.openai_config();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(settings.runner().max_turns(), DEFAULT_MAX_TURNS);
    }

    #[test]
    fn test_agent_builder_applies_style() {
        let settings = Settings {
            tool_calling_style: ToolCallingStyle::TagGrammar,
            ..Settings::with_api_key("sk-test")
        };
        let agent = settings.agent_builder().build();
        assert_eq!(agent.tool_calling_style(), ToolCallingStyle::TagGrammar);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = Settings::with_api_key("sk-secret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("gpt-5.2"));
    }

    #[test]
    fn test_partial_deserialize() {
        let settings: Settings = serde_json::from_str(
            r#"{"model":"local","tool_calling_style":"tag_grammar"}"#,
        )
        .unwrap();
        assert_eq!(settings.model, "local");
        assert_eq!(settings.tool_calling_style, ToolCallingStyle::TagGrammar);
        assert_eq!(settings.max_turns, DEFAULT_MAX_TURNS);
    }
}
