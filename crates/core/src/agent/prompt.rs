use serde_json::Value;

use super::ToolCallingStyle;
use crate::tool::ToolHandle;

const TAG_GRAMMAR_PROMPT: &str = include_str!("tag_grammar_prompt.md");

/// Builds the content of the system message.
pub(super) fn system_prompt(
    instructions: &str,
    tools: &[ToolHandle],
    style: ToolCallingStyle,
) -> String {
    let mut prompt = instructions.trim_end().to_owned();
    if tools.is_empty() {
        return prompt;
    }

    match style {
        ToolCallingStyle::Native => {
            let names: Vec<_> = tools.iter().map(ToolHandle::name).collect();
            prompt.push_str("\n\nYou can use the following tools: ");
            prompt.push_str(&names.join(", "));
            prompt.push_str("\nCall the matching function when a tool helps.");
        }
        ToolCallingStyle::TagGrammar => {
            prompt.push_str("\n\n## Available tools\n");
            for tool in tools {
                prompt.push_str(&format!(
                    "\n### {}\n{}\n",
                    tool.name(),
                    tool.description()
                ));
                let params = describe_parameters(tool.parameter_schema());
                if params.is_empty() {
                    prompt.push_str("Parameters: none\n");
                } else {
                    prompt.push_str("Parameters:\n");
                    for line in params {
                        prompt.push_str(&line);
                        prompt.push('\n');
                    }
                }
            }
            prompt.push('\n');
            prompt.push_str(TAG_GRAMMAR_PROMPT.trim_end());
        }
    }
    prompt
}

fn describe_parameters(schema: &Value) -> Vec<String> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object)
    else {
        return vec![];
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, property)| {
            let ty = match property.get("type") {
                Some(Value::String(ty)) => ty.clone(),
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" | "),
                _ => "any".to_owned(),
            };
            let mut line = format!("- {name} ({ty}");
            if required.contains(&name.as_str()) {
                line.push_str(", required");
            }
            line.push(')');
            if let Some(description) =
                property.get("description").and_then(Value::as_str)
            {
                line.push_str(": ");
                line.push_str(description);
            }
            line
        })
        .collect()
}
