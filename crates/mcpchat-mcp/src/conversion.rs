//! Conversion - MCP protocol types to artifacts
//!
//! Goes through the serialized protocol form so the artifact types only
//! depend on the wire field names, not on rmcp's struct layout.

use mcpchat_core::{PromptArgument, PromptArtifact, ResourceArtifact, ToolArtifact};
use rmcp::model::{Prompt, Resource, Tool};
use serde_json::Value;

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn tool_to_artifact(tool: &Tool) -> ToolArtifact {
    let json = serde_json::to_value(tool).unwrap_or(Value::Null);
    ToolArtifact {
        name: tool.name.to_string(),
        description: str_field(&json, "description"),
        input_schema: json.get("inputSchema").cloned().unwrap_or(Value::Null),
    }
}

/// Resources carry both `title` and `name`; the title wins when present
pub fn resource_to_artifact(resource: &Resource) -> ResourceArtifact {
    let json = serde_json::to_value(&resource.raw).unwrap_or(Value::Null);
    ResourceArtifact {
        uri: resource.raw.uri.clone(),
        title: str_field(&json, "title").or_else(|| str_field(&json, "name")),
        description: str_field(&json, "description"),
        mime_type: str_field(&json, "mimeType"),
    }
}

pub fn prompt_to_artifact(prompt: &Prompt) -> PromptArtifact {
    let json = serde_json::to_value(prompt).unwrap_or(Value::Null);
    let arguments = json
        .get("arguments")
        .and_then(Value::as_array)
        .map(|args| {
            args.iter()
                .filter_map(|arg| {
                    Some(PromptArgument {
                        name: str_field(arg, "name")?,
                        description: str_field(arg, "description"),
                        required: arg.get("required").and_then(Value::as_bool).unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    PromptArtifact {
        name: prompt.name.to_string(),
        description: str_field(&json, "description"),
        arguments,
    }
}
