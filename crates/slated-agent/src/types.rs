//! Wire types for the remote agent service

use serde::{Deserialize, Serialize};

/// A tool attached to an agent definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentTool {
    /// Hosted web search
    WebSearchPreview,
    /// Vector-store backed file search
    FileSearch { vector_store_ids: Vec<String> },
}

/// Prompt-kind agent definition body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Always `"prompt"` for the agents this service provisions
    pub kind: String,
    pub model: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AgentTool>,
}

/// A named remote agent: instructions, a model handle and a tool set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub definition: PromptDefinition,
}

impl AgentDefinition {
    pub fn prompt(name: &str, model: &str, instructions: &str, tools: Vec<AgentTool>) -> Self {
        Self {
            name: name.to_string(),
            definition: PromptDefinition {
                kind: "prompt".to_string(),
                model: model.to_string(),
                instructions: instructions.to_string(),
                tools,
            },
        }
    }
}
