//! Web and file research stages
//!
//! Both stages are best-effort: a failed call yields an empty output and
//! the pipeline proceeds. File research only runs when provisioning
//! produced a vector store.

use crate::planner::{dedupe_case_insensitive, PlannerOutput};
use crate::prompt::build_user_input;
use serde::{Deserialize, Serialize};
use serde_json::json;
use slated_agent::parse::parse_json_from_output_text;
use slated_agent::schema::{file_research_schema, structured_format, web_research_schema};
use slated_agent::AgentApi;
use slated_provision::definitions;
use tracing::{debug, warn};

/// Keywords handed to file search, drawn from constraints and titles
const MAX_KEYWORDS: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebCitation {
    pub title: String,
    pub url: String,
    pub quote: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResearchOutput {
    #[serde(default)]
    pub findings: String,
    #[serde(default)]
    pub citations: Vec<WebCitation>,
    #[serde(default)]
    pub used_queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCitation {
    pub file_id: String,
    pub filename: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResearchOutput {
    #[serde(default)]
    pub snippets: Vec<String>,
    #[serde(default)]
    pub citations: Vec<FileCitation>,
}

/// Up to 12 deduped keywords from `keyConstraints` and outline titles
pub fn derive_keywords(plan: &PlannerOutput) -> Vec<String> {
    let mut candidates = plan.key_constraints.clone();
    candidates.extend(plan.outline.iter().map(|o| o.title.clone()));

    let mut keywords = dedupe_case_insensitive(&candidates);
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Run the web-research agent over the deduplicated queries. Never fails.
pub async fn run_web_research(
    api: &dyn AgentApi,
    model: &str,
    queries: &[String],
) -> WebResearchOutput {
    let queries = dedupe_case_insensitive(queries);
    if queries.is_empty() {
        debug!("No search queries planned, skipping web research");
        return WebResearchOutput::default();
    }

    let mut text = String::from("Research these queries for the slide:\n");
    for query in &queries {
        text.push_str(&format!("- {}\n", query));
    }

    let body = json!({
        "model": model,
        "instructions": definitions::WEB_RESEARCH_INSTRUCTIONS,
        "input": build_user_input(&text, None),
        "tools": [{ "type": "web_search_preview" }],
        "text": structured_format("web_research", web_research_schema()),
    });

    let output = match api.create_response(body).await {
        Ok(envelope) => parse_json_from_output_text::<WebResearchOutput>(&envelope),
        Err(e) => Err(e),
    };

    match output {
        Ok(output) => output,
        Err(e) => {
            warn!("Web research degraded to empty result: {}", e);
            WebResearchOutput::default()
        }
    }
}

/// Run the file-research agent against the vector store. Never fails.
pub async fn run_file_research(
    api: &dyn AgentApi,
    model: &str,
    vector_store_id: &str,
    effective_prompt: &str,
    keywords: &[String],
) -> FileResearchOutput {
    let mut text = format!("{}\n\n", effective_prompt);
    if !keywords.is_empty() {
        text.push_str("Search the document collection for: ");
        text.push_str(&keywords.join(", "));
        text.push('\n');
    }

    let body = json!({
        "model": model,
        "instructions": definitions::FILE_RESEARCH_INSTRUCTIONS,
        "input": build_user_input(&text, None),
        "tools": [{
            "type": "file_search",
            "vector_store_ids": [vector_store_id],
        }],
        "text": structured_format("file_research", file_research_schema()),
    });

    let output = match api.create_response(body).await {
        Ok(envelope) => parse_json_from_output_text::<FileResearchOutput>(&envelope),
        Err(e) => Err(e),
    };

    match output {
        Ok(output) => output,
        Err(e) => {
            warn!("File research degraded to empty result: {}", e);
            FileResearchOutput::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SlideOutline;

    #[test]
    fn test_derive_keywords_union_and_cap() {
        let plan = PlannerOutput {
            key_constraints: (0..10).map(|i| format!("constraint {}", i)).collect(),
            outline: vec![SlideOutline {
                title: "The Title".to_string(),
                bullets: vec![],
            }],
            ..Default::default()
        };
        let keywords = derive_keywords(&plan);
        assert_eq!(keywords.len(), 11);
        assert!(keywords.contains(&"The Title".to_string()));

        let plan = PlannerOutput {
            key_constraints: (0..20).map(|i| format!("constraint {}", i)).collect(),
            ..Default::default()
        };
        assert_eq!(derive_keywords(&plan).len(), 12);
    }

    #[test]
    fn test_derive_keywords_dedupes_title_against_constraints() {
        let plan = PlannerOutput {
            key_constraints: vec!["branding".to_string()],
            outline: vec![SlideOutline {
                title: "Branding".to_string(),
                bullets: vec![],
            }],
            ..Default::default()
        };
        assert_eq!(derive_keywords(&plan), vec!["branding"]);
    }
}
