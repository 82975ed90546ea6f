//! Canonical agent definitions
//!
//! The single source of truth for the five agents this service provisions.
//! Provisioning reconciles these against the remote service, and the
//! pipeline builds its invocation bodies from the same definitions, so the
//! two cannot drift.

use slated_agent::{AgentDefinition, AgentTool};

pub const PLANNER: &str = "planner";
pub const WEB_RESEARCH: &str = "web-research";
pub const FILE_RESEARCH: &str = "file-research";
pub const HTML_GENERATOR: &str = "html-generator";
pub const VALIDATOR: &str = "validator";

pub const PLANNER_INSTRUCTIONS: &str = "\
You plan a single presentation slide from a user request. Produce exactly one \
outline with a short title and 3-6 concise bullet points, plus up to 8 web \
search queries that would ground the slide in current facts, and the key \
constraints the user stated (tone, audience, branding, data to include). \
Never plan more than one slide.";

pub const WEB_RESEARCH_INSTRUCTIONS: &str = "\
You research facts for a presentation slide using web search. Run the \
provided queries, summarize the findings relevant to the slide, and cite \
every claim with the page title, URL and a short supporting quote. Prefer \
primary sources and recent material.";

pub const FILE_RESEARCH_INSTRUCTIONS: &str = "\
You research supporting material for a presentation slide from the indexed \
document collection using file search. Return short verbatim snippets that \
support the slide content, each cited with the source file id and filename.";

pub const HTML_GENERATOR_INSTRUCTIONS: &str = "\
You generate a complete, self-contained HTML document for exactly one \
presentation slide. The document must contain exactly one \
<section class=\"slide\"> element sized to the requested canvas, use only \
inline CSS, embed no external resources, and contain no <script> tags. \
Respect the safe margin and keep text legible at presentation distance. \
Output only the HTML document, with no commentary.";

pub const VALIDATOR_INSTRUCTIONS: &str = "\
You validate a single-slide HTML document against its constraints: exactly \
one <section class=\"slide\"> element, canvas dimensions and safe margin \
respected, no <script> tags, no external resources, visible and legible \
content. Report ok=true only when every constraint holds. List each issue \
found, and provide a fixedPromptAppendix with concrete instructions the \
generator can follow to repair the document.";

/// The canonical roster, in provisioning order.
///
/// The file-research agent is only defined when a vector store exists to
/// bind its `file_search` tool to.
pub fn canonical_definitions(model: &str, vector_store_id: Option<&str>) -> Vec<AgentDefinition> {
    let mut defs = vec![
        AgentDefinition::prompt(PLANNER, model, PLANNER_INSTRUCTIONS, vec![]),
        AgentDefinition::prompt(
            WEB_RESEARCH,
            model,
            WEB_RESEARCH_INSTRUCTIONS,
            vec![AgentTool::WebSearchPreview],
        ),
    ];

    if let Some(store_id) = vector_store_id {
        defs.push(AgentDefinition::prompt(
            FILE_RESEARCH,
            model,
            FILE_RESEARCH_INSTRUCTIONS,
            vec![AgentTool::FileSearch {
                vector_store_ids: vec![store_id.to_string()],
            }],
        ));
    }

    defs.push(AgentDefinition::prompt(
        HTML_GENERATOR,
        model,
        HTML_GENERATOR_INSTRUCTIONS,
        vec![],
    ));
    defs.push(AgentDefinition::prompt(
        VALIDATOR,
        model,
        VALIDATOR_INSTRUCTIONS,
        vec![],
    ));
    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_without_vector_store() {
        let defs = canonical_definitions("gpt-test", None);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec![PLANNER, WEB_RESEARCH, HTML_GENERATOR, VALIDATOR]);
        assert!(defs.iter().all(|d| d.definition.model == "gpt-test"));
    }

    #[test]
    fn test_roster_with_vector_store() {
        let defs = canonical_definitions("gpt-test", Some("vs_42"));
        assert_eq!(defs.len(), 5);

        let file_research = defs.iter().find(|d| d.name == FILE_RESEARCH).unwrap();
        assert_eq!(
            file_research.definition.tools,
            vec![AgentTool::FileSearch {
                vector_store_ids: vec!["vs_42".to_string()]
            }]
        );

        let web = defs.iter().find(|d| d.name == WEB_RESEARCH).unwrap();
        assert_eq!(web.definition.tools, vec![AgentTool::WebSearchPreview]);

        // The remaining agents carry no tools
        for name in [PLANNER, HTML_GENERATOR, VALIDATOR] {
            let def = defs.iter().find(|d| d.name == name).unwrap();
            assert!(def.definition.tools.is_empty());
        }
    }
}
