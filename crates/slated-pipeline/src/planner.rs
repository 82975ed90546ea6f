//! Planner stage
//!
//! The planner is best-effort: a malformed or failed response degrades to a
//! locally synthesized plan and the pipeline continues. Whatever the model
//! returns is normalized into the documented bounds before use.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slated_agent::parse::parse_json_from_output_text;
use slated_agent::schema::{planner_schema, structured_format};
use slated_agent::AgentApi;
use slated_provision::definitions;
use tracing::warn;

const MAX_TITLE_CHARS: usize = 80;
const MIN_BULLETS: usize = 3;
const MAX_BULLETS: usize = 6;
const MAX_QUERIES: usize = 8;
const MAX_CONSTRAINTS: usize = 24;

const DEFAULT_BULLETS: [&str; 3] = ["Overview", "Key points", "Summary"];

/// One slide outline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideOutline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// Planner result after normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerOutput {
    #[serde(default)]
    pub slide_count: u32,
    #[serde(default)]
    pub outline: Vec<SlideOutline>,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub key_constraints: Vec<String>,
}

/// Drop blanks and case-insensitive duplicates, preserving order
pub(crate) fn dedupe_case_insensitive(items: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !kept.iter().any(|k| k.eq_ignore_ascii_case(item)) {
            kept.push(item.to_string());
        }
    }
    kept
}

/// Title synthesized from the first prompt line, trimmed to 80 chars
fn synthesized_title(prompt: &str) -> String {
    let line = prompt.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "Slide".to_string();
    }
    line.chars().take(MAX_TITLE_CHARS).collect()
}

fn synthesized_outline(prompt: &str) -> SlideOutline {
    SlideOutline {
        title: synthesized_title(prompt),
        bullets: DEFAULT_BULLETS.iter().map(|b| b.to_string()).collect(),
    }
}

/// Local plan used when the planner call fails entirely
pub fn fallback_plan(prompt: &str) -> PlannerOutput {
    PlannerOutput {
        slide_count: 1,
        outline: vec![synthesized_outline(prompt)],
        search_queries: Vec::new(),
        key_constraints: Vec::new(),
    }
}

/// Force a planner result into the documented bounds
pub fn normalize_plan(mut plan: PlannerOutput, prompt: &str) -> PlannerOutput {
    plan.slide_count = 1;

    let mut outline = plan.outline.into_iter().next().unwrap_or_else(|| SlideOutline {
        title: String::new(),
        bullets: Vec::new(),
    });

    outline.title = outline.title.trim().chars().take(MAX_TITLE_CHARS).collect();
    if outline.title.is_empty() {
        outline.title = synthesized_title(prompt);
    }

    let mut bullets = dedupe_case_insensitive(&outline.bullets);
    for default in DEFAULT_BULLETS {
        if bullets.len() >= MIN_BULLETS {
            break;
        }
        if !bullets.iter().any(|b| b.eq_ignore_ascii_case(default)) {
            bullets.push(default.to_string());
        }
    }
    bullets.truncate(MAX_BULLETS);
    outline.bullets = bullets;

    plan.outline = vec![outline];

    plan.search_queries = dedupe_case_insensitive(&plan.search_queries);
    plan.search_queries.truncate(MAX_QUERIES);

    plan.key_constraints = dedupe_case_insensitive(&plan.key_constraints);
    plan.key_constraints.truncate(MAX_CONSTRAINTS);

    plan
}

/// Invoke the planner and normalize its output. Never fails.
pub async fn run_planner(
    api: &dyn AgentApi,
    model: &str,
    user_input: Value,
    raw_prompt: &str,
) -> PlannerOutput {
    let body = json!({
        "model": model,
        "instructions": definitions::PLANNER_INSTRUCTIONS,
        "input": user_input,
        "text": structured_format("planner", planner_schema()),
    });

    let plan = match api.create_response(body).await {
        Ok(envelope) => parse_json_from_output_text::<PlannerOutput>(&envelope),
        Err(e) => Err(e),
    };

    match plan {
        Ok(plan) => normalize_plan(plan, raw_prompt),
        Err(e) => {
            warn!("Planner degraded to local fallback: {}", e);
            fallback_plan(raw_prompt)
        }
    }
}
