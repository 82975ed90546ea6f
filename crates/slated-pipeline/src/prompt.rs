//! Prompt composition for the pipeline stages
//!
//! Builds the effective prompt (raw prompt plus aspect constraints), the
//! user input parts for the planner, and the briefs handed to the
//! generator and validator.

use crate::planner::PlannerOutput;
use crate::research::{FileResearchOutput, WebResearchOutput};
use serde_json::{json, Value};
use slated_core::Aspect;

/// Aspect constraints reiterated after the user prompt
pub fn aspect_appendix(aspect: Aspect) -> String {
    let (width, height) = aspect.canvas();
    format!(
        "Design for a {} slide on a fixed {}x{} pixel canvas. \
         Keep all content within a {}px safe margin on every side. \
         Produce exactly one slide.",
        aspect,
        width,
        height,
        aspect.safe_margin()
    )
}

/// `{rawPrompt}\n\n---\n{aspect appendix}`
pub fn compose_effective_prompt(raw_prompt: &str, aspect: Aspect) -> String {
    format!("{}\n\n---\n{}", raw_prompt, aspect_appendix(aspect))
}

/// User input for a `responses` call: a text part, plus an image part when
/// the job carried an attachment.
pub fn build_user_input(text: &str, image_data_url: Option<&str>) -> Value {
    let mut content = vec![json!({ "type": "input_text", "text": text })];
    if let Some(url) = image_data_url {
        content.push(json!({ "type": "input_image", "image_url": url }));
    }
    json!([{ "role": "user", "content": content }])
}

/// Brief for the HTML generator: effective prompt, outline, research
/// bundles, and the fix appendix from the previous validation round.
pub fn build_generation_brief(
    effective_prompt: &str,
    plan: &PlannerOutput,
    web: &WebResearchOutput,
    file: &FileResearchOutput,
    fix_appendix: Option<&str>,
) -> String {
    let mut brief = String::new();

    brief.push_str("# REQUEST\n\n");
    brief.push_str(effective_prompt);
    brief.push_str("\n\n");

    if let Some(outline) = plan.outline.first() {
        brief.push_str("# OUTLINE\n\n");
        brief.push_str(&format!("Title: {}\n", outline.title));
        for bullet in &outline.bullets {
            brief.push_str(&format!("- {}\n", bullet));
        }
        brief.push('\n');
    }

    if !plan.key_constraints.is_empty() {
        brief.push_str("# CONSTRAINTS\n\n");
        for constraint in &plan.key_constraints {
            brief.push_str(&format!("- {}\n", constraint));
        }
        brief.push('\n');
    }

    if !web.findings.is_empty() || !web.citations.is_empty() {
        brief.push_str("# WEB RESEARCH\n\n");
        if !web.findings.is_empty() {
            brief.push_str(&web.findings);
            brief.push('\n');
        }
        for citation in &web.citations {
            brief.push_str(&format!(
                "- {} ({}): {}\n",
                citation.title, citation.url, citation.quote
            ));
        }
        brief.push('\n');
    }

    if !file.snippets.is_empty() || !file.citations.is_empty() {
        brief.push_str("# DOCUMENT RESEARCH\n\n");
        for snippet in &file.snippets {
            brief.push_str(&format!("- {}\n", snippet));
        }
        for citation in &file.citations {
            brief.push_str(&format!("- [{}] {}\n", citation.filename, citation.snippet));
        }
        brief.push('\n');
    }

    if let Some(fix) = fix_appendix {
        brief.push_str("# REQUIRED FIXES\n\n");
        brief.push_str(fix);
        brief.push('\n');
    }

    brief
}

/// Brief for the validator: the document plus the constraints to check
pub fn build_validation_brief(html: &str, aspect: Aspect) -> String {
    format!(
        "Validate this single-slide HTML document.\n\nConstraints: {}\n\n\
         # DOCUMENT\n\n{}",
        aspect_appendix(aspect),
        html
    )
}
