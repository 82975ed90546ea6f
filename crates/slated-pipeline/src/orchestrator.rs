//! Per-job pipeline orchestrator
//!
//! Drives one job through Plan, Research(Web), Research(File), and the
//! bounded Generate/Validate fix loop, then renders the preview and marks
//! the job terminal. Planner and research failures degrade; generator,
//! validator, parse and render failures are fatal to the job and surface
//! to the worker.

use crate::planner::run_planner;
use crate::prompt::{
    build_generation_brief, build_user_input, build_validation_brief, compose_effective_prompt,
};
use crate::research::{derive_keywords, run_file_research, run_web_research, FileResearchOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use slated_agent::parse::{extract_output_text, parse_json_from_output_text, strip_code_fences};
use slated_agent::schema::{structured_format, validator_schema};
use slated_agent::AgentApi;
use slated_browser::SlideRenderer;
use slated_core::{Aspect, JobStatus, PipelineStep, Result, SlatedError};
use slated_provision::{definitions, ProvisionHandle};
use slated_store::JobStore;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, info};

/// One initial generation plus up to two fixes
const MAX_GENERATION_ATTEMPTS: usize = 3;

/// Validator issues quoted in the terminal failure message
const MAX_REPORTED_ISSUES: usize = 8;

/// Validator verdict for one generated document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorOutput {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub fixed_prompt_appendix: String,
}

/// Count `<section class="...slide...">` occurrences.
///
/// Case-insensitive, requires a quoted class attribute, and matches `slide`
/// only as a whole word inside the class value.
pub fn count_slide_sections(html: &str) -> usize {
    static SLIDE_SECTION: OnceLock<Regex> = OnceLock::new();
    let re = SLIDE_SECTION.get_or_init(|| {
        Regex::new(r#"(?i)<section\b[^>]*\bclass\s*=\s*"[^"]*\bslide\b[^"]*""#)
            .expect("slide section pattern is valid")
    });
    re.find_iter(html).count()
}

/// The appendix handed to the next generation attempt
fn next_fix_appendix(verdict: &ValidatorOutput, slide_issue: Option<&str>) -> String {
    let provided = verdict.fixed_prompt_appendix.trim();
    if !provided.is_empty() {
        return match slide_issue {
            Some(issue) => format!("{}\n{}", provided, issue),
            None => provided.to_string(),
        };
    }

    let mut lines = Vec::new();
    if let Some(issue) = slide_issue {
        lines.push(format!("- {}", issue));
    }
    for issue in &verdict.issues {
        lines.push(format!("- {}", issue));
    }
    format!("Fix these issues:\n{}", lines.join("\n"))
}

/// Terminal failure after the last attempt
fn exhausted_failure(verdict: &ValidatorOutput, slide_issue: Option<&str>) -> SlatedError {
    let mut issues: Vec<&str> = Vec::new();
    if let Some(issue) = slide_issue {
        issues.push(issue);
    }
    issues.extend(
        verdict
            .issues
            .iter()
            .map(String::as_str)
            .take(MAX_REPORTED_ISSUES),
    );
    SlatedError::Pipeline(format!(
        "slide did not validate after {} attempts: {}",
        MAX_GENERATION_ATTEMPTS,
        issues.join("; ")
    ))
}

/// Runs the multi-agent pipeline for one job at a time
pub struct PipelineRunner {
    api: Arc<dyn AgentApi>,
    renderer: Arc<dyn SlideRenderer>,
    store: Arc<JobStore>,
    provision: ProvisionHandle,
    model: String,
}

impl PipelineRunner {
    pub fn new(
        api: Arc<dyn AgentApi>,
        renderer: Arc<dyn SlideRenderer>,
        store: Arc<JobStore>,
        provision: ProvisionHandle,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api,
            renderer,
            store,
            provision,
            model: model.into(),
        }
    }

    async fn enter_step(&self, job_id: &str, step: PipelineStep) -> Result<()> {
        debug!(job_id = %job_id, "Entering step {}", step);
        self.store
            .update(job_id, move |state| {
                state.advance_status(JobStatus::Running);
                state.step = Some(step);
            })
            .await?;
        Ok(())
    }

    /// Drive one job to a successful terminal state.
    ///
    /// Errors returned here are recorded as `failed` by the worker.
    pub async fn run_job(&self, job_id: &str) -> Result<()> {
        let ctx = self.provision.ready().await;

        let input = self
            .store
            .get_input(job_id)
            .await?
            .ok_or_else(|| SlatedError::NotFound(format!("job {}", job_id)))?;
        let aspect = input.aspect;
        let effective_prompt = compose_effective_prompt(&input.prompt, aspect);

        self.enter_step(job_id, PipelineStep::Plan).await?;
        let user_input = build_user_input(&effective_prompt, input.image_data_url.as_deref());
        let plan = run_planner(&*self.api, &self.model, user_input, &input.prompt).await;

        self.enter_step(job_id, PipelineStep::WebResearch).await?;
        let web = run_web_research(&*self.api, &self.model, &plan.search_queries).await;
        if !web.citations.is_empty() {
            self.store
                .update(job_id, |state| {
                    for citation in &web.citations {
                        state.sources.add_url(&citation.url);
                    }
                })
                .await?;
        }

        let file = match &ctx.vector_store_id {
            Some(store_id) => {
                self.enter_step(job_id, PipelineStep::FileResearch).await?;
                let keywords = derive_keywords(&plan);
                let file = run_file_research(
                    &*self.api,
                    &self.model,
                    store_id,
                    &effective_prompt,
                    &keywords,
                )
                .await;
                if !file.citations.is_empty() {
                    self.store
                        .update(job_id, |state| {
                            for citation in &file.citations {
                                state.sources.add_file(&citation.filename);
                            }
                        })
                        .await?;
                }
                file
            }
            None => FileResearchOutput::default(),
        };

        let mut fix_appendix: Option<String> = None;
        let mut accepted_html = None;

        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            self.enter_step(job_id, PipelineStep::GenerateHtml).await?;
            let brief = build_generation_brief(
                &effective_prompt,
                &plan,
                &web,
                &file,
                fix_appendix.as_deref(),
            );
            let html = self.generate_html(&brief).await?;
            self.store.save_html(job_id, &html).await?;

            self.enter_step(job_id, PipelineStep::Validate).await?;
            let verdict = self.validate_html(&html, aspect).await?;
            let slide_count = count_slide_sections(&html);
            let slide_issue = (slide_count != 1).then(|| {
                format!(
                    "Expected exactly 1 <section class=\"slide\">, found {}",
                    slide_count
                )
            });

            if verdict.ok && slide_issue.is_none() {
                accepted_html = Some(html);
                break;
            }
            if attempt + 1 == MAX_GENERATION_ATTEMPTS {
                return Err(exhausted_failure(&verdict, slide_issue.as_deref()));
            }

            info!(
                job_id = %job_id,
                "Attempt {} rejected ({} issues), retrying",
                attempt + 1,
                verdict.issues.len() + slide_issue.iter().count()
            );
            fix_appendix = Some(next_fix_appendix(&verdict, slide_issue.as_deref()));
        }

        let html = accepted_html.expect("fix loop accepted a document or returned");

        let png = self.renderer.render(&html, aspect).await?;
        self.store.save_preview_png(job_id, &png).await?;

        self.store
            .update(job_id, |state| {
                state.advance_status(JobStatus::Succeeded);
                state.step = None;
                state.error = None;
            })
            .await?;

        info!(job_id = %job_id, "Job succeeded");
        Ok(())
    }

    async fn generate_html(&self, brief: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "instructions": definitions::HTML_GENERATOR_INSTRUCTIONS,
            "input": build_user_input(brief, None),
        });
        let envelope = self.api.create_response(body).await?;
        let text = extract_output_text(&envelope);
        Ok(strip_code_fences(&text).trim().to_string())
    }

    async fn validate_html(&self, html: &str, aspect: Aspect) -> Result<ValidatorOutput> {
        let brief = build_validation_brief(html, aspect);
        let body = json!({
            "model": self.model,
            "instructions": definitions::VALIDATOR_INSTRUCTIONS,
            "input": build_user_input(&brief, None),
            "text": structured_format("validator", validator_schema()),
        });
        let envelope = self.api.create_response(body).await?;
        parse_json_from_output_text(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_slide_sections() {
        assert_eq!(
            count_slide_sections(r#"<section class="slide"></section>"#),
            1
        );
        assert_eq!(
            count_slide_sections(r#"<SECTION CLASS="Slide deck"></SECTION>"#),
            1
        );
        assert_eq!(
            count_slide_sections(
                r#"<section class="slide"></section><section class="intro slide"></section>"#
            ),
            2
        );
        // `slide` must be word-bounded inside the class value
        assert_eq!(
            count_slide_sections(r#"<section class="slideshow"></section>"#),
            0
        );
        // Attribute must be quoted
        assert_eq!(count_slide_sections("<section class=slide>"), 0);
        assert_eq!(count_slide_sections("<div class=\"slide\"></div>"), 0);
        assert_eq!(count_slide_sections(""), 0);
    }

    #[test]
    fn test_count_with_extra_attributes() {
        let html = r#"<section id="main" data-x="1" class = "hero slide dark">"#;
        assert_eq!(count_slide_sections(html), 1);
    }

    #[test]
    fn test_next_fix_appendix_prefers_validator_text() {
        let verdict = ValidatorOutput {
            ok: false,
            issues: vec!["Contains <script> tag".to_string()],
            fixed_prompt_appendix: "Remove all <script> tags.".to_string(),
        };
        assert_eq!(
            next_fix_appendix(&verdict, None),
            "Remove all <script> tags."
        );

        let with_slide = next_fix_appendix(&verdict, Some("Expected exactly 1 section"));
        assert_eq!(
            with_slide,
            "Remove all <script> tags.\nExpected exactly 1 section"
        );
    }

    #[test]
    fn test_next_fix_appendix_synthesized() {
        let verdict = ValidatorOutput {
            ok: false,
            issues: vec!["Text overflows the canvas".to_string()],
            fixed_prompt_appendix: String::new(),
        };
        let appendix = next_fix_appendix(&verdict, Some("Wrong slide count"));
        assert_eq!(
            appendix,
            "Fix these issues:\n- Wrong slide count\n- Text overflows the canvas"
        );
    }

    #[test]
    fn test_exhausted_failure_message() {
        let verdict = ValidatorOutput {
            ok: true,
            issues: (0..12).map(|i| format!("issue {}", i)).collect(),
            fixed_prompt_appendix: String::new(),
        };
        let error = exhausted_failure(&verdict, Some("Expected exactly 1 <section class=\"slide\">, found 2"));
        let message = error.to_string();
        assert!(message.contains("Expected exactly 1 <section class=\"slide\">"));
        assert!(message.contains("issue 0"));
        assert!(message.contains("issue 7"));
        // Only eight validator issues are quoted
        assert!(!message.contains("issue 8"));
    }
}
