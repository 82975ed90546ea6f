//! Shared types for jobs, aspects and pipeline steps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Slide proportions supported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Aspect {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
}

impl Aspect {
    /// Fixed canvas dimensions in pixels
    pub fn canvas(&self) -> (u32, u32) {
        match self {
            Aspect::Widescreen => (1920, 1080),
            Aspect::Standard => (1024, 768),
        }
    }

    /// Safe margin in pixels the slide content must respect
    pub fn safe_margin(&self) -> u32 {
        match self {
            Aspect::Widescreen => 64,
            Aspect::Standard => 48,
        }
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aspect::Widescreen => write!(f, "16:9"),
            Aspect::Standard => write!(f, "4:3"),
        }
    }
}

impl std::str::FromStr for Aspect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(Aspect::Widescreen),
            "4:3" => Ok(Aspect::Standard),
            _ => Err(format!("Invalid aspect: {}. Use 16:9 or 4:3.", s)),
        }
    }
}

/// Observable lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Position along the queued -> running -> terminal ordering
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Succeeded | JobStatus::Failed => 2,
        }
    }
}

/// Pipeline step currently executing, reported in job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStep {
    #[serde(rename = "Plan")]
    Plan,
    #[serde(rename = "Research(Web)")]
    WebResearch,
    #[serde(rename = "Research(File)")]
    FileResearch,
    #[serde(rename = "Generate HTML")]
    GenerateHtml,
    #[serde(rename = "Validate")]
    Validate,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStep::Plan => write!(f, "Plan"),
            PipelineStep::WebResearch => write!(f, "Research(Web)"),
            PipelineStep::FileResearch => write!(f, "Research(File)"),
            PipelineStep::GenerateHtml => write!(f, "Generate HTML"),
            PipelineStep::Validate => write!(f, "Validate"),
        }
    }
}

/// Citations surfaced to the client while a job runs.
///
/// Both sets are append-only and deduplicated case-insensitively;
/// first-seen casing and insertion order are preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sources {
    pub urls: Vec<String>,
    pub files: Vec<String>,
}

impl Sources {
    pub fn add_url(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        if !self.urls.iter().any(|u| u.eq_ignore_ascii_case(url)) {
            self.urls.push(url.to_string());
        }
    }

    pub fn add_file(&mut self, filename: &str) {
        let filename = filename.trim();
        if filename.is_empty() {
            return;
        }
        if !self.files.iter().any(|f| f.eq_ignore_ascii_case(filename)) {
            self.files.push(filename.to_string());
        }
    }
}

/// Immutable request record created at admission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    /// Opaque, globally unique, URL-safe id
    pub job_id: String,
    /// User prompt, 1..10000 chars, non-blank
    pub prompt: String,
    pub aspect: Aspect,
    /// Normalized `data:image/png|jpeg;base64,` URL when an image was attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
}

/// Observable lifecycle record of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<PipelineStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub sources: Sources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_html_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_png_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    /// Fresh record in the initial `queued` status
    pub fn queued() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Queued,
            step: None,
            error: None,
            sources: Sources::default(),
            result_html_path: None,
            preview_png_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move status forward along queued -> running -> terminal.
    ///
    /// Regressions are ignored; a terminal status is never overwritten.
    pub fn advance_status(&mut self, next: JobStatus) {
        if self.status.is_terminal() {
            return;
        }
        if next.rank() >= self.status.rank() {
            self.status = next;
        }
    }
}
