//! HTTP surface: admission, job status, artifact serving
//!
//! A thin adaptor over the store and queue. Admission validates the
//! request, persists the job record and enqueues the id; everything else
//! is read-only.

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use slated_core::{Aspect, Config, JobInput, JobStatus, Result, SlatedError, Sources};
use slated_store::{sniff_image_mime, JobQueue, JobStore};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

const MAX_PROMPT_CHARS: usize = 10_000;
const MAX_IMAGE_SOURCE_CHARS: usize = 12_000_000;
const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

const DOWNLOAD_KEY_HEADER: &str = "x-download-key";

/// Shared application state
pub struct AppState {
    pub store: Arc<JobStore>,
    pub queue: JobQueue,
    pub config: Arc<Config>,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub aspect: String,
    #[serde(default)]
    pub image_base64: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    job_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResponse {
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview_png_url: Option<String>,
    sources: SourcesResponse,
}

#[derive(Serialize)]
struct SourcesResponse {
    urls: Vec<String>,
    files: Vec<String>,
}

impl From<Sources> for SourcesResponse {
    fn from(sources: Sources) -> Self {
        Self {
            urls: sources.urls,
            files: sources.files,
        }
    }
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            state
                .config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/jobs/{job_id}", get(job_status))
        .route("/api/jobs/{job_id}/preview.png", get(preview_png))
        .route("/api/jobs/{job_id}/result.html", get(result_html))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn internal_error(context: &str, e: SlatedError) -> Response {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
        .into_response()
}

/// Validate an admission request into prompt, aspect and normalized image
pub fn validate_request(req: &GenerateRequest) -> Result<(String, Aspect, Option<String>)> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(SlatedError::Validation("prompt is required.".to_string()));
    }
    if req.prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(SlatedError::Validation(format!(
            "prompt must be at most {} characters.",
            MAX_PROMPT_CHARS
        )));
    }

    let aspect: Aspect = req
        .aspect
        .parse()
        .map_err(|_| SlatedError::Validation("aspect must be 16:9 or 4:3.".to_string()))?;

    let image_data_url = match &req.image_base64 {
        Some(raw) => Some(normalize_image(raw)?),
        None => None,
    };

    Ok((req.prompt.clone(), aspect, image_data_url))
}

/// Check size and magic bytes; accept a `data:` URL form and pass it
/// through, or wrap a bare base64 payload into one.
fn normalize_image(raw: &str) -> Result<String> {
    if raw.len() > MAX_IMAGE_SOURCE_CHARS {
        return Err(SlatedError::Validation("image is too large.".to_string()));
    }

    let payload = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (_, payload) = rest.split_once(";base64,").ok_or_else(|| {
                SlatedError::Validation("image data URL must be base64-encoded.".to_string())
            })?;
            payload
        }
        None => raw,
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| SlatedError::Validation("image is not valid base64.".to_string()))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(SlatedError::Validation("image is too large.".to_string()));
    }

    let mime = sniff_image_mime(&bytes)
        .ok_or_else(|| SlatedError::Validation("image must be a PNG or JPEG.".to_string()))?;

    if raw.starts_with("data:") {
        Ok(raw.to_string())
    } else {
        Ok(format!("data:{};base64,{}", mime, payload.trim()))
    }
}

/// POST /api/generate
async fn generate(State(state): State<SharedState>, Json(req): Json<GenerateRequest>) -> Response {
    let (prompt, aspect, image_data_url) = match validate_request(&req) {
        Ok(validated) => validated,
        Err(e) => return bad_request(e.to_string()),
    };

    let job_id = uuid::Uuid::new_v4().simple().to_string();
    let input = JobInput {
        job_id: job_id.clone(),
        prompt,
        aspect,
        image_data_url,
    };

    if let Err(e) = state.store.create(&input).await {
        return internal_error("job creation failed", e);
    }
    if let Err(e) = state.queue.enqueue(&job_id) {
        return internal_error("enqueue failed", e);
    }

    info!(job_id = %job_id, "Job admitted ({})", aspect);
    Json(GenerateResponse { job_id }).into_response()
}

/// GET /api/jobs/{job_id}
async fn job_status(State(state): State<SharedState>, Path(job_id): Path<String>) -> Response {
    let job = match state.store.get(&job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return internal_error("status read failed", e),
    };

    // The preview URL is only advertised once the job succeeded and the
    // file actually exists on disk.
    let preview_png_url = match (&job.status, &job.preview_png_path) {
        (JobStatus::Succeeded, Some(path)) if path.exists() => {
            Some(format!("/api/jobs/{}/preview.png", job_id))
        }
        _ => None,
    };

    Json(JobStatusResponse {
        status: job.status,
        step: job.step.map(|s| s.to_string()),
        error: job.error,
        preview_png_url,
        sources: job.sources.into(),
    })
    .into_response()
}

/// GET /api/jobs/{job_id}/preview.png
async fn preview_png(State(state): State<SharedState>, Path(job_id): Path<String>) -> Response {
    let job = match state.store.get(&job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return internal_error("status read failed", e),
    };

    let Some(path) = job.preview_png_path.filter(|_| job.status == JobStatus::Succeeded) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /api/jobs/{job_id}/result.html
async fn result_html(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.config.allow_html_download {
        return StatusCode::NOT_FOUND.into_response();
    }

    if let Some(expected) = &state.config.html_download_api_key {
        let provided = headers
            .get(DOWNLOAD_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let job = match state.store.get(&job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return internal_error("status read failed", e),
    };

    let Some(path) = job.result_html_path else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.html\"", job_id),
                ),
            ],
            html,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /healthz
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, aspect: &str, image: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            aspect: aspect.to_string(),
            image_base64: image.map(str::to_string),
        }
    }

    fn png_base64() -> String {
        BASE64.encode([0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0])
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let error = validate_request(&request("", "16:9", None)).unwrap_err();
        assert_eq!(error.to_string(), "prompt is required.");

        let error = validate_request(&request("   ", "16:9", None)).unwrap_err();
        assert_eq!(error.to_string(), "prompt is required.");
    }

    #[test]
    fn test_prompt_length_cap() {
        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(validate_request(&request(&long, "16:9", None)).is_err());

        let max = "x".repeat(MAX_PROMPT_CHARS);
        assert!(validate_request(&request(&max, "16:9", None)).is_ok());
    }

    #[test]
    fn test_bad_aspect_rejected() {
        let error = validate_request(&request("hi", "21:9", None)).unwrap_err();
        assert_eq!(error.to_string(), "aspect must be 16:9 or 4:3.");

        let error = validate_request(&request("hi", "", None)).unwrap_err();
        assert_eq!(error.to_string(), "aspect must be 16:9 or 4:3.");
    }

    #[test]
    fn test_bare_base64_image_normalized() {
        let (_, aspect, image) =
            validate_request(&request("hi", "4:3", Some(&png_base64()))).unwrap();
        assert_eq!(aspect, Aspect::Standard);
        let image = image.unwrap();
        assert!(image.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_data_url_passed_through() {
        let data_url = format!("data:image/png;base64,{}", png_base64());
        let (_, _, image) =
            validate_request(&request("hi", "16:9", Some(&data_url))).unwrap();
        assert_eq!(image.unwrap(), data_url);
    }

    #[test]
    fn test_non_image_payload_rejected() {
        let not_an_image = BASE64.encode(b"GIF89a rest of a gif");
        let error = validate_request(&request("hi", "16:9", Some(&not_an_image))).unwrap_err();
        assert_eq!(error.to_string(), "image must be a PNG or JPEG.");
    }

    #[test]
    fn test_oversized_image_rejected() {
        // Decoded size above 4 MiB
        let big = BASE64.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        let error = validate_request(&request("hi", "16:9", Some(&big))).unwrap_err();
        assert_eq!(error.to_string(), "image is too large.");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let error = validate_request(&request("hi", "16:9", Some("!!!not-base64!!!"))).unwrap_err();
        assert_eq!(error.to_string(), "image is not valid base64.");
    }
}
